//! Configuration loading for the copilink client.
//!
//! Uses figment to layer serialized defaults, an optional YAML file, and
//! `COPILINK_`-prefixed environment variables.

pub mod schema;

pub use schema::Config;
