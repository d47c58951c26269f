use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "COPILINK_";

fn default_client_id() -> String {
    "Iv1.b507a08c87ecfe98".to_string()
}
fn default_device_code_url() -> String {
    "https://github.com/login/device/code".to_string()
}
fn default_access_token_url() -> String {
    "https://github.com/login/oauth/access_token".to_string()
}
fn default_api_key_url() -> String {
    "https://api.github.com/copilot_internal/v2/token".to_string()
}
fn default_chat_completions_endpoint() -> String {
    "https://api.githubcopilot.com/chat/completions".to_string()
}
fn default_model_responses_endpoint() -> String {
    "https://api.githubcopilot.com/responses".to_string()
}
fn default_auth_token_expiration_days() -> u32 {
    90
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "GitHubCopilotChat/0.26.7".to_string()
}
fn default_editor_version() -> String {
    "vscode/1.99.3".to_string()
}
fn default_editor_plugin_version() -> String {
    "copilot-chat/0.26.7".to_string()
}
fn default_model() -> String {
    "gpt-5-mini".to_string()
}

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// OAuth client ID of the Copilot app.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Device-authorization endpoint.
    #[serde(default = "default_device_code_url")]
    pub device_code_url: String,
    /// Endpoint polled with the device code for the long-lived grant.
    #[serde(default = "default_access_token_url")]
    pub access_token_url: String,
    /// Endpoint exchanging the grant for a short-lived API token.
    #[serde(default = "default_api_key_url")]
    pub api_key_url: String,
    #[serde(default = "default_chat_completions_endpoint")]
    pub chat_completions_endpoint: String,
    /// Endpoint used by models that only speak the responses API.
    #[serde(default = "default_model_responses_endpoint")]
    pub model_responses_endpoint: String,
    /// Lifetime of cached authentication records, in days.
    #[serde(default = "default_auth_token_expiration_days")]
    pub auth_token_expiration_days: u32,
    /// Chat request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_editor_version")]
    pub editor_version: String,
    #[serde(default = "default_editor_plugin_version")]
    pub editor_plugin_version: String,
    /// Model used when the caller does not name one.
    #[serde(default = "default_model")]
    pub default_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            device_code_url: default_device_code_url(),
            access_token_url: default_access_token_url(),
            api_key_url: default_api_key_url(),
            chat_completions_endpoint: default_chat_completions_endpoint(),
            model_responses_endpoint: default_model_responses_endpoint(),
            auth_token_expiration_days: default_auth_token_expiration_days(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
            editor_version: default_editor_version(),
            editor_plugin_version: default_editor_plugin_version(),
            default_model: default_model(),
        }
    }
}

impl Config {
    /// Parses configuration from a YAML string, merged with defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the YAML is invalid or extraction fails.
    #[allow(clippy::result_large_err)]
    pub fn from_yaml(yaml: &str) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Format as _, Serialized, Yaml},
        };
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::string(yaml))
            .extract()
    }

    /// Loads configuration: defaults, then `path` (if given), then
    /// `COPILINK_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the file cannot be read or parsed, or
    /// an environment override has the wrong type.
    #[allow(clippy::result_large_err)]
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Env, Format as _, Serialized, Yaml},
        };
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX)).extract()
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_YAML: &str = r#"
client_id: "Iv1.custom"
auth_token_expiration_days: 7
chat_completions_endpoint: "https://copilot.example.test/chat/completions"
"#;

    #[test]
    fn test_default_config() {
        let c = Config::default();
        assert_eq!(c.client_id, "Iv1.b507a08c87ecfe98");
        assert_eq!(c.auth_token_expiration_days, 90);
        assert_eq!(c.request_timeout(), Duration::from_secs(30));
        assert_eq!(c.api_key_url, "https://api.github.com/copilot_internal/v2/token");
    }

    #[test]
    fn test_from_yaml_overrides() {
        let c = Config::from_yaml(SAMPLE_YAML).unwrap();
        assert_eq!(c.client_id, "Iv1.custom");
        assert_eq!(c.auth_token_expiration_days, 7);
        assert_eq!(
            c.chat_completions_endpoint,
            "https://copilot.example.test/chat/completions"
        );
    }

    #[test]
    fn test_from_yaml_defaults_applied() {
        let c = Config::from_yaml("request_timeout_secs: 5").unwrap();
        assert_eq!(c.request_timeout_secs, 5);
        assert_eq!(c.device_code_url, "https://github.com/login/device/code");
    }

    #[test]
    fn test_from_yaml_wrong_type() {
        assert!(Config::from_yaml("auth_token_expiration_days: soon").is_err());
    }

    #[test]
    fn test_load_file_then_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("copilink.yaml", "default_model: gpt-4.1\nclient_id: from-file\n")?;
            jail.set_env("COPILINK_CLIENT_ID", "from-env");
            let c = Config::load(Some(Path::new("copilink.yaml")))?;
            assert_eq!(c.default_model, "gpt-4.1");
            assert_eq!(c.client_id, "from-env");
            Ok(())
        });
    }

    #[test]
    fn test_load_without_file() {
        figment::Jail::expect_with(|_jail| {
            let c = Config::load(None)?;
            assert_eq!(c, Config::default());
            Ok(())
        });
    }
}
