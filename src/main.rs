use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use copilink_auth::{DeviceAuthController, LoginOutcome, RquestTransport};
use copilink_config::Config;
use copilink_provider::{ChatClient, ClassifiedResponse};
use copilink_store::{CachedCredentialStore, SqliteCacheBackend, TokenCache};
use copilink_types::{ChatOutput, ChatRequest, HttpTransport, StreamItem, SystemClock};
use futures_util::StreamExt as _;
use std::{
    io::Write as _,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

#[derive(Parser, Debug)]
#[command(name = "copilink", about = "copilink: GitHub Copilot device login and chat client")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    /// SQLite database path (default: ~/.copilink/credentials.db).
    #[arg(long, value_name = "PATH", global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authorize this device with GitHub Copilot.
    Auth {
        /// Give up after this many seconds.
        #[arg(short, long, default_value_t = 300)]
        timeout: u64,
        /// Skip the flow when a usable token is already stored.
        #[arg(short, long)]
        check_existing: bool,
    },
    /// Show whether an API token can be obtained.
    Status,
    /// Remove stored credentials.
    Logout,
    /// Send a single prompt.
    Chat {
        prompt: String,
        /// Model name (default from configuration).
        #[arg(short, long)]
        model: Option<String>,
        /// Print the answer as it streams in.
        #[arg(long)]
        stream: bool,
    },
}

struct App {
    config: Arc<Config>,
    http: Arc<dyn HttpTransport>,
    auth: Arc<DeviceAuthController>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("copilink=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = build_app(cli.config.as_deref(), cli.db).await?;

    match cli.command {
        Commands::Auth {
            timeout,
            check_existing,
        } => cmd_auth(&app, Duration::from_secs(timeout), check_existing).await,
        Commands::Status => cmd_status(&app).await,
        Commands::Logout => cmd_logout(&app).await,
        Commands::Chat {
            prompt,
            model,
            stream,
        } => cmd_chat(&app, prompt, model, stream).await,
    }
}

async fn build_app(config_path: Option<&Path>, db: Option<PathBuf>) -> Result<App> {
    let config =
        Arc::new(Config::load(config_path).map_err(|e| anyhow::anyhow!("config error: {e}"))?);
    let clock = Arc::new(SystemClock);
    let backend = Arc::new(open_backend(db).await?);
    let cache = TokenCache::new(backend, clock.clone(), config.auth_token_expiration_days);
    let store = Arc::new(CachedCredentialStore::new(cache));
    let http: Arc<dyn HttpTransport> = Arc::new(RquestTransport::default());
    let auth = Arc::new(DeviceAuthController::new(
        config.clone(),
        http.clone(),
        store,
        clock,
    ));
    Ok(App { config, http, auth })
}

async fn cmd_auth(app: &App, timeout: Duration, check_existing: bool) -> Result<()> {
    if check_existing && app.auth.is_authenticated().await {
        match app.auth.get_access_token().await {
            Ok(Some(_)) => {
                eprintln!("Already authenticated with GitHub Copilot.");
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "stored credentials unusable; re-authenticating"),
        }
    }

    let outcome = copilink_auth::login(&app.auth, timeout, |device| {
        eprintln!("Visit: {}", device.verification_uri);
        eprintln!("Enter verification code: {}", device.user_code);
        if let Err(e) = open::that(&device.verification_uri) {
            tracing::debug!(error = %e, "could not open browser");
        }
    })
    .await
    .map_err(|e| anyhow::anyhow!("authentication failed: {e}"))?;

    match outcome {
        LoginOutcome::Authorized(token) => {
            eprintln!(
                "GitHub Copilot authentication successful (token {})",
                preview(&token)
            );
            Ok(())
        }
        LoginOutcome::Failed => bail!("GitHub rejected the device authorization"),
        LoginOutcome::TimedOut => bail!("timed out waiting for device authorization"),
    }
}

async fn cmd_status(app: &App) -> Result<()> {
    if !app.auth.is_authenticated().await {
        println!("copilot: not authenticated");
        return Ok(());
    }
    match app.auth.get_access_token().await {
        Ok(Some(token)) => println!("copilot: authenticated (token {})", preview(&token)),
        Ok(None) => println!("copilot: not authenticated"),
        Err(e) => println!("copilot: authenticated, but token refresh failed: {e}"),
    }
    Ok(())
}

async fn cmd_logout(app: &App) -> Result<()> {
    if !app.auth.is_authenticated().await {
        eprintln!("copilot: already logged out");
        return Ok(());
    }
    app.auth
        .remove_tokens()
        .await
        .map_err(|e| anyhow::anyhow!("logout failed: {e}"))?;
    eprintln!("copilot logged out");
    Ok(())
}

async fn cmd_chat(app: &App, prompt: String, model: Option<String>, stream: bool) -> Result<()> {
    let client = ChatClient::new(app.config.clone(), app.auth.clone(), app.http.clone());
    let model = model.unwrap_or_else(|| app.config.default_model.clone());
    let request = ChatRequest::user(model, prompt).streaming(stream);

    match client.send(request).await? {
        ClassifiedResponse::Complete(result) => print_output(&result.output)?,
        ClassifiedResponse::Stream(mut items) => {
            let mut stdout = std::io::stdout();
            while let Some(item) = items.next().await {
                match item? {
                    StreamItem::Text(text) => {
                        write!(stdout, "{text}")?;
                        stdout.flush()?;
                    }
                    StreamItem::ToolCalls(calls) => {
                        writeln!(stdout)?;
                        println!("{}", serde_json::to_string_pretty(&calls)?);
                    }
                }
            }
            writeln!(stdout)?;
        }
    }
    Ok(())
}

fn print_output(output: &ChatOutput) -> Result<()> {
    match output {
        ChatOutput::Text(text) => println!("{text}"),
        ChatOutput::ToolCalls(calls) => println!("{}", serde_json::to_string_pretty(calls)?),
        ChatOutput::Choices(choices) => {
            for (i, choice) in choices.iter().enumerate() {
                println!("── choice {i} ──");
                print_output(choice)?;
            }
        }
    }
    Ok(())
}

/// First characters of a token, for display.
fn preview(token: &str) -> String {
    let head: String = token.chars().take(8).collect();
    format!("{head}…")
}

async fn open_backend(db: Option<PathBuf>) -> Result<SqliteCacheBackend> {
    let path = db.unwrap_or_else(default_db_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let url = format!("sqlite://{}", path.display());
    SqliteCacheBackend::new(&url)
        .await
        .map_err(|e| anyhow::anyhow!("database error: {e}"))
}

fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".copilink").join("credentials.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("tid=abcdefghijkl"), "tid=abcd…");
        assert_eq!(preview("ab"), "ab…");
    }

    #[test]
    fn test_cli_parses_chat() {
        let cli = Cli::parse_from(["copilink", "--db", "/tmp/x.db", "chat", "hello", "--stream"]);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
        assert!(matches!(
            cli.command,
            Commands::Chat { ref prompt, stream: true, model: None } if prompt == "hello"
        ));
    }

    #[test]
    fn test_cli_auth_defaults() {
        let cli = Cli::parse_from(["copilink", "auth"]);
        assert!(matches!(
            cli.command,
            Commands::Auth {
                timeout: 300,
                check_existing: false
            }
        ));
    }

    #[test]
    fn test_cli_auth_short_flags() {
        let cli = Cli::parse_from(["copilink", "auth", "-t", "60", "-c", "--config", "c.yaml"]);
        assert_eq!(cli.config, Some(PathBuf::from("c.yaml")));
        assert!(matches!(
            cli.command,
            Commands::Auth {
                timeout: 60,
                check_existing: true
            }
        ));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory as _;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_db_path() {
        assert!(default_db_path().ends_with(".copilink/credentials.db"));
    }
}
