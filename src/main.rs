use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use licitai::auth::{AuthError, AuthService};
use licitai::bootstrap::bootstrap;
use licitai::client::{ApiClient, ApiError};
use licitai::config::{ClientConfig, ConfigError, ServerConfig};
use licitai::context::SessionContext;
use licitai::guard::{self, GuardDecision, Requirement};
use licitai::server::{self, ServerState, accounts::Directory};
use licitai::store::FileTokenStore;
use licitai::token::fingerprint;
use licitai::types::{Credentials, Registration};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{}", .0.user_message())]
    Api(#[from] ApiError),
    #[error("{0}")]
    Auth(#[from] AuthError),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database check failed: {0}")]
    Db(#[from] sqlx::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("health check failed: HTTP {0}")]
    Unhealthy(u16),
    #[error("access check failed: {0:?}")]
    Denied(GuardDecision),
}

#[derive(Parser, Debug)]
#[command(name = "licitai", about = "Licitai authentication session CLI")]
struct Cli {
    /// Authentication API base URL (overrides the configured default).
    #[arg(long, env = "LICITAI_API_URL")]
    base_url: Option<String>,

    /// File holding the persisted token.
    #[arg(long, env = "LICITAI_TOKEN_FILE")]
    token_file: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the development authentication API.
    Serve,
    /// Check the API health endpoint.
    Ping,
    Login {
        email: String,
        #[arg(long, env = "LICITAI_PASSWORD")]
        password: String,
    },
    Register {
        #[arg(long)]
        nome: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "LICITAI_PASSWORD")]
        password: String,
        #[arg(long)]
        razao_social: String,
        #[arg(long)]
        cnpj: Option<String>,
    },
    /// Show the restored session.
    Whoami,
    Refresh,
    Logout,
    /// Evaluate a route guard against the restored session.
    Can {
        #[arg(long, conflicts_with = "role")]
        permission: Option<String>,
        #[arg(long)]
        role: Vec<String>,
    },
    /// Authenticated GET of an API path, printing the JSON body.
    Get { path: String },
    DbCheck {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve => run_serve().await,
        Command::DbCheck { database_url } => run_db_check(&database_url).await,
        command => {
            let mut config = ClientConfig::from_env()?;
            if let Some(base_url) = cli.base_url {
                config.api_url = base_url.trim_end_matches('/').to_owned();
            }
            if let Some(token_file) = cli.token_file {
                config.token_file = token_file;
            }
            run_client(&config, command).await
        }
    }
}

async fn run_serve() -> Result<(), CliError> {
    let config = ServerConfig::from_env()?;
    let state = ServerState::new(&config, Directory::with_demo_accounts())?;
    server::serve(&config, state).await?;
    Ok(())
}

async fn run_db_check(database_url: &str) -> Result<(), CliError> {
    let version = licitai::db::check_connection(database_url).await?;
    println!("{version}");
    Ok(())
}

async fn run_client(config: &ClientConfig, command: Command) -> Result<(), CliError> {
    let store = Arc::new(FileTokenStore::new(config.token_file.clone()));
    let ctx = SessionContext::with_admin_role(store, config.admin_role.clone());
    let api = ApiClient::new(config, ctx.clone())?;

    if matches!(command, Command::Ping) {
        return run_ping(config).await;
    }

    let outcome = bootstrap(&ctx, &api).await;
    tracing::debug!(?outcome, "session bootstrapped");
    let service = AuthService::new(ctx.clone(), Arc::new(api.clone()));

    match command {
        Command::Login { email, password } => {
            let user = service.login(&Credentials { email, password }).await?;
            print_json(&serde_json::to_value(user)?)
        }
        Command::Register { nome, email, password, razao_social, cnpj } => {
            let registration = Registration { nome, email, password, razao_social, cnpj };
            let user = service.register(&registration).await?;
            print_json(&serde_json::to_value(user)?)
        }
        Command::Whoami => {
            if guard::should_redirect_unauth(&ctx.snapshot()) {
                eprintln!("not signed in; run `licitai login` ({})", guard::LOGIN_PATH);
            }
            print_json(&describe_session(&ctx))
        }
        Command::Refresh => {
            service.refresh().await?;
            eprintln!("token refreshed");
            Ok(())
        }
        Command::Logout => {
            service.logout();
            eprintln!("logged out");
            Ok(())
        }
        Command::Can { permission, role } => {
            let requirement = match (permission, role) {
                (Some(capability), _) => Requirement::Permission(capability),
                (None, roles) if !roles.is_empty() => Requirement::AnyRole(roles),
                _ => Requirement::Authenticated,
            };
            match guard::decide(&ctx.snapshot(), &requirement, ctx.admin_role()) {
                GuardDecision::Allow => {
                    println!("allow");
                    Ok(())
                }
                GuardDecision::RedirectToLogin => {
                    eprintln!("sign in first: {}", guard::LOGIN_PATH);
                    Err(CliError::Denied(GuardDecision::RedirectToLogin))
                }
                other => Err(CliError::Denied(other)),
            }
        }
        Command::Get { path } => {
            let body: Value = api.get_json(&path).await?;
            print_json(&body)
        }
        Command::Serve | Command::Ping | Command::DbCheck { .. } => Ok(()),
    }
}

async fn run_ping(config: &ClientConfig) -> Result<(), CliError> {
    let url = format!("{}/health", config.api_url);
    let response = reqwest::Client::new().get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::Unhealthy(status.as_u16()));
    }
    println!("ok");
    Ok(())
}

fn describe_session(ctx: &SessionContext) -> Value {
    let session = ctx.snapshot();
    json!({
        "status": session.status(),
        "user": session.user(),
        "organization": session.organization(),
        "permissions": session.permissions(),
        "token": session.token().map(fingerprint),
    })
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
