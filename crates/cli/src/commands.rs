//! CLI commands

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use hbank_core::{FileStore, StateDir};
use hbank_http::router::{Navigation, RouteGuard, RouteTable};
use hbank_http::{HbankClient, LockManager, Session};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::ClientSettings;

#[derive(Subcommand)]
pub enum Commands {
    /// Show the server configuration published at /status
    Status,

    /// Print the logged-in user id, refreshing the session if needed
    Whoami,

    /// Print the login page URL
    Login {
        /// Client path to return to after logging in
        #[arg(long, default_value = "/dashboard")]
        redirect: String,
    },

    /// Log out and clear the local session
    Logout,

    /// Check what navigating to a client path would do
    Route {
        /// Path including an optional query, e.g. /group/4/transfer?to=2
        path: String,
    },

    /// Manage the settings file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the default settings as TOML
    Init {
        /// Output file path (defaults to the state directory's hbank.toml)
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    pub async fn execute(self, state_dir: StateDir, config_path: PathBuf) -> Result<()> {
        match self {
            Self::Config { command } => command.execute(&config_path),
            command => {
                let settings = ClientSettings::load(Some(&config_path))?;
                let session = open_session(&settings, &state_dir)?;
                command.run(&settings, &session).await
            }
        }
    }

    async fn run(self, settings: &ClientSettings, session: &Session) -> Result<()> {
        match self {
            Self::Status => show_status(session).await,
            Self::Whoami => whoami(session).await,
            Self::Login { redirect } => {
                println!("{}", session.client().login_url(&redirect));
                Ok(())
            }
            Self::Logout => {
                session.logout().await;
                println!("Logged out");
                Ok(())
            }
            Self::Route { path } => {
                let guard = RouteGuard::new(RouteTable::hbank())
                    .with_default_authenticated_route(&settings.default_authenticated_route);
                check_route(&guard, session, &path).await;
                Ok(())
            }
            Self::Config { .. } => bail!("config commands run without a session"),
        }
    }
}

impl ConfigCommands {
    pub fn execute(self, default_path: &Path) -> Result<()> {
        match self {
            Self::Init { output, force } => {
                let path = output.unwrap_or_else(|| default_path.to_path_buf());
                if path.exists() && !force {
                    bail!("{} already exists (use --force to overwrite)", path.display());
                }

                ClientSettings::default().save(&path)?;
                println!("Generated configuration at: {}", path.display());
                Ok(())
            }
        }
    }
}

/// Session backed by files in the state directory
///
/// Cookies are read once here. Afterwards they are only reloaded and saved
/// by refresh and logout while the `token_refresh` lock in the data
/// directory is held, so concurrent invocations never overwrite each
/// other's cookies or rotate the refresh token twice.
fn open_session(settings: &ClientSettings, state_dir: &StateDir) -> Result<Session> {
    state_dir
        .create_directories()
        .context("Failed to create state directories")?;

    let cookies_path = state_dir.cookies_path();
    let mut builder = HbankClient::builder()
        .base_url(&settings.api.base_url)
        .cookie_file(&cookies_path);
    if let Some(timeout) = settings.api.timeout() {
        builder = builder.timeout(timeout);
    }
    if let Some(agent) = &settings.api.user_agent {
        builder = builder.user_agent(agent);
    }
    let client = builder.build()?;
    client
        .cookies()
        .reload()
        .with_context(|| format!("Failed to load cookies from {}", cookies_path.display()))?;
    info!(base_url = client.base_url(), "Using H-Bank API");

    let store = Arc::new(FileStore::open(state_dir.local_storage_path()));
    let locks = LockManager::with_lock_dir(state_dir.data_dir());
    Ok(Session::new(client, store, locks))
}

async fn show_status(session: &Session) -> Result<()> {
    let config = session.config().await;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

async fn whoami(session: &Session) -> Result<()> {
    let user_id = session.resolve().await;
    if user_id.is_empty() {
        bail!("Not logged in");
    }

    println!("{user_id}");
    if let Some(exp) = session.state().token_expiry
        && let Some(expiry) = chrono::DateTime::from_timestamp(exp, 0)
    {
        println!("Token expires at {}", expiry.to_rfc3339());
    }
    Ok(())
}

async fn check_route(guard: &RouteGuard, session: &Session, path: &str) {
    match guard.before_each(session, path).await {
        Navigation::Proceed { page_title } => match page_title {
            Some(title) => println!("proceed (title: {title})"),
            None => println!("proceed"),
        },
        Navigation::Redirect(target) => println!("redirect {target}"),
        Navigation::ExternalRedirect(url) => println!("login {url}"),
    }
}
