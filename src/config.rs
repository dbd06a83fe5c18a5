use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::gateway::GatewaySettings;
use crate::navigation::RouteTable;

/// File picked up from the working directory when no config file is given.
pub const DEFAULT_CONFIG_FILE: &str = "portal.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Base URL of the portal backend
    #[arg(long, env = "API_BASE_URL")]
    pub base_url: Option<String>,

    /// Where the session credential is persisted
    #[arg(long, env = "PORTAL_STORE_PATH")]
    pub store_path: Option<String>,

    /// Role required by protected calls ("none" disables the local check)
    #[arg(long, env = "PORTAL_REQUIRED_ROLE")]
    pub required_role: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Log in and persist the session
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "PORTAL_PASSWORD")]
        password: String,
    },
    /// Clear the persisted session
    Logout,
    /// Show the current session and decoded claims
    Status,
    /// Authenticated GET of an arbitrary API path
    Get { path: String },
    /// List published notices
    Notices,
    /// List water schedules, optionally for one day (YYYY-MM-DD)
    Schedules {
        #[arg(long)]
        date: Option<String>,
    },
    /// List incident reports
    Reports,
    /// List neighborhoods, optionally only those in one block
    Neighborhoods {
        #[arg(long)]
        block: Option<String>,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub routes: RouteTable,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub login_path: String,
    pub refresh_path: String,
    pub request_timeout_secs: u64,
    /// 0 disables the refresh deadline.
    pub refresh_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub store_path: String,
    pub required_role: Option<String>,
    pub role_claim: String,
}

impl AppConfig {
    pub fn load() -> Result<(Cli, Self), config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<(Cli, Self), config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        let config = Self::from_cli(&cli)?;
        Ok((cli, config))
    }

    /// Layering: defaults < config file < `PORTAL_` env < CLI flags (and their env aliases).
    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let defaults = GatewaySettings::default();
        let routes = RouteTable::default();

        let mut builder = Config::builder()
            .set_default("api.base_url", "http://localhost:5000/api")?
            .set_default("api.login_path", defaults.login_path)?
            .set_default("api.refresh_path", defaults.refresh_path)?
            .set_default("api.request_timeout_secs", 30)?
            .set_default("api.refresh_timeout_secs", 30)?
            .set_default("session.store_path", default_store_path())?
            .set_default("session.required_role", defaults.required_role)?
            .set_default("session.role_claim", defaults.role_claim)?
            .set_default("routes.login", routes.login)?
            .set_default("routes.unauthorized", routes.unauthorized)?;

        match &cli.config {
            Some(path) => builder = builder.add_source(File::with_name(path)),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE));
            }
            None => {}
        }

        // E.g. PORTAL_API__BASE_URL=https://portal.example/api
        builder = builder.add_source(
            Environment::with_prefix("PORTAL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(url) = &cli.base_url {
            builder = builder.set_override("api.base_url", url.as_str())?;
        }
        if let Some(path) = &cli.store_path {
            builder = builder.set_override("session.store_path", path.as_str())?;
        }
        if let Some(role) = &cli.required_role {
            let role = (!role.eq_ignore_ascii_case("none")).then_some(role.as_str());
            builder = builder.set_override("session.required_role", role)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Gateway settings derived from this configuration.
    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            login_path: self.api.login_path.clone(),
            refresh_path: self.api.refresh_path.clone(),
            required_role: self
                .session
                .required_role
                .clone()
                .filter(|role| !role.trim().is_empty()),
            role_claim: self.session.role_claim.clone(),
            refresh_timeout: non_zero_secs(self.api.refresh_timeout_secs),
            request_timeout: non_zero_secs(self.api.request_timeout_secs),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        PathBuf::from(&self.session.store_path)
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn default_store_path() -> String {
    std::env::var("HOME")
        .map(|home| format!("{home}/.water-portal/session.json"))
        .unwrap_or_else(|_| ".water-portal/session.json".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subcommand_parsing() {
        let cli = Cli::try_parse_from([
            "water-portal",
            "--base-url",
            "http://api.test",
            "login",
            "-u",
            "admin",
            "-p",
            "secret",
        ])
        .unwrap();

        assert_eq!(cli.base_url.as_deref(), Some("http://api.test"));
        assert_eq!(
            cli.command,
            Some(Command::Login {
                username: "admin".into(),
                password: "secret".into()
            })
        );
    }

    #[test]
    fn test_non_zero_secs() {
        assert_eq!(non_zero_secs(0), None);
        assert_eq!(non_zero_secs(5), Some(Duration::from_secs(5)));
    }
}
