//! Water Portal command-line client
//!
//! Drives the session gateway against a live portal backend.

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::map_err_ignore)]
#![allow(clippy::manual_let_else)]

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use water_portal_gateway::api::PortalClient;
use water_portal_gateway::config::{AppConfig, Command};
use water_portal_gateway::gateway::{ApiRequest, SessionGateway};
use water_portal_gateway::navigation::TracingNavigator;
use water_portal_gateway::session::FileStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    // Initialize tracing (M-LOG-STRUCTURED). Logs go to stderr; stdout carries results.
    let filter_layer = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,water_portal_gateway=debug"));
    let registry = tracing_subscriber::registry().with(filter_layer);
    if std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    let (cli, config) = AppConfig::load().context("failed to load configuration")?;

    info!(
        name: "portal.config.loaded",
        base_url = %config.api.base_url,
        store_path = %config.session.store_path,
        required_role = ?config.session.required_role,
        "Configuration loaded"
    );

    let gateway = SessionGateway::builder(config.api.base_url.clone())
        .settings(config.gateway_settings())
        .storage(Arc::new(FileStorage::new(config.store_path())))
        .navigator(Arc::new(TracingNavigator::new(config.routes.clone())))
        .build()
        .await
        .context("failed to initialize gateway")?;
    let client = PortalClient::new(gateway.clone());

    match cli.command.unwrap_or(Command::Status) {
        Command::Login { username, password } => {
            let credential = gateway.login(&username, &password).await?;
            println!(
                "Logged in as {username}; roles: {}; expires {}",
                credential.roles.iter().cloned().collect::<Vec<_>>().join(", "),
                credential.expires_at
            );
        }
        Command::Logout => {
            gateway.logout().await?;
            println!("Logged out");
        }
        Command::Status => match gateway.session().await? {
            Some(credential) => {
                println!("Session expires {}", credential.expires_at);
                println!(
                    "Roles: {}",
                    credential.roles.iter().cloned().collect::<Vec<_>>().join(", ")
                );
                match gateway.claims().await {
                    Ok(Some(claims)) => {
                        if let Some(subject) = claims.subject {
                            println!("Subject: {subject}");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("Token claims unreadable: {e}"),
                }
            }
            None => println!("Not logged in"),
        },
        Command::Get { path } => {
            let body: serde_json::Value = gateway.send_json(ApiRequest::get(path)).await?;
            print_json(&body)?;
        }
        Command::Notices => print_json(&client.notices().list().await?)?,
        Command::Schedules { date } => {
            let schedules = match date {
                Some(date) => client.schedules().on_date(&date).await?,
                None => client.schedules().list().await?,
            };
            print_json(&schedules)?;
        }
        Command::Reports => print_json(&client.reports().list().await?)?,
        Command::Neighborhoods { block } => {
            let neighborhoods = match block {
                Some(block) => client.neighborhoods().in_block(&block).await?,
                None => client.neighborhoods().list().await?,
            };
            print_json(&neighborhoods)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
