//! CLI command implementations.

use crate::{Mode, ServeArgs};
use asking_core::CardStore;
use asking_notify::{build_notifier, NotifierSettings};
use asking_server::{HostingMode, OriginPolicy, SyncServer, SyncServerConfig};
use colored::Colorize;
use std::time::Duration;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

impl From<Mode> for HostingMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Standalone => HostingMode::Standalone,
            Mode::Container => HostingMode::Container,
        }
    }
}

fn server_config(args: &ServeArgs) -> SyncServerConfig {
    let origins = args
        .allow_origin
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();

    SyncServerConfig::for_mode(args.mode.into(), args.port, args.headless, origins)
}

fn notifier_settings(args: &ServeArgs) -> NotifierSettings {
    NotifierSettings {
        enabled: args.notify,
        webhook_url: args.webhook_url.clone(),
        timeout: Duration::from_secs(args.notify_timeout_secs),
    }
}

/// Start the sync server.
pub async fn serve(args: &ServeArgs) -> Result<()> {
    let config = server_config(args);

    match args.mode {
        Mode::Container => println!("{}", "Starting Asking Card server (container)...".cyan()),
        Mode::Standalone if args.headless => {
            println!("{}", "Starting Asking Card server in headless mode...".cyan())
        }
        Mode::Standalone => println!("{}", "Starting Asking Card server...".cyan()),
    }

    let store = if args.seed {
        CardStore::seeded()
    } else {
        CardStore::new()
    };
    println!("{} Board ready with {} cards", "✓".green(), store.len());

    let notifier = build_notifier(&notifier_settings(args));
    println!("{} Notifications: {}", "✓".green(), notifier.name().cyan());

    println!("{} Listening on ws://{}", "✓".green(), config.addr);
    print_origins(&config.origins);
    println!("  Press {} to stop", "Ctrl+C".cyan());

    let server = SyncServer::with_store(config, store, notifier);
    server.run().await?;

    Ok(())
}

/// Print the effective settings without starting anything.
pub fn config(args: &ServeArgs) -> Result<()> {
    let config = server_config(args);
    let notify = notifier_settings(args);

    println!("{}", "Asking Card configuration".cyan().bold());
    println!("  {:<14} {:?}", "mode", args.mode);
    println!("  {:<14} {}", "bind", config.addr);
    print_origins(&config.origins);
    println!("  {:<14} {}", "seed", args.seed);
    println!(
        "  {:<14} {}",
        "notify",
        if notify.enabled { "on" } else { "off" }
    );
    println!(
        "  {:<14} {}",
        "webhook",
        notify
            .webhook_url
            .as_deref()
            .map(redact_url)
            .unwrap_or_else(|| "(none)".dimmed().to_string())
    );
    println!("  {:<14} {}s", "notify timeout", notify.timeout.as_secs());

    if notify.enabled && notify.webhook_url.is_none() {
        println!(
            "{} notifications are on but no webhook URL is set",
            "⚠".yellow()
        );
    }

    Ok(())
}

fn print_origins(origins: &OriginPolicy) {
    match origins {
        OriginPolicy::Any => println!("  {:<14} {}", "origins", "any".yellow()),
        OriginPolicy::AllowList(list) => println!("  {:<14} {}", "origins", list.join(", ")),
    }
}

/// Webhook URLs carry their secret in the path; keep only the host part.
fn redact_url(url: &str) -> String {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            let host_end = rest.find('/').unwrap_or(rest.len());
            format!("{}/…", &url[..scheme_end + 3 + host_end])
        }
        None => "…".to_string(),
    }
}
