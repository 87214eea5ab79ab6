use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tgrelay::auth::{self, AuthStore};
use tgrelay::cli;
use tgrelay::config::Config;
use tgrelay::logging;

#[derive(Parser)]
#[command(name = "tgrelay", version, about = "Telegram webhook relay 📡")]
struct Cli {
    /// Config file (default: ~/.config/tgrelay/config.toml). Credentials are
    /// read from credentials.toml in the same directory.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the webhook endpoint
    Serve,
    /// Register the webhook URL with Telegram
    SetWebhook {
        /// Full HTTPS URL (default: telegram.public_url + server.webhook_path)
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Remove the registered webhook
    DeleteWebhook,
    /// Show what Telegram knows about the webhook
    WebhookInfo,
    /// Show credential status
    Auth,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Init logging
    if let Err(e) = logging::init(&config.logging.level, config.logging.file.as_deref()) {
        eprintln!("logging disabled: {e:#}");
    }

    // An explicit config keeps its credentials.toml alongside it
    let auth = match cli.config {
        Some(ref path) => AuthStore::load_beside(path)?,
        None => AuthStore::load()?,
    };

    match cli.command {
        Some(Commands::Serve) | None => cli::serve::run(&config, &auth).await,
        Some(Commands::SetWebhook { url }) => cli::webhook::set(&config, &auth, url.as_deref()).await,
        Some(Commands::DeleteWebhook) => cli::webhook::delete(&auth).await,
        Some(Commands::WebhookInfo) => cli::webhook::info(&auth).await,
        Some(Commands::Auth) => {
            match auth.telegram_bot_token() {
                Some(token) => println!("Telegram bot token: {}", auth::mask(&token)),
                None => println!("Telegram bot token: not configured"),
            }
            match auth.webhook_secret() {
                Some(_) => println!("Webhook secret: configured"),
                None => println!("Webhook secret: not configured"),
            }
            Ok(())
        }
    }
}
