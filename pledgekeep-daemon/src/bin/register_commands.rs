//! Registers the global slash command set with Discord.
//!
//! Run once after deploying or whenever the command definitions change:
//!
//! ```bash
//! register-commands --token <bot token>
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use serenity::http::Http;
use serenity::model::application::Command;

use pledgekeep_daemon::commands;

#[derive(Parser)]
#[command(name = "register-commands")]
#[command(about = "Register pledgekeep's global slash commands with Discord")]
struct Args {
    /// Bot token of the Discord application
    #[arg(long)]
    token: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let http = Http::new(&args.token);
    let application = http
        .get_current_application_info()
        .await
        .context("Failed to fetch the application info for this token")?;
    http.set_application_id(application.id);

    Command::set_global_commands(&http, commands::create_commands())
        .await
        .context("Failed to register the command set")?;

    println!("Commands created successfully");

    Ok(())
}
