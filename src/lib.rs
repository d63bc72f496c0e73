pub mod api;
pub mod cli;
pub mod models;
pub mod session;
pub mod ui;

use api::http::HttpChatApi;
use api::ChatApi;
use cli::Args;
use log::info;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server URL: {}", args.server_url);
    info!("Start Screen: {}", args.screen);
    info!("Poll Interval: {}s", args.poll_interval);
    info!("Log File: {}", args.log_file);
    info!("-------------------------");

    let api: Arc<dyn ChatApi> = Arc::new(HttpChatApi::new(&args.server_url)?);
    // Fetch the auth page up front: Django hands out the CSRF cookie here,
    // and an unreachable server fails fast instead of inside the TUI.
    api.prime_session().await?;

    ui::run(&args, api).await?;

    Ok(())
}
