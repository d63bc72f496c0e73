use chatbot_tui::cli::Args;
use chatbot_tui::run;
use clap::Parser;
use dotenv::dotenv;
use std::error::Error;
use std::fs::OpenOptions;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    let args = Args::parse();

    // stderr is unusable once the alternate screen is up, so logging goes
    // to a file.
    let log_file = OpenOptions::new().create(true).append(true).open(&args.log_file)?;
    let default_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder
        ::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    run(args).await?;

    Ok(())
}
