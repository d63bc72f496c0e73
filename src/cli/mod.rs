use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Base URL of the chatBot server (e.g., http://127.0.0.1:8000)
    #[arg(long, env = "CHATBOT_SERVER_URL", default_value = "http://127.0.0.1:8000")]
    pub server_url: String,

    /// Auth screen to open at startup (choice, register, login)
    #[arg(long, env = "CHATBOT_SCREEN", default_value = "choice")]
    pub screen: String,

    /// Refresh the open conversation every N seconds. 0 disables polling.
    #[arg(long, env = "CHATBOT_POLL_INTERVAL", default_value = "0")]
    pub poll_interval: u64,

    /// Log file path. The TUI owns the terminal, so logs never go to stderr.
    #[arg(long, env = "CHATBOT_LOG_FILE", default_value = "chatbot-tui.log")]
    pub log_file: String,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}
