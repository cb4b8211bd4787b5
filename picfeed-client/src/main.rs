use std::io::Write;

use anyhow::Result;
use clap::Parser;
use picfeed::api::{ApiClient, Transport};
use picfeed::app::handlers::{self, Command};
use picfeed::app::{FeedSession, NoticeLevel};
use picfeed::config::ConfigManager;
use picfeed::logging::{self, LogConfig};
use picfeed::server_config::ServerConfigManager;
use picfeed::FeedError;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Picfeed - browse, like and comment on a picture feed from the terminal
#[derive(Parser)]
#[command(name = "picfeed")]
#[command(about = "A line-oriented client for the picfeed server")]
#[command(version)]
struct Cli {
    /// Server URL to connect to
    #[arg(long, short)]
    server: Option<String>,

    /// Remember the --server URL for next time
    #[arg(long, requires = "server")]
    save_server: bool,

    /// Enable verbose logging
    #[arg(long, short)]
    verbose: bool,

    /// Author name for new posts, comments and replies
    #[arg(long)]
    username: Option<String>,

    /// Author avatar URL
    #[arg(long)]
    avatar: Option<String>,
}

fn load_env() {
    // Load from the working directory .env file, if any
    let _ = dotenv::dotenv();
}

fn print_notices<T: Transport>(session: &mut FeedSession<T>) {
    for notice in session.take_notices() {
        match notice.level {
            NoticeLevel::Error => eprintln!("! {}", notice.message),
            NoticeLevel::Info => println!("* {}", notice.message),
        }
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    load_env();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    logging::init_logging(&log_config)?;

    let config_manager = ConfigManager::new()?;
    let mut profile = config_manager.load_or_default()?.profile;
    if let Some(username) = cli.username {
        profile.username = username;
    }
    if let Some(avatar) = cli.avatar {
        profile.avatar_url = avatar;
    }

    // CLI args > environment > config file > default
    let server_config_manager = ServerConfigManager::new(config_manager);
    let server_url = server_config_manager.determine_server_url(cli.server.clone())?;
    if cli.save_server {
        server_config_manager.save_server_url(server_url.clone())?;
        log::info!("Saved server URL {}", server_url);
    }
    println!(
        "Connected to {} ({}) as @{}",
        server_url,
        server_config_manager.get_server_description(&server_url),
        profile.username
    );

    let mut session =
        FeedSession::new(ApiClient::new(server_url), profile).with_log_config(log_config);

    match session.load_posts().await {
        Ok(()) => println!("{}", handlers::render_feed(&session)),
        Err(e) => log::warn!("Initial load failed: {}", e),
    }
    print_notices(&mut session);
    println!("Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    while let Some(line) = lines.next_line().await? {
        match handlers::parse_command(&line) {
            Ok(None) => {}
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => match handlers::handle_command(&mut session, command).await {
                Ok(Some(output)) => println!("{}", output),
                Ok(None) => {}
                // Already reported through a notice
                Err(FeedError::Transport(_)) => {}
                Err(e) => eprintln!("! {}", e),
            },
            Err(e) => eprintln!("! {}", e),
        }
        print_notices(&mut session);
        prompt();
    }

    log::info!("Session ended");
    Ok(())
}
