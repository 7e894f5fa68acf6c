// src/main.rs — avatar-studio entry point

use clap::Parser;

use avatar_studio::cli::{Cli, Commands};
use avatar_studio::infra::config::Config;
use avatar_studio::infra::{logger, paths};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Respects AVATAR_STUDIO_LOG / RUST_LOG
    let level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    logger::init_logging(level);

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Falls back to defaults if no config.toml
    let mut config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };
    paths::ensure_dirs().await?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.gateway.bind = bind;
            }
            avatar_studio::api::start_server(&config).await
        }
        Commands::Login { email } => avatar_studio::cli::account::run_login(&config, email).await,
        Commands::Register => avatar_studio::cli::account::run_register(&config).await,
        Commands::Logout => avatar_studio::cli::account::run_logout(),
        Commands::Avatars { pages, select } => {
            avatar_studio::cli::avatars::run_avatars(&config, pages, select).await
        }
        Commands::Session(args) => avatar_studio::cli::session::run_session(&config, args).await,
    }
}
