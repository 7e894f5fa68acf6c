// src/cli/mod.rs — CLI definition (clap derive)

pub mod account;
pub mod avatars;
pub mod session;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "avatar-studio", about = "Interactive AI avatar sessions", version)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP gateway (document extraction, token minting, login)
    Serve {
        /// Bind address, overrides gateway.bind
        #[arg(long)]
        bind: Option<String>,
    },
    /// Log in and store the auth token
    Login {
        /// Account email (prompted if omitted)
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account
    Register,
    /// Forget the stored auth token
    Logout,
    /// Browse the avatar catalog
    Avatars {
        /// Number of pages of six to show
        #[arg(long, default_value = "1")]
        pages: usize,
        /// Remember this avatar for the next session
        #[arg(long)]
        select: Option<String>,
    },
    /// Start an interactive avatar session
    Session(SessionArgs),
}

#[derive(Args, Clone, Debug)]
pub struct SessionArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Avatar identifier; defaults to the one picked with `avatars --select`
    #[arg(long)]
    pub avatar: Option<String>,

    /// Spoken language code
    #[arg(long)]
    pub language: Option<String>,
}

/// Exactly one knowledge source.
#[derive(Args, Clone, Debug)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Website URL the avatar should know about
    #[arg(long)]
    pub url: Option<String>,
    /// Free-form knowledge text
    #[arg(long)]
    pub text: Option<String>,
    /// PDF to extract knowledge from
    #[arg(long)]
    pub pdf: Option<PathBuf>,
    /// Word document to extract knowledge from
    #[arg(long)]
    pub doc: Option<PathBuf>,
}
