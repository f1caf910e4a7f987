use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cidvault",
    about = "CidVault: encrypted files, content-addressed storage, ledger-indexed",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file; CIDVAULT_* variables override its values
    #[arg(short, long, global = true, env = "CIDVAULT_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Connect to the wallet and show the selected account and network
    Whoami,
    /// Encrypt a file, pin it, and register its CID
    Publish(PublishArgs),
    /// List documents registered by an account
    List(ListArgs),
    /// Download the stored envelope for a CID without decrypting it
    Fetch(FetchArgs),
    /// Download and decrypt a document
    Download(DownloadArgs),
    /// Re-list documents whenever the wallet switches account or network
    Watch(ListArgs),
    /// Show the resolved configuration
    Config,
}

#[derive(Args)]
pub struct PublishArgs {
    pub path: PathBuf,
    /// Name recorded with the pinned blob (defaults to the file name)
    #[arg(short, long)]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    /// Owner to list (defaults to the wallet's selected account)
    #[arg(short, long)]
    pub account: Option<String>,
}

#[derive(Args)]
pub struct FetchArgs {
    pub cid: String,
    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct DownloadArgs {
    pub cid: String,
    /// Destination path (defaults to the document's display name)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
