use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Send bitcoin from a single private key", long_about = None)]
pub struct Cli {
    /// Configuration file, created with defaults when missing
    #[arg(long, default_value = "bitsend.toml")]
    pub config: PathBuf,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Interactively build, sign and broadcast a payment (default)
    Send,

    /// Generate a fresh key and print its WIF and address
    Keygen {
        /// Network to encode the key for ("bitcoin" or "testnet")
        #[arg(long, default_value = "testnet")]
        network: String,
    },
}

impl Cli {
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Send)
    }
}
