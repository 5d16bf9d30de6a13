//! gauth - enrollment and verification CLI for Google Authenticator
//! compatible secret files

use anyhow::Result;
use clap::{Parser, Subcommand};

mod common;
mod init;
mod verify;

#[derive(Parser)]
#[command(name = "gauth")]
#[command(about = "Google Authenticator compatible two-factor authentication", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new secret file with scratch codes and an otpauth URI
    Init(init::InitArgs),

    /// Verify a code against the secret file, updating its state
    Verify(verify::VerifyArgs),
}

fn main() -> Result<()> {
    gauth_pam::logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init(args) => init::run(args),
        Commands::Verify(args) => verify::run(args),
    }
}
