//! `otp`: command line client for the phone OTP identity server.
//!
//! Drives the client-held half of login and signup: precheck, code entry,
//! the code-for-assertion exchange with the provider, and local session
//! storage.

mod api;
mod cmd;
mod context;
mod session_file;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;

use crate::context::{AppContext, CliConfig};

#[derive(Parser)]
#[command(name = "otp", about = "Phone OTP login client", version)]
struct Cli {
    /// Suppress informational output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Identity server URL (overrides OTP_SERVER_URL)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in with a one-time code
    Login {
        /// Phone number; prompted for when omitted
        #[arg(long)]
        phone: Option<String>,
    },
    /// Create an account, then log in
    Signup {
        #[arg(long)]
        phone: Option<String>,
    },
    /// Show the claims of the stored session
    Whoami,
    /// Revoke the stored session
    Logout,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{} {e:#}", style("error:").red().bold());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = CliConfig::from_env();
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    let ctx = AppContext::new(config, cli.quiet)?;

    match cli.command {
        Command::Login { phone } => cmd::login::run(&ctx, phone).await,
        Command::Signup { phone } => cmd::signup::run(&ctx, phone).await,
        Command::Whoami => cmd::whoami::run(&ctx).await,
        Command::Logout => cmd::logout::run(&ctx).await,
    }
}
