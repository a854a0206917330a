//! kubegate CLI library

pub mod commands;
pub mod deployment;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// kubegate - authorization broker for multi-cluster workflow servers
#[derive(Parser, Debug)]
#[command(name = "kubegate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authorize one call and print the decision
    Check(commands::CheckArgs),
    /// Print the enabled modes and known clusters
    Describe(commands::DescribeArgs),
}

impl Cli {
    /// Run the selected command, printing its JSON result on stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or the gatekeeper
    /// cannot be built. A refused call is not an error; it exits with status 1.
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        match self.command {
            Commands::Check(args) => {
                let decision = commands::check(&args).await?;
                println!("{}", serde_json::to_string_pretty(&decision)?);
                Ok(if decision.allowed {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                })
            }
            Commands::Describe(args) => {
                let summary = commands::describe(&args).await?;
                println!("{}", serde_json::to_string_pretty(&summary)?);
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}
