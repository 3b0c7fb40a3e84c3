//! ---
//! nodeiam_section: "05-networking-external-interfaces"
//! nodeiam_subsection: "binary"
//! nodeiam_type: "source"
//! nodeiam_scope: "code"
//! nodeiam_description: "Control CLI for planning node instance roles."
//! nodeiam_version: "v0.0.0-prealpha"
//! nodeiam_owner: "tbd"
//! ---
use anyhow::Result;
use clap::{Parser, Subcommand};
use nodeiam_common::{init_tracing, LoggingConfig};
use nodeiam_core::normalize_arn;

mod plan;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Node IAM role planning utility",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Assemble the node instance role and print the resulting template.
    Plan(plan::PlanCommand),
    /// Print the resolved managed policy ARNs, one per line.
    ManagedPolicies(plan::RequestOptions),
    /// Strip intermediate path segments from an ARN.
    NormalizeArn {
        /// ARN to normalise.
        arn: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Plan(cmd) => plan::run_plan(cmd)?,
        Commands::ManagedPolicies(options) => plan::run_managed_policies(options)?,
        Commands::NormalizeArn { arn } => {
            init_tracing(env!("CARGO_PKG_NAME"), &LoggingConfig::default())?;
            println!("{}", normalize_arn(&arn));
        }
    }
    Ok(())
}
