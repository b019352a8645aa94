use clap::{Parser, Subcommand};

use crate::dialect::Dialect;
use crate::error::Result;
use crate::failer::{FailArgs, run_fail};
use crate::pipeline::{AmplifyArgs, run_amplify};

#[derive(Debug, Parser)]
#[command(
    name = "suite_amplifier",
    about = "Isolate selected JUnit tests and amplify them for energy measurement",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write one isolated type per admitted test, with duplicated test bodies.
    Amplify(AmplifyArgs),

    /// Write one isolated type per admitted test whose body ends in a failing assertion.
    Fail(FailArgs),

    /// Print supported test dialects in probe order.
    #[command(name = "list-dialects")]
    ListDialects,
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Amplify(args) => run_amplify(args),
        Commands::Fail(args) => run_fail(args),
        Commands::ListDialects => {
            print_dialects();
            Ok(())
        }
    }
}

fn print_dialects() {
    for dialect in Dialect::ALL {
        let fallback = if dialect == Dialect::FALLBACK { " (fallback)" } else { "" };
        println!(
            "{dialect}{fallback}\tlifecycle: {}\tfailure: {}",
            dialect
                .lifecycle_names()
                .into_iter()
                .filter(|name| *name != "-")
                .collect::<Vec<_>>()
                .join(", "),
            dialect.failure_statement()
        );
    }
}
