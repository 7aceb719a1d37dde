//! Chamber CLI Binary
//!
//! Command-line interface for layered settings resolution.

use chamber::tooling::cli::Cli;
use clap::Parser;
use std::process;

fn main() {
    let cli = Cli::parse();

    chamber::logging::init(cli.verbose, cli.log_level.as_deref());

    let context = match cli.context() {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error resolving configuration: {}", e);
            process::exit(1);
        }
    };

    match context.execute(&cli.command) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
