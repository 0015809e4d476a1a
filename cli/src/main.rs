mod commands;
mod error;
mod logger;
mod manifest;
mod runner;
mod writer;
use crate::commands::Commands;
use crate::error::Error;
use crate::logger::Logger;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use clap::Parser;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Output structured JSON instead of plain text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Derive a runner from the command and run it
fn run(command: impl Runnable, writer: &Writer) -> Result<(), Error> {
    command.runner(writer).run()
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    Logger::init();

    let cli = Cli::parse();
    let writer = Writer::new(cli.json);

    // Match all commands here, in one place
    let result = match cli.command {
        Commands::Synth(cmd) => run(cmd, &writer),
        Commands::List(cmd) => run(cmd, &writer),
        Commands::RoleArn(cmd) => run(cmd, &writer),
    };

    if let Err(error) = result {
        writer.error(&format!(
            "{}\n{error}\n",
            console::style("Error").red().bold()
        ))?;

        std::process::exit(1);
    }

    Ok(())
}
