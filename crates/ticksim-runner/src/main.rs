//! `ticksim` binary: interactive node network simulator.

use clap::Parser;
use std::io::{self, BufRead, IsTerminal, Write};
use std::process::ExitCode;
use ticksim_cli_protocol::{parse_node_count, CliError};
use ticksim_runner::{
    Cli, ConsoleSink, RunnerError, SharedSimulation, ShutdownSummary, Simulation,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
    ticksim_metrics::describe_metrics();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ticksim: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), RunnerError> {
    let config = cli.resolve()?;
    let mut input = io::stdin().lock();

    println!("Welcome to the simulation");
    let node_count = match config.nodes {
        Some(count) => count,
        None => prompt_node_count(&mut input)?,
    };

    let shared = SharedSimulation::new(Simulation::start(
        &config,
        node_count,
        ConsoleSink::new(io::stdout()),
    )?);

    let interrupt = shared.clone();
    let installed = ctrlc::set_handler(move || {
        if let Some(stopped) = interrupt.stop() {
            info!("interrupted");
            match stopped {
                Ok(summary) => report(&summary),
                Err(e) => error!("{}", e),
            }
            std::process::exit(0);
        }
    });
    if let Err(e) = installed {
        shared.stop().transpose()?;
        return Err(e.into());
    }

    if let Some(summary) = shared.run_console(&mut input, io::stdout())? {
        report(&summary);
    }
    Ok(())
}

fn prompt_node_count(input: &mut impl BufRead) -> Result<usize, RunnerError> {
    print!("How many nodes would you like to spawn: ");
    io::stdout().flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(CliError::InvalidNodeCount(String::new()).into());
    }
    Ok(parse_node_count(&line)?)
}

fn report(summary: &ShutdownSummary) {
    if summary.pending > 0 {
        println!("Discarding {} undelivered message(s).", summary.pending);
    }
    println!("Exiting simulation.");
}
