use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::{debug, info};
use std::path::PathBuf;

use paramrun::config::{LogLevel, RunnerConfig};
use paramrun::pipeline::Pipeline;
use paramrun::process::ProcessExecutor;
use paramrun::template::CommandTemplate;
use paramrun::util::logging;

/// Run COMMAND once for every JSON record read from stdin, writing one JSON result per line
#[derive(Parser, Debug)]
#[command(name = "paramrun", version, disable_version_flag = true)]
struct Args {
    /// Number of commands to run at once
    #[arg(short, long)]
    parallelism: Option<usize>,

    /// Add worker id and resolved program to every result
    #[arg(short, long)]
    debug: bool,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logging level (logs go to stderr)
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,

    /// Print version
    #[arg(short = 'v', long, action = ArgAction::Version, value_parser = clap::value_parser!(bool))]
    version: (),

    /// Command and argument templates, e.g. `echo {{name}}`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Installed before loading so that problems with the config sources are reported.
    logging::init(args.log_level.unwrap_or_default());

    let mut config = RunnerConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(parallelism) = args.parallelism {
        config.parallelism = parallelism;
    }
    config.debug |= args.debug;
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    logging::set_level(config.log_level);
    debug!("Configuration: {:?}", config);
    config.validate()?;

    let command = CommandTemplate::parse(&args.command)?;
    let pipeline = Pipeline::new(config.pipeline(), command, ProcessExecutor::new())?;

    let (summary, _) = pipeline.run(std::io::stdin(), tokio::io::stdout()).await?;
    info!("{} results written", summary.results);

    Ok(())
}
