//! `crewflow`: run the research crew on a topic from the command line.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use crewflow::config::CrewConfig;
use crewflow::credentials::Credentials;
use crewflow::errors::{ConfigError, CrewError};
use crewflow::events::LoggingEventSink;
use crewflow::filler::{FillerExit, FillerHandle, FillerTask};
use crewflow::pipeline::PipelineRunner;
use crewflow::report::{format_report, format_summary, write_report};
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const TOPIC_PROMPT: &str = "What topic would you like to research? ";

const QUOTA_HINT: &str = "The model provider reports that your quota is exhausted. \
                          Wait a while and try again, or check your plan and billing.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "crewflow", version, about = "Research a topic with a two-agent crew")]
struct Cli {
    /// Topic to research (prompted for when omitted)
    #[arg(short, long)]
    topic: Option<String>,

    /// TOML config file
    #[arg(short, long, env = "CREWFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Model, in provider/model form
    #[arg(long)]
    model: Option<String>,

    /// Sampling temperature (0 to 2)
    #[arg(long)]
    temperature: Option<f32>,

    /// Reasoning iterations per stage (0 for no cap)
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Run the research stage without web search
    #[arg(long)]
    no_search: bool,

    /// Play a guessing game while the crew works
    #[arg(long)]
    filler: bool,

    /// Also write the final report to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Log line format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

impl Cli {
    fn apply_overrides(&self, config: &mut CrewConfig) {
        if let Some(model) = &self.model {
            config.llm.model.clone_from(model);
        }
        if let Some(temperature) = self.temperature {
            config.llm.temperature = temperature;
        }
        if let Some(max_iterations) = self.max_iterations {
            config.budget.max_iterations = max_iterations;
        }
        if self.no_search {
            config.search.enabled = false;
        }
        if self.filler {
            config.filler.enabled = true;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_format);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", error_message(&e));
            if is_quota_error(&e) {
                eprintln!("{QUOTA_HINT}");
            }
            ExitCode::from(exit_code(&e))
        }
    }
}

fn init_logging(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::new("crewflow=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => CrewConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => CrewConfig::default(),
    };
    cli.apply_overrides(&mut config);
    config.validate()?;
    debug!(?config, "Configuration loaded");

    let credentials = Credentials::from_env(&config.credentials, config.requires_search())?;
    let pipeline = config.crew_pipeline()?;
    let runner = PipelineRunner::from_config(&config, &credentials)?
        .with_event_sink(Arc::new(LoggingEventSink::debug()));

    let topic = match cli.topic {
        Some(topic) => topic,
        None => prompt_topic().context("reading topic")?,
    };

    let filler = if config.filler.enabled {
        start_filler(&config)
    } else {
        None
    };

    let outcome = runner.run(&pipeline, &topic).await;

    if let Some(handle) = filler {
        if handle.stop() == FillerExit::Abandoned {
            warn!("Filler did not stop within its grace period");
        }
    }

    let report = outcome?;
    info!(summary = %format_summary(&report), "Run finished");
    println!("{}", format_report(&report));

    if let Some(path) = &cli.output {
        write_report(path, &report).with_context(|| format!("writing report to {}", path.display()))?;
    }

    Ok(())
}

fn prompt_topic() -> io::Result<String> {
    let mut stdout = io::stdout();
    stdout.write_all(TOPIC_PROMPT.as_bytes())?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn start_filler(config: &CrewConfig) -> Option<FillerHandle> {
    let game = Box::new(config.filler.game());
    match FillerTask::start(game, BufReader::new(io::stdin()), io::stdout(), &config.filler) {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Could not start the filler; continuing without it");
            None
        }
    }
}

/// One line: each context and cause appears exactly once.
fn error_message(err: &anyhow::Error) -> String {
    format!("Error: {err:#}")
}

fn crew_error(err: &anyhow::Error) -> Option<&CrewError> {
    err.downcast_ref::<CrewError>()
}

fn is_quota_error(err: &anyhow::Error) -> bool {
    crew_error(err).is_some_and(CrewError::is_quota_exceeded)
}

/// 2 for configuration problems, 1 for everything else.
fn exit_code(err: &anyhow::Error) -> u8 {
    let config_error = err.downcast_ref::<ConfigError>().is_some()
        || crew_error(err).is_some_and(|e| e.is_configuration());
    if config_error {
        2
    } else {
        1
    }
}
