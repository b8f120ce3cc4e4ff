use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use config::{write_template, ConfigLoader};
use runtime::{ClientError, ProcessReport, RunEnd, RuntimeMode};
use tracing::{error, info};

/// STOMP client for Network Rail's public data feeds.
#[derive(Parser)]
#[command(name = "nrfeed", version, about, long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Create a new configuration file from the template.
	Create {
		/// Where to write the configuration file.
		location: PathBuf,
	},
	/// Run the client with a configuration file.
	Run {
		/// YAML or JSON configuration file.
		config: PathBuf,
		/// Use the scripted in-memory feed instead of the network.
		#[arg(long, env = "NRFEED_DEMO")]
		demo: bool,
	},
}

fn main() -> ExitCode {
	let cli = Cli::parse();
	runtime::init();

	match cli.command {
		Commands::Create { location } => match write_template(&location) {
			Ok(()) => {
				println!("configuration written to {}", location.display());
				ExitCode::SUCCESS
			}
			Err(error) => {
				eprintln!("error: {error}");
				ExitCode::FAILURE
			}
		},
		Commands::Run { config, demo } => {
			let mode = if demo { RuntimeMode::Demo } else { RuntimeMode::from_env() };
			match run(&config, mode) {
				Ok(report) => {
					summarize(&report);
					ExitCode::SUCCESS
				}
				Err(ClientError::InvalidCredentials(reason)) => {
					error!(%reason, "invalid credentials");
					eprintln!("invalid credentials: {reason}");
					ExitCode::FAILURE
				}
				Err(error) => {
					error!(error = %error, "run failed");
					eprintln!("error: {error}");
					ExitCode::FAILURE
				}
			}
		}
	}
}

fn run(path: &Path, mode: RuntimeMode) -> Result<ProcessReport, ClientError> {
	let config = ConfigLoader::load(path)?;
	match mode {
		RuntimeMode::Tcp => runtime::run_with_config(&config),
		RuntimeMode::Demo => runtime::run_demo(&config),
	}
}

fn summarize(report: &ProcessReport) {
	let end = match &report.run.end {
		RunEnd::BudgetExhausted => "frame budget reached".to_string(),
		RunEnd::ErrorFrame(summary) => format!("server error frame: {summary}"),
	};
	info!(
		frames = report.run.frames_enqueued,
		stored = report.stored,
		failed = report.failed,
		reconnects = report.run.reconnects,
		subscribed = ?report.run.subscribed,
		skipped = ?report.run.skipped,
		"process complete: {end}"
	);
}
