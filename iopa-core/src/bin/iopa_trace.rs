//! IOPA Trace CLI - Inspect captured requests and middleware traces
//!
//! Reads a middleware trace (or a captured request carrying one under
//! `server.Trace`) and prints the reconstructed context of each stage.
//!
//! Usage:
//!     iopa-trace stages capture.json
//!     iopa-trace expand --stage auth capture.json
//!     iopa-trace diff --stage auth --phase end capture.json
//!     cat request.json | iopa-trace request --curl

use clap::{Parser, Subcommand, ValueEnum};
use iopa_core::context::{format_duration, key_value_rows, KEY_TRACE};
use iopa_core::{
    contexts_to_text, to_curl_command, BodyFormat, Direction, FormatterRegistry, Phase,
    ReconstructConfig, RequestContext, SerializedRequest, Trace,
};
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "iopa-trace")]
#[command(about = "Inspect IOPA middleware traces and captured requests")]
#[command(version)]
struct Args {
    /// Reject deltas with paths that cannot be applied
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the stages of a trace with their timings
    Stages {
        /// Input file (default: stdin)
        input: Option<PathBuf>,
    },

    /// Print the reconstructed context of every stage as JSON
    Expand {
        /// Only expand this stage
        #[arg(short, long)]
        stage: Option<String>,

        /// Input file (default: stdin)
        input: Option<PathBuf>,
    },

    /// Print the isolated before/after of one stage phase
    Diff {
        #[arg(short, long)]
        stage: String,

        #[arg(short, long, value_enum, default_value = "end")]
        phase: PhaseArg,

        /// Input file (default: stdin)
        input: Option<PathBuf>,
    },

    /// Show a captured request
    Request {
        /// Print a cURL command reproducing the request
        #[arg(long)]
        curl: bool,

        /// Print the request and response as plain text
        #[arg(long)]
        text: bool,

        /// Render the request or response body
        #[arg(long, value_enum)]
        body: Option<DirectionArg>,

        /// Body display mode: parsed or formatted
        #[arg(long, default_value = "parsed")]
        format: BodyFormat,

        /// Input file (default: stdin)
        input: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PhaseArg {
    Next,
    End,
}

impl From<PhaseArg> for Phase {
    fn from(arg: PhaseArg) -> Self {
        match arg {
            PhaseArg::Next => Phase::Next,
            PhaseArg::End => Phase::End,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DirectionArg {
    Request,
    Response,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Request => Direction::Request,
            DirectionArg::Response => Direction::Response,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iopa_core=info,iopa_trace=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = ReconstructConfig::from_env();
    if args.strict {
        config.strict_paths = true;
    }

    match args.command {
        Command::Stages { input } => {
            let trace = load_trace(read_json(input.as_ref())?)?;
            for stage in trace.stages() {
                println!(
                    "{:<32} {:>10}  next={}",
                    stage.name,
                    format_duration(stage.record.duration),
                    stage.record.next
                );
            }
            info!(
                "{} stages, {} total",
                trace.len(),
                format_duration(trace.total_duration())
            );
        }

        Command::Expand { stage, input } => {
            let trace = load_trace(read_json(input.as_ref())?)?;
            let expanded = match stage {
                Some(name) => vec![(name.clone(), trace.expand_stage(&name, &config)?)],
                None => trace.expand_all(&config)?,
            };
            for (name, record) in &expanded {
                for (phase, index, err) in record.report().malformed() {
                    warn!("{}: skipped {} operation {}: {}", name, phase, index, err);
                }
            }
            let output: Vec<(&str, _)> = expanded.iter().map(|(n, r)| (n.as_str(), r)).collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Diff {
            stage,
            phase,
            input,
        } => {
            let trace = load_trace(read_json(input.as_ref())?)?;
            let expanded = trace.expand_stage(&stage, &config)?;
            match expanded.diff(phase.into()) {
                Some(diff) => println!("{}", serde_json::to_string_pretty(&diff)?),
                None => info!("{} has no {} changes", stage, Phase::from(phase)),
            }
        }

        Command::Request {
            curl,
            text,
            body,
            format,
            input,
        } => {
            let data: SerializedRequest = serde_json::from_value(read_json(input.as_ref())?)?;
            let context = RequestContext::from_serialized(data);

            if curl {
                println!("{}", to_curl_command(&context));
            } else if text {
                println!("{}", contexts_to_text(&[&context]));
            } else if let Some(direction) = body {
                let formatted =
                    FormatterRegistry::for_format(format).format(&context, direction.into());
                println!("{}", serde_json::to_string_pretty(&formatted)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&key_value_rows(&context))?);
            }
        }
    }

    Ok(())
}

fn read_json(path: Option<&PathBuf>) -> iopa_core::Result<Value> {
    let mut raw = String::new();
    match path {
        Some(path) if path.as_os_str() != "-" => raw = std::fs::read_to_string(path)?,
        _ => {
            std::io::stdin().read_to_string(&mut raw)?;
        }
    }
    Ok(serde_json::from_str(&raw)?)
}

/// Accept a bare trace or a captured request carrying one
fn load_trace(value: Value) -> Result<Trace, Box<dyn std::error::Error>> {
    let value = match value {
        Value::Object(mut request) => request
            .remove(KEY_TRACE)
            .ok_or("request has no server.Trace")?,
        other => other,
    };
    Ok(Trace::from_value(value)?)
}
