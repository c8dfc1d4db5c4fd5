//! DevFlow CLI - Command-line interface for DevFlow Insights
//!
//! Commands:
//! - rate: Composite developer rating per user
//! - categorize: Error-message category histogram
//! - cluster: Productivity clusters for session vectors
//! - predict: Per-metric predictions with insights
//! - summarize: Session activity summary
//! - doctor: Diagnose configuration and model files

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use devflow_insights::predict::ModelRegistry;
use devflow_insights::{ComputeError, InsightsConfig, InsightsEngine, PRODUCER_NAME, VERSION};

/// DevFlow - developer ratings, error categories and productivity insights
#[derive(Parser)]
#[command(name = "devflow")]
#[command(version = VERSION)]
#[command(about = "Compute developer ratings and productivity insights", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write compact JSON instead of pretty-printed
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rate every user from code-analysis and flow-metrics records
    Rate {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Categorize error messages into topics
    Categorize {
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Cluster session behaviour vectors
    Cluster {
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Predict metrics from one feature object
    Predict {
        /// Model registry file (JSON)
        #[arg(short, long)]
        models: PathBuf,

        /// Metric to predict; all registered metrics when omitted
        #[arg(long)]
        metric: Option<String>,

        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Summarize session activity
    Summarize {
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Diagnose configuration and model files
    Doctor {
        /// Check a model registry file
        #[arg(long)]
        models: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("devflow_insights=warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), DevflowCliError> {
    if let Commands::Doctor { models, json } = &cli.command {
        return cmd_doctor(cli.config.as_deref(), models.as_deref(), *json);
    }

    let mut config = match &cli.config {
        Some(path) => InsightsConfig::load(path)?,
        None => InsightsConfig::default(),
    };
    if cli.compact {
        config.report.pretty = false;
    }
    let engine = InsightsEngine::with_config(config)?;

    match cli.command {
        Commands::Rate { input, output } => {
            let data = read_input(&input)?;
            write_output(&output, &engine.rate_json(&data)?)
        }
        Commands::Categorize { input, output } => {
            let data = read_input(&input)?;
            write_output(&output, &engine.categorize_json(&data)?)
        }
        Commands::Cluster { input, output } => {
            let data = read_input(&input)?;
            write_output(&output, &engine.cluster_json(&data)?)
        }
        Commands::Predict {
            models,
            metric,
            input,
            output,
        } => {
            let registry = ModelRegistry::from_json(&fs::read_to_string(&models)?)?;
            let engine = engine.with_registry(Arc::new(registry));
            let data = read_input(&input)?;
            write_output(&output, &engine.predict_json(metric.as_deref(), &data)?)
        }
        Commands::Summarize { input, output } => {
            let data = read_input(&input)?;
            write_output(&output, &engine.summarize_json(&data)?)
        }
        Commands::Doctor { .. } => Ok(()),
    }
}

fn read_input(input: &Path) -> Result<String, DevflowCliError> {
    let data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };
    if data.trim().is_empty() {
        return Err(DevflowCliError::EmptyInput);
    }
    Ok(data)
}

fn write_output(output: &Path, content: &str) -> Result<(), DevflowCliError> {
    if output.to_string_lossy() == "-" {
        let mut stdout = io::stdout();
        writeln!(stdout, "{content}")?;
        stdout.flush()?;
    } else {
        fs::write(output, format!("{content}\n"))?;
    }
    Ok(())
}

fn cmd_doctor(
    config: Option<&Path>,
    models: Option<&Path>,
    json: bool,
) -> Result<(), DevflowCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} version {}", PRODUCER_NAME, VERSION),
    });

    checks.push(match config {
        Some(path) => match InsightsConfig::load(path) {
            Ok(_) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!("Config {} is valid", path.display()),
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        },
        None => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "No config file given, using defaults".to_string(),
        },
    });

    if let Some(path) = models {
        let check = if !path.exists() {
            DoctorCheck {
                name: "models".to_string(),
                status: CheckStatus::Warning,
                message: "Model registry file does not exist".to_string(),
            }
        } else {
            match fs::read_to_string(path)
                .map_err(DevflowCliError::from)
                .and_then(|content| Ok(ModelRegistry::from_json(&content)?))
            {
                Ok(registry) => {
                    let names: Vec<String> =
                        registry.metrics().map(|m| m.as_str().to_string()).collect();
                    DoctorCheck {
                        name: "models".to_string(),
                        status: if names.is_empty() {
                            CheckStatus::Warning
                        } else {
                            CheckStatus::Ok
                        },
                        message: format!("{} models loaded: {}", names.len(), names.join(", ")),
                    }
                }
                Err(e) => DoctorCheck {
                    name: "models".to_string(),
                    status: CheckStatus::Error,
                    message: CliError::from(e).message,
                },
            }
        };
        checks.push(check);
    }

    checks.push(if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass --input for file input)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (ready to read input)".to_string(),
        }
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("DevFlow Doctor Report");
        println!("=====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(DevflowCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum DevflowCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    EmptyInput,
    DoctorFailed,
}

impl From<io::Error> for DevflowCliError {
    fn from(e: io::Error) -> Self {
        DevflowCliError::Io(e)
    }
}

impl From<ComputeError> for DevflowCliError {
    fn from(e: ComputeError) -> Self {
        DevflowCliError::Compute(e)
    }
}

impl From<serde_json::Error> for DevflowCliError {
    fn from(e: serde_json::Error) -> Self {
        DevflowCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<DevflowCliError> for CliError {
    fn from(e: DevflowCliError) -> Self {
        match e {
            DevflowCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            DevflowCliError::Compute(e) => {
                let hint = match &e {
                    ComputeError::InsufficientData { .. } => {
                        Some("Provide more records than the number of clusters or topics")
                    }
                    ComputeError::InputValidation { .. } => {
                        Some("Supply every listed field as a number")
                    }
                    ComputeError::UnknownMetric(_) => {
                        Some("Run 'devflow doctor --models <file>' to list registered metrics")
                    }
                    ComputeError::ConfigError(_) => Some("Run 'devflow doctor --config <file>'"),
                    ComputeError::JsonError(_) | ComputeError::ParseError(_) => {
                        Some("Check JSON syntax and input shape")
                    }
                    _ => None,
                };
                CliError {
                    code: e.code().to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
            DevflowCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            DevflowCliError::EmptyInput => CliError {
                code: "EMPTY_INPUT".to_string(),
                message: "No input provided".to_string(),
                hint: Some("Ensure the input file is not empty".to_string()),
            },
            DevflowCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
