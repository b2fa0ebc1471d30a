use std::io::{self, Write};
use std::path::PathBuf;
use std::process::exit;

use anyhow::{Context, Result, anyhow, bail};
use bunker_convert_sdk::observability::log_snapshot;
use bunker_convert_sdk::{
    Client, ClientConfig, CommandResult, DevicePolicy, ExtraArgs, LintOptions, RunFlags,
    RunOptions,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde_json::to_writer_pretty;
use tracing::debug;
use tracing_subscriber::{EnvFilter, prelude::*};

fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_tracing()?;

    let client = build_client(cli.config.as_ref(), cli.binary.clone())?;
    let code = match cli.command {
        Commands::Run {
            recipe,
            set,
            dry_run,
            print_metrics,
            device_policy,
            extra,
        } => {
            let mut extra_args = ExtraArgs::pairs(set);
            for token in extra {
                extra_args = extra_args.with_token(token);
            }
            let options = RunOptions::new()
                .flags(RunFlags {
                    dry_run,
                    print_metrics,
                    device_policy,
                    ..RunFlags::default()
                })
                .extra_args(extra_args)
                .check(false);
            let result = client.run_recipe(&recipe, &options)?;
            report(&result, cli.json)?
        }
        Commands::Lint { recipes, extra } => {
            let options = LintOptions::new().extra_args(extra).check(false);
            let result = client.lint_recipes(&recipes, &options)?;
            report(&result, cli.json)?
        }
        Commands::Stages => {
            let stages = client.list_stages()?;
            if cli.json {
                print_json(&stages)?;
            } else {
                for stage in &stages {
                    println!("{stage}");
                }
            }
            0
        }
        Commands::Diff { lhs, rhs } => {
            let diff = client.diff_recipes(&lhs, &rhs)?;
            if cli.json {
                print_json(&diff)?;
            } else if diff.equivalent {
                println!("Recipes match: {} == {}", lhs.display(), rhs.display());
            } else {
                for line in &diff.differences {
                    println!("- {line}");
                }
            }
            if diff.equivalent { 0 } else { 1 }
        }
        Commands::Digest { path, output } => {
            let digest = client.digest(&path, output.as_deref())?;
            if cli.json {
                print_json(&digest)?;
            } else {
                println!("{}  {}", digest.hex, digest.path.display());
            }
            0
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "bunker-sdk", &mut io::stdout());
            0
        }
    };

    let snapshot = client.metrics().snapshot();
    if !snapshot.operations.is_empty() {
        log_snapshot(&snapshot);
    }

    if code != 0 {
        exit(if code > 0 { code } else { 1 });
    }
    Ok(())
}

fn configure_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .map_err(|err| anyhow!(err.to_string()))?;

    Ok(())
}

fn build_client(config_path: Option<&PathBuf>, binary: Option<String>) -> Result<Client> {
    let mut config = match config_path {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    }
    .with_env_overrides();

    if let Some(binary) = binary {
        config.binary = binary;
    }
    if config.binary.trim().is_empty() {
        bail!("bunker-convert binary name cannot be empty");
    }

    debug!(binary = config.binary.as_str(), "Client configured");
    Ok(Client::new(config))
}

/// Relays captured output, or the whole result as JSON, and returns the exit
/// code to propagate.
fn report(result: &CommandResult, json: bool) -> Result<i32> {
    if json {
        print_json(result)?;
    } else {
        let mut stdout = io::stdout().lock();
        stdout
            .write_all(result.stdout.as_bytes())
            .context("Failed to relay bunker-convert stdout")?;
        stdout.flush()?;
        io::stderr()
            .write_all(result.stderr.as_bytes())
            .context("Failed to relay bunker-convert stderr")?;
    }
    Ok(result.code)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    to_writer_pretty(&mut stdout, value).context("Failed to write JSON output")?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

#[derive(Parser)]
#[command(
    name = "bunker-sdk",
    version,
    about = "Drive a bunker-convert binary from scripts and pipelines"
)]
struct Cli {
    /// bunker-convert executable to invoke (overrides config and BUNKER_CONVERT_BIN)
    #[arg(long = "bin", global = true)]
    binary: Option<String>,
    /// YAML client configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print results as JSON instead of relaying output
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run {
        recipe: PathBuf,
        /// Extra option forwarded as --KEY VALUE
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        set: Vec<(String, String)>,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        print_metrics: bool,
        #[arg(long = "device-policy", value_enum)]
        device_policy: Option<DevicePolicy>,
        #[arg(last = true)]
        extra: Vec<String>,
    },
    Lint {
        #[arg(required = true)]
        recipes: Vec<PathBuf>,
        #[arg(last = true)]
        extra: Vec<String>,
    },
    Stages,
    Diff {
        lhs: PathBuf,
        rhs: PathBuf,
    },
    Digest {
        path: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}
