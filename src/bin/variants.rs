//! Swagger Variants CLI
//!
//! Builds the variant index of an azure-rest-api-specs style tree.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use swagger_variants::{build_index, ErrorPolicy, VariantConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swagger-variants")]
#[command(version)]
#[command(about = "Variants of polymorphic swagger schemas")]
struct Cli {
    /// Config file (layered over variants.toml and VARIANTS__* variables)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the variant index
    Build {
        /// The specification folder, e.g. ~/azure-rest-api-specs/specification
        specdir: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip broken files and schemas instead of failing the build
        #[arg(long)]
        keep_going: bool,

        /// Number of worker threads
        #[arg(long)]
        workers: Option<usize>,

        /// Global build deadline in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

/// Exit status when a partial index was written under --keep-going
const PARTIAL_INDEX: u8 = 2;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = VariantConfig::load_from(cli.config.as_deref())?;

    match cli.command {
        Commands::Build {
            specdir,
            output,
            keep_going,
            workers,
            timeout_secs,
        } => {
            if keep_going {
                config.build.error_policy = ErrorPolicy::Collect;
            }
            if workers.is_some() {
                config.build.workers = workers;
            }
            if let Some(secs) = timeout_secs {
                config.build.timeout_secs = secs;
            }

            let report = build_index(&specdir, &config)?;
            let json = report.index.to_json(config.output.format)?;

            match output {
                Some(path) => std::fs::write(&path, json)?,
                None => println!("{}", json),
            }

            if report.is_complete() {
                return Ok(ExitCode::SUCCESS);
            }
            for failure in &report.failures {
                match &failure.schema {
                    Some(schema) => eprintln!(
                        "skipped {}#/definitions/{}: {}",
                        failure.file.display(),
                        schema,
                        failure.message
                    ),
                    None => eprintln!("skipped {}: {}", failure.file.display(), failure.message),
                }
            }
            Ok(ExitCode::from(PARTIAL_INDEX))
        }
    }
}
