//! Compose the instances of a JSON manifest and print the diagnostic graph.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use component_composer::{CompositionResult, Composer, Manifest};

#[derive(Parser, Debug)]
#[command(name = "composer-diag")]
struct Args {
    /// Manifest with the type catalog, instances and options
    manifest: PathBuf,

    /// Print the diagnostic graph as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Also print the recorded call intents
    #[arg(long, default_value_t = false)]
    calls: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "component_composer=debug",
        _ => "component_composer=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    let text = std::fs::read_to_string(&args.manifest)
        .with_context(|| format!("read manifest {}", args.manifest.display()))?;
    let manifest: Manifest = serde_json::from_str(&text)
        .with_context(|| format!("parse manifest {}", args.manifest.display()))?;

    let mut composer = Composer::new(&manifest.catalog);
    composer
        .add_all(manifest.instances.iter().cloned())
        .with_options(manifest.options.clone());
    let result = composer.compose().context("compose")?;

    if args.json {
        let json = serde_json::to_string_pretty(&result).context("serialize result")?;
        println!("{json}");
    } else {
        print_report(&result);
    }

    if args.calls {
        println!();
        println!("calls:");
        for intent in result.calls().intents() {
            println!("  {intent}");
        }
    }

    Ok(if result.failed() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

fn print_report(result: &CompositionResult) {
    println!("instances:");
    for record in result.instances() {
        println!("  {} ({}): {:?}", record.name, record.type_name, record.state);
        if let Some(error) = &record.error {
            println!("    error: {error}");
        }
    }

    println!("points:");
    for point in result.points() {
        if point.error().is_none() && point.warnings().is_empty() {
            continue;
        }
        let name = &result.record(point.instance).name;
        println!("  {name}.{} <{}>", point.label, point.contract);
        if let Some(error) = point.error() {
            println!("    error: {error}");
        }
        for warning in point.warnings() {
            println!("    warning: {warning}");
        }
    }

    println!("joins:");
    for join in result.joins() {
        let marker = if join.is_error_join { " (error)" } else { "" };
        println!(
            "  {} -> {} [{}]{marker}",
            result.describe_point(join.import),
            result.describe_point(join.export),
            join.contract
        );
    }

    if let Some(message) = result.error_message() {
        println!();
        println!("composition failed:");
        for line in message.lines() {
            println!("  {line}");
        }
    }
}
