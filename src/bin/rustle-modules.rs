use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustle_modules::runner::{normalize_steps, parse_steps, render_steps, StepRunner};
use rustle_modules::{LocalTransport, ModuleRegistry, ModulesConfig, SessionVariables};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "rustle-modules")]
#[command(about = "Run declarative deployment modules (shell, copy, service)")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct RustleModulesCli {
    #[command(subcommand)]
    command: Commands,

    /// Module configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available modules and their arguments
    Modules,

    /// Bind a step file and print it back with defaults filled in
    Show {
        /// Step file: a list of `{ <module>: <arguments> }` maps
        steps: PathBuf,
    },

    /// Run a step file on localhost
    Run {
        /// Step file: a list of `{ <module>: <arguments> }` maps
        steps: PathBuf,

        /// Session variable, as NAME=VALUE (repeatable)
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, String)>,

        /// Working directory for scripts
        #[arg(long)]
        workdir: Option<PathBuf>,
    },
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = RustleModulesCli::parse();

    let config = match &cli.config {
        Some(path) => ModulesConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ModulesConfig::default(),
    };

    // Initialize tracing
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        config
            .log_level
            .parse()
            .unwrap_or(tracing::Level::INFO)
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    info!("Starting rustle-modules v{}", env!("CARGO_PKG_VERSION"));

    let registry = ModuleRegistry::with_core_modules(&config);
    match cli.command {
        Commands::Modules => show_modules(&registry),
        Commands::Show { steps } => show_steps(&registry, steps)?,
        Commands::Run {
            steps,
            vars,
            workdir,
        } => run_steps(registry, steps, vars, workdir).await?,
    }

    Ok(())
}

fn show_modules(registry: &ModuleRegistry) {
    for name in registry.list_modules() {
        println!("{name}");
        if let Ok(converter) = registry.discover(name) {
            for arg in converter.describe() {
                let required = if arg.required { " (required)" } else { "" };
                println!(
                    "  {:<16} {:<16} {}{}",
                    arg.name, arg.argument_type, arg.description, required
                );
            }
        }
    }
}

fn show_steps(registry: &ModuleRegistry, steps_path: PathBuf) -> Result<()> {
    let content = std::fs::read_to_string(&steps_path)
        .with_context(|| format!("reading steps {}", steps_path.display()))?;
    let steps = normalize_steps(registry, &parse_steps(&content)?)?;
    print!("{}", render_steps(&steps)?);
    Ok(())
}

async fn run_steps(
    registry: ModuleRegistry,
    steps_path: PathBuf,
    vars: Vec<(String, String)>,
    workdir: Option<PathBuf>,
) -> Result<()> {
    let content = std::fs::read_to_string(&steps_path)
        .with_context(|| format!("reading steps {}", steps_path.display()))?;
    let steps = parse_steps(&content)?;

    let session = Arc::new(SessionVariables::with_values(vars));
    let transport = Arc::new(match workdir {
        Some(dir) => LocalTransport::with_working_directory(dir),
        None => LocalTransport::new(),
    });

    let runner = StepRunner::new(registry, session.clone(), transport);
    let reports = runner.run(&steps).await?;

    println!("Completed {} step(s)", reports.len());
    for report in &reports {
        println!(
            "  #{:<3} {:<8} {:>10}  {}",
            report.index,
            report.module,
            format!("{:.3?}", report.up_time),
            report.id
        );
    }

    let mut saved: Vec<_> = session.snapshot().into_iter().collect();
    saved.sort();
    if !saved.is_empty() {
        println!("Session variables:");
        for (name, value) in saved {
            println!("  {name} = {value}");
        }
    }

    Ok(())
}
