//! spinfer CLI: SPIN rule inference over RDF files.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use spinfer::engine::{Engine, EngineConfig};
use spinfer::graph::Term;

#[derive(Parser)]
#[command(name = "spinfer", version, about = "SPIN rule inference for RDF")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for persistent storage (overrides the config file).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a Turtle or N-Triples file and run inference to a fixpoint.
    Infer {
        /// Path to the RDF file.
        #[arg(long)]
        file: PathBuf,
    },

    /// Print rule properties in execution order.
    RuleOrder {
        /// Path to the RDF file.
        #[arg(long)]
        file: PathBuf,
    },

    /// Print a subject's classes, most specific first.
    Hierarchy {
        /// Path to the RDF file.
        #[arg(long)]
        file: PathBuf,

        /// Subject IRI.
        #[arg(long)]
        subject: String,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if cli.data_dir.is_some() {
        config.data_dir = cli.data_dir.clone();
    }

    match cli.command {
        Commands::Infer { file } => {
            let mut engine = Engine::new(config)?;
            let loaded = engine.load_file(&file)?;
            let inferred = engine.infer()?;
            println!("Loaded {loaded} statements, inferred {inferred}");
            let stats = serde_json::to_string_pretty(engine.stats()).into_diagnostic()?;
            println!("{stats}");
        }

        Commands::RuleOrder { file } => {
            let engine = Engine::new(config)?;
            engine.load_file(&file)?;
            let order = engine.rule_order()?;
            for (i, property) in order.properties.iter().enumerate() {
                let cap = property
                    .max_iteration_count
                    .map_or_else(|| "unbounded".to_string(), |n| n.to_string());
                println!("{:>3}. {}  (max iterations: {cap})", i + 1, property.uri);
            }
            if !order.cycle.is_empty() {
                println!("cycle:");
                for uri in &order.cycle {
                    println!("     {uri}");
                }
            }
        }

        Commands::Hierarchy { file, subject } => {
            let engine = Engine::new(config)?;
            engine.load_file(&file)?;
            let order = engine.class_order(&Term::iri(&subject))?;
            if order.classes.is_empty() {
                println!("{subject} has no declared classes");
            }
            for (i, class) in order.classes.iter().enumerate() {
                println!("{:>3}. {class}", i + 1);
            }
            if !order.cycle.is_empty() {
                println!("cycle: {:?}", order.cycle.iter().map(|c| c.as_str()).collect::<Vec<_>>());
            }
        }
    }

    Ok(())
}
