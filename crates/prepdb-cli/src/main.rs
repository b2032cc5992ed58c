mod output;
mod root;

use clap::Parser;
use prepdb_core::cache::RedbCache;
use prepdb_core::config::Config;
use prepdb_core::provider::OperationRegistry;
use prepdb_core::sequencer::{ProvisioningRequest, Sequencer};
use prepdb_core::store::CommandStore;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "prepdb",
    about = "Prepare a test database before an end-to-end run, skipping work the previous run already did",
    version
)]
struct Cli {
    /// Operation identifier to load (omit to run only the flagged steps)
    operation: Option<String>,

    /// Initialise the database (run migrations, then the cache table command)
    #[arg(long)]
    init: bool,

    /// Delete the database artifact (will not work if a process has it open)
    #[arg(long)]
    reset: bool,

    /// Clear all data without altering schema
    #[arg(long)]
    flush: bool,

    /// Drop the remembered operation id (use when a test will modify the database)
    #[arg(long)]
    clear_cache: bool,

    /// Write the store's current data to stdout and exit
    #[arg(long)]
    dump: bool,

    /// Project root (default: auto-detect from .prepdb/ or .git/)
    #[arg(long, env = "PREPDB_ROOT")]
    root: Option<PathBuf>,

    /// Print the outcome as JSON
    #[arg(long, short = 'j')]
    json: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    if let Err(e) = run(cli) {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let root = root::resolve_root(cli.root.as_deref());
    let config = Config::load(&root)?;

    let store = CommandStore::new(
        config.commands.clone(),
        config.artifact_path(&root),
        root.clone(),
        config.profile.clone(),
    );
    let registry =
        OperationRegistry::from_config(&config.operations, &root, config.profile.as_deref());
    let cache = RedbCache::open(&config.cache_path(&root), &config.cache.key)?;

    let request = ProvisioningRequest {
        dump: cli.dump,
        reset: cli.reset,
        init: cli.init,
        flush: cli.flush,
        operation: cli.operation,
        clear_cache: cli.clear_cache,
    };

    let sequencer = Sequencer::new(&store, &registry, &cache, config.ttl());
    let outcome = sequencer.run(&request)?;

    if cli.json {
        output::print_json(&outcome)?;
    }
    Ok(())
}
