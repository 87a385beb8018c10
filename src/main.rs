use anyhow::Result;
use smartkg::context::ContextStore;
use smartkg::http::HttpServer;
use smartkg::watch;
use smartkg::{Config, GraphRegistry};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "serve" => run_server().await?,
        "reset-contexts" => reset_contexts().await?,
        _ => verify_datastores().await?,
    }

    Ok(())
}

/// Load every datastore, then serve HTTP (and watch the data folder if enabled).
async fn run_server() -> Result<()> {
    log::info!("Starting SmartKG server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    let registry = Arc::new(GraphRegistry::from_config(&config));

    let report = registry.load_all().await?;
    for (name, reason) in &report.failed {
        log::error!("Datastore '{}' not available: {}", name, reason);
    }
    log::info!("{} datastores loaded", report.loaded.len());

    migrate_context_store(&config).await?;

    if config.loading.watch {
        let registry = Arc::clone(&registry);
        let root = config.data_folder().to_path_buf();
        let debounce = config.debounce();
        tokio::spawn(async move {
            if let Err(e) = watch::run_watcher(registry, &root, debounce).await {
                log::error!("watcher stopped: {}", e);
            }
        });
    }

    let server = HttpServer::new(registry, config.http_server.allowed_origins.clone());
    server.run(config.http_server.port).await?;

    Ok(())
}

/// Create the context database and apply pending migrations.
async fn migrate_context_store(config: &Config) -> Result<()> {
    let store = ContextStore::open(config.db_path(), config.context_store.max_duration_invalid_input).await?;
    log::info!(
        "Context store migrated at {} ({} records)",
        config.db_path().display(),
        store.count().await?
    );
    Ok(())
}

/// Clear all dialog contexts, keeping only the sentinel record.
async fn reset_contexts() -> Result<()> {
    let config = Config::load()?;
    let store = ContextStore::open(config.db_path(), config.context_store.max_duration_invalid_input).await?;
    store.clean_context().await?;
    log::info!("Context store reset ({} records)", store.count().await?);
    Ok(())
}

/// Load every datastore and log what it contains. Fails if any datastore fails.
async fn verify_datastores() -> Result<()> {
    log::info!("Starting SmartKG v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    log::info!("Configuration loaded successfully");
    log::info!("Data folder: {}", config.data_folder().display());

    let registry = GraphRegistry::from_config(&config);
    let report = registry.load_all().await?;

    for name in &report.loaded {
        let Some(ds) = registry.get(name) else { continue };
        let graph = ds.graph();
        log::info!(
            "✓ {}: {} vertexes, {} edges, {} scenarios",
            name,
            graph.vertex_count(),
            graph.edge_count(),
            graph.scenario_names().len()
        );
        for scenario in ds.nlu().scenarios() {
            match ds.nlu().root(scenario) {
                Some(root) => log::info!("  scenario '{}' rooted at '{}'", scenario, root),
                None => log::warn!("  scenario '{}' has no root vertex configured", scenario),
            }
        }
        let colored: Vec<&str> = ds.visual().scenarios().collect();
        if !colored.is_empty() {
            log::info!("  color configs for: {}", colored.join(", "));
        }
    }

    if !report.failed.is_empty() {
        for (name, reason) in &report.failed {
            log::error!("✗ {}: {}", name, reason);
        }
        anyhow::bail!("{} of {} datastores failed to load", report.failed.len(), report.failed.len() + report.loaded.len());
    }

    log::info!("✓ All {} datastores verified", report.loaded.len());
    Ok(())
}
