//! treepack - self-describing JSON codec and item ingestion service.
//!
//! This binary starts the HTTP service or inspects encoded documents.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use treepack::{
    config::{Cli, Command, InspectConfig, ServeConfig},
    orchestrator::{load_from_file, load_from_url, outline},
    server::{create_router, RouterConfig},
    DeployService, EncodeOptions, FsStore, HttpFetcher, ItemStore, MemoryStore,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Inspect(config) => run_inspect(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let options = match config.encode_options() {
        Ok(options) => options,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    print_banner();
    log_configuration(&config, &options);

    match config.storage_dir {
        Some(ref dir) => serve_with(&config, options, FsStore::new(dir)).await,
        None => {
            warn!("  Storage: IN-MEMORY - deployed items are lost on exit");
            warn!("           Persist them with --storage-dir=<path>");
            serve_with(&config, options, MemoryStore::new()).await
        }
    }
}

/// Initialize the store, build the service and run the server until it fails.
async fn serve_with<S: ItemStore + 'static>(
    config: &ServeConfig,
    options: EncodeOptions,
    store: S,
) -> ExitCode {
    if let Err(e) = store.initialize().await {
        error!("Failed to initialize storage: {}", e);
        return ExitCode::FAILURE;
    }

    let fetcher = match HttpFetcher::new(config.fetch_timeout_duration()) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let service = DeployService::new(fetcher, store, options);
    let router = create_router(service, build_router_config(config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/items/outfit/<uuid>", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Print the startup banner.
fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("");
    info!("  ┌┬┐┬─┐┌─┐┌─┐┌─┐┌─┐┌─┐┬┌─");
    info!("   │ ├┬┘├┤ ├┤ ├─┘├─┤│  ├┴┐");
    info!("   ┴ ┴└─└─┘└─┘┴  ┴ ┴└─┘┴ ┴  v{}", version);
    info!("");
}

fn log_configuration(config: &ServeConfig, options: &EncodeOptions) {
    info!("Configuration:");
    if let Some(ref dir) = config.storage_dir {
        info!("  Storage: {}", dir.display());
    }
    info!("  Fetch timeout: {}s", config.fetch_timeout);

    let backends: Vec<String> = options.backends.iter().map(ToString::to_string).collect();
    if backends.is_empty() {
        info!("  Array backend: fallback");
    } else {
        info!("  Array backends: {}", backends.join(", "));
    }

    match options.image {
        Some(image) => info!("  Image path: {} (quality {})", image.format, image.quality),
        None => info!("  Image path: disabled"),
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "treepack=debug,tower_http=debug"
    } else {
        "treepack=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new();

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

// =============================================================================
// Inspect Command
// =============================================================================

async fn run_inspect(config: InspectConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let result = if config.is_url() {
        load_from_url(&config.source, config.timeout_duration()).await
    } else {
        load_from_file(&config.source)
    };

    match result {
        Ok(tree) => {
            print!("{}", outline(&tree));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: failed to load {}: {}", config.source, e);
            ExitCode::FAILURE
        }
    }
}
