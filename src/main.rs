use std::sync::Arc;

use bridge_relay::config::Config;
use bridge_relay::schedule::run_periodic;
use bridge_relay::watchers::Indexer;
use bridge_relay::writers::{EvmDistributor, RelaySettings, RelayWorker};
use bridge_relay::{api, db};

fn main() -> eyre::Result<()> {
    // Install color-eyre for better error reporting
    color_eyre::install()?;

    // Run the async main
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    // Initialize logging
    init_logging();

    tracing::info!("Starting bridge relay");

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        source = %config.source.name,
        destination = %config.destination.name,
        database = %config.database.url,
        "Configuration loaded"
    );

    // Connect to database
    let db = db::create_pool(&config.database.url).await?;
    tracing::info!("Database connected");

    // Run migrations
    db::run_migrations(&db).await?;
    tracing::info!("Database migrations complete");

    // Create shutdown channels
    let (indexer_tx, indexer_rx) = tokio::sync::mpsc::channel::<()>(1);
    let (relay_tx, relay_rx) = tokio::sync::mpsc::channel::<()>(1);
    let (api_tx, api_rx) = tokio::sync::mpsc::channel::<()>(1);

    // Setup signal handlers
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = indexer_tx.send(()).await;
        let _ = relay_tx.send(()).await;
        let _ = api_tx.send(()).await;
    });

    // Create jobs
    let indexer = Arc::new(Indexer::from_config(&config, db.clone())?);
    let distributor = Arc::new(EvmDistributor::new(&config.destination, &config.relayer)?);
    let relay = Arc::new(RelayWorker::new(
        db.clone(),
        distributor,
        RelaySettings {
            confirmation_timeout: config.relayer.confirmation_timeout(),
            claim_lease: config.relayer.claim_lease(),
        },
    ));

    tracing::info!("Jobs initialized, starting processing");

    // Start status API server
    let api_handle = config.api_addr.map(|addr| {
        let api_db = db.clone();
        tokio::spawn(async move {
            if let Err(e) = api::start_api_server(addr, api_db, api_rx).await {
                tracing::error!(error = %e, "API server error");
            }
        })
    });

    // Both jobs stop ticking on shutdown and finish their in-flight run
    let (indexer_result, relay_result) = tokio::join!(
        run_periodic(indexer, config.indexer.interval(), indexer_rx),
        run_periodic(relay, config.relayer.interval(), relay_rx),
    );
    if let Err(e) = indexer_result {
        tracing::error!(error = %e, "Indexer error");
    }
    if let Err(e) = relay_result {
        tracing::error!(error = %e, "Relay worker error");
    }

    if let Some(handle) = api_handle {
        let _ = handle.await;
    }

    db.close().await;
    tracing::info!("Bridge relay stopped");
    Ok(())
}

/// Initialize tracing/logging with structured output
///
/// `LOG_FORMAT=json` switches to one JSON object per line.
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bridge_relay=debug"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .with(filter)
            .init();
    }
}

/// Wait for shutdown signals (SIGINT/SIGTERM)
async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
