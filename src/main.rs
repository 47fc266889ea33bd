use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use media_library::{
    api,
    config::{Config, RecordsBackend, SessionMode, StorageBackend},
    object_store as obj,
    records::{EmbeddedRecords, RecordStore, RemoteRecords},
    session::{HttpSessionResolver, SessionResolver, StaticSessionResolver},
    storage::Database,
    upload::LibraryEvent,
    AppState,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "media-library starting");

    // Load configuration
    let config = Config::load()?;

    // Initialize object store backend
    let object_store: Arc<dyn obj::ObjectStore> = match config.storage.backend {
        StorageBackend::Local => {
            let store = obj::LocalStore::new(
                &config.storage.local_storage_path,
                &config.node.public_base_url,
            )?;
            info!(
                "Using local storage backend at: {}",
                config.storage.local_storage_path
            );
            Arc::new(store)
        }
        StorageBackend::Azure => {
            let endpoint = config
                .azure_endpoint()
                .expect("AZURE_STORAGE_ACCOUNT validated in config");
            let store = obj::AzureBlobStore::new(
                &endpoint,
                &config.storage.azure_container,
                config.storage.azure_sas_token.as_deref().unwrap_or_default(),
            )?;
            info!(
                "Using Azure blob backend at: {}/{}",
                endpoint, config.storage.azure_container
            );
            Arc::new(store)
        }
    };

    // Initialize record store backend
    let (db, records): (Option<Database>, Arc<dyn RecordStore>) = match config.records.backend {
        RecordsBackend::Embedded => {
            let db = Database::open(&config.node.data_dir)?;
            info!("Database opened at: {}", config.node.data_dir);
            (Some(db.clone()), Arc::new(EmbeddedRecords::new(db)))
        }
        RecordsBackend::Remote => {
            let url = config
                .records
                .api_url
                .as_deref()
                .expect("RECORDS_API_URL validated in config");
            info!("Using remote record API at: {}", url);
            (None, Arc::new(RemoteRecords::new(url)?))
        }
    };

    // Initialize session resolver
    let sessions: Arc<dyn SessionResolver> = match config.session.mode {
        SessionMode::Http => {
            info!("Resolving sessions against: {}", config.session.url);
            Arc::new(HttpSessionResolver::new(&config.session.url)?)
        }
        SessionMode::Dev => Arc::new(StaticSessionResolver::user(
            &config.session.dev_user_id,
            &config.session.dev_user_name,
        )),
    };

    // Create shared state
    let state = Arc::new(AppState::new(
        config.clone(),
        db,
        object_store,
        records,
        sessions,
    ));

    let event_log = tokio::spawn(log_library_events(state.library.subscribe()));

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.node.bind_address).await?;
    info!("Listening on: {}", config.node.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    event_log.abort();
    info!("Shutdown complete");
    Ok(())
}

async fn log_library_events(mut events: tokio::sync::broadcast::Receiver<LibraryEvent>) {
    use tokio::sync::broadcast::error::RecvError;

    loop {
        match events.recv().await {
            Ok(LibraryEvent::Uploaded(record)) => {
                info!(file_id = %record.id, author_id = %record.author_id, "File uploaded");
            }
            Ok(LibraryEvent::PublishChanged { id, is_published }) => {
                info!(file_id = %id, is_published, "Publish state changed");
            }
            Ok(LibraryEvent::Deleted { id }) => {
                info!(file_id = %id, "File deleted");
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Library event log lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
