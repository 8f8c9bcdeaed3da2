use std::net::SocketAddr;
use std::sync::Arc;

use route_auth::config::AuthSettings;
use route_auth::store::{CredentialStore, InMemoryCredentialStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let settings = AuthSettings::from_env()?;

    let store = match &settings.principals_file {
        Some(path) => InMemoryCredentialStore::from_file(path)?,
        None => {
            tracing::warn!("PRINCIPALS_FILE not set; no principal can log in");
            InMemoryCredentialStore::default()
        }
    };
    tracing::info!(principals = store.len(), "credential store loaded");

    let store: Arc<dyn CredentialStore> = Arc::new(store);
    let app = route_auth::create_app(&settings, store)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
