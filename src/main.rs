mod config;
mod domain;
mod error;
mod koreader_api;
mod library;
mod storage;

use std::{path::Path, sync::Arc, time::Duration};

use config::Config;
use koreader_api::{KoreaderApi, services::progress::DeviceInfo};
use library::LibraryScanner;
use poem::{
    EndpointExt, Route, Server,
    listener::TcpListener,
    middleware::{Cors, Tracing as PoemTracing},
};
use poem_openapi::OpenApiService;
use storage::{DbStore, SettingsRepo};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder, prelude::*};

type KosyncResult<T> = anyhow::Result<T>;

#[tokio::main]
async fn main() -> KosyncResult<()> {
    // Respect RUST_LOG if set, default to info for our crate and warn for the database stack.
    let default_filter = format!(
        "{}=info,poem=info,sea_orm=warn,sqlx=warn",
        env!("CARGO_PKG_NAME")
    );
    let env_filter = std::env::var("RUST_LOG").unwrap_or(default_filter);
    SubscriberBuilder::default()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .with_level(true)
        .pretty()
        .finish()
        .with(ErrorLayer::default())
        .init();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting kosync bridge"
    );
    // Load environment variables from .env files
    if Path::new(".env.local").exists() {
        dotenvy::from_filename(".env.local")?;
    } else if Path::new(".env").exists() {
        dotenvy::from_filename(".env")?;
    };
    let config = Config::load()?;
    if let Err(e) = config.validate() {
        return Err(anyhow::anyhow!(e));
    }

    let store = Arc::new(DbStore::connect(&config.db_connection_string).await?);

    if let (Some(username), Some(api_key)) = (&config.bootstrap_username, &config.bootstrap_api_key)
    {
        let user = store.ensure_user(username, api_key).await?;
        tracing::info!(username = %user.username, "bootstrap user ready");
    }

    let install_id = match &config.install_id {
        Some(id) if !id.is_empty() => id.clone(),
        _ => store.install_id().await?,
    };
    let device = Arc::new(DeviceInfo {
        name: config.device_name.clone(),
        id: install_id,
    });
    tracing::info!(device = %device.name, device_id = %device.id, "configured sync device");

    if let Some(root) = &config.library_path {
        let extensions = config.library_extensions();
        LibraryScanner::new(store.as_ref(), root, extensions.clone())
            .scan()
            .await?;
        if config.library_scan_interval_secs > 0 {
            library::spawn_periodic_scan(
                store.clone(),
                root.into(),
                extensions,
                Duration::from_secs(config.library_scan_interval_secs),
            );
        }
    }

    run_poem(store, Arc::new(config), device).await?;
    Ok(())
}

pub async fn run_poem(
    store: Arc<DbStore>,
    config: Arc<Config>,
    device: Arc<DeviceInfo>,
) -> KosyncResult<()> {
    let version = env!("CARGO_PKG_VERSION");
    let api = KoreaderApi { store, device };
    let api_service = OpenApiService::new(api, "KOReader Sync Bridge", version)
        .server(config.base_path.clone());
    let ui = api_service.rapidoc();
    let spec = api_service.spec();
    let route = Route::new()
        .nest(config.base_path.as_str(), api_service)
        .nest("/ui", ui)
        .nest("/spec", poem::endpoint::make_sync(move |_| spec.clone()))
        .with(Cors::new())
        .with(PoemTracing);

    let bind_addr = config.bind_addr.as_str();
    tracing::info!(%bind_addr, base_path = %config.base_path, "starting HTTP server");
    Server::new(TcpListener::bind(bind_addr)).run(route).await?;
    Ok(())
}
