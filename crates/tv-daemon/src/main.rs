mod core;
mod http;
mod socket;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tv_proto::catalog::HttpCatalog;
use tv_proto::config::Config;
use tv_proto::favorites::FavoritesFile;
use tv_proto::locale::{resolve_user_meta, SystemSettings};
use tv_proto::protocol::QuickSelectView;
use tv_proto::state::CatalogEngine;

#[derive(Debug, Clone)]
pub enum BroadcastMessage {
    StateUpdated,
    QuickSelect(QuickSelectView),
    /// Short user-facing notice, e.g. a favorites toggle.
    Alert(String),
    Log(String),
    Error(String),
}

/// A custom tracing layer that forwards log messages to the broadcast channel
struct BroadcastLayer {
    sender: broadcast::Sender<BroadcastMessage>,
}

impl BroadcastLayer {
    fn new(sender: broadcast::Sender<BroadcastMessage>) -> Self {
        Self { sender }
    }
}

impl<S> tracing_subscriber::Layer<S> for BroadcastLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        // WARN and ERROR only
        let level = event.metadata().level();
        if !matches!(*level, tracing::Level::WARN | tracing::Level::ERROR) {
            return;
        }

        let now = chrono::Local::now();
        let mut message = format!("{} [{}] ", now.format("%H:%M:%S"), level);

        let mut visitor = MessageVisitor(&mut message);
        event.record(&mut visitor);

        // No receivers is fine
        let _ = self.sender.send(BroadcastMessage::Log(message));
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl<'a> tracing::field::Visit for MessageVisitor<'a> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        } else {
            self.0.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Broadcast channel first so logging can feed it
    let (broadcast_tx, _) = broadcast::channel::<BroadcastMessage>(100);

    let data_dir = tv_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(BroadcastLayer::new(broadcast_tx.clone()))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,tv_daemon=debug,tv_proto=debug")
            }),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    let settings = SystemSettings::from_env();
    let user_meta = resolve_user_meta(settings.as_ref(), config.catalog.locale.as_deref());
    info!(
        "Viewer locale: country={} lang={}",
        user_meta.country_code, user_meta.lang_code
    );

    let source = HttpCatalog::new(&config.catalog)?;
    let engine = CatalogEngine::new(
        Arc::new(source),
        FavoritesFile::new(config.daemon.favorites_file.clone()),
        config.navigation.background_prefetch,
    );

    // Event channel: every transport funnels into DaemonCore
    let (event_tx, event_rx) = tokio::sync::mpsc::channel::<core::DaemonEvent>(256);

    let daemon_core = core::DaemonCore::new(
        engine.clone(),
        config.quick_select.clone(),
        broadcast_tx.clone(),
        event_tx.clone(),
    );

    let _socket_handle = socket::start_server(
        config.http.bind_address.clone(),
        tv_proto::platform::DAEMON_TCP_PORT,
        engine.clone(),
        event_tx.clone(),
        broadcast_tx.clone(),
    );

    if config.http.enabled {
        let _http_handle = http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            engine.clone(),
            daemon_core.quick_select_view(),
            event_tx.clone(),
        );
    }

    // Clients see the loading state until startup finishes
    let startup_engine = engine.clone();
    tokio::spawn(async move {
        match startup_engine.initialize(user_meta).await {
            Ok(prefetch) => {
                let loaded = prefetch.join().await;
                info!("Startup prefetch added {} groups", loaded);
            }
            Err(e) => error!("Catalog startup failed: {}", e),
        }
    });

    let shutdown_tx = event_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(core::DaemonEvent::Shutdown).await;
        }
    });

    info!("Daemon initialised, running event loop");
    daemon_core.run(event_rx).await?;

    Ok(())
}
