#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Veltaros node entrypoint (systemd-friendly): loads configuration, loads
//! or creates the node identity and every persisted store, starts the peer
//! manager's accept/dial loops and the thin HTTP facade, and runs until
//! SIGINT/SIGTERM.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use veltaros_node::api::{self, ApiState};
use veltaros_node::config::{LogFormat, NodeConfig};
use veltaros_node::core::chain::ChainStore;
use veltaros_node::core::identity;
use veltaros_node::core::ledger::{Ledger, LedgerStore};
use veltaros_node::core::mempool::Mempool;
use veltaros_node::core::nonce::{NonceStore, NonceTracker};
use veltaros_node::monitoring::metrics::Metrics;
use veltaros_node::networking::banlist::{Banlist, BanlistStore};
use veltaros_node::networking::peer_manager::{PeerManager, PeerManagerConfig};
use veltaros_node::networking::peer_store::{KnownPeerStore, PeerStore};
use veltaros_node::networking::score::{ScoreStore, Scorer};

const SAVE_INTERVAL: Duration = Duration::from_secs(30);

fn config_path() -> PathBuf {
    std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("config.toml"))
}

fn init_logging(config: &veltaros_node::config::LogConfig) {
    let filter = match config.level {
        veltaros_node::config::LogLevel::Debug => "debug",
        veltaros_node::config::LogLevel::Info => "info",
        veltaros_node::config::LogLevel::Warn => "warn",
        veltaros_node::config::LogLevel::Error => "error",
    };
    let builder = tracing_subscriber::fmt().with_target(false).with_level(true).with_env_filter(filter);
    let _ = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.compact().try_init(),
    };
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("veltaros-node: fatal: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = NodeConfig::load(&config_path())?;
    init_logging(&config.log);
    info!(network_id = %config.network.id, dev_mode = config.dev_mode, "veltaros node starting");

    let identity = identity::load_or_create(Path::new(&config.paths.identity_key), Path::new(&config.paths.identity_record))?;
    info!(pubkey = %hex::encode(identity.public_key), "identity loaded");

    let metrics = Arc::new(Metrics::new().map_err(|_| anyhow::anyhow!("metrics registration failed"))?);

    let nonces = NonceTracker::new();
    let nonce_store = NonceStore::new(&config.paths.nonces);
    nonce_store.load_into(&nonces)?;

    let ledger = Ledger::new();
    let ledger_store = LedgerStore::new(&config.paths.ledger);
    ledger_store.load_into(&ledger)?;

    let mempool = Mempool::new();

    let chain = Arc::new(ChainStore::new(&config.paths.blocks));
    chain.load()?;
    metrics.chain_height.set(chain.height() as i64);

    let scorer = Scorer::new();
    let score_store = ScoreStore::new(&config.paths.score_store);
    score_store.load_into(&scorer)?;

    let banlist = Banlist::new();
    let banlist_store = BanlistStore::new(&config.paths.banlist);
    banlist_store.load_into(&banlist)?;

    let peer_store = PeerStore::new();
    let known_peer_store = KnownPeerStore::new(&config.paths.peer_store);
    known_peer_store.load_into(&peer_store)?;

    let peer_manager_config = PeerManagerConfig {
        listen_addr: config.network.listen.clone(),
        bootstrap: config.network.bootstrap.clone(),
        max_peers: config.network.max_peers as usize,
        dial_timeout: config.network.dial_timeout(),
        handshake_timeout: config.network.handshake_timeout(),
        network_id: config.network.id.clone(),
        node_version: env!("CARGO_PKG_VERSION").to_string(),
        peer_discovery_enabled: true,
    };
    let peer_manager = PeerManager::new(
        peer_manager_config,
        identity.private_key,
        identity.public_key,
        scorer,
        banlist,
        peer_store,
        Arc::clone(&metrics),
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let api_state = ApiState {
        network_id: config.network.id.clone(),
        dev_mode: config.dev_mode,
        mempool: Arc::new(mempool),
        nonces: Arc::new(nonces),
        ledger: Arc::new(ledger),
        chain: Arc::clone(&chain),
        ledger_path: PathBuf::from(&config.paths.ledger),
        nonce_path: PathBuf::from(&config.paths.nonces),
        metrics: Arc::clone(&metrics),
    };

    let api_listener = tokio::net::TcpListener::bind(&config.api.listen).await?;
    info!(addr = %config.api.listen, "api listening");
    let api_router = api::routes(api_state.clone());
    let mut api_shutdown = shutdown_rx.clone();
    let api_task = tokio::spawn(async move {
        axum::serve(api_listener, api_router)
            .with_graceful_shutdown(async move {
                let _ = api_shutdown.changed().await;
            })
            .await
    });

    let accept_task = tokio::spawn(Arc::clone(&peer_manager).run_accept_loop(shutdown_rx.clone()));
    let dial_task = tokio::spawn(Arc::clone(&peer_manager).run_dial_loop(shutdown_rx.clone()));

    let save_task = {
        let score_store = score_store;
        let banlist_store = banlist_store;
        let known_peer_store = known_peer_store;
        let ledger_store = ledger_store;
        let nonce_store = nonce_store;
        let peer_manager = Arc::clone(&peer_manager);
        let ledger = Arc::clone(&api_state.ledger);
        let nonces = Arc::clone(&api_state.nonces);
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(SAVE_INTERVAL) => {}
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
                metrics.peers_connected.set(peer_manager.peer_count() as i64);
                if let Err(e) = score_store.save(peer_manager.scorer()) {
                    warn!(err = %e, "failed to persist score store");
                }
                if let Err(e) = banlist_store.save(peer_manager.banlist()) {
                    warn!(err = %e, "failed to persist banlist");
                }
                if let Err(e) = known_peer_store.save(peer_manager.peer_store()) {
                    warn!(err = %e, "failed to persist peer store");
                }
                if let Err(e) = ledger_store.save(&ledger) {
                    warn!(err = %e, "failed to persist ledger");
                }
                if let Err(e) = nonce_store.save(&nonces) {
                    warn!(err = %e, "failed to persist nonces");
                }
            }
        })
    };

    wait_for_shutdown_signal().await;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = tokio::join!(api_task, accept_task, dial_task, save_task);
    info!("veltaros node stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
