//! Assembles the components and serves the HTTP surface.

use crate::application::client_action::{ClientActionBuilder, CspProxy};
use crate::application::notifier::ChallengeCompletionNotifier;
use crate::application::orchestrator::{CallbackRoutes, ChallengeSessionOrchestrator};
use crate::application::poller::RedirectStatusPoller;
use crate::application::step_builder::BrowserFlowStepBuilder;
use crate::config::GatewayConfig;
use crate::domain::ports::{
    AuthenticationServerRef, InstrumentStoreRef, OrderAttachmentClientRef, SessionStoreRef,
};
use crate::error::StartupError;
use crate::infrastructure::http::{
    HttpAuthenticationServer, HttpInstrumentStore, HttpOrderAttachmentClient, build_client,
};
use crate::infrastructure::in_memory::InMemorySessionStore;
use crate::interfaces::http::{AppState, router};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// The adapters the components run against.
pub struct Adapters {
    pub sessions: SessionStoreRef,
    pub auth_server: AuthenticationServerRef,
    pub instruments: InstrumentStoreRef,
    pub orders: OrderAttachmentClientRef,
}

impl Adapters {
    /// HTTP clients for every upstream named in `config`, sharing one pool.
    pub fn http(config: &GatewayConfig, sessions: SessionStoreRef) -> Result<Self, StartupError> {
        let http = build_client()?;
        Ok(Self {
            sessions,
            auth_server: Arc::new(HttpAuthenticationServer::new(
                &config.upstream.authentication_server_url,
                http.clone(),
            )),
            instruments: Arc::new(HttpInstrumentStore::new(
                &config.upstream.instrument_store_url,
                http.clone(),
            )),
            orders: Arc::new(HttpOrderAttachmentClient::new(
                &config.upstream.order_attachment_url,
                http,
            )),
        })
    }
}

/// Which session store the process ended up with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStorage {
    InMemory,
    RocksDb(PathBuf),
    /// A path was requested but this build has no persistent backend.
    InMemoryFallback(PathBuf),
}

impl fmt::Display for SessionStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InMemory => f.write_str("in-memory"),
            Self::RocksDb(path) => write!(f, "rocksdb ({})", path.display()),
            Self::InMemoryFallback(path) => {
                write!(f, "in-memory (fallback for {})", path.display())
            }
        }
    }
}

pub fn open_session_store(
    db_path: Option<&Path>,
) -> Result<(SessionStoreRef, SessionStorage), StartupError> {
    match db_path {
        None => Ok((Arc::new(InMemorySessionStore::new()), SessionStorage::InMemory)),
        Some(path) => open_persistent(path),
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_persistent(path: &Path) -> Result<(SessionStoreRef, SessionStorage), StartupError> {
    let store = crate::infrastructure::rocksdb::RocksDbSessionStore::open(path)?;
    Ok((Arc::new(store), SessionStorage::RocksDb(path.to_path_buf())))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_persistent(path: &Path) -> Result<(SessionStoreRef, SessionStorage), StartupError> {
    Ok((
        Arc::new(InMemorySessionStore::new()),
        SessionStorage::InMemoryFallback(path.to_path_buf()),
    ))
}

/// Wires the five components together.
pub fn build_state(config: &GatewayConfig, adapters: Adapters) -> Result<AppState, StartupError> {
    let signer = config.signer()?;
    let timeout = config.upstream_timeout();

    let csp_proxy = config
        .browser
        .csp_proxy_enabled
        .then(|| CspProxy::new(&config.public_base_url, signer.clone()));
    let actions = ClientActionBuilder::new(csp_proxy);
    let steps = Arc::new(BrowserFlowStepBuilder::new(
        actions.clone(),
        adapters.orders,
        timeout,
    ));

    let orchestrator = Arc::new(ChallengeSessionOrchestrator::new(
        adapters.sessions,
        adapters.instruments,
        adapters.auth_server.clone(),
        steps.clone(),
        signer,
        config.toggles(),
        CallbackRoutes::new(&config.public_base_url),
        timeout,
    ));
    let notifier = Arc::new(ChallengeCompletionNotifier::new(
        orchestrator.clone(),
        adapters.auth_server,
        steps.clone(),
        config.browser.failure_return_url.clone(),
        timeout,
    ));
    let poller = Arc::new(RedirectStatusPoller::new(
        orchestrator.clone(),
        steps,
        &config.poller.status_check_resource,
        config.poller.status_check_overrides.clone(),
    ));

    Ok(AppState {
        orchestrator,
        notifier,
        poller,
        actions,
        post_message_origin: Arc::from(config.browser.post_message_target_origin.as_str()),
    })
}

pub async fn serve(listen_addr: SocketAddr, state: AppState) -> Result<(), StartupError> {
    let listener = TcpListener::bind(listen_addr).await?;
    info!(%listen_addr, "Challenge gateway listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
