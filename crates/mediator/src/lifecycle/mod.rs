//! Mediator lifecycle: registration, configuration, then serving.
//!
//! ```text
//! Unregistered -> Registering -> FetchingConfig -> MergingConfig -> Starting -> Running
//! ```
//!
//! Any failure before `Running` is fatal and is returned to the caller; the
//! listener is never bound in that case. Once running, each config pushed on
//! the heartbeat re-enters the merge step over the original base tree, is
//! persisted, and is re-checked; a failure there is as fatal as at startup.
//! The listener keeps the port it was bound with.

pub mod prerequisites;

pub use prerequisites::{PrerequisiteCheck, PrerequisiteError, RequiredKeys};

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::anyhow;
use axum::Router;
use common::protocol::MediatorConfig;
use thiserror::Error;
use tokio::{net::TcpListener, sync::mpsc, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    config::{ConfigError, ConfigLoader, ConfigStore, ConfigTree, TLS_KEY},
    hub::{activate_heartbeat, HubApi, HubClient, HubError},
    server::{listener, tls},
};

/// Where the controller is in the boot sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unregistered,
    Registering,
    FetchingConfig,
    MergingConfig,
    Starting,
    Running,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to register with the hub")]
    Registration(#[source] HubError),

    #[error("failed to fetch config from the hub")]
    ConfigFetch(#[source] HubError),

    #[error("failed to apply runtime config")]
    ConfigPersist(#[source] ConfigError),

    #[error("runtime config is not usable")]
    Config(#[source] ConfigError),

    #[error(transparent)]
    Prerequisite(#[from] PrerequisiteError),

    #[error("failed to load TLS material: {0:#}")]
    Tls(anyhow::Error),

    #[error("failed to bind {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server stopped: {0:#}")]
    Serve(anyhow::Error),

    #[error("config update received before the mediator was running")]
    NotRunning,
}

/// A bound, serving mediator.
pub struct Running {
    /// Address the listener was bound to.
    pub local_addr: SocketAddr,
    server: JoinHandle<anyhow::Result<()>>,
    updates: mpsc::Receiver<ConfigTree>,
}

/// Drives the mediator from registration to a serving listener and applies
/// hub-pushed configuration afterwards. Sole writer of the [`ConfigStore`]
/// once started.
pub struct LifecycleController {
    hub: Arc<dyn HubClient>,
    loader: Arc<dyn ConfigLoader>,
    prerequisites: Arc<dyn PrerequisiteCheck>,
    store: ConfigStore,
    mediator: MediatorConfig,
    heartbeat_interval: Duration,
    state: LifecycleState,
    base: Option<ConfigTree>,
    urn: Option<String>,
}

impl LifecycleController {
    pub fn new(
        hub: Arc<dyn HubClient>,
        loader: Arc<dyn ConfigLoader>,
        prerequisites: Arc<dyn PrerequisiteCheck>,
        store: ConfigStore,
        mediator: MediatorConfig,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            hub,
            loader,
            prerequisites,
            store,
            mediator,
            heartbeat_interval,
            state: LifecycleState::Unregistered,
            base: None,
            urn: None,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[cfg(test)]
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    fn transition(&mut self, next: LifecycleState) {
        info!(from = ?self.state, to = ?next, "lifecycle transition");
        self.state = next;
    }

    /// Register, fetch and merge config, check prerequisites, then bind and
    /// serve `router`. `ready` is called once the listener is accepting.
    ///
    /// # Errors
    ///
    /// Any step failing stops the sequence; nothing is bound unless every
    /// step before `Starting` succeeded.
    pub async fn start<F>(&mut self, router: Router, ready: F) -> Result<Running, LifecycleError>
    where
        F: FnOnce(&Running),
    {
        self.transition(LifecycleState::Registering);
        let api = HubApi::from_config(&self.store.snapshot())
            .map_err(|e| LifecycleError::Registration(e.into()))?;
        let urn = self
            .hub
            .register(&api, &self.mediator)
            .await
            .map_err(LifecycleError::Registration)?;
        self.store.stamp_urn(&urn);

        self.transition(LifecycleState::FetchingConfig);
        let api = HubApi::from_config(&self.store.snapshot())
            .map_err(|e| LifecycleError::ConfigFetch(e.into()))?;
        let fetched = self
            .hub
            .fetch_config(&api)
            .await
            .map_err(LifecycleError::ConfigFetch)?;

        self.transition(LifecycleState::MergingConfig);
        let base = self.loader.load_base().map_err(LifecycleError::Config)?;
        let config = self
            .store
            .reload(&base, &fetched, &urn, &self.loader.cache_path())
            .await
            .map_err(LifecycleError::ConfigPersist)?;
        self.prerequisites.check(&config).await?;
        self.base = Some(base);
        self.urn = Some(urn);

        self.transition(LifecycleState::Starting);
        let port = config.port().map_err(LifecycleError::Config)?;
        let tls = match config.get(TLS_KEY) {
            Some(value) if !value.is_null() => {
                let files = config
                    .section::<tls::TlsFiles>(TLS_KEY)
                    .map_err(LifecycleError::Config)?;
                Some(tls::load(&files).await.map_err(LifecycleError::Tls)?)
            }
            _ => None,
        };
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let tcp = TcpListener::bind(addr)
            .await
            .map_err(|source| LifecycleError::Bind { addr, source })?;
        let local_addr = tcp
            .local_addr()
            .map_err(|source| LifecycleError::Bind { addr, source })?;
        let server = tokio::spawn(listener::serve(tcp, tls, router));
        let updates = activate_heartbeat(
            Arc::clone(&self.hub),
            self.store.clone(),
            self.heartbeat_interval,
        );

        self.transition(LifecycleState::Running);
        let running = Running {
            local_addr,
            server,
            updates,
        };
        info!(addr = %local_addr, "mediator running");
        ready(&running);
        Ok(running)
    }

    /// Apply one hub-pushed config: merge over the base tree, re-stamp the
    /// URN, persist, publish and re-check prerequisites.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::ConfigPersist`] leaves the previous config in place;
    /// [`LifecycleError::Prerequisite`] is reported after the swap.
    pub async fn apply_update(&mut self, update: ConfigTree) -> Result<(), LifecycleError> {
        let (Some(base), Some(urn)) = (self.base.as_ref(), self.urn.as_deref()) else {
            return Err(LifecycleError::NotRunning);
        };
        info!(keys = ?update.keys().collect::<Vec<_>>(), "applying pushed config");
        let config = self
            .store
            .reload(base, &update, urn, &self.loader.cache_path())
            .await
            .map_err(LifecycleError::ConfigPersist)?;
        self.prerequisites.check(&config).await?;
        Ok(())
    }

    /// Apply pushed configs until the server stops or an update fails.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Serve`] when the listener task ends; any error from
    /// [`apply_update`](Self::apply_update), which is as fatal as at startup.
    pub async fn run(&mut self, running: Running) -> Result<(), LifecycleError> {
        let Running {
            mut server,
            mut updates,
            ..
        } = running;
        loop {
            tokio::select! {
                exit = &mut server => return Err(server_exit(exit)),
                update = updates.recv() => match update {
                    Some(tree) => self.apply_update(tree).await?,
                    None => {
                        warn!("heartbeat stopped; serving without config updates");
                        return Err(server_exit(server.await));
                    }
                },
            }
        }
    }
}

fn server_exit(exit: Result<anyhow::Result<()>, tokio::task::JoinError>) -> LifecycleError {
    LifecycleError::Serve(match exit {
        Ok(Ok(())) => anyhow!("listener exited"),
        Ok(Err(e)) => e,
        Err(e) => e.into(),
    })
}
