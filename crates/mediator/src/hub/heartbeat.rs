//! The heartbeat channel: periodic liveness signals to the hub, yielding each
//! pushed configuration as an event.
//!
//! The task only reads the runtime config (for hub coordinates); applying a
//! pushed config is left to the single writer on the receiving end.

use std::{sync::Arc, time::Duration};

use tokio::{sync::mpsc, time, time::Instant};
use tracing::{info, warn};

use super::{HubApi, HubClient};
use crate::config::{ConfigStore, ConfigTree};

/// Buffered config events; the hub pushes rarely.
const EVENT_BUFFER: usize = 8;

/// Spawn the heartbeat task and return the stream of pushed configs.
///
/// The first beat fires immediately and asks the hub for its current config;
/// later beats fire every `interval`. Failed beats are logged and retried on
/// the next tick. The task runs until the receiver is dropped.
pub fn activate_heartbeat(
    hub: Arc<dyn HubClient>,
    config: ConfigStore,
    interval: Duration,
) -> mpsc::Receiver<ConfigTree> {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    tokio::spawn(async move {
        let started = Instant::now();
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        let mut force_config = true;
        loop {
            ticker.tick().await;
            let api = match HubApi::from_config(&config.snapshot()) {
                Ok(api) => api,
                Err(e) => {
                    warn!(error = %e, "heartbeat skipped: hub coordinates unavailable");
                    continue;
                }
            };
            let uptime = started.elapsed().as_secs_f64();
            match hub.heartbeat(&api, uptime, force_config).await {
                Ok(Some(tree)) => {
                    force_config = false;
                    info!(keys = tree.len(), "hub pushed config");
                    if tx.send(tree).await.is_err() {
                        info!("config receiver dropped; heartbeat stopped");
                        return;
                    }
                }
                Ok(None) => force_config = false,
                Err(e) => warn!(error = %e, "heartbeat failed"),
            }
        }
    });
    rx
}
