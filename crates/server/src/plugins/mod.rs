//! Event plugins: consumers that subscribe to a world's dispatcher.
//!
//! Every installed plugin gets its own `OwnerToken`, so uninstalling it
//! drops exactly its handlers and nobody else's.

pub mod logger;
pub mod metrics;

use std::sync::Arc;

use tickwatch_engine::WorldHost;
use tickwatch_engine::event::{Listener, OwnerToken};

pub use logger::EventLogger;
pub use metrics::EventMetrics;

pub trait Plugin: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Build the listener this plugin registers on one world.
    fn listener(self: Arc<Self>, host: &WorldHost) -> Listener;
}

/// A plugin registered on one world.
#[derive(Debug)]
pub struct Installed {
    pub name: &'static str,
    pub owner: OwnerToken,
    pub handlers: usize,
}

pub fn install<P: Plugin>(host: &WorldHost, plugin: Arc<P>) -> Installed {
    let name = plugin.name();
    let owner = host.dispatcher().new_owner();
    let listener = plugin.listener(host);
    let handlers = host.dispatcher().register_listener(owner, listener).len();
    tracing::info!(
        "Plugin '{}' installed on world {:?} as {:?} ({} handlers)",
        name,
        host.id(),
        owner,
        handlers
    );
    Installed { name, owner, handlers }
}

/// Drop every handler the plugin registered. Returns how many were removed.
pub fn uninstall(host: &WorldHost, installed: &Installed) -> usize {
    let removed = host.dispatcher().unregister_all(installed.owner);
    tracing::info!(
        "Plugin '{}' uninstalled from world {:?} ({} handlers)",
        installed.name,
        host.id(),
        removed
    );
    removed
}
