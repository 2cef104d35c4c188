//! Actor owning the anti-spam registry.
//!
//! All registry mutation happens on one Tokio task. Inbound-event handlers,
//! the simulator link, the name cache, and preference panels talk to it via
//! [`AntispamEvent`] messages, so events for a source are always applied in
//! arrival order and nothing needs a lock.
//!
//! # Architecture
//!
//! - **State Ownership**: `AntispamActor` owns the `AntispamRegistry`.
//! - **Message Passing**: callers hold a cloneable [`AntispamHandle`].
//! - **Maintenance**: a purge sweep runs on an interval inside the same loop.
//! - **Teardown**: when the last handle drops (or on `Shutdown`) the loop
//!   ends and dropping the registry releases outstanding name requests.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::antispam::{
    AntispamRegistry, Category, NameResolution, ObjectMetadata, RegistryStats, SourceId,
    SourceKind,
};

/// Events that can be sent to the anti-spam actor.
#[derive(Debug)]
pub enum AntispamEvent {
    /// Count an inbound event.
    Check {
        category: Category,
        source: SourceId,
        kind: SourceKind,
        weight: u32,
        reply_tx: oneshot::Sender<bool>,
    },
    /// Run the line-break flood heuristic on a message.
    CheckTextFlood {
        category: Category,
        source: SourceId,
        kind: SourceKind,
        message: String,
        reply_tx: oneshot::Sender<bool>,
    },
    IsBlocked {
        category: Category,
        source: SourceId,
        reply_tx: oneshot::Sender<bool>,
    },
    IsCollisionSound {
        sound: SourceId,
        reply_tx: oneshot::Sender<bool>,
    },
    /// Externally decided block (e.g. a mute).
    ForceBlock {
        category: Category,
        source: SourceId,
    },
    /// Object name and owner delivered by the simulator.
    ObjectMetadata {
        object_id: SourceId,
        metadata: ObjectMetadata,
    },
    /// Name-cache callback.
    NameResolved(NameResolution),
    ConfigureCategory {
        category: Category,
        threshold: u32,
        window: Duration,
    },
    ConfigureGlobal {
        threshold: u32,
        window: Duration,
    },
    SetAllThresholds(u32),
    SetAllWindows(Duration),
    SetGlobalEnabled(bool),
    SetNewlineThreshold(usize),
    /// Clear one category, or everything when `None`.
    Clear(Option<Category>),
    /// Purge one category, or everything when `None`.
    Purge {
        category: Option<Category>,
        reply_tx: Option<oneshot::Sender<usize>>,
    },
    Stats {
        reply_tx: oneshot::Sender<RegistryStats>,
    },
    Shutdown,
}

/// Cloneable sender side of the anti-spam actor.
#[derive(Debug, Clone)]
pub struct AntispamHandle {
    tx: mpsc::Sender<AntispamEvent>,
}

impl AntispamHandle {
    /// Weak sender for collaborators that must not keep the actor alive.
    pub fn downgrade(&self) -> mpsc::WeakSender<AntispamEvent> {
        self.tx.downgrade()
    }

    pub async fn send(&self, event: AntispamEvent) {
        if self.tx.send(event).await.is_err() {
            warn!("anti-spam actor is gone; event dropped");
        }
    }

    async fn ask<T>(&self, event: AntispamEvent, reply_rx: oneshot::Receiver<T>) -> Option<T> {
        if self.tx.send(event).await.is_err() {
            return None;
        }
        reply_rx.await.ok()
    }

    /// Count an event. Fails open when the actor is gone.
    pub async fn check(
        &self,
        category: Category,
        source: SourceId,
        kind: SourceKind,
        weight: u32,
    ) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        let event = AntispamEvent::Check {
            category,
            source,
            kind,
            weight,
            reply_tx,
        };
        self.ask(event, reply_rx).await.unwrap_or_else(|| {
            warn!(source = %source, category = category.as_str(), "anti-spam actor unavailable; allowing event");
            true
        })
    }

    pub async fn check_text_flood(
        &self,
        category: Category,
        source: SourceId,
        kind: SourceKind,
        message: impl Into<String>,
    ) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        let event = AntispamEvent::CheckTextFlood {
            category,
            source,
            kind,
            message: message.into(),
            reply_tx,
        };
        self.ask(event, reply_rx).await.unwrap_or_else(|| {
            warn!(source = %source, category = category.as_str(), "anti-spam actor unavailable; allowing message");
            true
        })
    }

    pub async fn is_blocked(&self, category: Category, source: SourceId) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        let event = AntispamEvent::IsBlocked {
            category,
            source,
            reply_tx,
        };
        self.ask(event, reply_rx).await.unwrap_or(false)
    }

    pub async fn is_collision_sound(&self, sound: SourceId) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        let event = AntispamEvent::IsCollisionSound { sound, reply_tx };
        self.ask(event, reply_rx).await.unwrap_or(false)
    }

    /// Purge stale entries; returns how many were removed.
    pub async fn purge(&self, category: Option<Category>) -> usize {
        let (reply_tx, reply_rx) = oneshot::channel();
        let event = AntispamEvent::Purge {
            category,
            reply_tx: Some(reply_tx),
        };
        self.ask(event, reply_rx).await.unwrap_or(0)
    }

    pub async fn stats(&self) -> Option<RegistryStats> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.ask(AntispamEvent::Stats { reply_tx }, reply_rx).await
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(AntispamEvent::Shutdown).await;
    }
}

/// Owns the registry and processes events one at a time.
#[derive(Debug)]
pub struct AntispamActor {
    registry: AntispamRegistry,
    rx: mpsc::Receiver<AntispamEvent>,
    purge_interval: Duration,
}

impl AntispamActor {
    /// Create the event channel. The registry is built afterwards so
    /// collaborators can hold a weak sender.
    pub fn channel(capacity: usize) -> (AntispamHandle, mpsc::Receiver<AntispamEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (AntispamHandle { tx }, rx)
    }

    pub fn new(
        registry: AntispamRegistry,
        rx: mpsc::Receiver<AntispamEvent>,
        purge_interval: Duration,
    ) -> Self {
        Self {
            registry,
            rx,
            purge_interval,
        }
    }

    /// Spawn the actor on the current runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// The main actor loop.
    pub async fn run(mut self) {
        let mut purge = tokio::time::interval(self.purge_interval);
        purge.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        purge.tick().await;

        info!(purge_interval = ?self.purge_interval, "anti-spam actor started");
        loop {
            tokio::select! {
                event = self.rx.recv() => {
                    match event {
                        Some(AntispamEvent::Shutdown) | None => break,
                        Some(event) => self.handle_event(event),
                    }
                }
                _ = purge.tick() => {
                    let removed = self.registry.purge_all();
                    debug!(removed, "periodic anti-spam purge");
                }
            }
        }
        info!("anti-spam actor stopped");
    }

    fn handle_event(&mut self, event: AntispamEvent) {
        let registry = &mut self.registry;
        match event {
            AntispamEvent::Check {
                category,
                source,
                kind,
                weight,
                reply_tx,
            } => {
                let allowed = registry.check_weighted(category, source, kind, weight);
                let _ = reply_tx.send(allowed);
            }
            AntispamEvent::CheckTextFlood {
                category,
                source,
                kind,
                message,
                reply_tx,
            } => {
                let allowed = registry.check_text_flood(category, source, kind, &message);
                let _ = reply_tx.send(allowed);
            }
            AntispamEvent::IsBlocked {
                category,
                source,
                reply_tx,
            } => {
                let _ = reply_tx.send(registry.is_blocked(category, &source));
            }
            AntispamEvent::IsCollisionSound { sound, reply_tx } => {
                let _ = reply_tx.send(registry.is_collision_sound(&sound));
            }
            AntispamEvent::ForceBlock { category, source } => {
                registry.force_block(category, source);
            }
            AntispamEvent::ObjectMetadata {
                object_id,
                metadata,
            } => {
                registry.record_object_metadata(object_id, metadata);
            }
            AntispamEvent::NameResolved(resolution) => {
                registry.on_name_resolved(resolution);
            }
            AntispamEvent::ConfigureCategory {
                category,
                threshold,
                window,
            } => {
                info!(category = category.as_str(), threshold, window = ?window, "queue reconfigured");
                registry.configure_category(category, threshold, window);
            }
            AntispamEvent::ConfigureGlobal { threshold, window } => {
                info!(threshold, window = ?window, "global queue reconfigured");
                registry.configure_global(threshold, window);
            }
            AntispamEvent::SetAllThresholds(threshold) => registry.set_all_thresholds(threshold),
            AntispamEvent::SetAllWindows(window) => registry.set_all_windows(window),
            AntispamEvent::SetGlobalEnabled(enabled) => registry.set_global_enabled(enabled),
            AntispamEvent::SetNewlineThreshold(threshold) => {
                registry.set_newline_threshold(threshold)
            }
            AntispamEvent::Clear(Some(category)) => registry.clear_category(category),
            AntispamEvent::Clear(None) => registry.clear_all(),
            AntispamEvent::Purge { category, reply_tx } => {
                let removed = match category {
                    Some(category) => registry.purge_category(category),
                    None => registry.purge_all(),
                };
                if let Some(reply_tx) = reply_tx {
                    let _ = reply_tx.send(removed);
                }
            }
            AntispamEvent::Stats { reply_tx } => {
                let _ = reply_tx.send(registry.stats());
            }
            AntispamEvent::Shutdown => {}
        }
    }
}
