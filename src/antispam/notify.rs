//! Block notifications and the object-name resolution pipeline.
//!
//! Blocking an agent produces a notice right away. Blocking an object needs
//! two lookups first: the object's name and owner (from the simulator), then
//! the owner's display name (from the name cache). Each block of an object
//! gets its own request id so a late answer for an older block is ignored.
//!
//! ```text
//!  block(object) ──► metadata known? ──no──► AwaitingProperties
//!                        │ yes                    │ record_object_metadata
//!                        ▼                        ▼
//!                 owner name cached? ──no──► AwaitingOwnerName
//!                        │ yes                    │ on_name_resolved
//!                        ▼                        ▼
//!                      notify ◄───────────────────┘
//! ```

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::category::{Category, SourceId, SourceKind};
use crate::metrics;

/// Identifier of an ad-hoc notification sent to the client's toast system.
pub const BLOCKED_NOTIFICATION_ID: &str = "AntiSpamBlocked";

/// Tag for one name-resolution request.
pub type RequestId = uuid::Uuid;

// ============================================================================
// Collaborators
// ============================================================================

/// Avatar display-name cache.
pub trait NameCache: Send + Sync {
    /// Name already available locally, without a round trip.
    fn cached_name(&self, id: &SourceId) -> Option<String>;

    /// Start resolving `id`. The answer must come back through
    /// [`AntispamRegistry::on_name_resolved`](super::AntispamRegistry::on_name_resolved)
    /// carrying the same `request`.
    fn request_name(&self, id: SourceId, request: RequestId);

    /// Forget a request. Its answer must not be delivered afterwards.
    fn release(&self, request: RequestId);
}

/// Simulator link used to ask for an object's name and owner.
pub trait ObjectQuery: Send + Sync {
    fn request_properties(&self, object_id: SourceId);
}

/// Client notification channel.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: BlockNotice);
}

/// Name and owner of an in-world object, as delivered by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub name: String,
    pub owner_id: SourceId,
}

/// Callback payload from the name cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameResolution {
    pub id: SourceId,
    pub name: Option<String>,
    pub request: RequestId,
}

// ============================================================================
// Notices
// ============================================================================

/// Which counter tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLayer {
    Category,
    Global,
}

impl BlockLayer {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Global => "global",
        }
    }
}

/// Settings of the queue that produced a block, captured at block time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    pub category: Category,
    pub layer: BlockLayer,
    pub threshold: u32,
    pub window: Duration,
}

/// A formatted "source was blocked" alert.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockNotice {
    pub notification_id: &'static str,
    pub source_id: SourceId,
    pub source_kind: SourceKind,
    pub source_name: String,
    pub owner_name: Option<String>,
    pub context: BlockContext,
    pub blocked_at: DateTime<Utc>,
}

impl BlockNotice {
    fn new(
        source_id: SourceId,
        source_kind: SourceKind,
        source_name: String,
        owner_name: Option<String>,
        context: BlockContext,
    ) -> Self {
        Self {
            notification_id: BLOCKED_NOTIFICATION_ID,
            source_id,
            source_kind,
            source_name,
            owner_name,
            context,
            blocked_at: Utc::now(),
        }
    }
}

impl fmt::Display for BlockNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AntiSpam: Blocked ")?;
        match &self.owner_name {
            Some(owner) => write!(f, "{} (owned by {})", self.source_name, owner)?,
            None => f.write_str(&self.source_name)?,
        }
        write!(f, " for spamming a {}", self.context.category)?;
        if self.context.layer == BlockLayer::Global {
            f.write_str(" (global)")?;
        }
        write!(
            f,
            " ({}) times in {} seconds.",
            self.context.threshold,
            self.context.window.as_secs()
        )
    }
}

// ============================================================================
// Pending requests
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingState {
    AwaitingProperties,
    AwaitingOwnerName,
}

/// An object block waiting for its names before the notice goes out.
#[derive(Debug, Clone)]
pub struct PendingNotification {
    pub object_id: SourceId,
    pub request: RequestId,
    pub context: BlockContext,
    pub object_name: Option<String>,
    pub owner_id: Option<SourceId>,
    pub state: PendingState,
    pub created_at: Instant,
}

/// Pending object notifications, keyed by request id with an index from
/// object id to its current request.
pub struct NotificationPipeline {
    names: Arc<dyn NameCache>,
    objects: Arc<dyn ObjectQuery>,
    notifier: Arc<dyn Notifier>,
    pending: HashMap<RequestId, PendingNotification>,
    current: HashMap<SourceId, RequestId>,
    ttl: Duration,
}

impl NotificationPipeline {
    pub fn new(
        names: Arc<dyn NameCache>,
        objects: Arc<dyn ObjectQuery>,
        notifier: Arc<dyn Notifier>,
        ttl: Duration,
    ) -> Self {
        Self {
            names,
            objects,
            notifier,
            pending: HashMap::new(),
            current: HashMap::new(),
            ttl,
        }
    }

    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = ttl;
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Current pending record for an object, if any.
    pub fn pending_for(&self, object_id: &SourceId) -> Option<&PendingNotification> {
        self.current
            .get(object_id)
            .and_then(|request| self.pending.get(request))
    }

    /// Notify about a blocked agent using whatever name is cached now.
    pub fn notify_agent(&self, agent_id: SourceId, context: BlockContext) {
        let name = self
            .names
            .cached_name(&agent_id)
            .unwrap_or_else(|| agent_id.to_string());
        self.emit(BlockNotice::new(agent_id, SourceKind::Agent, name, None, context));
    }

    /// Start the pipeline for a freshly blocked object.
    pub fn begin_object(
        &mut self,
        object_id: SourceId,
        context: BlockContext,
        metadata: Option<&ObjectMetadata>,
        now: Instant,
    ) {
        if let Some(previous) = self.current.remove(&object_id) {
            debug!(object = %object_id, request = %previous, "superseding pending object notification");
            self.drop_request(previous);
        }

        let request = RequestId::new_v4();
        let mut record = PendingNotification {
            object_id,
            request,
            context,
            object_name: None,
            owner_id: None,
            state: PendingState::AwaitingProperties,
            created_at: now,
        };

        match metadata {
            Some(meta) => {
                record.object_name = Some(meta.name.clone());
                record.owner_id = Some(meta.owner_id);
                self.resolve_owner(record);
            }
            None => {
                debug!(object = %object_id, request = %request, "requesting object properties");
                self.objects.request_properties(object_id);
                self.insert(record);
            }
        }
        metrics::set_pending_notifications(self.pending.len());
    }

    /// Feed object properties to a pending record waiting for them.
    pub fn on_object_metadata(&mut self, object_id: SourceId, metadata: &ObjectMetadata) {
        let Some(request) = self.current.get(&object_id).copied() else {
            return;
        };
        let waiting = self
            .pending
            .get(&request)
            .is_some_and(|p| p.state == PendingState::AwaitingProperties);
        if !waiting {
            return;
        }
        let Some(mut record) = self.take(request) else {
            return;
        };
        record.object_name = Some(metadata.name.clone());
        record.owner_id = Some(metadata.owner_id);
        self.resolve_owner(record);
        metrics::set_pending_notifications(self.pending.len());
    }

    /// Complete a pending record from a name-cache callback. Returns whether
    /// the callback matched a live request.
    pub fn on_name_resolved(&mut self, resolution: NameResolution) -> bool {
        let matches = self.pending.get(&resolution.request).is_some_and(|p| {
            p.state == PendingState::AwaitingOwnerName && p.owner_id == Some(resolution.id)
        });
        if !matches {
            debug!(
                id = %resolution.id,
                request = %resolution.request,
                "discarding stale name resolution"
            );
            return false;
        }
        let Some(record) = self.take(resolution.request) else {
            return false;
        };
        self.names.release(record.request);

        let owner = resolution.name.unwrap_or_else(|| resolution.id.to_string());
        self.emit_object(record, owner);
        metrics::set_pending_notifications(self.pending.len());
        true
    }

    /// Drop records older than the TTL. Returns the number dropped.
    pub fn expire(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let expired: Vec<RequestId> = self
            .pending
            .values()
            .filter(|p| now.saturating_duration_since(p.created_at) > ttl)
            .map(|p| p.request)
            .collect();
        for request in &expired {
            if let Some(record) = self.take(*request) {
                warn!(
                    object = %record.object_id,
                    request = %record.request,
                    state = ?record.state,
                    "object notification expired before names resolved"
                );
                self.release_if_issued(&record);
            }
        }
        if !expired.is_empty() {
            metrics::set_pending_notifications(self.pending.len());
        }
        expired.len()
    }

    fn resolve_owner(&mut self, mut record: PendingNotification) {
        let Some(owner_id) = record.owner_id else {
            return;
        };
        if let Some(owner) = self.names.cached_name(&owner_id) {
            self.emit_object(record, owner);
            return;
        }
        debug!(
            object = %record.object_id,
            owner = %owner_id,
            request = %record.request,
            "requesting owner name"
        );
        record.state = PendingState::AwaitingOwnerName;
        let request = record.request;
        self.insert(record);
        self.names.request_name(owner_id, request);
    }

    fn emit_object(&self, record: PendingNotification, owner: String) {
        let name = record
            .object_name
            .unwrap_or_else(|| record.object_id.to_string());
        self.emit(BlockNotice::new(
            record.object_id,
            SourceKind::Object,
            name,
            Some(owner),
            record.context,
        ));
    }

    fn emit(&self, notice: BlockNotice) {
        debug!(
            source = %notice.source_id,
            kind = %notice.source_kind,
            category = notice.context.category.as_str(),
            layer = notice.context.layer.as_str(),
            "emitting block notice"
        );
        metrics::record_notice(notice.source_kind);
        self.notifier.notify(notice);
    }

    fn insert(&mut self, record: PendingNotification) {
        self.current.insert(record.object_id, record.request);
        self.pending.insert(record.request, record);
    }

    fn take(&mut self, request: RequestId) -> Option<PendingNotification> {
        let record = self.pending.remove(&request)?;
        if self.current.get(&record.object_id) == Some(&request) {
            self.current.remove(&record.object_id);
        }
        Some(record)
    }

    fn drop_request(&mut self, request: RequestId) {
        if let Some(record) = self.take(request) {
            self.release_if_issued(&record);
        }
    }

    fn release_if_issued(&self, record: &PendingNotification) {
        if record.state == PendingState::AwaitingOwnerName {
            self.names.release(record.request);
        }
    }
}

impl fmt::Debug for NotificationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationPipeline")
            .field("pending", &self.pending.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl Drop for NotificationPipeline {
    fn drop(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        debug!(pending = self.pending.len(), "releasing outstanding name requests");
        for record in self.pending.values() {
            self.release_if_issued(record);
        }
        self.pending.clear();
        self.current.clear();
        metrics::set_pending_notifications(0);
    }
}
