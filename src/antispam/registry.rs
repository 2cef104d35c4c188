//! The anti-spam registry: eight category queues plus a global queue.
//!
//! Every inbound event is counted twice, once in its category queue and once
//! in the source-keyed global queue (when enabled). The event is allowed only
//! if neither layer blocks it. The first block in a window triggers a notice;
//! repeated denials in the same window stay silent.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::category::{Category, SourceId, SourceKind};
use super::clock::Clock;
use super::notify::{
    BlockContext, BlockLayer, NameCache, NameResolution, NotificationPipeline, Notifier,
    ObjectMetadata, ObjectQuery,
};
use super::queue::{CheckOutcome, SpamQueue};
use crate::config::AntispamConfig;
use crate::metrics;

/// Default line-break count above which a single message counts as a flood.
pub const DEFAULT_NEWLINE_THRESHOLD: usize = 10;

/// External services the registry talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub names: Arc<dyn NameCache>,
    pub objects: Arc<dyn ObjectQuery>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

/// Anti-spam state for one client session.
///
/// Owned by a single event-processing task; nothing here is shared across
/// threads while mutating.
pub struct AntispamRegistry {
    queues: [SpamQueue; Category::COUNT],
    global: SpamQueue,
    global_enabled: bool,
    sound_multiplier: u32,
    sound_preload_multiplier: u32,
    newline_threshold: usize,
    collision_sounds: HashSet<SourceId>,
    objects: HashMap<SourceId, KnownObject>,
    pipeline: NotificationPipeline,
    clock: Arc<dyn Clock>,
}

/// Object metadata and when it arrived.
#[derive(Debug, Clone)]
struct KnownObject {
    metadata: ObjectMetadata,
    recorded_at: Instant,
}

/// Entry counts, for the `stats` replay command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub entries: [usize; Category::COUNT],
    pub global_entries: usize,
    pub global_enabled: bool,
    pub pending_notifications: usize,
    pub known_objects: usize,
}

impl RegistryStats {
    pub fn total_entries(&self) -> usize {
        self.entries.iter().sum::<usize>() + self.global_entries
    }
}

impl AntispamRegistry {
    /// Build a registry from configuration.
    pub fn new(config: &AntispamConfig, pending_ttl: Duration, collaborators: Collaborators) -> Self {
        let Collaborators {
            names,
            objects,
            notifier,
            clock,
        } = collaborators;

        let queues = Category::ALL.map(|category| {
            let limits = config.limits_for(category);
            SpamQueue::new(limits.threshold, limits.window())
        });

        let registry = Self {
            queues,
            global: SpamQueue::new(config.global.threshold, config.global.window()),
            global_enabled: config.global_enabled,
            sound_multiplier: config.sound_multiplier,
            sound_preload_multiplier: config.sound_preload_multiplier,
            newline_threshold: config.newline_threshold,
            collision_sounds: config.collision_sounds.iter().copied().collect(),
            objects: HashMap::new(),
            pipeline: NotificationPipeline::new(names, objects, notifier, pending_ttl),
            clock,
        };

        info!(
            global_enabled = registry.global_enabled,
            newline_threshold = registry.newline_threshold,
            collision_sounds = registry.collision_sounds.len(),
            "anti-spam registry initialized"
        );
        registry
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    pub fn set_global_enabled(&mut self, enabled: bool) {
        self.global_enabled = enabled;
    }

    pub fn global_enabled(&self) -> bool {
        self.global_enabled
    }

    pub fn configure_global(&mut self, threshold: u32, window: Duration) {
        self.global.configure(threshold, window);
    }

    pub fn configure_category(&mut self, category: Category, threshold: u32, window: Duration) {
        self.queues[category.index()].configure(threshold, window);
    }

    /// Apply one threshold to every category. The two sound queues scale it
    /// by their multipliers.
    pub fn set_all_thresholds(&mut self, threshold: u32) {
        for category in Category::ALL {
            let scaled = threshold.saturating_mul(self.multiplier(category));
            self.queues[category.index()].set_threshold(scaled);
        }
    }

    pub fn set_all_windows(&mut self, window: Duration) {
        for queue in &mut self.queues {
            queue.set_window(window);
        }
    }

    pub fn set_sound_multipliers(&mut self, sound: u32, sound_preload: u32) {
        self.sound_multiplier = sound;
        self.sound_preload_multiplier = sound_preload;
    }

    fn multiplier(&self, category: Category) -> u32 {
        match category {
            Category::Sound => self.sound_multiplier,
            Category::SoundPreload => self.sound_preload_multiplier,
            _ => 1,
        }
    }

    pub fn set_newline_threshold(&mut self, threshold: usize) {
        self.newline_threshold = threshold;
    }

    pub fn newline_threshold(&self) -> usize {
        self.newline_threshold
    }

    pub fn set_pending_ttl(&mut self, ttl: Duration) {
        self.pipeline.set_ttl(ttl);
    }

    /// Read-only view of a category queue.
    pub fn queue(&self, category: Category) -> &SpamQueue {
        &self.queues[category.index()]
    }

    pub fn global_queue(&self) -> &SpamQueue {
        &self.global
    }

    pub fn pipeline(&self) -> &NotificationPipeline {
        &self.pipeline
    }

    // ------------------------------------------------------------------
    // Checks
    // ------------------------------------------------------------------

    /// Count one event from `source`. Returns `true` if the event may be
    /// processed.
    pub fn check(&mut self, category: Category, source: SourceId, kind: SourceKind) -> bool {
        self.check_weighted(category, source, kind, 1)
    }

    /// Count `weight` events from `source` at once.
    pub fn check_weighted(
        &mut self,
        category: Category,
        source: SourceId,
        kind: SourceKind,
        weight: u32,
    ) -> bool {
        let now = self.clock.now();
        let local = self.queues[category.index()].check(source, weight, now);
        let global = if self.global_enabled {
            self.global.check(source, weight, now)
        } else {
            CheckOutcome::Allowed
        };
        let allowed = !local.is_blocked() && !global.is_blocked();
        metrics::record_check(category, allowed);

        let tripped = if local == CheckOutcome::BlockedNew {
            Some(self.context(category, BlockLayer::Category))
        } else if global == CheckOutcome::BlockedNew {
            Some(self.context(category, BlockLayer::Global))
        } else {
            None
        };

        if let Some(context) = tripped {
            debug!(
                source = %source,
                kind = %kind,
                category = category.as_str(),
                layer = context.layer.as_str(),
                "source blocked"
            );
            metrics::record_block(context.layer, kind);
            match kind {
                SourceKind::Agent => self.pipeline.notify_agent(source, context),
                SourceKind::Object => {
                    let metadata = self.objects.get(&source).map(|known| &known.metadata);
                    self.pipeline.begin_object(source, context, metadata, now);
                }
            }
        }

        allowed
    }

    fn context(&self, category: Category, layer: BlockLayer) -> BlockContext {
        let queue = match layer {
            BlockLayer::Category => &self.queues[category.index()],
            BlockLayer::Global => &self.global,
        };
        BlockContext {
            category,
            layer,
            threshold: queue.threshold(),
            window: queue.window(),
        }
    }

    /// Treat a message with too many line breaks as that many events.
    /// Messages at or under the threshold are allowed without counting.
    pub fn check_text_flood(
        &mut self,
        category: Category,
        source: SourceId,
        kind: SourceKind,
        message: &str,
    ) -> bool {
        let newlines = count_newlines(message);
        if newlines <= self.newline_threshold {
            return true;
        }
        debug!(
            source = %source,
            category = category.as_str(),
            newlines,
            "newline flood"
        );
        let weight = u32::try_from(newlines).unwrap_or(u32::MAX);
        self.check_weighted(category, source, kind, weight)
    }

    /// Blocked on the category queue, or on the global queue while that
    /// layer is enabled.
    pub fn is_blocked(&self, category: Category, source: &SourceId) -> bool {
        self.queues[category.index()].is_blocked(source)
            || (self.global_enabled && self.global.is_blocked(source))
    }

    /// Block a source on one category without counting an event.
    pub fn force_block(&mut self, category: Category, source: SourceId) {
        let now = self.clock.now();
        self.queues[category.index()].force_block(source, now);
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    pub fn clear_category(&mut self, category: Category) {
        self.queues[category.index()].clear_all();
    }

    pub fn purge_category(&mut self, category: Category) -> usize {
        let now = self.clock.now();
        self.queues[category.index()].purge_stale(now)
    }

    /// Forget every entry in every queue, global included.
    pub fn clear_all(&mut self) {
        for queue in &mut self.queues {
            queue.clear_all();
        }
        self.global.clear_all();
        self.objects.clear();
        info!("anti-spam queues cleared");
    }

    /// Drop stale entries everywhere, expire overdue object notifications,
    /// and forget object metadata older than the pending TTL that no
    /// notification is waiting on. Returns the number of queue entries
    /// removed.
    pub fn purge_all(&mut self) -> usize {
        let now = self.clock.now();
        let mut removed = self
            .queues
            .iter_mut()
            .map(|queue| queue.purge_stale(now))
            .sum::<usize>();
        removed += self.global.purge_stale(now);
        let expired = self.pipeline.expire(now);

        let ttl = self.pipeline.ttl();
        let pipeline = &self.pipeline;
        let known_before = self.objects.len();
        self.objects.retain(|object_id, known| {
            now.saturating_duration_since(known.recorded_at) <= ttl
                || pipeline.pending_for(object_id).is_some()
        });
        let forgotten = known_before - self.objects.len();

        debug!(removed, expired, forgotten, "anti-spam purge");
        removed
    }

    // ------------------------------------------------------------------
    // Collaborator inputs
    // ------------------------------------------------------------------

    pub fn is_collision_sound(&self, sound: &SourceId) -> bool {
        self.collision_sounds.contains(sound)
    }

    pub fn register_collision_sounds<I>(&mut self, sounds: I)
    where
        I: IntoIterator<Item = SourceId>,
    {
        self.collision_sounds.extend(sounds);
    }

    /// Remember an object's name and owner, and advance any notification
    /// waiting on them.
    pub fn record_object_metadata(&mut self, object_id: SourceId, metadata: ObjectMetadata) {
        self.pipeline.on_object_metadata(object_id, &metadata);
        let recorded_at = self.clock.now();
        self.objects.insert(
            object_id,
            KnownObject {
                metadata,
                recorded_at,
            },
        );
    }

    pub fn object_metadata(&self, object_id: &SourceId) -> Option<&ObjectMetadata> {
        self.objects.get(object_id).map(|known| &known.metadata)
    }

    /// Name-cache callback. Stale or unknown requests are ignored.
    pub fn on_name_resolved(&mut self, resolution: NameResolution) -> bool {
        self.pipeline.on_name_resolved(resolution)
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            entries: self.queues.each_ref().map(SpamQueue::len),
            global_entries: self.global.len(),
            global_enabled: self.global_enabled,
            pending_notifications: self.pipeline.len(),
            known_objects: self.objects.len(),
        }
    }
}

impl std::fmt::Debug for AntispamRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AntispamRegistry")
            .field("global_enabled", &self.global_enabled)
            .field("newline_threshold", &self.newline_threshold)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

fn count_newlines(message: &str) -> usize {
    message.bytes().filter(|&b| b == b'\n').count()
}
