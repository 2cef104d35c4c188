//! Integration test common infrastructure.
//!
//! Recording collaborator doubles and a registry builder driven by a
//! [`ManualClock`], so scenarios can step simulated time.

use parking_lot::Mutex;
use spamgate::antispam::{
    AntispamRegistry, BlockNotice, Collaborators, ManualClock, NameCache, Notifier, ObjectQuery,
    RequestId, SourceId,
};
use spamgate::config::{AntispamConfig, QueueLimits};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Records every call the registry makes to its collaborators.
#[derive(Default)]
pub struct Recorder {
    pub cached: Mutex<HashMap<SourceId, String>>,
    pub requests: Mutex<Vec<(SourceId, RequestId)>>,
    pub released: Mutex<Vec<RequestId>>,
    pub properties: Mutex<Vec<SourceId>>,
    pub notices: Mutex<Vec<BlockNotice>>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn cache_name(&self, id: SourceId, name: &str) {
        self.cached.lock().insert(id, name.to_string());
    }

    pub fn last_request(&self) -> Option<(SourceId, RequestId)> {
        self.requests.lock().last().copied()
    }

    pub fn notice_count(&self) -> usize {
        self.notices.lock().len()
    }

    pub fn released_count(&self, request: RequestId) -> usize {
        self.released.lock().iter().filter(|r| **r == request).count()
    }
}

impl NameCache for Recorder {
    fn cached_name(&self, id: &SourceId) -> Option<String> {
        self.cached.lock().get(id).cloned()
    }

    fn request_name(&self, id: SourceId, request: RequestId) {
        self.requests.lock().push((id, request));
    }

    fn release(&self, request: RequestId) {
        self.released.lock().push(request);
    }
}

impl ObjectQuery for Recorder {
    fn request_properties(&self, object_id: SourceId) {
        self.properties.lock().push(object_id);
    }
}

impl Notifier for Recorder {
    fn notify(&self, notice: BlockNotice) {
        self.notices.lock().push(notice);
    }
}

/// Category limits `threshold`/`window_secs`, global layer off with a
/// generous limit.
#[allow(dead_code)]
pub fn config(threshold: u32, window_secs: u64) -> AntispamConfig {
    AntispamConfig {
        default: QueueLimits {
            threshold,
            window_secs,
        },
        global: QueueLimits {
            threshold: 1_000,
            window_secs,
        },
        ..AntispamConfig::default()
    }
}

/// Fresh registry with recording collaborators and a manual clock.
#[allow(dead_code)]
pub fn registry(config: &AntispamConfig) -> (AntispamRegistry, Arc<Recorder>, Arc<ManualClock>) {
    let recorder = Arc::new(Recorder::default());
    let clock = Arc::new(ManualClock::new());
    let registry = AntispamRegistry::new(
        config,
        Duration::from_secs(60),
        Collaborators {
            names: recorder.clone(),
            objects: recorder.clone(),
            notifier: recorder.clone(),
            clock: clock.clone(),
        },
    );
    (registry, recorder, clock)
}
