use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use model::*;

use crate::recording::{PitlanePhase, RecordingState, TrackPhase, Transition};

/// The timing feed flags pit entry this long after the car physically turns in.
pub const PIT_ENTRY_LEAD: time::Duration = time::Duration::seconds(7);

/// Builds and caches track geometry from one driver's position and timing
/// streams.
///
/// Ingestion holds a single mutex for the duration of each call. Queries only
/// see geometry once an extraction has finished, through an `Arc` swapped in
/// behind a read-write lock, so they never wait on ingestion.
pub struct TrackGeometryStore {
    config: TrackConfigTable,
    arena: RwLock<HashMap<TrackKey, Arc<TrackGeometry>>>,
    published: RwLock<Option<Arc<TrackGeometry>>>,
    recorder: Mutex<Recorder>,
    layout: Mutex<Option<CachedLayout>>,
}

#[derive(Default)]
struct Recorder {
    key: Option<TrackKey>,
    draft: Option<TrackGeometry>,
    outline_ready: bool,
    pitlane_ready: bool,
    state: RecordingState,
}

impl Recorder {
    fn accepting(&self) -> bool {
        self.draft.is_some() && !(self.outline_ready && self.pitlane_ready)
    }
}

struct CachedLayout {
    geometry: Arc<TrackGeometry>,
    width: i32,
    height: i32,
    layout: TrackLayout,
}

/// Point-in-time view of the recording, for status reporting.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordingSnapshot {
    pub track: Option<TrackKey>,
    pub target_driver: Option<u32>,
    pub track_phase: TrackPhase,
    pub pitlane_phase: PitlanePhase,
    pub prev_location: CarLocation,
    pub buffered: usize,
    pub outline_ready: bool,
    pub pitlane_ready: bool,
}

impl TrackGeometryStore {
    pub fn new(config: TrackConfigTable) -> Self {
        Self {
            config,
            arena: RwLock::new(HashMap::new()),
            published: RwLock::new(None),
            recorder: Mutex::new(Recorder::default()),
            layout: Mutex::new(None),
        }
    }

    /// Pre-populates the cache with previously saved geometry. Records without
    /// an outline are skipped.
    pub fn with_cache(config: TrackConfigTable, records: impl IntoIterator<Item = TrackGeometry>) -> Self {
        let store = Self::new(config);
        {
            let mut arena = store.arena.write();
            for g in records {
                if !g.has_outline() {
                    warn!(track = %g.name, year = g.year_created, "skipping cached track without outline");
                    continue;
                }
                arena.insert(g.key(), Arc::new(g));
            }
        }
        store
    }

    pub fn select_track(&self, name: &str, year: i32) {
        let key = TrackKey::new(name, year);
        let cached = self.arena.read().get(&key).cloned();

        let mut rec = self.recorder.lock();
        rec.state = RecordingState::default();
        rec.key = Some(key);
        match cached {
            Some(g) => {
                rec.draft = None;
                rec.outline_ready = true;
                rec.pitlane_ready = true;
                *self.published.write() = Some(g);
                info!(track = name, year, "track geometry loaded from cache");
            }
            None => {
                let rotation = self.config.resolve(name).rotation;
                rec.draft = Some(TrackGeometry::empty(name, year, rotation));
                rec.outline_ready = false;
                rec.pitlane_ready = false;
                *self.published.write() = None;
                info!(track = name, year, "recording track geometry");
            }
        }
        drop(rec);

        *self.layout.lock() = None;
    }

    /// Pins the driver to record instead of waiting for an out-lap.
    pub fn force_target_driver(&self, driver: u32) {
        let mut rec = self.recorder.lock();
        if !rec.accepting() {
            return;
        }
        rec.state.target = Some(driver);
        debug!(driver, "target driver forced");
    }

    pub fn ingest_position(&self, sample: PositionSample) {
        let mut rec = self.recorder.lock();
        if !rec.accepting() {
            return;
        }
        rec.state.buffer(sample);
    }

    pub fn ingest_timing(&self, update: &TimingUpdate) {
        let mut guard = self.recorder.lock();
        if !guard.accepting() {
            return;
        }
        let rec = &mut *guard;

        let tr = rec.state.advance(update);
        if !tr.is_empty() {
            log_transition(&tr, update);
        }

        let Some(draft) = rec.draft.as_mut() else { return };
        let mut changed = false;

        if !rec.outline_ready {
            if let TrackPhase::Done { start, end } = rec.state.track {
                let outline = analysis::extract_trace(&rec.state.locations, start, end);
                match analysis::bounds_of(&outline) {
                    Some(b) => {
                        info!(points = outline.len(), track = %draft.name, "track outline captured");
                        draft.outline = outline;
                        draft.set_bounds(b);
                        rec.outline_ready = true;
                        changed = true;
                    }
                    None => {
                        warn!(track = %draft.name, "no positions inside the recorded lap, starting over");
                        rec.state.restart_track();
                    }
                }
            }
        }

        if !rec.pitlane_ready {
            if let PitlanePhase::Done { start, end } = rec.state.pitlane {
                let from = pit_window_start(start);
                draft.pitlane = analysis::extract_trace(&rec.state.locations, from, end);
                // an empty pit lane still counts as captured
                info!(points = draft.pitlane.len(), track = %draft.name, "pit lane captured");
                rec.pitlane_ready = true;
                changed = true;
            }
        }

        if !changed || !rec.outline_ready {
            return;
        }

        let snapshot = Arc::new(draft.clone());
        *self.published.write() = Some(snapshot.clone());

        if rec.pitlane_ready {
            let key = snapshot.key();
            self.arena.write().insert(key.clone(), snapshot);
            rec.draft = None;
            rec.state.locations = Vec::new();
            info!(track = %key.name, year = key.year, "track geometry stored");
        }
    }

    /// Display transform for a viewport, or `None` while there is no outline.
    pub fn query_layout(&self, width: i32, height: i32) -> Option<TrackLayout> {
        let geometry = self.published.read().clone()?;

        let mut cache = self.layout.lock();
        if let Some(c) = cache.as_ref() {
            if c.width == width && c.height == height && Arc::ptr_eq(&c.geometry, &geometry) {
                return Some(c.layout);
            }
        }

        let cfg = self
            .config
            .get(&geometry.name)
            .copied()
            .unwrap_or(TrackConfig { rotation: geometry.rotation, axes_swapped: false });
        let layout = analysis::compute_layout(&geometry.bounds(), &cfg, width, height);
        *cache = Some(CachedLayout { geometry, width, height, layout });
        Some(layout)
    }

    pub fn current_geometry(&self) -> Option<Arc<TrackGeometry>> {
        self.published.read().clone()
    }

    pub fn outline(&self) -> Vec<Point> {
        self.current_geometry().map(|g| g.outline.clone()).unwrap_or_default()
    }

    pub fn pitlane(&self) -> Vec<Point> {
        self.current_geometry().map(|g| g.pitlane.clone()).unwrap_or_default()
    }

    pub fn cached(&self, name: &str, year: i32) -> Option<Arc<TrackGeometry>> {
        self.arena.read().get(&TrackKey::new(name, year)).cloned()
    }

    /// All completed geometry, ordered by track name then year.
    pub fn cached_geometries(&self) -> Vec<Arc<TrackGeometry>> {
        let mut all: Vec<Arc<TrackGeometry>> = self.arena.read().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.year_created.cmp(&b.year_created)));
        all
    }

    /// True once both outline and pit lane are known for the selected track.
    pub fn is_complete(&self) -> bool {
        let rec = self.recorder.lock();
        rec.key.is_some() && rec.outline_ready && rec.pitlane_ready
    }

    pub fn recording_snapshot(&self) -> RecordingSnapshot {
        let rec = self.recorder.lock();
        RecordingSnapshot {
            track: rec.key.clone(),
            target_driver: rec.state.target,
            track_phase: rec.state.track,
            pitlane_phase: rec.state.pitlane,
            prev_location: rec.state.prev_location,
            buffered: rec.state.locations.len(),
            outline_ready: rec.outline_ready,
            pitlane_ready: rec.pitlane_ready,
        }
    }
}

fn pit_window_start(entry: OffsetDateTime) -> OffsetDateTime {
    entry.checked_sub(PIT_ENTRY_LEAD).unwrap_or(entry)
}

fn log_transition(tr: &Transition, update: &TimingUpdate) {
    let driver = update.driver_number;
    if tr.target_acquired {
        debug!(driver, "target driver acquired on out-lap");
    }
    if tr.track_started {
        info!(driver, lap = update.lap, "recording lap");
    }
    if tr.track_aborted {
        info!(driver, lap = update.lap, "pitted mid-lap, lap recording aborted");
    }
    if tr.target_lost {
        info!(driver, location = ?update.location, "target driver stopped, reacquiring");
    }
    if tr.track_closed {
        info!(driver, lap = update.lap, "lap recording closed");
    }
    if tr.pit_entered {
        debug!(driver, "pit lane entry");
    }
    if tr.pit_exited {
        debug!(driver, "pit lane exit");
    }
}
