//! Drains a feed into the store on a dedicated thread.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{never, select, Receiver};
use time::OffsetDateTime;
use tracing::{debug, info};

use model::{PositionSample, TimingUpdate};
use trackmap_ingest_core::FeedRx;

use crate::TrackGeometryStore;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub positions: u64,
    pub timings: u64,
    /// The selected track was complete when the pump stopped.
    pub completed: bool,
}

/// Feeds both streams into `store` until both are disconnected or the
/// selected track is complete.
///
/// Messages are merged by timestamp, with positions winning ties, so a
/// buffered feed replays in order. A timing update is held back until one
/// position stamped after it has been fed (or the position stream closed),
/// so a lap or pit window closed by that update includes its first trailing
/// sample.
pub fn pump(store: &TrackGeometryStore, feed: FeedRx) -> PumpStats {
    let mut stats = PumpStats::default();
    let mut positions = Some(feed.positions);
    let mut timing = Some(feed.timing);
    let mut next_pos: Option<PositionSample> = None;
    let mut next_timing: Option<TimingUpdate> = None;
    let mut last_pos: Option<OffsetDateTime> = None;

    loop {
        if store.is_complete() {
            stats.completed = true;
            break;
        }

        if next_pos.is_none() {
            next_pos = poll(&mut positions);
        }
        if next_timing.is_none() {
            next_timing = poll(&mut timing);
        }

        match (next_pos.take(), next_timing.take()) {
            (Some(p), Some(t)) => {
                let trailing_fed = last_pos.is_some_and(|ts| ts > t.timestamp);
                if p.timestamp <= t.timestamp || !trailing_fed {
                    next_timing = Some(t);
                    last_pos = Some(p.timestamp);
                    feed_position(store, &mut stats, p);
                } else {
                    next_pos = Some(p);
                    feed_timing(store, &mut stats, &t);
                }
            }
            (Some(p), None) => {
                // the timing stream is open but momentarily empty
                if timing.is_some() {
                    next_pos = Some(p);
                    wait_any(&mut positions, &mut timing, &mut next_pos, &mut next_timing);
                } else {
                    last_pos = Some(p.timestamp);
                    feed_position(store, &mut stats, p);
                }
            }
            (None, Some(t)) => {
                if positions.is_some() {
                    next_timing = Some(t);
                    wait_any(&mut positions, &mut timing, &mut next_pos, &mut next_timing);
                } else {
                    feed_timing(store, &mut stats, &t);
                }
            }
            (None, None) => {
                if positions.is_none() && timing.is_none() {
                    break;
                }
                wait_any(&mut positions, &mut timing, &mut next_pos, &mut next_timing);
            }
        }
    }

    info!(
        positions = stats.positions,
        timings = stats.timings,
        completed = stats.completed,
        "feed pump stopped"
    );
    stats
}

/// Runs [`pump`] on a named thread.
pub fn spawn_pump(store: Arc<TrackGeometryStore>, feed: FeedRx) -> std::io::Result<thread::JoinHandle<PumpStats>> {
    thread::Builder::new()
        .name("trackmap-pump".into())
        .spawn(move || pump(&store, feed))
}

fn feed_position(store: &TrackGeometryStore, stats: &mut PumpStats, p: PositionSample) {
    stats.positions += 1;
    store.ingest_position(p);
}

fn feed_timing(store: &TrackGeometryStore, stats: &mut PumpStats, t: &TimingUpdate) {
    stats.timings += 1;
    store.ingest_timing(t);
}

/// Non-blocking receive. Drops the receiver once it is disconnected and empty.
fn poll<T>(rx: &mut Option<Receiver<T>>) -> Option<T> {
    let r = rx.as_ref()?;
    match r.try_recv() {
        Ok(v) => Some(v),
        Err(crossbeam_channel::TryRecvError::Empty) => None,
        Err(crossbeam_channel::TryRecvError::Disconnected) => {
            debug!("feed stream closed");
            *rx = None;
            None
        }
    }
}

/// Blocks until either open channel yields a message or disconnects, storing
/// what arrives in the empty lookahead slot.
fn wait_any(
    positions: &mut Option<Receiver<PositionSample>>,
    timing: &mut Option<Receiver<TimingUpdate>>,
    next_pos: &mut Option<PositionSample>,
    next_timing: &mut Option<TimingUpdate>,
) {
    let prx = match (&*positions, next_pos.is_none()) {
        (Some(r), true) => r.clone(),
        _ => never(),
    };
    let trx = match (&*timing, next_timing.is_none()) {
        (Some(r), true) => r.clone(),
        _ => never(),
    };

    select! {
        recv(prx) -> msg => match msg {
            Ok(p) => *next_pos = Some(p),
            Err(_) => *positions = None,
        },
        recv(trx) -> msg => match msg {
            Ok(t) => *next_timing = Some(t),
            Err(_) => *timing = None,
        },
    }
}
