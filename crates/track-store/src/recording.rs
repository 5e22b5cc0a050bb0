//! Lap and pit-lane boundary detection for the target driver.

use model::{CarLocation, PositionSample, TimingUpdate};
use time::OffsetDateTime;

/// Two samples closer than this on both axes are the same position.
pub const DEDUP_EPSILON: f64 = 1e-5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TrackPhase {
    #[default]
    Idle,
    /// Timed lap `lap` started at `start`; closes when lap `lap + 1` is timed.
    Recording { start: OffsetDateTime, lap: i32 },
    /// The last attempt was abandoned. Behaves like `Idle`.
    Aborted,
    Done { start: OffsetDateTime, end: OffsetDateTime },
}

impl TrackPhase {
    pub fn is_unstarted(&self) -> bool {
        matches!(self, TrackPhase::Idle | TrackPhase::Aborted)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PitlanePhase {
    #[default]
    Idle,
    Recording { start: OffsetDateTime },
    Done { start: OffsetDateTime, end: OffsetDateTime },
}

/// Boundary events fired by one timing update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Transition {
    pub target_acquired: bool,
    pub track_started: bool,
    pub track_aborted: bool,
    pub target_lost: bool,
    pub track_closed: bool,
    pub pit_entered: bool,
    pub pit_exited: bool,
}

impl Transition {
    pub fn is_empty(&self) -> bool {
        *self == Transition::default()
    }
}

#[derive(Clone, Debug, Default)]
pub struct RecordingState {
    pub target: Option<u32>,
    pub track: TrackPhase,
    pub pitlane: PitlanePhase,
    pub prev_location: CarLocation,
    /// Every distinct position of the target since the track was selected.
    pub locations: Vec<PositionSample>,
}

impl RecordingState {
    /// Buffers `sample` if it belongs to the target and moved. Returns whether
    /// it was kept.
    pub fn buffer(&mut self, sample: PositionSample) -> bool {
        if self.target != Some(sample.driver_number) {
            return false;
        }
        if let Some(last) = self.locations.last() {
            if (last.x - sample.x).abs() < DEDUP_EPSILON && (last.y - sample.y).abs() < DEDUP_EPSILON {
                return false;
            }
        }
        self.locations.push(sample);
        true
    }

    /// Applies one timing update. Rules run in a fixed order and each sees the
    /// effect of the ones before it.
    pub fn advance(&mut self, update: &TimingUpdate) -> Transition {
        let mut tr = Transition::default();

        // an out-lap is an unambiguous sign the car is circulating
        if self.target.is_none() && update.driver_number != 0 && update.location == CarLocation::OutLap {
            self.target = Some(update.driver_number);
            tr.target_acquired = true;
        }
        if self.target != Some(update.driver_number) {
            return tr;
        }

        let loc = update.location;
        let ts = update.timestamp;
        // lap 1 timing is routinely incomplete
        let timed = update.all_sectors_timed();

        if self.track.is_unstarted() && loc == CarLocation::OnTrack && update.lap != 1 && timed {
            self.track = TrackPhase::Recording { start: ts, lap: update.lap };
            tr.track_started = true;
        }

        if matches!(self.track, TrackPhase::Recording { .. }) && loc == CarLocation::Pitlane {
            self.track = TrackPhase::Aborted;
            tr.track_aborted = true;
        }

        if loc.is_retired() {
            self.target = None;
            if !matches!(self.track, TrackPhase::Done { .. }) {
                self.track = TrackPhase::Aborted;
            }
            tr.target_lost = true;
        }

        if let TrackPhase::Recording { start, lap } = self.track {
            if update.lap == lap.saturating_add(1) && timed {
                self.track = TrackPhase::Done { start, end: ts };
                tr.track_closed = true;
            }
        }

        if self.pitlane == PitlanePhase::Idle && loc == CarLocation::Pitlane && self.prev_location.is_circulating() {
            self.pitlane = PitlanePhase::Recording { start: ts };
            tr.pit_entered = true;
        }

        if let PitlanePhase::Recording { start } = self.pitlane {
            if loc == CarLocation::OutLap {
                self.pitlane = PitlanePhase::Done { start, end: ts };
                tr.pit_exited = true;
            }
        }

        self.prev_location = loc;
        tr
    }

    /// Drops the target and the lap attempt so a fresh out-lap starts over.
    pub fn restart_track(&mut self) {
        self.target = None;
        self.track = TrackPhase::Aborted;
    }
}
