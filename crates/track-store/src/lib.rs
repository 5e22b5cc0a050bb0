//! Track outline and pit lane reconstruction from live position and timing feeds

pub mod pump;
pub mod recording;
mod store;

pub use pump::{pump, spawn_pump, PumpStats};
pub use recording::{PitlanePhase, RecordingState, TrackPhase, Transition};
pub use store::{RecordingSnapshot, TrackGeometryStore, PIT_ENTRY_LEAD};
