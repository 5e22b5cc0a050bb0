//! Feed plumbing between a telemetry source and the track-map store

use serde::{Serialize, Deserialize};
use model::{PositionSample, TimingUpdate};

mod replay;

pub use replay::ReplaySource;

/// One message of a recorded or live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedEvent {
    Position(PositionSample),
    Timing(TimingUpdate),
}

impl FeedEvent {
    pub fn driver_number(&self) -> u32 {
        match self {
            FeedEvent::Position(p) => p.driver_number,
            FeedEvent::Timing(t) => t.driver_number,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("feed consumer disconnected")]
    Disconnected,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Producer side: one channel per stream, like the upstream library exposes them.
#[derive(Clone, Debug)]
pub struct FeedTx {
    pub positions: crossbeam_channel::Sender<PositionSample>,
    pub timing: crossbeam_channel::Sender<TimingUpdate>,
}

#[derive(Clone, Debug)]
pub struct FeedRx {
    pub positions: crossbeam_channel::Receiver<PositionSample>,
    pub timing: crossbeam_channel::Receiver<TimingUpdate>,
}

impl FeedTx {
    pub fn send(&self, ev: FeedEvent) -> Result<(), IngestError> {
        match ev {
            FeedEvent::Position(p) => self.positions.send(p).map_err(|_| IngestError::Disconnected),
            FeedEvent::Timing(t) => self.timing.send(t).map_err(|_| IngestError::Disconnected),
        }
    }
}

/// Trait for any source that can fill a feed. Returns the number of events sent.
#[async_trait::async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn run(&self, tx: FeedTx) -> Result<u64, IngestError>;
}

pub fn feed_channel() -> (FeedTx, FeedRx) {
    let (ptx, prx) = crossbeam_channel::unbounded();
    let (ttx, trx) = crossbeam_channel::unbounded();
    (FeedTx { positions: ptx, timing: ttx }, FeedRx { positions: prx, timing: trx })
}
