use std::path::PathBuf;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::{FeedEvent, FeedTx, IngestError, TelemetrySource};

/// Replays a recorded ndjson feed straight through, without pacing.
#[derive(Clone, Debug)]
pub struct ReplaySource {
    path: PathBuf,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
}

#[async_trait::async_trait]
impl TelemetrySource for ReplaySource {
    async fn run(&self, tx: FeedTx) -> Result<u64, IngestError> {
        let file = tokio::fs::File::open(&self.path).await
            .with_context(|| format!("open {}", self.path.display()))?;
        let mut lines = BufReader::new(file).lines();
        let mut sent = 0u64;
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            let line = line.trim();
            if line.is_empty() { continue; }
            let ev: FeedEvent = match serde_json::from_str(line) {
                Ok(ev) => ev,
                Err(err) => {
                    warn!(%err, line = line_no, path = %self.path.display(), "skipping malformed feed line");
                    continue;
                }
            };
            if tx.send(ev).is_err() {
                debug!(sent, "feed consumer gone, stopping replay");
                break;
            }
            sent += 1;
        }

        info!(sent, path = %self.path.display(), "replay finished");
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed_channel;

    fn temp_feed(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("replay-{}.ndjson", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn test_replay_skips_blank_and_malformed_lines() {
        let path = temp_feed(concat!(
            r#"{"kind":"position","driver_number":44,"x":1.0,"y":2.0,"timestamp":"2023-09-03T13:00:00Z"}"#, "\n",
            "\n",
            "not json\n",
            r#"{"kind":"timing","driver_number":44,"lap":3,"location":"OnTrack","timestamp":"2023-09-03T13:00:01Z"}"#, "\n",
        ));
        let (tx, rx) = feed_channel();
        let sent = ReplaySource::new(&path).run(tx).await.unwrap();
        assert_eq!(sent, 2);
        assert_eq!(rx.positions.len(), 1);
        let t = rx.timing.try_recv().unwrap();
        assert_eq!(t.lap, 3);
        assert!(!t.all_sectors_timed());
        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_replay_stops_when_consumer_dropped() {
        let path = temp_feed(concat!(
            r#"{"kind":"position","driver_number":1,"x":1.0,"y":2.0,"timestamp":"2023-09-03T13:00:00Z"}"#, "\n",
            r#"{"kind":"position","driver_number":1,"x":3.0,"y":4.0,"timestamp":"2023-09-03T13:00:01Z"}"#, "\n",
        ));
        let (tx, rx) = feed_channel();
        drop(rx);
        let sent = ReplaySource::new(&path).run(tx).await.unwrap();
        assert_eq!(sent, 0);
        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_replay_missing_file() {
        let (tx, _rx) = feed_channel();
        let err = ReplaySource::new("/nonexistent/feed.ndjson").run(tx).await.unwrap_err();
        assert!(matches!(err, IngestError::Other(_)));
    }
}
