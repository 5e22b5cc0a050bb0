use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "trackmap",
    version,
    about = "Rebuilds F1 track outlines and pit lanes from a recorded position and timing feed"
)]
pub struct Opts {
    /// Recorded feed, one JSON event per line
    #[arg(long, env = "TRACKMAP_REPLAY")]
    pub replay: PathBuf,

    /// Circuit name as reported by the session info
    #[arg(long, env = "TRACKMAP_TRACK")]
    pub track: String,

    /// Layout year, defaults to the current year
    #[arg(long, env = "TRACKMAP_YEAR")]
    pub year: Option<i32>,

    /// Geometry cache file
    #[arg(long, env = "TRACKMAP_CACHE")]
    pub cache: Option<PathBuf>,

    /// CSV of per-circuit rotation and axis corrections, merged over the built-in table
    #[arg(long, env = "TRACKMAP_TRACK_CONFIG")]
    pub track_config: Option<PathBuf>,

    /// Record this driver instead of the first one seen on an out-lap
    #[arg(long, env = "TRACKMAP_DRIVER")]
    pub driver: Option<u32>,

    #[arg(long, env = "TRACKMAP_WIDTH", default_value_t = 500)]
    pub width: i32,

    #[arg(long, env = "TRACKMAP_HEIGHT", default_value_t = 500)]
    pub height: i32,

    /// Give up on the replay after this many seconds
    #[arg(long, env = "TRACKMAP_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
}

impl Opts {
    pub fn year(&self) -> i32 {
        self.year.unwrap_or_else(|| time::OffsetDateTime::now_utc().year())
    }

    pub fn cache_path(&self) -> anyhow::Result<PathBuf> {
        match &self.cache {
            Some(p) => Ok(p.clone()),
            None => dirs_next::data_dir()
                .map(|d| d.join("f1-trackmap").join("tracks.ndjson"))
                .context("no platform data directory, pass --cache"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let o = Opts::try_parse_from(["trackmap", "--replay", "feed.ndjson", "--track", "Monza"]).unwrap();
        assert_eq!((o.width, o.height, o.timeout_secs), (500, 500, 30));
        assert_eq!(o.driver, None);
        assert!(o.year() >= 2024);
    }

    #[test]
    fn test_explicit_values() {
        let o = Opts::try_parse_from([
            "trackmap", "--replay", "feed.ndjson", "--track", "Monza", "--year", "2023",
            "--cache", "/tmp/tracks.ndjson", "--driver", "44", "--width", "800",
        ])
        .unwrap();
        assert_eq!(o.year(), 2023);
        assert_eq!(o.driver, Some(44));
        assert_eq!(o.width, 800);
        assert_eq!(o.cache_path().unwrap(), PathBuf::from("/tmp/tracks.ndjson"));
    }

    #[test]
    fn test_replay_required() {
        assert!(Opts::try_parse_from(["trackmap", "--track", "Monza"]).is_err());
    }
}
