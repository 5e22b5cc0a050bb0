mod opts;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use model::{TrackConfigTable, TrackGeometry, TrackLayout};
use track_store::{spawn_pump, TrackGeometryStore};
use trackmap_ingest_core::{feed_channel, ReplaySource, TelemetrySource};

use opts::Opts;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    run(Opts::parse()).await
}

async fn run(opts: Opts) -> Result<()> {
    let year = opts.year();
    let cache_path = opts.cache_path()?;

    let config = load_config(opts.track_config.as_deref())?;
    let records = load_cache(&cache_path)?;
    let store = Arc::new(TrackGeometryStore::with_cache(config, records));

    store.select_track(&opts.track, year);
    if store.is_complete() {
        report(&store, &opts);
        return Ok(());
    }
    if let Some(driver) = opts.driver {
        store.force_target_driver(driver);
    }

    let (tx, rx) = feed_channel();
    let pump = spawn_pump(store.clone(), rx).context("spawn feed pump")?;

    let source = ReplaySource::new(&opts.replay);
    let replayed = tokio::time::timeout(Duration::from_secs(opts.timeout_secs), source.run(tx)).await;

    // the sender is gone either way, so the pump drains and exits
    let stats = tokio::task::spawn_blocking(move || pump.join())
        .await
        .context("join feed pump")?
        .map_err(|_| anyhow!("feed pump panicked"))?;

    match replayed {
        Ok(Ok(sent)) => info!(sent, "replay done"),
        Ok(Err(err)) => return Err(err).context("replay feed"),
        Err(_) => warn!(secs = opts.timeout_secs, "replay timed out"),
    }

    if !stats.completed {
        let snap = store.recording_snapshot();
        warn!(
            target_driver = ?snap.target_driver,
            track_phase = ?snap.track_phase,
            pitlane_phase = ?snap.pitlane_phase,
            buffered = snap.buffered,
            "feed ended before the track was complete"
        );
        report(&store, &opts);
        return Ok(());
    }

    let records: Vec<TrackGeometry> = store.cached_geometries().iter().map(|g| (**g).clone()).collect();
    iox::save_geometries(&records, &cache_path)?;
    report(&store, &opts);
    Ok(())
}

fn load_config(extra: Option<&Path>) -> Result<TrackConfigTable> {
    let mut table = iox::builtin_track_config();
    if let Some(path) = extra {
        table.merge(iox::load_track_config(path)?);
    }
    info!(entries = table.len(), "track config loaded");
    Ok(table)
}

fn load_cache(path: &Path) -> Result<Vec<TrackGeometry>> {
    if !path.exists() {
        info!(path = %path.display(), "no geometry cache yet");
        return Ok(Vec::new());
    }
    iox::load_geometries(path)
}

fn report(store: &TrackGeometryStore, opts: &Opts) {
    let Some(layout) = store.query_layout(opts.width, opts.height) else {
        warn!(track = %opts.track, "no outline available");
        return;
    };
    let TrackLayout { scale, x_offset, y_offset, rotation } = layout;
    info!(
        track = %opts.track,
        outline = store.outline().len(),
        pitlane = store.pitlane().len(),
        scale,
        x_offset,
        y_offset,
        rotation,
        "track layout"
    );
    match serde_json::to_string(&layout) {
        Ok(s) => println!("{s}"),
        Err(err) => warn!(%err, "layout not serialisable"),
    }
}
