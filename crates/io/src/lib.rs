use anyhow::{Context, Result};
use std::{fs::File, io::{BufRead, Read, Write}, path::Path};
use serde::{Serialize, Deserialize};
use tracing::{info, warn};
use model::*;
use trackmap_ingest_core::FeedEvent;

const BUILTIN_TRACK_CONFIG: &str = include_str!("data/track_config.csv");

/// Writes one geometry record per line, ordered by track name then year so
/// the file diffs cleanly between runs.
pub fn save_geometries(records: &[TrackGeometry], path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let mut sorted: Vec<&TrackGeometry> = records.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name).then(a.year_created.cmp(&b.year_created)));

    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = std::io::BufWriter::new(f);
    for g in sorted {
        let s = serde_json::to_string(g)?;
        writeln!(w, "{}", s)?;
    }
    w.flush()?;
    info!(count = records.len(), path = %path.display(), "track geometry saved");
    Ok(())
}

pub fn load_geometries(path: &Path) -> Result<Vec<TrackGeometry>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rdr = std::io::BufReader::new(f);
    let mut out = vec![];
    for (n, line) in rdr.lines().enumerate() {
        let s = line?;
        if s.trim().is_empty() { continue; }
        let g: TrackGeometry = serde_json::from_str(&s)
            .with_context(|| format!("{}:{}", path.display(), n + 1))?;
        out.push(g);
    }
    info!(count = out.len(), path = %path.display(), "track geometry loaded");
    Ok(out)
}

pub fn read_track_config<R: Read>(r: R) -> Result<TrackConfigTable> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_reader(r);
    let mut table = TrackConfigTable::new();
    for rec in rdr.deserialize() {
        let row: ConfigRow = rec?;
        table.insert(row.name, TrackConfig { rotation: row.rotation, axes_swapped: row.axes_swapped });
    }
    Ok(table)
}

pub fn load_track_config(path: &Path) -> Result<TrackConfigTable> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    read_track_config(f).with_context(|| format!("parse {}", path.display()))
}

/// Corrections shipped with the crate.
pub fn builtin_track_config() -> TrackConfigTable {
    read_track_config(BUILTIN_TRACK_CONFIG.as_bytes()).unwrap_or_else(|err| {
        warn!(?err, "built-in track config unreadable");
        TrackConfigTable::new()
    })
}

pub fn read_feed(path: &Path) -> Result<Vec<FeedEvent>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rdr = std::io::BufReader::new(f);
    let mut events = vec![];
    for line in rdr.lines() {
        let s = line?;
        if s.trim().is_empty() { continue; }
        events.push(serde_json::from_str(&s)?);
    }
    Ok(events)
}

pub fn write_feed(events: &[FeedEvent], path: &Path) -> Result<()> {
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = std::io::BufWriter::new(f);
    for ev in events {
        writeln!(w, "{}", serde_json::to_string(ev)?)?;
    }
    w.flush()?;
    Ok(())
}

#[derive(Serialize, Deserialize)]
struct ConfigRow {
    name: String,
    #[serde(default)]
    rotation: f64,
    #[serde(default)]
    axes_swapped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use time::OffsetDateTime;

    fn temp_path(ext: &str) -> PathBuf {
        std::env::temp_dir().join(format!("trackmap-io-{}.{ext}", uuid::Uuid::new_v4()))
    }

    fn geometry(name: &str, year: i32) -> TrackGeometry {
        let mut g = TrackGeometry::empty(name, year, 0.5);
        g.outline = vec![Point::new(0, 0), Point::new(10, 5), Point::new(-3, 8)];
        g.pitlane = vec![Point::new(1, 1), Point::new(2, 2)];
        g.set_bounds(Bounds { min_x: -3, max_x: 10, min_y: 0, max_y: 8 });
        g
    }

    #[test]
    fn test_geometry_save_load_sorted() {
        let path = temp_path("ndjson");
        let records = vec![geometry("Monza", 2023), geometry("Imola", 2022), geometry("Monza", 2019)];
        save_geometries(&records, &path).unwrap();

        let loaded = load_geometries(&path).unwrap();
        let keys: Vec<(String, i32)> = loaded.iter().map(|g| (g.name.clone(), g.year_created)).collect();
        assert_eq!(keys, vec![
            ("Imola".to_string(), 2022),
            ("Monza".to_string(), 2019),
            ("Monza".to_string(), 2023),
        ]);
        assert_eq!(loaded[2], records[0]);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_save_creates_parent_dir() {
        let dir = std::env::temp_dir().join(format!("trackmap-io-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("tracks.ndjson");
        save_geometries(&[geometry("Monza", 2023)], &path).unwrap();
        assert_eq!(load_geometries(&path).unwrap().len(), 1);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_load_reports_bad_line() {
        let path = temp_path("ndjson");
        std::fs::write(&path, "{\"name\":\"x\"}\n").unwrap();
        let err = load_geometries(&path).unwrap_err();
        assert!(format!("{err:#}").contains(":1"));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_track_config_csv() {
        let csv = "name,rotation,axes_swapped\nMonza, 1.5 ,false\nMarina Bay Street Circuit,0,true\n";
        let table = read_track_config(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve("Monza"), TrackConfig { rotation: 1.5, axes_swapped: false });
        assert!(table.resolve("Marina Bay Street Circuit").axes_swapped);
    }

    #[test]
    fn test_track_config_rejects_garbage() {
        let csv = "name,rotation,axes_swapped\nMonza,left,false\n";
        assert!(read_track_config(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_builtin_track_config() {
        let table = builtin_track_config();
        assert!(table.resolve("Bahrain International Circuit - Outer Track").axes_swapped);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_feed_round_trip() {
        let path = temp_path("ndjson");
        let events = vec![FeedEvent::Position(PositionSample {
            driver_number: 16,
            x: 1.25,
            y: -4.0,
            timestamp: OffsetDateTime::UNIX_EPOCH,
        })];
        write_feed(&events, &path).unwrap();
        assert_eq!(read_feed(&path).unwrap(), events);
        std::fs::remove_file(path).unwrap();
    }
}
