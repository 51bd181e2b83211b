//! Trade and experience recorders (spec.md §6 "Persistence surface
//! (produced)"): append-only newline-delimited JSON, buffered writes, size-
//! based rotation, optional background gzip of the rotated file.
//!
//! Grounded on `other_examples/5b64f7c2_SM1LE-X-hackathon__nexus_core-src-
//! persistence-mod.rs.rs`'s `Sentinel` — its "every write is append-only,
//! `flush()` is the only durability point, recovery never trusts a
//! half-written record" discipline — adapted from a binary mmap WAL to a
//! line-delimited JSON file via `tokio::fs`, since this core has no
//! replay/recovery requirement (spec.md names these as write-only sinks for
//! offline consumption, not a recovery log).

use crate::account::Account;
use crate::domain::{FeatureVector, Signal, Trade};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{error, info, warn};

/// One experience-buffer record: the Signal the Brain emitted plus the
/// feature vector that produced it, so offline training has the full
/// input/output pair (spec.md §4.9 step 6: "record it in the experience
/// buffer (an append-only store for offline training)").
#[derive(Debug, Clone, Serialize)]
pub struct ExperienceRecord<'a> {
    pub signal: &'a Signal,
    pub features: &'a FeatureVector,
}

/// An append-only NDJSON sink with size-based rotation (spec.md §6).
///
/// `append` serializes `record`, writes it plus a trailing `\n`, and flushes
/// before returning — "restart-safe ... on crash the buffer is lost, never a
/// partial line" is satisfied because nothing is reported written until the
/// OS has the complete, newline-terminated record.
pub struct NdjsonRecorder {
    path: PathBuf,
    writer: BufWriter<File>,
    bytes_written: u64,
    rotation_threshold_bytes: u64,
    gzip_rotated_files: bool,
}

impl NdjsonRecorder {
    pub async fn open(path: impl AsRef<Path>, rotation_threshold_bytes: u64, gzip_rotated_files: bool) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path).await?;
        let bytes_written = file.metadata().await?.len();
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            bytes_written,
            rotation_threshold_bytes,
            gzip_rotated_files,
        })
    }

    /// Serializes `record` to one line of JSON, appends it, flushes, then
    /// rotates if the file has crossed `rotation_threshold_bytes` (spec.md
    /// §6: "files rotate when size >= configured threshold").
    pub async fn append<T: Serialize>(&mut self, record: &T) -> io::Result<()> {
        let mut line = serde_json::to_vec(record).map_err(io::Error::other)?;
        line.push(b'\n');

        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        self.bytes_written += line.len() as u64;

        if self.bytes_written >= self.rotation_threshold_bytes {
            self.rotate().await?;
        }
        Ok(())
    }

    /// Renames the current file aside (timestamp-suffixed), reopens a fresh
    /// file at the original path, and — if configured — spawns a background
    /// task to gzip-compress the rotated file (spec.md §6: "optionally
    /// gzip-compressed in the background"). Rotation failure is logged and
    /// otherwise ignored: losing a rotation is not fatal to the writer.
    async fn rotate(&mut self) -> io::Result<()> {
        let rotated_path = self.path.with_extension(format!("{}.{}", extension_or_empty(&self.path), rotation_suffix()));

        self.writer.flush().await?;
        if let Err(error) = tokio::fs::rename(&self.path, &rotated_path).await {
            warn!(path = %self.path.display(), %error, "trade/experience log rotation rename failed, continuing to append to the current file");
            return Ok(());
        }

        let file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        self.writer = BufWriter::new(file);
        self.bytes_written = 0;

        info!(rotated = %rotated_path.display(), "rotated persistence log");

        if self.gzip_rotated_files {
            let target = rotated_path.clone();
            tokio::task::spawn_blocking(move || gzip_file_in_place(&target)).await.ok();
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn extension_or_empty(path: &Path) -> String {
    path.extension().and_then(|e| e.to_str()).unwrap_or("log").to_string()
}

/// A monotonically distinguishable rotation suffix. Uses the process-local
/// nanosecond-precision wall clock rather than a counter so concurrent
/// rotations across the feed/brain processes can never collide.
fn rotation_suffix() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", now.as_nanos())
}

/// Gzip-compresses `path` in place (writes `path.gz`, then removes the
/// uncompressed rotated file), run off the async runtime via
/// `spawn_blocking` since `flate2`'s `GzEncoder` is a synchronous writer.
fn gzip_file_in_place(path: &Path) {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;
    use std::io::copy;

    let result = (|| -> io::Result<()> {
        let mut input = fs::File::open(path)?;
        let gz_path = path.with_extension(format!("{}.gz", extension_or_empty(path)));
        let output = fs::File::create(&gz_path)?;
        let mut encoder = GzEncoder::new(output, Compression::default());
        copy(&mut input, &mut encoder)?;
        encoder.finish()?;
        fs::remove_file(path)?;
        Ok(())
    })();

    if let Err(error) = result {
        error!(path = %path.display(), %error, "background gzip of rotated log failed, leaving the uncompressed file in place");
    }
}

/// Appends `trade` to the trade-records sink (spec.md §6 "Trade records").
/// Owns its [`NdjsonRecorder`]; the caller (typically the process wiring up
/// [`Account`]) drives one call per `ORDER_FILLED`/`apply_fill`.
pub struct TradeRecorder {
    recorder: NdjsonRecorder,
}

impl TradeRecorder {
    pub async fn open(path: impl AsRef<Path>, rotation_threshold_bytes: u64, gzip_rotated_files: bool) -> io::Result<Self> {
        Ok(Self {
            recorder: NdjsonRecorder::open(path, rotation_threshold_bytes, gzip_rotated_files).await?,
        })
    }

    pub async fn record(&mut self, trade: &Trade) -> io::Result<()> {
        self.recorder.append(trade).await
    }

    pub fn path(&self) -> &Path {
        self.recorder.path()
    }
}

/// Appends one [`ExperienceRecord`] per emitted Signal (spec.md §4.9 step
/// 6, §6 "Experience buffer: same format, one record per emitted signal").
pub struct ExperienceRecorder {
    recorder: NdjsonRecorder,
}

impl ExperienceRecorder {
    pub async fn open(path: impl AsRef<Path>, rotation_threshold_bytes: u64, gzip_rotated_files: bool) -> io::Result<Self> {
        Ok(Self {
            recorder: NdjsonRecorder::open(path, rotation_threshold_bytes, gzip_rotated_files).await?,
        })
    }

    pub async fn record(&mut self, signal: &Signal, features: &FeatureVector) -> io::Result<()> {
        self.recorder.append(&ExperienceRecord { signal, features }).await
    }

    pub fn path(&self) -> &Path {
        self.recorder.path()
    }
}

/// Drains `account`'s trade history into `recorder`, starting at
/// `since_index` (the count already persisted), and returns the new count.
/// Grounded on the same "account is the single source of truth, persistence
/// is a passive consumer" split spec.md §4.12 draws between C12 and its
/// persistence surface.
pub async fn drain_new_trades(account: &Account, recorder: &mut TradeRecorder, since_index: usize) -> io::Result<usize> {
    let snapshot = account.snapshot().await;
    for trade in snapshot.trades.iter().skip(since_index) {
        recorder.record(trade).await?;
    }
    Ok(snapshot.trades.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderSide;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("aegis_persistence_test_{name}_{}.ndjson", std::process::id()))
    }

    fn sample_trade(id: &str) -> Trade {
        Trade {
            trade_id: id.to_string(),
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            price: 100.0,
            quantity: 1.0,
            commission: 0.1,
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn appended_records_round_trip_as_ndjson_lines() {
        let path = temp_path("roundtrip");
        let _ = tokio::fs::remove_file(&path).await;

        {
            let mut recorder = TradeRecorder::open(&path, 50 * 1024 * 1024, false).await.unwrap();
            recorder.record(&sample_trade("t1")).await.unwrap();
            recorder.record(&sample_trade("t2")).await.unwrap();
        }

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: Trade = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.trade_id, "t1");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn rotation_triggers_once_threshold_is_crossed() {
        let path = temp_path("rotation");
        let _ = tokio::fs::remove_file(&path).await;

        {
            // A threshold small enough that the first record already trips it.
            let mut recorder = TradeRecorder::open(&path, 1, false).await.unwrap();
            recorder.record(&sample_trade("t1")).await.unwrap();
            recorder.record(&sample_trade("t2")).await.unwrap();
        }

        // The live file holds only the record written after rotation; the
        // rotated file holds the first.
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 1);

        let parent = path.parent().unwrap();
        let stem = path.file_name().unwrap().to_string_lossy().to_string();
        let mut rotated_found = false;
        let mut dir = tokio::fs::read_dir(parent).await.unwrap();
        while let Some(entry) = dir.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&stem) && name != stem {
                rotated_found = true;
                let _ = tokio::fs::remove_file(entry.path()).await;
            }
        }
        assert!(rotated_found, "expected a rotated file alongside {stem}");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn experience_records_carry_both_signal_and_features() {
        let path = temp_path("experience");
        let _ = tokio::fs::remove_file(&path).await;

        let signal = Signal::new("BTCUSDT", 0.7, Vec::new(), 0.01, 0);
        let features = FeatureVector::zero();

        {
            let mut recorder = ExperienceRecorder::open(&path, 50 * 1024 * 1024, false).await.unwrap();
            recorder.record(&signal, &features).await.unwrap();
        }

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert!(value.get("signal").is_some());
        assert!(value.get("features").is_some());

        let _ = tokio::fs::remove_file(&path).await;
    }
}
