//! C1 — lock-free SPSC shared-memory candle channel (spec.md §4.1, §6).
//!
//! Grounded on `cooprefr-bettersys`'s use of `memmap2` for shared metrics
//! and on the mmap-plus-atomics technique in
//! `other_examples/050dbfda_dawsh2-AlphaPulse__...event_driven_shm.rs`,
//! simplified down to the plain polling SPSC case spec.md actually asks
//! for: no reader registry, no condvar, one writer, one reader.
//!
//! Resolves spec.md §9 Open Question 1 (symbol multiplexing) as "symbol
//! embedded in the ring-buffer payload" — see [`symtab`] and
//! `SPEC_FULL.md` §6 addendum. Each slot is 7 `f64`s: `(ts, o, h, l, c, v,
//! symbol_id)`.

mod cursors;
mod region;
pub mod symtab;

pub use symtab::SymbolTable;

use crate::domain::Candle;
use cursors::Cursors;
use region::ShmRegion;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const SLOT_COUNT: usize = 10_000;
pub const FLOATS_PER_SLOT: usize = 7;
pub const SLOT_BYTES: usize = FLOATS_PER_SLOT * std::mem::size_of::<f64>();

pub const CANDLE_BUFFER_NAME: &str = "aeg_candle_buffer";
pub const CURSORS_NAME: &str = "aeg_cursors";

#[derive(Debug, Error)]
pub enum RingBufferError {
    #[error(transparent)]
    Shm(#[from] crate::domain::errors::ShmError),
}

/// Default shared-memory base directory: `/dev/shm` on Linux, falling back
/// to the OS temp directory elsewhere (spec.md §4.1 "named shared-memory
/// region").
pub fn default_base_dir() -> PathBuf {
    let dev_shm = PathBuf::from("/dev/shm");
    if dev_shm.is_dir() {
        dev_shm
    } else {
        std::env::temp_dir()
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct RawSlot(pub(crate) [f64; FLOATS_PER_SLOT]);

impl RawSlot {
    fn from_candle(c: &Candle, symbol_id: f64) -> Self {
        RawSlot([c.ts_ms as f64, c.open, c.high, c.low, c.close, c.volume, symbol_id])
    }

    fn to_candle(self) -> (Candle, f64) {
        let v = self.0;
        (
            Candle::new(v[0] as i64, v[1], v[2], v[3], v[4], v[5]),
            v[6],
        )
    }
}

/// Writer-side handle. Created by the Feed (the supervisor role per
/// spec.md §4.1): allocates both regions fresh.
pub struct RingBufferWriter {
    slots: ShmRegion,
    cursors: Cursors,
}

impl RingBufferWriter {
    pub fn create(base_dir: &Path) -> Result<Self, RingBufferError> {
        let slots = ShmRegion::create(base_dir, CANDLE_BUFFER_NAME, SLOT_COUNT * SLOT_BYTES)?;
        let cursors = Cursors::create(base_dir, CURSORS_NAME)?;
        info!(
            region = CANDLE_BUFFER_NAME,
            slots = SLOT_COUNT,
            "ring buffer allocated"
        );
        Ok(Self { slots, cursors })
    }

    /// Writer-only. Computes `slot = write_cursor mod N`, stores the record,
    /// then increments `write_cursor` last — publish-after-store
    /// (spec.md §4.1).
    pub fn write(&mut self, candle: &Candle, symbol_id: f64) {
        let write_cursor = self.cursors.load_write();
        let slot_index = (write_cursor as usize) % SLOT_COUNT;
        let raw = RawSlot::from_candle(candle, symbol_id);
        self.slots.store_slot(slot_index, &raw);
        self.cursors.store_write(write_cursor + 1);
    }

    pub fn pending(&self) -> u64 {
        self.cursors
            .load_write()
            .saturating_sub(self.cursors.load_read())
    }
}

impl Drop for RingBufferWriter {
    fn drop(&mut self) {
        self.slots.unlink();
        self.cursors.unlink();
    }
}

/// Reader-side handle. Attaches to regions the writer already created.
pub struct RingBufferReader {
    slots: ShmRegion,
    cursors: Cursors,
}

impl RingBufferReader {
    pub fn attach(base_dir: &Path) -> Result<Self, RingBufferError> {
        let slots = ShmRegion::attach(base_dir, CANDLE_BUFFER_NAME, SLOT_COUNT * SLOT_BYTES)?;
        let cursors = Cursors::attach(base_dir, CURSORS_NAME)?;
        Ok(Self { slots, cursors })
    }

    pub fn pending(&self) -> u64 {
        self.cursors
            .load_write()
            .saturating_sub(self.cursors.load_read())
    }

    /// Reader-only. Drains everything currently available, handling a lap
    /// (spec.md §4.1, §8 property 3, scenario C) by jumping forward and
    /// logging exactly once per occurrence.
    pub fn read_new(&mut self) -> Vec<(Candle, f64)> {
        let write_cursor = self.cursors.load_write();
        let mut read_cursor = self.cursors.load_read();

        let pending = write_cursor.saturating_sub(read_cursor);
        if pending as usize > SLOT_COUNT {
            let skipped = pending - (SLOT_COUNT as u64 - 1);
            let new_read_cursor = write_cursor - (SLOT_COUNT as u64 - 1);
            warn!(
                skipped,
                old_read_cursor = read_cursor,
                new_read_cursor,
                "ring buffer lapped by writer — jumping forward, freshness over completeness"
            );
            read_cursor = new_read_cursor;
        }

        let mut out = Vec::new();
        while read_cursor < write_cursor {
            let slot_index = (read_cursor as usize) % SLOT_COUNT;
            let raw = self.slots.load_slot(slot_index);
            out.push(raw.to_candle());
            read_cursor += 1;
        }
        self.cursors.store_read(read_cursor);
        out
    }
}

impl Drop for RingBufferReader {
    fn drop(&mut self) {
        self.slots.unlink();
        self.cursors.unlink();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile_shim::TempDir;

    mod tempfile_shim {
        use std::path::{Path, PathBuf};

        /// Minimal throwaway-directory helper so ring buffer tests don't
        /// collide with /dev/shm across parallel test runs. Not a general
        /// crate substitute — just enough to isolate test fixtures.
        pub struct TempDir(PathBuf);

        impl TempDir {
            pub fn new(label: &str) -> Self {
                let dir = std::env::temp_dir().join(format!(
                    "aegis_ringbuffer_test_{}_{}",
                    label,
                    std::process::id()
                ));
                std::fs::create_dir_all(&dir).unwrap();
                Self(dir)
            }
        }

        impl AsRef<Path> for TempDir {
            fn as_ref(&self) -> &Path {
                &self.0
            }
        }

        impl Drop for TempDir {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.0);
            }
        }
    }

    fn sample_candle(ts_ms: i64) -> Candle {
        Candle::new(ts_ms, 100.0, 105.0, 95.0, 102.0, 1000.0)
    }

    #[test]
    fn write_then_read_preserves_order_and_values() {
        let dir = TempDir::new("order");
        let mut writer = RingBufferWriter::create(dir.as_ref()).unwrap();
        let mut reader = RingBufferReader::attach(dir.as_ref()).unwrap();

        for i in 0..25 {
            writer.write(&sample_candle(1_700_000_000_000 + i * 60_000), 0.0);
        }

        let read = reader.read_new();
        assert_eq!(read.len(), 25);
        for (i, (candle, symbol_id)) in read.iter().enumerate() {
            assert_eq!(candle.ts_ms, 1_700_000_000_000 + i as i64 * 60_000);
            assert_eq!(*symbol_id, 0.0);
        }
        assert_eq!(reader.pending(), 0);
    }

    #[test]
    fn pending_reflects_cursor_gap() {
        let dir = TempDir::new("pending");
        let mut writer = RingBufferWriter::create(dir.as_ref()).unwrap();
        let reader = RingBufferReader::attach(dir.as_ref()).unwrap();

        for i in 0..10 {
            writer.write(&sample_candle(i), 0.0);
        }
        assert_eq!(reader.pending(), 10);
    }

    #[test]
    fn lap_jumps_reader_forward_and_preserves_freshest_n_minus_one() {
        let dir = TempDir::new("lap");
        let mut writer = RingBufferWriter::create(dir.as_ref()).unwrap();
        let mut reader = RingBufferReader::attach(dir.as_ref()).unwrap();

        let total = SLOT_COUNT as i64 + 500;
        for i in 0..total {
            writer.write(&sample_candle(i), 0.0);
        }

        let read = reader.read_new();
        // Reader should see exactly N-1 candles (freshest over completeness).
        assert_eq!(read.len(), SLOT_COUNT - 1);
        let (first, _) = read[0];
        assert_eq!(first.ts_ms, total - (SLOT_COUNT as i64 - 1));
        let (last, _) = *read.last().unwrap();
        assert_eq!(last.ts_ms, total - 1);
    }

    #[test]
    fn write_N_equal_capacity_round_trips_exactly() {
        let dir = TempDir::new("exact_capacity");
        let mut writer = RingBufferWriter::create(dir.as_ref()).unwrap();
        let mut reader = RingBufferReader::attach(dir.as_ref()).unwrap();

        for i in 0..SLOT_COUNT as i64 {
            writer.write(&sample_candle(i), 0.0);
        }
        let read = reader.read_new();
        assert_eq!(read.len(), SLOT_COUNT);
        assert_eq!(read[0].0.ts_ms, 0);
        assert_eq!(read[SLOT_COUNT - 1].0.ts_ms, SLOT_COUNT as i64 - 1);
    }
}
