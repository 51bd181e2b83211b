//! `aegis-core` — the real-time market-data and signal-generation core
//! (spec.md §1/§2). Two binaries, `feed` and `brain`, share everything in
//! this library: the data model (C1's wire shape, C3-C12's types), the
//! shared-memory ring buffer that connects them, and the analysis pipeline
//! the Brain drives. See `SPEC_FULL.md` and `DESIGN.md` for how each module
//! maps onto the teacher this was grown from.

pub mod account;
pub mod brain;
pub mod config;
pub mod domain;
pub mod eventbus;
pub mod feed;
pub mod features;
pub mod firewall;
pub mod indicators;
pub mod monitor;
pub mod patterns;
pub mod persistence;
pub mod ringbuffer;
pub mod risk;
pub mod scorer;
