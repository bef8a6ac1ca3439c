//! One-shot REST client for the parking backend.
//!
//! Purely request/response: no retained connection, no built-in retry and
//! no polling timer. The dashboard session calls it once when a valid
//! session begins and decides itself what to do with a failure.

pub mod client;

pub use client::SnapshotClient;
