//! The dashboard session: glue between the session token, the snapshot
//! API, the live feed, and the spot store.
//!
//! The store is created when a valid session begins and discarded, with
//! the live subscription released, when the session ends.

pub mod session;

pub use session::DashboardSession;
