//! Domain types and pure logic for the Workpulse presence and
//! time-accounting system.
//!
//! This crate has zero internal dependencies so it can be shared by the
//! API server, the client runtime, and any future CLI tooling. Nothing
//! in here reads the clock or touches I/O; every time-dependent function
//! takes an explicit `now` and timezone.

pub mod accounting;
pub mod error;
pub mod event;
pub mod identity;
pub mod presence;
pub mod protocol;
pub mod roles;
pub mod status;
pub mod summary;
pub mod types;
