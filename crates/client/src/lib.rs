//! Client-local runtime for Workpulse.
//!
//! Everything here runs on the viewer's machine and is advisory with
//! respect to the server: the offset-corrected clock, the idle
//! accumulator, the reconciliation cache with its local persistence,
//! the cross-tab coordinator, per-identity timers, and the WebSocket
//! connection loop. The pure state machines ([`idle`], [`reconcile`],
//! [`clock`]) take explicit `now` parameters and never read the clock
//! themselves.

pub mod cache_store;
pub mod clock;
pub mod connection;
pub mod idle;
pub mod reconcile;
pub mod runtime;
pub mod tabs;
