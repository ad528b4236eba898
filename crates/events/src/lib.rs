//! In-process presence event fan-out for the Workpulse backend.

pub mod bus;

pub use bus::{PresenceBus, PresenceEvent};
