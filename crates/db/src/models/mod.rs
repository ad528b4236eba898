//! Row models mapping table shapes to Rust structs.

pub mod day_summary;
pub mod identity;
pub mod status_event;

pub use day_summary::DaySummaryRow;
pub use identity::IdentityRow;
pub use status_event::StatusEventRow;
