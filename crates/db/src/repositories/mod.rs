//! Repository structs: stateless query bundles over a [`sqlx::PgPool`].

pub mod day_summary_repo;
pub mod identity_repo;
pub mod status_event_repo;

pub use day_summary_repo::DaySummaryRepo;
pub use identity_repo::IdentityRepo;
pub use status_event_repo::StatusEventRepo;
