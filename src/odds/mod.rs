pub mod client;
pub mod ingest;
pub mod payload;
pub mod provider;
pub mod scheduler;
pub mod teams;

pub use client::OddsApiClient;
pub use ingest::{Ingestor, ManualScore};
pub use scheduler::spawn_scheduler;
pub use teams::SeasonCalendar;
