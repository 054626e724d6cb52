pub mod grading;
pub mod leagues;
pub mod picks;
pub mod service;
pub mod settlement;

pub use service::PickemEngine;
