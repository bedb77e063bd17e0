//! Data models for the check-in backend.
//!
//! Field names serialize in camelCase to match the scanning front end.

mod checkin;
mod counter;
mod mode;
mod participant;

pub use checkin::*;
pub use counter::*;
pub use mode::*;
pub use participant::*;
