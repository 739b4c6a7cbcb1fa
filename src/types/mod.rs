//! Data types for the alert relay
//!
//! This module contains the region table, the canonical state shared by
//! every component, and the events flowing between them.

mod message;
mod region;
mod update;

pub use message::FeedMessage;
pub use region::{default_regions, CanonicalState, Region, SharedState, REGION_COUNT};
pub use update::Update;
