//! JSON and static endpoints
//!
//! - `GET /api/states` - every region, optionally in short form
//! - `GET /api/states/:id` - one region
//! - `GET /api/history` - history log dump
//! - `GET /map.svg` - latest map image

pub mod history;
pub mod map;
pub mod states;
