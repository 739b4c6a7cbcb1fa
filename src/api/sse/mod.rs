//! Server-sent events adapter
//!
//! Each connection owns one broker subscription filtered to fresh updates
//! (optionally for a single region). The stream opens with a `hello`
//! event, then sends one `update` per accepted event and a `ping` after
//! every five quiet seconds.

mod encoder;
pub mod handler;

pub use encoder::encode_event;
pub use handler::{live_all, live_region, UpdateEvent, PING_INTERVAL};
