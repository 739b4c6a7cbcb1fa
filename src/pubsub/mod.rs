//! Generic publish/subscribe broker
//!
//! A [`Topic`] fans every broadcast payload out to the subscriptions whose
//! filter accepts it. Each subscription owns a private bounded queue; what
//! happens when that queue is full is decided by the topic's
//! [`Backpressure`] policy.
//!
//! ```text
//! Updater ──broadcast──► Topic<Update> ──filter──► SSE stream
//!                                      ├─filter──► TCP connection
//!                                      ├─filter──► history log
//!                                      └─filter──► map renderer
//! ```

mod policy;
mod topic;

pub use policy::{Backpressure, BlockOnFull, DropWhenFull};
pub use topic::{filter_all, Filter, Subscription, Topic, DEFAULT_CAPACITY};
