//! Slack notification sink for lokiwatch
//!
//! Posts messages to a channel via the `chat.postMessage` web API.

mod client;

pub use client::{SlackClient, SlackError};
