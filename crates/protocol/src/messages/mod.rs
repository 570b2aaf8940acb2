//! Message definitions for the arena protocol.
//!
//! Every frame is a JSON object whose `type` field selects the variant.
//! Field names are camelCase on the wire.

mod client;
mod server;

pub use client::*;
pub use server::*;
