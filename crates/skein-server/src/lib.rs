//! `skein-server`: the reference transport for the skein scheduler.
//!
//! `skein-core` never imports networking types (spec §1); this crate is the
//! one concrete way a program under test reaches a scheduler in this
//! workspace — newline-delimited JSON over TCP, one task per connection.
//! Any other transport (gRPC, a binary framing, shared memory) could be
//! substituted without touching `skein-core`.

pub mod context;
pub mod handler;
pub mod strategy;
pub mod transport;

pub use crate::context::Context;
