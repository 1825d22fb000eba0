//! ATP Wire Protocol
//!
//! Messages exchanged between an orchestrating client and a plugin, and the
//! CBOR framing that carries them over a byte stream.
//!
//! # Protocol Overview
//!
//! 1. The client writes the start signal, a CBOR `null`.
//! 2. The plugin answers with a [`HelloMessage`] carrying its version and schema.
//! 3. The client writes a [`StartWorkMessage`] to run a step.
//! 4. Version 1: the plugin answers with one bare [`WorkDoneMessage`].
//!    Version 2: both sides exchange [`RuntimeMessage`] envelopes, either
//!    `signal` or `work_done`, until the step is done.

mod codec;
mod messages;

pub use codec::*;
pub use messages::*;

/// Oldest protocol version the client speaks
pub const MIN_SUPPORTED_VERSION: i64 = 1;

/// Newest protocol version the client speaks
pub const MAX_SUPPORTED_VERSION: i64 = 2;
