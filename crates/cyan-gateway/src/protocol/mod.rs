//! Gateway protocol definitions
//!
//! Defines the wire format: op codes, frames, close codes and control payloads.

mod close_codes;
mod envelope;
mod opcodes;
mod payloads;

pub use close_codes::CloseCode;
pub use envelope::Envelope;
pub use opcodes::OpCode;
pub use payloads::{HelloPayload, IdentifyPayload, IdentifyProperties, ResumePayload};
