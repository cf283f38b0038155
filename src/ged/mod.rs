//! Instruction bit-field access.
//!
//! The decoder and encoder never touch instruction bits directly. They go through
//! [FieldDecoder] and [FieldEncoder], which resolve a named [Field] for the
//! current platform and instruction form. [NativeInst] is the in-crate
//! implementation of both.

mod fields;
mod native;
pub mod translate;

pub use fields::{decode_enum, Field, FieldDecoder, FieldEncoder, FieldError, InstDecodeError, OperandField};
pub use native::NativeInst;
