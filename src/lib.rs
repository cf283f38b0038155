//! The crate decodes Intel GEN/XE GPU kernels into a typed instruction representation and back,
//! and interprets the message descriptors of send instructions.
//!
//! The pipeline is split the same way for every platform:
//! - [ged] exposes the raw instruction bits as named fields, normalized across hardware eras
//! - [model] knows which operations exist on which [ir::Platform] and how they are encoded
//! - [decoder::KernelDecoder] turns a byte buffer into an [ir::Kernel], collecting [decoder::Diagnostics]
//!   instead of failing
//! - [encoder::Encoder] turns an [ir::Kernel] back into bytes
//! - [messages::decode_message] classifies a send descriptor as a load, store, atomic, sampler or control message
//!
//! [analysis::dependency::RegisterDependencies] computes register dependencies over a decoded kernel,
//! and is available lazily through [ir::Kernel::dependencies].

#[macro_use]
extern crate num_derive;

pub mod analysis;
pub mod decoder;
pub mod encoder;
pub mod ged;
pub mod ir;
pub mod messages;
pub mod model;

/// Trait for structs that can turn an arbitrary representation of a program (e.g. binary data) into a program
pub trait Decoder {
    type Input: ?Sized;
    type Program;
    type Err;

    fn decode(&self, data: &Self::Input) -> Result<Self::Program, Self::Err>;
}
