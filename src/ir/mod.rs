//! The instruction representation produced by [crate::decoder] and consumed by
//! [crate::encoder], the message decoders and the analysis passes.

mod instruction;
mod kernel;
mod op;
mod operand;
mod platform;
pub mod swsb;
pub mod types;

pub use instruction::{Instruction, SendDesc, SendInfo, SourceIndex};
pub use kernel::{Block, Kernel};
pub use op::Op;
pub use operand::{Label, Operand, OperandKind};
pub use platform::{Era, Platform, UnknownPlatform};
pub use swsb::{Swsb, SwsbEncodeMode, SwsbInstType, SwsbStatus};
pub use types::*;
