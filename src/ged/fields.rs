use std::fmt;

use num_traits::FromPrimitive;
use thiserror::Error;

/// Per-operand sub-fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandField {
    RegFile,
    DataType,
    AddrMode,
    RegNum,
    SubRegNum,
    SrcMod,
    VertStride,
    Width,
    HorzStride,
    AddrSubRegNum,
    AddrImm,
    ChanSel,
    ChanEn,
    RepCtrl,
    SpecialAcc,
    /// 16-bit ternary immediate
    Imm,
}

/// A named instruction field. The native layout decides where (and whether) it
/// exists for the current instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Opcode,
    AccessMode,
    DepCtrl,
    ThreadCtrl,
    ChannelOffset,
    PredCtrl,
    PredInv,
    ExecSize,
    CondModifier,
    AccWrCtrl,
    BranchCtrl,
    CompactCtrl,
    DebugCtrl,
    Saturate,
    FlagRegNum,
    FlagSubRegNum,
    MaskCtrl,
    Swsb,
    Dst(OperandField),
    Src(u8, OperandField),
    Imm,
    Imm64,
    Jip,
    Uip,
    MathFc,
    SyncFc,
    BfnFc,
    SystolicDepth,
    RepeatCount,
    Sfid,
    Eot,
    NoSrcDepSet,
    FusionCtrl,
    DescRegFile,
    MsgDesc,
    ExDescRegFile,
    ExMsgDesc,
    ExDescAddrSubRegNum,
    Src1Length,
    ExBso,
    Cps,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Dst(sub) => write!(f, "Dst.{:?}", sub),
            Field::Src(ix, sub) => write!(f, "Src{}.{:?}", ix, sub),
            other => write!(f, "{:?}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("invalid value {value:#x} in field {field}")]
    InvalidValue { field: Field, value: u64 },
    #[error("field {0} does not exist in this encoding")]
    InvalidField(Field),
    #[error("{0}")]
    Other(String),
}

/// Failure to parse raw bytes into an instruction buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstDecodeError {
    #[error("no compacted form")]
    NoCompactedForm,
    #[error("{0}")]
    Other(String),
}

/// The platform bit-field accessor the decoder is written against.
pub trait FieldDecoder {
    /// Parse one instruction from the start of `bytes`.
    fn decode_inst(&mut self, bytes: &[u8]) -> Result<(), InstDecodeError>;
    fn get(&self, field: Field) -> Result<u64, FieldError>;
    /// Field value sign-extended from its encoded width.
    fn get_signed(&self, field: Field) -> Result<i64, FieldError>;
    fn has_field(&self, field: Field) -> bool;
}

pub trait FieldEncoder {
    fn set(&mut self, field: Field, value: u64) -> Result<(), FieldError>;
    fn to_bytes(&self) -> [u8; 16];
}

pub fn decode_enum<T: FromPrimitive>(field: Field, value: u64) -> Result<T, FieldError> {
    T::from_u64(value).ok_or(FieldError::InvalidValue { field, value })
}
