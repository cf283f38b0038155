//! Per-operation metadata: encodings, operand format and supported platforms.

use bitflags::bitflags;

use crate::ir::{Op, Platform, Region, Type};

/// Operand shape of an operation.
///
/// `Reg`/`Imm`/`RegImm` name what each source slot may hold, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Nullary,

    BasicUnaryReg,
    BasicUnaryRegImm,
    BasicBinaryRegReg,
    BasicBinaryRegImm,
    BasicBinaryRegRegImm,

    MathUnaryReg,
    MathUnaryRegImm,
    MathBinaryRegReg,
    MathBinaryRegRegImm,
    MathMacroUnaryReg,
    MathMacroBinaryRegReg,

    TernaryRegRegReg,
    TernaryRegImmRegRegImm,
    TernaryMacro,

    JumpUnaryImm,
    JumpUnaryReg,
    JumpUnaryRegImm,
    JumpUnaryCallRegImm,
    JumpBinaryBrc,
    JumpBinaryImmImm,

    SendUnary,
    SendBinary,

    SyncUnary,

    /// Resolved to a concrete format by the subfunction (e.g. `math`)
    Group,
}

impl Format {
    pub fn is_basic(self) -> bool {
        matches!(
            self,
            Format::BasicUnaryReg
                | Format::BasicUnaryRegImm
                | Format::BasicBinaryRegReg
                | Format::BasicBinaryRegImm
                | Format::BasicBinaryRegRegImm
        )
    }
    pub fn is_math(self) -> bool {
        matches!(
            self,
            Format::MathUnaryReg
                | Format::MathUnaryRegImm
                | Format::MathBinaryRegReg
                | Format::MathBinaryRegRegImm
                | Format::MathMacroUnaryReg
                | Format::MathMacroBinaryRegReg
        )
    }
    pub fn is_ternary(self) -> bool {
        matches!(
            self,
            Format::TernaryRegRegReg | Format::TernaryRegImmRegRegImm | Format::TernaryMacro
        )
    }
    pub fn is_jump(self) -> bool {
        matches!(
            self,
            Format::JumpUnaryImm
                | Format::JumpUnaryReg
                | Format::JumpUnaryRegImm
                | Format::JumpUnaryCallRegImm
                | Format::JumpBinaryBrc
                | Format::JumpBinaryImmImm
        )
    }
    pub fn is_send(self) -> bool {
        matches!(self, Format::SendUnary | Format::SendBinary)
    }
    pub fn is_macro(self) -> bool {
        matches!(
            self,
            Format::MathMacroUnaryReg | Format::MathMacroBinaryRegReg | Format::TernaryMacro
        )
    }
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            Format::BasicUnaryReg
                | Format::BasicUnaryRegImm
                | Format::MathUnaryReg
                | Format::MathUnaryRegImm
                | Format::MathMacroUnaryReg
        )
    }
    /// Number of explicit sources.
    pub fn num_srcs(self) -> usize {
        match self {
            Format::Nullary | Format::Group => 0,
            f if f.is_ternary() => 3,
            f if f.is_unary() => 1,
            f if f.is_basic() || f.is_math() => 2,
            Format::SendUnary | Format::SyncUnary => 1,
            Format::SendBinary => 2,
            Format::JumpUnaryImm | Format::JumpUnaryReg | Format::JumpUnaryRegImm => 1,
            Format::JumpUnaryCallRegImm => 1,
            Format::JumpBinaryBrc | Format::JumpBinaryImmImm => 2,
            _ => 0,
        }
    }
    pub fn src_may_be_imm(self, ix: usize) -> bool {
        match (self, ix) {
            (Format::BasicUnaryRegImm | Format::MathUnaryRegImm, 0) => true,
            (Format::BasicBinaryRegImm | Format::BasicBinaryRegRegImm | Format::MathBinaryRegRegImm, 1) => true,
            (Format::TernaryRegImmRegRegImm, 0 | 2) => true,
            _ => false,
        }
    }
}

bitflags! {
    pub struct OpAttrs: u32 {
        const PREDICATION = 1 << 0;
        const FLAG_MODIFIER = 1 << 1;
        const SATURATION = 1 << 2;
        const SRC_MODIFIERS = 1 << 3;
        const ACC_WR_EN = 1 << 4;
        const BRANCH_CTRL = 1 << 5;
        const HAS_DST = 1 << 6;

        const ALU = Self::PREDICATION.bits | Self::FLAG_MODIFIER.bits | Self::SATURATION.bits
            | Self::SRC_MODIFIERS.bits | Self::ACC_WR_EN.bits | Self::HAS_DST.bits;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpSpec {
    pub op: Op,
    pub mnemonic: &'static str,
    /// Opcode in the GEN7 - GEN11 encoding
    pub gen_code: Option<u8>,
    /// Opcode in the XE+ encoding
    pub xe_code: Option<u8>,
    pub format: Format,
    pub min_platform: Platform,
    pub max_platform: Platform,
    pub attrs: OpAttrs,
    pub implicit_src_region: Option<Region>,
    pub implicit_dst_type: Option<Type>,
}

impl OpSpec {
    pub fn supported_on(&self, platform: Platform) -> bool {
        (self.min_platform..=self.max_platform).contains(&platform)
    }
    pub fn has(&self, attr: OpAttrs) -> bool {
        self.attrs.contains(attr)
    }
    pub fn code(&self, platform: Platform) -> Option<u8> {
        match platform.era() {
            crate::ir::Era::Gen => self.gen_code,
            crate::ir::Era::Xe => self.xe_code,
        }
    }
}

const fn spec(
    op: Op,
    mnemonic: &'static str,
    gen_code: Option<u8>,
    xe_code: Option<u8>,
    format: Format,
    min_platform: Platform,
    max_platform: Platform,
    attrs: OpAttrs,
) -> OpSpec {
    OpSpec {
        op,
        mnemonic,
        gen_code,
        xe_code,
        format,
        min_platform,
        max_platform,
        attrs,
        implicit_src_region: None,
        implicit_dst_type: None,
    }
}

use Format::*;
use Platform::{Gen11, Gen7, Gen7p5, Gen8, Gen9, Xe, Xe3, XeHp, XeHpg};

const ALU: OpAttrs = OpAttrs::ALU;
const LOGIC: OpAttrs = OpAttrs::from_bits_truncate(
    OpAttrs::PREDICATION.bits() | OpAttrs::FLAG_MODIFIER.bits() | OpAttrs::SRC_MODIFIERS.bits()
        | OpAttrs::ACC_WR_EN.bits() | OpAttrs::HAS_DST.bits(),
);
const PRED: OpAttrs = OpAttrs::PREDICATION;
const BRANCH: OpAttrs =
    OpAttrs::from_bits_truncate(OpAttrs::PREDICATION.bits() | OpAttrs::BRANCH_CTRL.bits());
const SEND: OpAttrs = OpAttrs::from_bits_truncate(OpAttrs::PREDICATION.bits() | OpAttrs::HAS_DST.bits());
const NONE: OpAttrs = OpAttrs::empty();

pub(crate) static OP_SPECS: &[OpSpec] = &[
    spec(Op::Illegal, "illegal", Some(0x00), Some(0x00), Nullary, Gen7, Xe3, NONE),
    spec(Op::Nop, "nop", Some(0x7E), Some(0x60), Nullary, Gen7, Xe3, NONE),
    spec(Op::Wait, "wait", Some(0x30), None, SyncUnary, Gen7, Gen11, NONE),
    spec(Op::Sync, "sync", None, Some(0x01), SyncUnary, Xe, Xe3, PRED),
    spec(Op::Mov, "mov", Some(0x01), Some(0x61), BasicUnaryRegImm, Gen7, Xe3, ALU),
    spec(Op::Sel, "sel", Some(0x02), Some(0x62), BasicBinaryRegRegImm, Gen7, Xe3, ALU),
    spec(Op::Movi, "movi", Some(0x03), Some(0x63), BasicUnaryReg, Gen7, Xe3, ALU),
    spec(Op::Not, "not", Some(0x04), Some(0x64), BasicUnaryRegImm, Gen7, Xe3, LOGIC),
    spec(Op::And, "and", Some(0x05), Some(0x65), BasicBinaryRegRegImm, Gen7, Xe3, LOGIC),
    spec(Op::Or, "or", Some(0x06), Some(0x66), BasicBinaryRegRegImm, Gen7, Xe3, LOGIC),
    spec(Op::Xor, "xor", Some(0x07), Some(0x67), BasicBinaryRegRegImm, Gen7, Xe3, LOGIC),
    spec(Op::Shr, "shr", Some(0x08), Some(0x68), BasicBinaryRegRegImm, Gen7, Xe3, ALU),
    spec(Op::Shl, "shl", Some(0x09), Some(0x69), BasicBinaryRegRegImm, Gen7, Xe3, ALU),
    spec(Op::Smov, "smov", Some(0x0A), Some(0x6A), BasicBinaryRegImm, Gen8, Xe3, PRED),
    spec(Op::Asr, "asr", Some(0x0C), Some(0x6C), BasicBinaryRegRegImm, Gen7, Xe3, ALU),
    spec(Op::Ror, "ror", Some(0x0E), Some(0x6E), BasicBinaryRegRegImm, Gen11, Xe3, LOGIC),
    spec(Op::Rol, "rol", Some(0x0F), Some(0x6F), BasicBinaryRegRegImm, Gen11, Xe3, LOGIC),
    spec(Op::Cmp, "cmp", Some(0x10), Some(0x70), BasicBinaryRegRegImm, Gen7, Xe3, ALU),
    spec(Op::Cmpn, "cmpn", Some(0x11), Some(0x71), BasicBinaryRegRegImm, Gen7, Xe3, ALU),
    spec(Op::Csel, "csel", Some(0x12), Some(0x72), TernaryRegRegReg, Gen8, Xe3, ALU),
    spec(Op::Bfrev, "bfrev", Some(0x17), Some(0x77), BasicUnaryRegImm, Gen7, Xe3, LOGIC),
    spec(Op::Bfe, "bfe", Some(0x18), Some(0x78), TernaryRegRegReg, Gen7, Xe3, LOGIC),
    spec(Op::Bfi1, "bfi1", Some(0x19), Some(0x79), BasicBinaryRegRegImm, Gen7, Xe3, LOGIC),
    spec(Op::Bfi2, "bfi2", Some(0x1A), Some(0x7A), TernaryRegRegReg, Gen7, Xe3, LOGIC),
    OpSpec {
        implicit_src_region: Some(Region::SRC010),
        ..spec(Op::Jmpi, "jmpi", Some(0x20), Some(0x20), JumpUnaryRegImm, Gen7, Xe3, PRED)
    },
    OpSpec {
        implicit_src_region: Some(Region::SRC010),
        ..spec(Op::Brd, "brd", Some(0x21), Some(0x21), JumpUnaryRegImm, Gen7p5, Xe3, PRED)
    },
    spec(Op::If, "if", Some(0x22), Some(0x22), JumpBinaryImmImm, Gen7, Xe3, BRANCH),
    OpSpec {
        implicit_src_region: Some(Region::SRC010),
        ..spec(Op::Brc, "brc", Some(0x23), Some(0x23), JumpBinaryBrc, Gen7p5, Xe3, PRED)
    },
    spec(Op::Else, "else", Some(0x24), Some(0x24), JumpBinaryImmImm, Gen7, Xe3, BRANCH),
    spec(Op::Endif, "endif", Some(0x25), Some(0x25), JumpUnaryImm, Gen7, Xe3, NONE),
    spec(Op::While, "while", Some(0x27), Some(0x27), JumpUnaryImm, Gen7, Xe3, PRED),
    spec(Op::Break, "break", Some(0x28), Some(0x28), JumpBinaryImmImm, Gen7, Xe3, PRED),
    spec(Op::Cont, "cont", Some(0x29), Some(0x29), JumpBinaryImmImm, Gen7, Xe3, PRED),
    spec(Op::Halt, "halt", Some(0x2A), Some(0x2A), JumpBinaryImmImm, Gen7, Xe3, PRED),
    OpSpec {
        implicit_src_region: Some(Region::SRC010),
        ..spec(Op::Calla, "calla", Some(0x2B), Some(0x2B), JumpUnaryCallRegImm, Gen7p5, Xe3,
            OpAttrs::from_bits_truncate(OpAttrs::PREDICATION.bits() | OpAttrs::HAS_DST.bits()))
    },
    OpSpec {
        implicit_src_region: Some(Region::SRC010),
        ..spec(Op::Call, "call", Some(0x2C), Some(0x2C), JumpUnaryCallRegImm, Gen7, Xe3,
            OpAttrs::from_bits_truncate(OpAttrs::PREDICATION.bits() | OpAttrs::HAS_DST.bits()))
    },
    OpSpec {
        implicit_src_region: Some(Region::SRC221),
        ..spec(Op::Ret, "ret", Some(0x2D), Some(0x2D), JumpUnaryReg, Gen7, Xe3, PRED)
    },
    spec(Op::Goto, "goto", Some(0x2E), Some(0x2E), JumpBinaryImmImm, Gen8, Xe3, BRANCH),
    spec(Op::Join, "join", Some(0x2F), Some(0x2F), JumpUnaryImm, Gen8, Xe3, PRED),
    OpSpec {
        implicit_src_region: Some(Region::SRC881),
        implicit_dst_type: Some(Type::UD),
        ..spec(Op::Send, "send", Some(0x31), None, SendUnary, Gen7, Gen11, SEND)
    },
    OpSpec {
        implicit_src_region: Some(Region::SRC881),
        implicit_dst_type: Some(Type::UD),
        ..spec(Op::Sendc, "sendc", Some(0x32), None, SendUnary, Gen7, Gen11, SEND)
    },
    OpSpec {
        implicit_dst_type: Some(Type::UD),
        ..spec(Op::Send, "send", None, Some(0x31), SendBinary, Xe, Xe3, SEND)
    },
    OpSpec {
        implicit_dst_type: Some(Type::UD),
        ..spec(Op::Sendc, "sendc", None, Some(0x32), SendBinary, Xe, Xe3, SEND)
    },
    OpSpec {
        implicit_dst_type: Some(Type::UD),
        ..spec(Op::Sends, "sends", Some(0x33), None, SendBinary, Gen9, Gen11, SEND)
    },
    OpSpec {
        implicit_dst_type: Some(Type::UD),
        ..spec(Op::Sendsc, "sendsc", Some(0x34), None, SendBinary, Gen9, Gen11, SEND)
    },
    spec(Op::Math, "math", Some(0x38), Some(0x38), Group, Gen7, Xe3, ALU),
    spec(Op::Add, "add", Some(0x40), Some(0x40), BasicBinaryRegRegImm, Gen7, Xe3, ALU),
    spec(Op::Mul, "mul", Some(0x41), Some(0x41), BasicBinaryRegRegImm, Gen7, Xe3, ALU),
    spec(Op::Avg, "avg", Some(0x42), Some(0x42), BasicBinaryRegRegImm, Gen7, Xe3, ALU),
    spec(Op::Frc, "frc", Some(0x43), Some(0x43), BasicUnaryRegImm, Gen7, Xe3, ALU),
    spec(Op::Rndu, "rndu", Some(0x44), Some(0x44), BasicUnaryRegImm, Gen7, Xe3, ALU),
    spec(Op::Rndd, "rndd", Some(0x45), Some(0x45), BasicUnaryRegImm, Gen7, Xe3, ALU),
    spec(Op::Rnde, "rnde", Some(0x46), Some(0x46), BasicUnaryRegImm, Gen7, Xe3, ALU),
    spec(Op::Rndz, "rndz", Some(0x47), Some(0x47), BasicUnaryRegImm, Gen7, Xe3, ALU),
    spec(Op::Mac, "mac", Some(0x48), Some(0x48), BasicBinaryRegRegImm, Gen7, Xe3, ALU),
    spec(Op::Mach, "mach", Some(0x49), Some(0x49), BasicBinaryRegRegImm, Gen7, Xe3, ALU),
    spec(Op::Lzd, "lzd", Some(0x4A), Some(0x4A), BasicUnaryRegImm, Gen7, Xe3, ALU),
    spec(Op::Fbh, "fbh", Some(0x4B), Some(0x4B), BasicUnaryRegImm, Gen7, Xe3, LOGIC),
    spec(Op::Fbl, "fbl", Some(0x4C), Some(0x4C), BasicUnaryRegImm, Gen7, Xe3, LOGIC),
    spec(Op::Cbit, "cbit", Some(0x4D), Some(0x4D), BasicUnaryRegImm, Gen7, Xe3, LOGIC),
    spec(Op::Addc, "addc", Some(0x4E), Some(0x4E), BasicBinaryRegRegImm, Gen7, Xe3, ALU),
    spec(Op::Subb, "subb", Some(0x4F), Some(0x4F), BasicBinaryRegRegImm, Gen7, Xe3, ALU),
    spec(Op::Sad2, "sad2", Some(0x50), None, BasicBinaryRegRegImm, Gen7, Gen11, ALU),
    spec(Op::Sada2, "sada2", Some(0x51), None, BasicBinaryRegRegImm, Gen7, Gen11, ALU),
    spec(Op::Add3, "add3", None, Some(0x52), TernaryRegImmRegRegImm, XeHp, Xe3, ALU),
    spec(Op::Macl, "macl", None, Some(0x53), BasicBinaryRegRegImm, Xe, Xe3, ALU),
    spec(Op::Dp4, "dp4", Some(0x54), None, BasicBinaryRegReg, Gen7, Gen11, ALU),
    spec(Op::Dph, "dph", Some(0x55), None, BasicBinaryRegReg, Gen7, Gen11, ALU),
    spec(Op::Dp3, "dp3", Some(0x56), None, BasicBinaryRegReg, Gen7, Gen11, ALU),
    spec(Op::Dp2, "dp2", Some(0x57), None, BasicBinaryRegReg, Gen7, Gen11, ALU),
    spec(Op::Dp4a, "dp4a", None, Some(0x58), TernaryRegImmRegRegImm, Xe, Xe3, ALU),
    spec(Op::Line, "line", Some(0x59), None, BasicBinaryRegReg, Gen7, Gen11, ALU),
    spec(Op::Pln, "pln", Some(0x5A), None, BasicBinaryRegReg, Gen7, Gen11, ALU),
    spec(Op::Dpas, "dpas", None, Some(0x59), TernaryRegRegReg, XeHp, Xe3, SEND),
    spec(Op::Dpasw, "dpasw", None, Some(0x5A), TernaryRegRegReg, XeHp, XeHpg, SEND),
    spec(Op::Mad, "mad", Some(0x5B), Some(0x5B), TernaryRegImmRegRegImm, Gen7, Xe3, ALU),
    spec(Op::Lrp, "lrp", Some(0x5C), Some(0x5C), TernaryRegRegReg, Gen7, Xe, ALU),
    spec(Op::Madm, "madm", Some(0x5D), Some(0x5D), TernaryMacro, Gen8, Xe3, ALU),
    spec(Op::Bfn, "bfn", None, Some(0x5E), TernaryRegImmRegRegImm, XeHp, Xe3, LOGIC),
];

/// Concrete format of a `math` for each function control value.
pub(crate) fn math_format(fc: crate::ir::MathFc, platform: Platform) -> Option<Format> {
    use crate::ir::MathFc::*;
    match fc {
        Inv | Log | Exp | Sqt | Rsqt | Sin | Cos => Some(MathUnaryRegImm),
        Fdiv | Pow => Some(MathBinaryRegRegImm),
        Idiv | Iqot | Irem if platform < Xe => Some(MathBinaryRegRegImm),
        Idiv | Iqot | Irem => None,
        Invm if platform >= Gen8 => Some(MathMacroBinaryRegReg),
        Rsqtm if platform >= Gen8 => Some(MathMacroUnaryReg),
        Invm | Rsqtm => None,
    }
}
