//! In-crate implementation of [FieldDecoder]/[FieldEncoder].
//!
//! An instruction is held as a little-endian `u128`. Each [Field] maps to one or
//! more bit fragments whose position depends on the encoding era and on the
//! instruction form (basic, send, Align16 ternary, Align1 ternary), with GEN7
//! and GEN7.5 using a layout of their own. Fields that
//! share bits are aliases that are never meaningful at the same time, e.g. the
//! condition modifier, the math function and the SFID all live in the same slot.
//!
//! Values are normalized on the way out, so that a register file, data type or
//! stride has a single code space regardless of how many bits the form spends
//! on it:
//!
//! - register file: 0 = ARF, 1 = GRF, 3 = IMM
//! - data type: [crate::ir::Type] discriminants
//! - strides and widths: [crate::ir::VertStride], [crate::ir::Width], [crate::ir::HorzStride]
//!
//! Compacted instructions are recognised but not expanded; they report
//! [InstDecodeError::NoCompactedForm].

use arrayvec::ArrayVec;
use bitutils::bits;

use super::fields::{Field, FieldDecoder, FieldEncoder, FieldError, InstDecodeError, OperandField};
use crate::{
    ir::{Era, Platform},
    model::{Model, OpcodeLookup},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    /// First instruction bit
    pub lo: u8,
    pub len: u8,
    /// Bit position of the fragment inside the field value
    pub at: u8,
}

/// How raw bits map onto the normalized value space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Xlat {
    Raw,
    /// 0 = GRF, 1 = ARF
    RegFile1,
    /// 0 = GRF, 1 = IMM
    RegFileGrfImm,
    /// 0 = IMM, 1 = ARF (an address register)
    DescRegFile,
    /// 3-bit Align16 ternary type: F, D, UD, DF, HF
    TernaryType,
    /// 3-bit vertical stride where 7 means VxH
    VertStride3,
    /// 2-bit ternary vertical stride: 0, 2, 4, 8
    TernaryVertStride,
    /// 1-bit destination stride: 1, 2
    HorzStride1,
}

impl Xlat {
    fn decode(self, raw: u64) -> Option<u64> {
        match self {
            Xlat::Raw => Some(raw),
            Xlat::RegFile1 => [1, 0].get(raw as usize).copied(),
            Xlat::RegFileGrfImm => [1, 3].get(raw as usize).copied(),
            Xlat::DescRegFile => [3, 0].get(raw as usize).copied(),
            Xlat::TernaryType => [7, 1, 0, 6, 10].get(raw as usize).copied(),
            Xlat::VertStride3 => [0, 1, 2, 3, 4, 5, 6, 15].get(raw as usize).copied(),
            Xlat::TernaryVertStride => [0, 2, 3, 4].get(raw as usize).copied(),
            Xlat::HorzStride1 => [1, 2].get(raw as usize).copied(),
        }
    }

    fn encode(self, value: u64, width: u32) -> Option<u64> {
        match self {
            Xlat::Raw => Some(value),
            _ => (0..(1u64 << width)).find(|raw| self.decode(*raw) == Some(value)),
        }
    }
}

struct FieldLayout {
    field: Field,
    frags: &'static [Fragment],
    xlat: Xlat,
}

impl FieldLayout {
    fn width(&self) -> u32 {
        self.frags
            .iter()
            .map(|f| u32::from(f.at) + u32::from(f.len))
            .max()
            .unwrap_or(0)
    }
    fn raw_width(&self) -> u32 {
        self.frags.iter().map(|f| u32::from(f.len)).sum()
    }
}

macro_rules! layout {
    (@xlat) => {
        Xlat::Raw
    };
    (@xlat $x:ident) => {
        Xlat::$x
    };
    ($field:expr => $($hi:literal : $lo:literal $(@ $at:literal)?),+ $(; $xlat:ident)?) => {
        FieldLayout {
            field: $field,
            frags: &[$(Fragment { lo: $lo, len: $hi - $lo + 1, at: 0 $(+ $at)? }),+],
            xlat: layout!(@xlat $($xlat)?),
        }
    };
}

use Field::{Dst, Src};
use OperandField::*;

static GEN_HEADER: &[FieldLayout] = &[
    layout!(Field::Opcode => 6:0),
    layout!(Field::AccessMode => 8:8),
    layout!(Field::DepCtrl => 10:9),
    layout!(Field::ChannelOffset => 11:11, 13:12 @ 1),
    layout!(Field::ThreadCtrl => 15:14),
    layout!(Field::PredCtrl => 19:16),
    layout!(Field::PredInv => 20:20),
    layout!(Field::ExecSize => 23:21),
    layout!(Field::CondModifier => 27:24),
    layout!(Field::MathFc => 27:24),
    layout!(Field::AccWrCtrl => 28:28),
    layout!(Field::BranchCtrl => 28:28),
    layout!(Field::CompactCtrl => 29:29),
    layout!(Field::DebugCtrl => 30:30),
    layout!(Field::Saturate => 31:31),
    layout!(Field::FlagSubRegNum => 32:32),
    layout!(Field::FlagRegNum => 33:33),
    layout!(Field::MaskCtrl => 34:34),
];

static GEN_BASIC: &[FieldLayout] = &[
    layout!(Dst(RegFile) => 36:35),
    layout!(Dst(DataType) => 40:37),
    layout!(Src(0, RegFile) => 42:41),
    layout!(Src(0, DataType) => 46:43),
    layout!(Dst(AddrImm) => 56:48, 47:47 @ 9),
    layout!(Dst(AddrSubRegNum) => 60:57),
    layout!(Dst(SubRegNum) => 52:48),
    layout!(Dst(RegNum) => 60:53),
    layout!(Dst(HorzStride) => 62:61),
    layout!(Dst(AddrMode) => 63:63),
    layout!(Dst(SpecialAcc) => 52:48),
    layout!(Src(0, SubRegNum) => 68:64),
    layout!(Src(0, RegNum) => 76:69),
    layout!(Src(0, SrcMod) => 78:77),
    layout!(Src(0, AddrMode) => 79:79),
    layout!(Src(0, HorzStride) => 81:80),
    layout!(Src(0, Width) => 84:82),
    layout!(Src(0, VertStride) => 88:85),
    layout!(Src(0, AddrImm) => 72:64, 95:95 @ 9),
    layout!(Src(0, AddrSubRegNum) => 76:73),
    layout!(Src(0, SpecialAcc) => 68:64),
    layout!(Src(1, RegFile) => 90:89),
    layout!(Src(1, DataType) => 94:91),
    layout!(Src(1, SubRegNum) => 100:96),
    layout!(Src(1, RegNum) => 108:101),
    layout!(Src(1, SrcMod) => 110:109),
    layout!(Src(1, AddrMode) => 111:111),
    layout!(Src(1, HorzStride) => 113:112),
    layout!(Src(1, Width) => 116:114),
    layout!(Src(1, VertStride) => 120:117),
    layout!(Src(1, AddrImm) => 104:96, 121:121 @ 9),
    layout!(Src(1, AddrSubRegNum) => 108:105),
    layout!(Src(1, SpecialAcc) => 100:96),
    layout!(Field::Imm => 127:96),
    layout!(Field::Imm64 => 95:64, 127:96 @ 32),
    layout!(Field::Jip => 127:96),
    layout!(Field::Uip => 95:64),
];

/// Align16 replaces region and subregister bits with swizzles and channel enables.
static GEN_BASIC_ALIGN16: &[FieldLayout] = &[
    layout!(Dst(ChanEn) => 51:48),
    layout!(Dst(SubRegNum) => 52:52 @ 4),
    layout!(Dst(AddrImm) => 56:52 @ 4, 47:47 @ 9),
    layout!(Dst(SpecialAcc) => 51:48),
    layout!(Src(0, ChanSel) => 67:64, 83:80 @ 4),
    layout!(Src(0, SubRegNum) => 68:68 @ 4),
    layout!(Src(0, AddrImm) => 72:68 @ 4, 95:95 @ 9),
    layout!(Src(0, SpecialAcc) => 67:64),
    layout!(Src(1, ChanSel) => 99:96, 115:112 @ 4),
    layout!(Src(1, SubRegNum) => 100:100 @ 4),
    layout!(Src(1, AddrImm) => 104:100 @ 4, 121:121 @ 9),
    layout!(Src(1, SpecialAcc) => 99:96),
];

static GEN_SEND: &[FieldLayout] = &[
    layout!(Field::Eot => 7:7),
    layout!(Field::Sfid => 27:24),
    layout!(Field::NoSrcDepSet => 28:28),
    layout!(Field::ExDescRegFile => 47:47; DescRegFile),
    layout!(Dst(AddrImm) => 56:48),
    layout!(Src(0, AddrImm) => 72:64),
    layout!(Src(1, RegFile) => 80:80; RegFile1),
    layout!(Src(1, RegNum) => 88:81),
    layout!(Field::DescRegFile => 90:89),
    layout!(Field::MsgDesc => 127:96),
    layout!(Field::ExMsgDesc => 27:24, 95:91 @ 6),
    layout!(Field::ExDescAddrSubRegNum => 95:91),
];

static GEN_TERNARY_ALIGN16: &[FieldLayout] = &[
    layout!(Dst(RegFile) => 35:35; RegFile1),
    layout!(Src(0, SrcMod) => 38:37),
    layout!(Src(1, SrcMod) => 40:39),
    layout!(Src(2, SrcMod) => 42:41),
    layout!(Src(0, DataType) => 45:43; TernaryType),
    layout!(Src(1, DataType) => 45:43; TernaryType),
    layout!(Src(2, DataType) => 45:43; TernaryType),
    layout!(Dst(DataType) => 48:46; TernaryType),
    layout!(Dst(ChanEn) => 52:49),
    layout!(Dst(SubRegNum) => 55:53 @ 2),
    layout!(Dst(RegNum) => 63:56),
    layout!(Src(0, RepCtrl) => 64:64),
    layout!(Src(0, ChanSel) => 72:65),
    layout!(Src(0, SubRegNum) => 75:73 @ 2),
    layout!(Src(0, RegNum) => 83:76),
    layout!(Src(0, SpecialAcc) => 68:65),
    layout!(Src(1, RepCtrl) => 85:85),
    layout!(Src(1, ChanSel) => 93:86),
    layout!(Src(1, SubRegNum) => 96:94 @ 2),
    layout!(Src(1, RegNum) => 104:97),
    layout!(Src(1, SpecialAcc) => 89:86),
    layout!(Src(2, RepCtrl) => 106:106),
    layout!(Src(2, ChanSel) => 114:107),
    layout!(Src(2, SubRegNum) => 117:115 @ 2),
    layout!(Src(2, RegNum) => 125:118),
    layout!(Src(2, SpecialAcc) => 110:107),
];

/// Align1 ternary operands, shared by GEN10+ and XE.
static TERNARY_ALIGN1: &[FieldLayout] = &[
    layout!(Dst(RegFile) => 38:38; RegFile1),
    layout!(Dst(DataType) => 42:39),
    layout!(Src(0, RegFile) => 43:43; RegFileGrfImm),
    layout!(Src(0, DataType) => 47:44),
    layout!(Src(1, RegFile) => 48:48; RegFile1),
    layout!(Src(1, DataType) => 52:49),
    layout!(Src(2, RegFile) => 53:53; RegFileGrfImm),
    layout!(Src(2, DataType) => 57:54),
    layout!(Dst(HorzStride) => 58:58; HorzStride1),
    layout!(Dst(SubRegNum) => 63:59),
    layout!(Dst(RegNum) => 71:64),
    layout!(Dst(SpecialAcc) => 63:59),
    layout!(Src(0, SrcMod) => 73:72),
    layout!(Src(0, VertStride) => 75:74; TernaryVertStride),
    layout!(Src(0, HorzStride) => 77:76),
    layout!(Src(0, SubRegNum) => 82:78),
    layout!(Src(0, RegNum) => 90:83),
    layout!(Src(0, Imm) => 90:75),
    layout!(Src(0, SpecialAcc) => 82:78),
    layout!(Src(1, SrcMod) => 92:91),
    layout!(Src(1, VertStride) => 94:93; TernaryVertStride),
    layout!(Src(1, HorzStride) => 96:95),
    layout!(Src(1, SubRegNum) => 101:97),
    layout!(Src(1, RegNum) => 109:102),
    layout!(Src(1, SpecialAcc) => 101:97),
    layout!(Src(2, SrcMod) => 111:110),
    layout!(Src(2, HorzStride) => 113:112),
    layout!(Src(2, SubRegNum) => 118:114),
    layout!(Src(2, RegNum) => 126:119),
    layout!(Src(2, Imm) => 126:111),
    layout!(Src(2, SpecialAcc) => 118:114),
];

static XE_HEADER: &[FieldLayout] = &[
    layout!(Field::Opcode => 6:0),
    layout!(Field::ThreadCtrl => 7:7),
    layout!(Field::Swsb => 15:8),
    layout!(Field::ExecSize => 18:16),
    layout!(Field::ChannelOffset => 21:19),
    layout!(Field::MaskCtrl => 22:22),
    layout!(Field::DebugCtrl => 23:23),
    layout!(Field::PredCtrl => 27:24),
    layout!(Field::PredInv => 28:28),
    layout!(Field::CompactCtrl => 29:29),
    layout!(Field::AccWrCtrl => 30:30),
    layout!(Field::BranchCtrl => 30:30),
    layout!(Field::Saturate => 31:31),
    layout!(Field::CondModifier => 35:32),
    layout!(Field::MathFc => 35:32),
    layout!(Field::SyncFc => 35:32),
    layout!(Field::FlagSubRegNum => 36:36),
    layout!(Field::FlagRegNum => 37:37),
];

static XE_BASIC: &[FieldLayout] = &[
    layout!(Dst(RegFile) => 39:38),
    layout!(Dst(DataType) => 43:40),
    layout!(Src(0, RegFile) => 45:44),
    layout!(Src(0, DataType) => 49:46),
    layout!(Src(1, RegFile) => 51:50),
    layout!(Src(1, DataType) => 55:52),
    layout!(Dst(AddrMode) => 56:56),
    layout!(Dst(HorzStride) => 58:57),
    layout!(Dst(SubRegNum) => 63:59),
    layout!(Dst(RegNum) => 71:64),
    layout!(Dst(AddrSubRegNum) => 62:59),
    layout!(Dst(AddrImm) => 71:63),
    layout!(Dst(SpecialAcc) => 63:59),
    layout!(Src(0, AddrMode) => 72:72),
    layout!(Src(0, SrcMod) => 74:73),
    layout!(Src(0, VertStride) => 77:75; VertStride3),
    layout!(Src(0, Width) => 80:78),
    layout!(Src(0, HorzStride) => 82:81),
    layout!(Src(0, SubRegNum) => 87:83),
    layout!(Src(0, RegNum) => 95:88),
    layout!(Src(0, AddrSubRegNum) => 86:83),
    layout!(Src(0, AddrImm) => 95:87),
    layout!(Src(0, SpecialAcc) => 87:83),
    layout!(Src(1, AddrMode) => 96:96),
    layout!(Src(1, SrcMod) => 98:97),
    layout!(Src(1, VertStride) => 101:99; VertStride3),
    layout!(Src(1, Width) => 104:102),
    layout!(Src(1, HorzStride) => 106:105),
    layout!(Src(1, SubRegNum) => 111:107),
    layout!(Src(1, RegNum) => 119:112),
    layout!(Src(1, AddrSubRegNum) => 110:107),
    layout!(Src(1, AddrImm) => 119:111),
    layout!(Src(1, SpecialAcc) => 111:107),
    layout!(Field::Imm => 127:96),
    layout!(Field::Imm64 => 95:64, 127:96 @ 32),
    layout!(Field::Jip => 127:96),
    layout!(Field::Uip => 95:64),
];

/// bfn and dpas have no condition or source modifiers, their function bits reuse those slots.
static XE_TERNARY: &[FieldLayout] = &[
    layout!(Field::BfnFc => 35:32, 73:72 @ 4, 92:91 @ 6),
    layout!(Field::SystolicDepth => 33:32),
    layout!(Field::RepeatCount => 35:34, 127:127 @ 2),
];

static XE_SEND: &[FieldLayout] = &[
    layout!(Field::Sfid => 35:32),
    layout!(Dst(RegFile) => 38:38; RegFile1),
    layout!(Dst(RegNum) => 46:39),
    layout!(Dst(AddrMode) => 47:47),
    layout!(Dst(AddrSubRegNum) => 42:39),
    layout!(Dst(AddrImm) => 46:43 @ 4),
    layout!(Src(0, RegFile) => 48:48; RegFile1),
    layout!(Src(0, RegNum) => 56:49),
    layout!(Src(1, RegFile) => 58:58; RegFile1),
    layout!(Src(1, RegNum) => 66:59),
    layout!(Field::DescRegFile => 67:67; DescRegFile),
    layout!(Field::ExDescRegFile => 68:68; DescRegFile),
    layout!(Field::ExDescAddrSubRegNum => 72:69),
    layout!(Field::Src1Length => 77:73),
    layout!(Field::ExBso => 78:78),
    layout!(Field::Cps => 79:79),
    layout!(Field::FusionCtrl => 80:80),
    layout!(Field::Eot => 81:81),
    layout!(Field::ExMsgDesc => 77:73 @ 6, 95:82 @ 18),
    layout!(Field::MsgDesc => 127:96),
];

/// GEN7 and GEN7.5 keep the flag register with src1 and spend fewer bits on
/// types, so most of the word moved when GEN8 widened them.
static GEN7_HEADER: &[FieldLayout] = &[
    layout!(Field::Opcode => 6:0),
    layout!(Field::AccessMode => 8:8),
    layout!(Field::MaskCtrl => 9:9),
    layout!(Field::DepCtrl => 11:10),
    layout!(Field::ChannelOffset => 47:47, 13:12 @ 1),
    layout!(Field::ThreadCtrl => 15:14),
    layout!(Field::PredCtrl => 19:16),
    layout!(Field::PredInv => 20:20),
    layout!(Field::ExecSize => 23:21),
    layout!(Field::CondModifier => 27:24),
    layout!(Field::MathFc => 27:24),
    layout!(Field::AccWrCtrl => 28:28),
    layout!(Field::CompactCtrl => 29:29),
    layout!(Field::DebugCtrl => 30:30),
    layout!(Field::Saturate => 31:31),
];

static GEN7_BASIC: &[FieldLayout] = &[
    layout!(Dst(RegFile) => 33:32),
    layout!(Dst(DataType) => 36:34),
    layout!(Src(0, RegFile) => 38:37),
    layout!(Src(0, DataType) => 41:39),
    layout!(Src(1, RegFile) => 43:42),
    layout!(Src(1, DataType) => 46:44),
    layout!(Dst(AddrImm) => 57:48),
    layout!(Dst(AddrSubRegNum) => 60:58),
    layout!(Dst(SubRegNum) => 52:48),
    layout!(Dst(RegNum) => 60:53),
    layout!(Dst(HorzStride) => 62:61),
    layout!(Dst(AddrMode) => 63:63),
    layout!(Dst(SpecialAcc) => 52:48),
    layout!(Src(0, SubRegNum) => 68:64),
    layout!(Src(0, RegNum) => 76:69),
    layout!(Src(0, SrcMod) => 78:77),
    layout!(Src(0, AddrMode) => 79:79),
    layout!(Src(0, HorzStride) => 81:80),
    layout!(Src(0, Width) => 84:82),
    layout!(Src(0, VertStride) => 88:85),
    layout!(Src(0, AddrImm) => 73:64),
    layout!(Src(0, AddrSubRegNum) => 76:74),
    layout!(Src(0, SpecialAcc) => 68:64),
    layout!(Field::FlagSubRegNum => 89:89),
    layout!(Field::FlagRegNum => 90:90),
    layout!(Src(1, SubRegNum) => 100:96),
    layout!(Src(1, RegNum) => 108:101),
    layout!(Src(1, SrcMod) => 110:109),
    layout!(Src(1, AddrMode) => 111:111),
    layout!(Src(1, HorzStride) => 113:112),
    layout!(Src(1, Width) => 116:114),
    layout!(Src(1, VertStride) => 120:117),
    layout!(Src(1, AddrImm) => 105:96),
    layout!(Src(1, AddrSubRegNum) => 108:106),
    layout!(Src(1, SpecialAcc) => 100:96),
    layout!(Field::Imm => 127:96),
    layout!(Field::Jip => 111:96),
    layout!(Field::Uip => 127:112),
];

static GEN7_BASIC_ALIGN16: &[FieldLayout] = &[
    layout!(Dst(ChanEn) => 51:48),
    layout!(Dst(SubRegNum) => 52:52 @ 4),
    layout!(Dst(AddrImm) => 57:52 @ 4),
    layout!(Dst(SpecialAcc) => 51:48),
    layout!(Src(0, ChanSel) => 67:64, 83:80 @ 4),
    layout!(Src(0, SubRegNum) => 68:68 @ 4),
    layout!(Src(0, AddrImm) => 73:68 @ 4),
    layout!(Src(0, SpecialAcc) => 67:64),
    layout!(Src(1, ChanSel) => 99:96, 115:112 @ 4),
    layout!(Src(1, SubRegNum) => 100:100 @ 4),
    layout!(Src(1, AddrImm) => 105:100 @ 4),
    layout!(Src(1, SpecialAcc) => 99:96),
];

/// The descriptor is src1; its top bit is EOT.
static GEN7_SEND: &[FieldLayout] = &[
    layout!(Field::Sfid => 27:24),
    layout!(Field::ExMsgDesc => 27:24),
    layout!(Field::DescRegFile => 43:42),
    layout!(Field::MsgDesc => 126:96),
    layout!(Field::Eot => 127:127),
];

/// Only the fields that differ from [GEN_TERNARY_ALIGN16].
static GEN7_TERNARY_ALIGN16: &[FieldLayout] = &[
    layout!(Dst(RegFile) => 32:32; RegFile1),
    layout!(Field::FlagSubRegNum => 33:33),
    layout!(Field::FlagRegNum => 34:34),
    layout!(Src(0, SrcMod) => 37:36),
    layout!(Src(1, SrcMod) => 39:38),
    layout!(Src(2, SrcMod) => 41:40),
    layout!(Src(0, DataType) => 43:42; TernaryType),
    layout!(Src(1, DataType) => 43:42; TernaryType),
    layout!(Src(2, DataType) => 43:42; TernaryType),
    layout!(Dst(DataType) => 45:44; TernaryType),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    Basic { align16: bool },
    Send,
    TernaryAlign16,
    TernaryAlign1,
}

/// One instruction worth of native bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeInst {
    model: Model,
    bits: u128,
    compacted: bool,
}

impl NativeInst {
    pub fn new(platform: Platform) -> Self {
        Self::from_bits(platform, 0)
    }

    pub fn from_bits(platform: Platform, bits: u128) -> Self {
        Self {
            model: Model::new(platform),
            bits,
            compacted: false,
        }
    }

    pub fn bits(&self) -> u128 {
        self.bits
    }

    pub fn is_compacted(&self) -> bool {
        self.compacted
    }

    fn form(&self) -> Form {
        let format = match self.model.lookup_opcode(bits!(self.bits as u32, 0:6) as u64) {
            OpcodeLookup::Valid(spec) | OpcodeLookup::WrongPlatform(spec) => Some(spec.format),
            OpcodeLookup::Unmapped => None,
        };
        let era = self.model.platform.era();
        let align16 = era == Era::Gen && bits!(self.bits as u32, 8:8) != 0;
        match format {
            Some(f) if f.is_send() => Form::Send,
            Some(f) if f.is_ternary() && align16 => Form::TernaryAlign16,
            Some(f) if f.is_ternary() => Form::TernaryAlign1,
            _ => Form::Basic { align16 },
        }
    }

    fn tables(&self) -> ArrayVec<&'static [FieldLayout], 3> {
        let mut tables = ArrayVec::new();
        if self.model.platform < Platform::Gen8 {
            match self.form() {
                Form::Basic { align16 } => {
                    if align16 {
                        tables.push(GEN7_BASIC_ALIGN16);
                    }
                    tables.push(GEN7_BASIC);
                }
                Form::Send => {
                    tables.push(GEN7_SEND);
                    tables.push(GEN7_BASIC);
                }
                // no Align1 ternary form before GEN10
                Form::TernaryAlign16 | Form::TernaryAlign1 => {
                    tables.push(GEN7_TERNARY_ALIGN16);
                    tables.push(GEN_TERNARY_ALIGN16);
                }
            }
            tables.push(GEN7_HEADER);
            return tables;
        }
        match (self.model.platform.era(), self.form()) {
            (Era::Gen, Form::Basic { align16 }) => {
                if align16 {
                    tables.push(GEN_BASIC_ALIGN16);
                }
                tables.push(GEN_BASIC);
                tables.push(GEN_HEADER);
            }
            (Era::Gen, Form::Send) => {
                tables.push(GEN_SEND);
                tables.push(GEN_BASIC);
                tables.push(GEN_HEADER);
            }
            (Era::Gen, Form::TernaryAlign16) => {
                tables.push(GEN_TERNARY_ALIGN16);
                tables.push(GEN_HEADER);
            }
            (Era::Gen, Form::TernaryAlign1) => {
                tables.push(TERNARY_ALIGN1);
                tables.push(GEN_HEADER);
            }
            (Era::Xe, Form::Send) => {
                tables.push(XE_SEND);
                tables.push(XE_HEADER);
            }
            (Era::Xe, Form::TernaryAlign1 | Form::TernaryAlign16) => {
                tables.push(XE_TERNARY);
                tables.push(TERNARY_ALIGN1);
                tables.push(XE_HEADER);
            }
            (Era::Xe, Form::Basic { .. }) => {
                tables.push(XE_BASIC);
                tables.push(XE_HEADER);
            }
        }
        tables
    }

    fn layout(&self, field: Field) -> Option<&'static FieldLayout> {
        self.tables()
            .into_iter()
            .find_map(|table| table.iter().find(|l| l.field == field))
    }

    fn extract(&self, layout: &FieldLayout) -> u64 {
        layout.frags.iter().fold(0u64, |acc, f| {
            let raw = (self.bits >> f.lo) & ((1u128 << f.len) - 1);
            acc | ((raw as u64) << f.at)
        })
    }
}

impl FieldDecoder for NativeInst {
    fn decode_inst(&mut self, bytes: &[u8]) -> Result<(), InstDecodeError> {
        if bytes.len() < 4 {
            return Err(InstDecodeError::Other(format!(
                "need at least 4 bytes, {} available",
                bytes.len()
            )));
        }
        let mut buf = [0u8; 16];
        let dw0 = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        self.compacted = bits!(dw0, 29:29) != 0;
        if self.compacted {
            let n = bytes.len().min(8);
            buf[..n].copy_from_slice(&bytes[..n]);
            self.bits = u128::from_le_bytes(buf);
            return Err(InstDecodeError::NoCompactedForm);
        }
        if bytes.len() < 16 {
            return Err(InstDecodeError::Other(format!(
                "need 16 bytes, {} available",
                bytes.len()
            )));
        }
        buf.copy_from_slice(&bytes[..16]);
        self.bits = u128::from_le_bytes(buf);
        Ok(())
    }

    fn get(&self, field: Field) -> Result<u64, FieldError> {
        let layout = self.layout(field).ok_or(FieldError::InvalidField(field))?;
        let raw = self.extract(layout);
        layout
            .xlat
            .decode(raw)
            .ok_or(FieldError::InvalidValue { field, value: raw })
    }

    fn get_signed(&self, field: Field) -> Result<i64, FieldError> {
        let layout = self.layout(field).ok_or(FieldError::InvalidField(field))?;
        let value = self.extract(layout);
        let width = layout.width();
        if width == 0 || width >= 64 {
            return Ok(value as i64);
        }
        let shift = 64 - width;
        Ok(((value << shift) as i64) >> shift)
    }

    fn has_field(&self, field: Field) -> bool {
        self.layout(field).is_some()
    }
}

impl FieldEncoder for NativeInst {
    fn set(&mut self, field: Field, value: u64) -> Result<(), FieldError> {
        let layout = self.layout(field).ok_or(FieldError::InvalidField(field))?;
        let width = layout.width();
        let invalid = FieldError::InvalidValue { field, value };
        let raw = layout.xlat.encode(value, layout.raw_width()).ok_or(invalid.clone())?;
        let mask = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };

        let previous = self.bits;
        for f in layout.frags {
            let frag_mask = (1u128 << f.len) - 1;
            self.bits &= !(frag_mask << f.lo);
            self.bits |= ((u128::from(raw) >> f.at) & frag_mask) << f.lo;
        }
        // Negative values are accepted when they fit once sign-extended
        let fits = self.extract(layout) == raw & mask
            && (raw & !mask == 0 || (raw as i64) >> (width.min(63) - 1) == -1);
        if !fits {
            self.bits = previous;
            return Err(invalid);
        }
        Ok(())
    }

    fn to_bytes(&self) -> [u8; 16] {
        self.bits.to_le_bytes()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn get_and_set_basic_fields() {
        let mut inst = NativeInst::new(Platform::Gen9);
        inst.set(Field::Opcode, 0x01).unwrap();
        inst.set(Field::ExecSize, 4).unwrap();
        inst.set(Field::Dst(RegNum), 17).unwrap();
        inst.set(Field::Src(1, VertStride), 15).unwrap();
        assert_eq!(inst.get(Field::Opcode), Ok(0x01));
        assert_eq!(inst.get(Field::ExecSize), Ok(4));
        assert_eq!(inst.get(Field::Dst(RegNum)), Ok(17));
        assert_eq!(inst.get(Field::Src(1, VertStride)), Ok(15));
    }

    #[test]
    fn split_fields() {
        let mut inst = NativeInst::new(Platform::Gen9);
        inst.set(Field::ChannelOffset, 5).unwrap();
        assert_eq!(inst.bits() & (1 << 11), 1 << 11);
        assert_eq!((inst.bits() >> 12) & 3, 2);
        assert_eq!(inst.get(Field::ChannelOffset), Ok(5));
    }

    #[test]
    fn signed_fields() {
        let mut inst = NativeInst::new(Platform::Gen9);
        inst.set(Field::Opcode, 0x20).unwrap();
        inst.set(Field::Jip, (-32i64) as u64).unwrap();
        assert_eq!(inst.get_signed(Field::Jip), Ok(-32));

        inst.set(Field::Opcode, 0x01).unwrap();
        inst.set(Field::Src(0, AddrImm), (-4i64) as u64).unwrap();
        assert_eq!(inst.get_signed(Field::Src(0, AddrImm)), Ok(-4));
    }

    #[test]
    fn value_out_of_range() {
        let mut inst = NativeInst::new(Platform::Gen9);
        assert!(matches!(
            inst.set(Field::ExecSize, 8),
            Err(FieldError::InvalidValue { .. })
        ));
        assert_eq!(inst.bits(), 0);
    }

    #[test]
    fn era_specific_fields() {
        let gen = NativeInst::new(Platform::Gen9);
        assert_eq!(gen.get(Field::Swsb), Err(FieldError::InvalidField(Field::Swsb)));
        let xe = NativeInst::new(Platform::Xe);
        assert_eq!(xe.get(Field::Swsb), Ok(0));
        assert!(!xe.has_field(Field::AccessMode));
    }

    #[test]
    fn gen7_field_positions() {
        // mov with NoMask, flag f1.1, dst :f and src0 :d
        let bits: u128 = 0x01 | (1 << 9) | (7 << 34) | (1 << 39) | (1 << 89) | (1 << 90);
        let inst = NativeInst::from_bits(Platform::Gen7, bits);
        assert_eq!(inst.get(Field::MaskCtrl), Ok(1));
        assert_eq!(inst.get(Field::FlagRegNum), Ok(1));
        assert_eq!(inst.get(Field::FlagSubRegNum), Ok(1));
        assert_eq!(inst.get(Field::Dst(DataType)), Ok(7));
        assert_eq!(inst.get(Field::Src(0, DataType)), Ok(1));
        assert!(!inst.has_field(Field::BranchCtrl));

        // the same bits mean something else from GEN8 on
        let gen8 = NativeInst::from_bits(Platform::Gen8, bits);
        assert_eq!(gen8.get(Field::FlagRegNum), Ok(0));
        assert_eq!(gen8.get(Field::MaskCtrl), Ok(0));
    }

    #[test]
    fn gen7_ternary_and_send() {
        let mut mad = NativeInst::new(Platform::Gen7p5);
        mad.set(Field::Opcode, 0x5B).unwrap();
        mad.set(Field::AccessMode, 1).unwrap();
        mad.set(Field::Dst(DataType), 1).unwrap();
        mad.set(Field::FlagRegNum, 1).unwrap();
        assert_eq!((mad.bits() >> 44) & 3, 1);
        assert_eq!((mad.bits() >> 34) & 1, 1);

        let bits: u128 = 0x31 | (12 << 24) | (3 << 42) | (0x0210_0000 << 96) | (1 << 127);
        let send = NativeInst::from_bits(Platform::Gen7p5, bits);
        assert_eq!(send.get(Field::Eot), Ok(1));
        assert_eq!(send.get(Field::MsgDesc), Ok(0x0210_0000));
        assert_eq!(send.get(Field::DescRegFile), Ok(3));
        assert_eq!(send.get(Field::ExMsgDesc), Ok(12));
    }

    #[test]
    fn align16_overrides() {
        let mut inst = NativeInst::new(Platform::Gen9);
        inst.set(Field::Opcode, 0x01).unwrap();
        inst.set(Field::AccessMode, 1).unwrap();
        inst.set(Field::Src(0, ChanSel), 0xE4).unwrap();
        assert_eq!(inst.get(Field::Src(0, ChanSel)), Ok(0xE4));
        inst.set(Field::Dst(SubRegNum), 16).unwrap();
        assert_eq!(inst.get(Field::Dst(SubRegNum)), Ok(16));
        assert!(inst.set(Field::Dst(SubRegNum), 4).is_err());
    }

    #[test]
    fn translated_fields() {
        // XE send: descriptor register file is a single bit, 0 = immediate
        let mut inst = NativeInst::new(Platform::XeHpg);
        inst.set(Field::Opcode, 0x31).unwrap();
        assert_eq!(inst.get(Field::DescRegFile), Ok(3));
        inst.set(Field::DescRegFile, 0).unwrap();
        assert_eq!(inst.get(Field::DescRegFile), Ok(0));
        assert!(inst.set(Field::DescRegFile, 1).is_err());
    }

    #[test]
    fn compacted_instructions() {
        let mut inst = NativeInst::new(Platform::Gen9);
        let mut bytes = [0u8; 8];
        bytes[3] = 0x20;
        assert_eq!(inst.decode_inst(&bytes), Err(InstDecodeError::NoCompactedForm));
        assert!(inst.is_compacted());
    }

    #[test]
    fn short_buffers() {
        let mut inst = NativeInst::new(Platform::Gen9);
        assert!(matches!(inst.decode_inst(&[0, 0]), Err(InstDecodeError::Other(_))));
        assert!(matches!(inst.decode_inst(&[0; 12]), Err(InstDecodeError::Other(_))));
    }
}
