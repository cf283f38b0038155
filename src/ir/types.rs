//! Scalar enumerations shared by instructions and operands.
//!
//! Enums deriving [FromPrimitive] use the normalized field codes produced by
//! [crate::ged::FieldDecoder], so they can be decoded straight from a field value
//! with [crate::ged::decode_enum].

use std::fmt;

use bitflags::bitflags;
use phf::phf_map;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum Type {
    UD = 0,
    D = 1,
    UW = 2,
    W = 3,
    UB = 4,
    B = 5,
    DF = 6,
    F = 7,
    UQ = 8,
    Q = 9,
    HF = 10,
    BF = 11,
    /// Packed 8x4-bit unsigned vector immediate
    UV = 12,
    /// Packed 4x8-bit restricted float vector immediate
    VF = 13,
    /// Packed 8x4-bit signed vector immediate
    V = 14,
}
impl Type {
    pub fn size_bits(self) -> u32 {
        match self {
            Type::UB | Type::B => 8,
            Type::UW | Type::W | Type::HF | Type::BF => 16,
            Type::UD | Type::D | Type::F | Type::UV | Type::VF | Type::V => 32,
            Type::DF | Type::UQ | Type::Q => 64,
        }
    }
    pub fn size_bytes(self) -> u32 {
        self.size_bits() / 8
    }
    pub fn is_64bit(self) -> bool {
        self.size_bits() == 64
    }
    pub fn is_signed_int(self) -> bool {
        matches!(self, Type::B | Type::W | Type::D | Type::Q | Type::V)
    }
    pub fn is_float(self) -> bool {
        matches!(self, Type::HF | Type::BF | Type::F | Type::DF | Type::VF)
    }
    pub fn name(self) -> &'static str {
        match self {
            Type::UD => "ud",
            Type::D => "d",
            Type::UW => "uw",
            Type::W => "w",
            Type::UB => "ub",
            Type::B => "b",
            Type::DF => "df",
            Type::F => "f",
            Type::UQ => "uq",
            Type::Q => "q",
            Type::HF => "hf",
            Type::BF => "bf",
            Type::UV => "uv",
            Type::VF => "vf",
            Type::V => "v",
        }
    }
}
impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.name())
    }
}

/// Register files / architecture register names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegName {
    Grf,
    Null,
    Address,
    Acc,
    Flag,
    ChanEnable,
    Msg,
    Stack,
    State,
    Control,
    Notify,
    Ip,
    Tdr,
    Tm,
    FlowCtrl,
    Dbg,
}
impl RegName {
    pub fn name(self) -> &'static str {
        match self {
            RegName::Grf => "r",
            RegName::Null => "null",
            RegName::Address => "a",
            RegName::Acc => "acc",
            RegName::Flag => "f",
            RegName::ChanEnable => "ce",
            RegName::Msg => "msg",
            RegName::Stack => "sp",
            RegName::State => "sr",
            RegName::Control => "cr",
            RegName::Notify => "n",
            RegName::Ip => "ip",
            RegName::Tdr => "tdr",
            RegName::Tm => "tm",
            RegName::FlowCtrl => "fc",
            RegName::Dbg => "dbg",
        }
    }
}

/// A register number and a subregister number (in elements of the operand type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RegRef {
    pub reg_num: u16,
    pub sub_reg_num: u16,
}
impl RegRef {
    pub const ZERO: RegRef = RegRef { reg_num: 0, sub_reg_num: 0 };
    pub fn new(reg_num: u16, sub_reg_num: u16) -> Self {
        Self { reg_num, sub_reg_num }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive)]
pub enum ExecSize {
    Simd1 = 0,
    Simd2 = 1,
    Simd4 = 2,
    Simd8 = 3,
    Simd16 = 4,
    Simd32 = 5,
}
impl ExecSize {
    pub fn lanes(self) -> u32 {
        1 << (self as u32)
    }
    pub fn from_lanes(lanes: u32) -> Option<Self> {
        match lanes {
            1 => Some(ExecSize::Simd1),
            2 => Some(ExecSize::Simd2),
            4 => Some(ExecSize::Simd4),
            8 => Some(ExecSize::Simd8),
            16 => Some(ExecSize::Simd16),
            32 => Some(ExecSize::Simd32),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum ChannelOffset {
    M0 = 0,
    M4 = 1,
    M8 = 2,
    M12 = 3,
    M16 = 4,
    M20 = 5,
    M24 = 6,
    M28 = 7,
}
impl ChannelOffset {
    pub fn offset(self) -> u32 {
        4 * self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum MaskCtrl {
    Normal = 0,
    NoMask = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum PredCtrl {
    None = 0,
    Seq = 1,
    AnyV = 2,
    AllV = 3,
    Any2H = 4,
    All2H = 5,
    Any4H = 6,
    All4H = 7,
    Any8H = 8,
    All8H = 9,
    Any16H = 10,
    All16H = 11,
    Any32H = 12,
    All32H = 13,
    Any = 14,
    All = 15,
}
impl PredCtrl {
    pub fn suffix(self) -> &'static str {
        match self {
            PredCtrl::None | PredCtrl::Seq => "",
            PredCtrl::AnyV => ".anyv",
            PredCtrl::AllV => ".allv",
            PredCtrl::Any2H => ".any2h",
            PredCtrl::All2H => ".all2h",
            PredCtrl::Any4H => ".any4h",
            PredCtrl::All4H => ".all4h",
            PredCtrl::Any8H => ".any8h",
            PredCtrl::All8H => ".all8h",
            PredCtrl::Any16H => ".any16h",
            PredCtrl::All16H => ".all16h",
            PredCtrl::Any32H => ".any32h",
            PredCtrl::All32H => ".all32h",
            PredCtrl::Any => ".any",
            PredCtrl::All => ".all",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Predication {
    pub function: PredCtrl,
    pub inverse: bool,
}
impl Predication {
    pub const NONE: Predication = Predication { function: PredCtrl::None, inverse: false };
    pub fn is_some(&self) -> bool {
        self.function != PredCtrl::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum FlagModifier {
    None = 0,
    Eq = 1,
    Ne = 2,
    Gt = 3,
    Ge = 4,
    Lt = 5,
    Le = 6,
    Ov = 8,
    Un = 9,
    /// Early-out, only produced for math macros which reuse the field.
    Eo = 0x10,
}
impl FlagModifier {
    pub fn name(self) -> &'static str {
        match self {
            FlagModifier::None => "",
            FlagModifier::Eq => "eq",
            FlagModifier::Ne => "ne",
            FlagModifier::Gt => "gt",
            FlagModifier::Ge => "ge",
            FlagModifier::Lt => "lt",
            FlagModifier::Le => "le",
            FlagModifier::Ov => "ov",
            FlagModifier::Un => "un",
            FlagModifier::Eo => "eo",
        }
    }
}

/// Source or destination modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum OperandModifier {
    None = 0,
    Abs = 1,
    Neg = 2,
    NegAbs = 3,
    Sat = 4,
}

/// Implicit accumulator selected by a math macro operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum ImplAcc {
    Acc2 = 0,
    Acc3 = 1,
    Acc4 = 2,
    Acc5 = 3,
    Acc6 = 4,
    Acc7 = 5,
    Acc8 = 6,
    Acc9 = 7,
    NoAcc = 8,
}
impl ImplAcc {
    pub fn name(self) -> &'static str {
        match self {
            ImplAcc::Acc2 => "mme0",
            ImplAcc::Acc3 => "mme1",
            ImplAcc::Acc4 => "mme2",
            ImplAcc::Acc5 => "mme3",
            ImplAcc::Acc6 => "mme4",
            ImplAcc::Acc7 => "mme5",
            ImplAcc::Acc8 => "mme6",
            ImplAcc::Acc9 => "mme7",
            ImplAcc::NoAcc => "nomme",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum VertStride {
    Vs0 = 0,
    Vs1 = 1,
    Vs2 = 2,
    Vs4 = 3,
    Vs8 = 4,
    Vs16 = 5,
    Vs32 = 6,
    VxH = 15,
}
impl VertStride {
    pub fn value(self) -> Option<u32> {
        match self {
            VertStride::VxH => None,
            vs => Some((1 << (vs as u32)) >> 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum Width {
    W1 = 0,
    W2 = 1,
    W4 = 2,
    W8 = 3,
    W16 = 4,
}
impl Width {
    pub fn value(self) -> u32 {
        1 << (self as u32)
    }
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            1 => Some(Width::W1),
            2 => Some(Width::W2),
            4 => Some(Width::W4),
            8 => Some(Width::W8),
            16 => Some(Width::W16),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum HorzStride {
    H0 = 0,
    H1 = 1,
    H2 = 2,
    H4 = 3,
}
impl HorzStride {
    pub fn value(self) -> u32 {
        (1 << (self as u32)) >> 1
    }
}

/// Operand region `<v;w,h>`. Components not present in the encoding are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub v: Option<VertStride>,
    pub w: Option<Width>,
    pub h: Option<HorzStride>,
}
impl Region {
    pub const fn new(v: VertStride, w: Width, h: HorzStride) -> Self {
        Self { v: Some(v), w: Some(w), h: Some(h) }
    }
    pub const NONE: Region = Region { v: None, w: None, h: None };
    pub const SRC010: Region = Region::new(VertStride::Vs0, Width::W1, HorzStride::H0);
    pub const SRC110: Region = Region::new(VertStride::Vs1, Width::W1, HorzStride::H0);
    pub const SRC221: Region = Region::new(VertStride::Vs2, Width::W2, HorzStride::H1);
    pub const SRC441: Region = Region::new(VertStride::Vs4, Width::W4, HorzStride::H1);
    pub const SRC881: Region = Region::new(VertStride::Vs8, Width::W8, HorzStride::H1);
    pub const SRC0X0: Region = Region { v: Some(VertStride::Vs0), w: None, h: Some(HorzStride::H0) };
    pub const SRC2X1: Region = Region { v: Some(VertStride::Vs2), w: None, h: Some(HorzStride::H1) };
    pub const SRCXX0: Region = Region { v: None, w: None, h: Some(HorzStride::H0) };
    pub const SRCXX1: Region = Region { v: None, w: None, h: Some(HorzStride::H1) };
    pub const DST1: Region = Region { v: None, w: None, h: Some(HorzStride::H1) };

    pub fn dst(h: HorzStride) -> Self {
        Self { v: None, w: None, h: Some(h) }
    }
}
impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.v, self.w, self.h) {
            (None, None, None) => Ok(()),
            (None, None, Some(h)) => write!(f, "<{}>", h.value()),
            (Some(VertStride::VxH), Some(w), Some(h)) => write!(f, "<{},{}>", w.value(), h.value()),
            (Some(v), None, Some(h)) => match v.value() {
                Some(v) => write!(f, "<{};{}>", v, h.value()),
                None => write!(f, "<{}>", h.value()),
            },
            (v, w, h) => {
                let v = v.and_then(|v| v.value()).map_or("?".to_owned(), |v| v.to_string());
                let w = w.map_or("?".to_owned(), |w| w.value().to_string());
                let h = h.map_or("?".to_owned(), |h| h.value().to_string());
                write!(f, "<{};{},{}>", v, w, h)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum MathFc {
    Inv = 1,
    Log = 2,
    Exp = 3,
    Sqt = 4,
    Rsqt = 5,
    Sin = 6,
    Cos = 7,
    Fdiv = 9,
    Pow = 10,
    Idiv = 11,
    Iqot = 12,
    Irem = 13,
    Invm = 14,
    Rsqtm = 15,
}
impl MathFc {
    pub fn name(self) -> &'static str {
        match self {
            MathFc::Inv => "inv",
            MathFc::Log => "log",
            MathFc::Exp => "exp",
            MathFc::Sqt => "sqt",
            MathFc::Rsqt => "rsqt",
            MathFc::Sin => "sin",
            MathFc::Cos => "cos",
            MathFc::Fdiv => "fdiv",
            MathFc::Pow => "pow",
            MathFc::Idiv => "idiv",
            MathFc::Iqot => "iqot",
            MathFc::Irem => "irem",
            MathFc::Invm => "invm",
            MathFc::Rsqtm => "rsqtm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum SyncFc {
    Nop = 0,
    Allrd = 2,
    Allwr = 3,
    Flush = 0xC,
    Fence = 0xD,
    Bar = 0xE,
    Host = 0xF,
}
impl SyncFc {
    pub fn name(self) -> &'static str {
        match self {
            SyncFc::Nop => "nop",
            SyncFc::Allrd => "allrd",
            SyncFc::Allwr => "allwr",
            SyncFc::Flush => "flush",
            SyncFc::Fence => "fence",
            SyncFc::Bar => "bar",
            SyncFc::Host => "host",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum BranchCtrl {
    Off = 0,
    On = 1,
}

/// Shared-function identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sfid {
    Null,
    Smpl,
    Gtwy,
    Dc2,
    Rc,
    Urb,
    Ts,
    Vme,
    Dcro,
    Dc0,
    Pixi,
    Dc1,
    Cre,
    Btd,
    Rta,
    Ugml,
    Tgm,
    Slm,
    Ugm,
    /// The extended descriptor lives in `a0`, so the SFID is only known at run time.
    A0Reg,
}
impl Sfid {
    pub fn name(self) -> &'static str {
        match self {
            Sfid::Null => "null",
            Sfid::Smpl => "sampler",
            Sfid::Gtwy => "gateway",
            Sfid::Dc2 => "dc2",
            Sfid::Rc => "rc",
            Sfid::Urb => "urb",
            Sfid::Ts => "ts",
            Sfid::Vme => "vme",
            Sfid::Dcro => "dcro",
            Sfid::Dc0 => "dc0",
            Sfid::Pixi => "pixi",
            Sfid::Dc1 => "dc1",
            Sfid::Cre => "cre",
            Sfid::Btd => "btd",
            Sfid::Rta => "rta",
            Sfid::Ugml => "ugml",
            Sfid::Tgm => "tgm",
            Sfid::Slm => "slm",
            Sfid::Ugm => "ugm",
            Sfid::A0Reg => "a0",
        }
    }
    pub fn is_lsc(self) -> bool {
        matches!(self, Sfid::Ugm | Sfid::Ugml | Sfid::Slm | Sfid::Tgm | Sfid::Urb)
    }
}
impl fmt::Display for Sfid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const SFID_NAMES: phf::Map<&'static str, Sfid> = phf_map! {
    "null" => Sfid::Null,
    "sampler" => Sfid::Smpl,
    "smpl" => Sfid::Smpl,
    "gateway" => Sfid::Gtwy,
    "gtwy" => Sfid::Gtwy,
    "dc2" => Sfid::Dc2,
    "rc" => Sfid::Rc,
    "urb" => Sfid::Urb,
    "ts" => Sfid::Ts,
    "vme" => Sfid::Vme,
    "dcro" => Sfid::Dcro,
    "dc0" => Sfid::Dc0,
    "pixi" => Sfid::Pixi,
    "dc1" => Sfid::Dc1,
    "cre" => Sfid::Cre,
    "btd" => Sfid::Btd,
    "rta" => Sfid::Rta,
    "ugml" => Sfid::Ugml,
    "tgm" => Sfid::Tgm,
    "slm" => Sfid::Slm,
    "ugm" => Sfid::Ugm,
};
impl Sfid {
    pub fn from_name(name: &str) -> Option<Sfid> {
        SFID_NAMES.get(name.to_ascii_lowercase().as_str()).copied()
    }
}

/// Opcode-family specific function control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subfunction {
    None,
    Math(MathFc),
    Sync(SyncFc),
    Branch(BranchCtrl),
    Send(Sfid),
    /// Systolic depth and repeat count of a dpas
    Dpas { depth: u8, repeat: u8 },
    /// Boolean function lookup table of a bfn
    Bfn(u8),
}

bitflags! {
    /// Instruction options, printed inside `{...}`
    pub struct InstOpts: u32 {
        const ACC_WR_EN = 1 << 0;
        const ATOMIC = 1 << 1;
        const BREAKPOINT = 1 << 2;
        const COMPACTED = 1 << 3;
        const EOT = 1 << 4;
        const NO_DD_CHK = 1 << 5;
        const NO_DD_CLR = 1 << 6;
        const NO_PREEMPT = 1 << 7;
        const NO_SRC_DEP_SET = 1 << 8;
        const SWITCH = 1 << 9;
        const SERIALIZE = 1 << 10;
        const EXBSO = 1 << 11;
        const CPS = 1 << 12;
    }
}
impl InstOpts {
    pub fn names(&self) -> Vec<&'static str> {
        const NAMES: [(InstOpts, &str); 13] = [
            (InstOpts::ACC_WR_EN, "AccWrEn"),
            (InstOpts::ATOMIC, "Atomic"),
            (InstOpts::BREAKPOINT, "Breakpoint"),
            (InstOpts::COMPACTED, "Compacted"),
            (InstOpts::EOT, "EOT"),
            (InstOpts::NO_DD_CHK, "NoDDChk"),
            (InstOpts::NO_DD_CLR, "NoDDClr"),
            (InstOpts::NO_PREEMPT, "NoPreempt"),
            (InstOpts::NO_SRC_DEP_SET, "NoSrcDepSet"),
            (InstOpts::SWITCH, "Switch"),
            (InstOpts::SERIALIZE, "Serialize"),
            (InstOpts::EXBSO, "ExBSO"),
            (InstOpts::CPS, "CPS"),
        ];
        NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn region_values() {
        assert_eq!(VertStride::Vs0.value(), Some(0));
        assert_eq!(VertStride::Vs8.value(), Some(8));
        assert_eq!(VertStride::VxH.value(), None);
        assert_eq!(HorzStride::H0.value(), 0);
        assert_eq!(HorzStride::H4.value(), 4);
        assert_eq!(Width::W16.value(), 16);
        assert_eq!(Width::from_value(4), Some(Width::W4));
        assert_eq!(Width::from_value(3), None);
        assert_eq!(Region::SRC881.to_string(), "<8;8,1>");
        assert_eq!(Region::SRC0X0.to_string(), "<0;0>");
        assert_eq!(Region::DST1.to_string(), "<1>");
    }

    #[test]
    fn exec_size_lanes() {
        assert_eq!(ExecSize::Simd1.lanes(), 1);
        assert_eq!(ExecSize::Simd32.lanes(), 32);
        assert_eq!(ExecSize::from_lanes(16), Some(ExecSize::Simd16));
        assert_eq!(ExecSize::from_lanes(3), None);
    }

    #[test]
    fn opts_names() {
        let opts = InstOpts::EOT | InstOpts::NO_DD_CLR;
        assert_eq!(opts.names(), vec!["EOT", "NoDDClr"]);
    }
}
