use std::fmt;

use arrayvec::ArrayVec;

use super::{
    op::Op,
    operand::Operand,
    swsb::Swsb,
    types::{
        BranchCtrl, ChannelOffset, ExecSize, FlagModifier, InstOpts, MaskCtrl, Predication, RegRef, Sfid, Subfunction,
    },
};
use crate::model::Format;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendDesc {
    Imm(u32),
    /// Address register holding the descriptor
    Reg(RegRef),
}
impl SendDesc {
    pub fn imm(&self) -> Option<u32> {
        match self {
            SendDesc::Imm(v) => Some(*v),
            SendDesc::Reg(_) => None,
        }
    }
}

/// Everything decoded from the descriptors of a send-family instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SendInfo {
    pub sfid: Sfid,
    pub desc: SendDesc,
    pub ex_desc: SendDesc,
    pub src0_len: Option<u32>,
    pub src1_len: Option<u32>,
    pub dst_len: Option<u32>,
}

/// Where a source lives in the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceIndex {
    Src0 = 0,
    Src1 = 1,
    Src2 = 2,
}
impl SourceIndex {
    pub const ALL: [SourceIndex; 3] = [SourceIndex::Src0, SourceIndex::Src1, SourceIndex::Src2];
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub pc: u32,
    pub id: u32,
    /// Location used when reporting diagnostics against this instruction
    pub loc: u32,
    pub op: Op,
    pub format: Format,
    pub subfunction: Subfunction,
    pub exec_size: ExecSize,
    pub chan_off: ChannelOffset,
    pub mask_ctrl: MaskCtrl,
    pub predication: Predication,
    pub flag_reg: RegRef,
    pub flag_modifier: FlagModifier,
    pub dst: Option<Operand>,
    pub srcs: [Option<Operand>; 3],
    pub opts: InstOpts,
    pub swsb: Swsb,
    pub send: Option<SendInfo>,
    pub comment: Option<String>,
}

impl Instruction {
    pub fn new(op: Op, format: Format, subfunction: Subfunction) -> Self {
        Self {
            pc: 0,
            id: 0,
            loc: 0,
            op,
            format,
            subfunction,
            exec_size: ExecSize::Simd1,
            chan_off: ChannelOffset::M0,
            mask_ctrl: MaskCtrl::Normal,
            predication: Predication::NONE,
            flag_reg: RegRef::ZERO,
            flag_modifier: FlagModifier::None,
            dst: None,
            srcs: [None, None, None],
            opts: InstOpts::empty(),
            swsb: Swsb::NONE,
            send: None,
            comment: None,
        }
    }

    /// Placeholder for something that could not be decoded, carrying the reason.
    pub fn illegal(comment: impl Into<String>) -> Self {
        let mut inst = Self::new(Op::Illegal, Format::Nullary, Subfunction::None);
        inst.comment = Some(comment.into());
        inst
    }

    pub fn is_illegal(&self) -> bool {
        self.op == Op::Illegal
    }

    pub fn is_compacted(&self) -> bool {
        self.opts.contains(InstOpts::COMPACTED)
    }

    /// Size in bytes the instruction occupied in the binary.
    pub fn size(&self) -> u32 {
        if self.is_compacted() {
            8
        } else {
            16
        }
    }

    pub fn src(&self, ix: SourceIndex) -> Option<&Operand> {
        self.srcs[ix.index()].as_ref()
    }

    pub fn set_src(&mut self, ix: SourceIndex, op: Operand) {
        self.srcs[ix.index()] = Some(op);
    }

    /// The sources that are present, in order.
    pub fn sources(&self) -> ArrayVec<&Operand, 3> {
        self.srcs.iter().flatten().collect()
    }

    pub fn is_branching(&self) -> bool {
        self.format.is_jump()
    }

    pub fn mnemonic(&self) -> String {
        let spec = crate::model::op_spec(self.op);
        match self.subfunction {
            Subfunction::Math(fc) => format!("{}.{}", spec.mnemonic, fc.name()),
            Subfunction::Sync(fc) => format!("{}.{}", spec.mnemonic, fc.name()),
            Subfunction::Dpas { depth, repeat } => format!("{}.{}x{}", spec.mnemonic, depth, repeat),
            Subfunction::Bfn(lut) => format!("{}.0x{:02X}", spec.mnemonic, lut),
            Subfunction::Branch(BranchCtrl::On) => format!("{}.b", spec.mnemonic),
            _ => spec.mnemonic.to_owned(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_illegal() {
            write!(f, "illegal")?;
            if let Some(comment) = &self.comment {
                write!(f, " // {}", comment)?;
            }
            return Ok(());
        }
        if self.predication.is_some() {
            write!(
                f,
                "({}f{}.{}{}) ",
                if self.predication.inverse { "-" } else { "+" },
                self.flag_reg.reg_num,
                self.flag_reg.sub_reg_num,
                self.predication.function.suffix()
            )?;
        }
        write!(f, "{}", self.mnemonic())?;
        if let Subfunction::Send(sfid) = self.subfunction {
            write!(f, ".{}", sfid)?;
        }
        write!(f, " ({}|M{})", self.exec_size.lanes(), self.chan_off.offset())?;
        if self.flag_modifier != FlagModifier::None && self.flag_modifier != FlagModifier::Eo {
            write!(
                f,
                " ({})f{}.{}",
                self.flag_modifier.name(),
                self.flag_reg.reg_num,
                self.flag_reg.sub_reg_num
            )?;
        }
        if let Some(dst) = &self.dst {
            write!(f, " {}", dst)?;
            if dst.modifier == crate::ir::types::OperandModifier::Sat {
                write!(f, " (sat)")?;
            }
        }
        for src in self.sources() {
            write!(f, " {}", src)?;
        }
        if let Some(send) = &self.send {
            match send.ex_desc {
                SendDesc::Imm(v) => write!(f, " 0x{:X}", v)?,
                SendDesc::Reg(r) => write!(f, " a0.{}", r.sub_reg_num)?,
            }
            match send.desc {
                SendDesc::Imm(v) => write!(f, " 0x{:X}", v)?,
                SendDesc::Reg(r) => write!(f, " a0.{}", r.sub_reg_num)?,
            }
        }
        let mut opts: Vec<&str> = self.opts.names();
        let swsb = self.swsb.to_string();
        if !swsb.is_empty() {
            opts.push(&swsb);
        }
        if self.mask_ctrl == MaskCtrl::NoMask {
            opts.insert(0, "NoMask");
        }
        if !opts.is_empty() {
            write!(f, " {{{}}}", opts.join(", "))?;
        }
        if let Some(comment) = &self.comment {
            write!(f, " // {}", comment)?;
        }
        Ok(())
    }
}
