use std::fmt;

use super::types::{ImplAcc, OperandModifier, RegName, RegRef, Region, Type};

/// A branch target. `pc_delta` is the decoded (already scaled) offset, `target`
/// the absolute PC once block inference has resolved it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label {
    pub pc_delta: i32,
    pub target: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    Direct {
        reg: RegName,
        reg_ref: RegRef,
    },
    /// `r[a0.sub, offset]`
    Indirect {
        addr: RegRef,
        offset: i16,
    },
    Immediate(u64),
    Label(Label),
    /// Math macro register carrying an implicit accumulator
    Macro {
        reg: RegName,
        reg_num: u16,
        acc: ImplAcc,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operand {
    pub kind: OperandKind,
    pub ty: Option<Type>,
    pub region: Region,
    pub modifier: OperandModifier,
}

impl Operand {
    pub fn direct(reg: RegName, reg_ref: RegRef, region: Region, ty: Option<Type>) -> Self {
        Self {
            kind: OperandKind::Direct { reg, reg_ref },
            ty,
            region,
            modifier: OperandModifier::None,
        }
    }
    pub fn grf(reg_num: u16, sub_reg_num: u16, region: Region, ty: Type) -> Self {
        Self::direct(RegName::Grf, RegRef::new(reg_num, sub_reg_num), region, Some(ty))
    }
    pub fn null(ty: Type) -> Self {
        Self::direct(RegName::Null, RegRef::ZERO, Region::SRC010, Some(ty))
    }
    pub fn immediate(bits: u64, ty: Type) -> Self {
        Self {
            kind: OperandKind::Immediate(bits),
            ty: Some(ty),
            region: Region::NONE,
            modifier: OperandModifier::None,
        }
    }
    pub fn label(pc_delta: i32) -> Self {
        Self {
            kind: OperandKind::Label(Label { pc_delta, target: None }),
            ty: None,
            region: Region::NONE,
            modifier: OperandModifier::None,
        }
    }
    pub fn indirect(addr: RegRef, offset: i16, region: Region, ty: Option<Type>) -> Self {
        Self {
            kind: OperandKind::Indirect { addr, offset },
            ty,
            region,
            modifier: OperandModifier::None,
        }
    }
    pub fn macro_reg(reg: RegName, reg_num: u16, acc: ImplAcc, ty: Option<Type>) -> Self {
        Self {
            kind: OperandKind::Macro { reg, reg_num, acc },
            ty,
            region: Region::NONE,
            modifier: OperandModifier::None,
        }
    }
    pub fn with_modifier(mut self, modifier: OperandModifier) -> Self {
        self.modifier = modifier;
        self
    }

    pub fn is_immediate(&self) -> bool {
        matches!(self.kind, OperandKind::Immediate(_))
    }
    pub fn as_label(&self) -> Option<&Label> {
        match &self.kind {
            OperandKind::Label(l) => Some(l),
            _ => None,
        }
    }
    pub fn as_label_mut(&mut self) -> Option<&mut Label> {
        match &mut self.kind {
            OperandKind::Label(l) => Some(l),
            _ => None,
        }
    }

    /// Immediate value sign-extended according to the operand type.
    pub fn immediate_signed(&self) -> Option<i64> {
        match (self.kind, self.ty) {
            (OperandKind::Immediate(bits), Some(ty)) => {
                let shift = 64 - ty.size_bits().min(64);
                if ty.is_signed_int() {
                    Some(((bits << shift) as i64) >> shift)
                } else {
                    Some(bits as i64)
                }
            }
            _ => None,
        }
    }

    /// GRF register numbers touched, given the element count of the instruction.
    pub fn grf_span(&self, lanes: u32, grf_bytes: u32) -> Option<std::ops::Range<u32>> {
        let (reg_ref, ty) = match (self.kind, self.ty) {
            (OperandKind::Direct { reg: RegName::Grf, reg_ref }, Some(ty)) => (reg_ref, ty),
            _ => return None,
        };
        let start = u32::from(reg_ref.reg_num) * grf_bytes + u32::from(reg_ref.sub_reg_num) * ty.size_bytes();
        let elem = ty.size_bytes();
        let last_elem_offset = match (self.region.v, self.region.w, self.region.h) {
            (Some(v), Some(w), Some(h)) => {
                let v = v.value().unwrap_or(0);
                let w = w.value().max(1);
                let rows = (lanes + w - 1) / w;
                (rows.saturating_sub(1) * v + (w.min(lanes).saturating_sub(1)) * h.value()) * elem
            }
            (_, _, Some(h)) => lanes.saturating_sub(1) * h.value() * elem,
            _ => 0,
        };
        let end = start + last_elem_offset + elem;
        Some(start / grf_bytes..(end + grf_bytes - 1) / grf_bytes)
    }
}

fn write_modifier(f: &mut fmt::Formatter<'_>, modifier: OperandModifier) -> fmt::Result {
    match modifier {
        OperandModifier::Neg => f.write_str("-"),
        OperandModifier::Abs => f.write_str("(abs)"),
        OperandModifier::NegAbs => f.write_str("-(abs)"),
        OperandModifier::None | OperandModifier::Sat => Ok(()),
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_modifier(f, self.modifier)?;
        match self.kind {
            OperandKind::Direct { reg: RegName::Null, .. } => f.write_str("null")?,
            OperandKind::Direct { reg, reg_ref } => {
                write!(f, "{}{}.{}", reg.name(), reg_ref.reg_num, reg_ref.sub_reg_num)?;
                write!(f, "{}", self.region)?;
            }
            OperandKind::Indirect { addr, offset } => {
                if offset != 0 {
                    write!(f, "r[a{}.{},{}]", addr.reg_num, addr.sub_reg_num, offset)?;
                } else {
                    write!(f, "r[a{}.{}]", addr.reg_num, addr.sub_reg_num)?;
                }
                write!(f, "{}", self.region)?;
            }
            OperandKind::Immediate(bits) => match self.ty {
                Some(ty) if ty.is_64bit() => write!(f, "0x{:016X}", bits)?,
                _ => write!(f, "0x{:X}", bits)?,
            },
            OperandKind::Label(Label { target: Some(pc), .. }) => return write!(f, "L{}", pc),
            OperandKind::Label(Label { pc_delta, target: None }) => return write!(f, "{}", pc_delta),
            OperandKind::Macro { reg, reg_num, acc } => {
                write!(f, "{}{}.{}", reg.name(), reg_num, acc.name())?;
            }
        }
        if let Some(ty) = self.ty {
            write!(f, "{}", ty)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::types::{HorzStride, Region};

    #[test]
    fn display() {
        let op = Operand::grf(12, 2, Region::SRC881, Type::F).with_modifier(OperandModifier::Neg);
        assert_eq!(op.to_string(), "-r12.2<8;8,1>:f");
        assert_eq!(Operand::immediate(0x10, Type::UD).to_string(), "0x10:ud");
        assert_eq!(Operand::null(Type::UD).to_string(), "null:ud");
        let dst = Operand::grf(3, 0, Region::dst(HorzStride::H1), Type::D);
        assert_eq!(dst.to_string(), "r3.0<1>:d");
    }

    #[test]
    fn signed_immediates() {
        assert_eq!(Operand::immediate(0xFFFF, Type::W).immediate_signed(), Some(-1));
        assert_eq!(Operand::immediate(0xFFFF, Type::UW).immediate_signed(), Some(0xFFFF));
        assert_eq!(Operand::immediate(0xFFFF_FFFE, Type::D).immediate_signed(), Some(-2));
    }

    #[test]
    fn grf_spans() {
        // 16 floats packed = 64 bytes = two registers
        let op = Operand::grf(4, 0, Region::SRC881, Type::F);
        assert_eq!(op.grf_span(16, 32), Some(4..6));
        // scalar
        let op = Operand::grf(7, 3, Region::SRC010, Type::D);
        assert_eq!(op.grf_span(16, 32), Some(7..8));
        assert_eq!(Operand::immediate(1, Type::D).grf_span(16, 32), None);
    }
}
