//! Unary and binary ALU and math operands, in both Align1 and the legacy Align16
//! access mode. Align16 operands are rewritten as the equivalent Align1 region
//! where one exists.

use num_traits::FromPrimitive;

use super::{error::fatal, DecodeError, InstDecoder};
use crate::{
    ged::{
        translate::{self, RegFile, CHAN_EN_XYZW},
        Field, OperandField,
    },
    ir::{
        HorzStride, ImplAcc, Instruction, Op, Operand, OperandModifier, Platform, RegName, RegRef, Region,
        SourceIndex, Subfunction, Type, VertStride, Width,
    },
    model::OpAttrs,
};

/// Keep only the bits an immediate of type `ty` actually has.
pub(super) fn mask_immediate(bits: u64, ty: Type) -> u64 {
    let n = ty.size_bits();
    if n >= 64 {
        bits
    } else {
        bits & ((1u64 << n) - 1)
    }
}

impl<'a> InstDecoder<'a> {
    pub(super) fn align16(&mut self) -> Result<bool, DecodeError> {
        Ok(self.model.supports_align16() && self.raw_or(Field::AccessMode, 0)? == 1)
    }

    pub(super) fn data_type(&mut self, field: Field) -> Result<Option<Type>, DecodeError> {
        self.decode_opt(field)
    }

    pub(super) fn decode_basic(&mut self, subfunction: Subfunction) -> Result<Instruction, DecodeError> {
        let mut inst = self.base_instruction(subfunction)?;
        let align16 = self.align16()?;
        inst.dst = Some(if align16 {
            self.dst_align16()?
        } else {
            self.dst_align1()?
        });
        for s in SourceIndex::ALL.into_iter().take(self.format.num_srcs()) {
            let src = self.src_basic(s, s, align16)?;
            inst.set_src(s, src);
        }
        Ok(inst)
    }

    pub(super) fn src_basic(
        &mut self,
        s: SourceIndex,
        to: SourceIndex,
        align16: bool,
    ) -> Result<Operand, DecodeError> {
        if align16 {
            self.src_align16(s)
        } else {
            self.src_align1(s, to)
        }
    }

    fn dst_modifier(&mut self) -> Result<OperandModifier, DecodeError> {
        if self.spec.has(OpAttrs::SATURATION) && self.raw_or(Field::Saturate, 0)? == 1 {
            Ok(OperandModifier::Sat)
        } else {
            Ok(OperandModifier::None)
        }
    }

    /// Register name and number of a direct destination.
    pub(super) fn dst_reg(&mut self, ty: Option<Type>) -> Result<(RegName, RegRef), DecodeError> {
        let reg_num = self.raw(Field::Dst(OperandField::RegNum))?;
        let reg_file = self.decode(Field::Dst(OperandField::RegFile), RegFile::Grf)?;
        let (reg, reg_num) = match reg_file {
            RegFile::Grf => (RegName::Grf, reg_num as u16),
            RegFile::Arf => match translate::arch_reg(reg_num) {
                Some(arf) => arf,
                None => {
                    self.error("invalid arch register on dst");
                    (RegName::Null, (reg_num & 0xF) as u16)
                }
            },
            RegFile::Imm => {
                self.error("invalid reg file on dst");
                (RegName::Null, 0)
            }
        };
        let sub_reg_num = if self.format.is_macro() {
            0
        } else {
            let bytes = self.raw_or(Field::Dst(OperandField::SubRegNum), 0)?;
            translate::subreg_from_bytes(bytes, ty)
        };
        Ok((reg, RegRef::new(reg_num, sub_reg_num)))
    }

    fn dst_indirect(&mut self, region: Region, ty: Option<Type>) -> Result<Operand, DecodeError> {
        let offset = self.signed(Field::Dst(OperandField::AddrImm))? as i16;
        let sub = self.raw(Field::Dst(OperandField::AddrSubRegNum))? as u16;
        Ok(Operand::indirect(RegRef::new(0, sub), offset, region, ty))
    }

    pub(super) fn dst_align1(&mut self) -> Result<Operand, DecodeError> {
        let modifier = self.dst_modifier()?;
        let ty = self.data_type(Field::Dst(OperandField::DataType))?;
        let indirect = self.raw_or(Field::Dst(OperandField::AddrMode), 0)? == 1;

        let op = if indirect {
            let h = self.decode(Field::Dst(OperandField::HorzStride), HorzStride::H1)?;
            self.dst_indirect(Region::dst(h), ty)?
        } else {
            let (reg, reg_ref) = self.dst_reg(ty)?;
            if self.format.is_macro() {
                let acc = self.decode(Field::Dst(OperandField::SpecialAcc), ImplAcc::NoAcc)?;
                Operand::macro_reg(reg, reg_ref.reg_num, acc, ty)
            } else {
                let h = self.decode(Field::Dst(OperandField::HorzStride), HorzStride::H1)?;
                Operand::direct(reg, reg_ref, Region::dst(h), ty)
            }
        };
        Ok(op.with_modifier(modifier))
    }

    fn dst_align16(&mut self) -> Result<Operand, DecodeError> {
        let modifier = self.dst_modifier()?;
        let ty = self.data_type(Field::Dst(OperandField::DataType))?;
        let indirect = self.raw_or(Field::Dst(OperandField::AddrMode), 0)? == 1;
        let chan_en = self.raw(Field::Dst(OperandField::ChanEn))?;

        let op = if indirect {
            if chan_en != CHAN_EN_XYZW {
                return fatal("unsupported Align16 Dst.ChEn (only .xyzw supported)");
            }
            self.warning("converting unary/binary Align16 dst to equivalent Align1");
            self.dst_indirect(Region::DST1, ty)?
        } else if self.format.is_macro() {
            let (reg, reg_ref) = self.dst_reg(ty)?;
            let acc = match ImplAcc::from_u64(chan_en) {
                Some(acc) => acc,
                None => {
                    self.error("invalid dst implicit accumulator reference (in ChEn)");
                    ImplAcc::NoAcc
                }
            };
            Operand::macro_reg(reg, reg_ref.reg_num, acc, ty)
        } else {
            let (reg, mut reg_ref) = self.dst_reg(ty)?;
            if self.model.uses_align16_acc_hack() && reg == RegName::Acc && reg_ref.reg_num == 2 {
                // acc3..acc9 for context save and restore, selected through ChEn
                reg_ref.reg_num = match chan_en {
                    0..=7 => chan_en as u16 + 2,
                    8 => 0,
                    15 => 9,
                    _ => {
                        self.error("invalid dst accumulator reference (in ChEn)");
                        0
                    }
                };
                if !(3..=9).contains(&reg_ref.reg_num) {
                    self.error("invalid context save/restore high acc accesss");
                }
            } else if chan_en != CHAN_EN_XYZW {
                return fatal("unsupported Align16 Dst.ChEn (only .xyzw supported)");
            }
            Operand::direct(reg, reg_ref, Region::DST1, ty)
        };
        Ok(op.with_modifier(modifier))
    }

    pub(super) fn src_reg_file(&mut self, s: SourceIndex) -> Result<RegFile, DecodeError> {
        let raw = self.raw_or(Field::Src(s as u8, OperandField::RegFile), 1)?;
        match RegFile::from_u64(raw) {
            Some(rf) => Ok(rf),
            None => fatal(format!("invalid register file in src{}", s as u8)),
        }
    }

    pub(super) fn src_modifier(&mut self, s: SourceIndex) -> Result<OperandModifier, DecodeError> {
        if !self.spec.has(OpAttrs::SRC_MODIFIERS) || matches!(self.spec.op, Op::Bfn | Op::Dpas) {
            return Ok(OperandModifier::None);
        }
        self.decode(Field::Src(s as u8, OperandField::SrcMod), OperandModifier::None)
    }

    pub(super) fn region_vwh(&mut self, s: SourceIndex) -> Result<Region, DecodeError> {
        let n = s as u8;
        let v = self.decode(Field::Src(n, OperandField::VertStride), VertStride::Vs0)?;
        let w = self.decode(Field::Src(n, OperandField::Width), Width::W1)?;
        let h = self.decode(Field::Src(n, OperandField::HorzStride), HorzStride::H0)?;
        Ok(Region::new(v, w, h))
    }

    /// Name, number and subregister of a direct register source.
    pub(super) fn src_reg(
        &mut self,
        s: SourceIndex,
        reg_file: RegFile,
        ty: Option<Type>,
    ) -> Result<(RegName, RegRef), DecodeError> {
        let n = s as u8;
        let reg_num = self.raw(Field::Src(n, OperandField::RegNum))?;
        let (reg, reg_num) = match reg_file {
            RegFile::Arf => match translate::arch_reg(reg_num) {
                Some(arf) => arf,
                None => {
                    self.error(format!("invalid arch register on src{}", n));
                    (RegName::Null, (reg_num & 0xF) as u16)
                }
            },
            _ => (RegName::Grf, reg_num as u16),
        };
        let bytes = self.raw_or(Field::Src(n, OperandField::SubRegNum), 0)?;
        Ok((reg, RegRef::new(reg_num, translate::subreg_from_bytes(bytes, ty))))
    }

    pub(super) fn src_immediate(&mut self, s: SourceIndex, field: Field) -> Result<Operand, DecodeError> {
        let ty = self
            .data_type(Field::Src(s as u8, OperandField::DataType))?
            .unwrap_or(Type::UD);
        let bits = if ty.is_64bit() && field == Field::Imm && self.fields.has_field(Field::Imm64) {
            self.raw(Field::Imm64)?
        } else {
            self.raw(field)?
        };
        Ok(Operand::immediate(mask_immediate(bits, ty), ty))
    }

    fn src_indirect(&mut self, s: SourceIndex, region: Region, ty: Option<Type>) -> Result<Operand, DecodeError> {
        let n = s as u8;
        let sub = self.raw(Field::Src(n, OperandField::AddrSubRegNum))? as u16;
        let offset = self.signed(Field::Src(n, OperandField::AddrImm))? as i16;
        Ok(Operand::indirect(RegRef::new(0, sub), offset, region, ty))
    }

    /// Decode source `s` into slot `to`; jumps read some sources from a
    /// different slot than the one they are shown in.
    pub(super) fn src_align1(&mut self, s: SourceIndex, to: SourceIndex) -> Result<Operand, DecodeError> {
        let n = s as u8;
        let reg_file = self.src_reg_file(s)?;
        if reg_file == RegFile::Imm {
            return self.src_immediate(s, Field::Imm);
        }
        let ty = self.data_type(Field::Src(n, OperandField::DataType))?;
        let modifier = self.src_modifier(s)?;
        let indirect = self.raw_or(Field::Src(n, OperandField::AddrMode), 0)? == 1;

        let send = self.spec.op.is_send_family();
        let region = if send { Region::NONE } else { self.region_vwh(s)? };
        let implicit = match to {
            SourceIndex::Src0 => self.spec.implicit_src_region,
            _ => None,
        };
        if let Some(implicit) = implicit {
            if !send && implicit != region {
                self.warning(format!("src{}.Rgn should have {} for binary normal form", n, implicit));
            }
        }

        let op = if indirect {
            let region = if send { implicit.unwrap_or(region) } else { region };
            self.src_indirect(s, region, ty)?
        } else if self.format.is_macro() {
            if self.model.platform < Platform::Gen10 {
                return fatal(format!("src{}: macro instructions must be Align16 for this platform.", n));
            }
            let acc = self.decode(Field::Src(n, OperandField::SpecialAcc), ImplAcc::NoAcc)?;
            let (reg, reg_ref) = self.src_reg(s, reg_file, ty)?;
            Operand::macro_reg(reg, reg_ref.reg_num, acc, ty)
        } else {
            let (reg, reg_ref) = self.src_reg(s, reg_file, ty)?;
            Operand::direct(reg, reg_ref, region, ty)
        };
        Ok(op.with_modifier(modifier))
    }

    /// Literal reading of the hardware check: true unless the swizzle keeps `.x`,
    /// `.z` or a zero selector somewhere.
    fn chan_sel_packed(&mut self, s: SourceIndex) -> Result<bool, DecodeError> {
        let sw = translate::swizzle(self.raw(Field::Src(s as u8, OperandField::ChanSel))?);
        Ok(sw[0] != 0 && sw[1] != 0 && sw[2] != 2 && sw[3] != 0)
    }

    fn src_align16(&mut self, s: SourceIndex) -> Result<Operand, DecodeError> {
        let n = s as u8;
        let reg_file = self.src_reg_file(s)?;
        if reg_file == RegFile::Imm {
            return self.src_immediate(s, Field::Imm);
        }
        let ty = self.data_type(Field::Src(n, OperandField::DataType))?;
        let modifier = self.src_modifier(s)?;
        let indirect = self.raw_or(Field::Src(n, OperandField::AddrMode), 0)? == 1;
        let vs = self.decode(Field::Src(n, OperandField::VertStride), VertStride::Vs0)?;

        let op = if indirect {
            if !self.chan_sel_packed(s)? && vs == VertStride::Vs4 {
                return fatal("inconvertible align16 operand");
            }
            self.src_indirect(s, Region::SRC110, ty)?
        } else if self.format.is_macro() {
            let df = ty == Some(Type::DF);
            if !((vs == VertStride::Vs2 && df) || (vs == VertStride::Vs4 && !df)) {
                return fatal(format!("src{}: inconvertible align16 operand", n));
            }
            let (reg, reg_ref) = self.src_reg(s, reg_file, ty)?;
            let acc = self.decode(Field::Src(n, OperandField::SpecialAcc), ImplAcc::NoAcc)?;
            Operand::macro_reg(reg, reg_ref.reg_num, acc, ty)
        } else {
            if vs != VertStride::Vs4 {
                return fatal(format!("src{}: inconvertible align16 operand", n));
            }
            let (reg, mut reg_ref) = self.src_reg(s, reg_file, ty)?;
            if self.model.uses_align16_acc_hack() && reg == RegName::Acc && reg_ref.reg_num == 2 {
                // only ChanSel[3:0] selects the accumulator
                let sel = self.raw(Field::Src(n, OperandField::ChanSel))? & 0xF;
                reg_ref = RegRef::new(if sel < 8 { sel as u16 + 2 } else { 0xFF }, 0);
            } else if self.chan_sel_packed(s)? {
                return fatal(format!("src{}: inconvertible align16 operand", n));
            }
            Operand::direct(reg, reg_ref, Region::SRC110, ty)
        };
        Ok(op.with_modifier(modifier))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn immediates_are_masked_to_type() {
        assert_eq!(mask_immediate(0xDEAD_BEEF, Type::UW), 0xBEEF);
        assert_eq!(mask_immediate(0xDEAD_BEEF, Type::B), 0xEF);
        assert_eq!(mask_immediate(0x1_0000_0001, Type::UD), 1);
        assert_eq!(mask_immediate(u64::MAX, Type::Q), u64::MAX);
    }
}
