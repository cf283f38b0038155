//! Three-source operands.
//!
//! GEN10 and later encode these in Align1. Older parts only have the Align16
//! form, which is translated to the Align1 equivalent where one exists:
//!
//! - SIMD2 with `.xy`/`.zw` on `:df` becomes a SIMD1 on the matching element
//! - SIMD4 with a single channel enabled becomes a SIMD1 on that channel
//! - SIMD8 and wider must write `.xyzw`
//!
//! Sources must either replicate (`.r`, shown as `<0;0>`) or use the identity
//! swizzle, with `.xyxy`/`.zwzw` also accepted for 64-bit types.

use num_traits::FromPrimitive;

use super::{basic::mask_immediate, error::fatal, DecodeError, InstDecoder};
use crate::{
    ged::{
        translate::{self, RegFile, CHAN_EN_W, CHAN_EN_X, CHAN_EN_XY, CHAN_EN_XYZW, CHAN_EN_Y, CHAN_EN_Z, CHAN_EN_ZW,
            SWIZZLE_XYXY, SWIZZLE_XYZW, SWIZZLE_ZWZW},
        Field, OperandField,
    },
    ir::{
        ExecSize, HorzStride, ImplAcc, Instruction, Operand, OperandModifier, Platform, RegName, RegRef, Region,
        SourceIndex, Subfunction, Type, VertStride, Width,
    },
    model::OpAttrs,
};

impl<'a> InstDecoder<'a> {
    pub(super) fn decode_ternary(&mut self, subfunction: Subfunction) -> Result<Instruction, DecodeError> {
        let mut inst = self.base_instruction(subfunction)?;
        if self.align16()? {
            inst.dst = Some(self.dst_ternary_align16(&mut inst)?);
            for s in SourceIndex::ALL {
                let src = self.src_ternary_align16(s)?;
                inst.set_src(s, src);
            }
        } else if self.model.supports_align1_ternary() {
            inst.dst = Some(self.dst_ternary_align1()?);
            for s in SourceIndex::ALL {
                let src = self.src_ternary_align1(s)?;
                inst.set_src(s, src);
            }
        } else {
            return fatal("unexpected Align1Ternary in current platform");
        }
        Ok(inst)
    }

    fn ternary_dst_modifier(&mut self) -> Result<OperandModifier, DecodeError> {
        if self.spec.has(OpAttrs::SATURATION) && self.raw_or(Field::Saturate, 0)? == 1 {
            Ok(OperandModifier::Sat)
        } else {
            Ok(OperandModifier::None)
        }
    }

    fn ternary_dst_reg(&mut self) -> Result<(RegName, u16), DecodeError> {
        let reg_num = self.raw(Field::Dst(OperandField::RegNum))?;
        match self.decode(Field::Dst(OperandField::RegFile), RegFile::Grf)? {
            RegFile::Arf => match translate::arch_reg(reg_num) {
                Some(arf) => Ok(arf),
                None => {
                    self.error("invalid arch register destination");
                    Ok((RegName::Null, (reg_num & 0xF) as u16))
                }
            },
            _ => Ok((RegName::Grf, reg_num as u16)),
        }
    }

    fn dst_ternary_align1(&mut self) -> Result<Operand, DecodeError> {
        let modifier = self.ternary_dst_modifier()?;
        let ty = self.data_type(Field::Dst(OperandField::DataType))?;
        let (reg, reg_num) = self.ternary_dst_reg()?;

        let op = if self.format.is_macro() {
            let acc = self.decode(Field::Dst(OperandField::SpecialAcc), ImplAcc::NoAcc)?;
            Operand::macro_reg(reg, reg_num, acc, ty)
        } else {
            let bytes = self.raw(Field::Dst(OperandField::SubRegNum))?;
            let sub = translate::subreg_from_bytes(bytes, ty);
            let h = self.decode(Field::Dst(OperandField::HorzStride), HorzStride::H1)?;
            Operand::direct(reg, RegRef::new(reg_num, sub), Region::dst(h), ty)
        };
        Ok(op.with_modifier(modifier))
    }

    fn src_ternary_align1(&mut self, s: SourceIndex) -> Result<Operand, DecodeError> {
        let n = s as u8;
        let reg_file = self.src_reg_file(s)?;
        if reg_file == RegFile::Imm {
            let ty = self.data_type(Field::Src(n, OperandField::DataType))?.unwrap_or(Type::UD);
            let bits = self.raw(Field::Src(n, OperandField::Imm))?;
            return Ok(Operand::immediate(mask_immediate(bits, ty), ty));
        }
        let ty = self.data_type(Field::Src(n, OperandField::DataType))?;
        let modifier = self.src_modifier(s)?;

        let op = if self.format.is_macro() {
            if self.model.supports_align16() {
                return fatal(format!("src{}: macro instructions must be Align16 for this platform.", n));
            }
            let (reg, reg_ref) = self.src_reg(s, reg_file, ty)?;
            let acc = self.decode(Field::Src(n, OperandField::SpecialAcc), ImplAcc::NoAcc)?;
            Operand::macro_reg(reg, reg_ref.reg_num, acc, ty)
        } else {
            let region = self.ternary_region(s)?;
            let (reg, reg_ref) = self.src_reg(s, reg_file, ty)?;
            Operand::direct(reg, reg_ref, region, ty)
        };
        Ok(op.with_modifier(modifier))
    }

    /// `src2` only carries a horizontal stride. For the others the width follows
    /// from the strides.
    fn ternary_region(&mut self, s: SourceIndex) -> Result<Region, DecodeError> {
        let n = s as u8;
        let h = self.decode(Field::Src(n, OperandField::HorzStride), HorzStride::H0)?;
        if s == SourceIndex::Src2 {
            return Ok(Region::dst(h));
        }
        let v = self.decode(Field::Src(n, OperandField::VertStride), VertStride::Vs0)?;
        let w = match (v.value(), h.value()) {
            (Some(v), h) if h != 0 && v != 0 => Width::from_value(v / h).unwrap_or(Width::W1),
            _ => Width::W1,
        };
        Ok(Region::new(v, w, h))
    }

    /// May narrow the execution size of `inst` for scalar Align16 writes.
    fn dst_ternary_align16(&mut self, inst: &mut Instruction) -> Result<Operand, DecodeError> {
        let modifier = self.ternary_dst_modifier()?;
        let ty = self.data_type(Field::Dst(OperandField::DataType))?;
        let (reg, reg_num) = self.ternary_dst_reg()?;
        let chan_en = self.raw(Field::Dst(OperandField::ChanEn))?;

        if self.format.is_macro() {
            let acc = match ImplAcc::from_u64(chan_en) {
                Some(acc) => acc,
                None => {
                    self.error("invalid dst implicit accumulator reference (in ChEn)");
                    ImplAcc::NoAcc
                }
            };
            return Ok(Operand::macro_reg(reg, reg_num, acc, ty).with_modifier(modifier));
        }

        let mut offset = 0;
        match inst.exec_size {
            ExecSize::Simd2 if chan_en != CHAN_EN_XYZW => {
                inst.exec_size = ExecSize::Simd1;
                match chan_en {
                    CHAN_EN_XY if ty == Some(Type::DF) => offset = 0,
                    CHAN_EN_ZW if ty == Some(Type::DF) => offset = 1,
                    _ => self.error(
                        "unsupported Align16 ternary destination for SIMD2 (must be .xywz or .{xy,zw} for :df)",
                    ),
                }
            }
            ExecSize::Simd4 if chan_en != CHAN_EN_XYZW => {
                // one enabled channel is a scalar write
                inst.exec_size = ExecSize::Simd1;
                match chan_en {
                    CHAN_EN_X => offset = 0,
                    CHAN_EN_Y => offset = 1,
                    CHAN_EN_Z => offset = 2,
                    CHAN_EN_W => offset = 3,
                    _ => self.error("unsupported Align16 ternary destination for SIMD4 (must be .xywz or .{x,y,z,w})"),
                }
            }
            ExecSize::Simd2 | ExecSize::Simd4 => {}
            // this seems to capture everything used in practice
            ExecSize::Simd8 | ExecSize::Simd16 | ExecSize::Simd32 => {
                if chan_en != CHAN_EN_XYZW {
                    self.error("unsupported Align16 ternary destination for SIMD{8,16} (must be .xywz)");
                }
            }
            ExecSize::Simd1 => self.error("unsupported Align16 ternary destination (unsupported SIMD)"),
        }

        let bytes = self.raw(Field::Dst(OperandField::SubRegNum))?;
        let sub = translate::subreg_from_bytes(bytes, ty) + offset;
        Ok(Operand::direct(reg, RegRef::new(reg_num, sub), Region::DST1, ty).with_modifier(modifier))
    }

    fn src_ternary_align16(&mut self, s: SourceIndex) -> Result<Operand, DecodeError> {
        let n = s as u8;
        let is_macro = self.format.is_macro();
        if !is_macro && self.model.platform >= Platform::Gen10 {
            self.warning(format!(
                "src{}: converting Align16 to Align1 (bits will re-assemble to Align1)",
                n
            ));
        }
        let modifier = self.src_modifier(s)?;
        let reg_num = self.raw(Field::Src(n, OperandField::RegNum))? as u16;
        let ty = self.data_type(Field::Src(n, OperandField::DataType))?;

        if is_macro {
            let acc = self.decode(Field::Src(n, OperandField::SpecialAcc), ImplAcc::NoAcc)?;
            return Ok(Operand::macro_reg(RegName::Grf, reg_num, acc, ty).with_modifier(modifier));
        }

        let bytes = self.raw(Field::Src(n, OperandField::SubRegNum))?;
        let mut reg_ref = RegRef::new(reg_num, translate::subreg_from_bytes(bytes, ty));
        let scalar_region = if s == SourceIndex::Src2 { Region::SRCXX0 } else { Region::SRC0X0 };

        let region = if self.raw(Field::Src(n, OperandField::RepCtrl))? == 0 {
            let chan_sel = self.raw(Field::Src(n, OperandField::ChanSel))?;
            let wide = ty.map_or(false, Type::is_64bit);
            let half = chan_sel == SWIZZLE_XYXY || chan_sel == SWIZZLE_ZWZW;
            if chan_sel != SWIZZLE_XYZW && !(wide && half) {
                return fatal("unconvertible ternary align16 operand");
            }
            if ty == Some(Type::DF) && half {
                if chan_sel == SWIZZLE_ZWZW {
                    reg_ref.sub_reg_num += 1;
                }
                scalar_region
            } else if s == SourceIndex::Src2 {
                Region::SRCXX1
            } else {
                Region::SRC2X1
            }
        } else {
            scalar_region
        };
        Ok(Operand::direct(RegName::Grf, reg_ref, region, ty).with_modifier(modifier))
    }
}
