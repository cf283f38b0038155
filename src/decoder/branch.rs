//! Jump operands. JIP/UIP are kept as relative labels, block inference turns
//! them into absolute targets.

use super::{error::fatal, DecodeError, InstDecoder};
use crate::{
    ged::{translate::RegFile, Field, OperandField},
    ir::{BranchCtrl, Era, Instruction, Op, Operand, Region, SourceIndex, Subfunction, Type},
    model::{Format, OpAttrs},
};

impl<'a> InstDecoder<'a> {
    fn branch_ctrl(&mut self) -> Result<Subfunction, DecodeError> {
        if self.spec.has(OpAttrs::BRANCH_CTRL) {
            Ok(Subfunction::Branch(self.decode(Field::BranchCtrl, BranchCtrl::Off)?))
        } else {
            Ok(Subfunction::None)
        }
    }

    /// A JIP/UIP label, scaled to bytes. `jmpi` and `call` keep theirs in the
    /// full src1 immediate, which only matches JIP from GEN8 on.
    fn label(&mut self, field: Field, ty: Option<Type>) -> Result<Operand, DecodeError> {
        let delta = self.signed(field)? as i32 * self.model.pc_scale(self.spec.op);
        let mut op = Operand::label(delta);
        op.ty = ty;
        Ok(op)
    }

    pub(super) fn decode_branch(&mut self) -> Result<Instruction, DecodeError> {
        if self.model.platform.era() == Era::Xe {
            return self.decode_branch_simplified();
        }
        if self.align16()? {
            return fatal("Align16 branches not supported");
        }
        let subfunction = self.branch_ctrl()?;
        let mut inst = self.base_instruction(subfunction)?;

        match self.spec.op {
            Op::Jmpi => {
                // jmpi (1) JIP is encoded as jmpi (1) ip ip JIP
                if self.src_reg_file(SourceIndex::Src1)? != RegFile::Imm {
                    let src = self.src_align1(SourceIndex::Src1, SourceIndex::Src0)?;
                    inst.set_src(SourceIndex::Src0, src);
                } else {
                    let ty = self.data_type(Field::Src(1, OperandField::DataType))?;
                    let jip = self.label(Field::Imm, ty)?;
                    inst.set_src(SourceIndex::Src0, jip);
                }
            }
            Op::Ret => {
                let src = self.src_align1(SourceIndex::Src0, SourceIndex::Src0)?;
                inst.set_src(SourceIndex::Src0, src);
            }
            Op::Call | Op::Calla => {
                inst.dst = Some(self.dst_align1()?);
                let ty = self.data_type(Field::Src(1, OperandField::DataType))?;
                if self.src_reg_file(SourceIndex::Src1)? == RegFile::Imm {
                    let jip = self.label(Field::Imm, ty)?;
                    inst.set_src(SourceIndex::Src0, jip);
                } else {
                    let src = self.src_align1(SourceIndex::Src1, SourceIndex::Src0)?;
                    inst.set_src(SourceIndex::Src0, src);
                }
            }
            Op::Brc | Op::Brd => {
                if self.src_reg_file(SourceIndex::Src0)? == RegFile::Imm {
                    let ty = self.data_type(Field::Src(0, OperandField::DataType))?;
                    let jip = self.label(Field::Jip, ty)?;
                    inst.set_src(SourceIndex::Src0, jip);
                    if self.spec.op == Op::Brc {
                        let uip = self.label(Field::Uip, ty)?;
                        inst.set_src(SourceIndex::Src1, uip);
                    }
                } else {
                    let src = self.src_align1(SourceIndex::Src0, SourceIndex::Src0)?;
                    inst.set_src(SourceIndex::Src0, src);
                    if self.spec.op == Op::Brc {
                        inst.set_src(SourceIndex::Src1, Operand::null(Type::UD));
                    }
                }
            }
            _ => {
                let jip = self.label(Field::Jip, None)?;
                inst.set_src(SourceIndex::Src0, jip);
                if self.format != Format::JumpUnaryImm {
                    let uip = self.label(Field::Uip, None)?;
                    inst.set_src(SourceIndex::Src1, uip);
                }
            }
        }
        Ok(inst)
    }

    /// XE jumps: an optional `:ud` destination, then a register or JIP, then UIP
    /// for the binary forms.
    fn decode_branch_simplified(&mut self) -> Result<Instruction, DecodeError> {
        let subfunction = self.branch_ctrl()?;
        let mut inst = self.base_instruction(subfunction)?;
        if self.spec.has(OpAttrs::HAS_DST) {
            let (reg, reg_ref) = self.dst_reg(Some(Type::UD))?;
            inst.dst = Some(Operand::direct(reg, reg_ref, Region::DST1, Some(Type::UD)));
        }

        let reg_file = self.src_reg_file(SourceIndex::Src0)?;
        if reg_file != RegFile::Imm {
            let ty = self.data_type(Field::Src(0, OperandField::DataType))?;
            let (reg, reg_ref) = self.src_reg(SourceIndex::Src0, reg_file, ty)?;
            inst.set_src(SourceIndex::Src0, Operand::direct(reg, reg_ref, Region::NONE, ty));
        } else {
            let ty = match self.spec.implicit_src_region {
                Some(_) => self.data_type(Field::Src(0, OperandField::DataType))?,
                None => None,
            };
            let jip = self.label(Field::Jip, ty)?;
            inst.set_src(SourceIndex::Src0, jip);
        }

        // brc/brd read JIP and UIP from one 64-bit register
        let reg64 = matches!(self.spec.op, Op::Brc | Op::Brd) && reg_file == RegFile::Grf;
        let unary = matches!(
            self.format,
            Format::JumpUnaryImm | Format::JumpUnaryReg | Format::JumpUnaryRegImm | Format::JumpUnaryCallRegImm
        );
        if !reg64 && !unary {
            let uip = self.label(Field::Uip, None)?;
            inst.set_src(SourceIndex::Src1, uip);
        }
        Ok(inst)
    }
}
