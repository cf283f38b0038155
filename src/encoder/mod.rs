//! Instruction encoding, the inverse of [crate::decoder].
//!
//! Every instruction is emitted uncompacted (16 bytes) through the same
//! [NativeInst] field layer the decoder reads from. Compacted input therefore
//! grows, and [Encoder::encode_kernel] moves branch targets along with the
//! instructions they point at.
//!
//! Legacy Align16 and math macro operands have no encoding here and are
//! reported as [EncodeError::Unsupported].

use std::collections::HashMap;

use thiserror::Error;

use crate::{
    ged::{
        translate::{self, RegFile},
        Field, FieldDecoder, FieldEncoder, FieldError, NativeInst, OperandField,
    },
    ir::{
        Era, FlagModifier, HorzStride, InstOpts, Instruction, Kernel, Label, Op, Operand, OperandKind,
        OperandModifier, Platform, RegName, RegRef, Region, SendDesc, SourceIndex, Subfunction, SwsbEncodeMode,
        SwsbInstType, SwsbStatus, Type, VertStride, Width,
    },
    model::{Format, Model, OpAttrs, OpSpec},
};

const INST_SIZE: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("{op} is not supported on {platform}")]
    UnsupportedOp { op: Op, platform: Platform },
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("{0}")]
    Operand(String),
    #[error("SWSB: {}", .0.message())]
    Swsb(SwsbStatus),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error("PC{pc}: {source}")]
    At { pc: u32, source: Box<EncodeError> },
}

fn unsupported<T>(what: impl Into<String>) -> Result<T, EncodeError> {
    Err(EncodeError::Unsupported(what.into()))
}

fn bad_operand<T>(what: impl Into<String>) -> Result<T, EncodeError> {
    Err(EncodeError::Operand(what.into()))
}

/// Register file and register number bits of a direct register.
fn reg_bits(reg: RegName, reg_num: u16) -> Result<(RegFile, u64), EncodeError> {
    if reg == RegName::Grf {
        return Ok((RegFile::Grf, u64::from(reg_num)));
    }
    if reg_num > 0xF {
        return bad_operand(format!("{}{} is out of range", reg.name(), reg_num));
    }
    match translate::arch_reg_bits(reg, reg_num) {
        Some(bits) => Ok((RegFile::Arf, bits)),
        None => bad_operand(format!("{} has no register encoding", reg.name())),
    }
}

/// Extended descriptor bits that have a home in the instruction. The rest
/// belong to other fields (the GEN SFID nibble excepted).
fn ex_desc_mask(platform: Platform) -> u32 {
    match platform.era() {
        Era::Gen if platform < Platform::Gen8 => 0xF,
        Era::Gen => 0xF | (0x1F << 6),
        Era::Xe => (0x1F << 6) | (0x3FFF << 18),
    }
}

pub struct Encoder {
    model: Model,
    swsb_mode: Option<SwsbEncodeMode>,
}

impl Encoder {
    pub fn new(platform: Platform) -> Self {
        Self {
            model: Model::new(platform),
            swsb_mode: None,
        }
    }

    /// Overrides the platform's SWSB encode mode.
    pub fn swsb_mode(mut self, mode: SwsbEncodeMode) -> Self {
        self.swsb_mode = Some(mode);
        self
    }

    pub fn platform(&self) -> Platform {
        self.model.platform
    }

    /// Encode every instruction of `kernel` back to back. Resolved labels
    /// follow their targets to the new layout.
    pub fn encode_kernel(&self, kernel: &Kernel) -> Result<Vec<u8>, EncodeError> {
        if kernel.platform != self.model.platform {
            return unsupported(format!(
                "kernel for {} given to an encoder for {}",
                kernel.platform, self.model.platform
            ));
        }
        let pcs = relocations(kernel);
        let mut bytes = Vec::with_capacity(kernel.instruction_count() * INST_SIZE as usize);
        for (ix, inst) in kernel.instructions().enumerate() {
            let pc = ix as u32 * INST_SIZE;
            let encoded = self
                .encode_at(inst, pc, Some(&pcs))
                .map_err(|err| EncodeError::At {
                    pc: inst.pc,
                    source: Box::new(err),
                })?;
            tracing::trace!(pc, "{}", inst);
            bytes.extend_from_slice(&encoded);
        }
        tracing::debug!(instructions = kernel.instruction_count(), bytes = bytes.len(), "encoded kernel");
        Ok(bytes)
    }

    /// Encode one instruction. Labels use their decoded PC delta as is.
    pub fn encode_instruction(&self, inst: &Instruction) -> Result<[u8; 16], EncodeError> {
        self.encode_at(inst, inst.pc, None)
    }

    fn encode_at(&self, inst: &Instruction, pc: u32, pcs: Option<&HashMap<u32, u32>>) -> Result<[u8; 16], EncodeError> {
        let platform = self.model.platform;
        let spec = self
            .model
            .spec_for(inst.op)
            .ok_or(EncodeError::UnsupportedOp { op: inst.op, platform })?;
        let format = match (spec.format, inst.subfunction) {
            (Format::Group, Subfunction::Math(fc)) => match self.model.math_format(fc) {
                Some(format) => format,
                None => return unsupported(format!("math.{} on {}", fc.name(), platform)),
            },
            (Format::Group, _) => return bad_operand(format!("{} needs a function", spec.mnemonic)),
            (format, _) => format,
        };
        let encoder = InstEncoder {
            model: self.model,
            swsb_mode: self.swsb_mode,
            native: NativeInst::new(platform),
            inst,
            spec,
            format,
            pc,
            pcs,
        };
        encoder.encode()
    }
}

/// Old PC to new PC for every instruction, plus the end of the kernel.
fn relocations(kernel: &Kernel) -> HashMap<u32, u32> {
    let mut pcs = HashMap::new();
    let mut new_pc = 0;
    let mut old_end = 0;
    for inst in kernel.instructions() {
        pcs.insert(inst.pc, new_pc);
        new_pc += INST_SIZE;
        old_end = inst.pc + inst.size();
    }
    pcs.insert(old_end, new_pc);
    pcs
}

struct InstEncoder<'a> {
    model: Model,
    swsb_mode: Option<SwsbEncodeMode>,
    native: NativeInst,
    inst: &'a Instruction,
    spec: &'static OpSpec,
    /// The op's format, resolved through the subfunction for `math`
    format: Format,
    /// Where the instruction lands in the output
    pc: u32,
    pcs: Option<&'a HashMap<u32, u32>>,
}

impl<'a> InstEncoder<'a> {
    fn set(&mut self, field: Field, value: u64) -> Result<(), EncodeError> {
        Ok(self.native.set(field, value)?)
    }

    /// Only sets fields this form actually has.
    fn set_opt(&mut self, field: Field, value: u64) -> Result<(), EncodeError> {
        if self.native.has_field(field) {
            self.set(field, value)
        } else {
            Ok(())
        }
    }

    fn src(&self, ix: SourceIndex) -> Result<Operand, EncodeError> {
        match self.inst.src(ix) {
            Some(op) => Ok(*op),
            None => bad_operand(format!("{} is missing src{}", self.spec.mnemonic, ix as u8)),
        }
    }

    fn dst(&self) -> Result<Operand, EncodeError> {
        match self.inst.dst {
            Some(op) => Ok(op),
            None => bad_operand(format!("{} is missing its destination", self.spec.mnemonic)),
        }
    }

    fn encode(mut self) -> Result<[u8; 16], EncodeError> {
        let code = match self.spec.code(self.model.platform) {
            Some(code) => code,
            None => {
                return Err(EncodeError::UnsupportedOp {
                    op: self.inst.op,
                    platform: self.model.platform,
                })
            }
        };
        self.set(Field::Opcode, u64::from(code))?;

        match self.format {
            Format::Nullary => {}
            f if f.is_macro() => return unsupported("math macro operands"),
            f if f.is_basic() || f.is_math() => self.encode_basic()?,
            f if f.is_ternary() => self.encode_ternary()?,
            f if f.is_jump() => self.encode_branch()?,
            f if f.is_send() => self.encode_send()?,
            Format::SyncUnary => self.encode_sync()?,
            _ => return unsupported("operation format"),
        }

        if !self.inst.is_illegal() {
            self.encode_options()?;
            self.encode_swsb()?;
            // last, several functions share bits with modifiers
            self.encode_subfunction()?;
        }
        Ok(self.native.to_bytes())
    }

    fn encode_subfunction(&mut self) -> Result<(), EncodeError> {
        match self.inst.subfunction {
            Subfunction::None => Ok(()),
            Subfunction::Math(fc) => self.set(Field::MathFc, fc as u64),
            Subfunction::Sync(fc) => self.set(Field::SyncFc, fc as u64),
            Subfunction::Send(sfid) => {
                if self.model.platform.era() == Era::Gen {
                    // carried by the extended descriptor
                    return Ok(());
                }
                match translate::sfid_code(self.model.platform, sfid) {
                    Some(code) => self.set(Field::Sfid, code),
                    None => bad_operand(format!("SFID {} does not exist on {}", sfid, self.model.platform)),
                }
            }
            Subfunction::Dpas { depth, repeat } => {
                if !depth.is_power_of_two() || repeat == 0 {
                    return bad_operand(format!("invalid systolic shape {}x{}", depth, repeat));
                }
                self.set(Field::SystolicDepth, u64::from(depth.trailing_zeros()))?;
                self.set(Field::RepeatCount, u64::from(repeat - 1))
            }
            Subfunction::Bfn(lut) => self.set(Field::BfnFc, u64::from(lut)),
            Subfunction::Branch(ctrl) => {
                if self.spec.has(OpAttrs::BRANCH_CTRL) {
                    self.set(Field::BranchCtrl, ctrl as u64)
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Predication, flag modifier, execution size, channel offset and mask control.
    fn encode_base(&mut self) -> Result<(), EncodeError> {
        let inst = self.inst;
        if inst.predication.is_some() {
            if !self.spec.has(OpAttrs::PREDICATION) {
                return unsupported(format!("predication on {}", self.spec.mnemonic));
            }
            self.set(Field::PredCtrl, inst.predication.function as u64)?;
            self.set(Field::PredInv, u64::from(inst.predication.inverse))?;
        }

        let reuses_cond_mod = self.format.is_math() || matches!(inst.op, Op::Bfn | Op::Dpas | Op::Dpasw);
        let has_modifier = inst.flag_modifier != FlagModifier::None;
        if has_modifier {
            if !self.spec.has(OpAttrs::FLAG_MODIFIER) || reuses_cond_mod {
                return unsupported(format!("condition modifier on {}", self.spec.mnemonic));
            }
            self.set(Field::CondModifier, inst.flag_modifier as u64)?;
        }
        if inst.predication.is_some() || has_modifier {
            self.set(Field::FlagRegNum, u64::from(inst.flag_reg.reg_num))?;
            self.set(Field::FlagSubRegNum, u64::from(inst.flag_reg.sub_reg_num))?;
        }

        self.set(Field::ExecSize, inst.exec_size as u64)?;
        self.set(Field::ChannelOffset, inst.chan_off as u64)?;
        self.set(Field::MaskCtrl, inst.mask_ctrl as u64)
    }

    fn encode_options(&mut self) -> Result<(), EncodeError> {
        let platform = self.model.platform;
        let opts = self.inst.opts;
        let send = self.inst.op.is_send_family();
        let gen = platform.era() == Era::Gen;

        if opts.contains(InstOpts::ACC_WR_EN) {
            if !self.spec.has(OpAttrs::ACC_WR_EN) || self.format.is_jump() {
                return unsupported(format!("AccWrEn on {}", self.spec.mnemonic));
            }
            self.set(Field::AccWrCtrl, 1)?;
        }
        if opts.contains(InstOpts::BREAKPOINT) {
            self.set(Field::DebugCtrl, 1)?;
        }
        if send && opts.contains(InstOpts::EOT) {
            self.set(Field::Eot, 1)?;
        }
        if self.model.supports_dep_ctrl() {
            let dep = u64::from(opts.contains(InstOpts::NO_DD_CLR)) | (u64::from(opts.contains(InstOpts::NO_DD_CHK)) << 1);
            self.set(Field::DepCtrl, dep)?;
        }
        if gen {
            if (!send && self.model.supports_thread_switch()) || (send && platform >= Platform::Gen9) {
                let ctrl = if opts.contains(InstOpts::ATOMIC) {
                    1
                } else if opts.contains(InstOpts::SWITCH) {
                    2
                } else if opts.contains(InstOpts::NO_PREEMPT) {
                    3
                } else {
                    0
                };
                self.set(Field::ThreadCtrl, ctrl)?;
            }
        } else if opts.contains(InstOpts::ATOMIC) {
            self.set(Field::ThreadCtrl, 1)?;
        }
        if send && (Platform::Gen9..=Platform::Gen11).contains(&platform) && opts.contains(InstOpts::NO_SRC_DEP_SET) {
            self.set(Field::NoSrcDepSet, 1)?;
        }
        if send && !gen && opts.contains(InstOpts::SERIALIZE) {
            self.set(Field::FusionCtrl, 1)?;
        }
        Ok(())
    }

    fn encode_swsb(&mut self) -> Result<(), EncodeError> {
        let swsb = self.inst.swsb;
        let mode = match (self.swsb_mode, self.model.swsb_mode()) {
            (_, None) => {
                if !swsb.is_none() {
                    return unsupported(format!("SWSB on {}", self.model.platform));
                }
                return Ok(());
            }
            (Some(mode), _) | (None, Some(mode)) => mode,
        };
        let raw = swsb
            .encode(mode, SwsbInstType::of(self.inst.op))
            .map_err(EncodeError::Swsb)?;
        self.set(Field::Swsb, u64::from(raw))
    }

    fn encode_basic(&mut self) -> Result<(), EncodeError> {
        self.encode_base()?;
        let dst = self.dst()?;
        self.dst_align1(&dst)?;
        for s in SourceIndex::ALL.into_iter().take(self.format.num_srcs()) {
            let src = self.src(s)?;
            self.src_align1(s as u8, &src)?;
        }
        Ok(())
    }

    fn encode_sync(&mut self) -> Result<(), EncodeError> {
        self.encode_base()?;
        let src = self.src(SourceIndex::Src0)?;
        self.src_align1(0, &src)
    }

    fn dst_saturate(&mut self, dst: &Operand) -> Result<(), EncodeError> {
        if dst.modifier == OperandModifier::Sat {
            if !self.spec.has(OpAttrs::SATURATION) {
                return unsupported(format!("saturation on {}", self.spec.mnemonic));
            }
            self.set(Field::Saturate, 1)?;
        }
        Ok(())
    }

    fn dst_reg(&mut self, reg: RegName, reg_ref: RegRef, ty: Option<Type>) -> Result<(), EncodeError> {
        let (file, bits) = reg_bits(reg, reg_ref.reg_num)?;
        self.set(Field::Dst(OperandField::RegFile), file as u64)?;
        self.set(Field::Dst(OperandField::RegNum), bits)?;
        let bytes = translate::subreg_to_bytes(reg_ref.sub_reg_num, ty);
        self.set_opt(Field::Dst(OperandField::SubRegNum), bytes)
    }

    fn dst_align1(&mut self, dst: &Operand) -> Result<(), EncodeError> {
        self.dst_saturate(dst)?;
        if let Some(ty) = dst.ty {
            self.set_opt(Field::Dst(OperandField::DataType), ty as u64)?;
        }
        let h = dst.region.h.unwrap_or(HorzStride::H1);
        match dst.kind {
            OperandKind::Direct { reg, reg_ref } => {
                self.set_opt(Field::Dst(OperandField::AddrMode), 0)?;
                self.dst_reg(reg, reg_ref, dst.ty)?;
            }
            OperandKind::Indirect { addr, offset } => {
                self.set_opt(Field::Dst(OperandField::RegFile), RegFile::Grf as u64)?;
                self.set(Field::Dst(OperandField::AddrMode), 1)?;
                self.set(Field::Dst(OperandField::AddrSubRegNum), u64::from(addr.sub_reg_num))?;
                self.set(Field::Dst(OperandField::AddrImm), i64::from(offset) as u64)?;
            }
            OperandKind::Macro { .. } => return unsupported("macro destination"),
            OperandKind::Immediate(_) | OperandKind::Label(_) => return bad_operand("destination must be a register"),
        }
        self.set_opt(Field::Dst(OperandField::HorzStride), h as u64)
    }

    fn src_modifier(&mut self, n: u8, modifier: OperandModifier) -> Result<(), EncodeError> {
        if modifier == OperandModifier::None {
            return Ok(());
        }
        let allowed = self.spec.has(OpAttrs::SRC_MODIFIERS) && !matches!(self.inst.op, Op::Bfn | Op::Dpas);
        match translate::src_modifier_bits(modifier) {
            Some(bits) if allowed => self.set(Field::Src(n, OperandField::SrcMod), bits),
            _ => unsupported(format!("source modifier on src{} of {}", n, self.spec.mnemonic)),
        }
    }

    fn src_region(&mut self, n: u8, region: &Region) -> Result<(), EncodeError> {
        let v = region.v.unwrap_or(VertStride::Vs0);
        let w = region.w.unwrap_or(Width::W1);
        let h = region.h.unwrap_or(HorzStride::H0);
        self.set_opt(Field::Src(n, OperandField::VertStride), v as u64)?;
        self.set_opt(Field::Src(n, OperandField::Width), w as u64)?;
        self.set_opt(Field::Src(n, OperandField::HorzStride), h as u64)
    }

    fn src_immediate(&mut self, n: u8, bits: u64, ty: Option<Type>) -> Result<(), EncodeError> {
        let ty = ty.unwrap_or(Type::UD);
        self.set(Field::Src(n, OperandField::RegFile), RegFile::Imm as u64)?;
        self.set(Field::Src(n, OperandField::DataType), ty as u64)?;
        if ty.is_64bit() && self.native.has_field(Field::Imm64) {
            if n != 0 {
                return unsupported("64-bit immediate outside src0");
            }
            self.set(Field::Imm64, bits)
        } else {
            self.set(Field::Imm, bits)
        }
    }

    /// Write `src` into source slot `n`.
    fn src_align1(&mut self, n: u8, src: &Operand) -> Result<(), EncodeError> {
        if let OperandKind::Immediate(bits) = src.kind {
            return self.src_immediate(n, bits, src.ty);
        }
        if let Some(ty) = src.ty {
            self.set_opt(Field::Src(n, OperandField::DataType), ty as u64)?;
        }
        self.src_modifier(n, src.modifier)?;
        match src.kind {
            OperandKind::Direct { reg, reg_ref } => {
                self.set_opt(Field::Src(n, OperandField::AddrMode), 0)?;
                let (file, bits) = reg_bits(reg, reg_ref.reg_num)?;
                self.set(Field::Src(n, OperandField::RegFile), file as u64)?;
                self.set(Field::Src(n, OperandField::RegNum), bits)?;
                let bytes = translate::subreg_to_bytes(reg_ref.sub_reg_num, src.ty);
                self.set_opt(Field::Src(n, OperandField::SubRegNum), bytes)?;
            }
            OperandKind::Indirect { addr, offset } => {
                self.set_opt(Field::Src(n, OperandField::RegFile), RegFile::Grf as u64)?;
                self.set(Field::Src(n, OperandField::AddrMode), 1)?;
                self.set(Field::Src(n, OperandField::AddrSubRegNum), u64::from(addr.sub_reg_num))?;
                self.set(Field::Src(n, OperandField::AddrImm), i64::from(offset) as u64)?;
            }
            OperandKind::Macro { .. } => return unsupported("macro source"),
            OperandKind::Label(_) => return bad_operand(format!("src{} cannot be a label", n)),
            OperandKind::Immediate(_) => {}
        }
        if self.inst.op.is_send_family() {
            Ok(())
        } else {
            self.src_region(n, &src.region)
        }
    }

    fn encode_ternary(&mut self) -> Result<(), EncodeError> {
        if !self.model.supports_align1_ternary() {
            return unsupported(format!("Align16 ternary encoding on {}", self.model.platform));
        }
        self.encode_base()?;
        let dst = self.dst()?;
        self.dst_saturate(&dst)?;
        if let Some(ty) = dst.ty {
            self.set(Field::Dst(OperandField::DataType), ty as u64)?;
        }
        match dst.kind {
            OperandKind::Direct { reg, reg_ref } => self.dst_reg(reg, reg_ref, dst.ty)?,
            OperandKind::Macro { .. } => return unsupported("macro destination"),
            _ => return bad_operand("ternary destination must be a direct register"),
        }
        let h = dst.region.h.unwrap_or(HorzStride::H1);
        self.set(Field::Dst(OperandField::HorzStride), h as u64)?;

        for s in SourceIndex::ALL {
            let src = self.src(s)?;
            self.src_ternary(s, &src)?;
        }
        Ok(())
    }

    fn src_ternary(&mut self, s: SourceIndex, src: &Operand) -> Result<(), EncodeError> {
        let n = s as u8;
        if let OperandKind::Immediate(bits) = src.kind {
            let ty = src.ty.unwrap_or(Type::UD);
            self.set(Field::Src(n, OperandField::RegFile), RegFile::Imm as u64)?;
            self.set(Field::Src(n, OperandField::DataType), ty as u64)?;
            return self.set(Field::Src(n, OperandField::Imm), bits);
        }
        let (reg, reg_ref) = match src.kind {
            OperandKind::Direct { reg, reg_ref } => (reg, reg_ref),
            OperandKind::Macro { .. } => return unsupported("macro source"),
            _ => return bad_operand(format!("ternary src{} must be a direct register", n)),
        };
        if let Some(ty) = src.ty {
            self.set(Field::Src(n, OperandField::DataType), ty as u64)?;
        }
        self.src_modifier(n, src.modifier)?;

        let (file, bits) = reg_bits(reg, reg_ref.reg_num)?;
        self.set(Field::Src(n, OperandField::RegFile), file as u64)?;
        self.set(Field::Src(n, OperandField::RegNum), bits)?;
        let bytes = translate::subreg_to_bytes(reg_ref.sub_reg_num, src.ty);
        self.set(Field::Src(n, OperandField::SubRegNum), bytes)?;

        // the width follows from the strides
        let h = src.region.h.unwrap_or(HorzStride::H0);
        self.set(Field::Src(n, OperandField::HorzStride), h as u64)?;
        if s != SourceIndex::Src2 {
            let v = src.region.v.unwrap_or(VertStride::Vs0);
            self.set(Field::Src(n, OperandField::VertStride), v as u64)?;
        }
        Ok(())
    }

    /// JIP/UIP in the units the platform counts them in.
    fn label_offset(&self, label: &Label) -> Result<i64, EncodeError> {
        let delta = match (label.target, self.pcs) {
            (Some(target), Some(pcs)) => {
                let new_target = match pcs.get(&target) {
                    Some(pc) => *pc,
                    None => return bad_operand(format!("label L{} is not an instruction boundary", target)),
                };
                // jmpi offsets are relative to the following instruction
                let base = if self.inst.op == Op::Jmpi {
                    self.pc + INST_SIZE
                } else {
                    self.pc
                };
                i64::from(new_target) - i64::from(base)
            }
            _ => i64::from(label.pc_delta),
        };
        let scale = i64::from(self.model.pc_scale(self.inst.op));
        if delta % scale != 0 {
            return bad_operand(format!("branch offset {} is not a multiple of {}", delta, scale));
        }
        Ok(delta / scale)
    }

    fn set_label(&mut self, field: Field, op: &Operand) -> Result<(), EncodeError> {
        let label = match op.as_label() {
            Some(label) => *label,
            None => return bad_operand(format!("{} of {} must be a label", field, self.spec.mnemonic)),
        };
        let offset = self.label_offset(&label)?;
        self.set(field, offset as u64)
    }

    /// An immediate source slot standing in for a label.
    fn label_slot(&mut self, n: u8, op: &Operand) -> Result<(), EncodeError> {
        self.set(Field::Src(n, OperandField::RegFile), RegFile::Imm as u64)?;
        self.set(Field::Src(n, OperandField::DataType), op.ty.unwrap_or(Type::D) as u64)
    }

    fn encode_branch(&mut self) -> Result<(), EncodeError> {
        if self.model.platform.era() == Era::Xe {
            return self.encode_branch_simplified();
        }
        self.encode_base()?;
        let src0 = self.src(SourceIndex::Src0)?;
        let is_label = src0.as_label().is_some();

        match self.inst.op {
            Op::Jmpi | Op::Call | Op::Calla => {
                if self.inst.op == Op::Jmpi {
                    // jmpi (1) JIP is encoded as jmpi (1) ip ip JIP
                    let ip = Operand::direct(RegName::Ip, RegRef::ZERO, Region::DST1, Some(Type::UD));
                    self.dst_align1(&ip)?;
                    self.src_align1(0, &Operand { region: Region::SRC010, ..ip })?;
                } else {
                    let dst = self.dst()?;
                    self.dst_align1(&dst)?;
                }
                if is_label {
                    self.label_slot(1, &src0)?;
                    self.set_label(Field::Imm, &src0)?;
                } else {
                    self.src_align1(1, &src0)?;
                }
            }
            Op::Ret => self.src_align1(0, &src0)?,
            Op::Brc | Op::Brd => {
                if is_label {
                    self.label_slot(0, &src0)?;
                    self.set_label(Field::Jip, &src0)?;
                    if self.inst.op == Op::Brc {
                        let uip = self.src(SourceIndex::Src1)?;
                        self.set_label(Field::Uip, &uip)?;
                    }
                } else {
                    self.src_align1(0, &src0)?;
                }
            }
            _ => {
                self.set_label(Field::Jip, &src0)?;
                if self.format != Format::JumpUnaryImm {
                    let uip = self.src(SourceIndex::Src1)?;
                    self.set_label(Field::Uip, &uip)?;
                }
            }
        }
        Ok(())
    }

    fn encode_branch_simplified(&mut self) -> Result<(), EncodeError> {
        self.encode_base()?;
        if self.spec.has(OpAttrs::HAS_DST) {
            let dst = self.dst()?;
            match dst.kind {
                OperandKind::Direct { reg, reg_ref } => {
                    self.set_opt(Field::Dst(OperandField::DataType), Type::UD as u64)?;
                    self.dst_reg(reg, reg_ref, Some(Type::UD))?;
                }
                _ => return bad_operand(format!("{} destination must be a register", self.spec.mnemonic)),
            }
        }

        let src0 = self.src(SourceIndex::Src0)?;
        let mut grf = false;
        match src0.kind {
            OperandKind::Label(_) => {
                self.set(Field::Src(0, OperandField::RegFile), RegFile::Imm as u64)?;
                if let (Some(_), Some(ty)) = (self.spec.implicit_src_region, src0.ty) {
                    self.set(Field::Src(0, OperandField::DataType), ty as u64)?;
                }
                self.set_label(Field::Jip, &src0)?;
            }
            OperandKind::Direct { reg, reg_ref } => {
                grf = reg == RegName::Grf;
                let (file, bits) = reg_bits(reg, reg_ref.reg_num)?;
                self.set(Field::Src(0, OperandField::RegFile), file as u64)?;
                if let Some(ty) = src0.ty {
                    self.set(Field::Src(0, OperandField::DataType), ty as u64)?;
                }
                self.set(Field::Src(0, OperandField::RegNum), bits)?;
                let bytes = translate::subreg_to_bytes(reg_ref.sub_reg_num, src0.ty);
                self.set_opt(Field::Src(0, OperandField::SubRegNum), bytes)?;
            }
            _ => return bad_operand(format!("{} src0 must be a label or register", self.spec.mnemonic)),
        }

        // brc/brd read JIP and UIP from one 64-bit register
        let reg64 = matches!(self.inst.op, Op::Brc | Op::Brd) && grf;
        let unary = matches!(
            self.format,
            Format::JumpUnaryImm | Format::JumpUnaryReg | Format::JumpUnaryRegImm | Format::JumpUnaryCallRegImm
        );
        if !reg64 && !unary {
            let uip = self.src(SourceIndex::Src1)?;
            self.set_label(Field::Uip, &uip)?;
        }
        Ok(())
    }

    fn encode_send(&mut self) -> Result<(), EncodeError> {
        let platform = self.model.platform;
        let xe = platform.era() == Era::Xe;
        let sends = self.inst.op.is_sends_family();
        let info = match self.inst.send {
            Some(info) => info,
            None => return bad_operand(format!("{} is missing its descriptors", self.spec.mnemonic)),
        };

        self.encode_base()?;
        let dst = self.dst()?;
        self.send_dst(&dst)?;
        let src0 = self.src(SourceIndex::Src0)?;
        self.send_src0(&src0)?;
        if sends || xe {
            let src1 = self.src(SourceIndex::Src1)?;
            match src1.kind {
                OperandKind::Direct { reg, reg_ref } => {
                    let (file, bits) = reg_bits(reg, reg_ref.reg_num)?;
                    self.set(Field::Src(1, OperandField::RegFile), file as u64)?;
                    self.set(Field::Src(1, OperandField::RegNum), bits)?;
                }
                _ => return bad_operand("send src1 must be a direct register"),
            }
        }

        match info.desc {
            SendDesc::Imm(desc) => {
                self.set(Field::DescRegFile, RegFile::Imm as u64)?;
                self.set(Field::MsgDesc, u64::from(desc))?;
            }
            SendDesc::Reg(_) => self.set(Field::DescRegFile, RegFile::Arf as u64)?,
        }

        match info.ex_desc {
            SendDesc::Imm(ex_desc) => {
                if sends || xe {
                    self.set(Field::ExDescRegFile, RegFile::Imm as u64)?;
                }
                let mask = ex_desc_mask(platform);
                if ex_desc & !mask != 0 {
                    tracing::debug!(ex_desc, mask, "dropping extended descriptor bits with no encoding");
                }
                self.set(Field::ExMsgDesc, u64::from(ex_desc & mask))?;
            }
            SendDesc::Reg(addr) => {
                if !(sends || xe) {
                    return unsupported("register extended descriptor on a unary send");
                }
                self.set(Field::ExDescRegFile, RegFile::Arf as u64)?;
                self.set(Field::ExDescAddrSubRegNum, u64::from(addr.sub_reg_num) * 2)?;
                if !xe {
                    if let Some(code) = translate::sfid_code(platform, info.sfid) {
                        self.set(Field::Sfid, code)?;
                    }
                }
                if xe {
                    if let Some(len) = info.src1_len {
                        self.set(Field::Src1Length, u64::from(len))?;
                    }
                    if platform >= Platform::XeHp && self.inst.opts.contains(InstOpts::EXBSO) {
                        self.set(Field::ExBso, 1)?;
                        if self.inst.opts.contains(InstOpts::CPS) {
                            self.set(Field::Cps, 1)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn send_dst(&mut self, dst: &Operand) -> Result<(), EncodeError> {
        match dst.kind {
            OperandKind::Indirect { .. } => self.dst_align1(dst),
            OperandKind::Direct { reg, reg_ref } => {
                if self.model.send_has_dst_type() {
                    if let Some(ty) = dst.ty {
                        self.set(Field::Dst(OperandField::DataType), ty as u64)?;
                    }
                    self.set_opt(Field::Dst(OperandField::HorzStride), HorzStride::H1 as u64)?;
                }
                self.set_opt(Field::Dst(OperandField::AddrMode), 0)?;
                self.dst_reg(reg, reg_ref, dst.ty)
            }
            _ => bad_operand("send destination must be a register"),
        }
    }

    fn send_src0(&mut self, src0: &Operand) -> Result<(), EncodeError> {
        match src0.kind {
            OperandKind::Indirect { .. } => self.src_align1(0, src0),
            OperandKind::Direct { reg, reg_ref } => {
                self.set_opt(Field::Src(0, OperandField::AddrMode), 0)?;
                if let Some(ty) = src0.ty {
                    self.set_opt(Field::Src(0, OperandField::DataType), ty as u64)?;
                }
                let (file, bits) = reg_bits(reg, reg_ref.reg_num)?;
                self.set(Field::Src(0, OperandField::RegFile), file as u64)?;
                self.set(Field::Src(0, OperandField::RegNum), bits)?;
                // older sends still carry a region for src0
                match self.spec.implicit_src_region {
                    Some(implicit) if self.model.platform < Platform::Gen9 => self.src_region(0, &implicit),
                    _ => Ok(()),
                }
            }
            _ => bad_operand("send src0 must be a register"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        decoder::{DecodeOptions, KernelDecoder},
        ir::{ExecSize, MathFc, PredCtrl, Predication, SendInfo, Sfid, Swsb, SyncFc},
    };

    fn roundtrip(platform: Platform, inst: &Instruction) -> Instruction {
        let bytes = Encoder::new(platform).encode_instruction(inst).unwrap();
        let decoded = KernelDecoder::new(DecodeOptions::new(platform).numeric_labels(true)).decode_kernel(&bytes);
        assert!(!decoded.diagnostics.has_errors(), "{:?}", decoded.diagnostics);
        let inst = decoded.kernel.instructions().next().cloned().unwrap();
        inst
    }

    fn add() -> Instruction {
        let mut inst = Instruction::new(Op::Add, Format::BasicBinaryRegRegImm, Subfunction::None);
        inst.exec_size = ExecSize::Simd16;
        inst.dst = Some(Operand::grf(10, 0, Region::DST1, Type::F));
        inst.set_src(SourceIndex::Src0, Operand::grf(20, 0, Region::SRC881, Type::F));
        inst.set_src(SourceIndex::Src1, Operand::immediate(0x3F80_0000, Type::F));
        inst
    }

    #[test]
    fn basic_binary_both_eras() {
        for platform in [Platform::Gen9, Platform::XeHpg] {
            let inst = add();
            let back = roundtrip(platform, &inst);
            assert_eq!(back.op, Op::Add);
            assert_eq!(back.exec_size, ExecSize::Simd16);
            assert_eq!(back.dst, inst.dst);
            assert_eq!(back.srcs, inst.srcs);
        }
    }

    #[test]
    fn predication_and_condition() {
        let mut inst = add();
        inst.op = Op::Cmp;
        inst.predication = Predication {
            function: PredCtrl::Seq,
            inverse: true,
        };
        inst.flag_modifier = FlagModifier::Lt;
        inst.flag_reg = RegRef::new(1, 1);
        let back = roundtrip(Platform::Gen11, &inst);
        assert_eq!(back.predication, inst.predication);
        assert_eq!(back.flag_modifier, FlagModifier::Lt);
        assert_eq!(back.flag_reg, RegRef::new(1, 1));
    }

    #[test]
    fn math_keeps_function() {
        let mut inst = Instruction::new(Op::Math, Format::MathUnaryReg, Subfunction::Math(MathFc::Sqt));
        inst.exec_size = ExecSize::Simd8;
        inst.dst = Some(Operand::grf(4, 0, Region::DST1, Type::F));
        inst.set_src(SourceIndex::Src0, Operand::grf(5, 0, Region::SRC881, Type::F));
        let back = roundtrip(Platform::Xe, &inst);
        assert_eq!(back.subfunction, Subfunction::Math(MathFc::Sqt));
        assert_eq!(back.src(SourceIndex::Src0), inst.src(SourceIndex::Src0));
    }

    #[test]
    fn sync_with_swsb() {
        let mut inst = Instruction::new(Op::Sync, Format::SyncUnary, Subfunction::Sync(SyncFc::Allwr));
        inst.set_src(SourceIndex::Src0, Operand::null(Type::UB));
        let (swsb, _) = Swsb::decode(0x32, SwsbEncodeMode::ThreeDistPipe, SwsbInstType::Other, 16);
        inst.swsb = swsb;
        let back = roundtrip(Platform::XeHpg, &inst);
        assert_eq!(back.subfunction, Subfunction::Sync(SyncFc::Allwr));
        assert_eq!(back.swsb, swsb);
    }

    #[test]
    fn send_with_immediate_descriptors() {
        let mut inst = Instruction::new(Op::Send, Format::SendBinary, Subfunction::Send(Sfid::Ugm));
        inst.exec_size = ExecSize::Simd16;
        inst.dst = Some(Operand::direct(RegName::Grf, RegRef::new(8, 0), Region::DST1, Some(Type::UD)));
        inst.set_src(SourceIndex::Src0, Operand::direct(RegName::Grf, RegRef::new(2, 0), Region::NONE, None));
        inst.set_src(SourceIndex::Src1, Operand::direct(RegName::Null, RegRef::ZERO, Region::NONE, None));
        inst.opts = InstOpts::EOT;
        inst.send = Some(SendInfo {
            sfid: Sfid::Ugm,
            desc: SendDesc::Imm(0x0220_0500),
            ex_desc: SendDesc::Imm(0),
            src0_len: Some(1),
            src1_len: Some(0),
            dst_len: Some(2),
        });
        let back = roundtrip(Platform::XeHpg, &inst);
        assert_eq!(back.subfunction, Subfunction::Send(Sfid::Ugm));
        assert!(back.opts.contains(InstOpts::EOT));
        let info = back.send.unwrap();
        assert_eq!(info.desc, SendDesc::Imm(0x0220_0500));
        assert_eq!(info.src0_len, Some(1));
        assert_eq!(info.dst_len, Some(2));
    }

    #[test]
    fn align16_ternary_is_unsupported() {
        let mut inst = Instruction::new(Op::Mad, Format::TernaryRegRegReg, Subfunction::None);
        inst.dst = Some(Operand::grf(1, 0, Region::DST1, Type::F));
        for s in SourceIndex::ALL {
            inst.set_src(s, Operand::grf(2, 0, Region::SRC2X1, Type::F));
        }
        assert!(matches!(
            Encoder::new(Platform::Gen9).encode_instruction(&inst),
            Err(EncodeError::Unsupported(_))
        ));
    }

    #[test]
    fn swsb_needs_a_scoreboard() {
        let mut inst = Instruction::new(Op::Nop, Format::Nullary, Subfunction::None);
        inst.swsb.min_dist = 1;
        inst.swsb.dist_type = crate::ir::swsb::DistType::RegDist;
        assert!(Encoder::new(Platform::Xe).encode_instruction(&inst).is_ok());
        assert!(matches!(
            Encoder::new(Platform::Gen11).encode_instruction(&inst),
            Err(EncodeError::Unsupported(_))
        ));
    }

    #[test]
    fn op_missing_on_platform() {
        let inst = Instruction::new(Op::Sync, Format::SyncUnary, Subfunction::Sync(SyncFc::Nop));
        assert_eq!(
            Encoder::new(Platform::Gen9).encode_instruction(&inst),
            Err(EncodeError::UnsupportedOp {
                op: Op::Sync,
                platform: Platform::Gen9
            })
        );
    }
}
