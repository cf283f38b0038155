//! Binary kernel decoding.
//!
//! [KernelDecoder::decode_kernel] walks a byte buffer one instruction at a time.
//! The compaction bit decides whether an instruction spans 8 or 16 bytes, the
//! native field layer ([crate::ged]) exposes its fields and the operation's
//! [Format] picks one of the operand decoders:
//!
//! - basic and math ops: `basic.rs`
//! - ternary ops, Align1 and the legacy Align16 re-assembly: `ternary.rs`
//! - jumps: `branch.rs`
//! - sends: `send.rs`
//!
//! Nothing fails past instruction granularity. A [DecodeError] raised while
//! decoding one instruction becomes an illegal instruction carrying the reason
//! as its comment, and decoding resumes at the next instruction boundary.
//! Everything else is collected as [Diagnostics].

use bitutils::bits;
use num_traits::FromPrimitive;

mod basic;
mod branch;
mod error;
mod send;
mod ternary;

pub use error::{DecodeError, Diagnostic, Diagnostics};
use error::fatal;
use send::{send_info_strategy, SendInfoFn};

use crate::{
    ged::{
        translate::{format_op_bits, sfid},
        Field, FieldDecoder, FieldError, InstDecodeError, NativeInst,
    },
    ir::{
        Block, ChannelOffset, Era, ExecSize, FlagModifier, InstOpts, Instruction, Kernel, MaskCtrl, MathFc, Op,
        Platform, PredCtrl, Predication, RegRef, SourceIndex, Subfunction, Swsb, SwsbEncodeMode, SwsbInstType,
        SwsbStatus, SyncFc,
    },
    model::{Format, Model, OpAttrs, OpSpec, OpcodeLookup},
    Decoder,
};

const COMPACTED_SIZE: usize = 8;
const UNCOMPACTED_SIZE: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOptions {
    pub platform: Platform,
    /// Keep every instruction in one block at offset 0 instead of inferring blocks
    pub numeric_labels: bool,
    /// Overrides the platform's SWSB encode mode
    pub swsb_mode: Option<SwsbEncodeMode>,
    pub sbid_count: Option<u32>,
}

impl DecodeOptions {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            numeric_labels: false,
            swsb_mode: None,
            sbid_count: None,
        }
    }
    pub fn numeric_labels(mut self, numeric_labels: bool) -> Self {
        self.numeric_labels = numeric_labels;
        self
    }
    pub fn swsb_mode(mut self, mode: SwsbEncodeMode) -> Self {
        self.swsb_mode = Some(mode);
        self
    }
    pub fn sbid_count(mut self, count: u32) -> Self {
        self.sbid_count = Some(count);
        self
    }
}

/// A decoded kernel together with everything that went wrong decoding it.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub kernel: Kernel,
    pub diagnostics: Diagnostics,
}

pub struct KernelDecoder {
    options: DecodeOptions,
    model: Model,
    send_info: SendInfoFn,
}

impl KernelDecoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self {
            model: Model::new(options.platform),
            send_info: send_info_strategy(options.platform),
            options,
        }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    pub fn decode_kernel(&self, bytes: &[u8]) -> Decoded {
        let mut diagnostics = Diagnostics::new();
        if !bytes.is_empty() && bytes.len() < COMPACTED_SIZE {
            diagnostics.error(None, "binary size is too small");
        }
        let insts = self.decode_instructions(bytes, &mut diagnostics);

        let blocks = if insts.is_empty() {
            vec![]
        } else if self.options.numeric_labels {
            let mut block = Block::new(0);
            block.instructions = insts;
            vec![block]
        } else {
            Block::infer_blocks(insts, bytes.len() as u32)
        };
        tracing::debug!(
            blocks = blocks.len(),
            errors = diagnostics.errors.len(),
            warnings = diagnostics.warnings.len(),
            "decoded kernel"
        );
        Decoded {
            kernel: Kernel::with_blocks(self.options.platform, blocks),
            diagnostics,
        }
    }

    /// Decode a flat instruction list, without block inference.
    pub fn decode_instructions(&self, bytes: &[u8], diagnostics: &mut Diagnostics) -> Vec<Instruction> {
        let mut insts = vec![];
        let mut native = NativeInst::new(self.options.platform);
        let mut pc = 0usize;
        let mut next_id = 1;

        while pc < bytes.len() {
            let rest = &bytes[pc..];
            // the compaction bit lives in the first dword
            if rest.len() < 4 {
                diagnostics.warning(Some(pc as u32), "unexpected padding at end of kernel");
                break;
            }
            let dw0 = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
            let len = if bits!(dw0, 29:29) != 0 {
                COMPACTED_SIZE
            } else {
                UNCOMPACTED_SIZE
            };
            if rest.len() < len {
                diagnostics.warning(Some(pc as u32), "unexpected padding at end of kernel");
                break;
            }

            let mut inst = self.decode_one(&mut native, &rest[..len], pc as u32, diagnostics);
            inst.pc = pc as u32;
            inst.id = next_id;
            inst.loc = pc as u32;
            tracing::trace!(pc, "{}", inst);
            insts.push(inst);

            next_id += 1;
            pc += len;
        }
        insts
    }

    fn decode_one(
        &self,
        native: &mut NativeInst,
        bytes: &[u8],
        pc: u32,
        diagnostics: &mut Diagnostics,
    ) -> Instruction {
        let platform = self.options.platform;
        let error_inst = |message: &str| Instruction::illegal(format!("{}: {}", format_op_bits(platform, bytes), message));

        match native.decode_inst(bytes) {
            Ok(()) => {}
            Err(InstDecodeError::NoCompactedForm) => {
                diagnostics.error(Some(pc), "error decoding instruction (no compacted form)");
                let mut inst = error_inst("unable to decompact");
                if bytes.len() == COMPACTED_SIZE {
                    inst.opts |= InstOpts::COMPACTED;
                }
                return inst;
            }
            Err(err) => {
                tracing::debug!(pc, %err, "native decode failed");
                diagnostics.error(Some(pc), "error decoding instruction");
                return error_inst("unable to decode instruction bits");
            }
        }

        let raw_op = match native.get(Field::Opcode) {
            Ok(op) => op,
            Err(err) => {
                diagnostics.error(Some(pc), err.to_string());
                return error_inst(&err.to_string());
            }
        };
        let spec = match self.model.lookup_opcode(raw_op) {
            OpcodeLookup::Valid(spec) => spec,
            OpcodeLookup::WrongPlatform(_) => {
                let message = format!("{:#x}: unsupported opcode on this platform", raw_op);
                diagnostics.error(Some(pc), message.clone());
                return error_inst(&message);
            }
            OpcodeLookup::Unmapped => {
                let message = format!("{:#x}: unmapped opcode", raw_op);
                diagnostics.error(Some(pc), message.clone());
                return error_inst(&message);
            }
        };

        let mut decoder = InstDecoder {
            model: self.model,
            options: &self.options,
            send_info: self.send_info,
            fields: &*native,
            bytes,
            pc,
            spec,
            format: spec.format,
            diags: diagnostics,
        };
        match decoder.decode_inst() {
            Ok(inst) => inst,
            Err(err) => {
                let message = err.to_string();
                diagnostics.error(Some(pc), message.clone());
                error_inst(&message)
            }
        }
    }
}

impl Decoder for KernelDecoder {
    type Input = [u8];
    type Program = Decoded;
    type Err = std::convert::Infallible;

    fn decode(&self, data: &[u8]) -> Result<Decoded, Self::Err> {
        Ok(self.decode_kernel(data))
    }
}

/// State for decoding a single instruction.
pub(crate) struct InstDecoder<'a> {
    model: Model,
    options: &'a DecodeOptions,
    send_info: SendInfoFn,
    fields: &'a dyn FieldDecoder,
    bytes: &'a [u8],
    pc: u32,
    spec: &'static OpSpec,
    /// The op's format, resolved through the subfunction for `math`
    format: Format,
    diags: &'a mut Diagnostics,
}

impl<'a> InstDecoder<'a> {
    fn error(&mut self, message: impl Into<String>) {
        self.diags.error(Some(self.pc), message);
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.diags.warning(Some(self.pc), message);
    }

    /// Raw field value. A value outside the field's code space is reported and
    /// passed through; a field missing from the encoding is fatal.
    fn raw(&mut self, field: Field) -> Result<u64, DecodeError> {
        match self.fields.get(field) {
            Ok(value) => Ok(value),
            Err(FieldError::InvalidValue { field, value }) => {
                self.error(format!("invalid value {:#x} for {}", value, field));
                Ok(value)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn raw_or(&mut self, field: Field, default: u64) -> Result<u64, DecodeError> {
        if self.fields.has_field(field) {
            self.raw(field)
        } else {
            Ok(default)
        }
    }

    fn signed(&mut self, field: Field) -> Result<i64, DecodeError> {
        Ok(self.fields.get_signed(field)?)
    }

    /// `None` if the field is absent from this encoding or holds an invalid value
    /// (which is reported).
    fn decode_opt<T: FromPrimitive>(&mut self, field: Field) -> Result<Option<T>, DecodeError> {
        if !self.fields.has_field(field) {
            return Ok(None);
        }
        let value = match self.fields.get(field) {
            Ok(value) => value,
            Err(FieldError::InvalidValue { value, .. }) => {
                self.error(format!("invalid value {:#x} for {}", value, field));
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        match T::from_u64(value) {
            Some(v) => Ok(Some(v)),
            None => {
                self.error(format!("invalid value {:#x} for {}", value, field));
                Ok(None)
            }
        }
    }

    fn decode<T: FromPrimitive>(&mut self, field: Field, default: T) -> Result<T, DecodeError> {
        Ok(self.decode_opt(field)?.unwrap_or(default))
    }

    fn decode_inst(&mut self) -> Result<Instruction, DecodeError> {
        let subfunction = self.decode_subfunction()?;
        let format = self.format;

        let mut inst = match format {
            Format::Nullary => match self.spec.op {
                Op::Nop => Instruction::new(Op::Nop, format, Subfunction::None),
                Op::Illegal => Instruction::illegal(format_op_bits(self.model.platform, self.bytes)),
                _ => return fatal("invalid operation format"),
            },
            f if f.is_basic() || f.is_math() => self.decode_basic(subfunction)?,
            f if f.is_ternary() => self.decode_ternary(subfunction)?,
            f if f.is_jump() => self.decode_branch()?,
            f if f.is_send() => self.decode_send(subfunction)?,
            Format::SyncUnary => self.decode_sync(subfunction)?,
            _ => return fatal("invalid operation format"),
        };

        if !inst.is_illegal() {
            self.decode_options(&mut inst)?;
            self.decode_swsb(&mut inst)?;
        }
        Ok(inst)
    }

    /// Also resolves the concrete format of `math`.
    fn decode_subfunction(&mut self) -> Result<Subfunction, DecodeError> {
        let platform = self.model.platform;
        match self.spec.op {
            Op::Math => {
                let raw = self.raw(Field::MathFc)?;
                let resolved = MathFc::from_u64(raw).and_then(|fc| Some((fc, self.model.math_format(fc)?)));
                match resolved {
                    Some((fc, format)) => {
                        self.format = format;
                        Ok(Subfunction::Math(fc))
                    }
                    None => fatal(format!("unsupported pseudo op (sub function of {})", self.spec.mnemonic)),
                }
            }
            Op::Sync => match SyncFc::from_u64(self.raw(Field::SyncFc)?) {
                Some(fc) => Ok(Subfunction::Sync(fc)),
                None => fatal("invalid subfunction"),
            },
            op if op.is_send_family() && platform.era() == Era::Xe => match sfid(platform, self.raw(Field::Sfid)?) {
                Some(id) => Ok(Subfunction::Send(id)),
                None => fatal("invalid subfunction"),
            },
            Op::Dpas | Op::Dpasw => {
                let depth = 1u8 << self.raw(Field::SystolicDepth)?;
                let repeat = self.raw(Field::RepeatCount)? as u8 + 1;
                Ok(Subfunction::Dpas { depth, repeat })
            }
            Op::Bfn => Ok(Subfunction::Bfn(self.raw(Field::BfnFc)? as u8)),
            _ => Ok(Subfunction::None),
        }
    }

    fn flag_info(&mut self) -> Result<(Predication, FlagModifier, RegRef), DecodeError> {
        let mut pred = Predication::NONE;
        if self.spec.has(OpAttrs::PREDICATION) {
            pred.function = self.decode(Field::PredCtrl, PredCtrl::None)?;
            pred.inverse = self.raw(Field::PredInv)? != 0;
        }

        let mut modifier = FlagModifier::None;
        // math, bfn and dpas reuse the condition modifier bits
        let reuses_cond_mod = self.format.is_math() || matches!(self.spec.op, Op::Bfn | Op::Dpas | Op::Dpasw);
        if self.spec.has(OpAttrs::FLAG_MODIFIER) && !reuses_cond_mod {
            modifier = self.decode(Field::CondModifier, FlagModifier::None)?;
        } else if self.format.is_math() && self.format.is_macro() {
            modifier = FlagModifier::Eo;
        }

        let mut flag_reg = RegRef::ZERO;
        if pred.is_some() || modifier != FlagModifier::None {
            flag_reg.reg_num = self.raw(Field::FlagRegNum)? as u16;
            flag_reg.sub_reg_num = self.raw(Field::FlagSubRegNum)? as u16;
            if flag_reg.reg_num >= self.model.flag_reg_count() {
                self.error(format!("f{} does not exist on this platform", flag_reg.reg_num));
            }
        }
        Ok((pred, modifier, flag_reg))
    }

    /// An instruction with its predication, flag, execution size, channel
    /// offset and mask control decoded.
    fn base_instruction(&mut self, subfunction: Subfunction) -> Result<Instruction, DecodeError> {
        let (predication, flag_modifier, flag_reg) = self.flag_info()?;
        let mut inst = Instruction::new(self.spec.op, self.format, subfunction);
        inst.predication = predication;
        inst.flag_modifier = flag_modifier;
        inst.flag_reg = flag_reg;
        inst.exec_size = self.decode(Field::ExecSize, ExecSize::Simd1)?;
        inst.chan_off = self.decode(Field::ChannelOffset, ChannelOffset::M0)?;
        inst.mask_ctrl = self.decode(Field::MaskCtrl, MaskCtrl::Normal)?;
        Ok(inst)
    }

    fn decode_sync(&mut self, subfunction: Subfunction) -> Result<Instruction, DecodeError> {
        let mut inst = self.base_instruction(subfunction)?;
        // wait (..) nreg nreg null, only the source is explicit
        let align16 = self.align16()?;
        let src = self.src_basic(SourceIndex::Src0, SourceIndex::Src0, align16)?;
        inst.set_src(SourceIndex::Src0, src);
        Ok(inst)
    }

    fn decode_options(&mut self, inst: &mut Instruction) -> Result<(), DecodeError> {
        let platform = self.model.platform;
        let send = self.spec.op.is_send_family();
        let gen = platform.era() == Era::Gen;

        // BranchCtrl shares the AccWrEn bit
        if self.spec.has(OpAttrs::ACC_WR_EN) && !self.format.is_jump() && self.raw(Field::AccWrCtrl)? == 1 {
            inst.opts |= InstOpts::ACC_WR_EN;
        }
        if self.raw(Field::DebugCtrl)? == 1 {
            inst.opts |= InstOpts::BREAKPOINT;
        }
        if send && self.raw(Field::Eot)? == 1 {
            inst.opts |= InstOpts::EOT;
        }
        if self.model.supports_dep_ctrl() {
            match self.raw(Field::DepCtrl)? {
                1 => inst.opts |= InstOpts::NO_DD_CLR,
                2 => inst.opts |= InstOpts::NO_DD_CHK,
                3 => inst.opts |= InstOpts::NO_DD_CLR | InstOpts::NO_DD_CHK,
                _ => {}
            }
        }
        if gen {
            if (!send && self.model.supports_thread_switch()) || (send && platform >= Platform::Gen9) {
                match self.raw(Field::ThreadCtrl)? {
                    1 => inst.opts |= InstOpts::ATOMIC,
                    2 => inst.opts |= InstOpts::SWITCH,
                    3 => inst.opts |= InstOpts::NO_PREEMPT,
                    _ => {}
                }
            }
        } else if self.raw(Field::ThreadCtrl)? == 1 {
            inst.opts |= InstOpts::ATOMIC;
        }
        if send
            && (Platform::Gen9..=Platform::Gen11).contains(&platform)
            && self.raw(Field::NoSrcDepSet)? == 1
        {
            inst.opts |= InstOpts::NO_SRC_DEP_SET;
        }
        if send && !gen && self.raw(Field::FusionCtrl)? == 1 {
            inst.opts |= InstOpts::SERIALIZE;
        }
        Ok(())
    }

    fn decode_swsb(&mut self, inst: &mut Instruction) -> Result<(), DecodeError> {
        let mode = match (self.options.swsb_mode, self.model.swsb_mode()) {
            (_, None) => return Ok(()),
            (Some(mode), _) | (None, Some(mode)) => mode,
        };
        let sbid_count = self.options.sbid_count.unwrap_or_else(|| mode.default_sbid_count());
        let inst_type = SwsbInstType::of(self.spec.op);

        let raw = self.raw(Field::Swsb)? as u8;
        let (swsb, status) = Swsb::decode(raw, mode, inst_type, sbid_count);
        match status {
            SwsbStatus::Success => {}
            SwsbStatus::InvalidEncodeMode => self.warning(status.message()),
            _ => self.error(status.message()),
        }
        inst.swsb = swsb;
        Ok(())
    }
}
