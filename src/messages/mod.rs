//! Send-message descriptor decoding.
//!
//! [decode_message] classifies the descriptor of one send instruction into a
//! [SendOp] plus addressing, data layout, caching and payload sizes. Which
//! decoder runs depends on the SFID and the platform:
//!
//! - LSC units (UGM, SLM, URB, TGM) on XE3 and later: `lsc_e64.rs`
//! - LSC units from XE_HPG up to XE2: `lsc.rs`
//! - the legacy data cache (DC0, DC1, DC2, DCRO): `hdc.rs`
//! - the sampler: `sampler.rs`
//! - gateway, render cache, thread spawner, ray tracing, TS, legacy URB: `other.rs`
//!
//! Decoding never stops early. Problems are appended to
//! [DecodeResult::errors] or [DecodeResult::warnings] and a best-effort result
//! is returned. Every descriptor field read is recorded in
//! [DecodeResult::fields].

use std::fmt;

use bitflags::bitflags;

pub mod cache;
mod hdc;
mod lsc;
mod lsc_e64;
mod other;
mod sampler;

pub use cache::{CacheControl, CacheOpt};
pub use lsc::{encode_descriptors, DescEncodeError, VectorMessageArgs};

use crate::ir::{ExecSize, Instruction, Platform, RegRef, SendDesc, Sfid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendOpClass {
    Load,
    Store,
    Atomic,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendOp {
    Load,
    LoadQuad,
    LoadStrided,
    LoadBlock2d,
    LoadStatus,
    LoadQuadStatus,
    LoadQuadMsrt,
    ReadState,

    Store,
    StoreQuad,
    StoreStrided,
    StoreBlock2d,
    StoreUncompressed,
    StoreUncompressedQuad,
    StoreQuadMsrt,

    AtomicLoad,
    AtomicStore,
    AtomicAnd,
    AtomicXor,
    AtomicOr,
    AtomicIinc,
    AtomicIdec,
    AtomicIadd,
    AtomicIsub,
    AtomicIrsub,
    AtomicIpdec,
    AtomicIcas,
    AtomicSmin,
    AtomicSmax,
    AtomicUmin,
    AtomicUmax,
    AtomicFadd,
    AtomicFsub,
    AtomicFmin,
    AtomicFmax,
    AtomicFcas,
    AtomicAcadd,
    AtomicAcsub,
    AtomicAcstore,

    Fence,
    Barrier,
    Monitor,
    Unmonitor,
    Wait,
    SignalEvent,
    Eot,
    SamplerLoad,
    SamplerFlush,
    RenderWrite,
    RenderRead,
    CcsPc,
    CcsSc,
    CcsPu,
    CcsSu,
    GetWatchpoint,
    SetWatchpoint,
    ExtendedCacheCtrl,
    Spawn,
    StackIdRelease,
    TraceRay,
}

impl SendOp {
    pub const ATOMICS: [SendOp; 24] = [
        SendOp::AtomicLoad,
        SendOp::AtomicStore,
        SendOp::AtomicAnd,
        SendOp::AtomicXor,
        SendOp::AtomicOr,
        SendOp::AtomicIinc,
        SendOp::AtomicIdec,
        SendOp::AtomicIadd,
        SendOp::AtomicIsub,
        SendOp::AtomicIrsub,
        SendOp::AtomicIpdec,
        SendOp::AtomicIcas,
        SendOp::AtomicSmin,
        SendOp::AtomicSmax,
        SendOp::AtomicUmin,
        SendOp::AtomicUmax,
        SendOp::AtomicFadd,
        SendOp::AtomicFsub,
        SendOp::AtomicFmin,
        SendOp::AtomicFmax,
        SendOp::AtomicFcas,
        SendOp::AtomicAcadd,
        SendOp::AtomicAcsub,
        SendOp::AtomicAcstore,
    ];

    pub fn class(self) -> SendOpClass {
        use SendOp::*;
        match self {
            Load | LoadQuad | LoadStrided | LoadBlock2d | LoadStatus | LoadQuadStatus | LoadQuadMsrt | ReadState => {
                SendOpClass::Load
            }
            Store | StoreQuad | StoreStrided | StoreBlock2d | StoreUncompressed | StoreUncompressedQuad
            | StoreQuadMsrt => SendOpClass::Store,
            AtomicLoad | AtomicStore | AtomicAnd | AtomicXor | AtomicOr | AtomicIinc | AtomicIdec | AtomicIadd
            | AtomicIsub | AtomicIrsub | AtomicIpdec | AtomicIcas
            | AtomicSmin | AtomicSmax | AtomicUmin | AtomicUmax | AtomicFadd
            | AtomicFsub | AtomicFmin | AtomicFmax | AtomicFcas | AtomicAcadd | AtomicAcsub | AtomicAcstore => {
                SendOpClass::Atomic
            }
            _ => SendOpClass::Other,
        }
    }
    pub fn is_load(self) -> bool {
        self.class() == SendOpClass::Load
    }
    pub fn is_store(self) -> bool {
        self.class() == SendOpClass::Store
    }
    pub fn is_atomic(self) -> bool {
        self.class() == SendOpClass::Atomic
    }

    /// Quad messages select components with a channel mask instead of a vector size.
    pub fn has_ch_mask(self) -> bool {
        matches!(
            self,
            SendOp::LoadQuad
                | SendOp::StoreQuad
                | SendOp::LoadQuadStatus
                | SendOp::LoadQuadMsrt
                | SendOp::StoreQuadMsrt
                | SendOp::StoreUncompressedQuad
        )
    }

    /// Data operands an atomic takes in src1.
    pub fn atomic_args(self) -> u32 {
        use SendOp::*;
        match self {
            AtomicIinc | AtomicIdec | AtomicIpdec | AtomicLoad => 0,
            AtomicIcas | AtomicFcas => 2,
            op if op.is_atomic() => 1,
            _ => 0,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        use SendOp::*;
        match self {
            Load => "load",
            LoadQuad => "load_quad",
            LoadStrided => "load_strided",
            LoadBlock2d => "load_block2d",
            LoadStatus => "load_status",
            LoadQuadStatus => "load_quad_status",
            LoadQuadMsrt => "load_quad_msrt",
            ReadState => "read_state",
            Store => "store",
            StoreQuad => "store_quad",
            StoreStrided => "store_strided",
            StoreBlock2d => "store_block2d",
            StoreUncompressed => "store_uncompressed",
            StoreUncompressedQuad => "store_uncompressed_quad",
            StoreQuadMsrt => "store_quad_msrt",
            AtomicLoad => "atomic_load",
            AtomicStore => "atomic_store",
            AtomicAnd => "atomic_and",
            AtomicXor => "atomic_xor",
            AtomicOr => "atomic_or",
            AtomicIinc => "atomic_iinc",
            AtomicIdec => "atomic_idec",
            AtomicIadd => "atomic_iadd",
            AtomicIsub => "atomic_isub",
            AtomicIrsub => "atomic_irsub",
            AtomicIpdec => "atomic_ipdec",
            AtomicIcas => "atomic_icas",
            AtomicSmin => "atomic_smin",
            AtomicSmax => "atomic_smax",
            AtomicUmin => "atomic_umin",
            AtomicUmax => "atomic_umax",
            AtomicFadd => "atomic_fadd",
            AtomicFsub => "atomic_fsub",
            AtomicFmin => "atomic_fmin",
            AtomicFmax => "atomic_fmax",
            AtomicFcas => "atomic_fcas",
            AtomicAcadd => "atomic_acadd",
            AtomicAcsub => "atomic_acsub",
            AtomicAcstore => "atomic_acstore",
            Fence => "fence",
            Barrier => "barrier",
            Monitor => "monitor",
            Unmonitor => "unmonitor",
            Wait => "wait",
            SignalEvent => "signal_event",
            Eot => "eot",
            SamplerLoad => "sample",
            SamplerFlush => "sampler_flush",
            RenderWrite => "rtw",
            RenderRead => "rtr",
            CcsPc => "ccs_pc",
            CcsSc => "ccs_sc",
            CcsPu => "ccs_pu",
            CcsSu => "ccs_su",
            GetWatchpoint => "get_watchpoint",
            SetWatchpoint => "set_watchpoint",
            ExtendedCacheCtrl => "extended_cache_control",
            Spawn => "spawn",
            StackIdRelease => "stack_id_release",
            TraceRay => "trace_ray",
        }
    }
}

impl fmt::Display for SendOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddrType {
    Flat,
    /// Bindless surface state
    Bss,
    /// Surface state
    Ss,
    /// Binding table index
    Bti,
    /// Surface-state relative, XE3 and later
    Surf,
}

bitflags! {
    pub struct MsgAttrs: u32 {
        const ATOMIC_RETURNS = 1 << 0;
        const EXPAND_HIGH = 1 << 1;
        const HAS_CHMASK = 1 << 2;
        const HAS_UVRLOD = 1 << 3;
        const SCRATCH = 1 << 4;
        const SLM = 1 << 5;
        const TRANSPOSED = 1 << 6;
        const TYPED = 1 << 7;
    }
}

impl Default for MsgAttrs {
    fn default() -> Self {
        MsgAttrs::empty()
    }
}

/// What a message does. Payload lengths are in bytes; `None` means they
/// cannot be known from the descriptor alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    pub op: Option<SendOp>,
    pub attrs: MsgAttrs,
    pub exec_width: Option<u32>,
    pub addr_type: AddrType,
    pub addr_size_bits: u32,
    pub elem_size_bits_reg: u32,
    pub elem_size_bits_mem: u32,
    pub elems_per_addr: u32,
    pub channels_enabled: u32,
    pub caching_l1: CacheOpt,
    pub caching_l3: CacheOpt,
    /// Binding table index, surface state offset or surface state register
    pub surface: Option<SendDesc>,
    /// Uniform base address register, XE3 and later
    pub uniform_base: Option<RegRef>,
    pub immediate_offset: i32,
    pub block2d_offset: (i32, i32),
    pub addr_scaling: u32,
    pub dst_len_bytes: Option<u32>,
    pub src0_len_bytes: Option<u32>,
    pub src1_len_bytes: Option<u32>,
    /// Short syntax of the message, e.g. `load.ugm.d32.a32`
    pub symbol: String,
    pub description: String,
}

impl Default for MessageInfo {
    fn default() -> Self {
        Self {
            op: None,
            attrs: MsgAttrs::empty(),
            exec_width: None,
            addr_type: AddrType::Flat,
            addr_size_bits: 0,
            elem_size_bits_reg: 0,
            elem_size_bits_mem: 0,
            elems_per_addr: 0,
            channels_enabled: 0,
            caching_l1: CacheOpt::Default,
            caching_l3: CacheOpt::Default,
            surface: None,
            uniform_base: None,
            immediate_offset: 0,
            block2d_offset: (0, 0),
            addr_scaling: 1,
            dst_len_bytes: None,
            src0_len_bytes: None,
            src1_len_bytes: None,
            symbol: String::new(),
            description: String::new(),
        }
    }
}

impl MessageInfo {
    pub fn has(&self, attr: MsgAttrs) -> bool {
        self.attrs.contains(attr)
    }
    pub fn is_load(&self) -> bool {
        self.op.map_or(false, SendOp::is_load)
    }
    pub fn is_store(&self) -> bool {
        self.op.map_or(false, SendOp::is_store)
    }
    pub fn is_atomic(&self) -> bool {
        self.op.map_or(false, SendOp::is_atomic)
    }
    pub fn is_transposed(&self) -> bool {
        self.has(MsgAttrs::TRANSPOSED)
    }
    pub fn is_block(&self) -> bool {
        self.exec_width == Some(1) && (self.is_load() || self.is_store())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    #[default]
    Invalid,
    Load,
    Store,
    Atomic,
    Control,
}

/// The pieces of the message's assembly syntax, e.g.
/// `load` `.ugm.d32.a64.ca.ca` `bti[2]` `[4*` `A` `+0x40]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageSyntax {
    pub layout: Layout,
    pub mnemonic: String,
    pub controls: String,
    pub surface: String,
    pub scale: String,
    pub imm_offset: String,
}

impl MessageSyntax {
    pub fn is_control(&self) -> bool {
        self.layout == Layout::Control
    }

    pub fn sym(&self) -> String {
        let mut sym = format!("{}{}", self.mnemonic, self.controls);
        if self.is_control() {
            return sym;
        }
        sym.push(' ');
        sym.push_str(&self.surface);
        sym.push('[');
        sym.push_str(&self.scale);
        sym.push('A');
        sym.push_str(&self.imm_offset);
        sym.push(']');
        sym
    }
}

/// One descriptor field as read by a message decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescField {
    pub name: &'static str,
    pub offset: u32,
    pub len: u32,
    pub value: u64,
    pub meaning: String,
}

impl DescField {
    pub fn overlaps(&self, offset: u32, len: u32) -> bool {
        offset < self.offset + self.len && self.offset < offset + len
    }
}

impl fmt::Display for DescField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len == 1 {
            write!(f, "[{}] {} = {:#x}", self.offset, self.name, self.value)?;
        } else {
            write!(
                f,
                "[{}:{}] {} = {:#x}",
                self.offset + self.len - 1,
                self.offset,
                self.name,
                self.value
            )?;
        }
        if !self.meaning.is_empty() {
            write!(f, " ({})", self.meaning)?;
        }
        Ok(())
    }
}

/// A problem with the descriptor bits at `offset..offset + len`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDiag {
    pub offset: u32,
    pub len: u32,
    pub message: String,
}

impl fmt::Display for MessageDiag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len == 0 {
            f.write_str(&self.message)
        } else {
            write!(f, "Desc[{}:{}]: {}", self.offset + self.len - 1, self.offset, self.message)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodeResult {
    pub info: MessageInfo,
    pub syntax: MessageSyntax,
    pub fields: Vec<DescField>,
    pub warnings: Vec<MessageDiag>,
    pub errors: Vec<MessageDiag>,
}

impl DecodeResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Everything a message decoder looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInput {
    pub platform: Platform,
    pub sfid: Sfid,
    pub exec_size: Option<ExecSize>,
    /// Payload lengths in registers, as given by the instruction
    pub src0_len: Option<u32>,
    pub src1_len: Option<u32>,
    pub desc: SendDesc,
    pub ex_desc: SendDesc,
    /// Indirect descriptor registers, XE3 and later
    pub ind0: Option<RegRef>,
    pub ind1: Option<RegRef>,
}

impl MessageInput {
    pub fn new(platform: Platform, sfid: Sfid, desc: u32, ex_desc: u32) -> Self {
        Self {
            platform,
            sfid,
            exec_size: None,
            src0_len: None,
            src1_len: None,
            desc: SendDesc::Imm(desc),
            ex_desc: SendDesc::Imm(ex_desc),
            ind0: None,
            ind1: None,
        }
    }
    pub fn exec_size(mut self, exec_size: ExecSize) -> Self {
        self.exec_size = Some(exec_size);
        self
    }
    pub fn lengths(mut self, src0_len: u32, src1_len: u32) -> Self {
        self.src0_len = Some(src0_len);
        self.src1_len = Some(src1_len);
        self
    }
    pub fn ind0(mut self, reg: RegRef) -> Self {
        self.ind0 = Some(reg);
        self
    }

    /// The message of a decoded send instruction, if it has one.
    pub fn from_instruction(platform: Platform, inst: &Instruction) -> Option<Self> {
        let send = inst.send.as_ref()?;
        // XE through XE2 keep instruction fields in the low extended descriptor
        // bits; XE3 uses all 64 bits as one descriptor
        let ex_desc = match send.ex_desc {
            SendDesc::Imm(ex_desc) if platform >= Platform::Xe && platform < Platform::Xe3 => {
                SendDesc::Imm(ex_desc & !0xFFF)
            }
            ex_desc => ex_desc,
        };
        Some(Self {
            platform,
            sfid: send.sfid,
            exec_size: Some(inst.exec_size),
            src0_len: send.src0_len,
            src1_len: send.src1_len,
            desc: send.desc,
            ex_desc,
            ind0: None,
            ind1: None,
        })
    }

    /// Descriptor bits; the immediate extended descriptor occupies bits 32 and up.
    fn bits(&self) -> u64 {
        let desc = match self.desc {
            SendDesc::Imm(desc) => u64::from(desc),
            SendDesc::Reg(_) => 0,
        };
        let ex_desc = match self.ex_desc {
            SendDesc::Imm(ex_desc) => u64::from(ex_desc),
            SendDesc::Reg(_) => 0,
        };
        desc | (ex_desc << 32)
    }
}

type MessageDecodeFn = fn(&mut MessageDecoder<'_>);

const LSC_STRATEGIES: [(Platform, MessageDecodeFn); 2] = [
    (Platform::XeHpg, lsc::decode),
    (Platform::Xe3, lsc_e64::decode),
];

fn lsc_strategy(platform: Platform) -> Option<MessageDecodeFn> {
    LSC_STRATEGIES
        .iter()
        .rev()
        .find(|(min, _)| platform >= *min)
        .map(|(_, f)| *f)
}

/// Decode the message `input` describes.
pub fn decode_message(input: &MessageInput) -> DecodeResult {
    let mut d = MessageDecoder::new(input);
    if let SendDesc::Reg(reg) = input.desc {
        d.error(0, 0, format!("cannot decode a descriptor held in a0.{}", reg.sub_reg_num));
        return d.finish();
    }

    let strategy: Option<MessageDecodeFn> = match input.sfid {
        Sfid::Ugm | Sfid::Slm | Sfid::Tgm => lsc_strategy(input.platform),
        Sfid::Urb => Some(lsc_strategy(input.platform).unwrap_or(other::decode_urb)),
        Sfid::Dc0 | Sfid::Dc1 | Sfid::Dc2 | Sfid::Dcro => Some(hdc::decode),
        Sfid::Smpl if input.platform >= Platform::Xe => Some(sampler::decode),
        Sfid::Gtwy => Some(other::decode_gateway),
        Sfid::Rc => Some(other::decode_render_cache),
        Sfid::Ts => Some(other::decode_ts),
        Sfid::Btd if input.platform >= Platform::XeHp => Some(other::decode_btd),
        Sfid::Rta if input.platform >= Platform::XeHp => Some(other::decode_rta),
        Sfid::A0Reg => {
            d.error(0, 0, "cannot decode a message whose SFID is held in a0");
            return d.finish();
        }
        _ => None,
    };
    match strategy {
        Some(decode) => decode(&mut d),
        None => d.error(0, 0, "unsupported SFID for this platform"),
    }
    d.finish()
}

/// Field-level access to one descriptor shared by all message decoders.
pub(crate) struct MessageDecoder<'a> {
    input: &'a MessageInput,
    bits: u64,
    result: DecodeResult,
}

impl<'a> MessageDecoder<'a> {
    fn new(input: &'a MessageInput) -> Self {
        let mut result = DecodeResult::default();
        result.info.exec_width = input.exec_size.map(ExecSize::lanes);
        Self {
            bits: input.bits(),
            input,
            result,
        }
    }

    fn finish(self) -> DecodeResult {
        self.result
    }

    pub(crate) fn platform(&self) -> Platform {
        self.input.platform
    }
    pub(crate) fn sfid(&self) -> Sfid {
        self.input.sfid
    }
    pub(crate) fn ex_desc(&self) -> SendDesc {
        self.input.ex_desc
    }

    /// Register size in bytes.
    pub(crate) fn grf_bytes(&self) -> u32 {
        self.platform().grf_bytes()
    }

    pub(crate) fn desc_bits(&self, off: u32, len: u32) -> u32 {
        ((self.bits >> off) & ((1u64 << len) - 1)) as u32
    }

    pub(crate) fn desc_bits_signed(&self, off: u32, len: u32) -> i32 {
        let raw = self.desc_bits(off, len);
        let shift = 32 - len;
        ((raw << shift) as i32) >> shift
    }

    pub(crate) fn desc_bit(&self, off: u32) -> bool {
        self.desc_bits(off, 1) != 0
    }

    pub(crate) fn error(&mut self, offset: u32, len: u32, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(sfid = %self.sfid(), offset, len, "{}", message);
        self.result.errors.push(MessageDiag { offset, len, message });
    }

    pub(crate) fn warning(&mut self, offset: u32, len: u32, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(sfid = %self.sfid(), offset, len, "{}", message);
        self.result.warnings.push(MessageDiag { offset, len, message });
    }

    /// Record a field in the trace. A field overlapping an already recorded one
    /// is reported as a warning and dropped.
    pub(crate) fn add_field(&mut self, name: &'static str, offset: u32, len: u32, value: u64, meaning: impl Into<String>) {
        if let Some(prev) = self.result.fields.iter().find(|f| f.overlaps(offset, len)) {
            let message = format!("field {} overlaps with {}", name, prev.name);
            self.warning(offset, len, message);
            return;
        }
        self.result.fields.push(DescField {
            name,
            offset,
            len,
            value,
            meaning: meaning.into(),
        });
    }

    /// Read a field and record it with the meaning `describe` gives it.
    pub(crate) fn decode_field(
        &mut self,
        name: &'static str,
        offset: u32,
        len: u32,
        describe: impl FnOnce(&mut Self, u32) -> String,
    ) -> u32 {
        let value = self.desc_bits(offset, len);
        let meaning = describe(self, value);
        self.add_field(name, offset, len, u64::from(value), meaning);
        value
    }

    pub(crate) fn decode_bit(&mut self, name: &'static str, offset: u32, zero: &str, one: &str) -> bool {
        let set = self.desc_bit(offset);
        self.add_field(name, offset, 1, u64::from(set), if set { one } else { zero });
        set
    }

    pub(crate) fn add_reserved(&mut self, offset: u32, len: u32) {
        let value = (self.bits >> offset) & ((1u64 << len) - 1);
        if value != 0 {
            self.warning(offset, len, "reserved bits are set");
        }
        self.add_field("Reserved", offset, len, value, "");
    }

    /// Look `offset..offset + len` up in `table`, reporting unknown encodings.
    pub(crate) fn lookup<'t, T>(
        &mut self,
        name: &'static str,
        offset: u32,
        len: u32,
        table: &'t [ValidValue<T>],
    ) -> Option<&'t ValidValue<T>> {
        let enc = self.desc_bits(offset, len);
        match table.iter().find(|v| v.encoding == enc) {
            Some(v) => {
                self.add_field(name, offset, len, u64::from(enc), v.description);
                Some(v)
            }
            None => {
                self.add_field(name, offset, len, u64::from(enc), "?");
                self.error(offset, len, format!("invalid {}", name));
                None
            }
        }
    }

    pub(crate) fn info(&mut self) -> &mut MessageInfo {
        &mut self.result.info
    }
    pub(crate) fn syntax(&mut self) -> &mut MessageSyntax {
        &mut self.result.syntax
    }
    pub(crate) fn result(&self) -> &DecodeResult {
        &self.result
    }

    /// Fill in a message with a fixed payload shape, lengths in registers.
    pub(crate) fn set_special_op(
        &mut self,
        op: SendOp,
        symbol: impl Into<String>,
        description: impl Into<String>,
        src0_regs: u32,
        dst_regs: u32,
    ) {
        let grf = self.grf_bytes();
        let info = &mut self.result.info;
        info.op = Some(op);
        info.symbol = symbol.into();
        info.description = description.into();
        info.exec_width.get_or_insert(1);
        info.src0_len_bytes = Some(src0_regs * grf);
        info.dst_len_bytes = Some(dst_regs * grf);
        info.src1_len_bytes = Some(0);
    }

    /// Derive payload sizes of load, store and atomic messages from the
    /// already decoded sizes.
    pub(crate) fn compute_payload_sizes(&mut self) {
        let grf = self.grf_bytes();
        let sfid = self.sfid();
        let src0_len = self.input.src0_len;
        let info = &self.result.info;
        let Some(op) = info.op else {
            return;
        };
        let block2d = matches!(op, SendOp::LoadBlock2d | SendOp::StoreBlock2d);
        let status = matches!(op, SendOp::LoadStatus | SendOp::LoadQuadStatus);

        let exec_width = match info.exec_width {
            Some(w) => w,
            None => {
                let w = if info.is_transposed() || block2d { 1 } else { 32 };
                self.warning(0, 6, format!("assuming ExecSize ({})", w));
                w
            }
        };
        let info = &mut self.result.info;
        info.exec_width = Some(exec_width);

        let data_bytes = if block2d {
            // the block shape lives in the payload header
            info.src0_len_bytes = Some(if sfid == Sfid::Tgm { 30 } else { 31 });
            None
        } else if status {
            info.src0_len_bytes = Some(info.addr_size_bits / 8 * exec_width.max(16));
            Some(2 * 64)
        } else if info.is_transposed() {
            info.src0_len_bytes = Some(info.addr_size_bits / 8);
            Some(info.elem_size_bits_reg * info.elems_per_addr / 8)
        } else {
            // SIMD4 and the like still occupy at least SIMD16 of addresses
            info.src0_len_bytes = Some(info.addr_size_bits / 8 * exec_width.max(16));
            let mut per_comp = info.elem_size_bits_reg * exec_width / 8;
            if per_comp < grf && info.elems_per_addr > 1 {
                per_comp = grf;
            }
            Some(per_comp * info.elems_per_addr)
        };

        if sfid == Sfid::Tgm {
            if let Some(regs) = src0_len.filter(|&regs| regs > 0) {
                info.src0_len_bytes = Some(regs * grf);
            }
        }

        match op.class() {
            SendOpClass::Load => {
                info.dst_len_bytes = data_bytes;
                info.src1_len_bytes = Some(0);
            }
            SendOpClass::Store => {
                info.dst_len_bytes = Some(0);
                info.src1_len_bytes = data_bytes;
            }
            SendOpClass::Atomic => {
                info.dst_len_bytes = data_bytes;
                info.src1_len_bytes = data_bytes.map(|b| b * op.atomic_args());
            }
            SendOpClass::Other => {}
        }
        if matches!(op, SendOp::AtomicAcadd | SendOp::AtomicAcsub | SendOp::AtomicAcstore) {
            // append counters take the data in src0 and no address
            info.src0_len_bytes = data_bytes;
            info.src1_len_bytes = Some(0);
        }
    }

    /// Warn when a computed payload size disagrees with the instruction.
    pub(crate) fn check_lengths(&mut self) {
        let src0 = (self.result.info.src0_len_bytes, self.input.src0_len);
        let src1 = (self.result.info.src1_len_bytes, self.input.src1_len);
        self.check_bytes_len("src0", src0.0, src0.1);
        self.check_bytes_len("src1", src1.0, src1.1);
    }

    fn check_bytes_len(&mut self, which: &str, bytes: Option<u32>, regs: Option<u32>) {
        if let (Some(bytes), Some(regs)) = (bytes, regs) {
            let grf = self.grf_bytes();
            let expected = (bytes + grf - 1) / grf;
            if expected != regs {
                self.warning(
                    0,
                    0,
                    format!(
                        "{} length mismatch: message implies {} registers, instruction has {}",
                        which, expected, regs
                    ),
                );
            }
        }
    }
}

/// A row in a descriptor encoding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidValue<T> {
    pub encoding: u32,
    pub value: T,
    pub symbol: &'static str,
    pub description: &'static str,
}

impl<T> ValidValue<T> {
    pub const fn new(encoding: u32, value: T, symbol: &'static str, description: &'static str) -> Self {
        Self {
            encoding,
            value,
            symbol,
            description,
        }
    }
}

pub(crate) fn fmt_hex_signed(value: i32) -> String {
    if value < 0 {
        format!("-{:#x}", value.unsigned_abs())
    } else {
        format!("{:#x}", value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn overlapping_fields_become_warnings() {
        let input = MessageInput::new(Platform::Xe3, Sfid::Ugm, 0, 0);
        let mut d = MessageDecoder::new(&input);
        d.add_field("A", 0, 6, 0, "");
        d.add_field("B", 4, 4, 0, "");
        d.add_field("C", 6, 2, 0, "");
        let result = d.finish();
        assert_eq!(result.fields.len(), 2);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn signed_desc_bits() {
        let input = MessageInput::new(Platform::Xe3, Sfid::Ugm, 0xF << 4, 0);
        let d = MessageDecoder::new(&input);
        assert_eq!(d.desc_bits(4, 4), 0xF);
        assert_eq!(d.desc_bits_signed(4, 4), -1);
        assert_eq!(d.desc_bits_signed(4, 5), 15);
    }

    #[test]
    fn indirect_descriptor() {
        let mut input = MessageInput::new(Platform::XeHpg, Sfid::Ugm, 0, 0);
        input.desc = SendDesc::Reg(RegRef::new(0, 2));
        let result = decode_message(&input);
        assert_eq!(result.errors.len(), 1);
        assert!(result.info.op.is_none());
    }

    #[test]
    fn unrouted_sfid_is_unsupported() {
        let input = MessageInput::new(Platform::Gen9, Sfid::Vme, 0x0200_0000, 0);
        let result = decode_message(&input);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].message, "unsupported SFID for this platform");
    }

    #[test]
    fn send_op_classes() {
        assert!(SendOp::LoadBlock2d.is_load());
        assert!(SendOp::StoreUncompressedQuad.is_store());
        assert!(SendOp::StoreUncompressedQuad.has_ch_mask());
        assert_eq!(SendOp::AtomicIcas.atomic_args(), 2);
        assert_eq!(SendOp::AtomicIinc.atomic_args(), 0);
        assert_eq!(SendOp::Fence.class(), SendOpClass::Other);
        assert!(SendOp::ATOMICS.iter().all(|op| op.is_atomic()));
    }
}
