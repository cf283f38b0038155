//! LSC messages with a 32-bit descriptor, XE_HPG through XE2.
//!
//! ```text
//! [5:0]   opcode
//! [8:7]   address size (a16, a32, a64)
//! [11:9]  data size
//! [14:12] vector size, [15] transpose; or [15:12] component enables
//! [19:17] cache control ([19:16] from XE2)
//! [24:20] response length
//! [30:29] address type (flat, bss, ss, bti)
//! ```
//!
//! The surface lives in the extended descriptor: a BTI in ExDesc[31:24], a
//! surface state offset in ExDesc[31:11].

use thiserror::Error;

use super::{
    cache::{self, CacheOpt},
    AddrType, Layout, MessageDecoder, MsgAttrs, SendOp, ValidValue,
};
use crate::ir::{Platform, SendDesc, Sfid};

static OPCODES: [ValidValue<SendOp>; 32] = [
    ValidValue::new(0x00, SendOp::Load, "load", "gathering load"),
    ValidValue::new(0x01, SendOp::LoadStrided, "load_block", "strided load (a.k.a load_block)"),
    ValidValue::new(0x02, SendOp::LoadQuad, "load_cmask", "quad load (a.k.a. load_cmask)"),
    ValidValue::new(0x03, SendOp::LoadBlock2d, "load_block2d", "block2d load"),
    ValidValue::new(0x04, SendOp::Store, "store", "scattering store"),
    ValidValue::new(0x05, SendOp::StoreStrided, "store_block", "strided store (a.k.a store_block)"),
    ValidValue::new(0x06, SendOp::StoreQuad, "store_cmask", "quad store (a.k.a. store_cmask)"),
    ValidValue::new(0x07, SendOp::StoreBlock2d, "store_block2d", "block2d store"),
    ValidValue::new(0x08, SendOp::AtomicIinc, "atomic_iinc", "atomic integer increment"),
    ValidValue::new(0x09, SendOp::AtomicIdec, "atomic_idec", "atomic integer decrement"),
    ValidValue::new(0x0A, SendOp::AtomicLoad, "atomic_load", "atomic load"),
    ValidValue::new(0x0B, SendOp::AtomicStore, "atomic_store", "atomic store"),
    ValidValue::new(0x0C, SendOp::AtomicIadd, "atomic_iadd", "atomic integer add"),
    ValidValue::new(0x0D, SendOp::AtomicIsub, "atomic_isub", "atomic integer subtract"),
    ValidValue::new(0x0E, SendOp::AtomicSmin, "atomic_smin", "atomic signed-integer minimum"),
    ValidValue::new(0x0F, SendOp::AtomicSmax, "atomic_smax", "atomic signed-integer maximum"),
    ValidValue::new(0x10, SendOp::AtomicUmin, "atomic_umin", "atomic unsigned-integer minimum"),
    ValidValue::new(0x11, SendOp::AtomicUmax, "atomic_umax", "atomic unsigned-integer maximum"),
    ValidValue::new(0x12, SendOp::AtomicIcas, "atomic_icas", "atomic integer compare and swap"),
    ValidValue::new(0x13, SendOp::AtomicFadd, "atomic_fadd", "atomic float add"),
    ValidValue::new(0x14, SendOp::AtomicFsub, "atomic_fsub", "atomic float subtract"),
    ValidValue::new(0x15, SendOp::AtomicFmin, "atomic_fmin", "atomic float minimum"),
    ValidValue::new(0x16, SendOp::AtomicFmax, "atomic_fmax", "atomic float maximum"),
    ValidValue::new(0x17, SendOp::AtomicFcas, "atomic_fcas", "atomic float compare and swap"),
    ValidValue::new(0x18, SendOp::AtomicAnd, "atomic_and", "atomic logical and"),
    ValidValue::new(0x19, SendOp::AtomicOr, "atomic_or", "atomic logical or"),
    ValidValue::new(0x1A, SendOp::AtomicXor, "atomic_xor", "atomic logical xor"),
    ValidValue::new(0x1B, SendOp::LoadStatus, "load_status", "load status"),
    ValidValue::new(0x1C, SendOp::StoreUncompressed, "store_uncompressed", "scattering store uncompressed"),
    ValidValue::new(0x1E, SendOp::ReadState, "read_state", "read state information"),
    ValidValue::new(0x1F, SendOp::Fence, "fence", "fence"),
    ValidValue::new(0x20, SendOp::StoreUncompressedQuad, "store_uncompressed_quad", "store quad uncompressed"),
];

const LSC_CCS: u32 = 0x1D;

const AT_FLAT: u32 = 0x0;
const AT_BSS: u32 = 0x1;
const AT_SS: u32 = 0x2;
const AT_BTI: u32 = 0x3;

/// Data sizes as `(memory bits, register bits, symbol)`.
static DATA_SIZES: [ValidValue<(u32, u32)>; 7] = [
    ValidValue::new(0x0, (8, 8), "d8", "8b per data element"),
    ValidValue::new(0x1, (16, 16), "d16", "16b per data element"),
    ValidValue::new(0x2, (32, 32), "d32", "32b per data element"),
    ValidValue::new(0x3, (64, 64), "d64", "64b per data element"),
    ValidValue::new(0x4, (8, 32), "d8u32", "load 8b into the low 8b of 32b register elements"),
    ValidValue::new(0x5, (16, 32), "d16u32", "load 16b into the low 16b of 32b register elements"),
    ValidValue::new(0x6, (16, 32), "d16u32h", "load 16b into the high half of 32b register elements"),
];

const D16U32H: u32 = 0x6;

static VECTOR_SIZES: [u32; 8] = [1, 2, 3, 4, 8, 16, 32, 64];

pub(super) fn decode(d: &mut MessageDecoder<'_>) {
    let mut lsc = LscDecoder::new(d);
    lsc.decode();
}

struct LscDecoder<'d, 'a> {
    d: &'d mut MessageDecoder<'a>,
    op: Option<SendOp>,
    data_type: String,
    vector: String,
    addr_size: String,
    cache_control: String,
    attrs: MsgAttrs,
    vector_size: u32,
}

impl<'d, 'a> LscDecoder<'d, 'a> {
    fn new(d: &'d mut MessageDecoder<'a>) -> Self {
        Self {
            d,
            op: None,
            data_type: String::new(),
            vector: String::new(),
            addr_size: String::new(),
            cache_control: String::new(),
            attrs: MsgAttrs::empty(),
            vector_size: 1,
        }
    }

    fn default_exec_size(&self) -> u32 {
        let simd = if self.d.platform() >= Platform::XeHpc { 32 } else { 16 };
        if self.d.sfid() == Sfid::Tgm {
            simd / 2
        } else {
            simd
        }
    }

    fn decode(&mut self) {
        let enc = self.d.desc_bits(0, 6);
        if enc == LSC_CCS {
            self.decode_ccs();
            return;
        }
        let Some(entry) = OPCODES.iter().find(|v| v.encoding == enc) else {
            self.d.add_field("Opcode", 0, 6, u64::from(enc), "invalid message opcode");
            self.d.error(0, 6, "unsupported message opcode");
            return;
        };
        match entry.value {
            SendOp::Fence => self.decode_fence(),
            SendOp::ReadState => self.decode_read_state(),
            SendOp::LoadStatus => {
                if self.d.desc_bit(15) {
                    self.d.error(15, 1, "transpose forbidden on load_status");
                }
                if self.d.desc_bits(20, 5) != 1 {
                    self.d.error(20, 5, "load_status must have rlen (Desc[24:20] == 1)");
                }
                self.decode_vector_message(entry);
            }
            op if op.is_atomic() => {
                if self.d.desc_bits(20, 5) != 0 {
                    self.attrs |= MsgAttrs::ATOMIC_RETURNS;
                }
                if self.d.sfid() == Sfid::Tgm {
                    self.attrs |= MsgAttrs::HAS_UVRLOD;
                }
                self.decode_vector_message(entry);
            }
            _ => self.decode_vector_message(entry),
        }
        self.d.check_lengths();
    }

    fn decode_vector_message(&mut self, entry: &ValidValue<SendOp>) {
        let op = entry.value;
        self.op = Some(op);
        if self.d.sfid() == Sfid::Tgm && matches!(op, SendOp::LoadQuad | SendOp::StoreQuad | SendOp::StoreUncompressedQuad) {
            self.attrs |= MsgAttrs::HAS_UVRLOD;
        }
        self.d.add_field("Opcode", 0, 6, u64::from(entry.encoding), entry.symbol);
        // payload sizes come from the descriptor, so the low extended bits are reserved
        if let SendDesc::Imm(ex_desc) = self.d.ex_desc() {
            if ex_desc & 0x7FF != 0 {
                self.d.error(32, 12, "ExDesc[11:0] must be 0 on this platform");
            }
        }

        let (surface, addr_type) = self.decode_addr_type(true);
        let block2d = matches!(op, SendOp::LoadBlock2d | SendOp::StoreBlock2d);
        let addr_size_bits = if block2d {
            self.addr_size = "a64".to_string();
            64
        } else {
            self.decode_addr_size()
        };
        let (mem_bits, reg_bits) = self.decode_data_size();

        let mut exec_width = self.d.info().exec_width;
        if block2d && exec_width.is_none() {
            exec_width = Some(1);
        }
        if op.has_ch_mask() {
            self.decode_vector_size_quad();
        } else {
            self.decode_vector_size(op, &mut exec_width);
        }

        match self.d.sfid() {
            Sfid::Tgm => self.attrs |= MsgAttrs::TYPED,
            Sfid::Slm => self.attrs |= MsgAttrs::SLM,
            _ => {}
        }

        let (l1, l3) = if self.d.sfid() == Sfid::Slm {
            (CacheOpt::Default, CacheOpt::Default)
        } else {
            self.decode_cache_control(op)
        };

        let sfid = self.d.sfid().name();
        let syntax = self.d.syntax();
        syntax.mnemonic = entry.symbol.to_string();
        syntax.layout = match op.class() {
            super::SendOpClass::Load => Layout::Load,
            super::SendOpClass::Store => Layout::Store,
            super::SendOpClass::Atomic => Layout::Atomic,
            super::SendOpClass::Other => Layout::Control,
        };
        syntax.controls = format!(".{}.{}{}", sfid, self.data_type, self.vector);
        if !self.addr_size.is_empty() {
            syntax.controls.push('.');
            syntax.controls.push_str(&self.addr_size);
        }
        syntax.controls.push_str(&self.cache_control);

        let ch_mask = self.d.desc_bits(12, 4);
        let default_exec = self.default_exec_size();
        let info = self.d.info();
        info.op = Some(op);
        info.attrs |= self.attrs;
        info.addr_type = addr_type;
        info.surface = surface;
        info.addr_size_bits = addr_size_bits;
        info.elem_size_bits_mem = mem_bits;
        info.elem_size_bits_reg = reg_bits;
        info.elems_per_addr = self.vector_size;
        info.caching_l1 = l1;
        info.caching_l3 = l3;
        info.exec_width = exec_width.or(Some(default_exec));
        info.description = entry.description.to_string();
        if op.has_ch_mask() {
            info.channels_enabled = ch_mask;
        }
        self.d.compute_payload_sizes();
        let sym = self.d.syntax().sym();
        self.d.info().symbol = sym;

        if op.has_ch_mask() && ch_mask == 0 {
            self.d.error(12, 4, "no channels enabled on quad message");
        }
    }

    fn decode_addr_type(&mut self, allows_flat: bool) -> (Option<SendDesc>, AddrType) {
        let at = self.d.desc_bits(29, 2);
        let ex_desc = self.d.ex_desc();
        let (meaning, addr_type, surface, syntax) = match at {
            AT_FLAT => {
                if !allows_flat {
                    self.d.error(29, 2, "this message may not use FLAT address type");
                }
                ("Flat", AddrType::Flat, None, String::new())
            }
            AT_BSS | AT_SS => {
                let (name, addr_type) = if at == AT_BSS {
                    ("BSS", AddrType::Bss)
                } else {
                    ("SS", AddrType::Ss)
                };
                match ex_desc {
                    SendDesc::Imm(_) => {
                        let offset = self.d.desc_bits(32 + 11, 21) << 11;
                        self.d.add_field("SurfaceStateOffset", 32 + 11, 21, u64::from(offset), "immediate surface state offset");
                        (name, addr_type, Some(SendDesc::Imm(offset)), format!("{}[{:#x}]", name.to_lowercase(), offset))
                    }
                    SendDesc::Reg(reg) => (
                        name,
                        addr_type,
                        Some(ex_desc),
                        format!("{}[a0.{}]", name.to_lowercase(), reg.sub_reg_num),
                    ),
                }
            }
            _ => match ex_desc {
                SendDesc::Imm(_) => {
                    let bti = self.d.decode_field("BTI", 32 + 24, 8, |_, bti| format!("bti[{}]", bti));
                    ("BTI", AddrType::Bti, Some(SendDesc::Imm(bti)), format!("bti[{}]", bti))
                }
                SendDesc::Reg(reg) => ("BTI", AddrType::Bti, Some(ex_desc), format!("bti[a0.{}]", reg.sub_reg_num)),
            },
        };
        self.d.syntax().surface = syntax;
        self.d.add_field("AddrType", 29, 2, u64::from(at), meaning);
        (surface, addr_type)
    }

    fn decode_addr_size(&mut self) -> u32 {
        let enc = self.d.desc_bits(7, 2);
        let (bits, meaning) = match enc {
            1 => (16, "addresses are 16b"),
            2 => (32, "addresses are 32b"),
            3 => (64, "addresses are 64b"),
            _ => {
                self.d.error(7, 2, "invalid address size");
                (0, "address size is invalid")
            }
        };
        self.addr_size = if bits == 0 { "a???".to_string() } else { format!("a{}", bits) };
        self.d.add_field("AddrSize", 7, 2, u64::from(enc), meaning);
        bits
    }

    fn decode_data_size(&mut self) -> (u32, u32) {
        match self.d.lookup("DataSize", 9, 3, &DATA_SIZES) {
            Some(v) => {
                if v.encoding == D16U32H {
                    self.attrs |= MsgAttrs::EXPAND_HIGH;
                }
                self.data_type = v.symbol.to_string();
                v.value
            }
            None => {
                self.data_type = format!("{:#X}", self.d.desc_bits(9, 3));
                (0, 0)
            }
        }
    }

    fn decode_vector_size(&mut self, op: SendOp, exec_width: &mut Option<u32>) {
        let block2d = matches!(op, SendOp::LoadBlock2d | SendOp::StoreBlock2d);
        let enc = self.d.desc_bits(12, 3);
        self.vector_size = VECTOR_SIZES[enc as usize];
        let transposed = self.d.decode_bit(
            "DataOrder",
            15,
            "non-transposed (vector elements are in successive registers)",
            "transposed (vector elements are in the same register)",
        );
        let mut sym = String::new();
        if self.vector_size > 1 || (transposed && !block2d) {
            sym = format!("x{}", self.vector_size);
        }
        if !block2d {
            let plural = if self.vector_size == 1 { "" } else { "s" };
            let meaning = format!("each address accesses {} element{}", self.vector_size, plural);
            self.d.add_field("VecSize", 12, 3, u64::from(enc), meaning);
        }
        if transposed {
            sym.push('t');
            self.attrs |= MsgAttrs::TRANSPOSED;
            *exec_width = Some(1);
        }
        if op == SendOp::LoadBlock2d && self.d.decode_bit("Block2dVnniTransform", 7, "disabled", "enabled") {
            sym.push('v');
        }
        self.vector = sym;
    }

    /// Component enables, the inverse of the legacy channel mask.
    fn decode_vector_size_quad(&mut self) {
        let ch_en = self.d.desc_bits(12, 4);
        self.vector_size = ch_en.count_ones();
        self.attrs |= MsgAttrs::HAS_CHMASK;
        let mut sym = ".".to_string();
        for (i, c) in "xyzw".chars().enumerate() {
            if ch_en & (1 << i) != 0 {
                sym.push(c);
            }
        }
        self.d.add_field("CompEn", 12, 4, u64::from(ch_en), sym.clone());
        self.vector = sym;
    }

    fn decode_cache_control(&mut self, op: SendOp) -> (CacheOpt, CacheOpt) {
        let platform = self.d.platform();
        let (off, len) = cache::field(platform);
        let enc = self.d.desc_bits(off, len);
        let Some(table) = cache::table(platform, op) else {
            return (CacheOpt::Default, CacheOpt::Default);
        };
        match cache::lookup(table, enc) {
            Some(cc) => {
                self.cache_control = cc.symbol();
                self.d.add_field("Caching", off, len, u64::from(enc), cc.description());
                (cc.l1, cc.l3)
            }
            None => {
                self.cache_control = ".?".to_string();
                self.d.add_field("Caching", off, len, u64::from(enc), "invalid");
                self.d.error(off, len, "invalid cache options");
                (CacheOpt::Default, CacheOpt::Default)
            }
        }
    }

    fn decode_ccs(&mut self) {
        self.d.add_field("Opcode", 0, 6, u64::from(LSC_CCS), "compression-state control");
        let sop = self.d.desc_bits(17, 3);
        let (op, suffix, meaning) = match sop {
            0 => (Some(SendOp::CcsPc), "_pc", "page clear (64k)"),
            1 => (Some(SendOp::CcsSc), "_sc", "sector clear (2-cachelines)"),
            2 => (Some(SendOp::CcsPu), "_pu", "page uncompress (64k)"),
            3 => (Some(SendOp::CcsSu), "_su", "sector uncompress (2-cachelines)"),
            _ => (None, "", "invalid ccs sop"),
        };
        self.d.add_field("CcsOp", 17, 3, u64::from(sop), meaning);
        let Some(op) = op else {
            self.d.syntax().controls = format!(".{:#X}", sop);
            self.d.error(17, 3, "invalid ccs sop");
            return;
        };
        let sfid = self.d.sfid().name();
        let syntax = self.d.syntax();
        syntax.mnemonic = format!("ccs{}", suffix);
        syntax.controls = format!(".{}", sfid);
        syntax.layout = Layout::Control;

        let (surface, addr_type) = self.decode_addr_type(true);
        let addr_size_bits = self.decode_addr_size();
        let page = matches!(op, SendOp::CcsPc | SendOp::CcsPu);
        if page {
            if addr_type != AddrType::Flat {
                self.d.error(29, 2, "ccs_{pc,pu} requires FLAT address type");
            }
            if addr_size_bits != 64 {
                self.d.error(7, 2, "AddrSize must be A64");
            }
            let sym = self.d.syntax().sym();
            self.d.set_special_op(op, sym, format!("compression-state control {}", meaning), 1, 0);
        } else {
            let controls = if addr_size_bits == 64 { ".a64" } else { ".a32" };
            self.d.syntax().controls.push_str(controls);
            let sym = self.d.syntax().sym();
            let default_exec = self.default_exec_size();
            let grf = self.d.grf_bytes();
            let info = self.d.info();
            info.op = Some(op);
            info.symbol = sym;
            info.description = format!("compression-state control {}", meaning);
            info.exec_width.get_or_insert(default_exec);
            info.addr_size_bits = addr_size_bits;
            info.dst_len_bytes = Some(0);
            info.src1_len_bytes = Some(0);
            let lanes = info.exec_width.unwrap_or(default_exec).max(16);
            info.src0_len_bytes = Some((addr_size_bits / 8 * lanes).max(grf));
        }
        let info = self.d.info();
        info.addr_type = addr_type;
        info.surface = surface;
        info.addr_size_bits = addr_size_bits;
        self.d.check_lengths();
    }

    fn decode_fence(&mut self) {
        self.d.add_field("Opcode", 0, 6, 0x1F, "fence");
        self.d.syntax().mnemonic = "fence".to_string();
        self.d.syntax().layout = Layout::Control;

        let scope = self.d.desc_bits(9, 3);
        let scope_sym = match scope {
            0 => "group",
            1 => "local",
            2 => "tile",
            3 => "gpu",
            4 => "gpus",
            5 => "sysrel",
            6 => "sysacq",
            _ => {
                self.d.error(9, 3, "invalid fence scope");
                "?"
            }
        };
        self.d.add_field("FenceScope", 9, 3, u64::from(scope), scope_sym);

        let flush = self.d.desc_bits(12, 3);
        let flush_sym = match flush {
            0 => "none",
            1 => "evict",
            2 => "invalidate",
            3 => "discard",
            4 => "clean",
            5 => "flushl3",
            _ => {
                self.d.error(12, 3, "invalid flush op");
                "?"
            }
        };
        self.d.add_field("FlushOp", 12, 3, u64::from(flush), flush_sym);

        let sfid = self.d.sfid().name();
        self.d.syntax().controls = format!(".{}.{}.{}", sfid, flush_sym, scope_sym);
        let sym = self.d.syntax().sym();
        self.d.set_special_op(SendOp::Fence, sym, "fence", 1, 0);
    }

    fn decode_read_state(&mut self) {
        self.d.add_field("Opcode", 0, 6, 0x1E, "read_state");
        let sfid = self.d.sfid().name();
        let syntax = self.d.syntax();
        syntax.mnemonic = "read_state".to_string();
        syntax.controls = format!(".{}", sfid);
        syntax.layout = Layout::Load;
        let (surface, addr_type) = self.decode_addr_type(false);
        // XE_HPG returns two registers, later parts one
        let rlen = if self.d.platform() == Platform::XeHpg { 2 } else { 1 };
        let sym = self.d.syntax().sym();
        self.d.set_special_op(SendOp::ReadState, sym, "read state information", 1, rlen);
        let info = self.d.info();
        info.addr_type = addr_type;
        info.surface = surface;
        info.addr_size_bits = 64;
        info.exec_width = Some(1);
        info.attrs |= MsgAttrs::HAS_UVRLOD | MsgAttrs::TRANSPOSED;
    }
}

/// A load, store or atomic to describe with [encode_descriptors].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorMessageArgs {
    pub sfid: Sfid,
    pub op: SendOp,
    pub caching_l1: CacheOpt,
    pub caching_l3: CacheOpt,
    pub addr_type: AddrType,
    /// BTI, surface state offset or an `a0` register
    pub addr_surface: SendDesc,
    pub addr_size: u32,
    pub addr_scale: u32,
    pub addr_offset: i32,
    pub data_size_reg: u32,
    pub data_size_mem: u32,
    pub data_expand_high: bool,
    pub data_vector_size: u32,
    pub data_transpose: bool,
    pub data_vnni: bool,
    /// x is bit 0
    pub data_component_mask: u32,
}

impl VectorMessageArgs {
    pub fn new(sfid: Sfid, op: SendOp) -> Self {
        Self {
            sfid,
            op,
            caching_l1: CacheOpt::Default,
            caching_l3: CacheOpt::Default,
            addr_type: AddrType::Flat,
            addr_surface: SendDesc::Imm(0),
            addr_size: 64,
            addr_scale: 1,
            addr_offset: 0,
            data_size_reg: 32,
            data_size_mem: 32,
            data_expand_high: false,
            data_vector_size: 1,
            data_transpose: false,
            data_vnni: false,
            data_component_mask: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescEncodeError {
    #[error("unsupported message for SFID")]
    UnsupportedSfid,
    #[error("unsupported op")]
    UnsupportedOp,
    #[error("invalid data size")]
    InvalidDataSize,
    #[error("invalid vector size")]
    InvalidVectorSize,
    #[error("invalid component mask")]
    InvalidComponentMask,
    #[error("{0}")]
    InvalidDataOrder(&'static str),
    #[error("atomic L1 must be an uncached option")]
    AtomicL1Cached,
    #[error("invalid cache-control combination")]
    InvalidCacheControl,
    #[error("unsupported address size")]
    UnsupportedAddrSize,
    #[error("{0}")]
    InvalidAddrType(&'static str),
    #[error("address scaling not supported on this platform")]
    AddrScaling,
    #[error("address immediate offset not supported on this platform")]
    AddrOffset,
    #[error("surface index too large for BTI")]
    SurfaceTooLarge,
    #[error("BSS/SS with immediate descriptor require ExDesc[11:0] to be 0")]
    UnalignedSurface,
}

/// Build `(ex_desc, desc)` for a load, store or atomic on XE_HPG through XE2.
pub fn encode_descriptors(platform: Platform, vma: &VectorMessageArgs) -> Result<(SendDesc, SendDesc), DescEncodeError> {
    if !matches!(vma.sfid, Sfid::Ugm | Sfid::Ugml | Sfid::Slm | Sfid::Tgm | Sfid::Urb) || platform < Platform::XeHpg {
        return Err(DescEncodeError::UnsupportedSfid);
    }
    let op = OPCODES
        .iter()
        .find(|v| v.value == vma.op && (vma.op.is_load() || vma.op.is_store() || vma.op.is_atomic()))
        .filter(|v| !matches!(v.value, SendOp::ReadState | SendOp::LoadStatus))
        .ok_or(DescEncodeError::UnsupportedOp)?;
    let mut desc = op.encoding;

    let block2d = matches!(vma.op, SendOp::LoadBlock2d | SendOp::StoreBlock2d);
    let typed_block2d = block2d && vma.sfid == Sfid::Tgm;

    let data_size = match (vma.data_size_mem, vma.data_size_reg, vma.data_expand_high) {
        (8, 8, _) => 0x0,
        (16, 16, _) => 0x1,
        (32, 32, _) => 0x2,
        (64, 64, _) => 0x3,
        (8, 32, _) => 0x4,
        (16, 32, false) => 0x5,
        (16, 32, true) => D16U32H,
        _ => return Err(DescEncodeError::InvalidDataSize),
    };
    if typed_block2d && data_size != 0x2 {
        return Err(DescEncodeError::InvalidDataSize);
    }
    if !typed_block2d {
        desc |= data_size << 9;
    }

    if vma.op.has_ch_mask() {
        if vma.data_component_mask & !0xF != 0 {
            return Err(DescEncodeError::InvalidComponentMask);
        }
        desc |= vma.data_component_mask << 12;
    } else if block2d {
        if typed_block2d && vma.data_vnni {
            return Err(DescEncodeError::InvalidDataOrder("block2d.tgm forbids VNNI"));
        }
        if typed_block2d && vma.data_transpose {
            return Err(DescEncodeError::InvalidDataOrder("block2d.tgm forbids transpose data order"));
        }
        if vma.data_vnni {
            desc |= 1 << 7;
        }
        if vma.data_transpose {
            desc |= 1 << 15;
        }
    } else {
        let vec = VECTOR_SIZES
            .iter()
            .position(|&n| n == vma.data_vector_size)
            .ok_or(DescEncodeError::InvalidVectorSize)? as u32;
        if vma.op.is_atomic() && vma.data_vector_size != 1 {
            return Err(DescEncodeError::InvalidVectorSize);
        }
        if vma.data_vnni {
            return Err(DescEncodeError::InvalidDataOrder("vnni only valid on block2d operations"));
        }
        desc |= vec << 12;
        if vma.data_transpose {
            if vma.op.is_atomic() {
                return Err(DescEncodeError::InvalidDataOrder("atomics do not support transpose operations"));
            }
            desc |= 1 << 15;
        }
    }

    if vma.op.is_atomic() && !matches!(vma.caching_l1, CacheOpt::Default | CacheOpt::Uncached) {
        return Err(DescEncodeError::AtomicL1Cached);
    }
    let cc = cache::encode(platform, vma.op, vma.caching_l1, vma.caching_l3)
        .ok_or(DescEncodeError::InvalidCacheControl)?;
    desc |= cc << cache::field(platform).0;

    let addr_size = match vma.addr_size {
        16 => 1,
        32 => 2,
        64 => 3,
        _ => return Err(DescEncodeError::UnsupportedAddrSize),
    };
    if typed_block2d && vma.addr_size != 32 {
        return Err(DescEncodeError::InvalidAddrType("block2d.typed address size must be A32"));
    }
    if block2d && !typed_block2d && vma.addr_size != 64 {
        return Err(DescEncodeError::InvalidAddrType("block2d untyped address size must be A64"));
    }
    if !block2d {
        desc |= addr_size << 7;
    }

    let at = match vma.addr_type {
        AddrType::Flat => AT_FLAT,
        AddrType::Bss => AT_BSS,
        AddrType::Ss => AT_SS,
        AddrType::Bti => AT_BTI,
        AddrType::Surf => return Err(DescEncodeError::InvalidAddrType("unsupported address type")),
    };
    if typed_block2d && vma.addr_type == AddrType::Flat {
        return Err(DescEncodeError::InvalidAddrType("block2d.typed forbids flat address"));
    }
    if vma.addr_type != AddrType::Flat && vma.sfid == Sfid::Slm {
        return Err(DescEncodeError::InvalidAddrType("SLM requires flat address type"));
    }
    desc |= at << 29;

    if vma.addr_scale != 1 {
        return Err(DescEncodeError::AddrScaling);
    }
    if vma.addr_offset != 0 {
        return Err(DescEncodeError::AddrOffset);
    }

    let ex_desc = match (vma.addr_type, vma.addr_surface) {
        (AddrType::Flat, SendDesc::Imm(0)) => SendDesc::Imm(0),
        (AddrType::Flat, _) => {
            return Err(DescEncodeError::InvalidAddrType("flat address model must have surface = 0"))
        }
        (AddrType::Bti, SendDesc::Imm(bti)) => {
            if bti > 0xFF {
                return Err(DescEncodeError::SurfaceTooLarge);
            }
            SendDesc::Imm(bti << 24)
        }
        (_, SendDesc::Imm(offset)) if offset & 0xFFF != 0 => return Err(DescEncodeError::UnalignedSurface),
        (_, surface) => surface,
    };
    Ok((ex_desc, SendDesc::Imm(desc)))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        ir::ExecSize,
        messages::{decode_message, MessageInput},
    };

    fn decode(platform: Platform, sfid: Sfid, desc: u32, ex_desc: u32) -> crate::messages::DecodeResult {
        decode_message(&MessageInput::new(platform, sfid, desc, ex_desc).exec_size(ExecSize::Simd16))
    }

    #[test]
    fn flat_load() {
        // load.ugm.d32.a64.ca.ca
        let desc = (3 << 7) | (2 << 9) | (4 << 17);
        let r = decode(Platform::XeHpg, Sfid::Ugm, desc, 0);
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!(r.info.op, Some(SendOp::Load));
        assert_eq!(r.info.addr_type, AddrType::Flat);
        assert_eq!(r.info.addr_size_bits, 64);
        assert_eq!(r.info.caching_l1, CacheOpt::Cached);
        assert_eq!(r.info.src0_len_bytes, Some(8 * 16));
        assert_eq!(r.info.dst_len_bytes, Some(4 * 16));
        assert_eq!(r.syntax.controls, ".ugm.d32.a64.ca.ca");
    }

    #[test]
    fn bti_store_surface() {
        let desc = 0x04 | (2 << 7) | (2 << 9) | (AT_BTI << 29);
        let r = decode(Platform::XeHpc, Sfid::Ugm, desc, 5 << 24);
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!(r.info.op, Some(SendOp::Store));
        assert_eq!(r.info.surface, Some(SendDesc::Imm(5)));
        assert_eq!(r.syntax.surface, "bti[5]");
    }

    #[test]
    fn quad_without_channels() {
        let desc = 0x02 | (2 << 7) | (2 << 9);
        let r = decode(Platform::XeHpg, Sfid::Ugm, desc, 0);
        assert_eq!(r.errors.len(), 1);
        assert_eq!(r.errors[0].offset, 12);
    }

    #[test]
    fn invalid_opcode() {
        let r = decode(Platform::XeHpg, Sfid::Ugm, 0x3F, 0);
        assert_eq!(r.errors.len(), 1);
        assert_eq!(r.fields.len(), 1);
    }

    #[test]
    fn fence_syntax() {
        let desc = 0x1F | (3 << 9) | (1 << 12);
        let r = decode(Platform::XeHpg, Sfid::Ugm, desc, 0);
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!(r.info.op, Some(SendOp::Fence));
        assert_eq!(r.info.symbol, "fence.ugm.evict.gpu");
    }

    #[test]
    fn encode_then_decode() {
        let mut vma = VectorMessageArgs::new(Sfid::Ugm, SendOp::Load);
        vma.caching_l1 = CacheOpt::Uncached;
        vma.caching_l3 = CacheOpt::Cached;
        vma.data_vector_size = 4;
        let (ex_desc, desc) = encode_descriptors(Platform::XeHpg, &vma).unwrap();
        let (SendDesc::Imm(desc), SendDesc::Imm(ex_desc)) = (desc, ex_desc) else {
            panic!("expected immediates");
        };
        let r = decode(Platform::XeHpg, Sfid::Ugm, desc, ex_desc);
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!(r.info.elems_per_addr, 4);
        assert_eq!(r.info.caching_l1, CacheOpt::Uncached);
        assert_eq!(r.info.caching_l3, CacheOpt::Cached);
    }

    #[test]
    fn encode_rejects() {
        let mut vma = VectorMessageArgs::new(Sfid::Slm, SendOp::Store);
        vma.addr_type = AddrType::Bti;
        vma.addr_surface = SendDesc::Imm(1);
        assert!(matches!(
            encode_descriptors(Platform::XeHpg, &vma),
            Err(DescEncodeError::InvalidAddrType(_))
        ));
        let vma = VectorMessageArgs::new(Sfid::Ugm, SendOp::Fence);
        assert_eq!(encode_descriptors(Platform::XeHpg, &vma), Err(DescEncodeError::UnsupportedOp));
        let vma = VectorMessageArgs::new(Sfid::Ugm, SendOp::Load);
        assert_eq!(encode_descriptors(Platform::Gen9, &vma), Err(DescEncodeError::UnsupportedSfid));
    }
}
