//! LSC messages with a 64-bit descriptor, XE3 and later.
//!
//! The address type at Desc[15:14] decides the rest of the layout: stateful
//! messages carry a surface state index at [26:22] and the immediate offset
//! shrinks to [43:27]. TGM messages have a layout of their own.

use super::{
    cache, fmt_hex_signed, AddrType, Layout, MessageDecoder, MsgAttrs, SendOp, ValidValue,
};
use crate::ir::{SendDesc, Sfid};

static OPCODES: [ValidValue<SendOp>; 36] = [
    ValidValue::new(0x00, SendOp::Load, "load", "load vector"),
    ValidValue::new(0x02, SendOp::LoadQuad, "load_quad", "load quad (load_cmask)"),
    ValidValue::new(0x03, SendOp::LoadBlock2d, "load_block2d", "load 2d block array"),
    ValidValue::new(0x04, SendOp::Store, "store", "store vector"),
    ValidValue::new(0x06, SendOp::StoreQuad, "store_quad", "store quad (store_cmask)"),
    ValidValue::new(0x07, SendOp::StoreBlock2d, "store_block2d", "store 2d block"),
    ValidValue::new(0x08, SendOp::AtomicIinc, "atomic_iinc", "atomic integer increment"),
    ValidValue::new(0x09, SendOp::AtomicIdec, "atomic_idec", "atomic integer decrement"),
    ValidValue::new(0x0A, SendOp::AtomicLoad, "atomic_load", "atomic load"),
    ValidValue::new(0x0B, SendOp::AtomicStore, "atomic_store", "atomic store (exchange)"),
    ValidValue::new(0x0C, SendOp::AtomicIadd, "atomic_iadd", "atomic integer add"),
    ValidValue::new(0x0D, SendOp::AtomicIsub, "atomic_isub", "atomic integer subtract"),
    ValidValue::new(0x0E, SendOp::AtomicSmin, "atomic_smin", "atomic signed integer minimum"),
    ValidValue::new(0x0F, SendOp::AtomicSmax, "atomic_smax", "atomic signed integer maximum"),
    ValidValue::new(0x10, SendOp::AtomicUmin, "atomic_umin", "atomic unsigned integer minimum"),
    ValidValue::new(0x11, SendOp::AtomicUmax, "atomic_umax", "atomic unsigned integer maximum"),
    ValidValue::new(0x12, SendOp::AtomicIcas, "atomic_icas", "atomic integer compare and swap"),
    ValidValue::new(0x13, SendOp::AtomicFadd, "atomic_fadd", "atomic float add"),
    ValidValue::new(0x14, SendOp::AtomicFsub, "atomic_fsub", "atomic float subtract"),
    ValidValue::new(0x15, SendOp::AtomicFmin, "atomic_fmin", "atomic float min"),
    ValidValue::new(0x16, SendOp::AtomicFmax, "atomic_fmax", "atomic float max"),
    ValidValue::new(0x17, SendOp::AtomicFcas, "atomic_fcas", "atomic float compare and swap"),
    ValidValue::new(0x18, SendOp::AtomicAnd, "atomic_and", "atomic and"),
    ValidValue::new(0x19, SendOp::AtomicOr, "atomic_or", "atomic or"),
    ValidValue::new(0x1A, SendOp::AtomicXor, "atomic_xor", "atomic xor"),
    ValidValue::new(0x1B, SendOp::LoadStatus, "load_status", "load status"),
    ValidValue::new(0x1C, SendOp::LoadQuadStatus, "load_quad_status", "load quad status"),
    ValidValue::new(0x1E, SendOp::ReadState, "read_state", "read surface state info"),
    ValidValue::new(0x1F, SendOp::Fence, "fence", "memory fence"),
    ValidValue::new(0x28, SendOp::AtomicAcadd, "atomic_acadd", "atomic append counter add"),
    ValidValue::new(0x29, SendOp::AtomicAcsub, "atomic_acsub", "atomic append counter subtract"),
    ValidValue::new(0x2A, SendOp::AtomicAcstore, "atomic_acstore", "atomic append counter store"),
    ValidValue::new(0x2D, SendOp::GetWatchpoint, "get_watchpoint", "get watchpoint"),
    ValidValue::new(0x2E, SendOp::SetWatchpoint, "set_watchpoint", "set watchpoint"),
    ValidValue::new(0x31, SendOp::LoadQuadMsrt, "load_quad_msrt", "load quad from multi-sample render target"),
    ValidValue::new(0x32, SendOp::StoreQuadMsrt, "store_quad_msrt", "store quad to multi-sample render target"),
];

/// `extended_cache_control` has no payload shape worth a [SendOp] class and
/// is matched separately.
const EXTENDED_CACHE_CTRL: u32 = 0x33;

static VECTOR_SIZES: [ValidValue<u32>; 8] = [
    ValidValue::new(0x0, 1, "x1", "access 1 element per address"),
    ValidValue::new(0x1, 2, "x2", "access 2 elements per address"),
    ValidValue::new(0x2, 3, "x3", "access 3 elements per address"),
    ValidValue::new(0x3, 4, "x4", "access 4 elements per address"),
    ValidValue::new(0x4, 8, "x8", "access 8 elements per address"),
    ValidValue::new(0x5, 16, "x16", "access 16 elements per address"),
    ValidValue::new(0x6, 32, "x32", "access 32 elements per address"),
    ValidValue::new(0x7, 64, "x64", "access 64 elements per address"),
];

/// `(memory bits, register bits)`
static DATA_SIZES: [ValidValue<(u32, u32)>; 6] = [
    ValidValue::new(0x0, (8, 8), ".d8", "8b"),
    ValidValue::new(0x1, (16, 16), ".d16", "16b"),
    ValidValue::new(0x2, (32, 32), ".d32", "32b"),
    ValidValue::new(0x3, (64, 64), ".d64", "64b"),
    ValidValue::new(0x4, (8, 32), ".d8u32", "8b zero-extended/truncated to 32b in GRF"),
    ValidValue::new(0x5, (16, 32), ".d16u32", "16b zero-extended/truncated to 32b in GRF"),
];

static SURFACE_TYPE_HINTS: [ValidValue<()>; 5] = [
    ValidValue::new(0x0, (), "1d", "1D surface"),
    ValidValue::new(0x1, (), "2d", "2D surface"),
    ValidValue::new(0x2, (), "3d", "3D surface"),
    ValidValue::new(0x3, (), "cube", "cube surface"),
    ValidValue::new(0x4, (), "buffer", "buffer surface"),
];

const FLAT_A64_A32U: u32 = 0;
const FLAT_A64_A32S: u32 = 1;
const FLAT_A64_A64: u32 = 2;
const STATEFUL_A32: u32 = 3;

pub(super) fn decode(d: &mut MessageDecoder<'_>) {
    let mut e64 = E64Decoder::new(d);
    e64.decode();
    if e64.d.result().errors.is_empty() {
        e64.d.check_lengths();
    }
}

struct E64Decoder<'d, 'a> {
    d: &'d mut MessageDecoder<'a>,
    data_type: String,
    vector: String,
    addr_size: String,
    cache_control: String,
    overfetch: &'static str,
    ecc_op: &'static str,
    ecc_size: &'static str,
    ss_idx: Option<u32>,
}

impl<'d, 'a> E64Decoder<'d, 'a> {
    fn new(d: &'d mut MessageDecoder<'a>) -> Self {
        Self {
            d,
            data_type: String::new(),
            vector: String::new(),
            addr_size: String::new(),
            cache_control: String::new(),
            overfetch: "",
            ecc_op: "",
            ecc_size: "",
            ss_idx: None,
        }
    }

    fn decode(&mut self) {
        let enc = self.d.desc_bits(0, 6);
        let (op, symbol, description) = if enc == EXTENDED_CACHE_CTRL {
            self.d.add_field("Opcode", 0, 6, u64::from(enc), "extended cache control");
            (SendOp::ExtendedCacheCtrl, "extended_cache_control", "extended cache control")
        } else {
            match self.d.lookup("Opcode", 0, 6, &OPCODES) {
                Some(v) => (v.value, v.symbol, v.description),
                None => {
                    self.d.add_reserved(6, 1);
                    return;
                }
            }
        };
        self.d.add_reserved(6, 1);

        let sfid = self.d.sfid();
        self.d.info().op = Some(op);
        let syntax = self.d.syntax();
        syntax.mnemonic = symbol.to_string();
        syntax.controls = format!(".{}", sfid.name());
        syntax.layout = match op.class() {
            super::SendOpClass::Load => Layout::Load,
            super::SendOpClass::Store => Layout::Store,
            super::SendOpClass::Atomic => Layout::Atomic,
            super::SendOpClass::Other => Layout::Control,
        };
        if op.has_ch_mask() {
            self.d.info().attrs |= MsgAttrs::HAS_CHMASK;
        }
        if self.d.input.ind1.is_some() {
            self.d.error(0, 6, "IND1 is forbidden on this message");
        }

        if sfid == Sfid::Tgm {
            self.d.info().attrs |= MsgAttrs::TYPED;
            self.decode_typed(op);
        } else {
            self.decode_untyped(op);
        }

        let controls = [
            self.data_type.as_str(),
            self.vector.as_str(),
            self.addr_size.as_str(),
            self.overfetch,
            self.cache_control.as_str(),
            self.ecc_op,
            self.ecc_size,
        ]
        .concat();
        self.d.syntax().controls.push_str(&controls);
        self.d.syntax().surface = self.surface_syntax();

        let sym = self.symbol_from_syntax();
        let info = self.d.info();
        info.symbol = sym;
        info.description = description.to_string();
    }

    fn decode_untyped(&mut self, op: SendOp) {
        if self.d.sfid() == Sfid::Slm {
            self.d.info().attrs |= MsgAttrs::SLM;
        }
        let mut stateful = false;
        if !matches!(op, SendOp::Fence | SendOp::ExtendedCacheCtrl) {
            self.decode_addr_type_size();
            stateful = self.d.info().addr_type == AddrType::Surf;
        }

        match op {
            SendOp::Load
            | SendOp::LoadStatus
            | SendOp::Store
            | SendOp::LoadQuad
            | SendOp::LoadQuadStatus
            | SendOp::StoreQuad => self.decode_vector_message(op, stateful),
            SendOp::LoadBlock2d | SendOp::StoreBlock2d => {
                if stateful {
                    self.d.error(14, 2, "AddrTypeSize must be FLAT_A64_A64 for block2d");
                }
                self.decode_block2d(op);
            }
            SendOp::Fence => self.decode_fence(),
            SendOp::GetWatchpoint | SendOp::SetWatchpoint => self.decode_watchpoint(op),
            SendOp::ExtendedCacheCtrl => {
                self.addr_size = ".a64".to_string();
                self.decode_extended_cache_ctrl(op);
            }
            op if op.is_atomic() => self.decode_vector_message(op, stateful),
            _ => self.d.error(0, 6, "unhandled SendOp"),
        }
    }

    /// Untyped load, store and atomic; stateless and stateful.
    fn decode_vector_message(&mut self, op: SendOp, stateful: bool) {
        self.decode_vector_size();
        self.decode_data_size();
        if op.is_atomic() && self.d.info().is_transposed() {
            self.d.error(10, 1, "transpose forbidden on atomic operations");
        }
        self.decode_cache_control(op);
        if op.is_atomic() {
            // L1 is always uncached for atomics so there is no overfetch
            self.d.add_reserved(20, 2);
        } else {
            self.d.add_reserved(20, 1);
            self.decode_overfetch();
        }
        let imm_off = if stateful {
            self.decode_ss_idx();
            27
        } else {
            22
        };
        self.decode_imm_off_addr(imm_off, 44 - imm_off);
        self.decode_addr_scaling();
        self.d.add_reserved(46, 1);
        self.d.compute_payload_sizes();
    }

    fn decode_block2d(&mut self, op: SendOp) {
        if self.d.sfid() == Sfid::Tgm {
            self.decode_addr_type_stateful();
            self.implicit_surface();
        }
        self.d.add_reserved(7, 2);
        if self.d.decode_bit("Transpose", 10, "", "transposed") {
            self.vector.push('t');
        }
        if self.d.decode_bit("VNNI", 9, "", "VNNI transformed") {
            self.vector.push('v');
        }
        self.decode_data_size();
        self.decode_cache_control(op);
        self.d.add_reserved(20, 2);
        self.decode_imm_off_coord_2d();
        self.d.add_reserved(46, 1);
        self.d.compute_payload_sizes();
    }

    fn decode_fence(&mut self) {
        match self.d.info().exec_width {
            Some(w) if w > 1 => self.d.error(0, 6, "ExecSize should be 1"),
            Some(_) => {}
            None => self.d.info().exec_width = Some(1),
        }
        self.d.add_reserved(7, 1);

        let flush = self.d.desc_bits(8, 3);
        let (flush_sym, flush_meaning) = match flush {
            0 => ("none", "None"),
            1 => ("evict", "Evict (for R/W evict dirty and invalidate clean; for R/O invalidate clean)"),
            2 => ("invalidate", "Invalidate (invalidate clean lines)"),
            3 => ("discard", "Discard (for R/W invalidate dirty without writeback; nop for R/O)"),
            4 => ("clean", "Clean (for R/W write dirty back to next level but keep as clean; nop for R/O)"),
            _ => {
                self.d.error(8, 3, "invalid flush op");
                ("?", "???")
            }
        };
        self.d.add_field("FlushType", 8, 3, u64::from(flush), flush_meaning);

        let scope = self.d.desc_bits(11, 3);
        let (scope_sym, scope_meaning) = match scope {
            0 => ("group", "Threadgroup"),
            1 => ("core", "Local (subslice)"),
            2 => ("tile", "Tile"),
            3 => ("gpu", "GPU"),
            4 => ("gpus", "GPUs"),
            5 => ("sysrel", "System Release"),
            6 => ("sysacq", "System Acquire"),
            _ => {
                self.d.error(11, 3, "invalid fence scope");
                ("?", "???")
            }
        };
        self.d.add_field("FenceScope", 11, 3, u64::from(scope), scope_meaning);
        self.d.add_reserved(14, 46 - 14 + 1);

        let grf = self.d.grf_bytes();
        let syntax = self.d.syntax();
        syntax.controls.push('.');
        syntax.controls.push_str(flush_sym);
        syntax.controls.push('.');
        syntax.controls.push_str(scope_sym);
        syntax.layout = Layout::Control;
        let info = self.d.info();
        info.dst_len_bytes = Some(0);
        info.src0_len_bytes = Some(grf);
        info.src1_len_bytes = Some(0);
    }

    fn decode_watchpoint(&mut self, op: SendOp) {
        match self.d.info().exec_width {
            None => self.d.info().exec_width = Some(1),
            Some(1) => {}
            Some(_) => self.d.error(0, 6, "ExecSize should be 1"),
        }
        if self.d.input.ind0.is_some() {
            self.d.error(0, 6, "IND0 is forbidden on this message");
        }
        let reg = self.d.decode_field("WatchpointRegister", 7, 3, |_, reg| format!("register {}", reg));
        self.vector = format!(".w{}", reg);
        self.d.add_reserved(10, 4);
        self.d.add_reserved(16, 46 - 16 + 1);

        self.d.syntax().layout = Layout::Control;
        let get = op == SendOp::GetWatchpoint;
        let info = self.d.info();
        // the watchpoint state is 75 bits
        info.dst_len_bytes = Some(if get { 10 } else { 0 });
        info.src0_len_bytes = Some(0);
        info.src1_len_bytes = Some(if get { 0 } else { 10 });
    }

    fn decode_extended_cache_ctrl(&mut self, op: SendOp) {
        self.decode_cache_control(op);
        self.d.add_reserved(13, 3);

        let size = self.d.desc_bits(11, 2);
        let (size_sym, size_meaning) = match size {
            0 => (".64B", "Operation affects single 64B cache line"),
            1 => (".128B", "Operation affects 128B; two cache lines"),
            2 => (".192B", "Operation affects 192B; three cache lines"),
            _ => (".256B", "Operation affects 256B; four cache lines"),
        };
        self.ecc_size = size_sym;
        self.d.add_field("CacheControlSize", 11, 2, u64::from(size), size_meaning);

        let ctrl = self.d.desc_bits(7, 4);
        let (ctrl_sym, ctrl_meaning) = match ctrl {
            0 => (".set", "Set dirty bits to one, set data to zero"),
            1 => (".reset", "Set dirty bits to zero"),
            _ => {
                self.d.error(7, 4, "invalid cache control operation");
                ("", "??")
            }
        };
        self.ecc_op = ctrl_sym;
        self.d.add_field("CacheControlOperation", 7, 4, u64::from(ctrl), ctrl_meaning);
        self.d.info().addr_size_bits = 64;
    }

    fn decode_typed(&mut self, op: SendOp) {
        let uvr = op.is_atomic()
            || matches!(
                op,
                SendOp::LoadQuad
                    | SendOp::StoreQuad
                    | SendOp::LoadQuadMsrt
                    | SendOp::StoreQuadMsrt
                    | SendOp::LoadQuadStatus
                    | SendOp::LoadBlock2d
                    | SendOp::StoreBlock2d
                    | SendOp::StoreUncompressedQuad
            );
        if uvr {
            self.d.info().attrs |= MsgAttrs::HAS_UVRLOD;
        }

        match op {
            SendOp::Fence => self.decode_fence(),
            SendOp::ReadState => self.decode_read_state(),
            SendOp::LoadQuad
            | SendOp::StoreQuad
            | SendOp::LoadQuadMsrt
            | SendOp::StoreQuadMsrt
            | SendOp::LoadQuadStatus => self.decode_typed_cmask(op),
            SendOp::LoadBlock2d | SendOp::StoreBlock2d => self.decode_block2d(op),
            op if op.is_atomic() => self.decode_typed_atomic(op),
            _ => self.d.error(0, 6, "invalid op for TGM"),
        }
    }

    fn decode_typed_cmask(&mut self, op: SendOp) {
        self.implicit_surface();
        self.d.lookup("SurfaceTypeHint", 11, 3, &SURFACE_TYPE_HINTS);
        self.decode_vector_size();

        let a16 = self.d.decode_bit("AddressInputFormat", 14, "AIF32", "AIF16");
        self.addr_size = if a16 { ".a16" } else { ".a32" }.to_string();
        self.d.info().addr_size_bits = if a16 { 16 } else { 32 };

        let d16 = self.d.decode_bit("DataReturnFormat", 15, "DRF32", "DRF16");
        self.data_type = if d16 { ".d16" } else { ".d32" }.to_string();
        let bits = if d16 { 16 } else { 32 };
        let info = self.d.info();
        info.elem_size_bits_reg = bits;
        info.elem_size_bits_mem = bits;

        self.decode_cache_control(op);
        self.d.add_reserved(20, 2);
        self.decode_ss_idx();
        self.d.add_reserved(27, 3);
        self.decode_uvr_offsets();
        self.d.add_reserved(42, 46 - 42 + 1);
        self.d.compute_payload_sizes();
    }

    fn decode_typed_atomic(&mut self, op: SendOp) {
        self.implicit_surface();
        self.decode_vector_size();
        self.decode_data_size();
        if self.d.info().elems_per_addr != 1 {
            self.d.error(7, 3, "atomics should be V1");
        }
        if self.d.info().is_transposed() {
            self.d.error(10, 1, "atomics must be non-transposed");
        }
        self.decode_addr_type_stateful();
        self.decode_cache_control(op);
        self.d.add_reserved(20, 2);
        self.decode_ss_idx();
        self.d.add_reserved(27, 3);
        self.decode_uvr_offsets();
        self.d.add_reserved(42, 46 - 42 + 1);
        self.d.compute_payload_sizes();
    }

    fn decode_read_state(&mut self) {
        self.implicit_surface();
        self.d.decode_field("RSISubOpcode", 7, 3, |d, subop| {
            if subop != 0 {
                d.error(7, 3, "only 0 supported as RSI subop");
            }
            String::new()
        });
        self.d.add_reserved(10, 4);
        self.decode_addr_type_stateful();
        self.d.add_reserved(16, 21 - 16 + 1);
        self.decode_ss_idx();
        self.d.add_reserved(27, 46 - 27 + 1);

        let grf = self.d.grf_bytes();
        let info = self.d.info();
        info.exec_width.get_or_insert(1);
        info.dst_len_bytes = Some(grf);
        // U, V, R and LOD
        info.src0_len_bytes = Some(16);
        info.src1_len_bytes = Some(0);
    }

    fn implicit_surface(&mut self) {
        let ind0 = self.d.input.ind0;
        let info = self.d.info();
        info.addr_type = AddrType::Surf;
        info.addr_size_bits = 32;
        info.surface = ind0.map(SendDesc::Reg);
    }

    fn decode_addr_type_size(&mut self) {
        let enc = self.d.desc_bits(14, 2);
        let ind0 = self.d.input.ind0;
        let uniform = |symbol: &str, indices: &str| match ind0 {
            Some(r) => format!(
                "{}: {} with uniform a64 in s{}.{} added to each",
                symbol, indices, r.reg_num, r.sub_reg_num
            ),
            None => format!("{}: {}", symbol, indices),
        };
        let meaning = match self.d.sfid() {
            Sfid::Ugm => {
                let (addr_size, addr_type, bits, meaning) = match enc {
                    FLAT_A64_A32U => (
                        ".a32u",
                        AddrType::Flat,
                        32,
                        uniform("FLAT_A64_A32U", "a32 unsigned offsets (zero-extended to a64)"),
                    ),
                    FLAT_A64_A32S => (
                        ".a32s",
                        AddrType::Flat,
                        32,
                        uniform("FLAT_A64_A32S", "a32 signed offsets (sign-extended to a64)"),
                    ),
                    FLAT_A64_A64 => (".a64", AddrType::Flat, 64, uniform("FLAT_A64_A64", "a64 offsets")),
                    _ => (
                        ".a32",
                        AddrType::Surf,
                        32,
                        "STATEFUL_A32 (id0 is a surface state pointer whose base is added to a32 offsets)"
                            .to_string(),
                    ),
                };
                self.addr_size = addr_size.to_string();
                let info = self.d.info();
                info.addr_type = addr_type;
                info.addr_size_bits = bits;
                if addr_type == AddrType::Surf {
                    info.surface = ind0.map(SendDesc::Reg);
                } else {
                    info.uniform_base = ind0;
                }
                meaning
            }
            Sfid::Slm | Sfid::Urb => {
                self.addr_size = ".a32".to_string();
                let info = self.d.info();
                info.addr_type = AddrType::Flat;
                info.addr_size_bits = 32;
                info.uniform_base = ind0;
                if enc != 0 {
                    self.d.error(14, 2, "invalid address type");
                    "?".to_string()
                } else if self.d.sfid() == Sfid::Slm {
                    uniform("FLAT_A32_A32", "a32 offsets")
                } else {
                    "GLOBAL_A32_A32 (id0 is a uniform a32 global base added to a32 indices)".to_string()
                }
            }
            _ => {
                self.decode_addr_type_stateful();
                return;
            }
        };
        self.d.add_field("AddrTypeSize", 14, 2, u64::from(enc), meaning);
    }

    fn decode_addr_type_stateful(&mut self) {
        let enc = self.d.desc_bits(14, 2);
        let meaning = if enc == STATEFUL_A32 {
            self.addr_size = ".a32".to_string();
            "STATEFUL_A32 (id0 is a surface state pointer whose base is added to a32 offsets)"
        } else {
            self.d.error(14, 2, "invalid address type");
            "?"
        };
        self.d.add_field("AddrTypeSize", 14, 2, u64::from(enc), meaning);
    }

    fn decode_ss_idx(&mut self) {
        let idx = self
            .d
            .decode_field("SurfaceStateIndex", 22, 5, |_, idx| format!("surface state {}", idx));
        self.ss_idx = Some(idx);
    }

    fn decode_uvr_offsets(&mut self) {
        let mut offsets = [0i32; 3];
        for (i, (name, off)) in [("UvrOffset.R", 30), ("UvrOffset.V", 34), ("UvrOffset.U", 38)]
            .into_iter()
            .enumerate()
        {
            offsets[i] = self.d.desc_bits_signed(off, 4);
            let meaning = format!("add {} to the {} coordinate", offsets[i], &name[10..]);
            let raw = self.d.desc_bits(off, 4);
            self.d.add_field(name, off, 4, u64::from(raw), meaning);
        }
        let [r, v, u] = offsets;
        if offsets.iter().any(|&o| o != 0) {
            self.d.syntax().imm_offset = format!("({},{},{})", fmt_hex_signed(u), fmt_hex_signed(v), fmt_hex_signed(r));
        }
    }

    fn decode_vector_size(&mut self) {
        if self.d.info().has(MsgAttrs::HAS_CHMASK) {
            let mask = self.d.desc_bits(7, 4);
            let mut sym = ".".to_string();
            for (i, c) in "xyzw".chars().enumerate() {
                if mask & (1 << i) != 0 {
                    sym.push(c);
                }
            }
            self.d.add_field("ChMask", 7, 4, u64::from(mask), sym.clone());
            let info = self.d.info();
            info.channels_enabled = mask;
            info.elems_per_addr = mask.count_ones();
            self.vector = sym;
            return;
        }

        let Some(v) = self.d.lookup("VecSize", 7, 3, &VECTOR_SIZES) else {
            self.vector = "?".to_string();
            return;
        };
        let transposed = self.d.decode_bit("Transpose", 10, "Non-transposed", "Transposed");
        self.d.info().elems_per_addr = v.value;
        let mut sym = if v.value != 1 { v.symbol.to_string() } else { String::new() };
        if transposed {
            sym.push('t');
            let info = self.d.info();
            info.exec_width.get_or_insert(1);
            info.attrs |= MsgAttrs::TRANSPOSED;
            let supported = matches!(
                info.op,
                Some(SendOp::Load | SendOp::LoadBlock2d | SendOp::LoadStatus | SendOp::Store | SendOp::StoreBlock2d)
            );
            if !supported {
                self.d.warning(10, 1, "transpose not supported on this send op");
            }
            if self.d.input.exec_size.map_or(false, |e| e.lanes() != 1) {
                self.d.warning(10, 1, "transpose messages should be SIMD1");
            }
        }
        self.vector = sym;
    }

    fn decode_data_size(&mut self) {
        match self.d.lookup("DataSize", 11, 3, &DATA_SIZES) {
            Some(v) => {
                self.data_type = v.symbol.to_string();
                let (mem, reg) = v.value;
                let info = self.d.info();
                info.elem_size_bits_mem = mem;
                info.elem_size_bits_reg = reg;
            }
            None => self.data_type = ".d??".to_string(),
        }
    }

    fn decode_cache_control(&mut self, op: SendOp) {
        let platform = self.d.platform();
        let (off, len) = cache::field(platform);
        let enc = self.d.desc_bits(off, len);
        let table = cache::table(platform, op).unwrap_or(&cache::ST);
        let Some(cc) = cache::lookup(table, enc) else {
            self.cache_control = ".?".to_string();
            self.d.add_field("CacheOverride", off, len, u64::from(enc), "invalid");
            self.d.error(off, len, "invalid cache options");
            return;
        };
        self.cache_control = cc.symbol();
        self.d.add_field("CacheOverride", off, len, u64::from(enc), cc.description());
        let info = self.d.info();
        info.caching_l1 = cc.l1;
        info.caching_l3 = cc.l3;
    }

    fn decode_overfetch(&mut self) {
        let set = self.d.decode_bit("Overfetch", 21, "", "LSC opportunistically fetches up to 256B");
        if set {
            self.overfetch = ".ovf";
        }
    }

    fn decode_imm_off_addr(&mut self, off: u32, len: u32) {
        let mem_bits = self.d.info().elem_size_bits_mem;
        if mem_bits == 0 {
            self.d.error(off, len, "invalid data size (cannot compute imm off size)");
            return;
        }
        let elems = self.d.desc_bits_signed(off, len);
        let bytes = elems * mem_bits as i32 / 8;
        self.d.info().immediate_offset = bytes;
        if bytes != 0 {
            self.d.syntax().imm_offset = fmt_hex_signed(bytes);
        }
        let raw = self.d.desc_bits(off, len);
        self.d
            .add_field("AddrImmOff", off, len, u64::from(raw), format!("add {} elements to each index", elems));
    }

    fn decode_imm_off_coord_2d(&mut self) {
        if self.d.info().elem_size_bits_mem == 0 {
            self.d.error(22, 12, "cannot decode imm off with invalid data size");
            return;
        }
        let mut coord = |name: &'static str, which: &str, off: u32| {
            let raw = self.d.desc_bits(off, 12);
            let elems = self.d.desc_bits_signed(off, 12);
            let meaning = format!("add {} elements to {}-coordinate", elems, which);
            self.d.add_field(name, off, 12, u64::from(raw), meaning);
            elems
        };
        let x = coord("CoordImmOff2D.X", "X", 22);
        let y = coord("CoordImmOff2D.Y", "Y", 34);
        self.d.info().block2d_offset = (x, y);
        if x != 0 || y != 0 {
            self.d.syntax().imm_offset = format!("({},{})", fmt_hex_signed(x), fmt_hex_signed(y));
        }
    }

    fn decode_addr_scaling(&mut self) {
        let info = self.d.info();
        let (mem_bits, elems) = (info.elem_size_bits_mem, info.elems_per_addr);
        let chmask = info.has(MsgAttrs::HAS_CHMASK);
        if mem_bits == 0 {
            self.d.error(44, 2, "need to decode data size first");
        }
        if elems == 0 && !chmask {
            self.d.error(44, 2, "need to decode vector size first");
        }
        if elems == 0 {
            self.d.warning(7, 4, "empty chmask in LSC message");
        }

        let enc = self.d.desc_bits(44, 2);
        let meaning = if enc == 0 {
            self.d.info().addr_scaling = 1;
            "unscaled indices".to_string()
        } else if elems == 0 {
            "(undefined behavior)".to_string()
        } else {
            let scale = 1 << (enc - 1);
            let bytes = mem_bits / 8 * elems;
            if bytes > 32 {
                self.d.error(44, 2, "total scale amount must be <= 32B");
            }
            if !elems.is_power_of_two() {
                self.d.warning(44, 2, "vector size must be a power of two to scale (V3 not supported)");
            }
            self.d.info().addr_scaling = bytes;
            self.d.syntax().scale = format!("{}*", fmt_hex_signed(bytes as i32));
            format!("scale by {}X data*vecsize ({})", scale, bytes)
        };
        self.d.add_field("OffsetScaling", 44, 2, u64::from(enc), meaning);
    }

    fn surface_syntax(&mut self) -> String {
        if self.d.info().addr_type != AddrType::Surf {
            return String::new();
        }
        let base = match self.d.input.ind0 {
            Some(r) => format!("s{}.{}", r.reg_num, r.sub_reg_num),
            None => "?".to_string(),
        };
        match self.ss_idx {
            Some(idx) => format!("surf[{}][{}]", base, idx),
            None => format!("surf[{}]", base),
        }
    }

    fn symbol_from_syntax(&self) -> String {
        let ind0 = self.d.input.ind0;
        let info = self.d.result().info.clone();
        let syntax = &self.d.result().syntax;
        let mut sym = format!("{}{}", syntax.mnemonic, syntax.controls);
        if !syntax.surface.is_empty() {
            sym.push(' ');
            sym.push_str(&syntax.surface);
        } else if !syntax.is_control() {
            sym.push(' ');
        }
        if syntax.is_control() {
            sym.push_str(" src0");
            return sym;
        }

        sym.push('[');
        let mut printed = false;
        if let (Some(r), AddrType::Flat) = (ind0, info.addr_type) {
            sym.push_str(&format!("s{}.{}", r.reg_num, r.sub_reg_num));
            printed = true;
        }
        if info.src0_len_bytes.map_or(false, |b| b > 0) {
            if printed {
                sym.push('+');
            }
            sym.push_str(&syntax.scale);
            sym.push_str("src0");
        }
        if !syntax.imm_offset.is_empty() {
            if !syntax.imm_offset.starts_with('-') {
                sym.push('+');
            }
            sym.push_str(&syntax.imm_offset);
        }
        sym.push(']');
        sym
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        ir::{ExecSize, Platform, RegRef},
        messages::{decode_message, CacheOpt, DecodeResult, MessageInput},
    };

    fn decode(sfid: Sfid, desc: u64) -> DecodeResult {
        let input = MessageInput::new(Platform::Xe3, sfid, desc as u32, (desc >> 32) as u32).exec_size(ExecSize::Simd16);
        decode_message(&input)
    }

    #[test]
    fn stateful_load() {
        let desc = (u64::from(STATEFUL_A32) << 14) | (2 << 11);
        let r = decode(Sfid::Ugm, desc);
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!(r.info.op, Some(SendOp::Load));
        assert_eq!(r.info.addr_type, AddrType::Surf);
        assert_eq!(r.info.addr_size_bits, 32);
        assert_eq!(r.info.src0_len_bytes, Some(4 * 16));
        assert_eq!(r.info.dst_len_bytes, Some(4 * 16));
        assert!(r.fields.iter().any(|f| f.name == "SurfaceStateIndex"));
        assert_eq!(r.syntax.controls, ".ugm.d32.a32");
    }

    #[test]
    fn stateless_load_imm_offset() {
        // d32x4 a64 with -2 elements of offset
        let off = (-2i64 as u64) & ((1 << 22) - 1);
        let desc = (u64::from(FLAT_A64_A64) << 14) | (2 << 11) | (3 << 7) | (off << 22);
        let input = MessageInput::new(Platform::Xe3, Sfid::Ugm, desc as u32, (desc >> 32) as u32)
            .exec_size(ExecSize::Simd16)
            .ind0(RegRef::new(0, 4));
        let r = decode_message(&input);
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!(r.info.immediate_offset, -8);
        assert_eq!(r.info.uniform_base, Some(RegRef::new(0, 4)));
        assert_eq!(r.info.elems_per_addr, 4);
        assert_eq!(r.info.symbol, "load.ugm.d32x4.a64 [s0.4+src0-0x8]");
    }

    #[test]
    fn scaling_limit() {
        // d64x8 scaled is 64B
        let desc = (u64::from(FLAT_A64_A64) << 14) | (3 << 11) | (4 << 7) | (1 << 44);
        let r = decode(Sfid::Ugm, desc);
        assert!(r.errors.iter().any(|e| e.offset == 44));
    }

    #[test]
    fn slm_rejects_64b_addresses() {
        let desc = (u64::from(FLAT_A64_A64) << 14) | (2 << 11);
        let r = decode(Sfid::Slm, desc);
        assert_eq!(r.errors.len(), 1);
        assert_eq!(r.errors[0].offset, 14);
    }

    #[test]
    fn fence() {
        let desc = 0x1F | (1 << 8) | (3 << 11);
        let input = MessageInput::new(Platform::Xe3, Sfid::Ugm, desc, 0);
        let r = decode_message(&input);
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!(r.info.exec_width, Some(1));
        assert_eq!(r.info.symbol, "fence.ugm.evict.gpu src0");
        assert_eq!(r.info.src0_len_bytes, Some(64));
    }

    #[test]
    fn typed_quad() {
        // .xyzw, d32, a32, surface state index 3
        let desc = 0x02 | (0xF << 7) | (3 << 22);
        let input = MessageInput::new(Platform::Xe3, Sfid::Tgm, desc, 0)
            .exec_size(ExecSize::Simd16)
            .ind0(RegRef::new(1, 0));
        let r = decode_message(&input);
        assert!(r.is_ok(), "{:?}", r.errors);
        assert!(r.info.has(MsgAttrs::TYPED | MsgAttrs::HAS_UVRLOD | MsgAttrs::HAS_CHMASK));
        assert_eq!(r.info.elems_per_addr, 4);
        assert_eq!(r.info.surface, Some(SendDesc::Reg(RegRef::new(1, 0))));
        assert_eq!(r.syntax.surface, "surf[s1.0][3]");
    }

    #[test]
    fn reserved_bit_warns() {
        let desc = (u64::from(FLAT_A64_A64) << 14) | (2 << 11) | (1 << 46);
        let r = decode(Sfid::Ugm, desc);
        assert!(r.is_ok());
        assert_eq!(r.warnings.len(), 1);
    }

    #[test]
    fn unknown_opcode() {
        let r = decode(Sfid::Ugm, 0x3F);
        assert_eq!(r.errors.len(), 1);
        assert!(r.info.op.is_none());
    }

    #[test]
    fn uses_wide_cache_table() {
        let desc = (u64::from(FLAT_A64_A64) << 14) | (2 << 11) | (0x8 << 16);
        let r = decode(Sfid::Ugm, desc);
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!((r.info.caching_l1, r.info.caching_l3), (CacheOpt::Cached, CacheOpt::Cached));
    }
}
