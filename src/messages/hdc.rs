//! Data cache messages of the pre-LSC data port: DC0, DC1, the read-only
//! constant cache (DCRO) and DC2.
//!
//! ```text
//! [7:0]   binding table index (0xFE SLM, 0xFF and 0xFD stateless)
//! [13:8]  message controls
//! [18:14] message type
//! [19]    header present
//! ```

use super::{
    other::{decode_header, Header},
    AddrType, CacheOpt, Layout, MessageDecoder, MsgAttrs, SendOp, SendOpClass, ValidValue,
};
use crate::ir::{SendDesc, Sfid};

const SLM_BTI: u32 = 0xFE;
const COHERENT_BTI: u32 = 0xFF;
const NONCOHERENT_BTI: u32 = 0xFD;

const DC0_OWB_READ: u32 = 0x00;
const DC0_OWAB_READ: u32 = 0x01;
const DC0_OWDB_READ: u32 = 0x02;
const DC0_DWS_READ: u32 = 0x03;
const DC0_BS_READ: u32 = 0x04;
const DC0_FENCE: u32 = 0x07;
const DC0_OWB_WRITE: u32 = 0x08;
const DC0_HWAB_WRITE: u32 = 0x09;
const DC0_OWDB_WRITE: u32 = 0x0A;
const DC0_DWS_WRITE: u32 = 0x0B;
const DC0_BS_WRITE: u32 = 0x0C;

const DC1_US_READ: u32 = 0x01;
const DC1_INT_ATOMIC: u32 = 0x02;
const DC1_MB_READ: u32 = 0x04;
const DC1_TS_READ: u32 = 0x05;
const DC1_TYPED_ATOMIC: u32 = 0x06;
const DC1_US_WRITE: u32 = 0x09;
const DC1_MB_WRITE: u32 = 0x0A;
const DC1_ATOMIC_COUNTER: u32 = 0x0B;
const DC1_TS_WRITE: u32 = 0x0D;
const DC1_A64_BS_READ: u32 = 0x10;
const DC1_A64_US_READ: u32 = 0x11;
const DC1_A64_INT_ATOMIC: u32 = 0x12;
const DC1_A64_BLOCK_READ: u32 = 0x14;
const DC1_A64_BLOCK_WRITE: u32 = 0x15;
const DC1_A64_US_WRITE: u32 = 0x19;
const DC1_A64_BS_WRITE: u32 = 0x1A;
const DC1_FLOAT_ATOMIC: u32 = 0x1B;
const DC1_A64_FLOAT_ATOMIC: u32 = 0x1D;

/// Desc[11:8] of integer atomics. Encoding 0 is a 64b compare and swap
/// wedged into the 32b message.
static INT_ATOMIC_OPS: [ValidValue<SendOp>; 16] = [
    ValidValue::new(0x0, SendOp::AtomicIcas, "atomic_icas", "64b integer compare and swap"),
    ValidValue::new(0x1, SendOp::AtomicAnd, "atomic_and", "logical AND"),
    ValidValue::new(0x2, SendOp::AtomicOr, "atomic_or", "logical OR"),
    ValidValue::new(0x3, SendOp::AtomicXor, "atomic_xor", "logical XOR"),
    ValidValue::new(0x4, SendOp::AtomicStore, "atomic_store", "store"),
    ValidValue::new(0x5, SendOp::AtomicIinc, "atomic_iinc", "integer increment"),
    ValidValue::new(0x6, SendOp::AtomicIdec, "atomic_idec", "integer decrement"),
    ValidValue::new(0x7, SendOp::AtomicIadd, "atomic_iadd", "integer add"),
    ValidValue::new(0x8, SendOp::AtomicIsub, "atomic_isub", "integer subtract"),
    ValidValue::new(0x9, SendOp::AtomicIrsub, "atomic_irsub", "commuted integer subtract"),
    ValidValue::new(0xA, SendOp::AtomicSmax, "atomic_smax", "signed-integer max"),
    ValidValue::new(0xB, SendOp::AtomicSmin, "atomic_smin", "signed-integer min"),
    ValidValue::new(0xC, SendOp::AtomicUmax, "atomic_umax", "unsigned-integer max"),
    ValidValue::new(0xD, SendOp::AtomicUmin, "atomic_umin", "unsigned-integer min"),
    ValidValue::new(0xE, SendOp::AtomicIcas, "atomic_icas", "integer compare and swap"),
    ValidValue::new(0xF, SendOp::AtomicIpdec, "atomic_ipdec", "integer pre-decrement"),
];

static FLOAT_ATOMIC_OPS: [ValidValue<SendOp>; 3] = [
    ValidValue::new(0x1, SendOp::AtomicFmax, "atomic_fmax", "max"),
    ValidValue::new(0x2, SendOp::AtomicFmin, "atomic_fmin", "min"),
    ValidValue::new(0x3, SendOp::AtomicFcas, "atomic_fcas", "fp-compare and swap"),
];

pub(super) fn decode(d: &mut MessageDecoder<'_>) {
    let mut hdc = HdcDecoder { d };
    match hdc.d.sfid() {
        Sfid::Dcro => hdc.decode_dcro(),
        Sfid::Dc0 => hdc.decode_dc0(),
        Sfid::Dc1 => hdc.decode_dc1(),
        _ => hdc.d.error(0, 32, "unsupported DC2 op"),
    }
}

/// The shape of one data cache message, before its surface is decoded.
struct HdcMessage {
    sym: String,
    description: String,
    op: SendOp,
    addr_bits: u32,
    reg_bits: u32,
    mem_bits: u32,
    elems: u32,
    simd: u32,
    attrs: MsgAttrs,
}

impl HdcMessage {
    fn new(
        sym: impl Into<String>,
        description: impl Into<String>,
        op: SendOp,
        addr_bits: u32,
        data_bits: u32,
        elems: u32,
        simd: u32,
    ) -> Self {
        Self {
            sym: sym.into(),
            description: description.into(),
            op,
            addr_bits,
            reg_bits: data_bits,
            mem_bits: data_bits,
            elems,
            simd,
            attrs: MsgAttrs::empty(),
        }
    }

    /// Memory elements narrower than their register slot.
    fn mem_bits(mut self, bits: u32) -> Self {
        self.mem_bits = bits;
        self
    }

    fn attrs(mut self, attrs: MsgAttrs) -> Self {
        self.attrs |= attrs;
        self
    }
}

/// Lowercase names of the channels a disable mask leaves on.
fn enabled_channels(disabled: u32) -> String {
    "xyzw"
        .chars()
        .enumerate()
        .filter(|(i, _)| disabled & (1 << i) == 0)
        .map(|(_, c)| c)
        .collect()
}

fn stateless(bti: u32) -> (&'static str, CacheOpt) {
    if bti == COHERENT_BTI {
        ("stateless", CacheOpt::Uncached)
    } else {
        ("stateless_incoherent", CacheOpt::Cached)
    }
}

fn round_up(bytes: u32, grf: u32) -> u32 {
    (bytes + grf - 1) / grf * grf
}

struct HdcDecoder<'d, 'a> {
    d: &'d mut MessageDecoder<'a>,
}

impl<'d, 'a> HdcDecoder<'d, 'a> {
    fn message_type(&mut self, what: impl Into<String>) -> u32 {
        let mt = self.d.desc_bits(14, 5);
        self.d.add_field("MessageType", 14, 5, u64::from(mt), what);
        mt
    }

    fn decode_bti(&mut self) -> u32 {
        self.d.decode_field("BTI", 0, 8, |_, bti| match bti {
            SLM_BTI => "SLM".to_string(),
            COHERENT_BTI => "coherent stateless".to_string(),
            NONCOHERENT_BTI => "non-coherent stateless".to_string(),
            bti => format!("surface {}", bti),
        })
    }

    /// SIMD8 when clear, SIMD16 when set.
    fn decode_sm2(&mut self, off: u32) -> u32 {
        if self.d.decode_bit("SimdMode", off, "SIMD8", "SIMD16") {
            16
        } else {
            8
        }
    }

    /// SIMD16 when clear, SIMD8 when set.
    fn decode_sm2r(&mut self, off: u32) -> u32 {
        if self.d.decode_bit("SimdMode", off, "SIMD16", "SIMD8") {
            8
        } else {
            16
        }
    }

    fn decode_sm3(&mut self) -> u32 {
        let enc = self.d.desc_bits(12, 2);
        let (simd, meaning) = match enc {
            1 => (16, "SIMD16"),
            2 => (8, "SIMD8"),
            _ => (16, "?"),
        };
        self.d.add_field("SimdMode", 12, 2, u64::from(enc), meaning);
        if meaning == "?" {
            self.d.error(12, 2, "invalid SIMD mode");
        }
        simd
    }

    /// Bytes per address of byte scattered messages.
    fn decode_byte_size(&mut self, name: &'static str) -> u32 {
        let enc = self.d.desc_bits(10, 2);
        let meaning = match enc {
            0 => "1 byte",
            1 => "2 bytes",
            2 => "4 bytes",
            _ => "?",
        };
        self.d.add_field(name, 10, 2, u64::from(enc), meaning);
        if enc == 3 {
            self.d.error(10, 2, "invalid data size");
        }
        1 << enc
    }

    /// Elements per address of dword and qword scattered messages.
    fn decode_elems(&mut self) -> u32 {
        1 << self.d.decode_field("DataElements", 10, 2, |_, enc| format!("{} per address", 1 << enc))
    }

    fn decode_legacy_simd_mode(&mut self) {
        if !self.d.decode_bit("LegacySimdMode", 9, "", "") {
            self.d.warning(9, 1, "LegacySimdMode should be set");
        }
    }

    fn decode_cmask(&mut self) -> u32 {
        let disabled = self.d.desc_bits(8, 4);
        if disabled == 0xF {
            self.d.error(8, 4, "channel mask must enable at least one channel");
        }
        let enabled = enabled_channels(disabled);
        let meaning = if enabled.is_empty() {
            "no channels enabled".to_string()
        } else {
            format!("{} enabled", enabled.to_uppercase())
        };
        self.d.add_field("ChannelDisableMask", 8, 4, u64::from(disabled), meaning);
        enabled.len() as u32
    }

    fn decode_invalidate_after_read(&mut self) {
        if self.d.decode_bit("InvalidateAfterRead", 13, "disabled", "enabled") {
            self.d.info().caching_l3 = CacheOpt::ReadInvalidate;
        }
    }

    fn set_message(&mut self, msg: HdcMessage) {
        let HdcMessage {
            sym,
            description,
            op,
            addr_bits,
            reg_bits,
            mem_bits,
            elems,
            simd,
            mut attrs,
        } = msg;
        let mut mnemonic = format!("hdc_{}", sym);
        if simd == 8 || simd == 16 {
            mnemonic.push_str(&format!("_simd{}", simd));
        }

        let mut caching = CacheOpt::Default;
        let mut addr_type = AddrType::Flat;
        let mut surface = None;
        let surface_sym = if attrs.contains(MsgAttrs::SCRATCH) {
            format!("scratch+{}", 32 * self.d.desc_bits(0, 12))
        } else {
            let bti = self.decode_bti();
            if addr_bits == 64 {
                if bti != COHERENT_BTI && bti != NONCOHERENT_BTI {
                    self.d.error(0, 8, "A64 messages must use BTI 0xFF or 0xFD");
                }
                let (sym, cache) = stateless(bti);
                caching = cache;
                sym.to_string()
            } else if bti == SLM_BTI {
                attrs |= MsgAttrs::SLM;
                "slm".to_string()
            } else if bti == COHERENT_BTI || bti == NONCOHERENT_BTI {
                let (sym, cache) = stateless(bti);
                caching = cache;
                sym.to_string()
            } else {
                addr_type = AddrType::Bti;
                surface = Some(SendDesc::Imm(bti));
                format!("bti[{}]", bti)
            }
        };

        let mut controls = format!(".a{}", addr_bits);
        if reg_bits == mem_bits {
            controls.push_str(&format!(".d{}", reg_bits));
        } else {
            controls.push_str(&format!(".d{}u{}", mem_bits, reg_bits));
        }
        let mut channels_enabled = 0;
        if op.has_ch_mask() {
            // legacy messages carry a channel disable mask
            let disabled = self.d.desc_bits(8, 4);
            channels_enabled = !disabled & 0xF;
            controls.push('.');
            controls.push_str(&enabled_channels(disabled));
        } else if elems > 1 || attrs.contains(MsgAttrs::TRANSPOSED) {
            controls.push_str(&format!("x{}", elems));
        }

        let syntax = self.d.syntax();
        syntax.mnemonic = mnemonic.clone();
        syntax.controls = controls.clone();
        syntax.surface = surface_sym.clone();
        syntax.layout = match op.class() {
            SendOpClass::Load => Layout::Load,
            SendOpClass::Store => Layout::Store,
            SendOpClass::Atomic => Layout::Atomic,
            SendOpClass::Other => Layout::Control,
        };

        let info = self.d.info();
        info.op = Some(op);
        info.symbol = format!("{}.{}{}", mnemonic, surface_sym, controls);
        info.description = description;
        info.attrs |= attrs;
        info.exec_width = Some(simd);
        info.addr_type = addr_type;
        info.addr_size_bits = addr_bits;
        info.elem_size_bits_reg = reg_bits;
        info.elem_size_bits_mem = mem_bits;
        info.elems_per_addr = elems;
        info.channels_enabled = channels_enabled;
        info.caching_l1 = caching;
        info.caching_l3 = caching;
        info.surface = surface;
    }

    /// OWord blocks: 1L, 1H, 2, 4 or 8 OWords in Desc[10:8]. A single
    /// OWord still occupies a full register.
    fn set_ow_block(&mut self, sym: &str, what: &str, op: SendOp, addr_bits: u32) {
        let enc = self.d.desc_bits(8, 3);
        let (owords, meaning) = match enc {
            0 => (1, "1L (low half of GRF)"),
            1 => (1, "1H (high half of GRF)"),
            2 => (2, "2 OWords"),
            3 => (4, "4 OWords"),
            4 => (8, "8 OWords"),
            _ => (1, "?"),
        };
        self.d.add_field("BlockSize", 8, 3, u64::from(enc), meaning);
        if enc > 4 {
            self.d.error(8, 3, "invalid OWord block size");
        }
        let mut attrs = MsgAttrs::TRANSPOSED;
        if enc == 1 {
            attrs |= MsgAttrs::EXPAND_HIGH;
        }
        let reg_bits = if enc < 2 { 256 } else { 128 };
        let description = format!("{} x{}{}", what, owords, if enc == 1 { "H" } else { "" });
        self.set_message(
            HdcMessage::new(sym, description, op, addr_bits, reg_bits, owords, 1)
                .mem_bits(128)
                .attrs(attrs),
        );
    }

    /// HWord blocks: 1, 2, 4 or 8 blocks of 256 bits.
    fn set_hw_block(&mut self, sym: &str, what: &str, op: SendOp, addr_bits: u32, count: (u32, u32), attrs: MsgAttrs) {
        let (off, len) = count;
        let blocks = 1 << self.d.decode_field("BlockSize", off, len, |_, enc| format!("{} 256b blocks", 1 << enc));
        let description = format!("{} x{}", what, blocks);
        self.set_message(
            HdcMessage::new(sym, description, op, addr_bits, 256, blocks, 1).attrs(attrs | MsgAttrs::TRANSPOSED),
        );
    }

    fn set_int_atomic(&mut self, kind: &str, what: &str, addr_bits: u32, data_bits: u32, simd: u32, attrs: MsgAttrs) {
        self.message_type(format!("{} {}", kind, what));
        let entry = self.d.lookup("AtomicIntegerOp", 8, 4, &INT_ATOMIC_OPS);
        let mut attrs = attrs;
        let mut suffix = "";
        if self.d.decode_bit("ReturnDataControl", 13, "no return value", "returns new value") {
            attrs |= MsgAttrs::ATOMIC_RETURNS;
            suffix = "_ret";
        }
        let Some(entry) = entry else {
            return;
        };
        let data_bits = if entry.encoding == 0 { 64 } else { data_bits };
        self.set_message(
            HdcMessage::new(
                format!("{}_{}{}", kind, entry.symbol, suffix),
                format!("{} {} {}", kind, what, entry.description),
                entry.value,
                addr_bits,
                data_bits,
                1,
                simd,
            )
            .attrs(attrs),
        );
    }

    fn set_float_atomic(&mut self, what: &str, addr_bits: u32) {
        self.message_type(what);
        let entry = self.d.lookup("AtomicFloatOp", 8, 3, &FLOAT_ATOMIC_OPS);
        let mut attrs = MsgAttrs::empty();
        let mut suffix = "";
        if self.d.decode_bit("ReturnDataControl", 13, "no return value", "returns new value") {
            attrs |= MsgAttrs::ATOMIC_RETURNS;
            suffix = "_ret";
        }
        let simd = self.decode_sm2r(12);
        let Some(entry) = entry else {
            return;
        };
        self.set_message(
            HdcMessage::new(
                format!("{}{}", entry.symbol, suffix),
                format!("{} {} (32b)", what, entry.description),
                entry.value,
                addr_bits,
                32,
                1,
                simd,
            )
            .attrs(attrs),
        );
    }

    /// Read header presence, then derive payload sizes in bytes.
    fn finish(&mut self, header: Header) {
        let header = decode_header(self.d, header);
        let grf = self.d.grf_bytes();
        let info = self.d.info();
        let Some(op) = info.op else {
            return;
        };
        if op.class() == SendOpClass::Other {
            return;
        }
        let header_bytes = if header { grf } else { 0 };
        let simd = info.exec_width.unwrap_or(1);
        let (src0, data) = if info.is_transposed() {
            // block messages carry the address in the header
            (Some(header_bytes), info.elem_size_bits_reg / 8 * info.elems_per_addr)
        } else {
            let addr = round_up(info.addr_size_bits / 8 * simd, grf);
            let data = round_up(info.elem_size_bits_reg / 8 * simd, grf) * info.elems_per_addr;
            // typed messages take a variable number of coordinates
            let src0 = (!info.has(MsgAttrs::HAS_UVRLOD)).then_some(header_bytes + addr);
            (src0, data)
        };
        info.src0_len_bytes = src0;
        match op.class() {
            SendOpClass::Load => {
                info.dst_len_bytes = Some(data);
                info.src1_len_bytes = Some(0);
            }
            SendOpClass::Store => {
                info.dst_len_bytes = Some(0);
                info.src1_len_bytes = Some(data);
            }
            _ => {
                let returns = info.has(MsgAttrs::ATOMIC_RETURNS);
                info.dst_len_bytes = Some(if returns { data } else { 0 });
                info.src1_len_bytes = Some(data * op.atomic_args());
            }
        }
        if self.d.result().is_ok() {
            self.d.check_lengths();
        }
    }

    fn decode_dcro(&mut self) {
        match self.d.desc_bits(14, 5) {
            mt @ (0x00 | 0x01) => {
                let (sym, what) = if mt == 0 {
                    ("const_load_block", "constant oword block read")
                } else {
                    ("unaligned_const_load_block", "constant unaligned oword block read")
                };
                self.message_type(what);
                self.set_ow_block(sym, what, SendOp::Load, 32);
                self.decode_invalidate_after_read();
                self.finish(Header::Required);
            }
            0x03 => {
                let what = "constant dword gathering read";
                self.message_type(what);
                let elems = self.decode_elems();
                let simd = self.decode_sm2(8);
                self.decode_legacy_simd_mode();
                self.set_message(HdcMessage::new("const_load", what, SendOp::Load, 32, 32, elems, simd));
                self.decode_invalidate_after_read();
                self.finish(Header::Optional);
            }
            _ => {
                self.message_type("?");
                self.d.error(14, 5, "unsupported DCRO op");
            }
        }
    }

    fn decode_dc0(&mut self) {
        match self.d.desc_bits(14, 5) {
            DC0_OWB_READ => {
                self.message_type("oword block read");
                self.set_ow_block("load_block", "oword block read", SendOp::Load, 32);
                self.finish(Header::Required);
            }
            DC0_OWAB_READ => {
                self.message_type("aligned block read");
                self.set_ow_block("aligned_load_block128", "oword aligned block read", SendOp::Load, 32);
                self.finish(Header::Required);
            }
            DC0_OWB_WRITE => {
                self.message_type("oword block write");
                self.set_ow_block("store_block", "oword block write", SendOp::Store, 32);
                self.finish(Header::Required);
            }
            DC0_HWAB_WRITE => {
                self.message_type("hword aligned block write");
                self.set_ow_block("aligned_store_block", "aligned oword block write", SendOp::Store, 32);
                self.finish(Header::Required);
            }
            mt @ (DC0_OWDB_READ | DC0_OWDB_WRITE) => {
                let what = if mt == DC0_OWDB_READ {
                    "oword dual block read"
                } else {
                    "oword dual block write"
                };
                self.message_type(what);
                self.d.info().description = what.to_string();
                decode_header(self.d, Header::Required);
                self.d.error(14, 5, format!("{} decode not supported", what));
            }
            mt @ (DC0_BS_READ | DC0_BS_WRITE) => self.decode_dc0_byte_scattered(mt == DC0_BS_READ),
            mt @ (DC0_DWS_READ | DC0_DWS_WRITE) => {
                let read = mt == DC0_DWS_READ;
                let what = if read { "dword gathering read" } else { "dword scattering write" };
                self.message_type(what);
                let elems = self.decode_elems();
                let simd = self.decode_sm2(8);
                self.decode_legacy_simd_mode();
                let description = if elems == 1 {
                    what.to_string()
                } else {
                    format!("{} x{}", what, elems)
                };
                let (sym, op) = if read { ("load", SendOp::Load) } else { ("store", SendOp::Store) };
                self.set_message(HdcMessage::new(sym, description, op, 32, 32, elems, simd));
                self.decode_invalidate_after_read();
                self.finish(Header::Optional);
            }
            DC0_FENCE => self.decode_dc0_fence(),
            _ if self.d.desc_bit(18) => self.decode_dc0_scratch(),
            _ => {
                self.message_type("?");
                self.d.error(14, 5, "unsupported DC0 op");
            }
        }
    }

    /// Each channel occupies a dword in the register file; memory holds
    /// 1, 2 or 4 bytes per address.
    fn decode_dc0_byte_scattered(&mut self, read: bool) {
        let what = if read { "byte gathering read" } else { "byte scattering write" };
        self.message_type(what);
        let bytes = self.decode_byte_size("DataSize");
        let simd = self.decode_sm2(8);
        let (sym, op) = if read { ("load", SendOp::Load) } else { ("store", SendOp::Store) };
        let description = format!("{} {}b", what, 8 * bytes);
        self.set_message(HdcMessage::new(sym, description, op, 32, 32, 1, simd).mem_bits(8 * bytes));
        self.decode_invalidate_after_read();
        self.finish(Header::Optional);
    }

    fn decode_dc0_fence(&mut self) {
        self.message_type("fence");
        let mut sym = String::new();
        let mut description = String::new();
        if self.d.decode_bit("Commit", 13, "off (return immediately)", "on (wait for fence commit)") {
            sym.push_str("sync_");
            description.push_str("synchronized ");
        }
        let bti = self.decode_bti();
        let mut attrs = MsgAttrs::empty();
        match bti {
            SLM_BTI => {
                sym.push_str("slm_fence");
                description.push_str("SLM fence");
                attrs |= MsgAttrs::SLM;
            }
            0 => {
                sym.push_str("global_fence");
                description.push_str("global fence flushing");
                if self.d.desc_bits(9, 4) != 0 && self.d.desc_bit(8) {
                    self.d.error(8, 1, "L3 flush implies L1 flush");
                }
                if self.d.decode_bit("L1Flush", 8, "no L1 flush", "flush L1") {
                    sym.push_str(".l1");
                    description.push_str(" L1");
                }
                let targets = self.d.decode_field("L3FlushTargets", 9, 4, |_, targets| {
                    if targets == 0xF {
                        "all L3 data".to_string()
                    } else {
                        format!("{:#x}", targets)
                    }
                });
                if targets == 0xF {
                    sym.push_str(".dcti");
                    description.push_str(" all L3 data");
                } else if targets != 0 {
                    sym.push('.');
                    description.push_str(" L3");
                    let kinds = [
                        (3, 'd', "r/w data"),
                        (2, 'c', "constant data"),
                        (1, 't', "texture data"),
                        (0, 'i', "instruction data"),
                    ];
                    for (bit, c, what) in kinds {
                        if targets & (1 << bit) != 0 {
                            sym.push(c);
                            description.push(' ');
                            description.push_str(what);
                        }
                    }
                }
            }
            _ => self.d.error(0, 8, "invalid BTI for fence (must be 0x0 or 0xFE)"),
        }
        let syntax = self.d.syntax();
        syntax.mnemonic = sym.clone();
        syntax.layout = Layout::Control;
        self.d.set_special_op(SendOp::Fence, sym, description, 1, 1);
        let info = self.d.info();
        info.attrs |= attrs;
        info.addr_type = AddrType::Flat;
        info.surface = Some(SendDesc::Imm(bti));
        self.finish(Header::Required);
    }

    /// HWord scratch blocks, selected by Desc[18]. Desc[17] picks write,
    /// Desc[13:12] the block count, Desc[11:0] the offset in HWords.
    fn decode_dc0_scratch(&mut self) {
        let read = !self.d.desc_bit(17);
        let what = if read {
            "hword scratch block read"
        } else {
            "hword scratch block write"
        };
        self.message_type(what);
        let (sym, op) = if read {
            ("load_block", SendOp::Load)
        } else {
            ("store_block", SendOp::Store)
        };
        self.set_hw_block(sym, what, op, 32, (12, 2), MsgAttrs::SCRATCH);
        let hwords = self.d.decode_field("HWordOffset", 0, 12, |_, v| format!("{} HWords from scratch base", v));
        self.d.info().immediate_offset = 32 * hwords as i32;
        self.finish(Header::Required);
    }

    fn decode_dc1(&mut self) {
        match self.d.desc_bits(14, 5) {
            mt @ (DC1_US_READ | DC1_US_WRITE | DC1_A64_US_READ | DC1_A64_US_WRITE) => {
                let read = mt == DC1_US_READ || mt == DC1_A64_US_READ;
                let a64 = mt & 0x10 != 0;
                let what = match (a64, read) {
                    (false, true) => "untyped surface read",
                    (false, false) => "untyped surface write",
                    (true, true) => "a64 untyped surface read",
                    (true, false) => "a64 untyped surface write",
                };
                self.message_type(what);
                let description = format!("{} with {}", what, enabled_channels(self.d.desc_bits(8, 4)));
                let elems = self.decode_cmask();
                let simd = self.decode_sm3();
                let (sym, op) = if read {
                    ("untyped_load", SendOp::LoadQuad)
                } else {
                    ("untyped_store", SendOp::StoreQuad)
                };
                let addr_bits = if a64 { 64 } else { 32 };
                self.set_message(
                    HdcMessage::new(sym, description, op, addr_bits, 32, elems, simd).attrs(MsgAttrs::HAS_CHMASK),
                );
                self.finish(if a64 { Header::Forbidden } else { Header::Optional });
            }
            mt @ (DC1_A64_BS_READ | DC1_A64_BS_WRITE) => self.decode_dc1_a64_scattered(mt == DC1_A64_BS_READ),
            mt @ (DC1_A64_BLOCK_READ | DC1_A64_BLOCK_WRITE) => self.decode_dc1_a64_block(mt == DC1_A64_BLOCK_READ),
            DC1_A64_FLOAT_ATOMIC => {
                self.set_float_atomic("a64 float atomic", 64);
                self.finish(Header::Forbidden);
            }
            DC1_FLOAT_ATOMIC => {
                self.set_float_atomic("float atomic", 32);
                self.finish(Header::Optional);
            }
            DC1_A64_INT_ATOMIC => {
                // the SIMD mode bit selects the data width instead
                let wide = self.d.decode_bit("DataWidth", 12, "32b", "64b");
                let data_bits = if wide { 64 } else { 32 };
                self.set_int_atomic("untyped", "a64 atomic int", 64, data_bits, 8, MsgAttrs::empty());
                self.finish(Header::Forbidden);
            }
            DC1_INT_ATOMIC => {
                let simd = self.decode_sm2r(12);
                self.set_int_atomic("untyped", "atomic int32", 32, 32, simd, MsgAttrs::empty());
                self.finish(Header::Optional);
            }
            mt @ (DC1_MB_READ | DC1_MB_WRITE) => self.decode_dc1_media_block(mt == DC1_MB_READ),
            mt @ (DC1_TS_READ | DC1_TS_WRITE) => self.decode_dc1_typed(mt == DC1_TS_READ),
            DC1_ATOMIC_COUNTER => {
                let simd = self.decode_sm2r(12);
                self.set_int_atomic("typed", "atomic 32-bit counter", 32, 32, simd, MsgAttrs::HAS_UVRLOD);
                self.finish(Header::Required);
            }
            DC1_TYPED_ATOMIC => {
                let high = self.d.decode_bit("SlotGroup", 12, "SG8L", "SG8U");
                let kind = if high { "typed_sgh" } else { "typed" };
                self.set_int_atomic(
                    kind,
                    "atomic 32-bit integer",
                    32,
                    32,
                    8,
                    MsgAttrs::TYPED | MsgAttrs::HAS_UVRLOD,
                );
                self.finish(Header::Optional);
            }
            _ => {
                self.message_type("?");
                self.d.error(14, 5, "unsupported DC1 op");
            }
        }
    }

    /// Desc[9:8] picks byte, dword, qword or byte-with-status elements.
    fn decode_dc1_a64_scattered(&mut self, read: bool) {
        let subtype = self.d.desc_bits(8, 2);
        let (sym, op) = if read { ("load", SendOp::Load) } else { ("store", SendOp::Store) };
        if subtype == 0 || subtype == 3 {
            let what = if read {
                "a64 byte gathering read"
            } else {
                "a64 byte scattering write"
            };
            self.message_type(what);
            let meaning = if subtype == 0 { "byte" } else { "byte with status return" };
            self.d.add_field("SubType", 8, 2, u64::from(subtype), meaning);
            if subtype == 3 && !read {
                self.d.error(8, 2, "a64 byte scattering write cannot return status");
            }
            let bytes = self.decode_byte_size("DataSize");
            let simd = self.decode_sm2(12);
            let description = format!("{} {}b", what, 8 * bytes);
            self.set_message(HdcMessage::new(sym, description, op, 64, 32, 1, simd).mem_bits(8 * bytes));
        } else {
            let dword = subtype == 1;
            self.message_type(if read { "a64 gathering read" } else { "a64 scattering write" });
            self.d.add_field("SubType", 8, 2, u64::from(subtype), if dword { "dword" } else { "qword" });
            let elems = self.decode_elems();
            let simd = self.decode_sm2(12);
            let what = match (dword, read) {
                (true, true) => "a64 dword gathering read",
                (true, false) => "a64 dword scattering write",
                (false, true) => "a64 qword gathering read",
                (false, false) => "a64 qword scattering write",
            };
            let data_bits = if dword { 32 } else { 64 };
            self.set_message(HdcMessage::new(sym, what, op, 64, data_bits, elems, simd));
        }
        self.decode_invalidate_after_read();
        self.finish(Header::Forbidden);
    }

    fn decode_dc1_a64_block(&mut self, read: bool) {
        self.message_type(if read { "a64 block read" } else { "a64 block write" });
        let subtype = self.d.decode_field("SubType", 11, 2, |_, enc| {
            let meaning = match enc {
                0 => "oword unaligned",
                1 => "oword aligned",
                3 => "hword unaligned",
                _ => "dual block",
            };
            meaning.to_string()
        });
        if subtype == 2 {
            self.d.error(11, 2, "a64 dual block read/write unsupported");
            decode_header(self.d, Header::Required);
            return;
        }
        let hword = subtype == 3;
        let aligned = subtype == 1;
        let mut sym = String::from(if read { "load_block" } else { "store_block" });
        if aligned {
            sym.push_str("_aligned");
        }
        let what = format!(
            "a64 {} {} block {}",
            if aligned { "aligned" } else { "unaligned" },
            if hword { "hword" } else { "oword" },
            if read { "read" } else { "write" }
        );
        let op = if read { SendOp::Load } else { SendOp::Store };
        if hword {
            self.set_hw_block(&sym, &what, op, 64, (8, 3), MsgAttrs::empty());
        } else {
            self.set_ow_block(&sym, &what, op, 64);
        }
        self.decode_invalidate_after_read();
        self.finish(Header::Required);
    }

    /// Media blocks move rows of bytes; the size comes from the
    /// response or message length in the descriptor.
    fn decode_dc1_media_block(&mut self, read: bool) {
        let what = if read { "media block read" } else { "media block write" };
        self.message_type(what);
        let grf = self.d.grf_bytes();
        let bytes = if read {
            grf * self.d.desc_bits(20, 5)
        } else {
            match self.d.desc_bits(25, 4) {
                0 => {
                    self.d.error(25, 4, "mlen == 0 on write");
                    0
                }
                mlen => grf * (mlen - 1),
            }
        };
        self.d.decode_field("VerticalLineStride", 8, 3, |_, enc| {
            if enc == 0 {
                "none".to_string()
            } else {
                format!("override {:#x}", enc)
            }
        });
        let (sym, op) = if read { ("mbrd", SendOp::Load) } else { ("mbwr", SendOp::Store) };
        self.set_message(HdcMessage::new(sym, what, op, 32, 8, bytes, 1).attrs(MsgAttrs::TRANSPOSED));
        self.finish(Header::Required);
    }

    fn decode_dc1_typed(&mut self, read: bool) {
        let mut description = String::from(if read { "typed surface read" } else { "typed surface write" });
        self.message_type(description.clone());
        let mut sym = String::from(if read { "typed_load" } else { "typed_store" });
        let slot_group = self.d.desc_bits(12, 2);
        let meaning = match slot_group {
            0 => "SG4x2",
            1 => "SG8L",
            2 => "SG8U",
            _ => "?",
        };
        self.d.add_field("SlotGroup", 12, 2, u64::from(slot_group), meaning);
        if slot_group == 3 {
            self.d.error(12, 2, "invalid slot group");
        }
        if slot_group == 2 {
            description.push_str(" (high slot group)");
            sym.push_str("_sgh");
        }
        description.push_str(" with ");
        description.push_str(&enabled_channels(self.d.desc_bits(8, 4)));
        let elems = self.decode_cmask();
        let op = if read { SendOp::LoadQuad } else { SendOp::StoreQuad };
        self.set_message(
            HdcMessage::new(sym, description, op, 32, 32, elems, 8)
                .attrs(MsgAttrs::HAS_CHMASK | MsgAttrs::HAS_UVRLOD | MsgAttrs::TYPED),
        );
        self.finish(Header::Optional);
    }
}

#[cfg(test)]
mod test {
    use crate::{
        ir::{Platform, SendDesc, Sfid},
        messages::{decode_message, AddrType, CacheOpt, MessageInput, MsgAttrs, SendOp},
    };

    fn decode(sfid: Sfid, desc: u32) -> crate::messages::DecodeResult {
        decode_message(&MessageInput::new(Platform::Gen9, sfid, desc, 0))
    }

    #[test]
    fn untyped_read_xyz() {
        // SIMD16, w disabled, bti 5
        let desc = (0x01 << 14) | (1 << 12) | (0x8 << 8) | 5;
        let r = decode(Sfid::Dc1, desc);
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!(r.info.op, Some(SendOp::LoadQuad));
        assert_eq!(r.info.exec_width, Some(16));
        assert_eq!(r.info.elems_per_addr, 3);
        assert_eq!(r.info.channels_enabled, 0x7);
        assert_eq!(r.info.surface, Some(SendDesc::Imm(5)));
        assert_eq!(r.info.symbol, "hdc_untyped_load_simd16.bti[5].a32.d32.xyz");
        assert_eq!(r.info.dst_len_bytes, Some(3 * 64));
    }

    #[test]
    fn all_channels_disabled() {
        let desc = (0x09 << 14) | (1 << 12) | (0xF << 8) | 5;
        let r = decode(Sfid::Dc1, desc);
        assert_eq!(r.errors.len(), 1);
        assert_eq!(r.errors[0].offset, 8);
    }

    #[test]
    fn slm_dword_scatter() {
        // SIMD8 write, legacy SIMD mode set
        let desc = (0x0B << 14) | (1 << 9) | 0xFE;
        let r = decode(Sfid::Dc0, desc);
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!(r.info.op, Some(SendOp::Store));
        assert!(r.info.has(MsgAttrs::SLM));
        assert_eq!(r.info.addr_type, AddrType::Flat);
        assert_eq!(r.info.exec_width, Some(8));
        assert_eq!(r.info.src1_len_bytes, Some(32));
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn oword_block_high_half() {
        let desc = (1 << 19) | (1 << 8) | 0xFF;
        let r = decode(Sfid::Dc0, desc);
        assert!(r.is_ok(), "{:?}", r.errors);
        assert!(r.info.has(MsgAttrs::EXPAND_HIGH));
        assert!(r.info.is_transposed());
        assert_eq!(r.info.caching_l1, CacheOpt::Uncached);
        assert_eq!(r.info.dst_len_bytes, Some(32));
        assert_eq!(r.info.src0_len_bytes, Some(32));
    }

    #[test]
    fn oword_block_requires_header() {
        let r = decode(Sfid::Dc0, 3 << 8);
        assert_eq!(r.errors.len(), 1);
        assert_eq!(r.errors[0].offset, 19);
    }

    #[test]
    fn scratch_write() {
        // 2 HWords at HWord offset 4
        let desc = (1 << 19) | (1 << 18) | (1 << 17) | (1 << 12) | 4;
        let r = decode(Sfid::Dc0, desc);
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!(r.info.op, Some(SendOp::Store));
        assert!(r.info.has(MsgAttrs::SCRATCH));
        assert_eq!(r.info.elems_per_addr, 2);
        assert_eq!(r.info.immediate_offset, 128);
        assert_eq!(r.info.src1_len_bytes, Some(64));
    }

    #[test]
    fn global_fence() {
        let desc = (1 << 19) | (0x07 << 14) | (1 << 13) | (0xF << 9);
        let r = decode(Sfid::Dc0, desc);
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!(r.info.op, Some(SendOp::Fence));
        assert_eq!(r.info.symbol, "sync_global_fence.dcti");
        assert!(r.syntax.is_control());
    }

    #[test]
    fn untyped_atomic_iadd_with_return() {
        let desc = (0x02 << 14) | (1 << 13) | (0x7 << 8) | 3;
        let r = decode(Sfid::Dc1, desc);
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!(r.info.op, Some(SendOp::AtomicIadd));
        assert!(r.info.has(MsgAttrs::ATOMIC_RETURNS));
        assert_eq!(r.info.exec_width, Some(16));
        assert_eq!(r.info.symbol, "hdc_untyped_atomic_iadd_ret_simd16.bti[3].a32.d32");
        assert_eq!(r.info.dst_len_bytes, Some(64));
        assert_eq!(r.info.src1_len_bytes, Some(64));
    }

    #[test]
    fn a64_atomic_needs_stateless_bti() {
        let desc = (0x12 << 14) | (0x5 << 8) | 7;
        let r = decode(Sfid::Dc1, desc);
        assert_eq!(r.info.op, Some(SendOp::AtomicIinc));
        assert_eq!(r.errors.len(), 1);
        assert_eq!((r.errors[0].offset, r.errors[0].len), (0, 8));
    }

    #[test]
    fn float_atomic_unknown_op() {
        let r = decode(Sfid::Dc1, (0x1B << 14) | (0x5 << 8));
        assert!(!r.is_ok());
        assert!(r.info.op.is_none());
    }

    #[test]
    fn dc2_and_unknown_types() {
        let r = decode(Sfid::Dc2, 0);
        assert_eq!(r.errors[0].message, "unsupported DC2 op");
        let r = decode(Sfid::Dc1, 0x1F << 14);
        assert_eq!(r.errors[0].message, "unsupported DC1 op");
        let r = decode(Sfid::Dcro, 0x02 << 14);
        assert_eq!(r.errors[0].message, "unsupported DCRO op");
    }
}
