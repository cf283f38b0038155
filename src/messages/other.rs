//! Fixed-function units with small descriptors: gateway, render cache,
//! thread spawner, bindless thread dispatch, ray tracing and the pre-LSC URB.

use super::{AddrType, Layout, MessageDecoder, SendOp};
use crate::ir::SendDesc;

/// What a message allows in its header bit, Desc[19].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Header {
    Forbidden,
    Optional,
    Required,
}

pub(super) fn decode_header(d: &mut MessageDecoder<'_>, policy: Header) -> bool {
    let present = d.decode_bit("HeaderPresent", 19, "no header", "header present");
    match policy {
        Header::Forbidden if present => d.error(19, 1, "this message forbids a header"),
        Header::Required if !present => d.error(19, 1, "this message requires a header"),
        _ => {}
    }
    present
}

fn control_op(d: &mut MessageDecoder<'_>, op: SendOp, description: &str, src0_regs: u32, dst_regs: u32) {
    let syntax = d.syntax();
    syntax.mnemonic = op.mnemonic().to_string();
    syntax.layout = Layout::Control;
    d.set_special_op(op, op.mnemonic(), description, src0_regs, dst_regs);
}

fn finish(d: &mut MessageDecoder<'_>) {
    if d.result().is_ok() {
        d.check_lengths();
    }
}

pub(super) fn decode_gateway(d: &mut MessageDecoder<'_>) {
    let enc = d.desc_bits(0, 3);
    let (op, description) = match enc {
        1 => (Some(SendOp::SignalEvent), "signal event"),
        2 => (Some(SendOp::Monitor), "monitor event"),
        3 => (Some(SendOp::Unmonitor), "unmonitor event"),
        4 => (Some(SendOp::Barrier), "barrier"),
        6 => (Some(SendOp::Wait), "wait for event"),
        _ => (None, "?"),
    };
    d.add_field("GatewayOpcode", 0, 3, u64::from(enc), description);
    match op {
        Some(op) => control_op(d, op, description, 1, 0),
        None => d.error(0, 3, "unsupported GTWY op"),
    }
    decode_header(d, Header::Forbidden);
    finish(d);
}

const RT_WRITE: u32 = 0xC;
const RT_READ: u32 = 0xD;

/// `rtw.{f16,f32}.{simd8,simd16,rep16,lo8ds,hi8ds}{.cpo}{.psp}{.lrts}{.sgh}`
/// and `rtr.f32.{simd8,simd16}{.psp}{.sgh}`.
pub(super) fn decode_render_cache(d: &mut MessageDecoder<'_>) {
    let mt = d.desc_bits(14, 4);
    let (mnemonic, what, op) = match mt {
        RT_WRITE => ("rtw", "render target write", Some(SendOp::RenderWrite)),
        RT_READ => ("rtr", "render target read", Some(SendOp::RenderRead)),
        _ => ("rt", "unknown render target op", None),
    };
    d.add_field("MessageTypeRC", 14, 4, u64::from(mt), what);
    if op.is_none() {
        d.error(14, 4, "unsupported RC op");
    }

    let mut controls = String::new();
    let half = d.decode_bit("DataSize", 30, "FP32", "FP16");
    let mut description = if half {
        if mt == RT_READ {
            d.warning(30, 1, "half-precision not supported on render target read");
        }
        controls.push_str(".f16");
        format!("half-precision {}", what)
    } else {
        controls.push_str(".f32");
        format!("full-precision {}", what)
    };

    let subop = d.desc_bits(8, 3);
    let shape = match (mt, subop) {
        (RT_WRITE, 0) => Some((".simd16", " SIMD16", 16)),
        (RT_WRITE, 1) => Some((".rep16", " replicated SIMD16", 16)),
        (RT_WRITE, 2) => Some((".lo8ds", " of low SIMD8", 8)),
        (RT_WRITE, 3) => Some((".hi8ds", " of high SIMD8", 8)),
        (RT_WRITE, 4) => Some((".simd8", " SIMD8", 8)),
        (RT_READ, 0) => Some((".simd16", " SIMD16", 16)),
        (RT_READ, 1) => Some((".simd8", " SIMD8", 8)),
        _ => None,
    };
    let exec_width = match shape {
        Some((sym, desc, width)) => {
            controls.push_str(sym);
            description.push_str(desc);
            d.add_field("Subop", 8, 3, u64::from(subop), sym);
            Some(width)
        }
        None => {
            controls.push_str(".???");
            d.add_field("Subop", 8, 3, u64::from(subop), "?");
            if op.is_some() {
                d.error(8, 3, "unknown render target subop");
            }
            None
        }
    };

    if mt == RT_WRITE && d.decode_bit("PerCoarsePixelPSOutputs", 18, "disabled", "enabled") {
        description.push_str(" with per-coarse pixel PS outputs");
        controls.push_str(".cpo");
    }
    if d.decode_bit("PerSamplePS", 13, "disabled", "enabled") {
        description.push_str(" with per-sample PS outputs");
        controls.push_str(".psp");
    }
    if mt == RT_WRITE && d.decode_bit("LastRenderTargetSelect", 12, "false", "true") {
        description.push_str("; last render target");
        controls.push_str(".lrts");
    }
    if d.decode_bit("SlotGroupSelect", 11, "SLOTGRP_LO", "SLOTGRP_HI") {
        description.push_str(" slot group high");
        controls.push_str(".sgh");
    }
    let bti = d.decode_field("BTS", 0, 8, |_, bti| format!("surface {}", bti));
    description.push_str(&format!(" to surface {}", bti));
    decode_header(d, Header::Optional);

    let syntax = d.syntax();
    syntax.mnemonic = mnemonic.to_string();
    syntax.controls = controls;
    syntax.surface = format!("bti[{}]", bti);
    syntax.layout = Layout::Control;
    let symbol = format!("{}{}.bti[{}]", mnemonic, syntax.controls, bti);

    let bits = if half { 16 } else { 32 };
    let info = d.info();
    info.op = op;
    info.symbol = symbol;
    info.description = description;
    info.exec_width = exec_width;
    info.elem_size_bits_mem = bits;
    info.elem_size_bits_reg = bits;
    info.addr_type = AddrType::Bti;
    info.addr_size_bits = 0;
    info.surface = Some(SendDesc::Imm(bti));
}

pub(super) fn decode_ts(d: &mut MessageDecoder<'_>) {
    let enc = d.desc_bits(0, 3);
    if enc != 0 {
        d.add_field("TSOpcode", 0, 3, u64::from(enc), "?");
        d.error(0, 32, "unsupported TS op");
        return;
    }
    d.add_field("TSOpcode", 0, 3, 0, "end of thread");
    control_op(d, SendOp::Eot, "end of thread", 1, 0);
    finish(d);
}

/// Bindless thread dispatch.
pub(super) fn decode_btd(d: &mut MessageDecoder<'_>) {
    let enc = d.desc_bits(14, 4);
    let (op, description, src0_regs) = match enc {
        1 => (Some(SendOp::Spawn), "spawn bindless threads", 2),
        2 => (Some(SendOp::StackIdRelease), "release stack IDs", 1),
        _ => (None, "?", 0),
    };
    d.add_field("BTDOpcode", 14, 4, u64::from(enc), description);
    match op {
        Some(op) => control_op(d, op, description, src0_regs, 0),
        None => d.error(14, 4, "unsupported BTD op"),
    }
    decode_header(d, Header::Forbidden);
    finish(d);
}

/// Ray tracing accelerator. Every descriptor is a trace_ray; the ray
/// payload is a single register of pointers.
pub(super) fn decode_rta(d: &mut MessageDecoder<'_>) {
    d.add_reserved(0, 14);
    d.add_field("RTAOpcode", 14, 4, u64::from(d.desc_bits(14, 4)), "trace ray");
    if d.desc_bits(14, 4) != 0 {
        d.error(14, 4, "unsupported RTA op");
    }
    control_op(d, SendOp::TraceRay, "trace ray", 1, 0);
    decode_header(d, Header::Forbidden);
    finish(d);
}

const URB_WRITE_DW: u32 = 7;
const URB_READ_DW: u32 = 8;

/// SIMD8 dword read and write on platforms without LSC URB.
pub(super) fn decode_urb(d: &mut MessageDecoder<'_>) {
    let enc = d.desc_bits(0, 4);
    let (op, mnemonic) = match enc {
        URB_WRITE_DW => (SendOp::Store, "urb_dword_write"),
        URB_READ_DW => (SendOp::Load, "urb_dword_read"),
        _ => {
            d.add_field("URBOpcode", 0, 4, u64::from(enc), "?");
            d.error(0, 4, "unsupported URB op");
            return;
        }
    };
    d.add_field("URBOpcode", 0, 4, u64::from(enc), mnemonic);
    let owords = d.decode_field("GlobalUrbOffset", 4, 11, |_, v| format!("{} (in owords)", v));

    let mut description = String::from("urb dword ");
    let elems = if op == SendOp::Store {
        let masked = d.decode_bit("ChannelMaskEnable", 15, "disabled", "enabled");
        if masked {
            description.push_str("masked ");
        }
        description.push_str("write");
        // SIMD8 writes one to eight dwords, per the payload length
        match d.desc_bits(32 + 6, 5) {
            0 => 1,
            xlen => xlen,
        }
    } else {
        description.push_str("read");
        d.desc_bits(20, 5)
    };
    if d.decode_bit("PerSlotOffsetPresent", 17, "", "per-slot offset in payload") {
        description.push_str(" with per-slot offset enabled");
    }
    decode_header(d, Header::Required);

    let syntax = d.syntax();
    syntax.mnemonic = mnemonic.to_string();
    syntax.layout = if op == SendOp::Load { Layout::Load } else { Layout::Store };
    let info = d.info();
    info.op = Some(op);
    info.symbol = mnemonic.to_string();
    info.description = description;
    info.addr_type = AddrType::Flat;
    info.addr_size_bits = 32;
    info.elem_size_bits_mem = 32;
    info.elem_size_bits_reg = 32;
    info.elems_per_addr = elems;
    info.exec_width = Some(8);
    info.immediate_offset = 8 * owords as i32;
}

#[cfg(test)]
mod test {
    use crate::{
        ir::{Platform, Sfid},
        messages::{decode_message, MessageInput, SendOp},
    };

    #[test]
    fn gateway_barrier() {
        let r = decode_message(&MessageInput::new(Platform::XeHpg, Sfid::Gtwy, 4, 0));
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!(r.info.op, Some(SendOp::Barrier));
        assert_eq!(r.info.src0_len_bytes, Some(32));
        assert_eq!(r.info.symbol, "barrier");
    }

    #[test]
    fn gateway_header_forbidden() {
        let r = decode_message(&MessageInput::new(Platform::XeHpg, Sfid::Gtwy, 4 | (1 << 19), 0));
        assert_eq!(r.errors.len(), 1);
        assert_eq!(r.errors[0].offset, 19);
    }

    #[test]
    fn render_target_write() {
        // rtw.f32.simd8.lrts to bti 2
        let desc = (0xC << 14) | (4 << 8) | (1 << 12) | 2;
        let r = decode_message(&MessageInput::new(Platform::Xe, Sfid::Rc, desc, 0));
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!(r.info.op, Some(SendOp::RenderWrite));
        assert_eq!(r.info.exec_width, Some(8));
        assert_eq!(r.info.symbol, "rtw.f32.simd8.lrts.bti[2]");
    }

    #[test]
    fn render_target_read_half() {
        let desc = (0xD << 14) | (1 << 30);
        let r = decode_message(&MessageInput::new(Platform::Xe, Sfid::Rc, desc, 0));
        assert!(r.is_ok());
        assert_eq!(r.warnings.len(), 1);
    }

    #[test]
    fn end_of_thread() {
        let r = decode_message(&MessageInput::new(Platform::Gen9, Sfid::Ts, 0, 0));
        assert_eq!(r.info.op, Some(SendOp::Eot));
        let r = decode_message(&MessageInput::new(Platform::Gen9, Sfid::Ts, 5, 0));
        assert_eq!(r.errors[0].to_string(), "Desc[31:0]: unsupported TS op");
    }

    #[test]
    fn legacy_urb_read() {
        // read 4 dwords at oword 3, with header
        let desc = 8 | (3 << 4) | (1 << 19) | (4 << 20);
        let r = decode_message(&MessageInput::new(Platform::Gen9, Sfid::Urb, desc, 0));
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!(r.info.op, Some(SendOp::Load));
        assert_eq!(r.info.elems_per_addr, 4);
        assert_eq!(r.info.immediate_offset, 24);
    }

    #[test]
    fn btd_and_rta() {
        let r = decode_message(&MessageInput::new(Platform::XeHpg, Sfid::Btd, 1 << 14, 0));
        assert_eq!(r.info.op, Some(SendOp::Spawn));
        assert_eq!(r.info.src0_len_bytes, Some(64));
        let r = decode_message(&MessageInput::new(Platform::XeHpg, Sfid::Rta, 0, 0));
        assert_eq!(r.info.op, Some(SendOp::TraceRay));
        let r = decode_message(&MessageInput::new(Platform::Xe, Sfid::Btd, 1 << 14, 0));
        assert!(!r.is_ok());
    }
}
