//! Sampler messages, XE and later.

use super::{
    other::{decode_header, Header},
    AddrType, Layout, MessageDecoder, SendOp,
};
use crate::ir::SendDesc;

/// `(symbol, description, parameters)` for SIMD8/SIMD16 messages.
fn simd_op(enc: u32) -> Option<(&'static str, &'static str, u32)> {
    Some(match enc {
        0x00 => ("sample", "sample", 4),
        0x01 => ("sample_b", "sample+LOD bias", 5),
        0x02 => ("sample_l", "sample override LOD", 5),
        0x03 => ("sample_c", "sample compare", 5),
        0x04 => ("sample_d", "sample gradient", 10),
        0x05 => ("sample_b_c", "sample compare+LOD bias", 6),
        0x06 => ("sample_l_c", "sample compare+override LOD", 6),
        0x07 => ("sample_ld", "sample load", 4),
        0x08 => ("sample_gather4", "sample gather4", 4),
        0x09 => ("sample_lod", "sample override lod", 4),
        0x0A => ("sample_resinfo", "sample res info", 1),
        0x0B => ("sample_info", "sample info", 0),
        0x0C => ("sample_killpix", "sample+killpix", 3),
        0x10 => ("sample_gather4_c", "sample gather4+compare", 5),
        0x11 => ("sample_gather4_po", "sample gather4+pixel offset", 5),
        0x12 => ("sample_gather4_po_c", "sample gather4 pixel offset+compare", 6),
        0x14 => ("sample_d_c", "sample derivatives+compare", 11),
        0x16 => ("sample_min", "sample min", 2),
        0x17 => ("sample_max", "sample max", 2),
        0x18 => ("sample_lz", "sample with lod forced to 0", 4),
        0x19 => ("sample_c_lz", "sample compare+with lod forced to 0", 5),
        0x1A => ("sample_ld_lz", "sample load with lod forced to 0", 3),
        0x1C => ("sample_ld2dms_w", "sample ld2 multi-sample wide", 7),
        0x1D => ("sample_ld_mcs", "sample load mcs auxiliary data", 4),
        0x1E => ("sample_ld2dms", "sample load multi-sample", 6),
        0x1F => ("sample_ld2ds", "sample multi-sample without mcs", 6),
        _ => return None,
    })
}

/// SIMD32/64 messages reuse the opcode space.
fn simd32_op(enc: u32) -> Option<(&'static str, &'static str, u32)> {
    Some(match enc {
        0x00 => ("sample_unorm", "sample unorm", 4),
        0x02 => ("sample_unorm_killpix", "sample unorm+killpix", 4),
        0x08 => ("sample_deinterlace", "sample deinterlace", 4),
        0x0A => ("sample_unorm_killpix_media", "sample unorm+killpix for media", 4),
        0x0B => ("sample_8x8", "sample 8x8", 4),
        0x0C => ("sample_unorm_media", "sample unorm for media", 4),
        0x1F => ("sample_flush", "sampler cache flush", 0),
        _ => return None,
    })
}

pub(super) fn decode(d: &mut MessageDecoder<'_>) {
    let simd2 = d.decode_bit("SIMD[2]", 29, "", "");
    let simd01 = d.desc_bits(17, 2);
    let (simd_sym, simd_desc, simd) = match simd01 | (u32::from(simd2) << 2) {
        1 => ("simd8", "simd8", 8),
        2 => ("simd16", "simd16", 16),
        3 => ("simd32", "simd32/64", 32),
        5 => ("simd8h", "simd8 high", 8),
        6 => ("simd16h", "simd16 high", 16),
        _ => {
            d.add_field("SIMD[1:0]", 17, 2, u64::from(simd01), "?");
            d.error(17, 2, "invalid sampler SIMD mode");
            return;
        }
    };
    d.add_field("SIMD[1:0]", 17, 2, u64::from(simd01), simd_desc);

    let half = d.decode_bit("ReturnFormat", 30, "32b", "16b");
    let enc = d.desc_bits(12, 5);
    let entry = if simd == 32 { simd32_op(enc) } else { simd_op(enc) };
    let (mnemonic, what, params, op) = match entry {
        Some((sym, what, params)) => {
            let op = if sym == "sample_flush" {
                SendOp::SamplerFlush
            } else {
                SendOp::SamplerLoad
            };
            (sym.to_string(), what, params, Some(op))
        }
        None => (format!("sample_{:X}?", enc), "?", 0, None),
    };
    d.add_field("SamplerMessageType", 12, 5, u64::from(enc), what);
    if op.is_none() {
        d.error(12, 5, "unsupported sampler message");
    }

    let index = d.decode_field("SamplerIndex", 8, 4, |_, index| format!("sampler {}", index));
    let bti = d.decode_field("BTI", 0, 8, |_, bti| format!("surface {}", bti));
    decode_header(d, Header::Optional);

    let data_sfx = if half { "_16" } else { "" };
    let symbol = format!("{}{}_{}[{},{}]", simd_sym, data_sfx, mnemonic, index, bti);
    let description = format!(
        "{}{} {} using sampler index {}",
        simd_desc,
        if half { " 16b" } else { "" },
        what,
        index
    );

    let syntax = d.syntax();
    syntax.mnemonic = mnemonic;
    syntax.controls = format!(".{}{}", simd_sym, if half { ".d16" } else { ".d32" });
    syntax.surface = format!("bti[{}]", bti);
    syntax.layout = Layout::Load;

    let bits = if half { 16 } else { 32 };
    let info = d.info();
    info.op = op;
    info.symbol = symbol;
    info.description = description;
    info.addr_type = AddrType::Bti;
    info.surface = Some(SendDesc::Imm(bti));
    info.addr_size_bits = 32;
    info.elem_size_bits_mem = bits;
    info.elem_size_bits_reg = bits;
    info.elems_per_addr = params;
    info.exec_width = Some(simd);
}

#[cfg(test)]
mod test {
    use crate::{
        ir::{Platform, SendDesc, Sfid},
        messages::{decode_message, MessageInput, SendOp},
    };

    #[test]
    fn sample_l_simd16() {
        let desc = (2 << 17) | (0x02 << 12) | (1 << 8) | 7;
        let r = decode_message(&MessageInput::new(Platform::XeHpg, Sfid::Smpl, desc, 0));
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!(r.info.op, Some(SendOp::SamplerLoad));
        assert_eq!(r.info.exec_width, Some(16));
        assert_eq!(r.info.elems_per_addr, 5);
        assert_eq!(r.info.surface, Some(SendDesc::Imm(7)));
        assert_eq!(r.info.symbol, "simd16_sample_l[1,7]");
    }

    #[test]
    fn sampler_flush_is_simd32_only() {
        let flush = (3 << 17) | (0x1F << 12);
        let r = decode_message(&MessageInput::new(Platform::Xe, Sfid::Smpl, flush, 0));
        assert_eq!(r.info.op, Some(SendOp::SamplerFlush));
        let r = decode_message(&MessageInput::new(Platform::Xe, Sfid::Smpl, (1 << 17) | (0x1F << 12), 0));
        assert_eq!(r.info.op, Some(SendOp::SamplerLoad));
    }

    #[test]
    fn invalid_simd_mode() {
        let r = decode_message(&MessageInput::new(Platform::Xe, Sfid::Smpl, 0, 0));
        assert_eq!(r.errors.len(), 1);
        assert!(r.info.op.is_none());
    }

    #[test]
    fn sampler_before_xe_is_unsupported() {
        let r = decode_message(&MessageInput::new(Platform::Gen11, Sfid::Smpl, 2 << 17, 0));
        assert!(!r.is_ok());
    }
}
