use xe_gfx_disasm::{
    ir::{ExecSize, Instruction, Op, Platform, SendDesc, SendInfo, Sfid, Subfunction},
    messages::{
        cache, decode_message, encode_descriptors, AddrType, CacheOpt, DecodeResult, MessageInput, SendOp,
        VectorMessageArgs,
    },
    model::Format,
};

fn decode(platform: Platform, sfid: Sfid, desc: u32, ex_desc: u32) -> DecodeResult {
    decode_message(&MessageInput::new(platform, sfid, desc, ex_desc).exec_size(ExecSize::Simd16))
}

fn assert_fields_disjoint(r: &DecodeResult) {
    for (i, a) in r.fields.iter().enumerate() {
        for b in &r.fields[i + 1..] {
            assert!(!a.overlaps(b.offset, b.len), "{} overlaps {}", a, b);
        }
    }
}

#[test]
fn test_lsc_stateful_load_xe3() {
    // load, STATEFUL_A32, .d32, x1
    let desc = (0x3 << 14) | (2 << 11);
    let r = decode(Platform::Xe3, Sfid::Ugm, desc, 0);
    assert!(r.is_ok(), "{:?}", r.errors);
    assert_eq!(r.info.op, Some(SendOp::Load));
    assert_eq!(r.info.addr_type, AddrType::Surf);
    assert_eq!(r.info.addr_size_bits, 32);
    let lanes = r.info.exec_width.unwrap_or(16).max(16);
    assert_eq!(r.info.src0_len_bytes, Some(4 * lanes));
    assert_fields_disjoint(&r);
}

#[test]
fn test_lsc_legacy_loads_and_stores() {
    for platform in [Platform::XeHpg, Platform::XeHpc, Platform::Xe2] {
        for op in [SendOp::Load, SendOp::Store] {
            let mut vma = VectorMessageArgs::new(Sfid::Ugm, op);
            vma.data_vector_size = 2;
            let (ex_desc, desc) = encode_descriptors(platform, &vma).unwrap();
            let r = decode(platform, Sfid::Ugm, desc.imm().unwrap(), ex_desc.imm().unwrap());
            assert!(r.is_ok(), "{:?} {:?}: {:?}", platform, op, r.errors);
            assert_eq!(r.info.op, Some(op));
            assert_eq!(r.info.elems_per_addr, 2);
            assert!(r.syntax.sym().starts_with(op.mnemonic()));
            assert_fields_disjoint(&r);
        }
    }
}

#[test]
fn test_cache_tables_resolve() {
    let ops = [SendOp::Load, SendOp::Store, SendOp::AtomicIadd];
    for platform in [Platform::XeHpg, Platform::Xe2, Platform::Xe3] {
        for op in ops {
            let table = cache::table(platform, op).unwrap();
            for cc in table {
                assert_eq!(cache::lookup(table, cc.encoding), Some(cc));
            }
        }
    }
}

#[test]
fn test_unknown_cache_encoding_is_one_error() {
    // atomics only define a few encodings on XE2
    let (off, _) = cache::field(Platform::Xe2);
    let desc = 0x0C | (2 << 9) | (3 << 7) | (0x7 << off);
    let r = decode(Platform::Xe2, Sfid::Ugm, desc, 0);
    assert_eq!(r.errors.iter().filter(|e| e.offset == off).count(), 1);
}

#[test]
fn test_reserved_ex_desc_bits() {
    // load.ugm.d32.a64
    let desc = (3 << 7) | (2 << 9);
    for platform in [Platform::XeHpg, Platform::XeHpc, Platform::Xe2] {
        let r = decode(platform, Sfid::Ugm, desc, 0x40);
        assert_eq!(r.errors.len(), 1, "{:?}", r.errors);
        assert_eq!((r.errors[0].offset, r.errors[0].len), (32, 12));
        assert!(r.errors[0].message.contains("ExDesc[11:0]"));

        assert!(decode(platform, Sfid::Ugm, desc, 0).is_ok());
    }
}

#[test]
fn test_register_descriptor_is_an_error() {
    let mut input = MessageInput::new(Platform::XeHpg, Sfid::Ugm, 0, 0);
    input.desc = SendDesc::Reg(Default::default());
    let r = decode_message(&input);
    assert!(!r.is_ok());
    assert!(r.fields.is_empty());
}

#[test]
fn test_unrouted_sfid_is_unsupported() {
    let r = decode(Platform::Gen9, Sfid::Vme, 0, 0);
    assert_eq!(r.errors.len(), 1);
    assert_eq!(r.errors[0].message, "unsupported SFID for this platform");
}

#[test]
fn test_hdc_untyped_surface() {
    for (mt, op) in [(0x01, SendOp::LoadQuad), (0x09, SendOp::StoreQuad)] {
        // SIMD8, x and y enabled, bti 2
        let desc = (mt << 14) | (2 << 12) | (0xC << 8) | 2;
        let r = decode(Platform::Gen9, Sfid::Dc1, desc, 0);
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!(r.info.op, Some(op));
        assert_eq!(r.info.exec_width, Some(8));
        assert_eq!(r.info.elems_per_addr, 2);
        assert_eq!(r.info.addr_type, AddrType::Bti);
        assert!(r.info.symbol.ends_with(".bti[2].a32.d32.xy"), "{}", r.info.symbol);
        assert_fields_disjoint(&r);
    }
}

#[test]
fn test_hdc_scattered() {
    // byte gathering read of 2 bytes, SIMD16, stateless
    let desc = (0x04 << 14) | (1 << 10) | (1 << 8) | 0xFD;
    let r = decode(Platform::Gen9, Sfid::Dc0, desc, 0);
    assert!(r.is_ok(), "{:?}", r.errors);
    assert_eq!(r.info.op, Some(SendOp::Load));
    assert_eq!((r.info.elem_size_bits_mem, r.info.elem_size_bits_reg), (16, 32));
    assert_eq!(r.info.caching_l1, CacheOpt::Cached);
    assert_fields_disjoint(&r);

    // a64 qword scattering write, x2
    let desc = (0x1A << 14) | (1 << 10) | (2 << 8) | 0xFF;
    let r = decode(Platform::Gen11, Sfid::Dc1, desc, 0);
    assert!(r.is_ok(), "{:?}", r.errors);
    assert_eq!(r.info.op, Some(SendOp::Store));
    assert_eq!(r.info.addr_size_bits, 64);
    assert_eq!(r.info.elem_size_bits_reg, 64);
    assert_eq!(r.info.elems_per_addr, 2);
    assert_fields_disjoint(&r);
}

#[test]
fn test_hdc_oword_block() {
    // 4 OWords from bti 1, header required
    let desc = (1 << 19) | (3 << 8) | 1;
    let r = decode(Platform::Gen9, Sfid::Dc0, desc, 0);
    assert!(r.is_ok(), "{:?}", r.errors);
    assert!(r.info.is_block());
    assert_eq!(r.info.elems_per_addr, 4);
    assert_eq!(r.info.dst_len_bytes, Some(64));
    assert_eq!(r.info.symbol, "hdc_load_block.bti[1].a32.d128x4");
    assert_fields_disjoint(&r);

    let r = decode(Platform::Gen9, Sfid::Dcro, desc, 0);
    assert!(r.is_ok(), "{:?}", r.errors);
    assert!(r.info.symbol.starts_with("hdc_const_load_block"));
}

#[test]
fn test_hdc_untyped_atomic() {
    // SIMD8 integer compare and swap, no return
    let desc = (0x02 << 14) | (1 << 12) | (0xE << 8) | 4;
    let r = decode(Platform::Gen9, Sfid::Dc1, desc, 0);
    assert!(r.is_ok(), "{:?}", r.errors);
    assert_eq!(r.info.op, Some(SendOp::AtomicIcas));
    assert_eq!(r.info.exec_width, Some(8));
    assert_eq!(r.info.dst_len_bytes, Some(0));
    assert_eq!(r.info.src1_len_bytes, Some(64));
    assert_fields_disjoint(&r);

    // encoding 0 is the 64b compare and swap
    let r = decode(Platform::Gen9, Sfid::Dc1, desc & !(0xF << 8), 0);
    assert_eq!(r.info.op, Some(SendOp::AtomicIcas));
    assert_eq!(r.info.elem_size_bits_reg, 64);
}

#[test]
fn test_gateway_barrier() {
    let r = decode(Platform::XeHpg, Sfid::Gtwy, 0x4, 0);
    assert!(r.is_ok(), "{:?}", r.errors);
    assert!(r.syntax.is_control());
    assert_fields_disjoint(&r);
}

#[test]
fn test_from_instruction() {
    let mut inst = Instruction::new(Op::Send, Format::SendBinary, Subfunction::Send(Sfid::Ugm));
    inst.exec_size = ExecSize::Simd16;
    inst.send = Some(SendInfo {
        sfid: Sfid::Ugm,
        desc: SendDesc::Imm((3 << 7) | (2 << 9) | (4 << 17)),
        // low bits carry instruction fields, not message bits
        ex_desc: SendDesc::Imm(0xFFF),
        src0_len: Some(4),
        src1_len: Some(0),
        dst_len: Some(2),
    });
    let input = MessageInput::from_instruction(Platform::XeHpg, &inst).unwrap();
    assert_eq!(input.ex_desc, SendDesc::Imm(0));
    let r = decode_message(&input);
    assert!(r.is_ok(), "{:?}", r.errors);
    assert_eq!(r.info.caching_l1, CacheOpt::Cached);
    assert_eq!(r.syntax.controls, ".ugm.d32.a64.ca.ca");

    let plain = Instruction::new(Op::Nop, Format::Nullary, Subfunction::None);
    assert!(MessageInput::from_instruction(Platform::XeHpg, &plain).is_none());
}
