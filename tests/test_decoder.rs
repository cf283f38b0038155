use xe_gfx_disasm::{
    decoder::{DecodeOptions, Decoded, KernelDecoder},
    ged::{Field, FieldEncoder, NativeInst, OperandField},
    ir::{
        ExecSize, HorzStride, InstOpts, MaskCtrl, Op, OperandKind, Platform, SendDesc, Sfid, SourceIndex, Type,
        VertStride, Width,
    },
    Decoder,
};

fn decode(platform: Platform, bytes: &[u8]) -> Decoded {
    KernelDecoder::new(DecodeOptions::new(platform).numeric_labels(true)).decode_kernel(bytes)
}

fn decode_blocks(platform: Platform, bytes: &[u8]) -> Decoded {
    KernelDecoder::new(DecodeOptions::new(platform)).decode_kernel(bytes)
}

fn inst(platform: Platform, opcode: u64) -> NativeInst {
    let mut inst = NativeInst::new(platform);
    inst.set(Field::Opcode, opcode).unwrap();
    inst
}

fn jmpi(platform: Platform, jip: i64) -> [u8; 16] {
    let mut inst = inst(platform, 0x20);
    inst.set(Field::Src(1, OperandField::RegFile), 3).unwrap();
    inst.set(Field::Src(1, OperandField::DataType), Type::D as u64).unwrap();
    inst.set(Field::Jip, jip as u64).unwrap();
    inst.to_bytes()
}

fn nop(platform: Platform) -> [u8; 16] {
    let opcode = if platform >= Platform::Xe { 0x60 } else { 0x7E };
    inst(platform, opcode).to_bytes()
}

fn concat(parts: &[&[u8]]) -> Vec<u8> {
    parts.iter().flat_map(|p| p.iter().copied()).collect()
}

#[test]
fn test_empty_kernel() {
    let decoded = decode(Platform::XeHpg, &[]);
    assert_eq!(decoded.kernel.blocks().len(), 0);
    assert_eq!(decoded.kernel.instruction_count(), 0);
    assert!(decoded.diagnostics.is_empty());
}

#[test]
fn test_truncated_buffer() {
    let decoded = decode(Platform::Gen9, &[0x01, 0x02, 0x03]);
    assert_eq!(decoded.kernel.instruction_count(), 0);
    assert_eq!(decoded.diagnostics.warnings.len(), 1);
    assert_eq!(decoded.diagnostics.warnings[0].message, "unexpected padding at end of kernel");
}

#[test]
fn test_trailing_padding_is_a_warning() {
    let mut bytes = nop(Platform::Gen9).to_vec();
    bytes.extend_from_slice(&[0, 0]);
    let decoded = decode(Platform::Gen9, &bytes);
    assert_eq!(decoded.kernel.instruction_count(), 1);
    assert!(!decoded.diagnostics.has_errors());
    assert_eq!(decoded.diagnostics.warnings.len(), 1);
    assert_eq!(decoded.diagnostics.warnings[0].pc, Some(16));
}

#[test]
fn test_jmpi_scaling() {
    let label = |platform| {
        let decoded = decode(platform, &jmpi(platform, 10));
        assert!(!decoded.diagnostics.has_errors(), "{:?}", decoded.diagnostics);
        let inst = decoded.kernel.instructions().next().cloned().unwrap();
        assert_eq!(inst.op, Op::Jmpi);
        inst.src(SourceIndex::Src0).and_then(|s| s.as_label()).map(|l| l.pc_delta)
    };
    assert_eq!(label(Platform::Gen7), Some(80));
    assert_eq!(label(Platform::Gen7p5), Some(80));
    assert_eq!(label(Platform::Gen8), Some(10));
    assert_eq!(label(Platform::Gen9), Some(10));
}

#[test]
fn test_block_inference() {
    // jmpi over one nop: blocks start at 0, after the jump and at the target
    let p = Platform::Gen9;
    let bytes = concat(&[&jmpi(p, 16), &nop(p), &nop(p)]);
    let decoded = decode_blocks(p, &bytes);
    assert!(!decoded.diagnostics.has_errors(), "{:?}", decoded.diagnostics);
    let offsets: Vec<u32> = decoded.kernel.blocks().iter().map(|b| b.offset).collect();
    assert_eq!(offsets, vec![0, 16, 32]);

    let jump = decoded.kernel.find_instruction(0).unwrap();
    let label = jump.src(SourceIndex::Src0).and_then(|s| s.as_label()).unwrap();
    assert_eq!(label.target, Some(32));
    assert!(jump.to_string().contains("L32"));
}

#[test]
fn test_numeric_labels_keep_one_block() {
    let p = Platform::Gen9;
    let bytes = concat(&[&jmpi(p, 16), &nop(p), &nop(p)]);
    let decoded = decode(p, &bytes);
    assert_eq!(decoded.kernel.blocks().len(), 1);
    assert_eq!(decoded.kernel.blocks()[0].offset, 0);
    assert_eq!(decoded.kernel.instruction_count(), 3);
}

#[test]
fn test_compacted_is_reported() {
    let mut compacted = [0u8; 8];
    compacted[3] = 0x20;
    let bytes = concat(&[&compacted, &nop(Platform::Gen9)]);
    let decoded = decode(Platform::Gen9, &bytes);

    let insts: Vec<_> = decoded.kernel.instructions().collect();
    assert_eq!(insts.len(), 2);
    assert!(insts[0].is_illegal());
    assert!(insts[0].is_compacted());
    assert_eq!(insts[0].size(), 8);
    assert_eq!(insts[1].pc, 8);
    assert_eq!(insts[1].op, Op::Nop);
    assert_eq!(decoded.diagnostics.errors.len(), 1);
    assert!(decoded.diagnostics.errors[0].message.contains("no compacted form"));
}

#[test]
fn test_bad_opcodes() {
    // rol exists from GEN11 on, 0x7F never
    for opcode in [0x0F, 0x7F] {
        let decoded = decode(Platform::Gen9, &inst(Platform::Gen9, opcode).to_bytes());
        let first = decoded.kernel.instructions().next().unwrap();
        assert!(first.is_illegal());
        assert!(first.comment.as_deref().map_or(false, |c| !c.is_empty()));
        assert_eq!(decoded.diagnostics.errors.len(), 1);
        assert_eq!(decoded.diagnostics.errors[0].pc, Some(0));
    }
    let decoded = decode(Platform::Gen11, &inst(Platform::Gen11, 0x0F).to_bytes());
    assert_eq!(decoded.kernel.instructions().next().unwrap().op, Op::Rol);
}

#[test]
fn test_illegal_keeps_decoding() {
    let p = Platform::XeHpg;
    let bytes = concat(&[&inst(p, 0x7F).to_bytes(), &nop(p)]);
    let decoded = decode(p, &bytes);
    let ops: Vec<_> = decoded.kernel.instructions().map(|i| i.op).collect();
    assert_eq!(ops, vec![Op::Illegal, Op::Nop]);
    let ids: Vec<_> = decoded.kernel.instructions().map(|i| i.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn test_basic_mov() {
    let p = Platform::Gen9;
    let mut mov = inst(p, 0x01);
    mov.set(Field::ExecSize, 3).unwrap();
    mov.set(Field::Dst(OperandField::RegFile), 1).unwrap();
    mov.set(Field::Dst(OperandField::DataType), Type::F as u64).unwrap();
    mov.set(Field::Dst(OperandField::RegNum), 10).unwrap();
    mov.set(Field::Dst(OperandField::HorzStride), HorzStride::H1 as u64).unwrap();
    mov.set(Field::Src(0, OperandField::RegFile), 1).unwrap();
    mov.set(Field::Src(0, OperandField::DataType), Type::F as u64).unwrap();
    mov.set(Field::Src(0, OperandField::RegNum), 20).unwrap();
    mov.set(Field::Src(0, OperandField::VertStride), VertStride::Vs8 as u64).unwrap();
    mov.set(Field::Src(0, OperandField::Width), Width::W8 as u64).unwrap();
    mov.set(Field::Src(0, OperandField::HorzStride), HorzStride::H1 as u64).unwrap();

    let decoded = decode(p, &mov.to_bytes());
    assert!(!decoded.diagnostics.has_errors(), "{:?}", decoded.diagnostics);
    let inst = decoded.kernel.instructions().next().unwrap();
    assert_eq!(inst.op, Op::Mov);
    assert_eq!(inst.exec_size, ExecSize::Simd8);
    let dst = inst.dst.as_ref().unwrap();
    assert_eq!(dst.ty, Some(Type::F));
    assert!(matches!(dst.kind, OperandKind::Direct { .. }));
    let src = inst.src(SourceIndex::Src0).unwrap();
    assert_eq!(src.ty, Some(Type::F));
    assert!(inst.to_string().starts_with("mov (8|M0)"));
}

#[test]
fn test_gen7_word_layout() {
    // (f1.0) mov (8|M0) r2.0<1>:f r3.0<8;8,1>:f {NoMask}, laid out by hand
    let bits: u128 = 0x01
        | (1 << 9)
        | (1 << 16)
        | (3 << 21)
        | (1 << 32)
        | (7 << 34)
        | (1 << 37)
        | (7 << 39)
        | (2 << 53)
        | (1 << 61)
        | (3 << 69)
        | (1 << 80)
        | (3 << 82)
        | (4 << 85)
        | (1 << 90);
    for p in [Platform::Gen7, Platform::Gen7p5] {
        let decoded = decode(p, &bits.to_le_bytes());
        assert!(!decoded.diagnostics.has_errors(), "{:?}", decoded.diagnostics);
        let inst = decoded.kernel.instructions().next().unwrap();
        assert_eq!(inst.op, Op::Mov);
        assert_eq!(inst.exec_size, ExecSize::Simd8);
        assert_eq!(inst.mask_ctrl, MaskCtrl::NoMask);
        assert!(inst.predication.is_some());
        assert_eq!((inst.flag_reg.reg_num, inst.flag_reg.sub_reg_num), (1, 0));
        assert_eq!(inst.dst.as_ref().and_then(|d| d.ty), Some(Type::F));
        assert_eq!(inst.src(SourceIndex::Src0).and_then(|s| s.ty), Some(Type::F));
    }
}

#[test]
fn test_gen7_send() {
    // send (8|M0) r4:ud r2:ud 0xC 0x02100000 {EOT}, SFID in the condition modifier slot
    let desc: u128 = 0x0210_0000;
    let bits: u128 = 0x31
        | (3 << 21)
        | (12 << 24)
        | (1 << 32)
        | (4 << 53)
        | (1 << 37)
        | (2 << 69)
        | (3 << 42)
        | (desc << 96)
        | (1 << 127);
    let decoded = decode(Platform::Gen7p5, &bits.to_le_bytes());
    assert!(!decoded.diagnostics.has_errors(), "{:?}", decoded.diagnostics);
    let inst = decoded.kernel.instructions().next().unwrap();
    assert_eq!(inst.op, Op::Send);
    assert!(inst.opts.contains(InstOpts::EOT));
    let send = inst.send.as_ref().unwrap();
    assert_eq!(send.sfid, Sfid::Dc1);
    assert_eq!(send.desc, SendDesc::Imm(0x0210_0000));
    assert_eq!(send.ex_desc, SendDesc::Imm(12));
    assert_eq!((send.src0_len, send.dst_len), (Some(1), Some(1)));
}

#[test]
fn test_swsb_on_xe() {
    let p = Platform::XeHpg;
    let mut sync = inst(p, 0x01);
    sync.set(Field::Src(0, OperandField::RegFile), 0).unwrap();
    sync.set(Field::Swsb, 0x32).unwrap();
    let decoded = decode(p, &sync.to_bytes());
    let inst = decoded.kernel.instructions().next().unwrap();
    assert_eq!(inst.op, Op::Sync);
    assert!(inst.swsb.has_token());
    assert_eq!(inst.swsb.sbid, 2);
}

#[test]
fn test_decoder_trait() {
    let decoder = KernelDecoder::new(DecodeOptions::new(Platform::Gen9));
    let decoded = decoder.decode(&nop(Platform::Gen9)[..]).unwrap();
    assert_eq!(decoded.kernel.instruction_count(), 1);
}

#[test]
fn test_dependencies_are_cached() {
    let decoded = decode(Platform::Gen9, &nop(Platform::Gen9));
    let first: *const _ = decoded.kernel.dependencies();
    let second: *const _ = decoded.kernel.dependencies();
    assert_eq!(first, second);
}
