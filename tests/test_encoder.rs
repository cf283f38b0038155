use xe_gfx_disasm::{
    decoder::{DecodeOptions, KernelDecoder},
    encoder::{EncodeError, Encoder},
    ged::{Field, FieldEncoder, NativeInst, OperandField},
    ir::{
        Block, ExecSize, HorzStride, InstOpts, Instruction, Kernel, Op, Operand, Platform, RegName, RegRef, Region,
        SendDesc, SendInfo, Sfid, SourceIndex, Subfunction, Swsb, SwsbEncodeMode, SwsbInstType, SyncFc, Type,
        VertStride, Width,
    },
    model::Format,
};

fn listing(kernel: &Kernel) -> Vec<String> {
    kernel.instructions().map(|i| format!("{} {}", i.pc, i)).collect()
}

fn gen9_kernel() -> Vec<u8> {
    let p = Platform::Gen9;
    let mut jmpi = NativeInst::new(p);
    jmpi.set(Field::Opcode, 0x20).unwrap();
    jmpi.set(Field::Src(1, OperandField::RegFile), 3).unwrap();
    jmpi.set(Field::Src(1, OperandField::DataType), Type::D as u64).unwrap();
    jmpi.set(Field::Jip, 16).unwrap();

    let mut mov = NativeInst::new(p);
    mov.set(Field::Opcode, 0x01).unwrap();
    mov.set(Field::ExecSize, 3).unwrap();
    mov.set(Field::Dst(OperandField::RegFile), 1).unwrap();
    mov.set(Field::Dst(OperandField::DataType), Type::UD as u64).unwrap();
    mov.set(Field::Dst(OperandField::RegNum), 3).unwrap();
    mov.set(Field::Dst(OperandField::HorzStride), HorzStride::H1 as u64).unwrap();
    mov.set(Field::Src(0, OperandField::RegFile), 1).unwrap();
    mov.set(Field::Src(0, OperandField::DataType), Type::UD as u64).unwrap();
    mov.set(Field::Src(0, OperandField::RegNum), 7).unwrap();
    mov.set(Field::Src(0, OperandField::VertStride), VertStride::Vs8 as u64).unwrap();
    mov.set(Field::Src(0, OperandField::Width), Width::W8 as u64).unwrap();
    mov.set(Field::Src(0, OperandField::HorzStride), HorzStride::H1 as u64).unwrap();

    let mut nop = NativeInst::new(p);
    nop.set(Field::Opcode, 0x7E).unwrap();

    [jmpi.to_bytes(), mov.to_bytes(), nop.to_bytes()].concat()
}

fn xe_kernel(platform: Platform) -> Kernel {
    let mut add = Instruction::new(Op::Add, Format::BasicBinaryRegRegImm, Subfunction::None);
    add.exec_size = ExecSize::Simd16;
    add.dst = Some(Operand::grf(10, 0, Region::DST1, Type::F));
    add.set_src(SourceIndex::Src0, Operand::grf(20, 0, Region::SRC881, Type::F));
    add.set_src(SourceIndex::Src1, Operand::immediate(0x4000_0000, Type::F));

    let mut sync = Instruction::new(Op::Sync, Format::SyncUnary, Subfunction::Sync(SyncFc::Allwr));
    sync.set_src(SourceIndex::Src0, Operand::null(Type::UB));
    let (swsb, _) = Swsb::decode(0x01, SwsbEncodeMode::ThreeDistPipe, SwsbInstType::Other, 16);
    sync.swsb = swsb;

    let mut send = Instruction::new(Op::Send, Format::SendBinary, Subfunction::Send(Sfid::Ugm));
    send.exec_size = ExecSize::Simd16;
    send.dst = Some(Operand::direct(RegName::Null, RegRef::ZERO, Region::DST1, Some(Type::UD)));
    send.set_src(SourceIndex::Src0, Operand::direct(RegName::Grf, RegRef::new(2, 0), Region::NONE, None));
    send.set_src(SourceIndex::Src1, Operand::direct(RegName::Grf, RegRef::new(10, 0), Region::NONE, None));
    send.opts = InstOpts::EOT;
    send.send = Some(SendInfo {
        sfid: Sfid::Ugm,
        desc: SendDesc::Imm(0x0400_0504),
        ex_desc: SendDesc::Imm(2 << 6),
        src0_len: Some(2),
        src1_len: Some(2),
        dst_len: Some(0),
    });

    let mut block = Block::new(0);
    for (ix, mut inst) in [add, sync, send].into_iter().enumerate() {
        inst.pc = ix as u32 * 16;
        inst.id = ix as u32 + 1;
        block.instructions.push(inst);
    }
    Kernel::with_blocks(platform, vec![block])
}

#[test]
fn test_gen9_decode_encode_decode() {
    let p = Platform::Gen9;
    let bytes = gen9_kernel();
    let decoder = KernelDecoder::new(DecodeOptions::new(p));
    let first = decoder.decode_kernel(&bytes);
    assert!(!first.diagnostics.has_errors(), "{:?}", first.diagnostics);

    let encoded = Encoder::new(p).encode_kernel(&first.kernel).unwrap();
    assert_eq!(encoded.len(), bytes.len());
    let second = decoder.decode_kernel(&encoded);
    assert!(!second.diagnostics.has_errors(), "{:?}", second.diagnostics);
    assert_eq!(listing(&first.kernel), listing(&second.kernel));
    let offsets: Vec<u32> = second.kernel.blocks().iter().map(|b| b.offset).collect();
    assert_eq!(offsets, vec![0, 16, 32]);
}

#[test]
fn test_xe_encode_is_stable() {
    for platform in [Platform::XeHp, Platform::XeHpg] {
        let kernel = xe_kernel(platform);
        let encoder = Encoder::new(platform);
        let bytes = encoder.encode_kernel(&kernel).unwrap();
        assert_eq!(bytes.len(), 48);

        let decoded = KernelDecoder::new(DecodeOptions::new(platform).numeric_labels(true)).decode_kernel(&bytes);
        assert!(!decoded.diagnostics.has_errors(), "{:?}", decoded.diagnostics);
        let ops: Vec<Op> = decoded.kernel.instructions().map(|i| i.op).collect();
        assert_eq!(ops, vec![Op::Add, Op::Sync, Op::Send]);

        let send = decoded.kernel.find_instruction(32).unwrap();
        assert!(send.opts.contains(InstOpts::EOT));
        assert_eq!(send.send.as_ref().map(|s| s.src1_len), Some(Some(2)));

        assert_eq!(encoder.encode_kernel(&decoded.kernel).unwrap(), bytes);
    }
}

#[test]
fn test_platform_mismatch() {
    let kernel = xe_kernel(Platform::XeHpg);
    assert!(matches!(
        Encoder::new(Platform::Xe).encode_kernel(&kernel),
        Err(EncodeError::Unsupported(_))
    ));
}

#[test]
fn test_errors_carry_the_pc() {
    let mut kernel = xe_kernel(Platform::Gen11);
    // sync does not exist before XE
    let err = Encoder::new(Platform::Gen11).encode_kernel(&kernel).unwrap_err();
    assert!(matches!(err, EncodeError::At { pc: 0, .. } | EncodeError::At { pc: 16, .. }));

    kernel = Kernel::with_blocks(Platform::Gen11, vec![]);
    assert_eq!(Encoder::new(Platform::Gen11).encode_kernel(&kernel).unwrap(), Vec::<u8>::new());
}
