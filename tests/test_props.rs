use proptest::prelude::*;
use xe_gfx_disasm::{
    decoder::{DecodeOptions, KernelDecoder},
    ir::{ExecSize, Platform, Sfid},
    messages::{decode_message, MessageInput},
};

fn platform() -> impl Strategy<Value = Platform> {
    prop::sample::select(Platform::ALL.to_vec())
}

fn sfid() -> impl Strategy<Value = Sfid> {
    prop::sample::select(vec![
        Sfid::Ugm,
        Sfid::Slm,
        Sfid::Tgm,
        Sfid::Urb,
        Sfid::Smpl,
        Sfid::Gtwy,
        Sfid::Rc,
        Sfid::Ts,
        Sfid::Btd,
        Sfid::Rta,
        Sfid::Dc0,
        Sfid::Dc1,
        Sfid::Dcro,
    ])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn random_bytes_decode_without_panicking(
        platform in platform(),
        bytes in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let decoded = KernelDecoder::new(DecodeOptions::new(platform)).decode_kernel(&bytes);
        for inst in decoded.kernel.instructions() {
            if inst.is_illegal() {
                prop_assert!(inst.comment.as_deref().map_or(false, |c| !c.is_empty()));
            }
        }
        // dependency analysis must cope with whatever was decoded
        let _ = decoded.kernel.dependencies();
    }

    #[test]
    fn instruction_lengths_follow_compaction(
        platform in platform(),
        bytes in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let decoded = KernelDecoder::new(DecodeOptions::new(platform).numeric_labels(true)).decode_kernel(&bytes);
        let mut cursor = 0usize;
        for inst in decoded.kernel.instructions() {
            prop_assert_eq!(inst.pc as usize, cursor);
            let compacted = bytes[cursor + 3] & 0x20 != 0;
            prop_assert_eq!(inst.size(), if compacted { 8 } else { 16 });
            cursor += inst.size() as usize;
        }
        let padding = decoded
            .diagnostics
            .warnings
            .iter()
            .filter(|w| w.message == "unexpected padding at end of kernel")
            .count();
        prop_assert_eq!(padding, usize::from(cursor != bytes.len()));
    }

    #[test]
    fn decoding_is_deterministic(
        platform in platform(),
        bytes in prop::collection::vec(any::<u8>(), 0..128),
    ) {
        let decoder = KernelDecoder::new(DecodeOptions::new(platform));
        let a = decoder.decode_kernel(&bytes);
        let b = decoder.decode_kernel(&bytes);
        prop_assert_eq!(a.kernel.blocks(), b.kernel.blocks());
        prop_assert_eq!(a.diagnostics, b.diagnostics);
    }

    #[test]
    fn message_fields_never_overlap(
        platform in platform(),
        sfid in sfid(),
        desc in any::<u32>(),
        ex_desc in any::<u32>(),
    ) {
        let input = MessageInput::new(platform, sfid, desc, ex_desc).exec_size(ExecSize::Simd16);
        let r = decode_message(&input);
        for (i, a) in r.fields.iter().enumerate() {
            for b in &r.fields[i + 1..] {
                prop_assert!(!a.overlaps(b.offset, b.len), "{} overlaps {}", a, b);
            }
        }
    }
}
