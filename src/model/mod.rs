//! Platform model: which operations exist where, and the platform facts the
//! decoder and encoder branch on.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::ir::{Era, MathFc, Op, Platform, SwsbEncodeMode};

mod opspec;
pub use opspec::{Format, OpAttrs, OpSpec};
use opspec::OP_SPECS;

lazy_static! {
    static ref OPCODE_INDEX: HashMap<(Era, u8), Vec<&'static OpSpec>> = {
        let mut index: HashMap<(Era, u8), Vec<&'static OpSpec>> = HashMap::new();
        for spec in OP_SPECS.iter() {
            if let Some(code) = spec.gen_code {
                index.entry((Era::Gen, code)).or_default().push(spec);
            }
            if let Some(code) = spec.xe_code {
                index.entry((Era::Xe, code)).or_default().push(spec);
            }
        }
        index
    };
    static ref OP_INDEX: HashMap<Op, Vec<&'static OpSpec>> = {
        let mut index: HashMap<Op, Vec<&'static OpSpec>> = HashMap::new();
        for spec in OP_SPECS.iter() {
            index.entry(spec.op).or_default().push(spec);
        }
        index
    };
}

/// First spec registered for an op, used for platform-independent queries such
/// as the mnemonic.
pub fn op_spec(op: Op) -> &'static OpSpec {
    match OP_INDEX.get(&op).and_then(|specs| specs.first()) {
        Some(spec) => spec,
        // every Op has at least one table entry
        None => &OP_SPECS[0],
    }
}

/// Outcome of looking up a raw opcode on a platform.
#[derive(Debug, Clone, Copy)]
pub enum OpcodeLookup {
    Valid(&'static OpSpec),
    /// The encoding names an op, but not one this platform supports
    WrongPlatform(&'static OpSpec),
    Unmapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Model {
    pub platform: Platform,
}

impl Model {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    pub fn lookup_opcode(&self, raw: u64) -> OpcodeLookup {
        let specs = match u8::try_from(raw).ok().and_then(|code| OPCODE_INDEX.get(&(self.platform.era(), code))) {
            Some(specs) => specs,
            None => return OpcodeLookup::Unmapped,
        };
        match specs.iter().find(|s| s.supported_on(self.platform)) {
            Some(spec) => OpcodeLookup::Valid(spec),
            None => OpcodeLookup::WrongPlatform(specs[0]),
        }
    }

    pub fn spec_for(&self, op: Op) -> Option<&'static OpSpec> {
        OP_INDEX
            .get(&op)?
            .iter()
            .copied()
            .find(|s| s.supported_on(self.platform))
    }

    /// Format a `math` takes for the given function, if that function exists here.
    pub fn math_format(&self, fc: MathFc) -> Option<Format> {
        opspec::math_format(fc, self.platform)
    }

    pub fn swsb_mode(&self) -> Option<SwsbEncodeMode> {
        match self.platform {
            p if p < Platform::Xe => None,
            Platform::Xe => Some(SwsbEncodeMode::SingleDistPipe),
            Platform::XeHp | Platform::XeHpg => Some(SwsbEncodeMode::ThreeDistPipe),
            _ => Some(SwsbEncodeMode::FourDistPipe),
        }
    }

    pub fn supports_align16(&self) -> bool {
        self.platform < Platform::Xe
    }
    pub fn supports_align1_ternary(&self) -> bool {
        self.platform >= Platform::Gen10
    }
    /// Dependency-check and thread-control options only exist before SWSB.
    pub fn supports_dep_ctrl(&self) -> bool {
        self.platform < Platform::Xe
    }
    pub fn supports_thread_switch(&self) -> bool {
        self.platform < Platform::Xe
    }
    /// Send destinations carry an explicit type only on GEN.
    pub fn send_has_dst_type(&self) -> bool {
        self.platform < Platform::Xe
    }
    /// The Align16 context-save trick that reads acc2..acc9 through ChanSel.
    pub fn uses_align16_acc_hack(&self) -> bool {
        (Platform::Gen8..=Platform::Gen9p5).contains(&self.platform)
    }

    /// Number of 32-bit flag registers (`f0`, `f1`, ...).
    pub fn flag_reg_count(&self) -> u16 {
        if self.platform >= Platform::XeHpc {
            4
        } else {
            2
        }
    }

    /// JIP/UIP were encoded in QWORDs before GEN8.
    pub fn pc_scale(&self, op: Op) -> i32 {
        if self.platform < Platform::Gen8 && !matches!(op, Op::Call | Op::Calla) {
            8
        } else {
            1
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn opcode_lookup_by_era() {
        let gen9 = Model::new(Platform::Gen9);
        let xe = Model::new(Platform::Xe);
        match gen9.lookup_opcode(0x01) {
            OpcodeLookup::Valid(spec) => assert_eq!(spec.op, Op::Mov),
            other => panic!("{:?}", other),
        }
        match xe.lookup_opcode(0x61) {
            OpcodeLookup::Valid(spec) => assert_eq!(spec.op, Op::Mov),
            other => panic!("{:?}", other),
        }
        match xe.lookup_opcode(0x01) {
            OpcodeLookup::Valid(spec) => assert_eq!(spec.op, Op::Sync),
            other => panic!("{:?}", other),
        }
        assert!(matches!(gen9.lookup_opcode(0x7F), OpcodeLookup::Unmapped));
    }

    #[test]
    fn wrong_platform_is_distinguished() {
        // ror only exists from GEN11
        let gen9 = Model::new(Platform::Gen9);
        assert!(matches!(gen9.lookup_opcode(0x0E), OpcodeLookup::WrongPlatform(s) if s.op == Op::Ror));
    }

    #[test]
    fn send_format_changes_with_era() {
        assert_eq!(Model::new(Platform::Gen9).spec_for(Op::Send).map(|s| s.format), Some(Format::SendUnary));
        assert_eq!(Model::new(Platform::XeHpg).spec_for(Op::Send).map(|s| s.format), Some(Format::SendBinary));
        assert!(Model::new(Platform::XeHpg).spec_for(Op::Sends).is_none());
    }

    #[test]
    fn codes_unique_per_era() {
        for era_platform in [Platform::Gen11, Platform::Xe3, Platform::XeHp] {
            let mut seen = std::collections::HashSet::new();
            for spec in OP_SPECS.iter().filter(|s| s.supported_on(era_platform)) {
                if let Some(code) = spec.code(era_platform) {
                    assert!(seen.insert(code), "{:#x} reused on {}", code, era_platform);
                }
            }
        }
    }

    #[test]
    fn pc_scale() {
        assert_eq!(Model::new(Platform::Gen7).pc_scale(Op::Jmpi), 8);
        assert_eq!(Model::new(Platform::Gen7).pc_scale(Op::Call), 1);
        assert_eq!(Model::new(Platform::Gen8).pc_scale(Op::Jmpi), 1);
    }

    #[test]
    fn flag_registers() {
        assert_eq!(Model::new(Platform::Gen9).flag_reg_count(), 2);
        assert_eq!(Model::new(Platform::XeHpg).flag_reg_count(), 2);
        assert_eq!(Model::new(Platform::XeHpc).flag_reg_count(), 4);
    }

    #[test]
    fn swsb_modes() {
        assert_eq!(Model::new(Platform::Gen11).swsb_mode(), None);
        assert_eq!(Model::new(Platform::Xe).swsb_mode(), Some(SwsbEncodeMode::SingleDistPipe));
        assert_eq!(Model::new(Platform::XeHpg).swsb_mode(), Some(SwsbEncodeMode::ThreeDistPipe));
        assert_eq!(Model::new(Platform::Xe2).swsb_mode(), Some(SwsbEncodeMode::FourDistPipe));
    }
}
