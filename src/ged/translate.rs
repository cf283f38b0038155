//! Mapping between normalized field values and the IR enums, in both directions.

use std::fmt::Write;

use bitutils::bits;

use super::fields::{decode_enum, Field, FieldError};
use crate::{
    ir::{OperandModifier, Platform, RegName, Sfid, Type},
    model::{Model, OpcodeLookup},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum RegFile {
    Arf = 0,
    Grf = 1,
    Imm = 3,
}

pub fn reg_file(field: Field, value: u64) -> Result<RegFile, FieldError> {
    decode_enum(field, value)
}

const ARF_NAMES: [Option<RegName>; 16] = [
    Some(RegName::Null),
    Some(RegName::Address),
    Some(RegName::Acc),
    Some(RegName::Flag),
    Some(RegName::ChanEnable),
    Some(RegName::Msg),
    Some(RegName::Stack),
    Some(RegName::State),
    Some(RegName::Control),
    Some(RegName::Notify),
    Some(RegName::Ip),
    Some(RegName::Tdr),
    Some(RegName::Tm),
    Some(RegName::FlowCtrl),
    None,
    Some(RegName::Dbg),
];

/// Splits an ARF register number into its name (top nibble) and index (bottom nibble).
pub fn arch_reg(reg_num: u64) -> Option<(RegName, u16)> {
    let name = (*ARF_NAMES.get((reg_num >> 4) as usize)?)?;
    Some((name, (reg_num & 0xF) as u16))
}

/// Inverse of [arch_reg].
pub fn arch_reg_bits(name: RegName, index: u16) -> Option<u64> {
    let hi = ARF_NAMES.iter().position(|n| *n == Some(name))?;
    Some(((hi as u64) << 4) | u64::from(index & 0xF))
}

/// Shared-function IDs. The low codes are common to every platform, the rest
/// were reassigned when the LSC units arrived in XE_HP.
pub fn sfid(platform: Platform, code: u64) -> Option<Sfid> {
    let common = match code {
        0 => Some(Sfid::Null),
        2 => Some(Sfid::Smpl),
        3 => Some(Sfid::Gtwy),
        4 => Some(Sfid::Dc2),
        5 => Some(Sfid::Rc),
        6 => Some(Sfid::Urb),
        _ => None,
    };
    if common.is_some() {
        return common;
    }
    if platform >= Platform::XeHp {
        match code {
            7 => Some(Sfid::Btd),
            8 => Some(Sfid::Rta),
            12 => Some(Sfid::Ugml),
            13 => Some(Sfid::Tgm),
            14 => Some(Sfid::Slm),
            15 => Some(Sfid::Ugm),
            _ => None,
        }
    } else {
        match code {
            7 => Some(Sfid::Ts),
            8 => Some(Sfid::Vme),
            9 => Some(Sfid::Dcro),
            10 => Some(Sfid::Dc0),
            11 => Some(Sfid::Pixi),
            12 => Some(Sfid::Dc1),
            13 => Some(Sfid::Cre),
            _ => None,
        }
    }
}

/// Inverse of [sfid].
pub fn sfid_code(platform: Platform, id: Sfid) -> Option<u64> {
    (0..16).find(|code| sfid(platform, *code) == Some(id))
}

/// Subregisters are encoded in bytes, the IR counts elements.
pub fn subreg_from_bytes(bytes: u64, ty: Option<Type>) -> u16 {
    match ty {
        Some(ty) => (bytes / u64::from(ty.size_bytes())) as u16,
        None => 0,
    }
}

pub fn subreg_to_bytes(sub_reg_num: u16, ty: Option<Type>) -> u64 {
    u64::from(sub_reg_num) * u64::from(ty.map_or(1, Type::size_bytes))
}

pub fn src_modifier(field: Field, value: u64) -> Result<OperandModifier, FieldError> {
    match value {
        0 => Ok(OperandModifier::None),
        1 => Ok(OperandModifier::Abs),
        2 => Ok(OperandModifier::Neg),
        3 => Ok(OperandModifier::NegAbs),
        _ => Err(FieldError::InvalidValue { field, value }),
    }
}

pub fn src_modifier_bits(modifier: OperandModifier) -> Option<u64> {
    match modifier {
        OperandModifier::None => Some(0),
        OperandModifier::Abs => Some(1),
        OperandModifier::Neg => Some(2),
        OperandModifier::NegAbs => Some(3),
        OperandModifier::Sat => None,
    }
}

/// Channel selectors, `x` in the low two bits.
pub fn swizzle(chan_sel: u64) -> [u8; 4] {
    let cs = chan_sel as u32;
    [bits!(cs, 0:1) as u8, bits!(cs, 2:3) as u8, bits!(cs, 4:5) as u8, bits!(cs, 6:7) as u8]
}

pub const SWIZZLE_XYZW: u64 = 0xE4;
pub const SWIZZLE_XYXY: u64 = 0x44;
pub const SWIZZLE_ZWZW: u64 = 0xEE;

/// Align16 destination channel enables.
pub const CHAN_EN_X: u64 = 0b0001;
pub const CHAN_EN_Y: u64 = 0b0010;
pub const CHAN_EN_XY: u64 = 0b0011;
pub const CHAN_EN_Z: u64 = 0b0100;
pub const CHAN_EN_W: u64 = 0b1000;
pub const CHAN_EN_ZW: u64 = 0b1100;
pub const CHAN_EN_XYZW: u64 = 0b1111;

/// `mnemonic:` padded to twelve columns, followed by the raw bytes in hex.
pub fn format_op_bits(platform: Platform, bytes: &[u8]) -> String {
    let compact = bytes.len() >= 4 && bits!(bytes[3] as u32, 5:5) != 0;
    let len = (if compact { 8 } else { 16 }).min(bytes.len());

    let mut name = match bytes.first() {
        Some(b) => match Model::new(platform).lookup_opcode(u64::from(b & 0x7F)) {
            OpcodeLookup::Valid(spec) => spec.mnemonic.to_string(),
            OpcodeLookup::WrongPlatform(spec) => format!("{}?", spec.mnemonic),
            OpcodeLookup::Unmapped => format!("OP[{:#x}]?", b & 0x7F),
        },
        None => String::from("?"),
    };
    name.push(':');
    let mut s = format!("{:<12}", name);
    for (i, b) in bytes[..len].iter().enumerate() {
        if i > 0 {
            s.push(' ');
        }
        let _ = write!(s, "{:02x}", b);
        if i == 7 {
            s.push(' ');
        }
    }
    s
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arch_registers() {
        assert_eq!(arch_reg(0x00), Some((RegName::Null, 0)));
        assert_eq!(arch_reg(0x21), Some((RegName::Acc, 1)));
        assert_eq!(arch_reg(0x31), Some((RegName::Flag, 1)));
        assert_eq!(arch_reg(0xE0), None);
        assert_eq!(arch_reg_bits(RegName::Acc, 1), Some(0x21));
        assert_eq!(arch_reg_bits(RegName::Grf, 0), None);
    }

    #[test]
    fn sfids_depend_on_platform() {
        assert_eq!(sfid(Platform::Gen9, 10), Some(Sfid::Dc0));
        assert_eq!(sfid(Platform::XeHpg, 10), None);
        assert_eq!(sfid(Platform::XeHpg, 15), Some(Sfid::Ugm));
        assert_eq!(sfid(Platform::Xe, 15), None);
        assert_eq!(sfid(Platform::Xe3, 2), Some(Sfid::Smpl));
        assert_eq!(sfid_code(Platform::Xe2, Sfid::Slm), Some(14));
        assert_eq!(sfid_code(Platform::Gen9, Sfid::Ugm), None);
        assert_eq!(sfid_code(Platform::Gen9, Sfid::A0Reg), None);
    }

    #[test]
    fn subregisters() {
        assert_eq!(subreg_from_bytes(8, Some(Type::F)), 2);
        assert_eq!(subreg_from_bytes(8, Some(Type::DF)), 1);
        assert_eq!(subreg_from_bytes(8, None), 0);
        assert_eq!(subreg_to_bytes(3, Some(Type::W)), 6);
    }

    #[test]
    fn swizzles() {
        assert_eq!(swizzle(SWIZZLE_XYZW), [0, 1, 2, 3]);
        assert_eq!(swizzle(SWIZZLE_XYXY), [0, 1, 0, 1]);
        assert_eq!(swizzle(SWIZZLE_ZWZW), [2, 3, 2, 3]);
    }

    #[test]
    fn op_bits() {
        let mut bytes = [0u8; 16];
        bytes[0] = 0x01;
        let s = format_op_bits(Platform::Gen9, &bytes);
        assert!(s.starts_with("mov:"));
        assert!(s.contains("01 00 00 00 00 00 00 00  00 00"));
        bytes[0] = 0x7F;
        assert!(format_op_bits(Platform::Gen9, &bytes).starts_with("OP[0x7f]?:"));
    }
}
