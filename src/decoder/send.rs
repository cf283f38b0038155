//! Send-family operands and descriptors.
//!
//! Where the SFID and the payload lengths live moved around between hardware
//! generations. Each generation gets its own [SendInfoFn], picked once per
//! decoder by [send_info_strategy].

use bitutils::bits;

use super::{error::fatal, DecodeError, InstDecoder};
use crate::{
    ged::{
        translate::{self, RegFile},
        Field, OperandField,
    },
    ir::{
        Era, InstOpts, Instruction, Operand, Platform, Region, RegRef, SendDesc, SendInfo, Sfid, SourceIndex,
        Subfunction, Type,
    },
};

/// Derive SFID and payload lengths from the decoded subfunction and descriptors.
pub(super) type SendInfoFn =
    fn(&mut InstDecoder<'_>, Subfunction, SendDesc, SendDesc) -> Result<(SendInfo, InstOpts), DecodeError>;

const STRATEGIES: [(Platform, SendInfoFn); 5] = [
    (Platform::Gen7, send_info_pre_xe),
    (Platform::Xe, send_info_xe),
    (Platform::XeHp, send_info_xe_hp),
    (Platform::XeHpg, send_info_xe_hpg),
    (Platform::Xe2, send_info_xe2),
];

/// The newest strategy not newer than `platform`.
pub(super) fn send_info_strategy(platform: Platform) -> SendInfoFn {
    STRATEGIES
        .iter()
        .rev()
        .find(|(min, _)| platform >= *min)
        .map_or(send_info_pre_xe, |(_, f)| *f)
}

/// Message and response lengths live in the descriptor on every platform.
fn desc_lengths(desc: SendDesc) -> (Option<u32>, Option<u32>) {
    match desc {
        SendDesc::Imm(desc) => (Some(bits!(desc, 25:28)), Some(bits!(desc, 20:24))),
        SendDesc::Reg(_) => (None, None),
    }
}

/// Src1.Length in an immediate extended descriptor. Bit 11 is not part of it.
fn ex_desc_src1_len(ex_desc: u32) -> u32 {
    bits!(ex_desc, 6:10)
}

fn send_info_pre_xe(
    d: &mut InstDecoder<'_>,
    _: Subfunction,
    desc: SendDesc,
    ex_desc: SendDesc,
) -> Result<(SendInfo, InstOpts), DecodeError> {
    let sfid = match ex_desc {
        SendDesc::Reg(_) => Sfid::A0Reg,
        SendDesc::Imm(ex_desc) => {
            let code = u64::from(ex_desc & 0xF);
            match translate::sfid(d.model.platform, code) {
                Some(sfid) => sfid,
                None => {
                    d.error(format!("invalid SFID {:#x} in extended descriptor", code));
                    Sfid::Null
                }
            }
        }
    };
    let (src0_len, dst_len) = desc_lengths(desc);
    let src1_len = match ex_desc {
        SendDesc::Imm(ex_desc) if d.spec.op.is_sends_family() => Some(ex_desc_src1_len(ex_desc)),
        SendDesc::Reg(_) if d.spec.op.is_sends_family() => None,
        _ => Some(0),
    };
    let info = SendInfo {
        sfid,
        desc,
        ex_desc,
        src0_len,
        src1_len,
        dst_len,
    };
    Ok((info, InstOpts::empty()))
}

fn xe_sfid(subfunction: Subfunction) -> Sfid {
    match subfunction {
        Subfunction::Send(sfid) => sfid,
        _ => Sfid::Null,
    }
}

fn send_info_xe(
    d: &mut InstDecoder<'_>,
    subfunction: Subfunction,
    desc: SendDesc,
    ex_desc: SendDesc,
) -> Result<(SendInfo, InstOpts), DecodeError> {
    let (src0_len, dst_len) = desc_lengths(desc);
    let src1_len = Some(d.raw(Field::Src1Length)? as u32);
    let info = SendInfo {
        sfid: xe_sfid(subfunction),
        desc,
        ex_desc,
        src0_len,
        src1_len,
        dst_len,
    };
    Ok((info, InstOpts::empty()))
}

/// From XE_HP a register extended descriptor only keeps Src1.Length in the
/// instruction when ExBSO is set.
fn send_info_xe_hp(
    d: &mut InstDecoder<'_>,
    subfunction: Subfunction,
    desc: SendDesc,
    ex_desc: SendDesc,
) -> Result<(SendInfo, InstOpts), DecodeError> {
    let (src0_len, dst_len) = desc_lengths(desc);
    let mut opts = InstOpts::empty();
    let src1_len = match ex_desc {
        SendDesc::Reg(_) if d.raw(Field::ExBso)? == 1 => {
            opts |= InstOpts::EXBSO;
            if d.raw(Field::Cps)? == 1 {
                opts |= InstOpts::CPS;
            }
            Some(d.raw(Field::Src1Length)? as u32)
        }
        SendDesc::Reg(_) => None,
        SendDesc::Imm(ex_desc) => Some(ex_desc_src1_len(ex_desc)),
    };
    let info = SendInfo {
        sfid: xe_sfid(subfunction),
        desc,
        ex_desc,
        src0_len,
        src1_len,
        dst_len,
    };
    Ok((info, opts))
}

fn send_info_xe_hpg(
    d: &mut InstDecoder<'_>,
    subfunction: Subfunction,
    desc: SendDesc,
    ex_desc: SendDesc,
) -> Result<(SendInfo, InstOpts), DecodeError> {
    let (mut info, opts) = send_info_xe_hp(d, subfunction, desc, ex_desc)?;
    if let SendDesc::Reg(_) = ex_desc {
        info.src1_len = Some(d.raw(Field::Src1Length)? as u32);
    }
    Ok((info, opts))
}

fn send_info_xe2(
    d: &mut InstDecoder<'_>,
    subfunction: Subfunction,
    desc: SendDesc,
    ex_desc: SendDesc,
) -> Result<(SendInfo, InstOpts), DecodeError> {
    let (mut info, opts) = send_info_xe_hpg(d, subfunction, desc, ex_desc)?;
    if let SendDesc::Reg(_) = ex_desc {
        info.src1_len = if info.sfid == Sfid::Ugm || opts.contains(InstOpts::EXBSO) {
            Some(d.raw(Field::Src1Length)? as u32)
        } else {
            None
        };
    }
    Ok((info, opts))
}

impl<'a> InstDecoder<'a> {
    pub(super) fn decode_send(&mut self, subfunction: Subfunction) -> Result<Instruction, DecodeError> {
        let xe = self.model.platform.era() == Era::Xe;
        let sends = self.spec.op.is_sends_family();

        let desc = match self.decode(Field::DescRegFile, RegFile::Imm)? {
            RegFile::Imm => SendDesc::Imm(self.raw(Field::MsgDesc)? as u32),
            _ => SendDesc::Reg(RegRef::ZERO),
        };
        let ex_desc_reg_file = if sends || xe {
            self.decode(Field::ExDescRegFile, RegFile::Imm)?
        } else {
            RegFile::Imm
        };
        let ex_desc = match ex_desc_reg_file {
            RegFile::Imm => SendDesc::Imm(self.raw(Field::ExMsgDesc)? as u32),
            _ => SendDesc::Reg(RegRef::new(0, self.raw(Field::ExDescAddrSubRegNum)? as u16 / 2)),
        };

        let mut inst = self.base_instruction(subfunction)?;
        inst.dst = self.send_dst()?;
        let src0 = self.send_src0()?;
        inst.set_src(SourceIndex::Src0, src0);
        if sends || xe {
            let src1 = self.send_src1()?;
            inst.set_src(SourceIndex::Src1, src1);
        }

        let send_info = self.send_info;
        let (info, opts) = send_info(self, subfunction, desc, ex_desc)?;
        inst.subfunction = Subfunction::Send(info.sfid);
        inst.send = Some(info);
        inst.opts |= opts;
        Ok(inst)
    }

    fn send_dst(&mut self) -> Result<Option<Operand>, DecodeError> {
        let reg_file = self.decode(Field::Dst(OperandField::RegFile), RegFile::Grf)?;
        let indirect = self.raw_or(Field::Dst(OperandField::AddrMode), 0)? == 1;
        if indirect {
            if reg_file == RegFile::Grf {
                return Ok(Some(self.dst_align1()?));
            }
            self.error("error decoding instruction: SEND dst ARF");
            return Ok(None);
        }

        let mut ty = if self.model.send_has_dst_type() {
            self.data_type(Field::Dst(OperandField::DataType))?
        } else {
            Some(Type::UD)
        };
        if let Some(implicit) = self.spec.implicit_dst_type {
            if ty != Some(implicit) {
                self.warning(format!("{} dst is :ud in binary normal form", self.spec.mnemonic));
                ty = Some(implicit);
            }
        }
        let (reg, reg_ref) = self.dst_reg(ty)?;
        Ok(Some(Operand::direct(reg, reg_ref, Region::DST1, ty)))
    }

    fn send_src0(&mut self) -> Result<Operand, DecodeError> {
        let reg_file = self.src_reg_file(SourceIndex::Src0)?;
        let indirect = self.raw_or(Field::Src(0, OperandField::AddrMode), 0)? == 1;
        if reg_file == RegFile::Grf && indirect {
            return self.src_align1(SourceIndex::Src0, SourceIndex::Src0);
        }
        if reg_file == RegFile::Imm {
            return fatal("invalid register file in src0");
        }

        let ty = self.data_type(Field::Src(0, OperandField::DataType))?;
        let (reg, mut reg_ref) = self.src_reg(SourceIndex::Src0, reg_file, ty)?;
        // the extended descriptor overlaps the subregister bits
        reg_ref.sub_reg_num = 0;

        let region = match self.spec.implicit_src_region {
            Some(implicit) => {
                if self.model.platform < Platform::Gen9 {
                    let region = self.region_vwh(SourceIndex::Src0)?;
                    if region != implicit {
                        self.warning(format!(
                            "{} src0.rgn should have {} for binary normal form",
                            self.spec.mnemonic, implicit
                        ));
                    }
                }
                implicit
            }
            None => Region::NONE,
        };
        Ok(Operand::direct(reg, reg_ref, region, ty))
    }

    fn send_src1(&mut self) -> Result<Operand, DecodeError> {
        let reg_file = self.decode(Field::Src(1, OperandField::RegFile), RegFile::Grf)?;
        let (reg, reg_ref) = self.src_reg(SourceIndex::Src1, reg_file, None)?;
        Ok(Operand::direct(reg, RegRef::new(reg_ref.reg_num, 0), Region::NONE, None))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn strategy_per_generation() {
        let same = |a: SendInfoFn, b: SendInfoFn| a as usize == b as usize;
        assert!(same(send_info_strategy(Platform::Gen9), send_info_pre_xe));
        assert!(same(send_info_strategy(Platform::Xe), send_info_xe));
        assert!(same(send_info_strategy(Platform::XeHp), send_info_xe_hp));
        assert!(same(send_info_strategy(Platform::XeHpc), send_info_xe_hpg));
        assert!(same(send_info_strategy(Platform::Xe3), send_info_xe2));
    }

    #[test]
    fn src1_length_is_five_bits() {
        assert_eq!(ex_desc_src1_len(0xFC0), 0x1F);
        assert_eq!(ex_desc_src1_len(1 << 11), 0);
        assert_eq!(ex_desc_src1_len((2 << 6) | 0xC), 2);
    }

    #[test]
    fn descriptor_lengths() {
        let desc = (2 << 25) | (4 << 20) | 0x1234;
        assert_eq!(desc_lengths(SendDesc::Imm(desc)), (Some(2), Some(4)));
        assert_eq!(desc_lengths(SendDesc::Reg(RegRef::ZERO)), (None, None));
    }
}
