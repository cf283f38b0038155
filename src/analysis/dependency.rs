use std::{
    collections::{BTreeSet, HashMap},
    ops::Range,
};

use crate::ir::{Instruction, Operand, OperandKind, Platform, RegName, SendInfo};

/// Read-after-write dependencies between instructions, tracked per GRF.
///
/// Only direct register operands are followed. Indirect operands and
/// architecture registers are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterDependencies {
    /// Mapping of <instruction id> to <ids of earlier instructions that wrote a register it reads>
    dependencies: HashMap<u32, BTreeSet<u32>>,
    /// Mapping of <GRF> to <id of the last instruction writing it>
    last_writers: HashMap<u32, u32>,
    grf_bytes: u32,
}

impl RegisterDependencies {
    pub fn new(platform: Platform) -> Self {
        Self {
            dependencies: HashMap::new(),
            last_writers: HashMap::new(),
            grf_bytes: platform.grf_bytes(),
        }
    }

    pub fn from_instructions<'a>(platform: Platform, insts: impl IntoIterator<Item = &'a Instruction>) -> Self {
        let mut deps = Self::new(platform);
        for inst in insts {
            deps.accum_instruction(inst);
        }
        deps
    }

    /// Accumulate the reads and writes of `inst` onto the current state.
    ///
    /// Reads are resolved before writes, so `add r1 r1 r2` depends on the
    /// previous writer of `r1`, not on itself.
    pub fn accum_instruction(&mut self, inst: &Instruction) {
        let mut writers = BTreeSet::new();
        for reg in self.reads(inst).into_iter().flatten() {
            if let Some(writer) = self.last_writers.get(&reg) {
                writers.insert(*writer);
            }
        }
        if !writers.is_empty() {
            self.dependencies.entry(inst.id).or_default().extend(writers);
        }
        if let Some(written) = self.writes(inst) {
            for reg in written {
                self.last_writers.insert(reg, inst.id);
            }
        }
    }

    fn operand_span(&self, op: &Operand, lanes: u32) -> Option<Range<u32>> {
        match op.kind {
            OperandKind::Macro { reg: RegName::Grf, reg_num, .. } => Some(u32::from(reg_num)..u32::from(reg_num) + 1),
            _ => op.grf_span(lanes, self.grf_bytes),
        }
    }

    /// A send payload: `len` registers from the operand's register on.
    fn payload_span(op: Option<&Operand>, len: Option<u32>) -> Option<Range<u32>> {
        match op?.kind {
            OperandKind::Direct { reg: RegName::Grf, reg_ref } => {
                let start = u32::from(reg_ref.reg_num);
                // an unknown length still touches the first register
                Some(start..start + len.unwrap_or(1))
            }
            _ => None,
        }
    }

    fn reads(&self, inst: &Instruction) -> Vec<Range<u32>> {
        let lanes = inst.exec_size.lanes();
        match &inst.send {
            Some(SendInfo { src0_len, src1_len, .. }) => [
                Self::payload_span(inst.srcs[0].as_ref(), *src0_len),
                Self::payload_span(inst.srcs[1].as_ref(), *src1_len),
            ]
            .into_iter()
            .flatten()
            .collect(),
            None => inst
                .sources()
                .into_iter()
                .filter_map(|src| self.operand_span(src, lanes))
                .collect(),
        }
    }

    fn writes(&self, inst: &Instruction) -> Option<Range<u32>> {
        let dst = inst.dst.as_ref()?;
        match &inst.send {
            Some(SendInfo { dst_len: Some(0), .. }) => None,
            Some(SendInfo { dst_len, .. }) => Self::payload_span(Some(dst), *dst_len),
            None => self.operand_span(dst, inst.exec_size.lanes()),
        }
    }

    /// Ids of the instructions `id` reads registers from.
    pub fn dependencies_of(&self, id: u32) -> Option<&BTreeSet<u32>> {
        self.dependencies.get(&id)
    }

    pub fn dependencies(&self) -> &HashMap<u32, BTreeSet<u32>> {
        &self.dependencies
    }

    /// The instruction that wrote `reg` last, at the end of the analysed range.
    pub fn last_writer(&self, reg: u32) -> Option<u32> {
        self.last_writers.get(&reg).copied()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        ir::{ExecSize, Op, Region, RegRef, SendDesc, Sfid, SourceIndex, Subfunction, Type},
        model::Format,
    };

    fn alu(id: u32, dst: u16, srcs: &[u16]) -> Instruction {
        let mut inst = Instruction::new(Op::Add, Format::BasicBinaryRegRegImm, Subfunction::None);
        inst.id = id;
        inst.exec_size = ExecSize::Simd8;
        inst.dst = Some(Operand::grf(dst, 0, Region::DST1, Type::F));
        for (s, reg) in SourceIndex::ALL.into_iter().zip(srcs) {
            inst.set_src(s, Operand::grf(*reg, 0, Region::SRC881, Type::F));
        }
        inst
    }

    #[test]
    fn read_after_write() {
        let insts = [alu(1, 10, &[2, 3]), alu(2, 11, &[4, 5]), alu(3, 12, &[10, 11]), alu(4, 10, &[10, 12])];
        let deps = RegisterDependencies::from_instructions(Platform::Xe, insts.iter());
        assert_eq!(deps.dependencies_of(1), None);
        assert_eq!(deps.dependencies_of(3), Some(&BTreeSet::from([1, 2])));
        assert_eq!(deps.dependencies_of(4), Some(&BTreeSet::from([1, 3])));
        assert_eq!(deps.last_writer(10), Some(4));
    }

    #[test]
    fn send_payloads() {
        let mut send = Instruction::new(Op::Send, Format::SendBinary, Subfunction::Send(Sfid::Ugm));
        send.id = 3;
        send.dst = Some(Operand::direct(RegName::Grf, RegRef::new(20, 0), Region::DST1, Some(Type::UD)));
        send.set_src(SourceIndex::Src0, Operand::direct(RegName::Grf, RegRef::new(4, 0), Region::NONE, None));
        send.set_src(SourceIndex::Src1, Operand::direct(RegName::Null, RegRef::ZERO, Region::NONE, None));
        send.send = Some(SendInfo {
            sfid: Sfid::Ugm,
            desc: SendDesc::Imm(0),
            ex_desc: SendDesc::Imm(0),
            src0_len: Some(2),
            src1_len: Some(0),
            dst_len: Some(2),
        });
        // r5 is the second payload register
        let insts = [alu(1, 5, &[1, 1]), send, alu(4, 30, &[21, 1])];
        let deps = RegisterDependencies::from_instructions(Platform::Xe, insts.iter());
        assert_eq!(deps.dependencies_of(3), Some(&BTreeSet::from([1])));
        assert_eq!(deps.dependencies_of(4), Some(&BTreeSet::from([3])));
    }

    #[test]
    fn wide_registers() {
        // 16 floats span two 32-byte registers but fit one 64-byte register
        let mut insts = [alu(1, 10, &[1, 2]), alu(2, 12, &[11, 11])];
        for inst in insts.iter_mut() {
            inst.exec_size = ExecSize::Simd16;
        }
        let narrow = RegisterDependencies::from_instructions(Platform::Xe, insts.iter());
        let wide = RegisterDependencies::from_instructions(Platform::XeHpc, insts.iter());
        assert_eq!(narrow.dependencies_of(2), Some(&BTreeSet::from([1])));
        assert_eq!(wide.dependencies_of(2), None);
        assert_eq!(narrow.last_writer(11), Some(1));
        assert_eq!(wide.last_writer(11), None);
    }
}
