use std::{collections::BTreeSet, sync::OnceLock};

use super::{instruction::Instruction, op::Op, platform::Platform};
use crate::analysis::dependency::RegisterDependencies;

/// A run of instructions with a single entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub offset: u32,
    pub instructions: Vec<Instruction>,
}

impl Block {
    pub fn new(offset: u32) -> Self {
        Self { offset, instructions: vec![] }
    }

    /// Resolve label operands to absolute PCs and split the flat instruction list
    /// at every branch target and after every branching instruction.
    pub fn infer_blocks(mut insts: Vec<Instruction>, binary_len: u32) -> Vec<Block> {
        let mut starts = BTreeSet::new();
        starts.insert(0u32);

        for inst in insts.iter_mut() {
            let pc = inst.pc;
            let next_pc = inst.pc + inst.size();
            // jmpi offsets are relative to the following instruction
            let base = if inst.op == Op::Jmpi { next_pc } else { pc };
            let branching = inst.is_branching();
            for label in inst.srcs.iter_mut().flatten().filter_map(|s| s.as_label_mut()) {
                let target = i64::from(base) + i64::from(label.pc_delta);
                if (0..=i64::from(binary_len)).contains(&target) {
                    label.target = Some(target as u32);
                    starts.insert(target as u32);
                }
            }
            if branching && next_pc < binary_len {
                starts.insert(next_pc);
            }
        }

        let mut blocks: Vec<Block> = vec![];
        for inst in insts {
            let starts_here = starts.contains(&inst.pc);
            match blocks.last_mut() {
                Some(block) if !starts_here => block.instructions.push(inst),
                _ => {
                    let mut block = Block::new(inst.pc);
                    block.instructions.push(inst);
                    blocks.push(block);
                }
            }
        }
        // A label may point just past the final instruction
        if starts.contains(&binary_len) && binary_len > 0 {
            blocks.push(Block::new(binary_len));
        }
        blocks
    }
}

/// A decoded program. Owns its blocks and a lazily built dependency analysis.
#[derive(Debug, Clone)]
pub struct Kernel {
    pub platform: Platform,
    blocks: Vec<Block>,
    dependencies: OnceLock<RegisterDependencies>,
}

impl Kernel {
    pub fn new(platform: Platform) -> Self {
        Self::with_blocks(platform, vec![])
    }

    pub fn with_blocks(platform: Platform, blocks: Vec<Block>) -> Self {
        Self {
            platform,
            blocks,
            dependencies: OnceLock::new(),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.iter().flat_map(|b| b.instructions.iter())
    }

    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instructions.len()).sum()
    }

    pub fn find_instruction(&self, pc: u32) -> Option<&Instruction> {
        self.instructions().find(|i| i.pc == pc)
    }

    /// Register read-after-write dependencies, computed on first use.
    pub fn dependencies(&self) -> &RegisterDependencies {
        self.dependencies
            .get_or_init(|| RegisterDependencies::from_instructions(self.platform, self.instructions()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        ir::{operand::Operand, types::Subfunction},
        model::Format,
    };

    fn inst(pc: u32, op: Op, format: Format) -> Instruction {
        let mut i = Instruction::new(op, format, Subfunction::None);
        i.pc = pc;
        i
    }

    #[test]
    fn straight_line_is_one_block() {
        let insts = vec![inst(0, Op::Nop, Format::Nullary), inst(16, Op::Nop, Format::Nullary)];
        let blocks = Block::infer_blocks(insts, 32);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].instructions.len(), 2);
    }

    #[test]
    fn branches_split_blocks() {
        let mut jmp = inst(16, Op::Jmpi, Format::JumpUnaryRegImm);
        jmp.srcs[0] = Some(Operand::label(16));
        let insts = vec![
            inst(0, Op::Nop, Format::Nullary),
            jmp,
            inst(32, Op::Nop, Format::Nullary),
            inst(48, Op::Nop, Format::Nullary),
        ];
        let blocks = Block::infer_blocks(insts, 64);
        let offsets: Vec<u32> = blocks.iter().map(|b| b.offset).collect();
        assert_eq!(offsets, vec![0, 32, 48]);
        let target = blocks[0].instructions[1].srcs[0].and_then(|s| s.as_label().copied());
        assert_eq!(target.and_then(|l| l.target), Some(48));
    }

    #[test]
    fn empty_kernel() {
        let k = Kernel::with_blocks(Platform::Xe, Block::infer_blocks(vec![], 0));
        assert!(k.blocks().is_empty());
        assert_eq!(k.instruction_count(), 0);
    }
}
