use std::fmt;

/// Every operation known to any platform. Whether an op exists on a given
/// platform, and how it is encoded, is answered by [crate::model::Model].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Illegal,
    Nop,
    Sync,
    Wait,

    Mov,
    Movi,
    Sel,
    Not,
    And,
    Or,
    Xor,
    Shr,
    Shl,
    Smov,
    Asr,
    Ror,
    Rol,
    Cmp,
    Cmpn,
    Csel,
    Bfrev,
    Bfe,
    Bfi1,
    Bfi2,

    Jmpi,
    Brd,
    If,
    Brc,
    Else,
    Endif,
    While,
    Break,
    Cont,
    Halt,
    Calla,
    Call,
    Ret,
    Goto,
    Join,

    Send,
    Sendc,
    Sends,
    Sendsc,

    Math,
    Add,
    Mul,
    Avg,
    Frc,
    Rndu,
    Rndd,
    Rnde,
    Rndz,
    Mac,
    Mach,
    Lzd,
    Fbh,
    Fbl,
    Cbit,
    Addc,
    Subb,
    Sad2,
    Sada2,
    Add3,
    Macl,
    Dp4,
    Dph,
    Dp3,
    Dp2,
    Dp4a,
    Dpas,
    Dpasw,
    Line,
    Pln,
    Mad,
    Lrp,
    Madm,
    Bfn,
}

impl Op {
    pub fn is_send_family(self) -> bool {
        matches!(self, Op::Send | Op::Sendc | Op::Sends | Op::Sendsc)
    }
    pub fn is_sends_family(self) -> bool {
        matches!(self, Op::Sends | Op::Sendsc)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(crate::model::op_spec(*self).mnemonic)
    }
}
