//! Software scoreboard (SWSB) annotations carried by every XE+ instruction.
//!
//! Each instruction carries one 8-bit token. Its meaning depends on the encode
//! mode of the platform:
//!
//! | raw          | single-pipe      | three-pipe             | four-pipe              |
//! |--------------|------------------|------------------------|------------------------|
//! | `0000_0000`  | none             | none                   | none                   |
//! | `000p_pddd`  | `@d` (`pp` = 0)  | `@d` `F@d` `I@d` `A@d` | `@d` `F@d` `I@d` `L@d` |
//! | `0010_tttt`  | `$t.src`         | `$t.src`               |                        |
//! | `0011_tttt`  | `$t.dst`         | `$t.dst`               |                        |
//! | `0100_tttt`  | `$t` (set)       | `$t` (set)             |                        |
//! | `001t_tttt`  |                  |                        | `$t.src`               |
//! | `010t_tttt`  |                  |                        | `$t.dst`               |
//! | `011t_tttt`  |                  |                        | `$t` (set)             |
//! | `1ddd_tttt`  | `@d $t`          | `@d $t`                | `@d $t`                |
//!
//! A combined distance and token is a set for out-of-order instructions and a
//! destination wait otherwise.

use std::fmt;

use super::op::Op;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwsbEncodeMode {
    SingleDistPipe,
    ThreeDistPipe,
    FourDistPipe,
}
impl SwsbEncodeMode {
    pub fn default_sbid_count(self) -> u32 {
        match self {
            SwsbEncodeMode::FourDistPipe => 32,
            _ => 16,
        }
    }
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "single" | "single_dist_pipe" => Some(SwsbEncodeMode::SingleDistPipe),
            "three" | "three_dist_pipe" => Some(SwsbEncodeMode::ThreeDistPipe),
            "four" | "four_dist_pipe" => Some(SwsbEncodeMode::FourDistPipe),
            _ => None,
        }
    }
}

/// Which pipe a register distance refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistType {
    NoDist,
    RegDist,
    RegDistAll,
    RegDistFloat,
    RegDistInt,
    RegDistLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    NoToken,
    Set,
    Src,
    Dst,
}

/// Instruction class, decides how a combined distance/token is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwsbInstType {
    Other,
    Math,
    Send,
    Dpas,
}
impl SwsbInstType {
    pub fn of(op: Op) -> Self {
        match op {
            op if op.is_send_family() => SwsbInstType::Send,
            Op::Math => SwsbInstType::Math,
            Op::Dpas | Op::Dpasw => SwsbInstType::Dpas,
            _ => SwsbInstType::Other,
        }
    }
    pub fn is_out_of_order(self) -> bool {
        !matches!(self, SwsbInstType::Other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwsbStatus {
    Success,
    SbidSetInvalidForFixedLatency,
    InvalidSbidValue,
    InvalidEncodeMode,
}
impl SwsbStatus {
    pub fn message(self) -> &'static str {
        match self {
            SwsbStatus::Success => "success",
            SwsbStatus::SbidSetInvalidForFixedLatency => "SBID set invalid for fixed-latency op",
            SwsbStatus::InvalidSbidValue => "invalid SBID value",
            SwsbStatus::InvalidEncodeMode => "invalid encode mode for platform",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Swsb {
    pub dist_type: DistType,
    pub min_dist: u8,
    pub token_type: TokenType,
    pub sbid: u8,
}

impl Default for Swsb {
    fn default() -> Self {
        Self::NONE
    }
}

impl Swsb {
    pub const NONE: Swsb = Swsb {
        dist_type: DistType::NoDist,
        min_dist: 0,
        token_type: TokenType::NoToken,
        sbid: 0,
    };

    pub fn has_dist(&self) -> bool {
        self.dist_type != DistType::NoDist
    }
    pub fn has_token(&self) -> bool {
        self.token_type != TokenType::NoToken
    }
    pub fn is_none(&self) -> bool {
        !self.has_dist() && !self.has_token()
    }

    /// Decode a raw token. Invalid tokens still produce a best-effort value.
    pub fn decode(
        raw: u8,
        mode: SwsbEncodeMode,
        inst_type: SwsbInstType,
        sbid_count: u32,
    ) -> (Swsb, SwsbStatus) {
        let mut swsb = Swsb::NONE;
        let mut status = SwsbStatus::Success;
        let four = mode == SwsbEncodeMode::FourDistPipe;

        if raw == 0 {
            return (swsb, status);
        }

        if raw & 0x80 != 0 {
            swsb.min_dist = (raw >> 4) & 0x7;
            swsb.dist_type = DistType::RegDist;
            swsb.sbid = raw & 0xF;
            swsb.token_type = if inst_type.is_out_of_order() {
                TokenType::Set
            } else {
                TokenType::Dst
            };
            if swsb.min_dist == 0 {
                swsb.dist_type = DistType::NoDist;
                status = SwsbStatus::InvalidEncodeMode;
            }
        } else if raw & 0xE0 == 0 {
            swsb.min_dist = raw & 0x7;
            if swsb.min_dist == 0 {
                status = SwsbStatus::InvalidEncodeMode;
            }
            swsb.dist_type = match ((raw >> 3) & 0x3, mode) {
                (0, _) => DistType::RegDist,
                (_, SwsbEncodeMode::SingleDistPipe) => {
                    status = SwsbStatus::InvalidEncodeMode;
                    DistType::RegDist
                }
                (1, _) => DistType::RegDistFloat,
                (2, _) => DistType::RegDistInt,
                (_, SwsbEncodeMode::ThreeDistPipe) => DistType::RegDistAll,
                (_, SwsbEncodeMode::FourDistPipe) => DistType::RegDistLong,
            };
        } else if four {
            swsb.sbid = raw & 0x1F;
            swsb.token_type = match raw >> 5 {
                1 => TokenType::Src,
                2 => TokenType::Dst,
                _ => TokenType::Set,
            };
        } else {
            swsb.sbid = raw & 0xF;
            swsb.token_type = match raw >> 4 {
                2 => TokenType::Src,
                3 => TokenType::Dst,
                4 => TokenType::Set,
                _ => {
                    status = SwsbStatus::InvalidEncodeMode;
                    TokenType::NoToken
                }
            };
        }

        if swsb.token_type == TokenType::Set && !inst_type.is_out_of_order() {
            status = SwsbStatus::SbidSetInvalidForFixedLatency;
        } else if swsb.has_token() && u32::from(swsb.sbid) >= sbid_count {
            status = SwsbStatus::InvalidSbidValue;
        }
        (swsb, status)
    }

    /// Inverse of [Swsb::decode].
    pub fn encode(&self, mode: SwsbEncodeMode, inst_type: SwsbInstType) -> Result<u8, SwsbStatus> {
        let four = mode == SwsbEncodeMode::FourDistPipe;
        if self.has_dist() && (self.min_dist == 0 || self.min_dist > 7) {
            return Err(SwsbStatus::InvalidEncodeMode);
        }
        if self.token_type == TokenType::Set && !inst_type.is_out_of_order() {
            return Err(SwsbStatus::SbidSetInvalidForFixedLatency);
        }
        let max_sbid = if four { 32 } else { 16 };
        if self.has_token() && u32::from(self.sbid) >= max_sbid {
            return Err(SwsbStatus::InvalidSbidValue);
        }

        match (self.has_dist(), self.has_token()) {
            (false, false) => Ok(0),
            (true, true) => {
                let combined = if inst_type.is_out_of_order() {
                    TokenType::Set
                } else {
                    TokenType::Dst
                };
                if self.dist_type != DistType::RegDist || self.token_type != combined || self.sbid >= 16 {
                    return Err(SwsbStatus::InvalidEncodeMode);
                }
                Ok(0x80 | (self.min_dist << 4) | self.sbid)
            }
            (true, false) => {
                let pipe = match (self.dist_type, mode) {
                    (DistType::RegDist, _) => 0,
                    (_, SwsbEncodeMode::SingleDistPipe) => return Err(SwsbStatus::InvalidEncodeMode),
                    (DistType::RegDistFloat, _) => 1,
                    (DistType::RegDistInt, _) => 2,
                    (DistType::RegDistAll, SwsbEncodeMode::ThreeDistPipe) => 3,
                    (DistType::RegDistLong, SwsbEncodeMode::FourDistPipe) => 3,
                    _ => return Err(SwsbStatus::InvalidEncodeMode),
                };
                Ok((pipe << 3) | self.min_dist)
            }
            (false, true) => {
                let prefix = match (self.token_type, four) {
                    (TokenType::Src, true) => 0x20,
                    (TokenType::Dst, true) => 0x40,
                    (TokenType::Set, true) => 0x60,
                    (TokenType::Src, false) => 0x20,
                    (TokenType::Dst, false) => 0x30,
                    (TokenType::Set, false) => 0x40,
                    (TokenType::NoToken, _) => 0,
                };
                Ok(prefix | self.sbid)
            }
        }
    }
}

impl fmt::Display for Swsb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec![];
        if self.has_dist() {
            let pipe = match self.dist_type {
                DistType::RegDistAll => "A",
                DistType::RegDistFloat => "F",
                DistType::RegDistInt => "I",
                DistType::RegDistLong => "L",
                _ => "",
            };
            parts.push(format!("{}@{}", pipe, self.min_dist));
        }
        match self.token_type {
            TokenType::NoToken => {}
            TokenType::Set => parts.push(format!("${}", self.sbid)),
            TokenType::Src => parts.push(format!("${}.src", self.sbid)),
            TokenType::Dst => parts.push(format!("${}.dst", self.sbid)),
        }
        write!(f, "{}", parts.join(" "))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MODES: [SwsbEncodeMode; 3] = [
        SwsbEncodeMode::SingleDistPipe,
        SwsbEncodeMode::ThreeDistPipe,
        SwsbEncodeMode::FourDistPipe,
    ];

    #[test]
    fn zero_is_none() {
        for mode in MODES {
            let (swsb, status) = Swsb::decode(0, mode, SwsbInstType::Other, 16);
            assert!(swsb.is_none());
            assert_eq!(status, SwsbStatus::Success);
        }
    }

    #[test]
    fn reg_dist() {
        let (swsb, status) = Swsb::decode(0x03, SwsbEncodeMode::SingleDistPipe, SwsbInstType::Other, 16);
        assert_eq!(status, SwsbStatus::Success);
        assert_eq!(swsb.dist_type, DistType::RegDist);
        assert_eq!(swsb.min_dist, 3);
        assert_eq!(swsb.to_string(), "@3");
    }

    #[test]
    fn pipe_dist_needs_multi_pipe_mode() {
        let (_, status) = Swsb::decode(0x0A, SwsbEncodeMode::SingleDistPipe, SwsbInstType::Other, 16);
        assert_eq!(status, SwsbStatus::InvalidEncodeMode);

        let (swsb, status) = Swsb::decode(0x0A, SwsbEncodeMode::ThreeDistPipe, SwsbInstType::Other, 16);
        assert_eq!(status, SwsbStatus::Success);
        assert_eq!(swsb.dist_type, DistType::RegDistFloat);
        assert_eq!(swsb.to_string(), "F@2");

        let (swsb, _) = Swsb::decode(0x19, SwsbEncodeMode::FourDistPipe, SwsbInstType::Other, 32);
        assert_eq!(swsb.dist_type, DistType::RegDistLong);
        let (swsb, _) = Swsb::decode(0x19, SwsbEncodeMode::ThreeDistPipe, SwsbInstType::Other, 16);
        assert_eq!(swsb.dist_type, DistType::RegDistAll);
    }

    #[test]
    fn set_on_fixed_latency_op() {
        let (swsb, status) = Swsb::decode(0x45, SwsbEncodeMode::ThreeDistPipe, SwsbInstType::Other, 16);
        assert_eq!(swsb.token_type, TokenType::Set);
        assert_eq!(status, SwsbStatus::SbidSetInvalidForFixedLatency);

        let (swsb, status) = Swsb::decode(0x45, SwsbEncodeMode::ThreeDistPipe, SwsbInstType::Send, 16);
        assert_eq!(swsb.sbid, 5);
        assert_eq!(status, SwsbStatus::Success);
    }

    #[test]
    fn combined_dist_and_token() {
        let (swsb, status) = Swsb::decode(0x92, SwsbEncodeMode::SingleDistPipe, SwsbInstType::Send, 16);
        assert_eq!(status, SwsbStatus::Success);
        assert_eq!(swsb.min_dist, 1);
        assert_eq!(swsb.sbid, 2);
        assert_eq!(swsb.token_type, TokenType::Set);

        let (swsb, _) = Swsb::decode(0x92, SwsbEncodeMode::SingleDistPipe, SwsbInstType::Other, 16);
        assert_eq!(swsb.token_type, TokenType::Dst);
        assert_eq!(swsb.to_string(), "@1 $2.dst");
    }

    #[test]
    fn four_pipe_tokens_reach_31() {
        let (swsb, status) = Swsb::decode(0x3F, SwsbEncodeMode::FourDistPipe, SwsbInstType::Other, 32);
        assert_eq!(status, SwsbStatus::Success);
        assert_eq!(swsb.token_type, TokenType::Src);
        assert_eq!(swsb.sbid, 31);

        let (_, status) = Swsb::decode(0x3F, SwsbEncodeMode::FourDistPipe, SwsbInstType::Other, 16);
        assert_eq!(status, SwsbStatus::InvalidSbidValue);
    }

    #[test]
    fn unassigned_token_pattern() {
        let (_, status) = Swsb::decode(0x55, SwsbEncodeMode::ThreeDistPipe, SwsbInstType::Send, 16);
        assert_eq!(status, SwsbStatus::InvalidEncodeMode);
    }

    #[test]
    fn encode_inverts_decode() {
        for mode in MODES {
            for inst_type in [SwsbInstType::Other, SwsbInstType::Send] {
                for raw in 0..=255u8 {
                    let (swsb, status) = Swsb::decode(raw, mode, inst_type, 32);
                    if status == SwsbStatus::Success {
                        assert_eq!(swsb.encode(mode, inst_type), Ok(raw), "{:#x} {:?}", raw, mode);
                    }
                }
            }
        }
    }
}
