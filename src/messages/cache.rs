//! LSC cache-control encodings.
//!
//! XE_HPG and XE_HPC use three bits at Desc[19:17] with one table shared by
//! stores and atomics. XE2 and later widen the field to Desc[19:16] and keep
//! separate load, store and atomic tables.

use std::fmt;

use super::{SendOp, SendOpClass};
use crate::ir::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOpt {
    /// Use the surface state settings
    Default,
    ReadInvalidate,
    Cached,
    /// Cached as constant data
    ConstCached,
    Uncached,
    Streaming,
    WriteThrough,
    WriteBack,
}

impl CacheOpt {
    pub fn symbol(self) -> &'static str {
        match self {
            CacheOpt::Default => "df",
            CacheOpt::ReadInvalidate => "ri",
            CacheOpt::Cached => "ca",
            CacheOpt::ConstCached => "cc",
            CacheOpt::Uncached => "uc",
            CacheOpt::Streaming => "st",
            CacheOpt::WriteThrough => "wt",
            CacheOpt::WriteBack => "wb",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            CacheOpt::Default => "uses default state settings",
            CacheOpt::ReadInvalidate => "read-invalidate (last use)",
            CacheOpt::Cached => "cached",
            CacheOpt::ConstCached => "constant cached",
            CacheOpt::Uncached => "uncached (bypass)",
            CacheOpt::Streaming => "streaming",
            CacheOpt::WriteThrough => "writethrough",
            CacheOpt::WriteBack => "writeback",
        }
    }
}

impl fmt::Display for CacheOpt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheControl {
    pub encoding: u32,
    pub l1: CacheOpt,
    pub l3: CacheOpt,
}

impl CacheControl {
    const fn new(encoding: u32, l1: CacheOpt, l3: CacheOpt) -> Self {
        Self { encoding, l1, l3 }
    }

    /// Syntax suffix, empty for the default encoding.
    pub fn symbol(&self) -> String {
        if self.encoding == 0 {
            String::new()
        } else {
            format!(".{}.{}", self.l1, self.l3)
        }
    }

    pub fn description(&self) -> String {
        if self.l1 == CacheOpt::Default && self.l3 == CacheOpt::Default {
            "use state settings for both L1 and L3".to_string()
        } else {
            format!("L1 {}; L3 {}", self.l1.description(), self.l3.description())
        }
    }
}

use CacheOpt::*;

pub static LD_3BIT: [CacheControl; 8] = [
    CacheControl::new(0x0, Default, Default),
    CacheControl::new(0x1, Uncached, Uncached),
    CacheControl::new(0x2, Uncached, Cached),
    CacheControl::new(0x3, Cached, Uncached),
    CacheControl::new(0x4, Cached, Cached),
    CacheControl::new(0x5, Streaming, Uncached),
    CacheControl::new(0x6, Streaming, Cached),
    CacheControl::new(0x7, ReadInvalidate, Cached),
];

pub static ST_3BIT: [CacheControl; 8] = [
    CacheControl::new(0x0, Default, Default),
    CacheControl::new(0x1, Uncached, Uncached),
    CacheControl::new(0x2, Uncached, WriteBack),
    CacheControl::new(0x3, WriteThrough, Uncached),
    CacheControl::new(0x4, WriteThrough, WriteBack),
    CacheControl::new(0x5, Streaming, Uncached),
    CacheControl::new(0x6, Streaming, WriteBack),
    CacheControl::new(0x7, WriteBack, WriteBack),
];

pub static LD: [CacheControl; 10] = [
    CacheControl::new(0x0, Default, Default),
    CacheControl::new(0x2, Uncached, Uncached),
    CacheControl::new(0x4, Uncached, Cached),
    CacheControl::new(0x5, Uncached, ConstCached),
    CacheControl::new(0x6, Cached, Uncached),
    CacheControl::new(0x8, Cached, Cached),
    CacheControl::new(0x9, Cached, ConstCached),
    CacheControl::new(0xA, Streaming, Uncached),
    CacheControl::new(0xC, Streaming, Cached),
    CacheControl::new(0xE, ReadInvalidate, ReadInvalidate),
];

pub static ST: [CacheControl; 8] = [
    CacheControl::new(0x0, Default, Default),
    CacheControl::new(0x2, Uncached, Uncached),
    CacheControl::new(0x4, Uncached, WriteBack),
    CacheControl::new(0x6, WriteThrough, Uncached),
    CacheControl::new(0x8, WriteThrough, WriteBack),
    CacheControl::new(0xA, Streaming, Uncached),
    CacheControl::new(0xC, Streaming, WriteBack),
    CacheControl::new(0xE, WriteBack, WriteBack),
];

/// L1 is always bypassed by atomics.
pub static AT: [CacheControl; 3] = [
    CacheControl::new(0x0, Default, Default),
    CacheControl::new(0x2, Uncached, Uncached),
    CacheControl::new(0x4, Uncached, WriteBack),
];

/// Bit offset and width of the cache-control field.
pub fn field(platform: Platform) -> (u32, u32) {
    if platform >= Platform::Xe2 {
        (16, 4)
    } else {
        (17, 3)
    }
}

/// The table `op` draws its cache-control encodings from, if it has any.
pub fn table(platform: Platform, op: SendOp) -> Option<&'static [CacheControl]> {
    let wide = platform >= Platform::Xe2;
    match (op.class(), wide) {
        (SendOpClass::Load, false) => Some(&LD_3BIT),
        (SendOpClass::Store | SendOpClass::Atomic, false) => Some(&ST_3BIT),
        (SendOpClass::Load, true) => Some(&LD),
        (SendOpClass::Store, true) => Some(&ST),
        (SendOpClass::Atomic, true) => Some(&AT),
        (SendOpClass::Other, _) => None,
    }
}

pub fn lookup(table: &'static [CacheControl], encoding: u32) -> Option<&'static CacheControl> {
    table.iter().find(|cc| cc.encoding == encoding)
}

/// The encoding of `(l1, l3)` for `op`.
pub fn encode(platform: Platform, op: SendOp, l1: CacheOpt, l3: CacheOpt) -> Option<u32> {
    table(platform, op)?
        .iter()
        .find(|cc| cc.l1 == l1 && cc.l3 == l3)
        .map(|cc| cc.encoding)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tables_per_class() {
        assert_eq!(table(Platform::XeHpg, SendOp::AtomicIadd).map(<[_]>::len), Some(8));
        assert_eq!(table(Platform::Xe2, SendOp::AtomicIadd).map(<[_]>::len), Some(3));
        assert!(table(Platform::Xe3, SendOp::Fence).is_none());
        assert_eq!(field(Platform::XeHpc), (17, 3));
        assert_eq!(field(Platform::Xe3), (16, 4));
    }

    #[test]
    fn encode_matches_lookup() {
        for &(platform, op) in &[
            (Platform::XeHpg, SendOp::Load),
            (Platform::XeHpg, SendOp::Store),
            (Platform::Xe2, SendOp::Load),
            (Platform::Xe2, SendOp::Store),
            (Platform::Xe3, SendOp::AtomicFadd),
        ] {
            let table = table(platform, op).unwrap();
            for cc in table {
                assert_eq!(encode(platform, op, cc.l1, cc.l3), Some(cc.encoding));
                assert_eq!(lookup(table, cc.encoding), Some(cc));
            }
        }
    }

    #[test]
    fn symbols() {
        assert_eq!(LD_3BIT[0].symbol(), "");
        assert_eq!(LD_3BIT[4].symbol(), ".ca.ca");
        assert_eq!(ST[7].symbol(), ".wb.wb");
    }
}
