use std::{fmt, str::FromStr};

use phf::phf_map;
use thiserror::Error;

/// Hardware generations understood by the decoder, oldest first.
///
/// The derived ordering is load-bearing: most decode decisions are phrased as
/// `platform >= Platform::Xe` style range checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Platform {
    Gen7,
    Gen7p5,
    Gen8,
    Gen8lp,
    Gen9,
    Gen9lp,
    Gen9p5,
    Gen10,
    Gen11,
    Xe,
    XeHp,
    XeHpg,
    XeHpc,
    Xe2,
    Xe3,
}

/// The two native encoding families. Everything from [Platform::Xe] onwards
/// shares one instruction layout, everything before shares the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Era {
    Gen,
    Xe,
}

impl Platform {
    pub const ALL: [Platform; 15] = [
        Platform::Gen7,
        Platform::Gen7p5,
        Platform::Gen8,
        Platform::Gen8lp,
        Platform::Gen9,
        Platform::Gen9lp,
        Platform::Gen9p5,
        Platform::Gen10,
        Platform::Gen11,
        Platform::Xe,
        Platform::XeHp,
        Platform::XeHpg,
        Platform::XeHpc,
        Platform::Xe2,
        Platform::Xe3,
    ];

    pub fn era(self) -> Era {
        if self >= Platform::Xe {
            Era::Xe
        } else {
            Era::Gen
        }
    }

    /// General register size in bytes.
    pub fn grf_bytes(self) -> u32 {
        if self >= Platform::XeHpc {
            64
        } else {
            32
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Platform::Gen7 => "gen7",
            Platform::Gen7p5 => "gen7p5",
            Platform::Gen8 => "gen8",
            Platform::Gen8lp => "gen8lp",
            Platform::Gen9 => "gen9",
            Platform::Gen9lp => "gen9lp",
            Platform::Gen9p5 => "gen9p5",
            Platform::Gen10 => "gen10",
            Platform::Gen11 => "gen11",
            Platform::Xe => "xe",
            Platform::XeHp => "xe_hp",
            Platform::XeHpg => "xe_hpg",
            Platform::XeHpc => "xe_hpc",
            Platform::Xe2 => "xe2",
            Platform::Xe3 => "xe3",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Canonical names plus the usual product code names.
const PLATFORM_NAMES: phf::Map<&'static str, Platform> = phf_map! {
    "gen7" => Platform::Gen7,
    "ivb" => Platform::Gen7,
    "gen7p5" => Platform::Gen7p5,
    "hsw" => Platform::Gen7p5,
    "gen8" => Platform::Gen8,
    "bdw" => Platform::Gen8,
    "gen8lp" => Platform::Gen8lp,
    "chv" => Platform::Gen8lp,
    "gen9" => Platform::Gen9,
    "skl" => Platform::Gen9,
    "gen9lp" => Platform::Gen9lp,
    "bxt" => Platform::Gen9lp,
    "gen9p5" => Platform::Gen9p5,
    "kbl" => Platform::Gen9p5,
    "gen10" => Platform::Gen10,
    "cnl" => Platform::Gen10,
    "gen11" => Platform::Gen11,
    "icl" => Platform::Gen11,
    "xe" => Platform::Xe,
    "xe_lp" => Platform::Xe,
    "gen12p1" => Platform::Xe,
    "tgl" => Platform::Xe,
    "xe_hp" => Platform::XeHp,
    "xe_hpg" => Platform::XeHpg,
    "dg2" => Platform::XeHpg,
    "xe_hpc" => Platform::XeHpc,
    "pvc" => Platform::XeHpc,
    "xe2" => Platform::Xe2,
    "xe3" => Platform::Xe3,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown platform '{0}'")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PLATFORM_NAMES
            .get(s.to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| UnknownPlatform(s.to_owned()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn platforms_are_ordered() {
        assert!(Platform::Gen7 < Platform::Gen8);
        assert!(Platform::Gen11 < Platform::Xe);
        assert!(Platform::XeHpg < Platform::XeHpc);
        assert!(Platform::ALL.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn parse_names() {
        assert_eq!("XE_HPG".parse::<Platform>(), Ok(Platform::XeHpg));
        assert_eq!("skl".parse::<Platform>(), Ok(Platform::Gen9));
        assert!("gen6".parse::<Platform>().is_err());
        for p in Platform::ALL {
            assert_eq!(p.name().parse::<Platform>(), Ok(p));
        }
    }
}
