use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SoilError;

/// KA5 soil texture class (German soil mapping guideline, 5th edition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureClass {
    Fs,
    Fsms,
    Fsgs,
    Gs,
    Msgs,
    Msfs,
    Ms,
    Ss,
    Sl2,
    Sl3,
    Sl4,
    Slu,
    St2,
    St3,
    Su2,
    Su3,
    Su4,
    Ls2,
    Ls3,
    Ls4,
    Lt2,
    Lt3,
    Lts,
    Lu,
    Uu,
    Uls,
    Us,
    Ut2,
    Ut3,
    Ut4,
    Utl,
    Tt,
    Tl,
    Tu2,
    Tu3,
    Ts2,
    Ts3,
    Ts4,
    Tu4,
    L,
    S,
    U,
    T,
    Hz1,
    Hz2,
    Hz3,
    /// High moor peat
    Hh,
    /// Fen peat
    Hn,
}

/// Representative sand and clay mass fractions [kg kg-1] of a texture class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SandClay {
    pub sand: f64,
    pub clay: f64,
}

impl SandClay {
    pub fn silt(&self) -> f64 {
        1.0 - self.sand - self.clay
    }
}

/// Pair handed out for codes the lookup table does not know.
pub const FALLBACK_SAND_CLAY: SandClay = SandClay {
    sand: 0.66,
    clay: 0.0,
};

impl TextureClass {
    pub const ALL: [TextureClass; 48] = [
        TextureClass::Fs,
        TextureClass::Fsms,
        TextureClass::Fsgs,
        TextureClass::Gs,
        TextureClass::Msgs,
        TextureClass::Msfs,
        TextureClass::Ms,
        TextureClass::Ss,
        TextureClass::Sl2,
        TextureClass::Sl3,
        TextureClass::Sl4,
        TextureClass::Slu,
        TextureClass::St2,
        TextureClass::St3,
        TextureClass::Su2,
        TextureClass::Su3,
        TextureClass::Su4,
        TextureClass::Ls2,
        TextureClass::Ls3,
        TextureClass::Ls4,
        TextureClass::Lt2,
        TextureClass::Lt3,
        TextureClass::Lts,
        TextureClass::Lu,
        TextureClass::Uu,
        TextureClass::Uls,
        TextureClass::Us,
        TextureClass::Ut2,
        TextureClass::Ut3,
        TextureClass::Ut4,
        TextureClass::Utl,
        TextureClass::Tt,
        TextureClass::Tl,
        TextureClass::Tu2,
        TextureClass::Tu3,
        TextureClass::Ts2,
        TextureClass::Ts3,
        TextureClass::Ts4,
        TextureClass::Tu4,
        TextureClass::L,
        TextureClass::S,
        TextureClass::U,
        TextureClass::T,
        TextureClass::Hz1,
        TextureClass::Hz2,
        TextureClass::Hz3,
        TextureClass::Hh,
        TextureClass::Hn,
    ];

    /// The KA5 code as it appears in soil databases (e.g. "Ls3", "fSms").
    pub fn code(&self) -> &'static str {
        match self {
            TextureClass::Fs => "fS",
            TextureClass::Fsms => "fSms",
            TextureClass::Fsgs => "fSgs",
            TextureClass::Gs => "gS",
            TextureClass::Msgs => "mSgs",
            TextureClass::Msfs => "mSfs",
            TextureClass::Ms => "mS",
            TextureClass::Ss => "Ss",
            TextureClass::Sl2 => "Sl2",
            TextureClass::Sl3 => "Sl3",
            TextureClass::Sl4 => "Sl4",
            TextureClass::Slu => "Slu",
            TextureClass::St2 => "St2",
            TextureClass::St3 => "St3",
            TextureClass::Su2 => "Su2",
            TextureClass::Su3 => "Su3",
            TextureClass::Su4 => "Su4",
            TextureClass::Ls2 => "Ls2",
            TextureClass::Ls3 => "Ls3",
            TextureClass::Ls4 => "Ls4",
            TextureClass::Lt2 => "Lt2",
            TextureClass::Lt3 => "Lt3",
            TextureClass::Lts => "Lts",
            TextureClass::Lu => "Lu",
            TextureClass::Uu => "Uu",
            TextureClass::Uls => "Uls",
            TextureClass::Us => "Us",
            TextureClass::Ut2 => "Ut2",
            TextureClass::Ut3 => "Ut3",
            TextureClass::Ut4 => "Ut4",
            TextureClass::Utl => "Utl",
            TextureClass::Tt => "Tt",
            TextureClass::Tl => "Tl",
            TextureClass::Tu2 => "Tu2",
            TextureClass::Tu3 => "Tu3",
            TextureClass::Ts2 => "Ts2",
            TextureClass::Ts3 => "Ts3",
            TextureClass::Ts4 => "Ts4",
            TextureClass::Tu4 => "Tu4",
            TextureClass::L => "L",
            TextureClass::S => "S",
            TextureClass::U => "U",
            TextureClass::T => "T",
            TextureClass::Hz1 => "HZ1",
            TextureClass::Hz2 => "HZ2",
            TextureClass::Hz3 => "HZ3",
            TextureClass::Hh => "Hh",
            TextureClass::Hn => "Hn",
        }
    }

    /// Peat soils have no raw-density axis in the reference tables.
    pub fn is_peat(&self) -> bool {
        matches!(self, TextureClass::Hh | TextureClass::Hn)
    }
}

impl std::fmt::Display for TextureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for TextureClass {
    type Err = SoilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        // "LtS" is a spelling found in older tables
        if code == "LtS" {
            return Ok(TextureClass::Lts);
        }
        TextureClass::ALL
            .iter()
            .find(|t| t.code() == code)
            .copied()
            .ok_or_else(|| SoilError::UnknownTexture {
                code: code.to_string(),
                fallback: FALLBACK_SAND_CLAY,
            })
    }
}

impl Serialize for TextureClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for TextureClass {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        code.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Below(f64),
    AtLeast(f64),
    Any,
}

impl Bound {
    fn admits(self, x: f64) -> bool {
        match self {
            Bound::Below(limit) => x < limit,
            Bound::AtLeast(limit) => x >= limit,
            Bound::Any => true,
        }
    }
}

/// Silt/clay regions of the KA5 texture triangle. Order matters: first match wins.
const REGIONS: [(Bound, Bound, TextureClass); 31] = [
    (Bound::Below(0.10), Bound::Below(0.05), TextureClass::Ss),
    (Bound::Below(0.25), Bound::Below(0.05), TextureClass::Su2),
    (Bound::Below(0.25), Bound::Below(0.08), TextureClass::Sl2),
    (Bound::Below(0.40), Bound::Below(0.08), TextureClass::Su3),
    (Bound::Below(0.50), Bound::Below(0.08), TextureClass::Su4),
    (Bound::Below(0.80), Bound::Below(0.08), TextureClass::Us),
    (Bound::AtLeast(0.80), Bound::Below(0.08), TextureClass::Uu),
    (Bound::Below(0.10), Bound::Below(0.17), TextureClass::St2),
    (Bound::Below(0.40), Bound::Below(0.12), TextureClass::Sl3),
    (Bound::Below(0.40), Bound::Below(0.17), TextureClass::Sl4),
    (Bound::Below(0.50), Bound::Below(0.17), TextureClass::Slu),
    (Bound::Below(0.65), Bound::Below(0.17), TextureClass::Uls),
    (Bound::AtLeast(0.65), Bound::Below(0.12), TextureClass::Ut2),
    (Bound::AtLeast(0.65), Bound::Below(0.17), TextureClass::Ut3),
    (Bound::Below(0.15), Bound::Below(0.25), TextureClass::St3),
    (Bound::Below(0.30), Bound::Below(0.25), TextureClass::Ls4),
    (Bound::Below(0.40), Bound::Below(0.25), TextureClass::Ls3),
    (Bound::Below(0.50), Bound::Below(0.25), TextureClass::Ls2),
    (Bound::Below(0.65), Bound::Below(0.30), TextureClass::Lu),
    (Bound::AtLeast(0.65), Bound::Below(0.25), TextureClass::Ut4),
    (Bound::Below(0.15), Bound::Below(0.35), TextureClass::Ts4),
    (Bound::Below(0.30), Bound::Below(0.45), TextureClass::Lts),
    (Bound::Below(0.50), Bound::Below(0.35), TextureClass::Lt2),
    (Bound::Below(0.65), Bound::Below(0.45), TextureClass::Tu3),
    (Bound::AtLeast(0.65), Bound::AtLeast(0.25), TextureClass::Tu4),
    (Bound::Below(0.15), Bound::Below(0.45), TextureClass::Ts3),
    (Bound::Below(0.50), Bound::Below(0.45), TextureClass::Lt3),
    (Bound::Below(0.15), Bound::Below(0.65), TextureClass::Ts2),
    (Bound::Below(0.30), Bound::Below(0.65), TextureClass::Tl),
    (Bound::AtLeast(0.30), Bound::Below(0.65), TextureClass::Tu2),
    (Bound::Any, Bound::AtLeast(0.65), TextureClass::Tt),
];

const FRACTION_TOLERANCE: f64 = 1e-9;

/// Classify a sand/clay mass-fraction pair into a KA5 texture class.
///
/// Silt is taken as `1 - sand - clay`. Inputs outside `[0, 1]`, pairs summing
/// above one, and NaN are reported as [`SoilError::Classification`].
pub fn classify(sand: f64, clay: f64) -> Result<TextureClass, SoilError> {
    let in_unit = |x: f64| (0.0..=1.0).contains(&x);
    if !in_unit(sand) || !in_unit(clay) || sand + clay > 1.0 + FRACTION_TOLERANCE {
        return Err(SoilError::Classification { sand, clay });
    }

    let silt = 1.0 - sand - clay;
    REGIONS
        .iter()
        .find(|(silt_bound, clay_bound, _)| silt_bound.admits(silt) && clay_bound.admits(clay))
        .map(|(_, _, class)| *class)
        .ok_or(SoilError::Classification { sand, clay })
}

/// Representative sand and clay content of a texture class.
pub fn declassify(texture: TextureClass) -> SandClay {
    let (sand, clay) = match texture {
        TextureClass::Fs => (0.84, 0.02),
        TextureClass::Fsms => (0.86, 0.02),
        TextureClass::Fsgs => (0.88, 0.02),
        TextureClass::Gs => (0.93, 0.02),
        TextureClass::Msgs => (0.96, 0.02),
        TextureClass::Msfs => (0.93, 0.02),
        TextureClass::Ms => (0.96, 0.02),
        TextureClass::Ss => (0.93, 0.02),
        TextureClass::Sl2 => (0.76, 0.06),
        TextureClass::Sl3 => (0.65, 0.10),
        TextureClass::Sl4 => (0.60, 0.14),
        TextureClass::Slu => (0.43, 0.12),
        TextureClass::St2 => (0.84, 0.11),
        TextureClass::St3 => (0.71, 0.21),
        TextureClass::Su2 => (0.80, 0.02),
        TextureClass::Su3 => (0.63, 0.04),
        TextureClass::Su4 => (0.56, 0.04),
        TextureClass::Ls2 => (0.34, 0.21),
        TextureClass::Ls3 => (0.44, 0.21),
        TextureClass::Ls4 => (0.56, 0.21),
        TextureClass::Lt2 => (0.30, 0.30),
        TextureClass::Lt3 => (0.20, 0.40),
        TextureClass::Lts => (0.42, 0.35),
        TextureClass::Lu => (0.19, 0.23),
        TextureClass::Uu => (0.10, 0.04),
        TextureClass::Uls => (0.30, 0.12),
        TextureClass::Us => (0.31, 0.04),
        TextureClass::Ut2 => (0.13, 0.10),
        TextureClass::Ut3 => (0.11, 0.14),
        TextureClass::Ut4 => (0.09, 0.21),
        TextureClass::Utl => (0.19, 0.23),
        TextureClass::Tt => (0.17, 0.82),
        TextureClass::Tl => (0.17, 0.55),
        TextureClass::Tu2 => (0.12, 0.55),
        TextureClass::Tu3 => (0.10, 0.37),
        TextureClass::Ts2 => (0.37, 0.55),
        TextureClass::Ts3 => (0.52, 0.40),
        TextureClass::Ts4 => (0.62, 0.30),
        TextureClass::Tu4 => (0.05, 0.30),
        TextureClass::L => (0.35, 0.31),
        TextureClass::S => (0.93, 0.02),
        TextureClass::U => (0.10, 0.04),
        TextureClass::T => (0.17, 0.82),
        TextureClass::Hz1 | TextureClass::Hz2 | TextureClass::Hz3 => (0.30, 0.15),
        TextureClass::Hh | TextureClass::Hn => (0.15, 0.10),
    };
    SandClay { sand, clay }
}

/// Look up the representative pair for a raw KA5 code.
///
/// Unknown codes fail with [`SoilError::UnknownTexture`], whose `fallback`
/// field holds [`FALLBACK_SAND_CLAY`] for callers that continue degraded.
pub fn declassify_code(code: &str) -> Result<SandClay, SoilError> {
    code.parse::<TextureClass>().map(declassify)
}
