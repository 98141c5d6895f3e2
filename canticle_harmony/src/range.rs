// Vocal range tables and octave-correction policies.
//
// Each role has a closed pitch interval it may sing in. Two named tables
// exist (`RangeProfile::Compact` and `RangeProfile::Extended`) and callers
// may override individual roles. A role missing from a table resolves to
// `DEFAULT_WIDE_RANGE` rather than failing.
//
// Two correction policies, which differ for pitches more than an octave out:
// - `SingleOctave`: shift by one octave at most, then clamp. A pitch far out
//   of range collapses onto the boundary. Used by the stochastic path.
// - `OctaveSearch`: keep shifting by octaves toward the range, then clamp.
//   Used by the triad fallback.

use crate::note::VoiceRole;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A closed MIDI pitch interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitchRange {
    pub min: u8,
    pub max: u8,
}

impl PitchRange {
    pub const fn new(min: u8, max: u8) -> Self {
        PitchRange { min, max }
    }

    pub fn contains(&self, pitch: i16) -> bool {
        (self.min as i16..=self.max as i16).contains(&pitch)
    }

    pub fn clamp(&self, pitch: i16) -> u8 {
        pitch.clamp(self.min as i16, self.max as i16) as u8
    }
}

/// Range used for any role a table does not mention.
pub const DEFAULT_WIDE_RANGE: PitchRange = PitchRange::new(36, 96);

/// The named range tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeProfile {
    /// Textbook SATB ranges, under two octaves per voice.
    Compact,
    /// Looser ranges for live singing, up to two octaves per voice.
    #[default]
    Extended,
}

impl RangeProfile {
    pub fn range(self, role: VoiceRole) -> PitchRange {
        match (self, role) {
            (RangeProfile::Compact, VoiceRole::Bass) => PitchRange::new(40, 60), // E2–C4
            (RangeProfile::Compact, VoiceRole::Tenor) => PitchRange::new(48, 67), // C3–G4
            (RangeProfile::Compact, VoiceRole::Alto) => PitchRange::new(53, 72), // F3–C5
            (RangeProfile::Compact, VoiceRole::Soprano) => PitchRange::new(60, 79), // C4–G5
            (RangeProfile::Extended, VoiceRole::Bass) => PitchRange::new(40, 64), // E2–E4
            (RangeProfile::Extended, VoiceRole::Tenor) => PitchRange::new(48, 69), // C3–A4
            (RangeProfile::Extended, VoiceRole::Alto) => PitchRange::new(57, 77), // A3–F5
            (RangeProfile::Extended, VoiceRole::Soprano) => PitchRange::new(60, 84), // C4–C6
        }
    }

    pub fn table(self) -> RangeTable {
        RangeTable {
            ranges: VoiceRole::ALL.iter().map(|&r| (r, self.range(r))).collect(),
        }
    }
}

impl std::str::FromStr for RangeProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" | "narrow" => Ok(RangeProfile::Compact),
            "extended" | "wide" => Ok(RangeProfile::Extended),
            other => Err(format!("unknown range profile '{other}'")),
        }
    }
}

/// Per-role ranges as actually used by a harmonizer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RangeTable {
    ranges: BTreeMap<VoiceRole, PitchRange>,
}

impl RangeTable {
    /// A table with no entries: every role gets `DEFAULT_WIDE_RANGE`.
    pub fn empty() -> Self {
        RangeTable::default()
    }

    pub fn with_override(mut self, role: VoiceRole, range: PitchRange) -> Self {
        self.ranges.insert(role, range);
        self
    }

    pub fn range(&self, role: VoiceRole) -> PitchRange {
        self.ranges.get(&role).copied().unwrap_or(DEFAULT_WIDE_RANGE)
    }

    pub fn entries(&self) -> impl Iterator<Item = (VoiceRole, PitchRange)> + '_ {
        self.ranges.iter().map(|(&r, &p)| (r, p))
    }
}

/// How an out-of-range pitch is brought back inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePolicy {
    SingleOctave,
    OctaveSearch,
}

impl RangePolicy {
    pub fn apply(self, pitch: i16, range: PitchRange) -> u8 {
        match self {
            RangePolicy::SingleOctave => fit_single_octave(pitch, range),
            RangePolicy::OctaveSearch => fit_octave_search(pitch, range),
        }
    }
}

/// One octave shift at most, then a hard clamp.
pub fn fit_single_octave(pitch: i16, range: PitchRange) -> u8 {
    let mut p = pitch;
    if p < range.min as i16 {
        p += 12;
    } else if p > range.max as i16 {
        p -= 12;
    }
    range.clamp(p)
}

/// Shift up by octaves while below the range, then down by octaves while
/// above it, then a hard clamp. The loops run one after the other, so a
/// range narrower than an octave still terminates (on the clamp).
pub fn fit_octave_search(pitch: i16, range: PitchRange) -> u8 {
    let (min, max) = (range.min as i16, range.max as i16);
    let mut p = pitch;
    while p < min {
        p += 12;
    }
    while p > max {
        p -= 12;
    }
    range.clamp(p)
}
