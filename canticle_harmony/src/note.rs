// Note and voice types shared by every harmonization path.
//
// A harmony is always four voices, addressed by `VoiceRole` in bass-to-
// soprano order. One of them is the lead (supplied by the caller); the other
// three are derived. `HarmonyResult` is a fixed array indexed by role, so
// "exactly one note per role" holds by construction.
//
// Pitches are MIDI note numbers (C4 = 60). Velocities are in [0, 1].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four singing parts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum VoiceRole {
    Bass = 0,
    Tenor = 1,
    /// The upper-middle voice.
    Alto = 2,
    Soprano = 3,
}

impl VoiceRole {
    pub const ALL: [VoiceRole; 4] = [
        VoiceRole::Bass,
        VoiceRole::Tenor,
        VoiceRole::Alto,
        VoiceRole::Soprano,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            VoiceRole::Bass => "bass",
            VoiceRole::Tenor => "tenor",
            VoiceRole::Alto => "alto",
            VoiceRole::Soprano => "soprano",
        }
    }
}

impl fmt::Display for VoiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VoiceRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bass" => Ok(VoiceRole::Bass),
            "tenor" => Ok(VoiceRole::Tenor),
            "alto" | "upper-middle" => Ok(VoiceRole::Alto),
            "soprano" => Ok(VoiceRole::Soprano),
            other => Err(format!("unknown voice role '{other}'")),
        }
    }
}

/// Vowel the voice sings on. Doubles as the timbre tag handed to the synth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vowel {
    Ah,
    Eh,
    Ee,
    Oh,
    Oo,
}

impl Vowel {
    pub fn as_str(self) -> &'static str {
        match self {
            Vowel::Ah => "ah",
            Vowel::Eh => "eh",
            Vowel::Ee => "ee",
            Vowel::Oh => "oh",
            Vowel::Oo => "oo",
        }
    }
}

impl FromStr for Vowel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ah" | "a" => Ok(Vowel::Ah),
            "eh" | "e" => Ok(Vowel::Eh),
            "ee" | "i" => Ok(Vowel::Ee),
            "oh" | "o" => Ok(Vowel::Oh),
            "oo" | "u" => Ok(Vowel::Oo),
            other => Err(format!("unknown vowel '{other}'")),
        }
    }
}

/// One sung note. A fresh value is produced for every voice on every step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// MIDI pitch number.
    pub pitch: u8,
    /// Loudness in [0, 1].
    pub velocity: f32,
    pub vowel: Vowel,
    /// Sustain the previous pitch of this voice instead of re-attacking.
    pub tie: bool,
}

impl Note {
    pub fn new(pitch: u8, velocity: f32, vowel: Vowel, tie: bool) -> Self {
        Note {
            pitch,
            velocity,
            vowel,
            tie,
        }
    }

    pub fn with_velocity(self, velocity: f32) -> Self {
        Note { velocity, ..self }
    }

    pub fn with_pitch(self, pitch: u8) -> Self {
        Note { pitch, ..self }
    }
}

/// A complete four-voice harmony, one note per role.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarmonyResult {
    notes: [Note; 4],
}

impl HarmonyResult {
    /// Build a result by asking for each role's note in bass-to-soprano order.
    pub fn from_fn(mut f: impl FnMut(VoiceRole) -> Note) -> Self {
        HarmonyResult {
            notes: VoiceRole::ALL.map(&mut f),
        }
    }

    pub fn get(&self, role: VoiceRole) -> &Note {
        &self.notes[role.index()]
    }

    pub fn set(&mut self, role: VoiceRole, note: Note) {
        self.notes[role.index()] = note;
    }

    pub fn pitch(&self, role: VoiceRole) -> u8 {
        self.notes[role.index()].pitch
    }

    /// All four pitches in bass-to-soprano order.
    pub fn pitches(&self) -> [u8; 4] {
        self.notes.map(|n| n.pitch)
    }

    pub fn iter(&self) -> impl Iterator<Item = (VoiceRole, &Note)> {
        VoiceRole::ALL.into_iter().zip(self.notes.iter())
    }

    /// Compact one-line rendering, e.g. `B:C3 T:F3 A:Ab4 S:C4~`.
    pub fn summary(&self) -> String {
        self.iter()
            .map(|(role, note)| {
                let tag = role.name()[..1].to_uppercase();
                let tie = if note.tie { "~" } else { "" };
                format!("{tag}:{}{tie}", pitch_name(note.pitch))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Note name with octave for a MIDI pitch (60 -> "C4", 63 -> "Eb4").
pub fn pitch_name(pitch: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
    ];
    let octave = pitch as i16 / 12 - 1;
    format!("{}{}", NAMES[(pitch % 12) as usize], octave)
}

/// Absolute distance in semitones between two pitches.
pub fn semitone_distance(a: u8, b: u8) -> u8 {
    a.abs_diff(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_index_in_bass_to_soprano_order() {
        let indices: Vec<usize> = VoiceRole::ALL.iter().map(|r| r.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn role_parsing_accepts_upper_middle_alias() {
        assert_eq!("Upper-Middle".parse::<VoiceRole>(), Ok(VoiceRole::Alto));
        assert_eq!("SOPRANO".parse::<VoiceRole>(), Ok(VoiceRole::Soprano));
        assert!("baritone".parse::<VoiceRole>().is_err());
    }

    #[test]
    fn pitch_names() {
        assert_eq!(pitch_name(60), "C4");
        assert_eq!(pitch_name(63), "Eb4");
        assert_eq!(pitch_name(40), "E2");
        assert_eq!(pitch_name(0), "C-1");
    }

    #[test]
    fn harmony_result_addresses_by_role() {
        let mut h = HarmonyResult::from_fn(|role| {
            Note::new(48 + role.index() as u8 * 4, 0.5, Vowel::Ah, false)
        });
        assert_eq!(h.pitches(), [48, 52, 56, 60]);
        h.set(VoiceRole::Alto, Note::new(68, 0.3, Vowel::Oo, true));
        assert_eq!(h.pitch(VoiceRole::Alto), 68);
        assert_eq!(h.get(VoiceRole::Alto).vowel, Vowel::Oo);
        assert_eq!(h.summary(), "B:C3 T:E3 A:Ab4~ S:C4");
    }

    #[test]
    fn harmony_result_serializes_notes() {
        let h = HarmonyResult::from_fn(|_| Note::new(60, 0.5, Vowel::Eh, false));
        let json = serde_json::to_string(&h).unwrap();
        assert!(json.contains("\"vowel\":\"eh\""));
        let back: HarmonyResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }
}
