// Deterministic triad harmonizer.
//
// Used whenever the lead pitch is outside the vocabulary, and selectable on
// its own as the simpler strategy. The chord is built under the lead:
//
//   bass    = lead - 12
//   tenor   = lead - fifth
//   alto    = lead - third   (major third for major-favoring pitch classes)
//   soprano = lead
//
// each octave-searched into its role's range. If a previous harmony exists,
// any voice that would move more than the smoothing threshold tries the
// octave above and below, and takes whichever in-range option moves least
// (keeping the unshifted pitch on ties).
//
// Only the vowel choice is random. Pitches depend solely on the lead and
// the previous harmony.

use crate::config::{HarmonyConfig, VoicingParams};
use crate::note::{HarmonyResult, Note, VoiceRole, semitone_distance};
use crate::range::{PitchRange, RangePolicy, RangeTable};
use canticle_prng::RandomSource;

#[derive(Debug, Clone)]
pub struct TriadHarmonizer {
    voicing: VoicingParams,
    ranges: RangeTable,
    policy: RangePolicy,
    previous: Option<HarmonyResult>,
}

impl TriadHarmonizer {
    pub fn new(config: &HarmonyConfig) -> Self {
        TriadHarmonizer {
            voicing: config.voicing.clone(),
            ranges: config.ranges.table(),
            policy: config.ranges.fallback_policy,
            previous: None,
        }
    }

    /// Third above the chord root for a lead pitch.
    pub fn third_for(&self, lead_pitch: u8) -> u8 {
        if self.voicing.major_pitch_classes.contains(&(lead_pitch % 12)) {
            self.voicing.major_third
        } else {
            self.voicing.minor_third
        }
    }

    /// Range-fitted chord pitches before smoothing, bass to soprano.
    pub fn triad(&self, lead_pitch: u8) -> [u8; 4] {
        let lead = lead_pitch as i16;
        let offsets = [12, self.voicing.fifth as i16, self.third_for(lead_pitch) as i16, 0];
        VoiceRole::ALL.map(|role| {
            self.policy
                .apply(lead - offsets[role.index()], self.ranges.range(role))
        })
    }

    pub fn generate(
        &mut self,
        lead_role: VoiceRole,
        lead: Note,
        volume: f32,
        rng: &mut impl RandomSource,
    ) -> HarmonyResult {
        let mut pitches = self.triad(lead.pitch);
        if let Some(prev) = &self.previous {
            for role in VoiceRole::ALL {
                pitches[role.index()] = smooth(
                    pitches[role.index()],
                    prev.pitch(role),
                    self.ranges.range(role),
                    self.voicing.smoothing_threshold,
                );
            }
        }

        let result = HarmonyResult::from_fn(|role| {
            let pitch = pitches[role.index()];
            if role == lead_role {
                return Note::new(pitch, volume, lead.vowel, lead.tie);
            }
            let vowel = if rng.random_bool(self.voicing.primary_vowel_probability) {
                lead.vowel
            } else {
                self.voicing.alternate_vowel
            };
            let held = self
                .previous
                .as_ref()
                .is_some_and(|prev| prev.pitch(role) == pitch);
            Note::new(
                pitch,
                volume * self.voicing.harmony_velocity_scale,
                vowel,
                lead.tie && held,
            )
        });

        self.previous = Some(result);
        result
    }

    /// Forget the previous harmony; the next call is unsmoothed.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    pub fn previous(&self) -> Option<&HarmonyResult> {
        self.previous.as_ref()
    }
}

/// Voice-leading smoothing for one voice.
///
/// Leaves `candidate` alone unless it moves more than `threshold` from
/// `previous`; then the octave above or below replaces it if that is in
/// range and strictly closer.
pub fn smooth(candidate: u8, previous: u8, range: PitchRange, threshold: u8) -> u8 {
    let mut best = candidate;
    let mut best_distance = semitone_distance(candidate, previous);
    if best_distance <= threshold {
        return candidate;
    }
    for alt in [candidate as i16 + 12, candidate as i16 - 12] {
        if !range.contains(alt) {
            continue;
        }
        let alt = alt as u8;
        let distance = semitone_distance(alt, previous);
        if distance < best_distance {
            best = alt;
            best_distance = distance;
        }
    }
    best
}
