// Tunable harmonization parameters.
//
// Every constant the engine uses lives in `HarmonyConfig`, grouped into
// parameter structs by the stage that reads them. All groups carry
// `#[serde(default)]`, so a JSON file only needs to name the values it
// changes:
//
//     { "sampling": { "temperature": 0.9 }, "ranges": { "profile": "compact" } }
//
// Defaults reproduce the reference tuning: a white-key vocabulary over five
// octaves, temperature 1.2, context weight 0.3 with decay 0.5, rank bands at
// 0.6/0.8/0.9 with a top-5 tail, and the extended range profile.
//
// See also: `vocab.rs` and `transition.rs` (read `vocabulary` and
// `transition`), `stochastic.rs` (`sampling`, `history`, `voicing`),
// `triad.rs` (`voicing`), `range.rs` (profiles and policies).

use crate::note::{VoiceRole, Vowel};
use crate::range::{PitchRange, RangePolicy, RangeProfile, RangeTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which harmonizer the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Transition-model sampling, dispatching to the triad harmonizer when
    /// the lead pitch is not in the vocabulary.
    #[default]
    Stochastic,
    /// Always the deterministic triad harmonizer.
    Triad,
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stochastic" | "markov" => Ok(Strategy::Stochastic),
            "triad" | "fallback" => Ok(Strategy::Triad),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

/// Which pitches the vocabulary can represent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyParams {
    /// Pitch classes (0-11, ascending) included in every octave.
    pub diatonic_pattern: Vec<u8>,
    /// Octave numbers use the C4 = 60 convention: octave `n` starts at
    /// MIDI `(n + 1) * 12`.
    pub lowest_octave: i8,
    pub highest_octave: i8,
}

impl Default for VocabularyParams {
    fn default() -> Self {
        VocabularyParams {
            diatonic_pattern: vec![0, 2, 4, 5, 7, 9, 11],
            lowest_octave: 2,
            highest_octave: 6,
        }
    }
}

/// Interval heuristics used to fill the transition matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionParams {
    /// Repeated pitch.
    pub unison_weight: f64,
    /// 1-2 semitones.
    pub step_weight: f64,
    /// 3-4 semitones.
    pub third_weight: f64,
    /// 5-7 semitones.
    pub fourth_fifth_weight: f64,
    /// Exactly 12 semitones.
    pub octave_weight: f64,
    /// Everything else.
    pub leap_weight: f64,
    /// Interval classes (mod 12) that earn the consonance bonus.
    pub consonant_intervals: Vec<u8>,
    pub consonance_bonus: f64,
    /// Multiplier for moving to the tied state of the same pitch.
    pub tie_bonus: f64,
}

impl Default for TransitionParams {
    fn default() -> Self {
        TransitionParams {
            unison_weight: 0.30,
            step_weight: 0.25,
            third_weight: 0.20,
            fourth_fifth_weight: 0.15,
            octave_weight: 0.08,
            leap_weight: 0.02,
            consonant_intervals: vec![0, 3, 4, 5, 7, 8, 9],
            consonance_bonus: 1.5,
            tie_bonus: 1.2,
        }
    }
}

impl TransitionParams {
    /// Base weight for an absolute interval, before bonuses.
    pub fn base_weight(&self, distance: u8) -> f64 {
        match distance {
            0 => self.unison_weight,
            1..=2 => self.step_weight,
            3..=4 => self.third_weight,
            5..=7 => self.fourth_fifth_weight,
            12 => self.octave_weight,
            _ => self.leap_weight,
        }
    }

    pub fn is_consonant(&self, distance: u8) -> bool {
        self.consonant_intervals.contains(&(distance % 12))
    }
}

/// Context blending, softmax, and rank-biased selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    pub temperature: f64,
    /// Weight of the most recent context row.
    pub context_weight: f64,
    /// Older context rows are scaled by `exp(-position * context_decay)`.
    pub context_decay: f64,
    /// Cumulative bands for picking the 1st, 2nd, and 3rd ranked candidate.
    /// Draws above the last band pick uniformly from the top `tail_top_k`.
    pub rank_thresholds: [f64; 3],
    pub tail_top_k: usize,
}

impl Default for SamplingParams {
    fn default() -> Self {
        SamplingParams {
            temperature: 1.2,
            context_weight: 0.3,
            context_decay: 0.5,
            rank_thresholds: [0.6, 0.8, 0.9],
            tail_top_k: 5,
        }
    }
}

/// Per-voice history windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryParams {
    /// Entries taken from the harmonized voice's own history.
    pub own_context: usize,
    /// Entries taken from the lead voice's history.
    pub lead_context: usize,
    /// Capacity of every voice history; the oldest entry is dropped first.
    pub max_len: usize,
}

impl Default for HistoryParams {
    fn default() -> Self {
        HistoryParams {
            own_context: 4,
            lead_context: 2,
            max_len: 8,
        }
    }
}

/// Velocity, vowel, and chord-shape choices for derived voices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoicingParams {
    /// Derived voices sing at `volume * harmony_velocity_scale`.
    pub harmony_velocity_scale: f32,
    /// Symmetric random perturbation added to sampled voices' velocity.
    pub velocity_jitter: f32,
    pub min_velocity: f32,
    pub max_velocity: f32,
    /// Chance a derived voice keeps the lead's vowel.
    pub primary_vowel_probability: f64,
    pub alternate_vowel: Vowel,
    /// Velocity scale for the lead-doubling note used when a sampled state
    /// cannot be turned back into a note.
    pub decode_failure_velocity_scale: f32,
    /// Lead pitch classes harmonized with a major third.
    pub major_pitch_classes: Vec<u8>,
    pub major_third: u8,
    pub minor_third: u8,
    pub fifth: u8,
    /// Voices moving further than this (semitones) try an octave shift.
    pub smoothing_threshold: u8,
}

impl Default for VoicingParams {
    fn default() -> Self {
        VoicingParams {
            harmony_velocity_scale: 0.6,
            velocity_jitter: 0.1,
            min_velocity: 0.1,
            max_velocity: 1.0,
            primary_vowel_probability: 0.8,
            alternate_vowel: Vowel::Oo,
            decode_failure_velocity_scale: 0.4,
            major_pitch_classes: vec![0, 2, 4, 5, 7, 9],
            major_third: 4,
            minor_third: 3,
            fifth: 7,
            smoothing_threshold: 6,
        }
    }
}

/// Range profile, per-role overrides, and the correction policy per path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeParams {
    pub profile: RangeProfile,
    pub overrides: BTreeMap<VoiceRole, PitchRange>,
    pub stochastic_policy: RangePolicy,
    pub fallback_policy: RangePolicy,
}

impl Default for RangeParams {
    fn default() -> Self {
        RangeParams {
            profile: RangeProfile::Extended,
            overrides: BTreeMap::new(),
            stochastic_policy: RangePolicy::SingleOctave,
            fallback_policy: RangePolicy::OctaveSearch,
        }
    }
}

impl RangeParams {
    /// The profile's table with overrides applied.
    pub fn table(&self) -> RangeTable {
        self.overrides
            .iter()
            .fold(self.profile.table(), |table, (&role, &range)| {
                table.with_override(role, range)
            })
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonyConfig {
    pub strategy: Strategy,
    pub vocabulary: VocabularyParams,
    pub transition: TransitionParams,
    pub sampling: SamplingParams,
    pub history: HistoryParams,
    pub voicing: VoicingParams,
    pub ranges: RangeParams,
}

impl HarmonyConfig {
    /// Load from a JSON file and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: HarmonyConfig =
            serde_json::from_str(&data).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg)) };

        let vocab = &self.vocabulary;
        if vocab.diatonic_pattern.is_empty() {
            return invalid("vocabulary.diatonic_pattern is empty".into());
        }
        if vocab.diatonic_pattern.iter().any(|&pc| pc >= 12) {
            return invalid("vocabulary.diatonic_pattern entries must be below 12".into());
        }
        if vocab.diatonic_pattern.windows(2).any(|w| w[0] >= w[1]) {
            return invalid("vocabulary.diatonic_pattern must be strictly ascending".into());
        }
        if vocab.lowest_octave > vocab.highest_octave {
            return invalid(format!(
                "vocabulary octave span is inverted ({} > {})",
                vocab.lowest_octave, vocab.highest_octave
            ));
        }
        if vocab.lowest_octave < -1 || (vocab.highest_octave as i16 + 1) * 12 + 11 > 127 {
            return invalid("vocabulary octave span leaves the MIDI pitch range".into());
        }

        let sampling = &self.sampling;
        if !(sampling.temperature.is_finite() && sampling.temperature > 0.0) {
            return invalid(format!(
                "sampling.temperature must be positive, got {}",
                sampling.temperature
            ));
        }
        for (name, value) in [
            ("sampling.context_weight", sampling.context_weight),
            ("sampling.context_decay", sampling.context_decay),
        ] {
            if !value.is_finite() {
                return invalid(format!("{name} must be finite, got {value}"));
            }
        }
        let [t1, t2, t3] = sampling.rank_thresholds;
        if !(0.0 < t1 && t1 <= t2 && t2 <= t3 && t3 <= 1.0) {
            return invalid(format!(
                "sampling.rank_thresholds must ascend within (0, 1], got {:?}",
                sampling.rank_thresholds
            ));
        }
        if sampling.tail_top_k == 0 {
            return invalid("sampling.tail_top_k must be at least 1".into());
        }

        if self.history.max_len == 0 {
            return invalid("history.max_len must be at least 1".into());
        }

        let transition = &self.transition;
        for (name, value) in [
            ("transition.unison_weight", transition.unison_weight),
            ("transition.step_weight", transition.step_weight),
            ("transition.third_weight", transition.third_weight),
            ("transition.fourth_fifth_weight", transition.fourth_fifth_weight),
            ("transition.octave_weight", transition.octave_weight),
            ("transition.leap_weight", transition.leap_weight),
            ("transition.consonance_bonus", transition.consonance_bonus),
            ("transition.tie_bonus", transition.tie_bonus),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return invalid(format!("{name} must be finite and non-negative, got {value}"));
            }
        }

        let voicing = &self.voicing;
        for (name, value) in [
            ("voicing.harmony_velocity_scale", voicing.harmony_velocity_scale),
            ("voicing.velocity_jitter", voicing.velocity_jitter),
            ("voicing.min_velocity", voicing.min_velocity),
            ("voicing.max_velocity", voicing.max_velocity),
            (
                "voicing.decode_failure_velocity_scale",
                voicing.decode_failure_velocity_scale,
            ),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return invalid(format!("{name} must be finite and non-negative, got {value}"));
            }
        }
        if !(0.0..=1.0).contains(&voicing.primary_vowel_probability) {
            return invalid(format!(
                "voicing.primary_vowel_probability must be within [0, 1], got {}",
                voicing.primary_vowel_probability
            ));
        }
        if voicing.min_velocity > voicing.max_velocity {
            return invalid("voicing velocity bounds are inverted".into());
        }

        for (role, range) in self.ranges.table().entries() {
            if range.min > range.max {
                return invalid(format!("range for {role} is inverted"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        HarmonyConfig::default().validate().unwrap();
    }

    #[test]
    fn interval_buckets() {
        let t = TransitionParams::default();
        assert_eq!(t.base_weight(0), 0.30);
        assert_eq!(t.base_weight(2), 0.25);
        assert_eq!(t.base_weight(4), 0.20);
        assert_eq!(t.base_weight(7), 0.15);
        assert_eq!(t.base_weight(12), 0.08);
        assert_eq!(t.base_weight(8), 0.02);
        assert_eq!(t.base_weight(24), 0.02);
        assert!(t.is_consonant(0));
        assert!(t.is_consonant(16));
        assert!(!t.is_consonant(6));
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let json = r#"{
            "strategy": "triad",
            "sampling": { "temperature": 0.9 },
            "ranges": { "profile": "compact", "overrides": { "bass": { "min": 38, "max": 58 } } }
        }"#;
        let config: HarmonyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.strategy, Strategy::Triad);
        assert_eq!(config.sampling.temperature, 0.9);
        assert_eq!(config.sampling.context_weight, 0.3);
        assert_eq!(config.history, HistoryParams::default());
        let table = config.ranges.table();
        assert_eq!(table.range(VoiceRole::Bass), PitchRange::new(38, 58));
        assert_eq!(table.range(VoiceRole::Tenor), PitchRange::new(48, 67));
    }

    #[test]
    fn load_reads_and_validates_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "history": {{ "max_len": 6 }} }}"#).unwrap();
        let config = HarmonyConfig::load(file.path()).unwrap();
        assert_eq!(config.history.max_len, 6);
        assert_eq!(config.history.own_context, 4);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = HarmonyConfig::load(Path::new("/nonexistent/canticle.json")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }), "{err}");
    }

    #[test]
    fn load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = HarmonyConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = HarmonyConfig::default();
        config.sampling.temperature = 0.0;
        assert!(config.validate().is_err());

        let mut config = HarmonyConfig::default();
        config.sampling.rank_thresholds = [0.8, 0.6, 0.9];
        assert!(config.validate().is_err());

        let mut config = HarmonyConfig::default();
        config.vocabulary.diatonic_pattern = vec![0, 4, 4];
        assert!(config.validate().is_err());

        let mut config = HarmonyConfig::default();
        config.vocabulary.highest_octave = 9;
        assert!(config.validate().is_err());

        let mut config = HarmonyConfig::default();
        config.voicing.max_velocity = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = HarmonyConfig::default();
        config.voicing.harmony_velocity_scale = f32::INFINITY;
        assert!(config.validate().is_err());

        let mut config = HarmonyConfig::default();
        config.sampling.context_decay = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = HarmonyConfig::default();
        config.transition.tie_bonus = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = HarmonyConfig::default();
        config.voicing.primary_vowel_probability = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = HarmonyConfig::default();
        config
            .ranges
            .overrides
            .insert(VoiceRole::Alto, PitchRange::new(70, 60));
        assert!(config.validate().is_err());
    }

    #[test]
    fn strategy_parses_aliases() {
        assert_eq!("fallback".parse::<Strategy>(), Ok(Strategy::Triad));
        assert_eq!("Stochastic".parse::<Strategy>(), Ok(Strategy::Stochastic));
        assert!("random".parse::<Strategy>().is_err());
    }
}
