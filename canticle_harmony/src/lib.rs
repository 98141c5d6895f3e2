// Canticle Harmony Engine
//
// Turns a single lead voice into four-voice (bass, tenor, alto, soprano)
// harmony one note at a time, fast enough to sit inside a live audio loop.
// Each call takes the lead note, the role the lead sings, and a volume, and
// returns a note for every role.
//
// Two generation paths:
// - Stochastic: a static transition model over a white-key vocabulary,
//   sampled with context blending, temperature softmax, and rank-biased
//   selection. Per-voice histories give each voice some memory.
// - Triad: a deterministic major/minor triad under the lead, octave-fitted
//   into each voice's range and smoothed against the previous chord. Used
//   for leads the vocabulary cannot encode, or on its own.
//
// Architecture:
// - note.rs: Voice roles, vowels, notes, and the four-voice result
// - config.rs: All tunable constants, JSON loading and validation
// - vocab.rs: Index <-> (pitch, tie) vocabulary with control tokens
// - transition.rs: Interval/consonance-weighted transition matrix and the
//   shared `HarmonyModel`
// - sampler.rs: Context blending, softmax, ranking, rank-band selection
// - history.rs: Bounded per-voice state histories
// - range.rs: Range profiles and octave-correction policies
// - stochastic.rs: The transition-model harmonizer
// - triad.rs: The deterministic triad harmonizer with voice-leading smoothing
// - engine.rs: Strategy dispatch, reset, and the mutex-wrapped shared engine
//
// Given a seeded `ChoirRng`, output is fully reproducible.

pub mod config;
pub mod engine;
pub mod history;
pub mod note;
pub mod range;
pub mod sampler;
pub mod stochastic;
pub mod transition;
pub mod triad;
pub mod vocab;

pub use config::{ConfigError, HarmonyConfig, Strategy};
pub use engine::{HarmonyEngine, SharedEngine};
pub use note::{HarmonyResult, Note, VoiceRole, Vowel};
pub use range::{PitchRange, RangePolicy, RangeProfile};
pub use transition::HarmonyModel;
