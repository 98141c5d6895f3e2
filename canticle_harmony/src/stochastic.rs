// Transition-model harmonizer: the primary generation path.
//
// Per call:
// 1. Encode the lead note. If it has no vocabulary index, return `None` and
//    let the engine hand the call to the triad harmonizer.
// 2. Push the lead's index onto the lead role's history.
// 3. The lead role's output is the input note at the caller's volume.
// 4. Every other role samples its next state from its own last state, with
//    a context of its recent history followed by the lead's recent history.
//    The sampled state becomes a note at a jittered, reduced velocity and a
//    mostly-lead vowel, and is pushed onto the role's history.
// 5. All four pitches are range-corrected (single octave step by default).
//
// A sampled control token cannot be sung. That voice doubles the lead at
// reduced velocity for the step; its history still records the sample.
//
// Draw order per derived voice (bass, tenor, alto, soprano, skipping the
// lead): rank band, tail pick (only when in the tail band), velocity jitter,
// vowel.

use crate::config::{HarmonyConfig, HistoryParams, SamplingParams, VoicingParams};
use crate::history::{HistoryBank, VoiceHistory};
use crate::note::{HarmonyResult, Note, VoiceRole};
use crate::range::{RangePolicy, RangeTable};
use crate::sampler;
use crate::transition::HarmonyModel;
use crate::vocab::Token;
use canticle_prng::RandomSource;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct StochasticHarmonizer {
    model: Arc<HarmonyModel>,
    sampling: SamplingParams,
    history_params: HistoryParams,
    voicing: VoicingParams,
    ranges: RangeTable,
    policy: RangePolicy,
    histories: HistoryBank,
}

impl StochasticHarmonizer {
    pub fn new(model: Arc<HarmonyModel>, config: &HarmonyConfig) -> Self {
        StochasticHarmonizer {
            model,
            sampling: config.sampling.clone(),
            history_params: config.history.clone(),
            voicing: config.voicing.clone(),
            ranges: config.ranges.table(),
            policy: config.ranges.stochastic_policy,
            histories: HistoryBank::new(config.history.max_len),
        }
    }

    /// Harmonize one lead event, or `None` when the lead pitch is outside
    /// the vocabulary. State is untouched in the `None` case.
    pub fn generate(
        &mut self,
        lead_role: VoiceRole,
        lead: Note,
        volume: f32,
        rng: &mut impl RandomSource,
    ) -> Option<HarmonyResult> {
        let lead_index = self.model.vocabulary.encode(lead.pitch, lead.tie)?;
        self.histories.get_mut(lead_role).push(lead_index);

        let lead_note = lead.with_velocity(volume);
        let mut result = HarmonyResult::from_fn(|_| lead_note);

        for role in VoiceRole::ALL {
            if role == lead_role {
                continue;
            }
            let note = self.sample_voice(role, lead_role, lead_index, lead_note, volume, rng);
            result.set(role, note);
        }

        for role in VoiceRole::ALL {
            let note = *result.get(role);
            let pitch = self.policy.apply(note.pitch as i16, self.ranges.range(role));
            result.set(role, note.with_pitch(pitch));
        }

        Some(result)
    }

    fn sample_voice(
        &mut self,
        role: VoiceRole,
        lead_role: VoiceRole,
        lead_index: usize,
        lead_note: Note,
        volume: f32,
        rng: &mut impl RandomSource,
    ) -> Note {
        let own = self.histories.get(role);
        let current = own.last().unwrap_or(lead_index);
        let context: Vec<usize> = own
            .recent(self.history_params.own_context)
            .chain(
                self.histories
                    .get(lead_role)
                    .recent(self.history_params.lead_context),
            )
            .collect();

        let vocab = &self.model.vocabulary;
        let sampled = sampler::next_index(
            &self.model.transitions,
            current,
            &context,
            &self.sampling,
            rng,
        );
        trace!(%role, current, ?sampled, "sampled next state");

        let note = match sampled.and_then(|i| vocab.decode(i)) {
            Some(Token::Pitch { pitch, tie }) => {
                let velocity = self.jittered_velocity(volume, rng);
                let vowel = if rng.random_bool(self.voicing.primary_vowel_probability) {
                    lead_note.vowel
                } else {
                    self.voicing.alternate_vowel
                };
                Note::new(pitch, velocity, vowel, tie)
            }
            other => {
                debug!(%role, ?other, "sampled state is not a note, doubling the lead");
                lead_note.with_velocity(volume * self.voicing.decode_failure_velocity_scale)
            }
        };

        if let Some(index) = sampled {
            self.histories.get_mut(role).push(index);
        }
        note
    }

    fn jittered_velocity(&self, volume: f32, rng: &mut impl RandomSource) -> f32 {
        let jitter = self.voicing.velocity_jitter as f64;
        let offset = if jitter > 0.0 {
            rng.range_f64(-jitter, jitter) as f32
        } else {
            0.0
        };
        (volume * self.voicing.harmony_velocity_scale + offset)
            .clamp(self.voicing.min_velocity, self.voicing.max_velocity)
    }

    /// Every history back to a lone START token.
    pub fn reset(&mut self) {
        self.histories.reset();
    }

    pub fn history(&self, role: VoiceRole) -> &VoiceHistory {
        self.histories.get(role)
    }

    pub fn model(&self) -> &Arc<HarmonyModel> {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Vowel;
    use crate::vocab::START;
    use canticle_prng::{ChoirRng, ScriptedSource};

    fn harmonizer(config: &HarmonyConfig) -> StochasticHarmonizer {
        StochasticHarmonizer::new(Arc::new(HarmonyModel::new(config)), config)
    }

    fn c4() -> Note {
        Note::new(60, 1.0, Vowel::Ah, false)
    }

    #[test]
    fn unknown_lead_pitch_returns_none_without_touching_history() {
        let config = HarmonyConfig::default();
        let mut h = harmonizer(&config);
        let mut rng = ChoirRng::new(1);
        let sharp = Note::new(61, 1.0, Vowel::Ah, false);
        assert!(h.generate(VoiceRole::Soprano, sharp, 0.8, &mut rng).is_none());
        for role in VoiceRole::ALL {
            assert_eq!(h.history(role).to_vec(), vec![START]);
        }
    }

    #[test]
    fn lead_passes_through_at_volume() {
        let config = HarmonyConfig::default();
        let mut h = harmonizer(&config);
        let mut rng = ChoirRng::new(2);
        let result = h.generate(VoiceRole::Soprano, c4(), 0.8, &mut rng).unwrap();
        let lead = result.get(VoiceRole::Soprano);
        assert_eq!(lead.pitch, 60);
        assert_eq!(lead.velocity, 0.8);
        assert_eq!(lead.vowel, Vowel::Ah);
    }

    #[test]
    fn histories_record_lead_and_samples() {
        let config = HarmonyConfig::default();
        let mut h = harmonizer(&config);
        let mut rng = ChoirRng::new(3);
        h.generate(VoiceRole::Soprano, c4(), 0.8, &mut rng).unwrap();
        let c4_index = h.model().vocabulary.encode(60, false).unwrap();
        assert_eq!(h.history(VoiceRole::Soprano).to_vec(), vec![START, c4_index]);
        for role in [VoiceRole::Bass, VoiceRole::Tenor, VoiceRole::Alto] {
            assert_eq!(h.history(role).len(), 2, "{role}");
        }
    }

    #[test]
    fn best_ranked_draws_give_deterministic_voices() {
        // r = 0.0 always takes the top candidate; 0.5 gives zero jitter and
        // keeps the lead vowel.
        let config = HarmonyConfig::default();
        let mut h = harmonizer(&config);
        let mut src = ScriptedSource::new(vec![0.0, 0.5, 0.5]);
        let result = h.generate(VoiceRole::Soprano, c4(), 1.0, &mut src).unwrap();
        // From START with the lead's C4 as most recent context, the tied C4
        // ranks first; each derived voice then range-corrects it.
        assert_eq!(result.pitch(VoiceRole::Bass), 60);
        assert_eq!(result.pitch(VoiceRole::Tenor), 60);
        assert_eq!(result.pitch(VoiceRole::Alto), 60);
        for role in [VoiceRole::Bass, VoiceRole::Tenor, VoiceRole::Alto] {
            let note = result.get(role);
            assert!(note.tie, "{role}");
            assert!((note.velocity - 0.6).abs() < 1e-6, "{role}: {}", note.velocity);
            assert_eq!(note.vowel, Vowel::Ah);
        }
    }

    #[test]
    fn late_vowel_draw_picks_alternate() {
        let config = HarmonyConfig::default();
        let mut h = harmonizer(&config);
        let mut src = ScriptedSource::new(vec![0.0, 0.5, 0.9]);
        let result = h.generate(VoiceRole::Soprano, c4(), 1.0, &mut src).unwrap();
        assert_eq!(result.get(VoiceRole::Tenor).vowel, Vowel::Oo);
    }

    #[test]
    fn sampled_control_token_doubles_the_lead() {
        // One pitch in the vocabulary: the top-5 tail then reaches the
        // zero-scored control tokens, which rank by index after it.
        let mut config = HarmonyConfig::default();
        config.vocabulary.diatonic_pattern = vec![0];
        config.vocabulary.lowest_octave = 4;
        config.vocabulary.highest_octave = 4;
        let mut h = harmonizer(&config);
        assert_eq!(h.model().vocabulary.len(), 5);

        // 0.95 lands in the tail band, 0.5 picks offset 2 of 5.
        let mut src = ScriptedSource::new(vec![0.95, 0.5]);
        let result = h.generate(VoiceRole::Soprano, c4(), 0.8, &mut src).unwrap();
        for role in [VoiceRole::Bass, VoiceRole::Tenor, VoiceRole::Alto] {
            let note = result.get(role);
            assert_eq!(note.pitch, 60, "{role}");
            assert!((note.velocity - 0.32).abs() < 1e-6, "{role}: {}", note.velocity);
            assert_eq!(note.vowel, Vowel::Ah);
            assert_eq!(h.history(role).to_vec(), vec![START, START], "{role}");
        }
        assert_eq!(result.get(VoiceRole::Soprano).velocity, 0.8);
    }

    #[test]
    fn velocity_is_clamped() {
        let config = HarmonyConfig::default();
        let mut h = harmonizer(&config);
        let mut rng = ChoirRng::new(4);
        for _ in 0..50 {
            let result = h.generate(VoiceRole::Alto, c4(), 0.05, &mut rng).unwrap();
            for (role, note) in result.iter() {
                if role != VoiceRole::Alto {
                    assert!((0.1..=1.0).contains(&note.velocity), "{role}: {}", note.velocity);
                }
            }
        }
    }

    #[test]
    fn outputs_stay_in_range_over_long_runs() {
        let config = HarmonyConfig::default();
        let table = config.ranges.table();
        let mut h = harmonizer(&config);
        let mut rng = ChoirRng::new(5);
        let melody = [60, 62, 64, 65, 67, 69, 71, 72, 48, 84, 36, 95];
        for step in 0..400 {
            let pitch = melody[step % melody.len()];
            let lead = Note::new(pitch, 0.7, Vowel::Oh, step % 3 == 0);
            let result = h.generate(VoiceRole::Soprano, lead, 0.7, &mut rng).unwrap();
            for (role, note) in result.iter() {
                let r = table.range(role);
                assert!(r.contains(note.pitch as i16), "{role} {} outside {r:?}", note.pitch);
            }
        }
    }

    #[test]
    fn reset_restores_start_histories() {
        let config = HarmonyConfig::default();
        let mut h = harmonizer(&config);
        let mut rng = ChoirRng::new(6);
        for _ in 0..10 {
            h.generate(VoiceRole::Tenor, c4(), 0.8, &mut rng).unwrap();
        }
        assert_eq!(h.history(VoiceRole::Tenor).len(), 8);
        h.reset();
        for role in VoiceRole::ALL {
            assert_eq!(h.history(role).to_vec(), vec![START]);
        }
    }
}
