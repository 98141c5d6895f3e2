// The harmonization engine: the public entry point.
//
// Owns one stochastic harmonizer, one triad harmonizer, and the random
// source both draw from. `generate_harmony` dispatches on the configured
// strategy; in stochastic mode a lead pitch the vocabulary cannot encode is
// handed to the triad harmonizer for that call.
//
// Neither operation can fail. Bad input degrades to a defined result:
// an unencodable lead goes to the triad path, a non-finite or out-of-range
// volume is clamped into [0, 1].
//
// `SharedEngine` wraps an engine in one mutex for hosts that call from
// several threads. A call reads and writes all four voices' state, so the
// whole call runs under the lock.

use crate::config::{ConfigError, HarmonyConfig, Strategy};
use crate::history::VoiceHistory;
use crate::note::{HarmonyResult, Note, VoiceRole};
use crate::stochastic::StochasticHarmonizer;
use crate::transition::HarmonyModel;
use crate::triad::TriadHarmonizer;
use canticle_prng::{ChoirRng, RandomSource};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

pub struct HarmonyEngine<R: RandomSource = ChoirRng> {
    strategy: Strategy,
    stochastic: StochasticHarmonizer,
    triad: TriadHarmonizer,
    rng: R,
}

impl<R: RandomSource> HarmonyEngine<R> {
    /// Build an engine and its model. The config is assumed valid; use
    /// `from_config` to check it first.
    pub fn new(config: &HarmonyConfig, rng: R) -> Self {
        let model = Arc::new(HarmonyModel::new(config));
        Self::with_model(model, config, rng)
    }

    /// Validate the config, then build.
    pub fn from_config(config: &HarmonyConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config, rng))
    }

    /// Build an engine on an existing model, so several engines can share
    /// one vocabulary and transition matrix. The model should have been
    /// built from the same vocabulary settings as `config`.
    pub fn with_model(model: Arc<HarmonyModel>, config: &HarmonyConfig, rng: R) -> Self {
        HarmonyEngine {
            strategy: config.strategy,
            stochastic: StochasticHarmonizer::new(model, config),
            triad: TriadHarmonizer::new(config),
            rng,
        }
    }

    /// Produce a four-voice harmony for one lead event.
    pub fn generate_harmony(
        &mut self,
        lead_role: VoiceRole,
        lead: Note,
        volume: f32,
    ) -> HarmonyResult {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };

        if self.strategy == Strategy::Stochastic {
            if let Some(result) = self
                .stochastic
                .generate(lead_role, lead, volume, &mut self.rng)
            {
                return result;
            }
            debug!(
                pitch = lead.pitch,
                tie = lead.tie,
                "lead outside vocabulary, using triad harmonizer"
            );
        }
        self.triad.generate(lead_role, lead, volume, &mut self.rng)
    }

    /// Clear state for the active strategy: voice histories in stochastic
    /// mode, the previous harmony in triad mode.
    pub fn reset(&mut self) {
        info!(strategy = ?self.strategy, "resetting harmony engine");
        match self.strategy {
            Strategy::Stochastic => self.stochastic.reset(),
            Strategy::Triad => self.triad.reset(),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn set_strategy(&mut self, strategy: Strategy) {
        self.strategy = strategy;
    }

    pub fn model(&self) -> &Arc<HarmonyModel> {
        self.stochastic.model()
    }

    pub fn history(&self, role: VoiceRole) -> &VoiceHistory {
        self.stochastic.history(role)
    }

    pub fn previous_harmony(&self) -> Option<&HarmonyResult> {
        self.triad.previous()
    }
}

/// An engine behind a single mutex.
pub struct SharedEngine<R: RandomSource = ChoirRng> {
    inner: Mutex<HarmonyEngine<R>>,
}

impl<R: RandomSource> SharedEngine<R> {
    pub fn new(engine: HarmonyEngine<R>) -> Self {
        SharedEngine {
            inner: Mutex::new(engine),
        }
    }

    pub fn generate_harmony(&self, lead_role: VoiceRole, lead: Note, volume: f32) -> HarmonyResult {
        self.lock().generate_harmony(lead_role, lead, volume)
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    /// Lock, taking the guard back if a previous holder panicked.
    fn lock(&self) -> MutexGuard<'_, HarmonyEngine<R>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn into_inner(self) -> HarmonyEngine<R> {
        self.inner.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}
