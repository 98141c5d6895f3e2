// Static transition-probability model over the vocabulary.
//
// Every (from, to) pair of pitch states gets a hand-authored weight:
//
//   base weight by absolute interval (unison > step > third > 4th/5th >
//   octave > anything else)
//   x consonance bonus when the interval class is consonant
//   x tie bonus when `to` is the tied state of the same pitch
//
// Each "from" row is then normalized to sum to 1. Control-token rows and
// columns stay zero, so the sampler never gets mass from or toward them
// through the matrix.
//
// This is a prior, not a learned model: small consonant moves and sustained
// unisons are favored, wide dissonant leaps almost never chosen. Built once
// per `HarmonyModel` and never mutated.

use crate::config::{HarmonyConfig, TransitionParams};
use crate::note::semitone_distance;
use crate::vocab::Vocabulary;
use tracing::info;

/// Row-stochastic square matrix indexed by vocabulary index.
#[derive(Debug, Clone)]
pub struct TransitionMatrix {
    size: usize,
    weights: Vec<f64>,
}

impl TransitionMatrix {
    pub fn new(vocab: &Vocabulary, params: &TransitionParams) -> Self {
        let size = vocab.len();
        let mut weights = vec![0.0; size * size];
        let states: Vec<(usize, u8, bool)> = vocab.pitch_states().collect();

        for &(from, from_pitch, _) in &states {
            let row = &mut weights[from * size..(from + 1) * size];
            for &(to, to_pitch, to_tie) in &states {
                let d = semitone_distance(from_pitch, to_pitch);
                let mut w = params.base_weight(d);
                if params.is_consonant(d) {
                    w *= params.consonance_bonus;
                }
                if to_tie && d == 0 {
                    w *= params.tie_bonus;
                }
                row[to] = w;
            }

            let total: f64 = row.iter().sum();
            if total > 0.0 {
                for w in row.iter_mut() {
                    *w /= total;
                }
            }
        }

        TransitionMatrix { size, weights }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// The full "from" row, or `None` for an index outside the vocabulary.
    pub fn row(&self, from: usize) -> Option<&[f64]> {
        (from < self.size).then(|| &self.weights[from * self.size..(from + 1) * self.size])
    }

    /// Probability of moving `from -> to`. Zero for anything out of range.
    pub fn weight(&self, from: usize, to: usize) -> f64 {
        if from < self.size && to < self.size {
            self.weights[from * self.size + to]
        } else {
            0.0
        }
    }

    pub fn row_sum(&self, from: usize) -> f64 {
        self.row(from).map_or(0.0, |r| r.iter().sum())
    }
}

/// Vocabulary plus transition matrix: the immutable part of the engine.
///
/// Built once and shared by `Arc` between any number of engines.
#[derive(Debug, Clone)]
pub struct HarmonyModel {
    pub vocabulary: Vocabulary,
    pub transitions: TransitionMatrix,
}

impl HarmonyModel {
    pub fn new(config: &HarmonyConfig) -> Self {
        let vocabulary = Vocabulary::new(&config.vocabulary);
        let transitions = TransitionMatrix::new(&vocabulary, &config.transition);
        info!(
            vocabulary = vocabulary.len(),
            "built harmony transition model"
        );
        HarmonyModel {
            vocabulary,
            transitions,
        }
    }
}
