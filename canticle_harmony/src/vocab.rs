// The note vocabulary: a closed, indexed set of states the sampler works in.
//
// Indices 0-2 are control tokens (START, END, SEPARATOR). After them come
// one (pitch, tie = false) and one (pitch, tie = true) state for every pitch
// class of the diatonic pattern in every octave of the configured span,
// enumerated lowest octave first, then ascending degree.
//
// Encoding is a direct table lookup by MIDI pitch. A pitch outside the
// pattern or the span has no index; the engine answers that with the triad
// harmonizer rather than an error.

use crate::config::VocabularyParams;
use serde::{Deserialize, Serialize};

pub const START: usize = 0;
pub const END: usize = 1;
pub const SEPARATOR: usize = 2;

const CONTROL_TOKENS: usize = 3;
const MIDI_PITCHES: usize = 128;

/// One vocabulary entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Token {
    Start,
    End,
    Separator,
    Pitch { pitch: u8, tie: bool },
}

impl Token {
    pub fn is_control(self) -> bool {
        !matches!(self, Token::Pitch { .. })
    }
}

/// Bidirectional index <-> token mapping. Immutable once built.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    tokens: Vec<Token>,
    /// For each MIDI pitch, the index of its untied state, if representable.
    /// The tied state always sits at the next index.
    untied_index: Vec<Option<usize>>,
}

impl Vocabulary {
    pub fn new(params: &VocabularyParams) -> Self {
        let mut tokens = vec![Token::Start, Token::End, Token::Separator];
        let mut untied_index = vec![None; MIDI_PITCHES];

        for octave in params.lowest_octave..=params.highest_octave {
            let base = (octave as i16 + 1) * 12;
            for &degree in &params.diatonic_pattern {
                let pitch = base + degree as i16;
                if !(0..MIDI_PITCHES as i16).contains(&pitch) {
                    continue;
                }
                let slot = &mut untied_index[pitch as usize];
                if slot.is_some() {
                    continue;
                }
                *slot = Some(tokens.len());
                let pitch = pitch as u8;
                tokens.push(Token::Pitch { pitch, tie: false });
                tokens.push(Token::Pitch { pitch, tie: true });
            }
        }

        Vocabulary {
            tokens,
            untied_index,
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Index of a pitch state, or `None` if the pitch is not representable.
    pub fn encode(&self, pitch: u8, tie: bool) -> Option<usize> {
        self.untied_index
            .get(pitch as usize)
            .copied()
            .flatten()
            .map(|i| i + tie as usize)
    }

    pub fn decode(&self, index: usize) -> Option<Token> {
        self.tokens.get(index).copied()
    }

    /// The (pitch, tie) pair at `index`, or `None` for control tokens and
    /// out-of-range indices.
    pub fn pitch_state(&self, index: usize) -> Option<(u8, bool)> {
        match self.decode(index)? {
            Token::Pitch { pitch, tie } => Some((pitch, tie)),
            _ => None,
        }
    }

    pub fn is_control(&self, index: usize) -> bool {
        index < CONTROL_TOKENS.min(self.tokens.len())
    }

    /// All pitch states as `(index, pitch, tie)`.
    pub fn pitch_states(&self) -> impl Iterator<Item = (usize, u8, bool)> + '_ {
        self.tokens
            .iter()
            .enumerate()
            .filter_map(|(i, token)| match *token {
                Token::Pitch { pitch, tie } => Some((i, pitch, tie)),
                _ => None,
            })
    }
}
