// Context-weighted next-state sampling.
//
// Given the current state and a short context of recent states:
//
// 1. Start from the transition row of the current state (zero for control
//    tokens or unknown indices).
// 2. Add each context state's row, scaled by
//    `context_weight * exp(-position * context_decay)`, where position 0 is
//    the most recent entry (the last element of the context slice).
// 3. Soften with a temperature softmax (max-subtracted for stability).
// 4. Rank indices by probability, descending, ties toward the lower index.
// 5. Pick by rank band: one draw `r`; `r < t1` takes the best, `r < t2` the
//    second, `r < t3` the third (falling back to the best if the vocabulary
//    is that short), otherwise a uniform pick from the top `tail_top_k`.
//
// The softmax output only establishes the ranking. Band probabilities are
// fixed by the thresholds.

use crate::config::SamplingParams;
use crate::transition::TransitionMatrix;
use canticle_prng::RandomSource;
use std::cmp::Ordering;

/// Steps 1-2: the raw accumulated score for every vocabulary index.
pub fn blend_rows(
    matrix: &TransitionMatrix,
    current: usize,
    context: &[usize],
    params: &SamplingParams,
) -> Vec<f64> {
    let mut scores = matrix
        .row(current)
        .map_or_else(|| vec![0.0; matrix.size()], <[f64]>::to_vec);

    for (position, &state) in context.iter().rev().enumerate() {
        let Some(row) = matrix.row(state) else {
            continue;
        };
        let scale = params.context_weight * (-(position as f64) * params.context_decay).exp();
        for (score, w) in scores.iter_mut().zip(row) {
            *score += scale * w;
        }
    }

    scores
}

/// Step 3: temperature softmax.
pub fn softmax(values: &[f64], temperature: f64) -> Vec<f64> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return vec![0.0; values.len()];
    }
    let exps: Vec<f64> = values
        .iter()
        .map(|&v| ((v - max) / temperature).exp())
        .collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Step 4: indices sorted by probability, highest first. Equal
/// probabilities keep index order.
pub fn rank(probabilities: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| {
        probabilities[b]
            .partial_cmp(&probabilities[a])
            .unwrap_or(Ordering::Equal)
    });
    order
}

/// Step 5: choose from a ranking with draw `r`. `tail_pick` is only called
/// when `r` falls in the tail band, with the tail size, and must return an
/// offset below it.
pub fn pick_ranked(
    ranked: &[usize],
    r: f64,
    params: &SamplingParams,
    tail_pick: impl FnOnce(usize) -> usize,
) -> Option<usize> {
    let best = *ranked.first()?;
    let [first, second, third] = params.rank_thresholds;
    let chosen = if r < first {
        best
    } else if r < second {
        ranked.get(1).copied().unwrap_or(best)
    } else if r < third {
        ranked.get(2).copied().unwrap_or(best)
    } else {
        let k = params.tail_top_k.clamp(1, ranked.len());
        ranked[tail_pick(k).min(k - 1)]
    };
    Some(chosen)
}

/// The softmax distribution the ranking is taken from.
pub fn distribution(
    matrix: &TransitionMatrix,
    current: usize,
    context: &[usize],
    params: &SamplingParams,
) -> Vec<f64> {
    softmax(
        &blend_rows(matrix, current, context, params),
        params.temperature,
    )
}

/// Sample the next vocabulary index. Returns `None` only for an empty
/// vocabulary.
pub fn next_index(
    matrix: &TransitionMatrix,
    current: usize,
    context: &[usize],
    params: &SamplingParams,
    rng: &mut impl RandomSource,
) -> Option<usize> {
    let ranked = rank(&distribution(matrix, current, context, params));
    let r = rng.next_f64();
    pick_ranked(&ranked, r, params, |k| rng.index_below(k))
}
