//! Converts probability distributions into cumulative frequency tables and back.
//!
//! The quantizer distributes a fixed number of integer counts (the resolution) over
//! the symbols of a distribution. Each count goes to the symbol that is currently the
//! most underrepresented, i.e. the one with the largest `prob / count` ratio. This is
//! a greedy descent on the KL divergence between the target distribution and the
//! quantized one, which is convex in the counts.
//!
//! Symbols without any count have an infinite ratio, so every symbol with a positive
//! probability receives at least one count before any symbol receives a second one,
//! provided there are at most as many symbols as counts.

use std::iter;

/// The resolution used when the caller has no preference.
pub const DEFAULT_RESOLUTION: u32 = 1024;

/// Converts a probability distribution into a cumulative frequency table.
///
/// The probabilities don't need to be normalized. Zero, negative and NaN entries are
/// never assigned a count.
///
/// # Arguments
/// * `prob`       - The probability of each symbol.
/// * `resolution` - The number of counts to distribute, which becomes the total of the
///                  returned table.
///
/// Returns a table with `prob.len() + 1` entries, starting with 0.
pub fn prob_to_cum_freq(prob: &[f64], resolution: u32) -> Vec<u32> {
    if prob.len() > resolution as usize {
        log::warn!(
            "resolution {} is smaller than the number of symbols {}; some symbols may get a zero frequency",
            resolution,
            prob.len()
        );
    }

    let mut freq = vec![0_u32; prob.len()];
    for _ in 0..resolution {
        match most_underrepresented(prob, &freq) {
            Some(symbol) => freq[symbol] += 1,
            None => {
                log::warn!("no symbol has a positive probability, returning an empty table");
                break;
            }
        }
    }

    iter::once(0)
        .chain(freq.iter().scan(0_u32, |acc, &f| {
            *acc += f;
            Some(*acc)
        }))
        .collect()
}

/// Converts a cumulative frequency table into a probability distribution.
///
/// This is the lossy inverse of `prob_to_cum_freq()`: quantizing the returned
/// probabilities with the same resolution yields the same table again, but the
/// probabilities of the original distribution are generally not recovered.
pub fn cum_freq_to_prob(cum_freq: &[u32]) -> Vec<f64> {
    let total = match cum_freq.last() {
        Some(&total) => f64::from(total),
        None => return Vec::new(),
    };

    cum_freq
        .windows(2)
        .map(|w| f64::from(w[1].saturating_sub(w[0])) / total)
        .collect()
}

/// Returns the eligible symbol with the largest `prob / freq` ratio.
///
/// Ties go to the lowest index.
fn most_underrepresented(prob: &[f64], freq: &[u32]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (symbol, (&p, &f)) in prob.iter().zip(freq).enumerate() {
        if p.is_nan() || p <= 0.0 {
            continue;
        }

        let ratio = if f == 0 {
            f64::INFINITY
        } else {
            p / f64::from(f)
        };

        match best {
            Some((_, best_ratio)) if ratio <= best_ratio => {}
            _ => best = Some((symbol, ratio)),
        }
    }

    best.map(|(symbol, _)| symbol)
}
