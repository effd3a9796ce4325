use log::trace;
use rand::Rng;

/// Resampling scheme for the elements not kept exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Evenly spaced points from a single uniform draw.
    Systematic,
    /// Sequential pivotal sampling.
    Pivotal,
}

/// Compresses `values` in place to at most `budget` nonzero elements while
/// preserving every element's expectation.
/// # Definition
/// Elements with $\lvert x_i\rvert\geq\lVert r\rVert_1/m$ are kept exactly,
/// $r$ being the elements not kept yet and $m$ the budget left, iterated
/// until no new element qualifies. Every other element is selected with
/// probability $m\lvert x_i\rvert/\lVert r\rVert_1$ and set to
/// $\mathrm{sgn}(x_i)\lVert r\rVert_1/m$ when selected, $0$ otherwise.
/// # Returns
/// The number of nonzero elements after compression. Nothing is drawn when
/// the input already fits the budget.
pub fn compress_in_place<R: Rng + ?Sized>(values: &mut [f64], budget: usize, strategy: Strategy, rng: &mut R) -> usize {
    let nnz = values.iter().filter(|&&x| x != 0.0).count();
    if nnz <= budget {
        return nnz;
    }

    let mut kept = vec![false; values.len()];
    let mut rem_norm: f64 = values.iter().map(|x| x.abs()).sum();
    let mut rem_budget = budget;
    let mut n_kept = 0;
    loop {
        if rem_budget == 0 {
            break;
        }
        let threshold = rem_norm / rem_budget as f64;
        let mut found = false;
        for (i, &x) in values.iter().enumerate() {
            if !kept[i] && x != 0.0 && x.abs() >= threshold && rem_budget > 0 {
                kept[i] = true;
                rem_norm -= x.abs();
                rem_budget -= 1;
                n_kept += 1;
                found = true;
            }
        }
        if !found {
            break;
        }
    }
    trace!("Compression keeps {} of {} elements exactly, resampling {} more.", n_kept, nnz, rem_budget);

    let candidates: Vec<usize> = (0..values.len()).filter(|&i| !kept[i] && values[i] != 0.0).collect();
    if rem_budget == 0 || rem_norm <= 0.0 {
        for &i in candidates.iter() {
            values[i] = 0.0;
        }
        return n_kept;
    }

    let spacing = rem_norm / rem_budget as f64;
    let selected = match strategy {
        Strategy::Systematic => systematic_select(values, &candidates, spacing, rng),
        Strategy::Pivotal => pivotal_select(values, &candidates, spacing, rng),
    };
    let mut n_selected = 0;
    for (&i, &chosen) in candidates.iter().zip(selected.iter()) {
        if chosen {
            values[i] = values[i].signum() * spacing;
            n_selected += 1;
        } else {
            values[i] = 0.0;
        }
    }
    n_kept + n_selected
}

/// Walks the cumulative magnitudes and selects the elements containing one
/// of the points $(u+k)\,s$.
fn systematic_select<R: Rng + ?Sized>(values: &[f64], candidates: &[usize], spacing: f64, rng: &mut R) -> Vec<bool> {
    let u: f64 = rng.gen();
    let mut next_point = u * spacing;
    let mut cumulative = 0.0;
    candidates
        .iter()
        .map(|&i| {
            cumulative += values[i].abs();
            if next_point < cumulative {
                next_point += spacing;
                true
            } else {
                false
            }
        })
        .collect()
}

/// Deville-Tillé sequential pivotal method on the inclusion probabilities
/// $\lvert x_i\rvert/s$.
fn pivotal_select<R: Rng + ?Sized>(values: &[f64], candidates: &[usize], spacing: f64, rng: &mut R) -> Vec<bool> {
    let mut selected = vec![false; candidates.len()];
    let mut active = 0;
    let mut p_active = values[candidates[0]].abs() / spacing;
    for k in 1..candidates.len() {
        let p_next = values[candidates[k]].abs() / spacing;
        let total = p_active + p_next;
        if total < 1.0 {
            if rng.gen::<f64>() * total < p_active {
                // `k` is rejected, `active` carries the sum.
                p_active = total;
            } else {
                active = k;
                p_active = total;
            }
        } else if rng.gen::<f64>() * (2.0 - total) < 1.0 - p_next {
            selected[active] = true;
            active = k;
            p_active = total - 1.0;
        } else {
            selected[k] = true;
            p_active = total - 1.0;
        }
    }
    if rng.gen::<f64>() < p_active {
        selected[active] = true;
    }
    selected
}
