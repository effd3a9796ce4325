use log::debug;
use rayon::prelude::*;

/// Dense real 4-index tensor $T_{ijab}$, row-major with `b` fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct FourIndexTensor {
    dim: usize,
    data: Vec<f64>,
}

impl FourIndexTensor {
    pub fn zeros(dim: usize) -> Self {
        FourIndexTensor {
            dim,
            data: vec![0.0; dim * dim * dim * dim],
        }
    }

    /// Fills the tensor by calling `f(i, j, a, b)` in storage order.
    pub fn from_fn<F>(dim: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize, usize, usize) -> f64,
    {
        let mut data = Vec::with_capacity(dim * dim * dim * dim);
        for i in 0..dim {
            for j in 0..dim {
                for a in 0..dim {
                    for b in 0..dim {
                        data.push(f(i, j, a, b));
                    }
                }
            }
        }
        FourIndexTensor { dim, data }
    }

    #[inline(always)]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline(always)]
    fn index(&self, i: usize, j: usize, a: usize, b: usize) -> usize {
        ((i * self.dim + j) * self.dim + a) * self.dim + b
    }

    #[inline(always)]
    pub fn get(&self, i: usize, j: usize, a: usize, b: usize) -> f64 {
        self.data[self.index(i, j, a, b)]
    }

    #[inline(always)]
    pub fn set(&mut self, i: usize, j: usize, a: usize, b: usize, value: f64) {
        let idx = self.index(i, j, a, b);
        self.data[idx] = value;
    }
}

/// Position of the pair $(i, j)$, $i<j$, in a strict upper-triangular table.
#[inline(always)]
pub fn tri_nodiag(i: usize, j: usize) -> usize {
    j * (j - 1) / 2 + i
}

#[inline(always)]
fn tri_sorted(p: usize, q: usize) -> usize {
    if p < q {
        tri_nodiag(p, q)
    } else {
        tri_nodiag(q, p)
    }
}

/// Factorized weights of the heat-bath double excitation distribution.
/// # Definition
/// With active orbitals $p,q$ shifted by the frozen count
/// $f=N_{\text{tot}}-N$ into the tensor,
///
/// $$
/// D^{\text{diff}}_{pq}=\sum_{ab}\lvert T_{pqab}\rvert,\quad
/// D^{\text{same}}_{pq}=\sum_{a<b}\lvert T_{pqab}-T_{pqba}\rvert,\quad
/// E_{pq}=\sqrt{\lvert T_{pqqp}\rvert}
/// $$
///
/// $$
/// S_p=\sum_{q\neq p}D^{\text{same}}_{pq}+\sum_q D^{\text{diff}}_{pq},\quad
/// \mathcal{E}_p=\sum_{q\neq p}E_{pq}
/// $$
///
/// $D^{\text{same}}$ and $E$ are stored for $p<q$ only, see [tri_nodiag].
/// All entries are non-negative and the table is read-only once built.
#[derive(Debug, Clone)]
pub struct HeatBathTable {
    pub n_orb: usize,
    pub s_tens: Vec<f64>,
    pub s_norm: f64,
    pub d_same: Vec<f64>,
    pub d_diff: Vec<f64>,
    pub exch_sqrt: Vec<f64>,
    pub exch_norms: Vec<f64>,
}

impl HeatBathTable {
    /// Builds every table from `tensor`, one row per orbital in parallel.
    /// # Arguments
    /// * __`tensor`__ - Dense tensor of dimension at least `n_orb_total`.
    /// * __`n_orb_active`__ - Number of active orbitals $N$.
    /// * __`n_orb_total`__ - Active plus frozen orbitals.
    pub fn build(tensor: &FourIndexTensor, n_orb_active: usize, n_orb_total: usize) -> Self {
        assert!(n_orb_total >= n_orb_active);
        assert!(tensor.dim() >= n_orb_total);
        let n = n_orb_active;
        let f = n_orb_total - n_orb_active;

        let rows: Vec<(Vec<f64>, Vec<f64>, Vec<f64>)> = (0..n)
            .into_par_iter()
            .map(|p| {
                let diff_row: Vec<f64> = (0..n)
                    .map(|q| {
                        let mut sum = 0.0;
                        for a in 0..n {
                            for b in 0..n {
                                sum += tensor.get(p + f, q + f, a + f, b + f).abs();
                            }
                        }
                        sum
                    })
                    .collect();
                let same_row: Vec<f64> = (p + 1..n)
                    .map(|q| {
                        let mut sum = 0.0;
                        for b in 0..n {
                            for a in 0..b {
                                sum += (tensor.get(p + f, q + f, a + f, b + f)
                                    - tensor.get(p + f, q + f, b + f, a + f))
                                .abs();
                            }
                        }
                        sum
                    })
                    .collect();
                let exch_row: Vec<f64> = (p + 1..n)
                    .map(|q| tensor.get(p + f, q + f, q + f, p + f).abs().sqrt())
                    .collect();
                (diff_row, same_row, exch_row)
            })
            .collect();

        let n_tri = n * n.saturating_sub(1) / 2;
        let mut d_diff = vec![0.0; n * n];
        let mut d_same = vec![0.0; n_tri];
        let mut exch_sqrt = vec![0.0; n_tri];
        for (p, (diff_row, same_row, exch_row)) in rows.into_iter().enumerate() {
            d_diff[p * n..(p + 1) * n].copy_from_slice(&diff_row);
            for (k, q) in (p + 1..n).enumerate() {
                d_same[tri_nodiag(p, q)] = same_row[k];
                exch_sqrt[tri_nodiag(p, q)] = exch_row[k];
            }
        }

        let mut s_tens = vec![0.0; n];
        let mut exch_norms = vec![0.0; n];
        for p in 0..n {
            for q in 0..n {
                s_tens[p] += d_diff[p * n + q];
                if q != p {
                    s_tens[p] += d_same[tri_sorted(p, q)];
                    exch_norms[p] += exch_sqrt[tri_sorted(p, q)];
                }
            }
        }
        let s_norm = s_tens.iter().sum();
        debug!("Built heat-bath tables for {} active orbitals ({} frozen), s_norm = {}", n, f, s_norm);

        HeatBathTable {
            n_orb: n,
            s_tens,
            s_norm,
            d_same,
            d_diff,
            exch_sqrt,
            exch_norms,
        }
    }

    /// Pair weight of two occupied spin-orbitals, $D^{\text{same}}$ when they
    /// share a channel, $D^{\text{diff}}_{p_1p_2}$ otherwise.
    pub fn pair_weight(&self, o1: u8, o2: u8) -> f64 {
        let n = self.n_orb;
        let (p1, p2) = (o1 as usize % n, o2 as usize % n);
        if o1 as usize / n == o2 as usize / n {
            if p1 == p2 {
                0.0
            } else {
                self.d_same[tri_sorted(p1, p2)]
            }
        } else {
            self.d_diff[p1 * n + p2]
        }
    }

    /// $E_{pq}$ for spatial orbitals, $0$ on the diagonal.
    #[inline(always)]
    pub fn exchange_sqrt(&self, p: usize, q: usize) -> f64 {
        if p == q {
            0.0
        } else {
            self.exch_sqrt[tri_sorted(p, q)]
        }
    }
}

fn normalize(raw: Vec<f64>) -> (Vec<f64>, f64) {
    let norm: f64 = raw.iter().sum();
    if norm > 0.0 {
        (raw.into_iter().map(|w| w / norm).collect(), norm)
    } else {
        (vec![0.0; raw.len()], 0.0)
    }
}

/// Distribution of the first electron of a double excitation.
/// # Returns
/// * __`probs`__ - One entry per position of `occ`, $0$ at `exclude`.
/// * __`norm`__ - Sum of the raw weights $S_{p_i}/\sum_pS_p$, so that
/// `probs[i] * norm` is the raw weight of every included electron.
pub fn single_particle_probs(table: &HeatBathTable, occ: &[u8], exclude: Option<usize>) -> (Vec<f64>, f64) {
    let raw: Vec<f64> = occ
        .iter()
        .enumerate()
        .map(|(i, &orb)| {
            if Some(i) == exclude || table.s_norm <= 0.0 {
                0.0
            } else {
                table.s_tens[orb as usize % table.n_orb] / table.s_norm
            }
        })
        .collect();
    normalize(raw)
}

/// Distribution of the second electron given the first at position
/// `first_idx`. Only the positions before `first_idx` are eligible, so each
/// unordered pair has a single generation path.
/// # Returns
/// * __`probs`__ - One entry per position before `first_idx`.
/// * __`norm`__ - Sum of the raw weights $D(o_1,o_2)/S_{p_1}$.
pub fn second_particle_probs(table: &HeatBathTable, occ: &[u8], first_idx: usize) -> (Vec<f64>, f64) {
    let first = occ[first_idx];
    let s_first = table.s_tens[first as usize % table.n_orb];
    let raw: Vec<f64> = occ[..first_idx]
        .iter()
        .map(|&orb| {
            if s_first <= 0.0 {
                0.0
            } else {
                table.pair_weight(first, orb) / s_first
            }
        })
        .collect();
    normalize(raw)
}

/// Factorized proposal weight of the double excitation
/// $o_1\to u_1$, $o_2\to u_2$.
/// # Definition
/// $$
/// \frac{D(o_1,o_2)}{\sum_pS_p}\,
/// \frac{E_{o_1u_1}E_{o_2u_2}}{\mathcal{E}_{o_1}\mathcal{E}_{o_2}}
/// $$
pub fn unnormalized_weight(table: &HeatBathTable, orbs: [u8; 4]) -> f64 {
    let n = table.n_orb;
    let [o1, o2, u1, u2] = orbs.map(|o| o as usize % n);
    let norm1 = table.exch_norms[o1];
    let norm2 = table.exch_norms[o2];
    if table.s_norm <= 0.0 || norm1 <= 0.0 || norm2 <= 0.0 {
        return 0.0;
    }
    table.pair_weight(orbs[0], orbs[1]) / table.s_norm
        * table.exchange_sqrt(o1, u1)
        * table.exchange_sqrt(o2, u2)
        / norm1
        / norm2
}
