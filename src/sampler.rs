use derive_more::Error;
use log::{debug, trace};
use rand::Rng;
use std::fmt;

use crate::basis::BasisState;
use crate::compress::{compress_in_place, Strategy};
use crate::excitation::{allowed_single_targets, allowed_virtual_pairs, Excitation};
use crate::heat_bath::{second_particle_probs, single_particle_probs, unnormalized_weight, HeatBathTable};
use crate::symmetry::SymmetryInfo;

/// One reweighted excitation produced by a compression pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Index of the origin state in [SourceVector::states].
    pub origin: usize,
    pub excitation: Excitation,
    pub weight: f64,
    /// Canonical time-reversal key, set when folding is enabled.
    pub folded: Option<BasisState>,
}

/// Caller-owned output of a compression pass, with a fixed capacity.
#[derive(Debug, Clone)]
pub struct CompressionBuffer {
    samples: Vec<Sample>,
    capacity: usize,
}

impl CompressionBuffer {
    pub fn new(capacity: usize) -> Self {
        CompressionBuffer {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a sample, failing once the capacity is reached.
    pub fn push(&mut self, sample: Sample) -> Result<(), SamplerError> {
        if self.samples.len() >= self.capacity {
            return Err(SamplerError::BufferOverflow {
                capacity: self.capacity,
            });
        }
        self.samples.push(sample);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }
}

/// Parameters of a compression pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressParams {
    /// Share of each entry's weight given to double excitations.
    pub p_doub: f64,
    /// Restrict every proposal distribution to outcomes that exist.
    pub renormalize: bool,
    /// Maximum number of weighted elements kept after each stage.
    pub budget: usize,
}

/// Off-diagonal matrix elements, injected by the caller.
pub trait MatrixElementOracle {
    /// Element of the single excitation `[from, to]` of a state with
    /// occupied list `occ`.
    fn single(&self, orbs: &[u8; 2], occ: &[u8]) -> f64;
    /// Element of the double excitation `[o1, o2, u1, u2]`.
    fn double(&self, orbs: &[u8; 4]) -> f64;
}

/// Oracle made of two closures.
pub struct ScoreFns<S, D> {
    pub single: S,
    pub double: D,
}

impl<S, D> MatrixElementOracle for ScoreFns<S, D>
where
    S: Fn(&[u8; 2], &[u8]) -> f64,
    D: Fn(&[u8; 4]) -> f64,
{
    fn single(&self, orbs: &[u8; 2], occ: &[u8]) -> f64 {
        (self.single)(orbs, occ)
    }

    fn double(&self, orbs: &[u8; 4]) -> f64 {
        (self.double)(orbs)
    }
}

/// The vector being compressed.
/// # Fields
/// * __`states`__ - Basis states, indexed by the first element of an entry.
/// * __`occupied`__ - Occupied list of every state, same indexing.
/// * __`entries`__ - `(state index, value)` pairs.
#[derive(Debug, Clone, Copy)]
pub struct SourceVector<'a> {
    pub states: &'a [BasisState],
    pub occupied: &'a [Vec<u8>],
    pub entries: &'a [(usize, f64)],
}

/// Position reached by a partial excitation in the sampling hierarchy.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Path {
    Root,
    SingleClass,
    DoubleClass,
    SingleSource(usize),
    DoubleFirst(usize),
    DoubleSecond(usize, usize),
    Done(Excitation),
}

#[derive(Debug, Clone)]
struct Partial {
    entry: usize,
    path: Path,
    weight: f64,
    prob: f64,
}

impl Partial {
    fn child(&self, path: Path, p: f64) -> Partial {
        Partial {
            entry: self.entry,
            path,
            weight: self.weight * p,
            prob: self.prob * p,
        }
    }
}

/// Heat-bath power-pitzer compression of a vector times an off-diagonal
/// operator.
/// # Hierarchy
/// Every entry is split into a single and a double class, then refined one
/// choice at a time: source electron and target for singles, first electron,
/// second electron and virtual pair for doubles. The whole frontier is
/// compressed to the budget after every stage. Emitted weights are divided
/// by the proposal probability of their path.
pub struct HeatBathSampler<'a> {
    table: &'a HeatBathTable,
    symm: &'a SymmetryInfo,
    params: CompressParams,
}

impl<'a> HeatBathSampler<'a> {
    pub fn new(table: &'a HeatBathTable, symm: &'a SymmetryInfo, params: CompressParams) -> Result<Self, SamplerError> {
        if table.n_orb != symm.n_orb() {
            return Err(SamplerError::OrbitalMismatch {
                table: table.n_orb,
                symmetry: symm.n_orb(),
            });
        }
        Ok(HeatBathSampler { table, symm, params })
    }

    pub fn params(&self) -> &CompressParams {
        &self.params
    }

    /// Compresses with systematic resampling and appends the samples to
    /// `out`.
    /// # Returns
    /// The number of samples appended.
    pub fn compress_systematic<R, M>(
        &self,
        source: &SourceVector,
        oracle: &M,
        rng: &mut R,
        out: &mut CompressionBuffer,
    ) -> Result<usize, SamplerError>
    where
        R: Rng + ?Sized,
        M: MatrixElementOracle,
    {
        self.compress(source, oracle, Strategy::Systematic, false, rng, out)
    }

    /// Compresses with pivotal resampling and appends the samples to `out`.
    /// With `fold_time_reversal`, every sample carries the byte-wise smaller
    /// of its state and the spin-flipped state, and its weight is divided by
    /// $\sqrt2$ unless the two are equal.
    pub fn compress_pivoted<R, M>(
        &self,
        source: &SourceVector,
        oracle: &M,
        fold_time_reversal: bool,
        rng: &mut R,
        out: &mut CompressionBuffer,
    ) -> Result<usize, SamplerError>
    where
        R: Rng + ?Sized,
        M: MatrixElementOracle,
    {
        self.compress(source, oracle, Strategy::Pivotal, fold_time_reversal, rng, out)
    }

    fn compress<R, M>(
        &self,
        source: &SourceVector,
        oracle: &M,
        strategy: Strategy,
        fold: bool,
        rng: &mut R,
        out: &mut CompressionBuffer,
    ) -> Result<usize, SamplerError>
    where
        R: Rng + ?Sized,
        M: MatrixElementOracle,
    {
        let mut frontier: Vec<Partial> = source
            .entries
            .iter()
            .enumerate()
            .filter(|(_, (_, value))| *value != 0.0)
            .map(|(entry, _)| Partial {
                entry,
                path: Path::Root,
                weight: source.entries[entry].1,
                prob: 1.0,
            })
            .collect();

        let mut stage = 0;
        while frontier.iter().any(|p| !matches!(p.path, Path::Done(_))) {
            let mut next = Vec::with_capacity(frontier.len());
            for partial in frontier.iter() {
                self.expand(source, partial, &mut next);
            }
            let mut values: Vec<f64> = next.iter().map(|p| p.weight).collect();
            let expanded = next.len();
            let nnz = compress_in_place(&mut values, self.params.budget, strategy, rng);
            for (partial, value) in next.iter_mut().zip(values) {
                partial.weight = value;
            }
            next.retain(|p| p.weight != 0.0);
            debug!("Compression stage {}: {} elements expanded, {} kept.", stage, expanded, nnz);
            frontier = next;
            stage += 1;
        }

        let n_orb = self.table.n_orb;
        let start = out.len();
        for partial in frontier.into_iter() {
            let Path::Done(excitation) = partial.path else {
                continue;
            };
            let origin = source.entries[partial.entry].0;
            let state = &source.states[origin];
            let score = match excitation {
                Excitation::Single { from, to } => oracle.single(&[from, to], &source.occupied[origin]),
                Excitation::Double { .. } => oracle.double(&excitation.orbitals()),
            };
            if score == 0.0 {
                continue;
            }
            let (new_state, parity) = excitation.apply(state);
            let mut weight = partial.weight / partial.prob * score * parity;
            let folded = if fold {
                let flipped = new_state.spin_flipped(n_orb);
                if flipped == new_state {
                    Some(new_state)
                } else {
                    weight /= std::f64::consts::SQRT_2;
                    Some(std::cmp::min(new_state, flipped))
                }
            } else {
                None
            };
            trace!("Sample from state {}: {} with weight {}", origin, excitation, weight);
            out.push(Sample {
                origin,
                excitation,
                weight,
                folded,
            })?;
        }
        Ok(out.len() - start)
    }

    fn expand(&self, source: &SourceVector, partial: &Partial, next: &mut Vec<Partial>) {
        let origin = source.entries[partial.entry].0;
        let state = &source.states[origin];
        let occ = &source.occupied[origin];
        let n_orb = self.table.n_orb;
        let renormalize = self.params.renormalize;
        match partial.path {
            Path::Done(_) => next.push(partial.clone()),
            Path::Root => {
                let (mut p_sing, mut p_doub) = (1.0 - self.params.p_doub, self.params.p_doub);
                if renormalize {
                    let has_singles = occ
                        .iter()
                        .any(|&o| !allowed_single_targets(state, o, n_orb, self.symm).is_empty());
                    let has_doubles = (1..occ.len()).any(|i1| self.first_electron_allowed(state, occ, i1));
                    match (has_singles, has_doubles) {
                        (true, true) => {}
                        (true, false) => (p_sing, p_doub) = (1.0, 0.0),
                        (false, true) => (p_sing, p_doub) = (0.0, 1.0),
                        (false, false) => return,
                    }
                }
                if p_sing > 0.0 {
                    next.push(partial.child(Path::SingleClass, p_sing));
                }
                if p_doub > 0.0 {
                    next.push(partial.child(Path::DoubleClass, p_doub));
                }
            }
            Path::SingleClass => {
                let sources: Vec<usize> = (0..occ.len())
                    .filter(|&i| {
                        !renormalize || !allowed_single_targets(state, occ[i], n_orb, self.symm).is_empty()
                    })
                    .collect();
                let p = 1.0 / sources.len() as f64;
                for i in sources {
                    next.push(partial.child(Path::SingleSource(i), p));
                }
            }
            Path::SingleSource(i) => {
                let targets = allowed_single_targets(state, occ[i], n_orb, self.symm);
                let p = 1.0 / targets.len() as f64;
                for to in targets {
                    let excitation = Excitation::Single { from: occ[i], to };
                    next.push(partial.child(Path::Done(excitation), p));
                }
            }
            Path::DoubleClass => {
                let (mut probs, _) = single_particle_probs(self.table, occ, Some(0));
                if renormalize {
                    for (i1, p) in probs.iter_mut().enumerate() {
                        if *p > 0.0 && !self.first_electron_allowed(state, occ, i1) {
                            *p = 0.0;
                        }
                    }
                    renormalized(&mut probs);
                }
                for (i1, p) in probs.into_iter().enumerate() {
                    if p > 0.0 {
                        next.push(partial.child(Path::DoubleFirst(i1), p));
                    }
                }
            }
            Path::DoubleFirst(i1) => {
                let (mut probs, _) = second_particle_probs(self.table, occ, i1);
                if renormalize {
                    for (i2, p) in probs.iter_mut().enumerate() {
                        if *p > 0.0 && allowed_virtual_pairs(state, occ[i1], occ[i2], n_orb, self.symm).is_empty() {
                            *p = 0.0;
                        }
                    }
                    renormalized(&mut probs);
                }
                for (i2, p) in probs.into_iter().enumerate() {
                    if p > 0.0 {
                        next.push(partial.child(Path::DoubleSecond(i1, i2), p));
                    }
                }
            }
            Path::DoubleSecond(i1, i2) => {
                let (o1, o2) = (occ[i1], occ[i2]);
                let pairs = allowed_virtual_pairs(state, o1, o2, n_orb, self.symm);
                if pairs.is_empty() {
                    return;
                }
                let same_channel = o1 as usize / n_orb == o2 as usize / n_orb;
                let mut weights: Vec<f64> = pairs
                    .iter()
                    .map(|&[u1, u2]| {
                        let mut w = unnormalized_weight(self.table, [o1, o2, u1, u2]);
                        if same_channel {
                            w += unnormalized_weight(self.table, [o1, o2, u2, u1]);
                        }
                        w
                    })
                    .collect();
                if !renormalized(&mut weights) {
                    weights.iter_mut().for_each(|w| *w = 1.0 / pairs.len() as f64);
                }
                for (&[u1, u2], p) in pairs.iter().zip(weights) {
                    if p > 0.0 {
                        let excitation = Excitation::Double { from: [o1, o2], to: [u1, u2] };
                        next.push(partial.child(Path::Done(excitation), p));
                    }
                }
            }
        }
    }

    /// Whether the electron at `i1` pairs with an earlier electron with a
    /// positive pair weight and at least one allowed virtual pair.
    fn first_electron_allowed(&self, state: &BasisState, occ: &[u8], i1: usize) -> bool {
        let n_orb = self.table.n_orb;
        (0..i1).any(|i2| {
            self.table.pair_weight(occ[i1], occ[i2]) > 0.0
                && !allowed_virtual_pairs(state, occ[i1], occ[i2], n_orb, self.symm).is_empty()
        })
    }
}

/// Scales `probs` to unit sum. Returns `false` and leaves them untouched
/// when they sum to zero.
fn renormalized(probs: &mut [f64]) -> bool {
    let norm: f64 = probs.iter().sum();
    if norm <= 0.0 {
        return false;
    }
    probs.iter_mut().for_each(|p| *p /= norm);
    true
}

/// Errors of a compression pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SamplerError {
    BufferOverflow { capacity: usize },
    OrbitalMismatch { table: usize, symmetry: usize },
}

impl fmt::Display for SamplerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplerError::BufferOverflow { capacity } => {
                write!(f, "Compression buffer is full ({} samples).", capacity)
            }
            SamplerError::OrbitalMismatch { table, symmetry } => write!(
                f,
                "Heat-bath table has {} orbitals but the symmetry labels cover {}.",
                table, symmetry
            ),
        }
    }
}
