use crate::basis::{apply_boson_delta, decode_boson_counts, BasisState, MAX_BOSON_BITS};
use crate::dist_vec::{DistVec, DistVecError, DistVecParams, MergeSummary, SingleProcess, Transport, VecValue};
use crate::lattice::{enumerate_lattice_neighbors, Boundary, HopNeighbors};

/// [DistVec] over chain states with per-site boson fields.
/// # Cache
/// The hop table of every index is computed on first access and dropped
/// when the index is handed to another key, either by a merge or by
/// [LatticeVec::remove_zeros].
pub struct LatticeVec<T: VecValue, X: Transport<T> = SingleProcess> {
    vec: DistVec<T, X>,
    n_sites: usize,
    boson_bits: usize,
    boundary: Boundary,
    neighbors: Vec<Option<HopNeighbors>>,
}

impl<T: VecValue> LatticeVec<T, SingleProcess> {
    pub fn new(params: DistVecParams, n_sites: usize, boson_bits: usize, boundary: Boundary) -> Self {
        LatticeVec::with_transport(params, SingleProcess, n_sites, boson_bits, boundary)
    }
}

impl<T: VecValue, X: Transport<T>> LatticeVec<T, X> {
    pub fn with_transport(
        params: DistVecParams,
        transport: X,
        n_sites: usize,
        boson_bits: usize,
        boundary: Boundary,
    ) -> Self {
        assert_eq!(params.n_bits, 2 * n_sites);
        assert!(
            boson_bits <= MAX_BOSON_BITS,
            "Boson fields of {} bits exceed the maximum of {}.",
            boson_bits,
            MAX_BOSON_BITS
        );
        LatticeVec {
            vec: DistVec::with_transport(params, transport),
            n_sites,
            boson_bits,
            boundary,
            neighbors: Vec::new(),
        }
    }

    pub fn n_sites(&self) -> usize {
        self.n_sites
    }

    pub fn boson_bits(&self) -> usize {
        self.boson_bits
    }

    pub fn inner(&self) -> &DistVec<T, X> {
        &self.vec
    }

    pub fn add(&mut self, key: &BasisState, value: T, slot: usize) {
        self.vec.add(key, value, slot);
    }

    pub fn receive(&mut self, key: BasisState, value: T, slot: usize) {
        self.vec.receive(key, value, slot);
    }

    pub fn perform_add(&mut self, epoch: u64) -> Result<MergeSummary, DistVecError> {
        let summary = self.vec.perform_add(epoch)?;
        self.invalidate(&summary.inserted);
        Ok(summary)
    }

    pub fn remove_zeros(&mut self) -> Vec<usize> {
        let freed = self.vec.remove_zeros();
        self.invalidate(&freed);
        freed
    }

    fn invalidate(&mut self, indices: &[usize]) {
        for &idx in indices {
            if let Some(cached) = self.neighbors.get_mut(idx) {
                *cached = None;
            }
        }
    }

    /// Hop table of the key at `idx`.
    pub fn neighbors_at(&mut self, idx: usize) -> Option<&HopNeighbors> {
        let key = self.vec.key_at(idx)?;
        if self.neighbors.len() <= idx {
            self.neighbors.resize(self.vec.capacity().max(idx + 1), None);
        }
        if self.neighbors[idx].is_none() {
            self.neighbors[idx] = Some(enumerate_lattice_neighbors(key, self.n_sites, self.boundary));
        }
        self.neighbors[idx].as_ref()
    }

    /// Boson counts of the key at `idx`, in site order.
    pub fn decode_boson_counts(&self, idx: usize) -> Option<Vec<u8>> {
        self.vec
            .key_at(idx)
            .map(|key| decode_boson_counts(key, self.n_sites, self.boson_bits))
    }

    /// Key at `idx` with `delta` bosons added to `site`. `None` for an
    /// unassigned index or a count out of range.
    pub fn apply_boson_delta(&self, idx: usize, site: usize, delta: i8) -> Option<BasisState> {
        let key = self.vec.key_at(idx)?;
        apply_boson_delta(key, self.n_sites, self.boson_bits, site, delta)
    }

    pub fn value_at(&self, idx: usize, slot: usize) -> Option<T> {
        self.vec.value_at(idx, slot)
    }

    pub fn key_at(&self, idx: usize) -> Option<&BasisState> {
        self.vec.key_at(idx)
    }

    pub fn occupied_at(&self, idx: usize) -> Option<&[u8]> {
        self.vec.occupied_at(idx)
    }

    pub fn current_size(&self) -> usize {
        self.vec.current_size()
    }

    pub fn one_norm(&self, slot: usize) -> f64 {
        self.vec.one_norm(slot)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::basis::{reference_state, Reference};

    fn lattice_params(n_sites: usize, n_elec: usize) -> DistVecParams {
        DistVecParams {
            initial_capacity: 2,
            max_capacity: 32,
            n_bits: 2 * n_sites,
            n_elec,
            n_slots: 1,
            proc_scrambler: Vec::new(),
            vec_scrambler: Vec::new(),
        }
    }

    #[test]
    fn test_neighbors_cached_and_invalidated() {
        let mut vec: LatticeVec<f64> = LatticeVec::new(lattice_params(4, 4), 4, 2, Boundary::Open);
        let neel = reference_state(Reference::Neel, 4, 4, 2);
        assert_eq!(neel.as_bytes(), &[165, 0]);
        vec.add(&neel, 1.0, 0);
        vec.perform_add(0).unwrap();
        let hops = vec.neighbors_at(0).unwrap().hops(4);
        assert_eq!(hops, vec![(0, 1), (2, 3), (5, 6), (2, 1), (5, 4), (7, 6)]);

        // Same fermions, one more boson: a new key with its own table.
        let excited = vec.apply_boson_delta(0, 1, 1).unwrap();
        assert_eq!(vec.apply_boson_delta(0, 1, -1), None);
        vec.add(&neel, -1.0, 0);
        vec.add(&excited, 0.5, 0);
        vec.perform_add(1).unwrap();
        assert_eq!(vec.decode_boson_counts(1), Some(vec![0, 1, 0, 0]));
        assert_eq!(vec.remove_zeros(), vec![0]);
        assert!(vec.neighbors_at(0).is_none());

        let hole = BasisState::from_bytes(&[0b0110_0011, 0]);
        vec.add(&hole, 2.0, 0);
        vec.perform_add(2).unwrap();
        assert_eq!(vec.key_at(0), Some(&hole));
        let neighbors = vec.neighbors_at(0).unwrap();
        assert_eq!(neighbors.to_next, vec![1, 6]);
        assert_eq!(neighbors.to_prev, vec![5]);
    }

    #[test]
    fn test_widest_boson_field() {
        let n_sites = 2;
        let mut vec: LatticeVec<f64> =
            LatticeVec::new(lattice_params(n_sites, 2), n_sites, MAX_BOSON_BITS, Boundary::Open);
        let mut state = reference_state(Reference::Neel, n_sites, 2, MAX_BOSON_BITS);
        for _ in 0..255 {
            state = apply_boson_delta(&state, n_sites, MAX_BOSON_BITS, 1, 1).unwrap();
        }
        assert!(apply_boson_delta(&state, n_sites, MAX_BOSON_BITS, 1, 1).is_none());
        vec.add(&state, 1.0, 0);
        vec.perform_add(0).unwrap();
        assert_eq!(vec.decode_boson_counts(0), Some(vec![0, 255]));
    }

    #[test]
    #[should_panic]
    fn test_boson_field_too_wide() {
        let _vec: LatticeVec<f64> = LatticeVec::new(lattice_params(2, 2), 2, MAX_BOSON_BITS + 1, Boundary::Open);
    }
}
