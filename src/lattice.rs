#[cfg(feature = "python-interface")]
use pyo3::prelude::*;

use crate::basis::BasisState;

/// Boundary condition of the 1-D chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Sites $0$ and $N-1$ are not connected.
    Open,
    /// Ring. Only differs from [Boundary::Open] for more than two sites.
    Periodic,
}

/// Hop origins of a lattice state.
/// # Definition
/// `to_next` holds the occupied spin-orbitals whose next site, in the same
/// channel, is empty; `to_prev` those whose previous site is empty. Both are
/// ascending.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HopNeighbors {
    pub to_next: Vec<u8>,
    pub to_prev: Vec<u8>,
}

impl HopNeighbors {
    /// Every available hop as `(origin, target)`, the `to_next` hops first.
    pub fn hops(&self, n_sites: usize) -> Vec<(u8, u8)> {
        let shifted = |orb: u8, step: usize| {
            let offset = (orb as usize / n_sites) * n_sites;
            let site = orb as usize % n_sites;
            (offset + (site + step) % n_sites) as u8
        };
        self.to_next
            .iter()
            .map(|&orb| (orb, shifted(orb, 1)))
            .chain(self.to_prev.iter().map(|&orb| (orb, shifted(orb, n_sites - 1))))
            .collect()
    }

    pub fn n_hops(&self) -> usize {
        self.to_next.len() + self.to_prev.len()
    }
}

/// Finds the hop origins of a chain state. Bits at and after $2N$ are
/// ignored.
pub fn enumerate_lattice_neighbors(state: &BasisState, n_sites: usize, boundary: Boundary) -> HopNeighbors {
    let wrap = boundary == Boundary::Periodic && n_sites > 2;
    let mut neighbors = HopNeighbors::default();
    for channel in 0..2 {
        let offset = channel * n_sites;
        for site in 0..n_sites {
            let orb = offset + site;
            if !state.check(orb) {
                continue;
            }
            let next = if site + 1 < n_sites {
                Some(site + 1)
            } else if wrap {
                Some(0)
            } else {
                None
            };
            let prev = if site > 0 {
                Some(site - 1)
            } else if wrap {
                Some(n_sites - 1)
            } else {
                None
            };
            if next.is_some_and(|s| !state.check(offset + s)) {
                neighbors.to_next.push(orb as u8);
            }
            if prev.is_some_and(|s| !state.check(offset + s)) {
                neighbors.to_prev.push(orb as u8);
            }
        }
    }
    neighbors
}

/// Number of doubly occupied sites, the Hubbard diagonal in units of $U$.
/// # Definition
/// $$
/// \sum_i n_{i\uparrow}n_{i\downarrow}
/// $$
pub fn hubbard_double_occupancy(state: &BasisState, n_sites: usize) -> u32 {
    (0..n_sites)
        .filter(|&site| state.check(site) && state.check(site + n_sites))
        .count() as u32
}

/// Site index of the `k`-th (from $0$) doubly occupied site, ascending.
pub fn locate_kth_doubly_occupied(k: usize, occ: &[u8], state: &BasisState, n_sites: usize) -> Option<u8> {
    occ.iter()
        .copied()
        .take_while(|&orb| (orb as usize) < n_sites)
        .filter(|&orb| state.check(orb as usize + n_sites))
        .nth(k)
}

/// Spin-orbital index of the `k`-th (from $0$) electron sitting alone on
/// its site, in occupied-list order. The channel is `orb / n_sites`.
pub fn locate_kth_singly_occupied(k: usize, occ: &[u8], state: &BasisState, n_sites: usize) -> Option<u8> {
    occ.iter()
        .copied()
        .filter(|&orb| {
            let orb = orb as usize;
            let partner = if orb < n_sites { orb + n_sites } else { orb - n_sites };
            !state.check(partner)
        })
        .nth(k)
}

#[cfg(feature = "python-interface")]
#[pyfunction]
pub fn hubbard_double_occupancy_py(bytes: Vec<u8>, n_sites: usize) -> PyResult<u32> {
    Ok(hubbard_double_occupancy(&BasisState::from_bytes(&bytes), n_sites))
}
