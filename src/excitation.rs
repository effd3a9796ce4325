use std::fmt;

use crate::basis::BasisState;
use crate::symmetry::{irrep_product, SymmetryInfo};

/// A move of one or two particles.
/// # Definition
/// Orbitals are spin-orbital indices. A double moves `from[0]` to `to[0]`
/// and `from[1]` to `to[1]`, in that order, which fixes its sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Excitation {
    Single { from: u8, to: u8 },
    Double { from: [u8; 2], to: [u8; 2] },
}

impl Excitation {
    /// Packed as `[from, to, 0, 0]` for singles and `[o1, o2, u1, u2]` for
    /// doubles.
    pub fn orbitals(&self) -> [u8; 4] {
        match *self {
            Excitation::Single { from, to } => [from, to, 0, 0],
            Excitation::Double { from, to } => [from[0], from[1], to[0], to[1]],
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, Excitation::Single { .. })
    }

    /// New state and fermionic sign of the move.
    pub fn apply(&self, state: &BasisState) -> (BasisState, f64) {
        let mut out = state.clone();
        let sign = match *self {
            Excitation::Single { from, to } => out.excite(from, to),
            Excitation::Double { from, to } => out.excite(from[0], to[0]) * out.excite(from[1], to[1]),
        };
        (out, sign)
    }
}

impl fmt::Display for Excitation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Excitation::Single { from, to } => write!(f, "{} -> {}", from, to),
            Excitation::Double { from, to } => {
                write!(f, "({}, {}) -> ({}, {})", from[0], from[1], to[0], to[1])
            }
        }
    }
}

/// Unoccupied spin-orbitals reachable by a single move of `orb`: same
/// channel and same irrep, ascending.
pub fn allowed_single_targets(state: &BasisState, orb: u8, n_orb: usize, symm: &SymmetryInfo) -> Vec<u8> {
    let offset = (orb as usize / n_orb) * n_orb;
    let irrep = symm.irrep(orb as usize % n_orb);
    symm.orbitals_in(irrep)
        .iter()
        .map(|&p| (offset + p as usize) as u8)
        .filter(|&target| !state.check(target as usize))
        .collect()
}

/// All symmetry- and spin-allowed single excitations.
/// # Order
/// Outer loop over `occ` ascending, inner loop over the allowed virtual
/// orbitals ascending. At most $N_e\times N$ entries.
pub fn enumerate_singles_symm(
    state: &BasisState,
    occ: &[u8],
    n_orb: usize,
    symm: &SymmetryInfo,
) -> Vec<(u8, u8)> {
    let mut singles = Vec::with_capacity(occ.len() * n_orb);
    for &orb in occ.iter() {
        for target in allowed_single_targets(state, orb, n_orb, symm) {
            singles.push((orb, target));
        }
    }
    singles
}

/// Unoccupied orbital pairs `[u1, u2]` a double excitation of `o1` and `o2`
/// may land on.
/// # Rules
/// * `u1` is in the channel of `o1`, `u2` in the channel of `o2`.
/// * When both are in one channel the pair is unordered, `u1 < u2`.
/// * The product of the target irreps equals the product of the source
/// irreps.
pub fn allowed_virtual_pairs(
    state: &BasisState,
    o1: u8,
    o2: u8,
    n_orb: usize,
    symm: &SymmetryInfo,
) -> Vec<[u8; 2]> {
    let offset1 = (o1 as usize / n_orb) * n_orb;
    let offset2 = (o2 as usize / n_orb) * n_orb;
    let same_channel = offset1 == offset2;
    let target_irrep = irrep_product(
        symm.irrep_of_spin_orbital(o1),
        symm.irrep_of_spin_orbital(o2),
    );
    let mut pairs = Vec::new();
    for p1 in 0..n_orb {
        let u1 = offset1 + p1;
        if state.check(u1) {
            continue;
        }
        let needed = irrep_product(target_irrep, symm.irrep(p1));
        for &p2 in symm.orbitals_in(needed) {
            let u2 = offset2 + p2 as usize;
            if state.check(u2) || (same_channel && u2 <= u1) {
                continue;
            }
            pairs.push([u1 as u8, u2 as u8]);
        }
    }
    pairs
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::basis::{extract_occupied, reference_state, Reference};

    #[test]
    fn test_enumerate_singles_symm() {
        let symm = SymmetryInfo::new(vec![0, 1, 2, 0, 1, 1]).unwrap();
        let state = BasisState::from_bytes(&[0b1000_1110, 0b1100]);
        let occ = [1, 2, 3, 7, 10, 11];
        assert_eq!(
            enumerate_singles_symm(&state, &occ, 6, &symm),
            vec![(1, 4), (1, 5), (3, 0)]
        );
    }

    #[test]
    fn test_singles_without_symmetry() {
        let state = reference_state(Reference::HartreeFock, 4, 4, 0);
        let occ = extract_occupied(&state, 4);
        let singles = enumerate_singles_symm(&state, &occ, 4, &SymmetryInfo::trivial(4));
        assert_eq!(singles.len(), 4 * 2);
        assert_eq!(singles[0], (0, 2));
        assert_eq!(singles[7], (5, 7));
    }

    #[test]
    fn test_virtual_pairs_respect_rules() {
        let symm = SymmetryInfo::new(vec![0, 1, 2, 3, 0, 1, 2, 3]).unwrap();
        let state = reference_state(Reference::HartreeFock, 8, 4, 0);
        for (o1, o2) in [(0u8, 1u8), (0, 8), (9, 1)] {
            let pairs = allowed_virtual_pairs(&state, o1, o2, 8, &symm);
            assert!(!pairs.is_empty());
            for [u1, u2] in pairs {
                assert!(!state.check(u1 as usize) && !state.check(u2 as usize));
                assert_eq!(u1 / 8, o1 / 8);
                assert_eq!(u2 / 8, o2 / 8);
                if o1 / 8 == o2 / 8 {
                    assert!(u1 < u2);
                }
                assert_eq!(
                    symm.irrep_of_spin_orbital(u1) ^ symm.irrep_of_spin_orbital(u2),
                    symm.irrep_of_spin_orbital(o1) ^ symm.irrep_of_spin_orbital(o2)
                );
            }
        }
    }

    #[test]
    fn test_apply_double_sign() {
        let state = reference_state(Reference::HartreeFock, 4, 4, 0);
        let ex = Excitation::Double { from: [0, 5], to: [2, 6] };
        let (new_state, sign) = ex.apply(&state);
        assert_eq!(extract_occupied(&new_state, 4), vec![1, 2, 4, 6]);
        // 0 -> 2 crosses orbital 1, 5 -> 6 crosses nothing.
        assert_eq!(sign, -1.0);
        assert_eq!(ex.orbitals(), [0, 5, 2, 6]);
    }
}
