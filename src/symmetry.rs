use derive_more::Error;
#[cfg(feature = "python-interface")]
use pyo3::prelude::*;
use std::fmt;
use std::str::FromStr;

use crate::basis::{BasisState, NOT_FOUND};

/// Number of irreducible representations of the largest supported group.
pub const N_IRREPS: usize = 8;

/// Supported point groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointGroup {
    D2h,
    C2v,
    C2h,
    D2,
    Cs,
    C2,
    Ci,
    C1,
}

impl PointGroup {
    /// Canonical label of every external label, indexed by `label - 1`.
    /// `None` for C1, where every label maps to $0$.
    fn conversion_table(&self) -> Option<&'static [u8]> {
        match self {
            PointGroup::D2h => Some(&[0, 7, 6, 1, 5, 2, 3, 4]),
            PointGroup::C2v | PointGroup::C2h => Some(&[0, 2, 3, 1]),
            PointGroup::D2 => Some(&[0, 3, 2, 1]),
            PointGroup::Cs | PointGroup::C2 | PointGroup::Ci => Some(&[0, 1]),
            PointGroup::C1 => None,
        }
    }
}

impl FromStr for PointGroup {
    type Err = SymmetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "d2h" => Ok(PointGroup::D2h),
            "c2v" => Ok(PointGroup::C2v),
            "c2h" => Ok(PointGroup::C2h),
            "d2" => Ok(PointGroup::D2),
            "cs" => Ok(PointGroup::Cs),
            "c2" => Ok(PointGroup::C2),
            "ci" => Ok(PointGroup::Ci),
            "c1" => Ok(PointGroup::C1),
            _ => Err(SymmetryError::UnknownPointGroup { name: s.to_owned() }),
        }
    }
}

impl fmt::Display for PointGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PointGroup::D2h => "D2h",
            PointGroup::C2v => "C2v",
            PointGroup::C2h => "C2h",
            PointGroup::D2 => "D2",
            PointGroup::Cs => "Cs",
            PointGroup::C2 => "C2",
            PointGroup::Ci => "Ci",
            PointGroup::C1 => "C1",
        };
        write!(f, "{}", name)
    }
}

/// Remaps external, 1-based irrep labels to the canonical 0-based numbering
/// of `point_group`, in place. The name is case-insensitive.
/// # Errors
/// * __`UnknownPointGroup`__ - The name is not one of D2h, C2v, C2h, D2, Cs,
/// C2, Ci or C1.
/// * __`InvalidLabel`__ - A label is $0$ or above the group order. The slice
/// is left partially converted.
pub fn convert_symmetry_labels(labels: &mut [u8], point_group: &str) -> Result<(), SymmetryError> {
    let group = PointGroup::from_str(point_group)?;
    let Some(table) = group.conversion_table() else {
        labels.iter_mut().for_each(|l| *l = 0);
        return Ok(());
    };
    for label in labels.iter_mut() {
        match (*label as usize).checked_sub(1).and_then(|i| table.get(i)) {
            Some(&canonical) => *label = canonical,
            None => {
                return Err(SymmetryError::InvalidLabel {
                    label: *label,
                    point_group: group,
                })
            }
        }
    }
    Ok(())
}

/// Irrep label of every spatial orbital, with the per-irrep orbital lists.
#[derive(Debug, Clone)]
pub struct SymmetryInfo {
    labels: Vec<u8>,
    lookup: Vec<Vec<u8>>,
}

impl SymmetryInfo {
    /// Takes canonical labels, one per spatial orbital.
    pub fn new(labels: Vec<u8>) -> Result<Self, SymmetryError> {
        let mut lookup = vec![Vec::new(); N_IRREPS];
        for (orb, &label) in labels.iter().enumerate() {
            if label as usize >= N_IRREPS {
                return Err(SymmetryError::IrrepOutOfRange { label });
            }
            lookup[label as usize].push(orb as u8);
        }
        Ok(SymmetryInfo { labels, lookup })
    }

    /// No symmetry: every orbital in irrep $0$.
    pub fn trivial(n_orb: usize) -> Self {
        SymmetryInfo {
            labels: vec![0; n_orb],
            lookup: {
                let mut lookup = vec![Vec::new(); N_IRREPS];
                lookup[0] = (0..n_orb as u8).collect();
                lookup
            },
        }
    }

    #[inline(always)]
    pub fn n_orb(&self) -> usize {
        self.labels.len()
    }

    /// Irrep of spatial orbital `orb`.
    #[inline(always)]
    pub fn irrep(&self, orb: usize) -> u8 {
        self.labels[orb]
    }

    /// Irrep of spin-orbital `spin_orb`.
    #[inline(always)]
    pub fn irrep_of_spin_orbital(&self, spin_orb: u8) -> u8 {
        self.labels[spin_orb as usize % self.labels.len()]
    }

    /// Ascending spatial orbitals of `irrep`.
    #[inline(always)]
    pub fn orbitals_in(&self, irrep: u8) -> &[u8] {
        &self.lookup[irrep as usize]
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }
}

/// Direct product of two irreps of an abelian group.
#[inline(always)]
pub fn irrep_product(a: u8, b: u8) -> u8 {
    a ^ b
}

/// The `n`-th (from $0$) unoccupied spin-orbital of irrep `irrep` in the
/// channel starting at `channel_offset` ($0$ or $N$).
/// # Returns
/// The absolute spin-orbital index, or [NOT_FOUND] when fewer than `n + 1`
/// qualifying virtuals exist.
pub fn find_nth_virtual_symm(
    state: &BasisState,
    channel_offset: usize,
    n: usize,
    irrep: u8,
    symm: &SymmetryInfo,
) -> u8 {
    symm.orbitals_in(irrep)
        .iter()
        .map(|&orb| channel_offset + orb as usize)
        .filter(|&spin_orb| !state.check(spin_orb))
        .nth(n)
        .map_or(NOT_FOUND, |spin_orb| spin_orb as u8)
}

/// Number of unoccupied spin-orbitals of `irrep` in a channel.
pub fn count_virtuals_symm(state: &BasisState, channel_offset: usize, irrep: u8, symm: &SymmetryInfo) -> usize {
    symm.orbitals_in(irrep)
        .iter()
        .filter(|&&orb| !state.check(channel_offset + orb as usize))
        .count()
}

/// Errors of the symmetry tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymmetryError {
    UnknownPointGroup { name: String },
    InvalidLabel { label: u8, point_group: PointGroup },
    IrrepOutOfRange { label: u8 },
}

impl fmt::Display for SymmetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymmetryError::UnknownPointGroup { name } => {
                write!(f, "Point group {} is not supported.", name)
            }
            SymmetryError::InvalidLabel { label, point_group } => {
                write!(f, "Label {} is not an irrep of {}.", label, point_group)
            }
            SymmetryError::IrrepOutOfRange { label } => {
                write!(f, "Canonical irrep {} is out of range, expected < {}.", label, N_IRREPS)
            }
        }
    }
}

#[cfg(feature = "python-interface")]
#[pyfunction]
pub fn convert_symmetry_labels_py(mut labels: Vec<u8>, point_group: &str) -> PyResult<Vec<u8>> {
    match convert_symmetry_labels(&mut labels, point_group) {
        Ok(()) => Ok(labels),
        Err(error) => Err(pyo3::exceptions::PyValueError::new_err(error.to_string())),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_convert_d2h() {
        let mut labels = [1, 4, 6, 7, 8, 5, 3, 2];
        convert_symmetry_labels(&mut labels, "D2h").unwrap();
        assert_eq!(labels, [0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_convert_c1_ignores_labels() {
        let mut labels = [1, 4, 200, 0, 7];
        convert_symmetry_labels(&mut labels, "C1").unwrap();
        assert_eq!(labels, [0; 5]);
    }

    #[test]
    fn test_convert_small_groups() {
        let mut labels = [1, 2, 3, 4];
        convert_symmetry_labels(&mut labels, "c2v").unwrap();
        assert_eq!(labels, [0, 2, 3, 1]);
        let mut labels = [4, 3, 2, 1];
        convert_symmetry_labels(&mut labels, "D2").unwrap();
        assert_eq!(labels, [1, 2, 3, 0]);
        let mut labels = [2, 1];
        convert_symmetry_labels(&mut labels, "CI").unwrap();
        assert_eq!(labels, [1, 0]);
    }

    #[test]
    fn test_convert_errors() {
        let mut labels = [1, 2];
        assert_eq!(
            convert_symmetry_labels(&mut labels, "Oh"),
            Err(SymmetryError::UnknownPointGroup { name: "Oh".to_owned() })
        );
        let mut labels = [1, 3];
        assert_eq!(
            convert_symmetry_labels(&mut labels, "Cs"),
            Err(SymmetryError::InvalidLabel { label: 3, point_group: PointGroup::Cs })
        );
        let mut labels = [0];
        assert!(convert_symmetry_labels(&mut labels, "D2h").is_err());
    }

    #[test]
    fn test_find_nth_virtual_symm() {
        let symm = SymmetryInfo::new(vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0]).unwrap();
        let state = BasisState::from_bytes(&[0b10_0100, 0b11_1010, 0]);
        assert_eq!(find_nth_virtual_symm(&state, 0, 0, 2, &symm), 8);
        assert_eq!(find_nth_virtual_symm(&state, 10, 1, 2, &symm), 18);
        assert_eq!(find_nth_virtual_symm(&state, 10, 2, 2, &symm), NOT_FOUND);
    }

    #[test]
    fn test_find_nth_virtual_symm_not_found_exactly() {
        let symm = SymmetryInfo::new(vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0]).unwrap();
        let state = BasisState::from_bytes(&[0b10_0100, 0b11_1010, 0]);
        for offset in [0, 10] {
            for irrep in 0..4 {
                let n_virt = count_virtuals_symm(&state, offset, irrep, &symm);
                for n in 0..6 {
                    let found = find_nth_virtual_symm(&state, offset, n, irrep, &symm);
                    assert_eq!(found == NOT_FOUND, n >= n_virt);
                    if found != NOT_FOUND {
                        assert!(!state.check(found as usize));
                        assert_eq!(symm.irrep_of_spin_orbital(found), irrep);
                    }
                }
            }
        }
    }

    #[test]
    fn test_symmetry_info_rejects_large_irrep() {
        assert_eq!(
            SymmetryInfo::new(vec![0, 8]).unwrap_err(),
            SymmetryError::IrrepOutOfRange { label: 8 }
        );
        let trivial = SymmetryInfo::trivial(3);
        assert_eq!(trivial.orbitals_in(0), &[0, 1, 2]);
    }
}
