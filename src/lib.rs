#[cfg(feature = "python-interface")]
use pyo3::prelude::*;

/// Bit-packed basis states.
/// # Layout
/// A state over $N$ orbitals (or sites) is a byte array, bits packed least
/// significant first. Channel $\sigma$ occupies the block
/// $[\sigma N, (\sigma+1)N)$, so spin-orbital $\sigma N+p$ is orbital $p$ of
/// channel $\sigma$. Lattice models with bosons append $N$ little-endian
/// fields of $w$ bits at bit $2N$, one per site.
///
/// | Bits | Content |
/// |------|---------|
/// | $[0, N)$ | Channel $0$ ($\uparrow$) |
/// | $[N, 2N)$ | Channel $1$ ($\downarrow$) |
/// | $[2N+iw, 2N+(i+1)w)$ | Boson count of site $i$ |
///
/// # Parity
/// Moving a fermion from $a$ to $b$ picks up the sign
///
/// $$
/// (-1)^{\#\{o\in\text{occ}\ :\ \min(a,b)<o<\max(a,b)\}}
/// $$
pub mod basis;

/// Point-group conventions and irrep lookups.
/// # Conversion
/// External labels are 1-based and follow the ordering of the producing
/// program. They are remapped to a canonical 0-based numbering where the
/// product of two irreps is the bitwise xor of their labels.
pub mod symmetry;

/// Single and double excitations of molecular states.
pub mod excitation;

/// Nearest-neighbor hops on a 1-D chain and Hubbard site bookkeeping.
pub mod lattice;

/// Heat-bath tables of the power-pitzer factorization.
/// # Definition
/// The proposal weight of a double excitation $o_1o_2\to u_1u_2$ factorizes
/// in a pair weight of the occupied orbitals times exchange weights of each
/// electron with its target,
///
/// $$
/// P(o_1,o_2,u_1,u_2)\propto D(o_1,o_2)\sqrt{\lvert(o_1u_1\vert u_1o_1)\rvert}
/// \sqrt{\lvert(o_2u_2\vert u_2o_2)\rvert}
/// $$
pub mod heat_bath;

/// Unbiased compression of a weighted set to a fixed number of elements.
pub mod compress;

/// Hierarchical heat-bath compression of $H\vec v$.
pub mod sampler;

/// Hash-sharded sparse vector with deferred accumulation.
pub mod dist_vec;

/// Sparse vector over lattice states with boson fields.
pub mod lattice_vec;

/// Run configuration.
pub mod params;

/// Input file parsing util.
/// # Subfiles
/// * __`integrals.csv`__ - Two-electron integrals $T_{ijab}$. In csv format
/// with a header line, 5 columns: `i`, `j`, `a`, `b`, then the value.
pub mod parse;

/// Display glyphs.
pub mod strings;

pub use basis::{BasisState, Reference, NOT_FOUND};
pub use compress::Strategy;
pub use dist_vec::{DistVec, DistVecError, DistVecParams, MergeSummary, Scrambler};
pub use excitation::Excitation;
pub use heat_bath::{FourIndexTensor, HeatBathTable};
pub use lattice::{Boundary, HopNeighbors};
pub use lattice_vec::LatticeVec;
pub use params::SysParams;
pub use sampler::{CompressParams, CompressionBuffer, HeatBathSampler, Sample, SamplerError};
pub use symmetry::{PointGroup, SymmetryError, SymmetryInfo};

#[cfg(feature = "python-interface")]
#[pymodule]
fn sparse_fri(m: &Bound<'_, PyModule>) -> PyResult<()> {
    use pyo3::wrap_pyfunction;

    m.add_function(wrap_pyfunction!(basis::excite_sign_py, m)?)?;
    m.add_function(wrap_pyfunction!(basis::extract_occupied_py, m)?)?;
    m.add_function(wrap_pyfunction!(symmetry::convert_symmetry_labels_py, m)?)?;
    m.add_function(wrap_pyfunction!(lattice::hubbard_double_occupancy_py, m)?)?;
    Ok(())
}
