use std::fmt;
use std::hash::{Hash, Hasher};

use log::warn;
#[cfg(feature = "python-interface")]
use pyo3::prelude::*;

use crate::strings::site_glyph;

/// Returned by the virtual orbital searches when fewer than `n + 1`
/// qualifying orbitals exist. Never a valid orbital index.
pub const NOT_FOUND: u8 = 255;

/// Widest boson field, so that every count fits in a `u8`.
pub const MAX_BOSON_BITS: usize = 8;

/// Canonical reference configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    /// Lowest orbitals of both channels occupied.
    HartreeFock,
    /// Channel 0 on even sites, channel 1 on odd sites.
    Neel,
}

/// Bit-packed basis state.
/// # Definition
/// Bits are packed least-significant-bit first within each byte, bytes in
/// ascending order. For $N$ orbitals (or sites), spin-orbital $\sigma N + p$
/// encodes orbital $p$ in channel $\sigma\in\{0,1\}$, so the fermionic region
/// is $[0, 2N)$. Models with bosons append $N$ fields of $w$ bits each,
/// little-endian, starting at bit $2N$.
/// # Usage
/// A state used as a vector key is never modified; excitations produce new
/// values.
/// ```rust
/// use sparse_fri::basis::{reference_state, Reference};
/// let hf = reference_state(Reference::HartreeFock, 4, 2, 0);
/// assert_eq!(hf.as_bytes(), &[0b0001_0001]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BasisState {
    bytes: Box<[u8]>,
}

impl Hash for BasisState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(&self.bytes);
    }
}

impl BasisState {
    /// Empty state large enough to hold `n_bits` bits.
    pub fn zeros(n_bits: usize) -> Self {
        BasisState {
            bytes: vec![0; (n_bits + 7) / 8].into_boxed_slice(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        BasisState {
            bytes: bytes.to_vec().into_boxed_slice(),
        }
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline(always)]
    pub fn n_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Truth value of bit `i`. Bits past the end read as unset.
    #[inline(always)]
    pub fn check(&self, i: usize) -> bool {
        match self.bytes.get(i / 8) {
            Some(byte) => byte & (1 << (i % 8)) != 0,
            None => false,
        }
    }

    #[inline(always)]
    pub fn set(&mut self, i: usize) {
        self.bytes[i / 8] |= 1 << (i % 8);
    }

    #[inline(always)]
    pub fn zero(&mut self, i: usize) {
        self.bytes[i / 8] &= !(1 << (i % 8));
    }

    /// Number of set bits in `[start, end)`.
    pub fn count_ones_in(&self, start: usize, end: usize) -> u32 {
        let end = usize::min(end, self.bytes.len() * 8);
        let mut count = 0;
        let mut i = start;
        while i < end {
            if i % 8 == 0 && i + 8 <= end {
                count += self.bytes[i / 8].count_ones();
                i += 8;
            } else {
                if self.check(i) {
                    count += 1;
                }
                i += 1;
            }
        }
        count
    }

    /// Moves one particle from `from` to `to` and returns the fermionic sign
    /// $(-1)^n$, $n$ being the number of set bits strictly between the two.
    pub fn excite(&mut self, from: u8, to: u8) -> f64 {
        let (lo, hi) = if from < to { (from, to) } else { (to, from) };
        let n_between = self.count_ones_in(lo as usize + 1, hi as usize);
        self.zero(from as usize);
        self.set(to as usize);
        if n_between % 2 == 0 {
            1.0
        } else {
            -1.0
        }
    }

    /// Copy with the two channel blocks of the fermionic region exchanged.
    /// The boson region is untouched.
    pub fn spin_flipped(&self, n_orb: usize) -> BasisState {
        let mut flipped = self.clone();
        for p in 0..n_orb {
            let up = self.check(p);
            let down = self.check(p + n_orb);
            if up != down {
                if down {
                    flipped.set(p);
                    flipped.zero(p + n_orb);
                } else {
                    flipped.zero(p);
                    flipped.set(p + n_orb);
                }
            }
        }
        flipped
    }

    /// One glyph per site, for logs.
    pub fn render_sites(&self, n_sites: usize) -> String {
        (0..n_sites)
            .map(|site| site_glyph(self.check(site), self.check(site + n_sites)))
            .collect()
    }
}

/// Bits in ascending index order.
impl fmt::Display for BasisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.bytes.iter() {
            for bit in 0..8 {
                write!(f, "{}", (byte >> bit) & 1)?;
            }
        }
        Ok(())
    }
}

/// Builds a reference configuration for `n` orbitals or sites.
/// # Arguments
/// * __`reference`__ - Which reference to build.
/// * __`n`__ - Number of orbitals (molecular) or sites (lattice).
/// * __`n_elec`__ - Number of electrons, split evenly between the channels.
/// An odd electron goes to channel 0.
/// * __`boson_bits`__ - Width $w$ of the per-site boson fields, $0$ if the
/// model has none. The fields are all zero.
pub fn reference_state(reference: Reference, n: usize, n_elec: usize, boson_bits: usize) -> BasisState {
    assert!(
        boson_bits <= MAX_BOSON_BITS,
        "Boson fields of {} bits exceed the maximum of {}.",
        boson_bits,
        MAX_BOSON_BITS
    );
    let mut state = BasisState::zeros((2 + boson_bits) * n);
    let half = n_elec / 2;
    match reference {
        Reference::HartreeFock => {
            for i in 0..half {
                state.set(i);
                state.set(n + i);
            }
            if n_elec % 2 == 1 {
                state.set(half);
            }
        }
        Reference::Neel => {
            for i in 0..half {
                state.set(2 * i);
                state.set(n + 2 * i + 1);
            }
            if n_elec % 2 == 1 {
                state.set(2 * half);
            }
        }
    }
    state
}

/// Ascending list of the occupied spin-orbitals in the fermionic region
/// $[0, 2N)$. Its length is the electron count of a well-formed state.
pub fn extract_occupied(state: &BasisState, n_orb: usize) -> Vec<u8> {
    let limit = 2 * n_orb;
    let mut occ = Vec::with_capacity(limit);
    for (byte_idx, &byte) in state.as_bytes().iter().enumerate() {
        let base = byte_idx * 8;
        if base >= limit {
            break;
        }
        let mut bits = byte;
        while bits != 0 {
            let pos = base + bits.trailing_zeros() as usize;
            if pos >= limit {
                break;
            }
            occ.push(pos as u8);
            bits &= bits - 1;
        }
    }
    occ
}

#[inline(always)]
fn boson_offset(n_sites: usize, boson_bits: usize, site: usize) -> usize {
    2 * n_sites + site * boson_bits
}

fn boson_count_at(state: &BasisState, n_sites: usize, boson_bits: usize, site: usize) -> u32 {
    let start = boson_offset(n_sites, boson_bits, site);
    let mut count = 0;
    for bit in 0..boson_bits {
        if state.check(start + bit) {
            count |= 1 << bit;
        }
    }
    count
}

/// Boson occupation of every site, in site order.
pub fn decode_boson_counts(state: &BasisState, n_sites: usize, boson_bits: usize) -> Vec<u8> {
    (0..n_sites)
        .map(|site| boson_count_at(state, n_sites, boson_bits, site) as u8)
        .collect()
}

/// Adds `delta` bosons to `site`.
/// # Returns
/// * __`Some(state)`__ - The new state. Only the field of `site` differs.
/// * __`None`__ - The count would leave $[0, 2^w-1]$.
pub fn apply_boson_delta(
    state: &BasisState,
    n_sites: usize,
    boson_bits: usize,
    site: usize,
    delta: i8,
) -> Option<BasisState> {
    let max = (1i32 << boson_bits) - 1;
    let new_count = boson_count_at(state, n_sites, boson_bits, site) as i32 + delta as i32;
    if new_count < 0 || new_count > max {
        return None;
    }
    let mut out = state.clone();
    let start = boson_offset(n_sites, boson_bits, site);
    for bit in 0..boson_bits {
        if new_count & (1 << bit) != 0 {
            out.set(start + bit);
        } else {
            out.zero(start + bit);
        }
    }
    Some(out)
}

/// The `n`-th (from $0$) unoccupied spin-orbital of `channel`, as an absolute
/// spin-orbital index, or [NOT_FOUND].
pub fn find_nth_virtual(occ: &[u8], channel: usize, n_orb: usize, n: usize) -> u8 {
    let start = channel * n_orb;
    let end = start + n_orb;
    let mut in_channel = occ
        .iter()
        .copied()
        .filter(|&o| (o as usize) >= start && (o as usize) < end)
        .peekable();
    let mut remaining = n;
    for orb in start..end {
        if in_channel.peek() == Some(&(orb as u8)) {
            in_channel.next();
            continue;
        }
        if remaining == 0 {
            return orb as u8;
        }
        remaining -= 1;
    }
    NOT_FOUND
}

/// Removes `remove` from the ascending `list` and inserts `insert`, in place,
/// keeping the order. `remove` must occur exactly once.
pub fn splice_sorted(list: &mut [u8], remove: u8, insert: u8) {
    let Some(mut pos) = list.iter().position(|&o| o == remove) else {
        warn!("Cannot splice {} into {:?}: {} is not in the list.", insert, list, remove);
        return;
    };
    if insert > remove {
        while pos + 1 < list.len() && list[pos + 1] < insert {
            list[pos] = list[pos + 1];
            pos += 1;
        }
    } else {
        while pos > 0 && list[pos - 1] > insert {
            list[pos] = list[pos - 1];
            pos -= 1;
        }
    }
    list[pos] = insert;
}

/// Copying version of [splice_sorted].
pub fn spliced(list: &[u8], remove: u8, insert: u8) -> Vec<u8> {
    let mut out = list.to_vec();
    splice_sorted(&mut out, remove, insert);
    out
}

/// Fermionic exchange sign for moving a particle between `a` and `b`.
/// # Definition
/// $(-1)^n$ with $n$ the number of occupied orbitals strictly between `a`
/// and `b`. Symmetric in its first two arguments, $+1$ when they are equal.
pub fn excite_sign(a: u8, b: u8, occ: &[u8]) -> f64 {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    let start = occ.partition_point(|&o| o <= lo);
    let end = occ.partition_point(|&o| o < hi);
    if end.saturating_sub(start) % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

/// [excite_sign] with the source given as a position in `occ`.
pub fn excite_sign_occ(occ_idx: usize, target: u8, occ: &[u8]) -> f64 {
    excite_sign(occ[occ_idx], target, occ)
}

/// Occupied list after moving the electron at position `occ_idx` to `target`.
pub fn excite_occupied_single(occ: &[u8], occ_idx: usize, target: u8) -> Vec<u8> {
    spliced(occ, occ[occ_idx], target)
}

/// Occupied list after moving the electrons at positions `occ_idx` to
/// `targets`.
pub fn excite_occupied_double(occ: &[u8], occ_idx: [usize; 2], targets: [u8; 2]) -> Vec<u8> {
    let mut out: Vec<u8> = occ
        .iter()
        .enumerate()
        .filter(|(k, _)| *k != occ_idx[0] && *k != occ_idx[1])
        .map(|(_, &o)| o)
        .collect();
    for target in targets {
        let pos = out.partition_point(|&o| o < target);
        out.insert(pos, target);
    }
    out
}

#[cfg(feature = "python-interface")]
#[pyfunction]
pub fn excite_sign_py(a: u8, b: u8, occ: Vec<u8>) -> PyResult<f64> {
    Ok(excite_sign(a, b, &occ))
}

#[cfg(feature = "python-interface")]
#[pyfunction]
pub fn extract_occupied_py(bytes: Vec<u8>, n_orb: usize) -> PyResult<Vec<u8>> {
    Ok(extract_occupied(&BasisState::from_bytes(&bytes), n_orb))
}
