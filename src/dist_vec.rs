use derive_more::Error;
use log::{debug, info, trace, warn};
use num::Zero;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};
use std::ops::AddAssign;
use std::sync::Arc;

use crate::basis::{extract_occupied, BasisState};

/// Element type of a [DistVec].
pub trait VecValue: Copy + Zero + AddAssign + PartialEq + fmt::Debug + Send + Sync {
    /// Total order used to sort pending contributions.
    fn total_cmp(&self, other: &Self) -> Ordering;
    fn magnitude(&self) -> f64;
}

macro_rules! impl_vec_value_float {
    ($($t:ty),*) => {
        $(impl VecValue for $t {
            #[inline(always)]
            fn total_cmp(&self, other: &Self) -> Ordering {
                <$t>::total_cmp(self, other)
            }
            #[inline(always)]
            fn magnitude(&self) -> f64 {
                self.abs() as f64
            }
        })*
    };
}

macro_rules! impl_vec_value_int {
    ($($t:ty),*) => {
        $(impl VecValue for $t {
            #[inline(always)]
            fn total_cmp(&self, other: &Self) -> Ordering {
                self.cmp(other)
            }
            #[inline(always)]
            fn magnitude(&self) -> f64 {
                self.unsigned_abs() as f64
            }
        })*
    };
}

impl_vec_value_float!(f64, f32);
impl_vec_value_int!(i32, i64);

/// Scrambling sequence of a bit-packed key hash.
/// # Definition
/// Every set bit $i$ of the key contributes the value $s_i$ of the table,
/// or $i$ itself when the table is empty or too short. Contributions are
/// mixed in ascending bit order, so the hash depends on the set-bit
/// positions and on nothing else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scrambler {
    table: Vec<u32>,
}

impl Scrambler {
    pub fn new(table: Vec<u32>) -> Self {
        Scrambler { table }
    }

    pub fn identity() -> Self {
        Scrambler { table: Vec::new() }
    }

    pub fn is_identity(&self) -> bool {
        self.table.is_empty()
    }

    pub fn hash_bytes(&self, bytes: &[u8]) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for (byte_idx, &byte) in bytes.iter().enumerate() {
            let mut bits = byte;
            while bits != 0 {
                let pos = byte_idx * 8 + bits.trailing_zeros() as usize;
                let value = self.table.get(pos).copied().unwrap_or(pos as u32);
                hash ^= value as u64 + 1;
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
                bits &= bits - 1;
            }
        }
        // Final avalanche, so that `hash % n` uses every input bit.
        hash ^= hash >> 33;
        hash = hash.wrapping_mul(0xff51_afd7_ed55_8ccd);
        hash ^= hash >> 33;
        hash
    }

    pub fn hash_state(&self, state: &BasisState) -> u64 {
        self.hash_bytes(state.as_bytes())
    }
}

/// Builds [ScrambledHasher]s sharing one element-level scrambler.
#[derive(Debug, Clone, Default)]
pub struct ScrambledState {
    scrambler: Arc<Scrambler>,
}

impl ScrambledState {
    pub fn new(scrambler: Scrambler) -> Self {
        ScrambledState {
            scrambler: Arc::new(scrambler),
        }
    }
}

impl BuildHasher for ScrambledState {
    type Hasher = ScrambledHasher;

    fn build_hasher(&self) -> ScrambledHasher {
        ScrambledHasher {
            scrambler: Arc::clone(&self.scrambler),
            hash: 0,
        }
    }
}

/// Hasher of [BasisState] keys. Only byte writes are hashed.
pub struct ScrambledHasher {
    scrambler: Arc<Scrambler>,
    hash: u64,
}

impl Hasher for ScrambledHasher {
    fn finish(&self) -> u64 {
        self.hash
    }

    fn write(&mut self, bytes: &[u8]) {
        self.hash ^= self.scrambler.hash_bytes(bytes);
    }

    fn write_usize(&mut self, _: usize) {}
}

/// Routing of contributions to keys owned by other workers.
pub trait Transport<T> {
    fn rank(&self) -> usize;
    fn n_procs(&self) -> usize;

    /// Worker owning a key of process-level hash `hash`.
    fn owner_of(&self, hash: u64) -> usize {
        (hash % self.n_procs() as u64) as usize
    }

    /// Hands a contribution to the worker `owner`.
    fn deliver(&mut self, owner: usize, key: BasisState, value: T, slot: usize);
}

/// Single worker owning every key.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleProcess;

impl<T: fmt::Debug> Transport<T> for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn n_procs(&self) -> usize {
        1
    }

    fn deliver(&mut self, owner: usize, key: BasisState, value: T, slot: usize) {
        warn!(
            "Single process transport cannot deliver {:?} (slot {}) of key {} to worker {}, dropped.",
            value, slot, key, owner
        );
    }
}

/// In-memory transport, one outbox per worker, drained by the caller.
#[derive(Debug, Clone)]
pub struct Mailbox<T> {
    rank: usize,
    outbox: Vec<Vec<(BasisState, T, usize)>>,
}

impl<T> Mailbox<T> {
    pub fn new(rank: usize, n_procs: usize) -> Self {
        assert!(rank < n_procs);
        Mailbox {
            rank,
            outbox: (0..n_procs).map(|_| Vec::new()).collect(),
        }
    }

    /// Takes every contribution addressed to `owner`.
    pub fn drain(&mut self, owner: usize) -> Vec<(BasisState, T, usize)> {
        std::mem::take(&mut self.outbox[owner])
    }

    pub fn n_waiting(&self) -> usize {
        self.outbox.iter().map(|o| o.len()).sum()
    }
}

impl<T> Transport<T> for Mailbox<T> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn n_procs(&self) -> usize {
        self.outbox.len()
    }

    fn deliver(&mut self, owner: usize, key: BasisState, value: T, slot: usize) {
        self.outbox[owner].push((key, value, slot));
    }
}

/// Construction parameters of a [DistVec].
/// # Fields
/// * __`initial_capacity`__ - Number of indices allocated up front.
/// * __`max_capacity`__ - Growth limit.
/// * __`n_bits`__ - Number of addressable spin-orbitals, $2N$.
/// * __`n_elec`__ - Electron count every key must carry.
/// * __`n_slots`__ - Values stored per key.
/// * __`proc_scrambler`__ - Scrambling sequence selecting the owner of a key.
/// * __`vec_scrambler`__ - Scrambling sequence of the shard-local map.
#[derive(Debug, Clone)]
pub struct DistVecParams {
    pub initial_capacity: usize,
    pub max_capacity: usize,
    pub n_bits: usize,
    pub n_elec: usize,
    pub n_slots: usize,
    pub proc_scrambler: Vec<u32>,
    pub vec_scrambler: Vec<u32>,
}

/// Outcome of [DistVec::perform_add].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeSummary {
    /// Pending contributions consumed.
    pub merged: usize,
    /// Indices given to new keys, in first-seen order.
    pub inserted: Vec<usize>,
}

#[derive(Debug, Clone)]
struct Pending<T> {
    key: BasisState,
    slot: usize,
    value: T,
    seq: u64,
}

/// Shard of a sparse vector keyed by [BasisState].
/// # Protocol
/// [DistVec::add] only queues a contribution. [DistVec::perform_add] is the
/// single mutation point: it sums the queued contributions per key and slot,
/// adds them to existing keys and inserts the new keys. Indices are stable
/// until the next merge or [DistVec::remove_zeros].
/// # Ordering
/// Contributions are sorted by key, slot and value before summation, so the
/// stored sums do not depend on the order of the `add` calls, bit for bit.
/// New keys take the lowest free index, in first-seen order.
pub struct DistVec<T: VecValue, X: Transport<T> = SingleProcess> {
    n_bits: usize,
    n_elec: usize,
    n_slots: usize,
    max_capacity: usize,
    capacity: usize,
    end: usize,
    keys: Vec<Option<BasisState>>,
    values: Vec<T>,
    occupied: Vec<Vec<u8>>,
    index: HashMap<BasisState, usize, ScrambledState>,
    free: BinaryHeap<Reverse<usize>>,
    pending: Vec<Pending<T>>,
    seq: u64,
    epoch: Option<u64>,
    proc_scrambler: Scrambler,
    transport: X,
}

impl<T: VecValue> DistVec<T, SingleProcess> {
    pub fn new(params: DistVecParams) -> Self {
        DistVec::with_transport(params, SingleProcess)
    }
}

impl<T: VecValue, X: Transport<T>> DistVec<T, X> {
    pub fn with_transport(params: DistVecParams, transport: X) -> Self {
        assert!(params.n_slots > 0);
        assert!(params.initial_capacity <= params.max_capacity);
        let capacity = params.initial_capacity;
        DistVec {
            n_bits: params.n_bits,
            n_elec: params.n_elec,
            n_slots: params.n_slots,
            max_capacity: params.max_capacity,
            capacity,
            end: 0,
            keys: vec![None; capacity],
            values: vec![T::zero(); capacity * params.n_slots],
            occupied: vec![Vec::new(); capacity],
            index: HashMap::with_capacity_and_hasher(capacity, ScrambledState::new(Scrambler::new(params.vec_scrambler))),
            free: BinaryHeap::new(),
            pending: Vec::new(),
            seq: 0,
            epoch: None,
            proc_scrambler: Scrambler::new(params.proc_scrambler),
            transport,
        }
    }

    /// Worker owning `key`.
    pub fn owner_of(&self, key: &BasisState) -> usize {
        self.transport.owner_of(self.proc_scrambler.hash_state(key))
    }

    /// Queues `value` for `key` in value slot `slot`. Exact zeros are
    /// ignored and keys owned by another worker go through the transport.
    pub fn add(&mut self, key: &BasisState, value: T, slot: usize) {
        assert!(slot < self.n_slots, "Slot {} out of range, vector has {}.", slot, self.n_slots);
        if value == T::zero() {
            return;
        }
        let owner = self.owner_of(key);
        if owner != self.transport.rank() {
            self.transport.deliver(owner, key.clone(), value, slot);
            return;
        }
        self.receive(key.clone(), value, slot);
    }

    /// Queues a contribution already routed to this worker.
    pub fn receive(&mut self, key: BasisState, value: T, slot: usize) {
        assert!(slot < self.n_slots, "Slot {} out of range, vector has {}.", slot, self.n_slots);
        self.pending.push(Pending {
            key,
            slot,
            value,
            seq: self.seq,
        });
        self.seq += 1;
    }

    /// Merges every queued contribution into the store.
    /// # Errors
    /// * __`CapacityExceeded`__ - The new keys do not fit within the maximum
    /// capacity. Nothing is merged and the contributions stay queued.
    pub fn perform_add(&mut self, epoch: u64) -> Result<MergeSummary, DistVecError> {
        if let Some(previous) = self.epoch {
            if epoch < previous {
                warn!("Merge epoch went back from {} to {}.", previous, epoch);
            }
        }

        let mut pending = std::mem::take(&mut self.pending);
        let merged = pending.len();
        pending.sort_by(|a, b| {
            a.key
                .cmp(&b.key)
                .then(a.slot.cmp(&b.slot))
                .then(a.value.total_cmp(&b.value))
        });

        // (key, per-slot sums, first seen)
        let mut groups: Vec<(BasisState, Vec<T>, u64)> = Vec::new();
        for entry in pending.iter() {
            match groups.last_mut() {
                Some((key, sums, first)) if *key == entry.key => {
                    sums[entry.slot] += entry.value;
                    *first = u64::min(*first, entry.seq);
                }
                _ => {
                    let mut sums = vec![T::zero(); self.n_slots];
                    sums[entry.slot] += entry.value;
                    groups.push((entry.key.clone(), sums, entry.seq));
                }
            }
        }

        let (existing, mut fresh): (Vec<_>, Vec<_>) =
            groups.into_iter().partition(|(key, _, _)| self.index.contains_key(key));
        fresh.sort_by_key(|(_, _, first)| *first);

        let available = self.free.len() + (self.capacity - self.end);
        if fresh.len() > available {
            let needed = self.end + fresh.len() - self.free.len();
            if needed > self.max_capacity {
                self.pending = pending;
                return Err(DistVecError::CapacityExceeded {
                    requested: needed,
                    max: self.max_capacity,
                });
            }
            let mut new_capacity = usize::max(self.capacity, 1);
            while new_capacity < needed {
                new_capacity *= 2;
            }
            self.grow(usize::min(new_capacity, self.max_capacity));
        }

        for (key, sums, _) in existing.iter() {
            let idx = self.index[key];
            for (slot, &sum) in sums.iter().enumerate() {
                self.values[idx * self.n_slots + slot] += sum;
            }
            trace!("Merged into key {} at index {}", key, idx);
        }

        let mut inserted = Vec::with_capacity(fresh.len());
        for (key, sums, _) in fresh.into_iter() {
            let idx = match self.free.pop() {
                Some(Reverse(idx)) => idx,
                None => {
                    self.end += 1;
                    self.end - 1
                }
            };
            let occ = extract_occupied(&key, self.n_bits / 2);
            if occ.len() != self.n_elec {
                warn!(
                    "Key {} has {} electrons in its first {} bits, expected {}.",
                    key,
                    occ.len(),
                    self.n_bits,
                    self.n_elec
                );
            }
            self.occupied[idx] = occ;
            self.values[idx * self.n_slots..(idx + 1) * self.n_slots].copy_from_slice(&sums);
            self.index.insert(key.clone(), idx);
            trace!("Inserted key {} at index {}", key, idx);
            self.keys[idx] = Some(key);
            inserted.push(idx);
        }

        debug!(
            "Merge epoch {}: {} contributions, {} existing keys, {} new keys, {} stored.",
            epoch,
            merged,
            existing.len(),
            inserted.len(),
            self.index.len()
        );
        self.epoch = Some(epoch);
        Ok(MergeSummary { merged, inserted })
    }

    fn grow(&mut self, new_capacity: usize) {
        info!("Growing vector storage from {} to {} entries.", self.capacity, new_capacity);
        self.keys.resize(new_capacity, None);
        self.values.resize(new_capacity * self.n_slots, T::zero());
        self.occupied.resize(new_capacity, Vec::new());
        self.index.reserve(new_capacity - self.capacity);
        self.capacity = new_capacity;
    }

    /// Frees every key whose slots are all zero.
    /// # Returns
    /// The freed indices, ascending. They are reused by later merges.
    pub fn remove_zeros(&mut self) -> Vec<usize> {
        let mut freed = Vec::new();
        for idx in 0..self.end {
            let Some(key) = &self.keys[idx] else {
                continue;
            };
            let slots = &self.values[idx * self.n_slots..(idx + 1) * self.n_slots];
            if slots.iter().all(|v| *v == T::zero()) {
                self.index.remove(key);
                self.keys[idx] = None;
                self.occupied[idx].clear();
                self.free.push(Reverse(idx));
                freed.push(idx);
            }
        }
        if !freed.is_empty() {
            debug!("Removed {} zero entries.", freed.len());
        }
        freed
    }

    /// Value of slot `slot` at `idx`, `None` for an unassigned index.
    pub fn value_at(&self, idx: usize, slot: usize) -> Option<T> {
        assert!(slot < self.n_slots, "Slot {} out of range, vector has {}.", slot, self.n_slots);
        match self.keys.get(idx) {
            Some(Some(_)) => Some(self.values[idx * self.n_slots + slot]),
            _ => None,
        }
    }

    pub fn key_at(&self, idx: usize) -> Option<&BasisState> {
        self.keys.get(idx).and_then(|k| k.as_ref())
    }

    /// Cached occupied list of the key at `idx`.
    pub fn occupied_at(&self, idx: usize) -> Option<&[u8]> {
        self.key_at(idx).map(|_| self.occupied[idx].as_slice())
    }

    pub fn index_of(&self, key: &BasisState) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// One past the highest index ever assigned.
    pub fn current_size(&self) -> usize {
        self.end
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn n_slots(&self) -> usize {
        self.n_slots
    }

    pub fn n_bits(&self) -> usize {
        self.n_bits
    }

    pub fn n_pending(&self) -> usize {
        self.pending.len()
    }

    pub fn epoch(&self) -> Option<u64> {
        self.epoch
    }

    pub fn transport(&self) -> &X {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut X {
        &mut self.transport
    }

    /// $\sum_i\lvert v_{i,\text{slot}}\rvert$ over the stored keys.
    pub fn one_norm(&self, slot: usize) -> f64 {
        self.iter().map(|(_, _, values)| values[slot].magnitude()).sum()
    }

    /// Stored entries as `(index, key, slots)`, by ascending index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &BasisState, &[T])> + '_ {
        self.keys[..self.end]
            .iter()
            .enumerate()
            .filter_map(move |(idx, key)| {
                key.as_ref()
                    .map(|key| (idx, key, &self.values[idx * self.n_slots..(idx + 1) * self.n_slots]))
            })
    }
}

/// Errors of the vector store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DistVecError {
    CapacityExceeded { requested: usize, max: usize },
}

impl fmt::Display for DistVecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistVecError::CapacityExceeded { requested, max } => {
                write!(f, "Vector needs {} entries but its maximum capacity is {}.", requested, max)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::basis::{reference_state, Reference};

    fn params(capacity: usize) -> DistVecParams {
        DistVecParams {
            initial_capacity: capacity,
            max_capacity: 64,
            n_bits: 8,
            n_elec: 2,
            n_slots: 2,
            proc_scrambler: Vec::new(),
            vec_scrambler: Vec::new(),
        }
    }

    #[test]
    fn test_zero_is_ignored() {
        let mut vec: DistVec<f64> = DistVec::new(params(2));
        vec.add(&BasisState::from_bytes(&[0b0001_0001]), 0.0, 0);
        assert_eq!(vec.n_pending(), 0);
        assert_eq!(vec.perform_add(0).unwrap().merged, 0);
        assert!(vec.is_empty());
    }

    #[test]
    fn test_slots_are_independent() {
        let mut vec: DistVec<i64> = DistVec::new(params(2));
        let key = BasisState::from_bytes(&[0b0001_0001]);
        vec.add(&key, 3, 0);
        vec.add(&key, -7, 1);
        vec.perform_add(0).unwrap();
        assert_eq!(vec.value_at(0, 0), Some(3));
        assert_eq!(vec.value_at(0, 1), Some(-7));
        assert_eq!(vec.value_at(1, 0), None);
    }

    #[test]
    fn test_growth_doubles() {
        let mut vec: DistVec<f64> = DistVec::new(params(1));
        for byte in [0b0001_0001u8, 0b0001_0010, 0b0010_0001, 0b0010_0010, 0b0100_0001] {
            vec.add(&BasisState::from_bytes(&[byte]), 1.0, 0);
        }
        let summary = vec.perform_add(0).unwrap();
        assert_eq!(summary.inserted, vec![0, 1, 2, 3, 4]);
        assert_eq!(vec.capacity(), 8);
        assert_eq!(vec.current_size(), 5);
    }

    #[test]
    fn test_capacity_exceeded_keeps_pending() {
        let mut p = params(1);
        p.max_capacity = 2;
        let mut vec: DistVec<f64> = DistVec::new(p);
        vec.add(&BasisState::from_bytes(&[0b0001_0001]), 1.0, 0);
        vec.perform_add(0).unwrap();
        for byte in [0b0001_0010u8, 0b0010_0001] {
            vec.add(&BasisState::from_bytes(&[byte]), 1.0, 0);
        }
        assert_eq!(
            vec.perform_add(1),
            Err(DistVecError::CapacityExceeded { requested: 3, max: 2 })
        );
        assert_eq!(vec.n_pending(), 2);
        assert_eq!(vec.len(), 1);
        // A failed merge leaves the epoch where the last success put it.
        assert_eq!(vec.epoch(), Some(0));
    }

    #[test]
    fn test_remove_zeros_reuses_lowest_index() {
        let mut vec: DistVec<f64> = DistVec::new(params(4));
        let keys: Vec<BasisState> = [0b0001_0001u8, 0b0001_0010, 0b0010_0001]
            .iter()
            .map(|b| BasisState::from_bytes(&[*b]))
            .collect();
        for key in keys.iter() {
            vec.add(key, 1.0, 0);
        }
        vec.perform_add(0).unwrap();
        vec.add(&keys[0], -1.0, 0);
        vec.add(&keys[1], -1.0, 0);
        vec.perform_add(1).unwrap();
        assert_eq!(vec.remove_zeros(), vec![0, 1]);
        assert_eq!(vec.len(), 1);
        assert_eq!(vec.key_at(0), None);

        let fresh = BasisState::from_bytes(&[0b0100_0100]);
        vec.add(&fresh, 2.0, 1);
        let summary = vec.perform_add(2).unwrap();
        assert_eq!(summary.inserted, vec![0]);
        assert_eq!(vec.key_at(0), Some(&fresh));
        assert_eq!(vec.occupied_at(0), Some(&[2u8, 6][..]));
        assert_eq!(vec.value_at(0, 0), Some(0.0));
        assert_eq!(vec.value_at(0, 1), Some(2.0));
    }

    #[test]
    fn test_occupied_cache_and_norm() {
        let mut vec: DistVec<f64> = DistVec::new(params(2));
        let hf = reference_state(Reference::HartreeFock, 4, 2, 0);
        vec.add(&hf, -1.5, 0);
        vec.add(&BasisState::from_bytes(&[0b0010_0001]), 0.5, 0);
        vec.perform_add(0).unwrap();
        assert_eq!(vec.occupied_at(0), Some(&[0u8, 4][..]));
        assert_eq!(vec.one_norm(0), 2.0);
        assert_eq!(vec.iter().count(), 2);
    }

    #[test]
    fn test_scrambler_identity_and_table() {
        let key = BasisState::from_bytes(&[0b1010_0101]);
        let identity = Scrambler::identity();
        let explicit = Scrambler::new((0..8).collect());
        assert_eq!(identity.hash_state(&key), explicit.hash_state(&key));
        let reversed = Scrambler::new((0..8).rev().collect());
        assert_ne!(identity.hash_state(&key), reversed.hash_state(&key));
    }
}
