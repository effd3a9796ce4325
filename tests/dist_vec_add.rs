use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use sparse_fri::basis::{reference_state, BasisState, Reference};
use sparse_fri::dist_vec::{DistVec, DistVecParams, Mailbox, Transport};

fn small_params(initial_capacity: usize, max_capacity: usize) -> DistVecParams {
    DistVecParams {
        initial_capacity,
        max_capacity,
        n_bits: 8,
        n_elec: 2,
        n_slots: 1,
        proc_scrambler: (1..=8).collect(),
        vec_scrambler: (1..=8).rev().collect(),
    }
}

/// Every 2-electron state of 4 orbitals, one electron per channel or not.
fn all_keys() -> Vec<BasisState> {
    let mut keys = Vec::new();
    for a in 0..8 {
        for b in (a + 1)..8 {
            keys.push(BasisState::from_bytes(&[(1u8 << a) | (1u8 << b)]));
        }
    }
    keys
}

#[test]
fn repeated_adds_accumulate() {
    let mut vec: DistVec<i32> = DistVec::new(small_params(2, 2));

    let key = reference_state(Reference::HartreeFock, 4, 2, 0);
    assert_eq!(key.as_bytes(), &[0b0001_0001]);
    vec.add(&key, 1, 0);
    vec.perform_add(0).unwrap();
    assert_eq!(vec.value_at(0, 0), Some(1));
    assert_eq!(vec.key_at(0), Some(&key));
    assert_eq!(vec.occupied_at(0), Some(&[0u8, 4][..]));

    vec.add(&key, 1, 0);
    vec.perform_add(1).unwrap();
    assert_eq!(vec.value_at(0, 0), Some(2));

    let key = BasisState::from_bytes(&[0b0010_0001]);
    vec.add(&key, -1, 0);
    vec.perform_add(2).unwrap();
    assert_eq!(vec.value_at(1, 0), Some(-1));
    assert_eq!(vec.key_at(1), Some(&key));

    vec.add(&key, -1, 0);
    vec.perform_add(3).unwrap();
    assert_eq!(vec.value_at(1, 0), Some(-2));
    assert_eq!(vec.len(), 2);
}

#[test]
fn sums_do_not_depend_on_add_order() {
    let keys = all_keys();
    let mut rng = SmallRng::seed_from_u64(42);
    let mut contributions: Vec<(usize, f64)> = (0..2000)
        .map(|_| (rng.gen_range(0..keys.len()), rng.gen::<f64>() * 1e3 - 5e2))
        .collect();

    let mut reference: DistVec<f64> = DistVec::new(small_params(4, 64));
    for &(k, value) in contributions.iter() {
        reference.add(&keys[k], value, 0);
    }
    reference.perform_add(0).unwrap();

    for _ in 0..5 {
        contributions.shuffle(&mut rng);
        let mut shuffled: DistVec<f64> = DistVec::new(small_params(4, 64));
        for &(k, value) in contributions.iter() {
            shuffled.add(&keys[k], value, 0);
        }
        shuffled.perform_add(0).unwrap();
        assert_eq!(shuffled.len(), reference.len());
        for key in keys.iter() {
            let expected = reference.index_of(key).and_then(|idx| reference.value_at(idx, 0));
            let found = shuffled.index_of(key).and_then(|idx| shuffled.value_at(idx, 0));
            assert_eq!(
                found.map(f64::to_bits),
                expected.map(f64::to_bits),
                "Sum of key {} depends on the add order.",
                key
            );
        }
    }
}

#[test]
fn mailbox_routes_every_key_to_one_owner() {
    let _ = env_logger::try_init();
    let keys = all_keys();
    let mut ranks: Vec<DistVec<f64, Mailbox<f64>>> = (0..2)
        .map(|rank| DistVec::with_transport(small_params(4, 64), Mailbox::new(rank, 2)))
        .collect();

    for (rank, vec) in ranks.iter_mut().enumerate() {
        for key in keys.iter() {
            vec.add(key, (rank + 1) as f64, 0);
        }
    }

    let to_second = ranks[0].transport_mut().drain(1);
    let to_first = ranks[1].transport_mut().drain(0);
    for (key, value, slot) in to_second {
        ranks[1].receive(key, value, slot);
    }
    for (key, value, slot) in to_first {
        ranks[0].receive(key, value, slot);
    }
    for vec in ranks.iter_mut() {
        assert_eq!(vec.transport().n_waiting(), 0);
        vec.perform_add(0).unwrap();
    }

    assert_eq!(ranks[0].len() + ranks[1].len(), keys.len());
    for key in keys.iter() {
        let owner = ranks[0].owner_of(key);
        assert_eq!(owner, ranks[1].owner_of(key));
        assert!(owner < ranks[0].transport().n_procs());
        let idx = ranks[owner].index_of(key).unwrap();
        assert_eq!(ranks[owner].value_at(idx, 0), Some(3.0));
        assert!(ranks[1 - owner].index_of(key).is_none());
    }
}

#[test]
fn cancelled_keys_are_freed_and_reused() {
    let _ = env_logger::try_init();
    let keys = all_keys();
    let mut vec: DistVec<i64> = DistVec::new(small_params(4, 4));
    for key in keys.iter().take(4) {
        vec.add(key, 3, 0);
    }
    vec.perform_add(0).unwrap();
    assert!(vec.perform_add(1).unwrap().inserted.is_empty());

    vec.add(&keys[1], -3, 0);
    vec.add(&keys[2], -3, 0);
    vec.perform_add(2).unwrap();
    assert_eq!(vec.remove_zeros(), vec![1, 2]);
    assert_eq!(vec.len(), 2);

    vec.add(&keys[10], 5, 0);
    vec.add(&keys[9], 7, 0);
    let summary = vec.perform_add(3).unwrap();
    assert_eq!(summary.inserted, vec![1, 2]);
    assert_eq!(vec.value_at(1, 0), Some(5));
    assert_eq!(vec.key_at(2), Some(&keys[9]));

    vec.add(&keys[11], 1, 0);
    assert!(vec.perform_add(4).is_err());
    assert_eq!(vec.n_pending(), 1);
}
