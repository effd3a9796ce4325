use criterion::{black_box, criterion_group, Criterion};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sparse_fri::basis::BasisState;
use sparse_fri::dist_vec::{DistVec, DistVecParams};

pub fn merge(c: &mut Criterion) {
    const N_BITS: usize = 32;
    let mut rng = SmallRng::seed_from_u64(42);
    let keys: Vec<BasisState> = (0..4096)
        .map(|_| {
            let mut key = BasisState::zeros(N_BITS);
            while key.count_ones_in(0, N_BITS) < 4 {
                key.set(rng.gen_range(0..N_BITS));
            }
            key
        })
        .collect();
    let params = DistVecParams {
        initial_capacity: 1024,
        max_capacity: 1 << 16,
        n_bits: N_BITS,
        n_elec: 4,
        n_slots: 1,
        proc_scrambler: (0..N_BITS as u32).map(|i| i.wrapping_mul(2654435761)).collect(),
        vec_scrambler: (0..N_BITS as u32).map(|i| i * 40503 + 1).collect(),
    };
    c.bench_function("DistVec add and merge 4096 contributions", |b| {
        b.iter(|| {
            let mut vec: DistVec<f64> = DistVec::new(params.clone());
            for (i, key) in keys.iter().enumerate() {
                vec.add(black_box(key), i as f64, 0);
            }
            vec.perform_add(0).unwrap()
        })
    });
}

criterion_group!(benches, merge,);
