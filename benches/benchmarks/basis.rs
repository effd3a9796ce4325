use criterion::{black_box, criterion_group, Criterion};
use sparse_fri::basis::{excite_sign, extract_occupied, reference_state, Reference};

pub fn occupied_list(c: &mut Criterion) {
    const N_ORB: usize = 64;
    let state = reference_state(Reference::Neel, N_ORB, N_ORB, 0);
    c.bench_function("Extract occupied 64 orbitals half filling", |b| {
        b.iter(|| extract_occupied(black_box(&state), N_ORB))
    });
}

pub fn parity(c: &mut Criterion) {
    const N_ORB: usize = 64;
    let state = reference_state(Reference::HartreeFock, N_ORB, N_ORB, 0);
    let occ = extract_occupied(&state, N_ORB);
    c.bench_function("Excitation sign 64 occupied", |b| {
        b.iter(|| excite_sign(black_box(3), black_box(100), &occ))
    });
}

criterion_group!(benches, occupied_list, parity,);
