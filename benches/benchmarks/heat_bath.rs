use criterion::{black_box, criterion_group, Criterion};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_mt::Mt;
use sparse_fri::basis::{extract_occupied, reference_state, Reference};
use sparse_fri::heat_bath::{FourIndexTensor, HeatBathTable};
use sparse_fri::sampler::{CompressParams, CompressionBuffer, HeatBathSampler, ScoreFns, SourceVector};
use sparse_fri::symmetry::SymmetryInfo;

const N_ORB: usize = 16;
const N_ELEC: usize = 8;

fn random_tensor() -> FourIndexTensor {
    let mut mt = Mt::new(0);
    FourIndexTensor::from_fn(N_ORB, |_, _, _, _| mt.next_u32() as f64 / (1.0 + u32::MAX as f64) - 0.5)
}

pub fn build_table(c: &mut Criterion) {
    let tensor = random_tensor();
    c.bench_function("Heat-bath table 16 orbitals", |b| {
        b.iter(|| HeatBathTable::build(black_box(&tensor), N_ORB, N_ORB))
    });
}

pub fn hbpp_compression(c: &mut Criterion) {
    let table = HeatBathTable::build(&random_tensor(), N_ORB, N_ORB);
    let symm = SymmetryInfo::trivial(N_ORB);
    let params = CompressParams {
        p_doub: 0.95,
        renormalize: true,
        budget: 1000,
    };
    let sampler = HeatBathSampler::new(&table, &symm, params).unwrap();
    let states = vec![reference_state(Reference::HartreeFock, N_ORB, N_ELEC, 0)];
    let occupied = vec![extract_occupied(&states[0], N_ORB)];
    let entries = [(0, 1.0)];
    let source = SourceVector {
        states: &states,
        occupied: &occupied,
        entries: &entries,
    };
    let scores = ScoreFns {
        single: |_: &[u8; 2], _: &[u8]| 1.0,
        double: |_: &[u8; 4]| 1.0,
    };
    let mut rng = SmallRng::seed_from_u64(42);
    let mut out = CompressionBuffer::new(params.budget);
    c.bench_function("HB-PP systematic 16 orbitals budget 1000", |b| {
        b.iter(|| {
            out.clear();
            sampler
                .compress_systematic(black_box(&source), &scores, &mut rng, &mut out)
                .unwrap()
        })
    });
    c.bench_function("HB-PP pivotal 16 orbitals budget 1000", |b| {
        b.iter(|| {
            out.clear();
            sampler
                .compress_pivoted(black_box(&source), &scores, false, &mut rng, &mut out)
                .unwrap()
        })
    });
}

criterion_group!(benches, build_table, hbpp_compression,);
