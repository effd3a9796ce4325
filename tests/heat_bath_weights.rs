use assert::close;
use rand_mt::Mt;
use sparse_fri::heat_bath::{
    second_particle_probs, single_particle_probs, tri_nodiag, unnormalized_weight, FourIndexTensor, HeatBathTable,
};

const N_ORB: usize = 5;
const OCC: [u8; 4] = [0, 2, 7, 8];

fn random_table() -> HeatBathTable {
    let mut mt = Mt::new(0);
    let tensor = FourIndexTensor::from_fn(N_ORB, |_, _, _, _| mt.next_u32() as f64 / (1.0 + u32::MAX as f64) - 0.5);
    HeatBathTable::build(&tensor, N_ORB, N_ORB)
}

#[test]
fn first_electron_probabilities() {
    let table = random_table();
    for exclude in [0, 1] {
        let (probs, norm) = single_particle_probs(&table, &OCC, Some(exclude));
        let mut norm_chk = 0.0;
        for i in 0..OCC.len() {
            if i == exclude {
                assert_eq!(probs[i], 0.0);
                continue;
            }
            let raw = table.s_tens[OCC[i] as usize % N_ORB] / table.s_norm;
            close(probs[i] * norm, raw, 1e-7);
            norm_chk += raw;
        }
        close(norm_chk, norm, 1e-7);
        close(probs.iter().sum::<f64>(), 1.0, 1e-12);
    }
}

#[test]
fn second_electron_probabilities() {
    let table = random_table();
    let (probs, norm) = second_particle_probs(&table, &OCC, 3);
    assert_eq!(probs.len(), 3);
    let s_first = table.s_tens[OCC[3] as usize % N_ORB];
    let mut norm_chk = 0.0;
    for j in 0..2 {
        let raw = table.d_diff[(OCC[3] as usize - N_ORB) * N_ORB + OCC[j] as usize];
        close(probs[j] * norm, raw / s_first, 1e-7);
        norm_chk += raw;
    }
    let same = table.d_same[tri_nodiag(OCC[2] as usize - N_ORB, OCC[3] as usize - N_ORB)];
    close(probs[2] * norm, same / s_first, 1e-7);
    norm_chk += same;
    close(norm_chk / s_first, norm, 1e-7);
}

#[test]
fn factorized_double_weight() {
    let table = random_table();
    let (o2, o1, u2, u1) = (OCC[2], OCC[3], 5u8, 6u8);
    let weight = unnormalized_weight(&table, [o2, o1, u2, u1]);

    let (o1, o2, u1, u2) = (o1 as usize % N_ORB, o2 as usize % N_ORB, u1 as usize % N_ORB, u2 as usize % N_ORB);
    let expected = table.d_same[tri_nodiag(o2, o1)] / table.s_norm
        * (table.exch_sqrt[tri_nodiag(o1.min(u1), o1.max(u1))] * table.exch_sqrt[tri_nodiag(o2.min(u2), o2.max(u2))])
        / table.exch_norms[o1]
        / table.exch_norms[o2];
    close(weight, expected, 1e-7);
}
