use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rand_mt::Mt;
use std::error::Error;
use std::path::Path;

use sparse_fri::basis::{reference_state, Reference};
use sparse_fri::heat_bath::{FourIndexTensor, HeatBathTable};
use sparse_fri::parse::integrals::parse_integrals_def;
use sparse_fri::sampler::{CompressionBuffer, HeatBathSampler, ScoreFns, SourceVector};
use sparse_fri::symmetry::{convert_symmetry_labels, SymmetryInfo};
use sparse_fri::{DistVec, Strategy, SysParams};

const N_ORB: usize = 12;
const N_FROZEN: usize = 2;
const N_ELEC: usize = 8;
const INITIAL_CAPACITY: usize = 1 << 10;
const MAX_CAPACITY: usize = 1 << 17;
const BUDGET: usize = 2_000;
const P_DOUB: f64 = 0.9;
const RENORMALIZE: bool = true;
const FOLD_TIME_REVERSAL: bool = false;
const STRATEGY: Strategy = Strategy::Pivotal;
const N_ITER: usize = 50;
const EPSILON: f64 = 1e-2;
const SEED: u32 = 0;
// Random integrals when unset.
const INTEGRALS_PATH: Option<&str> = None;
const POINT_GROUP: &str = "D2h";
const SYMMETRY_LABELS: [u8; N_ORB] = [1, 6, 7, 8, 1, 6, 7, 8, 1, 1, 2, 3];
const OUTPUT_PATH: &str = "hbpp_vector.csv";
const N_PRINT: usize = 10;

fn uniform_centered(mt: &mut Mt) -> f64 {
    mt.next_u32() as f64 / (1.0 + u32::MAX as f64) - 0.5
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logger
    env_logger::init();
    let sys = SysParams::new(
        N_ORB,
        N_FROZEN,
        N_ELEC,
        0,
        1,
        INITIAL_CAPACITY,
        MAX_CAPACITY,
        BUDGET,
        P_DOUB,
        RENORMALIZE,
        FOLD_TIME_REVERSAL,
        STRATEGY,
    );
    sys.log();
    info!("System parameter N_ITER = {}", N_ITER);
    info!("System parameter EPSILON = {}", EPSILON);
    info!("System parameter POINT_GROUP = {}", POINT_GROUP);

    let mut mt = Mt::new(SEED);
    let tensor = match INTEGRALS_PATH {
        Some(path) => parse_integrals_def(Path::new(path), sys.total_orb())?,
        None => FourIndexTensor::from_fn(sys.total_orb(), |_, _, _, _| uniform_centered(&mut mt)),
    };
    let table = HeatBathTable::build(&tensor, sys.n_orb, sys.total_orb());
    let mut labels = SYMMETRY_LABELS.to_vec();
    convert_symmetry_labels(&mut labels, POINT_GROUP)?;
    let symm = SymmetryInfo::new(labels)?;
    let sampler = HeatBathSampler::new(&table, &symm, sys.compress_params())?;

    let proc_scrambler: Vec<u32> = (0..sys.n_bits()).map(|_| mt.next_u32()).collect();
    let vec_scrambler: Vec<u32> = (0..sys.n_bits()).map(|_| mt.next_u32()).collect();
    let mut vec: DistVec<f64> = DistVec::new(sys.dist_vec_params(proc_scrambler, vec_scrambler));
    let reference = reference_state(Reference::HartreeFock, sys.n_orb, sys.n_elec_active(), 0);
    info!("Initial State: {}", reference);
    vec.add(&reference, 1.0, 0);
    vec.perform_add(0)?;

    // Active orbitals sit after the frozen ones in the tensor.
    let offset = sys.total_orb() - sys.n_orb;
    let spatial = |orb: u8| orb as usize % N_ORB + offset;
    let scores = ScoreFns {
        single: |orbs: &[u8; 2], _: &[u8]| {
            let (p, q) = (spatial(orbs[0]), spatial(orbs[1]));
            tensor.get(p, q, q, q)
        },
        double: |orbs: &[u8; 4]| tensor.get(spatial(orbs[0]), spatial(orbs[1]), spatial(orbs[2]), spatial(orbs[3])),
    };

    let mut out = CompressionBuffer::new(4 * BUDGET);
    let progress_bar = ProgressBar::new(N_ITER as u64);
    progress_bar.set_prefix("Walk Progress: ");
    progress_bar.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {prefix} {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")?
            .progress_chars("##-"),
    );

    for iter in 1..=N_ITER {
        let mut states = Vec::with_capacity(vec.len());
        let mut occupied = Vec::with_capacity(vec.len());
        let mut entries = Vec::with_capacity(vec.len());
        for (idx, key, values) in vec.iter() {
            entries.push((states.len(), values[0]));
            states.push(key.clone());
            occupied.push(vec.occupied_at(idx).unwrap_or(&[]).to_vec());
        }
        let source = SourceVector {
            states: &states,
            occupied: &occupied,
            entries: &entries,
        };

        out.clear();
        let n_samples = match sys.strategy {
            Strategy::Systematic => sampler.compress_systematic(&source, &scores, &mut mt, &mut out)?,
            Strategy::Pivotal => {
                sampler.compress_pivoted(&source, &scores, sys.fold_time_reversal, &mut mt, &mut out)?
            }
        };
        for sample in out.iter() {
            let key = match &sample.folded {
                Some(folded) => folded.clone(),
                None => sample.excitation.apply(&states[sample.origin]).0,
            };
            vec.add(&key, -EPSILON * sample.weight, 0);
        }
        let summary = vec.perform_add(iter as u64)?;
        let freed = vec.remove_zeros();
        info!(
            "Iteration {}: {} samples, {} new keys, {} freed, {} stored, norm = {}",
            iter,
            n_samples,
            summary.inserted.len(),
            freed.len(),
            vec.len(),
            vec.one_norm(0)
        );
        progress_bar.set_message(format!("{} keys", vec.len()));
        progress_bar.inc(1);
    }
    progress_bar.finish();

    let mut largest: Vec<(usize, f64)> = vec.iter().map(|(idx, _, values)| (idx, values[0])).collect();
    largest.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
    println!("{}", format!("Stored keys: {}", vec.len()).bold());
    println!("{}", format!("One-norm: {:.6}", vec.one_norm(0)).bold());
    for &(idx, value) in largest.iter().take(N_PRINT) {
        let key = vec.key_at(idx).map(|k| k.to_string()).unwrap_or_default();
        let shown = format!("{:+.6e}", value);
        if value >= 0.0 {
            println!("{} {}", key, shown.green());
        } else {
            println!("{} {}", key, shown.red());
        }
    }

    let mut writer = csv::Writer::from_path(OUTPUT_PATH)?;
    writer.write_record(["index", "key", "value"])?;
    for (idx, key, values) in vec.iter() {
        writer.write_record([idx.to_string(), key.to_string(), values[0].to_string()])?;
    }
    writer.flush()?;
    info!("Vector written to {}", OUTPUT_PATH);
    Ok(())
}
