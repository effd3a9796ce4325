use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use std::error::Error;

use sparse_fri::basis::{reference_state, BasisState, Reference};
use sparse_fri::lattice::hubbard_double_occupancy;
use sparse_fri::{Boundary, LatticeVec, Strategy, SysParams};

const N_SITES: usize = 4;
const N_ELEC: usize = 4;
const BOSON_BITS: usize = 2;
const BOUNDARY: Boundary = Boundary::Periodic;
const CONS_T: f64 = 1.0;
const CONS_U: f64 = 4.0;
const OMEGA: f64 = 1.0;
const COUPLING: f64 = 0.5;
const EPSILON: f64 = 1e-2;
const N_ITER: usize = 500;
const INITIAL_CAPACITY: usize = 64;
const MAX_CAPACITY: usize = 1 << 14;
const OUTPUT_PATH: &str = "holstein_vector.csv";

fn log_model_parameters() {
    info!("System parameter CONS_T = {}", CONS_T);
    info!("System parameter CONS_U = {}", CONS_U);
    info!("System parameter OMEGA = {}", OMEGA);
    info!("System parameter COUPLING = {}", COUPLING);
    info!("System parameter EPSILON = {}", EPSILON);
    info!("System parameter N_ITER = {}", N_ITER);
    info!("System parameter BOUNDARY = {:?}", BOUNDARY);
}

/// Diagonal of the Hubbard-Holstein Hamiltonian.
fn diagonal(key: &BasisState, bosons: &[u8]) -> f64 {
    CONS_U * hubbard_double_occupancy(key, N_SITES) as f64 + OMEGA * bosons.iter().map(|&n| n as f64).sum::<f64>()
}

fn site_density(key: &BasisState, site: usize) -> f64 {
    key.check(site) as u8 as f64 + key.check(site + N_SITES) as u8 as f64
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logger
    env_logger::init();
    let sys = SysParams::new(
        N_SITES,
        0,
        N_ELEC,
        BOSON_BITS,
        1,
        INITIAL_CAPACITY,
        MAX_CAPACITY,
        0,
        0.0,
        false,
        false,
        Strategy::Systematic,
    );
    sys.log();
    log_model_parameters();

    let proc_scrambler: Vec<u32> = (0..sys.n_bits() as u32).map(|i| 2 * i + 1).collect();
    let vec_scrambler: Vec<u32> = (0..sys.n_bits() as u32).map(|i| 5 * i + 3).collect();
    let mut vec: LatticeVec<f64> = LatticeVec::new(
        sys.dist_vec_params(proc_scrambler, vec_scrambler),
        N_SITES,
        BOSON_BITS,
        BOUNDARY,
    );
    let neel = reference_state(Reference::Neel, N_SITES, N_ELEC, BOSON_BITS);
    info!("Initial State: {}", neel.render_sites(N_SITES));
    vec.add(&neel, 1.0, 0);
    vec.perform_add(0)?;

    let progress_bar = ProgressBar::new(N_ITER as u64);
    progress_bar.set_prefix("Projection Progress: ");
    progress_bar.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {prefix} {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")?
            .progress_chars("##-"),
    );

    let mut energy = 0.0;
    for iter in 1..=N_ITER {
        let entries: Vec<(usize, BasisState, f64)> = vec
            .inner()
            .iter()
            .map(|(idx, key, values)| (idx, key.clone(), values[0]))
            .collect();
        let mut reference_value = 0.0;
        let mut projected = 0.0;
        let mut contributions: Vec<(BasisState, f64)> = Vec::new();
        for (idx, key, value) in entries.into_iter() {
            let bosons = vec.decode_boson_counts(idx).unwrap_or_default();
            contributions.push((key.clone(), diagonal(&key, &bosons) * value));

            let hops = match vec.neighbors_at(idx) {
                Some(neighbors) => neighbors.hops(N_SITES),
                None => Vec::new(),
            };
            for (from, to) in hops {
                let mut target = key.clone();
                let sign = target.excite(from, to);
                contributions.push((target, -CONS_T * sign * value));
            }

            for site in 0..N_SITES {
                let density = site_density(&key, site);
                if density == 0.0 {
                    continue;
                }
                let n_b = bosons.get(site).copied().unwrap_or(0) as f64;
                if let Some(raised) = vec.apply_boson_delta(idx, site, 1) {
                    contributions.push((raised, COUPLING * density * (n_b + 1.0).sqrt() * value));
                }
                if let Some(lowered) = vec.apply_boson_delta(idx, site, -1) {
                    contributions.push((lowered, COUPLING * density * n_b.sqrt() * value));
                }
            }
            if key == neel {
                reference_value = value;
            }
        }

        for (key, h_value) in contributions.iter() {
            if *key == neel {
                projected += h_value;
            }
            vec.add(key, -EPSILON * h_value, 0);
        }
        if reference_value != 0.0 {
            energy = projected / reference_value;
        }
        let summary = vec.perform_add(iter as u64)?;
        vec.remove_zeros();
        debug!(
            "Iteration {}: {} contributions, {} new keys, energy = {}",
            iter,
            summary.merged,
            summary.inserted.len(),
            energy
        );
        progress_bar.set_message(format!("E = {:.6}", energy));
        progress_bar.inc(1);
    }
    progress_bar.finish();

    println!("{}", format!("Projected energy: {:.8}", energy).green().bold());
    println!("{}", format!("Stored states: {}", vec.inner().len()).bold());

    let mut writer = csv::Writer::from_path(OUTPUT_PATH)?;
    writer.write_record(["index", "sites", "bosons", "value"])?;
    for (idx, key, values) in vec.inner().iter() {
        let bosons = vec
            .decode_boson_counts(idx)
            .unwrap_or_default()
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writer.write_record([idx.to_string(), key.render_sites(N_SITES), bosons, values[0].to_string()])?;
    }
    writer.flush()?;
    info!("Vector written to {}", OUTPUT_PATH);
    Ok(())
}
