use log::info;

use crate::compress::Strategy;
use crate::dist_vec::DistVecParams;
use crate::sampler::CompressParams;

/// Run configuration.
/// # Fields
/// * __`n_orb`__ - Active spatial orbitals, or lattice sites.
/// * __`n_frozen`__ - Frozen core electrons, two per frozen orbital.
/// * __`n_elec`__ - Total electron count, frozen ones included.
/// * __`boson_bits`__ - Width of the per-site boson fields, $0$ without
/// bosons.
/// * __`budget`__ - Elements kept by each compression stage.
/// * __`p_doub`__ - Share of the weight proposed to double excitations.
#[derive(Debug, Clone)]
pub struct SysParams {
    pub n_orb: usize,
    pub n_frozen: usize,
    pub n_elec: usize,
    pub boson_bits: usize,
    pub n_slots: usize,
    pub initial_capacity: usize,
    pub max_capacity: usize,
    pub budget: usize,
    pub p_doub: f64,
    pub renormalize: bool,
    pub fold_time_reversal: bool,
    pub strategy: Strategy,
}

impl SysParams {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        n_orb: usize,
        n_frozen: usize,
        n_elec: usize,
        boson_bits: usize,
        n_slots: usize,
        initial_capacity: usize,
        max_capacity: usize,
        budget: usize,
        p_doub: f64,
        renormalize: bool,
        fold_time_reversal: bool,
        strategy: Strategy,
    ) -> Self {
        SysParams {
            n_orb,
            n_frozen,
            n_elec,
            boson_bits,
            n_slots,
            initial_capacity,
            max_capacity,
            budget,
            p_doub,
            renormalize,
            fold_time_reversal,
            strategy,
        }
    }

    /// Electrons outside the frozen core.
    pub fn n_elec_active(&self) -> usize {
        self.n_elec - self.n_frozen
    }

    /// Active plus frozen spatial orbitals.
    pub fn total_orb(&self) -> usize {
        self.n_orb + self.n_frozen / 2
    }

    /// Bits of the fermionic region.
    pub fn n_bits(&self) -> usize {
        2 * self.n_orb
    }

    /// Bits of a whole key, boson fields included.
    pub fn key_bits(&self) -> usize {
        (2 + self.boson_bits) * self.n_orb
    }

    pub fn compress_params(&self) -> CompressParams {
        CompressParams {
            p_doub: self.p_doub,
            renormalize: self.renormalize,
            budget: self.budget,
        }
    }

    pub fn dist_vec_params(&self, proc_scrambler: Vec<u32>, vec_scrambler: Vec<u32>) -> DistVecParams {
        DistVecParams {
            initial_capacity: self.initial_capacity,
            max_capacity: self.max_capacity,
            n_bits: self.n_bits(),
            n_elec: self.n_elec_active(),
            n_slots: self.n_slots,
            proc_scrambler,
            vec_scrambler,
        }
    }

    pub fn log(&self) {
        info!("System parameter N_ORB = {}", self.n_orb);
        info!("System parameter N_FROZEN = {}", self.n_frozen);
        info!("System parameter N_ELEC = {}", self.n_elec);
        info!("System parameter BOSON_BITS = {}", self.boson_bits);
        info!("System parameter N_SLOTS = {}", self.n_slots);
        info!("System parameter INITIAL_CAPACITY = {}", self.initial_capacity);
        info!("System parameter MAX_CAPACITY = {}", self.max_capacity);
        info!("System parameter BUDGET = {}", self.budget);
        info!("System parameter P_DOUB = {}", self.p_doub);
        info!("System parameter RENORMALIZE = {}", self.renormalize);
        info!("System parameter FOLD_TIME_REVERSAL = {}", self.fold_time_reversal);
        info!("System parameter STRATEGY = {:?}", self.strategy);
    }
}
