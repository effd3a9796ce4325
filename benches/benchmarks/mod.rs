pub mod basis;
pub mod dist_vec;
pub mod heat_bath;
