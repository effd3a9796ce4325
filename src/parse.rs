/// Two-electron integrals, one `i,j,a,b,value` record per line.
pub mod integrals;
