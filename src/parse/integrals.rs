use csv::{Reader, StringRecord};
use derive_more::{Constructor, Error};
use log::{error, info};
use std::fmt;
use std::fs::File;
use std::path::Path;

use crate::heat_bath::FourIndexTensor;

/// Parse a four-index integral definition.
/// # Arguments
/// * __`fp`__ - File path to the definition file, in csv format with a
/// header line. Columns are `i`, `j`, `a`, `b` (0-based) and the value.
/// * __`dim`__ - Number of spatial orbitals, frozen ones included.
/// # Returns
/// The dense tensor. Elements absent from the file are zero; a repeated
/// element keeps its last value.
pub fn parse_integrals_def(fp: &Path, dim: usize) -> Result<FourIndexTensor> {
    let file = File::open(fp)?;
    let mut reader = Reader::from_reader(file);
    let mut tensor = FourIndexTensor::zeros(dim);
    let mut n_records = 0;
    for (k, result) in reader.records().enumerate() {
        let rec = result?;
        if rec.len() != 5 {
            error!("Line {} of {} has {} columns, expected 5.", k, fp.display(), rec.len());
            return Err(IntegralParseError::new(format!(
                "Invalid number of columns on line {}.",
                k
            )));
        }
        let i = parse_index(&rec, 0, k, dim)?;
        let j = parse_index(&rec, 1, k, dim)?;
        let a = parse_index(&rec, 2, k, dim)?;
        let b = parse_index(&rec, 3, k, dim)?;
        let value = rec.get(4).unwrap_or("").trim().parse::<f64>().map_err(|err| {
            error!("Invalid integral value at line {}.", k);
            IntegralParseError::from(err)
        })?;
        tensor.set(i, j, a, b, value);
        n_records += 1;
    }
    info!("Read {} integrals from {}", n_records, fp.display());
    Ok(tensor)
}

fn parse_index(line: &StringRecord, col: usize, l: usize, dim: usize) -> Result<usize> {
    let index = line.get(col).unwrap_or("").trim().parse::<usize>().map_err(|err| {
        error!("Expected a valid orbital index at line {}, col {}", l, col);
        IntegralParseError::from(err)
    })?;
    if index >= dim {
        return Err(IntegralParseError::new(format!(
            "Orbital {} at line {}, col {} is out of range, expected < {}.",
            index, l, col, dim
        )));
    }
    Ok(index)
}

type Result<T> = std::result::Result<T, IntegralParseError>;

/// Error in the integral definition.
#[derive(Debug, Clone, Error, Constructor)]
pub struct IntegralParseError {
    pub details: String,
}

impl fmt::Display for IntegralParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Parsing error encountered in integral definition: {}", self.details)
    }
}

impl From<std::num::ParseIntError> for IntegralParseError {
    fn from(err: std::num::ParseIntError) -> Self {
        IntegralParseError::new(format!("Expected to parse an integer: {}", err))
    }
}

impl From<std::num::ParseFloatError> for IntegralParseError {
    fn from(err: std::num::ParseFloatError) -> Self {
        IntegralParseError::new(format!("Expected to parse a float: {}", err))
    }
}

impl From<csv::Error> for IntegralParseError {
    fn from(err: csv::Error) -> Self {
        IntegralParseError::new(err.to_string())
    }
}

impl From<std::io::Error> for IntegralParseError {
    fn from(err: std::io::Error) -> Self {
        IntegralParseError::new(err.to_string())
    }
}
