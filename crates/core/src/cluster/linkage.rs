use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::matrix::DistanceMatrix;

/// How two clusters' leaf-to-leaf distances reduce to one merge distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Linkage {
    Single,
    #[default]
    Average,
    Complete,
}

impl Linkage {
    pub fn name(self) -> &'static str {
        match self {
            Linkage::Single => "single",
            Linkage::Average => "average",
            Linkage::Complete => "complete",
        }
    }

    pub fn distance(self, a: &[usize], b: &[usize], matrix: &DistanceMatrix) -> f32 {
        let cells = a
            .iter()
            .flat_map(|&i| b.iter().map(move |&j| cell(matrix, i, j)));
        match self {
            Linkage::Single => cells.fold(f32::INFINITY, f32::min),
            Linkage::Complete => cells.fold(f32::NEG_INFINITY, f32::max),
            Linkage::Average => {
                let count = a.len() * b.len();
                if count == 0 {
                    return 1.0;
                }
                let sum: f64 = cells.map(f64::from).sum();
                (sum / count as f64) as f32
            }
        }
    }
}

/// Failed (negative) or NaN cells count as maximally distant.
fn cell(matrix: &DistanceMatrix, i: usize, j: usize) -> f32 {
    let d = matrix.get(i, j);
    if d.is_nan() || d < 0.0 { 1.0 } else { d }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Linkage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Linkage::Single),
            "average" => Ok(Linkage::Average),
            "complete" => Ok(Linkage::Complete),
            other => Err(Error::InvalidConfig {
                kind: "linkage".to_string(),
                message: format!("unknown linkage {other:?}"),
            }),
        }
    }
}
