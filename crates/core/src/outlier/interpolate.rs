use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Multilinear interpolation over a rectangular grid. Values are stored
/// row-major with the last axis varying fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolator {
    axes: Vec<Vec<f64>>,
    values: Vec<f64>,
}

impl Interpolator {
    pub fn new(axes: Vec<Vec<f64>>, values: Vec<f64>) -> Result<Self> {
        if axes.is_empty() {
            return Err(Error::InvalidGrid("grid needs at least one axis".to_string()));
        }
        for (i, axis) in axes.iter().enumerate() {
            if axis.len() < 2 {
                return Err(Error::InvalidGrid(format!(
                    "axis {i} needs at least two points"
                )));
            }
            if !axis.windows(2).all(|w| w[0] < w[1]) {
                return Err(Error::InvalidGrid(format!(
                    "axis {i} is not strictly increasing"
                )));
            }
        }
        let expected: usize = axes.iter().map(Vec::len).product();
        if values.len() != expected {
            return Err(Error::InvalidGrid(format!(
                "expected {expected} grid values, got {}",
                values.len()
            )));
        }
        Ok(Self { axes, values })
    }

    pub fn dims(&self) -> usize {
        self.axes.len()
    }

    pub fn axes(&self) -> &[Vec<f64>] {
        &self.axes
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    fn offset(&self, pos: &[usize]) -> usize {
        let mut offset = 0;
        for (axis, &p) in self.axes.iter().zip(pos) {
            offset = offset * axis.len() + p;
        }
        offset
    }

    /// Value at `coords`; each coordinate must satisfy
    /// `first <= c < last` on its axis.
    pub fn interpolate(&self, coords: &[f64]) -> Result<f64> {
        let dims = self.dims();
        if coords.len() != dims {
            return Err(Error::InvalidGrid(format!(
                "expected {dims} coordinates, got {}",
                coords.len()
            )));
        }

        let mut lower = vec![0usize; dims];
        for (axis_idx, (axis, &c)) in self.axes.iter().zip(coords).enumerate() {
            let last = axis[axis.len() - 1];
            if c.is_nan() || c < axis[0] || c >= last {
                return Err(Error::OffGrid {
                    axis: axis_idx,
                    value: c,
                });
            }
            lower[axis_idx] = axis.iter().take_while(|&&p| p < c).count().saturating_sub(1);
        }

        // Corner bit (dims - 1 - d) selects the upper neighbour on axis d.
        let corners = 1usize << dims;
        let mut reduced: Vec<f64> = (0..corners)
            .map(|corner| {
                let pos: Vec<usize> = (0..dims)
                    .map(|d| lower[d] + ((corner >> (dims - 1 - d)) & 1))
                    .collect();
                self.values[self.offset(&pos)]
            })
            .collect();

        for (d, axis) in self.axes.iter().enumerate() {
            let lo = axis[lower[d]];
            let hi = axis[lower[d] + 1];
            let w_hi = (coords[d] - lo) / (hi - lo);
            let w_lo = 1.0 - w_hi;
            let half = reduced.len() / 2;
            reduced = (0..half)
                .map(|j| w_lo * reduced[j] + w_hi * reduced[j + half])
                .collect();
        }
        Ok(reduced[0])
    }

    /// Plain-text grid: the axis count, one line of points per axis, then
    /// the values wrapped every `len(last axis)` entries.
    pub fn to_text(&self) -> String {
        let mut out = format!("{}\n", self.dims());
        for axis in &self.axes {
            let line: Vec<String> = axis.iter().map(f64::to_string).collect();
            out.push_str(&line.join(" "));
            out.push('\n');
        }
        let width = self.axes[self.dims() - 1].len();
        for row in self.values.chunks(width) {
            let line: Vec<String> = row.iter().map(f64::to_string).collect();
            out.push_str(&line.join(" "));
            out.push('\n');
        }
        out
    }

    pub fn from_text(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let dims: usize = lines
            .next()
            .and_then(|l| l.trim().parse().ok())
            .ok_or_else(|| Error::InvalidGrid("missing axis count".to_string()))?;

        let mut axes = Vec::with_capacity(dims);
        for i in 0..dims {
            let line = lines
                .next()
                .ok_or_else(|| Error::InvalidGrid(format!("missing points for axis {i}")))?;
            axes.push(parse_numbers(line)?);
        }

        let mut values = Vec::new();
        for line in lines {
            values.extend(parse_numbers(line)?);
        }
        Self::new(axes, values)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_text())?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_text(&fs::read_to_string(path)?)
    }
}

fn parse_numbers(line: &str) -> Result<Vec<f64>> {
    line.split_whitespace()
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| Error::InvalidGrid(format!("not a number: {t:?}")))
        })
        .collect()
}
