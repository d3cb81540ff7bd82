/*
This file is part of the Soil Raster Sampling Tool
Copyright (C) 2025 the soil sampling project authors

The Soil Raster Sampling Tool is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation, either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with this program.  If not, see <http://www.gnu.org/licenses/>.
*/
use std::path::Path;

use anyhow::Result;
use log::{debug, info};

/// Normalized difference indices computed from center pixels:
/// (name, numerator band, subtracted band).
pub const DERIVED_INDICES: [(&str, &str, &str); 2] =
    [("NDVI", "B08", "B04"), ("NDRE", "B08", "B05")];

/// The center of the 3x3 patch is the 5th value in raster scan order.
pub const CENTER_SUFFIX: &str = "_5";

pub fn center_column(band_id: &str) -> String {
    format!("{}{}", band_id, CENTER_SUFFIX)
}

/// Accumulates feature columns for a fixed number of points, then commits
/// a finished table once.  Columns keep insertion order; cells are keyed by
/// point index so no stage can reorder rows.
pub struct FeatureTableBuilder {
    num_rows: usize,
    columns: Vec<(String, Vec<f64>)>,
}

impl FeatureTableBuilder {
    pub fn new(num_rows: usize) -> Self {
        FeatureTableBuilder {
            num_rows,
            columns: Vec::new(),
        }
    }

    pub fn add_column(&mut self, name: String, values: Vec<f64>) {
        assert_eq!(
            values.len(),
            self.num_rows,
            "column {} has {} values for {} points",
            name,
            values.len(),
            self.num_rows
        );
        assert!(
            self.columns.iter().all(|(existing, _)| *existing != name),
            "duplicate column {}",
            name
        );

        self.columns.push((name, values));
    }

    pub fn finish(self) -> FeatureTable {
        FeatureTable {
            num_rows: self.num_rows,
            columns: self.columns,
        }
    }
}

/// One row per ground truth point, in original order; NaN marks every cell
/// that could not be sampled.  Rows are never dropped.
#[derive(Debug)]
pub struct FeatureTable {
    num_rows: usize,
    columns: Vec<(String, Vec<f64>)>,
}

impl FeatureTable {
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Appends every derivable normalized difference index.
    ///
    /// An index is computed only when both center pixel columns exist;
    /// otherwise it is omitted, which is not an error.  0/0 and +-infinity
    /// become NaN.
    pub fn add_derived_indices(&mut self) {
        for (name, band_a, band_b) in DERIVED_INDICES {
            let col_a = center_column(band_a);
            let col_b = center_column(band_b);

            let values = match (self.column(&col_a), self.column(&col_b)) {
                (Some(a), Some(b)) => a
                    .iter()
                    .zip(b.iter())
                    .map(|(&a, &b)| normalized_difference(a, b))
                    .collect(),
                _ => {
                    debug!(
                        "Index {} omitted, missing center pixel column {} or {}",
                        name, col_a, col_b
                    );
                    continue;
                }
            };

            self.columns.push((name.to_string(), values));
        }
    }

    /// Replaces any non-finite cell with NaN.
    pub fn clip_non_finite(&mut self) {
        for (_, values) in self.columns.iter_mut() {
            for v in values.iter_mut() {
                if !v.is_finite() {
                    *v = f64::NAN;
                }
            }
        }
    }

    /// Writes the table as CSV, one row per point in original order.
    /// NaN cells serialize as empty fields.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().has_headers(true).from_path(path)?;

        let mut header = vec!["point_index".to_string()];
        header.extend(self.columns.iter().map(|(n, _)| n.clone()));
        writer.write_record(&header)?;

        for row in 0..self.num_rows {
            let mut record = vec![row.to_string()];
            for (_, values) in &self.columns {
                let v = values[row];
                if v.is_nan() {
                    record.push(String::new());
                } else {
                    record.push(v.to_string());
                }
            }
            writer.write_record(&record)?;
        }

        writer.flush()?;
        info!(
            "Wrote {} rows x {} columns to {:?}",
            self.num_rows,
            self.columns.len() + 1,
            path
        );

        Ok(())
    }
}

fn normalized_difference(a: f64, b: f64) -> f64 {
    let value = (a - b) / (a + b);
    if value.is_finite() {
        value
    } else {
        f64::NAN
    }
}
