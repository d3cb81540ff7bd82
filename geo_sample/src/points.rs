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

use log::{info, warn};

use crate::crs::Crs;
use crate::errors::SamplingError;

/// Which ground truth columns hold the coordinates, and in which CRS they
/// are expressed.  Defaults match the LUCAS soil table.
#[derive(Debug, Clone)]
pub struct PointSetConfig {
    pub lon_column: String,
    pub lat_column: String,
    pub crs: Crs,
}

impl Default for PointSetConfig {
    fn default() -> Self {
        PointSetConfig {
            lon_column: "TH_LONG".to_string(),
            lat_column: "TH_LAT".to_string(),
            crs: Crs::WGS84,
        }
    }
}

/// The loaded point set.  Point identity is the row index; rows keep their
/// file order for the lifetime of the run.
#[derive(Debug, Clone)]
pub struct GroundTruth {
    pub coords: Vec<(f64, f64)>,
    pub crs: Crs,
}

impl GroundTruth {
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }
}

pub fn load_ground_truth(
    path: &Path,
    config: &PointSetConfig,
) -> Result<GroundTruth, SamplingError> {
    let ground_truth_err = |reason: String| SamplingError::GroundTruthRead {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader =
        csv::Reader::from_path(path).map_err(|e| ground_truth_err(e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| ground_truth_err(e.to_string()))?
        .clone();

    let column_index = |name: &str| -> Result<usize, SamplingError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| SamplingError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
    };

    let lon_idx = column_index(&config.lon_column)?;
    let lat_idx = column_index(&config.lat_column)?;

    let mut coords = Vec::new();

    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ground_truth_err(e.to_string()))?;

        let parse = |idx: usize| -> f64 {
            record
                .get(idx)
                .and_then(|s| s.trim().parse::<f64>().ok())
                .unwrap_or(f64::NAN)
        };

        let lon = parse(lon_idx);
        let lat = parse(lat_idx);

        //a bad coordinate keeps its row, every sample for it will be NaN
        if !lon.is_finite() || !lat.is_finite() {
            warn!("Ground truth row {} has no usable coordinate", row);
        }

        coords.push((lon, lat));
    }

    info!("Loaded {} ground truth points from {:?}", coords.len(), path);

    Ok(GroundTruth {
        coords,
        crs: config.crs,
    })
}
