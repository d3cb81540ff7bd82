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
use std::collections::HashMap;

use log::warn;
use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::crs::Crs;
use crate::errors::SamplingError;

/// Projects a batch of coordinate pairs from one CRS to another.
///
/// Output is one-to-one with the input, same order.  A pair that fails to
/// transform (outside the projection domain) becomes (NaN, NaN) rather than
/// aborting the batch; only an unresolvable CRS is fatal.
pub fn project_points(
    source: Crs,
    target: Crs,
    coords: &[(f64, f64)],
) -> Result<Vec<(f64, f64)>, SamplingError> {
    if source == target {
        return Ok(coords.to_vec());
    }

    let source_proj = Proj::from_proj_string(source.proj_string()?)
        .map_err(|_| SamplingError::UnsupportedCrs(source.to_string()))?;
    let target_proj = Proj::from_proj_string(target.proj_string()?)
        .map_err(|_| SamplingError::UnsupportedCrs(target.to_string()))?;

    //proj4rs works in radians for geographic systems
    let source_geographic = source.is_geographic();
    let target_geographic = target.is_geographic();

    let mut out = Vec::with_capacity(coords.len());

    for &(x, y) in coords {
        if !x.is_finite() || !y.is_finite() {
            out.push((f64::NAN, f64::NAN));
            continue;
        }

        let mut point = if source_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        match transform(&source_proj, &target_proj, &mut point) {
            Ok(()) => {
                if target_geographic {
                    out.push((point.0.to_degrees(), point.1.to_degrees()));
                } else {
                    out.push((point.0, point.1));
                }
            }
            Err(e) => {
                warn!(
                    "Could not project ({}, {}) from {} to {}: {:?}",
                    x, y, source, target, e
                );
                out.push((f64::NAN, f64::NAN));
            }
        }
    }

    Ok(out)
}

/// One projected point set per distinct target CRS encountered during a run.
///
/// Every raster sharing a CRS reuses the same projected coordinates, so the
/// point identity -> coordinate mapping is derived exactly once per CRS.
pub struct ProjectedPointCache {
    source: Crs,
    coords: Vec<(f64, f64)>,
    by_crs: HashMap<Crs, Vec<(f64, f64)>>,
}

impl ProjectedPointCache {
    pub fn new(source: Crs, coords: Vec<(f64, f64)>) -> Self {
        ProjectedPointCache {
            source,
            coords,
            by_crs: HashMap::new(),
        }
    }

    pub fn source_crs(&self) -> Crs {
        self.source
    }

    /// Coordinates as loaded, in the source CRS.
    pub fn source_coords(&self) -> &[(f64, f64)] {
        &self.coords
    }

    pub fn get(&mut self, target: Crs) -> Result<&[(f64, f64)], SamplingError> {
        if target == self.source {
            return Ok(&self.coords);
        }

        if !self.by_crs.contains_key(&target) {
            let projected = project_points(self.source, target, &self.coords)?;
            self.by_crs.insert(target, projected);
        }

        Ok(&self.by_crs[&target])
    }
}
