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
use log::debug;

use crate::raster::Raster;

/// Neighborhood windows are square and odd sized, the queried pixel sits at
/// the exact center.
pub const PATCH_WIDTH: usize = 3;
pub const PATCH_LEN: usize = PATCH_WIDTH * PATCH_WIDTH;

/// Index of the center cell in the flattened patch.
pub const PATCH_CENTER: usize = PATCH_LEN / 2;

/// Nearest-pixel value per coordinate, one batch over an open raster.
///
/// Coordinates must already be in the raster's CRS.  A point outside the
/// extent (or with non-finite coordinates) samples as NaN and never aborts
/// the rest of the batch.
pub fn sample_scalars(raster: &Raster, coords: &[(f64, f64)]) -> Vec<f64> {
    let mut out = Vec::with_capacity(coords.len());
    let mut outside = 0usize;

    for &(x, y) in coords {
        if !x.is_finite() || !y.is_finite() {
            outside += 1;
            out.push(f64::NAN);
            continue;
        }

        let raster_x = raster.grid.calc_x(x);
        let raster_y = raster.grid.calc_y(y);

        match raster.value(raster_y, raster_x) {
            Some(v) => out.push(v),
            None => {
                outside += 1;
                out.push(f64::NAN);
            }
        }
    }

    if outside > 0 {
        debug!(
            "{} of {} points outside the extent of {:?}",
            outside,
            coords.len(),
            raster.path
        );
    }

    out
}

/// One flattened 3x3 neighborhood per coordinate, row-major, top-left first.
///
/// A window that crosses the raster boundary anywhere yields a full NaN
/// patch; partial patches are never produced.  Boundary handling is strict
/// on purpose: a point whose containing pixel is valid but sits on the edge
/// still gets the all-NaN patch.
pub fn sample_neighborhoods(raster: &Raster, coords: &[(f64, f64)]) -> Vec<[f64; PATCH_LEN]> {
    let half = (PATCH_WIDTH / 2) as i32;

    let mut out = Vec::with_capacity(coords.len());
    let mut unusable = 0usize;

    for &(x, y) in coords {
        if !x.is_finite() || !y.is_finite() {
            unusable += 1;
            out.push([f64::NAN; PATCH_LEN]);
            continue;
        }

        let center_x = raster.grid.calc_x(x);
        let center_y = raster.grid.calc_y(y);

        let row0 = center_y.saturating_sub(half);
        let col0 = center_x.saturating_sub(half);

        match raster.read_window(row0, col0, PATCH_WIDTH, PATCH_WIDTH) {
            Some(window) => {
                let mut patch = [f64::NAN; PATCH_LEN];
                for (slot, value) in patch.iter_mut().zip(window.iter()) {
                    *slot = *value;
                }
                out.push(patch);
            }
            None => {
                unusable += 1;
                out.push([f64::NAN; PATCH_LEN]);
            }
        }
    }

    if unusable > 0 {
        debug!(
            "{} of {} points without a usable {}x{} window in {:?}",
            unusable,
            coords.len(),
            PATCH_WIDTH,
            PATCH_WIDTH,
            raster.path
        );
    }

    out
}
