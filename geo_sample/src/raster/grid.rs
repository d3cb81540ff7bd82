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
use core::fmt;

use serde::Deserialize;

use crate::crs::Crs;

pub const MEDIUM_EPSILON: f64 = 1e-10;

// In lat/lon this is less than a meter
pub const LARGE_EPSILON: f64 = 1e-6;

pub fn assert_float_within_eps(a: f64, b: f64, eps: f64, msg: &str) {
    let diff = (a - b).abs();
    if diff > eps {
        let message = format!(
            "{} Val 1: {} Val 2: {} Abs. Difference: {}  Eps: {}",
            msg, a, b, diff, eps
        );
        panic!("{}", message);
    }
}

/// Affine pixel grid and declared metadata of one raster band.
///
/// Pixel height is negative for the usual north-up rasters.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RasterGrid {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub num_rows: u32,
    pub num_cols: u32,
    pub no_data_value: Option<f64>,
    pub epsg: Option<Crs>,
}

impl fmt::Display for RasterGrid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Origin X,Y: {}, {}\nRight/Bottom: {},{}\nPixel Width/Height: {},{}\nRows: {} Cols: {}\nNo data value: {:?}\nCRS: {:?}",
            self.origin_x,
            self.origin_y,
            self.right_x_coord(),
            self.bottom_y_coord(),
            self.pixel_width,
            self.pixel_height,
            self.num_rows,
            self.num_cols,
            self.no_data_value,
            self.epsg
        )
    }
}

impl RasterGrid {
    /// Calculates the left side
    /// Calculates projected x coordinate from raster_x
    pub fn calc_x_coord(&self, raster_x: i32) -> f64 {
        self.origin_x + self.pixel_width * raster_x as f64
    }
    pub fn right_x_coord(&self) -> f64 {
        self.calc_x_coord(self.num_cols as i32)
    }
    ///calculates the top side
    /// Note pixel height is negative
    pub fn calc_y_coord(&self, raster_y: i32) -> f64 {
        self.origin_y + self.pixel_height * raster_y as f64
    }
    pub fn bottom_y_coord(&self) -> f64 {
        self.calc_y_coord(self.num_rows as i32)
    }

    //Converts projected coordinate to raster_x; floors to the containing cell
    pub fn calc_x(&self, x_coord: f64) -> i32 {
        ((x_coord - self.origin_x) / self.pixel_width).floor() as _
    }
    pub fn calc_y(&self, y_coord: f64) -> i32 {
        ((y_coord - self.origin_y) / self.pixel_height).floor() as _
    }

    pub fn contains_cell(&self, raster_y: i32, raster_x: i32) -> bool {
        raster_x >= 0
            && raster_y >= 0
            && (raster_x as i64) < self.num_cols as i64
            && (raster_y as i64) < self.num_rows as i64
    }

    /// True only if the full window lies inside the raster extent.
    pub fn contains_window(&self, row0: i32, col0: i32, num_rows: usize, num_cols: usize) -> bool {
        row0 >= 0
            && col0 >= 0
            && row0 as i64 + num_rows as i64 <= self.num_rows as i64
            && col0 as i64 + num_cols as i64 <= self.num_cols as i64
    }

    //Shortcut when dealing with f64 values & nodata.  Handles the f32 case,
    //where comparing against the f64 declared value directly fails on
    //rounding noise much bigger than f64 ULPs.
    pub fn is_nodata(&self, in_value: f64) -> bool {
        match self.no_data_value {
            None => false,
            Some(nd) => in_value == nd || (in_value as f32) == (nd as f32),
        }
    }
}
