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
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use ndarray::{s, Array2};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;

mod grid;
mod test_util;

pub use grid::*;
pub use test_util::*;

use crate::crs::Crs;
use crate::errors::SamplingError;

//GeoTIFF tags not covered by the tiff crate's tag enum
pub(crate) const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
pub(crate) const TAG_MODEL_TIEPOINT: u16 = 33922;
pub(crate) const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
pub(crate) const TAG_GDAL_NODATA: u16 = 42113;

//GeoKey ids inside the key directory
pub(crate) const KEY_GT_MODEL_TYPE: u16 = 1024;
pub(crate) const KEY_GT_RASTER_TYPE: u16 = 1025;
pub(crate) const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
pub(crate) const KEY_PROJECTED_CS_TYPE: u16 = 3072;

fn read_err(path: &Path, reason: impl fmt::Display) -> SamplingError {
    SamplingError::RasterRead {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>, SamplingError> {
    let file = File::open(path).map_err(|e| read_err(path, e))?;
    let decoder = Decoder::new(BufReader::new(file)).map_err(|e| read_err(path, e))?;
    Ok(decoder.with_limits(Limits::unlimited()))
}

fn grid_from_decoder(
    decoder: &mut Decoder<BufReader<File>>,
    path: &Path,
) -> Result<RasterGrid, SamplingError> {
    let (num_cols, num_rows) = decoder.dimensions().map_err(|e| read_err(path, e))?;

    let pixel_scale = decoder
        .find_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE))
        .map_err(|e| read_err(path, e))?
        .ok_or_else(|| read_err(path, "missing ModelPixelScale tag"))?
        .into_f64_vec()
        .map_err(|e| read_err(path, e))?;

    let tie_point = decoder
        .find_tag(Tag::Unknown(TAG_MODEL_TIEPOINT))
        .map_err(|e| read_err(path, e))?
        .ok_or_else(|| read_err(path, "missing ModelTiepoint tag"))?
        .into_f64_vec()
        .map_err(|e| read_err(path, e))?;

    if pixel_scale.len() < 2 || tie_point.len() < 6 {
        return Err(read_err(path, "malformed georeferencing tags"));
    }

    let pixel_width = pixel_scale[0];
    //ModelPixelScale carries a positive y step; rows go down
    let pixel_height = -pixel_scale[1];

    //The tie point anchors pixel (i, j) at world (x, y); almost always (0, 0)
    let origin_x = tie_point[3] - tie_point[0] * pixel_width;
    let origin_y = tie_point[4] - tie_point[1] * pixel_height;

    let epsg = read_epsg(decoder);
    let no_data_value = read_nodata(decoder);

    Ok(RasterGrid {
        origin_x,
        origin_y,
        pixel_width,
        pixel_height,
        num_rows,
        num_cols,
        no_data_value,
        epsg,
    })
}

fn read_epsg(decoder: &mut Decoder<BufReader<File>>) -> Option<Crs> {
    let keys = decoder
        .find_tag(Tag::Unknown(TAG_GEO_KEY_DIRECTORY))
        .ok()
        .flatten()?
        .into_u16_vec()
        .ok()?;

    if keys.len() < 4 {
        return None;
    }

    let num_keys = keys[3] as usize;
    for i in 0..num_keys {
        let base = 4 + 4 * i;
        if base + 3 >= keys.len() {
            break;
        }
        let (key_id, location, _count, value) =
            (keys[base], keys[base + 1], keys[base + 2], keys[base + 3]);

        //value lives inline only when location is 0
        if location == 0 && (key_id == KEY_PROJECTED_CS_TYPE || key_id == KEY_GEOGRAPHIC_TYPE) {
            return Some(Crs(value));
        }
    }

    None
}

fn read_nodata(decoder: &mut Decoder<BufReader<File>>) -> Option<f64> {
    let value = decoder
        .find_tag(Tag::Unknown(TAG_GDAL_NODATA))
        .ok()
        .flatten()?;

    let text = value.into_string().ok()?;
    text.trim_matches(char::from(0)).trim().parse::<f64>().ok()
}

impl RasterGrid {
    /// Reads only the georeferencing of a GeoTIFF, without decoding pixels.
    pub fn from_tiff(path: &Path) -> Result<RasterGrid, SamplingError> {
        let mut decoder = open_decoder(path)?;
        grid_from_decoder(&mut decoder, path)
    }
}

/// One single-band raster, grid plus decoded pixel buffer.
///
/// The band is decoded exactly once at open; all point batches for the band
/// are then served from memory.  Cells equal to the declared nodata value are
/// stored as NaN, so samplers never have to special-case them.
#[derive(Debug)]
pub struct Raster {
    pub path: PathBuf,
    pub grid: RasterGrid,
    data: Array2<f64>,
}

impl Raster {
    pub fn open(path: &Path) -> Result<Raster, SamplingError> {
        let mut decoder = open_decoder(path)?;
        let grid = grid_from_decoder(&mut decoder, path)?;

        match decoder.colortype().map_err(|e| read_err(path, e))? {
            ColorType::Gray(_) => {}
            other => {
                return Err(read_err(
                    path,
                    format!("expected a single band raster, got {:?}", other),
                ));
            }
        }

        let decoded = decoder.read_image().map_err(|e| read_err(path, e))?;

        let mut values: Vec<f64> = match decoded {
            DecodingResult::U8(v) => v.into_iter().map(|x| x as f64).collect(),
            DecodingResult::U16(v) => v.into_iter().map(|x| x as f64).collect(),
            DecodingResult::U32(v) => v.into_iter().map(|x| x as f64).collect(),
            DecodingResult::I16(v) => v.into_iter().map(|x| x as f64).collect(),
            DecodingResult::I32(v) => v.into_iter().map(|x| x as f64).collect(),
            DecodingResult::F32(v) => v.into_iter().map(|x| x as f64).collect(),
            DecodingResult::F64(v) => v,
            _ => return Err(read_err(path, "unsupported pixel data type")),
        };

        if values.len() != (grid.num_rows as usize) * (grid.num_cols as usize) {
            return Err(read_err(path, "pixel buffer does not match dimensions"));
        }

        if grid.no_data_value.is_some() {
            for v in values.iter_mut() {
                if grid.is_nodata(*v) {
                    *v = f64::NAN;
                }
            }
        }

        let data =
            Array2::from_shape_vec((grid.num_rows as usize, grid.num_cols as usize), values)
                .map_err(|e| read_err(path, e))?;

        Ok(Raster {
            path: path.to_path_buf(),
            grid,
            data,
        })
    }

    /// Value of one cell, None outside the extent.  Nodata cells are NaN.
    pub fn value(&self, raster_y: i32, raster_x: i32) -> Option<f64> {
        if !self.grid.contains_cell(raster_y, raster_x) {
            return None;
        }
        Some(self.data[[raster_y as usize, raster_x as usize]])
    }

    /// Reads a window fully contained in the raster, row-major.
    /// None if any part of the window crosses the extent.
    pub fn read_window(
        &self,
        row0: i32,
        col0: i32,
        num_rows: usize,
        num_cols: usize,
    ) -> Option<Array2<f64>> {
        if !self.grid.contains_window(row0, col0, num_rows, num_cols) {
            return None;
        }

        let (r, c) = (row0 as usize, col0 as usize);
        Some(
            self.data
                .slice(s![r..r + num_rows, c..c + num_cols])
                .to_owned(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::test_util::{create_test_raster, create_test_raster_u16, get_temp_filename};

    fn utm_grid() -> RasterGrid {
        RasterGrid {
            origin_x: 600_000.0,
            origin_y: 5_000_000.0,
            pixel_width: 10.0,
            pixel_height: -10.0,
            num_rows: 3,
            num_cols: 4,
            no_data_value: Some(-9999.0),
            epsg: Some(Crs(32632)),
        }
    }

    #[test]
    fn test_roundtrip_f32() {
        let grid = utm_grid();
        let data = vec![
            1.0, 2.0, 3.0, 4.0, //
            5.0, -9999.0, 7.0, 8.0, //
            9.0, 10.0, 11.0, 12.0,
        ];

        let path = create_test_raster("roundtrip.tif", &grid, &data).unwrap();
        let raster = Raster::open(&path).unwrap();

        assert_eq!(raster.grid.num_rows, 3);
        assert_eq!(raster.grid.num_cols, 4);
        assert_eq!(raster.grid.epsg, Some(Crs(32632)));
        assert_float_within_eps(raster.grid.origin_x, 600_000.0, MEDIUM_EPSILON, "origin x");
        assert_float_within_eps(raster.grid.origin_y, 5_000_000.0, MEDIUM_EPSILON, "origin y");
        assert_float_within_eps(raster.grid.pixel_height, -10.0, MEDIUM_EPSILON, "pixel height");
        assert_eq!(raster.grid.no_data_value, Some(-9999.0));

        assert_eq!(raster.value(0, 0), Some(1.0));
        assert_eq!(raster.value(2, 3), Some(12.0));

        //declared nodata decodes as the NaN sentinel
        assert!(raster.value(1, 1).unwrap().is_nan());

        //outside the extent
        assert_eq!(raster.value(3, 0), None);
        assert_eq!(raster.value(0, 4), None);
        assert_eq!(raster.value(-1, 0), None);
    }

    #[test]
    fn test_roundtrip_u16() {
        let mut grid = utm_grid();
        grid.no_data_value = None;
        grid.num_rows = 2;
        grid.num_cols = 2;

        let path = create_test_raster_u16("roundtrip_u16.tif", &grid, &[100, 200, 300, 400])
            .unwrap();
        let raster = Raster::open(&path).unwrap();

        assert_eq!(raster.value(0, 1), Some(200.0));
        assert_eq!(raster.value(1, 0), Some(300.0));
    }

    #[test]
    fn test_grid_only_read() {
        let grid = utm_grid();
        let data = vec![0.0; 12];
        let path = create_test_raster("grid_only.tif", &grid, &data).unwrap();

        let read = RasterGrid::from_tiff(&path).unwrap();
        assert_eq!(read.epsg, Some(Crs(32632)));
        assert_eq!(read.num_cols, 4);
    }

    #[test]
    fn test_read_window() {
        let mut grid = utm_grid();
        grid.no_data_value = None;
        grid.num_rows = 4;
        grid.num_cols = 4;

        let data: Vec<f64> = (0..16).map(|v| v as f64).collect();
        let path = create_test_raster("window.tif", &grid, &data).unwrap();
        let raster = Raster::open(&path).unwrap();

        let window = raster.read_window(1, 1, 3, 3).unwrap();
        let flat: Vec<f64> = window.iter().copied().collect();
        assert_eq!(flat, vec![5.0, 6.0, 7.0, 9.0, 10.0, 11.0, 13.0, 14.0, 15.0]);

        //any boundary crossing refuses the whole window
        assert!(raster.read_window(-1, 0, 3, 3).is_none());
        assert!(raster.read_window(2, 0, 3, 3).is_none());
        assert!(raster.read_window(0, 2, 3, 3).is_none());
    }

    #[test]
    fn test_open_missing_file() {
        let path = get_temp_filename("no_such.tif");
        let err = Raster::open(&path).unwrap_err();
        match err {
            SamplingError::RasterRead { .. } => {}
            other => panic!("unexpected error {:?}", other),
        }
    }
}
