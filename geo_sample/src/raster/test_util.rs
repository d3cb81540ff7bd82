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
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use tiff::encoder::colortype::{Gray16, Gray32Float};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use uuid::Uuid;

use crate::crs::Crs;
use crate::raster::grid::RasterGrid;
use crate::raster::{
    KEY_GEOGRAPHIC_TYPE, KEY_GT_MODEL_TYPE, KEY_GT_RASTER_TYPE, KEY_PROJECTED_CS_TYPE,
    TAG_GDAL_NODATA, TAG_GEO_KEY_DIRECTORY, TAG_MODEL_PIXEL_SCALE, TAG_MODEL_TIEPOINT,
};

pub fn get_temp_filename(file_name: &str) -> PathBuf {
    std::env::temp_dir()
        .join("geo_sample_tests")
        .join(Uuid::new_v4().to_string())
        .join(file_name)
}

/// Writes a small georeferenced GeoTIFF, f32 pixels.
pub fn create_test_raster(
    in_file_name: &str,
    input_grid: &RasterGrid,
    input_raster_data: &[f64],
) -> Result<PathBuf> {
    create_test_raster_with_path(&get_temp_filename(in_file_name), input_grid, input_raster_data)
}

pub fn create_test_raster_with_path(
    input_path: &Path,
    input_grid: &RasterGrid,
    input_raster_data: &[f64],
) -> Result<PathBuf> {
    assert!(!input_path.exists());
    assert_eq!(
        input_raster_data.len(),
        (input_grid.num_rows * input_grid.num_cols) as usize
    );

    if let Some(parent) = input_path.parent() {
        create_dir_all(parent)?;
    }

    let writer = BufWriter::new(File::create(input_path)?);
    let mut encoder = TiffEncoder::new(writer)?;

    let mut image =
        encoder.new_image::<Gray32Float>(input_grid.num_cols, input_grid.num_rows)?;
    write_geo_tags(image.encoder(), input_grid)?;

    let data: Vec<f32> = input_raster_data.iter().map(|&v| v as f32).collect();
    image.write_data(&data)?;

    Ok(input_path.to_path_buf())
}

/// Same as `create_test_raster` but with u16 pixels, like a reflectance band.
pub fn create_test_raster_u16(
    in_file_name: &str,
    input_grid: &RasterGrid,
    input_raster_data: &[u16],
) -> Result<PathBuf> {
    let input_path = get_temp_filename(in_file_name);

    assert!(!input_path.exists());
    assert_eq!(
        input_raster_data.len(),
        (input_grid.num_rows * input_grid.num_cols) as usize
    );

    if let Some(parent) = input_path.parent() {
        create_dir_all(parent)?;
    }

    let writer = BufWriter::new(File::create(&input_path)?);
    let mut encoder = TiffEncoder::new(writer)?;

    let mut image = encoder.new_image::<Gray16>(input_grid.num_cols, input_grid.num_rows)?;
    write_geo_tags(image.encoder(), input_grid)?;
    image.write_data(input_raster_data)?;

    Ok(input_path)
}

fn write_geo_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    grid: &RasterGrid,
) -> Result<()> {
    //ModelPixelScale: [ScaleX, ScaleY, ScaleZ], y step positive by convention
    let pixel_scale = [grid.pixel_width, -grid.pixel_height, 0.0];
    dir.write_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE), &pixel_scale[..])?;

    //ModelTiepoint ties pixel (0, 0) to the top left corner
    let tie_point = [0.0, 0.0, 0.0, grid.origin_x, grid.origin_y, 0.0];
    dir.write_tag(Tag::Unknown(TAG_MODEL_TIEPOINT), &tie_point[..])?;

    if let Some(crs) = grid.epsg {
        let keys = geo_key_directory(crs);
        dir.write_tag(Tag::Unknown(TAG_GEO_KEY_DIRECTORY), keys.as_slice())?;
    }

    if let Some(nodata) = grid.no_data_value {
        let text = format!("{}", nodata);
        dir.write_tag(Tag::Unknown(TAG_GDAL_NODATA), text.as_str())?;
    }

    Ok(())
}

//[KeyDirectoryVersion, KeyRevision, MinorRevision, NumberOfKeys, then 4 shorts per key]
fn geo_key_directory(crs: Crs) -> Vec<u16> {
    let geographic = crs.is_geographic();

    let mut keys = vec![1, 1, 0, 3];

    //GTModelTypeGeoKey: 1 projected, 2 geographic
    keys.extend_from_slice(&[KEY_GT_MODEL_TYPE, 0, 1, if geographic { 2 } else { 1 }]);
    //GTRasterTypeGeoKey: pixel is area
    keys.extend_from_slice(&[KEY_GT_RASTER_TYPE, 0, 1, 1]);

    if geographic {
        keys.extend_from_slice(&[KEY_GEOGRAPHIC_TYPE, 0, 1, crs.0]);
    } else {
        keys.extend_from_slice(&[KEY_PROJECTED_CS_TYPE, 0, 1, crs.0]);
    }

    keys
}
