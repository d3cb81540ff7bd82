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
use std::path::{Path, PathBuf};

use anyhow::Result;
use itertools::Itertools;
use log::{info, warn};
use rayon::prelude::*;

use crate::catalog::BandCatalog;
use crate::errors::SamplingError;
use crate::points::{load_ground_truth, PointSetConfig};
use crate::proj::ProjectedPointCache;
use crate::raster::{Raster, RasterGrid};
use crate::sample::{sample_neighborhoods, sample_scalars, PATCH_LEN};
use crate::table::{FeatureTable, FeatureTableBuilder};

pub struct AssembleConfig {
    pub ground_truth_csv: PathBuf,
    /// Directory of auxiliary single band rasters, one feature per file.
    /// None or missing skips the stage with a warning.
    pub scalar_raster_dir: Option<PathBuf>,
    /// Root of the band mosaic, possibly nested under resolution sub-paths.
    pub imagery_dir: PathBuf,
    pub point_columns: PointSetConfig,
}

/// Drives the end-to-end feature assembly: ground truth points, scalar
/// raster samples, per-band 3x3 neighborhoods, derived indices.
///
/// The result always has exactly one row per ground truth point; data gaps
/// are NaN cells, never dropped rows.
pub fn assemble_features(config: &AssembleConfig) -> Result<FeatureTable> {
    let ground_truth = load_ground_truth(&config.ground_truth_csv, &config.point_columns)?;
    if ground_truth.is_empty() {
        warn!("Ground truth table {:?} has no rows", config.ground_truth_csv);
    }

    let num_points = ground_truth.len();
    let mut point_cache = ProjectedPointCache::new(ground_truth.crs, ground_truth.coords);
    let mut builder = FeatureTableBuilder::new(num_points);

    //Auxiliary scalar rasters, e.g. crop yield layers
    if let Some(dir) = &config.scalar_raster_dir {
        for path in scalar_sources(dir) {
            let raster = Raster::open(&path)?;

            let coords = match raster.grid.epsg {
                Some(crs) => point_cache.get(crs)?,
                //no declared CRS, assume the file is aligned with the points
                None => point_cache.source_coords(),
            };

            let samples = sample_scalars(&raster, coords);

            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "scalar".to_string());

            info!("Sampled scalar feature {} from {:?}", name, path);
            builder.add_column(name, samples);
        }
    }

    //Band mosaic neighborhoods
    let catalog = BandCatalog::discover(&config.imagery_dir)?;
    info!(
        "Discovered {} bands under {:?} ({} files pruned)",
        catalog.bands.len(),
        config.imagery_dir,
        catalog.skipped.len()
    );

    //All bands of one mosaic share a CRS by construction; the first band
    //establishes the reprojection target for the whole run
    let target_crs = RasterGrid::from_tiff(&catalog.bands[0].path)?
        .epsg
        .ok_or(SamplingError::TargetCrsUnavailable)?;
    let projected = point_cache.get(target_crs)?;

    //Bands are independent given the shared read-only point set, and each
    //one writes a disjoint column set
    let band_patches: Vec<(String, Vec<[f64; PATCH_LEN]>)> = catalog
        .bands
        .par_iter()
        .map(|band| -> Result<(String, Vec<[f64; PATCH_LEN]>)> {
            let raster = Raster::open(&band.path)?;

            if raster.grid.epsg != Some(target_crs) {
                warn!(
                    "Band {} declares {:?}, expected {}; sampling with the shared point set",
                    band.band_id, raster.grid.epsg, target_crs
                );
            }

            Ok((band.band_id.clone(), sample_neighborhoods(&raster, projected)))
        })
        .collect::<Result<Vec<_>>>()?;

    for (band_id, patches) in band_patches {
        for cell in 0..PATCH_LEN {
            let values = patches.iter().map(|patch| patch[cell]).collect();
            builder.add_column(format!("{}_{}", band_id, cell + 1), values);
        }
    }

    let mut table = builder.finish();
    table.add_derived_indices();
    table.clip_non_finite();

    info!(
        "Assembled {} rows x {} feature columns",
        table.num_rows(),
        table.num_columns()
    );

    Ok(table)
}

/// The scalar rasters directly inside a directory, sorted by file name.
fn scalar_sources(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Scalar raster directory {:?} not readable ({}), skipping", dir, e);
            return Vec::new();
        }
    };

    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map(|ext| {
                        let ext = ext.to_string_lossy().to_lowercase();
                        ext == "tif" || ext == "tiff"
                    })
                    .unwrap_or(false)
        })
        .sorted()
        .collect_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Crs;
    use crate::proj::project_points;
    use crate::raster::{create_test_raster_with_path, get_temp_filename, RasterGrid};
    use std::fs::{create_dir_all, write, File};

    const UTM_32N: Crs = Crs(32632);

    /// 3 points, 2 bands, 1 scalar raster; the third point is far outside
    /// both rasters.
    fn build_scenario() -> AssembleConfig {
        let root = get_temp_filename("assemble");
        create_dir_all(&root).unwrap();

        let ground_truth_csv = root.join("lucas.csv");
        write(
            &ground_truth_csv,
            "POINTID,TH_LAT,TH_LONG,N\n\
             1001,45.0,9.0,1.2\n\
             1002,45.0002,9.0004,0.8\n\
             1003,47.0,12.0,2.0\n",
        )
        .unwrap();

        //anchor the mosaic grid on the projected first point
        let utm = project_points(Crs::WGS84, UTM_32N, &[(9.0, 45.0)]).unwrap();
        let (easting, northing) = utm[0];

        let band_grid = RasterGrid {
            origin_x: easting - 45.0,
            origin_y: northing + 45.0,
            pixel_width: 10.0,
            pixel_height: -10.0,
            num_rows: 9,
            num_cols: 9,
            no_data_value: None,
            epsg: Some(UTM_32N),
        };

        let imagery = root.join("imagery");
        let r10 = imagery.join("R10m");
        let r20 = imagery.join("R20m");
        create_dir_all(&r10).unwrap();
        create_dir_all(&r20).unwrap();

        create_test_raster_with_path(
            &r10.join("T32TNS_20230801T101031_B04_10m.tif"),
            &band_grid,
            &vec![30.0; 81],
        )
        .unwrap();
        create_test_raster_with_path(
            &r10.join("T32TNS_20230801T101031_B08_10m.tif"),
            &band_grid,
            &vec![50.0; 81],
        )
        .unwrap();

        //pruned before anything tries to decode them
        File::create(r10.join("T32TNS_20230801T101031_TCI_10m.tif")).unwrap();
        File::create(r20.join("T32TNS_20230801T101031_B04_20m.tif")).unwrap();

        //scalar yield raster in the ground truth CRS
        let scalar_dir = root.join("yield");
        create_dir_all(&scalar_dir).unwrap();

        let yield_grid = RasterGrid {
            origin_x: 8.998,
            origin_y: 45.002,
            pixel_width: 0.001,
            pixel_height: -0.001,
            num_rows: 4,
            num_cols: 4,
            no_data_value: None,
            epsg: Some(Crs::WGS84),
        };
        create_test_raster_with_path(
            &scalar_dir.join("yld_wheat.tif"),
            &yield_grid,
            &vec![7.0; 16],
        )
        .unwrap();

        AssembleConfig {
            ground_truth_csv,
            scalar_raster_dir: Some(scalar_dir),
            imagery_dir: imagery,
            point_columns: PointSetConfig::default(),
        }
    }

    #[test]
    fn test_end_to_end() {
        let config = build_scenario();
        let table = assemble_features(&config).unwrap();

        //every input point keeps its row
        assert_eq!(table.num_rows(), 3);

        //1 scalar + 2 bands x 9 cells + NDVI (NDRE omitted, no B05)
        assert_eq!(table.num_columns(), 20);

        let names = table.column_names();
        assert!(names.contains(&"yld_wheat"));
        assert!(names.contains(&"B04_1"));
        assert!(names.contains(&"B04_9"));
        assert!(names.contains(&"B08_5"));
        assert!(names.contains(&"NDVI"));
        assert!(!names.contains(&"NDRE"));

        let yld = table.column("yld_wheat").unwrap();
        assert_eq!(yld[0], 7.0);
        assert_eq!(yld[1], 7.0);
        assert!(yld[2].is_nan());

        let b04_center = table.column("B04_5").unwrap();
        assert_eq!(b04_center[0], 30.0);
        assert_eq!(b04_center[1], 30.0);
        assert!(b04_center[2].is_nan());

        //NDVI = (50 - 30) / (50 + 30)
        let ndvi = table.column("NDVI").unwrap();
        assert_eq!(ndvi[0], 0.25);
        assert_eq!(ndvi[1], 0.25);
        assert!(ndvi[2].is_nan());

        //finite NDVI stays within [-1, 1] for reflectance-like inputs
        for v in ndvi.iter().filter(|v| v.is_finite()) {
            assert!(*v >= -1.0 && *v <= 1.0);
        }

        //the out of bounds point is NaN across every band cell
        for name in names.iter().filter(|n| n.starts_with('B')) {
            let column = table.column(name).unwrap();
            assert!(column[2].is_nan(), "column {} row 2 should be NaN", name);
        }
    }

    #[test]
    fn test_missing_imagery_dir_is_fatal() {
        let mut config = build_scenario();
        config.imagery_dir = get_temp_filename("no_imagery");

        let err = assemble_features(&config).unwrap_err();
        match err.downcast_ref::<SamplingError>() {
            Some(SamplingError::CatalogDirectoryNotFound { .. }) => {}
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_scalar_dir_is_skipped() {
        let mut config = build_scenario();
        config.scalar_raster_dir = Some(get_temp_filename("no_yield"));

        let table = assemble_features(&config).unwrap();
        assert_eq!(table.num_rows(), 3);
        assert!(table.column("yld_wheat").is_none());
        //band features are still there
        assert_eq!(table.num_columns(), 19);
    }
}
