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
use std::path::PathBuf;

use anyhow::Result;
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;
use structopt::StructOpt;

use geo_sample::assemble::{assemble_features, AssembleConfig};
use geo_sample::points::PointSetConfig;
use geo_sample::Crs;

/// Links ground truth points to raster features: scalar samples from
/// auxiliary rasters plus 3x3 pixel neighborhoods from every discovered
/// mosaic band, written as one flat CSV.

#[derive(StructOpt)]
struct Cli {
    #[structopt(parse(from_os_str), long, help = "Ground truth CSV with point coordinates")]
    ground_truth: PathBuf,

    #[structopt(
        parse(from_os_str),
        long,
        help = "Directory of auxiliary single band rasters (optional)"
    )]
    scalar_dir: Option<PathBuf>,

    #[structopt(parse(from_os_str), long, help = "Imagery directory with the band mosaic")]
    imagery_dir: PathBuf,

    #[structopt(parse(from_os_str), long, help = "Path to CSV results")]
    out_csv: PathBuf,

    #[structopt(long, default_value = "TH_LONG", help = "Longitude column name")]
    lon_column: String,

    #[structopt(long, default_value = "TH_LAT", help = "Latitude column name")]
    lat_column: String,

    #[structopt(long, default_value = "EPSG:4326", help = "CRS of the point coordinates")]
    point_crs: Crs,

    #[structopt(long, default_value = "Info")]
    log_level: LevelFilter,
}

fn main() {
    let args = Cli::from_args();
    run(&args).unwrap();
}

fn run(args: &Cli) -> Result<()> {
    SimpleLogger::new().with_level(args.log_level).init()?;

    let config = AssembleConfig {
        ground_truth_csv: args.ground_truth.clone(),
        scalar_raster_dir: args.scalar_dir.clone(),
        imagery_dir: args.imagery_dir.clone(),
        point_columns: PointSetConfig {
            lon_column: args.lon_column.clone(),
            lat_column: args.lat_column.clone(),
            crs: args.point_crs,
        },
    };

    let table = assemble_features(&config)?;
    table.write_csv(&args.out_csv)?;

    info!("Feature table written to {:?}", args.out_csv);

    Ok(())
}

#[cfg(test)]
mod raster_features_test {
    use super::*;
    use geo_sample::raster::{create_test_raster_with_path, get_temp_filename, RasterGrid};
    use std::fs::{create_dir_all, read_to_string, write};

    #[test]
    fn test_run_writes_feature_csv() {
        let root = get_temp_filename("bin_test");
        create_dir_all(&root).unwrap();

        let ground_truth = root.join("points.csv");
        write(
            &ground_truth,
            "site,TH_LAT,TH_LONG\na,45.0005,6.0005\nb,44.9985,6.0015\n",
        )
        .unwrap();

        //single band mosaic already in the point CRS
        let imagery_dir = root.join("imagery");
        create_dir_all(&imagery_dir).unwrap();

        let grid = RasterGrid {
            origin_x: 6.0,
            origin_y: 45.001,
            pixel_width: 0.001,
            pixel_height: -0.001,
            num_rows: 5,
            num_cols: 5,
            no_data_value: None,
            epsg: Some(Crs::WGS84),
        };
        create_test_raster_with_path(
            &imagery_dir.join("T31TGM_20230801T104031_B04_10m.tif"),
            &grid,
            &(0..25).map(|v| v as f64).collect::<Vec<_>>(),
        )
        .unwrap();

        let args = Cli {
            ground_truth,
            scalar_dir: None,
            imagery_dir,
            out_csv: root.join("features.csv"),
            lon_column: "TH_LONG".to_string(),
            lat_column: "TH_LAT".to_string(),
            point_crs: Crs::WGS84,
            log_level: LevelFilter::Warn,
        };

        run(&args).unwrap();

        let written = read_to_string(&args.out_csv).unwrap();
        let lines: Vec<&str> = written.lines().collect();

        //header plus one row per point
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "point_index,B04_1,B04_2,B04_3,B04_4,B04_5,B04_6,B04_7,B04_8,B04_9");

        //point a sits in cell (0, 0); its window crosses the top edge
        assert_eq!(lines[1], "0,,,,,,,,,");

        //point b sits in cell (2, 1), full window available
        assert_eq!(lines[2], "1,5,6,7,10,11,12,15,16,17");
    }
}
