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

use thiserror::Error;

/// Run-fatal failures of the sampling engine.
///
/// Anything survivable per point (a coordinate outside a raster, a window
/// crossing the raster edge) never surfaces here; those degrade to NaN cells.
#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("imagery directory yielded no raster files: {dir:?}")]
    CatalogDirectoryNotFound { dir: PathBuf },

    #[error("no usable band files discovered under {dir:?}")]
    NoBandsFound { dir: PathBuf },

    #[error("unsupported CRS '{0}'")]
    UnsupportedCrs(String),

    #[error("no band file declares a CRS, cannot establish a reprojection target")]
    TargetCrsUnavailable,

    #[error("ground truth file {path:?} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("failed to read ground truth file {path:?}: {reason}")]
    GroundTruthRead { path: PathBuf, reason: String },

    #[error("failed to read raster {path:?}: {reason}")]
    RasterRead { path: PathBuf, reason: String },
}
