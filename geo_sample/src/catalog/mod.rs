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
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::{debug, warn};
use regex::Regex;
use walkdir::WalkDir;

use crate::errors::SamplingError;

pub const RASTER_EXTENSIONS: [&str; 2] = ["tif", "tiff"];

/// Resolution sub-paths checked under the imagery root, in preference order.
/// When none exist the root itself is walked.
pub const RESOLUTION_SUBDIRS: [&str; 3] = ["R10m", "R20m", "R60m"];

/// Non-spectral auxiliary products that must never be sampled as bands:
/// aerosol optical thickness, true color composite, water vapor and the
/// scene classification layer.
pub const AUXILIARY_MARKERS: [&str; 4] = ["AOT", "TCI", "WVP", "SCL"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A usable spectral band with its identifier, e.g. "B04" or "B8A"
    Identified(String),
    /// A known auxiliary product, never a band
    Rejected(&'static str),
    /// Nothing recognizable in the file name
    Unmatched,
}

/// Ordered file name rules; first match wins.
pub struct BandClassifier {
    strict: Regex,
    fallback: Regex,
}

impl BandClassifier {
    pub fn new() -> BandClassifier {
        //both patterns are constants, they cannot fail to compile
        BandClassifier {
            strict: Regex::new(r"_(B(0[1-9]|1[0-2]|8A))_").unwrap(),
            fallback: Regex::new(r"(?i)([0-9A-Za-z]{3})\.(?:tif|tiff)$").unwrap(),
        }
    }

    pub fn classify(&self, file_name: &str) -> Classification {
        for marker in &AUXILIARY_MARKERS {
            if file_name.contains(marker) {
                return Classification::Rejected(marker);
            }
        }

        if let Some(captures) = self.strict.captures(file_name) {
            return Classification::Identified(captures[1].to_string());
        }

        if let Some(captures) = self.fallback.captures(file_name) {
            return Classification::Identified(captures[1].to_string());
        }

        Classification::Unmatched
    }
}

impl Default for BandClassifier {
    fn default() -> Self {
        BandClassifier::new()
    }
}

#[derive(Debug, Clone)]
pub struct BandFile {
    pub path: PathBuf,
    pub band_id: String,
}

/// Deduplicated, classified list of band files for one run.
#[derive(Debug, Default)]
pub struct BandCatalog {
    pub bands: Vec<BandFile>,
    /// Pruned files with the reason, diagnostic only
    pub skipped: Vec<(PathBuf, String)>,
}

impl BandCatalog {
    /// Walks the imagery root and classifies every raster file found.
    ///
    /// Duplicated band identifiers keep the first occurrence in traversal
    /// order, so a band present at several resolutions is taken from the
    /// preferred sub-path.
    pub fn discover(root: &Path) -> Result<BandCatalog, SamplingError> {
        if !root.is_dir() {
            return Err(SamplingError::CatalogDirectoryNotFound {
                dir: root.to_path_buf(),
            });
        }

        let search_dirs: Vec<PathBuf> = {
            let subdirs: Vec<PathBuf> = RESOLUTION_SUBDIRS
                .iter()
                .map(|s| root.join(s))
                .filter(|p| p.is_dir())
                .collect();

            if subdirs.is_empty() {
                vec![root.to_path_buf()]
            } else {
                subdirs
            }
        };

        let mut files = Vec::new();
        for dir in &search_dirs {
            let entries = WalkDir::new(dir)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(e) => Some(e),
                    Err(e) => {
                        warn!("Skipping unreadable entry under {:?}: {}", dir, e);
                        None
                    }
                })
                .filter(|e| e.file_type().is_file())
                .filter(|e| has_raster_extension(e.path()))
                .map(|e| e.path().to_path_buf())
                .collect_vec();

            files.extend(entries);
        }

        if files.is_empty() {
            return Err(SamplingError::CatalogDirectoryNotFound {
                dir: root.to_path_buf(),
            });
        }

        let classifier = BandClassifier::new();
        let mut catalog = BandCatalog::default();
        let mut seen: HashSet<String> = HashSet::new();

        for path in files {
            let file_name = match path.file_name() {
                Some(n) => n.to_string_lossy().to_string(),
                None => continue,
            };

            match classifier.classify(&file_name) {
                Classification::Identified(band_id) => {
                    if seen.insert(band_id.clone()) {
                        catalog.bands.push(BandFile { path, band_id });
                    } else {
                        debug!("Skipping duplicate band {} at {:?}", band_id, path);
                        catalog
                            .skipped
                            .push((path, format!("duplicate band identifier {}", band_id)));
                    }
                }
                Classification::Rejected(marker) => {
                    debug!("Skipping auxiliary product {:?} ({})", path, marker);
                    catalog
                        .skipped
                        .push((path, format!("auxiliary product {}", marker)));
                }
                Classification::Unmatched => {
                    warn!("No band identifier in file name {:?}", path);
                    catalog
                        .skipped
                        .push((path, "no band identifier".to_string()));
                }
            }
        }

        if catalog.bands.is_empty() {
            return Err(SamplingError::NoBandsFound {
                dir: root.to_path_buf(),
            });
        }

        Ok(catalog)
    }
}

fn has_raster_extension(path: &Path) -> bool {
    match path.extension() {
        None => false,
        Some(ext) => {
            let ext = ext.to_string_lossy().to_lowercase();
            RASTER_EXTENSIONS.iter().any(|e| *e == ext)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::get_temp_filename;
    use std::fs::{create_dir_all, File};

    fn touch(dir: &Path, name: &str) {
        File::create(dir.join(name)).unwrap();
    }

    #[test]
    fn test_classify() {
        let classifier = BandClassifier::new();

        assert_eq!(
            classifier.classify("T32TNS_20230801T101031_B04_10m.tif"),
            Classification::Identified("B04".to_string())
        );
        assert_eq!(
            classifier.classify("T32TNS_20230801T101031_B8A_20m.tif"),
            Classification::Identified("B8A".to_string())
        );

        //B13 is not a spectral band code, the fallback rule picks up "10m"
        //as a generic three character code instead
        assert_eq!(
            classifier.classify("T32TNS_20230801T101031_B13_10m.tif"),
            Classification::Identified("10m".to_string())
        );

        //auxiliary products are rejected even when a band pattern matches
        assert_eq!(
            classifier.classify("T32TNS_20230801T101031_TCI_10m.tif"),
            Classification::Rejected("TCI")
        );
        assert_eq!(
            classifier.classify("scene_SCL_20m.tif"),
            Classification::Rejected("SCL")
        );

        //generic fallback: three characters right before the extension
        assert_eq!(
            classifier.classify("yield_wheat_NDV.tif"),
            Classification::Identified("NDV".to_string())
        );

        assert_eq!(classifier.classify("readme.md"), Classification::Unmatched);
        assert_eq!(classifier.classify("ab.tif"), Classification::Unmatched);
    }

    #[test]
    fn test_discover_dedups_across_resolutions() {
        let root = get_temp_filename("imagery");
        let r10 = root.join("R10m");
        let r20 = root.join("R20m");
        create_dir_all(&r10).unwrap();
        create_dir_all(&r20).unwrap();

        touch(&r10, "T1_20230801T101031_B04_10m.tif");
        touch(&r10, "T1_20230801T101031_B08_10m.tif");
        touch(&r10, "T1_20230801T101031_TCI_10m.tif");
        touch(&r20, "T1_20230801T101031_B04_20m.tif");
        touch(&r20, "T1_20230801T101031_B05_20m.tif");

        let catalog = BandCatalog::discover(&root).unwrap();

        let ids = catalog
            .bands
            .iter()
            .map(|b| b.band_id.as_str())
            .collect_vec();
        assert_eq!(ids, vec!["B04", "B08", "B05"]);

        //the duplicate B04 kept the R10m occurrence
        let b04 = &catalog.bands[0];
        assert!(b04.path.starts_with(&r10));

        //two pruned files: the composite and the duplicate
        assert_eq!(catalog.skipped.len(), 2);
    }

    #[test]
    fn test_discover_flat_directory() {
        let root = get_temp_filename("imagery_flat");
        create_dir_all(&root).unwrap();

        touch(&root, "T1_20230801T101031_B02_10m.tif");
        touch(&root, "notes.txt");

        let catalog = BandCatalog::discover(&root).unwrap();
        assert_eq!(catalog.bands.len(), 1);
        assert_eq!(catalog.bands[0].band_id, "B02");
    }

    #[test]
    fn test_discover_missing_directory() {
        let root = get_temp_filename("does_not_exist");
        match BandCatalog::discover(&root) {
            Err(SamplingError::CatalogDirectoryNotFound { .. }) => {}
            other => panic!("unexpected result {:?}", other.map(|c| c.bands.len())),
        }
    }

    #[test]
    fn test_discover_no_rasters_is_fatal() {
        let root = get_temp_filename("imagery_empty");
        create_dir_all(&root).unwrap();
        touch(&root, "readme.md");

        match BandCatalog::discover(&root) {
            Err(SamplingError::CatalogDirectoryNotFound { .. }) => {}
            other => panic!("unexpected result {:?}", other.map(|c| c.bands.len())),
        }
    }

    #[test]
    fn test_discover_only_auxiliary_is_fatal() {
        let root = get_temp_filename("imagery_aux");
        create_dir_all(&root).unwrap();
        touch(&root, "T1_20230801T101031_TCI_10m.tif");

        match BandCatalog::discover(&root) {
            Err(SamplingError::NoBandsFound { .. }) => {}
            other => panic!("unexpected result {:?}", other.map(|c| c.bands.len())),
        }
    }
}
