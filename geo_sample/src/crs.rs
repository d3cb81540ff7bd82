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
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::SamplingError;

/// An EPSG-code spatial reference tag.
///
/// Resolution goes through the crs-definitions database, so only codes known
/// there are usable; everything else is an `UnsupportedCrs` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs(pub u16);

impl Crs {
    pub const WGS84: Crs = Crs(4326);

    /// PROJ4 string for this code, if the code is known.
    pub fn proj_string(&self) -> Result<&'static str, SamplingError> {
        crs_definitions::from_code(self.0)
            .map(|def| def.proj4)
            .ok_or_else(|| SamplingError::UnsupportedCrs(self.to_string()))
    }

    /// Geographic (lon/lat degree) systems need a radians conversion around
    /// proj4rs transforms.
    pub fn is_geographic(&self) -> bool {
        match self.proj_string() {
            Ok(p) => p.contains("+proj=longlat"),
            Err(_) => self.0 == 4326,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl FromStr for Crs {
    type Err = SamplingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s
            .trim()
            .strip_prefix("EPSG:")
            .or_else(|| s.trim().strip_prefix("epsg:"))
            .unwrap_or_else(|| s.trim());

        let crs = code
            .parse::<u16>()
            .map(Crs)
            .map_err(|_| SamplingError::UnsupportedCrs(s.to_string()))?;

        //Reject codes the projection database cannot resolve right away
        crs.proj_string()?;

        Ok(crs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("EPSG:4326".parse::<Crs>().unwrap(), Crs::WGS84);
        assert_eq!("32632".parse::<Crs>().unwrap(), Crs(32632));

        assert!("EPSG:99".parse::<Crs>().is_err());
        assert!("utm32n".parse::<Crs>().is_err());
    }

    #[test]
    fn test_geographic() {
        assert!(Crs::WGS84.is_geographic());
        assert!(!Crs(32632).is_geographic());
        assert!(!Crs(3857).is_geographic());
    }
}
