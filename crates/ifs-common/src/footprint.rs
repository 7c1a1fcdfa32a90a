//! Sky footprints of data containers.

use serde::{Deserialize, Serialize};

use crate::sky::SkyCoord;

/// The four corners of the sky area covered by a data container.
///
/// Corners are stored as `[(max_ra, max_dec), (max_ra, min_dec), (min_ra, max_dec), (min_ra, min_dec)]`
/// for rectangles built from coordinate extrema; projected grids store their actual corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyFootprint {
    pub corners: [SkyCoord; 4],
}

impl SkyFootprint {
    /// Create a footprint from explicit corners.
    pub fn new(corners: [SkyCoord; 4]) -> Self {
        Self { corners }
    }

    /// Smallest RA/Dec rectangle containing all finite coordinates.
    ///
    /// Returns `None` if no coordinate is finite.
    pub fn from_coords<'a>(coords: impl IntoIterator<Item = &'a SkyCoord>) -> Option<Self> {
        let mut min_ra = f64::INFINITY;
        let mut max_ra = f64::NEG_INFINITY;
        let mut min_dec = f64::INFINITY;
        let mut max_dec = f64::NEG_INFINITY;
        let mut any = false;

        for c in coords.into_iter().filter(|c| c.is_finite()) {
            any = true;
            min_ra = min_ra.min(c.ra);
            max_ra = max_ra.max(c.ra);
            min_dec = min_dec.min(c.dec);
            max_dec = max_dec.max(c.dec);
        }

        if !any {
            return None;
        }

        Some(Self::new([
            SkyCoord::new(max_ra, max_dec),
            SkyCoord::new(max_ra, min_dec),
            SkyCoord::new(min_ra, max_dec),
            SkyCoord::new(min_ra, min_dec),
        ]))
    }

    /// Rectangle enclosing several footprints.
    pub fn enclosing(footprints: &[SkyFootprint]) -> Option<Self> {
        Self::from_coords(footprints.iter().flat_map(|f| f.corners.iter()))
    }

    /// (min_ra, min_dec, max_ra, max_dec) in degrees.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let ras = self.corners.iter().map(|c| c.ra);
        let decs = self.corners.iter().map(|c| c.dec);
        (
            ras.clone().fold(f64::INFINITY, f64::min),
            decs.clone().fold(f64::INFINITY, f64::min),
            ras.fold(f64::NEG_INFINITY, f64::max),
            decs.fold(f64::NEG_INFINITY, f64::max),
        )
    }

    /// Centre of the bounding rectangle.
    pub fn center(&self) -> SkyCoord {
        let (min_ra, min_dec, max_ra, max_dec) = self.bounds();
        SkyCoord::new((min_ra + max_ra) / 2.0, (min_dec + max_dec) / 2.0)
    }

    /// (RA width, Dec height) of the bounding rectangle in degrees.
    pub fn size(&self) -> (f64, f64) {
        let (min_ra, min_dec, max_ra, max_dec) = self.bounds();
        (max_ra - min_ra, max_dec - min_dec)
    }

    /// Check if a position falls inside the bounding rectangle.
    pub fn contains(&self, coord: &SkyCoord) -> bool {
        let (min_ra, min_dec, max_ra, max_dec) = self.bounds();
        coord.ra >= min_ra && coord.ra <= max_ra && coord.dec >= min_dec && coord.dec <= max_dec
    }
}
