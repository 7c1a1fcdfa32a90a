//! Capability interface shared by RSS exposures and data cubes.

use crate::exposure::Exposure;
use crate::footprint::SkyFootprint;
use crate::photometry::{Passband, Photometry};
use crate::sky::SkyCoord;

/// Operations that ancillary-data steps (astrometry, photometric matching)
/// need from any reduced data product, whether fibre-based or gridded.
pub trait DataContainer {
    /// Human-readable identifier.
    fn name(&self) -> &str;

    /// Sky area covered by the container.
    fn sky_footprint(&self) -> Option<SkyFootprint>;

    /// Sky position of every spatial element (fibre or pixel centre).
    fn spatial_coordinates(&self) -> Vec<SkyCoord>;

    /// Passband-averaged flux of every spatial element, in the same order
    /// as [`DataContainer::spatial_coordinates`].
    fn synthetic_photometry(&self, passband: &Passband) -> Vec<Photometry>;
}

impl DataContainer for Exposure {
    fn name(&self) -> &str {
        &self.name
    }

    fn sky_footprint(&self) -> Option<SkyFootprint> {
        SkyFootprint::from_coords(&self.fibres)
    }

    fn spatial_coordinates(&self) -> Vec<SkyCoord> {
        self.fibres.clone()
    }

    fn synthetic_photometry(&self, passband: &Passband) -> Vec<Photometry> {
        let response = passband.resample(&self.wavelength);
        (0..self.n_fibres())
            .map(|fibre| {
                Passband::synthetic_flux(
                    &response,
                    &self.wavelength,
                    self.fibre_intensity(fibre),
                    self.fibre_variance(fibre),
                )
            })
            .collect()
    }
}

/// Centre and (RA, Dec) size in degrees of the rectangle that encloses
/// every container's footprint.
pub fn combined_footprint(containers: &[&dyn DataContainer]) -> Option<(SkyCoord, (f64, f64))> {
    let footprints: Vec<SkyFootprint> = containers
        .iter()
        .filter_map(|dc| {
            let footprint = dc.sky_footprint();
            if footprint.is_none() {
                tracing::warn!(container = dc.name(), "Container has no finite sky footprint");
            }
            footprint
        })
        .collect();

    let combined = SkyFootprint::enclosing(&footprints)?;
    tracing::debug!(
        containers = footprints.len(),
        size_arcmin = ?(combined.size().0 * 60.0, combined.size().1 * 60.0),
        "Combined footprint"
    );
    Some((combined.center(), combined.size()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exposure(name: &str, ra0: f64) -> Exposure {
        Exposure::new(
            name,
            100.0,
            vec![5000.0, 5010.0],
            vec![SkyCoord::new(ra0, 0.0), SkyCoord::new(ra0 + 0.01, 0.02)],
            vec![1.0, 1.0, 2.0, f64::NAN],
            vec![0.1, 0.1, 0.1, 0.1],
        )
        .unwrap()
    }

    #[test]
    fn test_exposure_footprint() {
        let exp = exposure("a", 10.0);
        let fp = exp.sky_footprint().unwrap();
        let (min_ra, min_dec, max_ra, max_dec) = fp.bounds();
        assert_eq!((min_ra, min_dec), (10.0, 0.0));
        assert!((max_ra - 10.01).abs() < 1e-12);
        assert!((max_dec - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_exposure_photometry_per_fibre() {
        let exp = exposure("a", 10.0);
        let band = Passband::top_hat("all", 4000.0, 6000.0).unwrap();
        let phot = exp.synthetic_photometry(&band);
        assert_eq!(phot.len(), 2);
        assert!((phot[0].flux - 1.0).abs() < 1e-12);
        // Second fibre keeps only its finite channel.
        assert!((phot[1].flux - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_combined_footprint() {
        let a = exposure("a", 10.0);
        let b = exposure("b", 10.05);
        let (center, (w, h)) = combined_footprint(&[&a, &b]).unwrap();
        assert!((center.ra - 10.03).abs() < 1e-9);
        assert!((w - 0.06).abs() < 1e-9);
        assert!((h - 0.02).abs() < 1e-9);
    }
}
