//! Zarr V3 reader for data cubes.

use std::path::Path;
use std::sync::Arc;

use projection::{CubeWcs, WcsHeader};
use tracing::{debug, info};
use zarrs::array::Array;
use zarrs::array_subset::ArraySubset;
use zarrs::group::Group;
use zarrs_filesystem::FilesystemStore;
use zarrs_storage::ReadableStorageTraits;

use super::{FLUX_ARRAY, PIXEL_EXPTIME_ARRAY, VARIANCE_ARRAY, WCS_ATTRIBUTE};
use crate::cube::{Cube, CubeInfo};
use crate::error::{CubingError, Result};

/// Read a cube written by [`super::write_cube`]. All arrays are loaded eagerly.
pub(crate) fn read_cube(path: &Path) -> Result<Cube> {
    if !path.is_dir() {
        return Err(CubingError::storage(format!(
            "no cube store at {}",
            path.display()
        )));
    }
    let store = Arc::new(FilesystemStore::new(path).map_err(CubingError::storage)?);

    let group = Group::open(store.clone(), "/").map_err(CubingError::zarr)?;
    let mut info: CubeInfo =
        serde_json::from_value(serde_json::Value::Object(group.attributes().clone()))?;

    let flux = Array::open(store.clone(), FLUX_ARRAY).map_err(CubingError::zarr)?;
    let wcs = extract_wcs(&flux)?;
    let expected = wcs.shape.as_array().map(|n| n as u64);
    if flux.shape() != expected.as_slice() {
        return Err(CubingError::invalid_metadata(format!(
            "FLUX array has shape {:?} but its WCS describes {:?}",
            flux.shape(),
            expected
        )));
    }
    let intensity = read_all(&flux)?;

    let variance_array = Array::open(store.clone(), VARIANCE_ARRAY).map_err(CubingError::zarr)?;
    if variance_array.shape() != expected.as_slice() {
        return Err(CubingError::invalid_metadata(format!(
            "VARIANCE array has shape {:?}, expected {:?}",
            variance_array.shape(),
            expected
        )));
    }
    let variance = read_all(&variance_array)?;

    match Array::open(store, PIXEL_EXPTIME_ARRAY) {
        Ok(array) => info.pixel_exptime = read_all(&array)?,
        Err(e) => debug!(error = %e, "No pixel exposure time map stored"),
    }

    info!(
        cube = %info.name,
        path = %path.display(),
        shape = ?wcs.shape.as_array(),
        "Cube loaded"
    );

    Cube::new(intensity, variance, wcs, info)
}

/// Rebuild the cube WCS from an array's `wcs` attribute.
fn extract_wcs<S: ReadableStorageTraits + ?Sized>(array: &Array<S>) -> Result<CubeWcs> {
    let value = array
        .attributes()
        .get(WCS_ATTRIBUTE)
        .ok_or_else(|| CubingError::invalid_metadata("array has no wcs attribute"))?;
    let header: WcsHeader = serde_json::from_value(value.clone())?;
    Ok(CubeWcs::from_header(&header)?)
}

/// Retrieve every element of an array.
fn read_all<S: ReadableStorageTraits + ?Sized + 'static>(array: &Array<S>) -> Result<Vec<f64>> {
    let subset = ArraySubset::new_with_shape(array.shape().to_vec());
    array
        .retrieve_array_subset_elements::<f64>(&subset)
        .map_err(CubingError::storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CubingConfig, ZarrCompression};
    use crate::cube::CorrectionStatus;
    use ifs_common::{SkyCoord, ARCSEC_PER_DEG};
    use projection::{build_wcs, WcsParams};

    fn small_cube() -> Cube {
        let wcs = build_wcs(&WcsParams {
            n_wavelength: 4,
            n_rows: 3,
            n_cols: 5,
            wavelength_start: 4000.0,
            wavelength_step: 2.0,
            center: SkyCoord::new(10.0, -30.0),
            spatial_pixel_size_deg: 1.0 / ARCSEC_PER_DEG,
        })
        .unwrap();
        let n = wcs.shape.len();
        let mut intensity: Vec<f64> = (0..n).map(|i| i as f64 * 0.5).collect();
        intensity[7] = f64::NAN;
        let mut info = CubeInfo::new("small").with_extra("OBJECT", "NGC 253");
        info.kernel_size_arcsec = 1.5;
        info.pixel_exptime = vec![120.0; n];
        info.record_correction(
            "flux_calibration",
            CorrectionStatus::Applied,
            Some("standard star HD 49798".to_string()),
        );
        Cube::new(intensity, vec![0.25; n], wcs, info).unwrap()
    }

    #[test]
    fn test_roundtrip_uncompressed() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("cube.zarr");
        let config = CubingConfig {
            zarr_compression: ZarrCompression::None,
            zarr_chunk_spatial: 2,
            zarr_chunk_spectral: 3,
            ..Default::default()
        };

        let cube = small_cube();
        let n = cube.shape().len();
        cube.save_zarr(&path, &config).expect("Failed to write");
        let loaded = Cube::load_zarr(&path).expect("Failed to read");

        assert_eq!(loaded.shape(), cube.shape());
        assert_eq!(loaded.wavelength(), cube.wavelength());
        assert!(loaded.intensity()[7].is_nan());
        assert_eq!(loaded.intensity()[8], 4.0);
        assert_eq!(loaded.variance(), cube.variance());
        assert_eq!(loaded.info().name, "small");
        assert_eq!(loaded.info().kernel_size_arcsec, 1.5);
        assert!(loaded.info().pixel_size_arcsec.is_nan());
        assert_eq!(loaded.info().pixel_exptime, vec![120.0; n]);
        assert_eq!(loaded.info().extra["OBJECT"], "NGC 253");
        assert!(loaded.is_corrected("flux_calibration"));
        assert_eq!(loaded.info().corrections, cube.info().corrections);
    }

    #[test]
    fn test_missing_store() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let err = Cube::load_zarr(temp_dir.path().join("absent.zarr"));
        assert!(matches!(err, Err(CubingError::Storage(_))));
    }
}
