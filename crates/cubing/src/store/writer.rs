//! Zarr V3 writer for data cubes.

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::GroupBuilder;
use zarrs_filesystem::FilesystemStore;
use zarrs_storage::{ReadableStorageTraits, WritableStorageTraits};

use super::{CREATOR_ATTRIBUTE, FLUX_ARRAY, PIXEL_EXPTIME_ARRAY, VARIANCE_ARRAY, WCS_ATTRIBUTE};
use crate::config::{CubingConfig, ZarrCompression};
use crate::cube::Cube;
use crate::error::{CubingError, Result};

/// Write `cube` as a Zarr V3 group rooted at `path`.
pub(crate) fn write_cube(cube: &Cube, path: &Path, config: &CubingConfig) -> Result<()> {
    config.validate().map_err(CubingError::Config)?;
    std::fs::create_dir_all(path)?;
    let store = Arc::new(FilesystemStore::new(path).map_err(CubingError::storage)?);

    let mut group_attrs = match serde_json::to_value(cube.info())? {
        serde_json::Value::Object(map) => map,
        other => {
            return Err(CubingError::invalid_metadata(format!(
                "cube info serialised to {}, expected an object",
                other
            )))
        }
    };
    group_attrs.insert(
        CREATOR_ATTRIBUTE.to_string(),
        serde_json::json!(format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))),
    );

    let group = GroupBuilder::new()
        .attributes(group_attrs)
        .build(store.clone(), "/")
        .map_err(CubingError::zarr)?;
    group.store_metadata().map_err(CubingError::storage)?;

    let shape = cube.shape();
    let wcs = serde_json::to_value(cube.wcs().to_header())?;
    let cube_shape = vec![
        shape.n_wavelength as u64,
        shape.n_rows as u64,
        shape.n_cols as u64,
    ];
    let cube_chunks = vec![
        chunk_len(config.zarr_chunk_spectral, shape.n_wavelength),
        chunk_len(config.zarr_chunk_spatial, shape.n_rows),
        chunk_len(config.zarr_chunk_spatial, shape.n_cols),
    ];

    let mut cube_attrs = serde_json::Map::new();
    cube_attrs.insert(WCS_ATTRIBUTE.to_string(), wcs);

    write_array(
        &store,
        FLUX_ARRAY,
        cube_shape.clone(),
        cube_chunks.clone(),
        cube.intensity(),
        cube_attrs.clone(),
        config,
    )?;
    write_array(
        &store,
        VARIANCE_ARRAY,
        cube_shape.clone(),
        cube_chunks.clone(),
        cube.variance(),
        cube_attrs,
        config,
    )?;

    let mut exptime_attrs = serde_json::Map::new();
    exptime_attrs.insert("units".to_string(), serde_json::json!("s"));
    write_array(
        &store,
        PIXEL_EXPTIME_ARRAY,
        cube_shape,
        cube_chunks,
        &cube.info().pixel_exptime,
        exptime_attrs,
        config,
    )?;

    info!(
        cube = %cube.info().name,
        path = %path.display(),
        shape = ?shape.as_array(),
        compression = %config.zarr_compression,
        "Cube written"
    );

    Ok(())
}

/// Chunk length along one axis, never larger than the axis.
fn chunk_len(configured: usize, axis_len: usize) -> u64 {
    configured.min(axis_len).max(1) as u64
}

/// Create one float64 array and store its full contents.
fn write_array<S: ReadableStorageTraits + WritableStorageTraits + 'static>(
    store: &Arc<S>,
    path: &str,
    shape: Vec<u64>,
    chunks: Vec<u64>,
    data: &[f64],
    attrs: serde_json::Map<String, serde_json::Value>,
    config: &CubingConfig,
) -> Result<()> {
    let chunk_grid: zarrs::array::ChunkGrid = chunks
        .try_into()
        .map_err(|e| CubingError::Config(format!("{:?}", e)))?;

    let mut binding = ArrayBuilder::new(
        shape.clone(),
        DataType::Float64,
        chunk_grid,
        FillValue::from(f64::NAN),
    );
    let mut builder = binding.attributes(attrs);

    if config.zarr_compression != ZarrCompression::None {
        let codec = create_compression_codec(config)?;
        builder = builder.bytes_to_bytes_codecs(vec![codec]);
    }

    let array = builder
        .build(store.clone(), path)
        .map_err(CubingError::storage)?;
    array.store_metadata().map_err(CubingError::storage)?;

    let subset =
        ArraySubset::new_with_start_shape(vec![0; shape.len()], shape).map_err(CubingError::storage)?;
    array
        .store_array_subset_elements(&subset, data)
        .map_err(CubingError::storage)?;

    Ok(())
}

/// Create the compression codec based on configuration.
fn create_compression_codec(
    config: &CubingConfig,
) -> Result<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>> {
    let level = BloscCompressionLevel::try_from(config.zarr_compression_level)
        .map_err(|_| CubingError::config("invalid compression level"))?;

    let compressor = match config.zarr_compression {
        ZarrCompression::None => {
            return Err(CubingError::config("no compression configured"));
        }
        ZarrCompression::BloscLz4 => BloscCompressor::LZ4,
        ZarrCompression::BloscZstd => BloscCompressor::Zstd,
    };

    // typesize is required with shuffle; f64 = 8 bytes
    let codec = BloscCodec::new(compressor, level, None, BloscShuffleMode::Shuffle, Some(8))
        .map_err(|e| CubingError::Config(e.to_string()))?;

    Ok(Arc::new(codec))
}
