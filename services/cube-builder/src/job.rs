//! YAML job files describing one cube build.
//!
//! ```yaml
//! name: NGC 253
//! output: ngc253.zarr
//! kernel_size_arcsec: 1.5
//! grid:
//!   n_wavelength: 2048
//!   n_rows: 40
//!   n_cols: 40
//!   wavelength_start: 3700.0
//!   wavelength_step: 2.0
//!   center: { ra: 11.888, dec: -25.288 }
//!   spatial_pixel_size_deg: 0.000139
//! exposures:
//!   - path: ${DATA_DIR:-data}/exp_01.json
//!     adr: ${DATA_DIR:-data}/adr_01.json
//!   - path: ${DATA_DIR:-data}/exp_02.json
//! ```
//!
//! Relative paths are resolved against the directory of the job file.
//! `${VAR}` and `${VAR:-default}` are substituted from the environment.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use cubing::{CubeInfo, CubingConfig};
use ifs_common::{AdrOffsets, Exposure};
use projection::WcsParams;
use serde::{Deserialize, Serialize};

/// One exposure to combine, with its optional ADR offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureSource {
    /// Exposure JSON file.
    pub path: PathBuf,
    /// ADR offsets JSON file.
    #[serde(default)]
    pub adr: Option<PathBuf>,
}

/// A cube build job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CubeJob {
    /// Cube name stored in the metadata.
    pub name: String,
    /// Zarr store to write.
    pub output: PathBuf,
    /// Target grid.
    pub grid: WcsParams,
    /// Kernel half-width, overriding the configured one.
    #[serde(default)]
    pub kernel_size_arcsec: Option<f64>,
    pub exposures: Vec<ExposureSource>,
    /// Replaces the environment-derived configuration when present.
    #[serde(default)]
    pub config: Option<CubingConfig>,
    /// Free-form metadata copied into the cube.
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Exposures and ADR offsets loaded from disk.
#[derive(Debug)]
pub struct LoadedInputs {
    pub exposures: Vec<Exposure>,
    pub adr: Option<Vec<Option<AdrOffsets>>>,
}

impl CubeJob {
    /// Read a job file, substituting environment variables and resolving
    /// relative paths against the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file {:?}", path))?;
        let expanded = expand_env_vars(&content)?;

        let mut job: CubeJob = serde_yaml::from_str(&expanded)
            .with_context(|| format!("Failed to parse job file {:?}", path))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        job.resolve_paths(base);
        job.validate()?;
        Ok(job)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.output);
        for source in &mut self.exposures {
            resolve(&mut source.path);
            if let Some(adr) = source.adr.as_mut() {
                resolve(adr);
            }
        }
    }

    /// Check the job before any data is read.
    pub fn validate(&self) -> Result<()> {
        if self.exposures.is_empty() {
            bail!("Job {} lists no exposures", self.name);
        }
        if let Some(size) = self.kernel_size_arcsec {
            if !(size.is_finite() && size > 0.0) {
                bail!("kernel_size_arcsec must be > 0, got {}", size);
            }
        }
        if let Some(config) = &self.config {
            config
                .validate()
                .map_err(|e| anyhow::anyhow!("Invalid cubing config: {}", e))?;
        }
        Ok(())
    }

    /// Effective configuration: the job's own, or `fallback`, with the
    /// job's kernel size applied on top.
    pub fn cubing_config(&self, fallback: CubingConfig) -> CubingConfig {
        let mut config = self.config.clone().unwrap_or(fallback);
        if let Some(size) = self.kernel_size_arcsec {
            config.kernel_size_arcsec = size;
        }
        config
    }

    /// Metadata the cube starts from.
    pub fn cube_info(&self) -> CubeInfo {
        let mut info = CubeInfo::new(&self.name);
        info.extra = self.extra.clone();
        info
    }

    /// Load every exposure and ADR file named by the job.
    ///
    /// ADR offsets are returned only when at least one exposure has them.
    pub fn load_inputs(&self) -> Result<LoadedInputs> {
        let mut exposures = Vec::with_capacity(self.exposures.len());
        let mut adr = Vec::with_capacity(self.exposures.len());

        for source in &self.exposures {
            let json = fs::read_to_string(&source.path)
                .with_context(|| format!("Failed to read exposure {:?}", source.path))?;
            let exposure = Exposure::from_json(&json)
                .with_context(|| format!("Failed to parse exposure {:?}", source.path))?;
            exposures.push(exposure);

            let offsets = match &source.adr {
                Some(adr_path) => {
                    let json = fs::read_to_string(adr_path)
                        .with_context(|| format!("Failed to read ADR offsets {:?}", adr_path))?;
                    let offsets: AdrOffsets = serde_json::from_str(&json)
                        .with_context(|| format!("Failed to parse ADR offsets {:?}", adr_path))?;
                    Some(offsets)
                }
                None => None,
            };
            adr.push(offsets);
        }

        let adr = adr.iter().any(Option::is_some).then_some(adr);
        Ok(LoadedInputs { exposures, adr })
    }
}

/// Substitute `${VAR}` and `${VAR:-default}` from the environment.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            bail!("Unclosed variable substitution: ${{{}", after);
        };
        result.push_str(&resolve_var_expr(&after[..end])?);
        rest = &after[end + 1..];
    }
    result.push_str(rest);

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubing::CubeBuilder;
    use ifs_common::SkyCoord;
    use test_utils::{linear_wavelength, uniform_exposure};

    const JOB: &str = r#"
name: test cube
output: out/cube.zarr
kernel_size_arcsec: 1.5
grid:
  n_wavelength: 3
  n_rows: 5
  n_cols: 5
  wavelength_start: 6000.0
  wavelength_step: 2.0
  center: { ra: 180.0, dec: 0.0 }
  spatial_pixel_size_deg: 0.0002777777777777778
exposures:
  - path: exp_a.json
    adr: adr_a.json
  - path: /abs/exp_b.json
extra:
  OBJECT: test
"#;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("CUBE_JOB_TEST_DIR", "/data");
        std::env::remove_var("CUBE_JOB_TEST_UNSET");
        let result = expand_env_vars("${CUBE_JOB_TEST_DIR}/a and ${CUBE_JOB_TEST_UNSET:-b}").unwrap();
        assert_eq!(result, "/data/a and b");
        assert!(expand_env_vars("${CUBE_JOB_TEST_UNSET}").is_err());
        assert!(expand_env_vars("${UNCLOSED").is_err());
    }

    #[test]
    fn test_parse_and_resolve_paths() {
        let dir = tempfile::tempdir().unwrap();
        let job_path = dir.path().join("job.yaml");
        fs::write(&job_path, JOB).unwrap();

        let job = CubeJob::load(&job_path).unwrap();
        assert_eq!(job.name, "test cube");
        assert_eq!(job.output, dir.path().join("out/cube.zarr"));
        assert_eq!(job.exposures[0].path, dir.path().join("exp_a.json"));
        assert_eq!(job.exposures[0].adr, Some(dir.path().join("adr_a.json")));
        assert_eq!(job.exposures[1].path, PathBuf::from("/abs/exp_b.json"));
        assert_eq!(job.grid.n_rows, 5);
        assert_eq!(job.cube_info().extra.get("OBJECT"), Some(&serde_json::json!("test")));
    }

    #[test]
    fn test_kernel_size_overrides_config() {
        let job: CubeJob = serde_yaml::from_str(JOB).unwrap();
        let config = job.cubing_config(CubingConfig::default());
        assert_eq!(config.kernel_size_arcsec, 1.5);
    }

    #[test]
    fn test_invalid_jobs_rejected() {
        let mut job: CubeJob = serde_yaml::from_str(JOB).unwrap();
        job.kernel_size_arcsec = Some(0.0);
        assert!(job.validate().is_err());

        job.kernel_size_arcsec = None;
        job.exposures.clear();
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_load_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let exposure = uniform_exposure(
            "exp_a",
            vec![SkyCoord::new(180.0, 0.0)],
            linear_wavelength(6000.0, 2.0, 3),
            &[1.0, 2.0, 3.0],
            &[1.0; 3],
            30.0,
        );
        fs::write(dir.path().join("exp_a.json"), serde_json::to_string(&exposure).unwrap()).unwrap();
        fs::write(dir.path().join("adr_a.json"), r#"{"ra": [0.0, 0.1, 0.2]}"#).unwrap();

        let mut job: CubeJob = serde_yaml::from_str(JOB).unwrap();
        job.exposures.truncate(1);
        job.resolve_paths(dir.path());

        let inputs = job.load_inputs().unwrap();
        assert_eq!(inputs.exposures[0].name, "exp_a");
        let adr = inputs.adr.unwrap();
        assert_eq!(adr[0].as_ref().unwrap().ra.as_deref(), Some(&[0.0, 0.1, 0.2][..]));
        assert!(adr[0].as_ref().unwrap().dec.is_none());

        job.exposures[0].adr = None;
        assert!(job.load_inputs().unwrap().adr.is_none());
    }

    #[test]
    fn test_exposure_with_missing_samples_builds() {
        let dir = tempfile::tempdir().unwrap();
        let exposure = r#"{
            "name": "gappy",
            "exposure_time": 60.0,
            "wavelength": [6000.0, 6002.0, 6004.0],
            "fibres": [{"ra": 180.0, "dec": 0.0}],
            "intensity": [10.0, null, 30.0],
            "variance": [1.0, 4.0, null]
        }"#;
        fs::write(dir.path().join("exp_a.json"), exposure).unwrap();

        let mut job: CubeJob = serde_yaml::from_str(JOB).unwrap();
        job.exposures.truncate(1);
        job.exposures[0].adr = None;
        job.resolve_paths(dir.path());

        let inputs = job.load_inputs().unwrap();
        assert!(inputs.exposures[0].intensity[1].is_nan());

        let config = job.cubing_config(CubingConfig::default());
        let cube = CubeBuilder::new(config)
            .grid(job.grid.clone())
            .info(job.cube_info())
            .build(&inputs.exposures, inputs.adr.as_deref())
            .unwrap();

        // Only the fully valid first channel receives light
        let shape = cube.shape();
        let centre = |k| shape.index(k, 2, 2);
        assert!(cube.intensity()[centre(0)].is_finite());
        assert!(!cube.intensity()[centre(1)].is_finite());
        assert!(!cube.intensity()[centre(2)].is_finite());
    }
}
