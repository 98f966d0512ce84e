use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, VtonError};

/// A Gradio Space and the operation called on it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelEndpoint {
    pub space: String,
    pub api: String,
}

/// Fixed knobs of the refinement call.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RefineParams {
    pub auto_mask: bool,
    pub auto_crop: bool,
    pub denoise_steps: u32,
    pub seed: i64,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            auto_mask: true,
            auto_crop: false,
            denoise_steps: 30,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding `person_images/` and `garment_images/`.
    pub catalog_root: PathBuf,
    pub results_dir: PathBuf,
    /// Where files returned by the Spaces are downloaded before copying.
    pub download_dir: PathBuf,
    pub coarse: ModelEndpoint,
    pub refine: ModelEndpoint,
    pub refine_params: RefineParams,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog_root: PathBuf::from("."),
            results_dir: PathBuf::from("results"),
            download_dir: std::env::temp_dir().join("vton"),
            coarse: ModelEndpoint {
                space: "blackmamba2408/virtual-try-on".to_string(),
                api: "/virtual_tryon".to_string(),
            },
            refine: ModelEndpoint {
                space: "blackmamba2408/IDM-VTON".to_string(),
                api: "/tryon".to_string(),
            },
            refine_params: RefineParams::default(),
        }
    }
}

impl Settings {
    pub const DEFAULT_PATH: &'static str = "vton.json";

    /// Loads `path`, or `vton.json` when no path is given. Only the default
    /// file may be absent; missing fields take their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(Self::DEFAULT_PATH), false),
        };

        if !explicit && !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let settings = serde_json::from_str(&content)
            .map_err(|source| VtonError::Settings {
                path: path.clone(),
                source,
            })?;
        tracing::info!("Loaded settings from {}", path.display());

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vton.json");
        std::fs::write(
            &path,
            r#"{ "results_dir": "out", "refine_params": { "seed": 7 } }"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.results_dir, PathBuf::from("out"));
        assert_eq!(settings.refine_params.seed, 7);
        assert_eq!(settings.refine_params.denoise_steps, 30);
        assert!(settings.refine_params.auto_mask);
        assert_eq!(settings.refine.api, "/tryon");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, VtonError::Io(_)));
    }

    #[test]
    fn malformed_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vton.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Settings::load(Some(&path)).unwrap_err();
        assert!(matches!(err, VtonError::Settings { .. }));
        assert!(err.to_string().contains("vton.json"));
    }
}
