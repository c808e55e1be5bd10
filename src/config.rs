use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Rectangle zeroed out before comparison, in pixel coordinates of the
/// resized frame. Half-open: `left..right`, `top..bottom`.
#[derive(Deserialize, Debug, Clone, Copy)]
pub struct MaskRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

/// Per-camera filtering parameters, immutable for one camera's run.
#[derive(Deserialize, Debug, Clone)]
pub struct CameraParams {
    /// Gaussian sigmas applied in order; empty means no blur.
    #[serde(default)]
    pub gaussian_blur_radius_list: Vec<f32>,
    /// Region ignored during comparison (e.g. a burned-in timestamp overlay).
    #[serde(default)]
    pub black_mask: Option<MaskRect>,
    /// Changed regions smaller than this many pixels do not count.
    pub min_contour_area: f64,
    /// Score at or below this marks a frame as a near-duplicate.
    pub thresh: f64,
}

/// Camera id → parameters, loaded from a JSON file.
pub type ParamsMap = HashMap<String, CameraParams>;

pub fn load_params(path: &Path) -> Result<ParamsMap> {
    let f = File::open(path)
        .with_context(|| format!("Could not open params file {:?}", path))?;
    let params: ParamsMap = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("Failed to parse params file {:?}", path))?;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_params() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("params.json");
        fs::write(
            &path,
            r#"{
                "c10": {
                    "gaussian_blur_radius_list": [3.0, 5.0],
                    "black_mask": { "left": 0, "top": 420, "right": 640, "bottom": 480 },
                    "min_contour_area": 500.0,
                    "thresh": 2500.0
                },
                "c21": {
                    "min_contour_area": 100.0,
                    "thresh": 1000.0
                }
            }"#,
        )
        .unwrap();

        let params = load_params(&path).unwrap();
        assert_eq!(params.len(), 2);

        let c10 = &params["c10"];
        assert_eq!(c10.gaussian_blur_radius_list, vec![3.0, 5.0]);
        let mask = c10.black_mask.unwrap();
        assert_eq!((mask.left, mask.top, mask.right, mask.bottom), (0, 420, 640, 480));
        assert_eq!(c10.thresh, 2500.0);

        // Blur and mask are optional
        let c21 = &params["c21"];
        assert!(c21.gaussian_blur_radius_list.is_empty());
        assert!(c21.black_mask.is_none());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_params(&temp_dir.path().join("nope.json")).is_err());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("params.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(load_params(&path).is_err());
    }
}
