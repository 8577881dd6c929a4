//! Combiner configuration: a JSON array of input records.
//!
//! ```json
//! [
//!   { "filename": "head.hair" },
//!   { "filename": "beard.hair", "user_thickness": 0.5, "thickness_scale": 2.0 }
//! ]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::{CyHairError, Result};

fn unset_thickness() -> f32 {
    -1.0
}

fn unit_scale() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CyHairInput {
    pub filename: PathBuf,
    /// Negative means "use the thickness stored in the file".
    #[serde(default = "unset_thickness")]
    pub user_thickness: f32,
    /// Multiplies whichever thickness source is used.
    #[serde(default = "unit_scale")]
    pub thickness_scale: f32,
}

impl CyHairInput {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        CyHairInput {
            filename: filename.into(),
            user_thickness: unset_thickness(),
            thickness_scale: unit_scale(),
        }
    }

    pub fn thickness_override(&self) -> Option<f32> {
        thickness_override(self.user_thickness)
    }
}

/// Maps the negative "unset" sentinel to `None`.
#[inline]
pub fn thickness_override(user_thickness: f32) -> Option<f32> {
    (user_thickness >= 0.0).then_some(user_thickness)
}

/// Parses config text; `origin` only labels errors.
pub fn parse_config(text: &str, origin: &Path) -> Result<Vec<CyHairInput>> {
    let inputs: Vec<CyHairInput> =
        serde_json::from_str(text).map_err(|e| CyHairError::Config {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;

    for input in &inputs {
        info!(
            filename = %input.filename.display(),
            user_thickness = input.user_thickness,
            thickness_scale = input.thickness_scale,
            "combiner input"
        );
    }
    Ok(inputs)
}

pub fn read_config(path: impl AsRef<Path>) -> Result<Vec<CyHairInput>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| CyHairError::io(path, e))?;
    parse_config(&text, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_to_missing_fields() {
        let text = r#"[{"filename": "a.hair"}, {"filename": "b.hair", "user_thickness": 2.0, "thickness_scale": 3.0}]"#;
        let inputs = parse_config(text, Path::new("in.json")).expect("valid config");
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0], CyHairInput::new("a.hair"));
        assert_eq!(inputs[0].thickness_override(), None);
        assert_eq!(inputs[1].thickness_override(), Some(2.0));
        assert_eq!(inputs[1].thickness_scale, 3.0);
    }

    #[test]
    fn test_missing_filename_is_rejected() {
        let err = parse_config(r#"[{"user_thickness": 1.0}]"#, Path::new("bad.json"))
            .expect_err("filename is required");
        match err {
            CyHairError::Config { path, reason } => {
                assert_eq!(path, PathBuf::from("bad.json"));
                assert!(reason.contains("filename"), "reason: {}", reason);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_zero_thickness_is_an_override() {
        assert_eq!(thickness_override(0.0), Some(0.0));
        assert_eq!(thickness_override(-0.5), None);
    }

    #[test]
    fn test_read_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_config(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, CyHairError::Io { .. }));
    }
}
