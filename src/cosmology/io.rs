//! Reading and writing cosmologies as YAML or JSON.
//!
//! The class name is the tag: YAML output starts with `!FlatLambdaCDM` or
//! `!LambdaCDM`, JSON output is `{"FlatLambdaCDM": {...}}`.

use std::fs;
use std::path::Path;

use crate::cosmology::flrw::{Cosmology, CosmologyRecord};
use crate::error::AppError;

pub fn to_yaml(cosmo: &dyn Cosmology) -> Result<String, AppError> {
    serde_yaml_ng::to_string(&cosmo.to_record())
        .map_err(|e| AppError::input(format!("Failed to serialize cosmology to YAML: {e}")))
}

pub fn from_yaml(text: &str) -> Result<Box<dyn Cosmology>, AppError> {
    let record: CosmologyRecord =
        serde_yaml_ng::from_str(text).map_err(|e| AppError::input(format!("Invalid cosmology YAML: {e}")))?;
    record.into_cosmology()
}

pub fn to_json(cosmo: &dyn Cosmology) -> Result<String, AppError> {
    serde_json::to_string_pretty(&cosmo.to_record())
        .map_err(|e| AppError::input(format!("Failed to serialize cosmology to JSON: {e}")))
}

pub fn from_json(text: &str) -> Result<Box<dyn Cosmology>, AppError> {
    let record: CosmologyRecord =
        serde_json::from_str(text).map_err(|e| AppError::input(format!("Invalid cosmology JSON: {e}")))?;
    record.into_cosmology()
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Read a cosmology file. `.json` files are JSON; anything else is YAML.
pub fn read_cosmology(path: &Path) -> Result<Box<dyn Cosmology>, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::input(format!("Failed to read cosmology file '{}': {e}", path.display())))?;
    if is_json(path) { from_json(&text) } else { from_yaml(&text) }
}

/// Write a cosmology file, choosing the format from the extension as
/// [`read_cosmology`] does.
pub fn write_cosmology(path: &Path, cosmo: &dyn Cosmology) -> Result<(), AppError> {
    let text = if is_json(path) { to_json(cosmo)? } else { to_yaml(cosmo)? };
    fs::write(path, text)
        .map_err(|e| AppError::input(format!("Failed to write cosmology file '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmology::flrw::{FlatLambdaCdm, LambdaCdm, Meta, planck18};

    #[test]
    fn yaml_is_tagged_by_class_and_reloads() {
        let text = to_yaml(&planck18()).unwrap();
        assert!(text.starts_with("!FlatLambdaCDM"), "{text}");
        assert!(text.contains("H0: 67.66"));

        let back = from_yaml(&text).unwrap();
        assert_eq!(back.class_name(), "FlatLambdaCDM");
        assert!(back.same_as(&planck18()));
        assert_eq!(back.meta(), planck18().meta());
        assert!(back.is_flat());
    }

    #[test]
    fn non_flat_yaml_reloads() {
        let cosmo = LambdaCdm::new(70.0, 0.3, 0.6)
            .unwrap()
            .named("open")
            .with_meta(Meta::from([("source".to_string(), "hand".to_string())]));
        let back = from_yaml(&to_yaml(&cosmo).unwrap()).unwrap();
        assert!(back.same_as(&cosmo));
        assert!(!back.is_flat());
        assert_eq!(back.meta()["source"], "hand");
    }

    #[test]
    fn name_and_meta_are_optional_on_read() {
        let back = from_yaml("!FlatLambdaCDM\nH0: 70.0\nOm0: 0.3\n").unwrap();
        assert_eq!(back.name(), None);
        assert!(back.meta().is_empty());
        assert!(back.is_equivalent(&FlatLambdaCdm::new(70.0, 0.3).unwrap()));
    }

    #[test]
    fn decoded_values_are_validated() {
        let err = from_yaml("!FlatLambdaCDM\nH0: -70.0\nOm0: 0.3\n").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().starts_with("H0 must be"));
        assert!(from_yaml("!Unknown\nH0: 70.0\n").is_err());
    }

    #[test]
    fn json_files_round_trip() {
        let dir = std::env::temp_dir().join(format!("jf_cosmo_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let json_path = dir.join("c.json");
        let yaml_path = dir.join("c.yaml");
        write_cosmology(&json_path, &planck18()).unwrap();
        write_cosmology(&yaml_path, &planck18()).unwrap();
        let json_text = fs::read_to_string(&json_path).unwrap();
        let from_json_file = read_cosmology(&json_path).unwrap();
        let from_yaml_file = read_cosmology(&yaml_path).unwrap();
        let _ = fs::remove_dir_all(&dir);

        assert!(json_text.contains("\"FlatLambdaCDM\""));
        assert!(from_json_file.same_as(&planck18()));
        assert!(from_yaml_file.same_as(from_json_file.as_ref()));
    }
}
