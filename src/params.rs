//! Loading module parameters from files and `-e` extra variables.

use crate::error::{Error, Result};
use crate::modules::ModuleParams;
use std::path::Path;

/// Read a YAML or JSON mapping of module parameters.
///
/// JSON is picked by a `.json` extension; anything else is parsed as YAML.
pub fn load_params_file(path: &Path) -> Result<ModuleParams> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::params_load(path, e.to_string()))?;

    let value: serde_json::Value = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        _ => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(&content)?;
            serde_json::to_value(yaml)?
        }
    };

    match value {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        serde_json::Value::Null => Err(Error::params_load(path, "file is empty")),
        _ => Err(Error::params_load(path, "expected a mapping of parameters")),
    }
}

/// Parse `key=value` and `@file` extra variables into parameters.
///
/// Values are parsed as YAML scalars or collections, falling back to a
/// plain string.
pub fn parse_extra_vars(vars: &[String]) -> Result<ModuleParams> {
    let mut params = ModuleParams::new();

    for var in vars {
        if let Some(file_path) = var.strip_prefix('@') {
            params.extend(load_params_file(Path::new(file_path))?);
        } else if let Some((key, value)) = var.split_once('=') {
            if key.is_empty() {
                return Err(Error::ExtraVar(var.clone()));
            }
            let parsed: serde_json::Value = serde_yaml::from_str::<serde_yaml::Value>(value)
                .ok()
                .and_then(|v| serde_json::to_value(v).ok())
                .unwrap_or_else(|| serde_json::Value::String(value.to_string()));
            params.insert(key.to_string(), parsed);
        } else {
            return Err(Error::ExtraVar(var.clone()));
        }
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_yaml_params() {
        let file = write_temp(
            ".yml",
            "resource_group: rg\nname: app\nplan:\n  name: p\n  is_linux: true\n",
        );
        let params = load_params_file(file.path()).unwrap();
        assert_eq!(params["name"], json!("app"));
        assert_eq!(params["plan"]["is_linux"], json!(true));
    }

    #[test]
    fn test_load_json_params() {
        let file = write_temp(".json", r#"{"resource_group": "rg", "name": "app"}"#);
        let params = load_params_file(file.path()).unwrap();
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_load_rejects_non_mapping() {
        let file = write_temp(".yml", "- a\n- b\n");
        let err = load_params_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::ParamsLoad { .. }));

        let empty = write_temp(".yml", "");
        assert!(load_params_file(empty.path()).is_err());
    }

    #[test]
    fn test_extra_vars() {
        let file = write_temp(".yml", "location: eastus\n");
        let vars = vec![
            "https_only=true".to_string(),
            "name=my-app".to_string(),
            "number_of_workers=3".to_string(),
            format!("@{}", file.path().display()),
        ];
        let params = parse_extra_vars(&vars).unwrap();
        assert_eq!(params["https_only"], json!(true));
        assert_eq!(params["name"], json!("my-app"));
        assert_eq!(params["number_of_workers"], json!(3));
        assert_eq!(params["location"], json!("eastus"));
    }

    #[test]
    fn test_malformed_extra_var() {
        assert!(matches!(
            parse_extra_vars(&["novalue".to_string()]),
            Err(Error::ExtraVar(_))
        ));
        assert!(parse_extra_vars(&["=x".to_string()]).is_err());
    }
}
