use std::path::Path;

use locsync::formats::FormatType;
use unic_langid::LanguageIdentifier;

/// Validate file path exists and is readable
pub fn validate_file_path(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Err(format!("File does not exist: {}", path.display()));
    }

    if !path.is_file() {
        return Err(format!("Path is not a file: {}", path.display()));
    }

    Ok(())
}

/// Validate that a target path names a supported resource file. The file
/// itself may not exist yet.
pub fn validate_target_path(path: &Path) -> Result<(), String> {
    if path.is_dir() {
        return Err(format!("Target is a directory: {}", path.display()));
    }
    if FormatType::from_path(path).is_none() {
        return Err(format!(
            "Unsupported target extension: {}. Expected .strings or .stringsdict",
            path.display()
        ));
    }
    Ok(())
}

/// Validate language code format using unic-langid
pub fn validate_language_code(lang: &str) -> Result<(), String> {
    if lang.is_empty() {
        return Err("Language code cannot be empty".to_string());
    }

    match lang.parse::<LanguageIdentifier>() {
        Ok(lang_id) => {
            let lang_str = lang_id.to_string();
            if lang_str.starts_with('-') || lang_str.ends_with('-') {
                return Err(format!(
                    "Invalid language code format: {}. Expected valid BCP 47 language identifier",
                    lang
                ));
            }
            Ok(())
        }
        Err(_) => Err(format!(
            "Invalid language code format: {}. Expected valid BCP 47 language identifier",
            lang
        )),
    }
}

/// Parse the `--keys-json` argument: a JSON array of key names or patterns.
pub fn parse_keys_json(json: &str) -> Result<Vec<String>, String> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<String>>(json)
        .map_err(|e| format!("Invalid --keys-json (expected a JSON array of strings): {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_language_code() {
        assert!(validate_language_code("en").is_ok());
        assert!(validate_language_code("zh-Hans").is_ok());
        assert!(validate_language_code("pt-BR").is_ok());
        assert!(validate_language_code("").is_err());
        assert!(validate_language_code("en US").is_err());
    }

    #[test]
    fn test_validate_target_path() {
        assert!(validate_target_path(Path::new("fr.lproj/Localizable.strings")).is_ok());
        assert!(validate_target_path(Path::new("values/strings.xml")).is_err());
    }

    #[test]
    fn test_validate_file_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_file_path(dir.path()).is_err());
        assert!(validate_file_path(&dir.path().join("missing.strings")).is_err());
    }

    #[test]
    fn test_parse_keys_json() {
        assert_eq!(
            parse_keys_json(r#"["a", "promo.*"]"#).unwrap(),
            vec!["a".to_string(), "promo.*".to_string()]
        );
        assert!(parse_keys_json("").unwrap().is_empty());
        assert!(parse_keys_json(r#"{"a": 1}"#).is_err());
    }
}
