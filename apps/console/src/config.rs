use std::{collections::HashMap, fs};

use anyhow::{bail, Context, Result};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000".into(),
        }
    }
}

/// Defaults, overridden by `console.toml` in the working directory,
/// overridden by environment variables (plain and `APP__*` spellings).
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("console.toml") {
        apply_file_config(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("BACKEND_URL") {
        settings.backend_url = v;
    }
    if let Ok(v) = std::env::var("APP__BACKEND_URL") {
        settings.backend_url = v;
    }

    settings
}

fn apply_file_config(settings: &mut Settings, raw: &str) {
    if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) {
        if let Some(v) = file_cfg.get("backend_url") {
            settings.backend_url = v.clone();
        }
    }
}

pub fn validate_backend_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw).with_context(|| format!("invalid backend url '{raw}'"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        bail!("backend url must use http or https, got '{}'", url.scheme());
    }
    Ok(raw.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_config_overrides_default_backend_url() {
        let mut settings = Settings::default();
        apply_file_config(&mut settings, "backend_url = \"http://10.0.0.5:9000\"");
        assert_eq!(settings.backend_url, "http://10.0.0.5:9000");
    }

    #[test]
    fn unknown_keys_and_invalid_toml_are_ignored() {
        let mut settings = Settings::default();
        apply_file_config(&mut settings, "unrelated = \"value\"");
        apply_file_config(&mut settings, "not even toml [[[");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn validates_and_trims_backend_url() {
        assert_eq!(
            validate_backend_url("http://127.0.0.1:8000/").expect("valid"),
            "http://127.0.0.1:8000"
        );
        assert!(validate_backend_url("ftp://127.0.0.1").is_err());
        assert!(validate_backend_url("not a url").is_err());
    }
}
