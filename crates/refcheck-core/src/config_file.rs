use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::validator::ValidationConfig;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub validation: Option<ValidationSection>,
    pub matching: Option<MatchingSection>,
    pub online: Option<OnlineSection>,
    pub registry: Option<RegistrySection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSection {
    pub profile: Option<String>,
    pub disabled: Option<Vec<String>>,
    pub min_year: Option<u16>,
    pub max_year: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchingSection {
    pub max_family_distance: Option<usize>,
    pub min_fuzzy_family_len: Option<usize>,
    pub duplicate_title_threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OnlineSection {
    pub crossref_mailto: Option<String>,
    pub timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
    pub web_metadata: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySection {
    pub path: Option<String>,
}

/// Platform config directory path: `<config_dir>/refcheck/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("refcheck").join("config.toml"))
}

/// Load config by cascading CWD `.refcheck.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".refcheck.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

fn pick<S, T: Clone>(overlay: &Option<S>, base: &Option<S>, get: impl Fn(&S) -> Option<T>) -> Option<T> {
    overlay
        .as_ref()
        .and_then(&get)
        .or_else(|| base.as_ref().and_then(&get))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        validation: Some(ValidationSection {
            profile: pick(&overlay.validation, &base.validation, |v| v.profile.clone()),
            disabled: pick(&overlay.validation, &base.validation, |v| v.disabled.clone()),
            min_year: pick(&overlay.validation, &base.validation, |v| v.min_year),
            max_year: pick(&overlay.validation, &base.validation, |v| v.max_year),
        }),
        matching: Some(MatchingSection {
            max_family_distance: pick(&overlay.matching, &base.matching, |m| {
                m.max_family_distance
            }),
            min_fuzzy_family_len: pick(&overlay.matching, &base.matching, |m| {
                m.min_fuzzy_family_len
            }),
            duplicate_title_threshold: pick(&overlay.matching, &base.matching, |m| {
                m.duplicate_title_threshold
            }),
        }),
        online: Some(OnlineSection {
            crossref_mailto: pick(&overlay.online, &base.online, |o| o.crossref_mailto.clone()),
            timeout_secs: pick(&overlay.online, &base.online, |o| o.timeout_secs),
            concurrency: pick(&overlay.online, &base.online, |o| o.concurrency),
            web_metadata: pick(&overlay.online, &base.online, |o| o.web_metadata),
        }),
        registry: Some(RegistrySection {
            path: pick(&overlay.registry, &base.registry, |r| r.path.clone()),
        }),
    }
}

impl ConfigFile {
    /// Apply file settings on top of `config`. Unknown profiles or rule
    /// families are reported rather than ignored.
    pub fn apply_to(&self, config: &mut ValidationConfig) -> Result<(), CoreError> {
        if let Some(v) = &self.validation {
            if let Some(profile) = &v.profile {
                config.profile = profile.parse()?;
            }
            for family in v.disabled.iter().flatten() {
                config.rules.disable(family)?;
            }
            if let Some(min) = v.min_year {
                config.min_year = min;
            }
            if let Some(max) = v.max_year {
                config.max_year = max;
            }
            if config.min_year > config.max_year {
                return Err(CoreError::Config(format!(
                    "min_year {} is after max_year {}",
                    config.min_year, config.max_year
                )));
            }
        }
        if let Some(m) = &self.matching {
            if let Some(d) = m.max_family_distance {
                config.matching.max_family_distance = d;
            }
            if let Some(len) = m.min_fuzzy_family_len {
                config.matching.min_fuzzy_family_len = len;
            }
            if let Some(t) = m.duplicate_title_threshold {
                if !(0.0..=1.0).contains(&t) {
                    return Err(CoreError::Config(format!(
                        "duplicate_title_threshold must be within 0..1, got {}",
                        t
                    )));
                }
                config.matching.duplicate_title_threshold = t;
            }
        }
        Ok(())
    }
}

/// Save the current config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, String> {
    let path = config_path().ok_or_else(|| "Could not determine config directory".to_string())?;
    save_to_path(config, &path)?;
    Ok(path)
}

pub fn save_to_path(config: &ConfigFile, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let content =
        toml::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {}", e))?;
    std::fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::StyleProfile;

    #[test]
    fn registry_path_round_trip_toml() {
        let config = ConfigFile {
            registry: Some(RegistrySection {
                path: Some("/tmp/predatory.csv".to_string()),
            }),
            ..Default::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ConfigFile = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.registry.unwrap().path.unwrap(), "/tmp/predatory.csv");
    }

    #[test]
    fn partial_section_deserializes() {
        let toml_str = "[online]\ncrossref_mailto = \"me@example.org\"\n";
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        let online = parsed.online.unwrap();
        assert_eq!(online.crossref_mailto.as_deref(), Some("me@example.org"));
        assert!(online.timeout_secs.is_none());
        assert!(parsed.validation.is_none());
    }

    #[test]
    fn merge_overlay_wins_base_preserved() {
        let base = ConfigFile {
            validation: Some(ValidationSection {
                profile: Some("strict".into()),
                min_year: Some(1800),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            validation: Some(ValidationSection {
                profile: Some("lenient".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, overlay);
        let v = merged.validation.unwrap();
        assert_eq!(v.profile.as_deref(), Some("lenient"));
        assert_eq!(v.min_year, Some(1800));
    }

    #[test]
    fn apply_sets_profile_rules_and_matching() {
        let file: ConfigFile = toml::from_str(
            r#"
[validation]
profile = "lenient"
disabled = ["links", "registry"]

[matching]
max_family_distance = 2
"#,
        )
        .unwrap();
        let mut config = ValidationConfig::default();
        file.apply_to(&mut config).unwrap();
        assert_eq!(config.profile, StyleProfile::Lenient);
        assert!(!config.rules.links);
        assert!(!config.rules.registry);
        assert!(config.rules.pairing);
        assert_eq!(config.matching.max_family_distance, 2);
    }

    #[test]
    fn apply_rejects_unknown_rule() {
        let file: ConfigFile =
            toml::from_str("[validation]\ndisabled = [\"spelling\"]\n").unwrap();
        let mut config = ValidationConfig::default();
        assert!(matches!(
            file.apply_to(&mut config),
            Err(CoreError::UnknownRule(_))
        ));
    }

    #[test]
    fn apply_rejects_inverted_year_range() {
        let file: ConfigFile =
            toml::from_str("[validation]\nmin_year = 2000\nmax_year = 1990\n").unwrap();
        let mut config = ValidationConfig::default();
        assert!(matches!(file.apply_to(&mut config), Err(CoreError::Config(_))));
    }

    #[test]
    fn load_from_path_missing_or_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        assert!(load_from_path(&dir.join("absent.toml")).is_none());

        let bad = dir.join("bad.toml");
        std::fs::write(&bad, "validation = [[[").unwrap();
        assert!(load_from_path(&bad).is_none());

        let good = dir.join("good.toml");
        save_to_path(
            &ConfigFile {
                online: Some(OnlineSection {
                    timeout_secs: Some(3),
                    ..Default::default()
                }),
                ..Default::default()
            },
            &good,
        )
        .unwrap();
        let loaded = load_from_path(&good).unwrap();
        assert_eq!(loaded.online.unwrap().timeout_secs, Some(3));
    }
}
