//! Resolved run settings. Precedence: CLI flag > environment > config
//! file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use refcheck_core::config_file::{
    ConfigFile, MatchingSection, OnlineSection, RegistrySection, ValidationSection,
};
use refcheck_core::{RuleSet, ValidationConfig};

pub const ENV_MAILTO: &str = "REFCHECK_CROSSREF_MAILTO";
pub const ENV_REGISTRY: &str = "REFCHECK_REGISTRY";

/// Settings that can come from the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub profile: Option<String>,
    pub disable: Vec<String>,
    pub mailto: Option<String>,
    pub registry: Option<PathBuf>,
    pub web_metadata: bool,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub validation: ValidationConfig,
    pub mailto: Option<String>,
    pub registry: Option<PathBuf>,
    pub timeout: Duration,
    pub concurrency: usize,
    pub web_metadata: bool,
}

impl Settings {
    /// Layer `overrides` and environment values (looked up through `env`)
    /// over `file`.
    pub fn resolve(
        file: &ConfigFile,
        overrides: &Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let mut validation = ValidationConfig::default();
        file.apply_to(&mut validation)
            .context("invalid configuration file")?;
        if let Some(profile) = &overrides.profile {
            validation.profile = profile.parse().context("invalid --profile")?;
        }
        for family in &overrides.disable {
            validation
                .rules
                .disable(family)
                .with_context(|| format!("invalid --disable value (known: {})", RuleSet::FAMILIES.join(", ")))?;
        }

        let online = file.online.clone().unwrap_or_default();
        let mailto = overrides
            .mailto
            .clone()
            .or_else(|| env(ENV_MAILTO))
            .or(online.crossref_mailto)
            .filter(|m| !m.trim().is_empty());
        let registry = overrides
            .registry
            .clone()
            .or_else(|| env(ENV_REGISTRY).map(PathBuf::from))
            .or_else(|| {
                file.registry
                    .as_ref()
                    .and_then(|r| r.path.as_ref())
                    .map(PathBuf::from)
            });

        Ok(Self {
            validation,
            mailto,
            registry,
            timeout: Duration::from_secs(online.timeout_secs.unwrap_or(10).max(1)),
            concurrency: online.concurrency.unwrap_or(4).max(1),
            web_metadata: overrides.web_metadata || online.web_metadata.unwrap_or(false),
        })
    }

    /// The effective settings as a config file, for `refcheck config`.
    pub fn to_config_file(&self) -> ConfigFile {
        let rules = &self.validation.rules;
        let disabled: Vec<String> = RuleSet::FAMILIES
            .iter()
            .zip([
                rules.pairing,
                rules.completeness,
                rules.consistency,
                rules.links,
                rules.online,
                rules.registry,
            ])
            .filter(|(_, enabled)| !enabled)
            .map(|(name, _)| name.to_string())
            .collect();
        let matching = &self.validation.matching;
        ConfigFile {
            validation: Some(ValidationSection {
                profile: Some(self.validation.profile.to_string()),
                disabled: Some(disabled),
                min_year: Some(self.validation.min_year),
                max_year: Some(self.validation.max_year),
            }),
            matching: Some(MatchingSection {
                max_family_distance: Some(matching.max_family_distance),
                min_fuzzy_family_len: Some(matching.min_fuzzy_family_len),
                duplicate_title_threshold: Some(matching.duplicate_title_threshold),
            }),
            online: Some(OnlineSection {
                crossref_mailto: self.mailto.clone(),
                timeout_secs: Some(self.timeout.as_secs()),
                concurrency: Some(self.concurrency),
                web_metadata: Some(self.web_metadata),
            }),
            registry: Some(RegistrySection {
                path: self.registry.as_ref().map(|p| p.display().to_string()),
            }),
        }
    }
}
