use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::posts::slugify;
use crate::ConfigError;

/// Content ceilings a brand is willing to tolerate. Unset limits are not checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvoidContent {
    pub max_toxicity: Option<f64>,
    pub max_nsfw: Option<f64>,
    pub max_identity_attack: Option<f64>,
    pub max_insult: Option<f64>,
    pub max_severe_toxicity: Option<f64>,
    pub max_spam: Option<f64>,
    pub max_nsfw_images: Option<u64>,
}

impl AvoidContent {
    fn ratio_limits(&self) -> [(&'static str, Option<f64>); 6] {
        [
            ("max_toxicity", self.max_toxicity),
            ("max_nsfw", self.max_nsfw),
            ("max_identity_attack", self.max_identity_attack),
            ("max_insult", self.max_insult),
            ("max_severe_toxicity", self.max_severe_toxicity),
            ("max_spam", self.max_spam),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandPolicy {
    #[serde(alias = "name")]
    pub brand_name: String,
    #[serde(default)]
    pub target_categories: Vec<String>,
    #[serde(default)]
    pub brand_values: Vec<String>,
    #[serde(default, alias = "safety_thresholds")]
    pub avoid_content: AvoidContent,
    #[serde(default)]
    pub excluded_topics: Vec<String>,
}

impl BrandPolicy {
    #[must_use]
    pub fn slug(&self) -> String {
        slugify(&self.brand_name)
    }
}

/// Load and validate a single brand policy. `.json` files are parsed as JSON,
/// everything else as YAML.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_policy(path: &Path) -> Result<BrandPolicy, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::PolicyFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let policy: BrandPolicy = if is_json {
        serde_json::from_str(&content).map_err(|e| ConfigError::PolicyFileParse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?
    } else {
        serde_yaml::from_str(&content).map_err(|e| ConfigError::PolicyFileParse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?
    };

    validate_policy(&policy)?;
    Ok(policy)
}

/// Load every `*.yaml`, `*.yml` and `*.json` policy in `dir`, sorted by file name.
///
/// # Errors
///
/// Returns `ConfigError` if the directory cannot be listed, any policy fails to
/// load, or two policies share a brand slug.
pub fn load_policies(dir: &Path) -> Result<Vec<BrandPolicy>, ConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::PolicyFileIo {
        path: dir.display().to_string(),
        source: e,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "yaml" | "yml" | "json"))
        })
        .collect();
    paths.sort();

    let mut seen = HashSet::new();
    let mut policies = Vec::with_capacity(paths.len());
    for path in paths {
        let policy = load_policy(&path)?;
        if !seen.insert(policy.slug()) {
            return Err(ConfigError::Validation(format!(
                "duplicate brand policy: '{}' ({})",
                policy.brand_name,
                path.display()
            )));
        }
        policies.push(policy);
    }
    Ok(policies)
}

fn validate_policy(policy: &BrandPolicy) -> Result<(), ConfigError> {
    if policy.brand_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "brand name must be non-empty".to_string(),
        ));
    }

    for (name, limit) in policy.avoid_content.ratio_limits() {
        if let Some(value) = limit {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "brand '{}' has {name} = {value}; must be within [0, 1]",
                    policy.brand_name
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml_policy() {
        let yaml = r"
brand_name: Glow Cosmetics
target_categories: [beauty, skincare]
brand_values: [sustainability]
avoid_content:
  max_toxicity: 0.15
  max_nsfw_images: 0
excluded_topics: [gambling]
";
        let policy: BrandPolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy.brand_name, "Glow Cosmetics");
        assert_eq!(policy.avoid_content.max_toxicity, Some(0.15));
        assert_eq!(policy.avoid_content.max_nsfw_images, Some(0));
        assert_eq!(policy.avoid_content.max_insult, None);
        assert_eq!(policy.slug(), "glow-cosmetics");
    }

    #[test]
    fn accepts_legacy_json_field_names() {
        let json = r#"{
            "name": "Family Foods",
            "safety_thresholds": {"max_toxicity": 0.1, "max_identity_attack": 0.05},
            "excluded_topics": ["alcohol"]
        }"#;
        let policy: BrandPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.brand_name, "Family Foods");
        assert_eq!(policy.avoid_content.max_identity_attack, Some(0.05));
        assert!(policy.brand_values.is_empty());
    }

    #[test]
    fn rejects_empty_name() {
        let policy = BrandPolicy {
            brand_name: "  ".to_string(),
            target_categories: vec![],
            brand_values: vec![],
            avoid_content: AvoidContent::default(),
            excluded_topics: vec![],
        };
        assert!(matches!(
            validate_policy(&policy),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let policy = BrandPolicy {
            brand_name: "Acme".to_string(),
            target_categories: vec![],
            brand_values: vec![],
            avoid_content: AvoidContent {
                max_nsfw: Some(1.5),
                ..AvoidContent::default()
            },
            excluded_topics: vec![],
        };
        let err = validate_policy(&policy).unwrap_err();
        assert!(err.to_string().contains("max_nsfw"));
    }

    #[test]
    fn load_policies_reads_mixed_formats_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), r#"{"name": "Beta"}"#).unwrap();
        std::fs::write(dir.path().join("a.yaml"), "brand_name: Alpha\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let policies = load_policies(dir.path()).unwrap();
        let names: Vec<_> = policies.iter().map(|p| p.brand_name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);
    }

    #[test]
    fn load_policies_rejects_duplicate_brands() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yaml"), "brand_name: Same Brand\n").unwrap();
        std::fs::write(dir.path().join("b.yml"), "brand_name: same brand\n").unwrap();

        let err = load_policies(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("duplicate")));
    }

    #[test]
    fn load_policy_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_policy(&path).unwrap_err();
        assert!(matches!(err, ConfigError::PolicyFileParse { ref path, .. } if path.ends_with("broken.json")));
    }
}
