use super::types::*;
use crate::batch::Tags;
use crate::codec::Compression;
use crate::config::{expand_env_vars, expand_tilde, ENV_VAR_PATTERN};
use crate::store::BackendConfig;
use regex::Regex;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

// S3 object tagging limits
const MAX_TAGS: usize = 10;
const MAX_TAG_KEY_LEN: usize = 128;
const MAX_TAG_VALUE_LEN: usize = 256;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    load_config_str(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Parse, expand and validate a config from YAML text.
pub fn load_config_str(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string)?;

    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = Regex::new(ENV_VAR_PATTERN)
        .map_err(|e| ConfigError::Validation(e.to_string()))?;
    let mut unexpanded_vars: Vec<String> = re
        .captures_iter(yaml_string)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables\n\
             2. Replace the variables in the config file with actual values",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn expand_paths(config: &mut Config) {
    if let BackendConfig::Local { root } = &mut config.store {
        *root = expand_tilde(root);
    }

    if let Some(dir) = config.batch.temp_dir.as_mut() {
        *dir = expand_tilde(dir);
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    match &config.store {
        BackendConfig::S3 { bucket, .. } if bucket.trim().is_empty() => {
            errors.push("store.bucket must not be empty".to_string());
        }
        BackendConfig::Local { root } if root.as_os_str().is_empty() => {
            errors.push("store.root must not be empty".to_string());
        }
        _ => {}
    }

    if config.metadata.compression == Compression::Zstd
        && !zstd::compression_level_range().contains(&config.metadata.level)
    {
        errors.push(format!(
            "metadata.level {} is outside the zstd range {:?}",
            config.metadata.level,
            zstd::compression_level_range()
        ));
    }

    errors.extend(tag_errors(&config.tags));

    into_result(errors)
}

/// Check a tag set against the object store tagging limits.
pub fn validate_tags(tags: &Tags) -> Result<(), ConfigError> {
    into_result(tag_errors(tags))
}

fn tag_errors(tags: &Tags) -> Vec<String> {
    let mut errors = Vec::new();

    if tags.len() > MAX_TAGS {
        errors.push(format!(
            "at most {} tags are allowed, got {}",
            MAX_TAGS,
            tags.len()
        ));
    }
    for (key, value) in tags {
        if key.is_empty() {
            errors.push("tag keys must not be empty".to_string());
        }
        if key.chars().count() > MAX_TAG_KEY_LEN {
            errors.push(format!("tag key '{}' is longer than {} characters", key, MAX_TAG_KEY_LEN));
        }
        if value.chars().count() > MAX_TAG_VALUE_LEN {
            errors.push(format!(
                "tag '{}' value is longer than {} characters",
                key, MAX_TAG_VALUE_LEN
            ));
        }
    }

    errors
}

fn into_result(mut errors: Vec<String>) -> Result<(), ConfigError> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(ConfigError::Validation(errors.remove(0))),
        _ => Err(ConfigError::ValidationList(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpanded_var_reported() {
        let err = load_config_str("store:\n  type: s3\n  bucket: $env{BATCHSTORE_UNSET_BUCKET}\n")
            .unwrap_err();
        match err {
            ConfigError::Validation(msg) => assert!(msg.contains("BATCHSTORE_UNSET_BUCKET")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_multiple_errors_collected() {
        let yaml = r#"
store:
  type: s3
  bucket: ""
metadata:
  compression: zstd
  level: 99
"#;
        match load_config_str(yaml).unwrap_err() {
            ConfigError::ValidationList(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_level_ignored_without_zstd() {
        let yaml = "store:\n  type: memory\nmetadata:\n  compression: gzip\n  level: 99\n";
        assert!(load_config_str(yaml).is_ok());
    }

    #[test]
    fn test_tag_limits() {
        let mut yaml = String::from("store:\n  type: memory\ntags:\n");
        for i in 0..11 {
            yaml.push_str(&format!("  k{}: v\n", i));
        }
        assert!(matches!(
            load_config_str(&yaml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_tags() {
        let mut tags = Tags::from([("retention-days".to_string(), "14".to_string())]);
        assert!(validate_tags(&tags).is_ok());

        tags.insert("k".repeat(129), "v".to_string());
        assert!(matches!(validate_tags(&tags), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_yaml_error() {
        assert!(matches!(
            load_config_str("store: [unclosed"),
            Err(ConfigError::YamlParse(_))
        ));
    }
}
