pub mod parse;
pub mod types;

use regex::Regex;
use std::path::{Path, PathBuf};

pub use parse::{load_config, load_config_str, validate_tags, ConfigError};
pub use types::{BatchConfig, BufferType, Config, MetadataConfig};

pub(crate) const ENV_VAR_PATTERN: &str = r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}";

/// Expands `$env{VAR_NAME}` references in a string.
/// Variables that are not set are left in place.
pub fn expand_env_vars(text: &str) -> String {
    let Ok(re) = Regex::new(ENV_VAR_PATTERN) else {
        return text.to_string();
    };

    re.replace_all(text, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .to_string()
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(rest);
        }
    } else if path_str == "~" {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir;
        }
    }

    path.to_path_buf()
}

/// Per-user config location, `~/.config/batchstore/config.yml`.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config/batchstore/config.yml"))
}

/// Resolves the config file path. Returns the first of:
/// 1. Explicit path (if provided, with tilde expansion)
/// 2. ~/.config/batchstore/config.yml
/// 3. /etc/batchstore/config.yml
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(expand_tilde(path));
    }

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            return Some(user_config);
        }
    }

    let system_config = PathBuf::from("/etc/batchstore/config.yml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_expand_env_vars_single() {
        std::env::set_var("BATCHSTORE_TEST_VAR", "test_value");
        let result = expand_env_vars("bucket-$env{BATCHSTORE_TEST_VAR}");
        assert_eq!(result, "bucket-test_value");
        std::env::remove_var("BATCHSTORE_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_partial() {
        std::env::set_var("BATCHSTORE_SET_VAR", "exists");
        let result = expand_env_vars("$env{BATCHSTORE_SET_VAR}/$env{BATCHSTORE_UNSET_VAR}");
        assert_eq!(result, "exists/$env{BATCHSTORE_UNSET_VAR}");
        std::env::remove_var("BATCHSTORE_SET_VAR");
    }

    #[test]
    fn test_expand_env_vars_ignores_shell_syntax() {
        let result = expand_env_vars("${HOME}:$HOME");
        assert_eq!(result, "${HOME}:$HOME");
    }

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/spool")), home.join("spool"));
            assert_eq!(expand_tilde(Path::new("~")), home);
        }
        assert_eq!(expand_tilde(Path::new("/var/spool")), Path::new("/var/spool"));
        assert_eq!(expand_tilde(Path::new("relative/~")), Path::new("relative/~"));
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let path = resolve_config_path(Some(Path::new("/tmp/custom.yml")));
        assert_eq!(path, Some(PathBuf::from("/tmp/custom.yml")));
    }
}
