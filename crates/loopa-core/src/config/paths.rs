//! Where loopa keeps its files

use std::path::PathBuf;

/// `~/.config/loopa` (platform equivalent elsewhere)
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("loopa")
}

/// Full path of a file inside [`config_dir`]
pub fn default_config_path(filename: &str) -> PathBuf {
    config_dir().join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_lives_in_loopa_dir() {
        let path = default_config_path("loopa.yaml");
        assert!(path.ends_with("loopa/loopa.yaml"));
    }
}
