//! Configuration loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::PathBuf;

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. Environment: `CONCLAVE_*` (e.g. `CONCLAVE_STORE__TTL_HOURS`)
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./conclave.toml`
    /// 4. Default values
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        let project = PathBuf::from("conclave.toml");
        if project.exists() {
            figment = figment.merge(Toml::file(&project));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("CONCLAVE_").split("__"));

        figment.extract().map_err(Box::new)
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.store.max_conversations, 1000);
        assert_eq!(config.consensus.phase_buffer_secs, 60);
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[consensus]
model_timeout_secs = 600

[store]
max_messages = 25
"#
        )
        .unwrap();

        let path = file.path().to_path_buf();
        let config = ConfigLoader::load(Some(&path)).unwrap();

        assert_eq!(config.consensus.model_timeout_secs, 600);
        assert_eq!(config.store.max_messages, 25);
        // Untouched fields keep defaults
        assert_eq!(config.store.max_conversations, 1000);
        assert!((config.consensus.temperature - 0.2).abs() < f32::EPSILON);
    }
}
