//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

const PROJECT_FILES: [&str; 2] = ["gauntlet.toml", ".gauntlet.toml"];

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `GAUNTLET_` environment variables (`GAUNTLET_AGENT__MAX_CYCLES=5`)
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./gauntlet.toml` or `./.gauntlet.toml`
    /// 4. Global: `$XDG_CONFIG_HOME/gauntlet/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, Box<figment::Error>> {
        // A missing explicit file is an error, not a silent default.
        if let Some(path) = config_path.filter(|p| !p.is_file()) {
            return Err(Box::new(figment::Error::from(format!(
                "config file {} does not exist",
                path.display()
            ))));
        }
        Self::figment(config_path).extract().map_err(Box::new)
    }

    fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(&global_path));
            }
        }

        if let Some(path) = Self::project_config_path() {
            figment = figment.merge(Toml::file(path));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed("GAUNTLET_").split("__"))
    }

    /// Global config file path: `$XDG_CONFIG_HOME/gauntlet/config.toml`,
    /// falling back to `~/.config/gauntlet/config.toml`
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("gauntlet").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Config files that would be merged, lowest priority first.
    pub fn sources(config_path: Option<&Path>) -> Vec<PathBuf> {
        Self::global_config_path()
            .filter(|p| p.exists())
            .into_iter()
            .chain(Self::project_config_path())
            .chain(config_path.map(Path::to_path_buf))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_load_defaults_without_files() {
        Jail::expect_with(|_jail| {
            let config = ConfigLoader::load(None).map_err(|e| *e)?;
            assert_eq!(config.agent.max_cycles, 25);
            assert!(config.safety.require_approval);
            Ok(())
        });
    }

    #[test]
    fn test_project_file_then_explicit_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "gauntlet.toml",
                r#"
[agent]
max_cycles = 10
max_safety_replans = 4

[safety]
allowed_networks = ["10.0.0.0/8"]
"#,
            )?;
            jail.create_file("override.toml", "[agent]\nmax_cycles = 12\n")?;
            jail.set_env("GAUNTLET_AGENT__MAX_SAFETY_REPLANS", "1");

            let config = ConfigLoader::load(Some(Path::new("override.toml"))).map_err(|e| *e)?;
            assert_eq!(config.agent.max_cycles, 12);
            assert_eq!(config.agent.max_safety_replans, 1);
            assert_eq!(config.safety.allowed_networks, vec!["10.0.0.0/8".to_string()]);
            Ok(())
        });
    }

    #[test]
    fn test_hidden_project_file_is_found() {
        Jail::expect_with(|jail| {
            jail.create_file(".gauntlet.toml", "[oracle]\nbackend = \"process\"\n")?;
            assert_eq!(
                ConfigLoader::project_config_path(),
                Some(PathBuf::from(".gauntlet.toml"))
            );
            let config = ConfigLoader::load(None).map_err(|e| *e)?;
            assert_eq!(config.oracle.backend, "process");
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        Jail::expect_with(|_jail| {
            assert!(ConfigLoader::load(Some(Path::new("missing.toml"))).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_global_config_path_is_named() {
        if let Some(path) = ConfigLoader::global_config_path() {
            assert!(path.ends_with("gauntlet/config.toml"));
        }
    }
}
