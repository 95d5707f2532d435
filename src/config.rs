use anyhow::{Context, Result};
use manifest::HostFacts;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the config directory path (~/.config/converge)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("converge"))
}

/// Which package manager drives `Package` resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
}

impl PackageManager {
    /// Default for an `os_family` fact
    pub fn for_os_family(family: Option<&str>) -> Self {
        match family {
            Some("Debian") => Self::Apt,
            Some("RedHat") => Self::Dnf,
            _ => Self::Apt,
        }
    }
}

// ============================================================================
// Engine Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Resources converged in parallel
    pub jobs: usize,

    /// Overrides the choice made from the `os_family` fact
    pub package_manager: Option<PackageManager>,

    /// Where run history is kept
    pub state_dir: String,

    /// Number of runs kept in history
    pub history_limit: usize,

    /// Fact overrides applied on every run
    pub facts: HostFacts,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            jobs: 1,
            package_manager: None,
            state_dir: "~/.local/state/converge".to_string(),
            history_limit: 20,
            facts: HostFacts::new(),
        }
    }
}

impl EngineConfig {
    /// Load the config from `path`, or from the default location.
    ///
    /// A missing file yields the defaults; a file given explicitly must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (config_dir()?.join("config.toml"), false),
        };

        if !explicit && !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        anyhow::ensure!(config.jobs > 0, "jobs must be at least 1");
        Ok(config)
    }

    /// Get expanded state directory path
    pub fn state_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.state_dir);
        PathBuf::from(expanded.as_ref())
    }

    /// Package manager to use on a host with these facts
    pub fn package_manager_for(&self, facts: &HostFacts) -> PackageManager {
        self.package_manager
            .unwrap_or_else(|| PackageManager::for_os_family(facts.os_family()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::parse("").unwrap();
        assert_eq!(config.jobs, 1);
        assert_eq!(config.history_limit, 20);
        assert!(config.package_manager.is_none());
        assert!(!config.state_path().to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_full_config() {
        let config = EngineConfig::parse(
            r#"
            jobs = 4
            package_manager = "yum"
            state_dir = "/var/lib/converge"
            history_limit = 5

            [facts]
            os_family = "RedHat"
            selinux_enforcing = true
            "#,
        )
        .unwrap();
        assert_eq!(config.jobs, 4);
        assert_eq!(config.package_manager, Some(PackageManager::Yum));
        assert_eq!(config.state_path(), PathBuf::from("/var/lib/converge"));
        assert_eq!(config.history_limit, 5);
        assert_eq!(config.facts.os_family(), Some("RedHat"));
        assert!(config.facts.selinux_enforcing());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(EngineConfig::parse("jobs = 0").is_err());
        assert!(EngineConfig::parse("package_manager = \"pacman\"").is_err());
        assert!(EngineConfig::parse("unknown = 1").is_err());
    }

    #[test]
    fn test_package_manager_selection() {
        let config = EngineConfig::default();
        let debian = HostFacts::new().with("os_family", "Debian");
        let redhat = HostFacts::new().with("os_family", "RedHat");
        assert_eq!(config.package_manager_for(&debian), PackageManager::Apt);
        assert_eq!(config.package_manager_for(&redhat), PackageManager::Dnf);

        let pinned = EngineConfig {
            package_manager: Some(PackageManager::Yum),
            ..EngineConfig::default()
        };
        assert_eq!(pinned.package_manager_for(&debian), PackageManager::Yum);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(EngineConfig::load(Some(&dir.path().join("nope.toml"))).is_err());

        let path = dir.path().join("config.toml");
        fs::write(&path, "jobs = 3\n").unwrap();
        assert_eq!(EngineConfig::load(Some(&path)).unwrap().jobs, 3);
    }
}
