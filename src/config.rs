use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::FtpHost;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Host alias used when none is given on the command line
    pub default_host: Option<String>,
    pub data_safe: bool,
    pub passive_mode: bool,
    pub log_dir: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HostGroup {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub hosts: Vec<FtpHost>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct HostsConfig {
    #[serde(default)]
    pub groups: Vec<HostGroup>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_host: None,
            data_safe: false,
            passive_mode: true,
            log_dir: "logs".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ConfigManager {
    config_dir: PathBuf,
    config_file: PathBuf,
    hosts_file: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("ftpr");
        Self::with_dir(config_dir)
    }

    pub fn with_dir(config_dir: PathBuf) -> Result<Self> {
        // Create config directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        }

        let config_file = config_dir.join("ftpr.toml");
        let hosts_file = config_dir.join("hosts.toml");

        Ok(Self {
            config_dir,
            config_file,
            hosts_file,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn load_config(&self) -> Result<AppConfig> {
        // If config file doesn't exist, create it with default values
        if !self.config_file.exists() {
            let default_config = AppConfig::default();
            self.save_config(&default_config)?;
        }

        let content: String =
            fs::read_to_string(&self.config_file).context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    pub fn save_config(&self, config: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(config).context("Failed to serialize config")?;
        fs::write(&self.config_file, toml).context("Failed to write config file")?;
        Ok(())
    }

    pub fn load_hosts(&self) -> Result<Vec<FtpHost>> {
        // If hosts file doesn't exist, return empty vector
        if !self.hosts_file.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.hosts_file).context("Failed to read hosts file")?;

        let config: HostsConfig = toml::from_str(&content).context("Failed to parse hosts file")?;

        // Flatten groups into a single vector of hosts
        let mut hosts = Vec::new();
        for group in config.groups {
            for mut host in group.hosts {
                host.group = Some(group.name.clone());
                hosts.push(host);
            }
        }

        remove_duplicate_hosts(&mut hosts);
        tracing::info!("Loaded {} hosts from {:?}", hosts.len(), self.hosts_file);
        Ok(hosts)
    }

    pub fn save_hosts(&self, groups: &[HostGroup]) -> Result<()> {
        let config = HostsConfig {
            groups: groups.to_vec(),
        };

        let toml = toml::to_string_pretty(&config).context("Failed to serialize hosts")?;

        fs::write(&self.hosts_file, toml).context("Failed to write hosts file")?;

        Ok(())
    }

    pub fn get_hosts_path(&self) -> &Path {
        &self.hosts_file
    }
}

/// Keep the first host of every alias.
fn remove_duplicate_hosts(hosts: &mut Vec<FtpHost>) {
    let mut seen_aliases = HashSet::new();
    hosts.retain(|host| {
        if seen_aliases.contains(&host.alias) {
            tracing::warn!("Duplicate alias found: {}", host.alias);
            false
        } else {
            seen_aliases.insert(host.alias.clone());
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager() -> (TempDir, ConfigManager) {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_dir(temp_dir.path().join("ftpr")).unwrap();
        (temp_dir, manager)
    }

    #[test]
    fn test_default_config_is_created() {
        let (_temp_dir, manager) = manager();
        let config = manager.load_config().unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(manager.config_dir().join("ftpr.toml").exists());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let (_temp_dir, manager) = manager();
        fs::write(manager.config_dir().join("ftpr.toml"), "data_safe = true\n").unwrap();

        let config = manager.load_config().unwrap();
        assert!(config.data_safe);
        assert!(config.passive_mode);
        assert_eq!(config.log_dir, "logs");
    }

    #[test]
    fn test_missing_hosts_file() {
        let (_temp_dir, manager) = manager();
        assert!(manager.load_hosts().unwrap().is_empty());
    }

    #[test]
    fn test_load_hosts_flattens_groups() {
        let (_temp_dir, manager) = manager();
        let content = r#"
[[groups]]
name = "work"

[[groups.hosts]]
alias = "backup"
host = "backup.example.com"
user = "ops"
password = "pw"
port = 2121

[[groups.hosts]]
alias = "backup"
host = "duplicate.example.com"
user = "ops"

[[groups]]
name = "public"

[[groups.hosts]]
alias = "mirror"
host = "mirror.example.org"
user = "anonymous"
passive = false
"#;
        fs::write(manager.get_hosts_path(), content).unwrap();

        let hosts = manager.load_hosts().unwrap();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].host, "backup.example.com");
        assert_eq!(hosts[0].group.as_deref(), Some("work"));
        assert_eq!(hosts[0].port, Some(2121));
        assert_eq!(hosts[1].group.as_deref(), Some("public"));
        assert_eq!(hosts[1].passive, Some(false));
        assert_eq!(hosts[1].password, "");
    }

    #[test]
    fn test_save_hosts_round_trip() {
        let (_temp_dir, manager) = manager();
        let group = HostGroup {
            name: "lab".to_string(),
            description: None,
            hosts: vec![FtpHost::new(
                "lab".to_string(),
                "10.0.0.5".to_string(),
                "tester".to_string(),
            )],
        };
        manager.save_hosts(&[group]).unwrap();

        let hosts = manager.load_hosts().unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].host, "10.0.0.5");
        assert_eq!(hosts[0].group.as_deref(), Some("lab"));
    }
}
