//! Server profiles

use serde::{Deserialize, Serialize};

use super::client::ClientConfig;
use crate::error::ConfigError;

/// One saved server login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile name, unique within the file
    pub name: String,

    /// Server host or relay URL
    pub server: String,

    /// Login user
    pub username: String,

    /// Login password
    #[serde(default)]
    pub password: String,
}

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Profile used when `--profile` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,

    /// Saved profiles
    pub profiles: Vec<Profile>,

    /// Client tuning
    pub client: ClientConfig,
}

impl ConfigFile {
    /// Look up a profile by name
    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// The default profile, or the only profile when there is just one
    pub fn default_profile(&self) -> Option<&Profile> {
        match &self.default_profile {
            Some(name) => self.profile(name),
            None if self.profiles.len() == 1 => self.profiles.first(),
            None => None,
        }
    }

    /// Resolve `--profile`, falling back to the default
    pub fn resolve(&self, name: Option<&str>) -> Result<&Profile, ConfigError> {
        match name {
            Some(name) => self
                .profile(name)
                .ok_or_else(|| ConfigError::ProfileNotFound(name.to_string())),
            None => self.default_profile().ok_or_else(|| {
                ConfigError::Invalid(
                    "no default profile, add one with `mcc config add`".to_string(),
                )
            }),
        }
    }

    /// Add a new profile; the first profile added becomes the default
    pub fn add_profile(&mut self, profile: Profile, make_default: bool) -> Result<(), ConfigError> {
        if self.profile(&profile.name).is_some() {
            return Err(ConfigError::ProfileExists(profile.name));
        }

        if make_default || self.profiles.is_empty() {
            self.default_profile = Some(profile.name.clone());
        }
        self.profiles.push(profile);
        Ok(())
    }

    /// Remove a profile, clearing the default if it pointed there
    pub fn remove_profile(&mut self, name: &str) -> Result<Profile, ConfigError> {
        let index = self
            .profiles
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| ConfigError::ProfileNotFound(name.to_string()))?;

        if self.default_profile.as_deref() == Some(name) {
            self.default_profile = None;
        }
        Ok(self.profiles.remove(index))
    }

    /// Make an existing profile the default
    pub fn set_default(&mut self, name: &str) -> Result<(), ConfigError> {
        if self.profile(name).is_none() {
            return Err(ConfigError::ProfileNotFound(name.to_string()));
        }
        self.default_profile = Some(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config, save_config};
    use std::time::Duration;

    fn profile(name: &str) -> Profile {
        Profile {
            name: name.to_string(),
            server: "mesh.example.com".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn test_first_profile_becomes_default() {
        let mut config = ConfigFile::default();
        config.add_profile(profile("work"), false).unwrap();
        config.add_profile(profile("home"), false).unwrap();

        assert_eq!(config.default_profile.as_deref(), Some("work"));
        assert_eq!(config.resolve(None).unwrap().name, "work");
        assert_eq!(config.resolve(Some("home")).unwrap().name, "home");
    }

    #[test]
    fn test_duplicate_profile_rejected() {
        let mut config = ConfigFile::default();
        config.add_profile(profile("work"), false).unwrap();
        assert!(matches!(
            config.add_profile(profile("work"), true),
            Err(ConfigError::ProfileExists(_))
        ));
    }

    #[test]
    fn test_remove_clears_default() {
        let mut config = ConfigFile::default();
        config.add_profile(profile("work"), false).unwrap();
        config.add_profile(profile("home"), false).unwrap();

        config.remove_profile("work").unwrap();
        assert_eq!(config.default_profile, None);
        // Only one left, so it is used implicitly
        assert_eq!(config.default_profile().unwrap().name, "home");

        assert!(matches!(
            config.remove_profile("work"),
            Err(ConfigError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_set_default_unknown() {
        let mut config = ConfigFile::default();
        config.add_profile(profile("work"), false).unwrap();
        assert!(matches!(
            config.set_default("nope"),
            Err(ConfigError::ProfileNotFound(_))
        ));
        assert!(config.set_default("work").is_ok());
    }

    #[test]
    fn test_parse_minimal_file() {
        let config: ConfigFile = toml::from_str(
            r#"
            [[profiles]]
            name = "default"
            server = "mesh.example.com"
            username = "admin"

            [client]
            request_timeout = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.profiles[0].password, "");
        assert_eq!(config.client.request_timeout, Duration::from_secs(5));
        assert_eq!(config.client.cookie_renewal, Duration::from_secs(600));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ConfigFile::default();
        config.add_profile(profile("work"), true).unwrap();
        save_config(&path, &config).unwrap();

        let loaded: ConfigFile = load_config(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<ConfigFile, _> = load_config(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
