//! Config command implementations

use std::path::Path;

use anyhow::{Context, Result};

use crate::output::{format_profiles, print_info, print_success, print_warning};
use mcc_core::config::{self, ConfigFile, Profile};
use mcc_core::error::ConfigError;

/// Load the profiles file, or an empty one if it does not exist yet
fn load_or_default(path: &Path) -> Result<ConfigFile> {
    match config::load_config(path) {
        Ok(file) => Ok(file),
        Err(ConfigError::NotFound(_)) => Ok(ConfigFile::default()),
        Err(e) => Err(e).with_context(|| format!("Failed to load config file: {:?}", path)),
    }
}

fn save(path: &Path, file: &ConfigFile) -> Result<()> {
    config::save_config(path, file)
        .with_context(|| format!("Failed to write config file: {:?}", path))
}

/// Print the config file path
pub fn config_path(path: &Path) -> Result<()> {
    println!("{}", path.display());
    Ok(())
}

/// Show saved profiles and client settings
///
/// Passwords are never printed.
pub fn config_show(path: &Path) -> Result<()> {
    if !path.exists() {
        print_warning(&format!("No configuration file found at {:?}", path));
        print_info("Run 'mcc config add <name> --server <host> --username <user>' to create one");
        return Ok(());
    }

    let file: ConfigFile = config::load_config(path)
        .with_context(|| format!("Failed to load config file: {:?}", path))?;

    print_info(&format!("Configuration file: {:?}", path));
    println!();
    println!(
        "{}",
        format_profiles(
            &file.profiles,
            file.default_profile().map(|p| p.name.as_str())
        )
    );
    println!();
    println!("[client]");
    print!("{}", toml::to_string_pretty(&file.client)?);

    Ok(())
}

/// Save a new profile
pub fn config_add(path: &Path, profile: Profile, make_default: bool) -> Result<()> {
    let mut file = load_or_default(path)?;
    let name = profile.name.clone();

    file.add_profile(profile, make_default)?;
    save(path, &file)?;

    if file.default_profile.as_deref() == Some(name.as_str()) {
        print_success(&format!("Added profile '{}' (default)", name));
    } else {
        print_success(&format!("Added profile '{}'", name));
    }
    Ok(())
}

/// Delete a saved profile
pub fn config_remove(path: &Path, name: &str) -> Result<()> {
    let mut file = load_or_default(path)?;

    let removed = file.remove_profile(name)?;
    save(path, &file)?;

    print_success(&format!("Removed profile '{}' ({})", removed.name, removed.server));
    if file.default_profile.is_none() && !file.profiles.is_empty() {
        print_info("No default profile set, choose one with 'mcc config default <name>'");
    }
    Ok(())
}

/// Make a saved profile the default
pub fn config_default(path: &Path, name: &str) -> Result<()> {
    let mut file = load_or_default(path)?;

    file.set_default(name)?;
    save(path, &file)?;

    print_success(&format!("Default profile is now '{}'", name));
    Ok(())
}
