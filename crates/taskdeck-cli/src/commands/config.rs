use taskdeck_core::util::{is_http_url, normalize_text_option};

use crate::cli::{ConfigCommands, ConfigKey};
use crate::config_profiles::{default_config_path, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load()?;
    let profile_name = config.resolve_profile_name(global_profile, |key| std::env::var(key).ok());

    match command {
        ConfigCommands::Show => {
            println!("Config file: {}", default_config_path()?.display());
            println!("Profile: {profile_name}");
            let profile = config.profile(&profile_name).cloned().unwrap_or_default();
            println!("  api-url: {}", profile.api_url.as_deref().unwrap_or("(unset)"));
            println!("  user:    {}", profile.user.as_deref().unwrap_or("(unset)"));
            println!(
                "  token:   {}",
                if profile.token.is_some() { "(set)" } else { "(unset)" }
            );
        }
        ConfigCommands::Set {
            activate,
            key,
            value,
        } => {
            apply_setting(&mut config, &profile_name, key, value)?;
            if activate || config.active_profile.is_none() {
                config.active_profile = Some(profile_name.clone());
            }
            let path = config.save()?;
            println!("Updated profile '{profile_name}' in {}", path.display());
        }
    }
    Ok(())
}

pub fn apply_setting(
    config: &mut CliProfilesConfig,
    profile_name: &str,
    key: ConfigKey,
    value: Option<String>,
) -> Result<(), CliError> {
    let value = normalize_text_option(value);
    let profile = config.profile_mut_or_default(profile_name);

    match key {
        ConfigKey::ApiUrl => {
            if let Some(url) = value.as_deref() {
                if !is_http_url(url) {
                    return Err(CliError::Config(format!(
                        "API URL must start with http:// or https://, got '{url}'"
                    )));
                }
            }
            profile.api_url = value;
        }
        ConfigKey::User => profile.user = value,
        ConfigKey::Token => profile.token = value,
    }
    Ok(())
}
