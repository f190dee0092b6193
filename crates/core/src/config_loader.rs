use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads application configuration by layering defaults, the TOML file and
    /// `BVP_`-prefixed environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be parsed.
    pub fn load(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Self::figment(path).extract()?;
        tracing::debug!(path, mode = %config.mode, "Loaded configuration");
        Ok(config)
    }

    /// Loads application configuration with a profile override file
    /// (`config/Config.<profile>.toml` next to the base file).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed.
    pub fn load_with_profile(path: &str, profile: &str) -> Result<AppConfig> {
        let profile_path = match path.rsplit_once('.') {
            Some((stem, ext)) => format!("{stem}.{profile}.{ext}"),
            None => format!("{path}.{profile}"),
        };
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Toml::file(profile_path))
            .merge(Env::prefixed("BVP_").split("__"))
            .extract()?;
        tracing::debug!(path, profile, mode = %config.mode, "Loaded configuration");

        Ok(config)
    }

    fn figment(path: &str) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("BVP_").split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperatingMode;

    #[test]
    fn test_defaults_without_file() {
        figment::Jail::expect_with(|_jail| {
            let config = ConfigLoader::load("config/Missing.toml").unwrap();
            assert_eq!(config.mode, OperatingMode::Demo);
            assert_eq!(config.addressing.scheme, "ea1");
            assert_eq!(config.sources.default_preferred, "MDC");
            Ok(())
        });
    }

    #[test]
    fn test_env_mode_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "Config.toml",
                r#"
                mode = "live"

                [server]
                host = "127.0.0.1"
                port = 8080
                "#,
            )?;
            jail.set_env("BVP_MODE", "play");

            let config = ConfigLoader::load("Config.toml").unwrap();
            assert_eq!(config.mode, OperatingMode::Play);
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.database.max_connections, 5);
            Ok(())
        });
    }

    #[test]
    fn test_profile_file_is_layered() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("Config.toml", "mode = \"live\"")?;
            jail.create_file("Config.play.toml", "mode = \"play\"")?;

            let config = ConfigLoader::load_with_profile("Config.toml", "play").unwrap();
            assert_eq!(config.mode, OperatingMode::Play);
            Ok(())
        });
    }
}
