use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub youtube: YoutubeConfig,
    pub facebook: FacebookConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct YoutubeConfig {
    /// OAuth access token for the YouTube Data API. Absent means the account
    /// is not linked and the platform is skipped entirely.
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FacebookConfig {
    /// User access token for the Facebook Graph API. Absent means the account
    /// is not linked and the platform is skipped entirely.
    pub access_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Config {
            youtube: YoutubeConfig {
                access_token: env::var("YOUTUBE_ACCESS_TOKEN").ok(),
            },
            facebook: FacebookConfig {
                access_token: env::var("FACEBOOK_ACCESS_TOKEN").ok(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Scheduling needs at least one linked platform.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.youtube.access_token.is_none() && self.facebook.access_token.is_none() {
            return Err(ConfigError::NoPlatformLinked);
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No streaming platform is linked: set YOUTUBE_ACCESS_TOKEN or FACEBOOK_ACCESS_TOKEN")]
    NoPlatformLinked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_linked_platforms() {
        let config = Config::default();
        assert!(config.youtube.access_token.is_none());
        assert!(config.facebook.access_token.is_none());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoPlatformLinked)
        ));
    }

    #[test]
    fn one_linked_platform_is_enough() {
        let config = Config {
            youtube: YoutubeConfig {
                access_token: Some("token".to_string()),
            },
            facebook: FacebookConfig::default(),
        };
        assert!(config.validate().is_ok());
    }
}
