use crate::Config;
use serde::{Deserialize, Deserializer, de};
use std::{
    collections::HashMap,
    fmt::Display,
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_JPEG_QUALITY: u8 = 75;

pub const PORT: &str = "PORT";
pub const HOST: &str = "HOST";
pub const IMAGES_DIR: &str = "IMAGES_DIR";
pub const JPEG_QUALITY: &str = "JPEG_QUALITY";
pub const CREATE_GENERATED_DIRS: &str = "CREATE_GENERATED_DIRS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load env file {path:?}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] de::value::Error),
}

impl Config {
    /// Read `env_file` and build the configuration from it. Variables already
    /// set in the process environment win over the file.
    pub fn load(env_file: &Path) -> Result<Self, ConfigError> {
        let loaded = dotenvy::from_path_iter(env_file).map_err(|source| ConfigError::EnvFile {
            path: env_file.to_path_buf(),
            source,
        })?;
        debug!("Loaded env file {:?}", env_file);

        let mut vars = HashMap::new();
        for item in loaded {
            let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                path: env_file.to_path_buf(),
                source,
            })?;
            vars.insert(key, value);
        }

        vars.extend(std::env::vars_os().filter_map(|(key, value)| {
            Some((key.into_string().ok()?, value.into_string().ok()?))
        }));

        Self::from_vars(vars)
    }

    /// Deserialize a configuration from `NAME=value` pairs. Unknown names are
    /// ignored and everything except `PORT` has a default.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let deserializer =
            de::value::MapDeserializer::<_, de::value::Error>::new(vars.into_iter());
        Ok(Config::deserialize(deserializer)?)
    }
}

pub(crate) fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

pub(crate) fn default_images_dir() -> PathBuf {
    PathBuf::from("images")
}

pub(crate) fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

/// Environment values are always strings; parse them into the field type.
pub(crate) fn from_env_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = String::deserialize(deserializer)?;
    raw.trim()
        .parse()
        .map_err(|e| de::Error::custom(format!("{:?}: {}", raw, e)))
}

pub(crate) fn jpeg_quality<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let quality: u8 = from_env_str(deserializer)?;
    if !(1..=100).contains(&quality) {
        return Err(de::Error::custom(format!(
            "JPEG quality {} is outside 1-100",
            quality
        )));
    }
    Ok(quality)
}

pub(crate) fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(de::Error::custom(format!("{:?} is not a boolean", raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        Config::from_vars(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    #[test]
    fn test_port_is_required() {
        let err = config_from(&[("HOST", "127.0.0.1")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains(PORT));
    }

    #[test]
    fn test_defaults_apply() {
        let config = config_from(&[("PORT", "8081"), ("PATH", "/usr/bin")]).unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, default_host());
        assert_eq!(config.images.directory, PathBuf::from("images"));
        assert_eq!(config.images.jpeg_quality, DEFAULT_JPEG_QUALITY);
        assert!(!config.images.create_generated_dirs);
    }

    #[test]
    fn test_all_variables() {
        let config = config_from(&[
            (PORT, " 9000 "),
            (HOST, "::1"),
            (IMAGES_DIR, "/srv/images"),
            (JPEG_QUALITY, "90"),
            (CREATE_GENERATED_DIRS, "yes"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "::1".parse::<IpAddr>().unwrap());
        assert_eq!(config.images.directory, PathBuf::from("/srv/images"));
        assert_eq!(config.images.jpeg_quality, 90);
        assert!(config.images.create_generated_dirs);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for vars in [
            vec![("PORT", "http")],
            vec![("PORT", "70000")],
            vec![("PORT", "80"), ("HOST", "localhost")],
            vec![("PORT", "80"), ("HOST", "")],
            vec![("PORT", "80"), ("JPEG_QUALITY", "0")],
            vec![("PORT", "80"), ("JPEG_QUALITY", "101")],
            vec![("PORT", "80"), ("CREATE_GENERATED_DIRS", "maybe")],
        ] {
            let err = config_from(&vars).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid(_)),
                "{vars:?} should be invalid"
            );
        }
    }

    #[test]
    fn test_invalid_host_names_the_value() {
        let err = config_from(&[("PORT", "80"), ("HOST", "not-an-ip")]).unwrap_err();
        assert!(err.to_string().contains("not-an-ip"), "{err}");
    }

    #[test]
    fn test_missing_env_file_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let err = Config::load(&temp_dir.path().join(".env")).unwrap_err();
        assert!(matches!(err, ConfigError::EnvFile { .. }));
    }

    #[test]
    fn test_load_reads_env_file() {
        let temp_dir = TempDir::new().unwrap();
        let env_file = temp_dir.path().join(".env");
        std::fs::write(
            &env_file,
            "PORT=4321\nIPMARK_TEST_ONLY_KEY=1\n# comment\nCREATE_GENERATED_DIRS=true\n",
        )
        .unwrap();

        let config = Config::load(&env_file).unwrap();
        // PORT may also be set by the surrounding environment
        if std::env::var(PORT).is_err() {
            assert_eq!(config.server.port, 4321);
        }
        if std::env::var(CREATE_GENERATED_DIRS).is_err() {
            assert!(config.images.create_generated_dirs);
        }
    }
}
