//! Runtime configuration read from the environment (and an optional `.env` file loaded by the binary).

use std::{
    fmt::{
        Display,
    },
    path::{
        PathBuf,
    },
    str::{
        FromStr,
    },
};

use crate::{
    auth::{
        AuthConfig,
        CREDENTIALS_DIRECTORY,
    },
    Error,
    MediaUploader,
    DEFAULT_BASE_URL,
    DEFAULT_CHUNK_SIZE,
    DEFAULT_MAX_RECOVERIES,
};

pub const ENV_CLIENT_SECRETS: &str = "YT_THUMBNAIL_CLIENT_SECRETS";
pub const ENV_CREDENTIALS_DIR: &str = "YT_THUMBNAIL_CREDENTIALS_DIR";
pub const ENV_API_BASE_URL: &str = "YT_THUMBNAIL_API_BASE_URL";
pub const ENV_CHUNK_SIZE: &str = "YT_THUMBNAIL_CHUNK_SIZE";
pub const ENV_DIRECT_UPLOAD: &str = "YT_THUMBNAIL_DIRECT_UPLOAD";
pub const ENV_MAX_RECOVERIES: &str = "YT_THUMBNAIL_MAX_RECOVERIES";
pub const ENV_PROGRESS_BAR: &str = "YT_THUMBNAIL_PROGRESS_BAR";

const DEFAULT_CLIENT_SECRETS: &str = "client_secrets.json";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadOptions {
    pub direct_upload: bool,
    pub chunk_size: usize,
    pub max_recoveries: u32,
    pub progress_bar: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        UploadOptions {
            direct_upload: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_recoveries: DEFAULT_MAX_RECOVERIES,
            progress_bar: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub auth: AuthConfig,
    pub api_base_url: String,
    pub upload: UploadOptions,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
        where
            F: Fn(&str) -> Option<String>,
    {
        let client_secrets = lookup(ENV_CLIENT_SECRETS)
            .map(PathBuf::from)
            .unwrap_or_else(|| DEFAULT_CLIENT_SECRETS.into());

        let credentials_dir = match lookup(ENV_CREDENTIALS_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => match dirs::home_dir() {
                Some(home) => home.join(CREDENTIALS_DIRECTORY),
                None => return Err(Error::Config(format!("couldn't determine the home directory, set {}", ENV_CREDENTIALS_DIR))),
            },
        };

        let api_base_url = lookup(ENV_API_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.into());

        let chunk_size = parse_var(&lookup, ENV_CHUNK_SIZE, DEFAULT_CHUNK_SIZE)?;
        let chunk_size = MediaUploader::validate_chunk_size(chunk_size)
            .map_err(|err| Error::Config(format!("{}: {}", ENV_CHUNK_SIZE, err)))?;

        let upload = UploadOptions {
            direct_upload: parse_flag(&lookup, ENV_DIRECT_UPLOAD)?,
            chunk_size,
            max_recoveries: parse_var(&lookup, ENV_MAX_RECOVERIES, DEFAULT_MAX_RECOVERIES)?,
            progress_bar: parse_flag(&lookup, ENV_PROGRESS_BAR)?,
        };

        Ok(Config {
            auth: AuthConfig { client_secrets, credentials_dir },
            api_base_url,
            upload,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, Error>
    where
        F: Fn(&str) -> Option<String>,
        T: FromStr,
        T::Err: Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|err| Error::Config(format!("{}={:?}: {}", key, value, err))),
    }
}

fn parse_flag<F>(lookup: &F, key: &str) -> Result<bool, Error>
    where
        F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{}={:?} is not a boolean", key, value))),
    }
}
