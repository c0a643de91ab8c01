use std::{path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};
use variant_worker_storage::{LocalProviderConfig, ProviderConfig, S3ProviderConfig};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageProvider {
    Local,
    S3,
    R2,
}

#[derive(Debug, Parser)]
#[clap(about = "Generates resized variants of uploaded images")]
pub struct Config {
    #[clap(long = "db", env)]
    pub database_url: String,
    #[clap(long, env, default_value_t = 8)]
    pub database_max_connections: usize,

    #[clap(long, env, default_value_t = String::from("redis://localhost:6379"))]
    pub redis_url: String,
    /// The pub/sub channel that upload notifications arrive on
    #[clap(long, env, default_value_t = String::from("image:process"))]
    pub image_channel: String,

    #[clap(long, env, value_enum, default_value_t = StorageProvider::Local)]
    pub storage_provider: StorageProvider,
    #[clap(long, env, default_value = "./uploads")]
    pub storage_local_path: PathBuf,
    #[clap(long, env, default_value_t = String::from("http://localhost:8080/uploads"))]
    pub storage_base_url: String,

    #[clap(long, env)]
    pub aws_access_key_id: Option<String>,
    #[clap(long, env)]
    pub aws_secret_access_key: Option<String>,
    #[clap(long, env, default_value_t = String::from("us-east-1"))]
    pub aws_region: String,
    #[clap(long, env)]
    pub aws_bucket: Option<String>,

    #[clap(long, env)]
    pub r2_account_id: Option<String>,
    #[clap(long, env)]
    pub r2_access_key_id: Option<String>,
    #[clap(long, env)]
    pub r2_secret_access_key: Option<String>,
    #[clap(long, env)]
    pub r2_bucket: Option<String>,
    #[clap(long, env)]
    pub r2_public_url: Option<String>,

    /// How many images to process at once
    #[clap(long, env, default_value_t = 1)]
    pub worker_count: usize,
    #[clap(long, env, default_value_t = 64)]
    pub queue_size: usize,
    /// Upper bound for each storage or database call
    #[clap(long, env, default_value_t = 30)]
    pub io_timeout_secs: u64,

    /// How often to look for pending images that were never picked up. 0 disables the sweep.
    #[clap(long, env, default_value_t = 300)]
    pub sweep_interval_secs: u64,
    /// Only images that have been pending for at least this long are picked up by the sweep.
    #[clap(long, env, default_value_t = 120)]
    pub sweep_grace_secs: u64,
    #[clap(long, env, default_value_t = 100)]
    pub sweep_batch_size: i64,

    #[clap(long, env)]
    pub honeycomb_team: Option<String>,
    #[clap(long, env, default_value_t = String::from("variant-worker"))]
    pub honeycomb_dataset: String,
}

fn required(value: &Option<String>, name: &'static str) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.clone()),
        _ => Err(Error::MissingConfig(name)),
    }
}

impl Config {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    pub fn storage_config(&self) -> Result<ProviderConfig> {
        let config = match self.storage_provider {
            StorageProvider::Local => ProviderConfig::Local(LocalProviderConfig {
                root: self.storage_local_path.clone(),
                public_url_base: self.storage_base_url.clone(),
            }),
            StorageProvider::S3 => ProviderConfig::S3(S3ProviderConfig {
                endpoint: None,
                region: Some(self.aws_region.clone()),
                access_key_id: self.aws_access_key_id.clone(),
                secret_key: self.aws_secret_access_key.clone(),
                virtual_host_style: None,
                base_location: required(&self.aws_bucket, "AWS_BUCKET")?,
                public_url_base: None,
            }),
            StorageProvider::R2 => ProviderConfig::r2(
                &required(&self.r2_account_id, "R2_ACCOUNT_ID")?,
                required(&self.r2_access_key_id, "R2_ACCESS_KEY_ID")?,
                required(&self.r2_secret_access_key, "R2_SECRET_ACCESS_KEY")?,
                required(&self.r2_bucket, "R2_BUCKET")?,
                required(&self.r2_public_url, "R2_PUBLIC_URL")?,
            )?,
        };

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut full = vec!["variant-worker", "--db", "postgres://localhost/images"];
        full.extend_from_slice(args);
        Config::try_parse_from(full).unwrap()
    }

    #[test]
    fn local_storage() {
        let config = parse(&[
            "--storage-provider",
            "local",
            "--storage-local-path",
            "/srv/uploads",
            "--storage-base-url",
            "https://img.example.com/uploads",
        ]);

        let ProviderConfig::Local(local) = config.storage_config().unwrap() else {
            panic!("expected local storage");
        };
        assert_eq!(local.root, PathBuf::from("/srv/uploads"));
        assert_eq!(local.public_url_base, "https://img.example.com/uploads");
    }

    #[test]
    fn s3_requires_bucket() {
        let config = parse(&["--storage-provider", "s3", "--aws-bucket", ""]);
        let err = config.storage_config().unwrap_err();
        assert!(matches!(err, Error::MissingConfig("AWS_BUCKET")), "got {err:?}");

        let config = parse(&[
            "--storage-provider",
            "s3",
            "--aws-bucket",
            "uploads",
            "--aws-region",
            "eu-west-1",
        ]);
        let ProviderConfig::S3(s3) = config.storage_config().unwrap() else {
            panic!("expected s3 storage");
        };
        assert_eq!(s3.base_location, "uploads");
        assert_eq!(s3.region.as_deref(), Some("eu-west-1"));
        assert!(s3.public_url_base.is_none());
    }

    #[test]
    fn r2_storage() {
        let config = parse(&[
            "--storage-provider",
            "r2",
            "--r2-account-id",
            "acct",
            "--r2-access-key-id",
            "key",
            "--r2-secret-access-key",
            "secret",
            "--r2-bucket",
            "images",
            "--r2-public-url",
            "https://cdn.example.com",
        ]);
        let ProviderConfig::S3(s3) = config.storage_config().unwrap() else {
            panic!("expected s3-compatible storage");
        };
        assert_eq!(s3.base_location, "images");
        assert_eq!(s3.public_url_base.as_deref(), Some("https://cdn.example.com"));

        let config = parse(&["--storage-provider", "r2", "--r2-account-id", "acct"]);
        assert!(matches!(
            config.storage_config(),
            Err(Error::MissingConfig(_))
        ));
    }

    #[test]
    fn timeouts() {
        let config = parse(&["--io-timeout-secs", "5"]);
        assert_eq!(config.io_timeout(), Duration::from_secs(5));
    }
}
