use std::path::PathBuf;

use object_store::{local::LocalFileSystem, path::Path};
use tracing::{event, Level};

use crate::{
    error::{Error, Result},
    operator::Operator,
    s3::{bucket_url, create_store, split_base_location, S3ProviderConfig},
};

#[derive(Debug, Clone)]
pub struct LocalProviderConfig {
    /// Directory that all object paths are relative to.
    pub root: PathBuf,
    pub public_url_base: String,
}

#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Local(LocalProviderConfig),
    /// S3 or compatible storage
    S3(S3ProviderConfig),
}

impl ProviderConfig {
    /// Cloudflare R2, which speaks the S3 protocol at an account-specific endpoint and serves
    /// public objects from a separately configured URL.
    pub fn r2(
        account_id: &str,
        access_key_id: String,
        secret_key: String,
        bucket: String,
        public_url_base: String,
    ) -> Result<Self> {
        if account_id.is_empty() {
            return Err(Error::MissingField("r2_account_id"));
        }

        let endpoint = format!("https://{account_id}.r2.cloudflarestorage.com").parse()?;
        Ok(Self::S3(S3ProviderConfig {
            endpoint: Some(endpoint),
            region: Some("auto".to_string()),
            access_key_id: Some(access_key_id),
            secret_key: Some(secret_key),
            virtual_host_style: Some(false),
            base_location: bucket,
            public_url_base: Some(public_url_base),
        }))
    }
}

pub async fn create_operator(config: ProviderConfig) -> Result<Operator> {
    match config {
        ProviderConfig::Local(config) => {
            tokio::fs::create_dir_all(&config.root).await?;
            let store = LocalFileSystem::new_with_prefix(&config.root)?;
            event!(Level::INFO, root=%config.root.display(), "Using local filesystem storage");
            Ok(Operator::new(Box::new(store), config.public_url_base)
                .with_store_content_type(false))
        }
        ProviderConfig::S3(config) => {
            let store = create_store(&config).map_err(Error::Backend)?;
            let (bucket, prefix) = split_base_location(&config.base_location);
            let public_url_base = config
                .public_url_base
                .clone()
                .unwrap_or_else(|| bucket_url(bucket));
            event!(Level::INFO, %bucket, ?prefix, "Using S3 storage");

            Ok(Operator::new(Box::new(store), public_url_base)
                .with_path_prefix(prefix.map(Path::from)))
        }
    }
}
