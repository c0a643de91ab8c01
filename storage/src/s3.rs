use http::{
    uri::{Authority, Scheme},
    Uri,
};
use object_store::aws::AmazonS3;
use tracing::{event, Level};

#[derive(Debug, Clone)]
pub struct S3ProviderConfig {
    pub endpoint: Option<Uri>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_key: Option<String>,
    pub virtual_host_style: Option<bool>,
    /// The bucket name, optionally followed by a path prefix, e.g. `my-bucket/images`.
    pub base_location: String,
    /// Overrides the default `https://{bucket}.s3.amazonaws.com` URL for public links.
    pub public_url_base: Option<String>,
}

/// Split a base location into the bucket and the optional path prefix inside it.
pub(crate) fn split_base_location(base_location: &str) -> (&str, Option<&str>) {
    match base_location.split_once('/') {
        Some((bucket, prefix)) => {
            let prefix = prefix.trim_matches('/');
            (bucket, (!prefix.is_empty()).then_some(prefix))
        }
        None => (base_location, None),
    }
}

/// The canonical public URL of a bucket.
pub(crate) fn bucket_url(bucket: &str) -> String {
    format!("https://{bucket}.s3.amazonaws.com")
}

pub(crate) fn create_store(config: &S3ProviderConfig) -> Result<AmazonS3, eyre::Report> {
    let virtual_host_style = config.virtual_host_style.unwrap_or(false);

    if config.base_location.is_empty() {
        return Err(eyre::eyre!("base_location is required"));
    }

    // Get just the bucket name. The base path is handled in [[Operator]].
    let (bucket, _) = split_base_location(&config.base_location);

    let mut builder = object_store::aws::AmazonS3Builder::new()
        .with_virtual_hosted_style_request(virtual_host_style)
        .with_bucket_name(bucket);

    match (config.access_key_id.as_ref(), config.secret_key.as_ref()) {
        (Some(access_key_id), Some(secret_key)) => {
            builder = builder
                .with_access_key_id(access_key_id.as_str())
                .with_secret_access_key(secret_key.as_str());
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(eyre::eyre!(
                "access_key_id and secret_key must be both set or both unset"
            ))
        }
        (None, None) => {}
    };

    if let Some(endpoint) = config.endpoint.as_ref() {
        event!(Level::DEBUG, ?endpoint);
        let needs_scheme = endpoint.scheme().is_none();

        let e = if virtual_host_style {
            // When using virtual host style, object_store requires us to prepend the bucket name
            // to the endpoint.
            let parts = endpoint.to_owned().into_parts();
            let authority = parts
                .authority
                .unwrap_or_else(|| Authority::from_static("missing-host"));
            let new_domain = format!("{}.{}", bucket, authority.as_str());
            let scheme = parts.scheme.unwrap_or(Scheme::HTTPS);

            format!("{}://{}", scheme.as_str(), new_domain)
        } else if needs_scheme {
            // We tolerate a missing https:// in the endpoint, but object_store will panic without it.
            let parts = endpoint.to_owned().into_parts();
            match parts.authority {
                Some(authority) => format!("https://{}", authority.as_str()),
                None => return Err(eyre::eyre!("endpoint {endpoint} has no host")),
            }
        } else {
            endpoint.to_string()
        };
        event!(Level::DEBUG, endpoint=%e, "Creating S3 provider with custom endpoint");
        builder = builder.with_endpoint(e);
    }

    if let Some(region) = config.region.as_ref() {
        builder = builder.with_region(region.as_str());
    }

    let acc = builder.build()?;

    Ok(acc)
}
