//! Utility functions for creating s3 clients
use aws_sdk_s3::config::Region;
use aws_sdk_s3::Client;

use crate::location::DEFAULT_REGION;

/// Connection settings handed to [`client`]. Credentials are never part of
/// this; they are resolved by the AWS default provider chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOptions {
    pub profile: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
}

pub async fn client(options: &ClientOptions) -> Client {
    let mut loader = aws_config::from_env();
    if let Some(profile) = &options.profile {
        loader = loader.profile_name(profile);
    }
    let base_config = loader.load().await;

    let region = options
        .region
        .clone()
        .or_else(|| base_config.region().map(|r| r.to_string()))
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    let mut s3_config = aws_sdk_s3::config::Builder::from(&base_config).region(Region::new(region));
    if let Some(url) = &options.endpoint_url {
        // Custom endpoints (minio, localstack) only understand path-style requests.
        s3_config = s3_config.endpoint_url(url).force_path_style(true);
    }

    Client::from_conf(s3_config.build())
}
