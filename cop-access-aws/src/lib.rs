//! AWS-backed provider for the secure object access core.
//!
//! The deployment target is a secure-object proxy speaking the STS and S3
//! wire protocols: tokens are exchanged via `AssumeRoleWithWebIdentity` and
//! documents retrieved with `GetObject`, so both endpoints are overridable
//! to point at the proxy instead of AWS proper.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_sts::Client as StsClient;
use aws_types::region::Region;
use cop_access_core::broker::{CredentialBroker, TemporaryStorageCredentials, TokenExchanger};
use cop_access_core::fetch::{DocumentFetcher, ObjectStore, StoreError};
use cop_access_core::AccessError;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const ROLE_ARN_ENV: &str = "COP_ROLE_ARN";
const REGION_ENV: &str = "COP_REGION";
const STS_ENDPOINT_ENV: &str = "COP_STS_ENDPOINT";
const S3_ENDPOINT_ENV: &str = "COP_S3_ENDPOINT";
const SESSION_DURATION_ENV: &str = "COP_SESSION_DURATION_SECS";
const DEFAULT_REGION: &str = "us-east-1";

/// Environment-driven provider configuration.
#[derive(Debug, Clone)]
pub struct AwsProviderConfig {
    pub role_arn: String,
    pub region: String,
    pub sts_endpoint: Option<String>,
    pub s3_endpoint: Option<String>,
    pub session_duration: Option<Duration>,
}

impl AwsProviderConfig {
    pub fn load_from_env() -> Result<Self> {
        let role_arn =
            env::var(ROLE_ARN_ENV).context("COP_ROLE_ARN must be set for the AWS provider")?;
        let region = env::var(REGION_ENV).unwrap_or_else(|_| DEFAULT_REGION.to_string());
        let sts_endpoint = env::var(STS_ENDPOINT_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty());
        let s3_endpoint = env::var(S3_ENDPOINT_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty());
        let session_duration = env::var(SESSION_DURATION_ENV)
            .ok()
            .and_then(|value| value.parse().ok())
            .map(Duration::from_secs);

        Ok(Self {
            role_arn,
            region,
            sts_endpoint,
            s3_endpoint,
            session_duration,
        })
    }
}

/// Components wired into the core's broker/fetcher seams.
pub struct ProviderComponents {
    pub exchanger: Arc<dyn TokenExchanger>,
    pub store: Arc<dyn ObjectStore>,
    pub role_arn: String,
}

/// Build the STS exchanger and S3 store from environment configuration.
pub async fn build_components() -> Result<ProviderComponents> {
    build_components_with(AwsProviderConfig::load_from_env()?).await
}

/// Build the STS exchanger and S3 store from explicit configuration.
pub async fn build_components_with(config: AwsProviderConfig) -> Result<ProviderComponents> {
    // the web-identity exchange is unsigned, so no ambient credentials
    let shared_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .no_credentials()
        .load()
        .await;

    let sts_client = {
        let mut builder = aws_sdk_sts::config::Builder::from(&shared_config);
        if let Some(endpoint) = config.sts_endpoint.as_deref() {
            builder = builder.endpoint_url(endpoint);
        }
        StsClient::from_conf(builder.build())
    };

    Ok(ProviderComponents {
        exchanger: Arc::new(StsTokenExchanger::new(sts_client)),
        store: Arc::new(S3ObjectStore::new(config.region, config.s3_endpoint)),
        role_arn: config.role_arn,
    })
}

/// Convenience wiring for the full classified document path.
pub async fn build_fetcher() -> Result<DocumentFetcher> {
    let config = AwsProviderConfig::load_from_env()?;
    let session_duration = config.session_duration;
    let components = build_components_with(config).await?;

    let mut broker = CredentialBroker::new(components.exchanger, components.role_arn);
    if let Some(duration) = session_duration {
        broker = broker.with_duration(duration);
    }
    Ok(DocumentFetcher::new(broker, components.store))
}

/// Token exchanger backed by `sts:AssumeRoleWithWebIdentity`.
pub struct StsTokenExchanger {
    client: StsClient,
}

impl StsTokenExchanger {
    pub fn new(client: StsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenExchanger for StsTokenExchanger {
    async fn exchange(
        &self,
        identity_token: &str,
        role_arn: &str,
        session_name: &str,
        duration: Duration,
    ) -> cop_access_core::Result<TemporaryStorageCredentials> {
        let response = self
            .client
            .assume_role_with_web_identity()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .web_identity_token(identity_token)
            .duration_seconds(duration.as_secs() as i32)
            .send()
            .await
            .map_err(|err| AccessError::CredentialExchange(err.to_string()))?;

        let credentials = response.credentials().ok_or_else(|| {
            AccessError::CredentialExchange("token service returned no credentials".into())
        })?;

        Ok(TemporaryStorageCredentials {
            key_id: credentials.access_key_id().to_string(),
            secret: credentials.secret_access_key().to_string(),
            session_token: Some(credentials.session_token().to_string()),
        })
    }
}

/// Object store addressing a bucket-and-key namespace with per-fetch
/// brokered credentials. A fresh client is built per retrieval because the
/// credentials differ on every exchange.
pub struct S3ObjectStore {
    region: String,
    endpoint: Option<String>,
}

impl S3ObjectStore {
    pub fn new(region: impl Into<String>, endpoint: Option<String>) -> Self {
        Self {
            region: region.into(),
            endpoint,
        }
    }

    fn client(&self, credentials: &TemporaryStorageCredentials) -> S3Client {
        let creds = aws_sdk_s3::config::Credentials::new(
            credentials.key_id.clone(),
            credentials.secret.clone(),
            credentials.session_token.clone(),
            None,
            "cop-access-broker",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .credentials_provider(creds)
            // proxies serve path-style addressing
            .force_path_style(true);
        if let Some(endpoint) = self.endpoint.as_deref() {
            builder = builder.endpoint_url(endpoint);
        }
        S3Client::from_conf(builder.build())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(
        &self,
        credentials: &TemporaryStorageCredentials,
        container: &str,
        key: &str,
    ) -> std::result::Result<Vec<u8>, StoreError> {
        debug!(container, key, "issuing GetObject");
        let response = self
            .client(credentials)
            .get_object()
            .bucket(container)
            .key(key)
            .send()
            .await
            .map_err(classify_get_error)?;

        // aggregates chunked transfer into a whole buffer
        let body = response
            .body
            .collect()
            .await
            .map_err(|err| StoreError::Upstream(err.to_string()))?;
        Ok(body.into_bytes().to_vec())
    }
}

fn classify_get_error(err: SdkError<GetObjectError>) -> StoreError {
    if let SdkError::ServiceError(service) = &err {
        let service_err = service.err();
        if service_err.is_no_such_key()
            || matches!(service_err.meta().code(), Some("NoSuchKey" | "NotFound"))
        {
            return StoreError::NotFound;
        }
    }
    StoreError::Upstream(err.to_string())
}
