//! # S3-compatible object storage
//!
//! Implements the core [`ObjectStore`] trait with a single signed
//! `PUT /<bucket>/<key>` request (path-style addressing), which works against
//! DigitalOcean Spaces, AWS S3 and MinIO alike. Objects are written with a
//! `public-read` ACL so the returned public URL resolves immediately.
//!
//! Requests are signed with AWS Signature Version 4.

use async_trait::async_trait;
use blog_migrate_core::config::{encode_key, StorageConfig};
use blog_migrate_core::contract::ObjectStore;
use blog_migrate_core::error::{ConfigError, UploadError};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::{Digest, Sha256};
use url::Url;

use crate::load_config::{storage_credentials_from_env, StorageCredentials};

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "s3";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";

pub struct SpacesClient {
    http: Client,
    endpoint: Url,
    bucket: String,
    region: String,
    credentials: StorageCredentials,
}

/// Headers that authenticate one PUT request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub amz_date: String,
    pub content_sha256: String,
    pub authorization: String,
}

impl SpacesClient {
    pub fn new(storage: &StorageConfig, credentials: StorageCredentials) -> Result<Self, ConfigError> {
        let endpoint = Url::parse(&storage.endpoint).map_err(|e| ConfigError::Invalid {
            name: "storage.endpoint".to_string(),
            reason: e.to_string(),
        })?;
        if endpoint.host_str().is_none() {
            return Err(ConfigError::Invalid {
                name: "storage.endpoint".to_string(),
                reason: "URL has no host".to_string(),
            });
        }
        Ok(Self {
            http: Client::new(),
            endpoint,
            bucket: storage.bucket.clone(),
            region: storage.region.clone(),
            credentials,
        })
    }

    /// Build a client with credentials from `SPACES_ACCESS_KEY_ID` / `SPACES_SECRET_ACCESS_KEY`.
    pub fn new_from_env(storage: &StorageConfig) -> Result<Self, ConfigError> {
        let credentials = storage_credentials_from_env()?;
        tracing::info!(
            endpoint = %storage.endpoint,
            bucket = %storage.bucket,
            region = %storage.region,
            "Initialized SpacesClient from environment"
        );
        Self::new(storage, credentials)
    }

    /// Path of an object: `<endpoint path>/<bucket>/<key>`, percent-encoded per segment.
    fn canonical_uri(&self, key: &str) -> String {
        let prefix = self.endpoint.path().trim_end_matches('/');
        format!(
            "{prefix}/{}/{}",
            urlencoding::encode(&self.bucket),
            encode_key(key)
        )
    }

    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Signature V4 headers for a public-read PUT of `body` to `canonical_uri`.
    pub fn sign_put(&self, canonical_uri: &str, body: &[u8], now: DateTime<Utc>) -> SignedHeaders {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let content_sha256 = hex::encode(Sha256::digest(body));
        let host = self.host();

        let authorization = authorization(
            &self.credentials,
            &self.region,
            "PUT",
            canonical_uri,
            &[
                ("host", host.as_str()),
                ("x-amz-acl", "public-read"),
                ("x-amz-content-sha256", content_sha256.as_str()),
                ("x-amz-date", amz_date.as_str()),
            ],
            &content_sha256,
            now,
        );

        SignedHeaders {
            amz_date,
            content_sha256,
            authorization,
        }
    }
}

/// Signature V4 `Authorization` value for a request without a query string.
///
/// `headers` are the signed headers as lowercase names with trimmed values.
pub fn authorization(
    credentials: &StorageCredentials,
    region: &str,
    method: &str,
    canonical_uri: &str,
    headers: &[(&str, &str)],
    payload_sha256: &str,
    now: DateTime<Utc>,
) -> String {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();

    let mut headers = headers.to_vec();
    headers.sort_by_key(|(name, _)| *name);
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{method}\n{canonical_uri}\n\n{canonical_headers}\n{signed_headers}\n{payload_sha256}"
    );
    let scope = format!("{date_stamp}/{region}/{SERVICE}/aws4_request");
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let secret = format!("AWS4{}", credentials.secret_access_key);
    let k_date = hmac(secret.as_bytes(), date_stamp.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, SERVICE.as_bytes());
    let k_signing = hmac(&k_service, b"aws4_request");
    let signature = hex::encode(hmac(&k_signing, string_to_sign.as_bytes()));

    format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        credentials.access_key_id
    )
}

#[async_trait]
impl ObjectStore for SpacesClient {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), UploadError> {
        let storage_err = |message: String| UploadError::Storage {
            key: key.to_string(),
            message,
        };

        let canonical_uri = self.canonical_uri(key);
        let mut url = self.endpoint.clone();
        url.set_path(&canonical_uri);
        let signed = self.sign_put(&canonical_uri, &body, Utc::now());

        tracing::info!(key, bucket = %self.bucket, size = body.len(), "[UPLOAD] PUT object");
        let response = self
            .http
            .put(url)
            .header("x-amz-acl", "public-read")
            .header("x-amz-content-sha256", &signed.content_sha256)
            .header("x-amz-date", &signed.amz_date)
            .header(reqwest::header::AUTHORIZATION, &signed.authorization)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, key, "[UPLOAD] Storage request failed");
                storage_err(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
            tracing::error!(status = %status, key, body = %text, "[UPLOAD] Storage returned error");
            return Err(storage_err(format!("HTTP {status}: {text}")));
        }
        Ok(())
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
