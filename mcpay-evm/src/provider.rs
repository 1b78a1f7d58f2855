//! Managed-custody wallet providers.
//!
//! A [`WalletProvider`] holds user keys on their behalf and signs digests
//! for a provider account id. [`HttpWalletProvider`] talks to such a service
//! over HTTP:
//!
//! - `GET {base}/accounts/{id}` returns `{ "address": "0x…" }`
//! - `POST {base}/accounts/{id}/sign` with `{ "hash": "0x…" }` returns
//!   `{ "signature": "0x…" }`
//!
//! Requests carry `Authorization: Bearer {api key}`.
//!
//! # Environment Variables
//!
//! - `MANAGED_WALLET_API_URL` - base URL of the provider (required)
//! - `MANAGED_WALLET_API_KEY` - bearer token (required)
//! - `MANAGED_WALLET_TIMEOUT_MS` - per-request timeout (optional)

use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes, Signature};
use http::header::{AUTHORIZATION, HeaderValue};
use http::{HeaderMap, StatusCode};
use mcpay::StrategyError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

/// Provider identifier matched against [`WalletRecord::provider`](mcpay::store::WalletRecord).
pub const DEFAULT_PROVIDER_NAME: &str = "managed";

/// Errors that can occur while talking to a wallet provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// A required setting is missing.
    #[error("missing configuration: {0} is not set")]
    MissingConfig(&'static str),
    /// A setting has an unusable value.
    #[error("invalid configuration for {key}: {value:?}")]
    InvalidConfig {
        /// Setting name.
        key: &'static str,
        /// Raw value.
        value: String,
    },
    /// URL parse error.
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// HTTP transport error.
    #[error("HTTP error: {context}: {source}")]
    Http {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// JSON deserialization error.
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// Unexpected HTTP status code.
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        /// Human-readable context.
        context: &'static str,
        /// The HTTP status code.
        status: StatusCode,
        /// The response body.
        body: String,
    },
    /// Failed to read response body.
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// The provider returned something that is not a 65-byte signature.
    #[error("invalid signature from provider: {0}")]
    InvalidSignature(String),
}

impl From<ProviderError> for StrategyError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err.to_string())
    }
}

/// A custody service that signs on behalf of its accounts.
#[async_trait::async_trait]
pub trait WalletProvider: Send + Sync {
    /// Identifier stored in wallet records served by this provider.
    fn provider_name(&self) -> &str;

    /// Looks up the on-chain address of `account_id`.
    async fn account_address(&self, account_id: &str) -> Result<Address, ProviderError>;

    /// Signs a 32-byte digest with the key of `account_id`.
    async fn sign_hash(&self, account_id: &str, hash: B256) -> Result<Signature, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    address: Address,
}

#[derive(Debug, Serialize)]
struct SignRequest {
    hash: B256,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    signature: Bytes,
}

/// [`WalletProvider`] backed by a REST API.
///
/// The inner [`Client`] is shared and safe for concurrent use.
#[derive(Debug, Clone)]
pub struct HttpWalletProvider {
    client: Client,
    base_url: Url,
    headers: HeaderMap,
    timeout: Option<Duration>,
    name: String,
}

impl HttpWalletProvider {
    /// Creates a provider for `base_url` authenticated with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidConfig`] if the URL cannot carry a
    /// path or the key is not a valid header value, and
    /// [`ProviderError::Http`] if the HTTP client cannot be initialized.
    pub fn try_new(base_url: Url, api_key: &str) -> Result<Self, ProviderError> {
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::InvalidConfig {
                key: "MANAGED_WALLET_API_URL",
                value: base_url.to_string(),
            });
        }
        let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
            ProviderError::InvalidConfig {
                key: "MANAGED_WALLET_API_KEY",
                value: "<redacted>".to_owned(),
            }
        })?;
        bearer.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);
        let client = Client::builder().build().map_err(|e| ProviderError::Http {
            context: "Failed to build HTTP client",
            source: e,
        })?;

        Ok(Self {
            client,
            base_url,
            headers,
            timeout: None,
            name: DEFAULT_PROVIDER_NAME.to_owned(),
        })
    }

    /// Builds a provider from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MissingConfig`] if the URL or key is unset.
    pub fn from_env() -> Result<Self, ProviderError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a provider from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if a required key is missing or a value is
    /// malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());

        let url = read("MANAGED_WALLET_API_URL")
            .ok_or(ProviderError::MissingConfig("MANAGED_WALLET_API_URL"))?;
        let api_key = read("MANAGED_WALLET_API_KEY")
            .ok_or(ProviderError::MissingConfig("MANAGED_WALLET_API_KEY"))?;
        let base_url = Url::parse(url.trim()).map_err(|e| ProviderError::UrlParse {
            context: "Failed to parse MANAGED_WALLET_API_URL",
            source: e,
        })?;

        let mut provider = Self::try_new(base_url, api_key.trim())?;
        if let Some(value) = read("MANAGED_WALLET_TIMEOUT_MS") {
            let millis = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ProviderError::InvalidConfig {
                    key: "MANAGED_WALLET_TIMEOUT_MS",
                    value,
                })?;
            provider = provider.with_timeout(Duration::from_millis(millis));
        }
        Ok(provider)
    }

    /// Sets a timeout for all future requests.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the provider identifier matched against wallet records.
    #[must_use]
    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the base URL used by this provider.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the configured timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn account_url(&self, account_id: &str, action: Option<&str>) -> Result<Url, ProviderError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| ProviderError::InvalidConfig {
                    key: "MANAGED_WALLET_API_URL",
                    value: self.base_url.to_string(),
                })?;
            segments.pop_if_empty().push("accounts").push(account_id);
            if let Some(action) = action {
                segments.push(action);
            }
        }
        Ok(url)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut req = builder.headers(self.headers.clone());
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        req
    }

    async fn read_json<R>(
        response: reqwest::Response,
        context: &'static str,
    ) -> Result<R, ProviderError>
    where
        R: serde::de::DeserializeOwned,
    {
        if response.status() == StatusCode::OK {
            response
                .json::<R>()
                .await
                .map_err(|e| ProviderError::JsonDeserialization { context, source: e })
        } else {
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| ProviderError::ResponseBodyRead { context, source: e })?;
            Err(ProviderError::HttpStatus {
                context,
                status,
                body,
            })
        }
    }
}

#[async_trait::async_trait]
impl WalletProvider for HttpWalletProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn account_address(&self, account_id: &str) -> Result<Address, ProviderError> {
        const CONTEXT: &str = "GET /accounts/{id}";
        let url = self.account_url(account_id, None)?;
        let response = self
            .request(self.client.get(url))
            .send()
            .await
            .map_err(|e| ProviderError::Http {
                context: CONTEXT,
                source: e,
            })?;
        let account: AccountResponse = Self::read_json(response, CONTEXT).await?;
        Ok(account.address)
    }

    async fn sign_hash(&self, account_id: &str, hash: B256) -> Result<Signature, ProviderError> {
        const CONTEXT: &str = "POST /accounts/{id}/sign";
        let url = self.account_url(account_id, Some("sign"))?;
        tracing::debug!(account_id, %hash, "Requesting managed wallet signature");
        let response = self
            .request(self.client.post(url).json(&SignRequest { hash }))
            .send()
            .await
            .map_err(|e| ProviderError::Http {
                context: CONTEXT,
                source: e,
            })?;
        let signed: SignResponse = Self::read_json(response, CONTEXT).await?;
        Signature::from_raw(&signed.signature)
            .map_err(|e| ProviderError::InvalidSignature(e.to_string()))
    }
}
