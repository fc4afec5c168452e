//! Strategies for downloading manifest bytes.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::error::FulfillmentError;
use super::{AudioBookCredentials, ManifestFulfilled, ManifestRequest};
use crate::events::{EventSender, PipelineEvent};
use crate::http::{HttpAuth, HttpClient, HttpRequest, HttpResponse};

/// OAuth client registered with the vendor audiobook service.
#[derive(Clone, Deserialize)]
pub struct VendorClientCredentials {
    /// Client key.
    pub client_key: String,
    /// Client secret.
    pub client_secret: String,
    /// Token endpoint for the password grant.
    pub token_endpoint: Url,
}

impl fmt::Debug for VendorClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VendorClientCredentials")
            .field("client_key", &self.client_key)
            .field("token_endpoint", &self.token_endpoint.as_str())
            .finish_non_exhaustive()
    }
}

/// Fetches manifest bytes for a request.
#[async_trait]
pub trait ManifestDownloadStrategy: Send + Sync {
    /// Short name for logs and step messages.
    fn name(&self) -> &'static str;

    /// Downloads the manifest.
    ///
    /// # Errors
    ///
    /// Returns [`FulfillmentError`] when a request fails or returns garbage.
    async fn fetch(
        &self,
        http: &HttpClient,
        request: &ManifestRequest,
        events: &EventSender,
    ) -> Result<ManifestFulfilled, FulfillmentError>;
}

/// Picks the download strategy for a request.
///
/// Pure: depends only on the content type and the credential shape. The
/// vendor type needs vendor client credentials and username-based patron
/// credentials; every other type uses [`BasicManifestStrategy`].
///
/// # Errors
///
/// Returns [`FulfillmentError::Configuration`] for combinations that can
/// never succeed. Retrying does not help.
pub fn select_strategy(
    request: &ManifestRequest,
    vendor_client: Option<&VendorClientCredentials>,
) -> Result<Box<dyn ManifestDownloadStrategy>, FulfillmentError> {
    if !request.content_type.is_vendor_audiobook() {
        return Ok(Box::new(BasicManifestStrategy));
    }

    let Some(client) = vendor_client else {
        return Err(FulfillmentError::configuration(
            "no vendor client key is configured for this audiobook type",
            "Set `vendor_audio_client` in the borrow configuration.",
        ));
    };
    let (username, password) = match &request.credentials {
        Some(AudioBookCredentials::UsernamePassword { username, password }) => {
            (username.clone(), Some(password.clone()))
        }
        Some(AudioBookCredentials::UsernameOnly { username }) => (username.clone(), None),
        Some(AudioBookCredentials::BearerToken { .. }) | None => {
            return Err(FulfillmentError::configuration(
                "the vendor audiobook strategy requires username credentials",
                "Sign in to the library account with a barcode and PIN.",
            ));
        }
    };
    Ok(Box::new(VendorManifestStrategy {
        client: client.clone(),
        username,
        password,
    }))
}

/// GET with the request's credentials, if any.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicManifestStrategy;

#[async_trait]
impl ManifestDownloadStrategy for BasicManifestStrategy {
    fn name(&self) -> &'static str {
        "basic"
    }

    #[instrument(skip_all, fields(url = %request.target))]
    async fn fetch(
        &self,
        http: &HttpClient,
        request: &ManifestRequest,
        events: &EventSender,
    ) -> Result<ManifestFulfilled, FulfillmentError> {
        let auth = request.credentials.as_ref().map(|credentials| match credentials {
            AudioBookCredentials::UsernamePassword { username, password } => HttpAuth::Basic {
                username: username.clone(),
                password: Some(password.clone()),
            },
            AudioBookCredentials::UsernameOnly { username } => HttpAuth::Basic {
                username: username.clone(),
                password: None,
            },
            AudioBookCredentials::BearerToken { token } => HttpAuth::Bearer {
                token: token.clone(),
            },
        });
        let http_request = manifest_get(request, auth);
        let response = http
            .execute(http_request)
            .await
            .map_err(|e| FulfillmentError::download(request.target.as_str(), e))?;
        Ok(fulfilled(request, response, events))
    }
}

/// Password grant against the vendor token endpoint, then a bearer GET.
pub struct VendorManifestStrategy {
    client: VendorClientCredentials,
    username: String,
    password: Option<String>,
}

impl fmt::Debug for VendorManifestStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VendorManifestStrategy")
            .field("client", &self.client)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl VendorManifestStrategy {
    async fn access_token(&self, http: &HttpClient) -> Result<String, FulfillmentError> {
        let endpoint = self.client.token_endpoint.clone();
        let mut fields = vec![("grant_type", "password"), ("username", self.username.as_str())];
        match &self.password {
            Some(password) => fields.push(("password", password.as_str())),
            None => {
                fields.push(("password", "[ignore]"));
                fields.push(("password_required", "false"));
            }
        }
        let token_request = HttpRequest::post_form(endpoint.clone(), &fields).with_auth(Some(
            HttpAuth::Basic {
                username: self.client.client_key.clone(),
                password: Some(self.client.client_secret.clone()),
            },
        ));

        let response = http
            .execute(token_request)
            .await
            .map_err(|e| FulfillmentError::download(endpoint.as_str(), e))?;
        let token: TokenResponse =
            serde_json::from_slice(&response.body).map_err(|e| FulfillmentError::TokenResponse {
                url: endpoint.to_string(),
                message: e.to_string(),
            })?;
        if token.access_token.is_empty() {
            return Err(FulfillmentError::TokenResponse {
                url: endpoint.to_string(),
                message: "empty access token".to_string(),
            });
        }
        Ok(token.access_token)
    }
}

#[async_trait]
impl ManifestDownloadStrategy for VendorManifestStrategy {
    fn name(&self) -> &'static str {
        "vendor-oauth"
    }

    #[instrument(skip_all, fields(url = %request.target))]
    async fn fetch(
        &self,
        http: &HttpClient,
        request: &ManifestRequest,
        events: &EventSender,
    ) -> Result<ManifestFulfilled, FulfillmentError> {
        events.emit(PipelineEvent::FulfillmentStatus {
            message: "Requesting vendor access token".to_string(),
        });
        let token = self.access_token(http).await?;
        debug!("vendor access token obtained");

        let http_request = manifest_get(request, Some(HttpAuth::Bearer { token }));
        let response = http
            .execute(http_request)
            .await
            .map_err(|e| FulfillmentError::download(request.target.as_str(), e))?;
        Ok(fulfilled(request, response, events))
    }
}

fn manifest_get(request: &ManifestRequest, auth: Option<HttpAuth>) -> HttpRequest {
    HttpRequest::get(request.target.clone())
        .with_auth(auth)
        .with_header("User-Agent", request.user_agent.clone())
        .with_header("Accept", request.content_type.to_string())
}

fn fulfilled(
    request: &ManifestRequest,
    response: HttpResponse,
    events: &EventSender,
) -> ManifestFulfilled {
    let received = response.body.len() as u64;
    events.emit(PipelineEvent::ManifestDownloadProgress {
        received,
        expected: Some(received),
    });
    ManifestFulfilled {
        content_type: response
            .content_type
            .unwrap_or_else(|| request.content_type.clone()),
        data: response.body,
    }
}
