//! HTTP client for the hosted credential verifier.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::{CredentialVerifier, VerifiedPrincipal, VerifierError};
use crate::APP_USER_AGENT;

/// Client for the provider's auth API. The service key authorizes
/// administrative calls (principal provisioning, reset mails) and is never
/// logged.
#[derive(Debug, Clone)]
pub struct HttpVerifier {
    base_url: Url,
    service_key: SecretString,
    client: Client,
}

impl HttpVerifier {
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client
    /// cannot be constructed.
    pub fn new(base_url: &str, service_key: SecretString) -> Result<Self> {
        let mut base_url = Url::parse(base_url).context("invalid credential verifier URL")?;
        // Relative joins drop the last path segment unless the base ends
        // with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("failed to build verifier HTTP client")?;
        Ok(Self {
            base_url,
            service_key,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, VerifierError> {
        self.base_url
            .join(path)
            .map_err(|_| VerifierError::InvalidResponse)
    }

    fn service_authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.service_key.expose_secret())
    }
}

/// Map a non-success status to the verifier error taxonomy. Any 4xx on a
/// credentialed call means the credentials were rejected; everything else
/// is the provider being unavailable.
fn credential_status_error(status: StatusCode) -> VerifierError {
    if status.is_client_error() {
        VerifierError::InvalidCredentials
    } else {
        VerifierError::Unavailable
    }
}

#[async_trait]
impl CredentialVerifier for HttpVerifier {
    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<VerifiedPrincipal, VerifierError> {
        let url = self.endpoint("token")?;
        let response = self
            .client
            .post(url)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|_| VerifierError::Unavailable)?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "verifier rejected sign-in");
            return Err(credential_status_error(status));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|_| VerifierError::InvalidResponse)?;
        let access_token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or(VerifierError::InvalidResponse)?
            .to_string();
        let id = body
            .get("user")
            .and_then(|user| user.get("id"))
            .and_then(Value::as_str)
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or(VerifierError::InvalidResponse)?;

        Ok(VerifiedPrincipal { id, access_token })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), VerifierError> {
        let url = self.endpoint("logout")?;
        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|_| VerifierError::Unavailable)?;

        // An already-dead session is fine; sign-out is idempotent.
        if response.status().is_success() || response.status().is_client_error() {
            Ok(())
        } else {
            Err(VerifierError::Unavailable)
        }
    }

    async fn provision(&self, email: &str, password: &str) -> Result<Uuid, VerifierError> {
        let url = self.endpoint("admin/users")?;
        let response = self
            .service_authorized(self.client.post(url))
            .json(&json!({
                "email": email,
                "password": password,
                "email_confirm": true,
            }))
            .send()
            .await
            .map_err(|_| VerifierError::Unavailable)?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "verifier refused principal provisioning");
            return if status.is_client_error() {
                Err(VerifierError::InvalidResponse)
            } else {
                Err(VerifierError::Unavailable)
            };
        }

        let body: Value = response
            .json()
            .await
            .map_err(|_| VerifierError::InvalidResponse)?;
        body.get("id")
            .and_then(Value::as_str)
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or(VerifierError::InvalidResponse)
    }

    async fn update_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<(), VerifierError> {
        let url = self.endpoint("user")?;
        let response = self
            .client
            .put(url)
            .bearer_auth(access_token)
            .json(&json!({ "password": new_password }))
            .send()
            .await
            .map_err(|_| VerifierError::Unavailable)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(credential_status_error(response.status()))
        }
    }

    async fn send_password_reset(
        &self,
        email: &str,
        redirect_url: &str,
    ) -> Result<(), VerifierError> {
        let url = self.endpoint("recover")?;
        let response = self
            .service_authorized(self.client.post(url))
            .json(&json!({ "email": email, "redirect_to": redirect_url }))
            .send()
            .await
            .map_err(|_| VerifierError::Unavailable)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(VerifierError::Unavailable)
        }
    }
}
