//! OAuth2 user authentication for the Drive API.
//!
//! A credential is cached in `token.json`. On startup the cached credential is
//! checked, refreshed when expired, and as a last resort replaced through the
//! installed-app consent flow, which needs the client secret file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, Utc};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope,
    TokenResponse, TokenUrl,
};
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::callback::{CallbackParams, LocalCallbackServer};
use crate::error::{DriveError, Result};
use crate::models::{ClientSecrets, Credential};

/// Read-only Google Drive scope.
pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

type ConsentClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type RefreshClient =
    BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Outcome of inspecting the cached credential.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialState {
    /// The cached credential is still usable.
    Valid(Credential),
    /// The cached credential had expired and was refreshed (and saved).
    Refreshed(Credential),
    /// No usable credential; the consent flow has to run.
    NeedsInteractive,
}

/// Reads and writes the persisted credential file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no credential has been saved yet.
    pub fn load(&self) -> Result<Option<Credential>> {
        if !self.path.exists() {
            debug!("No cached credentials at {}", self.path.display());
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let credential: Credential = serde_json::from_str(&content)?;
        Ok(Some(credential))
    }

    pub fn save(&self, credential: &Credential) -> Result<()> {
        let json = serde_json::to_string_pretty(credential)?;
        fs::write(&self.path, json)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        debug!("Saved credentials to {}", self.path.display());
        Ok(())
    }
}

/// Authorization-code flow with PKCE for an installed application.
pub struct ConsentFlow {
    client: ConsentClient,
    secrets: ClientSecrets,
    scopes: Vec<String>,
}

impl ConsentFlow {
    pub fn new(secrets: &ClientSecrets, redirect_uri: &str) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(secrets.client_id.clone()))
            .set_client_secret(ClientSecret::new(secrets.client_secret.clone()))
            .set_auth_type(AuthType::RequestBody)
            .set_auth_uri(AuthUrl::new(secrets.auth_uri.clone()).map_err(invalid_url)?)
            .set_token_uri(TokenUrl::new(secrets.token_uri.clone()).map_err(invalid_url)?)
            .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string()).map_err(invalid_url)?);

        Ok(Self {
            client,
            secrets: secrets.clone(),
            scopes: vec![DRIVE_READONLY_SCOPE.to_string()],
        })
    }

    /// Returns `(authorization_url, csrf_token, pkce_verifier)`.
    ///
    /// `access_type=offline` plus `prompt=consent` make Google issue a refresh
    /// token even when the user already granted access earlier.
    pub fn authorize_url(&self) -> (String, CsrfToken, PkceCodeVerifier) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent");
        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }

        let (url, csrf_token) = request.set_pkce_challenge(pkce_challenge).url();
        (url.to_string(), csrf_token, pkce_verifier)
    }

    pub async fn exchange_code(
        &self,
        http: &Client,
        code: String,
        pkce_verifier: PkceCodeVerifier,
    ) -> Result<Credential> {
        info!("Exchanging authorization code for tokens");

        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(http)
            .await
            .map_err(|e| DriveError::AuthenticationError(e.to_string()))?;

        Ok(credential_from_response(
            &response,
            &self.secrets.client_id,
            &self.secrets.client_secret,
            &self.secrets.token_uri,
            None,
            &self.scopes,
        ))
    }
}

/// Exchanges the refresh token of `credential` for a new access token.
pub async fn refresh_credential(http: &Client, credential: &Credential) -> Result<Credential> {
    let refresh_token = credential
        .refresh_token
        .as_deref()
        .ok_or_else(|| DriveError::TokenRefreshError("no refresh token".to_string()))?;

    let client: RefreshClient = BasicClient::new(ClientId::new(credential.client_id.clone()))
        .set_client_secret(ClientSecret::new(credential.client_secret.clone()))
        .set_auth_type(AuthType::RequestBody)
        .set_token_uri(TokenUrl::new(credential.token_uri.clone()).map_err(invalid_url)?);

    let response = client
        .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
        .request_async(http)
        .await
        .map_err(|e| DriveError::TokenRefreshError(e.to_string()))?;

    Ok(credential_from_response(
        &response,
        &credential.client_id,
        &credential.client_secret,
        &credential.token_uri,
        Some(refresh_token),
        &credential.scopes,
    ))
}

fn credential_from_response(
    response: &BasicTokenResponse,
    client_id: &str,
    client_secret: &str,
    token_uri: &str,
    previous_refresh_token: Option<&str>,
    requested_scopes: &[String],
) -> Credential {
    let expiry = response
        .expires_in()
        .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64))
        .unwrap_or_else(|| Utc::now() + Duration::hours(1));

    // Google omits the refresh token on refresh responses; keep the old one.
    let refresh_token = response
        .refresh_token()
        .map(|t| t.secret().to_string())
        .or_else(|| previous_refresh_token.map(str::to_string));

    let scopes = response
        .scopes()
        .map(|granted| granted.iter().map(|s| s.as_str().to_owned()).collect())
        .unwrap_or_else(|| requested_scopes.to_vec());

    Credential {
        token: response.access_token().secret().to_string(),
        refresh_token,
        token_uri: token_uri.to_string(),
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
        scopes,
        expiry: Some(expiry),
    }
}

/// The authorization code, provided the redirect echoes our CSRF state.
fn verified_code(callback: CallbackParams, csrf_token: &CsrfToken) -> Result<String> {
    if callback.state != *csrf_token.secret() {
        return Err(DriveError::AuthenticationError(
            "OAuth state parameter mismatch".to_string(),
        ));
    }
    Ok(callback.code)
}

fn invalid_url(e: url::ParseError) -> DriveError {
    DriveError::AuthenticationError(format!("invalid OAuth endpoint URL: {}", e))
}

/// Supplies access tokens for Drive API calls, keeping `token.json` current.
#[derive(Clone)]
pub struct Authenticator {
    store: TokenStore,
    client_secret_path: PathBuf,
    http: Client,
    cached: Arc<RwLock<Option<Credential>>>,
}

impl Authenticator {
    /// # Arguments
    /// * `token_path` - Where the credential is cached between runs
    /// * `client_secret_path` - Client secret file used for the consent flow
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(token_path: P, client_secret_path: Q) -> Self {
        // The token endpoint must not be followed through redirects.
        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build the OAuth HTTP client ({}); using defaults", e);
                Client::default()
            });

        Self {
            store: TokenStore::new(token_path),
            client_secret_path: client_secret_path.into(),
            http,
            cached: Arc::new(RwLock::new(None)),
        }
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    /// Inspects the cached credential, refreshing it when possible.
    ///
    /// Load and refresh failures are logged and reported as
    /// [`CredentialState::NeedsInteractive`], never as errors.
    pub async fn check_cached(&self) -> CredentialState {
        let credential = match self.store.load() {
            Ok(Some(credential)) => credential,
            Ok(None) => return CredentialState::NeedsInteractive,
            Err(e) => {
                warn!(
                    "Error loading credentials from {}: {}",
                    self.store.path().display(),
                    e
                );
                return CredentialState::NeedsInteractive;
            }
        };

        if credential.is_valid() {
            return CredentialState::Valid(credential);
        }

        if !credential.can_refresh() {
            info!("Cached credentials expired and carry no refresh token");
            return CredentialState::NeedsInteractive;
        }

        match refresh_credential(&self.http, &credential).await {
            Ok(refreshed) => {
                if let Err(e) = self.store.save(&refreshed) {
                    warn!("Failed to save refreshed credentials: {}", e);
                }
                CredentialState::Refreshed(refreshed)
            }
            Err(e) => {
                warn!("Failed to refresh credentials: {}", e);
                CredentialState::NeedsInteractive
            }
        }
    }

    /// Returns a valid credential, running the consent flow if needed.
    pub async fn authenticate(&self) -> Result<Credential> {
        let credential = match self.check_cached().await {
            CredentialState::Valid(credential) => {
                debug!("Using cached credentials");
                credential
            }
            CredentialState::Refreshed(credential) => {
                info!("Refreshed access token");
                credential
            }
            CredentialState::NeedsInteractive => self.authorize_interactively().await?,
        };

        *self.cached.write().await = Some(credential.clone());
        Ok(credential)
    }

    /// Get a valid access token, re-authenticating if the cached one expired.
    pub async fn get_access_token(&self) -> Result<String> {
        {
            let cached = self.cached.read().await;
            if let Some(credential) = cached.as_ref() {
                if credential.is_valid() {
                    return Ok(credential.token.clone());
                }
            }
        }

        Ok(self.authenticate().await?.token)
    }

    async fn authorize_interactively(&self) -> Result<Credential> {
        if !self.client_secret_path.exists() {
            error!(
                "No client secret file found at {}. Please download it from Google Cloud Console.",
                self.client_secret_path.display()
            );
            return Err(DriveError::MissingClientSecret(
                self.client_secret_path.clone(),
            ));
        }

        let secrets = ClientSecrets::from_file(&self.client_secret_path)?;
        let server = LocalCallbackServer::bind().await?;
        let flow = ConsentFlow::new(&secrets, &server.redirect_uri())?;
        let (auth_url, csrf_token, pkce_verifier) = flow.authorize_url();

        info!(
            "Please visit this URL to authorize this application: {}",
            auth_url
        );
        if let Err(e) = webbrowser::open(&auth_url) {
            warn!("Could not open a browser ({}); open the URL manually", e);
        }

        let callback = server.wait_for_callback().await?;
        let code = verified_code(callback, &csrf_token)?;

        let credential = flow
            .exchange_code(&self.http, code, pkce_verifier)
            .await?;
        self.store.save(&credential)?;
        info!("Saved credentials to {}", self.store.path().display());

        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> ClientSecrets {
        ClientSecrets::from_json(
            r#"{"installed": {"client_id": "test-client.apps.googleusercontent.com", "client_secret": "shh"}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_consent_url_parameters() {
        let flow = ConsentFlow::new(&secrets(), "http://127.0.0.1:8085/").unwrap();
        let (url, csrf, _verifier) = flow.authorize_url();

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/auth"));
        assert!(url.contains("test-client.apps.googleusercontent.com"));
        assert!(url.contains("code_challenge"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("drive.readonly"));
        assert!(url.contains(csrf.secret().as_str()));
    }

    #[test]
    fn test_consent_flow_rejects_bad_redirect() {
        assert!(ConsentFlow::new(&secrets(), "not a url").is_err());
    }

    #[test]
    fn test_callback_state_must_match() {
        let csrf = CsrfToken::new("expected-state".to_string());

        let code = verified_code(
            CallbackParams {
                code: "4/0AbC".to_string(),
                state: "expected-state".to_string(),
            },
            &csrf,
        )
        .unwrap();
        assert_eq!(code, "4/0AbC");

        let err = verified_code(
            CallbackParams {
                code: "4/0AbC".to_string(),
                state: "forged".to_string(),
            },
            &csrf,
        )
        .unwrap_err();
        assert!(matches!(err, DriveError::AuthenticationError(ref m) if m.contains("mismatch")));
    }

    #[test]
    fn test_token_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        assert_eq!(store.load().unwrap(), None);

        let credential = Credential {
            token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            scopes: vec![DRIVE_READONLY_SCOPE.to_string()],
            expiry: Some(Utc::now() + Duration::hours(1)),
        };
        store.save(&credential).unwrap();
        assert_eq!(store.load().unwrap(), Some(credential));
    }
}
