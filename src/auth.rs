//! OAuth 2.0 authorization through the installed-application flow.

use std::{
    fmt,
    path::{
        PathBuf,
    },
};

use tracing::{
    debug,
};

use yup_oauth2::{
    ApplicationSecret,
    InstalledFlowAuthenticator,
    InstalledFlowReturnMethod,
};

use crate::{
    Error,
};

/// Full read/write access to the authenticated user's account.
pub const SCOPE_YOUTUBE: &str = "https://www.googleapis.com/auth/youtube";

/// Port of the local server the consent page redirects back to.
pub const REDIRECT_PORT: u16 = 8080;

pub const CREDENTIALS_DIRECTORY: &str = ".oauth-credentials";

const PLACEHOLDER_PREFIX: &str = "Enter ";

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Credential { access_token: access_token.into() }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential").field("access_token", &"<redacted>").finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthConfig {
    pub client_secrets: PathBuf,
    pub credentials_dir: PathBuf,
}

impl AuthConfig {
    pub fn token_store(&self, credential_datastore: &str) -> PathBuf {
        self.credentials_dir.join(format!("{}.json", credential_datastore))
    }
}

/// Get a credential for `scopes`, reusing the token stored under `credential_datastore`
/// or running the browser consent flow when there is none.
pub async fn authorize<S>(scopes: &[S], credential_datastore: &str, config: &AuthConfig) -> Result<Credential, Error>
    where
        S: AsRef<str>,
{
    let secret = match yup_oauth2::read_application_secret(&config.client_secrets).await {
        Ok(secret) => secret,
        Err(err) => return Err(Error::Authorization(format!("couldn't read client secrets {}: {}", config.client_secrets.display(), err))),
    };
    check_client_secrets(&secret, config)?;

    let token_store = config.token_store(credential_datastore);
    if let Err(err) = tokio::fs::create_dir_all(&config.credentials_dir).await {
        return Err(Error::Authorization(format!("couldn't create {}: {}", config.credentials_dir.display(), err)));
    };

    debug!(token_store = %token_store.display(), "building authenticator");
    let auth = InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPPortRedirect(REDIRECT_PORT))
        .persist_tokens_to_disk(token_store)
        .build()
        .await
        .map_err(|err| Error::Authorization(err.to_string()))?;

    let token = auth.token(scopes).await.map_err(|err| Error::Authorization(err.to_string()))?;
    let Some(access_token) = token.token() else {
        return Err(Error::Authorization("no access token was issued".into()));
    };
    Ok(Credential::new(access_token))
}

fn check_client_secrets(secret: &ApplicationSecret, config: &AuthConfig) -> Result<(), Error> {
    if secret.client_id.starts_with(PLACEHOLDER_PREFIX) || secret.client_secret.starts_with(PLACEHOLDER_PREFIX) {
        return Err(Error::Authorization(format!(
            "Enter Client ID and Secret from https://console.developers.google.com/project/_/apiui/credential into {}",
            config.client_secrets.display(),
        )));
    };
    Ok(())
}
