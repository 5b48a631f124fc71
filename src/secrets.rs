use std::path::{Path, PathBuf};

use async_trait::async_trait;
use eyre::{Result, bail};
use log::{debug, info, warn};
use serde::Deserialize;

pub const DEFAULT_VAULT_PATH: &str = "secret/data/ytdigest/smtp";

/// Login for the mail relay
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct SmtpCredentials {
    pub username: String,
    pub password: String,
}

// Keep the password out of logs
impl std::fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// One layer of credential lookup
#[async_trait]
pub trait SecretStore: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means this layer has nothing configured
    async fn smtp_credentials(&self) -> Result<Option<SmtpCredentials>>;
}

/// Ask each store in order; the first one with credentials wins.
///
/// A failing store is logged and skipped.
pub async fn resolve(stores: &[Box<dyn SecretStore>]) -> Option<SmtpCredentials> {
    for store in stores {
        match store.smtp_credentials().await {
            Ok(Some(creds)) => {
                info!("Email credentials resolved from {}", store.name());
                return Some(creds);
            }
            Ok(None) => debug!("No email credentials in {}", store.name()),
            Err(e) => warn!("Credential lookup in {} failed: {e:#}", store.name()),
        }
    }
    None
}

/// The standard lookup order: Vault, then environment, then local file
pub fn default_stores(client: reqwest::Client, vault_path: Option<String>) -> Vec<Box<dyn SecretStore>> {
    let mut stores: Vec<Box<dyn SecretStore>> = Vec::new();
    if let Some(vault) = VaultStore::from_env(client, vault_path.unwrap_or_else(|| DEFAULT_VAULT_PATH.to_string())) {
        stores.push(Box::new(vault));
    }
    stores.push(Box::new(EnvStore::default()));
    stores.push(Box::new(FileStore::new(credentials_path())));
    stores
}

pub fn credentials_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ytdigest")
        .join("credentials.toml")
}

/// HashiCorp Vault KV v2 secret holding `username` and `password`
pub struct VaultStore {
    client: reqwest::Client,
    addr: String,
    token: String,
    path: String,
}

#[derive(Debug, Deserialize)]
struct VaultResponse {
    data: VaultData,
}

#[derive(Debug, Deserialize)]
struct VaultData {
    data: SmtpCredentials,
}

impl VaultStore {
    pub fn new(client: reqwest::Client, addr: String, token: String, path: String) -> Self {
        Self { client, addr, token, path }
    }

    /// Configured only when both `VAULT_ADDR` and `VAULT_TOKEN` are set
    pub fn from_env(client: reqwest::Client, path: String) -> Option<Self> {
        let addr = std::env::var("VAULT_ADDR").ok()?;
        let token = std::env::var("VAULT_TOKEN").ok()?;
        Some(Self::new(client, addr, token, path))
    }

    fn url(&self) -> String {
        format!("{}/v1/{}", self.addr.trim_end_matches('/'), self.path.trim_start_matches('/'))
    }
}

#[async_trait]
impl SecretStore for VaultStore {
    fn name(&self) -> &str {
        "vault"
    }

    async fn smtp_credentials(&self) -> Result<Option<SmtpCredentials>> {
        debug!("Reading {} from Vault", self.path);
        let resp = self
            .client
            .get(self.url())
            .header("X-Vault-Token", &self.token)
            .send()
            .await?;

        if !has_secret(resp.status(), &self.path)? {
            return Ok(None);
        }

        let body: VaultResponse = resp.json().await?;
        Ok(Some(body.data.data))
    }
}

/// 404 means nothing stored at the path; any other non-2xx is a failure
fn has_secret(status: reqwest::StatusCode, path: &str) -> Result<bool> {
    if status == reqwest::StatusCode::NOT_FOUND {
        return Ok(false);
    }
    if !status.is_success() {
        bail!("Vault returned {status} for {path}");
    }
    Ok(true)
}

/// `YTDIGEST_SMTP_USER` / `YTDIGEST_SMTP_PASSWORD`
pub struct EnvStore {
    user_var: String,
    password_var: String,
}

impl Default for EnvStore {
    fn default() -> Self {
        Self {
            user_var: "YTDIGEST_SMTP_USER".to_string(),
            password_var: "YTDIGEST_SMTP_PASSWORD".to_string(),
        }
    }
}

#[async_trait]
impl SecretStore for EnvStore {
    fn name(&self) -> &str {
        "environment"
    }

    async fn smtp_credentials(&self) -> Result<Option<SmtpCredentials>> {
        let user = std::env::var(&self.user_var).ok().filter(|v| !v.is_empty());
        let password = std::env::var(&self.password_var).ok().filter(|v| !v.is_empty());
        match (user, password) {
            (Some(username), Some(password)) => Ok(Some(SmtpCredentials { username, password })),
            (None, None) => Ok(None),
            _ => bail!("both {} and {} must be set", self.user_var, self.password_var),
        }
    }
}

/// Local TOML fallback, outside any source tree
pub struct FileStore {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    smtp: SmtpCredentials,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read(path: &Path) -> Result<SmtpCredentials> {
        let content = std::fs::read_to_string(path)?;
        let file: CredentialsFile = toml::from_str(&content)?;
        Ok(file.smtp)
    }
}

#[async_trait]
impl SecretStore for FileStore {
    fn name(&self) -> &str {
        "credentials file"
    }

    async fn smtp_credentials(&self) -> Result<Option<SmtpCredentials>> {
        if !self.path.exists() {
            debug!("No credentials file at {}", self.path.display());
            return Ok(None);
        }
        Self::read(&self.path).map(Some)
    }
}
