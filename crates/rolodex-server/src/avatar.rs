use crate::config::AvatarConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Folder avatars are stored under; one image per username.
const AVATAR_FOLDER: &str = "ContactsApp";
const AVATAR_SIZE: u32 = 250;

/// Default avatar for a new account: the Gravatar image keyed by the
/// SHA-256 of the trimmed, lowercased email.
pub fn gravatar_url(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    format!("https://www.gravatar.com/avatar/{:x}", digest)
}

/// Image hosting for user avatars
#[async_trait]
pub trait AvatarStore: Send + Sync {
    /// Upload the image for `username`, overwriting any previous one,
    /// and return the public URL of the resized image.
    async fn upload(&self, username: &str, file_name: &str, data: Vec<u8>) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    version: u64,
}

/// Cloudinary signed upload API
pub struct CloudinaryStore {
    client: reqwest::Client,
    config: AvatarConfig,
}

impl CloudinaryStore {
    pub fn new(config: AvatarConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn public_id(username: &str) -> String {
        format!("{}/{}", AVATAR_FOLDER, username)
    }

    /// Hex SHA-256 over the alphabetically sorted `key=value` pairs followed by the secret.
    fn signature(&self, params: &[(&str, String)]) -> String {
        let mut sorted: Vec<&(&str, String)> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let joined = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        hasher.update(self.config.api_secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn delivery_url(&self, public_id: &str, version: u64) -> String {
        format!(
            "https://res.cloudinary.com/{}/image/upload/c_fill,h_{size},w_{size}/v{}/{}",
            self.config.cloud_name,
            version,
            public_id,
            size = AVATAR_SIZE
        )
    }
}

#[async_trait]
impl AvatarStore for CloudinaryStore {
    #[tracing::instrument(skip(self, data))]
    async fn upload(&self, username: &str, file_name: &str, data: Vec<u8>) -> Result<String> {
        let public_id = Self::public_id(username);
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let params = [
            ("overwrite", "true".to_string()),
            ("public_id", public_id.clone()),
            ("timestamp", timestamp),
        ];
        let signature = self.signature(&params);

        let mut form = Form::new()
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256")
            .part("file", Part::bytes(data).file_name(file_name.to_string()));
        for (key, value) in params {
            form = form.text(key, value);
        }

        let url = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.config.cloud_name
        );
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .context("Failed to reach Cloudinary")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Cloudinary upload failed (status={}): {}", status, body);
        }
        let uploaded: UploadResponse = resp
            .json()
            .await
            .context("Failed to parse Cloudinary upload response")?;

        Ok(self.delivery_url(&public_id, uploaded.version))
    }
}
