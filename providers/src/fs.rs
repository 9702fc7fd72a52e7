//! Filesystem object store with signed, single-use upload URLs.
//!
//! `presign_put` hands out `{base_url}/objects/{key}?expires=..&content_type=..&signature=..`.
//! The daemon's upload sink checks the query with [`FsObjectStore::accept_upload`]
//! and writes the body once; a second write to the same key is refused.
//! Bodies are staged and linked into place whole, never written in place.

use crate::error::UploadError;
use async_trait::async_trait;
use nexus_crypto::{percent_encode, UrlSigner};
use nexus_types::Timestamp;
use nexus_verification::{ObjectStore, ProviderError};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncRead;

const UPLOAD_METHOD: &str = "PUT";
const STAGING_DIR: &str = ".staging";

static STAGED: AtomicU64 = AtomicU64::new(0);

/// Query parameters carried by a pre-signed upload URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUpload {
    pub expires: u64,
    pub content_type: String,
    pub signature: String,
}

pub struct FsObjectStore {
    root: PathBuf,
    base_url: String,
    signer: UrlSigner,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, base_url: &str, signer: UrlSigner) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            signer,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an object key onto a path under the root, refusing anything
    /// that could escape it.
    fn path_for(&self, key: &str) -> Result<PathBuf, UploadError> {
        if key.is_empty() || key.len() > 512 {
            return Err(UploadError::InvalidKey("empty or too long".into()));
        }
        let relative = Path::new(key);
        let mut path = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => path.push(part),
                _ => return Err(UploadError::InvalidKey(key.to_string())),
            }
        }
        if key.ends_with('/') || key.contains("//") {
            return Err(UploadError::InvalidKey(key.to_string()));
        }
        Ok(path)
    }

    /// Check a signed upload and store its body. Succeeds at most once per key.
    pub async fn accept_upload(
        &self,
        key: &str,
        params: &SignedUpload,
        body: &[u8],
        now: Timestamp,
    ) -> Result<(), UploadError> {
        self.accept_upload_from(key, params, body, now).await
    }

    /// Streaming form of [`accept_upload`](Self::accept_upload).
    ///
    /// The body is staged under `.staging/` and hard-linked into place only
    /// after it has been fully written and synced. A failed or interrupted
    /// write leaves nothing at the key, so the credential can be retried.
    pub async fn accept_upload_from<R>(
        &self,
        key: &str,
        params: &SignedUpload,
        mut body: R,
        now: Timestamp,
    ) -> Result<(), UploadError>
    where
        R: AsyncRead + Unpin,
    {
        let expires = Timestamp::new(params.expires);
        if now > expires {
            return Err(UploadError::Expired);
        }
        if !self.signer.verify(
            UPLOAD_METHOD,
            key,
            &params.content_type,
            expires,
            &params.signature,
        )? {
            return Err(UploadError::BadSignature);
        }

        let path = self.path_for(key)?;
        if tokio::fs::try_exists(&path).await? {
            return Err(UploadError::AlreadyUsed);
        }
        let staged = self.staging_path().await?;
        let result = publish(&staged, &path, &mut body).await;
        if let Err(e) = tokio::fs::remove_file(&staged).await {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %staged.display(), error = %e, "failed to remove staged upload");
            }
        }
        let written = result?;
        tracing::debug!(%key, bytes = written, "object stored");
        Ok(())
    }

    async fn staging_path(&self) -> Result<PathBuf, UploadError> {
        let dir = self.root.join(STAGING_DIR);
        tokio::fs::create_dir_all(&dir).await?;
        let n = STAGED.fetch_add(1, Ordering::Relaxed);
        Ok(dir.join(format!("{}-{n}.part", std::process::id())))
    }
}

/// Stage the body, then link it to `path`. The link fails if the key exists.
async fn publish<R: AsyncRead + Unpin>(
    staged: &Path,
    path: &Path,
    body: &mut R,
) -> Result<u64, UploadError> {
    let written = stage(staged, body).await?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    match tokio::fs::hard_link(staged, path).await {
        Ok(()) => Ok(written),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(UploadError::AlreadyUsed),
        Err(e) => Err(e.into()),
    }
}

/// Copy the whole body into a fresh file and sync it to disk.
async fn stage<R: AsyncRead + Unpin>(path: &Path, body: &mut R) -> Result<u64, UploadError> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    let written = tokio::io::copy(body, &mut file).await?;
    file.sync_all().await?;
    Ok(written)
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_at: Timestamp,
    ) -> Result<String, ProviderError> {
        self.path_for(key)
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        let signature = self
            .signer
            .sign(UPLOAD_METHOD, key, content_type, expires_at)
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        Ok(format!(
            "{}/objects/{}?expires={}&content_type={}&signature={}",
            self.base_url,
            key,
            expires_at.as_secs(),
            percent_encode(content_type),
            signature
        ))
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, ProviderError> {
        let path = self
            .path_for(key)
            .map_err(|_| ProviderError::NotFound(key.to_string()))?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ProviderError::NotFound(key.to_string())),
            Err(e) => Err(ProviderError::Unavailable(format!("reading {key}: {e}"))),
        }
    }
}
