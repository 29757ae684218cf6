//! Payment proof storage
//!
//! Customers pay by manual bank transfer and upload a photo of the receipt.
//! Files land under `<root>/payment_proof/` with a generated name; the path
//! relative to `root` is what gets stored on the order.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ShopError;

pub const MAX_PROOF_BYTES: usize = 2048 * 1024;
const PROOF_DIR: &str = "payment_proof";

/// An uploaded file as received from the client.
#[derive(Clone, Debug)]
pub struct ProofUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ProofUpload {
    /// Checks size and type; returns the extension to store under.
    pub fn validate(&self) -> Result<&'static str, ShopError> {
        if self.bytes.is_empty() { return Err(ShopError::InvalidPaymentProof("file is empty".into())); }
        if self.bytes.len() > MAX_PROOF_BYTES {
            return Err(ShopError::InvalidPaymentProof(format!("file larger than {} KB", MAX_PROOF_BYTES / 1024)));
        }
        let from_type = self.content_type.as_deref().and_then(|t| match t {
            "image/png" => Some("png"),
            "image/jpeg" | "image/jpg" => Some("jpg"),
            _ => None,
        });
        let from_name = self.file_name.as_deref().and_then(|n| Path::new(n).extension()).and_then(|e| e.to_str()).and_then(|e| {
            match e.to_ascii_lowercase().as_str() {
                "png" => Some("png"),
                "jpg" | "jpeg" => Some("jpg"),
                _ => None,
            }
        });
        from_type.or(from_name).ok_or_else(|| ShopError::InvalidPaymentProof("must be a PNG, JPG or JPEG image".into()))
    }
}

#[derive(Clone, Debug)]
pub struct ProofStorage {
    root: PathBuf,
}

impl ProofStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    /// Validates and writes the upload, returning its stored relative path.
    pub async fn save(&self, upload: &ProofUpload) -> Result<String, ShopError> {
        let ext = upload.validate()?;
        let relative = format!("{}/{}.{}", PROOF_DIR, Uuid::now_v7(), ext);
        tokio::fs::create_dir_all(self.root.join(PROOF_DIR)).await?;
        tokio::fs::write(self.root.join(&relative), &upload.bytes).await?;
        debug!(path = %relative, bytes = upload.bytes.len(), "stored payment proof");
        Ok(relative)
    }

    /// Removes a stored proof after a failed checkout. Missing files are fine.
    pub async fn discard(&self, relative: &str) {
        match tokio::fs::remove_file(self.root.join(relative)).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %relative, error = %e, "could not remove payment proof"),
        }
    }
}
