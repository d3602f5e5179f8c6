// Two-phase upload.
//
// Phase one PUTs the raw file bytes to the upload host and gets back an
// opaque content hash. Phase two registers that hash under a remote path
// with a signed `/file/add` call. The phases are separate types so a
// receipt is consumed by exactly one confirmation.

use crate::config::Endpoints;
use crate::error::{CloudError, Result, UploadPhase};
use crate::session::Session;
use crate::signer::{decode_json, Encoding, Params, RequestSigner};
use crate::transport::{Body, Method, Transport, WireRequest};
use log::debug;
use serde_json::Value;

/// Conflict policy for confirmation: collisions are rejected, not renamed.
pub const CONFIRM_CONFLICT: &str = "strict";

/// What the upload host returned for the pushed bytes.
#[derive(Debug, PartialEq, Eq)]
pub struct UploadReceipt {
    pub content_hash: String,
    /// Measured locally; the upload host does not report it.
    pub byte_size: u64,
}

/// File bytes that have not left the machine yet.
pub struct PendingUpload {
    file_name: String,
    bytes: Vec<u8>,
}

/// Bytes accepted by the upload host, waiting for registration.
#[derive(Debug)]
pub struct SentUpload {
    file_name: String,
    receipt: UploadReceipt,
}

impl PendingUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        PendingUpload {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// PUT the bytes. The declared content type is multipart but the body
    /// is the raw file; the upload host only reads the filename header.
    pub fn push<T: Transport>(
        self,
        transport: &T,
        endpoints: &Endpoints,
        session: &Session,
    ) -> Result<SentUpload> {
        let email = session.account_email().ok_or_else(|| {
            CloudError::Authentication("no session token; authenticate first".into())
        })?;
        let byte_size = self.bytes.len() as u64;

        let mut request = WireRequest::new(Method::Put, endpoints.upload_url.clone());
        request.query = Params::new()
            .with("cloud_domain", 2)
            .with("x-email", email)
            .into_pairs();
        request.headers = vec![
            (
                "Content-Disposition".into(),
                format!("form-data; name=\"file\"; filename=\"{}\"", self.file_name),
            ),
            ("Content-Type".into(), "multipart/form-data".into()),
        ];
        request.body = Body::Raw(self.bytes);

        debug!("PUT {} ({} bytes)", request.url, byte_size);
        let response = transport.send(request)?;
        if !response.is_success() {
            return Err(CloudError::upload(
                UploadPhase::Push,
                format!("upload host answered status {}", response.status),
            ));
        }

        let content_hash = response.text().trim().to_string();
        if content_hash.is_empty() {
            return Err(CloudError::upload(
                UploadPhase::Push,
                "upload host returned an empty hash",
            ));
        }

        Ok(SentUpload {
            file_name: self.file_name,
            receipt: UploadReceipt {
                content_hash,
                byte_size,
            },
        })
    }
}

impl SentUpload {
    pub fn receipt(&self) -> &UploadReceipt {
        &self.receipt
    }

    /// Register the pushed bytes as `folder/file_name`.
    pub fn confirm<T: Transport>(
        self,
        transport: &T,
        endpoints: &Endpoints,
        session: &Session,
        folder: &str,
    ) -> Result<Value> {
        let params = Params::new()
            .with("hash", self.receipt.content_hash)
            .with("size", self.receipt.byte_size)
            .with("home", join_remote(folder, &self.file_name))
            .with("conflict", CONFIRM_CONFLICT);
        let request = RequestSigner::new(&endpoints.api_base, session).sign(
            Method::Post,
            "/file/add",
            params,
            Encoding::Standard,
            true,
        )?;

        debug!("POST {}", request.url);
        let response = transport.send(request)?;
        if !response.is_success() {
            return Err(CloudError::upload(
                UploadPhase::Confirm,
                format!("file/add answered status {}: {}", response.status, response.text()),
            ));
        }
        decode_json(&response)
    }
}

/// `folder` without trailing slashes, then `/name`.
pub fn join_remote(folder: &str, name: &str) -> String {
    format!("{}/{}", folder.trim_end_matches('/'), name)
}

/// Split a remote file path into its folder and file name.
pub fn split_remote(path: &str) -> Result<(&str, &str)> {
    let (folder, name) = path.rsplit_once('/').unwrap_or(("", path));
    if name.is_empty() {
        return Err(CloudError::InvalidPath(format!(
            "{} does not name a file",
            path
        )));
    }
    Ok((folder, name))
}
