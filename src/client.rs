// Cloud operations over an authenticated session.

use crate::config::{Credentials, Endpoints};
use crate::error::{CloudError, Result};
use crate::session::{self, Session};
use crate::signer::{decode_json, Encoding, Params, RequestSigner};
use crate::transport::{Method, Transport, WireRequest};
use crate::upload::{join_remote, split_remote, PendingUpload};
use log::{debug, info};
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Folder listing order sent with every `/folder` call.
pub const FOLDER_SORT: &str = r#"{"type":"name","order":"asc"}"#;

/// Conflict policy for move and copy: the server picks a free name.
pub const MOVE_CONFLICT: &str = "rename";

/// Path segment between the download host and a published weblink.
pub const WEBLINK_SEGMENT: &str = "weblink/thumb/xw1/";

/// A logged-in client. It is built by [`CloudClient::connect`] or from a
/// session that already holds a token, so every operation runs with one.
pub struct CloudClient<T: Transport> {
    transport: T,
    endpoints: Endpoints,
    credentials: Credentials,
    session: Session,
}

impl<T: Transport> CloudClient<T> {
    /// Log in and fetch a token; the client is unusable otherwise.
    pub fn connect(transport: T, endpoints: Endpoints, credentials: Credentials) -> Result<Self> {
        let session = session::authenticate(&transport, &endpoints, &credentials)?;
        Self::from_session(transport, endpoints, credentials, session)
    }

    /// Wrap a session obtained with [`session::login`] and
    /// [`session::fetch_token`] over the same `transport`. Refuses a session
    /// that has no token yet.
    pub fn from_session(
        transport: T,
        endpoints: Endpoints,
        credentials: Credentials,
        session: Session,
    ) -> Result<Self> {
        if session.grant().is_none() {
            return Err(CloudError::Authentication(
                "session has no token; fetch one first".into(),
            ));
        }
        Ok(CloudClient {
            transport,
            endpoints,
            credentials,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Fetch a new token with the existing cookies. The old token stays in
    /// place if this fails.
    pub fn refresh_token(&mut self) -> Result<()> {
        let grant = session::fetch_token(&self.transport, &self.endpoints, &self.credentials.login)?;
        info!("token refreshed for {}", grant.email);
        self.session.apply_grant(grant);
        Ok(())
    }

    /// Send one signed API call and decode its JSON answer.
    fn call(&self, method: Method, path: &str, params: Params) -> Result<Value> {
        let request = RequestSigner::new(&self.endpoints.api_base, &self.session).sign(
            method,
            path,
            params,
            Encoding::Standard,
            true,
        )?;
        debug!("{} {}", method.as_str(), request.url);

        let response = self.transport.send(request)?;
        if !response.is_success() {
            let body = decode_json(&response).unwrap_or_else(|_| Value::String(response.text()));
            return Err(CloudError::Api {
                status: response.status,
                body,
            });
        }
        decode_json(&response)
    }

    /// List a folder, sorted by name ascending.
    pub fn list_folder(&self, path: &str) -> Result<Value> {
        self.call(
            Method::Get,
            "/folder",
            Params::new().with("home", path).with("sort", FOLDER_SORT),
        )
    }

    /// Move `path` into `folder`, renaming on collision.
    pub fn move_file(&self, path: &str, folder: &str) -> Result<Value> {
        self.call(
            Method::Post,
            "/file/move",
            Params::new()
                .with("folder", folder)
                .with("conflict", MOVE_CONFLICT)
                .with("home", path),
        )
    }

    /// Copy `path` into `folder`, renaming on collision.
    pub fn copy_file(&self, path: &str, folder: &str) -> Result<Value> {
        self.call(
            Method::Post,
            "/file/copy",
            Params::new()
                .with("folder", folder)
                .with("conflict", MOVE_CONFLICT)
                .with("home", path),
        )
    }

    pub fn delete(&self, path: &str) -> Result<Value> {
        self.call(Method::Post, "/file/remove", Params::new().with("home", path))
    }

    pub fn create_folder(&self, path: &str) -> Result<Value> {
        self.call(Method::Get, "/folder/add", Params::new().with("home", path))
    }

    /// Give `path` the new base name `name`.
    pub fn rename(&self, path: &str, name: &str) -> Result<Value> {
        self.call(
            Method::Get,
            "/file/rename",
            Params::new().with("home", path).with("name", name),
        )
    }

    pub fn publish_file(&self, path: &str) -> Result<Value> {
        self.call(Method::Get, "/file/publish", Params::new().with("home", path))
    }

    /// Publish `path` and build its public URL from the returned weblink.
    pub fn get_link(&self, path: &str) -> Result<String> {
        let published = self.publish_file(path)?;
        let weblink = published
            .get("body")
            .and_then(Value::as_str)
            .ok_or_else(|| CloudError::Protocol("publish response has no string body".into()))?;
        Ok(format!(
            "{}{}{}",
            self.endpoints.download_base, WEBLINK_SEGMENT, weblink
        ))
    }

    /// Stream the remote file at `path` into `save_path`. Anything but 200
    /// is a failure; the local file may then hold partial data.
    pub fn download(&self, path: &str, save_path: &Path) -> Result<()> {
        let url = format!("{}get{}", self.endpoints.download_base, path);
        debug!("GET {}", url);

        let mut sink = BufWriter::new(File::create(save_path)?);
        let status = self
            .transport
            .send_to_writer(WireRequest::new(Method::Get, url), &mut sink)?;
        sink.flush()?;
        if status != 200 {
            return Err(CloudError::Download { status });
        }
        Ok(())
    }

    /// Upload the local file at `local` to the remote file path `remote`.
    pub fn upload(&self, local: &Path, remote: &str) -> Result<Value> {
        let (folder, name) = split_remote(remote)?;
        self.upload_named(local, folder, name)
    }

    /// Upload `local` into `folder`, keeping its local file name.
    pub fn upload_to_folder(&self, local: &Path, folder: &str) -> Result<Value> {
        let name = local
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CloudError::InvalidPath(format!("{} has no file name", local.display())))?;
        self.upload_named(local, folder, name)
    }

    /// Store `content` as the remote file `path`.
    pub fn create_file(&self, path: &str, content: &[u8]) -> Result<Value> {
        let mut staged = tempfile::NamedTempFile::new()?;
        staged.write_all(content)?;
        staged.flush()?;
        self.upload(staged.path(), path)
    }

    fn upload_named(&self, local: &Path, folder: &str, name: &str) -> Result<Value> {
        let bytes = std::fs::read(local)?;
        let sent = PendingUpload::new(name, bytes).push(&self.transport, &self.endpoints, &self.session)?;
        debug!(
            "pushed {} bytes as {}",
            sent.receipt().byte_size,
            sent.receipt().content_hash
        );
        let confirmed = sent.confirm(&self.transport, &self.endpoints, &self.session, folder)?;
        info!("uploaded {} to {}", local.display(), join_remote(folder, name));
        Ok(confirmed)
    }
}
