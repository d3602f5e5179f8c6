// Library root
// -----------
// A blocking client for the Cloud Mail.Ru storage API plus the terminal
// front end that drives it. The binary (`main.rs`) only wires these
// modules together.
//
// Module responsibilities:
// - `session`: login handshake and CSRF token issuance.
// - `signer`: turns logical API calls into signed wire requests.
// - `upload`: the push-bytes-then-confirm upload exchange.
// - `client`: file and folder operations on an authenticated session.
// - `transport`: the HTTP seam (reqwest with a cookie jar by default).
// - `config` / `error`: settings and the shared error type.
// - `ui`: interactive menu built on `dialoguer`.
pub mod client;
pub mod config;
pub mod error;
pub mod session;
pub mod signer;
pub mod transport;
pub mod ui;
pub mod upload;

pub use client::CloudClient;
pub use config::{Config, Credentials, Endpoints};
pub use error::{CloudError, Result};
pub use session::{Session, TokenGrant};
pub use transport::{HttpTransport, Transport};
