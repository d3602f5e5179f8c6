// In-memory stand-in for the cloud service, used by the integration tests.
//
// It understands the login form, the token endpoint, the upload host, the
// download host and the handful of API calls the client makes, checks that
// signed calls carry the current token, and records every request.

#![allow(dead_code)]

use cloudmail_cli::error::{CloudError, Result};
use cloudmail_cli::transport::{Body, Method, Transport, WireRequest, WireResponse};
use cloudmail_cli::{CloudClient, Credentials, Endpoints};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

pub const LOGIN: &str = "alice";
pub const PASSWORD: &str = "correct horse";
pub const DOMAIN: &str = "mail.ru";
pub const ACCOUNT_EMAIL: &str = "alice@mail.ru";
pub const BASE_TIME: u64 = 1_700_000_000_000;
pub const WEBLINK: &str = "8fQx/2bNkL3q";

#[derive(Default)]
struct State {
    requests: Vec<WireRequest>,
    logged_in: bool,
    landed: bool,
    issued: u64,
    blobs: HashMap<String, Vec<u8>>,
    files: BTreeMap<String, String>,
    failures: Vec<(String, u16)>,
    garbled_token: bool,
}

pub struct FakeCloud {
    pub endpoints: Endpoints,
    state: RefCell<State>,
}

impl FakeCloud {
    pub fn new() -> Self {
        FakeCloud {
            endpoints: Endpoints::default(),
            state: RefCell::new(State::default()),
        }
    }

    /// Answer the next request whose URL ends with `suffix` with `status`.
    pub fn fail_next(&self, suffix: &str, status: u16) {
        self.state
            .borrow_mut()
            .failures
            .push((suffix.to_string(), status));
    }

    /// Make the token endpoint answer with a body missing `body.token`.
    pub fn garble_token_response(&self) {
        self.state.borrow_mut().garbled_token = true;
    }

    pub fn requests(&self) -> Vec<WireRequest> {
        self.state.borrow().requests.clone()
    }

    pub fn requests_to(&self, suffix: &str) -> Vec<WireRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.ends_with(suffix))
            .collect()
    }

    pub fn clear_requests(&self) {
        self.state.borrow_mut().requests.clear();
    }

    pub fn current_token(&self) -> String {
        format!("tok-{}", self.state.borrow().issued)
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.state.borrow().files.contains_key(path)
    }

    fn respond(&self, request: &WireRequest) -> WireResponse {
        let failure = {
            let mut state = self.state.borrow_mut();
            let position = state
                .failures
                .iter()
                .position(|(suffix, _)| request.url.ends_with(suffix.as_str()));
            position.map(|i| state.failures.remove(i).1)
        };
        if let Some(status) = failure {
            return json_response(status, json!({"status": status, "body": "injected failure"}));
        }

        let e = &self.endpoints;
        if request.url == e.auth_url {
            return self.login(request);
        }
        if request.url == e.landing_url {
            let mut state = self.state.borrow_mut();
            state.landed = state.logged_in;
            return raw_response(200, b"<html>cloud</html>".to_vec());
        }
        if request.url == e.token_url {
            return self.issue_token(request);
        }
        if request.url == e.upload_url {
            return self.accept_bytes(request);
        }
        if let Some(path) = request.url.strip_prefix(&format!("{}get", e.download_base)) {
            let state = self.state.borrow();
            return match state.files.get(path).and_then(|h| state.blobs.get(h)) {
                Some(bytes) => raw_response(200, bytes.clone()),
                None => raw_response(404, b"not found".to_vec()),
            };
        }
        if let Some(path) = request.url.strip_prefix(e.api_base.as_str()) {
            return self.api(path, request);
        }
        raw_response(404, Vec::new())
    }

    fn login(&self, request: &WireRequest) -> WireResponse {
        let multipart = matches!(request.body, Body::Multipart(_));
        if multipart
            && request.field("Login") == Some(LOGIN)
            && request.field("Password") == Some(PASSWORD)
            && request.field("Domain") == Some(DOMAIN)
        {
            self.state.borrow_mut().logged_in = true;
            raw_response(200, b"<html>ok</html>".to_vec())
        } else {
            raw_response(403, b"<html>denied</html>".to_vec())
        }
    }

    fn issue_token(&self, request: &WireRequest) -> WireResponse {
        let mut state = self.state.borrow_mut();
        if !state.landed || request.query_value("api") != Some("v2") {
            return json_response(403, json!({"status": 403, "body": "nosdc"}));
        }
        if state.garbled_token {
            return json_response(200, json!({"email": ACCOUNT_EMAIL, "time": BASE_TIME, "body": {}}));
        }
        state.issued += 1;
        json_response(
            200,
            json!({
                "email": ACCOUNT_EMAIL,
                "time": BASE_TIME + state.issued,
                "status": 200,
                "body": {"token": format!("tok-{}", state.issued)},
            }),
        )
    }

    fn accept_bytes(&self, request: &WireRequest) -> WireResponse {
        let bytes = match (&request.body, request.header("Content-Disposition")) {
            (Body::Raw(bytes), Some(disposition)) if disposition.contains("filename=") => bytes,
            _ => return raw_response(400, b"bad upload".to_vec()),
        };
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        let hash = format!("{:016X}{:08X}", hasher.finish(), bytes.len());
        self.state
            .borrow_mut()
            .blobs
            .insert(hash.clone(), bytes.clone());
        raw_response(200, format!("{}\r\n", hash).into_bytes())
    }

    fn api(&self, path: &str, request: &WireRequest) -> WireResponse {
        let param = |key: &str| -> Option<String> {
            let value = match request.method {
                Method::Get => request.query_value(key),
                _ => request.field(key),
            };
            value.map(str::to_string)
        };

        let mut state = self.state.borrow_mut();
        let token_ok = param("token") == Some(format!("tok-{}", state.issued))
            && param("_") == Some((BASE_TIME + state.issued).to_string())
            && param("x-email").as_deref() == Some(ACCOUNT_EMAIL)
            && param("api").as_deref() == Some("2");
        if state.issued == 0 || !token_ok {
            return json_response(403, json!({"status": 403, "body": "token"}));
        }
        let home = param("home").unwrap_or_default();

        match (request.method, path) {
            (Method::Get, "/folder") => {
                let prefix = format!("{}/", home.trim_end_matches('/'));
                let list: Vec<Value> = state
                    .files
                    .keys()
                    .filter(|p| p.starts_with(&prefix))
                    .map(|p| json!({"name": &p[prefix.len()..], "type": "file"}))
                    .collect();
                ok(json!({"home": home, "list": list}))
            }
            (Method::Get, "/folder/add") => ok(json!(home)),
            (Method::Get, "/file/publish") => ok(json!(WEBLINK)),
            (Method::Get, "/file/rename") => ok(json!(home)),
            (Method::Post, "/file/remove") => {
                state.files.remove(&home);
                ok(json!(home))
            }
            (Method::Post, "/file/move") | (Method::Post, "/file/copy") => ok(json!(home)),
            (Method::Post, "/file/add") => {
                let hash = param("hash").unwrap_or_default();
                let known = state
                    .blobs
                    .get(&hash)
                    .map(|b| b.len().to_string())
                    == param("size");
                if !known {
                    return json_response(400, json!({"status": 400, "body": "hash"}));
                }
                if state.files.contains_key(&home) && param("conflict").as_deref() == Some("strict") {
                    return json_response(400, json!({"status": 400, "body": {"home": {"error": "exists"}}}));
                }
                state.files.insert(home.clone(), hash);
                ok(json!(home))
            }
            _ => json_response(404, json!({"status": 404, "body": "unknown"})),
        }
    }
}

impl Transport for FakeCloud {
    fn send(&self, request: WireRequest) -> Result<WireResponse> {
        let response = self.respond(&request);
        self.state.borrow_mut().requests.push(request);
        Ok(response)
    }
}

/// A transport whose network is always down.
pub struct Unreachable;

impl Transport for Unreachable {
    fn send(&self, _request: WireRequest) -> Result<WireResponse> {
        Err(CloudError::Transport("connection refused".into()))
    }
}

fn ok(body: Value) -> WireResponse {
    json_response(200, json!({"status": 200, "email": ACCOUNT_EMAIL, "body": body}))
}

fn json_response(status: u16, body: Value) -> WireResponse {
    WireResponse {
        status,
        headers: vec![("content-type".into(), "application/json".into())],
        body: body.to_string().into_bytes(),
    }
}

fn raw_response(status: u16, body: Vec<u8>) -> WireResponse {
    WireResponse {
        status,
        headers: Vec::new(),
        body,
    }
}

pub fn credentials() -> Credentials {
    Credentials::new(LOGIN, PASSWORD, DOMAIN)
}

/// A client logged in against `cloud`, with the handshake requests cleared.
pub fn connected(cloud: &FakeCloud) -> CloudClient<&FakeCloud> {
    let _ = env_logger::try_init();
    let client = CloudClient::connect(cloud, cloud.endpoints.clone(), credentials())
        .expect("login against the fake cloud");
    cloud.clear_requests();
    client
}
