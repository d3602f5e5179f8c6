// Transport adapter: the one seam through which every byte reaches the
// network. The core builds `WireRequest` values and hands them to a
// `Transport`; `HttpTransport` is the reqwest-backed implementation that
// keeps a cookie jar for the whole session.

use crate::error::Result;
use reqwest::blocking::{multipart, Client, ClientBuilder};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use std::io::Write;

/// Browser identity the service expects on every call.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/115.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
        }
    }
}

/// Request body as it should appear on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Empty,
    Form(Vec<(String, String)>),
    Multipart(Vec<(String, String)>),
    Raw(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl WireRequest {
    /// A bare request with no parameters, headers or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        WireRequest {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    /// First query value for `key`.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        lookup(&self.query, key)
    }

    /// First form or multipart field named `key`.
    pub fn field(&self, key: &str) -> Option<&str> {
        match &self.body {
            Body::Form(pairs) | Body::Multipart(pairs) => lookup(pairs, key),
            _ => None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl WireResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Performs HTTP exchanges. One instance must carry the cookies of one
/// session across all calls made through it.
pub trait Transport {
    fn send(&self, request: WireRequest) -> Result<WireResponse>;

    /// Send `request` and copy the response body into `sink`, returning the
    /// status code. Implementations should stream; the default buffers.
    fn send_to_writer(&self, request: WireRequest, sink: &mut dyn Write) -> Result<u16> {
        let response = self.send(request)?;
        sink.write_all(&response.body)?;
        Ok(response.status)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: WireRequest) -> Result<WireResponse> {
        (**self).send(request)
    }

    fn send_to_writer(&self, request: WireRequest, sink: &mut dyn Write) -> Result<u16> {
        (**self).send_to_writer(request, sink)
    }
}

/// Blocking reqwest transport with a per-instance cookie store.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Self::build(Client::builder())
    }

    /// Finish `builder` with the cookie jar and browser headers.
    pub fn build(builder: ClientBuilder) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let client = builder
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;
        Ok(HttpTransport { client })
    }

    fn execute(&self, request: WireRequest) -> Result<reqwest::blocking::Response> {
        let mut builder = self.client.request(request.method.into(), &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            Body::Empty => builder,
            Body::Form(pairs) => builder.form(&pairs),
            Body::Multipart(pairs) => {
                let form = pairs
                    .into_iter()
                    .fold(multipart::Form::new(), |form, (name, contents)| {
                        form.text(name, contents)
                    });
                builder.multipart(form)
            }
            Body::Raw(bytes) => builder.body(bytes),
        };
        Ok(builder.send()?)
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: WireRequest) -> Result<WireResponse> {
        let response = self.execute(request)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response.bytes()?.to_vec();
        Ok(WireResponse {
            status,
            headers,
            body,
        })
    }

    fn send_to_writer(&self, request: WireRequest, sink: &mut dyn Write) -> Result<u16> {
        let mut response = self.execute(request)?;
        let status = response.status().as_u16();
        response.copy_to(sink)?;
        Ok(status)
    }
}
