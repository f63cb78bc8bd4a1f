// Crux's built-in Render covers view refreshes; all network calls go through
// crux_http.
pub use crux_core::render::Render;
pub use crux_http::http::Method;
pub use crux_http::Http;

use crux_http::RequestBuilder;
use url::Url;

use crate::event::Event;

/// What the shell hands back for one request.
pub type ApiResult = crux_http::Result<crux_http::Response<Vec<u8>>>;

pub const MAX_REQUEST_BODY_SIZE: usize = 50 * 1024 * 1024;

/// A request prepared by a store, not yet bound to the HTTP capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    method: Method,
    url: Url,
    headers: Vec<(&'static str, String)>,
    body: Option<Vec<u8>>,
}

impl ApiRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name, value.into()));
        self
    }

    #[must_use]
    pub fn with_body(self, body: Vec<u8>, content_type: impl Into<String>) -> Self {
        let mut request = self.with_header("Content-Type", content_type);
        request.body = Some(body);
        request
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Binds the request to `http`. Headers are applied after the body so the
    /// body's default content type never wins.
    pub fn into_builder<Ev: 'static>(self, http: &Http<Ev>) -> RequestBuilder<Ev> {
        let mut builder = http.request(self.method, self.url);
        if let Some(body) = self.body {
            builder = builder.body_bytes(body);
        }
        for (name, value) in self.headers {
            builder = builder.header(name, value.as_str());
        }
        builder
    }
}

#[derive(crux_core::macros::Effect)]
#[effect(app = "crate::App")]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
}
