use log::debug;
use reqwest::blocking::Client;
use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::errors::HttpError;
use super::options::RequestOptions;

/// A fully resolved request: absolute URL plus merged options.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub options: RequestOptions,
}

/// A buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Final URL, after redirects.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> Result<Value, HttpError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Statuses below 400 are accepted; redirects are not errors.
    pub fn error_for_status(&self) -> Result<(), HttpError> {
        if self.status >= 400 {
            Err(HttpError::Status {
                status: self.status,
                url: self.url.clone(),
            })
        } else {
            Ok(())
        }
    }
}

/// Sends a request and buffers the response.
pub trait Transport: Send {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// The default transport: a blocking `reqwest` client per proxy setting,
/// built on first use and reused afterwards.
#[derive(Default)]
pub struct ReqwestTransport {
    clients: Mutex<HashMap<Option<String>, Client>>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, proxy: &Option<String>) -> Result<Client, HttpError> {
        let mut clients = self
            .clients
            .lock()
            .map_err(|_| HttpError::Transport("client cache lock poisoned".into()))?;
        if let Some(client) = clients.get(proxy) {
            return Ok(client.clone());
        }
        let mut builder = Client::builder();
        if let Some(url) = proxy {
            debug!("Routing plain-http traffic through proxy {}", url);
            builder = builder.proxy(reqwest::Proxy::http(url.as_str())?);
        }
        let client = builder.build()?;
        clients.insert(proxy.clone(), client.clone());
        Ok(client)
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let options = &request.options;
        let client = self.client_for(&options.proxy)?;

        let mut builder = client.request(request.method.clone(), request.url.as_str());
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(json) = &options.json {
            builder = builder.json(json);
        } else if !options.form.is_empty() {
            builder = builder.form(&options.form);
        } else if let Some(body) = &options.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let body = response.bytes()?.to_vec();
        Ok(HttpResponse {
            status,
            url,
            headers,
            body,
        })
    }
}
