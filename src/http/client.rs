use log::{error, info};
use reqwest::Method;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::config::HttpConfig;
use super::errors::HttpError;
use super::load_test::{LoadTestExtras, LoadTestSession};
use super::options::RequestOptions;
use super::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use super::url::join_urls;

/// Inspects every response before the status check.
pub type ResponseHandler = Box<dyn Fn(&HttpResponse) -> Result<(), HttpError> + Send + Sync>;
/// Inspects every decoded JSON body.
pub type JsonHandler = Box<dyn Fn(&Value) -> Result<(), HttpError> + Send + Sync>;
/// Replaces the value handed back to the caller.
pub type Interceptor = Arc<dyn Fn(&HttpResponse, Option<&Value>) -> Value + Send + Sync>;

static REQUEST_IDS: AtomicU64 = AtomicU64::new(1);

/// Process-wide request id shared by every client, so log lines of
/// concurrent clients never collide.
pub fn next_request_id() -> u64 {
    REQUEST_IDS.fetch_add(1, Ordering::Relaxed)
}

/// Per-call switches of [`HttpClient::call_api`].
#[derive(Clone)]
pub struct CallOptions {
    /// Decode the body as JSON and run the JSON handlers.
    pub is_json_resp: bool,
    /// Overrides the client interceptor for this call.
    pub interceptor: Option<Interceptor>,
    /// Skip request/response logging, e.g. for file uploads.
    pub disable_log: bool,
    /// Load-test arguments, used only while a load-test session is installed.
    pub load_test: Option<LoadTestExtras>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            is_json_resp: true,
            interceptor: None,
            disable_log: false,
            load_test: None,
        }
    }
}

impl CallOptions {
    pub fn raw() -> Self {
        Self {
            is_json_resp: false,
            ..Self::default()
        }
    }

    pub fn without_log(mut self) -> Self {
        self.disable_log = true;
        self
    }

    pub fn with_interceptor(mut self, interceptor: Interceptor) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    pub fn with_load_test(mut self, extras: LoadTestExtras) -> Self {
        self.load_test = Some(extras);
        self
    }
}

/// What a call hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Response {
        response: HttpResponse,
        /// The decoded body, when JSON was expected.
        json: Option<Value>,
    },
    /// The value an interceptor produced.
    Intercepted(Value),
}

impl Reply {
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            Reply::Response { response, .. } => Some(response),
            Reply::Intercepted(_) => None,
        }
    }

    /// Decoded body, or the intercepted value.
    pub fn json(&self) -> Option<&Value> {
        match self {
            Reply::Response { json, .. } => json.as_ref(),
            Reply::Intercepted(value) => Some(value),
        }
    }
}

/// Request wrapper of one service under test.
///
/// Builds URLs from `base_url`, merges default and per-call options, logs
/// every exchange and runs the registered hooks. Installing a load-test
/// session reroutes all calls through the harness instead.
pub struct HttpClient {
    base_url: String,
    defaults: RequestOptions,
    transport: Box<dyn Transport>,
    response_handlers: Vec<ResponseHandler>,
    json_handlers: Vec<JsonHandler>,
    interceptor: Option<Interceptor>,
    load_test: Option<Box<dyn LoadTestSession>>,
    injected: Option<LoadTestExtras>,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, config: HttpConfig) -> Self {
        Self {
            base_url: base_url.into(),
            defaults: config.default_options(),
            transport: Box::new(ReqwestTransport::new()),
            response_handlers: Vec::new(),
            json_handlers: Vec::new(),
            interceptor: None,
            load_test: None,
            injected: None,
        }
    }

    /// Swap the transport, e.g. for a stub in tests.
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Box::new(transport);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn defaults(&self) -> &RequestOptions {
        &self.defaults
    }

    pub fn defaults_mut(&mut self) -> &mut RequestOptions {
        &mut self.defaults
    }

    pub fn add_response_handler(
        &mut self,
        handler: impl Fn(&HttpResponse) -> Result<(), HttpError> + Send + Sync + 'static,
    ) {
        self.response_handlers.push(Box::new(handler));
    }

    pub fn add_json_handler(&mut self, handler: impl Fn(&Value) -> Result<(), HttpError> + Send + Sync + 'static) {
        self.json_handlers.push(Box::new(handler));
    }

    pub fn set_interceptor(&mut self, interceptor: Option<Interceptor>) {
        self.interceptor = interceptor;
    }

    pub fn enable_load_test(&mut self, session: impl LoadTestSession + 'static) {
        self.load_test = Some(Box::new(session));
    }

    pub fn disable_load_test(&mut self) {
        self.load_test = None;
    }

    pub fn on_performance_test(&self) -> bool {
        self.load_test.is_some()
    }

    /// One-shot load-test arguments for the next call; they take precedence
    /// over the call's own `load_test` value.
    pub fn inject_load_test(&mut self, extras: LoadTestExtras) {
        self.injected = Some(extras);
    }

    pub fn call_api(
        &mut self,
        endpoint: &str,
        method: Method,
        options: Option<&RequestOptions>,
        call: CallOptions,
    ) -> Result<Reply, HttpError> {
        let url = join_urls(&self.base_url, [endpoint]);
        let request_id = next_request_id();
        let merged = match options {
            Some(per_call) => self.defaults.merge(per_call),
            None => self.defaults.clone(),
        };
        let request = HttpRequest {
            method,
            url,
            options: merged,
        };

        if let Some(session) = &self.load_test {
            let extras = self.injected.take().or(call.load_test).unwrap_or_default();
            let response = session.request(&request, &extras)?;
            return Ok(Reply::Response { response, json: None });
        }

        if !call.disable_log {
            let parameters = request.options.to_log_value().to_string();
            info!(
                method = request.method.as_str(),
                parameters = parameters.as_str(),
                url = request.url.as_str(),
                request_id = request_id;
                "start request"
            );
        }

        let start = Instant::now();
        let response = self.transport.send(&request).map_err(|e| {
            error!(request_id = request_id; "request to {} failed: {}", request.url, e);
            e
        })?;

        if !call.disable_log {
            let text = response.text();
            info!(
                response = text.as_str(),
                request_id = request_id,
                is_json_format = call.is_json_resp,
                url = response.url.as_str(),
                status_code = response.status,
                latency = start.elapsed().as_millis() as u64;
                "got response"
            );
        }

        let mut handler_error = None;
        for handler in &self.response_handlers {
            if let Err(e) = handler(&response) {
                handler_error.get_or_insert(e);
            }
        }
        if let Some(e) = handler_error {
            return Err(e);
        }

        response.error_for_status()?;

        let json = if call.is_json_resp {
            let decoded = response.json().map_err(|e| {
                if !call.disable_log {
                    error!(request_id = request_id; "convert response to json fail");
                }
                e
            })?;
            let mut handler_error = None;
            for handler in &self.json_handlers {
                if let Err(e) = handler(&decoded) {
                    handler_error.get_or_insert(e);
                }
            }
            if let Some(e) = handler_error {
                return Err(e);
            }
            Some(decoded)
        } else {
            None
        };

        match call.interceptor.as_ref().or(self.interceptor.as_ref()) {
            Some(intercept) => Ok(Reply::Intercepted(intercept(&response, json.as_ref()))),
            None => Ok(Reply::Response { response, json }),
        }
    }

    pub fn get(&mut self, endpoint: &str, options: Option<&RequestOptions>) -> Result<Reply, HttpError> {
        self.call_api(endpoint, Method::GET, options, CallOptions::default())
    }

    pub fn post(&mut self, endpoint: &str, options: Option<&RequestOptions>) -> Result<Reply, HttpError> {
        self.call_api(endpoint, Method::POST, options, CallOptions::default())
    }

    pub fn put(&mut self, endpoint: &str, options: Option<&RequestOptions>) -> Result<Reply, HttpError> {
        self.call_api(endpoint, Method::PUT, options, CallOptions::default())
    }

    pub fn delete(&mut self, endpoint: &str, options: Option<&RequestOptions>) -> Result<Reply, HttpError> {
        self.call_api(endpoint, Method::DELETE, options, CallOptions::default())
    }
}
