pub mod client;
pub mod config;
pub mod errors;
pub mod options;
pub mod transport;
pub mod url;

pub use client::{CallOptions, HttpClient, Interceptor, Reply};
pub use config::HttpConfig;
pub use errors::HttpError;
pub use load_test::{LoadTestExtras, LoadTestSession};
pub use options::RequestOptions;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use url::join_urls;
pub use reqwest::Method;
