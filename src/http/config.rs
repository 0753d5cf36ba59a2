use std::time::Duration;

use super::options::RequestOptions;

/// Environment variable naming the elastic (feature) environment to route to.
pub const ELASTIC_ENV_VAR: &str = "HULK_ELASTIC_ENV_FLAG";
/// Environment variable holding the plain-http proxy URL.
pub const PROXY_ENV_VAR: &str = "HULK_PROXY";
/// Header carrying the elastic environment flag.
pub const ELASTIC_ENV_HEADER: &str = "x-env-flag";
/// The shared base environment; requests to it carry no flag header.
pub const BASE_ENV: &str = "base";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

/// Construction-time settings of an [`super::HttpClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub elastic_env_flag: Option<String>,
    pub proxy: Option<String>,
    /// Extra default options, applied to every request of the client.
    pub defaults: RequestOptions,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            elastic_env_flag: None,
            proxy: None,
            defaults: RequestOptions::default(),
        }
    }
}

impl HttpConfig {
    /// Defaults plus the `HULK_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`HttpConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            elastic_env_flag: non_empty(ELASTIC_ENV_VAR),
            proxy: non_empty(PROXY_ENV_VAR),
            ..Self::default()
        }
    }

    /// An explicit flag takes precedence over the environment.
    pub fn with_elastic_env_flag(mut self, flag: impl Into<String>) -> Self {
        self.elastic_env_flag = Some(flag.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_defaults(mut self, defaults: RequestOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// The options every request of the client starts from.
    ///
    /// The environment proxy only applies when the explicit defaults don't
    /// name one.
    pub fn default_options(&self) -> RequestOptions {
        let mut options = RequestOptions::new().timeout(self.timeout);
        if let Some(flag) = self.elastic_env_flag.as_deref() {
            if flag != BASE_ENV {
                options = options.header(ELASTIC_ENV_HEADER, flag);
            }
        }
        let mut options = options.merge(&self.defaults);
        if options.proxy.is_none() {
            options.proxy = self.proxy.clone();
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key: &str| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
    }

    #[test]
    fn elastic_flag_becomes_a_header() {
        let config = HttpConfig::from_lookup(lookup(&[(ELASTIC_ENV_VAR, "feature-42")]));
        let options = config.default_options();
        assert_eq!(options.headers.get(ELASTIC_ENV_HEADER).map(String::as_str), Some("feature-42"));
        assert_eq!(options.timeout, Some(DEFAULT_TIMEOUT));
    }

    #[test]
    fn base_environment_sends_no_flag() {
        let config = HttpConfig::from_lookup(lookup(&[(ELASTIC_ENV_VAR, "base")]));
        assert!(config.default_options().headers.is_empty());
    }

    #[test]
    fn explicit_flag_beats_environment() {
        let config = HttpConfig::from_lookup(lookup(&[(ELASTIC_ENV_VAR, "env-flag")]))
            .with_elastic_env_flag("explicit");
        assert_eq!(config.default_options().headers[ELASTIC_ENV_HEADER], "explicit");
    }

    #[test]
    fn environment_proxy_yields_to_explicit_defaults() {
        let config = HttpConfig::from_lookup(lookup(&[(PROXY_ENV_VAR, "http://env-proxy:3128")]));
        assert_eq!(config.default_options().proxy.as_deref(), Some("http://env-proxy:3128"));

        let config = config.with_defaults(RequestOptions::new().proxy("http://mine:8080"));
        assert_eq!(config.default_options().proxy.as_deref(), Some("http://mine:8080"));
    }
}
