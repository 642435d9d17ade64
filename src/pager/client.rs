use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use thiserror::Error;
use tracing::{debug, warn};

use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("rate limited or unavailable (HTTP {0})")]
    Throttled(u16),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("soft-blocked: {0}")]
    SoftBlocked(String),
    #[error("TLS failure: {0}")]
    Tls(String),
    #[error("request failed: {0}")]
    Transport(String),
}

pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

/// Something that can GET a page. The pager only ever talks to this.
pub trait PageSource {
    fn get(&mut self, url: &str) -> Result<FetchResponse, FetchError>;

    /// Switch to relaxed certificate checks after a TLS failure.
    fn relax_tls(&mut self) -> Result<(), FetchError> {
        Ok(())
    }
}

/// Blocking reqwest client with a fresh user agent on every request.
/// The cookie jar outlives client rebuilds so the session survives `relax_tls`.
pub struct HttpSource {
    client: Client,
    jar: Arc<Jar>,
    settings: Settings,
    relaxed: bool,
}

impl HttpSource {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let jar = Arc::new(Jar::default());
        Ok(HttpSource {
            client: build_client(settings.timeout(), false, &jar)?,
            jar,
            settings: settings.clone(),
            relaxed: false,
        })
    }
}

impl PageSource for HttpSource {
    fn get(&mut self, url: &str) -> Result<FetchResponse, FetchError> {
        let ua = self.settings.pick_user_agent();
        debug!(url, user_agent = ua, "GET");

        let res = self
            .client
            .get(url)
            .header(USER_AGENT, ua)
            .header(ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9,en;q=0.8")
            .send()
            .map_err(classify)?;
        let status = res.status().as_u16();
        let body = res.text().map_err(classify)?;
        Ok(FetchResponse { status, body })
    }

    fn relax_tls(&mut self) -> Result<(), FetchError> {
        if !self.relaxed {
            warn!("TLS verification failed, retrying with relaxed certificate checks");
            self.client = build_client(self.settings.timeout(), true, &self.jar)?;
            self.relaxed = true;
        }
        Ok(())
    }
}

fn build_client(timeout: Duration, accept_invalid_certs: bool, jar: &Arc<Jar>) -> Result<Client, FetchError> {
    Client::builder()
        .timeout(timeout)
        .cookie_provider(Arc::clone(jar))
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .map_err(|e| FetchError::Transport(error_chain(&e)))
}

fn classify(e: reqwest::Error) -> FetchError {
    let msg = error_chain(&e);
    if looks_like_tls(&msg) {
        FetchError::Tls(msg)
    } else {
        FetchError::Transport(msg)
    }
}

/// reqwest hides the interesting part (rustls, io) in the source chain.
fn error_chain(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        msg.push_str(": ");
        msg.push_str(&s.to_string());
        source = s.source();
    }
    msg
}

fn looks_like_tls(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    ["certificate", "tls", "ssl", "handshake"]
        .iter()
        .any(|k| lower.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_messages_detected() {
        assert!(looks_like_tls("error sending request: invalid peer certificate: UnknownIssuer"));
        assert!(looks_like_tls("SSL routines::wrong version number"));
        assert!(!looks_like_tls("operation timed out"));
    }

    #[test]
    fn http_source_builds() {
        assert!(HttpSource::new(&Settings::default()).is_ok());
    }

    #[test]
    fn cookies_survive_relaxed_tls() {
        use reqwest::cookie::CookieStore;

        let mut src = HttpSource::new(&Settings::default()).unwrap();
        let url = reqwest::Url::parse("https://steamcommunity.com/app/42/").unwrap();
        src.jar.add_cookie_str("sessionid=abc123; Path=/", &url);
        let jar_before = Arc::clone(&src.jar);

        src.relax_tls().unwrap();

        assert!(src.relaxed);
        assert!(Arc::ptr_eq(&jar_before, &src.jar));
        let cookies = src.jar.cookies(&url).unwrap();
        assert!(cookies.to_str().unwrap().contains("sessionid=abc123"));
    }
}
