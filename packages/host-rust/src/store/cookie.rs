//! Cookie-backed preference store.
//!
//! Reads preferences out of a request's `Cookie` header and collects the
//! `Set-Cookie` values the host should send back with the response.

use std::collections::HashMap;

use autogrid_core::PreferenceStore;
use parking_lot::Mutex;

/// Request-scoped cookie jar.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: Mutex<HashMap<String, String>>,
    outgoing: Mutex<Vec<String>>,
    path: String,
}

impl CookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: "/".to_string(),
            ..Self::default()
        }
    }

    /// Parses a `Cookie` request header (`"a=1; b=2"`). Values are
    /// percent-decoded; malformed pairs are skipped.
    #[must_use]
    pub fn from_header(header: &str) -> Self {
        let jar = Self::new();
        {
            let mut cookies = jar.cookies.lock();
            for pair in header.split(';') {
                let Some((name, value)) = pair.split_once('=') else {
                    continue;
                };
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let raw = value.trim();
                let decoded = urlencoding::decode(raw)
                    .map_or_else(|_| raw.to_string(), std::borrow::Cow::into_owned);
                cookies.insert(name.to_string(), decoded);
            }
        }
        jar
    }

    /// Sets the `Path` attribute on outgoing cookies.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// `Set-Cookie` header values produced so far, in write order.
    #[must_use]
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.outgoing.lock().clone()
    }

    /// Drains the pending `Set-Cookie` header values.
    pub fn take_set_cookie_headers(&self) -> Vec<String> {
        std::mem::take(&mut *self.outgoing.lock())
    }
}

impl PreferenceStore for CookieJar {
    fn get(&self, key: &str) -> Option<String> {
        self.cookies.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.cookies.lock().insert(key.to_string(), value.to_string());
        let header = format!("{key}={}; Path={}", urlencoding::encode(value), self.path);
        tracing::trace!(cookie = %key, "queued Set-Cookie");
        self.outgoing.lock().push(header);
    }
}
