//! Endpoint resolution and normalization
//!
//! The pool keys its entries by normalized channel URL. Two spellings of the
//! same logical target (trailing slash, relative vs. absolute form, `http`
//! vs. `ws` scheme, default port) must collapse to one key, or the pool
//! silently opens duplicate connections to the same backend.

use crate::error::ChannelError;

use super::config::ChannelOptions;

/// Normalized absolute channel URL, usable as a pool key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey(String);

impl EndpointKey {
    /// Resolve an endpoint spelling into a normalized key
    ///
    /// Accepted forms:
    /// - absolute: `ws://…`, `wss://…`, `http://…`, `https://…` (http maps
    ///   to ws, https to wss)
    /// - scheme-relative: `//host/path` (scheme from options)
    /// - relative: `/path` or `path` against `options.base` when one is
    ///   configured
    /// - bare host: `host:port/path` when no base is configured
    pub fn resolve(endpoint: &str, options: &ChannelOptions) -> Result<Self, ChannelError> {
        let input = endpoint.trim();
        if input.is_empty() {
            return Err(ChannelError::InvalidEndpoint(endpoint.to_string()));
        }

        let (scheme, rest) = match split_scheme(input) {
            Some((scheme, rest)) => (map_scheme(scheme, input)?, rest),
            None if input.starts_with("//") => (preferred_scheme(options), &input[2..]),
            None => {
                if let Some(base) = &options.base {
                    return Self::resolve_against_base(input, base, options);
                }
                if input.starts_with('/') {
                    return Err(ChannelError::MissingBase(endpoint.to_string()));
                }
                (preferred_scheme(options), input)
            }
        };

        let (host, path) = split_host_path(rest);
        if host.is_empty() {
            return Err(ChannelError::InvalidEndpoint(endpoint.to_string()));
        }

        Ok(Self(format!(
            "{}://{}{}",
            scheme,
            normalize_host(host, scheme),
            normalize_path(path)
        )))
    }

    fn resolve_against_base(
        input: &str,
        base: &str,
        options: &ChannelOptions,
    ) -> Result<Self, ChannelError> {
        let base = base.trim();
        let (base_scheme, base_rest) = match split_scheme(base) {
            Some((scheme, rest)) => (map_scheme(scheme, base)?, rest),
            None => (preferred_scheme(options), base),
        };

        // An explicit secure preference overrides the base's scheme
        let scheme = match options.secure {
            Some(true) => "wss",
            Some(false) => "ws",
            None => base_scheme,
        };

        let (host, _) = split_host_path(base_rest);
        if host.is_empty() {
            return Err(ChannelError::InvalidEndpoint(base.to_string()));
        }

        let path = format!("/{}", input.trim_start_matches('/'));
        Ok(Self(format!(
            "{}://{}{}",
            scheme,
            normalize_host(host, scheme),
            normalize_path(&path)
        )))
    }

    /// The normalized URL
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn split_scheme(input: &str) -> Option<(&str, &str)> {
    let idx = input.find("://")?;
    Some((&input[..idx], &input[idx + 3..]))
}

fn map_scheme<'a>(scheme: &'a str, original: &str) -> Result<&'a str, ChannelError> {
    match scheme.to_ascii_lowercase().as_str() {
        "ws" | "http" => Ok("ws"),
        "wss" | "https" => Ok("wss"),
        _ => Err(ChannelError::InvalidEndpoint(original.to_string())),
    }
}

fn preferred_scheme(options: &ChannelOptions) -> &'static str {
    match options.secure {
        Some(false) => "ws",
        // Secure unless explicitly told otherwise
        _ => "wss",
    }
}

fn split_host_path(rest: &str) -> (&str, &str) {
    match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    }
}

fn normalize_host(host: &str, scheme: &str) -> String {
    let lowered = host.to_ascii_lowercase();
    let default_port = match scheme {
        "wss" => ":443",
        _ => ":80",
    };

    match lowered.strip_suffix(default_port) {
        Some(stripped) => stripped.to_string(),
        None => lowered,
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    trimmed.to_string()
}
