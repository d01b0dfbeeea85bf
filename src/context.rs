//! Ambient request context consumed by context-based (CBAC) checks.
//!
//! The engine never touches a raw HTTP request; the caller resolves the
//! client address and user agent up front and passes the result in.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Resolved per-request client context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientContext {
    /// Client IP, preferring the first forwarded-for entry over the socket
    /// address.
    pub ip_address: Option<IpAddr>,
    /// Raw User-Agent header value.
    pub user_agent: Option<String>,
}

impl ClientContext {
    /// Create a context from an already-known address.
    pub fn new(ip_address: IpAddr) -> Self {
        Self {
            ip_address: Some(ip_address),
            user_agent: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Resolve the client context from header values and the socket address.
    ///
    /// The first entry of `X-Forwarded-For` wins; entries that do not parse
    /// as an address are ignored and the socket address is used instead.
    pub fn resolve(
        forwarded_for: Option<&str>,
        remote_addr: Option<IpAddr>,
        user_agent: Option<&str>,
    ) -> Self {
        let forwarded_ip = forwarded_for
            .and_then(|header| header.split(',').next())
            .and_then(|entry| entry.trim().parse::<IpAddr>().ok());

        Self {
            ip_address: forwarded_ip.or(remote_addr),
            user_agent: user_agent.map(str::to_owned),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_for_first_entry_wins() {
        let ctx = ClientContext::resolve(
            Some("10.1.2.3, 203.0.113.7"),
            Some("192.168.0.1".parse().unwrap()),
            Some("integration-test/1.0"),
        );
        assert_eq!(ctx.ip_address, Some("10.1.2.3".parse().unwrap()));
        assert_eq!(ctx.user_agent.as_deref(), Some("integration-test/1.0"));
    }

    #[test]
    fn falls_back_to_socket_address() {
        let ctx = ClientContext::resolve(None, Some("192.168.0.1".parse().unwrap()), None);
        assert_eq!(ctx.ip_address, Some("192.168.0.1".parse().unwrap()));

        let garbage = ClientContext::resolve(
            Some("not-an-ip"),
            Some("192.168.0.1".parse().unwrap()),
            None,
        );
        assert_eq!(garbage.ip_address, Some("192.168.0.1".parse().unwrap()));
    }

    #[test]
    fn no_address_at_all() {
        let ctx = ClientContext::resolve(None, None, None);
        assert_eq!(ctx.ip_address, None);
    }
}
