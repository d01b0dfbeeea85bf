//! Engine configuration: context restrictions and security kill-switches.
//!
//! Everything the engine consults is an explicit parameter here; there are
//! no hidden globals.

use chrono::NaiveTime;
use chrono_tz::Tz;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Business-hours window in a named timezone.
///
/// The window is half-open: a request at exactly `start` is inside, one at
/// exactly `end` is outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub timezone: Tz,
}

impl BusinessHours {
    pub fn new(start: NaiveTime, end: NaiveTime, timezone: Tz) -> Self {
        Self {
            start,
            end,
            timezone,
        }
    }

    /// Whether a local wall-clock time falls inside the window.
    pub fn contains(&self, local_time: NaiveTime) -> bool {
        local_time >= self.start && local_time < self.end
    }
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(8, 0, 0).expect("valid literal time"),
            end: NaiveTime::from_hms_opt(18, 0, 0).expect("valid literal time"),
            timezone: chrono_tz::America::New_York,
        }
    }
}

/// Configuration for the access decision engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Business-hours window consulted by the context check.
    pub business_hours: BusinessHours,

    /// Deny requests outside business hours.
    pub require_business_hours: bool,

    /// Deny requests from outside the allowed networks. Fail-closed: with
    /// this enabled, an unresolvable client IP is denied.
    pub require_allowed_ip: bool,

    /// CIDR ranges the client IP must fall inside when `require_allowed_ip`
    /// is set.
    pub allowed_networks: Vec<IpNetwork>,

    /// Global kill-switch for row-level rule checks.
    pub row_level_enabled: bool,

    /// Global kill-switch for column-level visibility resolution.
    pub column_level_enabled: bool,
}

impl Default for EngineConfig {
    /// Defaults mirror a typical intranet deployment: row/column security
    /// on, context restrictions off, RFC1918 + loopback ranges pre-listed.
    fn default() -> Self {
        let allowed_networks = ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16", "127.0.0.1/32"]
            .iter()
            .map(|cidr| cidr.parse().expect("valid literal CIDR"))
            .collect();

        Self {
            business_hours: BusinessHours::default(),
            require_business_hours: false,
            require_allowed_ip: false,
            allowed_networks,
            row_level_enabled: true,
            column_level_enabled: true,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_business_hours(mut self, hours: BusinessHours) -> Self {
        self.business_hours = hours;
        self
    }

    pub fn require_business_hours(mut self, required: bool) -> Self {
        self.require_business_hours = required;
        self
    }

    pub fn require_allowed_ip(mut self, required: bool) -> Self {
        self.require_allowed_ip = required;
        self
    }

    pub fn with_allowed_networks(mut self, networks: Vec<IpNetwork>) -> Self {
        self.allowed_networks = networks;
        self
    }

    pub fn row_level_enabled(mut self, enabled: bool) -> Self {
        self.row_level_enabled = enabled;
        self
    }

    pub fn column_level_enabled(mut self, enabled: bool) -> Self {
        self.column_level_enabled = enabled;
        self
    }

    /// Exact CIDR containment over every configured range.
    pub fn ip_allowed(&self, ip: IpAddr) -> bool {
        self.allowed_networks.iter().any(|net| net.contains(ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_hours_window_is_half_open() {
        let hours = BusinessHours::default();
        assert!(hours.contains(NaiveTime::from_hms_opt(8, 0, 0).unwrap()));
        assert!(!hours.contains(NaiveTime::from_hms_opt(7, 59, 59).unwrap()));
        assert!(hours.contains(NaiveTime::from_hms_opt(17, 59, 59).unwrap()));
        assert!(!hours.contains(NaiveTime::from_hms_opt(18, 0, 0).unwrap()));
    }

    #[test]
    fn cidr_containment_is_exact() {
        let config = EngineConfig::default();
        assert!(config.ip_allowed("10.1.2.3".parse().unwrap()));
        assert!(config.ip_allowed("192.168.10.20".parse().unwrap()));
        assert!(config.ip_allowed("127.0.0.1".parse().unwrap()));
        // 172.32.x.x is outside 172.16.0.0/12; a prefix match would pass it.
        assert!(!config.ip_allowed("172.32.0.1".parse().unwrap()));
        assert!(!config.ip_allowed("203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn builder_flags() {
        let config = EngineConfig::new()
            .require_business_hours(true)
            .require_allowed_ip(true)
            .row_level_enabled(false)
            .column_level_enabled(false);
        assert!(config.require_business_hours);
        assert!(config.require_allowed_ip);
        assert!(!config.row_level_enabled);
        assert!(!config.column_level_enabled);
    }
}
