//! Process identity facts used as the static label dimensions.

use crate::config::IdentityOverrides;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, UdpSocket};

const TOPOLOGY_DEFAULT: &str = "*";
const APP_DEFAULT: &str = "unknown";

/// Deployment topology and application identity, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessIdentity {
    pub realm: String,
    pub region: String,
    pub az: String,
    pub domain: String,
    pub instance: String,
    pub app_name: String,
    pub app_version: String,
}

impl Default for ProcessIdentity {
    fn default() -> Self {
        Self {
            realm: TOPOLOGY_DEFAULT.to_string(),
            region: TOPOLOGY_DEFAULT.to_string(),
            az: TOPOLOGY_DEFAULT.to_string(),
            domain: TOPOLOGY_DEFAULT.to_string(),
            instance: "localhost".to_string(),
            app_name: APP_DEFAULT.to_string(),
            app_version: APP_DEFAULT.to_string(),
        }
    }
}

impl ProcessIdentity {
    /// Resolve from `REALM`, `REGION`, `AZ`, `DOMAIN`, `INSTANCE`, `APP_NAME`
    /// and `APP_VERSION`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve using an arbitrary key lookup. Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let instance = lookup("INSTANCE")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .or_else(|| local_ip().map(|ip| ip.to_string()))
            .unwrap_or_else(|| "localhost".to_string());

        Self {
            realm: get("REALM", TOPOLOGY_DEFAULT),
            region: get("REGION", TOPOLOGY_DEFAULT),
            az: get("AZ", TOPOLOGY_DEFAULT),
            domain: get("DOMAIN", TOPOLOGY_DEFAULT),
            instance,
            app_name: get("APP_NAME", APP_DEFAULT),
            app_version: get("APP_VERSION", APP_DEFAULT),
        }
    }

    /// Apply configured overrides on top of these values.
    pub fn merged_with(mut self, overrides: &IdentityOverrides) -> Self {
        let apply = |slot: &mut String, value: &Option<String>| {
            if let Some(v) = value {
                *slot = v.clone();
            }
        };
        apply(&mut self.realm, &overrides.realm);
        apply(&mut self.region, &overrides.region);
        apply(&mut self.az, &overrides.az);
        apply(&mut self.domain, &overrides.domain);
        apply(&mut self.instance, &overrides.instance);
        apply(&mut self.app_name, &overrides.app_name);
        apply(&mut self.app_version, &overrides.app_version);
        self
    }
}

/// Address of the interface used for outbound traffic. Connecting a UDP
/// socket sends no packets.
fn local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}
