//! Guard against actions pointed at private or internal addresses.

use std::net::{IpAddr, Ipv4Addr};

use tracing::warn;
use url::Url;

use crate::error::ActionError;

/// Check if an IP address is private/internal.
pub(crate) fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private()
                || ipv4.is_loopback()
                // Link-local, includes cloud metadata services
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_documentation()
                || ipv4.is_unspecified()
                // Shared address space (100.64.0.0/10)
                || (ipv4.octets()[0] == 100 && (ipv4.octets()[1] & 0xC0) == 64)
                || *ipv4 == Ipv4Addr::new(169, 254, 169, 254)
        }
        IpAddr::V6(ipv6) => {
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                || ipv6
                    .to_ipv4_mapped()
                    .map(|v4| is_private_ip(&IpAddr::V4(v4)))
                    .unwrap_or(false)
                // Unique local (fc00::/7)
                || (ipv6.segments()[0] & 0xFE00) == 0xFC00
                // Link-local (fe80::/10)
                || (ipv6.segments()[0] & 0xFFC0) == 0xFE80
        }
    }
}

/// Parse an action URL and reject it if any resolved address is private.
pub(crate) async fn check_public_endpoint(url_str: &str) -> Result<Url, ActionError> {
    let url = Url::parse(url_str)
        .map_err(|e| ActionError::BlockedEndpoint(format!("invalid URL: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ActionError::BlockedEndpoint(format!(
            "unsupported scheme: {}",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| ActionError::BlockedEndpoint("URL must have a host".to_string()))?;
    let port = url.port_or_known_default().unwrap_or(443);

    let host = host.trim_start_matches('[').trim_end_matches(']');
    let addrs: Vec<_> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| ActionError::BlockedEndpoint(format!("cannot resolve {}: {}", host, e)))?
        .collect();

    if let Some(addr) = addrs.iter().find(|addr| is_private_ip(&addr.ip())) {
        warn!("Blocked action endpoint {} resolving to {}", host, addr.ip());
        return Err(ActionError::BlockedEndpoint(format!(
            "{} resolves to a private address",
            host
        )));
    }

    Ok(url)
}
