//! Target-URL validation and SSRF protection.
//!
//! Target URLs come from subscription owners, i.e. untrusted input that the
//! delivery worker will call from inside the network. Validation runs both
//! when a subscription is created and again before every request.

use std::collections::BTreeMap;
use std::net::IpAddr;

use crate::error::DeliveryError;

/// Validate a webhook target URL.
///
/// Checks:
/// 1. URL is parseable
/// 2. Scheme is HTTPS (or HTTP if `allow_http` is set for dev/test)
/// 3. Host is not a private/internal address (skipped when
///    `allow_internal_hosts` is set for dev/test)
pub fn validate_target_url(
    url: &str,
    allow_http: bool,
    allow_internal_hosts: bool,
) -> Result<(), DeliveryError> {
    let parsed = url::Url::parse(url)
        .map_err(|e| DeliveryError::InvalidUrl(format!("Invalid URL format: {e}")))?;

    match parsed.scheme() {
        "https" => {}
        "http" if allow_http => {}
        "http" => {
            return Err(DeliveryError::InvalidUrl(
                "Webhook URLs must use HTTPS".to_string(),
            ));
        }
        scheme => {
            return Err(DeliveryError::InvalidUrl(format!(
                "Unsupported URL scheme: {scheme}"
            )));
        }
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| DeliveryError::InvalidUrl("URL must have a host".to_string()))?;

    if allow_internal_hosts {
        return Ok(());
    }
    validate_host_not_internal(host)
}

/// Validate that a host is not a private/internal address.
///
/// Blocks loopback, RFC 1918 ranges, link-local (cloud metadata endpoints),
/// CGNAT, IPv6 loopback/unspecified, and well-known internal hostnames.
pub fn validate_host_not_internal(host: &str) -> Result<(), DeliveryError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_internal_ip(&ip) {
            return Err(DeliveryError::SsrfDetected(format!(
                "Destination host {host} is a private/internal address"
            )));
        }
    }

    let lower = host.to_ascii_lowercase();
    if lower == "localhost"
        || lower == "metadata.google.internal"
        || lower.ends_with(".internal")
        || lower.ends_with(".local")
    {
        return Err(DeliveryError::SsrfDetected(format!(
            "Destination host {host} is a restricted internal hostname"
        )));
    }

    Ok(())
}

fn is_internal_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()                // 127.0.0.0/8
                || v4.is_private()          // 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16
                || v4.is_link_local()       // 169.254.0.0/16
                || v4.is_broadcast()
                || v4.is_unspecified()
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64) // 100.64.0.0/10 (CGNAT)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

/// Validate that every subscribed event name is currently offered by a
/// registration. `choices` is the engine's event-choices map.
pub fn validate_events(
    events: &[String],
    choices: &BTreeMap<String, String>,
) -> Result<(), DeliveryError> {
    for event in events {
        if !choices.contains_key(event) {
            return Err(DeliveryError::Validation(format!(
                "Unknown event: {event}"
            )));
        }
    }
    Ok(())
}
