use std::net::IpAddr;

use gated_notes::{note, CreateNoteRequest, Event, Lud16};
use url::{Host, Url};

use crate::error::GateError;
use crate::provider::PaymentProvider;

/// Whether the gate may open connections to `ip`.
///
/// Loopback, RFC 1918, CGNAT, link-local, unique-local, broadcast and
/// unspecified addresses are refused, as are IPv4-mapped forms of them.
pub fn is_routable(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            let cgnat = a == 100 && (64..128).contains(&b);
            !(v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || cgnat)
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_routable(IpAddr::V4(mapped));
            }
            let head = v6.segments()[0];
            let unique_local = head & 0xfe00 == 0xfc00;
            let link_local = head & 0xffc0 == 0xfe80;
            !(v6.is_loopback() || v6.is_unspecified() || unique_local || link_local)
        }
    }
}

/// Outbound URLs must be HTTPS to a public host.
///
/// Only looks at the URL itself; [`resolve_public_https`] also checks where
/// the name points. Returns the reason on failure.
pub fn check_public_https(url: &Url) -> Result<(), String> {
    if url.scheme() != "https" {
        return Err(format!("{url} must use HTTPS"));
    }

    match url.host() {
        Some(Host::Ipv4(ip)) if !is_routable(IpAddr::V4(ip)) => {
            Err(format!("{ip} is a private or loopback address"))
        }
        Some(Host::Ipv6(ip)) if !is_routable(IpAddr::V6(ip)) => {
            Err(format!("{ip} is a private or loopback address"))
        }
        Some(Host::Domain(domain)) => {
            let domain = domain.to_lowercase();
            if domain == "localhost"
                || domain.ends_with(".localhost")
                || domain.ends_with(".local")
                || domain.ends_with(".internal")
            {
                Err(format!("{domain} is a local domain"))
            } else {
                Ok(())
            }
        }
        Some(_) => Ok(()),
        None => Err(format!("{url} has no host")),
    }
}

/// Every address `host` resolves to must be routable.
pub async fn check_resolved_host(host: &str, port: u16) -> Result<(), String> {
    let addrs: Vec<_> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| format!("could not resolve {host}: {e}"))?
        .collect();

    if addrs.is_empty() {
        return Err(format!("{host} has no addresses"));
    }
    match addrs.iter().find(|addr| !is_routable(addr.ip())) {
        Some(addr) => Err(format!("{host} resolves to private address {}", addr.ip())),
        None => Ok(()),
    }
}

/// [`check_public_https`], then [`check_resolved_host`] for domain names.
///
/// Run immediately before each outbound request so a payee cannot point a
/// public-looking name at the gate's own network.
pub async fn resolve_public_https(url: &Url) -> Result<(), String> {
    check_public_https(url)?;
    match url.host() {
        Some(Host::Domain(domain)) => {
            check_resolved_host(domain, url.port_or_known_default().unwrap_or(443)).await
        }
        _ => Ok(()),
    }
}

/// Parse a payee address and refuse hosts the gate must not call.
pub fn validate_lud16(raw: &str) -> Result<Lud16, GateError> {
    let payee: Lud16 = raw.parse()?;
    let url = Url::parse(&payee.metadata_url())
        .map_err(|_| GateError::Validation(format!("{raw} is not a valid lud16")))?;
    check_public_https(&url).map_err(GateError::Validation)?;
    Ok(payee)
}

/// A publication that passed every check.
#[derive(Debug)]
pub struct ValidPublication {
    pub payee: Lud16,
    pub price: u64,
    /// Decrypted inner event, proof the declared secret seals the note.
    pub inner: Event,
}

/// Run every check a publication must pass before a note entry is stored.
///
/// Cheap local checks come first; the payee resolution is the only network
/// call and runs last.
pub async fn validate_publication<P: PaymentProvider>(
    request: &CreateNoteRequest,
    expected_endpoint: &str,
    provider: &P,
) -> Result<ValidPublication, GateError> {
    if request.secret.is_empty() {
        return Err(GateError::Validation("secret needs to exist".to_string()));
    }
    let price = u64::try_from(request.cost)
        .ok()
        .filter(|c| *c > 0)
        .ok_or_else(|| GateError::Validation("cost needs to be at least 1 msat".to_string()))?;

    let payee = validate_lud16(&request.lud16)?;

    let inner = note::check_publication(
        &request.gated_event,
        &request.secret,
        request.cost,
        expected_endpoint,
    )?;

    let info = provider.resolve_payee(&payee).await.map_err(|e| {
        GateError::Validation(format!("{payee} could not be resolved: {e}"))
    })?;
    if !info.accepts(price) {
        return Err(GateError::Validation(format!(
            "{payee} accepts {}..={} msat, not {price}",
            info.min_sendable, info.max_sendable
        )));
    }

    Ok(ValidPublication {
        payee,
        price,
        inner,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(raw: &str) -> IpAddr {
        raw.parse().unwrap()
    }

    #[test]
    fn test_non_routable_addresses() {
        for raw in [
            "127.0.0.1",
            "10.0.0.1",
            "172.16.5.4",
            "192.168.1.1",
            "169.254.169.254",
            "100.64.0.1",
            "0.0.0.0",
            "::1",
            "::",
            "fc00::1",
            "fe80::1",
            "::ffff:10.0.0.1",
        ] {
            assert!(!is_routable(ip(raw)), "{raw} should be refused");
        }
        for raw in ["8.8.8.8", "100.128.0.1", "2001:db8::1", "::ffff:1.1.1.1"] {
            assert!(is_routable(ip(raw)), "{raw} should be allowed");
        }
    }

    #[tokio::test]
    async fn test_resolved_check_refuses_loopback_names() {
        let err = check_resolved_host("localhost", 443).await.unwrap_err();
        assert!(err.contains("private address"), "{err}");
    }

    #[tokio::test]
    async fn test_resolved_check_refuses_ip_literals() {
        for raw in ["https://127.0.0.1/cb", "https://[::1]/cb", "https://10.1.2.3/cb"] {
            let url = Url::parse(raw).unwrap();
            assert!(resolve_public_https(&url).await.is_err(), "{raw}");
        }
        let url = Url::parse("https://8.8.8.8/cb").unwrap();
        assert!(resolve_public_https(&url).await.is_ok());
    }

    #[test]
    fn test_validate_lud16() {
        assert!(validate_lud16("pay@example.com").is_ok());
        assert!(validate_lud16("pay@wallet.local").is_err());
        assert!(validate_lud16("pay@svc.internal").is_err());
        assert!(validate_lud16("pay@127.0.0.1").is_err());
        assert!(validate_lud16("pay@192.168.0.10").is_err());
        assert!(validate_lud16("not-an-address").is_err());
    }
}
