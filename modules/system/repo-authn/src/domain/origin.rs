//! Source restriction for service principals.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs as _};

use super::error::AuthError;

/// Resolves host names to addresses.
pub trait HostResolver: Send + Sync {
    /// Every address `host` resolves to. Unresolvable hosts yield an empty list.
    fn resolve(&self, host: &str) -> Vec<IpAddr>;
}

/// Resolver backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> Vec<IpAddr> {
        match (host, 0_u16).to_socket_addrs() {
            Ok(addrs) => addrs.map(|a| a.ip()).collect(),
            Err(e) => {
                tracing::debug!(host, error = %e, "host resolution failed");
                Vec::new()
            }
        }
    }
}

/// A caller or source address, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    Ip(IpAddr),
    Host(String),
}

/// Accepts `ip`, `ip:port`, `[ipv6]`, `[ipv6]:port` and bare host names.
fn parse_endpoint(raw: &str) -> Option<Endpoint> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(addr) = raw.parse::<SocketAddr>() {
        return Some(Endpoint::Ip(addr.ip()));
    }
    if let Ok(ip) = raw.parse::<IpAddr>() {
        return Some(Endpoint::Ip(ip));
    }
    if let Some(inner) = raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        return inner.parse::<Ipv6Addr>().ok().map(|ip| Endpoint::Ip(IpAddr::V6(ip)));
    }
    let host = match raw.rsplit_once(':') {
        Some((host, port)) if port.parse::<u16>().is_ok() => host,
        _ => raw,
    };
    Some(Endpoint::Host(host.to_ascii_lowercase()))
}

fn addresses(endpoint: &Endpoint, resolver: &dyn HostResolver) -> Vec<IpAddr> {
    match endpoint {
        Endpoint::Ip(ip) => vec![ip.to_canonical()],
        Endpoint::Host(host) if host == "localhost" => {
            vec![IpAddr::V4(Ipv4Addr::LOCALHOST), IpAddr::V6(Ipv6Addr::LOCALHOST)]
        }
        Endpoint::Host(host) => resolver
            .resolve(host)
            .into_iter()
            .map(|ip| ip.to_canonical())
            .collect(),
    }
}

/// Whether `remote_addr` matches at least one entry of `sources`.
///
/// An entry matches when it names the same host, resolves to one of the remote's addresses,
/// or when both sides are loopback.
#[must_use]
pub fn origin_allowed(remote_addr: &str, sources: &[String], resolver: &dyn HostResolver) -> bool {
    let Some(remote) = parse_endpoint(remote_addr) else {
        return false;
    };
    let remote_ips = addresses(&remote, resolver);
    let remote_loopback = !remote_ips.is_empty() && remote_ips.iter().all(IpAddr::is_loopback);

    sources.iter().filter_map(|s| parse_endpoint(s)).any(|source| {
        if source == remote {
            return true;
        }
        let source_ips = addresses(&source, resolver);
        if remote_loopback && source_ips.iter().any(IpAddr::is_loopback) {
            return true;
        }
        source_ips.iter().any(|ip| remote_ips.contains(ip))
    })
}

/// Fails with [`AuthError::UnauthorizedOrigin`] unless [`origin_allowed`] holds.
///
/// # Errors
///
/// See above.
pub fn check_origin(
    remote_addr: &str,
    sources: &[String],
    resolver: &dyn HostResolver,
) -> Result<(), AuthError> {
    if origin_allowed(remote_addr, sources, resolver) {
        Ok(())
    } else {
        Err(AuthError::UnauthorizedOrigin {
            remote: remote_addr.to_owned(),
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct FixedResolver(HashMap<&'static str, Vec<IpAddr>>);

    impl HostResolver for FixedResolver {
        fn resolve(&self, host: &str) -> Vec<IpAddr> {
            self.0.get(host).cloned().unwrap_or_default()
        }
    }

    fn resolver() -> FixedResolver {
        FixedResolver(HashMap::from([
            ("indexer.internal", vec!["10.0.0.7".parse().unwrap()]),
            ("dev-box", vec!["127.0.1.1".parse().unwrap()]),
        ]))
    }

    fn sources(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn localhost_matches_loopback_callers() {
        let r = resolver();
        let allowed = sources(&["localhost"]);
        for remote in ["127.0.0.1", "127.0.0.1:53122", "::1", "[::1]:8080", "localhost"] {
            assert!(origin_allowed(remote, &allowed, &r), "{remote}");
        }
        assert!(!origin_allowed("203.0.113.5", &allowed, &r));
    }

    #[test]
    fn loopback_source_matches_any_loopback() {
        let r = resolver();
        assert!(origin_allowed("127.0.0.1", &sources(&["dev-box"]), &r));
        assert!(!origin_allowed("10.0.0.7", &sources(&["dev-box"]), &r));
    }

    #[test]
    fn host_sources_resolve() {
        let r = resolver();
        let allowed = sources(&["indexer.internal"]);
        assert!(origin_allowed("10.0.0.7:443", &allowed, &r));
        assert!(origin_allowed("::ffff:10.0.0.7", &allowed, &r));
        assert!(!origin_allowed("10.0.0.8", &allowed, &r));
    }

    #[test]
    fn ip_sources_compare_directly() {
        let r = resolver();
        let allowed = sources(&["198.51.100.1", "2001:db8::1"]);
        assert!(origin_allowed("198.51.100.1:9000", &allowed, &r));
        assert!(origin_allowed("[2001:db8::1]:443", &allowed, &r));
        assert!(!origin_allowed("127.0.0.1", &allowed, &r));
    }

    #[test]
    fn empty_sources_match_nobody() {
        let r = resolver();
        for remote in ["127.0.0.1", "::1", "10.0.0.7"] {
            assert!(!origin_allowed(remote, &[], &r), "{remote}");
        }
    }

    #[test]
    fn unparsable_remote_never_matches() {
        assert!(!origin_allowed("", &sources(&["localhost"]), &resolver()));
    }

    #[test]
    fn check_origin_reports_remote() {
        let err = check_origin("203.0.113.5", &sources(&["localhost"]), &resolver()).unwrap_err();
        assert_eq!(
            err,
            AuthError::UnauthorizedOrigin {
                remote: "203.0.113.5".to_owned()
            }
        );
    }
}
