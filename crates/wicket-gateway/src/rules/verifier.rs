//! The accept/reject decision over a candidate proxy's endpoints.

use crate::rules::pattern::AddressRule;
use wicket_rpc::{Proxy, WicketResult};

/// Compiled accept/reject rule sets plus the optional proxy-length cap.
/// Built once at gateway construction and shared read-only by every
/// session's routing table.
pub struct ProxyVerifier {
    accept: Vec<AddressRule>,
    reject: Vec<AddressRule>,
    max_proxy_length: usize,
}

impl ProxyVerifier {
    /// Compile whitespace-separated rule strings. Any malformed rule
    /// fails the whole construction.
    pub fn new(accept: &str, reject: &str, max_proxy_length: usize) -> WicketResult<Self> {
        Ok(Self {
            accept: parse_rules(accept)?,
            reject: parse_rules(reject)?,
            max_proxy_length,
        })
    }

    /// Decide whether `proxy` may enter a routing table.
    ///
    /// With no rules configured everything passes. With only accept rules,
    /// a proxy must match one. With only reject rules, it must match none.
    /// With both, it must match an accept rule and no reject rule. The
    /// length cap, when set, applies before any of that.
    pub fn verify(&self, proxy: &Proxy) -> bool {
        if self.max_proxy_length > 0 && proxy.stringified().len() > self.max_proxy_length {
            return false;
        }
        match (self.accept.is_empty(), self.reject.is_empty()) {
            (true, true) => true,
            (false, true) => matches_any(&self.accept, proxy),
            (true, false) => !matches_any(&self.reject, proxy),
            (false, false) => matches_any(&self.accept, proxy) && !matches_any(&self.reject, proxy),
        }
    }
}

fn parse_rules(rules: &str) -> WicketResult<Vec<AddressRule>> {
    rules.split_whitespace().map(AddressRule::parse).collect()
}

/// A rule matches a proxy only if every endpoint satisfies it; a proxy
/// with no endpoints satisfies nothing but the bare `*` rule.
fn matches_any(rules: &[AddressRule], proxy: &Proxy) -> bool {
    rules.iter().any(|rule| {
        if rule.is_match_any() {
            return true;
        }
        if proxy.endpoints.is_empty() {
            return false;
        }
        proxy
            .endpoints
            .iter()
            .all(|endpoint| rule.matches_endpoint(endpoint))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wicket_rpc::{Endpoint, Identity};

    fn proxy(endpoints: &[(&str, u16)]) -> Proxy {
        Proxy::new(Identity::new("obj", "cat")).with_endpoints(
            endpoints
                .iter()
                .map(|&(host, port)| Endpoint::new(host, port))
                .collect(),
        )
    }

    #[test]
    fn wildcard_host_with_port_group() {
        let v = ProxyVerifier::new("10.0.0.*:[80,443]", "", 0).unwrap();
        assert!(v.verify(&proxy(&[("10.0.0.5", 443)])));
        assert!(!v.verify(&proxy(&[("10.0.1.5", 443)])));
        assert!(!v.verify(&proxy(&[("10.0.0.5", 8080)])));
    }

    #[test]
    fn no_rules_accept_everything() {
        let v = ProxyVerifier::new("", "", 0).unwrap();
        assert!(v.verify(&proxy(&[("anywhere", 1)])));
        assert!(v.verify(&proxy(&[])));
    }

    #[test]
    fn reject_only_defaults_to_accept() {
        let v = ProxyVerifier::new("", "10.0.0.*", 0).unwrap();
        assert!(v.verify(&proxy(&[("10.0.1.5", 443)])));
        assert!(!v.verify(&proxy(&[("10.0.0.5", 443)])));
    }

    #[test]
    fn both_rule_sets_must_agree() {
        let v = ProxyVerifier::new("10.0.0.*", "10.0.0.13", 0).unwrap();
        assert!(v.verify(&proxy(&[("10.0.0.5", 443)])));
        assert!(!v.verify(&proxy(&[("10.0.0.13", 443)])));
        assert!(!v.verify(&proxy(&[("10.1.0.5", 443)])));
    }

    #[test]
    fn every_endpoint_must_match() {
        let v = ProxyVerifier::new("10.0.0.*", "", 0).unwrap();
        assert!(v.verify(&proxy(&[("10.0.0.5", 443), ("10.0.0.6", 443)])));
        assert!(!v.verify(&proxy(&[("10.0.0.5", 443), ("10.0.1.6", 443)])));
    }

    #[test]
    fn endpointless_proxy_needs_match_any() {
        let strict = ProxyVerifier::new("10.0.0.*", "", 0).unwrap();
        assert!(!strict.verify(&proxy(&[])));
        let open = ProxyVerifier::new("10.0.0.* *", "", 0).unwrap();
        assert!(open.verify(&proxy(&[])));
    }

    #[test]
    fn length_cap_applies_first() {
        let p = proxy(&[("10.0.0.5", 443)]);
        let v = ProxyVerifier::new("", "", p.stringified().len()).unwrap();
        assert!(v.verify(&p));
        let tight = ProxyVerifier::new("", "", p.stringified().len() - 1).unwrap();
        assert!(!tight.verify(&p));
    }

    #[test]
    fn multiple_rules_are_alternatives() {
        let v = ProxyVerifier::new("10.0.0.* backend.example.com", "", 0).unwrap();
        assert!(v.verify(&proxy(&[("10.0.0.9", 1)])));
        assert!(v.verify(&proxy(&[("backend.example.com", 1)])));
        assert!(!v.verify(&proxy(&[("other.example.com", 1)])));
    }

    #[test]
    fn malformed_rule_fails_construction() {
        assert!(ProxyVerifier::new("10.0.0.* host[", "", 0).is_err());
        assert!(ProxyVerifier::new("", "[1]x", 0).is_err());
    }
}
