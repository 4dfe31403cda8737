//! Address rule patterns.
//!
//! One rule is `host[:port]`. The host part mixes literal text, one `*`
//! wildcard and bracketed numeric groups (`[1,3,10-20]`); the port part is
//! a literal number or a bracketed group. A rule compiles into an ordered
//! matcher pipeline evaluated left to right against a host string, every
//! matcher advancing a shared cursor. All malformed patterns are rejected
//! here, at construction, never at evaluation.

use std::fmt;
use wicket_rpc::{Endpoint, WicketError, WicketResult};

/// Explicit numeric values and inclusive ranges, e.g. `1,3,10-20`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSet {
    ranges: Vec<(u32, u32)>,
}

impl RangeSet {
    fn parse(body: &str, rule: &str) -> WicketResult<Self> {
        let mut ranges = Vec::new();
        for entry in body.split(',') {
            if entry.is_empty() {
                return Err(WicketError::InvalidConfig(format!(
                    "empty group entry in rule {rule:?}"
                )));
            }
            let range = match entry.split_once('-') {
                Some((lo, hi)) => {
                    let lo = parse_number(lo, rule)?;
                    let hi = parse_number(hi, rule)?;
                    if lo > hi {
                        return Err(WicketError::InvalidConfig(format!(
                            "inverted range {entry:?} in rule {rule:?}"
                        )));
                    }
                    (lo, hi)
                }
                None => {
                    let value = parse_number(entry, rule)?;
                    (value, value)
                }
            };
            ranges.push(range);
        }
        Ok(Self { ranges })
    }

    pub fn contains(&self, value: u32) -> bool {
        self.ranges.iter().any(|&(lo, hi)| lo <= value && value <= hi)
    }
}

fn parse_number(s: &str, rule: &str) -> WicketResult<u32> {
    s.parse::<u32>().map_err(|_| {
        WicketError::InvalidConfig(format!("invalid number {s:?} in rule {rule:?}"))
    })
}

/// One step of the host pipeline. The four literal kinds differ in where
/// they may match relative to the cursor; the digit kinds consume a run
/// of ASCII digits and test its numeric value.
#[derive(Debug, Clone)]
enum HostMatcher {
    /// Literal at the very start of the host.
    StartsWith(String),
    /// Literal somewhere at or after the cursor (first occurrence wins).
    Contains(String),
    /// Literal exactly at the cursor.
    MatchesNext(String),
    /// Literal closing the host; consumes everything up to the end.
    EndsWith(String),
    /// Digit run exactly at the cursor.
    DigitsAt(RangeSet),
    /// First digit run at or after the cursor.
    DigitsScan(RangeSet),
    /// Cursor must have consumed the whole host.
    End,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Wildcard,
    Group(RangeSet),
}

/// A compiled `host[:port]` rule.
#[derive(Debug, Clone)]
pub struct AddressRule {
    pattern: String,
    matchers: Vec<HostMatcher>,
    port: Option<RangeSet>,
    match_any: bool,
}

impl AddressRule {
    pub fn parse(rule: &str) -> WicketResult<Self> {
        if rule.is_empty() {
            return Err(WicketError::InvalidConfig("empty address rule".into()));
        }

        let (host_part, port_part) = split_host_port(rule)?;
        if host_part.is_empty() {
            return Err(WicketError::InvalidConfig(format!(
                "empty host pattern in rule {rule:?}"
            )));
        }

        let segments = tokenize(host_part, rule)?;
        let matchers = compile(&segments, rule)?;
        let port = match port_part {
            Some(p) => Some(parse_port(p, rule)?),
            None => None,
        };
        let match_any = segments == [Segment::Wildcard] && port.is_none();

        Ok(Self {
            pattern: rule.to_string(),
            matchers,
            port,
            match_any,
        })
    }

    /// True for the bare `*` rule, the only rule that also matches
    /// proxies carrying no endpoints at all.
    pub fn is_match_any(&self) -> bool {
        self.match_any
    }

    pub fn matches_endpoint(&self, endpoint: &Endpoint) -> bool {
        if self.match_any {
            return true;
        }
        if let Some(port) = &self.port {
            if !port.contains(u32::from(endpoint.port)) {
                return false;
            }
        }
        match_host(&self.matchers, &endpoint.host)
    }
}

impl fmt::Display for AddressRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pattern)
    }
}

/// Split at the first `:` outside any bracket group.
fn split_host_port(rule: &str) -> WicketResult<(&str, Option<&str>)> {
    let mut depth = 0u32;
    for (i, c) in rule.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    WicketError::InvalidConfig(format!("unmatched ']' in rule {rule:?}"))
                })?;
            }
            ':' if depth == 0 => return Ok((&rule[..i], Some(&rule[i + 1..]))),
            _ => {}
        }
    }
    Ok((rule, None))
}

fn tokenize(host: &str, rule: &str) -> WicketResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut seen_wildcard = false;
    let mut chars = host.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '*' => {
                if seen_wildcard {
                    return Err(WicketError::InvalidConfig(format!(
                        "more than one wildcard in rule {rule:?}"
                    )));
                }
                seen_wildcard = true;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Wildcard);
            }
            '[' => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                let close = host[i + 1..].find(']').ok_or_else(|| {
                    WicketError::InvalidConfig(format!("unclosed group in rule {rule:?}"))
                })?;
                let body = &host[i + 1..i + 1 + close];
                if body.is_empty() {
                    return Err(WicketError::InvalidConfig(format!(
                        "empty group in rule {rule:?}"
                    )));
                }
                segments.push(Segment::Group(RangeSet::parse(body, rule)?));
                // Skip past the group body and its closing bracket.
                for _ in 0..=close {
                    chars.next();
                }
            }
            ']' => {
                return Err(WicketError::InvalidConfig(format!(
                    "unmatched ']' in rule {rule:?}"
                )));
            }
            _ => literal.push(c),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn compile(segments: &[Segment], rule: &str) -> WicketResult<Vec<HostMatcher>> {
    let mut matchers = Vec::new();
    for (i, segment) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();
        match segment {
            Segment::Literal(lit) => {
                let matcher = if i == 0 {
                    HostMatcher::StartsWith(lit.clone())
                } else {
                    match segments[i - 1] {
                        Segment::Wildcard => {
                            if last {
                                HostMatcher::EndsWith(lit.clone())
                            } else {
                                HostMatcher::Contains(lit.clone())
                            }
                        }
                        _ => HostMatcher::MatchesNext(lit.clone()),
                    }
                };
                let ends = matches!(matcher, HostMatcher::EndsWith(_));
                matchers.push(matcher);
                if last && !ends {
                    matchers.push(HostMatcher::End);
                }
            }
            Segment::Wildcard => {
                // No matcher of its own; it shapes how the next segment
                // matches and lifts the end anchor when final.
            }
            Segment::Group(set) => {
                let anchored = match i.checked_sub(1).map(|p| &segments[p]) {
                    Some(Segment::Literal(_)) => true,
                    Some(Segment::Wildcard) => false,
                    _ => {
                        return Err(WicketError::InvalidConfig(format!(
                            "group without a literal or wildcard anchor in rule {rule:?}"
                        )));
                    }
                };
                if anchored {
                    matchers.push(HostMatcher::DigitsAt(set.clone()));
                } else {
                    matchers.push(HostMatcher::DigitsScan(set.clone()));
                }
                if last {
                    matchers.push(HostMatcher::End);
                }
            }
        }
    }
    Ok(matchers)
}

fn parse_port(port: &str, rule: &str) -> WicketResult<RangeSet> {
    if port.is_empty() {
        return Err(WicketError::InvalidConfig(format!(
            "empty port pattern in rule {rule:?}"
        )));
    }
    if let Some(body) = port.strip_prefix('[') {
        match body.split_once(']') {
            Some((body, "")) => RangeSet::parse(body, rule),
            Some((_, trailing)) => Err(WicketError::InvalidConfig(format!(
                "unexpected trailing characters {trailing:?} in rule {rule:?}"
            ))),
            None => Err(WicketError::InvalidConfig(format!(
                "unclosed group in rule {rule:?}"
            ))),
        }
    } else {
        let value = parse_number(port, rule)?;
        Ok(RangeSet {
            ranges: vec![(value, value)],
        })
    }
}

/// Consume the maximal digit run starting at `at`; yields the numeric
/// value and the cursor past the run.
fn consume_digits(host: &str, at: usize) -> Option<(u32, usize)> {
    let bytes = host.as_bytes();
    let mut end = at;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == at {
        return None;
    }
    let value = host[at..end].parse::<u32>().ok()?;
    Some((value, end))
}

fn match_host(matchers: &[HostMatcher], host: &str) -> bool {
    let mut cursor = 0usize;
    for matcher in matchers {
        match matcher {
            HostMatcher::StartsWith(lit) | HostMatcher::MatchesNext(lit) => {
                if !host[cursor..].starts_with(lit.as_str()) {
                    return false;
                }
                cursor += lit.len();
            }
            HostMatcher::Contains(lit) => match host[cursor..].find(lit.as_str()) {
                Some(offset) => cursor += offset + lit.len(),
                None => return false,
            },
            HostMatcher::EndsWith(lit) => {
                if !host[cursor..].ends_with(lit.as_str()) {
                    return false;
                }
                cursor = host.len();
            }
            HostMatcher::DigitsAt(set) => match consume_digits(host, cursor) {
                Some((value, end)) if set.contains(value) => cursor = end,
                _ => return false,
            },
            HostMatcher::DigitsScan(set) => {
                // The first digit run decides; no backtracking to later runs.
                let offset = match host[cursor..].find(|c: char| c.is_ascii_digit()) {
                    Some(o) => o,
                    None => return false,
                };
                match consume_digits(host, cursor + offset) {
                    Some((value, end)) if set.contains(value) => cursor = end,
                    _ => return false,
                }
            }
            HostMatcher::End => {
                if cursor != host.len() {
                    return false;
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(rule: &str, host: &str, port: u16) -> bool {
        AddressRule::parse(rule)
            .unwrap()
            .matches_endpoint(&Endpoint::new(host, port))
    }

    #[test]
    fn plain_literal_is_exact() {
        assert!(matches("backend.example.com", "backend.example.com", 1));
        assert!(!matches("backend.example.com", "backend.example.com.evil", 1));
        assert!(!matches("backend.example.com", "xbackend.example.com", 1));
    }

    #[test]
    fn trailing_wildcard_is_prefix() {
        assert!(matches("10.0.0.*", "10.0.0.5", 80));
        assert!(matches("10.0.0.*", "10.0.0.250", 80));
        assert!(!matches("10.0.0.*", "10.0.1.5", 80));
    }

    #[test]
    fn leading_wildcard_is_suffix() {
        assert!(matches("*.example.com", "a.example.com", 80));
        assert!(!matches("*.example.com", "a.example.org", 80));
    }

    #[test]
    fn interior_literal_after_wildcard_is_contains() {
        assert!(matches("db*rack[1-5]", "db-eu-rack3", 80));
        assert!(!matches("db*rack[1-5]", "db-eu-rack9", 80));
        assert!(!matches("db*rack[1-5]", "db-eu-shelf3", 80));
    }

    #[test]
    fn group_after_literal_matches_digits_at_cursor() {
        assert!(matches("host[1-3]", "host2", 80));
        assert!(!matches("host[1-3]", "host25", 80));
        assert!(!matches("host[1-3]", "host2x", 80));
        assert!(!matches("host[1-3]", "host", 80));
    }

    #[test]
    fn literal_after_group_is_anchored() {
        assert!(matches("10.0.[1-3].5", "10.0.2.5", 80));
        assert!(!matches("10.0.[1-3].5", "10.0.2.50", 80));
        assert!(!matches("10.0.[1-3].5", "10.0.4.5", 80));
    }

    #[test]
    fn group_after_wildcard_uses_first_digit_run() {
        assert!(matches("*[80-90]", "rack85", 1));
        assert!(!matches("*[80-90]", "rack9shelf85", 1));
    }

    #[test]
    fn group_values_and_ranges_mix() {
        let rule = AddressRule::parse("node[1,3,10-20]").unwrap();
        assert!(rule.matches_endpoint(&Endpoint::new("node1", 1)));
        assert!(rule.matches_endpoint(&Endpoint::new("node15", 1)));
        assert!(!rule.matches_endpoint(&Endpoint::new("node2", 1)));
    }

    #[test]
    fn port_literal_and_group() {
        assert!(matches("10.0.0.*:443", "10.0.0.5", 443));
        assert!(!matches("10.0.0.*:443", "10.0.0.5", 80));
        assert!(matches("10.0.0.*:[80,443]", "10.0.0.5", 443));
        assert!(!matches("10.0.0.*:[80,443]", "10.0.0.5", 8080));
    }

    #[test]
    fn match_any_rule() {
        let rule = AddressRule::parse("*").unwrap();
        assert!(rule.is_match_any());
        assert!(rule.matches_endpoint(&Endpoint::new("anything", 9)));
        assert!(!AddressRule::parse("*:[80]").unwrap().is_match_any());
        assert!(!AddressRule::parse("*x").unwrap().is_match_any());
    }

    #[test]
    fn parse_errors() {
        for bad in [
            "",
            "10.0.[80",
            "host[]",
            "[1-3].example.com",
            "a[1][2]",
            "a*b*c",
            "host:[80]x",
            "host:",
            "host:[20-10]",
            "host:abc",
            "ho]st",
        ] {
            let err = AddressRule::parse(bad).unwrap_err();
            assert!(
                matches!(err, WicketError::InvalidConfig(_)),
                "rule {bad:?} gave {err:?}"
            );
        }
    }
}
