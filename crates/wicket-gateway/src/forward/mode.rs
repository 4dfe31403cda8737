//! The in-band forwarding-mode mini-language.
//!
//! A request's `_fwd` context entry overrides how the outbound call
//! travels, one character per attribute. Unknown characters are ignored
//! with a warning; they never fail the forward.

use tracing::{debug, warn};
use wicket_rpc::{IncomingRequest, InvokeMode, Proxy};

/// Context key carrying the mode override string.
pub const FORWARD_KEY: &str = "_fwd";

/// Resolved outbound invocation attributes for one forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardSpec {
    pub mode: InvokeMode,
    pub secure: bool,
    pub compress: bool,
}

impl ForwardSpec {
    /// Derive the outbound attributes: the request id picks the base mode
    /// (zero means the client expects no reply), then `_fwd` characters
    /// override it: `t` twoway, `o` oneway, `d` datagram, `O`/`D` batch
    /// oneway/datagram (downgraded, batch forwarding is unsupported),
    /// `s` require secure, `z` request compression.
    pub fn for_request(request: &IncomingRequest) -> Self {
        let mut spec = Self {
            mode: if request.is_oneway() {
                InvokeMode::Oneway
            } else {
                InvokeMode::Twoway
            },
            secure: false,
            compress: false,
        };
        if let Some(flags) = request.context.get(FORWARD_KEY) {
            for flag in flags.chars() {
                match flag {
                    't' => spec.mode = InvokeMode::Twoway,
                    'o' => spec.mode = InvokeMode::Oneway,
                    'd' => spec.mode = InvokeMode::Datagram,
                    'O' => {
                        debug!("batch oneway forwarding unsupported, downgrading to oneway");
                        spec.mode = InvokeMode::Oneway;
                    }
                    'D' => {
                        debug!("batch datagram forwarding unsupported, downgrading to datagram");
                        spec.mode = InvokeMode::Datagram;
                    }
                    's' => spec.secure = true,
                    'z' => spec.compress = true,
                    other => {
                        warn!(flag = %other, "unknown forwarding mode character ignored");
                    }
                }
            }
        }
        spec
    }

    /// Rewrite `proxy` with these attributes. The mode always wins over
    /// whatever the proxy carried; secure/compress are only ever raised.
    pub fn apply(&self, proxy: &Proxy) -> Proxy {
        let mut target = proxy.with_mode(self.mode);
        if self.secure {
            target.secure = true;
        }
        if self.compress {
            target.compress = true;
        }
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wicket_rpc::{Connection, Identity};

    fn request(request_id: i64, fwd: Option<&str>) -> IncomingRequest {
        let conn = Connection::new("127.0.0.1", 4000);
        let mut req =
            IncomingRequest::twoway(conn, Identity::new("obj", ""), "op", Vec::new());
        req.request_id = request_id;
        if let Some(flags) = fwd {
            req.context.insert(FORWARD_KEY.into(), flags.into());
        }
        req
    }

    #[test]
    fn request_id_picks_base_mode() {
        assert_eq!(
            ForwardSpec::for_request(&request(7, None)).mode,
            InvokeMode::Twoway
        );
        assert_eq!(
            ForwardSpec::for_request(&request(0, None)).mode,
            InvokeMode::Oneway
        );
    }

    #[test]
    fn flags_override_base_mode() {
        assert_eq!(
            ForwardSpec::for_request(&request(7, Some("o"))).mode,
            InvokeMode::Oneway
        );
        assert_eq!(
            ForwardSpec::for_request(&request(0, Some("t"))).mode,
            InvokeMode::Twoway
        );
        assert_eq!(
            ForwardSpec::for_request(&request(7, Some("d"))).mode,
            InvokeMode::Datagram
        );
    }

    #[test]
    fn batch_flags_downgrade() {
        assert_eq!(
            ForwardSpec::for_request(&request(7, Some("O"))).mode,
            InvokeMode::Oneway
        );
        assert_eq!(
            ForwardSpec::for_request(&request(7, Some("D"))).mode,
            InvokeMode::Datagram
        );
    }

    #[test]
    fn secure_and_compress_flags() {
        let spec = ForwardSpec::for_request(&request(7, Some("sz")));
        assert!(spec.secure);
        assert!(spec.compress);
        assert_eq!(spec.mode, InvokeMode::Twoway);
    }

    #[test]
    fn unknown_flags_are_ignored() {
        let spec = ForwardSpec::for_request(&request(7, Some("q!o")));
        assert_eq!(spec.mode, InvokeMode::Oneway);
    }

    #[test]
    fn apply_overrides_proxy_mode() {
        let proxy = Proxy::new(Identity::new("obj", "")).with_mode(InvokeMode::BatchOneway);
        let spec = ForwardSpec::for_request(&request(7, Some("s")));
        let rewritten = spec.apply(&proxy);
        assert_eq!(rewritten.mode, InvokeMode::Twoway);
        assert!(rewritten.secure);
    }
}
