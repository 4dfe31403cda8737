//! Replaying inbound requests onto outbound proxies.

use crate::forward::mode::ForwardSpec;
use std::sync::Arc;
use tracing::debug;
use wicket_rpc::{
    Context, IncomingRequest, Invoker, OutgoingRequest, Proxy, WicketResult,
};

/// How a completed forward resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Twoway: the target's encoded reply, handed back verbatim.
    Reply(Vec<u8>),
    /// Oneway or datagram: the outbound transport accepted the bytes.
    /// Resolving only at that point is the backpressure contract; a burst
    /// of oneway forwards is throttled by the outbound flow control
    /// instead of buffering without bound.
    Sent,
}

/// Stateless beyond construction-time configuration, so one instance per
/// session and direction serves any number of concurrent forwards.
pub struct RequestForwarder {
    invoker: Arc<dyn Invoker>,
    client_side: bool,
    forward_context: bool,
    session_context: Context,
}

impl RequestForwarder {
    pub fn new(
        invoker: Arc<dyn Invoker>,
        client_side: bool,
        forward_context: bool,
        session_context: Context,
    ) -> Self {
        Self {
            invoker,
            client_side,
            forward_context,
            session_context,
        }
    }

    /// Rewrite and replay `request` onto `target`.
    ///
    /// The request's facet carries over, the request id and any `_fwd`
    /// override pick the invocation mode, and the session context merges
    /// under the request's own entries (the request wins on key
    /// conflicts). Failures surface here as the error result; nothing
    /// crosses the dispatch boundary as a panic.
    pub async fn forward(
        &self,
        target: &Proxy,
        request: &IncomingRequest,
    ) -> WicketResult<ForwardOutcome> {
        let target = if request.facet.is_empty() {
            target.clone()
        } else {
            target.with_facet(request.facet.clone())
        };
        let target = ForwardSpec::for_request(request).apply(&target);

        let mut context = if self.forward_context {
            self.session_context.clone()
        } else {
            Context::new()
        };
        for (key, value) in &request.context {
            context.insert(key.clone(), value.clone());
        }

        let outgoing = OutgoingRequest {
            operation: request.operation.clone(),
            mode: target.mode,
            context,
            params: request.params.clone(),
        };

        debug!(
            identity = %target.identity,
            operation = %outgoing.operation,
            mode = ?target.mode,
            client = self.client_side,
            "forwarding request"
        );

        if target.mode.expects_reply() {
            let reply = self.invoker.invoke(&target, outgoing).await?;
            Ok(ForwardOutcome::Reply(reply))
        } else {
            self.invoker.send(&target, outgoing).await?;
            Ok(ForwardOutcome::Sent)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::mode::FORWARD_KEY;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;
    use wicket_rpc::{Connection, Endpoint, Identity, InvokeMode, WicketError};

    #[derive(Default)]
    struct RecordingInvoker {
        calls: Mutex<Vec<(Proxy, OutgoingRequest)>>,
    }

    #[async_trait]
    impl Invoker for RecordingInvoker {
        async fn invoke(&self, proxy: &Proxy, request: OutgoingRequest) -> WicketResult<Vec<u8>> {
            self.calls.lock().unwrap().push((proxy.clone(), request));
            Ok(b"reply".to_vec())
        }

        async fn send(&self, proxy: &Proxy, request: OutgoingRequest) -> WicketResult<()> {
            self.calls.lock().unwrap().push((proxy.clone(), request));
            Ok(())
        }
    }

    struct GatedInvoker {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Invoker for GatedInvoker {
        async fn invoke(&self, _: &Proxy, _: OutgoingRequest) -> WicketResult<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn send(&self, _: &Proxy, _: OutgoingRequest) -> WicketResult<()> {
            self.release.notified().await;
            Ok(())
        }
    }

    struct FailingInvoker;

    #[async_trait]
    impl Invoker for FailingInvoker {
        async fn invoke(&self, _: &Proxy, _: OutgoingRequest) -> WicketResult<Vec<u8>> {
            Err(WicketError::Transport("backend unreachable".into()))
        }

        async fn send(&self, _: &Proxy, _: OutgoingRequest) -> WicketResult<()> {
            Err(WicketError::Transport("backend unreachable".into()))
        }
    }

    fn target() -> Proxy {
        Proxy::new(Identity::new("obj", "cat"))
            .with_endpoints(vec![Endpoint::new("10.0.0.5", 443)])
    }

    fn twoway_request() -> IncomingRequest {
        IncomingRequest::twoway(
            Connection::new("127.0.0.1", 4000),
            Identity::new("obj", "cat"),
            "op",
            b"params".to_vec(),
        )
    }

    #[tokio::test]
    async fn twoway_returns_reply() {
        let invoker = Arc::new(RecordingInvoker::default());
        let forwarder = RequestForwarder::new(invoker.clone(), true, false, Context::new());

        let outcome = forwarder.forward(&target(), &twoway_request()).await.unwrap();
        assert_eq!(outcome, ForwardOutcome::Reply(b"reply".to_vec()));

        let calls = invoker.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.mode, InvokeMode::Twoway);
        assert_eq!(calls[0].1.params, b"params");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn oneway_completes_only_after_send() {
        let release = Arc::new(Notify::new());
        let invoker = Arc::new(GatedInvoker {
            release: release.clone(),
        });
        let forwarder = RequestForwarder::new(invoker, true, false, Context::new());
        let target = target();
        let mut request = twoway_request();
        request.request_id = 0;

        let handle = tokio::spawn(async move { forwarder.forward(&target, &request).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        release.notify_one();
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome, ForwardOutcome::Sent);
    }

    #[tokio::test]
    async fn request_context_wins_over_session_context() {
        let invoker = Arc::new(RecordingInvoker::default());
        let mut session_context = Context::new();
        session_context.insert("lang".into(), "fr".into());
        session_context.insert("region".into(), "eu".into());
        let forwarder = RequestForwarder::new(invoker.clone(), true, true, session_context);

        let mut request = twoway_request();
        request.context.insert("lang".into(), "en".into());
        forwarder.forward(&target(), &request).await.unwrap();

        let calls = invoker.calls.lock().unwrap();
        let context = &calls[0].1.context;
        assert_eq!(context.get("lang").unwrap(), "en");
        assert_eq!(context.get("region").unwrap(), "eu");
    }

    #[tokio::test]
    async fn session_context_withheld_when_toggle_off() {
        let invoker = Arc::new(RecordingInvoker::default());
        let mut session_context = Context::new();
        session_context.insert("region".into(), "eu".into());
        let forwarder = RequestForwarder::new(invoker.clone(), true, false, session_context);

        forwarder.forward(&target(), &twoway_request()).await.unwrap();

        let calls = invoker.calls.lock().unwrap();
        assert!(calls[0].1.context.is_empty());
    }

    #[tokio::test]
    async fn facet_and_mode_override_apply_to_target() {
        let invoker = Arc::new(RecordingInvoker::default());
        let forwarder = RequestForwarder::new(invoker.clone(), true, false, Context::new());

        let mut request = twoway_request();
        request.facet = "metrics".into();
        request.context.insert(FORWARD_KEY.into(), "os".into());
        let outcome = forwarder.forward(&target(), &request).await.unwrap();
        assert_eq!(outcome, ForwardOutcome::Sent);

        let calls = invoker.calls.lock().unwrap();
        assert_eq!(calls[0].0.facet, "metrics");
        assert_eq!(calls[0].0.mode, InvokeMode::Oneway);
        assert!(calls[0].0.secure);
    }

    #[tokio::test]
    async fn transport_failure_comes_back_as_error() {
        let forwarder = RequestForwarder::new(Arc::new(FailingInvoker), true, false, Context::new());
        let err = forwarder.forward(&target(), &twoway_request()).await.unwrap_err();
        assert!(matches!(err, WicketError::Transport(_)));
    }
}
