//! End-to-end workflows against fully in-memory collaborators.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, Once};
use wicket_gateway::{AuthGrant, ForwardOutcome, Gateway, GatewayConfig, SessionAuthorizer};
use wicket_rpc::{
    codec, Connection, Context, Endpoint, Identity, IncomingRequest, Invoker, LocalAdapter,
    Object, ObjectAdapter, OutgoingRequest, Proxy, WicketError, WicketResult,
};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Records every outbound call; twoway replies echo the merged context so
/// tests can see exactly what the forwarder attached.
#[derive(Default)]
struct Backend {
    calls: Mutex<Vec<(Proxy, OutgoingRequest)>>,
}

#[async_trait]
impl Invoker for Backend {
    async fn invoke(&self, proxy: &Proxy, request: OutgoingRequest) -> WicketResult<Vec<u8>> {
        let reply = codec::encode_params(&request.context)?;
        self.calls.lock().unwrap().push((proxy.clone(), request));
        Ok(reply)
    }

    async fn send(&self, proxy: &Proxy, request: OutgoingRequest) -> WicketResult<()> {
        self.calls.lock().unwrap().push((proxy.clone(), request));
        Ok(())
    }
}

struct PasswordAuthorizer;

#[async_trait]
impl SessionAuthorizer for PasswordAuthorizer {
    async fn authorize(
        &self,
        user_id: &str,
        credential: &str,
        _connection: &Connection,
    ) -> WicketResult<AuthGrant> {
        if credential != "open sesame" {
            return Err(WicketError::NotAuthorized(user_id.to_string()));
        }
        let mut context = Context::new();
        context.insert("user".into(), user_id.into());
        Ok(AuthGrant {
            context,
            backend_session: Some(Proxy::new(Identity::new(user_id, "backend-sessions"))),
        })
    }
}

fn gateway(config: GatewayConfig, backend: Arc<Backend>, callbacks: bool) -> Gateway {
    let server_adapter: Option<Arc<dyn ObjectAdapter>> = if callbacks {
        Some(LocalAdapter::new(vec![Endpoint::new("gateway.example", 4063)]))
    } else {
        None
    };
    Gateway::new(
        config,
        LocalAdapter::new(vec![]),
        server_adapter,
        backend,
        Arc::new(PasswordAuthorizer),
        None,
    )
    .expect("valid configuration")
}

fn management(connection: &Connection, operation: &str, params: Vec<u8>) -> IncomingRequest {
    IncomingRequest::twoway(
        connection.clone(),
        Identity::new("gateway", ""),
        operation,
        params,
    )
}

fn credentials(user: &str, password: &str) -> Vec<u8> {
    codec::encode_params(&(user.to_string(), password.to_string())).unwrap()
}

#[tokio::test]
async fn full_session_workflow() -> Result<()> {
    init_tracing();
    let mut config = GatewayConfig::default();
    config.routing.accept = "10.0.0.*:[80,443]".into();
    config.forward.client_context = true;
    let backend = Arc::new(Backend::default());
    let gateway = gateway(config, backend.clone(), true);
    let servant = gateway.router_servant();
    let conn = Connection::new("198.51.100.30", 54000);

    // Authenticate.
    let reply = servant
        .dispatch(management(&conn, "createSession", credentials("alice", "open sesame")))
        .await?;
    let backend_session: Option<Proxy> = codec::decode_params(&reply)?;
    assert_eq!(
        backend_session.map(|p| p.identity),
        Some(Identity::new("alice", "backend-sessions"))
    );

    // Learn the callback category.
    let reply = servant
        .dispatch(management(&conn, "getCategoryForClient", codec::empty_params()))
        .await?;
    let category: String = codec::decode_params(&reply)?;
    assert!(!category.is_empty());

    // Register a back-end object.
    let printer = Proxy::new(Identity::new("p1", "printers"))
        .with_endpoints(vec![Endpoint::new("10.0.0.5", 443)]);
    let params = codec::encode_params(&vec![Some(printer)])?;
    let reply = servant
        .dispatch(management(&conn, "addProxies", params))
        .await?;
    let evicted: Vec<Proxy> = codec::decode_params(&reply)?;
    assert!(evicted.is_empty());

    // Client request, forwarded with the session's context attached.
    let request = IncomingRequest::twoway(
        conn.clone(),
        Identity::new("p1", "printers"),
        "print",
        codec::empty_params(),
    );
    let ForwardOutcome::Reply(reply) = gateway.dispatch(&request).await? else {
        panic!("twoway forward must produce a reply");
    };
    let forwarded_context: Context = codec::decode_params(&reply)?;
    assert_eq!(
        forwarded_context.get("user").map(String::as_str),
        Some("alice")
    );

    // Back-end callback, fixed to the client's own connection.
    let callback = IncomingRequest::oneway(
        Connection::new("10.0.0.5", 443),
        Identity::new("widget", category),
        "refresh",
        codec::empty_params(),
    );
    let outcome = gateway.dispatch(&callback).await?;
    assert!(matches!(outcome, ForwardOutcome::Sent));
    {
        let calls = backend.calls.lock().unwrap();
        let (target, outgoing) = &calls[1];
        assert_eq!(target.fixed_connection, Some(conn.id()));
        assert_eq!(outgoing.operation, "refresh");
    }

    // Tear down; the data plane closes behind the session.
    servant
        .dispatch(management(&conn, "destroySession", codec::empty_params()))
        .await?;
    let err = gateway.dispatch(&request).await.unwrap_err();
    assert!(matches!(err, WicketError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn rejected_registration_aborts_the_connection() -> Result<()> {
    init_tracing();
    let mut config = GatewayConfig::default();
    config.routing.accept = "10.0.0.*".into();
    let gateway = gateway(config, Arc::new(Backend::default()), false);
    let servant = gateway.router_servant();
    let conn = Connection::new("198.51.100.31", 54001);
    servant
        .dispatch(management(&conn, "createSession", credentials("alice", "open sesame")))
        .await?;

    let rogue = Proxy::new(Identity::new("exfil", ""))
        .with_endpoints(vec![Endpoint::new("203.0.113.9", 443)]);
    let params = codec::encode_params(&vec![Some(rogue)])?;
    let err = servant
        .dispatch(management(&conn, "addProxies", params))
        .await
        .unwrap_err();
    assert!(matches!(err, WicketError::NotAuthorized(_)));
    assert!(conn.is_aborted());
    Ok(())
}

#[tokio::test]
async fn failed_authentication_leaves_nothing_behind() -> Result<()> {
    init_tracing();
    let gateway = gateway(GatewayConfig::default(), Arc::new(Backend::default()), false);
    let servant = gateway.router_servant();
    let conn = Connection::new("198.51.100.32", 54002);

    let err = servant
        .dispatch(management(&conn, "createSession", credentials("mallory", "guess")))
        .await
        .unwrap_err();
    assert!(matches!(err, WicketError::NotAuthorized(_)));
    assert_eq!(gateway.coordinator().session_count(), 0);

    let params = codec::encode_params(&Vec::<Option<Proxy>>::new())?;
    let err = servant
        .dispatch(management(&conn, "addProxies", params))
        .await
        .unwrap_err();
    assert!(matches!(err, WicketError::SessionDestroyed));
    Ok(())
}

#[tokio::test]
async fn gateway_shutdown_closes_every_session() -> Result<()> {
    init_tracing();
    let gateway = gateway(GatewayConfig::default(), Arc::new(Backend::default()), false);
    let servant = gateway.router_servant();

    let conns: Vec<Connection> = (0u16..3)
        .map(|i| Connection::new("198.51.100.33", 54100 + i))
        .collect();
    for conn in &conns {
        servant
            .dispatch(management(conn, "createSession", credentials("alice", "open sesame")))
            .await?;
    }
    assert_eq!(gateway.coordinator().session_count(), 3);

    gateway.destroy();
    assert_eq!(gateway.coordinator().session_count(), 0);
    let err = servant
        .dispatch(management(
            &Connection::new("198.51.100.34", 54200),
            "createSession",
            credentials("alice", "open sesame"),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, WicketError::Other(_)));
    Ok(())
}
