//! The method-channel bridge between the router and the embedded engine.

mod common;

use common::*;
use hybrid_navigator::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

struct Fixture {
    router: Router,
    bridge: EngineBridge,
    outbound: mpsc::UnboundedReceiver<MethodCall>,
    native: RecordingHandler,
}

fn fixture() -> Fixture {
    init_logging();
    let (tx, outbound) = mpsc::unbounded_channel();
    let transport: Arc<dyn Transport> = Arc::new(tx);
    let native = RecordingHandler::new();

    let (router, _task) = RouterBuilder::new()
        .resolver(resolver_fn(|request: &RouteRequest| {
            let renderer = if request.url.starts_with("/flutter") {
                Renderer::Embedded
            } else {
                Renderer::Native
            };
            Some(RouteAction::from_request(request).with_renderer(renderer))
        }))
        .push_handler(HybridPushHandler::new(native.clone()))
        .engine(Arc::new(ChannelEngine::new(transport.clone())))
        .spawn();
    let bridge = EngineBridge::new(router.clone(), transport);

    Fixture {
        router,
        bridge,
        outbound,
        native,
    }
}

fn call(method: &str, arguments: Value) -> MethodCall {
    MethodCall::new(method, arguments)
}

#[tokio::test]
async fn test_inbound_push_of_native_page() {
    let f = fixture();

    let answer = f
        .bridge
        .handle(call(
            "push",
            json!({ "url": "/native/settings", "instanceKey": "s1", "params": { "tab": 2 } }),
        ))
        .await
        .unwrap();

    assert_eq!(answer["url"], json!("/native/settings"));
    assert_eq!(answer["params"]["tab"], json!(2));
    assert_eq!(
        f.native.pushed(),
        vec![("s1".to_string(), "/native/settings".to_string())]
    );
    assert_eq!(f.router.stack().await.unwrap(), vec!["s1"]);
}

#[tokio::test]
async fn test_embedded_push_creates_view_over_channel() {
    let mut f = fixture();

    f.router.push("/flutter/home").await.unwrap();

    let create = f.outbound.recv().await.unwrap();
    assert_eq!(create.method, "createView");
    assert_eq!(create.arguments["url"], json!("/flutter/home"));
    assert_eq!(create.arguments["instanceKey"], json!("/flutter/home"));
    assert!(f.native.pushed().is_empty());

    f.router.close("/flutter/home").await.unwrap();
    assert_eq!(
        f.outbound.recv().await.unwrap(),
        call("closeView", json!({ "instanceKey": "/flutter/home" }))
    );
}

#[tokio::test]
async fn test_result_for_engine_request_is_sent_back() {
    let mut f = fixture();

    f.bridge
        .handle(call(
            "push",
            json!({ "url": "/native/picker", "instanceKey": "p1", "requestId": 12 }),
        ))
        .await
        .unwrap();

    f.bridge
        .handle(call(
            "close",
            json!({ "instanceKey": "p1", "result": { "picked": "blue" } }),
        ))
        .await
        .unwrap();

    assert_eq!(
        f.outbound.recv().await.unwrap(),
        call(
            "onResult",
            json!({ "requestId": 12, "result": { "picked": "blue" } })
        )
    );
}

#[tokio::test]
async fn test_result_is_returned_when_resolver_assigns_key() {
    init_logging();
    let (tx, mut outbound) = mpsc::unbounded_channel();
    let transport: Arc<dyn Transport> = Arc::new(tx);
    let (router, _task) = RouterBuilder::new()
        .resolver(resolver_fn(|request: &RouteRequest| {
            Some(RouteAction::from_request(request).with_instance_key("auto:1"))
        }))
        .push_handler(RecordingHandler::new())
        .spawn();
    let bridge = EngineBridge::new(router.clone(), transport);

    bridge
        .handle(call(
            "push",
            json!({ "url": "/native/picker", "instanceKey": "asked", "requestId": 3 }),
        ))
        .await
        .unwrap();
    assert_eq!(router.stack().await.unwrap(), vec!["auto:1"]);

    bridge
        .handle(call(
            "close",
            json!({ "instanceKey": "auto:1", "result": { "picked": "red" } }),
        ))
        .await
        .unwrap();
    assert_eq!(
        outbound.recv().await.unwrap(),
        call("onResult", json!({ "requestId": 3, "result": { "picked": "red" } }))
    );
}

#[tokio::test]
async fn test_open_container_reads_key_from_params() {
    let mut f = fixture();

    let answer = f
        .bridge
        .handle(call(
            "openContainer",
            json!({ "url": "/flutter/cart", "params": { "instanceKey": "cart", "items": 3 } }),
        ))
        .await
        .unwrap();

    assert_eq!(answer["instanceKey"], json!("cart"));
    assert_eq!(answer["params"], json!({ "items": 3 }));
    assert_eq!(f.router.stack().await.unwrap(), vec!["cart"]);

    let create = f.outbound.recv().await.unwrap();
    assert_eq!(create.arguments["instanceKey"], json!("cart"));
}

#[tokio::test]
async fn test_startup_handshake_over_channel() {
    let mut f = fixture();

    let bridge = Arc::new(f.bridge);
    let waiting = {
        let bridge = bridge.clone();
        tokio::spawn(async move { bridge.handle(call("waitForReady", Value::Null)).await })
    };

    let started = f.router.start_route(Some(json!({ "theme": "dark" })));
    assert_eq!(
        f.outbound.recv().await.unwrap(),
        call("startRoute", json!({ "theme": "dark" }))
    );
    assert_eq!(waiting.await.unwrap(), Ok(json!({ "theme": "dark" })));

    bridge.handle(call("ready", Value::Null)).await.unwrap();
    assert_eq!(started.await, Ok(()));
    assert_eq!(f.router.readiness().await.unwrap(), Readiness::Ready);
}

#[tokio::test]
async fn test_start_failure_reported_by_engine() {
    let f = fixture();

    let started = f.router.start_route(None);
    f.bridge
        .handle(call("startFailed", json!({ "message": "no isolate" })))
        .await
        .unwrap();

    assert_eq!(
        started.await,
        Err(NavigationError::StartupFailed {
            message: "no isolate".into()
        })
    );
}

#[tokio::test]
async fn test_unknown_method_is_not_implemented() {
    let f = fixture();
    let err = f.bridge.handle(call("reboot", Value::Null)).await.unwrap_err();
    assert_eq!(
        err,
        BridgeError::NotImplemented {
            method: "reboot".into()
        }
    );
    assert_eq!(err.code(), "notImplemented");
}

#[tokio::test]
async fn test_navigation_errors_surface_with_codes() {
    let f = fixture();

    let err = f
        .bridge
        .handle(call("close", json!({ "instanceKey": "nope" })))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "unknownInstance");

    f.bridge
        .handle(call("push", json!({ "url": "/native/a" })))
        .await
        .unwrap();
    let err = f
        .bridge
        .handle(call("push", json!({ "url": "/native/a" })))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "duplicateInstance");
}

#[tokio::test]
async fn test_malformed_arguments_are_rejected() {
    let f = fixture();
    let err = f
        .bridge
        .handle(call("push", json!({ "instanceKey": "x" })))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::InvalidArguments { ref method, .. } if method == "push"));
    assert!(f.router.stack().await.unwrap().is_empty());
}

#[test]
fn test_method_call_wire_shape() {
    let call = MethodCall::new("close", json!({ "instanceKey": "k" }));
    let encoded = serde_json::to_value(&call).unwrap();
    assert_eq!(
        encoded,
        json!({ "method": "close", "arguments": { "instanceKey": "k" } })
    );
    assert_eq!(CHANNEL_NAME, "unirouter_manager");
}
