//! A simulated hybrid app: native screens plus an embedded engine that
//! talks to the router over a method channel.
//!
//! Run with `RUST_LOG=hybrid_navigator=debug cargo run --example hybrid_demo`.

use hybrid_navigator::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let (tx, mut outbound) = mpsc::unbounded_channel::<MethodCall>();
    let transport: Arc<dyn Transport> = Arc::new(tx);

    let routes = RouteTable::new()
        .native("/settings")
        .native("/picker")
        .embedded("/shop/item/:id")
        .redirect("/product/:id", "/shop/item/:id");

    let native = push_handler_fn(|action: &RouteAction, ctx: &mut PushContext<'_>| {
        println!("[native] show {} as '{}'", action.url(), ctx.instance_key());
        if action.url() == "/picker" {
            if let Some(sink) = ctx.take_result_sink() {
                // The picker answers as soon as it appears.
                sink.deliver(Some(RouteParams::new().with("color", "teal")));
            }
        }
        PushDisposition::Presented
    });

    let (router, task) = RouterBuilder::new()
        .config(RouterConfig::default().with_name("demo"))
        .resolver(routes)
        .push_handler(HybridPushHandler::new(native))
        .engine(Arc::new(ChannelEngine::new(transport.clone())))
        .spawn();
    let bridge = Arc::new(EngineBridge::new(router.clone(), transport));

    // The embedded engine: prints what it is asked to do and reports ready
    // once told to start.
    let engine_side = {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            while let Some(call) = outbound.recv().await {
                println!("[engine] <- {} {}", call.method, call.arguments);
                if call.method == "startRoute" {
                    let _ = bridge.handle(MethodCall::new("ready", Value::Null)).await;
                }
            }
        })
    };

    router.start_route(Some(json!({ "locale": "en" }))).await?;
    let args = bridge
        .handle(MethodCall::new("waitForReady", Value::Null))
        .await?;
    println!("engine received start arguments {}", args);

    router.push("/settings").await?;
    let product = router.push("/product/42").await?;
    println!("/product/42 resolved to {}", product.url());

    let (pushed, picked) = router.push_for_result("/picker");
    pushed.await?;
    println!("picker returned {:?}", picked.await);

    // The engine pushes a native page and waits for its result.
    bridge
        .handle(MethodCall::new(
            "push",
            json!({ "url": "/settings", "instanceKey": "from-engine", "requestId": 1 }),
        ))
        .await?;
    router
        .close(CloseRequest::new("from-engine").with_result(RouteParams::new().with("saved", true)))
        .await?;

    println!("stack: {:?}", router.stack().await?);
    router.close("/product/42").await?;
    router.close("/settings").await?;
    println!("stack after closing: {:?}", router.stack().await?);

    router.shutdown();
    task.await?;
    drop(bridge);
    engine_side.abort();
    Ok(())
}
