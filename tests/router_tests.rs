//! End-to-end router behaviour through the public handle.

mod common;

use common::*;
use hybrid_navigator::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn test_stack_membership_round_trip() {
    let (router, _task) = spawn_router(RecordingHandler::new());

    assert!(router.stack().await.unwrap().is_empty());
    router
        .push(PushRequest::new("/a").with_instance_key("a1"))
        .await
        .unwrap();
    assert_eq!(router.stack().await.unwrap(), vec!["a1"]);

    router.close("a1").await.unwrap();
    assert!(router.stack().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_push_leaves_stack_unchanged() {
    let handler = RecordingHandler::new();
    let (router, _task) = spawn_router(handler.clone());

    router
        .push(PushRequest::new("/a").with_instance_key("k"))
        .await
        .unwrap();
    let err = router
        .push(PushRequest::new("/b").with_instance_key("k"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        NavigationError::DuplicateInstance {
            instance_key: "k".into()
        }
    );
    assert_eq!(router.stack().await.unwrap(), vec!["k"]);
    assert_eq!(handler.pushed(), vec![("k".to_string(), "/a".to_string())]);
}

#[tokio::test]
async fn test_empty_instance_key_collides_on_url() {
    let (router, _task) = spawn_router(RecordingHandler::new());

    router.push("/a").await.unwrap();
    let err = router
        .push(PushRequest::new("/a").with_instance_key(""))
        .await
        .unwrap_err();

    assert!(matches!(err, NavigationError::DuplicateInstance { ref instance_key } if instance_key == "/a"));
    assert_eq!(router.stack().await.unwrap(), vec!["/a"]);
}

#[tokio::test]
async fn test_redirecting_resolver_scenario() {
    let handler = RecordingHandler::new();
    let (router, _task) = spawn_router(handler.clone());
    router.set_resolver(resolver_fn(|request: &RouteRequest| {
        let url = if request.url == "/detail" {
            "/detail/v2"
        } else {
            request.url.as_str()
        };
        Some(
            RouteAction::new(url)
                .with_instance_key(request.instance_key.clone())
                .with_params(request.params.clone()),
        )
    }));
    let listener = RecordingListener::new("");
    router.add_listener(&as_listener(&listener));

    let action = router
        .push(
            PushRequest::new("/detail")
                .with_instance_key("d1")
                .with_params(RouteParams::new().with("id", 7)),
        )
        .await
        .unwrap();

    assert_eq!(action.url(), "/detail/v2");
    assert_eq!(action.params().get_as::<i32>("id"), Some(7));
    assert_eq!(
        listener.events(),
        vec!["resolved /detail -> /detail/v2", "handled /detail/v2"]
    );
    assert_eq!(router.stack().await.unwrap(), vec!["d1"]);
    assert_eq!(
        handler.pushed(),
        vec![("d1".to_string(), "/detail/v2".to_string())]
    );
}

#[tokio::test]
async fn test_close_delivers_result_exactly_once() {
    let (router, _task) = spawn_router(RecordingHandler::new());

    let (pushed, result) = router.push_for_result(
        PushRequest::new("/detail")
            .with_instance_key("d1")
            .with_params(RouteParams::new().with("id", 7)),
    );
    pushed.await.unwrap();

    router
        .close(CloseRequest::new("d1").with_result(RouteParams::new().with("status", "ok")))
        .await
        .unwrap();

    let result = result.await.unwrap();
    assert_param_equals(&result, "status", "ok");
    assert!(router.stack().await.unwrap().is_empty());
    assert_eq!(router.pending_results().await.unwrap(), 0);
}

#[tokio::test]
async fn test_sink_result_then_close_invokes_callback_once() {
    let handler = RecordingHandler::new();
    let (router, _task) = spawn_router(handler.clone());
    let calls = Arc::new(Mutex::new(Vec::new()));

    let c = calls.clone();
    router
        .push(
            PushRequest::new("/picker").on_result(move |result| c.lock().unwrap().push(result)),
        )
        .await
        .unwrap();

    let sink = handler.take_sink("/picker").unwrap();
    let picked = std::thread::spawn(move || sink.deliver(Some(RouteParams::new().with("color", "red"))))
        .join()
        .unwrap();
    assert!(picked);

    router
        .close(CloseRequest::new("/picker").with_result(RouteParams::new().with("color", "blue")))
        .await
        .unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_param_equals(calls[0].as_ref().unwrap(), "color", "red");
}

#[tokio::test]
async fn test_result_less_destination_answers_immediately() {
    let (router, _task) = spawn_router(RecordingHandler::new().without_results());

    let (pushed, result) = router.push_for_result("/about");
    pushed.await.unwrap();
    assert_eq!(result.await, None);
    assert_eq!(router.stack().await.unwrap(), vec!["/about"]);
}

#[tokio::test]
async fn test_rejected_push_rolls_back() {
    let handler = RecordingHandler::new().rejecting("/broken");
    let (router, _task) = spawn_router(handler.clone());
    let listener = RecordingListener::new("");
    router.add_listener(&as_listener(&listener));

    let (pushed, result) = router.push_for_result("/broken");
    let err = pushed.await.unwrap_err();

    assert!(matches!(err, NavigationError::HandlerFailed { .. }));
    assert_eq!(result.await, None);
    assert!(router.stack().await.unwrap().is_empty());
    assert_eq!(listener.events(), vec!["resolved /broken -> /broken"]);
}

#[tokio::test]
async fn test_declined_resolution_touches_nothing() {
    let handler = RecordingHandler::new();
    let (router, _task) = spawn_router(handler.clone());
    router.set_resolver(resolver_fn(|_: &RouteRequest| None));
    let listener = RecordingListener::new("");
    router.add_listener(&as_listener(&listener));

    let err = router.push("/nowhere").await.unwrap_err();
    assert_eq!(
        err,
        NavigationError::NoMatch {
            url: "/nowhere".into()
        }
    );
    assert!(listener.events().is_empty());
    assert!(handler.pushed().is_empty());
}

#[tokio::test]
async fn test_listeners_notified_in_registration_order() {
    let (router, _task) = spawn_router(RecordingHandler::new());
    let first = RecordingListener::new("first");
    let second = RecordingListener::new("second");
    let shared = Arc::new(Mutex::new(Vec::new()));

    struct Ordered(&'static str, Arc<Mutex<Vec<&'static str>>>);
    impl RouteListener for Ordered {
        fn on_route_handled(&self, _action: &RouteAction) {
            self.1.lock().unwrap().push(self.0);
        }
    }
    let a: Arc<dyn RouteListener> = Arc::new(Ordered("a", shared.clone()));
    let b: Arc<dyn RouteListener> = Arc::new(Ordered("b", shared.clone()));
    let c: Arc<dyn RouteListener> = Arc::new(Ordered("c", shared.clone()));
    for listener in [&a, &b, &c] {
        router.add_listener(listener);
    }
    router.add_listener(&a);
    router.add_listener(&as_listener(&first));
    router.add_listener(&as_listener(&second));

    router.push("/x").await.unwrap();
    router.close("/x").await.unwrap();

    assert_eq!(*shared.lock().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(
        first.events(),
        vec!["first:resolved /x -> /x", "first:handled /x", "first:closed /x"]
    );
    assert_eq!(second.events().len(), 3);
    assert_eq!(router.listener_count().await.unwrap(), 5);
}

#[tokio::test]
async fn test_removed_and_dropped_listeners_stop_receiving() {
    let (router, _task) = spawn_router(RecordingHandler::new());
    let kept = RecordingListener::new("kept");
    let removed = RecordingListener::new("removed");
    let removed_dyn = as_listener(&removed);

    router.add_listener(&as_listener(&kept));
    router.add_listener(&removed_dyn);
    {
        let dropped: Arc<dyn RouteListener> = RecordingListener::new("dropped");
        router.add_listener(&dropped);
    }
    router.remove_listener(&removed_dyn);
    router.remove_listener(&removed_dyn);

    router.push("/y").await.unwrap();

    assert_eq!(kept.events().len(), 2);
    assert!(removed.events().is_empty());
    assert_eq!(router.listener_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_panicking_listener_does_not_break_push() {
    struct Exploding;
    impl RouteListener for Exploding {
        fn on_route_resolved(&self, _request: &RouteRequest, _action: &RouteAction) {
            panic!("listener bug");
        }
    }

    let (router, _task) = spawn_router(RecordingHandler::new());
    let bad: Arc<dyn RouteListener> = Arc::new(Exploding);
    let good = RecordingListener::new("");
    router.add_listener(&bad);
    router.add_listener(&as_listener(&good));

    router.push("/z").await.unwrap();
    assert_eq!(good.events(), vec!["resolved /z -> /z", "handled /z"]);
}

#[tokio::test]
async fn test_start_route_many_callers_one_initialisation() {
    let engine = RecordingEngine::new();
    let (router, _task) = RouterBuilder::new()
        .push_handler(RecordingHandler::new())
        .engine(engine.clone())
        .spawn();

    let waiting: Vec<_> = (0..5)
        .map(|i| router.start_route(Some(json!({ "attempt": i }))))
        .collect();
    assert_eq!(router.readiness().await.unwrap(), Readiness::Starting);

    router.engine_ready();
    for completion in waiting {
        assert_eq!(completion.await, Ok(()));
    }
    assert_eq!(engine.starts(), vec![Some(json!({ "attempt": 0 }))]);
    assert_eq!(router.readiness().await.unwrap(), Readiness::Ready);

    assert_eq!(router.start_route(None).await, Ok(()));
    assert_eq!(engine.starts().len(), 1);
}

#[tokio::test]
async fn test_start_failure_then_retry() {
    let engine = RecordingEngine::new();
    let (router, _task) = RouterBuilder::new()
        .push_handler(RecordingHandler::new())
        .engine(engine.clone())
        .spawn();

    let first = router.start_route(None);
    let second = router.start_route(None);
    router.engine_failed("engine crashed");

    let expected = Err(NavigationError::StartupFailed {
        message: "engine crashed".into(),
    });
    assert_eq!(first.await, expected);
    assert_eq!(second.await, expected);
    assert_eq!(router.readiness().await.unwrap(), Readiness::Failed);

    let retry = router.start_route(None);
    router.engine_ready();
    assert_eq!(retry.await, Ok(()));
    assert_eq!(engine.starts().len(), 2);
}

#[tokio::test]
async fn test_start_without_engine_is_immediately_ready() {
    let (router, _task) = spawn_router(RecordingHandler::new());
    assert_eq!(router.readiness().await.unwrap(), Readiness::NotStarted);
    assert_eq!(router.start_route(None).await, Ok(()));
    assert_eq!(router.readiness().await.unwrap(), Readiness::Ready);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pushes_from_many_tasks() {
    let (router, _task) = spawn_router(RecordingHandler::new());
    let duplicates = Arc::new(AtomicUsize::new(0));

    let mut joins = Vec::new();
    for i in 0..40 {
        let router = router.clone();
        let duplicates = duplicates.clone();
        joins.push(tokio::spawn(async move {
            // Every key is pushed twice.
            let key = format!("k{}", i / 2);
            match router.push(PushRequest::new("/page").with_instance_key(key)).await {
                Ok(_) => {}
                Err(NavigationError::DuplicateInstance { .. }) => {
                    duplicates.fetch_add(1, Ordering::SeqCst);
                }
                Err(err) => panic!("unexpected error: {err}"),
            }
        }));
    }
    for join in joins {
        join.await.unwrap();
    }

    assert_eq!(duplicates.load(Ordering::SeqCst), 20);
    assert_eq!(router.stack().await.unwrap().len(), 20);
}

#[tokio::test]
async fn test_update_in_place_keeps_key_and_position() {
    let handler = RecordingHandler::new();
    let (router, _task) = spawn_router(handler.clone());
    router
        .push(PushRequest::new("/list").with_instance_key("list"))
        .await
        .unwrap();
    router.push("/detail").await.unwrap();

    let action = router
        .update(
            UpdateRequest::new("list", "/list")
                .with_params(RouteParams::new().with("filter", "open")),
        )
        .await
        .unwrap();

    assert_param_equals(action.params(), "filter", "open");
    assert_eq!(router.stack().await.unwrap(), vec!["list", "/detail"]);
    assert_eq!(
        handler.updated(),
        vec![("list".to_string(), "/list".to_string())]
    );
    assert!(matches!(
        router.update(UpdateRequest::new("gone", "/x")).await,
        Err(NavigationError::UnknownInstance { .. })
    ));
}

#[tokio::test]
async fn test_close_unknown_instance_fails() {
    let handler = RecordingHandler::new();
    let (router, _task) = spawn_router(handler.clone());

    let err = router.close("missing").await.unwrap_err();
    assert_eq!(
        err,
        NavigationError::UnknownInstance {
            instance_key: "missing".into()
        }
    );
    assert!(handler.dismissed().is_empty());
}

#[tokio::test]
async fn test_result_only_close_keeps_destination() {
    let handler = RecordingHandler::new();
    let (router, _task) = spawn_router(handler.clone());

    let (pushed, result) = router.push_for_result(PushRequest::new("/form").with_instance_key("f"));
    pushed.await.unwrap();

    router
        .close(
            CloseRequest::new("f")
                .with_result(RouteParams::new().with("draft", true))
                .result_only(),
        )
        .await
        .unwrap();

    assert_eq!(result.await.unwrap().get_as::<bool>("draft"), Some(true));
    assert_eq!(router.stack().await.unwrap(), vec!["f"]);
    assert!(handler.dismissed().is_empty());
}

#[tokio::test]
async fn test_orphan_result_policy_reject() {
    init_logging();
    let (router, _task) = RouterBuilder::new()
        .config(RouterConfig::default().with_orphan_results(OrphanResultPolicy::Reject))
        .push_handler(RecordingHandler::new())
        .spawn();

    let err = router
        .close(CloseRequest::new("late").result_only())
        .await
        .unwrap_err();
    assert!(matches!(err, NavigationError::UnknownInstance { .. }));
}

#[tokio::test]
async fn test_missing_handler_fails_every_push() {
    init_logging();
    let (router, _task) = RouterBuilder::new().spawn();

    let err = router.push("/a").await.unwrap_err();
    assert!(matches!(err, NavigationError::HandlerFailed { .. }));

    router.set_push_handler(RecordingHandler::new());
    router.push("/a").await.unwrap();
}

#[tokio::test]
async fn test_shutdown_answers_pending_results() {
    let (router, task) = spawn_router(RecordingHandler::new());

    let (pushed, result) = router.push_for_result("/a");
    pushed.await.unwrap();
    assert!(router.shutdown());
    task.await.unwrap();

    assert_eq!(result.await, None);
    assert!(router.is_closed());
    assert_eq!(router.push("/b").await, Err(NavigationError::RouterClosed));
}
