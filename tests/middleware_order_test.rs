//! 中间件组合顺序测试
//!
//! 锁定组合约定：先注册的中间件在最外层，前置逻辑最先执行、后置逻辑最后执行；
//! 会话/路由器层整体位于调用/路由层的外层。客户端与服务端两个方向都要满足。

use std::sync::{Arc, Mutex};

use http_body_util::{BodyExt, Full};
use rat_quick::common::options;
use rat_quick::server::{HandlerMiddleware, HttpHandler, HttpRequest, Router};
use rat_quick::{
    Bytes, Method, RatQuickClient, Response, Transport, TransportMiddleware,
};

type Trace = Arc<Mutex<Vec<String>>>;

fn handler_mw(tag: &'static str, log: Trace) -> HandlerMiddleware {
    Arc::new(move |next: HttpHandler| {
        let log = log.clone();
        let wrapped: HttpHandler = Arc::new(move |req| {
            let log = log.clone();
            let next = next.clone();
            Box::pin(async move {
                log.lock().unwrap().push(format!("before_{}", tag));
                let resp = next(req).await;
                log.lock().unwrap().push(format!("after_{}", tag));
                resp
            })
        });
        wrapped
    })
}

fn transport_mw(tag: &'static str, log: Trace) -> TransportMiddleware {
    Arc::new(move |next: Transport| {
        let log = log.clone();
        let wrapped: Transport = Arc::new(move |req| {
            let log = log.clone();
            let next = next.clone();
            Box::pin(async move {
                log.lock().unwrap().push(format!("before_{}", tag));
                let resp = next(req).await;
                log.lock().unwrap().push(format!("after_{}", tag));
                resp
            })
        });
        wrapped
    })
}

/// 记录到达终端的桩传输
fn stub_transport(log: Trace) -> Transport {
    Arc::new(move |_req| {
        let log = log.clone();
        Box::pin(async move {
            log.lock().unwrap().push("H".to_string());
            let body = Full::new(Bytes::from_static(b"ok"))
                .map_err(|never| match never {})
                .boxed();
            Ok(Response::new(body))
        })
    })
}

#[tokio::test]
async fn test_server_direction_order() {
    let log: Trace = Arc::new(Mutex::new(Vec::new()));

    let mut router = Router::new();
    router.use_middleware(handler_mw("A", log.clone()));
    router.use_middleware(handler_mw("B", log.clone()));

    let log_in_handler = log.clone();
    router
        .add_with_options(
            "/traced",
            Method::GET,
            move |_req| {
                let log = log_in_handler.clone();
                async move {
                    log.lock().unwrap().push("H".to_string());
                    Ok(Response::new(Full::new(Bytes::from_static(b"done"))))
                }
            },
            // 路由级中间件位于路由器级之内
            vec![options::handler_middleware(handler_mw("C", log.clone()))],
        )
        .unwrap();

    let resp = router
        .handle(HttpRequest::new(Method::GET, "/traced"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let trace = log.lock().unwrap().clone();
    assert_eq!(
        trace,
        vec!["before_A", "before_B", "before_C", "H", "after_C", "after_B", "after_A"]
    );
}

#[tokio::test]
async fn test_client_direction_order() {
    let log: Trace = Arc::new(Mutex::new(Vec::new()));

    let client = RatQuickClient::builder()
        .transport(stub_transport(log.clone()))
        .middleware(transport_mw("A", log.clone()))
        .middleware(transport_mw("B", log.clone()))
        .build()
        .unwrap();

    // 调用层中间件追加在会话层之后（更内层）
    let resp = client
        .get(
            "http://localhost/traced",
            &[options::transport_middleware(transport_mw("C", log.clone()))],
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let trace = log.lock().unwrap().clone();
    assert_eq!(
        trace,
        vec!["before_A", "before_B", "before_C", "H", "after_C", "after_B", "after_A"]
    );
}

#[tokio::test]
async fn test_client_middleware_short_circuit() {
    let log: Trace = Arc::new(Mutex::new(Vec::new()));

    // 不调用 next 的短路中间件：结果对外就是一个普通响应
    let reject: TransportMiddleware = Arc::new(|_next: Transport| {
        let wrapped: Transport = Arc::new(|_req| {
            Box::pin(async {
                let body = Full::new(Bytes::from_static(b"denied"))
                    .map_err(|never| match never {})
                    .boxed();
                Ok(Response::builder().status(403).body(body).unwrap())
            })
        });
        wrapped
    });

    let client = RatQuickClient::builder()
        .transport(stub_transport(log.clone()))
        .middleware(reject)
        .build()
        .unwrap();

    let resp = client.get("http://localhost/denied", &[]).await.unwrap();
    assert_eq!(resp.status(), 403);
    // 终端传输从未被触达
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_server_middleware_sees_not_found() {
    let log: Trace = Arc::new(Mutex::new(Vec::new()));

    let mut router = Router::new();
    router.use_middleware(handler_mw("A", log.clone()));

    let resp = router
        .handle(HttpRequest::new(Method::GET, "/missing"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let trace = log.lock().unwrap().clone();
    assert_eq!(trace, vec!["before_A", "after_A"]);
}
