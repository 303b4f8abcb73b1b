//! 服务端端到端测试
//!
//! 在临时端口上拉起完整服务，用真实客户端走一遍路由、参数与协作式关闭

use std::sync::Arc;

use rat_quick::common::options;
use rat_quick::common::stream::CancelFlag;
use rat_quick::server::{self, HttpRequest, Router};
use rat_quick::{Bytes, Full, RatQuickClient, Response, StatusCode};
use tokio::net::TcpListener;

fn build_router() -> Router {
    let mut router = Router::new();
    router
        .get("/users/:id", |req: HttpRequest| async move {
            let id = req.param_as_i64("id").unwrap_or(0);
            Ok(Response::new(Full::new(Bytes::from(format!("用户{}", id)))))
        })
        .unwrap();
    router
        .post("/echo", |req: HttpRequest| async move {
            Ok(Response::new(Full::new(req.body.clone())))
        })
        .unwrap();
    router
}

#[tokio::test]
async fn test_end_to_end_request() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancelFlag::new();

    let server_shutdown = shutdown.clone();
    let server_task = tokio::spawn(async move {
        server::serve_listener(listener, Arc::new(build_router()), server_shutdown).await
    });

    let client = RatQuickClient::new();

    // 命中参数路由
    let body: String = {
        let resp = client
            .get(&format!("http://{}/users/5", addr), &[])
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = rat_quick::client::read_body(resp).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    };
    assert_eq!(body, "用户5");

    // 请求体原样回显
    let resp = client
        .post(
            &format!("http://{}/echo", addr),
            &[options::body("回显内容")],
        )
        .await
        .unwrap();
    let bytes = rat_quick::client::read_body(resp).await.unwrap();
    assert_eq!(String::from_utf8(bytes.to_vec()).unwrap(), "回显内容");

    // 未注册路径得到标准 404 响应
    let resp = client
        .get(&format!("http://{}/missing", addr), &[])
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(resp.headers().get("server").is_some());

    // 协作式关闭
    shutdown.cancel();
    let served = tokio::time::timeout(std::time::Duration::from_secs(2), server_task)
        .await
        .expect("服务应在关闭信号后退出")
        .unwrap();
    assert!(served.is_ok());
}
