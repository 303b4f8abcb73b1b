//! RAT Quick 服务端模块
//!
//! 路由匹配与请求处理是本模块的核心；连接接入只是一层薄封装，
//! 由 hyper-util 的 auto builder 负责 HTTP/1.1 与 HTTP/2 的协议细节。

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use tokio::net::TcpListener;

use crate::common::stream::CancelFlag;
use crate::error::{RatQuickError, RatQuickResult};
use crate::utils::logger::{debug, error, info, warn};

pub mod http_request;
pub mod router;
pub mod trie_router;

pub use http_request::HttpRequest;
pub use router::{Dispatch, HandlerMiddleware, HttpHandler, Router, error_response, handler};
pub use trie_router::{PathMatch, PathTrie, RouteEntry, TrieNode};

/// 启动 HTTP 服务并一直运行
pub async fn serve(addr: SocketAddr, router: Arc<Router>) -> RatQuickResult<()> {
    serve_with_shutdown(addr, router, CancelFlag::new()).await
}

/// 启动 HTTP 服务，直到关闭标记被触发
///
/// 关闭是协作式的：已建立的连接继续由各自的任务处理完毕，
/// 接入循环在下一个检查点退出
pub async fn serve_with_shutdown(
    addr: SocketAddr,
    router: Arc<Router>,
    shutdown: CancelFlag,
) -> RatQuickResult<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(RatQuickError::IoError)?;
    serve_listener(listener, router, shutdown).await
}

/// 在已绑定的监听器上提供服务（需要临时端口或自定义 socket 配置时使用）
pub async fn serve_listener(
    listener: TcpListener,
    router: Arc<Router>,
    shutdown: CancelFlag,
) -> RatQuickResult<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("🚀 [服务端] HTTP 服务已启动: {}", addr);
    }

    loop {
        if shutdown.is_cancelled() {
            info!("🛑 [服务端] 收到关闭信号，停止接入新连接");
            return Ok(());
        }

        // 带超时的 accept，保证关闭标记能被及时察觉
        let accepted =
            tokio::time::timeout(Duration::from_millis(500), listener.accept()).await;

        match accepted {
            Err(_) => continue,
            Ok(Err(e)) => {
                warn!("⚠️ [服务端] 接受连接失败: {}", e);
                continue;
            }
            Ok(Ok((stream, remote_addr))) => {
                debug!("🔗 [服务端] 新连接: {}", remote_addr);
                let router = router.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, remote_addr, router).await {
                        error!("❌ [服务端] 连接处理失败: {} ({})", remote_addr, e);
                    }
                });
            }
        }
    }
}

/// 处理一条连接上的全部请求
async fn handle_connection(
    stream: tokio::net::TcpStream,
    remote_addr: SocketAddr,
    router: Arc<Router>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| {
        let router = router.clone();
        async move { router.handle_hyper_request(req, Some(remote_addr)).await }
    });

    if let Err(e) = AutoBuilder::new(TokioExecutor::new())
        .serve_connection_with_upgrades(io, service)
        .await
    {
        // 区分正常的客户端断开连接和真正的服务器错误
        let error_msg = e.to_string();
        if error_msg.contains("connection closed before message completed")
            || error_msg.contains("broken pipe")
            || error_msg.contains("connection reset by peer")
            || error_msg.contains("unexpected end of file")
        {
            debug!("🔌 [服务端] 客户端断开连接: {} ({})", remote_addr, error_msg);
        } else {
            return Err(format!("连接处理失败: {}", e).into());
        }
    }

    Ok(())
}
