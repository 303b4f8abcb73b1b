//! RAT Quick —— HTTP 客户端/服务端便捷工具包
//!
//! 核心是客户端与服务端共用的三件套：
//! - 分层配置合并（默认值 -> 会话/路由器层 -> 调用/路由层，标量覆盖、集合追加）
//! - 路径前缀树路由（`:name` / `{name}` 命名参数，字面段严格优先）
//! - 双向中间件组合（同一组合形状同时包装客户端传输能力与服务端处理器能力）
//!
//! 外加一个协作式取消的行分隔流式读取器。网络层细节（拨号、TLS、连接池）
//! 全部交给 hyper / hyper-util，本 crate 只包装能力，不实现传输。
//!
//! # 示例
//!
//! ```rust,no_run
//! use rat_quick::{Router, Response, StatusCode, Full, Bytes};
//!
//! let mut router = Router::new();
//! router.get("/users/:id", |req: rat_quick::HttpRequest| async move {
//!     let id = req.param_as_i64("id").unwrap_or(0);
//!     Ok(Response::builder()
//!         .status(StatusCode::OK)
//!         .body(Full::new(Bytes::from(format!("用户{}", id))))
//!         .unwrap())
//! }).unwrap();
//! ```

pub mod client;
pub mod common;
pub mod error;
pub mod server;
pub mod utils;

pub use error::{RatQuickError, RatQuickResult};

/// 错误类型的简短别名
pub type Error = RatQuickError;

// 常用类型的顶层再导出
pub use http_body_util::Full;
pub use hyper::body::Bytes;
pub use hyper::{Method, Request, Response, StatusCode, Uri, Version};

pub use client::{
    RatQuickClient, RatQuickClientBuilder, ResponseBody, Transport, TransportMiddleware,
};
pub use common::middleware::{MiddlewareFn, compose};
pub use common::options::{ChunkHandler, OptionFn, Options};
pub use common::stream::{
    BodyReader, CancelFlag, LineStreamReader, StreamError, StreamProgress,
};
pub use server::{
    Dispatch, HandlerMiddleware, HttpHandler, HttpRequest, PathTrie, Router, handler,
};
