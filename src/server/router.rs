//! 路由器
//!
//! 持有一棵路径前缀树和路由器级配置/中间件。分发时先做前缀树查找，
//! 再在节点的方法映射里找处理器（找不到回退到空方法键的默认处理器），
//! 然后把路由器级配置与路由级配置合并成本次请求的有效配置，最后用
//! 有效中间件列表包装选中的处理器。
//!
//! 未匹配路径返回标准的 404 响应，方法缺失返回 405，二者都是普通响应
//! 而不是错误。注册阶段的非法模式立即报错，绝不拖到请求阶段。

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::{Method, Request, Response, StatusCode};

use crate::common::middleware::{MiddlewareFn, compose};
use crate::common::options::{self, OptionFn, Options};
use crate::error::RatQuickResult;
use crate::server::http_request::HttpRequest;
use crate::server::trie_router::PathTrie;
use crate::utils::logger::{debug, warn};

/// HTTP 处理器能力：本 crate 只包装它，终端实现由使用方提供
pub type HttpHandler = Arc<
    dyn Fn(
            HttpRequest,
        ) -> Pin<
            Box<dyn Future<Output = Result<Response<Full<Bytes>>, hyper::Error>> + Send>,
        > + Send
        + Sync,
>;

/// 服务端方向的中间件
pub type HandlerMiddleware = MiddlewareFn<HttpHandler>;

/// 把普通异步函数适配成规范的处理器能力
pub fn handler<F, Fut>(func: F) -> HttpHandler
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<Full<Bytes>>, hyper::Error>> + Send + 'static,
{
    Arc::new(move |req| Box::pin(func(req)))
}

/// 一次分发的结果：已包装好中间件的处理器、绑定参数与有效配置
pub struct Dispatch {
    pub handler: HttpHandler,
    pub params: HashMap<String, String>,
    pub options: Options,
}

/// 路由器
pub struct Router {
    trie: PathTrie,
    base_options: Vec<OptionFn>,
    middlewares: Vec<HandlerMiddleware>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            trie: PathTrie::new(),
            base_options: Vec::new(),
            middlewares: Vec::new(),
        }
    }

    /// 追加路由器级配置（对所有路由生效，合并时位于路由级配置之前）
    pub fn with_options(mut self, opts: Vec<OptionFn>) -> Self {
        self.base_options.extend(opts);
        self
    }

    /// 注册路由器级中间件，先注册的在最外层
    pub fn use_middleware(&mut self, mw: HandlerMiddleware) -> &mut Self {
        self.middlewares.push(mw);
        self
    }

    /// 注册一条路由（规范能力类型入口）
    pub fn add_handler(
        &mut self,
        pattern: &str,
        method: &str,
        handler: HttpHandler,
        opts: Vec<OptionFn>,
    ) -> RatQuickResult<&mut Self> {
        self.trie.add(pattern, method, handler, opts)?;
        debug!(
            "✅ [路由] 注册路由: {} {}",
            if method.is_empty() { "*" } else { method },
            pattern
        );
        Ok(self)
    }

    /// 注册一条路由（异步函数适配入口）
    pub fn add<F, Fut>(
        &mut self,
        pattern: &str,
        method: Method,
        func: F,
    ) -> RatQuickResult<&mut Self>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<Full<Bytes>>, hyper::Error>> + Send + 'static,
    {
        self.add_handler(pattern, method.as_str(), handler(func), Vec::new())
    }

    /// 注册一条带路由级配置的路由
    pub fn add_with_options<F, Fut>(
        &mut self,
        pattern: &str,
        method: Method,
        func: F,
        opts: Vec<OptionFn>,
    ) -> RatQuickResult<&mut Self>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<Full<Bytes>>, hyper::Error>> + Send + 'static,
    {
        self.add_handler(pattern, method.as_str(), handler(func), opts)
    }

    /// 注册方法无关的默认路由（没有更精确注册的方法都会命中它）
    pub fn add_any<F, Fut>(&mut self, pattern: &str, func: F) -> RatQuickResult<&mut Self>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<Full<Bytes>>, hyper::Error>> + Send + 'static,
    {
        self.add_handler(pattern, "", handler(func), Vec::new())
    }

    // ========== 按动词的便捷注册 ==========

    pub fn get<F, Fut>(&mut self, pattern: &str, func: F) -> RatQuickResult<&mut Self>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<Full<Bytes>>, hyper::Error>> + Send + 'static,
    {
        self.add(pattern, Method::GET, func)
    }

    pub fn post<F, Fut>(&mut self, pattern: &str, func: F) -> RatQuickResult<&mut Self>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<Full<Bytes>>, hyper::Error>> + Send + 'static,
    {
        self.add(pattern, Method::POST, func)
    }

    pub fn put<F, Fut>(&mut self, pattern: &str, func: F) -> RatQuickResult<&mut Self>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<Full<Bytes>>, hyper::Error>> + Send + 'static,
    {
        self.add(pattern, Method::PUT, func)
    }

    pub fn delete<F, Fut>(&mut self, pattern: &str, func: F) -> RatQuickResult<&mut Self>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<Full<Bytes>>, hyper::Error>> + Send + 'static,
    {
        self.add(pattern, Method::DELETE, func)
    }

    pub fn patch<F, Fut>(&mut self, pattern: &str, func: F) -> RatQuickResult<&mut Self>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<Full<Bytes>>, hyper::Error>> + Send + 'static,
    {
        self.add(pattern, Method::PATCH, func)
    }

    pub fn head<F, Fut>(&mut self, pattern: &str, func: F) -> RatQuickResult<&mut Self>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<Full<Bytes>>, hyper::Error>> + Send + 'static,
    {
        self.add(pattern, Method::HEAD, func)
    }

    // ========== 分发 ==========

    /// 把 (方法, 路径) 解析成带有效配置与有效中间件的处理器
    ///
    /// 路由器级中间件对所有出口统一生效（包含 404/405 终端处理器），
    /// 路由级中间件只包装匹配到的路由；路由器级在更外层。
    pub fn dispatch(&self, method: &Method, path: &str) -> Dispatch {
        let matched = self.trie.find(path);

        if !matched.fully_matched {
            debug!("🔍 [路由] 未找到匹配路由: {} {}", method, path);
            return Dispatch {
                handler: compose(Self::not_found_handler(), &self.middlewares),
                params: matched.params,
                options: options::resolve(&self.base_options, &[]),
            };
        }

        match matched.node.entry(method.as_str()) {
            Some(entry) => {
                let opts = options::resolve(&self.base_options, &[&entry.options]);
                let mut layers = self.middlewares.clone();
                layers.extend(opts.handler_middlewares.iter().cloned());
                let wrapped = compose(entry.handler.clone(), &layers);
                Dispatch {
                    handler: wrapped,
                    params: matched.params,
                    options: opts,
                }
            }
            None => {
                debug!("🔍 [路由] 路径已匹配但方法未注册: {} {}", method, path);
                Dispatch {
                    handler: compose(Self::method_not_allowed_handler(), &self.middlewares),
                    params: matched.params,
                    options: options::resolve(&self.base_options, &[]),
                }
            }
        }
    }

    /// 处理一个请求：分发、注入路径参数、执行包装后的处理器
    ///
    /// 有效配置里带超时的路由在超时后得到 504 响应
    pub async fn handle(
        &self,
        mut req: HttpRequest,
    ) -> Result<Response<Full<Bytes>>, hyper::Error> {
        let dispatch = self.dispatch(&req.method, req.path());
        req.set_path_params(dispatch.params.clone());

        match dispatch.options.timeout {
            Some(limit) => match tokio::time::timeout(limit, (dispatch.handler)(req)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("⏰ [路由] 路由处理超时: {:?}", limit);
                    Ok(error_response(
                        StatusCode::GATEWAY_TIMEOUT,
                        "Handler timed out",
                    ))
                }
            },
            None => (dispatch.handler)(req).await,
        }
    }

    /// hyper 请求的兼容入口
    pub async fn handle_hyper_request(
        &self,
        req: Request<Incoming>,
        remote_addr: Option<std::net::SocketAddr>,
    ) -> Result<Response<Full<Bytes>>, hyper::Error> {
        let http_req = match HttpRequest::from_hyper_request(req, remote_addr).await {
            Ok(r) => r,
            Err(e) => {
                warn!("❌ [路由] 转换 HTTP 请求失败: {}", e);
                return Ok(error_response(StatusCode::BAD_REQUEST, "Invalid request"));
            }
        };
        self.handle(http_req).await
    }

    fn not_found_handler() -> HttpHandler {
        Arc::new(|_req| {
            Box::pin(async { Ok(error_response(StatusCode::NOT_FOUND, "Not Found")) })
        })
    }

    fn method_not_allowed_handler() -> HttpHandler {
        Arc::new(|_req| {
            Box::pin(async {
                Ok(error_response(
                    StatusCode::METHOD_NOT_ALLOWED,
                    "Method Not Allowed",
                ))
            })
        })
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// 构造统一的 JSON 错误响应
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = Full::new(Bytes::from(format!(
        r#"{{"error":"{}","code":{}}}"#,
        message,
        status.as_u16()
    )));

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("server", format!("RAT-Quick/{}", env!("CARGO_PKG_VERSION")))
        .body(body)
        .unwrap()
}
