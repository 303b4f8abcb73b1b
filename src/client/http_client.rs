//! HTTP 客户端
//!
//! 出站请求的组装完全由分层配置驱动：构建器注入的会话层配置先生效，
//! 单次调用传入的选项在其上覆盖/追加。终端传输能力基于 hyper-util 的
//! legacy 客户端实现，传输中间件在每次请求时组合到它外面，会话层
//! 中间件位于调用层中间件的外层。

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, Response};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use lazy_static::lazy_static;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::common::middleware::{MiddlewareFn, compose};
use crate::common::options::{self, OptionFn, Options};
use crate::common::stream::{BodyReader, CancelFlag, LineStreamReader, StreamProgress};
use crate::error::{RatQuickError, RatQuickResult};
use crate::utils::logger::debug;

/// 响应体统一用装箱形态，自定义传输实现与测试桩都能构造
pub type ResponseBody = BoxBody<Bytes, hyper::Error>;

/// 传输能力：发送请求并取回响应
///
/// 本 crate 从不自己实现网络层，只包装这个能力
pub type Transport = Arc<
    dyn Fn(
            Request<Full<Bytes>>,
        ) -> Pin<Box<dyn Future<Output = RatQuickResult<Response<ResponseBody>>> + Send>>
        + Send
        + Sync,
>;

/// 客户端方向的中间件
pub type TransportMiddleware = MiddlewareFn<Transport>;

/// 基于 hyper-util legacy 客户端构造终端传输能力
pub(crate) fn hyper_transport(connect_timeout: Option<Duration>) -> Transport {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(connect_timeout);
    connector.set_nodelay(true);

    let client: Client<HttpConnector, Full<Bytes>> =
        Client::builder(TokioExecutor::new()).build(connector);

    Arc::new(move |req| {
        let client = client.clone();
        Box::pin(async move {
            let response = client
                .request(req)
                .await
                .map_err(|e| RatQuickError::ClientError(e.to_string()))?;
            Ok(response.map(|body| body.boxed()))
        })
    })
}

/// HTTP 客户端
///
/// 会话层配置与中间件在构建时固定；需要隔离环境的调用方应各自构建实例，
/// 不存在任何包级可变状态。
#[derive(Clone)]
pub struct RatQuickClient {
    base_options: Vec<OptionFn>,
    middlewares: Vec<TransportMiddleware>,
    transport: Transport,
}

impl RatQuickClient {
    /// 使用默认配置创建客户端
    pub fn new() -> Self {
        Self {
            base_options: vec![options::timeout(Duration::from_secs(30))],
            middlewares: Vec::new(),
            transport: hyper_transport(Some(Duration::from_secs(10))),
        }
    }

    /// 创建构建器（需要显式配置时的入口）
    pub fn builder() -> super::builder::RatQuickClientBuilder {
        super::builder::RatQuickClientBuilder::new()
    }

    pub(crate) fn from_parts(
        base_options: Vec<OptionFn>,
        middlewares: Vec<TransportMiddleware>,
        transport: Transport,
    ) -> Self {
        Self {
            base_options,
            middlewares,
            transport,
        }
    }

    /// 替换终端传输能力（自定义代理/测试桩的接缝）
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// 发送请求并返回 (响应, 本次请求的有效配置)
    async fn send(
        &self,
        method: Method,
        url: &str,
        call_opts: &[OptionFn],
    ) -> RatQuickResult<(Response<ResponseBody>, Options)> {
        let opts = options::resolve(&self.base_options, &[call_opts]);

        // 显式实参充当标量的初值，调用层选项按后写者胜出覆盖
        let method = opts.method.clone().unwrap_or(method);
        let url_text = opts.url.clone().unwrap_or_else(|| url.to_string());

        let mut target = Url::parse(&url_text)?;
        if !opts.query.is_empty() {
            let mut pairs = target.query_pairs_mut();
            for (key, value) in &opts.query {
                pairs.append_pair(key, value);
            }
        }

        debug!("📤 [客户端] {} {}", method, target);

        let mut builder = Request::builder().method(method).uri(target.as_str());
        for (name, value) in &opts.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !opts.cookies.is_empty() {
            let cookie_line = opts
                .cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header("cookie", cookie_line);
        }
        if !opts.has_header("user-agent") {
            let ua = opts
                .user_agent
                .clone()
                .unwrap_or_else(|| format!("rat-quick/{}", env!("CARGO_PKG_VERSION")));
            builder = builder.header("user-agent", ua);
        }

        let body = Full::new(opts.body.clone().unwrap_or_default());
        let request = builder.body(body)?;

        // 每个请求单独组合一次中间件链，会话层在外、调用层在内
        let mut layers = self.middlewares.clone();
        layers.extend(opts.transport_middlewares.iter().cloned());
        let transport = compose(self.transport.clone(), &layers);

        let response = match opts.timeout {
            Some(limit) => tokio::time::timeout(limit, transport(request))
                .await
                .map_err(|_| {
                    RatQuickError::RequestError(format!("请求超时: {:?}", limit))
                })??,
            None => transport(request).await?,
        };

        Ok((response, opts))
    }

    /// 发送请求
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        call_opts: &[OptionFn],
    ) -> RatQuickResult<Response<ResponseBody>> {
        let (response, _) = self.send(method, url, call_opts).await?;
        Ok(response)
    }

    /// 发送请求并把响应体按行流式投递给配置中注册的分块回调
    ///
    /// 返回消费进度；取消通过传入的取消标记协作触发
    pub async fn request_stream(
        &self,
        method: Method,
        url: &str,
        cancel: CancelFlag,
        call_opts: &[OptionFn],
    ) -> RatQuickResult<StreamProgress> {
        let (response, opts) = self.send(method, url, call_opts).await?;
        let callback = opts.on_chunk.clone().ok_or_else(|| {
            RatQuickError::RequestError("流式请求未注册分块回调".to_string())
        })?;

        let reader = LineStreamReader::with_cancel(cancel);
        let progress = reader
            .consume(BodyReader::new(response.into_body()), |seq, chunk| {
                callback(seq, chunk)
            })
            .await?;
        Ok(progress)
    }

    // ========== 按动词的便捷调用 ==========

    pub async fn get(&self, url: &str, opts: &[OptionFn]) -> RatQuickResult<Response<ResponseBody>> {
        self.request(Method::GET, url, opts).await
    }

    pub async fn post(&self, url: &str, opts: &[OptionFn]) -> RatQuickResult<Response<ResponseBody>> {
        self.request(Method::POST, url, opts).await
    }

    pub async fn put(&self, url: &str, opts: &[OptionFn]) -> RatQuickResult<Response<ResponseBody>> {
        self.request(Method::PUT, url, opts).await
    }

    pub async fn delete(&self, url: &str, opts: &[OptionFn]) -> RatQuickResult<Response<ResponseBody>> {
        self.request(Method::DELETE, url, opts).await
    }

    /// GET 并把响应体解析为 JSON
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        opts: &[OptionFn],
    ) -> RatQuickResult<T> {
        let response = self.get(url, opts).await?;
        read_json(response).await
    }

    /// POST 一个 JSON 负载并把响应体解析为 JSON
    pub async fn post_json<U: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        payload: &U,
        opts: &[OptionFn],
    ) -> RatQuickResult<T> {
        let mut call_opts = vec![options::json(payload)?, options::header("accept", "application/json")];
        call_opts.extend(opts.iter().cloned());
        let response = self.post(url, &call_opts).await?;
        read_json(response).await
    }
}

impl Default for RatQuickClient {
    fn default() -> Self {
        Self::new()
    }
}

/// 读完整个响应体
pub async fn read_body(response: Response<ResponseBody>) -> RatQuickResult<Bytes> {
    Ok(response.into_body().collect().await?.to_bytes())
}

/// 读完响应体并按 JSON 解析
pub async fn read_json<T: DeserializeOwned>(response: Response<ResponseBody>) -> RatQuickResult<T> {
    let bytes = read_body(response).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

lazy_static! {
    /// 共享的默认客户端：不可变，构建后不再修改
    static ref DEFAULT_CLIENT: RatQuickClient = RatQuickClient::new();
}

/// 取得共享的默认客户端
///
/// 需要隔离配置的调用方请改用 `RatQuickClient::builder()`
pub fn default_client() -> &'static RatQuickClient {
    &DEFAULT_CLIENT
}
