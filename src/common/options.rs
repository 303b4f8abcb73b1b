//! 分层请求/路由配置
//!
//! `Options` 是一个可变累加器，通过函数式选项（`OptionFn`）按序修改。
//! 合并规则是严格有序的两层覆盖：硬编码默认值先生效，随后是会话/路由器层，
//! 最后是单次调用/单条路由层。标量字段后写者胜出，集合字段只追加不丢弃。
//! 每个逻辑请求都会物化一份全新的 `Options`，合并完成后不再修改（merge-then-freeze），
//! 因此不需要任何锁。
//!
//! 客户端出站请求配置与服务端单条路由配置走的是同一套合并算法。

use std::sync::Arc;
use std::time::Duration;

use hyper::Method;
use hyper::body::Bytes;
use serde::Serialize;
use url::Url;

use crate::client::http_client::TransportMiddleware;
use crate::error::RatQuickResult;
use crate::server::router::HandlerMiddleware;

/// 流式分块回调：(序号, 分块字节) -> 结果
///
/// 序号从 1 开始单调递增；分块字节包含结尾分隔符（末尾无分隔符的残块除外）
pub type ChunkHandler =
    Arc<dyn Fn(u64, &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send + Sync>;

/// 函数式选项：对配置累加器的一次纯变更
pub type OptionFn = Arc<dyn Fn(&mut Options) + Send + Sync>;

/// 配置累加器
///
/// 头部、Cookie、查询参数与中间件列表是追加语义；其余标量字段后写者胜出。
#[derive(Clone)]
pub struct Options {
    /// 请求超时（客户端发送阶段与服务端单条路由处理均会读取）
    pub timeout: Option<Duration>,
    /// HTTP 方法
    pub method: Option<Method>,
    /// 目标 URL
    pub url: Option<String>,
    /// 是否校验服务端证书（由自定义 transport 消费，默认开启）
    pub verify: bool,
    /// 代理地址（由自定义 transport 消费）
    pub proxy: Option<Url>,
    /// User-Agent
    pub user_agent: Option<String>,
    /// 追加语义的头部多重映射（原始字符串，构建请求时再转换）
    pub headers: Vec<(String, String)>,
    /// Cookie 列表
    pub cookies: Vec<(String, String)>,
    /// 查询参数列表
    pub query: Vec<(String, String)>,
    /// 请求体
    pub body: Option<Bytes>,
    /// 客户端方向的传输中间件（追加语义）
    pub transport_middlewares: Vec<TransportMiddleware>,
    /// 服务端方向的处理器中间件（追加语义）
    pub handler_middlewares: Vec<HandlerMiddleware>,
    /// 流式分块回调，每个请求最多注册一个
    pub on_chunk: Option<ChunkHandler>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: None,
            method: None,
            url: None,
            verify: true,
            proxy: None,
            user_agent: None,
            headers: Vec::new(),
            cookies: Vec::new(),
            query: Vec::new(),
            body: None,
            transport_middlewares: Vec::new(),
            handler_middlewares: Vec::new(),
            on_chunk: None,
        }
    }
}

impl Options {
    /// 按名称（忽略大小写）判断头部是否已设置
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

/// 两层合并：默认值 -> base 层按序应用 -> 后续各层按序应用
///
/// base 对应会话/路由器层，layers 对应单次调用/单条路由层。
/// 任何一层都不会丢弃更早层已累加的集合内容。
pub fn resolve(base: &[OptionFn], layers: &[&[OptionFn]]) -> Options {
    let mut opts = Options::default();
    for opt in base {
        opt(&mut opts);
    }
    for layer in layers {
        for opt in *layer {
            opt(&mut opts);
        }
    }
    opts
}

// ========== 选项构造器 ==========

/// 设置请求超时
pub fn timeout(value: Duration) -> OptionFn {
    Arc::new(move |o: &mut Options| o.timeout = Some(value))
}

/// 设置 HTTP 方法
pub fn method(value: Method) -> OptionFn {
    Arc::new(move |o: &mut Options| o.method = Some(value.clone()))
}

/// 设置目标 URL
pub fn url(value: impl Into<String>) -> OptionFn {
    let value = value.into();
    Arc::new(move |o: &mut Options| o.url = Some(value.clone()))
}

/// 设置证书校验开关
pub fn verify(value: bool) -> OptionFn {
    Arc::new(move |o: &mut Options| o.verify = value)
}

/// 设置代理地址
///
/// 代理地址无法解析时直接 panic，这是约定的快速失败路径，不是可恢复错误
pub fn proxy(addr: impl Into<String>) -> OptionFn {
    let addr = addr.into();
    Arc::new(move |o: &mut Options| {
        let parsed = Url::parse(&addr)
            .unwrap_or_else(|e| panic!("代理地址无法解析: {}: {}", addr, e));
        o.proxy = Some(parsed);
    })
}

/// 设置 User-Agent
pub fn user_agent(value: impl Into<String>) -> OptionFn {
    let value = value.into();
    Arc::new(move |o: &mut Options| o.user_agent = Some(value.clone()))
}

/// 追加一个头部（多次调用同名头部会保留多个值）
pub fn header(name: impl Into<String>, value: impl Into<String>) -> OptionFn {
    let name = name.into();
    let value = value.into();
    Arc::new(move |o: &mut Options| o.headers.push((name.clone(), value.clone())))
}

/// 追加一个 Cookie
pub fn cookie(name: impl Into<String>, value: impl Into<String>) -> OptionFn {
    let name = name.into();
    let value = value.into();
    Arc::new(move |o: &mut Options| o.cookies.push((name.clone(), value.clone())))
}

/// 追加一个查询参数
pub fn query(key: impl Into<String>, value: impl Into<String>) -> OptionFn {
    let key = key.into();
    let value = value.into();
    Arc::new(move |o: &mut Options| o.query.push((key.clone(), value.clone())))
}

/// 设置原始请求体
pub fn body(value: impl Into<Bytes>) -> OptionFn {
    let value = value.into();
    Arc::new(move |o: &mut Options| o.body = Some(value.clone()))
}

/// 设置 JSON 请求体并追加 Content-Type 头部
///
/// 序列化在注册时立即完成，非法负载在这里就报错，不会拖到发送阶段
pub fn json<T: Serialize>(value: &T) -> RatQuickResult<OptionFn> {
    let payload = Bytes::from(serde_json::to_vec(value)?);
    Ok(Arc::new(move |o: &mut Options| {
        o.body = Some(payload.clone());
        o.headers.push((
            "content-type".to_string(),
            "application/json; charset=utf-8".to_string(),
        ));
    }))
}

/// 追加一个客户端传输中间件
pub fn transport_middleware(mw: TransportMiddleware) -> OptionFn {
    Arc::new(move |o: &mut Options| o.transport_middlewares.push(mw.clone()))
}

/// 追加一个服务端处理器中间件
pub fn handler_middleware(mw: HandlerMiddleware) -> OptionFn {
    Arc::new(move |o: &mut Options| o.handler_middlewares.push(mw.clone()))
}

/// 注册流式分块回调
pub fn on_chunk<F>(callback: F) -> OptionFn
where
    F: Fn(u64, &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
        + Send
        + Sync
        + 'static,
{
    let callback: ChunkHandler = Arc::new(callback);
    Arc::new(move |o: &mut Options| o.on_chunk = Some(callback.clone()))
}
