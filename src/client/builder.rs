//! HTTP 客户端构建器
//!
//! 配置在设置时立即校验，越界直接报错，不会拖到请求阶段

use std::time::Duration;

use crate::client::http_client::{RatQuickClient, Transport, TransportMiddleware, hyper_transport};
use crate::common::options::{self, OptionFn};
use crate::error::{RatQuickError, RatQuickResult};

/// RAT Quick HTTP 客户端构建器
#[derive(Default)]
pub struct RatQuickClientBuilder {
    /// 连接超时时间
    connect_timeout: Option<Duration>,
    /// 请求超时时间
    request_timeout: Option<Duration>,
    /// 用户代理字符串
    user_agent: Option<String>,
    /// 会话层配置
    base_options: Vec<OptionFn>,
    /// 会话层传输中间件
    middlewares: Vec<TransportMiddleware>,
    /// 自定义终端传输能力（默认使用 hyper-util legacy 客户端）
    transport: Option<Transport>,
}

impl std::fmt::Debug for RatQuickClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatQuickClientBuilder")
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .field("base_options", &self.base_options.len())
            .field("middlewares", &self.middlewares.len())
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

impl RatQuickClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置连接超时时间
    ///
    /// # 参数
    /// * `timeout` - 连接超时时间，必须在 1-30 秒之间
    pub fn connect_timeout(mut self, timeout: Duration) -> RatQuickResult<Self> {
        if timeout.as_secs() < 1 || timeout.as_secs() > 30 {
            return Err(RatQuickError::RequestError(
                "连接超时时间必须在 1-30 秒之间".to_string(),
            ));
        }
        self.connect_timeout = Some(timeout);
        Ok(self)
    }

    /// 设置请求超时时间
    ///
    /// # 参数
    /// * `timeout` - 请求超时时间，必须在 1-300 秒之间
    pub fn request_timeout(mut self, timeout: Duration) -> RatQuickResult<Self> {
        if timeout.as_secs() < 1 || timeout.as_secs() > 300 {
            return Err(RatQuickError::RequestError(
                "请求超时时间必须在 1-300 秒之间".to_string(),
            ));
        }
        self.request_timeout = Some(timeout);
        Ok(self)
    }

    /// 设置用户代理字符串
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// 追加一个会话层配置选项
    pub fn option(mut self, opt: OptionFn) -> Self {
        self.base_options.push(opt);
        self
    }

    /// 追加一批会话层配置选项
    pub fn options(mut self, opts: Vec<OptionFn>) -> Self {
        self.base_options.extend(opts);
        self
    }

    /// 注册会话层传输中间件，先注册的在最外层
    pub fn middleware(mut self, mw: TransportMiddleware) -> Self {
        self.middlewares.push(mw);
        self
    }

    /// 替换终端传输能力
    pub fn transport(mut self, transport: Transport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// 构建客户端
    pub fn build(self) -> RatQuickResult<RatQuickClient> {
        // 构建器级别的标量先注入会话层，调用方传入的会话选项在其后生效
        let mut base = Vec::new();
        base.push(options::timeout(
            self.request_timeout.unwrap_or(Duration::from_secs(30)),
        ));
        if let Some(ua) = self.user_agent {
            base.push(options::user_agent(ua));
        }
        base.extend(self.base_options);

        let transport = match self.transport {
            Some(t) => t,
            None => hyper_transport(Some(
                self.connect_timeout.unwrap_or(Duration::from_secs(10)),
            )),
        };

        Ok(RatQuickClient::from_parts(base, self.middlewares, transport))
    }
}
