//! RAT Quick 统一错误类型
//!
//! 注册阶段的错误（路由模式非法、构建器参数越界）在启动时立即失败，
//! 不会延迟到请求阶段；请求阶段的错误原样返回给调用方，本 crate 不代为记录或吞掉。

use thiserror::Error;

/// 统一结果类型别名
pub type RatQuickResult<T> = Result<T, RatQuickError>;

/// RAT Quick 错误枚举
#[derive(Error, Debug)]
pub enum RatQuickError {
    /// 路由注册错误（模式为空、参数名非法等），构建期即失败
    #[error("路由注册错误: {0}")]
    RouteError(String),

    /// 请求构建/发送错误（URL 缺失、头部非法、超时等）
    #[error("请求错误: {0}")]
    RequestError(String),

    /// 客户端底层传输错误
    #[error("传输错误: {0}")]
    ClientError(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    /// HTTP 协议层错误（头部/URI 构造失败等）
    #[error("HTTP 错误: {0}")]
    HttpError(#[from] hyper::http::Error),

    /// Hyper 错误
    #[error("Hyper 错误: {0}")]
    HyperError(#[from] hyper::Error),

    /// JSON 序列化/反序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL 解析错误
    #[error("URL 解析错误: {0}")]
    UrlError(#[from] url::ParseError),

    /// 流式读取错误（含取消），保留已处理进度
    #[error("流处理错误: {0}")]
    StreamError(#[from] crate::common::stream::StreamError),

    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),
}

impl RatQuickError {
    /// 判断是否为流取消导致的错误
    ///
    /// 调用方可以据此选择不把取消当成故障记录
    pub fn is_stream_cancelled(&self) -> bool {
        matches!(
            self,
            RatQuickError::StreamError(e) if e.is_cancelled()
        )
    }
}
