//! 客户端与服务端共享的核心组件
//!
//! 分层配置合并、双向中间件组合与行分隔流式读取

pub mod middleware;
pub mod options;
pub mod stream;

pub use middleware::{MiddlewareFn, compose};
pub use options::{ChunkHandler, OptionFn, Options, resolve};
pub use stream::{BodyReader, CancelFlag, LineStreamReader, StreamError, StreamProgress};
