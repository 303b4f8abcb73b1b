//! 日志工具模块
//!
//! 统一封装 rat_logger 的日志宏，crate 内部一律通过本模块引入

pub use rat_logger::{debug, error, info, warn};
