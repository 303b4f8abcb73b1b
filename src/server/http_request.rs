//! 通用 HTTP 请求结构体
//!
//! 在路由匹配之前把 hyper 请求收拢为一个自包含的值：请求体已经读完，
//! 路径参数在匹配后注入，处理器拿到的是可以随意克隆传递的普通结构体。

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use http_body_util::BodyExt;
use hyper::body::{Bytes, Incoming};
use hyper::header::HeaderMap;
use hyper::{Method, Request, Uri, Version};

use crate::error::RatQuickResult;

/// 自包含的 HTTP 请求
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub remote_addr: Option<SocketAddr>,
    path_params: HashMap<String, String>,
}

impl HttpRequest {
    /// 构造一个最小请求（主要用于测试和手工调用）
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.parse().unwrap_or_else(|_| Uri::from_static("/")),
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remote_addr: None,
            path_params: HashMap::new(),
        }
    }

    /// 附带请求体
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// 从 hyper 请求转换，读完整个请求体
    pub async fn from_hyper_request(
        req: Request<Incoming>,
        remote_addr: Option<SocketAddr>,
    ) -> RatQuickResult<Self> {
        let (parts, body) = req.into_parts();
        let body = body.collect().await?.to_bytes();

        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
            remote_addr,
            path_params: HashMap::new(),
        })
    }

    /// 请求路径
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// 原始查询字符串
    pub fn query_string(&self) -> &str {
        self.uri.query().unwrap_or("")
    }

    /// 解析后的查询参数（同名键保留最后一个值）
    pub fn query_params(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(self.query_string().as_bytes())
            .into_owned()
            .collect()
    }

    /// 按名称取头部值（取第一个，且仅当是合法 UTF-8 时）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// 路由匹配阶段注入路径参数
    pub fn set_path_params(&mut self, params: HashMap<String, String>) {
        self.path_params = params;
    }

    /// 按名称取路径参数
    pub fn param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(|s| s.as_str())
    }

    /// 按名称取路径参数并解析为整数
    pub fn param_as_i64(&self, name: &str) -> Option<i64> {
        self.param(name).and_then(|v| v.parse().ok())
    }

    /// 全部路径参数
    pub fn path_params(&self) -> &HashMap<String, String> {
        &self.path_params
    }

    /// 请求体按 UTF-8 解码
    pub fn body_as_string(&self) -> Option<String> {
        String::from_utf8(self.body.to_vec()).ok()
    }

    /// 客户端 IP：优先 X-Forwarded-For，其次 X-Real-IP，最后取连接对端地址
    pub fn client_ip(&self) -> Option<IpAddr> {
        if let Some(forwarded) = self.header("x-forwarded-for") {
            if let Some(first) = forwarded.split(',').next() {
                if let Ok(ip) = first.trim().parse() {
                    return Some(ip);
                }
            }
        }
        if let Some(real_ip) = self.header("x-real-ip") {
            if let Ok(ip) = real_ip.trim().parse() {
                return Some(ip);
            }
        }
        self.remote_addr.map(|addr| addr.ip())
    }
}
