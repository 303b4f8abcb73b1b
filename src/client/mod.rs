//! RAT Quick 客户端模块
//!
//! 分层配置驱动的 HTTP 客户端，外加一组使用共享默认客户端的自由函数

use hyper::Method;
use hyper::Response;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::common::options::OptionFn;
use crate::error::RatQuickResult;

pub mod builder;
pub mod http_client;

pub use builder::RatQuickClientBuilder;
pub use http_client::{
    RatQuickClient, ResponseBody, Transport, TransportMiddleware, default_client, read_body,
    read_json,
};

// ========== 基于默认客户端的便捷函数 ==========
//
// 默认客户端是不可变的共享实例；需要独立配置的调用方请显式构建自己的客户端

pub async fn get(url: &str, opts: &[OptionFn]) -> RatQuickResult<Response<ResponseBody>> {
    default_client().get(url, opts).await
}

pub async fn post(url: &str, opts: &[OptionFn]) -> RatQuickResult<Response<ResponseBody>> {
    default_client().post(url, opts).await
}

pub async fn put(url: &str, opts: &[OptionFn]) -> RatQuickResult<Response<ResponseBody>> {
    default_client().put(url, opts).await
}

pub async fn delete(url: &str, opts: &[OptionFn]) -> RatQuickResult<Response<ResponseBody>> {
    default_client().delete(url, opts).await
}

pub async fn request(
    method: Method,
    url: &str,
    opts: &[OptionFn],
) -> RatQuickResult<Response<ResponseBody>> {
    default_client().request(method, url, opts).await
}

pub async fn get_json<T: DeserializeOwned>(url: &str, opts: &[OptionFn]) -> RatQuickResult<T> {
    default_client().get_json(url, opts).await
}

pub async fn post_json<U: Serialize, T: DeserializeOwned>(
    url: &str,
    payload: &U,
    opts: &[OptionFn],
) -> RatQuickResult<T> {
    default_client().post_json(url, payload, opts).await
}
