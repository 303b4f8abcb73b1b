//! 双向中间件组合
//!
//! 中间件是 `能力 -> 能力` 的装饰函数：客户端方向包裹"发送并接收"的传输能力，
//! 服务端方向包裹"处理请求"的处理器能力，两个方向的组合形状完全一致。
//!
//! 组合顺序约定：**先注册的中间件在最外层**，它的前置逻辑最先执行、
//! 后置逻辑最后执行；合并会话/路由器层与调用/路由层时，会话/路由器层
//! 排在前面（更外层）。该规则对两个方向统一生效，由测试锁定。
//!
//! 中间件可以不调用 `next` 直接短路（例如拒绝未认证请求），短路结果对
//! 最外层调用方来说就是一个普通的响应/错误，没有独立的代码路径。

use std::sync::Arc;

/// 中间件函数：接收下一层能力，返回包装后的同类型能力
pub type MiddlewareFn<C> = Arc<dyn Fn(C) -> C + Send + Sync>;

/// 将中间件列表组合到终端能力上
///
/// 从列表尾部向头部折叠，保证下标 0 的中间件位于最外层。
/// 组合在每个请求上各发生一次，包装结果不跨请求共享可变状态。
pub fn compose<C>(terminal: C, layers: &[MiddlewareFn<C>]) -> C {
    layers.iter().rev().fold(terminal, |next, layer| layer(next))
}
