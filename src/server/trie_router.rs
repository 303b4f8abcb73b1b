//! 前缀树路由
//!
//! 每条边对应一个路径段。字面段精确匹配，`:name` 或 `{name}` 段是命名参数
//! （参数名只允许字母、数字和下划线）。匹配时**字面子节点在每一层都严格优先**
//! 于参数子节点，与注册先后无关。
//!
//! 路径在插入和查找时都会丢弃空段，所以 `/a/` 与 `/a` 指向同一个节点。
//!
//! 写入只允许发生在启动阶段：单写多读的约定由使用方保证（服务期内路由器
//! 以 `Arc` 共享，结构上已经无法再写入）。运行期动态注册需要自行加互斥。

use std::collections::HashMap;

use crate::common::options::OptionFn;
use crate::error::{RatQuickError, RatQuickResult};
use crate::server::router::HttpHandler;
use crate::utils::logger::warn;

/// 注册到某个 (节点, 方法) 上的处理器与路由级配置
#[derive(Clone)]
pub struct RouteEntry {
    pub handler: HttpHandler,
    pub options: Vec<OptionFn>,
}

/// 解析后的路径段
enum SegmentKind {
    Literal(String),
    Param(String),
}

/// 判定段类型并校验参数名
fn parse_segment(segment: &str) -> RatQuickResult<SegmentKind> {
    let param_name = if let Some(name) = segment.strip_prefix(':') {
        Some(name)
    } else if segment.starts_with('{') && segment.ends_with('}') && segment.len() >= 2 {
        Some(&segment[1..segment.len() - 1])
    } else {
        None
    };

    match param_name {
        Some(name) => {
            if name.is_empty()
                || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(RatQuickError::RouteError(format!(
                    "非法的路径参数名: {:?}（只允许字母、数字和下划线）",
                    segment
                )));
            }
            Ok(SegmentKind::Param(name.to_string()))
        }
        None => Ok(SegmentKind::Literal(segment.to_string())),
    }
}

struct ParamChild {
    name: String,
    node: TrieNode,
}

/// 前缀树节点
///
/// 每个节点独占其子节点；参数子节点最多一个。同一位置用不同参数名
/// 再次注册时，参数名会被覆盖（子树保留），这是记录在案的行为而不是静默合并。
pub struct TrieNode {
    label: String,
    children: HashMap<String, TrieNode>,
    param_child: Option<Box<ParamChild>>,
    /// 方法名 -> 路由条目；空字符串键是方法无关的默认处理器
    methods: HashMap<String, RouteEntry>,
}

impl TrieNode {
    fn new(label: String) -> Self {
        Self {
            label,
            children: HashMap::new(),
            param_child: None,
            methods: HashMap::new(),
        }
    }

    /// 节点的段标签
    pub fn label(&self) -> &str {
        &self.label
    }

    /// 是否注册过任何方法
    pub fn has_routes(&self) -> bool {
        !self.methods.is_empty()
    }

    /// 按方法取条目，找不到时回退到默认处理器（空方法键）
    pub fn entry(&self, method: &str) -> Option<&RouteEntry> {
        self.methods.get(method).or_else(|| self.methods.get(""))
    }
}

/// 查找结果
pub struct PathMatch<'a> {
    /// 到达的最深节点（未完全匹配时是中途停下的那个节点）
    pub node: &'a TrieNode,
    /// 所有段都被消费且节点上注册过方法时为 true
    pub fully_matched: bool,
    /// 本次查找绑定的参数值（已做百分号解码）
    pub params: HashMap<String, String>,
}

/// 路径前缀树
pub struct PathTrie {
    root: TrieNode,
}

impl PathTrie {
    pub fn new() -> Self {
        Self {
            root: TrieNode::new(String::new()),
        }
    }

    /// 注册一条路由
    ///
    /// 空模式立即报错；`"/"` 直接挂到根节点。
    /// 同一 (模式, 方法) 重复注册时后一次覆盖前一次。
    pub fn add(
        &mut self,
        pattern: &str,
        method: &str,
        handler: HttpHandler,
        options: Vec<OptionFn>,
    ) -> RatQuickResult<()> {
        if pattern.is_empty() {
            return Err(RatQuickError::RouteError("路由模式不能为空".to_string()));
        }

        let mut node = &mut self.root;
        for segment in pattern.split('/').filter(|s| !s.is_empty()) {
            match parse_segment(segment)? {
                SegmentKind::Literal(literal) => {
                    node = node
                        .children
                        .entry(literal.clone())
                        .or_insert_with(|| TrieNode::new(literal));
                }
                SegmentKind::Param(name) => {
                    if node.param_child.is_none() {
                        node.param_child = Some(Box::new(ParamChild {
                            node: TrieNode::new(format!(":{}", name)),
                            name: name.clone(),
                        }));
                    }
                    let param = node.param_child.as_deref_mut().expect("参数子节点已写入");
                    if param.name != name {
                        warn!(
                            "⚠️ [路由] 同一位置的参数名被覆盖: {} -> {}",
                            param.name, name
                        );
                        param.name = name;
                    }
                    node = &mut param.node;
                }
            }
        }

        node.methods.insert(method.to_string(), RouteEntry { handler, options });
        Ok(())
    }

    /// 查找路径
    ///
    /// 每一层先试字面子节点，没有才回退到参数子节点并绑定参数值；
    /// 两者都没有时带着已到达的最深节点返回 `fully_matched=false`。
    pub fn find(&self, path: &str) -> PathMatch<'_> {
        let mut node = &self.root;
        let mut params = HashMap::new();

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if let Some(child) = node.children.get(segment) {
                node = child;
            } else if let Some(param) = node.param_child.as_deref() {
                let value = urlencoding::decode(segment)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| segment.to_string());
                params.insert(param.name.clone(), value);
                node = &param.node;
            } else {
                return PathMatch {
                    node,
                    fully_matched: false,
                    params,
                };
            }
        }

        PathMatch {
            fully_matched: node.has_routes(),
            node,
            params,
        }
    }
}

impl Default for PathTrie {
    fn default() -> Self {
        Self::new()
    }
}
