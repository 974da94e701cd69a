pub mod autocomplete;
pub mod catalog;
pub mod flat_container;
pub mod package_index;
pub mod pipeline;
pub mod registrations;
pub mod search;
pub mod symbols;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{PackageIdentity, PackageInput};
use crate::error::Result;

/// 索引服务契约：每个服务维护 feed 的一种文档视图
///
/// ## 契约（重要）
/// - `add_package` 幂等：同一 identity 重复 add 终态相同
/// - `remove_package` 幂等，且 identity 不存在时不报错
/// - `fetch` 只读：把已有文档预取进缓存，不改变逻辑内容
/// - 只写自己的文档；可以读 pipeline 中排在前面的服务刚写的文档
#[async_trait]
pub trait IndexService: Send + Sync {
    fn kind(&self) -> ServiceKind;

    async fn add_package(&self, package: &PackageInput) -> Result<()>;

    async fn remove_package(&self, identity: &PackageIdentity) -> Result<()>;

    async fn fetch(&self) -> Result<()>;
}

/// 可选能力：处理 symbols 包（调试符号）。契约同 `IndexService`。
#[async_trait]
pub trait SymbolsCapability: Send + Sync {
    async fn add_symbols_package(&self, package: &PackageInput) -> Result<()>;

    async fn remove_symbols_package(&self, identity: &PackageIdentity) -> Result<()>;
}

/// 服务种类（闭集）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    FlatContainer,
    Catalog,
    VirtualCatalog,
    Registrations,
    AutoComplete,
    Search,
    PackageIndex,
    Symbols,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::FlatContainer => "flatcontainer",
            ServiceKind::Catalog => "catalog",
            ServiceKind::VirtualCatalog => "virtual-catalog",
            ServiceKind::Registrations => "registrations",
            ServiceKind::AutoComplete => "autocomplete",
            ServiceKind::Search => "search",
            ServiceKind::PackageIndex => "packageindex",
            ServiceKind::Symbols => "symbols",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// pipeline 中的一项：基础契约 + 构建时解析好的 symbols 能力句柄
///
/// 两个 Arc 指向同一个实例；写阶段不再做运行时类型探测。
#[derive(Clone)]
pub struct IndexHandle {
    kind: ServiceKind,
    service: Arc<dyn IndexService>,
    symbols: Option<Arc<dyn SymbolsCapability>>,
}

impl IndexHandle {
    pub fn plain<S>(service: Arc<S>) -> Self
    where
        S: IndexService + 'static,
    {
        Self {
            kind: service.kind(),
            service,
            symbols: None,
        }
    }

    pub fn with_symbols<S>(service: Arc<S>) -> Self
    where
        S: IndexService + SymbolsCapability + 'static,
    {
        Self {
            kind: service.kind(),
            symbols: Some(service.clone() as Arc<dyn SymbolsCapability>),
            service,
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn service(&self) -> &Arc<dyn IndexService> {
        &self.service
    }

    pub fn symbols(&self) -> Option<&Arc<dyn SymbolsCapability>> {
        self.symbols.as_ref()
    }
}

/// 有序、构建后不可变的服务列表
#[derive(Clone)]
pub struct Pipeline {
    handles: Vec<IndexHandle>,
}

impl Pipeline {
    pub fn new(handles: Vec<IndexHandle>) -> Self {
        Self { handles }
    }

    pub fn handles(&self) -> &[IndexHandle] {
        &self.handles
    }

    pub fn kinds(&self) -> Vec<ServiceKind> {
        self.handles.iter().map(|h| h.kind).collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// 具备 symbols 能力的服务（保持 pipeline 顺序）
    pub fn symbols_handlers(&self) -> impl Iterator<Item = (ServiceKind, &Arc<dyn SymbolsCapability>)> {
        self.handles
            .iter()
            .filter_map(|h| h.symbols.as_ref().map(|s| (h.kind, s)))
    }
}

pub use autocomplete::AutoComplete;
pub use catalog::{Catalog, VirtualCatalog};
pub use flat_container::FlatContainer;
pub use package_index::PackageIndex;
pub use pipeline::build_pipeline;
pub use registrations::Registrations;
pub use search::Search;
pub use symbols::Symbols;
