use std::sync::Arc;

use crate::core::RunContext;
use crate::index::{
    AutoComplete, Catalog, FlatContainer, IndexHandle, PackageIndex, Pipeline, Registrations,
    Search, Symbols, VirtualCatalog,
};

/// 按依赖顺序构建服务列表（每次调用都重新构建，不做 I/O）
///
/// 顺序不可调整：
/// 1) flatcontainer
/// 2) catalog（catalog_enabled=false 时为 virtual catalog）
/// 3) registrations：引用 catalog 本次写入的 commit
/// 4) autocomplete / 5) search：读取 registrations 的最新状态
/// 6) packageindex
/// 7) symbols：仅 symbols_enabled
pub fn build_pipeline(ctx: &RunContext) -> Pipeline {
    let mut handles = vec![IndexHandle::with_symbols(Arc::new(FlatContainer::new(ctx)))];

    if ctx.catalog_enabled() {
        handles.push(IndexHandle::plain(Arc::new(Catalog::new(ctx))));
    } else {
        handles.push(IndexHandle::plain(Arc::new(VirtualCatalog::new(ctx))));
    }

    handles.push(IndexHandle::plain(Arc::new(Registrations::new(ctx))));
    handles.push(IndexHandle::plain(Arc::new(AutoComplete::new(ctx))));
    handles.push(IndexHandle::plain(Arc::new(Search::new(ctx))));
    handles.push(IndexHandle::plain(Arc::new(PackageIndex::new(ctx))));

    if ctx.symbols_enabled() {
        handles.push(IndexHandle::with_symbols(Arc::new(Symbols::new(ctx))));
    }

    Pipeline::new(handles)
}
