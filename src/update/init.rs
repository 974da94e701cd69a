use crate::core::RunContext;
use crate::error::Result;
use crate::index::autocomplete::{self, AutoCompleteIds};
use crate::index::catalog::{self, CatalogIndex};
use crate::index::package_index::{self, PackageIndexDoc};
use crate::index::search::{self, SearchIndex};
use crate::index::symbols::{self, SymbolsIndex};

/// 新建 feed：为当前配置下的每个全局索引写入空文档（已存在的不覆盖）。
///
/// 返回新写入的文档数。按 id 分布的文档（registration / flatcontainer）在首次 add 时创建。
pub async fn init_feed(ctx: &RunContext) -> Result<usize> {
    let store = ctx.store();
    let mut written = 0;

    if ctx.catalog_enabled() && !store.exists(catalog::INDEX_PATH).await? {
        store
            .put_json(catalog::INDEX_PATH, &CatalogIndex::default())
            .await?;
        written += 1;
    }
    if !store.exists(autocomplete::PATH).await? {
        store
            .put_json(autocomplete::PATH, &AutoCompleteIds::default())
            .await?;
        written += 1;
    }
    if !store.exists(search::PATH).await? {
        store.put_json(search::PATH, &SearchIndex::default()).await?;
        written += 1;
    }
    if !store.exists(package_index::PATH).await? {
        store
            .put_json(package_index::PATH, &PackageIndexDoc::default())
            .await?;
        written += 1;
    }
    if ctx.symbols_enabled() && !store.exists(symbols::INDEX_PATH).await? {
        store
            .put_json(symbols::INDEX_PATH, &SymbolsIndex::default())
            .await?;
        written += 1;
    }

    tracing::info!("Initialized feed on {} ({} documents)", store.backend().describe(), written);
    Ok(written)
}
