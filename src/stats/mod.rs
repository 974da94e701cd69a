use std::fmt;

use crate::core::RunContext;
use crate::error::Result;
use crate::index::autocomplete::{self, AutoCompleteIds};
use crate::index::catalog::{self, CatalogIndex};
use crate::index::package_index::{self, PackageIndexDoc};
use crate::index::symbols::{self, SymbolsIndex};
use crate::storage::StoreStats;

/// feed 概况（从各索引文档读取）
#[derive(Clone, Debug, Default)]
pub struct FeedReport {
    /// 存储后端描述
    pub backend: String,
    /// sleet.packageindex.json 中的 id 数
    pub package_ids: usize,
    /// 所有 id 的版本总数
    pub package_versions: usize,
    /// autocomplete 中的 id 数
    pub autocomplete_ids: usize,
    /// catalog commit 数；virtual catalog 时为 None
    pub catalog_commits: Option<usize>,
    /// symbols 包数；未启用 symbols 时为 None
    pub symbols_packages: Option<usize>,
    pub store: StoreStats,
}

impl FeedReport {
    pub async fn collect(ctx: &RunContext) -> Result<Self> {
        let store = ctx.store();

        let packages = store
            .get_json::<PackageIndexDoc>(package_index::PATH)
            .await?
            .unwrap_or_default();
        let ids = store
            .get_json::<AutoCompleteIds>(autocomplete::PATH)
            .await?
            .unwrap_or_default();

        let catalog_commits = if ctx.catalog_enabled() {
            Some(
                store
                    .get_json::<CatalogIndex>(catalog::INDEX_PATH)
                    .await?
                    .map(|c| c.count)
                    .unwrap_or(0),
            )
        } else {
            None
        };

        let symbols_packages = if ctx.symbols_enabled() {
            Some(
                store
                    .get_json::<SymbolsIndex>(symbols::INDEX_PATH)
                    .await?
                    .map(|s| s.symbols_packages.len())
                    .unwrap_or(0),
            )
        } else {
            None
        };

        Ok(Self {
            backend: store.backend().describe(),
            package_ids: packages.packages.len(),
            package_versions: packages.version_count(),
            autocomplete_ids: ids.ids.len(),
            catalog_commits,
            symbols_packages,
            store: store.stats(),
        })
    }
}

fn opt(v: Option<usize>) -> String {
    v.map(|n| n.to_string()).unwrap_or_else(|| "disabled".to_string())
}

impl fmt::Display for FeedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "╔══════════════════════════════════════════════════╗")?;
        writeln!(f, "║           flatfeed Feed Report                   ║")?;
        writeln!(f, "╠══════════════════════════════════════════════════╣")?;
        writeln!(f, "║ Backend: {:>39} ║", self.backend)?;
        writeln!(f, "╠──────────────────────────────────────────────────╣")?;
        writeln!(f, "║ Packages:                                        ║")?;
        writeln!(f, "║   ids:          {:>10}                       ║", self.package_ids)?;
        writeln!(f, "║   versions:     {:>10}                       ║", self.package_versions)?;
        writeln!(f, "║   autocomplete: {:>10}                       ║", self.autocomplete_ids)?;
        writeln!(f, "║   catalog:      {:>10}                       ║", opt(self.catalog_commits))?;
        writeln!(f, "║   symbols:      {:>10}                       ║", opt(self.symbols_packages))?;
        writeln!(f, "╠──────────────────────────────────────────────────╣")?;
        writeln!(f, "║ Store cache:                                     ║")?;
        writeln!(f, "║   documents:    {:>10}                       ║", self.store.cached_documents)?;
        writeln!(f, "║   transient:    {:>10}                       ║", self.store.transient_documents)?;
        writeln!(f, "║   hits/misses:  {:>10}                       ║", format!("{}/{}", self.store.hits, self.store.misses))?;
        writeln!(f, "║   writes:       {:>10}                       ║", self.store.writes)?;
        writeln!(f, "╚══════════════════════════════════════════════════╝")?;
        Ok(())
    }
}
