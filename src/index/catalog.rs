use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{PackageIdentity, PackageInput, PackageMetadata, RunContext};
use crate::error::Result;
use crate::index::{IndexService, ServiceKind};
use crate::storage::FeedStore;

pub const INDEX_PATH: &str = "catalog/index.json";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitKind {
    Add,
    Delete,
}

/// 一条 commit 记录（append-only）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub commit_id: String,
    pub timestamp_ms: u64,
    #[serde(rename = "type")]
    pub kind: CommitKind,
    pub id: String,
    pub version: String,
    pub page: usize,
    /// add 记录的详情文档路径
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CatalogItem {
    pub fn is_for(&self, identity: &PackageIdentity) -> bool {
        self.id == identity.id() && self.version == identity.version()
    }
}

/// `catalog/index.json`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogIndex {
    pub commit_id: Option<String>,
    pub commit_timestamp_ms: Option<u64>,
    pub count: usize,
    pub items: Vec<CatalogItem>,
}

impl CatalogIndex {
    pub fn latest_for(&self, identity: &PackageIdentity) -> Option<&CatalogItem> {
        self.items.iter().rev().find(|i| i.is_for(identity))
    }
}

/// add 记录的详情文档
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogDetail {
    pub commit_id: String,
    pub timestamp_ms: u64,
    pub id: String,
    pub version: String,
    pub content_hash: String,
    pub metadata: PackageMetadata,
}

/// 当前 catalog 中该 identity 的最新 commit（Registrations 依赖它）
pub async fn latest_entry(store: &FeedStore, identity: &PackageIdentity) -> Result<Option<CatalogItem>> {
    Ok(store
        .get_json::<CatalogIndex>(INDEX_PATH)
        .await?
        .and_then(|idx| idx.latest_for(identity).cloned()))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// 两种 catalog 共用的提交逻辑；`durable` 决定写穿还是只写缓存
struct CommitWriter {
    ctx: RunContext,
    durable: bool,
}

impl CommitWriter {
    async fn load(&self) -> Result<CatalogIndex> {
        Ok(self
            .ctx
            .store()
            .get_json::<CatalogIndex>(INDEX_PATH)
            .await?
            .unwrap_or_default())
    }

    async fn save<T: Serialize>(&self, path: &str, value: &T) -> Result<()> {
        if self.durable {
            self.ctx.store().put_json(path, value).await
        } else {
            self.ctx.store().put_transient(path, value)
        }
    }

    fn next_item(&self, index: &CatalogIndex, kind: CommitKind, identity: &PackageIdentity) -> CatalogItem {
        CatalogItem {
            commit_id: uuid::Uuid::new_v4().to_string(),
            timestamp_ms: now_ms(),
            kind,
            id: identity.id().to_string(),
            version: identity.version().to_string(),
            page: index.count / self.ctx.settings().catalog_page_size.max(1),
            detail: None,
        }
    }

    async fn commit(&self, mut index: CatalogIndex, item: CatalogItem) -> Result<()> {
        index.commit_id = Some(item.commit_id.clone());
        index.commit_timestamp_ms = Some(item.timestamp_ms);
        index.count += 1;
        index.items.push(item);
        self.save(INDEX_PATH, &index).await
    }

    async fn add(&self, package: &PackageInput) -> Result<()> {
        let index = self.load().await?;
        let identity = &package.identity;
        let previous = index
            .latest_for(identity)
            .filter(|i| i.kind == CommitKind::Add)
            .map(|i| i.detail.clone());
        if let Some(detail) = previous {
            if self.same_content(detail.as_deref(), package).await? {
                tracing::debug!("catalog: {} already committed, skipping", identity);
                return Ok(());
            }
            tracing::debug!("catalog: {} content changed, committing again", identity);
        }

        let mut item = self.next_item(&index, CommitKind::Add, identity);
        let detail_path = format!(
            "catalog/data/{}/{}.json",
            item.timestamp_ms,
            identity.file_stem()
        );
        let detail = CatalogDetail {
            commit_id: item.commit_id.clone(),
            timestamp_ms: item.timestamp_ms,
            id: item.id.clone(),
            version: item.version.clone(),
            content_hash: package.content.hash(),
            metadata: package.content.metadata.clone(),
        };
        self.save(&detail_path, &detail).await?;
        item.detail = Some(detail_path);
        self.commit(index, item).await
    }

    /// 上一次 add 的详情与本次内容一致（哈希 + 元数据）
    async fn same_content(&self, detail: Option<&str>, package: &PackageInput) -> Result<bool> {
        let Some(path) = detail else {
            return Ok(false);
        };
        Ok(self
            .ctx
            .store()
            .get_json::<CatalogDetail>(path)
            .await?
            .map_or(false, |d| {
                d.content_hash == package.content.hash() && d.metadata == package.content.metadata
            }))
    }

    async fn remove(&self, identity: &PackageIdentity) -> Result<()> {
        let index = self.load().await?;
        match index.latest_for(identity) {
            Some(i) if i.kind == CommitKind::Add => {}
            _ => return Ok(()),
        }
        let item = self.next_item(&index, CommitKind::Delete, identity);
        self.commit(index, item).await
    }
}

/// 落盘 catalog
pub struct Catalog {
    writer: CommitWriter,
}

impl Catalog {
    pub fn new(ctx: &RunContext) -> Self {
        Self {
            writer: CommitWriter {
                ctx: ctx.clone(),
                durable: true,
            },
        }
    }
}

#[async_trait]
impl IndexService for Catalog {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Catalog
    }

    async fn add_package(&self, package: &PackageInput) -> Result<()> {
        self.writer.add(package).await
    }

    async fn remove_package(&self, identity: &PackageIdentity) -> Result<()> {
        self.writer.remove(identity).await
    }

    async fn fetch(&self) -> Result<()> {
        self.writer
            .ctx
            .store()
            .prefetch(&[INDEX_PATH.to_string()])
            .await?;
        Ok(())
    }
}

/// 内存 catalog：同样的 commit 模型，但只写缓存，不落盘。
/// 后续服务（Registrations）仍能解析本次操作的 catalog 记录。
pub struct VirtualCatalog {
    writer: CommitWriter,
}

impl VirtualCatalog {
    pub fn new(ctx: &RunContext) -> Self {
        Self {
            writer: CommitWriter {
                ctx: ctx.clone(),
                durable: false,
            },
        }
    }
}

#[async_trait]
impl IndexService for VirtualCatalog {
    fn kind(&self) -> ServiceKind {
        ServiceKind::VirtualCatalog
    }

    async fn add_package(&self, package: &PackageInput) -> Result<()> {
        self.writer.add(package).await
    }

    async fn remove_package(&self, identity: &PackageIdentity) -> Result<()> {
        self.writer.remove(identity).await
    }

    async fn fetch(&self) -> Result<()> {
        // 没有持久状态
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FeedSettings, PackageContent};
    use crate::storage::{MemoryStorage, StorageBackend};
    use std::sync::Arc;

    fn pkg(id: &str, ver: &str) -> PackageInput {
        PackageInput::new(
            PackageIdentity::new(id, ver),
            PackageContent::new(b"x".to_vec(), PackageMetadata::default()),
        )
    }

    fn mem_ctx(settings: FeedSettings) -> (RunContext, Arc<MemoryStorage>) {
        let mem = Arc::new(MemoryStorage::new());
        let ctx = RunContext::new(settings, FeedStore::new(mem.clone()));
        (ctx, mem)
    }

    #[tokio::test]
    async fn add_remove_appends_commits() {
        let (ctx, _) = mem_ctx(FeedSettings::default());
        let cat = Catalog::new(&ctx);
        let p = pkg("Foo", "1.0.0");

        cat.add_package(&p).await.unwrap();
        cat.add_package(&p).await.unwrap();
        let e = latest_entry(ctx.store(), &p.identity).await.unwrap().unwrap();
        assert_eq!(e.kind, CommitKind::Add);
        assert!(e.detail.is_some());

        cat.remove_package(&p.identity).await.unwrap();
        cat.remove_package(&p.identity).await.unwrap();
        let idx: CatalogIndex = ctx.store().get_json(INDEX_PATH).await.unwrap().unwrap();
        assert_eq!(idx.count, 2);
        assert_eq!(idx.items[1].kind, CommitKind::Delete);
        assert_eq!(idx.commit_id.as_deref(), Some(idx.items[1].commit_id.as_str()));
    }

    #[tokio::test]
    async fn changed_content_is_committed_again() {
        let (ctx, _) = mem_ctx(FeedSettings::default());
        let cat = Catalog::new(&ctx);
        let first = pkg("Foo", "1.0.0");
        cat.add_package(&first).await.unwrap();
        let old = latest_entry(ctx.store(), &first.identity).await.unwrap().unwrap();

        let second = PackageInput::new(
            PackageIdentity::new("Foo", "1.0.0"),
            PackageContent::new(b"y".to_vec(), PackageMetadata::default()),
        );
        cat.add_package(&second).await.unwrap();
        cat.add_package(&second).await.unwrap();

        let idx: CatalogIndex = ctx.store().get_json(INDEX_PATH).await.unwrap().unwrap();
        assert_eq!(idx.count, 2);
        let new = idx.latest_for(&second.identity).unwrap();
        assert_ne!(new.commit_id, old.commit_id);
        let detail: CatalogDetail = ctx
            .store()
            .get_json(new.detail.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(detail.content_hash, second.content.hash());
    }

    #[tokio::test]
    async fn remove_never_added_is_noop() {
        let (ctx, mem) = mem_ctx(FeedSettings::default());
        let cat = Catalog::new(&ctx);
        cat.remove_package(&PackageIdentity::new("nope", "1.0.0"))
            .await
            .unwrap();
        assert!(mem.is_empty());
    }

    #[tokio::test]
    async fn pages_follow_page_size() {
        let settings = FeedSettings {
            catalog_page_size: 2,
            ..FeedSettings::default()
        };
        let (ctx, _) = mem_ctx(settings);
        let cat = Catalog::new(&ctx);
        for v in ["1.0.0", "2.0.0", "3.0.0"] {
            cat.add_package(&pkg("Foo", v)).await.unwrap();
        }
        let idx: CatalogIndex = ctx.store().get_json(INDEX_PATH).await.unwrap().unwrap();
        let pages: Vec<usize> = idx.items.iter().map(|i| i.page).collect();
        assert_eq!(pages, vec![0, 0, 1]);
    }

    #[tokio::test]
    async fn virtual_catalog_is_not_durable() {
        let (ctx, mem) = mem_ctx(FeedSettings::default());
        let cat = VirtualCatalog::new(&ctx);
        let p = pkg("Foo", "1.0.0");

        cat.add_package(&p).await.unwrap();
        assert!(mem.is_empty());
        assert!(!mem.exists(INDEX_PATH).await.unwrap());
        // 同一次运行中仍可解析
        let e = latest_entry(ctx.store(), &p.identity).await.unwrap().unwrap();
        assert_eq!(e.kind, CommitKind::Add);
        assert!(ctx.store().is_transient(INDEX_PATH));
    }
}
