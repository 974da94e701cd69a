use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{compare_versions, PackageIdentity, PackageInput, RunContext};
use crate::error::{FeedError, Result};
use crate::index::catalog::{self, CommitKind};
use crate::index::{IndexService, ServiceKind};

pub const ROOT: &str = "registration/";

pub fn registration_path(id: &str) -> String {
    format!("{}{}/index.json", ROOT, id)
}

/// 单个版本的注册信息；`catalog_entry` 引用本次操作 catalog 写入的详情
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistrationLeaf {
    pub version: String,
    pub catalog_entry: String,
    pub commit_id: String,
    pub listed: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// `registration/{id}/index.json`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrationIndex {
    pub id: String,
    pub items: Vec<RegistrationLeaf>,
}

impl RegistrationIndex {
    pub fn versions(&self) -> Vec<String> {
        self.items.iter().map(|l| l.version.clone()).collect()
    }
}

/// 读取某个 id 的注册文档（AutoComplete / Search 依赖）
pub async fn load(ctx: &RunContext, id: &str) -> Result<Option<RegistrationIndex>> {
    ctx.store().get_json(&registration_path(id)).await
}

pub struct Registrations {
    ctx: RunContext,
}

impl Registrations {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

#[async_trait]
impl IndexService for Registrations {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Registrations
    }

    async fn add_package(&self, package: &PackageInput) -> Result<()> {
        let identity = &package.identity;

        // catalog 排在前面，这里必须能找到本次的 add 记录
        let entry = match catalog::latest_entry(self.ctx.store(), identity).await? {
            Some(e) if e.kind == CommitKind::Add => e,
            _ => {
                return Err(FeedError::consistency(
                    catalog::INDEX_PATH,
                    format!("no catalog add entry for {}", identity),
                ))
            }
        };
        let detail = entry.detail.clone().unwrap_or_default();

        let path = registration_path(identity.id());
        let mut index = load(&self.ctx, identity.id()).await?.unwrap_or_default();
        index.id = identity.id().to_string();
        index.items.retain(|l| l.version != identity.version());
        index.items.push(RegistrationLeaf {
            version: identity.version().to_string(),
            catalog_entry: self.ctx.settings().uri_for(&detail),
            commit_id: entry.commit_id,
            listed: package.content.metadata.listed,
            description: package.content.metadata.description.clone(),
        });
        index
            .items
            .sort_by(|a, b| compare_versions(&a.version, &b.version));

        self.ctx.store().put_json(&path, &index).await
    }

    async fn remove_package(&self, identity: &PackageIdentity) -> Result<()> {
        let Some(mut index) = load(&self.ctx, identity.id()).await? else {
            return Ok(());
        };
        let before = index.items.len();
        index.items.retain(|l| l.version != identity.version());
        if index.items.len() == before {
            return Ok(());
        }

        let path = registration_path(identity.id());
        if index.items.is_empty() {
            self.ctx.store().delete(&path).await
        } else {
            self.ctx.store().put_json(&path, &index).await
        }
    }

    async fn fetch(&self) -> Result<()> {
        let n = self.ctx.store().prefetch_prefix(ROOT, "/index.json").await?;
        tracing::debug!("registrations: prefetched {} documents", n);
        Ok(())
    }
}
