use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{sort_versions, PackageIdentity, PackageInput, RunContext};
use crate::error::Result;
use crate::index::registrations::{self, RegistrationIndex};
use crate::index::{IndexService, ServiceKind};

pub const PATH: &str = "search/query.json";

/// 每个 id 一条摘要，由注册文档重新计算
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchEntry {
    pub id: String,
    pub latest_version: String,
    pub versions: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchIndex {
    pub total_hits: usize,
    pub data: Vec<SearchEntry>,
}

impl SearchIndex {
    pub fn get(&self, id: &str) -> Option<&SearchEntry> {
        self.data.iter().find(|e| e.id == id)
    }
}

/// latest 优先取 listed 的最高版本；全部 unlisted 时取最高版本
fn summarize(reg: &RegistrationIndex) -> Option<SearchEntry> {
    let mut versions = reg.versions();
    sort_versions(&mut versions);
    let highest = versions.last()?.clone();

    let latest_leaf = reg
        .items
        .iter()
        .filter(|l| l.listed)
        .max_by(|a, b| crate::core::compare_versions(&a.version, &b.version))
        .or_else(|| reg.items.iter().find(|l| l.version == highest))?;

    Some(SearchEntry {
        id: reg.id.clone(),
        latest_version: latest_leaf.version.clone(),
        versions,
        description: latest_leaf.description.clone(),
    })
}

pub struct Search {
    ctx: RunContext,
}

impl Search {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    pub async fn index(&self) -> Result<SearchIndex> {
        Ok(self
            .ctx
            .store()
            .get_json::<SearchIndex>(PATH)
            .await?
            .unwrap_or_default())
    }

    async fn refresh(&self, id: &str) -> Result<()> {
        let summary = registrations::load(&self.ctx, id)
            .await?
            .and_then(|r| summarize(&r));

        let mut index = self.index().await?;
        let existing = index.get(id).cloned();
        if existing == summary {
            return Ok(());
        }

        index.data.retain(|e| e.id != id);
        if let Some(entry) = summary {
            index.data.push(entry);
        }
        index.data.sort_by(|a, b| a.id.cmp(&b.id));
        index.total_hits = index.data.len();
        self.ctx.store().put_json(PATH, &index).await
    }
}

#[async_trait]
impl IndexService for Search {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Search
    }

    async fn add_package(&self, package: &PackageInput) -> Result<()> {
        self.refresh(package.identity.id()).await
    }

    async fn remove_package(&self, identity: &PackageIdentity) -> Result<()> {
        self.refresh(identity.id()).await
    }

    async fn fetch(&self) -> Result<()> {
        self.ctx.store().prefetch(&[PATH.to_string()]).await?;
        Ok(())
    }
}
