use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{sort_versions, PackageIdentity, PackageInput, RunContext};
use crate::error::Result;
use crate::index::{IndexService, ServiceKind, SymbolsCapability};

pub const ROOT: &str = "flatcontainer/";

/// `flatcontainer/{id}/index.json`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionList {
    pub versions: Vec<String>,
}

pub fn versions_path(id: &str) -> String {
    format!("{}{}/index.json", ROOT, id)
}

pub fn package_path(identity: &PackageIdentity) -> String {
    format!(
        "{}{}/{}/{}.nupkg",
        ROOT,
        identity.id(),
        identity.version(),
        identity.file_stem()
    )
}

pub fn symbols_package_path(identity: &PackageIdentity) -> String {
    format!(
        "{}{}/{}/{}.symbols.nupkg",
        ROOT,
        identity.id(),
        identity.version(),
        identity.file_stem()
    )
}

/// 内容存储：原始包文件 + 每个 id 的版本列表
pub struct FlatContainer {
    ctx: RunContext,
}

impl FlatContainer {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    pub async fn versions(&self, id: &str) -> Result<Vec<String>> {
        Ok(self
            .ctx
            .store()
            .get_json::<VersionList>(&versions_path(id))
            .await?
            .unwrap_or_default()
            .versions)
    }

    async fn write_versions(&self, id: &str, versions: Vec<String>) -> Result<()> {
        let path = versions_path(id);
        if versions.is_empty() {
            self.ctx.store().delete(&path).await
        } else {
            self.ctx
                .store()
                .put_json(&path, &VersionList { versions })
                .await
        }
    }
}

#[async_trait]
impl IndexService for FlatContainer {
    fn kind(&self) -> ServiceKind {
        ServiceKind::FlatContainer
    }

    async fn add_package(&self, package: &PackageInput) -> Result<()> {
        let identity = &package.identity;
        self.ctx
            .store()
            .put_bytes(&package_path(identity), &package.content.bytes)
            .await?;

        let mut versions = self.versions(identity.id()).await?;
        if !versions.iter().any(|v| v == identity.version()) {
            versions.push(identity.version().to_string());
            sort_versions(&mut versions);
            self.write_versions(identity.id(), versions).await?;
        }
        Ok(())
    }

    async fn remove_package(&self, identity: &PackageIdentity) -> Result<()> {
        self.ctx.store().delete(&package_path(identity)).await?;

        let mut versions = self.versions(identity.id()).await?;
        let before = versions.len();
        versions.retain(|v| v != identity.version());
        if versions.len() != before {
            self.write_versions(identity.id(), versions).await?;
        }
        Ok(())
    }

    async fn fetch(&self) -> Result<()> {
        let n = self.ctx.store().prefetch_prefix(ROOT, "/index.json").await?;
        tracing::debug!("flatcontainer: prefetched {} version lists", n);
        Ok(())
    }
}

/// symbols 包与普通包并排存放，不进版本列表
#[async_trait]
impl SymbolsCapability for FlatContainer {
    async fn add_symbols_package(&self, package: &PackageInput) -> Result<()> {
        self.ctx
            .store()
            .put_bytes(&symbols_package_path(&package.identity), &package.content.bytes)
            .await
    }

    async fn remove_symbols_package(&self, identity: &PackageIdentity) -> Result<()> {
        self.ctx
            .store()
            .delete(&symbols_package_path(identity))
            .await
    }
}
