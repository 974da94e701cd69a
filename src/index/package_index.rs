use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{sort_versions, PackageIdentity, PackageInput, RunContext};
use crate::error::Result;
use crate::index::{IndexService, ServiceKind};

pub const PATH: &str = "sleet.packageindex.json";

/// 整个 feed 的包列表：id -> 有序版本
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageIndexDoc {
    pub packages: BTreeMap<String, Vec<String>>,
}

impl PackageIndexDoc {
    pub fn version_count(&self) -> usize {
        self.packages.values().map(|v| v.len()).sum()
    }
}

pub struct PackageIndex {
    ctx: RunContext,
}

impl PackageIndex {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    pub async fn load(&self) -> Result<PackageIndexDoc> {
        Ok(self
            .ctx
            .store()
            .get_json::<PackageIndexDoc>(PATH)
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl IndexService for PackageIndex {
    fn kind(&self) -> ServiceKind {
        ServiceKind::PackageIndex
    }

    async fn add_package(&self, package: &PackageInput) -> Result<()> {
        let identity = &package.identity;
        let mut doc = self.load().await?;
        let versions = doc.packages.entry(identity.id().to_string()).or_default();
        if versions.iter().any(|v| v == identity.version()) {
            return Ok(());
        }
        versions.push(identity.version().to_string());
        sort_versions(versions);
        self.ctx.store().put_json(PATH, &doc).await
    }

    async fn remove_package(&self, identity: &PackageIdentity) -> Result<()> {
        let mut doc = self.load().await?;
        let Some(versions) = doc.packages.get_mut(identity.id()) else {
            return Ok(());
        };
        let before = versions.len();
        versions.retain(|v| v != identity.version());
        if versions.len() == before {
            return Ok(());
        }
        if versions.is_empty() {
            doc.packages.remove(identity.id());
        }
        self.ctx.store().put_json(PATH, &doc).await
    }

    async fn fetch(&self) -> Result<()> {
        self.ctx.store().prefetch(&[PATH.to_string()]).await?;
        Ok(())
    }
}
