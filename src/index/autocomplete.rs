use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{PackageIdentity, PackageInput, RunContext};
use crate::error::Result;
use crate::index::{registrations, IndexService, ServiceKind};

pub const PATH: &str = "autocomplete/ids.json";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoCompleteIds {
    pub ids: Vec<String>,
}

/// 包 id 自动补全列表（有序、去重）
pub struct AutoComplete {
    ctx: RunContext,
}

impl AutoComplete {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    pub async fn ids(&self) -> Result<Vec<String>> {
        Ok(self
            .ctx
            .store()
            .get_json::<AutoCompleteIds>(PATH)
            .await?
            .unwrap_or_default()
            .ids)
    }
}

#[async_trait]
impl IndexService for AutoComplete {
    fn kind(&self) -> ServiceKind {
        ServiceKind::AutoComplete
    }

    async fn add_package(&self, package: &PackageInput) -> Result<()> {
        let mut ids = self.ids().await?;
        let id = package.identity.id();
        if let Err(pos) = ids.binary_search_by(|x| x.as_str().cmp(id)) {
            ids.insert(pos, id.to_string());
            self.ctx.store().put_json(PATH, &AutoCompleteIds { ids }).await?;
        }
        Ok(())
    }

    /// 只有当 registrations 中该 id 已无任何版本时才移除
    async fn remove_package(&self, identity: &PackageIdentity) -> Result<()> {
        let still_listed = registrations::load(&self.ctx, identity.id())
            .await?
            .map(|r| !r.items.is_empty())
            .unwrap_or(false);
        if still_listed {
            return Ok(());
        }

        let mut ids = self.ids().await?;
        if let Ok(pos) = ids.binary_search_by(|x| x.as_str().cmp(identity.id())) {
            ids.remove(pos);
            self.ctx.store().put_json(PATH, &AutoCompleteIds { ids }).await?;
        }
        Ok(())
    }

    async fn fetch(&self) -> Result<()> {
        self.ctx.store().prefetch(&[PATH.to_string()]).await?;
        Ok(())
    }
}
