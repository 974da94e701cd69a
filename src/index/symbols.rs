use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{PackageIdentity, PackageInput, RunContext};
use crate::error::Result;
use crate::index::{IndexService, ServiceKind, SymbolsCapability};

pub const INDEX_PATH: &str = "symbols/index.json";

pub fn symbols_file_path(identity: &PackageIdentity) -> String {
    format!(
        "symbols/{}/{}/{}.symbols.nupkg",
        identity.id(),
        identity.version(),
        identity.file_stem()
    )
}

/// `symbols/index.json`
/// - packages：有符号覆盖记录的普通包
/// - symbols_packages：已上传的 symbols 包
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolsIndex {
    pub packages: Vec<PackageIdentity>,
    pub symbols_packages: Vec<PackageIdentity>,
}

fn insert_sorted(list: &mut Vec<PackageIdentity>, identity: &PackageIdentity) -> bool {
    match list.binary_search(identity) {
        Ok(_) => false,
        Err(pos) => {
            list.insert(pos, identity.clone());
            true
        }
    }
}

fn remove_sorted(list: &mut Vec<PackageIdentity>, identity: &PackageIdentity) -> bool {
    match list.binary_search(identity) {
        Ok(pos) => {
            list.remove(pos);
            true
        }
        Err(_) => false,
    }
}

pub struct Symbols {
    ctx: RunContext,
}

impl Symbols {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    pub async fn load(&self) -> Result<SymbolsIndex> {
        Ok(self
            .ctx
            .store()
            .get_json::<SymbolsIndex>(INDEX_PATH)
            .await?
            .unwrap_or_default())
    }

    async fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut SymbolsIndex) -> bool + Send,
    {
        let mut index = self.load().await?;
        if f(&mut index) {
            self.ctx.store().put_json(INDEX_PATH, &index).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl IndexService for Symbols {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Symbols
    }

    async fn add_package(&self, package: &PackageInput) -> Result<()> {
        let identity = &package.identity;
        self.update(|idx| insert_sorted(&mut idx.packages, identity))
            .await
    }

    async fn remove_package(&self, identity: &PackageIdentity) -> Result<()> {
        self.update(|idx| remove_sorted(&mut idx.packages, identity))
            .await
    }

    async fn fetch(&self) -> Result<()> {
        self.ctx
            .store()
            .prefetch(&[INDEX_PATH.to_string()])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SymbolsCapability for Symbols {
    async fn add_symbols_package(&self, package: &PackageInput) -> Result<()> {
        let identity = &package.identity;
        self.ctx
            .store()
            .put_bytes(&symbols_file_path(identity), &package.content.bytes)
            .await?;
        self.update(|idx| insert_sorted(&mut idx.symbols_packages, identity))
            .await
    }

    async fn remove_symbols_package(&self, identity: &PackageIdentity) -> Result<()> {
        self.ctx.store().delete(&symbols_file_path(identity)).await?;
        self.update(|idx| remove_sorted(&mut idx.symbols_packages, identity))
            .await
    }
}
