use std::sync::Arc;

use crate::core::settings::FeedSettings;
use crate::storage::{FeedStore, MemoryStorage};

/// 运行上下文：一次调用内共享（不拥有），编排层只读
#[derive(Clone)]
pub struct RunContext {
    settings: Arc<FeedSettings>,
    store: FeedStore,
}

impl RunContext {
    pub fn new(settings: FeedSettings, store: FeedStore) -> Self {
        Self {
            settings: Arc::new(settings),
            store,
        }
    }

    /// 纯内存上下文（dry run / 测试）
    pub fn in_memory(settings: FeedSettings) -> Self {
        Self::new(settings, FeedStore::new(Arc::new(MemoryStorage::new())))
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    pub fn catalog_enabled(&self) -> bool {
        self.settings.catalog_enabled
    }

    pub fn symbols_enabled(&self) -> bool {
        self.settings.symbols_enabled
    }

    pub fn store(&self) -> &FeedStore {
        &self.store
    }
}
