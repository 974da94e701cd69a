pub mod local;
pub mod memory;
pub mod store;

use async_trait::async_trait;

use crate::error::Result;

/// 存储后端抽象（本地磁盘 / 内存；云 blob 可按同一契约接入）
///
/// ## 契约
/// - 路径为相对的 `/` 分隔字符串（如 `catalog/index.json`）
/// - `read` 不存在时返回 `Ok(None)`，不视为错误
/// - `delete` 对不存在的路径幂等
/// - `write` 对读者而言必须是原子替换（读不到半写文件）
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn describe(&self) -> String;

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>>;

    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    async fn delete(&self, path: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// 列出 prefix 下的全部文件（递归），按字典序
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use store::{FeedStore, StoreStats};
