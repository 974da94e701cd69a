use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::storage::StorageBackend;

/// 进程内存储：测试与 dry run 使用
#[derive(Default)]
pub struct MemoryStorage {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.read().keys().cloned().collect()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.files.read().get(path).cloned())
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        self.files.write().insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.files.write().remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.files.read().contains_key(path))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .files
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_by_prefix() {
        let m = MemoryStorage::new();
        m.write("a/1", b"x").await.unwrap();
        m.write("a/2", b"y").await.unwrap();
        m.write("b/1", b"z").await.unwrap();

        assert_eq!(m.list("a/").await.unwrap(), vec!["a/1", "a/2"]);
        m.delete("a/1").await.unwrap();
        m.delete("a/1").await.unwrap();
        assert_eq!(m.len(), 2);
    }
}
