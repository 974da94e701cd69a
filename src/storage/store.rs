use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{FeedError, Result};
use crate::storage::StorageBackend;

/// 缓存条目：`None` 表示已确认不存在（负缓存）
#[derive(Clone)]
struct CachedDoc {
    bytes: Option<Arc<Vec<u8>>>,
    /// 仅存在于缓存、从未落盘（VirtualCatalog）
    transient: bool,
}

struct StoreInner {
    backend: Arc<dyn StorageBackend>,
    cache: DashMap<String, CachedDoc>,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

/// 缓存统计
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub cached_documents: usize,
    pub transient_documents: usize,
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
}

/// 共享存储句柄：后端 + 文档缓存
///
/// - 预取（fetch 阶段）把文档读进缓存，写阶段读命中缓存
/// - `put_json` 写穿（cache + backend）
/// - `put_transient` 只进缓存，用于不落盘的索引视图
///
/// clone 共享同一份缓存；各服务只写自己的文档，不加额外的锁。
#[derive(Clone)]
pub struct FeedStore {
    inner: Arc<StoreInner>,
}

impl FeedStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                backend,
                cache: DashMap::new(),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                writes: AtomicU64::new(0),
            }),
        }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.inner.backend
    }

    fn cached(&self, path: &str) -> Option<CachedDoc> {
        // guard 不能跨 await
        self.inner.cache.get(path).map(|e| e.value().clone())
    }

    async fn load(&self, path: &str) -> Result<Option<Arc<Vec<u8>>>> {
        if let Some(doc) = self.cached(path) {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(doc.bytes);
        }
        self.inner.misses.fetch_add(1, Ordering::Relaxed);

        let bytes = self.inner.backend.read(path).await?.map(Arc::new);
        self.inner.cache.insert(
            path.to_string(),
            CachedDoc {
                bytes: bytes.clone(),
                transient: false,
            },
        );
        Ok(bytes)
    }

    /// 把给定文档读入缓存（已缓存的跳过）
    pub async fn prefetch(&self, paths: &[String]) -> Result<usize> {
        let pending: Vec<&String> = paths
            .iter()
            .filter(|p| !self.inner.cache.contains_key(p.as_str()))
            .collect();
        let results = futures::future::join_all(pending.iter().map(|p| self.load(p))).await;
        for r in results {
            r?;
        }
        Ok(pending.len())
    }

    /// 列出 prefix 下以 suffix 结尾的文档并预取（跳过包文件等大对象）
    pub async fn prefetch_prefix(&self, prefix: &str, suffix: &str) -> Result<usize> {
        let paths: Vec<String> = self
            .inner
            .backend
            .list(prefix)
            .await?
            .into_iter()
            .filter(|p| p.ends_with(suffix))
            .collect();
        self.prefetch(&paths).await
    }

    pub async fn get_bytes(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.load(path).await?.map(|b| b.as_ref().clone()))
    }

    /// 读 JSON 文档；格式损坏视为一致性错误
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.load(path).await? {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| FeedError::consistency(path, e)),
        }
    }

    pub async fn put_json<T: Serialize>(&self, path: &str, value: &T) -> Result<()> {
        let data = serde_json::to_vec_pretty(value)?;
        self.inner.backend.write(path, &data).await?;
        self.inner.writes.fetch_add(1, Ordering::Relaxed);
        self.inner.cache.insert(
            path.to_string(),
            CachedDoc {
                bytes: Some(Arc::new(data)),
                transient: false,
            },
        );
        Ok(())
    }

    /// 只写缓存，不落盘
    pub fn put_transient<T: Serialize>(&self, path: &str, value: &T) -> Result<()> {
        let data = serde_json::to_vec(value)?;
        self.inner.cache.insert(
            path.to_string(),
            CachedDoc {
                bytes: Some(Arc::new(data)),
                transient: true,
            },
        );
        Ok(())
    }

    /// 写二进制内容（包文件）；不进缓存，只记录存在
    pub async fn put_bytes(&self, path: &str, data: &[u8]) -> Result<()> {
        self.inner.backend.write(path, data).await?;
        self.inner.writes.fetch_add(1, Ordering::Relaxed);
        self.inner.cache.remove(path);
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.inner.backend.delete(path).await?;
        self.inner.writes.fetch_add(1, Ordering::Relaxed);
        self.inner.cache.insert(
            path.to_string(),
            CachedDoc {
                bytes: None,
                transient: false,
            },
        );
        Ok(())
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        if let Some(doc) = self.cached(path) {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(doc.bytes.is_some());
        }
        self.inner.backend.exists(path).await
    }

    pub fn is_transient(&self, path: &str) -> bool {
        self.cached(path).map(|d| d.transient).unwrap_or(false)
    }

    pub fn stats(&self) -> StoreStats {
        let mut cached = 0;
        let mut transient = 0;
        for e in self.inner.cache.iter() {
            if e.value().bytes.is_some() {
                cached += 1;
                if e.value().transient {
                    transient += 1;
                }
            }
        }
        StoreStats {
            cached_documents: cached,
            transient_documents: transient,
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            writes: self.inner.writes.load(Ordering::Relaxed),
        }
    }
}
