use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{FeedError, Result};
use crate::storage::StorageBackend;

const TMP_SUFFIX: &str = ".tmp";

/// 本地目录存储
///
/// 写入流程（atomic replacement）：
/// 1) 写 `<target>.tmp`
/// 2) fsync(tmpfile)
/// 3) rename(tmp, target)，POSIX 保证原子
/// 4) fsync(dir)，best-effort
///
/// 崩溃时 target 要么是旧内容要么是新内容；残留的 `.tmp` 在 list 时被忽略。
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 相对路径 -> 绝对路径；拒绝绝对路径与 `..`
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let rel = Path::new(path);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || path.is_empty() {
            return Err(FeedError::storage(
                rel,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "path must be relative to the feed root",
                ),
            ));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    fn describe(&self) -> String {
        format!("local:{}", self.root.display())
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full = self.resolve(path)?;
        match fs::read(&full).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FeedError::storage(full, e)),
        }
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FeedError::storage(parent, e))?;
        }

        let mut tmp = full.clone().into_os_string();
        tmp.push(TMP_SUFFIX);
        let tmp = PathBuf::from(tmp);

        {
            let mut file = fs::File::create(&tmp)
                .await
                .map_err(|e| FeedError::storage(&tmp, e))?;
            file.write_all(data)
                .await
                .map_err(|e| FeedError::storage(&tmp, e))?;
            file.sync_all()
                .await
                .map_err(|e| FeedError::storage(&tmp, e))?;
        }

        fs::rename(&tmp, &full)
            .await
            .map_err(|e| FeedError::storage(&full, e))?;

        if let Some(parent) = full.parent() {
            if let Ok(dir) = fs::File::open(parent).await {
                let _ = dir.sync_all().await;
            }
        }

        tracing::debug!("Wrote {} ({} bytes)", path, data.len());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        match fs::remove_file(&full).await {
            Ok(()) => {
                tracing::debug!("Deleted {}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FeedError::storage(full, e)),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path)?;
        fs::try_exists(&full)
            .await
            .map_err(|e| FeedError::storage(full, e))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let start = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.resolve(prefix.trim_end_matches('/'))?
        };

        let mut out = Vec::new();

        // prefix 本身是文件
        if let Ok(md) = fs::metadata(&start).await {
            if md.is_file() {
                out.extend(relative_key(&self.root, &start));
                return Ok(out);
            }
        }

        let mut stack = vec![start];
        while let Some(dir) = stack.pop() {
            let mut rd = match fs::read_dir(&dir).await {
                Ok(rd) => rd,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(FeedError::storage(dir, e)),
            };

            while let Some(ent) = rd
                .next_entry()
                .await
                .map_err(|e| FeedError::storage(&dir, e))?
            {
                let p = ent.path();
                let ft = match ent.file_type().await {
                    Ok(ft) => ft,
                    Err(_) => continue,
                };
                if ft.is_dir() {
                    stack.push(p);
                } else if !p.to_string_lossy().ends_with(TMP_SUFFIX) {
                    if let Some(rel) = relative_key(&self.root, &p) {
                        out.push(rel);
                    }
                }
            }
        }

        out.sort();
        Ok(out)
    }
}

fn relative_key(root: &Path, p: &Path) -> Option<String> {
    let rel = p.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
