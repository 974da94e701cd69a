use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FeedError, Result};

pub const CONFIG_FILE_NAME: &str = "flatfeed.toml";

/// feed 级配置（一次 CLI 调用内不可变）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// 本地存储根目录
    pub root: PathBuf,
    /// 写入文档中的公开 URI 前缀
    pub base_uri: String,
    /// false 时使用 VirtualCatalog（不落盘）
    pub catalog_enabled: bool,
    /// true 时 pipeline 末尾追加 Symbols 服务
    pub symbols_enabled: bool,
    pub catalog_page_size: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("feed"),
            base_uri: "https://localhost/feed/".to_string(),
            catalog_enabled: true,
            symbols_enabled: false,
            catalog_page_size: 1024,
        }
    }
}

impl FeedSettings {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let settings: FeedSettings = toml::from_str(s).map_err(FeedError::config)?;
        settings.validate()?;
        Ok(settings)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| FeedError::storage(path, e))?;
        Self::from_toml_str(&text)
    }

    /// 按优先级查找配置：显式路径 > ./flatfeed.toml > <config_dir>/flatfeed/flatfeed.toml > 默认值
    pub async fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(p) = explicit {
            return Self::load(p).await;
        }

        let mut candidates = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("flatfeed").join(CONFIG_FILE_NAME));
        }

        for candidate in candidates {
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                tracing::debug!("Loading feed settings from {:?}", candidate);
                return Self::load(&candidate).await;
            }
        }

        tracing::debug!("No settings file found, using defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_uri.trim().is_empty() {
            return Err(FeedError::config("base_uri must not be empty"));
        }
        if self.catalog_page_size == 0 {
            return Err(FeedError::config("catalog_page_size must be > 0"));
        }
        Ok(())
    }

    /// base_uri 拼接相对路径（保证只有一个 `/`）
    pub fn uri_for(&self, relative: &str) -> String {
        format!(
            "{}/{}",
            self.base_uri.trim_end_matches('/'),
            relative.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_uses_defaults() {
        let s = FeedSettings::from_toml_str("symbols_enabled = true\n").unwrap();
        assert!(s.symbols_enabled);
        assert!(s.catalog_enabled);
        assert_eq!(s.catalog_page_size, 1024);
    }

    #[test]
    fn invalid_settings_rejected() {
        let err = FeedSettings::from_toml_str("catalog_page_size = 0\n").unwrap_err();
        assert!(matches!(err, FeedError::Config(_)));

        let err = FeedSettings::from_toml_str("base_uri = \"  \"\n").unwrap_err();
        assert!(matches!(err, FeedError::Config(_)));

        let err = FeedSettings::from_toml_str("catalog_enabled = \"yes\"\n").unwrap_err();
        assert!(matches!(err, FeedError::Config(_)));
    }

    #[test]
    fn uri_join_single_slash() {
        let s = FeedSettings {
            base_uri: "https://example.org/feed/".to_string(),
            ..FeedSettings::default()
        };
        assert_eq!(
            s.uri_for("/catalog/index.json"),
            "https://example.org/feed/catalog/index.json"
        );
    }

    #[tokio::test]
    async fn explicit_missing_path_is_storage_error() {
        let err = FeedSettings::resolve(Some(Path::new("/nonexistent/flatfeed.toml")))
            .await
            .unwrap_err();
        assert!(err.is_storage());
    }
}
