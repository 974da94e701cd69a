use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::index::ServiceKind;

pub type Result<T> = std::result::Result<T, FeedError>;

/// 写阶段的操作类别（失败时告诉调用方是哪一类操作出错）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Add,
    AddSymbols,
    Remove,
    RemoveSymbols,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Add => write!(f, "add"),
            Operation::AddSymbols => write!(f, "add-symbols"),
            Operation::Remove => write!(f, "remove"),
            Operation::RemoveSymbols => write!(f, "remove-symbols"),
        }
    }
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Storage error at {path:?}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Inconsistent document {document}: {reason}")]
    Consistency { document: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{service} {op} failed: {source}")]
    Service {
        op: Operation,
        service: ServiceKind,
        #[source]
        source: Box<FeedError>,
    },

    #[error(transparent)]
    Fetch(#[from] FetchErrors),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FeedError {
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    pub fn consistency(document: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Consistency {
            document: document.into(),
            reason: reason.to_string(),
        }
    }

    pub fn config<E: fmt::Display>(e: E) -> Self {
        Self::Config(e.to_string())
    }

    /// 写阶段失败时出错的服务；其他错误返回 None
    pub fn failed_service(&self) -> Option<ServiceKind> {
        match self {
            FeedError::Service { service, .. } => Some(*service),
            _ => None,
        }
    }

    pub fn is_storage(&self) -> bool {
        match self {
            FeedError::Storage { .. } => true,
            FeedError::Service { source, .. } => source.is_storage(),
            _ => false,
        }
    }

    pub fn is_consistency(&self) -> bool {
        match self {
            FeedError::Consistency { .. } => true,
            FeedError::Service { source, .. } => source.is_consistency(),
            _ => false,
        }
    }
}

/// 并行预取的聚合错误：收集所有失败的服务，而不是只报第一个
#[derive(Debug, Default)]
pub struct FetchErrors {
    pub failures: Vec<(ServiceKind, FeedError)>,
}

impl FetchErrors {
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn services(&self) -> Vec<ServiceKind> {
        self.failures.iter().map(|(k, _)| *k).collect()
    }
}

impl fmt::Display for FetchErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fetch failed for {} service(s)", self.failures.len())?;
        for (kind, err) in &self.failures {
            write!(f, "; {}: {}", kind, err)?;
        }
        Ok(())
    }
}

impl std::error::Error for FetchErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_keeps_inner_kind() {
        let inner = FeedError::storage(
            "catalog/index.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let err = FeedError::Service {
            op: Operation::Add,
            service: ServiceKind::Catalog,
            source: Box::new(inner),
        };

        assert_eq!(err.failed_service(), Some(ServiceKind::Catalog));
        assert!(err.is_storage());
        assert!(!err.is_consistency());
        assert!(err.to_string().starts_with("catalog add failed"));
    }

    #[test]
    fn fetch_errors_display_lists_every_service() {
        let errs = FetchErrors {
            failures: vec![
                (ServiceKind::Search, FeedError::consistency("search/query.json", "bad json")),
                (ServiceKind::Symbols, FeedError::config("x")),
            ],
        };
        let msg = errs.to_string();
        assert!(msg.contains("2 service(s)"));
        assert!(msg.contains("search"));
        assert!(msg.contains("symbols"));
        assert_eq!(errs.services(), vec![ServiceKind::Search, ServiceKind::Symbols]);
    }
}
