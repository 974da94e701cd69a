use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// 包身份：归一化后的 id + version。删除时的查找键。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageIdentity {
    id: String,
    version: String,
}

impl PackageIdentity {
    pub fn new(id: &str, version: &str) -> Self {
        Self {
            id: normalize_id(id),
            version: normalize_version(version),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// `{id}.{version}`，各索引拼文件名用
    pub fn file_stem(&self) -> String {
        format!("{}.{}", self.id, self.version)
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// NFC + trim + 小写
pub fn normalize_id(id: &str) -> String {
    id.trim().nfc().collect::<String>().to_lowercase()
}

/// 版本归一：
/// - 去掉前导 `v` 与 `+build` 元数据
/// - 数字段去前导零，补齐到三段（`1.0` -> `1.0.0`）
/// - 第四段为 0 时省略（`1.0.0.0` -> `1.0.0`）
pub fn normalize_version(version: &str) -> String {
    let v = version.trim().to_lowercase();
    let v = v.strip_prefix('v').unwrap_or(&v);
    let v = v.split('+').next().unwrap_or_default();

    let (release, pre) = match v.split_once('-') {
        Some((r, p)) => (r, Some(p)),
        None => (v, None),
    };

    let mut parts: Vec<String> = release
        .split('.')
        .map(|p| match p.parse::<u64>() {
            Ok(n) => n.to_string(),
            Err(_) => p.to_string(),
        })
        .collect();
    while parts.len() < 3 {
        parts.push("0".to_string());
    }
    if parts.len() == 4 && parts[3] == "0" {
        parts.pop();
    }

    let mut out = parts.join(".");
    if let Some(pre) = pre.filter(|p| !p.is_empty()) {
        out.push('-');
        out.push_str(pre);
    }
    out
}

/// 语义化版本比较：数字段按数值比较，正式版 > 预发布版
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (ra, pa) = split_release(a);
    let (rb, pb) = split_release(b);

    let ord = compare_dotted(ra, rb);
    if ord != Ordering::Equal {
        return ord;
    }

    match (pa, pb) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => compare_dotted(x, y),
    }
}

/// 原地排序并去重
pub fn sort_versions(versions: &mut Vec<String>) {
    versions.sort_by(|a, b| compare_versions(a, b));
    versions.dedup();
}

fn split_release(v: &str) -> (&str, Option<&str>) {
    match v.split_once('-') {
        Some((r, p)) => (r, Some(p)),
        None => (v, None),
    }
}

fn compare_dotted(a: &str, b: &str) -> Ordering {
    let mut ia = a.split('.');
    let mut ib = b.split('.');
    loop {
        match (ia.next(), ib.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(nx), Ok(ny)) => nx.cmp(&ny),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// 包元数据（由上游 ingestion 产出，编排层不解读）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub listed: bool,
}

impl Default for PackageMetadata {
    fn default() -> Self {
        Self {
            title: None,
            description: None,
            authors: Vec::new(),
            tags: Vec::new(),
            listed: true,
        }
    }
}

/// 包内容句柄：原始字节 + 元数据
#[derive(Clone, Debug, Default)]
pub struct PackageContent {
    pub bytes: Vec<u8>,
    pub metadata: PackageMetadata,
}

impl PackageContent {
    pub fn new(bytes: Vec<u8>, metadata: PackageMetadata) -> Self {
        Self { bytes, metadata }
    }

    /// xxh3 内容哈希（十六进制）
    pub fn hash(&self) -> String {
        format!("{:016x}", xxhash_rust::xxh3::xxh3_64(&self.bytes))
    }
}

/// 一次 add 调用提交的包
#[derive(Clone, Debug)]
pub struct PackageInput {
    pub identity: PackageIdentity,
    pub is_symbols_package: bool,
    pub content: PackageContent,
}

impl PackageInput {
    pub fn new(identity: PackageIdentity, content: PackageContent) -> Self {
        Self {
            identity,
            is_symbols_package: false,
            content,
        }
    }

    pub fn symbols(identity: PackageIdentity, content: PackageContent) -> Self {
        Self {
            identity,
            is_symbols_package: true,
            content,
        }
    }
}
