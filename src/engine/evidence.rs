// ==========================================
// 物资集散中心 - 送达凭证存储
// ==========================================
// 职责: 定义凭证上传 trait，出库单只保存返回的 URL
// 实现: LocalEvidenceStore 写入本地目录，返回 file:// URL
// ==========================================

use async_trait::async_trait;
use std::error::Error;
use std::path::{Path, PathBuf};

/// 凭证存储 Trait
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// 上传图片，返回可持久引用的 URL
    ///
    /// # 参数
    /// - `dispatch_code`: 出库单编码（用于命名）
    /// - `file_name`: 原始文件名（仅取扩展名）
    /// - `bytes`: 文件内容
    async fn upload(
        &self,
        dispatch_code: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 本地目录实现
#[derive(Debug, Clone)]
pub struct LocalEvidenceStore {
    root: PathBuf,
}

impl LocalEvidenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// 允许的图片扩展名
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "heic"];

#[async_trait]
impl EvidenceStore for LocalEvidenceStore {
    async fn upload(
        &self,
        dispatch_code: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        if bytes.is_empty() {
            return Err("凭证文件为空".into());
        }
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .filter(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
            .ok_or_else(|| format!("不支持的凭证文件类型: {}", file_name))?;

        tokio::fs::create_dir_all(&self.root).await?;
        let target = self.root.join(format!(
            "{}-{}.{}",
            dispatch_code,
            uuid::Uuid::new_v4().simple(),
            extension
        ));
        tokio::fs::write(&target, bytes).await?;

        let absolute = tokio::fs::canonicalize(&target).await?;
        tracing::debug!(path = %absolute.display(), "凭证已保存");
        Ok(format!("file://{}", absolute.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_store_writes_file_and_returns_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalEvidenceStore::new(dir.path().join("evidencias"));

        let url = store
            .upload("DES-20260601-0001", "foto.JPG", b"\xFF\xD8\xFF")
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with(".jpg"));
        assert!(url.contains("DES-20260601-0001"));

        let path = url.trim_start_matches("file://");
        assert_eq!(std::fs::read(path).unwrap(), b"\xFF\xD8\xFF");
    }

    #[tokio::test]
    async fn test_rejects_empty_or_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalEvidenceStore::new(dir.path());
        assert!(store.upload("D", "foto.jpg", b"").await.is_err());
        assert!(store.upload("D", "nota.txt", b"x").await.is_err());
    }
}
