//! Filesystem-backed collaborators: a vault directory and a local asset store.
//!
//! [`FsVault`] resolves links the way note-taking vaults do: a link may be
//! relative to the linking note, relative to the vault root, or just a bare
//! file name that is unique somewhere in the vault.

use crate::collab::{AssetHandle, AssetResolver, AssetStore};
use crate::error::BoxError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;
use walkdir::WalkDir;

/// A vault rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Vault-relative path of `abs`, with `/` separators.
    fn relative(&self, abs: &Path) -> Option<String> {
        let rel = abs.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();
        Some(parts.join("/"))
    }

    async fn is_file(path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Search the vault for files named `name`; the shortest path wins.
    async fn find_by_name(&self, name: &str) -> Option<PathBuf> {
        let root = self.root.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || {
            WalkDir::new(&root)
                .follow_links(false)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .filter(|e| e.file_name().to_str() == Some(name.as_str()))
                .map(|e| e.into_path())
                .min_by_key(|p| (p.components().count(), p.clone()))
        })
        .await
        .ok()
        .flatten()
    }
}

/// Join `rel` onto `base`, refusing anything that climbs out of `base`.
fn join_within(base: &Path, rel: &str) -> Option<PathBuf> {
    let mut out = base.to_path_buf();
    for part in rel.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if !out.pop() || !out.starts_with(base) {
                    return None;
                }
            }
            p => out.push(p),
        }
    }
    Some(out)
}

#[async_trait]
impl AssetResolver for FsVault {
    async fn resolve(&self, path: &str, context_path: &str) -> Option<AssetHandle> {
        let link = path.trim().trim_start_matches('/');
        if link.is_empty() {
            return None;
        }

        let note_dir = context_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        let mut candidates = Vec::with_capacity(2);
        if !note_dir.is_empty() {
            candidates.extend(join_within(&self.root, &format!("{note_dir}/{link}")));
        }
        candidates.extend(join_within(&self.root, link));

        for candidate in candidates {
            if Self::is_file(&candidate).await {
                debug!("Resolved '{}' → {}", path, candidate.display());
                return self.relative(&candidate).map(AssetHandle::new);
            }
        }

        let name = link.rsplit('/').next().unwrap_or(link);
        let found = self.find_by_name(name).await?;
        debug!("Resolved '{}' by name → {}", path, found.display());
        self.relative(&found).map(AssetHandle::new)
    }

    async fn read_binary(&self, handle: &AssetHandle) -> Result<Vec<u8>, BoxError> {
        let abs = join_within(&self.root, &handle.path)
            .ok_or_else(|| format!("path escapes vault: {}", handle.path))?;
        Ok(tokio::fs::read(&abs).await?)
    }
}

/// Writes assets into a local directory and returns `{public_prefix}/{file}`.
///
/// Useful for "upload" mode when the HTML is published alongside an assets
/// folder. Colliding names get a numeric suffix (`pic.png`, `pic-1.png`, …).
#[derive(Debug)]
pub struct DirectoryStore {
    dir: PathBuf,
    public_prefix: String,
    taken: Mutex<HashSet<String>>,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_prefix: public_prefix.into().trim_end_matches('/').to_string(),
            taken: Mutex::new(HashSet::new()),
        }
    }

    async fn reserve(&self, name: &str) -> String {
        let (stem, ext) = match name.rsplit_once('.') {
            Some((s, e)) if !s.is_empty() => (s.to_string(), format!(".{e}")),
            _ => (name.to_string(), String::new()),
        };
        let mut taken = self.taken.lock().await;
        let mut candidate = name.to_string();
        let mut n = 1;
        loop {
            let on_disk = tokio::fs::try_exists(self.dir.join(&candidate))
                .await
                .unwrap_or(false);
            if !on_disk && !taken.contains(&candidate) {
                break;
            }
            candidate = format!("{stem}-{n}{ext}");
            n += 1;
        }
        taken.insert(candidate.clone());
        candidate
    }
}

/// Reduce an asset name to a safe single path segment.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "asset".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
impl AssetStore for DirectoryStore {
    async fn store(&self, bytes: &[u8], name: &str, mime: &str) -> Result<String, BoxError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let file = self.reserve(&sanitize_file_name(name)).await;
        tokio::fs::write(self.dir.join(&file), bytes).await?;
        debug!("Stored {} ({}, {} bytes)", file, mime, bytes.len());
        if self.public_prefix.is_empty() {
            Ok(file)
        } else {
            Ok(format!("{}/{}", self.public_prefix, file))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault_with(files: &[&str]) -> (tempfile::TempDir, FsVault) {
        let dir = tempfile::tempdir().unwrap();
        for f in files {
            let p = dir.path().join(f);
            std::fs::create_dir_all(p.parent().unwrap()).unwrap();
            std::fs::write(&p, f.as_bytes()).unwrap();
        }
        let vault = FsVault::new(dir.path());
        (dir, vault)
    }

    #[tokio::test]
    async fn resolves_relative_to_note_first() {
        let (_d, vault) = vault_with(&["notes/pic.png", "pic.png"]);
        let h = vault.resolve("pic.png", "notes/today.md").await.unwrap();
        assert_eq!(h.path, "notes/pic.png");
    }

    #[tokio::test]
    async fn resolves_from_vault_root() {
        let (_d, vault) = vault_with(&["attachments/pic.png"]);
        let h = vault
            .resolve("attachments/pic.png", "notes/today.md")
            .await
            .unwrap();
        assert_eq!(h.path, "attachments/pic.png");
    }

    #[tokio::test]
    async fn resolves_bare_name_anywhere() {
        let (_d, vault) = vault_with(&["deep/nested/a/diagram.svg"]);
        let h = vault.resolve("diagram.svg", "today.md").await.unwrap();
        assert_eq!(h.path, "deep/nested/a/diagram.svg");
        let bytes = vault.read_binary(&h).await.unwrap();
        assert_eq!(bytes, b"deep/nested/a/diagram.svg");
    }

    #[tokio::test]
    async fn missing_asset_is_none() {
        let (_d, vault) = vault_with(&["a.png"]);
        assert!(vault.resolve("b.png", "n.md").await.is_none());
    }

    #[tokio::test]
    async fn refuses_to_escape_root() {
        let (_d, vault) = vault_with(&["a.png"]);
        assert!(vault.resolve("../../etc/passwd", "n.md").await.is_none());
    }

    #[test]
    fn join_within_rejects_climbing() {
        let base = Path::new("/vault");
        assert!(join_within(base, "../x").is_none());
        assert_eq!(
            join_within(base, "a/../b.png").unwrap(),
            PathBuf::from("/vault/b.png")
        );
    }

    #[tokio::test]
    async fn directory_store_dedupes_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path(), "assets/");
        let a = store.store(b"1", "pic.png", "image/png").await.unwrap();
        let b = store.store(b"2", "pic.png", "image/png").await.unwrap();
        assert_eq!(a, "assets/pic.png");
        assert_eq!(b, "assets/pic-1.png");
        assert_eq!(std::fs::read(dir.path().join("pic-1.png")).unwrap(), b"2");
    }

    #[tokio::test]
    async fn directory_store_keeps_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pic.png"), b"old").unwrap();
        let store = DirectoryStore::new(dir.path(), "assets");
        let url = store.store(b"new", "pic.png", "image/png").await.unwrap();
        assert_eq!(url, "assets/pic-1.png");
        assert_eq!(std::fs::read(dir.path().join("pic.png")).unwrap(), b"old");
    }

    #[test]
    fn sanitize_strips_separators() {
        assert_eq!(sanitize_file_name("../my pic.png"), "-my-pic.png");
        assert_eq!(sanitize_file_name("..."), "asset");
    }
}
