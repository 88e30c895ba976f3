use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use super::DocumentSource;
use crate::config::FilesystemSourceConfig;
use crate::extract::{content_type_for_extension, extract_text, MIME_TEXT};
use crate::link::FolderId;
use crate::models::Document;

/// Reads `<root>/<folder id>` from the local disk.
#[derive(Clone)]
pub struct FilesystemSource {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    follow_symlinks: bool,
}

impl FilesystemSource {
    pub fn new(config: &FilesystemSourceConfig) -> Result<Self> {
        let mut excludes = vec!["**/.git/**".to_string()];
        excludes.extend(config.exclude_globs.iter().cloned());
        Ok(Self {
            root: config.root.clone(),
            include: build_globset(&config.include_globs)?,
            exclude: build_globset(&excludes)?,
            follow_symlinks: config.follow_symlinks,
        })
    }

    /// `<root>/<id>`, which must be an existing directory inside the root.
    fn folder_dir(&self, folder: &FolderId) -> Result<PathBuf> {
        let root = self
            .root
            .canonicalize()
            .with_context(|| format!("source root {} is not accessible", self.root.display()))?;
        let dir = root.join(folder.as_str());
        let dir = dir
            .canonicalize()
            .with_context(|| format!("folder {} not found under {}", folder, root.display()))?;
        if !dir.starts_with(&root) || !dir.is_dir() {
            bail!("folder {} is not a directory under {}", folder, root.display());
        }
        Ok(dir)
    }

    fn scan(&self, dir: &Path) -> Result<Vec<Document>> {
        let mut docs = Vec::new();

        for entry in WalkDir::new(dir).follow_links(self.follow_symlinks) {
            let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let rel = path
                .strip_prefix(dir)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            if self.exclude.is_match(&rel) || !self.include.is_match(&rel) {
                continue;
            }

            match read_document(path, &rel) {
                Ok(doc) if doc.text.trim().is_empty() => {
                    tracing::debug!(file = %rel, "skipping file with no text");
                }
                Ok(doc) => docs.push(doc),
                Err(e) => {
                    let reason = format!("{:#}", e);
                    tracing::warn!(file = %rel, error = %reason, "skipping unreadable file");
                }
            }
        }

        docs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(docs)
    }
}

#[async_trait]
impl DocumentSource for FilesystemSource {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn load(&self, folder: &FolderId) -> Result<Vec<Document>> {
        let dir = self.folder_dir(folder)?;
        let this = self.clone();
        let scan_dir = dir.clone();
        let docs = tokio::task::spawn_blocking(move || this.scan(&scan_dir))
            .await
            .context("filesystem scan task failed")??;
        if docs.is_empty() {
            bail!("folder {} contains no readable documents", dir.display());
        }
        tracing::info!(folder = %folder, documents = docs.len(), "loaded folder from disk");
        Ok(docs)
    }
}

fn read_document(path: &Path, rel: &str) -> Result<Document> {
    let content_type = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(content_type_for_extension)
        .unwrap_or(MIME_TEXT);
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let text = extract_text(&bytes, content_type)?;
    let updated_at = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from);

    Ok(Document {
        name: rel.to_string(),
        uri: Some(format!("file://{}", path.display())),
        content_type: content_type.to_string(),
        updated_at,
        text,
    })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("invalid glob '{}'", pattern))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::parse_folder_link;
    use tempfile::TempDir;

    fn source(root: &Path) -> FilesystemSource {
        FilesystemSource::new(&FilesystemSourceConfig {
            root: root.to_path_buf(),
            include_globs: vec!["**/*.md".to_string(), "**/*.txt".to_string()],
            exclude_globs: vec!["**/drafts/**".to_string()],
            follow_symlinks: false,
        })
        .unwrap()
    }

    fn folder(id: &str) -> FolderId {
        parse_folder_link(&format!("https://drive.google.com/drive/folders/{}", id)).unwrap()
    }

    #[tokio::test]
    async fn loads_matching_files_sorted_by_name() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("bio101");
        std::fs::create_dir_all(dir.join("week2")).unwrap();
        std::fs::create_dir_all(dir.join("drafts")).unwrap();
        std::fs::write(dir.join("week2/cells.md"), "Cells are small.").unwrap();
        std::fs::write(dir.join("intro.txt"), "Biology studies life.").unwrap();
        std::fs::write(dir.join("drafts/wip.md"), "not ready").unwrap();
        std::fs::write(dir.join("diagram.png"), [0u8, 159, 146, 150]).unwrap();
        std::fs::write(dir.join("empty.md"), "  \n").unwrap();

        let docs = source(tmp.path()).load(&folder("bio101")).await.unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["intro.txt", "week2/cells.md"]);
        assert_eq!(docs[1].content_type, "text/markdown");
        assert!(docs[0].uri.as_deref().unwrap().starts_with("file://"));
    }

    #[tokio::test]
    async fn invalid_utf8_is_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("f1");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.txt"), [0xffu8, 0xfe, 0x00]).unwrap();
        std::fs::write(dir.join("b.txt"), "ok").unwrap();

        let docs = source(tmp.path()).load(&folder("f1")).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "ok");
    }

    #[tokio::test]
    async fn missing_folder_is_error() {
        let tmp = TempDir::new().unwrap();
        let err = source(tmp.path()).load(&folder("nope")).await.unwrap_err();
        assert!(format!("{:#}", err).contains("not found"));
    }

    #[tokio::test]
    async fn empty_folder_is_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("empty")).unwrap();
        let err = source(tmp.path()).load(&folder("empty")).await.unwrap_err();
        assert!(err.to_string().contains("no readable documents"));
    }
}
