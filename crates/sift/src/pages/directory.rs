// ABOUTME: PagePublisher that renders pages with the Markdown templates and writes them under a directory.
// ABOUTME: Each document id becomes a subdirectory and each page a .md file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;

use super::templates::{compose_page, TemplateKind};
use super::{PagePublisher, PublishError};
use crate::report::PageMapping;

/// Writes composed pages to `<root>/<doc_id>/<page_name>.md`.
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    root: PathBuf,
}

impl DirectoryPublisher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn page_path(&self, doc_id: &str, page_name: &str) -> PathBuf {
        self.root
            .join(file_stem(doc_id))
            .join(format!("{}.md", file_stem(page_name)))
    }
}

/// Replace path separators and other awkward characters.
fn file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        "untitled".to_string()
    } else {
        stem
    }
}

#[async_trait]
impl PagePublisher for DirectoryPublisher {
    async fn publish(
        &self,
        doc_id: &str,
        page_name: &str,
        mapping: &PageMapping,
        template: Option<TemplateKind>,
    ) -> Result<String, PublishError> {
        if mapping.is_empty() {
            return Err(PublishError::EmptyPage(page_name.to_string()));
        }

        let body = compose_page(mapping, template, Local::now().naive_local());
        let path = self.page_path(doc_id, page_name);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| PublishError::backend(page_name, e))?;
        }
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| PublishError::backend(page_name, e))?;

        Ok(path.display().to_string())
    }
}
