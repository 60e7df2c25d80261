//! Document loaders: source file -> [`ParsedDocument`].

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use serde_json::json;

use crate::types::ParsedDocument;

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    #[cfg(feature = "pdf")]
    #[error("PDF error: {0}")]
    Pdf(String),
}

pub trait DocumentLoader: Send + Sync {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn Future<Output = Result<ParsedDocument, DocumentError>> + Send + '_>>;

    fn supported_extensions(&self) -> &[&str];
}

/// Pick a loader for a path by extension.
///
/// # Errors
///
/// Returns [`DocumentError::UnsupportedFormat`] for extensions no loader
/// claims (including `pdf` when the `pdf` feature is disabled).
pub fn loader_for(path: &Path) -> Result<Box<dyn DocumentLoader>, DocumentError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "txt" | "md" | "markdown" => Ok(Box::new(TextLoader::default())),
        #[cfg(feature = "pdf")]
        "pdf" => Ok(Box::new(PdfLoader::default())),
        other => Err(DocumentError::UnsupportedFormat(other.to_owned())),
    }
}

pub struct TextLoader {
    pub max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for TextLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn Future<Output = Result<ParsedDocument, DocumentError>> + Send + '_>> {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let path = std::fs::canonicalize(&path)?;

            let meta = tokio::fs::metadata(&path).await?;
            if meta.len() > max_size {
                return Err(DocumentError::FileTooLarge(meta.len()));
            }

            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            let content_type = match ext {
                "md" | "markdown" => "text/markdown",
                _ => "text/plain",
            };

            let text = tokio::fs::read_to_string(&path).await?;

            let metadata = HashMap::from([
                ("source".to_owned(), json!(path.display().to_string())),
                ("content_type".to_owned(), json!(content_type)),
                ("file_size".to_owned(), json!(meta.len())),
            ]);

            Ok(ParsedDocument { text, metadata })
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt", "md", "markdown"]
    }
}

#[cfg(feature = "pdf")]
pub struct PdfLoader {
    pub max_file_size: u64,
}

#[cfg(feature = "pdf")]
impl Default for PdfLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[cfg(feature = "pdf")]
impl DocumentLoader for PdfLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn Future<Output = Result<ParsedDocument, DocumentError>> + Send + '_>> {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let path = std::fs::canonicalize(&path)?;

            let meta = tokio::fs::metadata(&path).await?;
            if meta.len() > max_size {
                return Err(DocumentError::FileTooLarge(meta.len()));
            }

            let source = path.display().to_string();
            let path_buf = path.clone();
            let text = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text(&path_buf).map_err(|e| DocumentError::Pdf(e.to_string()))
            })
            .await
            .map_err(|e| DocumentError::Io(std::io::Error::other(e)))??;

            // pdf-extract separates pages with form feeds.
            let page_count = text.matches('\u{c}').count().max(1);

            let metadata = HashMap::from([
                ("source".to_owned(), json!(source)),
                ("content_type".to_owned(), json!("application/pdf")),
                ("file_size".to_owned(), json!(meta.len())),
                ("page_count".to_owned(), json!(page_count)),
            ]);

            Ok(ParsedDocument { text, metadata })
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["pdf"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        std::fs::write(&file, "hello world").unwrap();

        let doc = TextLoader::default().load(&file).await.unwrap();
        assert_eq!(doc.text, "hello world");
        assert_eq!(doc.metadata["content_type"], json!("text/plain"));
    }

    #[tokio::test]
    async fn load_markdown_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("readme.md");
        std::fs::write(&file, "# Title").unwrap();

        let doc = TextLoader::default().load(&file).await.unwrap();
        assert_eq!(doc.metadata["content_type"], json!("text/markdown"));
    }

    #[tokio::test]
    async fn load_nonexistent_file() {
        let result = TextLoader::default()
            .load(Path::new("/nonexistent/doc.txt"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn metadata_source_is_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        std::fs::write(&file, "data").unwrap();

        let doc = TextLoader::default().load(&file).await.unwrap();
        let canonical = std::fs::canonicalize(&file).unwrap();
        assert_eq!(doc.metadata["source"], json!(canonical.display().to_string()));
    }

    #[tokio::test]
    async fn file_too_large_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.txt");
        std::fs::write(&file, "x").unwrap();

        let loader = TextLoader { max_file_size: 0 };
        let result = loader.load(&file).await;
        assert!(matches!(result, Err(DocumentError::FileTooLarge(_))));
    }

    #[test]
    fn loader_for_text_extensions() {
        for name in ["a.txt", "b.md", "c.MARKDOWN"] {
            let loader = loader_for(Path::new(name)).unwrap();
            assert!(!loader.supported_extensions().is_empty());
        }
    }

    #[test]
    fn loader_for_unknown_extension() {
        let result = loader_for(Path::new("data.csv"));
        assert!(matches!(result, Err(DocumentError::UnsupportedFormat(e)) if e == "csv"));
    }

    #[cfg(not(feature = "pdf"))]
    #[test]
    fn pdf_unsupported_without_feature() {
        assert!(loader_for(Path::new("doc.pdf")).is_err());
    }
}
