//! File context loader
//!
//! Turns caller-supplied file paths into conversation messages. Inputs
//! that cannot be loaded become per-input failures; they never abort the
//! request that referenced them.

use async_trait::async_trait;
use conclave_application::ports::context_loader::{ContextBundle, ContextFailure, ContextLoader};
use conclave_domain::Message;
use tracing::debug;

/// Per-file size cap; larger inputs are reported as failures rather than
/// silently blowing up the prompt.
const DEFAULT_MAX_BYTES: usize = 256 * 1024;

pub struct FileContextLoader {
    max_bytes: usize,
}

impl Default for FileContextLoader {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl FileContextLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    async fn load_one(&self, path: &str) -> Result<Message, ContextFailure> {
        let bytes = tokio::fs::read(path).await.map_err(|error| ContextFailure {
            path: path.to_string(),
            reason: error.to_string(),
        })?;

        if bytes.len() > self.max_bytes {
            return Err(ContextFailure {
                path: path.to_string(),
                reason: format!("exceeds context budget ({} > {} bytes)", bytes.len(), self.max_bytes),
            });
        }

        let text = String::from_utf8(bytes).map_err(|_| ContextFailure {
            path: path.to_string(),
            reason: "not valid UTF-8 text".to_string(),
        })?;

        Ok(Message::user(format!(
            "=== CONTEXT FILE: {} ===\n{}\n=== END FILE ===",
            path, text
        )))
    }
}

#[async_trait]
impl ContextLoader for FileContextLoader {
    async fn load(&self, paths: &[String]) -> ContextBundle {
        let results = futures::future::join_all(paths.iter().map(|p| self.load_one(p))).await;

        let mut bundle = ContextBundle::default();
        for result in results {
            match result {
                Ok(message) => bundle.messages.push(message),
                Err(failure) => bundle.failures.push(failure),
            }
        }
        debug!(
            "Loaded {} context files, {} failures",
            bundle.messages.len(),
            bundle.failures.len()
        );
        bundle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_readable_file_becomes_a_message() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "fn main() {{}}").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let bundle = FileContextLoader::new().load(&[path.clone()]).await;

        assert_eq!(bundle.messages.len(), 1);
        assert!(bundle.failures.is_empty());
        assert!(bundle.messages[0].content.contains(&path));
        assert!(bundle.messages[0].content.contains("fn main()"));
    }

    #[tokio::test]
    async fn test_missing_file_is_a_failure_not_an_abort() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "real content").unwrap();
        let good = file.path().to_string_lossy().to_string();

        let bundle = FileContextLoader::new()
            .load(&[good, "/no/such/file.txt".to_string()])
            .await;

        assert_eq!(bundle.messages.len(), 1);
        assert_eq!(bundle.failures.len(), 1);
        assert_eq!(bundle.failures[0].path, "/no/such/file.txt");
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![b'x'; 64]).unwrap();
        let path = file.path().to_string_lossy().to_string();

        let bundle = FileContextLoader::new().with_max_bytes(16).load(&[path]).await;

        assert!(bundle.messages.is_empty());
        assert!(bundle.failures[0].reason.contains("context budget"));
    }

    #[tokio::test]
    async fn test_binary_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xFF, 0xFE, 0x00, 0x80]).unwrap();
        let path = file.path().to_string_lossy().to_string();

        let bundle = FileContextLoader::new().load(&[path]).await;

        assert!(bundle.messages.is_empty());
        assert!(bundle.failures[0].reason.contains("UTF-8"));
    }
}
