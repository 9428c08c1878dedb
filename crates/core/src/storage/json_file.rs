use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A JSON array persisted as a single human-readable file.
///
/// Every save rewrites the whole document (write to a sibling temp file,
/// then rename). Callers serialize load/mutate/save cycles themselves.
pub struct JsonArrayFile<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonArrayFile<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Open the file, creating it as `[]` (and its parent directory) if missing
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            }
        }

        if !path.exists() {
            std::fs::write(&path, "[]")
                .with_context(|| format!("Failed to create store file {}", path.display()))?;
        }

        Ok(Self {
            path,
            _marker: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record. A blank file reads as empty.
    pub async fn load(&self) -> Result<Vec<T>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    /// Replace the file contents with `items`
    pub async fn save(&self, items: &[T]) -> Result<()> {
        let json = serde_json::to_string_pretty(items).context("Failed to serialize records")?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_empty_array() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("items.json");

        let file: JsonArrayFile<u32> = JsonArrayFile::open(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
        assert!(file.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let file: JsonArrayFile<String> =
            JsonArrayFile::open(temp_dir.path().join("items.json")).unwrap();

        file.save(&["a".to_string(), "b".to_string()]).await.unwrap();
        assert_eq!(file.load().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_blank_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("items.json");
        std::fs::write(&path, "  \n").unwrap();

        let file: JsonArrayFile<u32> = JsonArrayFile::open(&path).unwrap();
        assert!(file.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("items.json");
        std::fs::write(&path, "{not json").unwrap();

        let file: JsonArrayFile<u32> = JsonArrayFile::open(&path).unwrap();
        assert!(file.load().await.is_err());
    }
}
