use crate::errors::ReportError;
use serde::{Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tokio::fs;

// ARTIFACT STORE

pub struct ArtifactStore {
    // Directory every artifact is written into (e.g., "./reports")
    pub base_dir: PathBuf,
}

impl ArtifactStore {
    /// **Constructor: new**
    /// Creates the output directory up front so individual writes never have to.
    pub async fn new<P: AsRef<Path>>(dir: P) -> Result<Self, ReportError> {
        let base_dir = dir.as_ref().to_path_buf();

        if !base_dir.exists() {
            fs::create_dir_all(&base_dir)
                .await
                .map_err(|source| ReportError::Write {
                    artifact: format!("output directory {}", base_dir.display()),
                    source,
                })?;
        }

        Ok(Self { base_dir })
    }

    /// Read-side handle over a directory that may not exist. Touches nothing on disk.
    pub fn at<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            base_dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.base_dir.join(file_name)
    }

    /// **Atomic Write**
    /// Writes to `<name>.tmp` first and renames it over the target, so a failed
    /// run never leaves a half-written artifact behind. Existing files are
    /// replaced in full.
    pub async fn write_bytes(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ReportError> {
        let final_path = self.path_of(file_name);
        let tmp_path = self.base_dir.join(format!("{}.tmp", file_name));

        let to_error = |source| ReportError::Write {
            artifact: file_name.to_string(),
            source,
        };

        if let Err(e) = fs::write(&tmp_path, bytes).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(to_error(e));
        }
        if let Err(e) = fs::rename(&tmp_path, &final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(to_error(e));
        }

        Ok(final_path)
    }

    /// Serializes `data` as pretty JSON and writes it atomically.
    pub async fn save_json<T: Serialize>(&self, file_name: &str, data: &T) -> Result<PathBuf, ReportError> {
        let json_bytes = serde_json::to_vec_pretty(data).map_err(|e| ReportError::Serialize {
            artifact: file_name.to_string(),
            message: e.to_string(),
        })?;
        self.write_bytes(file_name, &json_bytes).await
    }

    /// Reads a JSON artifact back into `T`.
    pub async fn load_json<T: DeserializeOwned>(&self, file_name: &str) -> anyhow::Result<T> {
        let path = self.path_of(file_name);

        // serde_json validates UTF-8 while parsing, so read raw bytes.
        let content = fs::read(&path).await?;

        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Sample {
        symbol: String,
        value: f64,
    }

    #[tokio::test]
    async fn test_creates_directory_and_round_trips_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("nested/out")).await.unwrap();
        assert!(store.base_dir.exists());

        let sample = Sample {
            symbol: "SLV".into(),
            value: 21.5,
        };
        store.save_json("sample.json", &sample).await.unwrap();
        let loaded: Sample = store.load_json("sample.json").await.unwrap();
        assert_eq!(loaded, sample);
        assert!(!store.path_of("sample.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_overwrites_in_full() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).await.unwrap();

        store.write_bytes("a.txt", b"a much longer first version").await.unwrap();
        store.write_bytes("a.txt", b"short").await.unwrap();
        let content = std::fs::read_to_string(store.path_of("a.txt")).unwrap();
        assert_eq!(content, "short");
    }

    #[tokio::test]
    async fn test_write_failure_names_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).await.unwrap();
        // A directory in the way of the rename target.
        std::fs::create_dir(store.path_of("blocked.csv")).unwrap();
        std::fs::write(store.path_of("blocked.csv").join("child"), b"x").unwrap();

        let err = store.write_bytes("blocked.csv", b"date,close\n").await.unwrap_err();
        assert!(matches!(err, ReportError::Write { ref artifact, .. } if artifact == "blocked.csv"));
        assert!(!store.path_of("blocked.csv.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_handle_does_not_create_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("never-written");
        let store = ArtifactStore::at(&missing);

        assert!(store.load_json::<Sample>("sample.json").await.is_err());
        assert!(!missing.exists());
    }
}
