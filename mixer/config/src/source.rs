use std::{io, path::PathBuf};

/// A named location from which configuration bytes are read.
#[async_trait::async_trait]
pub trait Source: Send + Sync {
    /// Describes the location for logging.
    fn name(&self) -> &str;

    async fn read(&self) -> io::Result<Vec<u8>>;
}

/// Reads configuration from a file.
#[derive(Clone, Debug)]
pub struct FileSource {
    path: PathBuf,
    name: String,
}

// === impl FileSource ===

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }
}

#[async_trait::async_trait]
impl Source for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn reads_files() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file must be created");
        file.write_all(b"rules: []\n").expect("temp file must be written");

        let source = FileSource::new(file.path());
        assert_eq!(source.name(), file.path().display().to_string());
        assert_eq!(source.read().await.expect("must read"), b"rules: []\n");

        let missing = FileSource::new(file.path().with_extension("missing"));
        let error = missing.read().await.expect_err("missing files must fail");
        assert_eq!(error.kind(), io::ErrorKind::NotFound);
    }
}
