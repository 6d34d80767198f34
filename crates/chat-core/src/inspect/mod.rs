//! Artifact Inspector: structural metadata for images and CSV datasets.
//!
//! Inspection never invokes a model. URL sources are streamed through the
//! [`FetchPort`] and cut off at the configured byte limit.

pub mod csv;
pub mod image;

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use futures::StreamExt;

use chat_types::{
    artifact::{ArtifactMetadata, ArtifactSource, CsvMetadata, CsvSourceKind, ImageFormat, ImageMetadata},
    config::ArtifactConfig,
    session::Modality,
    ChatError, Result,
};

use crate::ports::FetchPort;
use self::csv::CsvScanner;

pub use self::csv::{scan_bytes, CsvShape};
pub use self::image::inspect_image;

#[derive(Clone)]
pub struct ArtifactInspector {
    fetcher: Option<Arc<dyn FetchPort>>,
    limits: ArtifactConfig,
}

impl ArtifactInspector {
    pub fn new(fetcher: Option<Arc<dyn FetchPort>>, limits: ArtifactConfig) -> Self {
        Self { fetcher, limits }
    }

    /// Inspect an artifact for a session of the given modality.
    pub async fn inspect(&self, modality: Modality, source: &ArtifactSource) -> Result<ArtifactMetadata> {
        match modality {
            Modality::Image => self.inspect_image(source).await.map(ArtifactMetadata::Image),
            Modality::Csv => self.inspect_csv(source).await.map(ArtifactMetadata::Csv),
            Modality::Text => Err(ChatError::InvalidInput(
                "text conversations do not take attachments".to_string(),
            )),
        }
    }

    pub async fn inspect_image(&self, source: &ArtifactSource) -> Result<ImageMetadata> {
        match source {
            ArtifactSource::Bytes { filename, data } => {
                self.check_size(data.len() as u64, self.limits.max_image_bytes)?;
                let mut meta = inspect_image(filename, data)?;
                meta.data_url = Some(data_url(meta.format, data));
                Ok(meta)
            }
            ArtifactSource::Url(url) => {
                let data = self.fetch_all(url, self.limits.max_image_bytes).await?;
                let mut meta = inspect_image(&filename_from_url(url, "image"), &data)?;
                meta.source = Some(url.clone());
                Ok(meta)
            }
        }
    }

    pub async fn inspect_csv(&self, source: &ArtifactSource) -> Result<CsvMetadata> {
        let (shape, source_kind, source_value) = match source {
            ArtifactSource::Bytes { filename, data } => {
                if !filename.to_ascii_lowercase().ends_with(".csv") {
                    return Err(ChatError::UnsupportedFormat(format!(
                        "{} does not have a .csv extension",
                        filename
                    )));
                }
                self.check_size(data.len() as u64, self.limits.max_csv_bytes)?;
                (scan_bytes(data)?, CsvSourceKind::File, filename.clone())
            }
            ArtifactSource::Url(url) => (self.scan_url(url).await?, CsvSourceKind::Url, url.clone()),
        };

        log::debug!(
            "CSV {} has {} rows x {} columns",
            source_value,
            shape.row_count,
            shape.column_names.len()
        );

        Ok(CsvMetadata {
            row_count: shape.row_count,
            column_count: shape.column_names.len(),
            column_names: shape.column_names,
            source_kind,
            source_value,
        })
    }

    fn check_size(&self, len: u64, limit: u64) -> Result<()> {
        if len > limit {
            return Err(ChatError::ArtifactTooLarge { limit });
        }
        Ok(())
    }

    fn fetcher(&self, url: &str) -> Result<&Arc<dyn FetchPort>> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ChatError::UnreachableSource(format!("unsupported URL: {}", url)));
        }
        self.fetcher
            .as_ref()
            .ok_or_else(|| ChatError::UnreachableSource("no fetcher configured".to_string()))
    }

    async fn fetch_all(&self, url: &str, limit: u64) -> Result<Vec<u8>> {
        let mut stream = self.fetcher(url)?.open(url).await?;
        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            self.check_size((data.len() + chunk.len()) as u64, limit)?;
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }

    async fn scan_url(&self, url: &str) -> Result<CsvShape> {
        let mut stream = self.fetcher(url)?.open(url).await?;
        let mut scanner = CsvScanner::new();
        let mut seen = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            seen += chunk.len() as u64;
            self.check_size(seen, self.limits.max_csv_bytes)?;
            scanner.feed(&chunk)?;
        }
        scanner.finish()
    }
}

/// Inline `data:` URL for an uploaded image, loadable by vision models.
fn data_url(format: ImageFormat, data: &[u8]) -> String {
    format!("data:{};base64,{}", format.mime_type(), BASE64_STANDARD.encode(data))
}

/// Last path segment of a URL without query or fragment.
fn filename_from_url(url: &str, fallback: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .next()
        .filter(|s| !s.is_empty() && !s.contains(':'))
        .unwrap_or(fallback)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::{data_url, filename_from_url};
    use chat_types::artifact::ImageFormat;

    #[test]
    fn test_filename_from_url() {
        assert_eq!(filename_from_url("https://x.io/a/cat.png?sig=1", "image"), "cat.png");
        assert_eq!(filename_from_url("https://x.io/", "image"), "image");
        assert_eq!(filename_from_url("https://x.io", "image"), "x.io");
    }

    #[test]
    fn test_data_url() {
        assert_eq!(data_url(ImageFormat::Gif, b"GIF89a"), "data:image/gif;base64,R0lGODlh");
    }
}
