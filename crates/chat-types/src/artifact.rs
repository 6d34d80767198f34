use std::fmt;

use serde::{Deserialize, Serialize};

use crate::session::Modality;

/// Structural metadata extracted once when an artifact is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ArtifactMetadata {
    Image(ImageMetadata),
    Csv(CsvMetadata),
}

impl ArtifactMetadata {
    pub fn modality(&self) -> Modality {
        match self {
            ArtifactMetadata::Image(_) => Modality::Image,
            ArtifactMetadata::Csv(_) => Modality::Csv,
        }
    }

    /// Reference stored on the first user turn (URL or filename).
    pub fn reference(&self) -> &str {
        match self {
            ArtifactMetadata::Image(img) => img.source.as_deref().unwrap_or(&img.filename),
            ArtifactMetadata::Csv(csv) => &csv.source_value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Bmp => "image/bmp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Gif => "GIF",
            ImageFormat::Webp => "WEBP",
            ImageFormat::Bmp => "BMP",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub size_kb: f64,
    /// Remote URL the image was fetched from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// `data:` URL carrying an uploaded image's bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
}

impl ImageMetadata {
    /// URL the model can load the image from: the remote source, or the
    /// inline data of an upload.
    pub fn image_url(&self) -> Option<&str> {
        self.source.as_deref().or(self.data_url.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsvSourceKind {
    Url,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvMetadata {
    pub row_count: u64,
    pub column_count: usize,
    /// Header order, duplicates preserved verbatim
    pub column_names: Vec<String>,
    pub source_kind: CsvSourceKind,
    pub source_value: String,
}

/// Raw artifact handed in by the caller before inspection.
#[derive(Debug, Clone)]
pub enum ArtifactSource {
    Bytes { filename: String, data: Vec<u8> },
    Url(String),
}

impl ArtifactSource {
    pub fn bytes(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        ArtifactSource::Bytes {
            filename: filename.into(),
            data: data.into(),
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        ArtifactSource::Url(url.into())
    }
}
