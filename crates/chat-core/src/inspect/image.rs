//! Image header parsing: reads dimensions and container format only.

use chat_types::{
    artifact::{ImageFormat, ImageMetadata},
    ChatError, Result,
};

/// Inspect raw image bytes. Never decodes pixel data.
pub fn inspect_image(filename: &str, data: &[u8]) -> Result<ImageMetadata> {
    if data.is_empty() {
        return Err(ChatError::UnsupportedFormat("empty image file".to_string()));
    }

    let (format, width, height) = read_dimensions(data)?;
    if width == 0 || height == 0 {
        return Err(ChatError::UnsupportedFormat(format!(
            "{} header reports zero dimension",
            format
        )));
    }

    Ok(ImageMetadata {
        filename: filename.to_string(),
        width,
        height,
        format,
        size_kb: size_kb(data.len()),
        source: None,
        data_url: None,
    })
}

fn size_kb(len: usize) -> f64 {
    (len as f64 / 1024.0 * 100.0).round() / 100.0
}

fn read_dimensions(data: &[u8]) -> Result<(ImageFormat, u32, u32)> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        return png(data).map(|(w, h)| (ImageFormat::Png, w, h));
    }
    if data.starts_with(&[0xFF, 0xD8]) {
        return jpeg(data).map(|(w, h)| (ImageFormat::Jpeg, w, h));
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return gif(data).map(|(w, h)| (ImageFormat::Gif, w, h));
    }
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return webp(data).map(|(w, h)| (ImageFormat::Webp, w, h));
    }
    if data.starts_with(b"BM") {
        return bmp(data).map(|(w, h)| (ImageFormat::Bmp, w, h));
    }
    Err(ChatError::UnsupportedFormat(
        "not a PNG, JPEG, GIF, WebP or BMP image".to_string(),
    ))
}

fn truncated(format: ImageFormat) -> ChatError {
    ChatError::UnsupportedFormat(format!("truncated {} header", format))
}

fn be_u16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

fn le_u16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn le_i32(data: &[u8], at: usize) -> Option<i32> {
    data.get(at..at + 4)
        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn le_u24(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 3)
        .map(|b| u32::from(b[0]) | u32::from(b[1]) << 8 | u32::from(b[2]) << 16)
}

fn png(data: &[u8]) -> Result<(u32, u32)> {
    // IHDR must be the first chunk
    if data.get(12..16) != Some(b"IHDR".as_slice()) {
        return Err(truncated(ImageFormat::Png));
    }
    let width = be_u32(data, 16).ok_or_else(|| truncated(ImageFormat::Png))?;
    let height = be_u32(data, 20).ok_or_else(|| truncated(ImageFormat::Png))?;
    Ok((width, height))
}

fn jpeg(data: &[u8]) -> Result<(u32, u32)> {
    let mut pos = 2;
    loop {
        // Skip fill bytes before the marker
        while data.get(pos) == Some(&0xFF) && data.get(pos + 1) == Some(&0xFF) {
            pos += 1;
        }
        if data.get(pos) != Some(&0xFF) {
            return Err(truncated(ImageFormat::Jpeg));
        }
        let marker = *data.get(pos + 1).ok_or_else(|| truncated(ImageFormat::Jpeg))?;
        pos += 2;

        match marker {
            // Standalone markers carry no length
            0x01 | 0xD0..=0xD7 => continue,
            0xD9 | 0xDA => return Err(truncated(ImageFormat::Jpeg)),
            // SOFn, excluding DHT (C4), JPG (C8) and DAC (CC)
            0xC0..=0xCF if marker != 0xC4 && marker != 0xC8 && marker != 0xCC => {
                let height = be_u16(data, pos + 3).ok_or_else(|| truncated(ImageFormat::Jpeg))?;
                let width = be_u16(data, pos + 5).ok_or_else(|| truncated(ImageFormat::Jpeg))?;
                return Ok((u32::from(width), u32::from(height)));
            }
            _ => {
                let len = be_u16(data, pos).ok_or_else(|| truncated(ImageFormat::Jpeg))?;
                if len < 2 {
                    return Err(truncated(ImageFormat::Jpeg));
                }
                pos += usize::from(len);
            }
        }
    }
}

fn gif(data: &[u8]) -> Result<(u32, u32)> {
    let width = le_u16(data, 6).ok_or_else(|| truncated(ImageFormat::Gif))?;
    let height = le_u16(data, 8).ok_or_else(|| truncated(ImageFormat::Gif))?;
    Ok((u32::from(width), u32::from(height)))
}

fn webp(data: &[u8]) -> Result<(u32, u32)> {
    let err = || truncated(ImageFormat::Webp);
    match data.get(12..16).ok_or_else(err)? {
        b"VP8 " => {
            // Frame tag (3 bytes) then start code 9d 01 2a
            if data.get(23..26) != Some([0x9D, 0x01, 0x2A].as_slice()) {
                return Err(err());
            }
            let width = le_u16(data, 26).ok_or_else(err)? & 0x3FFF;
            let height = le_u16(data, 28).ok_or_else(err)? & 0x3FFF;
            Ok((u32::from(width), u32::from(height)))
        }
        b"VP8L" => {
            if data.get(20) != Some(&0x2F) {
                return Err(err());
            }
            let b = data.get(21..25).ok_or_else(err)?;
            let (b0, b1, b2, b3) = (u32::from(b[0]), u32::from(b[1]), u32::from(b[2]), u32::from(b[3]));
            let width = 1 + (((b1 & 0x3F) << 8) | b0);
            let height = 1 + (((b3 & 0x0F) << 10) | (b2 << 2) | ((b1 & 0xC0) >> 6));
            Ok((width, height))
        }
        b"VP8X" => {
            let width = 1 + le_u24(data, 24).ok_or_else(err)?;
            let height = 1 + le_u24(data, 27).ok_or_else(err)?;
            Ok((width, height))
        }
        _ => Err(ChatError::UnsupportedFormat("unknown WebP chunk".to_string())),
    }
}

fn bmp(data: &[u8]) -> Result<(u32, u32)> {
    let width = le_i32(data, 18).ok_or_else(|| truncated(ImageFormat::Bmp))?;
    // Negative height marks a top-down bitmap
    let height = le_i32(data, 22).ok_or_else(|| truncated(ImageFormat::Bmp))?;
    Ok((width.unsigned_abs(), height.unsigned_abs()))
}
