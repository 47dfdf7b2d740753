//! Image sources – `data:` URIs and files resolved against the document base
//! directory. Remote URLs are never fetched.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};

use crate::error::ResourceError;

/// Where an `<img src>` points once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// An inline `data:` URI, kept verbatim.
    Data(String),
    File(PathBuf),
}

impl ImageRef {
    /// Resolve `src` against `base` (relative paths only).
    pub fn resolve(src: &str, base: Option<&Path>) -> Result<Self, ResourceError> {
        let src = src.trim();
        if src.starts_with("data:") {
            return Ok(ImageRef::Data(src.to_string()));
        }
        if src.starts_with("http://") || src.starts_with("https://") || src.starts_with("//") {
            return Err(ResourceError::Remote(src.to_string()));
        }
        let path = Path::new(src.strip_prefix("file://").unwrap_or(src));
        Ok(ImageRef::File(match base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }))
    }

    /// Inverse of [`ImageRef::as_src`], used by the renderer.
    pub fn from_src(src: &str) -> Self {
        if src.starts_with("data:") {
            ImageRef::Data(src.to_string())
        } else {
            ImageRef::File(PathBuf::from(src))
        }
    }

    /// The form stored in the page layout.
    pub fn as_src(&self) -> String {
        match self {
            ImageRef::Data(uri) => uri.clone(),
            ImageRef::File(path) => path.to_string_lossy().into_owned(),
        }
    }

    /// Encoded image bytes.
    pub fn load(&self) -> Result<Vec<u8>, ResourceError> {
        match self {
            ImageRef::Data(uri) => decode_data_uri(uri),
            ImageRef::File(path) => fs::read(path).map_err(|source| ResourceError::Io {
                path: path.clone(),
                source,
            }),
        }
    }
}

/// Decode a `data:<mime>;base64,<data>` URI.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, ResourceError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or(ResourceError::DataUri("missing 'data:' scheme"))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or(ResourceError::DataUri("missing ',' between header and data"))?;
    if !header.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        return Err(ResourceError::DataUri("only base64 data URIs are supported"));
    }
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(BASE64_STD.decode(compact)?)
}

/// Intrinsic pixel size of encoded image bytes, read from the header
/// without decoding the pixels.
pub fn pixel_size(bytes: &[u8]) -> Result<(u32, u32), ResourceError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?;
    Ok(reader.into_dimensions()?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// PNG bytes of a `width` x `height` solid image.
    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    pub(crate) fn png_data_uri(width: u32, height: u32) -> String {
        format!(
            "data:image/png;base64,{}",
            BASE64_STD.encode(png_bytes(width, height))
        )
    }

    #[test]
    fn data_uri_round_trips_to_pixels() {
        let uri = png_data_uri(4, 3);
        let bytes = ImageRef::resolve(&uri, None).unwrap().load().unwrap();
        assert_eq!(pixel_size(&bytes).unwrap(), (4, 3));
    }

    #[test]
    fn size_comes_from_the_header() {
        assert_eq!(pixel_size(&png_bytes(640, 2)).unwrap(), (640, 2));
        assert!(matches!(
            pixel_size(b"not an image"),
            Err(ResourceError::Decode(_))
        ));
    }

    #[test]
    fn relative_paths_use_base() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("logo.png"), png_bytes(2, 2)).unwrap();

        let resolved = ImageRef::resolve("logo.png", Some(dir.path())).unwrap();
        assert_eq!(resolved, ImageRef::File(dir.path().join("logo.png")));
        assert_eq!(pixel_size(&resolved.load().unwrap()).unwrap(), (2, 2));
        assert_eq!(ImageRef::from_src(&resolved.as_src()), resolved);
    }

    #[test]
    fn remote_and_non_base64_sources_are_rejected() {
        assert!(matches!(
            ImageRef::resolve("https://example.com/a.png", None),
            Err(ResourceError::Remote(_))
        ));
        assert!(matches!(
            decode_data_uri("data:image/svg+xml,%3Csvg%3E"),
            Err(ResourceError::DataUri(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ImageRef::resolve("nope.png", Some(Path::new("/definitely/missing")))
            .unwrap()
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("/definitely/missing/nope.png"));
    }
}
