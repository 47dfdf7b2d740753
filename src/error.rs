//! Error types.
//!
//! The invoker distinguishes two failure kinds:
//!
//! * [`InputError`] – the input document could not be read. Fatal; it is
//!   returned to the caller and never goes through the completion handler.
//! * [`ConvertError`] – the conversion itself failed (the engine rejected the
//!   document, the PDF could not be written, the render timed out). Delivered
//!   to the completion handler exactly once.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The input HTML file could not be read as UTF-8 text.
#[derive(Debug, Error)]
#[error("cannot read input '{}': {source}", .path.display())]
pub struct InputError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Invalid conversion options.
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("unknown paper format '{0}' (expected one of A3, A4, A5, Legal, Letter, Tabloid)")]
    UnknownFormat(String),

    #[error("unknown orientation '{0}' (expected portrait or landscape)")]
    UnknownOrientation(String),

    #[error("invalid length '{0}' (expected a number with an optional pt, px, in, mm or cm unit)")]
    InvalidLength(String),

    /// Only one of `width` / `height` was given.
    #[error("custom paper size needs both width and height")]
    IncompleteSize,

    #[error("page content area is empty: {width:.1} x {height:.1} pt left after borders and bands")]
    NoContentArea { width: f32, height: f32 },

    #[error("cannot read options file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid options JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures raised by the conversion engine.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A tag was opened but never closed before the end of input.
    #[error("malformed HTML: unterminated tag starting at byte {offset}")]
    Parse { offset: usize },

    #[error("malformed HTML: elements nested deeper than {limit} levels at byte {offset}")]
    NestingTooDeep { offset: usize, limit: usize },

    /// Nothing to draw: no text and no images after parsing.
    #[error("document has no renderable content")]
    EmptyDocument,

    #[error("layout failed: {0}")]
    Layout(String),

    #[error("PDF generation failed: {0}")]
    Pdf(String),

    #[error(transparent)]
    Options(#[from] OptionsError),
}

/// An `<img>` source that could not be loaded. Never fatal: the engine logs
/// it and leaves the image out.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("remote image '{0}' is not fetched")]
    Remote(String),

    #[error("unsupported data URI: {0}")]
    DataUri(&'static str),

    #[error("invalid base64 in data URI: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("cannot read image '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// A conversion that was started but did not produce an output.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("cannot write '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing to a caller-supplied writer failed.
    #[error("cannot write PDF output: {0}")]
    Stream(#[source] io::Error),

    #[error("conversion timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    /// The render worker went away without reporting a result.
    #[error("render worker exited without a result")]
    WorkerLost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_mentions_offset() {
        let err = ConvertError::from(RenderError::Parse { offset: 42 });
        assert_eq!(
            err.to_string(),
            "malformed HTML: unterminated tag starting at byte 42"
        );
    }

    #[test]
    fn timeout_reports_milliseconds() {
        let err = ConvertError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "conversion timed out after 1500 ms");
    }
}
