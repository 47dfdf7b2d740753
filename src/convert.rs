//! The conversion invoker and the conversion handle it drives.
//!
//! A [`Conversion`] captures the HTML and options, renders on a worker
//! thread, and delivers exactly one result: the worker sends once on a
//! bounded(1) channel and the completion handler is an `FnOnce`.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use serde::Serialize;

use crate::error::{ConvertError, InputError, RenderError};
use crate::options::ConversionOptions;
use crate::pipeline::{render_document, RenderContext, RenderedPdf};

/// Stack for the render worker. Styling, layout and pagination recurse once
/// per nesting level, up to [`MAX_NESTING_DEPTH`](crate::dom::MAX_NESTING_DEPTH).
const RENDER_STACK_BYTES: usize = 32 * 1024 * 1024;

/// What a successful `to_file` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionResult {
    /// Absolute path of the written PDF.
    pub filename: PathBuf,
    pub pages: usize,
    pub size_bytes: usize,
}

impl fmt::Display for ConversionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ filename: '{}', pages: {}, size: {} }}",
            self.filename.display(),
            self.pages,
            self.size_bytes
        )
    }
}

/// A conversion that has captured its inputs but not started.
#[derive(Debug, Clone)]
pub struct Conversion {
    html: String,
    options: ConversionOptions,
}

/// A running conversion; yields its single result through [`wait`].
///
/// [`wait`]: PendingConversion::wait
pub struct PendingConversion {
    rx: Receiver<Result<RenderedPdf, RenderError>>,
    timeout: Option<Duration>,
}

impl Conversion {
    pub fn create(html: impl Into<String>, options: ConversionOptions) -> Self {
        Self {
            html: html.into(),
            options,
        }
    }

    /// Spawn the render worker.
    pub fn start(self) -> PendingConversion {
        let (tx, rx) = bounded(1);
        let timeout = self.options.timeout();
        let spawned = thread::Builder::new()
            .name("htmlpress-render".into())
            .stack_size(RENDER_STACK_BYTES)
            .spawn(move || {
                let result = self.options.page_setup().map_err(RenderError::from).and_then(|setup| {
                    render_document(&self.html, &setup, &RenderContext::from_options(&self.options))
                });
                // The receiver is gone after a timeout; nothing is waiting for us.
                let _ = tx.send(result);
            });
        // A failed spawn drops the sender, so `wait` reports `WorkerLost`.
        if let Err(err) = spawned {
            log::error!("cannot spawn render worker: {err}");
        }
        PendingConversion { rx, timeout }
    }

    /// Render and return the PDF bytes.
    pub fn to_buffer(self) -> Result<Vec<u8>, ConvertError> {
        Ok(self.start().wait()?.bytes)
    }

    /// Render and write the PDF to `w`.
    pub fn to_writer<W: Write>(self, w: &mut W) -> Result<RenderedPdf, ConvertError> {
        let pdf = self.start().wait()?;
        w.write_all(&pdf.bytes).map_err(ConvertError::Stream)?;
        w.flush().map_err(ConvertError::Stream)?;
        Ok(pdf)
    }

    /// Render, write the PDF to `path` (creating parent directories and
    /// overwriting any existing file), then call `on_complete` exactly once
    /// on the calling thread.
    pub fn to_file<F>(self, path: impl AsRef<Path>, on_complete: F)
    where
        F: FnOnce(Result<ConversionResult, ConvertError>),
    {
        let path = path.as_ref();
        let result = self
            .start()
            .wait()
            .and_then(|pdf| write_pdf(path, &pdf));
        on_complete(result);
    }
}

impl PendingConversion {
    /// Block until the worker reports, or until the timeout elapses.
    pub fn wait(self) -> Result<RenderedPdf, ConvertError> {
        let received = match self.timeout {
            Some(timeout) => self.rx.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => ConvertError::Timeout(timeout),
                RecvTimeoutError::Disconnected => ConvertError::WorkerLost,
            })?,
            None => self.rx.recv().map_err(|_| ConvertError::WorkerLost)?,
        };
        Ok(received?)
    }
}

fn write_pdf(path: &Path, pdf: &RenderedPdf) -> Result<ConversionResult, ConvertError> {
    let write_err = |source| ConvertError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, &pdf.bytes).map_err(write_err)?;
    let filename = fs::canonicalize(path).map_err(write_err)?;
    log::info!("wrote {} ({} bytes)", filename.display(), pdf.bytes.len());
    Ok(ConversionResult {
        filename,
        pages: pdf.page_count(),
        size_bytes: pdf.bytes.len(),
    })
}

/// How a conversion ended once the input was read.
#[derive(Debug)]
pub enum Outcome {
    Converted(ConversionResult),
    Failed(ConvertError),
}

impl Outcome {
    pub fn is_converted(&self) -> bool {
        matches!(self, Outcome::Converted(_))
    }
}

/// Read `input`, convert it to a PDF at `output`, and print the outcome on
/// stdout.
///
/// Only a failure to read `input` is returned as an error; conversion
/// failures are printed and reported as [`Outcome::Failed`].
pub fn convert(
    input: &Path,
    output: &Path,
    options: &ConversionOptions,
) -> Result<Outcome, InputError> {
    let html = fs::read_to_string(input).map_err(|source| InputError {
        path: input.to_path_buf(),
        source,
    })?;
    log::debug!("read {} bytes from {}", html.len(), input.display());

    let mut outcome = None;
    Conversion::create(html, options.clone()).to_file(output, |result| {
        outcome = Some(match result {
            Ok(res) => {
                println!("{res}");
                Outcome::Converted(res)
            }
            Err(err) => {
                println!("{err}");
                Outcome::Failed(err)
            }
        });
    });
    Ok(outcome.unwrap_or(Outcome::Failed(ConvertError::WorkerLost)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::PaperFormat;

    fn letter() -> ConversionOptions {
        ConversionOptions::with_format(PaperFormat::Letter)
    }

    #[test]
    fn to_buffer_produces_pdf() {
        let bytes = Conversion::create("<p>Hi</p>", letter()).to_buffer().unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn to_writer_streams_bytes() {
        let mut out = Vec::new();
        let pdf = Conversion::create("<p>Hi</p>", letter())
            .to_writer(&mut out)
            .unwrap();
        assert_eq!(out, pdf.bytes);
    }

    #[test]
    fn completion_fires_once_with_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let mut calls = Vec::new();
        Conversion::create("<div", letter()).to_file(&path, |r| calls.push(r));
        assert_eq!(calls.len(), 1);
        assert!(matches!(
            calls[0],
            Err(ConvertError::Render(RenderError::Parse { .. }))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn invalid_options_fail_the_conversion() {
        let options = ConversionOptions {
            width: Some("10in".into()),
            ..letter()
        };
        let err = Conversion::create("<p>x</p>", options).to_buffer().unwrap_err();
        assert!(matches!(err, ConvertError::Render(RenderError::Options(_))));
    }

    #[test]
    fn to_file_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/card.pdf");
        let mut result = None;
        Conversion::create("<p>Hi</p>", letter()).to_file(&path, |r| result = Some(r));
        let res = result.unwrap().unwrap();
        assert!(res.filename.is_absolute());
        assert_eq!(res.pages, 1);
        assert_eq!(fs::metadata(&path).unwrap().len() as usize, res.size_bytes);
    }

    #[test]
    fn writing_into_a_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut result = None;
        Conversion::create("<p>Hi</p>", letter()).to_file(dir.path(), |r| result = Some(r));
        assert!(matches!(result, Some(Err(ConvertError::Write { .. }))));
    }

    #[test]
    fn silent_worker_times_out() {
        let (_tx, rx) = bounded(1);
        let pending = PendingConversion {
            rx,
            timeout: Some(Duration::from_millis(20)),
        };
        assert!(matches!(
            pending.wait(),
            Err(ConvertError::Timeout(t)) if t == Duration::from_millis(20)
        ));
    }

    #[test]
    fn vanished_worker_is_reported() {
        let (tx, rx) = bounded::<Result<RenderedPdf, RenderError>>(1);
        drop(tx);
        let pending = PendingConversion { rx, timeout: None };
        assert!(matches!(pending.wait(), Err(ConvertError::WorkerLost)));
    }

    #[test]
    fn result_display_names_the_file() {
        let res = ConversionResult {
            filename: PathBuf::from("/tmp/card.pdf"),
            pages: 1,
            size_bytes: 900,
        };
        assert_eq!(res.to_string(), "{ filename: '/tmp/card.pdf', pages: 1, size: 900 }");
    }
}
