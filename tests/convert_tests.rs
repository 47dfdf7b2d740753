//! End-to-end tests for the conversion invoker: file in, PDF file out, one
//! reported outcome.

use std::fs;
use std::time::Duration;

use htmlpress::{
    convert, Conversion, ConversionOptions, ConvertError, Outcome, PaperFormat, RenderError,
};

fn letter() -> ConversionOptions {
    ConversionOptions::with_format(PaperFormat::Letter)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[test]
fn valid_input_writes_a_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("card.html");
    let output = dir.path().join("card.pdf");
    fs::write(&input, "<html><body>Hello</body></html>").unwrap();

    let result = match convert(&input, &output, &letter()).unwrap() {
        Outcome::Converted(result) => result,
        other => panic!("conversion failed: {other:?}"),
    };
    assert_eq!(result.pages, 1);
    assert_eq!(result.filename, fs::canonicalize(&output).unwrap());

    let bytes = fs::read(&output).unwrap();
    assert_eq!(&bytes[0..5], b"%PDF-");
    assert_eq!(bytes.len(), result.size_bytes);
}

#[test]
fn hello_lands_on_one_letter_page() {
    let pdf = Conversion::create("<html><body>Hello</body></html>", letter())
        .start()
        .wait()
        .unwrap();
    assert_eq!(pdf.layout.page_count(), 1);
    assert_eq!((pdf.layout.page_width_pt, pdf.layout.page_height_pt), (612.0, 792.0));
    assert_eq!(pdf.layout.text(), "Hello\n");
    assert!(contains(&pdf.bytes, b"/MediaBox[0 0 612 792]"));
}

#[test]
fn inline_siblings_keep_their_separating_space() {
    let pdf = Conversion::create("<p><b>John</b> <i>Doe</i></p>", letter())
        .start()
        .wait()
        .unwrap();
    assert_eq!(pdf.layout.text(), "John Doe\n");
}

#[test]
fn deeply_nested_markup_fails_instead_of_crashing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("deep.pdf");
    let nested = |depth: usize| format!("{}deep{}", "<div>".repeat(depth), "</div>".repeat(depth));

    let input = dir.path().join("too-deep.html");
    fs::write(&input, nested(300)).unwrap();
    let outcome = convert(&input, &output, &letter()).unwrap();
    assert!(
        matches!(
            outcome,
            Outcome::Failed(ConvertError::Render(RenderError::NestingTooDeep { limit: 256, .. }))
        ),
        "{outcome:?}"
    );
    assert!(!output.exists());

    let input = dir.path().join("deep.html");
    fs::write(&input, nested(200)).unwrap();
    assert!(convert(&input, &output, &letter()).unwrap().is_converted());
}

#[test]
fn missing_input_is_an_error_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("absent.html");
    let output = dir.path().join("out.pdf");

    let err = convert(&input, &output, &letter()).unwrap_err();
    assert_eq!(err.path, input);
    assert_eq!(err.source.kind(), std::io::ErrorKind::NotFound);
    assert!(!output.exists());
}

#[test]
fn unrenderable_input_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    for (name, html) in [
        ("unterminated.html", "<html><body><div class=\"card\""),
        ("empty.html", "<html><body>   </body></html>"),
    ] {
        let input = dir.path().join(name);
        fs::write(&input, html).unwrap();
        let outcome = convert(&input, &output, &letter()).unwrap();
        assert!(
            matches!(outcome, Outcome::Failed(ConvertError::Render(_))),
            "{name}: {outcome:?}"
        );
        assert!(!output.exists(), "{name} left an output file");
    }
}

#[test]
fn rerun_overwrites_previous_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.html");
    let output = dir.path().join("out.pdf");
    fs::write(&output, vec![b'x'; 1 << 20]).unwrap();

    fs::write(&input, "<p>first</p>").unwrap();
    assert!(convert(&input, &output, &letter()).unwrap().is_converted());
    let first = fs::read(&output).unwrap();
    assert_eq!(&first[0..5], b"%PDF-");
    assert!(first.len() < 1 << 20);

    assert!(convert(&input, &output, &letter()).unwrap().is_converted());
    assert_eq!(fs::read(&output).unwrap().len(), first.len());
}

#[test]
fn completion_handler_runs_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("once.pdf");
    let mut calls = 0;
    Conversion::create("<p>once</p>", letter()).to_file(&output, |result| {
        calls += 1;
        assert!(result.is_ok());
    });
    assert_eq!(calls, 1);
}

#[test]
fn generous_timeout_still_completes() {
    let options = ConversionOptions {
        timeout_ms: Some(60_000),
        ..letter()
    };
    assert_eq!(options.timeout(), Some(Duration::from_secs(60)));
    let bytes = Conversion::create("<p>in time</p>", options).to_buffer().unwrap();
    assert_eq!(&bytes[0..5], b"%PDF-");
}

#[test]
fn bad_options_are_reported_through_the_handler() {
    let options = ConversionOptions {
        border: htmlpress::Border::Uniform("5in".into()),
        ..letter()
    };
    let mut seen = None;
    Conversion::create("<p>x</p>", options).to_file(std::env::temp_dir().join("never.pdf"), |r| {
        seen = Some(r)
    });
    assert!(matches!(
        seen,
        Some(Err(ConvertError::Render(RenderError::Options(_))))
    ));
}
