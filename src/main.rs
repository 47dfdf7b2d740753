//! htmlpress – command-line HTML → PDF converter.
//!
//! With no arguments it converts `./scripts/test/businesscard.html` into
//! `./scripts/businesscard.pdf` on Letter paper.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use htmlpress::{convert, Band, Border, ConversionOptions, Orientation, Outcome, PaperFormat};

/// Convert a static HTML file into a PDF.
#[derive(Parser, Debug)]
#[command(name = "htmlpress", version, about)]
struct Cli {
    /// HTML file to convert.
    #[arg(default_value = "./scripts/test/businesscard.html")]
    input: PathBuf,

    /// Where to write the PDF (overwritten if present).
    #[arg(default_value = "./scripts/businesscard.pdf")]
    output: PathBuf,

    /// JSON options file (`format`, `border`, `header`, ... as camelCase keys).
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,

    /// Paper format: A3, A4, A5, Legal, Letter, Tabloid [default: Letter].
    #[arg(short, long)]
    format: Option<PaperFormat>,

    /// portrait or landscape.
    #[arg(long)]
    orientation: Option<Orientation>,

    /// Page border on every side, e.g. `0.5in` or `10mm`.
    #[arg(long)]
    border: Option<String>,

    /// Custom paper width; needs --height.
    #[arg(long, requires = "height")]
    width: Option<String>,

    /// Custom paper height; needs --width.
    #[arg(long, requires = "width")]
    height: Option<String>,

    /// Header band HTML (`{{page}}` and `{{pages}}` are substituted).
    #[arg(long)]
    header: Option<String>,

    /// Footer band HTML.
    #[arg(long)]
    footer: Option<String>,

    /// Directory relative image paths resolve against [default: the input's directory].
    #[arg(long)]
    base: Option<PathBuf>,

    /// PDF metadata title.
    #[arg(long)]
    title: Option<String>,

    /// Give up waiting for the render after this many milliseconds.
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Exit with a failure status when the conversion fails.
    #[arg(long)]
    strict: bool,

    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Options file (or Letter defaults) with command-line flags applied on top.
    fn conversion_options(&self) -> Result<ConversionOptions> {
        let mut options = match &self.options {
            Some(path) => ConversionOptions::from_file(path)?,
            None => ConversionOptions::with_format(PaperFormat::Letter),
        };

        if let Some(format) = self.format {
            options.format = format;
        }
        if let Some(orientation) = self.orientation {
            options.orientation = orientation;
        }
        if let Some(border) = &self.border {
            options.border = Border::Uniform(border.clone());
        }
        if self.width.is_some() {
            options.width = self.width.clone();
            options.height = self.height.clone();
        }
        if let Some(header) = &self.header {
            options.header = Some(Band::new(default_band_height(&options.header), header.clone()));
        }
        if let Some(footer) = &self.footer {
            options.footer = Some(Band::new(default_band_height(&options.footer), footer.clone()));
        }
        if self.title.is_some() {
            options.title = self.title.clone();
        }
        if self.timeout_ms.is_some() {
            options.timeout_ms = self.timeout_ms;
        }
        options.base = self
            .base
            .clone()
            .or(options.base)
            .or_else(|| self.input.parent().map(|p| p.to_path_buf()));

        // Surface bad lengths before any work starts.
        options
            .page_setup()
            .context("invalid page options")?;
        Ok(options)
    }
}

fn default_band_height(existing: &Option<Band>) -> String {
    existing
        .as_ref()
        .map(|b| b.height.clone())
        .unwrap_or_else(|| "10mm".to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let options = cli.conversion_options()?;
    log::debug!("options: {options:?}");

    match convert(&cli.input, &cli.output, &options)? {
        Outcome::Failed(err) if cli.strict => Err(anyhow::Error::new(err).context("conversion failed")),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_reproduce_the_fixed_script() {
        let cli = Cli::parse_from(["htmlpress"]);
        assert_eq!(cli.input, PathBuf::from("./scripts/test/businesscard.html"));
        assert_eq!(cli.output, PathBuf::from("./scripts/businesscard.pdf"));
        let options = cli.conversion_options().unwrap();
        assert_eq!(options.format, PaperFormat::Letter);
        assert_eq!(options.timeout_ms, None);
        assert_eq!(options.base, Some(PathBuf::from("./scripts/test")));
    }

    #[test]
    fn flags_override_options_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opts.json");
        std::fs::write(
            &path,
            r#"{"format": "A4", "border": "1in", "footer": {"height": "20mm", "contents": "x"}}"#,
        )
        .unwrap();
        let cli = Cli::parse_from([
            "htmlpress",
            "in.html",
            "out.pdf",
            "--options",
            path.to_str().unwrap(),
            "--format",
            "legal",
            "--footer",
            "{{page}}",
        ]);
        let options = cli.conversion_options().unwrap();
        assert_eq!(options.format, PaperFormat::Legal);
        assert_eq!(options.border, Border::Uniform("1in".into()));
        assert_eq!(options.footer, Some(Band::new("20mm", "{{page}}")));
    }

    #[test]
    fn unknown_format_is_a_usage_error() {
        assert!(Cli::try_parse_from(["htmlpress", "--format", "B5"]).is_err());
        assert!(Cli::try_parse_from(["htmlpress", "--width", "4in"]).is_err());
    }
}
