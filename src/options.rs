//! Conversion options – the configuration object handed to a conversion,
//! and its resolution into a concrete [`PageSetup`] in PDF points.
//!
//! Options deserialize from the JSON shape of the `html-pdf` options object
//! (`{"format": "Letter", "border": "0.5in", ...}`).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::OptionsError;

/// Points per inch.
const PT_PER_IN: f32 = 72.0;

/// Named physical paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PaperFormat {
    A3,
    #[default]
    A4,
    A5,
    Legal,
    Letter,
    Tabloid,
}

impl PaperFormat {
    pub const ALL: [PaperFormat; 6] = [
        PaperFormat::A3,
        PaperFormat::A4,
        PaperFormat::A5,
        PaperFormat::Legal,
        PaperFormat::Letter,
        PaperFormat::Tabloid,
    ];

    /// Portrait `(width, height)` in points.
    pub fn size_pt(self) -> (f32, f32) {
        match self {
            PaperFormat::A3 => (841.89, 1190.55),
            PaperFormat::A4 => (595.28, 841.89),
            PaperFormat::A5 => (419.53, 595.28),
            PaperFormat::Legal => (612.0, 1008.0),
            PaperFormat::Letter => (612.0, 792.0),
            PaperFormat::Tabloid => (792.0, 1224.0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PaperFormat::A3 => "A3",
            PaperFormat::A4 => "A4",
            PaperFormat::A5 => "A5",
            PaperFormat::Legal => "Legal",
            PaperFormat::Letter => "Letter",
            PaperFormat::Tabloid => "Tabloid",
        }
    }
}

impl FromStr for PaperFormat {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaperFormat::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| OptionsError::UnknownFormat(s.to_string()))
    }
}

impl TryFrom<String> for PaperFormat {
    type Error = OptionsError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PaperFormat> for String {
    fn from(f: PaperFormat) -> Self {
        f.name().to_string()
    }
}

impl fmt::Display for PaperFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Page orientation; landscape swaps the paper's width and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl FromStr for Orientation {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            _ => Err(OptionsError::UnknownOrientation(s.to_string())),
        }
    }
}

/// Page border (the PDF page margin), either one length for every side or
/// one per side. Missing sides are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Border {
    Uniform(String),
    Sides {
        #[serde(default)]
        top: Option<String>,
        #[serde(default)]
        right: Option<String>,
        #[serde(default)]
        bottom: Option<String>,
        #[serde(default)]
        left: Option<String>,
    },
}

impl Default for Border {
    fn default() -> Self {
        Border::Uniform("0".to_string())
    }
}

impl Border {
    /// Resolve to `[top, right, bottom, left]` in points.
    pub fn to_pt(&self) -> Result<[f32; 4], OptionsError> {
        match self {
            Border::Uniform(v) => {
                let pt = parse_length(v)?;
                Ok([pt; 4])
            }
            Border::Sides {
                top,
                right,
                bottom,
                left,
            } => {
                let side = |v: &Option<String>| v.as_deref().map(parse_length).unwrap_or(Ok(0.0));
                Ok([side(top)?, side(right)?, side(bottom)?, side(left)?])
            }
        }
    }
}

/// A header or footer band drawn inside the page border on every page.
///
/// `contents` is HTML; `{{page}}` and `{{pages}}` are replaced with the
/// current page number and the page count before the band is laid out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    #[serde(default = "Band::default_height")]
    pub height: String,
    #[serde(default)]
    pub contents: String,
}

impl Band {
    fn default_height() -> String {
        "10mm".to_string()
    }

    pub fn new(height: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            height: height.into(),
            contents: contents.into(),
        }
    }
}

/// Options for a single conversion.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversionOptions {
    pub format: PaperFormat,
    pub orientation: Orientation,
    pub border: Border,
    /// Explicit paper width; overrides `format` when `height` is set too.
    pub width: Option<String>,
    pub height: Option<String>,
    pub header: Option<Band>,
    pub footer: Option<Band>,
    /// Directory relative `<img src>` paths are resolved against.
    pub base: Option<PathBuf>,
    /// PDF metadata title; the document `<title>` is used when absent.
    pub title: Option<String>,
    /// Render timeout in milliseconds. `None` waits indefinitely.
    #[serde(rename = "timeout")]
    pub timeout_ms: Option<u64>,
}

impl ConversionOptions {
    /// Options with the given paper format and everything else defaulted.
    pub fn with_format(format: PaperFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, OptionsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, OptionsError> {
        let json = std::fs::read_to_string(path).map_err(|source| OptionsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Resolve paper size, borders and bands into points.
    pub fn page_setup(&self) -> Result<PageSetup, OptionsError> {
        let (width, height) = match (&self.width, &self.height) {
            (Some(w), Some(h)) => (parse_length(w)?, parse_length(h)?),
            (None, None) => {
                let (w, h) = self.format.size_pt();
                match self.orientation {
                    Orientation::Portrait => (w, h),
                    Orientation::Landscape => (h, w),
                }
            }
            _ => return Err(OptionsError::IncompleteSize),
        };

        let [top, right, bottom, left] = self.border.to_pt()?;
        let band_height = |band: &Option<Band>| match band {
            Some(b) => parse_length(&b.height),
            None => Ok(0.0),
        };

        let setup = PageSetup {
            width,
            height,
            margin_top: top,
            margin_right: right,
            margin_bottom: bottom,
            margin_left: left,
            header_height: band_height(&self.header)?,
            footer_height: band_height(&self.footer)?,
        };

        if setup.content_width() <= 0.0 || setup.content_height() <= 0.0 {
            return Err(OptionsError::NoContentArea {
                width: setup.content_width(),
                height: setup.content_height(),
            });
        }
        Ok(setup)
    }
}

/// Resolved page geometry in PDF points (1 pt = 1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSetup {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_right: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub header_height: f32,
    pub footer_height: f32,
}

impl PageSetup {
    /// A page of the given size with no border and no bands.
    pub fn plain(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            margin_top: 0.0,
            margin_right: 0.0,
            margin_bottom: 0.0,
            margin_left: 0.0,
            header_height: 0.0,
            footer_height: 0.0,
        }
    }

    pub fn content_width(&self) -> f32 {
        self.width - self.margin_left - self.margin_right
    }

    pub fn content_height(&self) -> f32 {
        self.height - self.margin_top - self.margin_bottom - self.header_height - self.footer_height
    }

    /// Distance from the top of the page to the top of the body content.
    pub fn content_top(&self) -> f32 {
        self.margin_top + self.header_height
    }

    /// Distance from the top of the page to the top of the footer band.
    pub fn footer_top(&self) -> f32 {
        self.height - self.margin_bottom - self.footer_height
    }
}

/// Parse a CSS-style length into points.
///
/// Accepts `pt`, `px` (96 per inch), `in`, `mm`, `cm`; a bare number is px.
pub fn parse_length(value: &str) -> Result<f32, OptionsError> {
    let v = value.trim();
    let invalid = || OptionsError::InvalidLength(value.to_string());

    let split = v
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(v.len());
    let (number, unit) = v.split_at(split);
    let n: f32 = number.trim().parse().map_err(|_| invalid())?;
    if !n.is_finite() || n < 0.0 {
        return Err(invalid());
    }

    let factor = unit_factor(unit).ok_or_else(invalid)?;
    Ok(n * factor)
}

/// Points per unit for the absolute CSS units; an empty unit means px.
pub(crate) fn unit_factor(unit: &str) -> Option<f32> {
    Some(match unit.to_ascii_lowercase().as_str() {
        "" | "px" => 0.75,
        "pt" => 1.0,
        "pc" => 12.0,
        "in" => PT_PER_IN,
        "mm" => PT_PER_IN / 25.4,
        "cm" => PT_PER_IN / 2.54,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_is_eight_and_a_half_by_eleven_inches() {
        let setup = ConversionOptions::with_format(PaperFormat::Letter)
            .page_setup()
            .unwrap();
        assert_eq!(setup.width, 612.0);
        assert_eq!(setup.height, 792.0);
    }

    #[test]
    fn landscape_swaps_dimensions() {
        let opts = ConversionOptions {
            format: PaperFormat::A4,
            orientation: Orientation::Landscape,
            ..ConversionOptions::default()
        };
        let setup = opts.page_setup().unwrap();
        assert!(setup.width > setup.height);
        assert_eq!(setup.width, 841.89);
    }

    #[test]
    fn format_tokens_are_case_insensitive() {
        assert_eq!("letter".parse::<PaperFormat>().unwrap(), PaperFormat::Letter);
        assert_eq!(" TABLOID ".parse::<PaperFormat>().unwrap(), PaperFormat::Tabloid);
        assert!(matches!(
            "B5".parse::<PaperFormat>(),
            Err(OptionsError::UnknownFormat(_))
        ));
    }

    #[test]
    fn length_units() {
        assert_eq!(parse_length("1in").unwrap(), 72.0);
        assert_eq!(parse_length("10pt").unwrap(), 10.0);
        assert_eq!(parse_length("96px").unwrap(), 72.0);
        assert_eq!(parse_length("96").unwrap(), 72.0);
        assert!((parse_length("25.4mm").unwrap() - 72.0).abs() < 1e-3);
        assert!((parse_length("2.54cm").unwrap() - 72.0).abs() < 1e-3);
        assert!(parse_length("3em").is_err());
        assert!(parse_length("-1in").is_err());
        assert!(parse_length("").is_err());
    }

    #[test]
    fn options_json_uses_library_keys() {
        let opts = ConversionOptions::from_json(
            r#"{
                "format": "Letter",
                "orientation": "landscape",
                "border": { "top": "1in", "bottom": "0.5in" },
                "footer": { "height": "20mm", "contents": "{{page}}/{{pages}}" },
                "timeout": 30000
            }"#,
        )
        .unwrap();
        assert_eq!(opts.format, PaperFormat::Letter);
        assert_eq!(opts.orientation, Orientation::Landscape);
        assert_eq!(opts.timeout(), Some(Duration::from_secs(30)));

        let setup = opts.page_setup().unwrap();
        assert_eq!(setup.margin_top, 72.0);
        assert_eq!(setup.margin_bottom, 36.0);
        assert_eq!(setup.margin_left, 0.0);
        assert!((setup.footer_height - 56.693).abs() < 0.01);
        assert!((setup.footer_top() - (612.0 - 36.0 - setup.footer_height)).abs() < 1e-3);
    }

    #[test]
    fn unknown_format_in_json_is_rejected() {
        let err = ConversionOptions::from_json(r#"{"format": "Postcard"}"#).unwrap_err();
        assert!(err.to_string().contains("Postcard"));
    }

    #[test]
    fn custom_size_overrides_format() {
        let opts = ConversionOptions {
            width: Some("3.5in".into()),
            height: Some("2in".into()),
            ..ConversionOptions::with_format(PaperFormat::Letter)
        };
        let setup = opts.page_setup().unwrap();
        assert_eq!((setup.width, setup.height), (252.0, 144.0));

        let half = ConversionOptions {
            width: Some("3.5in".into()),
            ..ConversionOptions::default()
        };
        assert!(matches!(half.page_setup(), Err(OptionsError::IncompleteSize)));
    }

    #[test]
    fn oversized_border_leaves_no_content_area() {
        let opts = ConversionOptions {
            border: Border::Uniform("5in".into()),
            ..ConversionOptions::with_format(PaperFormat::Letter)
        };
        assert!(matches!(
            opts.page_setup(),
            Err(OptionsError::NoContentArea { .. })
        ));
    }
}
