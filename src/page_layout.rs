//! Page layout – the frozen description of every page between pagination and
//! PDF rendering. Coordinates are points from the top-left page corner.
//!
//! The whole tree is serde-serialisable so a layout can be dumped, diffed and
//! fingerprinted without looking at PDF bytes.

use serde::{Deserialize, Serialize};

use crate::fonts::FontSpec;

/// A complete document layout ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLayout {
    /// Document title embedded in the PDF metadata.
    pub title: String,
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub pages: Vec<PageLayout>,
}

/// One page of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    /// 1-based page number (the value substituted for `{{page}}`).
    pub page_number: usize,
    pub boxes: Vec<LayoutBox>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub header: Vec<LayoutBox>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub footer: Vec<LayoutBox>,
}

impl PageLayout {
    pub fn new(page_number: usize) -> Self {
        Self {
            page_number,
            boxes: Vec::new(),
            header: Vec::new(),
            footer: Vec::new(),
        }
    }

    /// Every box on the page: header, body, then footer.
    pub fn all_boxes(&self) -> impl Iterator<Item = &LayoutBox> {
        self.header
            .iter()
            .chain(self.boxes.iter())
            .chain(self.footer.iter())
    }

    /// Visible text of the page, one line of output per laid-out line.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for lbox in self.all_boxes() {
            lbox.collect_text(&mut out);
        }
        out
    }
}

/// A positioned rectangle with optional content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    /// Opaque fill colour (RGB, already composited over white).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<BorderStyle>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageContent>,
    /// List bullet / number, positioned relative to the box like a text line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<TextLine>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<LayoutBox>,
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            background: None,
            border: None,
            text: None,
            image: None,
            marker: None,
            children: Vec::new(),
        }
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(text) = &self.text {
            for line in &text.lines {
                for run in &line.runs {
                    out.push_str(&run.text);
                }
                out.push('\n');
            }
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }
}

/// Per-side border widths (top, right, bottom, left) and one colour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderStyle {
    pub widths: [f32; 4],
    pub color: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub lines: Vec<TextLine>,
}

/// One laid-out line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    /// Offset of the line start from the box's left edge (alignment).
    pub x_offset: f32,
    /// Offset of the line top from the box's top edge.
    pub y_offset: f32,
    pub width: f32,
    pub height: f32,
    /// Baseline offset from the line top.
    pub baseline: f32,
    pub runs: Vec<TextRun>,
}

/// Text drawn with a single font, size and colour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    /// Offset from the line start.
    pub x: f32,
    pub width: f32,
    pub font: FontSpec,
    pub font_size: f32,
    pub color: [f32; 3],
    #[serde(default)]
    pub underline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    /// A `data:` URI or a filesystem path.
    pub src: String,
    pub width: f32,
    pub height: f32,
}

impl DocumentLayout {
    pub fn new(title: impl Into<String>, page_width_pt: f32, page_height_pt: f32) -> Self {
        Self {
            title: title.into(),
            page_width_pt,
            page_height_pt,
            pages: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Visible text of the whole document, pages in order.
    pub fn text(&self) -> String {
        self.pages.iter().map(PageLayout::text).collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
