//! Pipeline – ties together parsing, styling, layout, pagination, bands and
//! rendering into a single function call.

use std::path::PathBuf;

use crate::dom::parse_document;
use crate::error::RenderError;
use crate::layout::compute_layout;
use crate::options::{ConversionOptions, PageSetup};
use crate::page_layout::{DocumentLayout, LayoutBox};
use crate::pagination::{paginate, place_boxes};
use crate::render::render_pdf;
use crate::style::{build_styled_tree, Dimension, Edges, StyledNode, Stylesheet};

/// Metadata title used when neither the options nor the document name one.
pub const DEFAULT_TITLE: &str = "htmlpress";

/// Everything besides page geometry that shapes a render.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Overrides the document's `<title>` in the PDF metadata.
    pub title: Option<String>,
    /// Directory relative image paths resolve against.
    pub base: Option<PathBuf>,
    /// Header band HTML, with `{{page}}` / `{{pages}}` placeholders.
    pub header: Option<String>,
    pub footer: Option<String>,
}

impl RenderContext {
    pub fn from_options(options: &ConversionOptions) -> Self {
        Self {
            title: options.title.clone(),
            base: options.base.clone(),
            header: options.header.as_ref().map(|b| b.contents.clone()),
            footer: options.footer.as_ref().map(|b| b.contents.clone()),
        }
    }
}

/// PDF bytes together with the layout they were drawn from.
#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub layout: DocumentLayout,
}

impl RenderedPdf {
    pub fn page_count(&self) -> usize {
        self.layout.page_count()
    }
}

/// Full pipeline: HTML string → PDF bytes plus page layout.
pub fn render_document(
    html: &str,
    setup: &PageSetup,
    ctx: &RenderContext,
) -> Result<RenderedPdf, RenderError> {
    let layout = layout_document(html, setup, ctx)?;
    let bytes = render_pdf(&layout)?;
    log::debug!("rendered {} bytes", bytes.len());
    Ok(RenderedPdf { bytes, layout })
}

/// Convenience: resolve `options` and render.
pub fn render_html(html: &str, options: &ConversionOptions) -> Result<RenderedPdf, RenderError> {
    let setup = options.page_setup()?;
    render_document(html, &setup, &RenderContext::from_options(options))
}

/// Run every stage up to pagination (no PDF rendering) – useful for testing.
pub fn layout_document(
    html: &str,
    setup: &PageSetup,
    ctx: &RenderContext,
) -> Result<DocumentLayout, RenderError> {
    // 1. Parse HTML
    let doc = parse_document(html)?;
    if !doc.has_content() {
        return Err(RenderError::EmptyDocument);
    }
    log::debug!("parsed {} top-level node(s)", doc.nodes.len());

    // 2. Build styled tree
    let sheet = Stylesheet::parse(&doc.stylesheet);
    let styled = build_styled_tree(&doc.body(), &sheet);

    // 3. Compute layout
    let boxes = compute_layout(
        &styled,
        setup.content_width(),
        setup.margin_left,
        ctx.base.as_deref(),
    )?;

    // 4. Paginate
    let pages = paginate(&boxes, setup);
    log::debug!("paginated into {} page(s)", pages.len());

    let title = ctx
        .title
        .clone()
        .or(doc.title)
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let mut layout = DocumentLayout::new(title, setup.width, setup.height);
    layout.pages = pages;

    // 5. Header / footer bands
    let total = layout.page_count();
    for page in &mut layout.pages {
        if let Some(html) = &ctx.header {
            page.header = layout_band(html, page.page_number, total, setup.margin_top, setup, ctx)?;
        }
        if let Some(html) = &ctx.footer {
            page.footer = layout_band(html, page.page_number, total, setup.footer_top(), setup, ctx)?;
        }
    }

    Ok(layout)
}

/// Replace `{{page}}` and `{{pages}}` in band HTML.
pub fn substitute_placeholders(html: &str, page: usize, pages: usize) -> String {
    html.replace("{{page}}", &page.to_string())
        .replace("{{pages}}", &pages.to_string())
}

/// Lay out one band for one page; an empty band yields no boxes.
fn layout_band(
    html: &str,
    page: usize,
    pages: usize,
    top: f32,
    setup: &PageSetup,
    ctx: &RenderContext,
) -> Result<Vec<LayoutBox>, RenderError> {
    let doc = parse_document(&substitute_placeholders(html, page, pages))?;
    if !doc.has_content() {
        return Ok(Vec::new());
    }
    let sheet = Stylesheet::parse(&doc.stylesheet);
    let mut styled = build_styled_tree(&doc.body(), &sheet);
    // Bands sit flush against the page border.
    if let StyledNode::Element { style, .. } = &mut styled {
        style.margin = Edges::uniform(Dimension::Pt(0.0));
    }
    let boxes = compute_layout(
        &styled,
        setup.content_width(),
        setup.margin_left,
        ctx.base.as_deref(),
    )?;
    Ok(place_boxes(&boxes, top))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::PaperFormat;

    fn letter() -> PageSetup {
        PageSetup::plain(612.0, 792.0)
    }

    #[test]
    fn pipeline_basic() {
        let html = "<h1>Hello</h1><p>World</p>";
        let pdf = render_document(html, &letter(), &RenderContext::default()).unwrap();
        assert_eq!(&pdf.bytes[0..5], b"%PDF-");
        assert_eq!(pdf.page_count(), 1);
        assert_eq!(pdf.layout.text(), "Hello\nWorld\n");
        assert_eq!(pdf.layout.title, DEFAULT_TITLE);
    }

    #[test]
    fn title_prefers_context_then_document() {
        let html = "<html><head><title>Card</title></head><body>x</body></html>";
        let layout = layout_document(html, &letter(), &RenderContext::default()).unwrap();
        assert_eq!(layout.title, "Card");

        let ctx = RenderContext {
            title: Some("Override".into()),
            ..Default::default()
        };
        let layout = layout_document(html, &letter(), &ctx).unwrap();
        assert_eq!(layout.title, "Override");
    }

    #[test]
    fn empty_and_malformed_documents_fail() {
        let ctx = RenderContext::default();
        assert!(matches!(
            layout_document("<html><body>  </body></html>", &letter(), &ctx),
            Err(RenderError::EmptyDocument)
        ));
        assert!(matches!(
            layout_document("<p>ok</p><div", &letter(), &ctx),
            Err(RenderError::Parse { offset: 9 })
        ));
    }

    #[test]
    fn bands_number_every_page() {
        let mut setup = letter();
        setup.margin_top = 20.0;
        setup.margin_bottom = 20.0;
        setup.header_height = 30.0;
        setup.footer_height = 30.0;
        let ctx = RenderContext {
            header: Some("<b>Report</b>".into()),
            footer: Some("Page {{page}} of {{pages}}".into()),
            ..Default::default()
        };
        let body: String = (0..60).map(|i| format!("<p>line {i}</p>")).collect();
        let layout = layout_document(&body, &setup, &ctx).unwrap();

        let total = layout.page_count();
        assert!(total > 1);
        for page in &layout.pages {
            let text = page.text();
            assert!(text.starts_with("Report\n"));
            assert!(text.ends_with(&format!("Page {} of {total}\n", page.page_number)));
            assert!((page.header[0].y - 20.0).abs() < 0.01);
            assert!((page.footer[0].y - (792.0 - 50.0)).abs() < 0.01);
        }
    }

    #[test]
    fn blank_band_is_omitted() {
        let ctx = RenderContext {
            header: Some("   ".into()),
            ..Default::default()
        };
        let layout = layout_document("<p>x</p>", &letter(), &ctx).unwrap();
        assert!(layout.pages[0].header.is_empty());
    }

    #[test]
    fn render_html_resolves_options() {
        let options = ConversionOptions::with_format(PaperFormat::Letter);
        let pdf = render_html("<p>Hi</p>", &options).unwrap();
        assert_eq!(pdf.layout.page_width_pt, 612.0);
        assert_eq!(pdf.layout.page_height_pt, 792.0);
    }

    #[test]
    fn placeholders() {
        assert_eq!(substitute_placeholders("{{page}}/{{pages}}", 2, 5), "2/5");
    }
}
