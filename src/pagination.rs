//! Pagination – splits positioned boxes into pages of the resolved content
//! area.
//!
//! Handles:
//! - page-break-before / page-break-after hints, at any depth
//! - table row splitting across pages
//! - paragraph splitting between lines
//! - containers taller than a page (their children paginate individually,
//!   their background and border are repeated as one clipped slice per page)

use crate::fonts;
use crate::layout::{BoxContent, PositionedBox};
use crate::options::PageSetup;
use crate::page_layout::{BorderStyle, ImageContent, LayoutBox, PageLayout, TextContent, TextLine, TextRun};
use crate::style::{self, ComputedStyle};

/// Slack for float rounding when checking whether a box fits.
const FIT_EPSILON: f32 = 0.01;

/// Recursively expand pure-container boxes so their children paginate
/// individually: containers taller than a page, and containers holding a
/// forced page break. Expanded containers with a background or border are
/// collected into `decorations`, outermost first.
fn flatten_for_pagination<'a>(
    boxes: &'a [PositionedBox],
    content_height: f32,
    decorations: &mut Vec<&'a PositionedBox>,
) -> Vec<&'a PositionedBox> {
    let mut result = Vec::new();
    for pbox in boxes {
        let expandable = matches!(pbox.content, BoxContent::None)
            && pbox.marker.is_none()
            && !pbox.children.is_empty();
        if expandable
            && (pbox.height > content_height
                || pbox.children.iter().any(has_forced_break))
        {
            if is_decorated(&pbox.style) {
                decorations.push(pbox);
            }
            result.extend(flatten_for_pagination(&pbox.children, content_height, decorations));
        } else {
            result.push(pbox);
        }
    }
    result
}

fn is_decorated(style: &ComputedStyle) -> bool {
    !style.background_color.is_transparent() || style.has_border()
}

fn has_forced_break(pbox: &PositionedBox) -> bool {
    pbox.style.page_break_before
        || pbox.style.page_break_after
        || pbox.children.iter().any(has_forced_break)
}

struct Paginator<'a> {
    setup: &'a PageSetup,
    /// Flattened containers whose background and border are drawn per page.
    decorations: Vec<&'a PositionedBox>,
    pages: Vec<PageLayout>,
    current: PageLayout,
    /// Document-space y at which the current page begins.
    page_start: f32,
}

impl<'a> Paginator<'a> {
    fn new(setup: &'a PageSetup, decorations: Vec<&'a PositionedBox>) -> Self {
        Self {
            setup,
            decorations,
            pages: Vec::new(),
            current: PageLayout::new(1),
            page_start: 0.0,
        }
    }

    fn new_page(&mut self, doc_y: f32) {
        self.decorate(doc_y);
        let next = PageLayout::new(self.pages.len() + 2);
        self.pages.push(std::mem::replace(&mut self.current, next));
        self.page_start = doc_y;
    }

    /// Put the slices of flattened containers visible on the current page
    /// underneath its content. `break_y` is where the next page begins.
    fn decorate(&mut self, break_y: f32) {
        let page_bottom = self.page_start + self.setup.content_height();
        let slices: Vec<LayoutBox> = self
            .decorations
            .iter()
            .filter_map(|container| {
                decoration_slice(container, self.page_start, break_y, page_bottom)
                    .map(|mut slice| {
                        slice.y = self.page_top(slice.y);
                        slice
                    })
            })
            .collect();
        self.current.boxes.splice(0..0, slices);
    }

    fn y_on_page(&self, doc_y: f32) -> f32 {
        (doc_y - self.page_start).max(0.0)
    }

    fn fits(&self, doc_y: f32, height: f32) -> bool {
        self.y_on_page(doc_y) + height <= self.setup.content_height() + FIT_EPSILON
    }

    fn page_top(&self, doc_y: f32) -> f32 {
        self.setup.content_top() + self.y_on_page(doc_y)
    }

    fn place(&mut self, pbox: &PositionedBox) {
        let lbox = build_layout_box(pbox, self.page_top(pbox.y));
        self.current.boxes.push(lbox);
    }

    fn add(&mut self, pbox: &PositionedBox) {
        if pbox.style.page_break_before && !self.current.boxes.is_empty() {
            self.new_page(pbox.y);
        }

        let overflows = !self.fits(pbox.y, pbox.height);
        let splittable = overflows && !pbox.style.page_break_inside_avoid;
        match &pbox.content {
            BoxContent::Text { lines, align } if splittable && lines.len() > 1 => {
                self.split_text(pbox, lines, *align)
            }
            BoxContent::None if splittable && is_table_like(pbox) => self.split_rows(pbox),
            _ => {
                if overflows && !self.current.boxes.is_empty() {
                    self.new_page(pbox.y);
                }
                self.place(pbox);
            }
        }

        if pbox.style.page_break_after {
            self.new_page(pbox.y + pbox.height);
        }
    }

    fn split_rows(&mut self, table: &PositionedBox) {
        for row in &table.children {
            if !self.fits(row.y, row.height) && !self.current.boxes.is_empty() {
                self.new_page(row.y);
            }
            self.place(row);
        }
    }

    /// Place as many lines as fit, continue the rest on following pages.
    fn split_text(&mut self, pbox: &PositionedBox, lines: &[TextLine], align: style::TextAlign) {
        let mut start = 0;
        while start < lines.len() {
            let first_y = pbox.y + lines[start].y_offset;
            if !self.fits(first_y, lines[start].height) && !self.current.boxes.is_empty() {
                self.new_page(first_y);
            }
            let span = |end: usize| {
                lines[end - 1].y_offset + lines[end - 1].height - lines[start].y_offset
            };
            let mut end = start + 1;
            while end < lines.len() && self.fits(first_y, span(end + 1)) {
                end += 1;
            }

            let mut part = LayoutBox::new(pbox.x, self.page_top(first_y), pbox.width, span(end));
            part.text = Some(TextContent {
                lines: lines[start..end]
                    .iter()
                    .map(|line| TextLine {
                        y_offset: line.y_offset - lines[start].y_offset,
                        ..aligned(line, pbox.width, align)
                    })
                    .collect(),
            });
            self.current.boxes.push(part);

            start = end;
            if start < lines.len() {
                self.new_page(pbox.y + lines[start].y_offset);
            }
        }
    }

    fn finish(mut self) -> Vec<PageLayout> {
        if !self.current.boxes.is_empty() || self.pages.is_empty() {
            self.decorate(f32::INFINITY);
            self.pages.push(self.current);
        }
        self.pages
    }
}

/// The part of `container` on the page spanning document y from
/// `page_start`, with y still in document space. A container that goes on
/// past `break_y` is drawn down to `page_bottom` and loses its bottom
/// border; one that began on an earlier page loses its top border.
fn decoration_slice(
    container: &PositionedBox,
    page_start: f32,
    break_y: f32,
    page_bottom: f32,
) -> Option<LayoutBox> {
    let end = container.y + container.height;
    if container.y >= break_y || end <= page_start {
        return None;
    }
    let top = container.y.max(page_start);
    let continues = end > break_y;
    let bottom = if continues { page_bottom } else { end.min(page_bottom) };
    if bottom <= top {
        return None;
    }

    let mut slice = LayoutBox::new(container.x, top, container.width, bottom - top);
    decorate_box(&mut slice, &container.style);
    if let Some(border) = &mut slice.border {
        if top > container.y {
            border.widths[0] = 0.0;
        }
        if continues {
            border.widths[2] = 0.0;
        }
    }
    Some(slice)
}

/// Split laid-out boxes into pages. At least one page is always returned.
pub fn paginate(boxes: &[PositionedBox], setup: &PageSetup) -> Vec<PageLayout> {
    let mut decorations = Vec::new();
    let flat = flatten_for_pagination(boxes, setup.content_height(), &mut decorations);
    let mut paginator = Paginator::new(setup, decorations);
    for pbox in flat {
        paginator.add(pbox);
    }
    paginator.finish()
}

/// Convert boxes laid out from document y = 0 without paginating, shifted
/// down to `top` (header and footer bands).
pub fn place_boxes(boxes: &[PositionedBox], top: f32) -> Vec<LayoutBox> {
    boxes
        .iter()
        .map(|pbox| build_layout_box(pbox, top + pbox.y))
        .collect()
}

fn is_table_like(pbox: &PositionedBox) -> bool {
    pbox.style.display == style::Display::Table && !pbox.children.is_empty()
}

fn aligned(line: &TextLine, box_width: f32, align: style::TextAlign) -> TextLine {
    let factor = match align {
        style::TextAlign::Left => 0.0,
        style::TextAlign::Center => 0.5,
        style::TextAlign::Right => 1.0,
    };
    TextLine {
        x_offset: ((box_width - line.width) * factor).max(0.0),
        ..line.clone()
    }
}

fn rgb(c: &style::Color) -> [f32; 3] {
    let c = c.over_white();
    [c.r, c.g, c.b]
}

/// Bullet or number drawn in the gutter left of a list item.
fn marker_line(marker: &str, style: &ComputedStyle) -> TextLine {
    let font = fonts::FontSpec {
        bold: false,
        italic: false,
        ..style.font()
    };
    let size = style.font_size;
    let width = fonts::text_width(marker, font, size);
    let height = size * style.line_height;
    TextLine {
        x_offset: -(width + size * 0.5),
        y_offset: 0.0,
        width,
        height,
        baseline: (height - size) / 2.0 + size * fonts::ascent_ratio(font.family),
        runs: vec![TextRun {
            text: marker.to_string(),
            x: 0.0,
            width,
            font,
            font_size: size,
            color: rgb(&style.color),
            underline: false,
        }],
    }
}

fn decorate_box(lb: &mut LayoutBox, style: &ComputedStyle) {
    if !style.background_color.is_transparent() {
        lb.background = Some(rgb(&style.background_color));
    }
    if style.has_border() {
        let b = &style.border_width;
        lb.border = Some(BorderStyle {
            widths: [b.top, b.right, b.bottom, b.left],
            color: rgb(&style.border_color),
        });
    }
}

/// Recursively build a LayoutBox tree with page-absolute coordinates; `top`
/// is the page y of `pbox`. Children keep their offset within the parent.
fn build_layout_box(pbox: &PositionedBox, top: f32) -> LayoutBox {
    let style = &pbox.style;
    let mut lb = LayoutBox::new(pbox.x, top, pbox.width, pbox.height);
    decorate_box(&mut lb, style);

    match &pbox.content {
        BoxContent::Text { lines, align } => {
            lb.text = Some(TextContent {
                lines: lines
                    .iter()
                    .map(|line| aligned(line, pbox.width, *align))
                    .collect(),
            });
        }
        BoxContent::Image { src } => {
            lb.image = Some(ImageContent {
                src: src.clone(),
                width: pbox.width,
                height: pbox.height,
            });
        }
        BoxContent::None => {}
    }
    if let Some(marker) = &pbox.marker {
        lb.marker = Some(marker_line(marker, style));
    }

    lb.children = pbox
        .children
        .iter()
        .map(|child| build_layout_box(child, top + (child.y - pbox.y)))
        .collect();
    lb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_document;
    use crate::layout::compute_layout;
    use crate::style::{build_styled_tree, Stylesheet};

    fn setup() -> PageSetup {
        PageSetup {
            margin_top: 36.0,
            margin_right: 36.0,
            margin_bottom: 36.0,
            margin_left: 36.0,
            ..PageSetup::plain(612.0, 792.0)
        }
    }

    fn pages_for(html: &str) -> Vec<PageLayout> {
        let setup = setup();
        let doc = parse_document(html).unwrap();
        let tree = build_styled_tree(&doc.body(), &Stylesheet::parse(&doc.stylesheet));
        let boxes =
            compute_layout(&tree, setup.content_width(), setup.margin_left, None).unwrap();
        paginate(&boxes, &setup)
    }

    fn line_count(pages: &[PageLayout]) -> usize {
        pages.iter().map(|p| p.text().lines().count()).sum()
    }

    #[test]
    fn single_page_starts_inside_the_border() {
        let pages = pages_for("<p>Short text</p>");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_number, 1);
        let body = &pages[0].boxes[0];
        // page border + body margin
        assert!((body.y - 42.0).abs() < 0.01);
        assert!((body.x - 42.0).abs() < 0.01);
    }

    #[test]
    fn multiple_pages_stay_inside_content_area() {
        let html: String = (0..80)
            .map(|i| format!("<p>Paragraph {i} with some text</p>"))
            .collect();
        let pages = pages_for(&html);
        assert!(pages.len() > 1, "expected several pages, got {}", pages.len());
        for (i, page) in pages.iter().enumerate() {
            assert_eq!(page.page_number, i + 1);
            for b in &page.boxes {
                assert!(b.y >= 36.0 - 0.01);
                assert!(b.y + b.height <= 792.0 - 36.0 + 0.02, "box overflows page {i}");
            }
        }
        assert_eq!(line_count(&pages), 80);
    }

    #[test]
    fn forced_breaks_inside_a_small_body() {
        let pages = pages_for(
            r#"<div>One</div><div style="page-break-before: always">Two</div>
               <div style="break-after: page">Three</div>"#,
        );
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].text(), "One\n");
        assert_eq!(pages[1].text(), "Two\nThree\n");
    }

    #[test]
    fn long_paragraph_splits_between_lines() {
        let words = "lorem ipsum dolor sit amet ".repeat(600);
        let pages = pages_for(&format!("<p>{words}</p>"));
        assert!(pages.len() > 1);
        let total: usize = pages.iter().map(|p| p.text().split_whitespace().count()).sum();
        assert_eq!(total, 3000);
        // Continuation starts at the top of the content area.
        let first = &pages[1].boxes[0];
        assert!((first.y - 36.0).abs() < 0.01);
    }

    #[test]
    fn tables_split_by_rows() {
        let rows: String = (0..90)
            .map(|i| format!("<tr><td>row {i}</td><td>{}</td></tr>", i * 2))
            .collect();
        let pages = pages_for(&format!("<table>{rows}</table>"));
        assert!(pages.len() > 1);
        assert_eq!(line_count(&pages), 180);
    }

    #[test]
    fn empty_input_still_has_one_page() {
        let pages = paginate(&[], &setup());
        assert_eq!(pages.len(), 1);
        assert!(pages[0].boxes.is_empty());
    }

    #[test]
    fn centered_text_is_offset() {
        let pages = pages_for(r#"<p style="text-align:center">Hi</p>"#);
        let body = &pages[0].boxes[0];
        let para = &body.children[0];
        let leaf = &para.children[0];
        let line = &leaf.text.as_ref().unwrap().lines[0];
        let expected = (leaf.width - line.width) / 2.0;
        assert!((line.x_offset - expected).abs() < 0.01);
        assert!(line.x_offset > 100.0);
    }

    #[test]
    fn tall_bordered_container_is_drawn_on_every_page() {
        let paragraphs: String = (0..80)
            .map(|i| format!("<p>Paragraph {i} with some text</p>"))
            .collect();
        let pages = pages_for(&format!(
            r#"<div style="border:2px solid #000;background:#eee">{paragraphs}</div>"#
        ));
        assert!(pages.len() > 1, "expected several pages, got {}", pages.len());
        assert_eq!(line_count(&pages), 80);

        let last = pages.len() - 1;
        for (i, page) in pages.iter().enumerate() {
            let slice = &page.boxes[0];
            assert!(slice.text.is_none() && slice.children.is_empty());
            let bg = slice.background.expect("background on every page");
            assert!((bg[0] - 238.0 / 255.0).abs() < 0.01);
            let border = slice.border.as_ref().expect("border on every page");
            assert!(border.widths[1] > 0.0 && border.widths[3] > 0.0);
            // Only the first slice has a top edge and only the last a bottom edge.
            assert_eq!(border.widths[0] > 0.0, i == 0, "page {i} top edge");
            assert_eq!(border.widths[2] > 0.0, i == last, "page {i} bottom edge");

            assert!(slice.y >= 36.0 - 0.01);
            assert!(slice.y + slice.height <= 792.0 - 36.0 + 0.02, "slice overflows page {i}");
            // Content sits inside the slice.
            for b in &page.boxes[1..] {
                assert!(b.y >= slice.y - 0.01 && b.y + b.height <= slice.y + slice.height + 0.02);
            }
        }
    }

    #[test]
    fn list_items_carry_markers() {
        let pages = pages_for("<ul><li>alpha</li></ul>");
        fn find_marker(b: &LayoutBox) -> Option<&TextLine> {
            b.marker.as_ref().or_else(|| b.children.iter().find_map(find_marker))
        }
        let marker = pages[0].boxes.iter().find_map(find_marker).unwrap();
        assert_eq!(marker.runs[0].text, "\u{2022}");
        assert!(marker.x_offset < 0.0);
    }
}
