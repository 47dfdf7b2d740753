//! PDF renderer – takes a [`DocumentLayout`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API).

use std::collections::{HashMap, HashSet};

use printpdf::*;

use crate::error::RenderError;
use crate::fonts::{FontFamily, FontSpec};
use crate::page_layout::{DocumentLayout, LayoutBox, TextLine};
use crate::resource::{self, ImageRef};

/// Points to millimetres.
const MM_PER_PT: f32 = 0.352778;

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Render a DocumentLayout into PDF bytes.
///
/// Images that cannot be loaded or decoded are skipped with a `log::warn`.
pub fn render_pdf(layout: &DocumentLayout) -> Result<Vec<u8>, RenderError> {
    if !(layout.page_width_pt > 0.0 && layout.page_height_pt > 0.0) {
        return Err(RenderError::Pdf(format!(
            "page size must be positive, got {}x{}pt",
            layout.page_width_pt, layout.page_height_pt
        )));
    }
    let page_w = Mm(layout.page_width_pt * MM_PER_PT);
    let page_h = Mm(layout.page_height_pt * MM_PER_PT);

    let mut doc = PdfDocument::new(&layout.title);
    let images = register_images(&mut doc, layout);

    let mut pages: Vec<PdfPage> = layout
        .pages
        .iter()
        .map(|page| {
            let mut ops = Vec::new();
            for lbox in page.all_boxes() {
                render_box(&mut ops, lbox, layout.page_height_pt, &images);
            }
            PdfPage::new(page_w, page_h, ops)
        })
        .collect();
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }
    log::debug!("rendering {} page(s), {} image(s)", pages.len(), images.len());

    doc.with_pages(pages);
    Ok(doc.save(&PdfSaveOptions::default(), &mut Vec::new()))
}

/// Decode every distinct image once and register it as a reusable XObject.
fn register_images(doc: &mut PdfDocument, layout: &DocumentLayout) -> HashMap<String, ImageResource> {
    let mut srcs: HashSet<&str> = HashSet::new();
    for page in &layout.pages {
        for lbox in page.all_boxes() {
            collect_image_srcs(lbox, &mut srcs);
        }
    }

    let mut resources = HashMap::new();
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    for src in srcs {
        let loaded = ImageRef::from_src(src)
            .load()
            .and_then(|bytes| resource::pixel_size(&bytes).map(|size| (bytes, size)));
        let (bytes, (px_width, px_height)) = match loaded {
            Ok(v) => v,
            Err(e) => {
                log::warn!("skipping image: {e}");
                continue;
            }
        };
        let raw = match RawImage::decode_from_bytes(&bytes, &mut warnings) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("skipping image: cannot embed: {e}");
                continue;
            }
        };
        resources.insert(
            src.to_string(),
            ImageResource {
                xobj_id: doc.add_image(&raw),
                px_width,
                px_height,
            },
        );
    }
    resources
}

fn collect_image_srcs<'a>(lbox: &'a LayoutBox, srcs: &mut HashSet<&'a str>) {
    if let Some(img) = &lbox.image {
        srcs.insert(img.src.as_str());
    }
    for child in &lbox.children {
        collect_image_srcs(child, srcs);
    }
}

fn builtin_font(font: FontSpec) -> BuiltinFont {
    match (font.family, font.bold, font.italic) {
        (FontFamily::Helvetica, false, false) => BuiltinFont::Helvetica,
        (FontFamily::Helvetica, true, false) => BuiltinFont::HelveticaBold,
        (FontFamily::Helvetica, false, true) => BuiltinFont::HelveticaOblique,
        (FontFamily::Helvetica, true, true) => BuiltinFont::HelveticaBoldOblique,
        (FontFamily::Times, false, false) => BuiltinFont::TimesRoman,
        (FontFamily::Times, true, false) => BuiltinFont::TimesBold,
        (FontFamily::Times, false, true) => BuiltinFont::TimesItalic,
        (FontFamily::Times, true, true) => BuiltinFont::TimesBoldItalic,
        (FontFamily::Courier, false, false) => BuiltinFont::Courier,
        (FontFamily::Courier, true, false) => BuiltinFont::CourierBold,
        (FontFamily::Courier, false, true) => BuiltinFont::CourierOblique,
        (FontFamily::Courier, true, true) => BuiltinFont::CourierBoldOblique,
    }
}

/// Convert a UTF-8 string to raw Windows-1252 bytes then wrap in a String so
/// printpdf writes the bytes unchanged into the PDF stream (builtin fonts use
/// WinAnsiEncoding, so each glyph is one byte).
fn to_winlatin(s: &str) -> String {
    if s.is_ascii() {
        return s.to_string();
    }
    let bytes: Vec<u8> = s
        .chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            '\u{00A0}' => 0x20,
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect();
    // SAFETY: bytes above 0x7F are WinAnsi codes, not UTF-8. printpdf copies
    // builtin-font text into the content stream without inspecting it.
    #[allow(unsafe_code)]
    unsafe {
        String::from_utf8_unchecked(bytes)
    }
}

fn rgb(c: [f32; 3]) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

/// Fill a rectangle given in top-left page coordinates.
fn fill_rect(ops: &mut Vec<Op>, page_height: f32, x: f32, y: f32, w: f32, h: f32, color: [f32; 3]) {
    if w <= 0.0 || h <= 0.0 {
        return;
    }
    let (bottom, top) = (page_height - y - h, page_height - y);
    ops.push(Op::SetFillColor { col: rgb(color) });
    ops.push(Op::DrawPolygon {
        polygon: Polygon {
            rings: vec![PolygonRing {
                points: vec![
                    point(x, bottom),
                    point(x + w, bottom),
                    point(x + w, top),
                    point(x, top),
                ],
            }],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        },
    });
}

/// Draw one line of text; `left` / `top` are the page position of the line
/// origin (box corner plus offsets).
fn render_line(ops: &mut Vec<Op>, line: &TextLine, left: f32, top: f32, page_height: f32) {
    let baseline_y = page_height - top - line.baseline;
    for run in &line.runs {
        if run.text.trim().is_empty() {
            continue;
        }
        let font = builtin_font(run.font);
        let x = left + run.x;
        ops.push(Op::StartTextSection);
        ops.push(Op::SetTextCursor {
            pos: Point {
                x: Pt(x),
                y: Pt(baseline_y),
            },
        });
        ops.push(Op::SetFontSizeBuiltinFont {
            size: Pt(run.font_size),
            font,
        });
        ops.push(Op::SetLineHeight {
            lh: Pt(line.height),
        });
        ops.push(Op::SetFillColor { col: rgb(run.color) });
        ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(to_winlatin(&run.text))],
            font,
        });
        ops.push(Op::EndTextSection);

        if run.underline {
            let underline_y = baseline_y - run.font_size * 0.1;
            ops.push(Op::SetOutlineColor { col: rgb(run.color) });
            ops.push(Op::SetOutlineThickness {
                pt: Pt((run.font_size * 0.05).max(0.5)),
            });
            ops.push(Op::DrawLine {
                line: Line {
                    points: vec![point(x, underline_y), point(x + run.width, underline_y)],
                    is_closed: false,
                },
            });
        }
    }
}

/// Recursively render a LayoutBox and its children into PDF ops.
fn render_box(
    ops: &mut Vec<Op>,
    lbox: &LayoutBox,
    page_height: f32,
    images: &HashMap<String, ImageResource>,
) {
    if let Some(bg) = lbox.background {
        fill_rect(ops, page_height, lbox.x, lbox.y, lbox.width, lbox.height, bg);
    }

    // Each side is a filled strip so unequal widths stay inside the box.
    if let Some(border) = &lbox.border {
        let [t, r, b, l] = border.widths;
        let (x, y, w, h) = (lbox.x, lbox.y, lbox.width, lbox.height);
        fill_rect(ops, page_height, x, y, w, t, border.color);
        fill_rect(ops, page_height, x, y + h - b, w, b, border.color);
        fill_rect(ops, page_height, x, y, l, h, border.color);
        fill_rect(ops, page_height, x + w - r, y, r, h, border.color);
    }

    if let Some(marker) = &lbox.marker {
        render_line(ops, marker, lbox.x + marker.x_offset, lbox.y + marker.y_offset, page_height);
    }

    if let Some(text) = &lbox.text {
        for line in &text.lines {
            render_line(ops, line, lbox.x + line.x_offset, lbox.y + line.y_offset, page_height);
        }
    }

    if let Some(img) = &lbox.image {
        if let Some(res) = images.get(&img.src) {
            // PDF origin is bottom-left; translate_y is the image's bottom edge.
            // At dpi=72 printpdf draws 1 px = 1 pt, so scale = target_pt / px.
            let scale = |target: f32, px: u32| if px > 0 { target / px as f32 } else { 1.0 };
            ops.push(Op::UseXobject {
                id: res.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(lbox.x)),
                    translate_y: Some(Pt(page_height - lbox.y - img.height)),
                    dpi: Some(72.0),
                    scale_x: Some(scale(img.width, res.px_width)),
                    scale_y: Some(scale(img.height, res.px_height)),
                    rotate: None,
                },
            });
        }
    }

    for child in &lbox.children {
        render_box(ops, child, page_height, images);
    }
}
