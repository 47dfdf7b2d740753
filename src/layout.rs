//! Layout engine – uses Taffy to compute flexbox / grid layout from a styled
//! DOM tree, then converts the result into positioned boxes in document
//! coordinates (before page splitting).
//!
//! Inline content (text, `span`, `b`, `br`, …) is gathered into anonymous
//! line-box leaves: runs are broken into lines up front with the builtin-font
//! metrics, and the leaf is given the resulting height.

use std::collections::HashMap;
use std::path::Path;

use taffy::prelude::*;

use crate::dom::Tag;
use crate::error::RenderError;
use crate::fonts::{self, FontSpec};
use crate::page_layout::{TextLine, TextRun};
use crate::resource::{self, ImageRef};
use crate::style::{self, ComputedStyle, StyledNode};

/// CSS pixels to points.
const PX: f32 = 0.75;

// ---------------------------------------------------------------------------
// Intermediate layout tree (pre-pagination)
// ---------------------------------------------------------------------------

/// A positioned box in document coordinates (before page splitting).
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub style: ComputedStyle,
    pub content: BoxContent,
    /// List item bullet / number.
    pub marker: Option<String>,
    pub children: Vec<PositionedBox>,
}

#[derive(Debug, Clone)]
pub enum BoxContent {
    None,
    /// Lines with `y_offset` relative to the box; `x_offset` is filled in
    /// once the final box width is known.
    Text {
        lines: Vec<TextLine>,
        align: style::TextAlign,
    },
    Image {
        src: String,
    },
}

/// A styled piece of inline text awaiting line breaking.
struct InlineRun {
    text: String,
    font: FontSpec,
    size: f32,
    line_height: f32,
    color: [f32; 3],
    underline: bool,
}

impl InlineRun {
    fn new(text: String, style: &ComputedStyle) -> Self {
        let c = style.color.over_white();
        Self {
            text,
            font: style.font(),
            size: style.font_size,
            line_height: style.line_height,
            color: [c.r, c.g, c.b],
            underline: style.text_decoration == style::TextDecoration::Underline,
        }
    }
}

fn layout_err(e: taffy::TaffyError) -> RenderError {
    RenderError::Layout(e.to_string())
}

// ---------------------------------------------------------------------------
// Build Taffy tree from styled nodes
// ---------------------------------------------------------------------------

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    node_styles: HashMap<NodeId, ComputedStyle>,
    node_content: HashMap<NodeId, BoxContent>,
    markers: HashMap<NodeId, String>,
    base: Option<&'a Path>,
}

impl<'a> LayoutBuilder<'a> {
    fn new(base: Option<&'a Path>) -> Self {
        Self {
            taffy: TaffyTree::new(),
            node_styles: HashMap::new(),
            node_content: HashMap::new(),
            markers: HashMap::new(),
            base,
        }
    }

    /// Build `children` of a container whose content box is `inner_width`
    /// wide; block children are sized for `child_width`.
    fn build_children(
        &mut self,
        children: &[StyledNode],
        container: &ComputedStyle,
        inner_width: f32,
        child_width: f32,
        list_start: u32,
    ) -> Result<Vec<NodeId>, RenderError> {
        let mut nodes = Vec::new();
        let mut pending: Vec<&StyledNode> = Vec::new();
        let mut counter = list_start;

        for child in children {
            if is_inline_content(child) {
                pending.push(child);
                continue;
            }
            self.flush_inline(&mut pending, container, inner_width, &mut nodes)?;

            let StyledNode::Element {
                tag,
                style,
                children: grandchildren,
                attrs,
            } = child
            else {
                continue;
            };
            if style.display == style::Display::None {
                continue;
            }
            let id = self.build_element(tag, style, grandchildren, attrs, child_width, container)?;
            if style.display == style::Display::ListItem {
                counter += 1;
                if let Some(marker) = style.list_style.marker(counter) {
                    self.markers.insert(id, marker);
                }
            }
            nodes.push(id);
        }
        self.flush_inline(&mut pending, container, inner_width, &mut nodes)?;
        Ok(nodes)
    }

    /// Turn the pending inline siblings into one anonymous line-box leaf.
    fn flush_inline(
        &mut self,
        pending: &mut Vec<&StyledNode>,
        container: &ComputedStyle,
        width: f32,
        out: &mut Vec<NodeId>,
    ) -> Result<(), RenderError> {
        if pending.is_empty() {
            return Ok(());
        }
        let mut runs = Vec::new();
        for node in pending.drain(..) {
            collect_inline(node, &mut runs);
        }
        if runs
            .iter()
            .all(|r| r.text.trim().is_empty() && !r.text.contains('\n'))
        {
            return Ok(());
        }

        let measured: Vec<fonts::TextRun<'_>> = runs
            .iter()
            .map(|r| fonts::TextRun {
                text: &r.text,
                font: r.font,
                size: r.size,
                line_height: r.line_height,
            })
            .collect();

        let mut y = 0.0f32;
        let mut widest = 0.0f32;
        let lines: Vec<TextLine> = fonts::break_lines(&measured, width.max(1.0))
            .into_iter()
            .map(|line| {
                let text_line = TextLine {
                    x_offset: 0.0,
                    y_offset: y,
                    width: line.width,
                    height: line.height,
                    baseline: line.ascent,
                    runs: line
                        .fragments
                        .into_iter()
                        .map(|f| {
                            let run = &runs[f.run];
                            TextRun {
                                text: f.text,
                                x: f.x,
                                width: f.width,
                                font: run.font,
                                font_size: run.size,
                                color: run.color,
                                underline: run.underline,
                            }
                        })
                        .collect(),
                };
                y += line.height;
                widest = widest.max(line.width);
                text_line
            })
            .collect();
        if lines.is_empty() {
            return Ok(());
        }

        // Auto width: stretches in column containers, shrinks to the widest
        // line in rows.
        let leaf = Style {
            size: Size {
                width: Dimension::Auto,
                height: Dimension::Length(y),
            },
            min_size: Size {
                width: Dimension::Length(widest),
                height: Dimension::Auto,
            },
            flex_shrink: 0.0,
            ..Default::default()
        };
        let node = self.taffy.new_leaf(leaf).map_err(layout_err)?;
        self.node_styles.insert(
            node,
            ComputedStyle {
                text_align: container.text_align,
                ..ComputedStyle::default()
            },
        );
        self.node_content.insert(
            node,
            BoxContent::Text {
                lines,
                align: container.text_align,
            },
        );
        out.push(node);
        Ok(())
    }

    fn build_element(
        &mut self,
        tag: &Tag,
        style: &ComputedStyle,
        children: &[StyledNode],
        attrs: &HashMap<String, String>,
        parent_width: f32,
        parent: &ComputedStyle,
    ) -> Result<NodeId, RenderError> {
        if *tag == Tag::Img {
            return self.build_image(style, attrs, parent_width, parent);
        }

        let margin_x = style.margin.left.resolve(parent_width).unwrap_or(0.0)
            + style.margin.right.resolve(parent_width).unwrap_or(0.0);
        let mut my_width = style
            .width
            .resolve(parent_width)
            .unwrap_or(parent_width - margin_x);
        if let Some(max) = style.max_width.resolve(parent_width) {
            my_width = my_width.min(max);
        }
        let inner_width = (my_width
            - style.padding.left
            - style.padding.right
            - style.border_width.left
            - style.border_width.right)
            .max(1.0);

        // Estimate per-child width for rows and grids so that text is
        // wrapped to the right column width at build time.
        let columns = match style.display {
            style::Display::Grid => style.grid_template_columns.len().max(1),
            style::Display::TableRow => block_child_count(children),
            _ if style.is_row_container() => block_child_count(children),
            _ => 1,
        };
        let child_width = if columns > 1 {
            let gap_total = style.gap * (columns - 1) as f32;
            ((inner_width - gap_total) / columns as f32).max(1.0)
        } else {
            inner_width
        };

        let list_start = attrs
            .get("start")
            .and_then(|s| s.trim().parse::<u32>().ok())
            .map_or(0, |start| start.saturating_sub(1));
        let child_nodes =
            self.build_children(children, style, inner_width, child_width, list_start)?;

        let node = self
            .taffy
            .new_with_children(to_taffy(style), &child_nodes)
            .map_err(layout_err)?;
        self.node_styles.insert(node, style.clone());
        Ok(node)
    }

    /// `<img>`: resolve the source, then size the leaf from the intrinsic
    /// dimensions where CSS leaves width or height `auto`.
    fn build_image(
        &mut self,
        style: &ComputedStyle,
        attrs: &HashMap<String, String>,
        parent_width: f32,
        parent: &ComputedStyle,
    ) -> Result<NodeId, RenderError> {
        let mut sized = style.clone();
        // HTML width / height attributes are CSS pixels.
        for (name, slot) in [("width", &mut sized.width), ("height", &mut sized.height)] {
            if *slot == style::Dimension::Auto {
                if let Some(px) = attrs
                    .get(name)
                    .and_then(|v| v.trim().trim_end_matches("px").parse::<f32>().ok())
                {
                    *slot = style::Dimension::Pt(px * PX);
                }
            }
        }

        let src = attrs.get("src").map(String::as_str).unwrap_or("");
        let loaded = ImageRef::resolve(src, self.base).and_then(|image| {
            let bytes = image.load()?;
            let pixels = resource::pixel_size(&bytes)?;
            Ok((image, pixels))
        });

        let content = match loaded {
            Ok((image, (px_w, px_h))) => {
                apply_intrinsic_size(&mut sized, px_w, px_h, parent_width);
                Some(BoxContent::Image {
                    src: image.as_src(),
                })
            }
            Err(e) => {
                log::warn!("skipping image {}: {e}", preview(src));
                None
            }
        };

        let mut ts = to_taffy(&sized);
        ts.flex_shrink = 0.0;
        if !parent.is_row_container() {
            ts.align_self = match parent.text_align {
                style::TextAlign::Left => None,
                style::TextAlign::Center => Some(AlignSelf::Center),
                style::TextAlign::Right => Some(AlignSelf::End),
            };
        }
        let node = self.taffy.new_leaf(ts).map_err(layout_err)?;
        self.node_styles.insert(node, sized);
        if let Some(content) = content {
            self.node_content.insert(node, content);
        }
        Ok(node)
    }

    /// Extract positioned boxes after layout computation.
    fn extract(&self, node: NodeId, offset_x: f32, offset_y: f32) -> Result<PositionedBox, RenderError> {
        let layout = self.taffy.layout(node).map_err(layout_err)?;
        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;

        let children = self
            .taffy
            .children(node)
            .map_err(layout_err)?
            .into_iter()
            .map(|child| self.extract(child, x, y))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PositionedBox {
            x,
            y,
            width: layout.size.width,
            height: layout.size.height,
            style: self.node_styles.get(&node).cloned().unwrap_or_default(),
            content: self
                .node_content
                .get(&node)
                .cloned()
                .unwrap_or(BoxContent::None),
            marker: self.markers.get(&node).cloned(),
            children,
        })
    }
}

fn is_inline_content(node: &StyledNode) -> bool {
    match node {
        StyledNode::Text { .. } => true,
        StyledNode::Element { style, .. } => style.display == style::Display::Inline,
    }
}

fn block_child_count(children: &[StyledNode]) -> usize {
    children
        .iter()
        .filter(|c| !is_inline_content(c) && c.style().display != style::Display::None)
        .count()
        .max(1)
}

/// Flatten an inline subtree into styled runs.
fn collect_inline(node: &StyledNode, out: &mut Vec<InlineRun>) {
    match node {
        StyledNode::Text { text, style } => {
            let text = if style.preserve_newlines {
                text.replace("\r\n", "\n")
            } else {
                text.replace(['\n', '\r', '\t'], " ")
            };
            let text = match style.text_transform {
                style::TextTransform::None => text,
                style::TextTransform::Uppercase => text.to_uppercase(),
                style::TextTransform::Lowercase => text.to_lowercase(),
            };
            out.push(InlineRun::new(text, style));
        }
        StyledNode::Element {
            tag: Tag::Br,
            style,
            ..
        } => out.push(InlineRun::new("\n".to_string(), style)),
        StyledNode::Element {
            style, children, ..
        } => {
            if style.display != style::Display::None {
                for child in children {
                    collect_inline(child, out);
                }
            }
        }
    }
}

fn apply_intrinsic_size(style: &mut ComputedStyle, px_w: u32, px_h: u32, parent_width: f32) {
    let (w, h) = (px_w as f32 * PX, px_h as f32 * PX);
    if w <= 0.0 || h <= 0.0 {
        return;
    }
    let aspect = w / h;
    let known_w = style.width.resolve(parent_width);
    let known_h = match style.height {
        style::Dimension::Pt(v) => Some(v),
        _ => None,
    };
    match (known_w, known_h) {
        (Some(w), None) => style.height = style::Dimension::Pt(w / aspect),
        (None, Some(h)) => style.width = style::Dimension::Pt(h * aspect),
        (None, None) => {
            let w = style
                .max_width
                .resolve(parent_width)
                .map_or(w, |max| w.min(max));
            style.width = style::Dimension::Pt(w);
            style.height = style::Dimension::Pt(w / aspect);
        }
        (Some(_), Some(_)) => {}
    }
}

fn preview(src: &str) -> String {
    if src.len() > 60 {
        let cut = (0..=60).rev().find(|&i| src.is_char_boundary(i)).unwrap_or(0);
        format!("'{}…'", &src[..cut])
    } else {
        format!("'{src}'")
    }
}

// ---------------------------------------------------------------------------
// ComputedStyle → taffy::Style
// ---------------------------------------------------------------------------

fn dim(d: style::Dimension) -> Dimension {
    match d {
        style::Dimension::Auto => Dimension::Auto,
        style::Dimension::Pt(v) => Dimension::Length(v),
        style::Dimension::Percent(v) => Dimension::Percent(v / 100.0),
    }
}

fn margin(d: style::Dimension) -> LengthPercentageAuto {
    match d {
        style::Dimension::Auto => LengthPercentageAuto::Auto,
        style::Dimension::Pt(v) => LengthPercentageAuto::Length(v),
        style::Dimension::Percent(v) => LengthPercentageAuto::Percent(v / 100.0),
    }
}

fn edges(e: &style::Edges<f32>) -> Rect<LengthPercentage> {
    Rect {
        top: LengthPercentage::Length(e.top),
        right: LengthPercentage::Length(e.right),
        bottom: LengthPercentage::Length(e.bottom),
        left: LengthPercentage::Length(e.left),
    }
}

fn to_taffy(s: &ComputedStyle) -> Style {
    let shrinkable = s.flex_grow > 0.0 || s.flex_shrink > 0.0;
    let mut ts = Style {
        // Block-level boxes stack vertically: a flex column.
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        size: Size {
            width: dim(s.width),
            height: dim(s.height),
        },
        // Let flex items compress below their natural content width.
        min_size: Size {
            width: if s.min_width == style::Dimension::Auto && shrinkable {
                Dimension::Length(0.0)
            } else {
                dim(s.min_width)
            },
            height: dim(s.min_height),
        },
        max_size: Size {
            width: dim(s.max_width),
            height: Dimension::Auto,
        },
        flex_grow: s.flex_grow,
        flex_shrink: s.flex_shrink,
        flex_basis: dim(s.flex_basis),
        margin: Rect {
            top: margin(s.margin.top),
            right: margin(s.margin.right),
            bottom: margin(s.margin.bottom),
            left: margin(s.margin.left),
        },
        padding: edges(&s.padding),
        border: edges(&s.border_width),
        gap: Size {
            width: LengthPercentage::Length(s.gap),
            height: LengthPercentage::Length(s.gap),
        },
        ..Default::default()
    };

    match s.display {
        style::Display::Flex => {
            ts.flex_direction = match s.flex_direction {
                style::FlexDirection::Row => taffy::FlexDirection::Row,
                style::FlexDirection::Column => taffy::FlexDirection::Column,
            };
            ts.flex_wrap = match s.flex_wrap {
                style::FlexWrap::NoWrap => taffy::FlexWrap::NoWrap,
                style::FlexWrap::Wrap => taffy::FlexWrap::Wrap,
            };
            ts.justify_content = Some(match s.justify_content {
                style::JustifyContent::Start => taffy::JustifyContent::Start,
                style::JustifyContent::End => taffy::JustifyContent::End,
                style::JustifyContent::Center => taffy::JustifyContent::Center,
                style::JustifyContent::SpaceBetween => taffy::JustifyContent::SpaceBetween,
                style::JustifyContent::SpaceAround => taffy::JustifyContent::SpaceAround,
                style::JustifyContent::SpaceEvenly => taffy::JustifyContent::SpaceEvenly,
            });
            ts.align_items = Some(match s.align_items {
                style::AlignItems::Start => taffy::AlignItems::Start,
                style::AlignItems::End => taffy::AlignItems::End,
                style::AlignItems::Center => taffy::AlignItems::Center,
                style::AlignItems::Stretch => taffy::AlignItems::Stretch,
            });
        }
        style::Display::Grid => {
            ts.display = taffy::Display::Grid;
            ts.grid_template_columns = if s.grid_template_columns.is_empty() {
                vec![taffy::TrackSizingFunction::from_flex(1.0)]
            } else {
                s.grid_template_columns
                    .iter()
                    .map(|track| match *track {
                        style::GridTrack::Pt(v) => taffy::TrackSizingFunction::from_length(v),
                        style::GridTrack::Fr(f) => taffy::TrackSizingFunction::from_flex(f),
                        style::GridTrack::Auto => taffy::TrackSizingFunction::from_flex(1.0),
                    })
                    .collect()
            };
        }
        // HTML table model: rows are flex rows of equal-width cells.
        style::Display::TableRow => {
            ts.flex_direction = taffy::FlexDirection::Row;
            ts.align_items = Some(taffy::AlignItems::Stretch);
            if s.width == style::Dimension::Auto {
                ts.size.width = Dimension::Percent(1.0);
            }
        }
        style::Display::TableCell => {
            if s.width == style::Dimension::Auto {
                ts.flex_grow = 1.0;
                ts.flex_basis = Dimension::Length(0.0);
                ts.min_size.width = Dimension::Length(0.0);
            } else {
                ts.flex_grow = 0.0;
                ts.flex_shrink = 0.0;
            }
        }
        style::Display::None => ts.display = taffy::Display::None,
        style::Display::Block
        | style::Display::Table
        | style::Display::ListItem
        | style::Display::InlineBlock
        | style::Display::Inline => {}
    }
    ts
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Lay out a styled tree (normally the `<body>` element) in a column
/// `content_width` wide whose left edge sits at `origin_x`. Relative image
/// paths resolve against `base`.
pub fn compute_layout(
    root: &StyledNode,
    content_width: f32,
    origin_x: f32,
    base: Option<&Path>,
) -> Result<Vec<PositionedBox>, RenderError> {
    let mut builder = LayoutBuilder::new(base);
    let container = ComputedStyle::default();
    let child_ids = builder.build_children(
        std::slice::from_ref(root),
        &container,
        content_width,
        content_width,
        0,
    )?;

    let root_style = Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        size: Size {
            width: Dimension::Length(content_width),
            height: Dimension::Auto,
        },
        ..Default::default()
    };
    let root_id = builder
        .taffy
        .new_with_children(root_style, &child_ids)
        .map_err(layout_err)?;

    builder
        .taffy
        .compute_layout(
            root_id,
            Size {
                width: AvailableSpace::Definite(content_width),
                height: AvailableSpace::MaxContent,
            },
        )
        .map_err(layout_err)?;

    Ok(builder.extract(root_id, origin_x, 0.0)?.children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_document;
    use crate::resource::tests::png_data_uri;
    use crate::style::{build_styled_tree, Stylesheet};

    fn layout(html: &str) -> Vec<PositionedBox> {
        let doc = parse_document(html).unwrap();
        let sheet = Stylesheet::parse(&doc.stylesheet);
        let tree = build_styled_tree(&doc.body(), &sheet);
        compute_layout(&tree, 500.0, 0.0, None).unwrap()
    }

    fn all_boxes(boxes: &[PositionedBox]) -> Vec<&PositionedBox> {
        let mut out = Vec::new();
        for b in boxes {
            out.push(b);
            out.extend(all_boxes(&b.children));
        }
        out
    }

    fn text_lines(boxes: &[PositionedBox]) -> Vec<TextLine> {
        all_boxes(boxes)
            .into_iter()
            .filter_map(|b| match &b.content {
                BoxContent::Text { lines, .. } => Some(lines.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn line_text(line: &TextLine) -> String {
        line.runs.iter().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn layout_simple_paragraph() {
        let boxes = layout("<p>Hello world</p>");
        assert_eq!(boxes.len(), 1, "body is the single root box");
        let body = &boxes[0];
        assert!((body.x - 6.0).abs() < 0.01, "body margin");
        assert!((body.width - 488.0).abs() < 0.01);
        assert!(body.height > 0.0);

        let lines = text_lines(&boxes);
        assert_eq!(lines.len(), 1);
        assert_eq!(line_text(&lines[0]), "Hello world");
    }

    #[test]
    fn inline_elements_keep_their_fonts() {
        let boxes = layout("<p>Hello <b>bold</b> <i>slanted</i></p>");
        let lines = text_lines(&boxes);
        assert_eq!(lines.len(), 1);
        let runs = &lines[0].runs;
        assert_eq!(line_text(&lines[0]), "Hello bold slanted");
        assert!(runs.iter().any(|r| r.text == "bold" && r.font.bold));
        assert!(runs.iter().any(|r| r.text == "slanted" && r.font.italic));
        assert!(runs.windows(2).all(|w| w[1].x >= w[0].x + w[0].width - 0.01));
    }

    #[test]
    fn line_breaks_and_wrapping() {
        let lines = text_lines(&layout("<p>first<br>second</p>"));
        assert_eq!(lines.len(), 2);
        assert_eq!(line_text(&lines[1]), "second");
        assert!(lines[1].y_offset > 0.0);

        let long = "word ".repeat(200);
        let lines = text_lines(&layout(&format!("<p>{long}</p>")));
        assert!(lines.len() > 5);
        assert!(lines.iter().all(|l| l.width <= 488.0));
    }

    #[test]
    fn flex_row_splits_width() {
        let boxes = layout(
            r#"<div style="display:flex"><div style="flex:1">A</div><div style="flex:1">B</div></div>"#,
        );
        let row = &boxes[0].children[0];
        assert_eq!(row.children.len(), 2);
        let (a, b) = (&row.children[0], &row.children[1]);
        assert!((a.width - b.width).abs() < 0.01);
        assert!((a.width - 244.0).abs() < 0.5);
        assert!(b.x > a.x);
    }

    #[test]
    fn ordered_list_markers_count_from_start() {
        let boxes = layout(r#"<ol start="3"><li>a</li><li>b</li></ol><ul><li>c</li></ul>"#);
        let markers: Vec<String> = all_boxes(&boxes)
            .into_iter()
            .filter_map(|b| b.marker.clone())
            .collect();
        assert_eq!(markers, vec!["3.", "4.", "\u{2022}"]);
    }

    #[test]
    fn table_cells_share_the_row() {
        let boxes = layout("<table><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table>");
        let table = &boxes[0].children[0];
        assert_eq!(table.children.len(), 2);
        let row = &table.children[0];
        assert_eq!(row.children.len(), 2);
        assert!((row.children[0].width - row.children[1].width).abs() < 0.01);
        assert!(table.children[1].y > row.y);
    }

    #[test]
    fn image_uses_intrinsic_size() {
        let uri = png_data_uri(40, 20);
        let boxes = layout(&format!(r#"<img src="{uri}">"#));
        let img = all_boxes(&boxes)
            .into_iter()
            .find(|b| matches!(b.content, BoxContent::Image { .. }))
            .expect("image box");
        assert!((img.width - 30.0).abs() < 0.01);
        assert!((img.height - 15.0).abs() < 0.01);

        let boxes = layout(&format!(r#"<img src="{uri}" style="width: 60pt">"#));
        let img = all_boxes(&boxes)
            .into_iter()
            .find(|b| matches!(b.content, BoxContent::Image { .. }))
            .expect("image box");
        assert!((img.height - 30.0).abs() < 0.01);
    }

    #[test]
    fn unreadable_image_is_skipped() {
        let boxes = layout(r#"<p>before</p><img src="missing/logo.png"><p>after</p>"#);
        assert!(!all_boxes(&boxes)
            .iter()
            .any(|b| matches!(b.content, BoxContent::Image { .. })));
        assert_eq!(text_lines(&boxes).len(), 2);
    }

    #[test]
    fn display_none_and_whitespace_produce_no_boxes() {
        let boxes = layout("<div>\n  <p style=\"display:none\">hidden</p>\n</div>");
        assert!(text_lines(&boxes).is_empty());
    }
}
