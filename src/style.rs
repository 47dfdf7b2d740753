//! Style resolver – folds user-agent defaults, `<style>` sheet rules and
//! inline `style=""` declarations into a flat [`ComputedStyle`] consumed by
//! the layout engine. All lengths are resolved to points.

use std::collections::HashMap;

use crate::dom::{DomNode, ElementNode, Tag};
use crate::fonts::{FontFamily, FontSpec};
use crate::options::unit_factor;

/// Root font size (CSS `medium`, 16px).
pub const DEFAULT_FONT_SIZE: f32 = 12.0;
/// Line-height factor used for `line-height: normal`.
const NORMAL_LINE_HEIGHT: f32 = 1.2;

/// Fully resolved style for a single element.
#[derive(Debug, Clone)]
pub struct ComputedStyle {
    // Display / layout
    pub display: Display,
    pub flex_direction: FlexDirection,
    pub flex_wrap: FlexWrap,
    pub flex_grow: f32,
    pub flex_shrink: f32,
    pub flex_basis: Dimension,
    pub justify_content: JustifyContent,
    pub align_items: AlignItems,
    pub gap: f32,
    pub grid_template_columns: Vec<GridTrack>,

    // Sizing
    pub width: Dimension,
    pub height: Dimension,
    pub min_width: Dimension,
    pub max_width: Dimension,
    pub min_height: Dimension,

    // Box model (pt)
    pub margin: Edges<Dimension>,
    pub padding: Edges<f32>,
    pub border_width: Edges<f32>,
    pub border_color: Color,

    // Typography (inherited)
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_family: FontFamily,
    pub font_style: FontStyle,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: f32,
    pub text_decoration: TextDecoration,
    pub text_transform: TextTransform,
    pub list_style: ListStyle,
    /// `white-space: pre*` – source newlines break lines.
    pub preserve_newlines: bool,

    pub background_color: Color,

    // Page break
    pub page_break_before: bool,
    pub page_break_after: bool,
    pub page_break_inside_avoid: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            flex_direction: FlexDirection::Row,
            flex_wrap: FlexWrap::NoWrap,
            flex_grow: 0.0,
            flex_shrink: 1.0,
            flex_basis: Dimension::Auto,
            justify_content: JustifyContent::Start,
            align_items: AlignItems::Stretch,
            gap: 0.0,
            grid_template_columns: Vec::new(),
            width: Dimension::Auto,
            height: Dimension::Auto,
            min_width: Dimension::Auto,
            max_width: Dimension::Auto,
            min_height: Dimension::Auto,
            margin: Edges::uniform(Dimension::Pt(0.0)),
            padding: Edges::uniform(0.0),
            border_width: Edges::uniform(0.0),
            border_color: Color::BLACK,
            font_size: DEFAULT_FONT_SIZE,
            font_weight: FontWeight::Normal,
            font_family: FontFamily::Helvetica,
            font_style: FontStyle::Normal,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: NORMAL_LINE_HEIGHT,
            text_decoration: TextDecoration::None,
            text_transform: TextTransform::None,
            list_style: ListStyle::Disc,
            preserve_newlines: false,
            background_color: Color::TRANSPARENT,
            page_break_before: false,
            page_break_after: false,
            page_break_inside_avoid: false,
        }
    }
}

impl ComputedStyle {
    /// The builtin font face this style selects.
    pub fn font(&self) -> FontSpec {
        FontSpec {
            family: self.font_family,
            bold: self.font_weight == FontWeight::Bold,
            italic: self.font_style == FontStyle::Italic,
        }
    }

    pub fn is_row_container(&self) -> bool {
        self.display == Display::Flex && self.flex_direction == FlexDirection::Row
    }

    pub fn has_border(&self) -> bool {
        let b = &self.border_width;
        b.top > 0.0 || b.right > 0.0 || b.bottom > 0.0 || b.left > 0.0
    }
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Four box edges in CSS shorthand order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edges<T> {
    pub top: T,
    pub right: T,
    pub bottom: T,
    pub left: T,
}

impl<T: Copy> Edges<T> {
    pub fn uniform(v: T) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    /// Expand 1–4 shorthand values (`margin: 1px 2px` etc.).
    fn from_shorthand(values: &[T]) -> Option<Self> {
        let (top, right, bottom, left) = match *values {
            [a] => (a, a, a, a),
            [a, b] => (a, b, a, b),
            [a, b, c] => (a, b, c, b),
            [a, b, c, d] => (a, b, c, d),
            _ => return None,
        };
        Some(Self {
            top,
            right,
            bottom,
            left,
        })
    }

    fn side_mut(&mut self, side: &str) -> Option<&mut T> {
        match side {
            "top" => Some(&mut self.top),
            "right" => Some(&mut self.right),
            "bottom" => Some(&mut self.bottom),
            "left" => Some(&mut self.left),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Flex,
    Grid,
    Inline,
    InlineBlock,
    ListItem,
    Table,
    TableRow,
    TableCell,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexDirection {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexWrap {
    NoWrap,
    Wrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JustifyContent {
    Start,
    End,
    Center,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignItems {
    Start,
    End,
    Center,
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDecoration {
    None,
    Underline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextTransform {
    None,
    Uppercase,
    Lowercase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyle {
    Disc,
    Circle,
    Square,
    Decimal,
    None,
}

impl ListStyle {
    /// Marker text for the `n`-th (1-based) item.
    pub fn marker(self, n: u32) -> Option<String> {
        match self {
            ListStyle::Disc => Some("\u{2022}".to_string()),
            ListStyle::Circle => Some("o".to_string()),
            ListStyle::Square => Some("\u{2013}".to_string()),
            ListStyle::Decimal => Some(format!("{n}.")),
            ListStyle::None => None,
        }
    }
}

/// A length that may depend on the containing block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Pt(f32),
    /// Percentage of the containing block, 0–100.
    Percent(f32),
}

impl Dimension {
    /// Resolve against a containing block width; `Auto` yields `None`.
    pub fn resolve(self, containing: f32) -> Option<f32> {
        match self {
            Dimension::Auto => None,
            Dimension::Pt(v) => Some(v),
            Dimension::Percent(p) => Some(containing * p / 100.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GridTrack {
    Pt(f32),
    Fr(f32),
    Auto,
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: 1.0,
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    /// Composite over a white page (PDF fills are opaque).
    pub fn over_white(&self) -> Self {
        let mix = |c: f32| c * self.a + (1.0 - self.a);
        Self {
            r: mix(self.r),
            g: mix(self.g),
            b: mix(self.b),
            a: 1.0,
        }
    }

    /// Parse a CSS colour: `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb()`, `rgba()`
    /// or a basic named colour.
    pub fn parse(value: &str) -> Option<Self> {
        let v = value.trim().to_ascii_lowercase();
        if let Some(hex) = v.strip_prefix('#') {
            return Self::from_hex(hex);
        }
        if let Some(args) = v
            .strip_prefix("rgba(")
            .or_else(|| v.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return Self::from_rgb_args(args);
        }
        named_color(&v)
    }

    fn from_hex(hex: &str) -> Option<Self> {
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        let (r, g, b, a) = match hex.len() {
            3 => (
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
                1.0,
            ),
            6 | 8 => (
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                if hex.len() == 8 { channel(&hex[6..8])? } else { 1.0 },
            ),
            _ => return None,
        };
        Some(Self { r, g, b, a })
    }

    fn from_rgb_args(args: &str) -> Option<Self> {
        let parts: Vec<&str> = args
            .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() != 3 && parts.len() != 4 {
            return None;
        }
        let channel = |s: &str| -> Option<f32> {
            match s.strip_suffix('%') {
                Some(p) => p.parse::<f32>().ok().map(|v| v / 100.0),
                None => s.parse::<f32>().ok().map(|v| v / 255.0),
            }
            .map(|v| v.clamp(0.0, 1.0))
        };
        let alpha = match parts.get(3) {
            Some(s) => match s.strip_suffix('%') {
                Some(p) => p.parse::<f32>().ok()? / 100.0,
                None => s.parse::<f32>().ok()?,
            },
            None => 1.0,
        };
        Some(Self {
            r: channel(parts[0])?,
            g: channel(parts[1])?,
            b: channel(parts[2])?,
            a: alpha.clamp(0.0, 1.0),
        })
    }
}

fn named_color(name: &str) -> Option<Color> {
    Some(match name {
        "black" => Color::BLACK,
        "white" => Color::WHITE,
        "transparent" => Color::TRANSPARENT,
        "red" => Color::rgb(255, 0, 0),
        "green" => Color::rgb(0, 128, 0),
        "blue" => Color::rgb(0, 0, 255),
        "gray" | "grey" => Color::rgb(128, 128, 128),
        "silver" => Color::rgb(192, 192, 192),
        "lightgray" | "lightgrey" => Color::rgb(211, 211, 211),
        "darkgray" | "darkgrey" => Color::rgb(169, 169, 169),
        "maroon" => Color::rgb(128, 0, 0),
        "navy" => Color::rgb(0, 0, 128),
        "olive" => Color::rgb(128, 128, 0),
        "purple" => Color::rgb(128, 0, 128),
        "teal" => Color::rgb(0, 128, 128),
        "orange" => Color::rgb(255, 165, 0),
        "yellow" => Color::rgb(255, 255, 0),
        "lime" => Color::rgb(0, 255, 0),
        "aqua" | "cyan" => Color::rgb(0, 255, 255),
        "fuchsia" | "magenta" => Color::rgb(255, 0, 255),
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// Stylesheet
// ---------------------------------------------------------------------------

/// One `property: value` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

/// Parse a declaration block (`color: red; margin: 0 !important`).
pub fn parse_declarations(block: &str) -> Vec<Declaration> {
    block
        .split(';')
        .filter_map(|decl| {
            let (property, value) = decl.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let mut value = value.trim();
            let mut important = false;
            if let Some(idx) = value.to_ascii_lowercase().rfind("!important") {
                value = value[..idx].trim_end();
                important = true;
            }
            if property.is_empty() || value.is_empty() {
                return None;
            }
            Some(Declaration {
                property,
                value: value.to_string(),
                important,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// `tag.class#id` with every part optional (`*` or an empty tag matches any).
#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn matches(&self, element: &ElementNode) -> bool {
        if let Some(tag) = &self.tag {
            if !element.tag.name().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id() != Some(id.as_str()) {
                return false;
            }
        }
        let classes = element.classes();
        self.classes.iter().all(|c| classes.contains(&c.as_str()))
    }
}

/// A complex selector: compounds in source order joined by combinators
/// (`combinators[i]` sits between `compounds[i]` and `compounds[i + 1]`).
#[derive(Debug, Clone, PartialEq)]
struct Selector {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

impl Selector {
    fn parse(text: &str) -> Option<Self> {
        let spaced = text.replace('>', " > ");
        let mut compounds = Vec::new();
        let mut combinators = Vec::new();
        let mut pending: Option<Combinator> = None;
        for token in spaced.split_whitespace() {
            if token == ">" {
                if compounds.is_empty() || pending.is_some() {
                    return None;
                }
                pending = Some(Combinator::Child);
                continue;
            }
            let compound = parse_compound(token)?;
            if !compounds.is_empty() {
                combinators.push(pending.take().unwrap_or(Combinator::Descendant));
            }
            compounds.push(compound);
        }
        if compounds.is_empty() || pending.is_some() {
            return None;
        }
        Some(Self {
            compounds,
            combinators,
        })
    }

    /// (ids, classes, tags)
    fn specificity(&self) -> (u32, u32, u32) {
        self.compounds.iter().fold((0, 0, 0), |(a, b, c), comp| {
            (
                a + comp.id.is_some() as u32,
                b + comp.classes.len() as u32,
                c + comp.tag.is_some() as u32,
            )
        })
    }

    /// `ancestors` runs from the root down to the element's parent.
    fn matches(&self, element: &ElementNode, ancestors: &[&ElementNode]) -> bool {
        match self.compounds.split_last() {
            Some((subject, rest)) => {
                subject.matches(element) && match_chain(rest, &self.combinators, ancestors)
            }
            None => false,
        }
    }
}

fn match_chain(
    compounds: &[Compound],
    combinators: &[Combinator],
    ancestors: &[&ElementNode],
) -> bool {
    let (Some((compound, rest)), Some((combinator, rest_combinators))) =
        (compounds.split_last(), combinators.split_last())
    else {
        return true;
    };
    match combinator {
        Combinator::Child => match ancestors.split_last() {
            Some((parent, above)) => {
                compound.matches(parent) && match_chain(rest, rest_combinators, above)
            }
            None => false,
        },
        Combinator::Descendant => (0..ancestors.len()).rev().any(|i| {
            compound.matches(ancestors[i]) && match_chain(rest, rest_combinators, &ancestors[..i])
        }),
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn parse_compound(token: &str) -> Option<Compound> {
    let mut compound = Compound::default();
    let mut rest = token;
    if let Some(after) = rest.strip_prefix('*') {
        rest = after;
    } else {
        let end = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
        if end > 0 {
            compound.tag = Some(rest[..end].to_ascii_lowercase());
            rest = &rest[end..];
        }
    }
    while let Some(marker) = rest.chars().next() {
        if marker != '.' && marker != '#' {
            // Pseudo-classes, attribute selectors, sibling combinators.
            return None;
        }
        let body = &rest[1..];
        let end = body.find(|c: char| !is_ident_char(c)).unwrap_or(body.len());
        if end == 0 {
            return None;
        }
        let name = body[..end].to_string();
        if marker == '.' {
            compound.classes.push(name);
        } else {
            compound.id = Some(name);
        }
        rest = &body[end..];
    }
    Some(compound)
}

#[derive(Debug, Clone)]
struct Rule {
    selector: Selector,
    specificity: (u32, u32, u32),
    order: usize,
    declarations: Vec<Declaration>,
}

/// Rules collected from the document's `<style>` elements.
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    rules: Vec<Rule>,
}

impl Stylesheet {
    pub fn parse(css: &str) -> Self {
        let mut sheet = Stylesheet::default();
        sheet.parse_rules(&strip_comments(css));
        sheet
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn parse_rules(&mut self, css: &str) {
        let mut rest = css;
        while let Some(open) = rest.find('{') {
            let Some(close) = matching_brace(rest, open) else {
                log::warn!("unterminated CSS block ignored");
                break;
            };
            // Drop statement at-rules (`@charset "x";`) preceding the block.
            let prelude = rest[..open].rsplit(';').next().unwrap_or("").trim();
            let body = &rest[open + 1..close];

            if let Some(at_rule) = prelude.strip_prefix('@') {
                if media_applies(at_rule) {
                    self.parse_rules(body);
                } else {
                    log::debug!("skipping @{at_rule}");
                }
            } else {
                let declarations = parse_declarations(body);
                for text in prelude.split(',') {
                    match Selector::parse(text) {
                        Some(selector) => self.rules.push(Rule {
                            specificity: selector.specificity(),
                            selector,
                            order: self.rules.len(),
                            declarations: declarations.clone(),
                        }),
                        None => log::debug!("unsupported selector '{}' ignored", text.trim()),
                    }
                }
            }
            rest = &rest[close + 1..];
        }
    }

    /// Declarations of every matching rule, lowest precedence first.
    fn matching(&self, element: &ElementNode, ancestors: &[&ElementNode]) -> Vec<&Declaration> {
        let mut rules: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|r| r.selector.matches(element, ancestors))
            .collect();
        rules.sort_by_key(|r| (r.specificity, r.order));
        rules.iter().flat_map(|r| r.declarations.iter()).collect()
    }
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

fn matching_brace(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Only `@media` blocks that target print (or all media) apply to a PDF.
fn media_applies(at_rule: &str) -> bool {
    let lower = at_rule.to_ascii_lowercase();
    let mut words = lower.split_whitespace();
    words.next() == Some("media") && words.any(|w| w.contains("print") || w.contains("all"))
}

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Resolve the style for an element: inherited text properties, tag
/// defaults, then sheet rules and inline declarations in cascade order.
pub fn resolve_style(
    element: &ElementNode,
    parent: Option<&ComputedStyle>,
    sheet: &Stylesheet,
    ancestors: &[&ElementNode],
) -> ComputedStyle {
    let mut style = inherit(parent);
    apply_tag_defaults(&mut style, &element.tag);

    let inline = element
        .inline_style()
        .map(parse_declarations)
        .unwrap_or_default();
    let matched = sheet.matching(element, ancestors);
    let cascade: Vec<&Declaration> = matched
        .iter()
        .copied()
        .chain(inline.iter())
        .filter(|d| !d.important)
        .chain(
            matched
                .iter()
                .copied()
                .chain(inline.iter())
                .filter(|d| d.important),
        )
        .collect();

    // font-size first: em lengths in the remaining declarations depend on it.
    let parent_font_size = parent.map_or(DEFAULT_FONT_SIZE, |p| p.font_size);
    for decl in cascade.iter().filter(|d| d.property == "font-size") {
        if let Some(size) = parse_font_size(&decl.value, parent_font_size) {
            style.font_size = size;
        }
    }
    for decl in cascade.iter().filter(|d| d.property != "font-size") {
        apply_property(&mut style, &decl.property, &decl.value, parent);
    }
    style
}

/// Copy the inherited (text) properties of the parent onto fresh defaults.
fn inherit(parent: Option<&ComputedStyle>) -> ComputedStyle {
    let mut s = ComputedStyle::default();
    if let Some(p) = parent {
        s.font_size = p.font_size;
        s.font_weight = p.font_weight;
        s.font_family = p.font_family;
        s.font_style = p.font_style;
        s.color = p.color;
        s.text_align = p.text_align;
        s.line_height = p.line_height;
        s.text_decoration = p.text_decoration;
        s.text_transform = p.text_transform;
        s.list_style = p.list_style;
        s.preserve_newlines = p.preserve_newlines;
    }
    s
}

/// User-agent defaults based on tag semantics.
fn apply_tag_defaults(s: &mut ComputedStyle, tag: &Tag) {
    let em = |s: &ComputedStyle, n: f32| Dimension::Pt(s.font_size * n);
    match tag {
        Tag::Body => s.margin = Edges::uniform(Dimension::Pt(6.0)),
        Tag::Heading(level) => {
            const SIZES: [f32; 6] = [2.0, 1.5, 1.17, 1.0, 0.83, 0.67];
            const SPACING: [f32; 6] = [0.67, 0.83, 1.0, 1.33, 1.67, 2.33];
            let i = (*level as usize).clamp(1, 6) - 1;
            s.font_size *= SIZES[i];
            s.font_weight = FontWeight::Bold;
            s.margin.bottom = em(s, SPACING[i]);
        }
        Tag::P => s.margin.bottom = em(s, 1.0),
        Tag::Ul | Tag::Ol => {
            s.margin.bottom = em(s, 1.0);
            s.padding.left = 30.0;
            s.list_style = if *tag == Tag::Ol {
                ListStyle::Decimal
            } else {
                ListStyle::Disc
            };
        }
        Tag::Li => s.display = Display::ListItem,
        Tag::Table => s.display = Display::Table,
        Tag::Tr => s.display = Display::TableRow,
        Tag::Td | Tag::Th => {
            s.display = Display::TableCell;
            s.padding = Edges::uniform(1.5);
            if *tag == Tag::Th {
                s.font_weight = FontWeight::Bold;
                s.text_align = TextAlign::Center;
            }
        }
        Tag::Span | Tag::Br => s.display = Display::Inline,
        Tag::Strong => {
            s.display = Display::Inline;
            s.font_weight = FontWeight::Bold;
        }
        Tag::Em => {
            s.display = Display::Inline;
            s.font_style = FontStyle::Italic;
        }
        Tag::Underline => {
            s.display = Display::Inline;
            s.text_decoration = TextDecoration::Underline;
        }
        Tag::Anchor => {
            s.display = Display::Inline;
            s.text_decoration = TextDecoration::Underline;
            s.color = Color::rgb(0, 0, 238);
        }
        Tag::Small => {
            s.display = Display::Inline;
            s.font_size *= 0.83;
        }
        Tag::Code => {
            s.display = Display::Inline;
            s.font_family = FontFamily::Courier;
        }
        Tag::Pre => {
            s.font_family = FontFamily::Courier;
            s.preserve_newlines = true;
            s.margin.bottom = em(s, 1.0);
        }
        Tag::Blockquote => {
            s.margin.bottom = em(s, 1.0);
            s.margin.left = Dimension::Pt(30.0);
            s.margin.right = Dimension::Pt(30.0);
        }
        Tag::Hr => {
            s.border_width.top = 0.75;
            s.border_color = Color::rgb(128, 128, 128);
            s.margin.top = Dimension::Pt(6.0);
            s.margin.bottom = Dimension::Pt(6.0);
        }
        Tag::Img => s.display = Display::InlineBlock,
        Tag::Head | Tag::Title | Tag::Style | Tag::Script | Tag::Void(_) => {
            s.display = Display::None
        }
        Tag::Html | Tag::Div | Tag::Section(_) | Tag::RowGroup | Tag::Unknown(_) => {}
    }
}

fn apply_property(s: &mut ComputedStyle, prop: &str, val: &str, parent: Option<&ComputedStyle>) {
    let v = val.trim().to_ascii_lowercase();
    let v = v.as_str();
    let fs = s.font_size;

    if v == "inherit" {
        if let Some(p) = parent {
            inherit_property(s, prop, p);
        }
        return;
    }

    match prop {
        "display" => {
            s.display = match v {
                "flex" | "inline-flex" => Display::Flex,
                "grid" | "inline-grid" => Display::Grid,
                "block" => Display::Block,
                "inline" => Display::Inline,
                "inline-block" => Display::InlineBlock,
                "list-item" => Display::ListItem,
                "table" => Display::Table,
                "table-row" => Display::TableRow,
                "table-cell" => Display::TableCell,
                "none" => Display::None,
                _ => s.display,
            }
        }
        "flex-direction" => {
            s.flex_direction = if v.starts_with("column") {
                FlexDirection::Column
            } else {
                FlexDirection::Row
            }
        }
        "flex-wrap" => {
            s.flex_wrap = if v == "nowrap" {
                FlexWrap::NoWrap
            } else {
                FlexWrap::Wrap
            }
        }
        "flex-grow" => s.flex_grow = v.parse().unwrap_or(s.flex_grow),
        "flex-shrink" => s.flex_shrink = v.parse().unwrap_or(s.flex_shrink),
        "flex-basis" => s.flex_basis = parse_dimension(v, fs),
        "flex" => apply_flex_shorthand(s, v),
        "justify-content" => {
            s.justify_content = match v {
                "flex-start" | "start" | "left" | "normal" => JustifyContent::Start,
                "flex-end" | "end" | "right" => JustifyContent::End,
                "center" => JustifyContent::Center,
                "space-between" => JustifyContent::SpaceBetween,
                "space-around" => JustifyContent::SpaceAround,
                "space-evenly" => JustifyContent::SpaceEvenly,
                _ => s.justify_content,
            }
        }
        "align-items" => {
            s.align_items = match v {
                "flex-start" | "start" | "baseline" => AlignItems::Start,
                "flex-end" | "end" => AlignItems::End,
                "center" => AlignItems::Center,
                "stretch" | "normal" => AlignItems::Stretch,
                _ => s.align_items,
            }
        }
        "gap" | "grid-gap" | "column-gap" | "row-gap" => {
            if let Some(first) = v.split_whitespace().next() {
                s.gap = parse_length(first, fs).unwrap_or(s.gap);
            }
        }
        "grid-template-columns" => s.grid_template_columns = parse_grid_tracks(v, fs),

        "width" => s.width = parse_dimension(v, fs),
        "height" => s.height = parse_dimension(v, fs),
        "min-width" => s.min_width = parse_dimension(v, fs),
        "max-width" => s.max_width = parse_dimension(v, fs),
        "min-height" => s.min_height = parse_dimension(v, fs),

        "margin" => {
            let values: Vec<Dimension> = v.split_whitespace().map(|p| parse_dimension(p, fs)).collect();
            if let Some(edges) = Edges::from_shorthand(&values) {
                s.margin = edges;
            }
        }
        "padding" => {
            let values: Option<Vec<f32>> = v.split_whitespace().map(|p| parse_length(p, fs)).collect();
            if let Some(edges) = values.as_deref().and_then(Edges::from_shorthand) {
                s.padding = edges;
            }
        }
        "border" => apply_border(s, None, v),
        "border-width" => {
            let values: Option<Vec<f32>> = v.split_whitespace().map(|p| parse_border_width(p, fs)).collect();
            if let Some(edges) = values.as_deref().and_then(Edges::from_shorthand) {
                s.border_width = edges;
            }
        }
        "border-color" => {
            if let Some(c) = Color::parse(v) {
                s.border_color = c;
            }
        }
        "border-style" if v == "none" || v == "hidden" => s.border_width = Edges::uniform(0.0),

        "font-weight" => {
            s.font_weight = match v {
                "bold" | "bolder" => FontWeight::Bold,
                "normal" | "lighter" => FontWeight::Normal,
                n => match n.parse::<u32>() {
                    Ok(w) if w >= 600 => FontWeight::Bold,
                    Ok(_) => FontWeight::Normal,
                    Err(_) => s.font_weight,
                },
            }
        }
        "font-style" => {
            s.font_style = if v == "italic" || v == "oblique" {
                FontStyle::Italic
            } else {
                FontStyle::Normal
            }
        }
        "font-family" => {
            if let Some(family) = FontFamily::from_css(v) {
                s.font_family = family;
            }
        }
        "color" => {
            if let Some(c) = Color::parse(v) {
                s.color = c;
            }
        }
        "background-color" => {
            if let Some(c) = Color::parse(v) {
                s.background_color = c;
            }
        }
        "background" => {
            if let Some(c) = split_values(v).into_iter().find_map(Color::parse) {
                s.background_color = c;
            }
        }
        "text-align" => {
            s.text_align = match v {
                "center" => TextAlign::Center,
                "right" | "end" => TextAlign::Right,
                _ => TextAlign::Left,
            }
        }
        "text-decoration" | "text-decoration-line" => {
            s.text_decoration = if v.contains("underline") {
                TextDecoration::Underline
            } else {
                TextDecoration::None
            }
        }
        "text-transform" => {
            s.text_transform = match v {
                "uppercase" => TextTransform::Uppercase,
                "lowercase" => TextTransform::Lowercase,
                _ => TextTransform::None,
            }
        }
        "line-height" => {
            if v == "normal" {
                s.line_height = NORMAL_LINE_HEIGHT;
            } else if let Ok(factor) = v.parse::<f32>() {
                s.line_height = factor;
            } else if let Some(pct) = v.strip_suffix('%').and_then(|p| p.parse::<f32>().ok()) {
                s.line_height = pct / 100.0;
            } else if let Some(pt) = parse_length(v, fs) {
                s.line_height = pt / fs;
            }
        }
        "white-space" => s.preserve_newlines = v.starts_with("pre") || v == "break-spaces",
        "list-style" | "list-style-type" => {
            if let Some(style) = v.split_whitespace().find_map(parse_list_style) {
                s.list_style = style;
            }
        }
        "page-break-before" | "break-before" => {
            s.page_break_before = matches!(v, "always" | "page" | "left" | "right")
        }
        "page-break-after" | "break-after" => {
            s.page_break_after = matches!(v, "always" | "page" | "left" | "right")
        }
        "page-break-inside" | "break-inside" => s.page_break_inside_avoid = v.starts_with("avoid"),
        _ => {
            if let Some(rest) = prop.strip_prefix("margin-") {
                if let Some(side) = s.margin.side_mut(rest) {
                    *side = parse_dimension(v, fs);
                }
            } else if let Some(rest) = prop.strip_prefix("padding-") {
                if let (Some(side), Some(pt)) = (s.padding.side_mut(rest), parse_length(v, fs)) {
                    *side = pt;
                }
            } else if let Some(rest) = prop.strip_prefix("border-") {
                apply_border_side(s, rest, v);
            } else {
                log::trace!("unsupported CSS property '{prop}'");
            }
        }
    }
}

fn inherit_property(s: &mut ComputedStyle, prop: &str, p: &ComputedStyle) {
    match prop {
        "color" => s.color = p.color,
        "font-weight" => s.font_weight = p.font_weight,
        "font-style" => s.font_style = p.font_style,
        "font-family" => s.font_family = p.font_family,
        "text-align" => s.text_align = p.text_align,
        "line-height" => s.line_height = p.line_height,
        "background-color" | "background" => s.background_color = p.background_color,
        _ => {}
    }
}

/// `border-top: …`, `border-left-width: …`, `border-bottom-color: …`.
fn apply_border_side(s: &mut ComputedStyle, rest: &str, v: &str) {
    let (side, part) = rest.split_once('-').unwrap_or((rest, ""));
    if s.border_width.side_mut(side).is_none() {
        return;
    }
    match part {
        "" => apply_border(s, Some(side), v),
        "width" => {
            if let (Some(w), Some(slot)) = (parse_border_width(v, s.font_size), s.border_width.side_mut(side)) {
                *slot = w;
            }
        }
        "color" => {
            if let Some(c) = Color::parse(v) {
                s.border_color = c;
            }
        }
        "style" if v == "none" || v == "hidden" => {
            if let Some(slot) = s.border_width.side_mut(side) {
                *slot = 0.0;
            }
        }
        _ => {}
    }
}

/// `border: 1px solid #ccc` on all sides or one side.
fn apply_border(s: &mut ComputedStyle, side: Option<&str>, v: &str) {
    let mut width = None;
    let mut visible = true;
    for token in split_values(v) {
        if token == "none" || token == "hidden" {
            visible = false;
        } else if let Some(c) = Color::parse(token) {
            s.border_color = c;
        } else if let Some(w) = parse_border_width(token, s.font_size) {
            width = Some(w);
        }
    }
    // A border with a style but no width is `medium` (3px).
    let width = if visible { width.unwrap_or(2.25) } else { 0.0 };
    match side.and_then(|side| s.border_width.side_mut(side)) {
        Some(slot) => *slot = width,
        None => s.border_width = Edges::uniform(width),
    }
}

fn parse_border_width(v: &str, fs: f32) -> Option<f32> {
    match v {
        "thin" => Some(0.75),
        "medium" => Some(2.25),
        "thick" => Some(3.75),
        _ => parse_length(v, fs),
    }
}

fn apply_flex_shorthand(s: &mut ComputedStyle, v: &str) {
    let (grow, shrink, basis) = match v {
        "none" => (0.0, 0.0, Dimension::Auto),
        "auto" => (1.0, 1.0, Dimension::Auto),
        _ => {
            let parts: Vec<&str> = v.split_whitespace().collect();
            let grow = parts.first().and_then(|p| p.parse().ok()).unwrap_or(1.0);
            let shrink = parts.get(1).and_then(|p| p.parse().ok()).unwrap_or(1.0);
            let basis = parts
                .iter()
                .skip(1)
                .find(|p| p.parse::<f32>().is_err())
                .map(|p| parse_dimension(p, s.font_size))
                .unwrap_or(Dimension::Pt(0.0));
            (grow, shrink, basis)
        }
    };
    s.flex_grow = grow;
    s.flex_shrink = shrink;
    s.flex_basis = basis;
}

fn parse_list_style(token: &str) -> Option<ListStyle> {
    Some(match token {
        "disc" => ListStyle::Disc,
        "circle" => ListStyle::Circle,
        "square" => ListStyle::Square,
        "decimal" => ListStyle::Decimal,
        "none" => ListStyle::None,
        _ => return None,
    })
}

fn parse_grid_tracks(v: &str, fs: f32) -> Vec<GridTrack> {
    let track = |t: &str| -> GridTrack {
        if let Some(fr) = t.strip_suffix("fr").and_then(|n| n.parse().ok()) {
            GridTrack::Fr(fr)
        } else {
            parse_length(t, fs).map(GridTrack::Pt).unwrap_or(GridTrack::Auto)
        }
    };
    // repeat(3, 1fr)
    if let Some(args) = v.strip_prefix("repeat(").and_then(|r| r.strip_suffix(')')) {
        if let Some((count, size)) = args.split_once(',') {
            if let Ok(n) = count.trim().parse::<usize>() {
                return vec![track(size.trim()); n];
            }
        }
    }
    v.split_whitespace().map(track).collect()
}

/// Split a shorthand value on whitespace, keeping `rgb( … )` groups whole.
fn split_values(v: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    for (i, c) in v.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    out.push(&v[s..i]);
                }
                continue;
            }
            _ => {}
        }
        if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push(&v[s..]);
    }
    out
}

/// A CSS length in points; `em` is relative to `font_size`. Percentages are
/// not lengths here (see [`parse_dimension`]).
pub fn parse_length(value: &str, font_size: f32) -> Option<f32> {
    let v = value.trim();
    let split = v
        .find(|c: char| c.is_ascii_alphabetic() || c == '%')
        .unwrap_or(v.len());
    let (number, unit) = v.split_at(split);
    let n: f32 = number.trim().parse().ok()?;
    if !n.is_finite() {
        return None;
    }
    let factor = match unit.to_ascii_lowercase().as_str() {
        "em" => font_size,
        "rem" => DEFAULT_FONT_SIZE,
        "%" => return None,
        other => unit_factor(other)?,
    };
    Some(n * factor)
}

fn parse_dimension(v: &str, font_size: f32) -> Dimension {
    if v == "auto" {
        Dimension::Auto
    } else if let Some(pct) = v.strip_suffix('%') {
        pct.trim()
            .parse::<f32>()
            .map(Dimension::Percent)
            .unwrap_or(Dimension::Auto)
    } else {
        parse_length(v, font_size)
            .map(Dimension::Pt)
            .unwrap_or(Dimension::Auto)
    }
}

fn parse_font_size(v: &str, parent: f32) -> Option<f32> {
    let v = v.trim().to_ascii_lowercase();
    Some(match v.as_str() {
        "xx-small" => 6.75,
        "x-small" => 7.5,
        "small" => 9.75,
        "medium" => DEFAULT_FONT_SIZE,
        "large" => 13.5,
        "x-large" => 18.0,
        "xx-large" => 24.0,
        "smaller" => parent * 0.83,
        "larger" => parent * 1.2,
        other => match other.strip_suffix('%') {
            Some(pct) => parent * pct.trim().parse::<f32>().ok()? / 100.0,
            None => parse_length(other, parent)?,
        },
    })
    .filter(|size| *size > 0.0)
}

// ---------------------------------------------------------------------------
// Styled DOM tree
// ---------------------------------------------------------------------------

/// A DOM node annotated with its computed style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        tag: Tag,
        style: ComputedStyle,
        children: Vec<StyledNode>,
        /// Element attributes (image `src`, `width`, `height`).
        attrs: HashMap<String, String>,
    },
    Text {
        text: String,
        /// The enclosing element's style (text properties only are read).
        style: ComputedStyle,
    },
}

impl StyledNode {
    pub fn style(&self) -> &ComputedStyle {
        match self {
            StyledNode::Element { style, .. } | StyledNode::Text { style, .. } => style,
        }
    }
}

/// Style `root` (normally `<body>`) and its subtree.
pub fn build_styled_tree(root: &ElementNode, sheet: &Stylesheet) -> StyledNode {
    let mut ancestors = Vec::new();
    style_element(root, None, sheet, &mut ancestors)
}

fn style_element<'a>(
    element: &'a ElementNode,
    parent: Option<&ComputedStyle>,
    sheet: &Stylesheet,
    ancestors: &mut Vec<&'a ElementNode>,
) -> StyledNode {
    let style = resolve_style(element, parent, sheet, ancestors);
    ancestors.push(element);
    let children = element
        .children
        .iter()
        .filter_map(|child| match child {
            DomNode::Element(e) => Some(style_element(e, Some(&style), sheet, ancestors)),
            DomNode::Text(text) if !text.is_empty() => Some(StyledNode::Text {
                text: text.clone(),
                style: inherit(Some(&style)),
            }),
            DomNode::Text(_) => None,
        })
        .collect();
    ancestors.pop();
    StyledNode::Element {
        tag: element.tag.clone(),
        style,
        children,
        attrs: element.attributes.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_document;

    /// Style a document and return the computed style of the first element
    /// carrying `id`.
    fn style_of(html: &str, id: &str) -> ComputedStyle {
        let doc = parse_document(html).unwrap();
        let sheet = Stylesheet::parse(&doc.stylesheet);
        let tree = build_styled_tree(&doc.body(), &sheet);
        find(&tree, id).unwrap_or_else(|| panic!("no element #{id}"))
    }

    fn find(node: &StyledNode, id: &str) -> Option<ComputedStyle> {
        match node {
            StyledNode::Element {
                style,
                children,
                attrs,
                ..
            } => {
                if attrs.get("id").map(String::as_str) == Some(id) {
                    return Some(style.clone());
                }
                children.iter().find_map(|c| find(c, id))
            }
            StyledNode::Text { .. } => None,
        }
    }

    #[test]
    fn inline_style_font_size_and_color() {
        let s = style_of(r#"<p id="t" style="font-size: 24px; color: #ff0000">x</p>"#, "t");
        assert_eq!(s.font_size, 18.0);
        assert!((s.color.r - 1.0).abs() < 0.01);
    }

    #[test]
    fn color_syntaxes() {
        let c = Color::parse("#ff8800").unwrap();
        assert!((c.g - 0.533).abs() < 0.01);
        assert_eq!(Color::parse("#fff"), Some(Color::WHITE));
        assert_eq!(Color::parse("rgb(255, 0, 0)"), Some(Color::rgb(255, 0, 0)));
        let translucent = Color::parse("rgba(0, 0, 0, 0.5)").unwrap();
        assert!((translucent.a - 0.5).abs() < 1e-6);
        assert!((translucent.over_white().r - 0.5).abs() < 1e-6);
        assert_eq!(Color::parse("Navy"), Some(Color::rgb(0, 0, 128)));
        assert_eq!(Color::parse("not-a-colour"), None);
    }

    #[test]
    fn specificity_beats_source_order() {
        let html = r#"<style>
            #card { color: green }
            .name { color: blue }
            p { color: red }
        </style><p id="card" class="name">x</p>"#;
        assert_eq!(style_of(html, "card").color, Color::rgb(0, 128, 0));
    }

    #[test]
    fn later_rule_wins_on_equal_specificity() {
        let html = r#"<style>.a { color: red } .b { color: blue }</style>
            <p id="t" class="b a">x</p>"#;
        assert_eq!(style_of(html, "t").color, Color::rgb(0, 0, 255));
    }

    #[test]
    fn descendant_and_child_combinators() {
        let html = r#"<style>
            .card p { font-weight: bold }
            .card > p { font-style: italic }
        </style>
        <div class="card"><section><p id="deep">x</p></section><p id="direct">y</p></div>"#;
        let deep = style_of(html, "deep");
        assert_eq!(deep.font_weight, FontWeight::Bold);
        assert_eq!(deep.font_style, FontStyle::Normal);
        let direct = style_of(html, "direct");
        assert_eq!(direct.font_style, FontStyle::Italic);
    }

    #[test]
    fn selector_lists_and_compounds() {
        let html = r#"<style>h1, div.title { text-align: center }</style>
            <div id="plain">a</div><div id="titled" class="title">b</div>"#;
        assert_eq!(style_of(html, "plain").text_align, TextAlign::Left);
        assert_eq!(style_of(html, "titled").text_align, TextAlign::Center);
    }

    #[test]
    fn inline_beats_sheet_and_important_beats_inline() {
        let html = r#"<style>
            p { color: red; background: yellow !important }
        </style><p id="t" style="color: blue; background: white">x</p>"#;
        let s = style_of(html, "t");
        assert_eq!(s.color, Color::rgb(0, 0, 255));
        assert_eq!(s.background_color, Color::rgb(255, 255, 0));
    }

    #[test]
    fn unsupported_selectors_and_screen_media_are_skipped() {
        let sheet = Stylesheet::parse(
            "a:hover { color: red } input[type=text] { color: red } \
             @media screen { p { color: red } } /* p { color: red } */",
        );
        assert!(sheet.is_empty());

        let print = Stylesheet::parse("@media print { p { color: red } }");
        assert!(!print.is_empty());
    }

    #[test]
    fn text_properties_inherit_box_properties_do_not() {
        let html = r#"<div style="color: teal; background: silver; padding: 4pt">
            <span id="inner">x</span></div>"#;
        let s = style_of(html, "inner");
        assert_eq!(s.color, Color::rgb(0, 128, 128));
        assert!(s.background_color.is_transparent());
        assert_eq!(s.padding.left, 0.0);
    }

    #[test]
    fn em_lengths_follow_own_font_size() {
        let html = r#"<div style="font-size: 20pt"><p id="t" style="font-size: 0.5em; margin-top: 2em">x</p></div>"#;
        let s = style_of(html, "t");
        assert_eq!(s.font_size, 10.0);
        assert_eq!(s.margin.top, Dimension::Pt(20.0));
    }

    #[test]
    fn shorthands() {
        let html = r#"<div id="t" style="margin: 0 auto; padding: 1pt 2pt 3pt; border: 1px solid #ccc; border-left-width: 3pt; flex: 1">x</div>"#;
        let s = style_of(html, "t");
        assert_eq!(s.margin.left, Dimension::Auto);
        assert_eq!(s.margin.top, Dimension::Pt(0.0));
        assert_eq!(s.padding.left, 2.0);
        assert_eq!(s.padding.bottom, 3.0);
        assert_eq!(s.border_width.top, 0.75);
        assert_eq!(s.border_width.left, 3.0);
        assert_eq!(s.border_color, Color::rgb(204, 204, 204));
        assert_eq!(s.flex_grow, 1.0);
        assert_eq!(s.flex_basis, Dimension::Pt(0.0));
    }

    #[test]
    fn user_agent_defaults() {
        let html = r#"<h1 id="h">T</h1><ol id="o"><li>a</li></ol><a id="a">l</a>"#;
        let h = style_of(html, "h");
        assert_eq!(h.font_size, 24.0);
        assert_eq!(h.font_weight, FontWeight::Bold);
        assert_eq!(style_of(html, "o").list_style, ListStyle::Decimal);
        assert_eq!(style_of(html, "a").text_decoration, TextDecoration::Underline);
    }

    #[test]
    fn grid_tracks() {
        assert_eq!(
            parse_grid_tracks("repeat(3, 1fr)", 12.0),
            vec![GridTrack::Fr(1.0); 3]
        );
        assert_eq!(
            parse_grid_tracks("100px 2fr", 12.0),
            vec![GridTrack::Pt(75.0), GridTrack::Fr(2.0)]
        );
    }
}
