//! HTML parser – converts an HTML string into a simple DOM tree.
//!
//! The parser is tolerant in the way browsers are for everyday mistakes
//! (missing `</li>`, stray closing tags, unclosed elements at end of input)
//! but rejects input it cannot make sense of: a `<` that opens a tag which is
//! never closed with `>`, or a comment that never ends.
//!
//! `<style>` contents are collected into [`Document::stylesheet`], `<title>`
//! into [`Document::title`]; `<script>` contents are dropped.

use std::collections::HashMap;

use crate::error::RenderError;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Body,
    Title,
    Style,
    Script,
    Div,
    P,
    /// `h1` – `h6`.
    Heading(u8),
    Ul,
    Ol,
    Li,
    Table,
    Tr,
    Td,
    Th,
    Span,
    Strong,
    Em,
    Underline,
    Anchor,
    Small,
    Code,
    Pre,
    Blockquote,
    Br,
    Hr,
    Img,
    /// Sectioning elements laid out as plain blocks (`section`, `header`, ...).
    Section(String),
    /// `thead` / `tbody` / `tfoot`; their rows are hoisted into the table.
    RowGroup,
    /// Elements that never have children and never render (`meta`, `link`).
    Void(String),
    /// Anything else – laid out as a block.
    Unknown(String),
}

impl Tag {
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "body" => Tag::Body,
            "title" => Tag::Title,
            "style" => Tag::Style,
            "script" => Tag::Script,
            "div" => Tag::Div,
            "p" => Tag::P,
            "h1" => Tag::Heading(1),
            "h2" => Tag::Heading(2),
            "h3" => Tag::Heading(3),
            "h4" => Tag::Heading(4),
            "h5" => Tag::Heading(5),
            "h6" => Tag::Heading(6),
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "table" => Tag::Table,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "span" => Tag::Span,
            "strong" | "b" => Tag::Strong,
            "em" | "i" => Tag::Em,
            "u" => Tag::Underline,
            "a" => Tag::Anchor,
            "small" => Tag::Small,
            "code" => Tag::Code,
            "pre" => Tag::Pre,
            "blockquote" => Tag::Blockquote,
            "br" => Tag::Br,
            "hr" => Tag::Hr,
            "img" => Tag::Img,
            "section" | "header" | "footer" | "article" | "main" | "nav" | "aside"
            | "address" | "figure" | "figcaption" => Tag::Section(lower),
            "thead" | "tbody" | "tfoot" => Tag::RowGroup,
            "meta" | "link" | "base" | "input" | "col" | "wbr" => Tag::Void(lower),
            _ => Tag::Unknown(lower),
        }
    }

    /// Canonical lowercase name, used for selector matching.
    pub fn name(&self) -> &str {
        match self {
            Tag::Html => "html",
            Tag::Head => "head",
            Tag::Body => "body",
            Tag::Title => "title",
            Tag::Style => "style",
            Tag::Script => "script",
            Tag::Div => "div",
            Tag::P => "p",
            Tag::Heading(1) => "h1",
            Tag::Heading(2) => "h2",
            Tag::Heading(3) => "h3",
            Tag::Heading(4) => "h4",
            Tag::Heading(5) => "h5",
            Tag::Heading(_) => "h6",
            Tag::Ul => "ul",
            Tag::Ol => "ol",
            Tag::Li => "li",
            Tag::Table => "table",
            Tag::Tr => "tr",
            Tag::Td => "td",
            Tag::Th => "th",
            Tag::Span => "span",
            Tag::Strong => "strong",
            Tag::Em => "em",
            Tag::Underline => "u",
            Tag::Anchor => "a",
            Tag::Small => "small",
            Tag::Code => "code",
            Tag::Pre => "pre",
            Tag::Blockquote => "blockquote",
            Tag::Br => "br",
            Tag::Hr => "hr",
            Tag::Img => "img",
            Tag::RowGroup => "tbody",
            Tag::Section(n) | Tag::Void(n) | Tag::Unknown(n) => n,
        }
    }

    /// Elements with no content model: no children, no closing tag.
    pub fn is_void(&self) -> bool {
        matches!(self, Tag::Br | Tag::Hr | Tag::Img | Tag::Void(_))
    }

    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            Tag::Span
                | Tag::Strong
                | Tag::Em
                | Tag::Underline
                | Tag::Anchor
                | Tag::Small
                | Tag::Code
                | Tag::Br
        )
    }

    /// Elements that carry no visible content of their own.
    pub fn is_metadata(&self) -> bool {
        matches!(
            self,
            Tag::Head | Tag::Title | Tag::Style | Tag::Script | Tag::Void(_)
        )
    }

    /// Raw-text elements: their content is not parsed as markup.
    fn is_raw_text(&self) -> bool {
        matches!(self, Tag::Style | Tag::Script | Tag::Title)
    }
}

#[derive(Debug, Clone)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attr("style")
    }

    pub fn src(&self) -> Option<&str> {
        self.attr("src")
    }
}

/// A parsed HTML document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub nodes: Vec<DomNode>,
    /// Text of the first `<title>` element.
    pub title: Option<String>,
    /// Concatenated contents of every `<style>` element, in document order.
    pub stylesheet: String,
}

impl Document {
    /// The `<body>` element, or a synthesized body wrapping every
    /// non-metadata node for fragments without one.
    pub fn body(&self) -> ElementNode {
        if let Some(body) = find_element(&self.nodes, &Tag::Body) {
            return body.clone();
        }
        let mut body = ElementNode::new(Tag::Body);
        body.children = content_nodes(&self.nodes);
        body
    }

    /// True when the body holds any visible text or an image.
    pub fn has_content(&self) -> bool {
        has_content(&self.body().children)
    }
}

fn find_element<'a>(nodes: &'a [DomNode], tag: &Tag) -> Option<&'a ElementNode> {
    nodes.iter().find_map(|node| match node {
        DomNode::Element(e) if &e.tag == tag => Some(e),
        DomNode::Element(e) => find_element(&e.children, tag),
        DomNode::Text(_) => None,
    })
}

/// Strip `<html>` / `<head>` wrappers from a fragment.
fn content_nodes(nodes: &[DomNode]) -> Vec<DomNode> {
    let mut out = Vec::new();
    for node in nodes {
        match node {
            DomNode::Element(e) if e.tag == Tag::Html => out.extend(content_nodes(&e.children)),
            DomNode::Element(e) if e.tag.is_metadata() => {}
            other => out.push(other.clone()),
        }
    }
    out
}

fn has_content(nodes: &[DomNode]) -> bool {
    nodes.iter().any(|node| match node {
        DomNode::Text(t) => !t.trim().is_empty(),
        DomNode::Element(e) if e.tag == Tag::Img => true,
        DomNode::Element(e) if e.tag.is_metadata() => false,
        DomNode::Element(e) => has_content(&e.children),
    })
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse an HTML document.
pub fn parse_document(html: &str) -> Result<Document, RenderError> {
    let mut parser = Parser::new(html);
    let mut open: Vec<String> = Vec::new();
    let mut nodes = Vec::new();
    loop {
        nodes.extend(parser.parse_nodes(&mut open)?);
        if parser.eof() {
            break;
        }
        // Stray closing tag at top level.
        parser.skip_closing_tag()?;
    }
    Ok(Document {
        nodes,
        title: parser.title,
        stylesheet: parser.stylesheet,
    })
}

/// Parse a fragment and return only its nodes.
pub fn parse_html(html: &str) -> Result<Vec<DomNode>, RenderError> {
    Ok(parse_document(html)?.nodes)
}

/// Deepest element nesting accepted before the document is rejected.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Text or an element that flows inline with text.
fn flows_inline(node: &DomNode) -> bool {
    match node {
        DomNode::Text(t) => !t.trim().is_empty(),
        DomNode::Element(e) => e.tag.is_inline() || e.tag == Tag::Img,
    }
}

fn is_blank(node: &DomNode) -> bool {
    matches!(node, DomNode::Text(t) if t.trim().is_empty())
}

/// Keep whitespace-only text (collapsed to one space) only between two
/// inline siblings; drop it next to block-level or metadata elements.
fn drop_block_whitespace(nodes: Vec<DomNode>) -> Vec<DomNode> {
    let keep: Vec<bool> = (0..nodes.len())
        .map(|i| {
            if !is_blank(&nodes[i]) {
                return true;
            }
            let prev = nodes[..i].iter().rev().find(|n| !is_blank(n));
            let next = nodes[i + 1..].iter().find(|n| !is_blank(n));
            prev.is_some_and(flows_inline) && next.is_some_and(flows_inline)
        })
        .collect();
    nodes
        .into_iter()
        .zip(keep)
        .filter_map(|(node, keep)| match node {
            _ if !keep => None,
            DomNode::Text(t) if t.trim().is_empty() => Some(DomNode::Text(" ".to_string())),
            other => Some(other),
        })
        .collect()
}

/// Elements implicitly closed when a sibling of the same kind opens.
fn closes_implicitly(open: &str, next: &str) -> bool {
    match open {
        "li" => next == "li",
        "td" | "th" => matches!(next, "td" | "th" | "tr"),
        "tr" => next == "tr",
        "p" => !Tag::from_name(next).is_inline() && next != "img",
        _ => false,
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    title: Option<String>,
    stylesheet: String,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            title: None,
            stylesheet: String::new(),
        }
    }

    /// Parse sibling nodes until end of input, a closing tag, or a start tag
    /// that implicitly closes the innermost open element.
    fn parse_nodes(&mut self, open: &mut Vec<String>) -> Result<Vec<DomNode>, RenderError> {
        let mut nodes = Vec::new();
        loop {
            if self.eof() || self.starts_with("</") {
                break;
            }
            if let (Some(current), Some(next)) = (open.last(), self.peek_start_tag()) {
                if closes_implicitly(current, &next) {
                    break;
                }
            }
            if self.starts_with("<!--") {
                self.skip_comment()?;
            } else if self.starts_with("<!") || self.starts_with("<?") {
                self.skip_declaration()?;
            } else if self.peek_start_tag().is_some() {
                let elem = self.parse_element(open)?;
                if elem.tag == Tag::RowGroup {
                    nodes.extend(elem.children);
                } else if !elem.tag.is_raw_text() {
                    nodes.push(DomNode::Element(elem));
                }
            } else {
                nodes.push(self.parse_text());
            }
        }
        Ok(drop_block_whitespace(nodes))
    }

    fn parse_text(&mut self) -> DomNode {
        let start = self.pos;
        // A lone '<' that does not open a tag is literal text.
        self.advance(1);
        while !self.eof() && !self.at_markup() {
            self.advance(1);
        }
        DomNode::Text(decode_entities(&self.input[start..self.pos]))
    }

    fn parse_element(&mut self, open: &mut Vec<String>) -> Result<ElementNode, RenderError> {
        let start = self.pos;
        self.advance(1); // '<'
        let name = self.parse_name();
        let mut elem = ElementNode::new(Tag::from_name(&name));

        loop {
            self.skip_whitespace();
            if self.eof() {
                return Err(RenderError::Parse { offset: start });
            }
            if self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            if self.starts_with("/") {
                self.advance(1);
                continue;
            }
            let (key, value) = self.parse_attribute()?;
            if key.is_empty() {
                // Junk inside the tag; skip one character to make progress.
                self.advance(1);
                continue;
            }
            elem.attributes.entry(key).or_insert(value);
        }

        let self_closed = self.starts_with("/>");
        self.advance(if self_closed { 2 } else { 1 });
        if self_closed || elem.tag.is_void() {
            return Ok(elem);
        }

        if elem.tag.is_raw_text() {
            let text = self.parse_raw_text(elem.tag.name());
            match &elem.tag {
                Tag::Style => {
                    self.stylesheet.push_str(&text);
                    self.stylesheet.push('\n');
                }
                Tag::Title if self.title.is_none() => {
                    let t = decode_entities(text.trim());
                    if !t.is_empty() {
                        self.title = Some(t);
                    }
                }
                _ => {}
            }
            return Ok(elem);
        }

        if open.len() >= MAX_NESTING_DEPTH {
            return Err(RenderError::NestingTooDeep {
                offset: start,
                limit: MAX_NESTING_DEPTH,
            });
        }
        let own = elem.tag.name().to_string();
        open.push(own.clone());
        let ancestors = open.len() - 1;

        loop {
            elem.children.extend(self.parse_nodes(open)?);
            if self.eof() || !self.starts_with("</") {
                // End of input or implicit close.
                break;
            }
            let save = self.pos;
            let closing = self.skip_closing_tag()?;
            if closing == own || Tag::from_name(&closing).name() == own {
                break;
            }
            if open[..ancestors].iter().any(|o| *o == closing) {
                // Closes an ancestor: end this element and let the ancestor
                // consume the tag.
                self.pos = save;
                break;
            }
            log::debug!("ignoring stray </{closing}> inside <{own}>");
        }
        open.pop();
        Ok(elem)
    }

    /// Consume `</name ... >` and return the lowercased name.
    fn skip_closing_tag(&mut self) -> Result<String, RenderError> {
        let start = self.pos;
        self.advance(2);
        let name = self.parse_name().to_ascii_lowercase();
        while !self.eof() && !self.starts_with(">") {
            self.advance(1);
        }
        if self.eof() {
            return Err(RenderError::Parse { offset: start });
        }
        self.advance(1);
        Ok(name)
    }

    /// Read up to (and consume) `</name>`; the content is not parsed.
    fn parse_raw_text(&mut self, name: &str) -> String {
        let rest = &self.input[self.pos..];
        let close = format!("</{name}");
        let end = rest
            .to_ascii_lowercase()
            .find(&close)
            .unwrap_or(rest.len());
        let text = rest[..end].to_string();
        self.pos += end;
        if !self.eof() {
            self.pos += close.len();
            while !self.eof() && !self.starts_with(">") {
                self.advance(1);
            }
            if !self.eof() {
                self.advance(1);
            }
        }
        text
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.advance(1);
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(&mut self) -> Result<(String, String), RenderError> {
        let key = self.parse_name().to_ascii_lowercase();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return Ok((key, String::new()));
        }
        self.advance(1);
        self.skip_whitespace();
        let value = self.parse_attr_value()?;
        Ok((key, value))
    }

    fn parse_attr_value(&mut self) -> Result<String, RenderError> {
        let quote = match self.current_char() {
            Some(q @ ('"' | '\'')) => q,
            _ => {
                let start = self.pos;
                while let Some(c) = self.current_char() {
                    if c.is_whitespace() || c == '>' {
                        break;
                    }
                    if c == '/' && self.input[self.pos..].starts_with("/>") {
                        break;
                    }
                    self.advance(1);
                }
                return Ok(decode_entities(&self.input[start..self.pos]));
            }
        };
        let start = self.pos;
        self.advance(1);
        let value_start = self.pos;
        while let Some(c) = self.current_char() {
            if c == quote {
                break;
            }
            self.advance(1);
        }
        if self.eof() {
            return Err(RenderError::Parse { offset: start });
        }
        let value = decode_entities(&self.input[value_start..self.pos]);
        self.advance(1);
        Ok(value)
    }

    /// If the input is at a start tag, return its lowercased name.
    fn peek_start_tag(&self) -> Option<String> {
        let rest = self.input[self.pos..].strip_prefix('<')?;
        let first = rest.chars().next()?;
        if !first.is_ascii_alphabetic() {
            return None;
        }
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_' || c == ':'))
            .unwrap_or(rest.len());
        Some(rest[..len].to_ascii_lowercase())
    }

    /// True at anything the text scanner must stop for.
    fn at_markup(&self) -> bool {
        self.starts_with("</")
            || self.starts_with("<!")
            || self.starts_with("<?")
            || self.peek_start_tag().is_some()
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance(1);
        }
    }

    fn skip_comment(&mut self) -> Result<(), RenderError> {
        let start = self.pos;
        match self.input[self.pos + 4..].find("-->") {
            Some(end) => {
                self.pos += 4 + end + 3;
                Ok(())
            }
            None => Err(RenderError::Parse { offset: start }),
        }
    }

    fn skip_declaration(&mut self) -> Result<(), RenderError> {
        let start = self.pos;
        match self.input[self.pos..].find('>') {
            Some(end) => {
                self.pos += end + 1;
                Ok(())
            }
            None => Err(RenderError::Parse { offset: start }),
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Advance by `n` characters (not bytes).
    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            if let Some(c) = self.current_char() {
                self.pos += c.len_utf8();
            }
        }
    }
}

/// Decode the character references this renderer supports.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&tail[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "trade" => '\u{2122}',
        "euro" => '\u{20AC}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "bull" => '\u{2022}',
        "middot" => '\u{00B7}',
        "hellip" => '\u{2026}',
        _ => return None,
    })
}
