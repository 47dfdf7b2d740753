//! Text measurement and line breaking for the PDF builtin fonts.
//!
//! The renderer only emits the standard-14 builtin fonts, so measurement uses
//! their AFM advance widths (1/1000 em) instead of parsing font files. Times
//! bold/italic reuse the roman widths scaled slightly; Courier is monospaced.

/// Generic font family, mapped onto a builtin PDF font at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontFamily {
    #[default]
    Helvetica,
    Times,
    Courier,
}

impl FontFamily {
    /// Pick a family from a CSS `font-family` list (first recognised entry wins).
    pub fn from_css(value: &str) -> Option<Self> {
        value.split(',').find_map(|name| {
            let name = name.trim().trim_matches(|c| c == '"' || c == '\'');
            match name.to_ascii_lowercase().as_str() {
                "helvetica" | "arial" | "sans-serif" | "verdana" | "tahoma" | "system-ui"
                | "liberation sans" | "open sans" | "roboto" => Some(FontFamily::Helvetica),
                "times" | "times new roman" | "serif" | "georgia" | "garamond" => {
                    Some(FontFamily::Times)
                }
                "courier" | "courier new" | "monospace" | "consolas" | "menlo" => {
                    Some(FontFamily::Courier)
                }
                _ => None,
            }
        })
    }
}

/// Family plus weight/style: identifies one builtin font face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct FontSpec {
    pub family: FontFamily,
    pub bold: bool,
    pub italic: bool,
}

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    278, 278, 584, 584, 584, 556, 1015,
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    278, 278, 278, 469, 556, 333,
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

#[rustfmt::skip]
const TIMES_ROMAN: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    278, 278, 564, 564, 564, 444, 921,
    722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889,
    722, 722, 556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611,
    333, 278, 333, 469, 500, 333,
    444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778,
    500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444,
    480, 200, 480, 541,
];

const COURIER_ADVANCE: u16 = 600;

/// Advance width of `c` in 1/1000 em.
fn advance(c: char, font: FontSpec) -> f32 {
    if font.family == FontFamily::Courier {
        return COURIER_ADVANCE as f32;
    }
    let c = if c == '\u{00A0}' { ' ' } else { c };
    let table = match (font.family, font.bold) {
        (FontFamily::Times, _) => &TIMES_ROMAN,
        (_, true) => &HELVETICA_BOLD,
        (_, false) => &HELVETICA,
    };
    let base = match c as u32 {
        code @ 32..=126 => table[(code - 32) as usize] as f32,
        // Latin-1 letters and other glyphs: use the width of 'n'.
        _ => table[(b'n' - 32) as usize] as f32,
    };
    match (font.family, font.bold) {
        (FontFamily::Times, true) => base * 1.05,
        _ => base,
    }
}

/// Width of `text` in points at `size`.
pub fn text_width(text: &str, font: FontSpec, size: f32) -> f32 {
    text.chars().map(|c| advance(c, font)).sum::<f32>() * size / 1000.0
}

/// Distance from the top of the em box to the baseline, as a fraction of
/// the font size.
pub fn ascent_ratio(family: FontFamily) -> f32 {
    match family {
        FontFamily::Helvetica => 0.718,
        FontFamily::Times => 0.683,
        FontFamily::Courier => 0.629,
    }
}

// ---------------------------------------------------------------------------
// Line breaking
// ---------------------------------------------------------------------------

/// A run of text sharing one font, size and line-height factor.
#[derive(Debug, Clone)]
pub struct TextRun<'a> {
    pub text: &'a str,
    pub font: FontSpec,
    pub size: f32,
    pub line_height: f32,
}

impl TextRun<'_> {
    fn line_height_pt(&self) -> f32 {
        self.size * self.line_height
    }

    /// Baseline offset from the top of a line of this run's height.
    fn ascent_pt(&self) -> f32 {
        (self.line_height_pt() - self.size) / 2.0 + self.size * ascent_ratio(self.font.family)
    }
}

/// Consecutive text from one run placed on one line.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Index into the runs slice passed to [`break_lines`].
    pub run: usize,
    pub text: String,
    /// Offset from the start of the line.
    pub x: f32,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineBox {
    pub fragments: Vec<Fragment>,
    pub width: f32,
    pub height: f32,
    /// Baseline offset from the top of the line.
    pub ascent: f32,
}

impl LineBox {
    fn empty() -> Self {
        Self {
            fragments: Vec::new(),
            width: 0.0,
            height: 0.0,
            ascent: 0.0,
        }
    }

    fn include_run(&mut self, run: &TextRun<'_>) {
        self.height = self.height.max(run.line_height_pt());
        self.ascent = self.ascent.max(run.ascent_pt());
    }

    fn push(&mut self, run_index: usize, run: &TextRun<'_>, text: &str, width: f32) {
        self.include_run(run);
        match self.fragments.last_mut() {
            Some(last) if last.run == run_index => {
                last.text.push_str(text);
                last.width += width;
            }
            _ => self.fragments.push(Fragment {
                run: run_index,
                text: text.to_string(),
                x: self.width,
                width,
            }),
        }
        self.width += width;
    }
}

/// Break styled runs into lines no wider than `max_width` (a single word
/// wider than the line is kept whole). Whitespace collapses to single spaces
/// across run boundaries; `'\n'` forces a break.
pub fn break_lines(runs: &[TextRun<'_>], max_width: f32) -> Vec<LineBox> {
    let mut lines = Vec::new();
    let mut line = LineBox::empty();
    // A collapsed space waiting to be emitted before the next word.
    let mut pending_space: Option<usize> = None;

    for (index, run) in runs.iter().enumerate() {
        let mut rest = run.text;
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('\n') {
                line.include_run(run);
                lines.push(std::mem::replace(&mut line, LineBox::empty()));
                pending_space = None;
                rest = after;
                continue;
            }
            let first = rest.chars().next().unwrap_or(' ');
            if first.is_whitespace() && first != '\u{00A0}' {
                let end = rest
                    .find(|c: char| !c.is_whitespace() || c == '\n' || c == '\u{00A0}')
                    .unwrap_or(rest.len());
                if !line.fragments.is_empty() {
                    pending_space = Some(index);
                }
                rest = &rest[end..];
                continue;
            }

            let end = rest
                .find(|c: char| c.is_whitespace() && c != '\u{00A0}')
                .unwrap_or(rest.len());
            let word = &rest[..end];
            rest = &rest[end..];

            let word_width = text_width(word, run.font, run.size);
            let space = pending_space.map(|i| (i, text_width(" ", runs[i].font, runs[i].size)));
            let needed = word_width + space.map(|(_, w)| w).unwrap_or(0.0);

            if !line.fragments.is_empty() && line.width + needed > max_width {
                lines.push(std::mem::replace(&mut line, LineBox::empty()));
            } else if let Some((space_run, space_width)) = space {
                line.push(space_run, &runs[space_run], " ", space_width);
            }
            pending_space = None;
            line.push(index, run, word, word_width);
        }
    }

    if !line.fragments.is_empty() || line.height > 0.0 {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helvetica() -> FontSpec {
        FontSpec::default()
    }

    fn run(text: &str, size: f32) -> TextRun<'_> {
        TextRun {
            text,
            font: helvetica(),
            size,
            line_height: 1.2,
        }
    }

    #[test]
    fn afm_text_width() {
        // H e l l o = 722 + 556 + 222 + 222 + 556
        let w = text_width("Hello", helvetica(), 10.0);
        assert!((w - 22.78).abs() < 0.01, "got {w}");
    }

    #[test]
    fn bold_is_wider_and_courier_is_monospaced() {
        let bold = FontSpec {
            bold: true,
            ..helvetica()
        };
        assert!(text_width("Hello", bold, 12.0) > text_width("Hello", helvetica(), 12.0));

        let courier = FontSpec {
            family: FontFamily::Courier,
            ..helvetica()
        };
        assert_eq!(text_width("iiii", courier, 10.0), text_width("WWWW", courier, 10.0));
    }

    #[test]
    fn css_family_lists() {
        assert_eq!(
            FontFamily::from_css("\"Fancy Font\", Georgia, serif"),
            Some(FontFamily::Times)
        );
        assert_eq!(FontFamily::from_css("monospace"), Some(FontFamily::Courier));
        assert_eq!(FontFamily::from_css("Wingdings"), None);
    }

    #[test]
    fn wraps_at_max_width() {
        let runs = [run("Hello world foo bar", 16.0)];
        let lines = break_lines(&runs, 60.0);
        assert!(lines.len() >= 2, "expected wrapping, got {lines:?}");
        for line in &lines {
            assert!(line.width <= 60.0 || line.fragments[0].text.split(' ').count() == 1);
        }
    }

    #[test]
    fn whitespace_collapses_across_runs() {
        let runs = [run("Hello   ", 12.0), run("  world", 12.0)];
        let lines = break_lines(&runs, 1000.0);
        assert_eq!(lines.len(), 1);
        let text: String = lines[0].fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(text, "Hello world");
        assert_eq!(lines[0].fragments.len(), 2);
        assert_eq!(lines[0].fragments[1].x, lines[0].fragments[0].width);
    }

    #[test]
    fn newline_forces_break_and_sets_height() {
        let runs = [run("one\ntwo", 10.0), run("\n", 20.0)];
        let lines = break_lines(&runs, 1000.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].fragments[0].text, "one");
        assert!((lines[0].height - 12.0).abs() < 1e-4);
        // The second line holds "two" and ends with the 20pt break.
        assert!((lines[1].height - 24.0).abs() < 1e-4);
    }

    #[test]
    fn tallest_run_sets_line_height() {
        let runs = [run("small ", 10.0), run("BIG", 30.0)];
        let lines = break_lines(&runs, 1000.0);
        assert_eq!(lines.len(), 1);
        assert!((lines[0].height - 36.0).abs() < 1e-4);
    }

    #[test]
    fn empty_input_has_no_lines() {
        assert!(break_lines(&[run("   ", 12.0)], 100.0).is_empty());
        assert!(break_lines(&[], 100.0).is_empty());
    }
}
