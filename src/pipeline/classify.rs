//! Paragraph classification: does this paragraph look like a list item?
//!
//! Word processors frequently export "manual" lists: paragraphs whose text
//! starts with a typed bullet glyph or number rather than real list markup.
//! [`classify_paragraph`] recognises those markers on the text-only
//! projection of a paragraph.
//!
//! Rules are checked in order and the first match wins:
//!
//! 1. Bullet glyph (`•●○◦·`) or ASCII marker (`-`, `*`) + whitespace → bullet
//! 2. Arabic numeral + `.` / `、` / `)` + whitespace → numbered
//! 3. Parenthesised Arabic or CJK numeral (`(1)`, `（一）`) + whitespace → numbered
//! 4. CJK numeral + `、` + whitespace → numbered

use once_cell::sync::Lazy;
use regex::Regex;

/// The kind of list a paragraph marker implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// Rendered as `<ul>`.
    Bullet,
    /// Rendered as `<ol>`.
    Numbered,
}

impl ListKind {
    /// Wrapper element name for this kind.
    pub fn tag(self) -> &'static str {
        match self {
            ListKind::Bullet => "ul",
            ListKind::Numbered => "ol",
        }
    }
}

/// A paragraph recognised as a list candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: ListKind,
    /// Paragraph text with the marker removed.
    pub item_text: String,
}

static RE_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^[•●○◦·\-*]\s+(.+)$").unwrap());

static RE_ARABIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^\d+[.、)]\s+(.+)$").unwrap());

static RE_PARENTHESISED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^[(（](?:\d+|[一二三四五六七八九十百千零〇]+)[)）]\s+(.+)$").unwrap()
});

static RE_CJK_NUMERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^[一二三四五六七八九十百千零〇]+、\s+(.+)$").unwrap());

/// Classify the text-only projection of one paragraph.
///
/// Leading and trailing whitespace is trimmed before matching. Returns
/// `None` for ordinary paragraphs.
pub fn classify_paragraph(text: &str) -> Option<Classification> {
    let text = text.trim();
    let rules: [(&Lazy<Regex>, ListKind); 4] = [
        (&RE_BULLET, ListKind::Bullet),
        (&RE_ARABIC, ListKind::Numbered),
        (&RE_PARENTHESISED, ListKind::Numbered),
        (&RE_CJK_NUMERAL, ListKind::Numbered),
    ];

    rules.iter().find_map(|(re, kind)| {
        re.captures(text).map(|caps| Classification {
            kind: *kind,
            item_text: caps[1].trim().to_string(),
        })
    })
}
