//! List inference: turn runs of marker-prefixed paragraphs into real lists.
//!
//! The converter emits a manually typed list as a sequence of `<p>`
//! elements whose text starts with `•`, `1.`, `（一）` and so on. This pass
//! walks the fragment as a flat stream of paragraph and non-paragraph
//! segments and rewrites each qualifying run into `<ul>`/`<ol>` markup.
//!
//! ## Rules
//!
//! - A list opens only when the current paragraph *and* the next paragraph
//!   classify to the same kind. A lone bullet-like sentence stays a
//!   paragraph.
//! - An open list is extended while paragraphs keep the same kind and is
//!   closed by a paragraph of another kind, an unmarked paragraph, any
//!   non-whitespace markup between paragraphs (headings, tables, divs,
//!   block quotes…), or the end of input.
//! - Nothing inside a table region is ever turned into a list item. Table
//!   regions are tracked with a depth counter bumped by every `<table` and
//!   lowered by every `</table>` seen in the stream.
//!
//! Whitespace between paragraphs does not break a run; it is carried over
//! so the output keeps the converter's line structure.

use super::classify::{classify_paragraph, Classification, ListKind};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_PARAGRAPH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").unwrap());
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static RE_TABLE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<table\b").unwrap());
static RE_TABLE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</table\s*>").unwrap());

#[derive(Debug)]
enum Segment<'a> {
    Paragraph { raw: &'a str, inner: &'a str },
    Other(&'a str),
}

impl Segment<'_> {
    fn raw(&self) -> &str {
        match self {
            Segment::Paragraph { raw, .. } => raw,
            Segment::Other(text) => text,
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, Segment::Other(text) if text.trim().is_empty())
    }
}

fn split_segments(html: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut last = 0;
    for caps in RE_PARAGRAPH.captures_iter(html) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Other(&html[last..whole.start()]));
        }
        segments.push(Segment::Paragraph {
            raw: whole.as_str(),
            inner: inner.as_str(),
        });
        last = whole.end();
    }
    if last < html.len() {
        segments.push(Segment::Other(&html[last..]));
    }
    segments
}

/// Strip all markup, leaving the text-only projection of a fragment.
pub fn text_only(html: &str) -> String {
    RE_TAG.replace_all(html, "").trim().to_string()
}

fn table_markers(text: &str) -> (usize, usize) {
    (
        RE_TABLE_OPEN.find_iter(text).count(),
        RE_TABLE_CLOSE.find_iter(text).count(),
    )
}

fn classify_segment(segment: &Segment<'_>) -> Option<Classification> {
    match segment {
        Segment::Paragraph { inner, .. } => classify_paragraph(&text_only(inner)),
        Segment::Other(_) => None,
    }
}

/// Kind of the next paragraph after `index`, if it directly follows
/// (only whitespace in between) and sits outside any table marker.
fn following_kind(segments: &[Segment<'_>], index: usize) -> Option<ListKind> {
    let next = segments[index + 1..].iter().find(|s| !s.is_blank())?;
    match next {
        Segment::Paragraph { raw, .. } if table_markers(raw) == (0, 0) => {
            classify_segment(next).map(|c| c.kind)
        }
        _ => None,
    }
}

/// Output builder that remembers the open list and defers inter-paragraph
/// whitespace so a closing tag lands right after the last item.
struct ListWriter {
    out: String,
    open: Option<ListKind>,
    pending_ws: String,
}

impl ListWriter {
    fn push_item(&mut self, kind: ListKind, item_text: &str) {
        if self.open.is_none() {
            self.out.push('<');
            self.out.push_str(kind.tag());
            self.out.push('>');
            self.open = Some(kind);
        } else {
            self.out.push_str(&self.pending_ws);
            self.pending_ws.clear();
        }
        self.out.push_str("<li>");
        self.out.push_str(item_text);
        self.out.push_str("</li>");
    }

    fn close(&mut self) {
        if let Some(kind) = self.open.take() {
            self.out.push_str("</");
            self.out.push_str(kind.tag());
            self.out.push('>');
        }
        self.out.push_str(&self.pending_ws);
        self.pending_ws.clear();
    }

    fn push_raw(&mut self, text: &str) {
        self.close();
        self.out.push_str(text);
    }
}

/// Rewrite runs of two or more same-kind list paragraphs into list markup.
pub fn infer_lists(html: &str) -> String {
    let segments = split_segments(html);
    let mut writer = ListWriter {
        out: String::with_capacity(html.len() + 64),
        open: None,
        pending_ws: String::new(),
    };
    let mut table_depth: usize = 0;

    for (index, segment) in segments.iter().enumerate() {
        let (opens, closes) = table_markers(segment.raw());
        let in_table = table_depth > 0 || opens > 0;
        table_depth = table_depth.saturating_add(opens).saturating_sub(closes);

        if segment.is_blank() {
            if writer.open.is_some() {
                writer.pending_ws.push_str(segment.raw());
            } else {
                writer.out.push_str(segment.raw());
            }
            continue;
        }

        let classification = if in_table {
            None
        } else {
            classify_segment(segment)
        };

        match classification {
            Some(c) if writer.open == Some(c.kind) => writer.push_item(c.kind, &c.item_text),
            Some(c) => {
                writer.close();
                if following_kind(&segments, index) == Some(c.kind) {
                    writer.push_item(c.kind, &c.item_text);
                } else {
                    writer.push_raw(segment.raw());
                }
            }
            None => writer.push_raw(segment.raw()),
        }
    }

    writer.close();
    writer.out
}
