//! Post-processing: infer document structure from raw converter HTML.
//!
//! ## Why is post-processing necessary?
//!
//! The conversion engine reproduces what the author *typed*, not what they
//! *meant*. Authors routinely fake structure with formatting:
//!
//! - A section title is a paragraph containing one bold run, not a heading
//! - A list is a series of paragraphs starting with `•` or `1.`
//! - Images carry inline `style` sizes copied from the page layout
//!
//! This module applies cheap, deterministic regex passes over the serialized
//! markup that promote those patterns to semantic HTML. Each pass is a pure
//! function (`&str → String`), never fails, and leaves input it does not
//! recognise untouched.
//!
//! ## Pass Order
//!
//! 1. Promote bold-only paragraphs to `<h2>`
//! 2. Wrap every table in a `div.table-wrap` container
//! 3. Infer lists from marker-prefixed paragraphs
//! 4. Normalise images (drop inline `style`, add `loading="lazy"`)
//! 5. Assign slug ids to headings that have none
//!
//! Table wrapping must precede list inference: the list pass relies on table
//! regions already being delimited so it never lists cell paragraphs.

use super::lists::{infer_lists, text_only};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Id used when a heading's text slugifies to nothing.
pub const FALLBACK_SLUG: &str = "section";

/// Maximum slug length in characters.
pub const MAX_SLUG_CHARS: usize = 80;

/// Longest bold-only paragraph (in characters) still treated as a heading.
pub const MAX_HEADING_CHARS: usize = 80;

/// Apply the structural passes in their canonical order.
pub fn process_all(input: &str) -> String {
    let s = promote_strong_paragraphs(input);
    let s = wrap_tables(&s);
    let s = infer_lists(&s);
    let s = normalise_images(&s);
    add_heading_ids(&s)
}

// ── Slugs ────────────────────────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_SLUG_JUNK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\-\x{4e00}-\x{9fff}]+").unwrap());

/// Derive a readable identifier from heading text.
///
/// Whitespace runs become a single `-`, everything except word characters,
/// hyphens and CJK ideographs is dropped, and the result is cut to
/// [`MAX_SLUG_CHARS`] characters.
pub fn slugify(text: &str) -> String {
    let s = RE_WHITESPACE.replace_all(text.trim(), "-");
    let s = RE_SLUG_JUNK.replace_all(&s, "");
    let slug: String = s.chars().take(MAX_SLUG_CHARS).collect();
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

// ── Pass 1: Promote bold-only paragraphs ─────────────────────────────────────

static RE_PARAGRAPH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").unwrap());
static RE_STRONG_BODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^\s*<strong\b[^>]*>(.*)</strong>\s*$").unwrap());
static RE_NUMBERED_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[.\d]*\s+").unwrap());

fn promote_strong_paragraphs(input: &str) -> String {
    RE_PARAGRAPH
        .replace_all(input, |caps: &Captures<'_>| {
            let Some(body) = RE_STRONG_BODY.captures(&caps[1]) else {
                return caps[0].to_string();
            };
            let content = body[1].trim();
            // Exactly one bold run: `<strong>a</strong> b <strong>c</strong>` is not a title.
            if content.contains("<strong") || content.contains("</strong") {
                return caps[0].to_string();
            }
            let text = text_only(content);
            let is_numbered = RE_NUMBERED_TITLE.is_match(&text);
            if is_numbered || text.chars().count() <= MAX_HEADING_CHARS {
                format!("<h2 id=\"{}\">{}</h2>", slugify(&text), content)
            } else {
                caps[0].to_string()
            }
        })
        .to_string()
}

// ── Pass 2: Wrap tables ──────────────────────────────────────────────────────

static RE_TABLE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<table\b").unwrap());
static RE_TABLE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</table\s*>").unwrap());

/// Every table gets its own container; nesting is not tracked.
fn wrap_tables(input: &str) -> String {
    let s = RE_TABLE_OPEN.replace_all(input, "<div class=\"table-wrap\">$0");
    RE_TABLE_CLOSE
        .replace_all(&s, "$0</div>")
        .to_string()
}

// ── Pass 4: Normalise images ─────────────────────────────────────────────────

static RE_IMG_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(<img\b[^>]*?)\s+style\s*=\s*(?:"[^"]*"|'[^']*')([^>]*>)"#).unwrap()
});
static RE_IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<img\b([^>]*?)\s*(/?)>").unwrap());
static RE_LOADING_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\sloading\s*=").unwrap());

fn normalise_images(input: &str) -> String {
    let s = RE_IMG_STYLE.replace_all(input, "$1$2");
    RE_IMG_TAG
        .replace_all(&s, |caps: &Captures<'_>| {
            let attrs = &caps[1];
            if RE_LOADING_ATTR.is_match(attrs) {
                return caps[0].to_string();
            }
            let slash = if caps[2].is_empty() { "" } else { " /" };
            format!("<img{} loading=\"lazy\"{}>", attrs.trim_end(), slash)
        })
        .to_string()
}

// ── Pass 5: Heading ids ──────────────────────────────────────────────────────

static RE_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(h[1-6])\b([^>]*)>(.*?)(</h[1-6]\s*>)").unwrap());
static RE_ID_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\sid\s*=").unwrap());

/// Give every `h1`–`h6` without an `id` one derived from its text.
///
/// Ids are not de-duplicated; two headings with the same text share an id.
fn add_heading_ids(input: &str) -> String {
    RE_HEADING
        .replace_all(input, |caps: &Captures<'_>| {
            let attrs = &caps[2];
            if RE_ID_ATTR.is_match(attrs) {
                return caps[0].to_string();
            }
            let inner = &caps[3];
            format!(
                "<{tag} id=\"{id}\"{attrs}>{inner}{close}",
                tag = &caps[1],
                id = slugify(&text_only(inner)),
                close = &caps[4],
            )
        })
        .to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("1. 概述"), "1-概述");
        assert_eq!(slugify("  Hello   World! "), "Hello-World");
        assert_eq!(slugify("!!!"), FALLBACK_SLUG);
        assert_eq!(slugify(""), FALLBACK_SLUG);
    }

    #[test]
    fn test_slugify_truncates_by_chars() {
        let long = "标".repeat(200);
        let slug = slugify(&long);
        assert_eq!(slug.chars().count(), MAX_SLUG_CHARS);
    }

    #[test]
    fn test_promote_numbered_title() {
        assert_eq!(
            promote_strong_paragraphs("<p><strong>1. 概述</strong></p>"),
            "<h2 id=\"1-概述\">1. 概述</h2>"
        );
    }

    #[test]
    fn test_promote_short_bold() {
        assert_eq!(
            promote_strong_paragraphs("<p> <strong>Background</strong> </p>"),
            "<h2 id=\"Background\">Background</h2>"
        );
    }

    #[test]
    fn test_long_bold_paragraph_is_emphasis() {
        let input = format!("<p><strong>{}</strong></p>", "word ".repeat(30));
        assert_eq!(promote_strong_paragraphs(&input), input);
    }

    #[test]
    fn test_long_numbered_bold_is_still_heading() {
        let title = format!("2.1 {}", "x".repeat(100));
        let out = promote_strong_paragraphs(&format!("<p><strong>{title}</strong></p>"));
        assert!(out.starts_with("<h2 id=\"21-"), "got: {out}");
    }

    #[test]
    fn test_mixed_paragraph_not_promoted() {
        let input = "<p><strong>Note:</strong> plain text</p>";
        assert_eq!(promote_strong_paragraphs(input), input);
        let two_runs = "<p><strong>a</strong> and <strong>b</strong></p>";
        assert_eq!(promote_strong_paragraphs(two_runs), two_runs);
    }

    #[test]
    fn test_rejected_paragraph_does_not_swallow_next() {
        assert_eq!(
            promote_strong_paragraphs("<p><strong>Note:</strong> text</p><p><strong>Next</strong></p>"),
            "<p><strong>Note:</strong> text</p><h2 id=\"Next\">Next</h2>"
        );
    }

    #[test]
    fn test_wrap_tables() {
        assert_eq!(
            wrap_tables("<table><tr><td>1</td></tr></table><TABLE class=\"x\"></TABLE>"),
            "<div class=\"table-wrap\"><table><tr><td>1</td></tr></table></div>\
             <div class=\"table-wrap\"><TABLE class=\"x\"></TABLE></div>"
        );
    }

    #[test]
    fn test_image_style_stripped_and_lazy_added() {
        assert_eq!(
            normalise_images("<img src=\"a.png\" style=\"width:10px\">"),
            "<img src=\"a.png\" loading=\"lazy\">"
        );
    }

    #[test]
    fn test_image_self_closing() {
        assert_eq!(
            normalise_images("<img src=\"a.png\" alt=\"x\" />"),
            "<img src=\"a.png\" alt=\"x\" loading=\"lazy\" />"
        );
    }

    #[test]
    fn test_image_existing_loading_kept() {
        let input = "<img LOADING=\"eager\" src=\"a.png\">";
        assert_eq!(normalise_images(input), input);
    }

    #[test]
    fn test_image_data_loading_is_not_loading() {
        assert_eq!(
            normalise_images("<img src=\"a.png\" data-loading=\"x\">"),
            "<img src=\"a.png\" data-loading=\"x\" loading=\"lazy\">"
        );
    }

    #[test]
    fn test_heading_data_id_is_not_id() {
        assert_eq!(
            add_heading_ids("<h2 data-id=\"7\">Scope</h2>"),
            "<h2 id=\"Scope\" data-id=\"7\">Scope</h2>"
        );
    }

    #[test]
    fn test_image_normalisation_is_idempotent() {
        let input = "<p><img src=\"a.png\" style=\"width:1px\"><img src='b.png' style='x' alt=\"b\"/></p>";
        let once = normalise_images(input);
        assert_eq!(normalise_images(&once), once);
        assert_eq!(once.matches("loading=").count(), 2);
    }

    #[test]
    fn test_heading_ids_added() {
        assert_eq!(
            add_heading_ids("<h3 class=\"t\">Getting <em>Started</em></h3>"),
            "<h3 id=\"Getting-Started\" class=\"t\">Getting <em>Started</em></h3>"
        );
    }

    #[test]
    fn test_heading_ids_never_overwritten() {
        let input = "<h1 id=\"keep-me\">Title</h1>";
        assert_eq!(add_heading_ids(input), input);
    }

    #[test]
    fn test_heading_ids_duplicates_allowed() {
        let out = add_heading_ids("<h2>Same</h2><h2>Same</h2>");
        assert_eq!(out.matches("id=\"Same\"").count(), 2);
    }

    #[test]
    fn test_empty_heading_gets_fallback() {
        assert_eq!(add_heading_ids("<h4></h4>"), "<h4 id=\"section\"></h4>");
    }

    #[test]
    fn test_process_all_pipeline() {
        let input = "<p><strong>1. 概述</strong></p>\
                     <p>• 第一项</p><p>• 第二项</p>\
                     <table><tr><td><p>• cell</p><p>• cell</p></td></tr></table>\
                     <img src=\"a.png\" style=\"width:10px\">\
                     <h3>Tail</h3>";
        assert_eq!(
            process_all(input),
            "<h2 id=\"1-概述\">1. 概述</h2>\
             <ul><li>第一项</li><li>第二项</li></ul>\
             <div class=\"table-wrap\"><table><tr><td><p>• cell</p><p>• cell</p></td></tr></table></div>\
             <img src=\"a.png\" loading=\"lazy\">\
             <h3 id=\"Tail\">Tail</h3>"
        );
    }

    #[test]
    fn test_process_all_plain_text_untouched() {
        let input = "<p>• 仅一项</p><p>普通段落</p>";
        assert_eq!(process_all(input), input);
    }
}
