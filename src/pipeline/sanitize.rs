//! Sanitisation: the security boundary before HTML is stored or served.
//!
//! Converter output is untrusted: a document can embed arbitrary HTML
//! fragments, event-handler attributes or `javascript:` links. The
//! [`Sanitizer`] enforces an [`AllowListPolicy`] with `ammonia` (an
//! html5ever-based cleaner), then links bare URLs in text and wraps the
//! result in a single root container.
//!
//! There is no passthrough mode. A policy that cannot be enforced is
//! rejected when the sanitizer is constructed, which happens while the
//! configuration is built, so a misconfigured process never starts serving
//! uncleaned markup.

use crate::error::Fei2HtmlError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Value forced onto every anchor's `rel` attribute.
pub const LINK_REL: &str = "noopener noreferrer";

/// Class carried by the root container by default.
pub const DEFAULT_ROOT_CLASS: &str = "lark-article";

/// Elements whose *content* is dropped along with the tag.
const CONTENT_DROPPING_TAGS: [&str; 2] = ["script", "style"];

/// Which elements, and which attributes per element, survive sanitisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowListPolicy {
    /// Every element name that may appear in the output.
    pub tags: BTreeSet<String>,
    /// Attributes permitted per element. Elements not listed keep none.
    pub attributes: BTreeMap<String, BTreeSet<String>>,
}

impl Default for AllowListPolicy {
    fn default() -> Self {
        let tags = [
            "p", "br", "strong", "em", "u", "s", "span", "a", "img", "ul", "ol", "li",
            "blockquote", "pre", "code", "h1", "h2", "h3", "h4", "h5", "h6", "table", "thead",
            "tbody", "tr", "th", "td", "figure", "figcaption", "sup", "sub",
        ];
        let mut attributes: Vec<(&str, &[&str])> = vec![
            ("a", &["href", "title", "target", "rel"]),
            ("img", &["src", "alt", "title", "width", "height", "loading"]),
            ("td", &["colspan", "rowspan", "align"]),
            ("th", &["colspan", "rowspan", "align"]),
            ("span", &["class"]),
            ("code", &["class"]),
            ("p", &["class"]),
            ("pre", &["class"]),
        ];
        for heading in ["h1", "h2", "h3", "h4", "h5", "h6"] {
            attributes.push((heading, &["id"]));
        }

        Self {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            attributes: attributes
                .into_iter()
                .map(|(tag, attrs)| {
                    (
                        tag.to_string(),
                        attrs.iter().map(|a| a.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl AllowListPolicy {
    /// Check the policy can be enforced as written.
    pub fn validate(&self) -> Result<(), Fei2HtmlError> {
        for tag in CONTENT_DROPPING_TAGS {
            if self.tags.contains(tag) {
                return Err(Fei2HtmlError::InvalidConfig(format!(
                    "allow-list must not permit <{tag}>"
                )));
            }
        }
        for (tag, attrs) in &self.attributes {
            if !self.tags.contains(tag) {
                return Err(Fei2HtmlError::InvalidConfig(format!(
                    "attributes listed for <{tag}>, which is not an allowed element"
                )));
            }
            if let Some(bad) = attrs.iter().find(|a| a.to_ascii_lowercase().starts_with("on")) {
                return Err(Fei2HtmlError::InvalidConfig(format!(
                    "event-handler attribute '{bad}' cannot be allowed on <{tag}>"
                )));
            }
        }
        Ok(())
    }
}

/// An allow-list sanitiser bound to one policy and root class.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    policy: AllowListPolicy,
    root_class: String,
}

impl Default for Sanitizer {
    /// The built-in allow-list with the `lark-article` root class.
    fn default() -> Self {
        Self {
            policy: AllowListPolicy::default(),
            root_class: DEFAULT_ROOT_CLASS.to_string(),
        }
    }
}

static RE_ROOT_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][\w-]*$").unwrap());
// Quoted attribute values may contain a literal `>`.
static RE_MARKUP_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<(?:[^>"']|"[^"]*"|'[^']*')*>"#).unwrap());
// `\s` is Unicode-aware, so U+00A0 ends a URL.
static RE_BARE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bhttps?://[^\s<>"']+"#).unwrap());
static RE_ANCHOR_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^<a\b").unwrap());
static RE_ANCHOR_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^</a\s*>").unwrap());

impl Sanitizer {
    /// Build a sanitiser, refusing policies that cannot be enforced.
    pub fn new(policy: AllowListPolicy, root_class: impl Into<String>) -> Result<Self, Fei2HtmlError> {
        let root_class = root_class.into();
        if !RE_ROOT_CLASS.is_match(&root_class) {
            return Err(Fei2HtmlError::InvalidConfig(format!(
                "root class '{root_class}' is not a valid CSS class name"
            )));
        }
        policy.validate()?;
        Ok(Self { policy, root_class })
    }

    pub fn policy(&self) -> &AllowListPolicy {
        &self.policy
    }

    pub fn root_class(&self) -> &str {
        &self.root_class
    }

    /// Clean `html`, link bare URLs and wrap it in the root container.
    ///
    /// Idempotent: the root container itself is not an allowed element, so
    /// sanitising sanitised output unwraps and re-wraps it identically.
    pub fn sanitize(&self, html: &str) -> String {
        let cleaned = self.builder().clean(html).to_string();
        let linked = linkify(&cleaned);
        format!("<div class=\"{}\">{}</div>", self.root_class, linked)
    }

    fn builder(&self) -> ammonia::Builder<'_> {
        let tags: HashSet<&str> = self.policy.tags.iter().map(String::as_str).collect();
        let tag_attributes: HashMap<&str, HashSet<&str>> = self
            .policy
            .attributes
            .iter()
            .map(|(tag, attrs)| {
                let attrs = attrs
                    .iter()
                    .map(String::as_str)
                    // `rel` is owned by `link_rel`; ammonia refuses both at once.
                    .filter(|a| !(tag == "a" && *a == "rel"))
                    .collect();
                (tag.as_str(), attrs)
            })
            .collect();

        let mut builder = ammonia::Builder::default();
        builder
            .tags(tags)
            .tag_attributes(tag_attributes)
            .generic_attributes(HashSet::new())
            .clean_content_tags(CONTENT_DROPPING_TAGS.into_iter().collect())
            .strip_comments(true)
            .link_rel(Some(LINK_REL));
        builder
    }
}

/// Wrap bare `http(s)://` URLs found in text (outside anchors) in links.
///
/// Operates on already-cleaned markup, so text is known to be escaped and
/// tags well-formed.
fn linkify(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut anchor_depth: usize = 0;
    let mut last = 0;

    for tag in RE_MARKUP_TOKEN.find_iter(html) {
        let text = &html[last..tag.start()];
        push_text(&mut out, text, anchor_depth > 0);

        let token = tag.as_str();
        if RE_ANCHOR_OPEN.is_match(token) {
            anchor_depth += 1;
        } else if RE_ANCHOR_CLOSE.is_match(token) {
            anchor_depth = anchor_depth.saturating_sub(1);
        }
        out.push_str(token);
        last = tag.end();
    }
    push_text(&mut out, &html[last..], anchor_depth > 0);
    out
}

fn push_text(out: &mut String, text: &str, inside_anchor: bool) {
    if inside_anchor || !text.contains("://") {
        out.push_str(text);
        return;
    }
    // URLs are found on decoded text so entities never end up inside one.
    let decoded = html_escape::decode_html_entities(text);
    let mut last = 0;
    for m in RE_BARE_URL.find_iter(&decoded) {
        let url = m
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', '(']);
        let href = html_escape::encode_double_quoted_attribute(url);
        let label = escape_text(url);
        out.push_str(&escape_text(&decoded[last..m.start()]));
        out.push_str(&format!("<a href=\"{href}\" rel=\"{LINK_REL}\">{label}</a>"));
        last = m.start() + url.len();
    }
    out.push_str(&escape_text(&decoded[last..]));
}

/// Escape text the way ammonia serialises it, `&nbsp;` included.
fn escape_text(text: &str) -> String {
    html_escape::encode_text(text).replace('\u{a0}', "&nbsp;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sanitizer() -> Sanitizer {
        Sanitizer::new(AllowListPolicy::default(), DEFAULT_ROOT_CLASS).unwrap()
    }

    #[test]
    fn script_removed_with_content() {
        assert_eq!(
            sanitizer().sanitize("<script>alert(1)</script><p>hi</p>"),
            "<div class=\"lark-article\"><p>hi</p></div>"
        );
    }

    #[test]
    fn empty_input_still_wrapped() {
        assert_eq!(sanitizer().sanitize(""), "<div class=\"lark-article\"></div>");
    }

    #[test]
    fn disallowed_tag_stripped_text_kept() {
        assert_eq!(
            sanitizer().sanitize("<div class=\"table-wrap\"><font color=\"red\">text</font></div>"),
            "<div class=\"lark-article\">text</div>"
        );
    }

    #[test]
    fn disallowed_attributes_stripped() {
        assert_eq!(
            sanitizer().sanitize("<p class=\"lead\" onclick=\"x()\" style=\"color:red\">a</p>"),
            "<div class=\"lark-article\"><p class=\"lead\">a</p></div>"
        );
    }

    #[test]
    fn heading_ids_and_image_attrs_kept() {
        let out = sanitizer()
            .sanitize("<h2 id=\"1-概述\">1. 概述</h2><img src=\"/assets/d/a.png\" loading=\"lazy\" onerror=\"x\">");
        assert!(out.contains("<h2 id=\"1-概述\">1. 概述</h2>"), "got: {out}");
        assert!(out.contains("<img src=\"/assets/d/a.png\" loading=\"lazy\">"), "got: {out}");
    }

    #[test]
    fn anchors_get_rel() {
        let out = sanitizer().sanitize("<a href=\"https://example.org\" rel=\"opener\">x</a>");
        assert!(out.contains("rel=\"noopener noreferrer\""), "got: {out}");
        assert!(!out.contains("rel=\"opener\""));
    }

    #[test]
    fn javascript_links_lose_href() {
        let out = sanitizer().sanitize("<a href=\"javascript:alert(1)\">x</a>");
        assert!(!out.contains("javascript"), "got: {out}");
    }

    #[test]
    fn bare_urls_are_linked() {
        assert_eq!(
            sanitizer().sanitize("<p>see https://example.org/a?b=1.</p>"),
            "<div class=\"lark-article\"><p>see <a href=\"https://example.org/a?b=1\" rel=\"noopener noreferrer\">https://example.org/a?b=1</a>.</p></div>"
        );
    }

    #[test]
    fn angle_bracketed_url_keeps_entities_outside_link() {
        let s = sanitizer();
        let once = s.sanitize("<p>see &lt;https://x.test&gt; now</p>");
        assert_eq!(
            once,
            "<div class=\"lark-article\"><p>see &lt;<a href=\"https://x.test\" rel=\"noopener noreferrer\">https://x.test</a>&gt; now</p></div>"
        );
        assert_eq!(s.sanitize(&once), once);
    }

    #[test]
    fn ampersand_in_query_stays_escaped() {
        let s = sanitizer();
        let once = s.sanitize("<p>https://x.test/q?a=1&amp;b=2</p>");
        assert_eq!(
            once,
            "<div class=\"lark-article\"><p><a href=\"https://x.test/q?a=1&amp;b=2\" rel=\"noopener noreferrer\">https://x.test/q?a=1&amp;b=2</a></p></div>"
        );
        assert_eq!(s.sanitize(&once), once);
    }

    #[test]
    fn non_breaking_space_ends_url() {
        let s = sanitizer();
        let once = s.sanitize("<p>see https://x.test\u{a0}next word</p>");
        assert_eq!(
            once,
            "<div class=\"lark-article\"><p>see <a href=\"https://x.test\" rel=\"noopener noreferrer\">https://x.test</a>&nbsp;next word</p></div>"
        );
        assert_eq!(s.sanitize(&once), once);
    }

    #[test]
    fn urls_inside_anchors_not_relinked() {
        let out = sanitizer().sanitize("<a href=\"https://a.test\">https://a.test</a>");
        assert_eq!(out.matches("<a ").count(), 1, "got: {out}");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let s = sanitizer();
        for input in [
            "<script>alert(1)</script><p>hi</p>",
            "<p>visit http://x.test/path now</p><a href=\"/local\">l</a>",
            "<div class=\"table-wrap\"><table><tr><td colspan=\"2\" style=\"x\">c</td></tr></table></div>",
            "<h2 id=\"a\">A &amp; B</h2><ul><li>一</li></ul><!-- comment -->",
        ] {
            let once = s.sanitize(input);
            assert_eq!(s.sanitize(&once), once, "input: {input}");
        }
    }

    #[test]
    fn urls_in_attribute_values_not_linked() {
        let out = sanitizer().sanitize("<img title=\"x>https://evil.test\" src=\"a.png\">");
        assert!(!out.contains("<a "), "got: {out}");
        assert!(out.contains("src=\"a.png\""), "got: {out}");
    }

    #[test]
    fn every_anchor_carries_rel() {
        let out = sanitizer().sanitize(
            "<a href=\"/a\">a</a><p>https://b.test</p><a href=\"https://c.test\" target=\"_blank\">c</a>",
        );
        let anchors = out.matches("<a ").count();
        assert_eq!(anchors, 3, "got: {out}");
        assert_eq!(out.matches("rel=\"noopener noreferrer\"").count(), anchors);
    }

    #[test]
    fn policy_rejects_script() {
        let mut policy = AllowListPolicy::default();
        policy.tags.insert("script".into());
        assert!(matches!(
            Sanitizer::new(policy, DEFAULT_ROOT_CLASS),
            Err(Fei2HtmlError::InvalidConfig(_))
        ));
    }

    #[test]
    fn policy_rejects_attrs_for_unknown_tag() {
        let mut policy = AllowListPolicy::default();
        policy
            .attributes
            .insert("div".into(), ["class".to_string()].into_iter().collect());
        assert!(Sanitizer::new(policy, DEFAULT_ROOT_CLASS).is_err());
    }

    #[test]
    fn policy_rejects_event_handlers() {
        let mut policy = AllowListPolicy::default();
        policy
            .attributes
            .get_mut("img")
            .unwrap()
            .insert("onerror".into());
        assert!(Sanitizer::new(policy, DEFAULT_ROOT_CLASS).is_err());
    }

    #[test]
    fn root_class_validated() {
        assert!(Sanitizer::new(AllowListPolicy::default(), "").is_err());
        assert!(Sanitizer::new(AllowListPolicy::default(), "a\"><script>").is_err());
        assert_eq!(
            Sanitizer::new(AllowListPolicy::default(), "doc-body")
                .unwrap()
                .sanitize("<p>x</p>"),
            "<div class=\"doc-body\"><p>x</p></div>"
        );
    }

    #[test]
    fn default_sanitizer_is_valid() {
        let s = Sanitizer::default();
        assert_eq!(s.root_class(), DEFAULT_ROOT_CLASS);
        assert_eq!(s.sanitize("<p>x</p>"), sanitizer().sanitize("<p>x</p>"));
    }

    #[test]
    fn default_policy_matches_published_table() {
        let p = AllowListPolicy::default();
        assert!(p.tags.contains("figcaption"));
        assert!(!p.tags.contains("div"));
        assert_eq!(p.attributes["h3"].iter().collect::<Vec<_>>(), vec!["id"]);
        assert!(p.attributes["td"].contains("rowspan"));
        assert!(!p.attributes.contains_key("ul"));
        p.validate().unwrap();
    }
}
