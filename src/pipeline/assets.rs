//! Asset URL rewriting: point `<img src>` at durable storage URLs.
//!
//! The engine references extracted media by a path inside its scratch
//! directory, which disappears as soon as the conversion ends. Once every
//! asset has been stored, [`rewrite_image_sources`] swaps each such path for
//! the URL the store returned.
//!
//! Matching is by **file name only**: `media/image1.png` and
//! `/tmp/x/media/image1.png` both map to whatever was stored as
//! `image1.png`. Two different assets sharing a name collide and the last
//! one stored wins. This is safe only because every conversion writes into
//! a fresh per-document namespace.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use tracing::debug;

static RE_IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<img\b[^>]*>").unwrap());
// The attribute name must follow whitespace, so `data-src` is not `src`.
static RE_SRC_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)(\s)src\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());

/// Last path component of a `/` or `\` separated reference.
pub fn basename(reference: &str) -> &str {
    reference
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(reference)
}

/// Collapse a `local path → URL` map into a `file name → URL` map.
///
/// Entries are applied in key order so a name collision resolves the same
/// way on every run.
pub fn filename_map(local_to_url: &HashMap<String, String>) -> HashMap<String, String> {
    let mut entries: Vec<(&String, &String)> = local_to_url.iter().collect();
    entries.sort();
    let mut by_name = HashMap::with_capacity(entries.len());
    for (local, url) in entries {
        let name = basename(local);
        if name.is_empty() {
            continue;
        }
        if let Some(previous) = by_name.insert(name.to_string(), url.clone()) {
            debug!("Asset name '{}' collides; '{}' replaced by '{}'", name, previous, url);
        }
    }
    by_name
}

/// Rewrite every image `src` whose file name has a stored counterpart.
///
/// Sources without a match are left exactly as they were.
pub fn rewrite_image_sources(html: &str, local_to_url: &HashMap<String, String>) -> String {
    if local_to_url.is_empty() {
        return html.to_string();
    }
    let by_name = filename_map(local_to_url);

    RE_IMG_TAG
        .replace_all(html, |tag: &Captures<'_>| {
            RE_SRC_ATTR
                .replace(&tag[0], |src: &Captures<'_>| {
                    let (value, quote) = match (src.get(2), src.get(3)) {
                        (Some(v), _) => (v.as_str(), '"'),
                        (None, Some(v)) => (v.as_str(), '\''),
                        (None, None) => return src[0].to_string(),
                    };
                    match by_name.get(basename(value)) {
                        Some(url) => format!("{}src={quote}{url}{quote}", &src[1]),
                        None => src[0].to_string(),
                    }
                })
                .into_owned()
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("media/a.png"), "a.png");
        assert_eq!(basename("/tmp/x/media/a.png"), "a.png");
        assert_eq!(basename(r"C:\scratch\media\a.png"), "a.png");
        assert_eq!(basename("a.png"), "a.png");
    }

    #[test]
    fn test_filename_match_ignores_directory() {
        let m = map(&[("a.png", "/assets/doc1/a.png")]);
        assert_eq!(
            rewrite_image_sources("<img src=\"media/a.png\">", &m),
            "<img src=\"/assets/doc1/a.png\">"
        );
    }

    #[test]
    fn test_full_local_path_key() {
        let m = map(&[("/tmp/abc/media/image1.png", "/assets/d/image1.png")]);
        assert_eq!(
            rewrite_image_sources("<p><img alt='x' src='/tmp/abc/media/image1.png' /></p>", &m),
            "<p><img alt='x' src='/assets/d/image1.png' /></p>"
        );
    }

    #[test]
    fn test_unmatched_source_untouched() {
        let m = map(&[("a.png", "/assets/doc1/a.png")]);
        let input = "<img src=\"media/b.png\"><img src=\"https://cdn/x.png\">";
        assert_eq!(rewrite_image_sources(input, &m), input);
    }

    #[test]
    fn test_non_image_src_untouched() {
        let m = map(&[("a.js", "/assets/doc1/a.js")]);
        let input = "<script src=\"a.js\"></script>";
        assert_eq!(rewrite_image_sources(input, &m), input);
    }

    #[test]
    fn test_name_collision_is_deterministic() {
        let m = map(&[
            ("/one/media/image1.png", "/assets/d/one.png"),
            ("/two/media/image1.png", "/assets/d/two.png"),
        ]);
        let by_name = filename_map(&m);
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name["image1.png"], "/assets/d/two.png");
    }

    #[test]
    fn test_data_src_is_not_src() {
        let m = map(&[("a.png", "/assets/d/a.png")]);
        assert_eq!(
            rewrite_image_sources("<img data-src=\"x/a.png\" src=\"media/a.png\">", &m),
            "<img data-src=\"x/a.png\" src=\"/assets/d/a.png\">"
        );
    }

    #[test]
    fn test_empty_map_is_identity() {
        let input = "<img src=\"media/a.png\">";
        assert_eq!(rewrite_image_sources(input, &HashMap::new()), input);
    }
}
