//! Field extraction from semi-structured documents.
//!
//! Source pages label their fields inconsistently and drop them often. Every
//! accessor here returns an `Option` (or an empty list) for a missing field;
//! only a missing *container* is reported as
//! [`ResolveError::ParseInconsistency`], and that is left to the adapters.

use scraper::{ElementRef, Selector};
use serde_json::Value;

use crate::error::{ResolveError, Result};

/// Suffix MyAnimeList appends to per-episode durations.
const DURATION_SUFFIX: &str = " per ep.";
/// Thumbnail size segment in MyAnimeList CDN image paths.
const THUMBNAIL_SEGMENT: &str = "r/116x180/";

/// Demographic labels that have a canonical short spelling.
const DEMOGRAPHICS: &[(&str, &str)] = &[
    ("Shounen", "Shonen"),
    ("Shoujo", "Shojo"),
    ("Kids", "Kodomo"),
];

/// Compile a CSS selector, reporting a malformed one as a parse error.
pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ResolveError::parse(format!("bad selector '{}': {:?}", css, e)))
}

/// Concatenated, trimmed text of an element.
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Text of the element's own text nodes, ignoring nested elements.
pub fn own_text(element: ElementRef<'_>) -> Option<String> {
    let text: String = element
        .children()
        .filter_map(|node| node.value().as_text().map(|t| String::from(&**t)))
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Values of `attr` on every element matching `css` inside `container`.
pub fn attr_values(container: ElementRef<'_>, css: &Selector, attr: &str) -> Vec<String> {
    container
        .select(css)
        .filter_map(|e| e.value().attr(attr))
        .map(|v| v.trim().to_string())
        .collect()
}

fn is_label(element: ElementRef<'_>) -> bool {
    element.value().name() == "span" && element.value().classes().any(|c| c == "dark_text")
}

/// Find the region introduced by a `span.dark_text` label, i.e. the label's parent.
fn labeled_region<'a>(container: ElementRef<'a>, label: &str) -> Option<ElementRef<'a>> {
    let labels = selector("span.dark_text").ok()?;
    container
        .select(&labels)
        .find(|span| element_text(*span) == label)
        .and_then(|span| span.parent())
        .and_then(ElementRef::wrap)
}

/// Trailing text associated with `label`, or `None` when the label is absent
/// or carries no value. The label's own text never counts as the value.
///
/// ```text
/// <div><span class="dark_text">Episodes:</span> 12 </div>  →  Some("12")
/// <div><span class="dark_text">Episodes:</span></div>      →  None
/// ```
pub fn find_labeled_value(container: ElementRef<'_>, label: &str) -> Option<String> {
    let region = labeled_region(container, label)?;
    region
        .descendants()
        .filter(|node| !node.ancestors().filter_map(ElementRef::wrap).any(is_label))
        .filter_map(|node| node.value().as_text().map(|t| t.trim()))
        .filter(|t| !t.is_empty())
        .last()
        .map(str::to_string)
}

/// Text of every hyperlink in the region introduced by `label`.
pub fn find_labeled_links(container: ElementRef<'_>, label: &str) -> Option<Vec<String>> {
    let region = labeled_region(container, label)?;
    let links = selector("a").ok()?;
    Some(
        region
            .select(&links)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect(),
    )
}

/// Singular label first, then plural; a miss on both is an empty list.
pub fn labeled_links_any(container: ElementRef<'_>, singular: &str, plural: &str) -> Vec<String> {
    find_labeled_links(container, singular)
        .filter(|links| !links.is_empty())
        .or_else(|| find_labeled_links(container, plural))
        .unwrap_or_default()
}

/// Map the known demographic spellings to their short form.
pub fn normalize_demographic(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    let canonical = DEMOGRAPHICS
        .iter()
        .find(|(from, _)| *from == raw)
        .map(|(_, to)| *to)
        .unwrap_or(raw);
    Some(canonical.to_string())
}

/// Episode count, only when the text is made entirely of digits.
pub fn parse_episode_count(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

pub fn normalize_duration(raw: &str) -> String {
    raw.strip_suffix(DURATION_SUFFIX).unwrap_or(raw).to_string()
}

/// Request the large variant of a MyAnimeList CDN thumbnail.
///
/// `https://cdn.myanimelist.net/r/116x180/images/anime/4/19644.jpg?s=abc`
/// becomes `https://cdn.myanimelist.net/images/anime/4/19644l.jpg`.
pub fn normalize_image_url(raw: &str) -> String {
    let without_thumb = raw.replace(THUMBNAIL_SEGMENT, "");
    let without_query = without_thumb.split('?').next().unwrap_or_default();
    without_query.replace(".jpg", "l.jpg")
}

/// Split a `"seeders / leechers"` cell. An empty cell or empty side counts as 0;
/// anything non-numeric yields `None`.
pub fn split_ratio_cell(raw: &str) -> Option<(u32, u32)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some((0, 0));
    }
    let (left, right) = raw.split_once('/')?;
    let side = |s: &str| -> Option<u32> {
        let s = s.trim();
        if s.is_empty() {
            Some(0)
        } else {
            s.parse().ok()
        }
    };
    Some((side(left)?, side(right)?))
}

// ============ JSON accessors ============

/// String at a JSON pointer; numbers are rendered as text.
pub fn json_str(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn json_u32(value: &Value, pointer: &str) -> Option<u32> {
    value
        .pointer(pointer)?
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
}

pub fn json_i32(value: &Value, pointer: &str) -> Option<i32> {
    value
        .pointer(pointer)?
        .as_i64()
        .and_then(|n| i32::try_from(n).ok())
}

/// List of strings at a JSON pointer, skipping non-string entries.
pub fn json_str_list(value: &Value, pointer: &str) -> Option<Vec<String>> {
    let items = value.pointer(pointer)?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const LEFTSIDE: &str = r#"
        <div class="leftside">
          <div class="spaceit_pad"><span class="dark_text">Episodes:</span>
            26
          </div>
          <div class="spaceit_pad"><span class="dark_text">Duration:</span> 24 min. per ep.</div>
          <div class="spaceit_pad">
            <span class="dark_text">Genres:</span>
            <span itemprop="genre" style="display: none">Action</span><a href="/anime/genre/1">Action</a>,
            <span itemprop="genre" style="display: none">Sci-Fi</span><a href="/anime/genre/24">Sci-Fi</a>
          </div>
          <div class="spaceit_pad"><span class="dark_text">Theme:</span> <a href="/anime/genre/29">Space</a></div>
          <div class="spaceit_pad"><span class="dark_text">Producers:</span> add some</div>
          <div class="spaceit_pad"><span class="dark_text">Rating:</span>  </div>
        </div>
    "#;

    fn with_leftside<R>(f: impl FnOnce(ElementRef<'_>) -> R) -> R {
        let doc = Html::parse_document(LEFTSIDE);
        let sel = selector(".leftside").unwrap();
        let leftside = doc.select(&sel).next().unwrap();
        f(leftside)
    }

    #[test]
    fn test_labeled_value_trailing_text() {
        with_leftside(|c| {
            assert_eq!(find_labeled_value(c, "Episodes:").as_deref(), Some("26"));
            assert_eq!(
                find_labeled_value(c, "Duration:").as_deref(),
                Some("24 min. per ep.")
            );
        });
    }

    #[test]
    fn test_label_without_value_is_none() {
        with_leftside(|c| {
            assert_eq!(find_labeled_value(c, "Rating:"), None);
            assert_eq!(find_labeled_links(c, "Rating:"), Some(vec![]));
        });
    }

    #[test]
    fn test_missing_label_is_none() {
        with_leftside(|c| {
            assert_eq!(find_labeled_value(c, "Demographic:"), None);
            assert_eq!(find_labeled_links(c, "Studios:"), None);
        });
    }

    #[test]
    fn test_plural_label_fallback() {
        with_leftside(|c| {
            assert_eq!(
                labeled_links_any(c, "Genre:", "Genres:"),
                vec!["Action".to_string(), "Sci-Fi".to_string()]
            );
            assert_eq!(labeled_links_any(c, "Theme:", "Themes:"), vec!["Space"]);
        });
    }

    #[test]
    fn test_both_labels_missing_is_empty_list() {
        with_leftside(|c| {
            assert!(labeled_links_any(c, "Studio:", "Studios:").is_empty());
        });
    }

    #[test]
    fn test_label_without_links_is_empty() {
        with_leftside(|c| {
            assert_eq!(find_labeled_links(c, "Producers:"), Some(vec![]));
            assert!(labeled_links_any(c, "Producer:", "Producers:").is_empty());
        });
    }

    #[test]
    fn test_demographic_mapping() {
        assert_eq!(normalize_demographic(Some("Shounen")).as_deref(), Some("Shonen"));
        assert_eq!(normalize_demographic(Some("Shoujo")).as_deref(), Some("Shojo"));
        assert_eq!(normalize_demographic(Some("Kids")).as_deref(), Some("Kodomo"));
        assert_eq!(normalize_demographic(Some("Seinen")).as_deref(), Some("Seinen"));
        assert_eq!(normalize_demographic(None), None);
        assert_eq!(normalize_demographic(Some("  ")), None);
    }

    #[test]
    fn test_episode_count_digits_only() {
        assert_eq!(parse_episode_count("12"), Some(12));
        assert_eq!(parse_episode_count(" 1000 "), Some(1000));
        assert_eq!(parse_episode_count("?"), None);
        assert_eq!(parse_episode_count("Unknown"), None);
        assert_eq!(parse_episode_count("12+"), None);
        assert_eq!(parse_episode_count("-3"), None);
        assert_eq!(parse_episode_count(""), None);
    }

    #[test]
    fn test_duration_suffix_stripped() {
        assert_eq!(normalize_duration("24 min. per ep."), "24 min.");
        assert_eq!(normalize_duration("1 hr. 55 min."), "1 hr. 55 min.");
    }

    #[test]
    fn test_image_url_normalization() {
        let raw = "https://cdn.myanimelist.net/r/116x180/images/anime/4/19644.jpg?s=29a8ec";
        let expected = "https://cdn.myanimelist.net/images/anime/4/19644l.jpg";
        assert_eq!(normalize_image_url(raw), expected);
        assert_eq!(normalize_image_url(raw), normalize_image_url(raw));
    }

    #[test]
    fn test_ratio_cell() {
        assert_eq!(split_ratio_cell("12 / 3"), Some((12, 3)));
        assert_eq!(split_ratio_cell(""), Some((0, 0)));
        assert_eq!(split_ratio_cell("  "), Some((0, 0)));
        assert_eq!(split_ratio_cell("5 / "), Some((5, 0)));
        assert_eq!(split_ratio_cell("a / b"), None);
        assert_eq!(split_ratio_cell("7"), None);
    }

    #[test]
    fn test_own_text_ignores_children() {
        let doc = Html::parse_fragment(r#"<span> Group <b>[HD]</b></span>"#);
        let sel = selector("span").unwrap();
        let span = doc.select(&sel).next().unwrap();
        assert_eq!(own_text(span).as_deref(), Some("Group"));
    }

    #[test]
    fn test_json_accessors() {
        let value = serde_json::json!({
            "a": { "name": " Frieren ", "year": 2023, "count": 28, "langs": ["ja-JP", 3, "es-ES"] }
        });
        assert_eq!(json_str(&value, "/a/name").as_deref(), Some("Frieren"));
        assert_eq!(json_str(&value, "/a/year").as_deref(), Some("2023"));
        assert_eq!(json_i32(&value, "/a/year"), Some(2023));
        assert_eq!(json_u32(&value, "/a/count"), Some(28));
        assert_eq!(
            json_str_list(&value, "/a/langs"),
            Some(vec!["ja-JP".to_string(), "es-ES".to_string()])
        );
        assert_eq!(json_str(&value, "/a/missing"), None);
    }
}
