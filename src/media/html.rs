use regex::Regex;

pub fn build_img_tag(filename: &str) -> String {
    format!(
        "<div><img src=\"{}\" style=\"max-width:100%;height:auto\"/></div>",
        filename
    )
}

/// Appends an img tag for the file unless the text already references that
/// exact src. Appending the same file twice is a no-op.
pub fn ensure_img_tag(existing: &str, filename: &str) -> String {
    let probe =
        Regex::new(&format!(r#"(?i)src=["']{}["']"#, regex::escape(filename))).unwrap();
    if probe.is_match(existing) {
        return existing.to_string();
    }

    let tag = build_img_tag(filename);
    let trimmed = existing.trim_end();
    if trimmed.is_empty() {
        return tag;
    }
    format!("{}\n\n{}", trimmed, tag)
}

/// Wraps bare http(s) URLs in anchor tags. URLs already sitting inside an
/// anchor element are left alone.
pub fn auto_link_urls(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let anchor_re = Regex::new(r"(?is)<a\b[^>]*>.*?</a>").unwrap();
    let url_re = Regex::new(r#"(?i)https?://[^\s<>"']+"#).unwrap();

    let anchors: Vec<(usize, usize)> =
        anchor_re.find_iter(text).map(|m| (m.start(), m.end())).collect();

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for url_match in url_re.find_iter(text) {
        out.push_str(&text[cursor..url_match.start()]);
        let url = url_match.as_str();
        let inside_anchor =
            anchors.iter().any(|(start, end)| *start <= url_match.start() && url_match.start() < *end);
        if inside_anchor {
            out.push_str(url);
        } else {
            out.push_str(&format!("<a href=\"{}\">{}</a>", url, url));
        }
        cursor = url_match.end();
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appending_twice_equals_appending_once() {
        let once = ensure_img_tag("Answer text", "img_abc.png");
        let twice = ensure_img_tag(&once, "img_abc.png");

        assert_eq!(once, twice);
        assert!(once.starts_with("Answer text\n\n<div><img src=\"img_abc.png\""));
    }

    #[test]
    fn empty_text_becomes_just_the_tag() {
        assert_eq!(
            ensure_img_tag("  \n", "img_abc.png"),
            "<div><img src=\"img_abc.png\" style=\"max-width:100%;height:auto\"/></div>"
        );
    }

    #[test]
    fn existing_single_quoted_src_counts_as_present() {
        let text = "before <img src='img_abc.png'> after";
        assert_eq!(ensure_img_tag(text, "img_abc.png"), text);
    }

    #[test]
    fn bare_urls_get_anchored() {
        assert_eq!(
            auto_link_urls("see https://example.com/x for more"),
            "see <a href=\"https://example.com/x\">https://example.com/x</a> for more"
        );
    }

    #[test]
    fn urls_inside_anchors_are_untouched() {
        let text = "<a href=\"https://example.com\">https://example.com</a> and http://other.org";
        assert_eq!(
            auto_link_urls(text),
            "<a href=\"https://example.com\">https://example.com</a> and <a href=\"http://other.org\">http://other.org</a>"
        );
    }

    #[test]
    fn empty_text_stays_empty() {
        assert_eq!(auto_link_urls(""), "");
    }
}
