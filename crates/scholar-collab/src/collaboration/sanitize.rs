/// Converts possibly-HTML notes into plain text. Blank results collapse to `None`.
pub fn sanitize_notes(raw: Option<&str>) -> Option<String> {
    let text = strip_html(raw?);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

const BLOCK_TAGS: &[&str] = &["br", "p", "div", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6"];
const SKIPPED_CONTENT: &[&str] = &["script", "style"];

pub fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut tag = String::new();
    let mut in_tag = false;
    let mut skip_until: Option<&'static str> = None;

    for ch in html.chars() {
        match ch {
            '<' if !in_tag => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let name = tag_name(&tag);
                match skip_until {
                    Some(closing) if name.strip_prefix('/') == Some(closing) => skip_until = None,
                    Some(_) => {}
                    None => {
                        if let Some(skipped) = SKIPPED_CONTENT.iter().find(|s| **s == name) {
                            skip_until = Some(*skipped);
                        } else if BLOCK_TAGS.contains(&name.trim_start_matches('/')) {
                            out.push('\n');
                        }
                    }
                }
            }
            _ if in_tag => tag.push(ch),
            _ if skip_until.is_some() => {}
            _ => out.push(ch),
        }
    }

    collapse_whitespace(&decode_entities(&out))
}

fn tag_name(tag: &str) -> String {
    tag.trim()
        .split(|c: char| c.is_whitespace() || c == '>')
        .next()
        .unwrap_or_default()
        .trim_end_matches('/')
        .to_ascii_lowercase()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in text.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() && lines.last().map_or(true, |last| last.is_empty()) {
            continue;
        }
        lines.push(collapsed);
    }
    while lines.last().is_some_and(|last| last.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_keeps_text() {
        assert_eq!(
            strip_html("<p>Please <b>highlight</b> leadership</p><p>Thanks!</p>"),
            "Please highlight leadership\n\nThanks!"
        );
    }

    #[test]
    fn drops_script_bodies_and_decodes_entities() {
        assert_eq!(
            strip_html("Tom &amp; Jerry<script>alert('x')</script> &lt;3"),
            "Tom & Jerry <3"
        );
    }

    #[test]
    fn blank_notes_become_none() {
        assert_eq!(sanitize_notes(Some("  <br/> ")), None);
        assert_eq!(sanitize_notes(None), None);
        assert_eq!(sanitize_notes(Some("ok")), Some("ok".to_string()));
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(
            strip_html("Line one\n\n\nLine   two"),
            "Line one\n\nLine two"
        );
    }
}
