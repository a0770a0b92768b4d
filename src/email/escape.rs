/// Escapes text for safe interpolation into an HTML body or attribute.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes `input` and turns blank-line separated blocks into paragraphs,
/// single newlines into `<br>`.
pub fn text_to_html_paragraphs(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| {
            let lines: Vec<String> = block.lines().map(escape_html).collect();
            format!("<p>{}</p>", lines.join("<br>"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x & 'y'")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; &#39;y&#39;&quot;)&lt;/script&gt;"
        );
        assert_eq!(escape_html("plain text"), "plain text");
    }

    #[test]
    fn test_paragraphs_are_escaped() {
        let html = text_to_html_paragraphs("Hi <b>Ada</b>,\nthanks!\n\n\nBest,\nVyomAi");
        assert_eq!(
            html,
            "<p>Hi &lt;b&gt;Ada&lt;/b&gt;,<br>thanks!</p>\n<p>Best,<br>VyomAi</p>"
        );
    }

    #[test]
    fn test_empty_text_has_no_paragraphs() {
        assert_eq!(text_to_html_paragraphs("  \n\n "), "");
    }
}
