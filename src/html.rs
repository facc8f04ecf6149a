//! Markup helpers for table rows and links.

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

/// Explorer link opening in a new tab.
pub fn tx_anchor(href: &str, text: &str) -> String {
    format!(
        "<a class=\"txhash\" href=\"{}\" target=\"_blank\">{}</a>",
        escape(href),
        escape(text)
    )
}

/// Cells are inserted verbatim; escape text before passing it in.
pub fn row(cells: &[String]) -> String {
    let mut out = String::from("<tr>");
    for c in cells {
        out.push_str("<td>");
        out.push_str(c);
        out.push_str("</td>");
    }
    out.push_str("</tr>");
    out
}
