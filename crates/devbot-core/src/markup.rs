//! Text conversions between wiki storage HTML, markdown and plain text.

use regex::Regex;
use scraper::{node::Node, ElementRef, Html};
use std::sync::OnceLock;

use crate::error::{DevbotError, Result};

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "td", "tfoot",
    "th", "thead", "tr", "ul",
];

// ---------------------------------------------------------------------------
// HTML -> text
// ---------------------------------------------------------------------------

/// Flatten storage-format HTML into plain text. Block-level elements start
/// a new line, blank lines are dropped and every line is trimmed.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    collect_text(fragment.root_element(), &mut out);
    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Markdown -> HTML
// ---------------------------------------------------------------------------

/// Minimal markdown to storage-HTML conversion for generated design pages.
///
/// Handles ATX headings, bullet and numbered lists, fenced code blocks,
/// paragraphs, and inline `code` / `**bold**`. Anything else passes through
/// as escaped paragraph text.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut html = String::new();
    let mut paragraph: Vec<String> = Vec::new();
    let mut list: Option<&'static str> = None;
    let mut code: Option<Vec<String>> = None;

    for raw in markdown.lines() {
        if let Some(lines) = code.as_mut() {
            if raw.trim_start().starts_with("```") {
                html.push_str("<pre><code>");
                html.push_str(&escape(&lines.join("\n")));
                html.push_str("</code></pre>");
                code = None;
            } else {
                lines.push(raw.to_string());
            }
            continue;
        }

        let line = raw.trim();
        if line.starts_with("```") {
            flush_paragraph(&mut html, &mut paragraph);
            close_list(&mut html, &mut list);
            code = Some(Vec::new());
            continue;
        }
        if line.is_empty() {
            flush_paragraph(&mut html, &mut paragraph);
            close_list(&mut html, &mut list);
            continue;
        }
        if let Some((level, text)) = heading(line) {
            flush_paragraph(&mut html, &mut paragraph);
            close_list(&mut html, &mut list);
            html.push_str(&format!("<h{level}>{}</h{level}>", inline(text)));
            continue;
        }
        if let Some((tag, item)) = list_item(line) {
            flush_paragraph(&mut html, &mut paragraph);
            if list != Some(tag) {
                close_list(&mut html, &mut list);
                html.push_str(&format!("<{tag}>"));
                list = Some(tag);
            }
            html.push_str(&format!("<li>{}</li>", inline(item)));
            continue;
        }
        close_list(&mut html, &mut list);
        paragraph.push(line.to_string());
    }

    // Unterminated fence: emit what we have.
    if let Some(lines) = code {
        html.push_str("<pre><code>");
        html.push_str(&escape(&lines.join("\n")));
        html.push_str("</code></pre>");
    }
    flush_paragraph(&mut html, &mut paragraph);
    close_list(&mut html, &mut list);
    html
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    let rest = &line[level..];
    rest.strip_prefix(' ').map(|text| (level, text.trim()))
}

fn list_item(line: &str) -> Option<(&'static str, &str)> {
    if let Some(item) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return Some(("ul", item.trim()));
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        if let Some(item) = line[digits..].strip_prefix(". ") {
            return Some(("ol", item.trim()));
        }
    }
    None
}

fn flush_paragraph(html: &mut String, paragraph: &mut Vec<String>) {
    if paragraph.is_empty() {
        return;
    }
    html.push_str("<p>");
    html.push_str(&inline(&paragraph.join(" ")));
    html.push_str("</p>");
    paragraph.clear();
}

fn close_list(html: &mut String, list: &mut Option<&'static str>) {
    if let Some(tag) = list.take() {
        html.push_str(&format!("</{tag}>"));
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

static CODE_RE: OnceLock<Regex> = OnceLock::new();
static BOLD_RE: OnceLock<Regex> = OnceLock::new();

fn inline(text: &str) -> String {
    let code_re = CODE_RE.get_or_init(|| Regex::new(r"`([^`]+)`").unwrap());
    let bold_re = BOLD_RE.get_or_init(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
    let escaped = escape(text);
    let coded = code_re.replace_all(&escaped, "<code>$1</code>");
    bold_re
        .replace_all(&coded, "<strong>$1</strong>")
        .into_owned()
}

// ---------------------------------------------------------------------------
// Page references and queries
// ---------------------------------------------------------------------------

static PAGES_RE: OnceLock<Regex> = OnceLock::new();
static PAGE_ID_PARAM_RE: OnceLock<Regex> = OnceLock::new();

/// Extract a numeric page id from a bare id, a `/pages/{id}` URL or a
/// `?pageId={id}` URL.
pub fn page_id(reference: &str) -> Result<String> {
    let reference = reference.trim();
    if !reference.is_empty() && reference.chars().all(|c| c.is_ascii_digit()) {
        return Ok(reference.to_string());
    }
    let pages = PAGES_RE.get_or_init(|| Regex::new(r"/pages/(\d+)").unwrap());
    let param = PAGE_ID_PARAM_RE.get_or_init(|| Regex::new(r"pageId=(\d+)").unwrap());
    pages
        .captures(reference)
        .or_else(|| param.captures(reference))
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| DevbotError::InvalidPageRef(reference.to_string()))
}

/// Build a full-text CQL query, optionally restricted to one space.
pub fn cql(query: &str, space: Option<&str>) -> String {
    let mut cql = format!("text ~ \"{}\"", cql_escape(query));
    if let Some(space) = space.filter(|s| !s.is_empty()) {
        cql.push_str(&format!(" AND space.key = \"{}\"", cql_escape(space)));
    }
    cql
}

fn cql_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Truncate to at most `max` characters, appending an ellipsis marker when
/// anything was cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}\n...", &text[..idx]),
        None => text.to_string(),
    }
}
