
use anyhow::{Result, anyhow};
use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;

/// Elements whose content is page chrome rather than documentation
const SKIPPED_TAGS: [&str; 14] = [
    "script", "style", "noscript", "iframe", "svg", "nav", "header", "footer", "aside", "button",
    "form", "template", "head", "title",
];

/// Class names that mark navigation or decoration inside content areas
const SKIPPED_CLASSES: [&str; 7] = [
    "advertisement",
    "ads",
    "sidebar",
    "menu",
    "navigation",
    "anchor",
    "breadcrumbs",
];

/// Elements that end a line of text
const BLOCK_TAGS: [&str; 16] = [
    "div", "section", "article", "main", "li", "tr", "dt", "dd", "figure", "figcaption", "details",
    "summary", "br", "hr", "caption", "label",
];

/// Elements that are separated from their neighbours by a blank line
const PARAGRAPH_TAGS: [&str; 7] = ["p", "ul", "ol", "table", "blockquote", "dl", "pre"];

/// Title and main text of one documentation page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub title: String,
    /// Plain text with markdown-style headings and fenced code blocks
    pub text: String,
}

/// Extract the title and main content text from an HTML document
#[inline]
pub fn extract_content(html: &str) -> Result<ExtractedPage> {
    let document = Html::parse_document(html);

    let title = extract_title(&document)?;

    let main_selector =
        Selector::parse("main, article, [role=\"main\"], .content, .main-content, #content, #main")
            .map_err(|e| anyhow!("Failed to create CSS selector: {:?}", e))?;
    let body_selector =
        Selector::parse("body").map_err(|e| anyhow!("Failed to create CSS selector: {:?}", e))?;

    let root = document
        .select(&main_selector)
        .next()
        .or_else(|| document.select(&body_selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut text = String::new();
    walk(root, &mut text);
    let text = clean_text(&text);

    debug!(
        "Extracted content: title='{}', {} chars of text",
        title,
        text.len()
    );

    Ok(ExtractedPage { title, text })
}

/// Page title from `<title>`, falling back to the first heading
fn extract_title(document: &Html) -> Result<String> {
    let selector = Selector::parse("title, h1, h2")
        .map_err(|e| anyhow!("Failed to create CSS selector: {:?}", e))?;

    // `<title>` wins even when a heading precedes it in document order
    let mut candidates: Vec<(bool, String)> = document
        .select(&selector)
        .map(|el| {
            let text = el.text().collect::<Vec<_>>().join(" ");
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            (el.value().name() == "title", text)
        })
        .filter(|(_, text)| !text.is_empty())
        .collect();
    candidates.sort_by_key(|(is_title, _)| !is_title);

    Ok(candidates
        .into_iter()
        .next()
        .map_or_else(|| "Untitled Document".to_string(), |(_, text)| text))
}

fn walk(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => push_inline(out, text),
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    walk_element(child_element, out);
                }
            }
            _ => {}
        }
    }
}

fn walk_element(element: ElementRef<'_>, out: &mut String) {
    let value = element.value();
    let name = value.name();

    if SKIPPED_TAGS.contains(&name)
        || value.classes().any(|class| SKIPPED_CLASSES.contains(&class))
        || value.attr("aria-hidden") == Some("true")
    {
        return;
    }

    match name {
        "pre" => {
            let code: String = element.text().collect();
            let code = code.trim_matches('\n');
            if !code.trim().is_empty() {
                push_break(out, true);
                out.push_str("```\n");
                out.push_str(code);
                out.push_str("\n```");
                push_break(out, true);
            }
        }
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = name
                .strip_prefix('h')
                .and_then(|n| n.parse::<usize>().ok())
                .unwrap_or(1);
            push_break(out, true);
            out.push_str(&"#".repeat(level));
            out.push(' ');
            walk(element, out);
            push_break(out, true);
        }
        "li" => {
            push_break(out, false);
            out.push_str("- ");
            walk(element, out);
            push_break(out, false);
        }
        "code" => {
            out.push('`');
            let code: String = element.text().collect();
            out.push_str(code.trim());
            out.push('`');
        }
        "td" | "th" => {
            walk(element, out);
            push_inline(out, " ");
        }
        _ if PARAGRAPH_TAGS.contains(&name) => {
            push_break(out, true);
            walk(element, out);
            push_break(out, true);
        }
        _ if BLOCK_TAGS.contains(&name) => {
            push_break(out, false);
            walk(element, out);
            push_break(out, false);
        }
        _ => walk(element, out),
    }
}

/// Append inline text with HTML whitespace collapsing
fn push_inline(out: &mut String, text: &str) {
    let at_line_start = out.is_empty() || out.ends_with('\n');

    if text.starts_with(char::is_whitespace) && !at_line_start && !out.ends_with(' ') {
        out.push(' ');
    }

    let mut words = text.split_whitespace().peekable();
    while let Some(word) = words.next() {
        out.push_str(word);
        if words.peek().is_some() {
            out.push(' ');
        }
    }

    if text.ends_with(char::is_whitespace) && !text.trim().is_empty() {
        out.push(' ');
    }
}

/// End the current line; `blank` leaves an empty line after it
fn push_break(out: &mut String, blank: bool) {
    while out.ends_with(' ') {
        out.pop();
    }
    if out.is_empty() {
        return;
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    if blank && !out.ends_with("\n\n") {
        out.push('\n');
    }
}

/// Trim trailing spaces on every line and collapse runs of blank lines
#[inline]
pub fn clean_text(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut blank_run = 0;

    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        cleaned.push_str(line);
        cleaned.push('\n');
    }

    cleaned.trim().to_string()
}
