//! HTML → markdown conversion with inline image substitution.
//!
//! Conversion walks the parsed fragment twice with the same renderer: once to
//! collect image sources in document order, once to emit markdown. Images are
//! resolved between the two passes, so the parsed document (which is not
//! `Send`) never lives across an await point.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node};
use tracing::debug;

use rssplug_common::{ConversionError, MediaRef};

use crate::media::MediaResolver;

static TRAILING_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+\n").expect("valid regex"));
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static ORDERED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.").expect("valid regex"));
static CODE_SLOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([^\n\x{E000}]*)\x{E000}(\d+)\x{E001}").expect("valid regex")
});

// Fenced code blocks are held out of the walk as `\u{E000}<n>\u{E001}` and
// put back after every whitespace pass, so their bytes survive untouched.
const SLOT_OPEN: char = '\u{E000}';
const SLOT_CLOSE: char = '\u{E001}';

const SKIPPED: &[&str] = &[
    "script", "style", "head", "template", "iframe", "object", "svg", "noscript",
];

const BLOCKS: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "main", "aside", "nav", "figure",
    "figcaption", "table", "thead", "tbody", "tfoot", "tr", "dl", "dt", "dd", "address",
    "details", "summary",
];

/// Converts feed HTML into markdown, substituting images with content
/// references.
#[derive(Clone)]
pub struct MarkupConverter {
    resolver: MediaResolver,
}

impl MarkupConverter {
    pub fn new(resolver: MediaResolver) -> Self {
        Self { resolver }
    }

    /// Convert `html` to markdown. Relative URLs resolve against `base_url`.
    ///
    /// With `substitute_images`, every `<img src>` is fetched, stored, and
    /// replaced with `![alt](<ref>)`; the first failure aborts. Without it,
    /// images are dropped and nothing external is touched.
    pub async fn convert(
        &self,
        html: &str,
        base_url: Option<&str>,
        substitute_images: bool,
    ) -> Result<String, ConversionError> {
        if !substitute_images {
            return Ok(preview(html, base_url));
        }

        let sources = image_sources(html, base_url);
        let mut refs = Vec::with_capacity(sources.len());
        for src in sources {
            match self.resolver.resolve(&src).await {
                Ok(media_ref) => refs.push(media_ref),
                Err(source) => return Err(ConversionError::Image { src, source }),
            }
        }

        debug!(images = refs.len(), "markup: images substituted");
        Ok(render(html, base_url, Images::Substitute { refs: &refs, next: 0 }))
    }
}

/// Convert without touching images or any external state.
pub fn preview(html: &str, base_url: Option<&str>) -> String {
    render(html, base_url, Images::Drop)
}

/// Absolute image sources in document order, one per `<img src>`.
pub fn image_sources(html: &str, base_url: Option<&str>) -> Vec<String> {
    let mut renderer = Renderer {
        base_url,
        images: Images::Collect(Vec::new()),
        code_blocks: Vec::new(),
    };
    let fragment = Html::parse_fragment(html);
    renderer.children(fragment.root_element());

    match renderer.images {
        Images::Collect(sources) => sources,
        _ => Vec::new(),
    }
}

fn render(html: &str, base_url: Option<&str>, images: Images<'_>) -> String {
    let mut renderer = Renderer {
        base_url,
        images,
        code_blocks: Vec::new(),
    };
    let fragment = Html::parse_fragment(html);
    let raw = renderer.children(fragment.root_element());
    restore_code_blocks(&normalize(&raw), &renderer.code_blocks)
}

fn normalize(raw: &str) -> String {
    let text = TRAILING_WS.replace_all(raw, "\n");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Put fenced blocks back into their slots. Continuation lines repeat the
/// slot line's quote markers; list markers become indentation.
fn restore_code_blocks(text: &str, blocks: &[String]) -> String {
    if blocks.is_empty() {
        return text.to_string();
    }

    CODE_SLOT
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let prefix = &caps[1];
            let Some(block) = caps[2].parse::<usize>().ok().and_then(|i| blocks.get(i)) else {
                return prefix.to_string();
            };
            let continuation: String = prefix
                .chars()
                .map(|c| if c == '>' { '>' } else { ' ' })
                .collect();

            let mut out = String::with_capacity(block.len() + prefix.len());
            for (i, line) in block.split('\n').enumerate() {
                if i == 0 {
                    out.push_str(prefix);
                } else {
                    out.push('\n');
                    out.push_str(&continuation);
                }
                out.push_str(line);
            }
            out
        })
        .into_owned()
}

/// Escape text so it reads literally. `line_start` marks text that opens a
/// line, where block markers (`#`, `>`, `-`, `+`, `1.`) would take effect.
fn escape_text(text: &str, line_start: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            SLOT_OPEN | SLOT_CLOSE => continue,
            '\\' | '*' | '_' | '`' | '[' | ']' => out.push('\\'),
            _ => {}
        }
        out.push(c);
    }

    if line_start {
        let lead = out.len() - out.trim_start().len();
        let rest = &out[lead..];
        if rest.starts_with(['#', '>', '-', '+']) {
            out.insert(lead, '\\');
        } else if let Some(marker) = ORDERED_MARKER.find(rest) {
            let dot = lead + marker.end() - 1;
            out.insert(dot, '\\');
        }
    }
    out
}

/// What to do with `<img>` elements during a walk.
enum Images<'a> {
    Collect(Vec<String>),
    Substitute { refs: &'a [MediaRef], next: usize },
    Drop,
}

struct Renderer<'a> {
    base_url: Option<&'a str>,
    images: Images<'a>,
    code_blocks: Vec<String>,
}

impl Renderer<'_> {
    fn children(&mut self, el: ElementRef<'_>) -> String {
        let mut out = String::new();
        for child in el.children() {
            match child.value() {
                Node::Text(text) => {
                    let collapsed = WHITESPACE.replace_all(&**text, " ");
                    let line_start = out.is_empty() || out.ends_with('\n');
                    if collapsed == " " && line_start {
                        continue;
                    }
                    out.push_str(&escape_text(&collapsed, line_start));
                }
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        out.push_str(&self.element(child_el));
                    }
                }
                _ => {}
            }
        }
        out
    }

    fn element(&mut self, el: ElementRef<'_>) -> String {
        let name = el.value().name();
        if SKIPPED.contains(&name) {
            return String::new();
        }

        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                let inner = self.children(el);
                let inner = WHITESPACE.replace_all(inner.trim(), " ");
                if inner.is_empty() {
                    return String::new();
                }
                format!("\n\n{} {}\n\n", "#".repeat(level), inner)
            }
            "strong" | "b" => wrap_inline(&self.children(el), "**"),
            "em" | "i" => wrap_inline(&self.children(el), "_"),
            "code" => wrap_inline(&el.text().collect::<String>(), "`"),
            "pre" => {
                let code: String = el.text().collect();
                let slot = self.code_blocks.len();
                self.code_blocks
                    .push(format!("```\n{}\n```", code.trim_matches('\n')));
                format!("\n\n{SLOT_OPEN}{slot}{SLOT_CLOSE}\n\n")
            }
            "a" => {
                let inner = self.children(el);
                let inner = inner.trim();
                match el.value().attr("href") {
                    Some(href) if !inner.is_empty() => {
                        format!("[{}]({})", inner, self.absolute(href))
                    }
                    _ => inner.to_string(),
                }
            }
            "img" => self.image(el),
            "br" => "\n".to_string(),
            "hr" => "\n\n* * *\n\n".to_string(),
            "ul" => self.list(el, None),
            "ol" => {
                let start = el
                    .value()
                    .attr("start")
                    .and_then(|s| s.trim().parse::<usize>().ok())
                    .unwrap_or(1);
                self.list(el, Some(start))
            }
            "blockquote" => {
                let inner = self.children(el);
                let quoted: Vec<String> = normalize(&inner)
                    .lines()
                    .map(|line| {
                        if line.is_empty() {
                            ">".to_string()
                        } else {
                            format!("> {line}")
                        }
                    })
                    .collect();
                format!("\n\n{}\n\n", quoted.join("\n"))
            }
            "td" | "th" => format!("{} ", self.children(el).trim()),
            _ if BLOCKS.contains(&name) => {
                let inner = self.children(el);
                format!("\n\n{}\n\n", inner.trim())
            }
            _ => self.children(el),
        }
    }

    fn image(&mut self, el: ElementRef<'_>) -> String {
        let Some(src) = el.value().attr("src").filter(|s| !s.trim().is_empty()) else {
            return String::new();
        };
        let alt = escape_text(el.value().attr("alt").unwrap_or("").trim(), false);
        let src = self.absolute(src);

        match &mut self.images {
            Images::Collect(sources) => {
                sources.push(src);
                String::new()
            }
            Images::Substitute { refs, next } => {
                let Some(media_ref) = refs.get(*next) else {
                    return String::new();
                };
                *next += 1;
                format!("![{alt}]({media_ref})")
            }
            Images::Drop => String::new(),
        }
    }

    fn list(&mut self, el: ElementRef<'_>, ordered_from: Option<usize>) -> String {
        let mut items = Vec::new();
        for child in el.children() {
            let Some(item) = ElementRef::wrap(child) else {
                continue;
            };
            if item.value().name() != "li" {
                continue;
            }

            let marker = match ordered_from {
                Some(start) => format!("{}. ", start + items.len()),
                None => "- ".to_string(),
            };
            let indent = " ".repeat(marker.len());
            let body = normalize(&self.children(item)).replace("\n\n", "\n");

            let mut lines = body.lines();
            let mut rendered = format!("{marker}{}", lines.next().unwrap_or(""));
            for line in lines {
                rendered.push('\n');
                if !line.is_empty() {
                    rendered.push_str(&indent);
                    rendered.push_str(line);
                }
            }
            items.push(rendered);
        }

        if items.is_empty() {
            return String::new();
        }
        format!("\n\n{}\n\n", items.join("\n"))
    }

    fn absolute(&self, href: &str) -> String {
        let href = href.trim();
        self.base_url
            .and_then(|base| url::Url::parse(base).ok())
            .and_then(|base| base.join(href).ok())
            .map(|u| u.to_string())
            .unwrap_or_else(|| href.to_string())
    }
}

/// Wrap non-empty inline content in a marker, keeping outer spaces outside it.
fn wrap_inline(inner: &str, marker: &str) -> String {
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        return inner.to_string();
    }
    let lead = if inner.starts_with(char::is_whitespace) { " " } else { "" };
    let trail = if inner.ends_with(char::is_whitespace) { " " } else { "" };
    format!("{lead}{marker}{trimmed}{marker}{trail}")
}
