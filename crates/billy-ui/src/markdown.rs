//! Markdown rendering for assistant answers.
//!
//! pulldown-cmark events are folded into a flat list of blocks, which
//! egui then lays out with wrapped labels.

use egui::{self, Color32, RichText};
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::theme::*;

/// A run of text sharing one style
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub strong: bool,
    pub italic: bool,
    pub code: bool,
    pub strike: bool,
    pub link: Option<String>,
}

impl Span {
    fn same_style(&self, other: &Span) -> bool {
        self.strong == other.strong
            && self.italic == other.italic
            && self.code == other.code
            && self.strike == other.strike
            && self.link == other.link
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, spans: Vec<Span> },
    Paragraph(Vec<Span>),
    /// List entry; `marker` is `•` or `N.`, `depth` starts at 0
    Item { marker: String, depth: usize, spans: Vec<Span> },
    Code { language: Option<String>, text: String },
    Rule,
}

#[derive(Default)]
struct Style {
    strong: usize,
    italic: usize,
    strike: usize,
    link: Option<String>,
}

struct Builder {
    blocks: Vec<Block>,
    spans: Vec<Span>,
    style: Style,
    /// Next number per open list; `None` for bullet lists
    lists: Vec<Option<u64>>,
    item: Option<String>,
    heading: Option<u8>,
    code: Option<(Option<String>, String)>,
}

impl Builder {
    fn new() -> Self {
        Self {
            blocks: Vec::new(),
            spans: Vec::new(),
            style: Style::default(),
            lists: Vec::new(),
            item: None,
            heading: None,
            code: None,
        }
    }

    fn push_text(&mut self, text: &str, code: bool) {
        if let Some((_, buffer)) = self.code.as_mut() {
            buffer.push_str(text);
            return;
        }
        let span = Span {
            text: text.to_string(),
            strong: self.style.strong > 0,
            italic: self.style.italic > 0,
            code,
            strike: self.style.strike > 0,
            link: self.style.link.clone(),
        };
        match self.spans.last_mut() {
            Some(last) if last.same_style(&span) => last.text.push_str(&span.text),
            _ => self.spans.push(span),
        }
    }

    /// Close the pending run of spans as an item, heading or paragraph.
    fn flush(&mut self) {
        let spans = std::mem::take(&mut self.spans);
        if let Some(marker) = self.item.take() {
            let depth = self.lists.len().saturating_sub(1);
            self.blocks.push(Block::Item { marker, depth, spans });
        } else if let Some(level) = self.heading.take() {
            self.blocks.push(Block::Heading { level, spans });
        } else if spans.iter().any(|s| !s.text.trim().is_empty()) {
            self.blocks.push(Block::Paragraph(spans));
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush();
                self.heading = Some(heading_level(level));
            }
            Tag::List(first) => {
                self.flush();
                self.lists.push(first);
            }
            Tag::Item => {
                self.flush();
                let marker = match self.lists.last_mut() {
                    Some(Some(next)) => {
                        let marker = format!("{}.", next);
                        *next += 1;
                        marker
                    }
                    _ => "•".to_string(),
                };
                self.item = Some(marker);
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                let language = match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().map(str::to_string)
                    }
                    CodeBlockKind::Indented => None,
                };
                self.code = Some((language, String::new()));
            }
            Tag::Emphasis => self.style.italic += 1,
            Tag::Strong => self.style.strong += 1,
            Tag::Strikethrough => self.style.strike += 1,
            Tag::Link { dest_url, .. } => self.style.link = Some(dest_url.to_string()),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item => self.flush(),
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
            }
            TagEnd::CodeBlock => {
                if let Some((language, text)) = self.code.take() {
                    let text = text.trim_end_matches('\n').to_string();
                    self.blocks.push(Block::Code { language, text });
                }
            }
            TagEnd::Emphasis => self.style.italic = self.style.italic.saturating_sub(1),
            TagEnd::Strong => self.style.strong = self.style.strong.saturating_sub(1),
            TagEnd::Strikethrough => self.style.strike = self.style.strike.saturating_sub(1),
            TagEnd::Link => self.style.link = None,
            _ => {}
        }
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Parse an answer into blocks.
pub fn parse_blocks(markdown: &str) -> Vec<Block> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut builder = Builder::new();
    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(tag) => builder.start(tag),
            Event::End(tag) => builder.end(tag),
            Event::Text(text) => builder.push_text(&text, false),
            Event::Code(text) => builder.push_text(&text, true),
            Event::SoftBreak => builder.push_text(" ", false),
            Event::HardBreak => builder.push_text("\n", false),
            Event::Rule => {
                builder.flush();
                builder.blocks.push(Block::Rule);
            }
            Event::Html(html) | Event::InlineHtml(html) => builder.push_text(&html, false),
            _ => {}
        }
    }
    builder.flush();
    builder.blocks
}

fn span_text(span: &Span, size: f32, color: Color32) -> RichText {
    let mut text = RichText::new(&span.text).size(size).color(color);
    if span.strong {
        text = text.strong();
    }
    if span.italic {
        text = text.italics();
    }
    if span.strike {
        text = text.strikethrough();
    }
    if span.code {
        text = text.code();
    }
    text
}

fn show_spans(ui: &mut egui::Ui, spans: &[Span], size: f32, color: Color32) {
    ui.spacing_mut().item_spacing.x = 0.0;
    for span in spans {
        let text = span_text(span, size, color);
        match &span.link {
            Some(url) => {
                ui.hyperlink_to(text.color(ACCENT), url);
            }
            None => {
                ui.label(text);
            }
        }
    }
}

/// Render markdown into `ui`.
pub fn show_markdown(ui: &mut egui::Ui, markdown: &str) {
    for block in parse_blocks(markdown) {
        match block {
            Block::Heading { level, spans } => {
                let size = match level {
                    1 => 20.0,
                    2 => 18.0,
                    _ => 16.0,
                };
                ui.horizontal_wrapped(|ui| show_spans(ui, &spans, size, TEXT_PRIMARY));
            }
            Block::Paragraph(spans) => {
                ui.horizontal_wrapped(|ui| show_spans(ui, &spans, 14.0, TEXT_PRIMARY));
            }
            Block::Item { marker, depth, spans } => {
                ui.horizontal_wrapped(|ui| {
                    ui.add_space(12.0 * (depth + 1) as f32);
                    ui.label(RichText::new(format!("{} ", marker)).color(TEXT_SECONDARY));
                    show_spans(ui, &spans, 14.0, TEXT_PRIMARY);
                });
            }
            Block::Code { text, .. } => {
                egui::Frame::default()
                    .fill(CODE_BG)
                    .corner_radius(PANEL_ROUNDING)
                    .inner_margin(6.0)
                    .show(ui, |ui| {
                        ui.label(RichText::new(text).monospace().color(CODE_FG));
                    });
            }
            Block::Rule => {
                ui.separator();
            }
        }
        ui.add_space(2.0);
    }
}
