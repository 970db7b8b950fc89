//! Markdown rendering for the preview.
//!
//! One pulldown-cmark pass yields both sides the sync engine needs: the HTML
//! fragment merged into the live preview and the block token stream the
//! source/preview paths are computed from.

mod slug;
mod tokens;

use crate::token::Token;
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use std::ops::Range;

pub use self::slug::slugify;
use self::slug::Slugger;
use self::tokens::{build_tokens, is_math_fence};

/// Markdown extensions, also the `[render]` section of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct RenderOptions {
    /// GitHub flavored tables.
    pub tables: bool,
    /// `~~text~~`.
    pub strikethrough: bool,
    /// `- [x]` items.
    pub tasklists: bool,
    pub footnotes: bool,
    /// `# Heading {#id .class}`.
    pub heading_attributes: bool,
    /// Render ```` ```math ```` fences as display math.
    pub math: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            tables: true,
            strikethrough: true,
            tasklists: true,
            footnotes: true,
            heading_attributes: true,
            math: false,
        }
    }
}

impl RenderOptions {
    pub fn with_math(mut self, math: bool) -> Self {
        self.math = math;
        self
    }

    fn to_pulldown_options(&self) -> Options {
        let mut options = Options::empty();
        if self.tables {
            options.insert(Options::ENABLE_TABLES);
        }
        if self.strikethrough {
            options.insert(Options::ENABLE_STRIKETHROUGH);
        }
        if self.tasklists {
            options.insert(Options::ENABLE_TASKLISTS);
        }
        if self.footnotes {
            options.insert(Options::ENABLE_FOOTNOTES);
        }
        if self.heading_attributes {
            options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        }
        options
    }
}

/// Output of [`render`].
#[derive(Debug, Clone)]
pub struct Rendered {
    pub html: String,
    pub tokens: Vec<Token>,
}

fn parse<'a>(source: &'a str, options: &RenderOptions) -> Vec<(Event<'a>, Range<usize>)> {
    Parser::new_ext(source, options.to_pulldown_options())
        .into_offset_iter()
        .collect()
}

/// Renders `source` to the preview HTML and its block token stream.
pub fn render(source: &str, options: &RenderOptions) -> Rendered {
    let events = parse(source, options);
    let tokens = build_tokens(&events, source, options.math);
    let html = push_html(&events, options);

    tracing::debug!(
        events = events.len(),
        tokens = tokens.len(),
        html_len = html.len(),
        "Rendered markdown"
    );

    Rendered { html, tokens }
}

/// HTML side of [`render`].
pub fn to_html(source: &str, options: &RenderOptions) -> String {
    push_html(&parse(source, options), options)
}

/// Token side of [`render`].
pub fn tokenize(source: &str, options: &RenderOptions) -> Vec<Token> {
    build_tokens(&parse(source, options), source, options.math)
}

/// Concatenated text of the heading starting right after `events[0]`.
fn heading_text(events: &[(Event, Range<usize>)]) -> String {
    let mut text = String::new();
    for (event, _) in events {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            Event::End(TagEnd::Heading(_)) => break,
            _ => {}
        }
    }
    text
}

fn push_html(events: &[(Event, Range<usize>)], options: &RenderOptions) -> String {
    let mut slugger = Slugger::default();
    let mut processed = Vec::with_capacity(events.len());

    let mut i = 0;
    while i < events.len() {
        match &events[i].0 {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                let id = match id {
                    Some(id) => id.clone(),
                    None => slugger.slug(&heading_text(&events[i + 1..])).into(),
                };
                processed.push(Event::Start(Tag::Heading {
                    level: *level,
                    id: Some(id),
                    classes: classes.clone(),
                    attrs: attrs.clone(),
                }));
                i += 1;
            }
            Event::Start(Tag::CodeBlock(kind @ CodeBlockKind::Fenced(_)))
                if options.math && is_math_fence(kind) =>
            {
                let mut tex = String::new();
                let mut j = i + 1;
                while j < events.len() {
                    match &events[j].0 {
                        Event::Text(text) => tex.push_str(text),
                        Event::End(TagEnd::CodeBlock) => break,
                        _ => {}
                    }
                    j += 1;
                }

                processed.push(Event::Html(CowStr::from(r#"<span class="math display">"#)));
                processed.push(Event::Text(CowStr::from(tex.trim_end().to_string())));
                processed.push(Event::Html(CowStr::from("</span>\n")));

                i = j + 1;
            }
            event => {
                processed.push(event.clone());
                i += 1;
            }
        }
    }

    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, processed.into_iter());
    html
}
