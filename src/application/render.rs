//! Markdown to sanitised HTML for post bodies.

use std::collections::HashSet;
use std::sync::Arc;

use ammonia::Builder as AmmoniaBuilder;
use comrak::options::{ListStyleType, Options};
use comrak::{Arena, format_html, parse_document};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to render markdown: {message}")]
    Markdown { message: String },
}

pub trait RenderService: Send + Sync {
    fn render(&self, markdown: &str) -> Result<String, RenderError>;
}

/// Normalises stored bodies before parsing: escaped `\n` sequences become real
/// newlines and non-breaking spaces become plain spaces.
pub fn clean_markdown(raw: &str) -> String {
    raw.replace("\\n", "\n").replace('\u{a0}', " ")
}

/// Comrak with GitHub-flavoured extensions followed by Ammonia sanitisation.
pub struct ComrakRenderService {
    options: Options<'static>,
    sanitizer: AmmoniaBuilder<'static>,
}

impl ComrakRenderService {
    pub fn new() -> Self {
        Self {
            options: default_options(),
            sanitizer: build_sanitizer(),
        }
    }

    pub fn shared() -> Arc<dyn RenderService> {
        Arc::new(Self::new())
    }
}

impl Default for ComrakRenderService {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderService for ComrakRenderService {
    fn render(&self, markdown: &str) -> Result<String, RenderError> {
        let cleaned = clean_markdown(markdown);
        let arena = Arena::new();
        let root = parse_document(&arena, &cleaned, &self.options);

        let mut html = String::new();
        format_html(root, &self.options, &mut html).map_err(|err| RenderError::Markdown {
            message: err.to_string(),
        })?;

        Ok(self.sanitizer.clean(&html).to_string())
    }
}

fn default_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;
    ext.superscript = true;

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.tasklist_classes = true;
    render.list_style = ListStyleType::Dash;
    // Raw HTML is passed through and cleaned by the sanitiser.
    render.r#unsafe = true;

    options
}

fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let tags: HashSet<&'static str> = HashSet::from([
        "a",
        "blockquote",
        "br",
        "code",
        "del",
        "div",
        "em",
        "h1",
        "h2",
        "h3",
        "h4",
        "h5",
        "h6",
        "hr",
        "img",
        "input",
        "li",
        "ol",
        "p",
        "pre",
        "section",
        "span",
        "strong",
        "sup",
        "table",
        "tbody",
        "td",
        "th",
        "thead",
        "tr",
        "ul",
    ]);
    builder.tags(tags);

    builder.add_generic_attributes(&["class", "id", "title"]);
    builder.add_tag_attributes("img", &["alt", "width", "height", "loading"]);
    builder.add_tag_attributes("pre", &["lang"]);
    builder.add_tag_attributes("th", &["align"]);
    builder.add_tag_attributes("td", &["align"]);
    builder.add_tag_attributes("input", &["type", "checked", "disabled"]);
    builder.add_url_schemes(["http", "https", "mailto"].iter().copied());

    builder
}
