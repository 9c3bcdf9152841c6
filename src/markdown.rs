use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options as CmarkOptions, Parser, Tag, TagEnd};

/// Renders issue content to HTML. Fenced code keeps its language as a
/// `language-*` class; raw HTML in the source is escaped rather than passed
/// through.
pub fn render(markdown_input: &str) -> String {
    let mut options = CmarkOptions::empty();
    options.insert(CmarkOptions::ENABLE_TABLES);
    options.insert(CmarkOptions::ENABLE_STRIKETHROUGH);
    options.insert(CmarkOptions::ENABLE_TASKLISTS);
    let parser = Parser::new_ext(markdown_input, options);

    let mut html_output = String::new();
    let mut code_buffer = String::new();
    let mut current_lang: Option<String> = None;
    let mut in_code_block = false;

    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                in_code_block = true;
                code_buffer.clear();
                current_lang = match &kind {
                    CodeBlockKind::Fenced(lang) => parse_language(lang),
                    CodeBlockKind::Indented => None,
                };
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                html_output.push_str(&code_block(&code_buffer, current_lang.as_deref()));
                current_lang = None;
            }
            Event::Text(text) if in_code_block => {
                code_buffer.push_str(&text);
            }
            Event::Html(raw) | Event::InlineHtml(raw) => {
                html_output.push_str(&escape_html(&raw));
            }
            _ => {
                pulldown_cmark::html::push_html(&mut html_output, std::iter::once(event));
            }
        }
    }

    html_output
}

fn parse_language(lang: &CowStr) -> Option<String> {
    let lang_str = lang.as_ref().split_whitespace().next()?;
    let normalized = match lang_str {
        "rs" => "rust",
        "py" => "python",
        "js" => "javascript",
        "ts" => "typescript",
        "sh" | "shell" | "zsh" => "bash",
        "yml" => "yaml",
        other => other,
    };
    if normalized
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '+')
    {
        Some(normalized.to_ascii_lowercase())
    } else {
        None
    }
}

fn code_block(code: &str, lang: Option<&str>) -> String {
    format!(
        "<pre class=\"code-block\"><code class=\"language-{}\">{}</code></pre>\n",
        lang.unwrap_or("text"),
        escape_html(code)
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
