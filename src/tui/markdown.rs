use dspy_archive::extract::class_name;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
};

fn code_style() -> Style {
    Style::default().fg(Color::Green)
}

/// Render a message for the chat pane
///
/// Served module endpoints reply with bare Python, which would be mangled by
/// a markdown pass (`#` comments turn into headings), so a reply that opens
/// with a class statement is shown verbatim as code.
pub fn render_message(text: &str) -> Text<'static> {
    if class_name(text.trim_start()).is_some() {
        code_to_text(text)
    } else {
        markdown_to_text(text)
    }
}

/// Render source code line by line
pub fn code_to_text(code: &str) -> Text<'static> {
    Text::from(
        code.lines()
            .map(|line| Line::from(Span::styled(line.to_string(), code_style())))
            .collect::<Vec<_>>(),
    )
}

fn flush(lines: &mut Vec<Line<'static>>, current: &mut Vec<Span<'static>>) {
    if !current.is_empty() {
        lines.push(Line::from(std::mem::take(current)));
    }
}

/// Converts markdown to ratatui Text
pub fn markdown_to_text(markdown: &str) -> Text<'static> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut style = Style::default();
    let mut in_code_block = false;
    let mut list_depth = 0usize;

    for event in Parser::new_ext(markdown, Options::all()) {
        match event {
            Event::Text(text) if in_code_block => {
                // code block text arrives with embedded newlines
                for line in text.lines() {
                    lines.push(Line::from(Span::styled(line.to_string(), code_style())));
                }
            }
            Event::Text(text) => current.push(Span::styled(text.to_string(), style)),
            Event::Code(code) => current.push(Span::styled(format!("`{}`", code), code_style())),
            Event::Start(Tag::Heading { level, .. }) => {
                flush(&mut lines, &mut current);
                let color = if level == HeadingLevel::H1 {
                    Color::Rgb(255, 99, 71)
                } else {
                    Color::Cyan
                };
                style = Style::default().fg(color).add_modifier(Modifier::BOLD);
            }
            Event::Start(Tag::Strong) => style = style.add_modifier(Modifier::BOLD),
            Event::Start(Tag::Emphasis) => style = style.add_modifier(Modifier::ITALIC),
            Event::Start(Tag::CodeBlock(kind)) => {
                flush(&mut lines, &mut current);
                in_code_block = true;
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        lines.push(Line::from(Span::styled(
                            format!("[{}]", lang),
                            Style::default().fg(Color::Blue).add_modifier(Modifier::ITALIC),
                        )));
                    }
                }
            }
            Event::Start(Tag::List(_)) => {
                flush(&mut lines, &mut current);
                list_depth += 1;
            }
            Event::Start(Tag::Item) => {
                current.push(Span::raw(format!("{}• ", "  ".repeat(list_depth.saturating_sub(1)))));
            }
            Event::End(TagEnd::Heading(_)) => {
                flush(&mut lines, &mut current);
                style = Style::default();
            }
            Event::End(TagEnd::Strong) => style = style.remove_modifier(Modifier::BOLD),
            Event::End(TagEnd::Emphasis) => style = style.remove_modifier(Modifier::ITALIC),
            Event::End(TagEnd::Paragraph) => {
                flush(&mut lines, &mut current);
                if list_depth == 0 {
                    lines.push(Line::from(""));
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                lines.push(Line::from(""));
            }
            Event::End(TagEnd::Item) => flush(&mut lines, &mut current),
            Event::End(TagEnd::List(_)) => {
                list_depth = list_depth.saturating_sub(1);
                if list_depth == 0 {
                    lines.push(Line::from(""));
                }
            }
            Event::SoftBreak => current.push(Span::raw(" ")),
            Event::HardBreak => flush(&mut lines, &mut current),
            _ => {}
        }
    }

    flush(&mut lines, &mut current);
    while lines.last().is_some_and(|l| l.width() == 0) {
        lines.pop();
    }
    Text::from(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &Text) -> Vec<String> {
        text.lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_bare_module_renders_verbatim() {
        let text = render_message("class A(dspy.Module):\n    # keep me\n    pass");
        assert_eq!(plain(&text), vec!["class A(dspy.Module):", "    # keep me", "    pass"]);
    }

    #[test]
    fn test_markdown_code_block_lines() {
        let text = render_message("Here:\n\n```python\nx = 1\ny = 2\n```\n");
        assert_eq!(plain(&text), vec!["Here:", "", "[python]", "x = 1", "y = 2"]);
    }

    #[test]
    fn test_list_items() {
        let text = markdown_to_text("* one\n* two");
        assert_eq!(plain(&text), vec!["• one", "• two"]);
    }
}
