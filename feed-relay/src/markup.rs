//! HTML to plain text for message bodies.

use scraper::{Html, Node};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkupError {
    #[error("markup has no text content")]
    Empty,
}

/// Removes every tag from `html`, keeping the text of every element.
///
/// The input is parsed as an HTML fragment, so stray `<` characters, unclosed
/// and mismatched elements are recovered the way a browser would. `<br>` becomes
/// a newline, comments are dropped and entities are decoded by the parser.
pub fn strip_markup(html: &str) -> Result<String, MarkupError> {
    let fragment = Html::parse_fragment(html);
    if !fragment.errors.is_empty() {
        debug!("Recovered from {} markup errors", fragment.errors.len());
    }

    let mut text = String::with_capacity(html.len());
    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(chunk) => text.push_str(chunk),
            Node::Element(element) if element.name() == "br" => text.push('\n'),
            _ => {}
        }
    }

    if text.trim().is_empty() {
        return Err(MarkupError::Empty);
    }

    Ok(text)
}
