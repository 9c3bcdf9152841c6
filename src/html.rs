//! HTML fragment extraction over response bodies.

use scraper::{ElementRef, Html};
use std::borrow::Cow;
use std::collections::HashSet;
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};
use crate::selectors::{Css, SelectorPath};

/// A parsed response body. Parsing is lenient: malformed markup is repaired
/// the way a browser would and invalid UTF-8 becomes U+FFFD. Only a body with
/// no decodable text at all is rejected.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(body: &[u8]) -> HarnessResult<Self> {
        let text = String::from_utf8_lossy(body);
        if let Cow::Owned(decoded) = &text {
            if decoded.chars().all(|c| c == char::REPLACEMENT_CHARACTER) {
                return Err(HarnessError::Parse(format!(
                    "{} bytes with no decodable text",
                    body.len()
                )));
            }
            debug!(bytes = body.len(), "body has invalid UTF-8, decoded lossily");
        }
        Ok(Self::parse_str(&text))
    }

    pub fn parse_str(text: &str) -> Self {
        Self {
            html: Html::parse_document(text),
        }
    }

    pub fn find(&self, css: Css) -> HarnessResult<Selection<'_>> {
        let selector = css.compile()?;
        Ok(Selection {
            doc: &self.html,
            nodes: self.html.select(&selector).collect(),
        })
    }

    /// Applies each step of `path` to the previous step's matches.
    pub fn find_path(&self, path: SelectorPath) -> HarnessResult<Selection<'_>> {
        let mut steps = path.steps().iter();
        let Some(first) = steps.next() else {
            return Ok(Selection {
                doc: &self.html,
                nodes: Vec::new(),
            });
        };

        let mut selection = self.find(*first)?;
        for step in steps {
            selection = selection.find(*step)?;
        }
        Ok(selection)
    }

    pub fn title(&self) -> Option<String> {
        let title = self.find(Css::new("title")).ok()?;
        title.first().map(|t| t.text().trim().to_string())
    }
}

/// Matched elements in document order, without duplicates.
#[derive(Clone)]
pub struct Selection<'a> {
    doc: &'a Html,
    nodes: Vec<ElementRef<'a>>,
}

impl<'a> Selection<'a> {
    /// Descendants of the selected nodes matching `css`.
    pub fn find(&self, css: Css) -> HarnessResult<Selection<'a>> {
        let selector = css.compile()?;

        let mut seen = HashSet::new();
        let mut matched = Vec::new();
        for node in &self.nodes {
            for el in node.select(&selector) {
                if seen.insert(el.id()) {
                    matched.push(el);
                }
            }
        }

        // Matches under different parents can interleave when parents nest
        if self.nodes.len() > 1 && matched.len() > 1 {
            matched = self
                .doc
                .root_element()
                .descendants()
                .filter_map(ElementRef::wrap)
                .filter(|el| seen.contains(&el.id()))
                .collect();
        }

        Ok(Selection {
            doc: self.doc,
            nodes: matched,
        })
    }

    pub fn length(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Attribute of the first node; `None` when absent or the selection is empty.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.nodes.first().and_then(|node| node.value().attr(name))
    }

    /// Combined text of every node.
    pub fn text(&self) -> String {
        self.nodes.iter().flat_map(|node| node.text()).collect()
    }

    pub fn first(&self) -> Option<Selection<'a>> {
        self.nodes.first().map(|node| self.single(*node))
    }

    /// Calls `f` with each node wrapped in its own selection.
    pub fn each<F>(&self, mut f: F)
    where
        F: FnMut(usize, Selection<'a>),
    {
        for (i, node) in self.nodes.iter().enumerate() {
            f(i, self.single(*node));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Selection<'a>> + '_ {
        self.nodes.iter().map(|node| self.single(*node))
    }

    fn single(&self, node: ElementRef<'a>) -> Selection<'a> {
        Selection {
            doc: self.doc,
            nodes: vec![node],
        }
    }
}

impl std::fmt::Debug for Selection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("length", &self.nodes.len())
            .finish()
    }
}
