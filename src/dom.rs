//! Document tree access
//!
//! The extraction engine only needs a handful of queries on an element. They are
//! collected in [`DomNode`] so that any host tree can drive the engine; [`Page`]
//! provides the implementation over a `scraper` document.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{ExtractError, Result};

/// Element queries consumed by the extraction engine.
///
/// Locators are CSS selectors relative to `self`. An empty locator is never passed
/// down; the engine resolves that case to the element itself.
pub trait DomNode: Clone + PartialEq {
    /// First descendant matching `locator`
    fn query_first(&self, locator: &str) -> Result<Option<Self>>;

    /// All descendants matching `locator`, in document order
    fn query_all(&self, locator: &str) -> Result<Vec<Self>>;

    /// Nearest ancestor-or-self matching `locator`
    fn closest(&self, locator: &str) -> Result<Option<Self>>;

    /// Parent element, `None` at the document element
    fn parent(&self) -> Option<Self>;

    fn attr(&self, name: &str) -> Option<String>;

    /// Attribute holding a link (`src`, `href`), resolved the way the host resolves links.
    fn url_attr(&self, name: &str) -> Option<String> {
        self.attr(name)
    }

    fn inner_html(&self) -> String;

    /// Current value of a form control, `None` for elements without one
    fn form_value(&self) -> Option<String>;

    /// Zero-based position among the parent's element children
    fn sibling_index(&self) -> Option<usize>;
}

/// A parsed HTML page
#[derive(Debug)]
pub struct Page {
    html: Html,
    base_url: Option<Url>,
}

impl Page {
    /// Parse a full HTML document. Links are returned as written.
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
            base_url: None,
        }
    }

    /// Parse a document whose `src`/`href` values resolve against `base_url`
    pub fn with_base_url(html: &str, base_url: &str) -> Result<Self> {
        Ok(Self {
            html: Html::parse_document(html),
            base_url: Some(Url::parse(base_url)?),
        })
    }

    /// The document element, the starting point for page-wide schemas
    pub fn root(&self) -> PageNode<'_> {
        PageNode {
            element: self.html.root_element(),
            base_url: self.base_url.as_ref(),
        }
    }

}

/// An element of a [`Page`]
#[derive(Debug, Clone, Copy)]
pub struct PageNode<'a> {
    element: ElementRef<'a>,
    base_url: Option<&'a Url>,
}

impl<'a> PageNode<'a> {
    fn wrap(&self, element: ElementRef<'a>) -> Self {
        Self {
            element,
            base_url: self.base_url,
        }
    }
}

impl PartialEq for PageNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.element.id() == other.element.id()
    }
}

fn parse_locator(locator: &str) -> Result<Selector> {
    Selector::parse(locator).map_err(|e| ExtractError::InvalidLocator {
        locator: locator.to_string(),
        reason: e.to_string(),
    })
}

impl DomNode for PageNode<'_> {
    fn query_first(&self, locator: &str) -> Result<Option<Self>> {
        let selector = parse_locator(locator)?;
        Ok(self.element.select(&selector).next().map(|el| self.wrap(el)))
    }

    fn query_all(&self, locator: &str) -> Result<Vec<Self>> {
        let selector = parse_locator(locator)?;
        Ok(self.element.select(&selector).map(|el| self.wrap(el)).collect())
    }

    fn closest(&self, locator: &str) -> Result<Option<Self>> {
        let selector = parse_locator(locator)?;
        let found = std::iter::once(self.element)
            .chain(self.element.ancestors().filter_map(ElementRef::wrap))
            .find(|el| selector.matches(el));
        Ok(found.map(|el| self.wrap(el)))
    }

    fn parent(&self) -> Option<Self> {
        self.element
            .parent()
            .and_then(ElementRef::wrap)
            .map(|el| self.wrap(el))
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.element.value().attr(name).map(String::from)
    }

    fn url_attr(&self, name: &str) -> Option<String> {
        let raw = self.element.value().attr(name)?;
        match self.base_url {
            Some(base) => match base.join(raw) {
                Ok(resolved) => Some(resolved.to_string()),
                Err(_) => Some(raw.to_string()),
            },
            None => Some(raw.to_string()),
        }
    }

    fn inner_html(&self) -> String {
        self.element.inner_html()
    }

    fn form_value(&self) -> Option<String> {
        let el = self.element.value();
        match el.name() {
            "textarea" => Some(self.element.text().collect()),
            "select" => {
                let options: Vec<ElementRef> = self
                    .element
                    .descendants()
                    .filter_map(ElementRef::wrap)
                    .filter(|e| e.value().name() == "option")
                    .collect();
                let chosen = options
                    .iter()
                    .find(|o| o.value().attr("selected").is_some())
                    .or_else(|| options.first())?;
                Some(option_value(chosen))
            }
            "option" => Some(option_value(&self.element)),
            "input" | "button" | "data" | "li" | "meter" | "output" | "param" | "progress" => {
                Some(el.attr("value").unwrap_or_default().to_string())
            }
            _ => None,
        }
    }

    fn sibling_index(&self) -> Option<usize> {
        let parent = self.element.parent()?;
        let id = self.element.id();
        parent
            .children()
            .filter_map(ElementRef::wrap)
            .position(|child| child.id() == id)
    }
}

// An option without a value attribute submits its text
fn option_value(option: &ElementRef) -> String {
    match option.value().attr("value") {
        Some(v) => v.to_string(),
        None => option.text().collect::<String>().trim().to_string(),
    }
}
