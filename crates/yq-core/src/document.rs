//! Parsed page model: containers, meta tags, forms and the page URL.
//!
//! The runtime never owns a live DOM. A [`Document`] is parsed once from the
//! page HTML and keeps only what the handlers read: the recognized container
//! elements with their attributes, `<meta property>` content, search forms
//! and the classes on `<html>`/`<body>`.

use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;
use url::Url;

use crate::args::{Args, normalize_form_key};
use crate::{Error, Result};

/// Class that disables automatic behavior on the page root or a container.
pub const NO_AUTO_CLASS: &str = "yq-no-auto";

const RECOMMEND_MARKER: &str = "youneeq";
const RECOMMEND_TAG: &str = "youneeq-section";
const SEARCH_MARKER: &str = "youneeq-search";

const CONTAINER_SELECTOR: &str =
    "#youneeq, .youneeq, youneeq-section, #youneeq-search, .youneeq-search, youneeq-search";

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Selector(format!("{css}: {e}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Recommend,
    Search,
}

impl ContainerKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Recommend => "recommendation",
            Self::Search => "search",
        }
    }
}

/// Snapshot of one page element: tag, id, classes and attributes in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<(String, String)>,
}

impl Element {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Add an attribute. `id` and `class` also update the parsed fields.
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        match name {
            "id" => self.id = Some(value.to_string()),
            "class" => {
                self.classes = value.split_whitespace().map(str::to_string).collect();
            }
            _ => {}
        }
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    fn from_ref(element: &ElementRef<'_>) -> Self {
        let value = element.value();
        Self {
            tag: value.name().to_string(),
            id: value.id().map(str::to_string),
            classes: value.classes().map(str::to_string).collect(),
            attributes: value
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Configuration arguments from `data-yq-*` attributes.
    #[must_use]
    pub fn args(&self) -> Args {
        Args::from_attributes(self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    fn has_marker(&self, marker: &str, tag: &str) -> bool {
        self.id.as_deref() == Some(marker) || self.has_class(marker) || self.tag == tag
    }

    /// Which handler kind this element is a container for.
    #[must_use]
    pub fn container_kind(&self) -> Option<ContainerKind> {
        if self.has_marker(RECOMMEND_MARKER, RECOMMEND_TAG) {
            Some(ContainerKind::Recommend)
        } else if self.has_marker(SEARCH_MARKER, SEARCH_MARKER) {
            Some(ContainerKind::Search)
        } else {
            None
        }
    }

    /// Declared `data-yq-priority`; missing or unparsable values are 0.
    #[must_use]
    pub fn priority(&self) -> i64 {
        self.attr("data-yq-priority")
            .and_then(crate::args::parse_leading_int)
            .unwrap_or(0)
    }

    /// Whether the container opts out of its first automatic request.
    #[must_use]
    pub fn opts_out(&self) -> bool {
        self.has_class(NO_AUTO_CLASS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Text,
    Checkbox,
    Radio,
    Select,
    TextArea,
    /// Buttons, file inputs and images are never serialized.
    Excluded,
}

impl ControlKind {
    fn from_input_type(kind: &str) -> Self {
        match kind.to_ascii_lowercase().as_str() {
            "checkbox" => Self::Checkbox,
            "radio" => Self::Radio,
            "submit" | "button" | "reset" | "image" | "file" => Self::Excluded,
            _ => Self::Text,
        }
    }
}

/// One successful-control candidate of a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormControl {
    pub name: String,
    pub kind: ControlKind,
    pub value: String,
    pub checked: bool,
    pub disabled: bool,
}

impl FormControl {
    fn is_successful(&self) -> bool {
        if self.name.is_empty() || self.disabled {
            return false;
        }
        match self.kind {
            ControlKind::Excluded => false,
            ControlKind::Checkbox | ControlKind::Radio => self.checked,
            ControlKind::Text | ControlKind::Select | ControlKind::TextArea => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    pub id: String,
    pub controls: Vec<FormControl>,
}

impl Form {
    /// Serialized `(name, value)` pairs of the successful controls, in order.
    #[must_use]
    pub fn serialize(&self) -> Vec<(&str, &str)> {
        self.controls
            .iter()
            .filter(|c| c.is_successful())
            .map(|c| (c.name.as_str(), c.value.as_str()))
            .collect()
    }

    /// Form values as arguments: empty values are skipped and the search
    /// aliases collapse to `search`.
    #[must_use]
    pub fn args(&self) -> Args {
        self.serialize()
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, value)| (normalize_form_key(name), value))
            .collect()
    }

    /// Set the value of every control named `name`. For checkboxes and radios
    /// this checks the controls whose value matches.
    pub fn set_field(&mut self, name: &str, value: &str) -> bool {
        let mut found = false;
        for control in self.controls.iter_mut().filter(|c| c.name == name) {
            found = true;
            match control.kind {
                ControlKind::Checkbox | ControlKind::Radio => {
                    control.checked = control.value == value;
                }
                _ => control.value = value.to_string(),
            }
        }
        found
    }

    fn parse(form: &ElementRef<'_>, id: &str, fields: &Selector, options: &Selector) -> Self {
        let mut controls = Vec::new();

        for field in form.select(fields) {
            let el = field.value();
            let name = el.attr("name").unwrap_or_default().to_string();
            let disabled = el.attr("disabled").is_some();

            match el.name() {
                "textarea" => controls.push(FormControl {
                    name,
                    kind: ControlKind::TextArea,
                    value: field.text().collect(),
                    checked: false,
                    disabled,
                }),
                "select" => {
                    let all: Vec<_> = field.select(options).collect();
                    let mut selected: Vec<_> = all
                        .iter()
                        .filter(|o| o.value().attr("selected").is_some())
                        .collect();
                    if selected.is_empty() && el.attr("multiple").is_none() {
                        selected.extend(all.first());
                    }
                    for option in selected {
                        let value = option.value().attr("value").map_or_else(
                            || option.text().collect::<String>().trim().to_string(),
                            str::to_string,
                        );
                        controls.push(FormControl {
                            name: name.clone(),
                            kind: ControlKind::Select,
                            value,
                            checked: true,
                            disabled,
                        });
                    }
                }
                _ => {
                    let kind = ControlKind::from_input_type(el.attr("type").unwrap_or("text"));
                    let default_value = match kind {
                        ControlKind::Checkbox | ControlKind::Radio => "on",
                        _ => "",
                    };
                    controls.push(FormControl {
                        name,
                        kind,
                        value: el.attr("value").unwrap_or(default_value).to_string(),
                        checked: el.attr("checked").is_some(),
                        disabled,
                    });
                }
            }
        }

        Self {
            id: id.to_string(),
            controls,
        }
    }
}

/// The parsed page.
#[derive(Debug, Clone)]
pub struct Document {
    url: Url,
    root_classes: Vec<String>,
    meta: HashMap<String, String>,
    containers: Vec<Element>,
    forms: BTreeMap<String, Form>,
}

impl Document {
    /// Parse page HTML loaded from `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not an absolute URL.
    pub fn parse(html: &str, url: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        let page = Html::parse_document(html);

        let mut root_classes = Vec::new();
        for root in page.select(&selector("html, body")?) {
            root_classes.extend(root.value().classes().map(str::to_string));
        }

        let mut meta = HashMap::new();
        for tag in page.select(&selector("meta[property]")?) {
            if let Some(property) = tag.value().attr("property") {
                meta.entry(property.to_string())
                    .or_insert_with(|| tag.value().attr("content").unwrap_or_default().to_string());
            }
        }

        let containers: Vec<Element> = page
            .select(&selector(CONTAINER_SELECTOR)?)
            .map(|e| Element::from_ref(&e))
            .collect();

        let fields = selector("input, select, textarea")?;
        let options = selector("option")?;
        let mut forms = BTreeMap::new();
        for form in page.select(&selector("form[id]")?) {
            if let Some(id) = form.value().id() {
                forms.insert(id.to_string(), Form::parse(&form, id, &fields, &options));
            }
        }

        debug!(
            "Parsed {url}: {} containers, {} forms, {} meta tags",
            containers.len(),
            forms.len(),
            meta.len()
        );

        Ok(Self {
            url,
            root_classes,
            meta,
            containers,
            forms,
        })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn host_name(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Decoded query parameter of the page URL.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// Content of `<meta property="...">`; an existing tag without content is `""`.
    #[must_use]
    pub fn meta(&self, property: &str) -> Option<&str> {
        self.meta.get(property).map(String::as_str)
    }

    /// Open Graph tag content with the `og:` prefix omitted from `name`.
    #[must_use]
    pub fn og(&self, name: &str) -> Option<&str> {
        self.meta(&format!("og:{name}"))
    }

    /// Whether `<html>` or `<body>` disables automatic discovery.
    #[must_use]
    pub fn auto_disabled(&self) -> bool {
        self.root_classes.iter().any(|c| c == NO_AUTO_CLASS)
    }

    /// Containers of one kind in document order.
    pub fn containers(&self, kind: ContainerKind) -> impl Iterator<Item = &Element> {
        self.containers
            .iter()
            .filter(move |e| e.container_kind() == Some(kind))
    }

    #[must_use]
    pub fn form(&self, id: &str) -> Option<&Form> {
        self.forms.get(id.trim_start_matches('#'))
    }

    pub fn form_mut(&mut self, id: &str) -> Option<&mut Form> {
        self.forms.get_mut(id.trim_start_matches('#'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html class="js"><head>
  <meta property="og:title" content="Maple syrup season">
  <meta property="og:url" content="https://news.example.com/maple">
  <meta property="og:image" content="">
  <meta property="article:published_time" content="2024-03-01T10:00:00Z">
</head><body>
  <div id="youneeq" data-yq-count="5" data-yq-priority="2"></div>
  <youneeq-section class="yq-no-auto" data-yq-suggest-count="3"></youneeq-section>
  <div class="youneeq-search" data-yq-search-form-id="search-form"></div>
  <form id="search-form">
    <input type="text" name="s" value="maple">
    <input type="checkbox" name="personalized" value="true" checked>
    <input type="checkbox" name="contentInfo" value="true">
    <input type="text" name="ignored" value="x" disabled>
    <select name="orderBy"><option value="relevance">R</option><option value="date" selected>D</option></select>
    <input type="submit" name="go" value="Go">
  </form>
</body></html>"#;

    fn page() -> Document {
        Document::parse(PAGE, "https://news.example.com/maple?s=syrup&page=2").unwrap()
    }

    #[test]
    fn test_containers_in_document_order() {
        let doc = page();
        let recommend: Vec<_> = doc.containers(ContainerKind::Recommend).collect();
        assert_eq!(recommend.len(), 2);
        assert_eq!(recommend[0].id.as_deref(), Some("youneeq"));
        assert_eq!(recommend[0].priority(), 2);
        assert_eq!(recommend[1].tag, "youneeq-section");
        assert!(recommend[1].opts_out());

        let search: Vec<_> = doc.containers(ContainerKind::Search).collect();
        assert_eq!(search.len(), 1);
        assert_eq!(search[0].args().get("search_form_id"), Some("search-form"));
    }

    #[test]
    fn test_meta_lookup() {
        let doc = page();
        assert_eq!(doc.og("title"), Some("Maple syrup season"));
        assert_eq!(doc.og("image"), Some(""));
        assert_eq!(doc.og("description"), None);
        assert_eq!(doc.meta("article:published_time"), Some("2024-03-01T10:00:00Z"));
    }

    #[test]
    fn test_url_helpers() {
        let doc = page();
        assert_eq!(doc.host_name(), "news.example.com");
        assert_eq!(doc.query_param("s").as_deref(), Some("syrup"));
        assert_eq!(doc.query_param("missing"), None);
        assert!(!doc.auto_disabled());
    }

    #[test]
    fn test_root_opt_out() {
        let doc = Document::parse(
            r#"<html><body class="yq-no-auto"><div class="youneeq"></div></body></html>"#,
            "https://example.com/",
        )
        .unwrap();
        assert!(doc.auto_disabled());
    }

    #[test]
    fn test_form_serialization() {
        let doc = page();
        let form = doc.form("#search-form").unwrap();
        assert_eq!(
            form.serialize(),
            vec![
                ("s", "maple"),
                ("personalized", "true"),
                ("orderBy", "date"),
            ]
        );

        let args = form.args();
        assert_eq!(args.get("search"), Some("maple"));
        assert!(!args.contains("s"));
        assert!(!args.contains("ignored"));
    }

    #[test]
    fn test_form_set_field() {
        let mut doc = page();
        let form = doc.form_mut("search-form").unwrap();
        assert!(form.set_field("s", ""));
        assert!(form.set_field("contentInfo", "true"));
        assert!(!form.set_field("nope", "1"));

        let args = form.args();
        assert!(!args.contains("search"));
        assert_eq!(args.get("contentInfo"), Some("true"));
    }

    #[test]
    fn test_element_builder_and_kind() {
        let el = Element::new("div")
            .with_attr("class", "youneeq-search extra")
            .with_attr("data-yq-search-type", "image");
        assert_eq!(el.container_kind(), Some(ContainerKind::Search));
        assert!(el.has_class("extra"));
        assert_eq!(el.args().get("search_type"), Some("image"));

        let plain = Element::new("div").with_attr("id", "sidebar");
        assert_eq!(plain.container_kind(), None);
        assert_eq!(plain.priority(), 0);
    }
}
