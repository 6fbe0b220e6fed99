//! Data-driven extraction rules.
//!
//! A [`RuleBook`] holds one [`RuleSet`] per [`PageKind`]. A rule set names the
//! container that must be present on the page, an optional item locator for
//! listing pages, and a map from field name to [`Locator`]. New record variants
//! are added by declaring fields here, not by writing new traversal code.
//!
//! Rule books deserialize from configuration. A locator may be written as a
//! bare CSS selector string or as a full mapping:
//!
//! ```
//! use smods_common::rules::{Locator, Read};
//!
//! let short: Locator = serde_json::from_str(r#""h1.post-title""#).unwrap();
//! assert_eq!(short, Locator::css("h1.post-title"));
//!
//! let full: Locator = serde_json::from_str(
//!     r#"{ "css": "a.skymods-excerpt-btn", "read": { "attr": "href" } }"#,
//! )
//! .unwrap();
//! assert_eq!(full.read, Read::Attr("href".into()));
//! ```
use crate::PageKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known field names used by the default rule book and the record builders.
pub mod field {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const STEAM_URL: &str = "steam_url";
    pub const AUTHORS: &str = "authors";
    pub const SIZE: &str = "size";
    pub const PUBLISHED: &str = "published";
    pub const UPDATED: &str = "updated";
    pub const REVISION: &str = "revision";
    pub const DOWNLOAD_URL: &str = "download_url";
    pub const HAS_DEPENDENCIES: &str = "has_dependencies";
    pub const CATEGORY: &str = "category";
    pub const IMAGE_URL: &str = "image_url";
    pub const RATING: &str = "rating";
    pub const DESCRIPTION: &str = "description";
    pub const DLC: &str = "dlc";
    pub const REQUIRED_NAMES: &str = "required_names";
    pub const REQUIRED_LINKS: &str = "required_links";
    pub const REVISION_NAMES: &str = "revision_names";
    pub const REVISION_URLS: &str = "revision_urls";
    pub const TAGS: &str = "tags";
}

/// What to read from a matched element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Read {
    /// Visible text with whitespace collapsed.
    #[default]
    Text,
    /// Inner HTML, untouched.
    Html,
    /// The value of the named attribute.
    Attr(String),
}

/// Where a field lives in the document and how to read it.
///
/// An empty `css` selects the element the rule is evaluated against (the
/// listing item or the page container).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LocatorRepr")]
pub struct Locator {
    pub css: String,
    #[serde(default)]
    pub read: Read,
    /// Keep only matches whose text contains this label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    /// Selector applied inside every kept match; its matches become the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LocatorRepr {
    Css(String),
    Full {
        css: String,
        #[serde(default)]
        read: Read,
        #[serde(default)]
        contains: Option<String>,
        #[serde(default)]
        inner: Option<String>,
    },
}

impl From<LocatorRepr> for Locator {
    fn from(repr: LocatorRepr) -> Self {
        match repr {
            LocatorRepr::Css(css) => Locator::css(css),
            LocatorRepr::Full {
                css,
                read,
                contains,
                inner,
            } => Locator {
                css,
                read,
                contains,
                inner,
            },
        }
    }
}

impl Locator {
    /// Read the text of every element matching `css`.
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            read: Read::Text,
            contains: None,
            inner: None,
        }
    }

    /// The element the rule is evaluated against.
    pub fn this() -> Self {
        Self::css("")
    }

    pub fn attr(mut self, name: impl Into<String>) -> Self {
        self.read = Read::Attr(name.into());
        self
    }

    pub fn html(mut self) -> Self {
        self.read = Read::Html;
        self
    }

    pub fn containing(mut self, label: impl Into<String>) -> Self {
        self.contains = Some(label.into());
        self
    }

    pub fn inner(mut self, css: impl Into<String>) -> Self {
        self.inner = Some(css.into());
        self
    }
}

/// Extraction rules for one page kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Must match at least once, otherwise the page is not what we expected.
    pub container: Locator,
    /// Listing items, selected inside the first container match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Locator>,
    #[serde(default)]
    pub fields: BTreeMap<String, Locator>,
}

impl RuleSet {
    /// Overlay a partial rule set; fields named in the patch replace ours.
    pub fn apply(&mut self, patch: &RuleSetPatch) {
        if let Some(container) = &patch.container {
            self.container = container.clone();
        }
        if let Some(item) = &patch.item {
            self.item = Some(item.clone());
        }
        for (name, locator) in &patch.fields {
            self.fields.insert(name.clone(), locator.clone());
        }
    }
}

/// Partial [`RuleSet`] as read from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSetPatch {
    #[serde(default)]
    pub container: Option<Locator>,
    #[serde(default)]
    pub item: Option<Locator>,
    #[serde(default)]
    pub fields: BTreeMap<String, Locator>,
}

/// Partial [`RuleBook`] as read from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBookPatch {
    #[serde(default)]
    pub catalogue: Option<RuleSetPatch>,
    #[serde(default)]
    pub detail: Option<RuleSetPatch>,
}

/// One rule set per page kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBook {
    pub catalogue: RuleSet,
    pub detail: RuleSet,
}

impl RuleBook {
    pub fn for_page(&self, kind: PageKind) -> &RuleSet {
        match kind {
            PageKind::Catalogue => &self.catalogue,
            PageKind::Detail => &self.detail,
        }
    }

    /// The default rule book with configuration overrides applied.
    ///
    /// ```
    /// use smods_common::rules::{field, Locator, RuleBook, RuleBookPatch, RuleSetPatch};
    ///
    /// let mut patch = RuleBookPatch::default();
    /// let mut detail = RuleSetPatch::default();
    /// detail.fields.insert(field::NAME.into(), Locator::css("h1.entry-title"));
    /// patch.detail = Some(detail);
    ///
    /// let book = RuleBook::default().patched(&patch);
    /// assert_eq!(book.detail.fields[field::NAME].css, "h1.entry-title");
    /// assert_eq!(book.catalogue, RuleBook::default().catalogue);
    /// ```
    pub fn patched(mut self, patch: &RuleBookPatch) -> Self {
        if let Some(p) = &patch.catalogue {
            self.catalogue.apply(p);
        }
        if let Some(p) = &patch.detail {
            self.detail.apply(p);
        }
        self
    }
}

impl Default for RuleBook {
    fn default() -> Self {
        Self {
            catalogue: default_catalogue_rules(),
            detail: default_detail_rules(),
        }
    }
}

const FILLED_STAR: &str = r##".skymods-item-rating path[fill="#3b8dbd"]"##;
const STEAM_LINK: &str = r#"a[href*="steamcommunity.com"]"#;

fn default_catalogue_rules() -> RuleSet {
    let fields = BTreeMap::from([
        (field::ID.into(), Locator::this().attr("id")),
        (field::NAME.into(), Locator::css("h2.post-title")),
        (
            field::STEAM_URL.into(),
            Locator::css(format!(".skymods-excerpt-meta {STEAM_LINK}")).attr("href"),
        ),
        (field::AUTHORS.into(), Locator::css(".skymods-item-authors a")),
        (field::SIZE.into(), Locator::css(".skymods-item-file-size")),
        (
            field::PUBLISHED.into(),
            Locator::css("time.published").attr("datetime"),
        ),
        (
            field::REVISION.into(),
            Locator::css(".skymods-excerpt-meta .skymods-item-date"),
        ),
        (
            field::DOWNLOAD_URL.into(),
            Locator::css("a.skymods-excerpt-btn").attr("href"),
        ),
        (
            field::HAS_DEPENDENCIES.into(),
            Locator::css("a.skymods-excerpt-btn.skymods-required-warning"),
        ),
        (
            field::CATEGORY.into(),
            Locator::css(r#"a[rel="category tag"]"#),
        ),
        (
            field::IMAGE_URL.into(),
            Locator::css(".post-thumbnail img").attr("src"),
        ),
        (field::RATING.into(), Locator::css(FILLED_STAR)),
    ]);

    RuleSet {
        container: Locator::css("#content"),
        item: Some(Locator::css("article")),
        fields,
    }
}

fn default_detail_rules() -> RuleSet {
    let fields = BTreeMap::from([
        (field::ID.into(), Locator::this().attr("class")),
        (field::NAME.into(), Locator::css("h1.post-title")),
        (
            field::STEAM_URL.into(),
            Locator::css(format!(".skymods-single-before {STEAM_LINK}")).attr("href"),
        ),
        (
            field::AUTHORS.into(),
            Locator::css(".skymods-single-before .skymods-item-authors a"),
        ),
        (field::SIZE.into(), Locator::css(".skymods-item-file-size")),
        (
            field::PUBLISHED.into(),
            Locator::css(".post-byline time.published").attr("datetime"),
        ),
        (
            field::UPDATED.into(),
            Locator::css(".post-byline time.updated").attr("datetime"),
        ),
        (
            field::REVISION.into(),
            Locator::css(".skymods-single-before .skymods-item-date"),
        ),
        (
            field::DOWNLOAD_URL.into(),
            Locator::css(".skymods-single-after a.skymods-excerpt-btn").attr("href"),
        ),
        (field::HAS_DEPENDENCIES.into(), Locator::css("#required-items")),
        (
            field::CATEGORY.into(),
            Locator::css(r#"a[rel="category tag"]"#),
        ),
        (
            field::IMAGE_URL.into(),
            Locator::css(".skymods-single-preview-wrap img").attr("src"),
        ),
        (field::RATING.into(), Locator::css(FILLED_STAR)),
        (
            field::DESCRIPTION.into(),
            Locator::css(".skymods-single-description").html(),
        ),
        (
            field::DLC.into(),
            Locator::css("#required-items > div")
                .containing("Required DLC")
                .inner("a"),
        ),
        (
            field::REQUIRED_NAMES.into(),
            Locator::css("#required-items > div")
                .containing("Required items")
                .inner("a"),
        ),
        (
            field::REQUIRED_LINKS.into(),
            Locator::css("#required-items > div")
                .containing("Required items")
                .inner("a")
                .attr("href"),
        ),
        (field::REVISION_NAMES.into(), Locator::css("#revisions a")),
        (
            field::REVISION_URLS.into(),
            Locator::css("#revisions a").attr("href"),
        ),
        (field::TAGS.into(), Locator::css(".post-tags a")),
    ]);

    RuleSet {
        container: Locator::css("article"),
        item: None,
        fields,
    }
}
