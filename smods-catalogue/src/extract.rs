//! Turn catalogue markup into mod records.
//!
//! The [`Extractor`] evaluates a [`RuleBook`] against a parsed document: the
//! page kind picks the rule set, each field locator is evaluated inside the
//! listing item (catalogue pages) or the page container (detail pages), and
//! small builders project the resulting strings into typed records.
//!
//! Catalogue items that fail to build are skipped with a warning; a page whose
//! container is missing fails as a whole.
use chrono::{Datelike, Local};
use scraper::{ElementRef, Html, Selector};
use smods_common::PageKind;
use smods_common::rules::{Locator, Read, RuleBook, RuleSet, field};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

use crate::dates::{self, PUBLISHED_TEMPLATES, REVISION_TEMPLATES};
use crate::error::ParseError;
use crate::types::{CatalogueItem, FullMod, Mod, ModBase, ModRevision, RequiredMod};

const MAX_RATING: usize = 5;

#[derive(Debug, Clone)]
pub struct Extractor {
    rules: RuleBook,
    catalogue: Arc<CompiledRules>,
    detail: Arc<CompiledRules>,
    base: Option<Url>,
    year: Option<i32>,
}

impl Extractor {
    /// Build an extractor, compiling every selector of the rule book once.
    pub fn new(rules: RuleBook) -> Result<Self, ParseError> {
        let catalogue = Arc::new(CompiledRules::new(&rules.catalogue)?);
        let detail = Arc::new(CompiledRules::new(&rules.detail)?);
        Ok(Self {
            rules,
            catalogue,
            detail,
            base: None,
            year: None,
        })
    }

    /// Resolve relative links found in the markup against `base`.
    pub fn with_base(mut self, base: Url) -> Self {
        self.base = Some(base);
        self
    }

    /// Year assumed for revision labels that omit it. Defaults to the current year.
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn rules(&self) -> &RuleBook {
        &self.rules
    }

    /// Extract every record a page of the given kind holds, in document order.
    pub fn extract(&self, kind: PageKind, html: &str) -> Result<Vec<Mod>, ParseError> {
        match kind {
            PageKind::Catalogue => Ok(self
                .catalogue(html)?
                .into_iter()
                .map(Mod::Catalogue)
                .collect()),
            PageKind::Detail => Ok(vec![Mod::Full(self.full(html)?)]),
        }
    }

    /// Listing items of a catalogue page. Malformed items are skipped.
    pub fn catalogue(&self, html: &str) -> Result<Vec<CatalogueItem>, ParseError> {
        let page = PageKind::Catalogue;
        let rules = &*self.catalogue;
        let document = Html::parse_document(html);
        let container = rules.container(page, &document)?;

        let items: Vec<ElementRef<'_>> = match &rules.item {
            Some(item) => item.matches(container),
            None => vec![container],
        };

        let mut out = Vec::with_capacity(items.len());
        for (index, element) in items.into_iter().enumerate() {
            let scope = Scope {
                page,
                rules,
                element,
            };
            match self.catalogue_item(&scope) {
                Ok(item) => out.push(item),
                Err(error) => {
                    tracing::warn!(%page, index, %error, "extract.item.skipped");
                }
            }
        }
        tracing::debug!(%page, count = out.len(), "extract.catalogue.done");
        Ok(out)
    }

    /// The [`ModBase`] projection of a detail page.
    pub fn detail_base(&self, html: &str) -> Result<ModBase, ParseError> {
        let page = PageKind::Detail;
        let rules = &*self.detail;
        let document = Html::parse_document(html);
        let element = rules.container(page, &document)?;
        self.base(&Scope {
            page,
            rules,
            element,
        })
    }

    /// Everything a detail page shows.
    pub fn full(&self, html: &str) -> Result<FullMod, ParseError> {
        let page = PageKind::Detail;
        let rules = &*self.detail;
        let document = Html::parse_document(html);
        let element = rules.container(page, &document)?;
        let scope = Scope {
            page,
            rules,
            element,
        };

        let base = self.base(&scope)?;
        let description = scope.first(field::DESCRIPTION);
        let plain_description = description.as_deref().map(plain_text);
        let updated_date = scope
            .first(field::UPDATED)
            .and_then(|text| self.optional_date(page, field::UPDATED, &text));

        let required_mods = scope
            .pairs(field::REQUIRED_NAMES, field::REQUIRED_LINKS)
            .into_iter()
            .map(|(name, link)| {
                let link = self.absolutize(&link);
                RequiredMod {
                    name,
                    steam_id: steam_id_from_url(&link),
                    link,
                }
            })
            .collect();

        let mut other_revisions: Vec<ModRevision> = scope
            .pairs(field::REVISION_NAMES, field::REVISION_URLS)
            .into_iter()
            .filter_map(|(label, url)| match self.revision(page, &label, &url) {
                Ok(rev) => Some(rev),
                Err(error) => {
                    tracing::warn!(%page, %error, "extract.revision.skipped");
                    None
                }
            })
            .collect();
        other_revisions.sort_by_key(|r| r.date);

        Ok(FullMod {
            base,
            description,
            plain_description,
            updated_date,
            dlc_requirements: scope.all(field::DLC),
            required_mods,
            other_revisions,
            tags: scope.all(field::TAGS),
            image_url: scope.first(field::IMAGE_URL).map(|u| self.absolutize(&u)),
            rating: scope.rating(),
        })
    }

    // ==============================
    // Builders
    // ==============================

    fn catalogue_item(&self, scope: &Scope<'_, '_>) -> Result<CatalogueItem, ParseError> {
        Ok(CatalogueItem {
            base: self.base(scope)?,
            image_url: scope
                .first(field::IMAGE_URL)
                .map(|u| self.absolutize(&u)),
            rating: scope.rating(),
        })
    }

    fn base(&self, scope: &Scope<'_, '_>) -> Result<ModBase, ParseError> {
        let page = scope.page;

        let raw_id = scope.required(field::ID)?;
        let id = post_id(&raw_id).ok_or_else(|| ParseError::invalid(page, field::ID, &raw_id))?;
        let name = scope.required(field::NAME)?;
        let steam_url = scope.required(field::STEAM_URL)?;
        let steam_id = steam_id_from_url(&steam_url)
            .ok_or_else(|| ParseError::invalid(page, field::STEAM_URL, &steam_url))?;
        let label = scope.required(field::REVISION)?;
        let download_url = scope.required(field::DOWNLOAD_URL)?;
        let latest_revision = self.revision(page, &label, &download_url)?;

        let published_date = scope
            .first(field::PUBLISHED)
            .and_then(|text| self.optional_date(page, field::PUBLISHED, &text));

        Ok(ModBase {
            id,
            name,
            steam_id,
            authors: scope.all(field::AUTHORS),
            size: scope.first(field::SIZE),
            published_date,
            has_dependencies: scope.count(field::HAS_DEPENDENCIES) > 0,
            latest_revision,
            category: scope.first(field::CATEGORY),
        })
    }

    fn revision(&self, page: PageKind, label: &str, url: &str) -> Result<ModRevision, ParseError> {
        let name = dates::clean_revision_label(label);
        let (date, _) = dates::parse_time(&name, &REVISION_TEMPLATES, self.current_year())
            .ok_or_else(|| ParseError::invalid(page, field::REVISION, &name))?;
        Ok(ModRevision::new(name, date, self.absolutize(url)))
    }

    fn optional_date(&self, page: PageKind, name: &str, text: &str) -> Option<chrono::NaiveDateTime> {
        let parsed = dates::parse_time(text, &PUBLISHED_TEMPLATES, self.current_year());
        if parsed.is_none() {
            tracing::debug!(%page, field = name, value = text, "extract.date.unparsed");
        }
        parsed.map(|(date, _)| date)
    }

    fn current_year(&self) -> i32 {
        self.year.unwrap_or_else(|| Local::now().year())
    }

    fn absolutize(&self, href: &str) -> String {
        match &self.base {
            Some(base) => base
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        }
    }
}

// ==============================
// Rule evaluation
// ==============================

#[derive(Debug)]
struct CompiledLocator {
    /// `None` selects the scope element itself.
    css: Option<Selector>,
    read: Read,
    contains: Option<String>,
    inner: Option<Selector>,
}

impl CompiledLocator {
    fn new(name: &str, locator: &Locator) -> Result<Self, ParseError> {
        let css = if locator.css.trim().is_empty() {
            None
        } else {
            Some(compile(name, &locator.css)?)
        };
        let inner = match &locator.inner {
            Some(inner) => Some(compile(name, inner)?),
            None => None,
        };
        Ok(Self {
            css,
            read: locator.read.clone(),
            contains: locator.contains.clone(),
            inner,
        })
    }

    fn matches<'d>(&self, scope: ElementRef<'d>) -> Vec<ElementRef<'d>> {
        let outer: Vec<ElementRef<'d>> = match &self.css {
            Some(sel) => scope.select(sel).collect(),
            None => vec![scope],
        };
        let kept = outer.into_iter().filter(|el| match &self.contains {
            Some(label) => collapsed_text(*el).contains(label.as_str()),
            None => true,
        });
        match &self.inner {
            Some(inner) => kept.flat_map(|el| el.select(inner).collect::<Vec<_>>()).collect(),
            None => kept.collect(),
        }
    }

    fn read(&self, el: ElementRef<'_>) -> Option<String> {
        let value = match &self.read {
            Read::Text => collapsed_text(el),
            Read::Html => el.inner_html().trim().to_string(),
            Read::Attr(name) => el.value().attr(name)?.trim().to_string(),
        };
        (!value.is_empty()).then_some(value)
    }
}

fn compile(name: &str, css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::InvalidSelector {
        field: name.to_string(),
        selector: css.to_string(),
        message: e.to_string(),
    })
}

#[derive(Debug)]
struct CompiledRules {
    container: CompiledLocator,
    item: Option<CompiledLocator>,
    fields: BTreeMap<String, CompiledLocator>,
}

impl CompiledRules {
    fn new(set: &RuleSet) -> Result<Self, ParseError> {
        let container = CompiledLocator::new("container", &set.container)?;
        let item = match &set.item {
            Some(item) => Some(CompiledLocator::new("item", item)?),
            None => None,
        };
        let mut fields = BTreeMap::new();
        for (name, loc) in &set.fields {
            fields.insert(name.clone(), CompiledLocator::new(name, loc)?);
        }
        Ok(Self {
            container,
            item,
            fields,
        })
    }

    fn container<'d>(&self, page: PageKind, document: &'d Html) -> Result<ElementRef<'d>, ParseError> {
        self.container
            .matches(document.root_element())
            .into_iter()
            .next()
            .ok_or(ParseError::ContainerNotFound { page })
    }
}

/// Field lookups inside one element.
struct Scope<'r, 'd> {
    page: PageKind,
    rules: &'r CompiledRules,
    element: ElementRef<'d>,
}

impl Scope<'_, '_> {
    fn all(&self, name: &str) -> Vec<String> {
        match self.rules.fields.get(name) {
            Some(loc) => loc
                .matches(self.element)
                .into_iter()
                .filter_map(|el| loc.read(el))
                .collect(),
            None => Vec::new(),
        }
    }

    fn first(&self, name: &str) -> Option<String> {
        let loc = self.rules.fields.get(name)?;
        loc.matches(self.element)
            .into_iter()
            .find_map(|el| loc.read(el))
    }

    fn required(&self, name: &str) -> Result<String, ParseError> {
        self.first(name)
            .ok_or_else(|| ParseError::missing(self.page, name))
    }

    /// Values of two fields read from the same elements, such as a link's
    /// text and its `href`.
    ///
    /// Each match of `first` is paired with the match of `second` that is the
    /// same element or lies inside it. Pairs missing either value are dropped.
    fn pairs(&self, first: &str, second: &str) -> Vec<(String, String)> {
        let (Some(a), Some(b)) = (self.rules.fields.get(first), self.rules.fields.get(second))
        else {
            return Vec::new();
        };
        let partners = b.matches(self.element);
        a.matches(self.element)
            .into_iter()
            .filter_map(|el| {
                let partner = partners.iter().find(|p| {
                    **p == el || p.ancestors().any(|node| node.id() == el.id())
                })?;
                Some((a.read(el)?, b.read(*partner)?))
            })
            .collect()
    }

    /// Number of elements matched, whatever they contain.
    fn count(&self, name: &str) -> usize {
        self.rules
            .fields
            .get(name)
            .map(|loc| loc.matches(self.element).len())
            .unwrap_or(0)
    }

    fn rating(&self) -> u8 {
        self.count(field::RATING).min(MAX_RATING) as u8
    }
}

// ==============================
// Value helpers
// ==============================

fn collapsed_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn plain_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    collapsed_text(fragment.root_element())
}

/// Skymods id from an element id or class list (`post-12345`).
pub fn post_id(value: &str) -> Option<String> {
    value
        .split_whitespace()
        .filter_map(|token| token.strip_prefix("post-"))
        .find(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
        .map(str::to_string)
}

/// Steam id from a workshop link (`?id=`) or a catalogue search link (`?s=`).
pub fn steam_id_from_url(link: &str) -> Option<String> {
    let url = Url::parse(link)
        .or_else(|_| Url::parse("https://localhost/").and_then(|b| b.join(link)))
        .ok()?;
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    ["id", "s"].into_iter().find_map(|key| {
        pairs
            .iter()
            .find(|(k, v)| k == key && !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()))
            .map(|(_, v)| v.clone())
    })
}
