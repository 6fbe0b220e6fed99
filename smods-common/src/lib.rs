//! Common types and utilities shared across smods crates.
//!
//! This crate defines the page kinds, the data-driven extraction rule book,
//! and the observability helpers used throughout the workspace. It is kept
//! free of HTTP and HTML dependencies so that configuration and binaries can
//! depend on it without pulling in the scraper stack.
//!
//! # Overview
//!
//! - [`PageKind`]: which kind of catalogue page a piece of markup came from
//! - [`rules`]: locators, rule sets and the default rule book
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use smods_common::{PageKind, rules::{field, RuleBook}};
//!
//! let book = RuleBook::default();
//! assert!(book.for_page(PageKind::Catalogue).item.is_some());
//! assert!(book.for_page(PageKind::Detail).fields.contains_key(field::NAME));
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod observability;
pub mod rules;

/// The kind of page a markup document was fetched from.
///
/// The extractor needs it to pick the rule set and the record variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    /// Any page listing several mods in summary form (search, category, home).
    Catalogue,
    /// The page of a single mod.
    Detail,
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageKind::Catalogue => f.write_str("catalogue"),
            PageKind::Detail => f.write_str("detail"),
        }
    }
}
