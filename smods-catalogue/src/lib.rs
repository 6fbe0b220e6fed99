//! Skymods catalogue scraper.
//!
//! Fetches catalogue and detail pages through a [`smods_http::Transport`] and
//! turns them into mod records with a data-driven [`Extractor`]:
//!
//! - [`CatalogueItem`]: one entry of a listing page
//! - [`FullMod`]: everything a detail page shows
//! - [`ModDependency`]: a required mod and the mods requiring it
//!
//! All of them embed a [`ModBase`]; [`Mod`] tags them for dispatch.
//!
//! ```
//! use smods_catalogue::{Extractor, Mod, ModKind};
//! use smods_common::{PageKind, rules::RuleBook};
//!
//! let html = r#"<div id="content"></div>"#;
//! let extractor = Extractor::new(RuleBook::default()).unwrap();
//! let mods: Vec<Mod> = extractor.extract(PageKind::Catalogue, html).unwrap();
//! assert!(mods.iter().all(|m| m.kind() == ModKind::Catalogue));
//! ```
pub mod client;
pub mod dates;
pub mod error;
pub mod extract;
pub mod types;

pub use client::CatalogueClient;
pub use error::{CatalogueError, ParseError, Result};
pub use extract::Extractor;
pub use types::{
    CatalogueItem, CatalogueQuery, FullMod, Mod, ModBase, ModDependency, ModKind, ModRevision,
    RequiredMod, SortBy, TimePeriod,
};
