use smods_common::PageKind;
use smods_http::HttpError;
use thiserror::Error;

/// The markup did not have the shape the rule book expects.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{page} page: container not found")]
    ContainerNotFound { page: PageKind },
    #[error("{page} page: missing field `{field}`")]
    MissingField { page: PageKind, field: String },
    #[error("{page} page: invalid value {value:?} for `{field}`")]
    InvalidField {
        page: PageKind,
        field: String,
        value: String,
    },
    #[error("invalid selector {selector:?} for `{field}`: {message}")]
    InvalidSelector {
        field: String,
        selector: String,
        message: String,
    },
}

impl ParseError {
    pub(crate) fn missing(page: PageKind, field: &str) -> Self {
        ParseError::MissingField {
            page,
            field: field.to_string(),
        }
    }

    pub(crate) fn invalid(page: PageKind, field: &str, value: impl Into<String>) -> Self {
        ParseError::InvalidField {
            page,
            field: field.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] HttpError),
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),
    #[error("not found: {0}")]
    NotFound(String),
    /// Skymods ids are numeric; anything else would address another page.
    #[error("invalid mod id {0:?}")]
    InvalidId(String),
    #[error("unsupported hosting service: {0}")]
    UnsupportedHost(String),
}

pub type Result<T, E = CatalogueError> = std::result::Result<T, E>;
