//! Built-in table of servable models.
//!
//! Each model maps an ordered list of tags to the source reference its
//! artifact is built from. The tag `latest` selects the first tag listed.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

/// Tag alias selecting a model's first listed tag.
pub const LATEST_TAG: &str = "latest";

const LLAMA2_SOURCE: &str =
    "git+https://github.com/bojiang/bentovllm@main#subdirectory=llama2-7b-chat";

/// `(model, [(tag, source reference)])`, tags in preference order.
const MODELS: &[(&str, &[(&str, &str)])] = &[(
    "llama2",
    &[
        ("7b", LLAMA2_SOURCE),
        ("7b-chat", LLAMA2_SOURCE),
        ("7b-chat-fp16", LLAMA2_SOURCE),
    ],
)];

/// A model tag resolved against the catalog.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CatalogEntry {
    /// Model name.
    pub model: String,
    /// Concrete tag (never `latest`).
    pub tag: String,
    /// Source reference the artifact is built from.
    pub source: String,
}

/// Errors raised by catalog lookups.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CatalogError {
    /// Raised when the model is not in the catalog.
    #[error("unknown model `{model}`; run `cllama list` to see available models")]
    UnknownModel {
        /// Requested model.
        model: String,
    },
    /// Raised when the model has no such tag.
    #[error("model `{model}` has no tag `{tag}` (available: {available})")]
    UnknownTag {
        /// Requested model.
        model: String,
        /// Requested tag.
        tag: String,
        /// Comma-separated list of known tags.
        available: String,
    },
}

/// Resolves `model` and `tag` to a catalog entry.
///
/// # Errors
///
/// Returns [`CatalogError`] when the model or tag is unknown.
pub fn resolve(model: &str, tag: &str) -> Result<CatalogEntry, CatalogError> {
    let (_, tags) = MODELS
        .iter()
        .find(|(name, _)| *name == model)
        .ok_or_else(|| CatalogError::UnknownModel {
            model: model.to_owned(),
        })?;

    let found = if tag == LATEST_TAG {
        tags.first()
    } else {
        tags.iter().find(|(known, _)| *known == tag)
    };

    let (resolved_tag, source) = found.ok_or_else(|| CatalogError::UnknownTag {
        model: model.to_owned(),
        tag: tag.to_owned(),
        available: tags
            .iter()
            .map(|(known, _)| *known)
            .collect::<Vec<_>>()
            .join(", "),
    })?;

    Ok(CatalogEntry {
        model: model.to_owned(),
        tag: (*resolved_tag).to_owned(),
        source: (*source).to_owned(),
    })
}

#[derive(Serialize)]
struct Listing<'a> {
    models: BTreeMap<&'a str, Vec<&'a str>>,
}

/// Renders the catalog as YAML: `models: {<model>: [<tags>]}`.
///
/// # Errors
///
/// Returns the serializer error if the document cannot be rendered.
pub fn render_listing() -> Result<String, serde_yaml::Error> {
    let listing = Listing {
        models: MODELS
            .iter()
            .map(|(model, tags)| (*model, tags.iter().map(|(tag, _)| *tag).collect()))
            .collect(),
    };
    serde_yaml::to_string(&listing)
}
