//! Declarative question catalogs for the three diagnostics.
//!
//! Catalogs ship as JSON documents compiled into the crate. A deployment may
//! drop replacement documents into a directory (see `APP_CATALOG_DIR`); any
//! file present there wins over the embedded copy of the same name. Every
//! document is validated once at load time so the scorers can stay lenient
//! about answers without ever having to second-guess the catalog.

mod formula;
mod rsp;
mod typology;

pub use formula::{BandDefinition, BandLevel, FormulaCatalog, FormulaOption, FormulaQuestion};
pub use rsp::{RspCatalog, RspCategory, RspCode, RspOption, RspQuestion};
pub use typology::{CategoryProfile, TieBreak, TypologyCatalog, TypologyOption, TypologyQuestion};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TYPOLOGY_DOCUMENT: &str = "typology.json";
const FORMULA_DOCUMENT: &str = "formula.json";
const RSP_DOCUMENT: &str = "rsp.json";

const EMBEDDED_TYPOLOGY: &str = include_str!("data/typology.json");
const EMBEDDED_FORMULA: &str = include_str!("data/formula.json");
const EMBEDDED_RSP: &str = include_str!("data/rsp.json");

/// Immutable bundle of every catalog the service scores against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catalogs {
    pub typology: TypologyCatalog,
    pub formula: FormulaCatalog,
    pub rsp: RspCatalog,
}

impl Catalogs {
    /// Parses and validates the catalogs compiled into the crate.
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::load(None)
    }

    /// Loads catalogs, preferring documents found in `dir` over embedded ones.
    pub fn load(dir: Option<&Path>) -> Result<Self, CatalogError> {
        let typology: TypologyCatalog = read_document(dir, TYPOLOGY_DOCUMENT, EMBEDDED_TYPOLOGY)?;
        typology.validate()?;

        let formula: FormulaCatalog = read_document(dir, FORMULA_DOCUMENT, EMBEDDED_FORMULA)?;
        formula.validate()?;

        let rsp: RspCatalog = read_document(dir, RSP_DOCUMENT, EMBEDDED_RSP)?;
        rsp.validate()?;

        info!(
            typology_questions = typology.questions.len(),
            formula_questions = formula.questions.len(),
            rsp_questions = rsp.questions.len(),
            "diagnostic catalogs loaded"
        );

        Ok(Self {
            typology,
            formula,
            rsp,
        })
    }
}

fn read_document<T: DeserializeOwned>(
    dir: Option<&Path>,
    name: &'static str,
    embedded: &'static str,
) -> Result<T, CatalogError> {
    let override_path = dir.map(|dir| dir.join(name)).filter(|path| path.is_file());

    match override_path {
        Some(path) => {
            debug!(path = %path.display(), "reading catalog override");
            let raw = fs::read_to_string(&path).map_err(|source| CatalogError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
                document: name,
                source,
            })
        }
        None => serde_json::from_str(embedded).map_err(|source| CatalogError::Parse {
            document: name,
            source,
        }),
    }
}

/// Raised when a catalog document cannot be read, parsed, or trusted.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("unable to read catalog {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("catalog {document} is not valid JSON for its schema: {source}")]
    Parse {
        document: &'static str,
        source: serde_json::Error,
    },
    #[error("catalog {document} rejected: {reason}")]
    Invalid {
        document: &'static str,
        reason: String,
    },
}

impl CatalogError {
    pub(crate) fn invalid(document: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            document,
            reason: reason.into(),
        }
    }
}

/// Question ids must be 1-based, dense and in catalog order.
pub(crate) fn check_dense_ids(
    document: &'static str,
    ids: impl Iterator<Item = u32>,
) -> Result<usize, CatalogError> {
    let mut count = 0usize;
    for (position, id) in ids.enumerate() {
        let expected = position as u32 + 1;
        if id != expected {
            return Err(CatalogError::invalid(
                document,
                format!("question at position {expected} has id {id}"),
            ));
        }
        count += 1;
    }

    if count == 0 {
        return Err(CatalogError::invalid(document, "catalog has no questions"));
    }
    Ok(count)
}
