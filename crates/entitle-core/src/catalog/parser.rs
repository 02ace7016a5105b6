//! catalog.toml loading.

use std::path::Path;

use anyhow::{Context, Result};

use super::schema::Catalog;
use crate::config::parser::enhance_toml_error;

pub fn parse_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog: {}", path.display()))?;

    parse_catalog_str(&content)
        .with_context(|| format!("Failed to parse catalog: {}", path.display()))
}

pub fn parse_catalog_str(content: &str) -> Result<Catalog> {
    let catalog: Catalog = toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;
    catalog.validate()?;
    Ok(catalog)
}
