/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::path::Path;

use ahash::AHashMap;
use anyhow::anyhow;

mod parser;
pub use parser::TypesDbParseError;

/// The ordered data source names of one collectd type.
///
/// Kind and min/max of each data source are checked on load but not kept,
/// the kind that counts is the one sent along with each value.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeDefinition {
    source_names: Vec<String>,
}

impl TypeDefinition {
    pub fn new(source_names: Vec<String>) -> Self {
        TypeDefinition { source_names }
    }

    pub fn len(&self) -> usize {
        self.source_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source_names.is_empty()
    }

    /// Name of the i-th data source
    pub fn source_name(&self, i: usize) -> Option<&str> {
        self.source_names.get(i).map(|s| s.as_str())
    }
}

/// Type name to data source lookup table, loaded from collectd's types.db.
///
/// The catalog is never modified after loading, so it can be shared
/// between threads without any locking.
#[derive(Clone, Debug, Default)]
pub struct TypeCatalog {
    inner: AHashMap<String, TypeDefinition>,
}

impl TypeCatalog {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read types db file {}: {e}", path.display()))?;
        TypeCatalog::parse(&content)
            .map_err(|e| anyhow!("invalid types db file {}: {e}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self, TypesDbParseError> {
        let mut inner = AHashMap::new();
        for (i, line) in content.lines().enumerate() {
            if let Some((name, definition)) = parser::parse_line(line, i + 1)? {
                inner.insert(name.to_string(), definition);
            }
        }
        Ok(TypeCatalog { inner })
    }

    pub fn lookup(&self, type_name: &str) -> Option<&TypeDefinition> {
        self.inner.get(type_name)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
