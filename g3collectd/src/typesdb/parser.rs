/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;

use thiserror::Error;

use super::TypeDefinition;
use crate::types::DataSourceKind;

#[derive(Debug, Error)]
pub enum TypesDbParseError {
    #[error("line {0}: no data source")]
    NoDataSource(usize),
    #[error("line {0}: invalid data source spec {1}")]
    InvalidSpec(usize, String),
    #[error("line {0}: invalid data source type: {1}")]
    InvalidKind(usize, anyhow::Error),
    #[error("line {0}: invalid min/max value {1}")]
    InvalidRange(usize, String),
}

impl TypesDbParseError {
    pub fn line(&self) -> usize {
        match self {
            TypesDbParseError::NoDataSource(line)
            | TypesDbParseError::InvalidSpec(line, _)
            | TypesDbParseError::InvalidKind(line, _)
            | TypesDbParseError::InvalidRange(line, _) => *line,
        }
    }
}

/// Parse `<type> <ds>:<KIND>:<min>:<max>[, ...]`, skip empty and comment lines
pub(super) fn parse_line(
    line: &str,
    line_number: usize,
) -> Result<Option<(&str, TypeDefinition)>, TypesDbParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let Some((name, specs)) = line.split_once(|c: char| c.is_ascii_whitespace()) else {
        return Err(TypesDbParseError::NoDataSource(line_number));
    };

    let mut source_names = Vec::new();
    for spec in specs.split(',') {
        let spec = spec.trim();
        if spec.is_empty() {
            continue;
        }
        let ds_name = parse_data_source(spec, line_number)?;
        source_names.push(ds_name.to_string());
    }
    if source_names.is_empty() {
        return Err(TypesDbParseError::NoDataSource(line_number));
    }

    Ok(Some((name, TypeDefinition::new(source_names))))
}

/// Check `<ds>:<KIND>:<min>:<max>` and return the data source name
fn parse_data_source(spec: &str, line_number: usize) -> Result<&str, TypesDbParseError> {
    let mut fields = spec.split(':');
    let (Some(name), Some(kind), Some(min), Some(max), None) = (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) else {
        return Err(TypesDbParseError::InvalidSpec(line_number, spec.to_string()));
    };
    if name.is_empty() {
        return Err(TypesDbParseError::InvalidSpec(line_number, spec.to_string()));
    }

    DataSourceKind::from_str(kind).map_err(|e| TypesDbParseError::InvalidKind(line_number, e))?;
    check_range_value(min, line_number)?;
    check_range_value(max, line_number)?;
    Ok(name)
}

fn check_range_value(s: &str, line_number: usize) -> Result<(), TypesDbParseError> {
    if s == "U" {
        return Ok(());
    }
    f64::from_str(s)
        .map(|_| ())
        .map_err(|_| TypesDbParseError::InvalidRange(line_number, s.to_string()))
}
