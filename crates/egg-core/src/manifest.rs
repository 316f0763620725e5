//! Manifest loading and closed-schema validation.
//!
//! The manifest is a YAML mapping with a closed field set: unknown fields are
//! rejected so that a future schema extension can never be silently ignored
//! by an older verifier. Cell and dependency order is preserved; it drives
//! both execution order and deterministic packaging.

use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::errors::{EggError, EggResult};
use crate::pathguard;

/// One executable unit: a language tag and a confined source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub language: String,
    /// Normalized POSIX path relative to the manifest directory.
    pub source: String,
}

/// Parsed manifest with iteration order matching the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub name: String,
    pub description: String,
    pub cells: Vec<Cell>,
    pub permissions: Vec<(String, bool)>,
    pub dependencies: Vec<String>,
    pub author: Option<String>,
    pub created: Option<String>,
    pub license: Option<String>,
}

const ROOT_FIELDS: &[&str] = &[
    "name",
    "description",
    "cells",
    "permissions",
    "dependencies",
    "author",
    "created",
    "license",
];

fn field_err(field: impl Into<String>, reason: impl Into<String>) -> EggError {
    EggError::Manifest {
        field: field.into(),
        reason: reason.into(),
    }
}

fn get<'a>(map: &'a serde_yaml::Mapping, field: &str) -> Option<&'a Value> {
    map.get(&Value::String(field.to_string()))
}

/// Load and validate a manifest file.
///
/// Cell sources are normalized against the directory containing `path`.
pub fn load_manifest(path: &Path) -> EggResult<Manifest> {
    let text = std::fs::read_to_string(path).map_err(|e| EggError::io(path, e))?;
    let dir = manifest_dir(path);
    parse_manifest(&text, &dir)
}

/// Directory containing a manifest file, defaulting to the current directory.
pub fn manifest_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Validate manifest text against the closed schema.
pub fn parse_manifest(text: &str, manifest_dir: &Path) -> EggResult<Manifest> {
    let value: Value =
        serde_yaml::from_str(text).map_err(|e| field_err("root", format!("invalid YAML: {e}")))?;
    let Value::Mapping(root) = value else {
        return Err(field_err("root", "manifest root must be a mapping"));
    };

    for key in root.keys() {
        let Value::String(name) = key else {
            return Err(field_err("root", "manifest keys must be strings"));
        };
        if !ROOT_FIELDS.contains(&name.as_str()) {
            return Err(field_err(name, "unknown manifest field"));
        }
    }

    let name = required_string(&root, "name")?;
    let description = required_string(&root, "description")?;

    let cells_value = get(&root, "cells").ok_or_else(|| field_err("cells", "missing required field"))?;
    let Value::Sequence(cell_seq) = cells_value else {
        return Err(field_err("cells", "must be a list"));
    };
    let mut cells = Vec::with_capacity(cell_seq.len());
    for (index, item) in cell_seq.iter().enumerate() {
        cells.push(parse_cell(item, index, manifest_dir)?);
    }

    Ok(Manifest {
        name,
        description,
        cells,
        permissions: parse_permissions(&root)?,
        dependencies: parse_dependencies(&root)?,
        author: optional_string(&root, "author")?,
        created: optional_string(&root, "created")?,
        license: optional_string(&root, "license")?,
    })
}

fn parse_cell(item: &Value, index: usize, manifest_dir: &Path) -> EggResult<Cell> {
    let field = format!("cells[{index}]");
    let Value::Mapping(cell) = item else {
        return Err(field_err(field, "each cell must be a mapping"));
    };

    for key in cell.keys() {
        match key {
            Value::String(k) if k == "language" || k == "source" => {}
            Value::String(k) => {
                return Err(field_err(field, format!("unexpected cell key: {k}")));
            }
            _ => return Err(field_err(field, "cell keys must be strings")),
        }
    }

    let language = match get(cell, "language") {
        Some(Value::String(language)) => language.clone(),
        Some(_) => return Err(field_err(format!("{field}.language"), "must be a string")),
        None => return Err(field_err(field, "cell requires 'language' and 'source'")),
    };
    let raw_source = match get(cell, "source") {
        Some(Value::String(source)) => source.clone(),
        Some(_) => return Err(field_err(format!("{field}.source"), "must be a string")),
        None => return Err(field_err(field, "cell requires 'language' and 'source'")),
    };

    let source = pathguard::normalize(manifest_dir, Path::new(&raw_source))?;
    Ok(Cell { language, source })
}

fn parse_permissions(root: &serde_yaml::Mapping) -> EggResult<Vec<(String, bool)>> {
    let Some(value) = get(root, "permissions") else {
        return Ok(Vec::new());
    };
    let Value::Mapping(map) = value else {
        return Err(field_err("permissions", "must be a mapping"));
    };
    let mut permissions = Vec::with_capacity(map.len());
    for (key, value) in map {
        let Value::String(name) = key else {
            return Err(field_err("permissions", "keys must be strings"));
        };
        let Value::Bool(allowed) = value else {
            return Err(field_err(
                format!("permissions.{name}"),
                "must be a boolean",
            ));
        };
        permissions.push((name.clone(), *allowed));
    }
    Ok(permissions)
}

fn parse_dependencies(root: &serde_yaml::Mapping) -> EggResult<Vec<String>> {
    let Some(value) = get(root, "dependencies") else {
        return Ok(Vec::new());
    };
    let Value::Sequence(seq) = value else {
        return Err(field_err("dependencies", "must be a list"));
    };
    let mut dependencies = Vec::with_capacity(seq.len());
    for item in seq {
        let Value::String(dep) = item else {
            return Err(field_err("dependencies", "entries must be strings"));
        };
        dependencies.push(dep.clone());
    }
    Ok(dependencies)
}

fn required_string(root: &serde_yaml::Mapping, field: &str) -> EggResult<String> {
    match get(root, field) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(field_err(field, "must be a string")),
        None => Err(field_err(field, "missing required field")),
    }
}

fn optional_string(root: &serde_yaml::Mapping, field: &str) -> EggResult<Option<String>> {
    match get(root, field) {
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(field_err(field, "must be a string")),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(text: &str) -> EggResult<Manifest> {
        let dir = TempDir::new().unwrap();
        parse_manifest(text, dir.path())
    }

    #[test]
    fn parses_full_manifest() {
        let text = "\
name: Demo Notebook
description: two cells
author: someone
created: 2024-05-01
license: MIT
permissions:
  network: false
  filesystem: true
dependencies:
  - libs/tool.bin
  - python:3.11
cells:
  - language: python
    source: hello.py
  - language: r
    source: hello.R
";
        let manifest = parse(text).unwrap();

        assert_eq!(manifest.name, "Demo Notebook");
        assert_eq!(manifest.cells.len(), 2);
        assert_eq!(manifest.cells[0].source, "hello.py");
        assert_eq!(manifest.cells[1].language, "r");
        assert_eq!(manifest.dependencies, vec!["libs/tool.bin", "python:3.11"]);
        assert_eq!(
            manifest.permissions,
            vec![("network".into(), false), ("filesystem".into(), true)]
        );
        assert_eq!(manifest.author.as_deref(), Some("someone"));
        assert_eq!(manifest.created.as_deref(), Some("2024-05-01"));
    }

    #[test]
    fn empty_cell_list_is_allowed() {
        let manifest = parse("name: n\ndescription: d\ncells: []\n").unwrap();
        assert!(manifest.cells.is_empty());
    }

    #[test]
    fn rejects_missing_required_field() {
        let err = parse("name: n\ncells: []\n").unwrap_err();
        assert_eq!(err.reason_code(), "E_MANIFEST");
        assert!(err.to_string().contains("description"));
    }

    #[test]
    fn rejects_unknown_root_field() {
        let err = parse("name: n\ndescription: d\ncells: []\nextra: 1\n").unwrap_err();
        assert!(err.to_string().contains("extra"));
    }

    #[test]
    fn rejects_non_string_scalar() {
        let err = parse("name: 42\ndescription: d\ncells: []\n").unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn rejects_non_list_cells() {
        let err = parse("name: n\ndescription: d\ncells: nope\n").unwrap_err();
        assert!(err.to_string().contains("cells"));
    }

    #[test]
    fn rejects_cell_with_extra_key() {
        let err = parse(
            "name: n\ndescription: d\ncells:\n  - language: python\n    source: a.py\n    shell: sh\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("shell"));
    }

    #[test]
    fn rejects_cell_missing_source() {
        let err = parse("name: n\ndescription: d\ncells:\n  - language: python\n").unwrap_err();
        assert!(err.to_string().contains("cells[0]"));
    }

    #[test]
    fn rejects_escaping_cell_source() {
        let err = parse(
            "name: n\ndescription: d\ncells:\n  - language: python\n    source: ../evil.py\n",
        )
        .unwrap_err();
        assert_eq!(err.reason_code(), "E_PATH");
    }

    #[test]
    fn rejects_non_string_dependency() {
        let err =
            parse("name: n\ndescription: d\ncells: []\ndependencies:\n  - 3\n").unwrap_err();
        assert!(err.to_string().contains("dependencies"));
    }

    #[test]
    fn rejects_non_bool_permission() {
        let err =
            parse("name: n\ndescription: d\ncells: []\npermissions:\n  net: yes please\n")
                .unwrap_err();
        assert!(err.to_string().contains("permissions.net"));
    }

    #[test]
    fn normalizes_cell_source() {
        let manifest = parse(
            "name: n\ndescription: d\ncells:\n  - language: python\n    source: ./a/../hello.py\n",
        )
        .unwrap();
        assert_eq!(manifest.cells[0].source, "hello.py");
    }
}
