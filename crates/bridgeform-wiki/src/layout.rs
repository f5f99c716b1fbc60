//! Layout documents.
//!
//! A layout document is a YAML list of targets:
//!
//! ```yaml
//! - name: study-dashboard
//!   subpage: Activity            # optional; omitted => root wiki page
//!   table_id: syn123             # default table for every cell
//!   content:
//!     - { row: 1, col: 1, query_funs: get_n_users, width: 6 }
//!     - { row: 1, col: 2, query_funs: get_activity_by_week, width: 6,
//!         plot_params: "title=Weekly&type=BAR&xtitle=week" }
//! ```
//!
//! Cells may carry their own `table_id`; otherwise the target's id is used.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::{LayoutError, Result};
use crate::query::QueryKind;

/// One resolved grid cell of a dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutCell {
    pub row: i64,
    pub col: i64,
    pub table_id: String,
    pub query: QueryKind,
    pub width: f64,
    /// Plot widget parameters; empty selects the table widget.
    pub plot_params: String,
}

impl LayoutCell {
    pub fn sql(&self) -> String {
        self.query.sql(&self.table_id)
    }
}

/// A single dashboard target, cells sorted by `(row, col)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetLayout {
    pub name: String,
    pub subpage: Option<String>,
    pub table_id: String,
    pub cells: Vec<LayoutCell>,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    name: String,
    #[serde(default)]
    subpage: Option<String>,
    table_id: String,
    #[serde(default)]
    content: Vec<RawCell>,
}

#[derive(Debug, Deserialize)]
struct RawCell {
    row: i64,
    col: i64,
    query_funs: String,
    width: f64,
    #[serde(default)]
    plot_params: Option<String>,
    #[serde(default)]
    table_id: Option<String>,
}

/// A parsed layout document, not yet narrowed to a target.
#[derive(Debug)]
pub struct LayoutDocument {
    targets: Vec<RawTarget>,
}

impl LayoutDocument {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let targets: Vec<RawTarget> = serde_yaml::from_str(text)?;
        Ok(Self { targets })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LayoutError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Target names in document order (duplicates included).
    pub fn target_names(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.name.as_str()).collect()
    }

    /// Narrow the document to `name` and normalize its cells.
    pub fn target(&self, name: &str) -> Result<TargetLayout> {
        let mut matches = self.targets.iter().filter(|t| t.name == name);
        let raw = matches.next().ok_or_else(|| LayoutError::UnknownTarget {
            name: name.to_string(),
        })?;
        let extra = matches.count();
        if extra > 0 {
            return Err(LayoutError::DuplicateTarget {
                name: name.to_string(),
                count: extra + 1,
            });
        }
        if raw.content.is_empty() {
            return Err(LayoutError::EmptyContent {
                name: name.to_string(),
            });
        }

        let mut cells = raw
            .content
            .iter()
            .map(|cell| -> Result<LayoutCell> {
                Ok(LayoutCell {
                    row: cell.row,
                    col: cell.col,
                    table_id: cell
                        .table_id
                        .clone()
                        .unwrap_or_else(|| raw.table_id.clone()),
                    query: cell.query_funs.parse()?,
                    width: cell.width,
                    plot_params: cell.plot_params.clone().unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        cells.sort_by_key(|cell| (cell.row, cell.col));

        let mut seen = HashSet::with_capacity(cells.len());
        for cell in &cells {
            if !seen.insert((cell.row, cell.col)) {
                return Err(LayoutError::DuplicateCell {
                    name: name.to_string(),
                    row: cell.row,
                    col: cell.col,
                });
            }
        }

        Ok(TargetLayout {
            name: raw.name.clone(),
            subpage: raw.subpage.clone().filter(|s| !s.trim().is_empty()),
            table_id: raw.table_id.clone(),
            cells,
        })
    }
}

/// Parse `yaml_text` and select the target called `target_name`.
pub fn parse(yaml_text: &str, target_name: &str) -> Result<TargetLayout> {
    LayoutDocument::from_yaml(yaml_text)?.target(target_name)
}

pub fn parse_file(path: impl AsRef<Path>, target_name: &str) -> Result<TargetLayout> {
    LayoutDocument::from_path(path)?.target(target_name)
}
