//! Wiki markdown compiler.
//!
//! Cells are laid out as `{row}` blocks containing `{column width=N}` blocks.
//! Each column holds one widget whose query is resolved from the cell's
//! [`QueryKind`](crate::QueryKind). Fragments are joined with newlines.

use crate::layout::{LayoutCell, TargetLayout};

/// Opens and closes a row block.
pub const ROW_MARKER: &str = "{row}";
pub const COLUMN_CLOSE: &str = "{column}";

/// The widget a cell renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Widget {
    /// `${plot?...}`, chosen when the cell has plot parameters.
    Plot,
    /// `${synapsetable?...}`, the raw query result.
    Table,
}

impl Widget {
    pub fn for_cell(cell: &LayoutCell) -> Self {
        if cell.plot_params.is_empty() {
            Widget::Table
        } else {
            Widget::Plot
        }
    }
}

/// Render the `{column}` block for one cell.
pub fn column_block(cell: &LayoutCell) -> String {
    let query = cell.sql();
    let widget = match Widget::for_cell(cell) {
        Widget::Plot => format!("${{plot?query={query}&{}}}", cell.plot_params),
        Widget::Table => format!("${{synapsetable?query={query}&showquery=False}}"),
    };
    format!("{{column width={}}}\n{widget}\n{COLUMN_CLOSE}", cell.width)
}

/// Compile cells (already in `(row, col)` order) into wiki markdown.
///
/// An empty slice yields an empty document.
pub fn compile(cells: &[LayoutCell]) -> String {
    if cells.is_empty() {
        return String::new();
    }

    let mut fragments = Vec::with_capacity(cells.len() + 1);
    let mut current_row: Option<i64> = None;
    for cell in cells {
        let block = column_block(cell);
        let fragment = match current_row {
            None => format!("{ROW_MARKER}\n{block}"),
            Some(row) if row == cell.row => block,
            Some(_) => format!("{ROW_MARKER}\n{ROW_MARKER}\n{block}"),
        };
        fragments.push(fragment);
        current_row = Some(cell.row);
    }
    fragments.push(ROW_MARKER.to_string());
    fragments.join("\n")
}

impl TargetLayout {
    pub fn to_markdown(&self) -> String {
        compile(&self.cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryKind;

    fn cell(row: i64, col: i64, plot_params: &str) -> LayoutCell {
        LayoutCell {
            row,
            col,
            table_id: "syn123".to_string(),
            query: QueryKind::Users,
            width: 6.0,
            plot_params: plot_params.to_string(),
        }
    }

    #[test]
    fn table_widget_block() {
        assert_eq!(
            column_block(&cell(1, 1, "")),
            "{column width=6}\n\
             ${synapsetable?query=select count(distinct healthCode) as `Participants` FROM syn123&showquery=False}\n\
             {column}"
        );
    }

    #[test]
    fn plot_widget_block() {
        assert_eq!(
            column_block(&cell(1, 1, "title=Users&type=BAR")),
            "{column width=6}\n\
             ${plot?query=select count(distinct healthCode) as `Participants` FROM syn123&title=Users&type=BAR}\n\
             {column}"
        );
    }

    #[test]
    fn fractional_width_is_printed_as_given() {
        let mut c = cell(1, 1, "");
        c.width = 4.5;
        assert!(column_block(&c).starts_with("{column width=4.5}\n"));
    }

    #[test]
    fn two_rows_document() {
        let cells = vec![cell(1, 1, ""), cell(1, 2, ""), cell(2, 1, "")];
        let block = column_block(&cells[0]);
        let expected = [
            format!("{{row}}\n{block}"),
            block.clone(),
            format!("{{row}}\n{{row}}\n{block}"),
            "{row}".to_string(),
        ]
        .join("\n");
        assert_eq!(compile(&cells), expected);
    }

    #[test]
    fn row_zero_is_an_ordinary_row() {
        let md = compile(&[cell(0, 1, ""), cell(0, 2, "")]);
        assert_eq!(md.matches(ROW_MARKER).count(), 2);
    }

    #[test]
    fn empty_input_compiles_to_nothing() {
        assert_eq!(compile(&[]), "");
    }
}
