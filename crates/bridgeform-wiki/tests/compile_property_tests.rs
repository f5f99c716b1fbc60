use bridgeform_wiki::markdown::{compile, ROW_MARKER};
use bridgeform_wiki::{LayoutCell, QueryKind};
use proptest::prelude::*;

fn query_kind() -> impl Strategy<Value = QueryKind> {
    proptest::sample::select(QueryKind::ALL.to_vec())
}

/// Sorted cells with unique `(row, col)` coordinates.
fn grid() -> impl Strategy<Value = Vec<LayoutCell>> {
    proptest::collection::btree_set((0i64..6, 1i64..5), 1..16).prop_flat_map(|coords| {
        let n = coords.len();
        (
            Just(coords),
            proptest::collection::vec((query_kind(), prop::bool::ANY, 1u8..=12), n),
        )
            .prop_map(|(coords, attrs)| {
                coords
                    .into_iter()
                    .zip(attrs)
                    .map(|((row, col), (query, plot, width))| LayoutCell {
                        row,
                        col,
                        table_id: "syn5".to_string(),
                        query,
                        width: f64::from(width),
                        plot_params: if plot {
                            "type=BAR".to_string()
                        } else {
                            String::new()
                        },
                    })
                    .collect()
            })
    })
}

proptest! {
    #[test]
    fn single_row_has_one_open_and_one_close(cols in 1usize..10, row in 0i64..50) {
        let cells: Vec<LayoutCell> = (0..cols)
            .map(|col| LayoutCell {
                row,
                col: col as i64,
                table_id: "syn1".to_string(),
                query: QueryKind::Users,
                width: 3.0,
                plot_params: String::new(),
            })
            .collect();
        let md = compile(&cells);
        prop_assert_eq!(md.matches(ROW_MARKER).count(), 2);
        prop_assert!(md.starts_with("{row}\n"), "markdown must start with the row marker");
        prop_assert!(md.ends_with("\n{row}"), "markdown must end with the row marker");
        prop_assert_eq!(md.matches("{column width=").count(), cols);
    }

    #[test]
    fn one_boundary_pair_per_distinct_row(cells in grid()) {
        let distinct_rows: std::collections::BTreeSet<i64> = cells.iter().map(|c| c.row).collect();
        let md = compile(&cells);
        prop_assert_eq!(md.matches(ROW_MARKER).count(), 2 * distinct_rows.len());
        prop_assert_eq!(md.matches("{column width=").count(), cells.len());
        prop_assert_eq!(md.matches("{column}").count(), cells.len());
    }

    #[test]
    fn widget_follows_plot_params(cells in grid()) {
        let md = compile(&cells);
        let plots = cells.iter().filter(|c| !c.plot_params.is_empty()).count();
        prop_assert_eq!(md.matches("${plot?query=").count(), plots);
        prop_assert_eq!(md.matches("${synapsetable?query=").count(), cells.len() - plots);
    }

    #[test]
    fn compile_is_deterministic(cells in grid()) {
        prop_assert_eq!(compile(&cells), compile(&cells));
    }
}
