use std::fs;

use bridgeform_wiki::layout::parse_file;
use bridgeform_wiki::{LayoutError, Widget};
use tempfile::tempdir;

const LAYOUT: &str = r#"
- name: study
  subpage: Study Dashboard
  table_id: syn26000000
  content:
    - { row: 1, col: 1, query_funs: get_last_update, width: 4 }
    - { row: 1, col: 2, query_funs: get_n_users, width: 4 }
    - { row: 1, col: 3, query_funs: get_n_activities, width: 4 }
    - row: 2
      col: 1
      query_funs: get_active_users_per_date
      width: 12
      plot_params: "title=Daily%20Active%20Users&type=BAR&xtitle=date&ytitle=users"
"#;

#[test]
fn layout_file_compiles_to_dashboard_markdown() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("layout.yaml");
    fs::write(&path, LAYOUT).unwrap();

    let layout = parse_file(&path, "study").expect("layout should parse");
    assert_eq!(layout.subpage.as_deref(), Some("Study Dashboard"));
    assert_eq!(Widget::for_cell(&layout.cells[3]), Widget::Plot);

    let md = layout.to_markdown();
    let lines: Vec<&str> = md.lines().collect();
    assert_eq!(lines.first(), Some(&"{row}"));
    assert_eq!(lines.last(), Some(&"{row}"));
    assert!(md.contains("FROM syn26000000"));
    assert!(md.contains("{column width=12}"));
    // Row 1 closes before row 2 opens.
    assert!(md.contains("{column}\n{row}\n{row}\n{column width=12}"));
}

#[test]
fn missing_layout_file_reports_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.yaml");
    match parse_file(&path, "study") {
        Err(LayoutError::Io { path: p, .. }) => assert!(p.ends_with("absent.yaml")),
        other => panic!("expected io error, got {other:?}"),
    }
}
