//! Catalog configuration loading.

use std::io::Write;

use relgraph::catalog::{Catalog, CatalogError, ElementKind};

const CONFIG: &str = r#"
graph: social
vertex_base: all_vertices
vertices:
  - label: Person
    table: person
edges:
  - label: KNOWS
    table: knows
"#;

#[test]
fn catalog_loads_from_a_yaml_file() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(CONFIG.as_bytes())?;

    let catalog = Catalog::from_yaml_file(file.path())?;
    assert_eq!(catalog.graph(), "social");

    let person = catalog.resolve_vertex_label(Some("Person"))?;
    assert_eq!(person.table, "social.person");
    assert_eq!(person.kind, ElementKind::Vertex);

    // the wildcard base table name is configurable
    let base = catalog.resolve_vertex_label(None)?;
    assert_eq!(base.table, "social.all_vertices");
    Ok(())
}

#[test]
fn missing_file_reports_a_read_error() {
    let err = Catalog::from_yaml_file("/nonexistent/catalog.yaml").expect_err("should fail");
    assert!(matches!(err, CatalogError::ConfigRead { .. }));
}

#[test]
fn malformed_yaml_reports_a_parse_error() {
    let err = Catalog::from_yaml("vertices: {not: [valid").expect_err("should fail");
    assert!(matches!(err, CatalogError::ConfigParse { .. }));
}
