//! Filter translation into SQLite JSON1 predicates.
//!
//! Records live as JSON text in `records.doc`. `addr` and `source` are also
//! columns of `records` and compare there, so merge lookups can use the
//! `(index_name, addr, source)` index. Other scalar fields compare with
//! `json_extract`, set fields and port attributes match through `json_each`,
//! giving the same any-element semantics as the in-memory evaluator. Every
//! path and value is a bound parameter.
//!
//! Leaves never evaluate to SQL `NULL`, so `NOT` behaves like boolean
//! negation on records where the field is missing.

use sqlx::{QueryBuilder, Sqlite};

use crate::filter::{Field, FieldShape, FieldValue, Filter};

/// Appends the SQL form of a resolved filter to `qb`.
pub(crate) fn push_filter<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &Filter) {
    match filter {
        Filter::All => {
            qb.push("1");
        }
        Filter::Equals { field, value } => {
            push_leaf(qb, field, |qb| {
                qb.push(" = ");
                push_value(qb, value);
            });
        }
        Filter::In { field, values } => {
            if values.is_empty() {
                qb.push("0");
                return;
            }
            push_leaf(qb, field, |qb| {
                qb.push(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        qb.push(", ");
                    }
                    push_value(qb, value);
                }
                qb.push(")");
            });
        }
        Filter::Exists { field } => {
            push_leaf(qb, field, |qb| {
                qb.push(" IS NOT NULL");
            });
        }
        Filter::Not(inner) => {
            qb.push("NOT (");
            push_filter(qb, inner);
            qb.push(")");
        }
        Filter::And(items) => push_joined(qb, items, " AND ", "1"),
        Filter::Or(items) => push_joined(qb, items, " OR ", "0"),
    }
}

fn push_joined<'a>(qb: &mut QueryBuilder<'a, Sqlite>, items: &[Filter], sep: &str, empty: &str) {
    if items.is_empty() {
        qb.push(empty);
        return;
    }
    qb.push("(");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            qb.push(sep);
        }
        qb.push("(");
        push_filter(qb, item);
        qb.push(")");
    }
    qb.push(")");
}

/// Pushes `EXISTS (... WHERE <value expr><predicate>)` for the field.
///
/// Scalars go through a one-row `json_each` as well, which keeps a missing
/// field from turning the leaf into `NULL`.
fn push_leaf<'a, F>(qb: &mut QueryBuilder<'a, Sqlite>, field: &Field, predicate: F)
where
    F: FnOnce(&mut QueryBuilder<'a, Sqlite>),
{
    if let Some(column) = indexed_column(field) {
        // `source` is nullable; the guard keeps the leaf from becoming NULL
        qb.push(format!("({column} IS NOT NULL AND {column}"));
        predicate(qb);
        qb.push(")");
        return;
    }
    match field.shape() {
        FieldShape::Scalar(key) => {
            qb.push("EXISTS (SELECT 1 WHERE json_extract(records.doc, ");
            qb.push_bind(format!("$.{key}"));
            qb.push(")");
        }
        FieldShape::Set(key) => {
            qb.push("EXISTS (SELECT 1 FROM json_each(records.doc, ");
            qb.push_bind(format!("$.{key}"));
            qb.push(") AS e WHERE e.value");
        }
        FieldShape::PortAttr(key) => {
            qb.push("EXISTS (SELECT 1 FROM json_each(records.doc, '$.ports') AS p WHERE json_extract(p.value, ");
            qb.push_bind(format!("$.{key}"));
            qb.push(")");
        }
    }
    predicate(qb);
    qb.push(")");
}

/// Column mirroring a document field, kept in sync on every write.
fn indexed_column(field: &Field) -> Option<&'static str> {
    match field {
        Field::Addr => Some("records.addr"),
        Field::Source => Some("records.source"),
        _ => None,
    }
}

fn push_value<'a>(qb: &mut QueryBuilder<'a, Sqlite>, value: &FieldValue) {
    match value {
        FieldValue::Text(s) => {
            qb.push_bind(s.clone());
        }
        FieldValue::Int(i) => {
            qb.push_bind(*i);
        }
        // json_extract yields 1/0 for JSON booleans
        FieldValue::Bool(b) => {
            qb.push_bind(i64::from(*b));
        }
        other => {
            if let serde_json::Value::String(s) = other.to_json() {
                qb.push_bind(s);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(filter: &Filter) -> String {
        let mut qb = QueryBuilder::<Sqlite>::new("");
        push_filter(&mut qb, filter);
        qb.sql().to_string()
    }

    #[test]
    fn test_constants() {
        assert_eq!(render(&Filter::all()), "1");
        assert_eq!(render(&Filter::and([])), "1");
        assert_eq!(render(&Filter::or([])), "0");
        assert_eq!(render(&Filter::in_set("tags", Vec::<String>::new()).unwrap()), "0");
    }

    #[test]
    fn test_values_are_bound() {
        let sql = render(&Filter::equals("tags", "x'; DROP TABLE records; --").unwrap());
        assert!(!sql.contains("DROP"));
        let sql = render(&Filter::equals("source", "x'; DROP TABLE records; --").unwrap());
        assert!(!sql.contains("DROP"));
        let sql = render(&Filter::exists("scan_end").unwrap());
        assert!(sql.contains("json_extract(records.doc, ?)"));
    }

    #[test]
    fn test_addr_and_source_use_columns() {
        let sql = render(&Filter::host("192.0.2.1".parse().unwrap()));
        assert_eq!(sql, "(records.addr IS NOT NULL AND records.addr = ?)");

        let sql = render(&Filter::in_set("source", ["a", "b"]).unwrap());
        assert_eq!(sql, "(records.source IS NOT NULL AND records.source IN (?, ?))");
    }

    #[test]
    fn test_shapes() {
        let set = render(&Filter::equals("tags", "web").unwrap());
        assert!(set.contains("json_each(records.doc, ?)"));

        let port = render(&Filter::in_set("ports.port", [80u16, 443]).unwrap());
        assert!(port.contains("'$.ports'"));
        assert!(port.contains("IN (?, ?)"));
    }

    #[test]
    fn test_negation_wraps() {
        let sql = render(&!Filter::exists("tags").unwrap());
        assert!(sql.starts_with("NOT (EXISTS"));
    }
}
