//! In-process filter evaluation against stored JSON documents.
//!
//! Used by the in-memory backend. Expects a filter already resolved against
//! the index mapping, so values are in the same canonical form as the
//! document.

use serde_json::Value;

use super::{Field, FieldShape, Filter};

pub(crate) fn matches(filter: &Filter, doc: &Value) -> bool {
    match filter {
        Filter::All => true,
        Filter::Equals { field, value } => {
            let wanted = value.to_json();
            candidates(field, doc).any(|v| *v == wanted)
        }
        Filter::In { field, values } => {
            let wanted: Vec<Value> = values.iter().map(|v| v.to_json()).collect();
            candidates(field, doc).any(|v| wanted.contains(v))
        }
        Filter::Exists { field } => candidates(field, doc).next().is_some(),
        Filter::Not(inner) => !matches(inner, doc),
        Filter::And(items) => items.iter().all(|f| matches(f, doc)),
        Filter::Or(items) => items.iter().any(|f| matches(f, doc)),
    }
}

/// Every non-null value the field holds in the document.
fn candidates<'a>(field: &'a Field, doc: &'a Value) -> Box<dyn Iterator<Item = &'a Value> + 'a> {
    let values: Box<dyn Iterator<Item = &'a Value> + 'a> = match field.shape() {
        FieldShape::Scalar(key) => Box::new(doc.get(key).into_iter()),
        FieldShape::Set(key) => Box::new(
            doc.get(key)
                .and_then(Value::as_array)
                .into_iter()
                .flatten(),
        ),
        FieldShape::PortAttr(key) => Box::new(
            doc.get("ports")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(move |port| port.get(key)),
        ),
    };
    Box::new(values.filter(|v| !v.is_null()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "addr": "192.0.2.1",
            "source": "weekly",
            "tags": ["CDN", "web"],
            "ports": [
                {"protocol": "tcp", "port": 80, "state": "open"},
                {"protocol": "tcp", "port": 443, "state": "filtered", "banner": null}
            ]
        })
    }

    #[test]
    fn test_scalar_and_set_matching() {
        let d = doc();
        assert!(matches(&Filter::equals("addr", "192.0.2.1").unwrap(), &d));
        assert!(matches(&Filter::equals("tags", "web").unwrap(), &d));
        assert!(!matches(&Filter::equals("tags", "dns").unwrap(), &d));
    }

    #[test]
    fn test_port_attribute_matching() {
        let d = doc();
        assert!(matches(&Filter::equals("ports.port", 443u16).unwrap(), &d));
        assert!(matches(&Filter::in_set("ports.state", ["closed", "open"]).unwrap(), &d));
        assert!(!matches(&Filter::equals("ports.port", 22u16).unwrap(), &d));
    }

    #[test]
    fn test_exists_ignores_nulls() {
        let d = doc();
        assert!(matches(&Filter::exists("source").unwrap(), &d));
        assert!(!matches(&Filter::exists("ports.banner").unwrap(), &d));
        assert!(!matches(&Filter::exists("hostnames").unwrap(), &d));
    }

    #[test]
    fn test_boolean_identities() {
        let d = doc();
        assert!(matches(&Filter::and([]), &d));
        assert!(!matches(&Filter::or([]), &d));
        assert!(!matches(&Filter::in_set("tags", Vec::<String>::new()).unwrap(), &d));
        assert!(matches(&!Filter::equals("tags", "dns").unwrap(), &d));
    }
}
