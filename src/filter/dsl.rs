//! Search-engine query rendering.
//!
//! Renders a filter in the JSON query shape search backends understand
//! (`match`, `match_all`, `terms`, `exists`, `bool`). The storage adapters log
//! this form when they execute a query.

use serde_json::{json, Map, Value};

use super::Filter;

impl Filter {
    /// Renders the filter as a search-engine JSON query.
    pub fn to_query_json(&self) -> Value {
        match self {
            Filter::All => json!({"match_all": {}}),
            Filter::Equals { field, value } => json!({"match": single(field.name(), value.to_json())}),
            Filter::In { field, values } => {
                let terms: Vec<Value> = values.iter().map(|v| v.to_json()).collect();
                json!({"terms": single(field.name(), Value::Array(terms))})
            }
            Filter::Exists { field } => json!({"exists": {"field": field.name()}}),
            Filter::Not(inner) => json!({"bool": {"must_not": [inner.to_query_json()]}}),
            Filter::And(items) => json!({"bool": {"must": render_all(items)}}),
            Filter::Or(items) => json!({
                "bool": {"should": render_all(items), "minimum_should_match": 1}
            }),
        }
    }
}

fn single(key: String, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key, value);
    Value::Object(map)
}

fn render_all(items: &[Filter]) -> Vec<Value> {
    items.iter().map(Filter::to_query_json).collect()
}
