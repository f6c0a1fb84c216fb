use labelrag_core::types::{Hit, ScalarValue, SourceSelection, Strategy};
use serde_json::json;

#[test]
fn strategy_round_trips_through_wire_names() {
    for s in [
        Strategy::Auto,
        Strategy::AnnQuery,
        Strategy::AnnTopLevel,
        Strategy::Scored,
        Strategy::Lexical,
    ] {
        let parsed: Strategy = s.as_str().parse().expect("parse");
        assert_eq!(parsed, s);
    }
    assert!("knn".parse::<Strategy>().is_err(), "legacy name is rejected");
}

#[test]
fn fallback_order_is_the_documented_one() {
    assert_eq!(
        Strategy::FALLBACK_ORDER,
        [Strategy::AnnQuery, Strategy::AnnTopLevel, Strategy::Scored, Strategy::Lexical]
    );
}

#[test]
fn scalar_values_serialize_as_bare_scalars() {
    assert_eq!(ScalarValue::from("ORAL").to_json(), json!("ORAL"));
    assert_eq!(ScalarValue::from(true).to_json(), json!(true));
    assert_eq!(ScalarValue::from(3.0).to_json(), json!(3.0));
}

#[test]
fn default_source_allowlist_excludes_the_vector_field() {
    let SourceSelection::Fields(fields) = SourceSelection::default_fields() else {
        panic!("default is an explicit list");
    };
    assert!(fields.contains(&"text".to_string()));
    assert!(!fields.contains(&"embedding".to_string()));
}

#[test]
fn hit_deserializes_from_backend_shape() {
    let hit: Hit = serde_json::from_value(json!({
        "_id": "doc_0",
        "_score": 0.8,
        "_source": { "chunk_id": "chunk_0", "label_id": "label_0", "section": "warnings", "text": "x" },
        "highlight": { "text": ["<em>x</em>"] }
    }))
    .expect("hit");
    assert_eq!(hit.id, "doc_0");
    assert_eq!(hit.source_str("label_id"), Some("label_0"));
    assert_eq!(hit.highlight.expect("hl")["text"][0], "<em>x</em>");
}
