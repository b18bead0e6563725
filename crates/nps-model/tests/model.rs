//! Model-level behavior: token parsing, serde names and join-key properties.

use nps_model::{JoinKey, Relation, SourceFormat, Stream, SummaryLevel, SummaryOptions};
use proptest::prelude::*;

#[test]
fn stream_serializes_as_tag() {
    let json = serde_json::to_string(&Stream::Behavioral).expect("serialize stream");
    assert_eq!(json, "\"neurobehav\"");
    let back: Stream = serde_json::from_str("\"neurocog\"").expect("deserialize stream");
    assert_eq!(back, Stream::Cognitive);
}

#[test]
fn enriched_view_names() {
    assert_eq!(Stream::Cognitive.enriched_view(), "neurocog_enriched");
    assert_eq!(Stream::Validity.enriched_view(), "validity_enriched");
}

#[test]
fn summary_options_defaults() {
    let options = SummaryOptions::default();
    assert_eq!(options.level, SummaryLevel::Domain);
    assert!(!options.by_stream);
    assert!(options.include_all);

    let narrow = SummaryOptions::at_level(SummaryLevel::Narrow).with_include_all(false);
    assert_eq!(narrow.level, SummaryLevel::Narrow);
    assert!(!narrow.include_all);
}

#[test]
fn relation_tracks_fallback() {
    let relation = Relation::new("foo", "data/foo.csv", SourceFormat::RowText);
    assert!(!relation.is_fallback());
    let relation = relation.with_fallback_from(SourceFormat::Parquet);
    assert_eq!(relation.fallback_from, Some(SourceFormat::Parquet));
}

#[test]
fn unknown_tokens_are_rejected() {
    assert!("xlsx".parse::<SourceFormat>().is_err());
    assert!("global".parse::<SummaryLevel>().is_err());
}

proptest! {
    #[test]
    fn normalize_is_idempotent(raw in "[ A-Za-z0-9-]{0,24}") {
        if let Some(key) = JoinKey::normalize(&raw) {
            let again = JoinKey::normalize(key.as_str());
            prop_assert_eq!(again, Some(key));
        }
    }

    #[test]
    fn normalize_ignores_case_and_padding(
        word in "[A-Za-z][A-Za-z ]{0,16}[A-Za-z]",
        left in " {0,3}",
        right in " {0,3}",
    ) {
        let padded = format!("{left}{}{right}", word.to_uppercase());
        prop_assert_eq!(JoinKey::normalize(&padded), JoinKey::normalize(&word.to_lowercase()));
    }
}
