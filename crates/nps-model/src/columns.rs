//! Column names shared by the lookup dataset, source exports and derived relations.

pub const STREAM: &str = "stream";
pub const DOMAIN: &str = "domain";
pub const SUBDOMAIN: &str = "subdomain";
pub const NARROW: &str = "narrow";

pub const SCALE: &str = "scale";
pub const TEST: &str = "test";
pub const TEST_NAME: &str = "test_name";

pub const PASS: &str = "pass";
pub const VERBAL: &str = "verbal";
pub const TIMED: &str = "timed";

pub const JOIN_KEY: &str = "join_key";
pub const PERCENTILE: &str = "percentile";
pub const Z: &str = "z";

/// Classification columns every lookup dataset must carry.
pub const REQUIRED_LOOKUP_COLUMNS: [&str; 4] = [STREAM, DOMAIN, SUBDOMAIN, NARROW];

/// Identifier columns, in join-key precedence order.
pub const IDENTIFIER_COLUMNS: [&str; 3] = [SCALE, TEST, TEST_NAME];

/// Attributes that only carry meaning for the cognitive stream.
pub const COGNITIVE_ATTRIBUTE_COLUMNS: [&str; 3] = [PASS, VERBAL, TIMED];

/// Canonical lookup column order as registered in the engine.
pub const LOOKUP_COLUMNS: [&str; 10] = [
    STREAM, DOMAIN, SUBDOMAIN, NARROW, SCALE, TEST, TEST_NAME, PASS, VERBAL, TIMED,
];

/// Columns an enriched view takes from the lookup rather than from the source.
pub const ENRICHMENT_COLUMNS: [&str; 8] = [
    DOMAIN, SUBDOMAIN, NARROW, PASS, VERBAL, TIMED, STREAM, JOIN_KEY,
];
