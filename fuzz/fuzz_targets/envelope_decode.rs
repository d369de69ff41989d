#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use tabserve_core::{FieldDef, FieldType, Schema};
use tabserve_server::Codec;

fuzz_target!(|data: &[u8]| {
    // Feed arbitrary bytes to the envelope decoder.
    // Tests handling of:
    // - Invalid JSON and invalid UTF-8 (converted to lossy string)
    // - Unknown or missing type discriminants
    // - Out of range countdowns and filter values
    // - Unparseable dates
    // - Non-finite floats and dates finer than the field format
    let text = String::from_utf8_lossy(data);

    let schema = Schema::new(vec![
        FieldDef::new("id", FieldType::Integer),
        FieldDef::new("flag", FieldType::Boolean),
        FieldDef::new("code", FieldType::Char),
        FieldDef::new("small", FieldType::Byte),
        FieldDef::new("score", FieldType::Double),
        FieldDef::date("ts", "%Y-%m-%d"),
        FieldDef::new("msg", FieldType::String),
    ])
    .unwrap();
    let codec = Codec::pass_through(Arc::new(schema));

    // The decoder should never panic, and whatever it accepts must re-encode
    // into the same envelope
    if let Ok(envelope) = codec.decode(&text) {
        let encoded = codec.encode_query(&envelope).unwrap();
        assert_eq!(codec.decode(&encoded).unwrap(), envelope);
    }
});
