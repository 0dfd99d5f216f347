#![no_main]

use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use vortex_tl_core::{standard_parser, TemplateParser};

static PARSER: Lazy<TemplateParser> = Lazy::new(standard_parser);

static DATA: Lazy<Value> = Lazy::new(|| {
    json!({
        "s": "<b>text</b>",
        "n": 1234,
        "flag": true,
        "xs": [1, "two", null, [3]],
        "m": {"a": 1, "b": "c"},
    })
});

fuzz_target!(|data: &[u8]| {
    let source = match std::str::from_utf8(data) {
        Ok(src) => src,
        Err(_) => return,
    };

    if let Ok(template) = PARSER.parse("fuzz-template-render", source) {
        let _ = template.render_json(&DATA);
    }
});
