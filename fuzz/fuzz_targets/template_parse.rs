#![no_main]

use libfuzzer_sys::fuzz_target;
use vortex_tl_engine::lexer::{tokenize, RESERVED};
use vortex_tl_engine::{ParseOptions, TemplateParser};

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        let _ = tokenize(source, RESERVED);
        let parser = TemplateParser::new().with_options(ParseOptions {
            stop_on_first_error: false,
            max_depth: Some(64),
            ..ParseOptions::default()
        });
        let _ = parser.parse("fuzz-template", source);
    }
});
