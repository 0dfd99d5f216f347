// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;
use vortex_tl_engine::Template;

#[derive(Debug, Deserialize)]
struct EngineCase {
    name: String,
    template: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    expected: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn load_cases() -> Vec<EngineCase> {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let root = manifest_dir
        .parent()
        .expect("workspace root missing")
        .parent()
        .expect("workspace root missing");
    let path = root.join("test-cases/vortex-tl-engine.json");
    let bytes = fs::read(&path).expect("missing engine test cases");
    serde_json::from_slice(&bytes).expect("invalid engine test cases")
}

#[test]
fn engine_test_cases() {
    for case in load_cases() {
        let template = match Template::parse_str(&case.name, &case.template) {
            Ok(template) => template,
            Err(err) => {
                let expected_err = case
                    .error
                    .as_ref()
                    .unwrap_or_else(|| panic!("parse {} failed: {}", case.name, err));
                let msg = err.to_string();
                assert!(
                    msg.contains(expected_err.as_str()),
                    "{} expected parse error containing '{}', got '{}'",
                    case.name,
                    expected_err,
                    msg
                );
                continue;
            }
        };

        let result = template.render_json(&case.data);
        match (&case.error, result) {
            (Some(expected_err), Ok(output)) => panic!(
                "{} expected error '{}' but rendered '{}'",
                case.name, expected_err, output
            ),
            (Some(expected_err), Err(err)) => {
                let msg = err.to_string();
                assert!(
                    msg.contains(expected_err.as_str()),
                    "{} expected error containing '{}', got '{}'",
                    case.name,
                    expected_err,
                    msg
                );
            }
            (None, Ok(output)) => {
                assert_eq!(
                    output,
                    case.expected.clone().unwrap_or_default(),
                    "fixture {} rendered incorrectly",
                    case.name
                );
            }
            (None, Err(err)) => panic!("render {} failed: {}", case.name, err),
        }
    }
}
