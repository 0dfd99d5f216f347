// SPDX-License-Identifier: Apache-2.0 OR MIT
use serde_json::json;
use vortex_tl_core::parse_template;

const PAGE: &str = r#"[!-- article listing --]
<h1>[val title 'capitalize']</h1>
[if items]<ul>
[list items item]  <li class="[if _first]first[elseif _last]last[else]middle[endif]">[def position _index + 1][val position]. [val item]</li>
[endlist]</ul>[else]<p>Nothing here.</p>[endif]
<p>[val total '%,d'] views, published: [val published 'yes|no']</p>"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let template = parse_template("page", PAGE)?;
    let output = template.render_json(&json!({
        "title": "recent articles",
        "items": ["Rust & templates", "<Shunting> yard", "Scopes"],
        "total": 1234567,
        "published": true,
    }))?;

    println!("{output}");
    assert!(output.contains("Rust &amp; templates"));
    assert!(output.contains("1,234,567 views"));
    Ok(())
}
