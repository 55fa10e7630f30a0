//! Render the keypad layout, with the scan bit of every key, as a text grid
//! or as an HTML page with inline SVG.

use keypad_core::keymap::{bit_for, LAYOUT};

/// Key size in SVG pixels.
const U: f64 = 64.0;
/// Gap between keys.
const GAP: f64 = 8.0;
/// Step: key + gap.
const S: f64 = U + GAP;
/// Key corner radius.
const R: f64 = 6.0;
/// Margin around the SVG content.
const MARGIN: f64 = 20.0;

/// One line per physical row, `label:bit` per key.
pub fn render_text() -> String {
    let mut out = String::new();
    let border = "+-------".repeat(4) + "+\n";

    out.push_str(&border);
    for (row, keys) in LAYOUT.iter().enumerate() {
        for (col, label) in keys.iter().enumerate() {
            out.push_str(&format!("| {} {:>3} ", label, bit_for(row, col)));
        }
        out.push_str(&format!("|  line {}\n", 3 - row));
        out.push_str(&border);
    }
    out
}

fn render_keys() -> String {
    let mut svg = String::new();

    for (row, keys) in LAYOUT.iter().enumerate() {
        for (col, label) in keys.iter().enumerate() {
            let x = MARGIN + col as f64 * S;
            let y = MARGIN + row as f64 * S;
            let class = if label.is_ascii_digit() { "key" } else { "key function" };

            svg.push_str(&format!(
                r#"<rect x="{x}" y="{y}" width="{U}" height="{U}" rx="{R}" class="{class}"/>"#
            ));
            svg.push_str(&format!(
                r#"<text x="{}" y="{}" class="label">{}</text>"#,
                x + U / 2.0,
                y + U / 2.0,
                html_escape(&label.to_string()),
            ));
            svg.push_str(&format!(
                r#"<text x="{}" y="{}" class="bit">bit {}</text>"#,
                x + U / 2.0,
                y + U - 10.0,
                bit_for(row, col),
            ));
        }
    }

    svg
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Generate the complete HTML document with inline SVG.
pub fn generate_html() -> String {
    let size = 2.0 * MARGIN + 4.0 * S - GAP;

    let mut html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Keypad Layout</title>
<style>
  body {{
    background: #1a1a2e;
    color: #eee;
    font-family: system-ui, -apple-system, sans-serif;
    display: flex;
    justify-content: center;
    padding: 2em;
  }}
  .key {{
    fill: #16213e;
    stroke: #0f3460;
    stroke-width: 1.5;
  }}
  .key.function {{
    fill: #1b2e4e;
    stroke: #53a8b6;
  }}
  .label {{
    fill: #eee;
    font-family: "JetBrains Mono", "Fira Code", monospace;
    font-size: 20px;
    text-anchor: middle;
    dominant-baseline: middle;
  }}
  .bit {{
    fill: #e94560;
    font-size: 10px;
    text-anchor: middle;
  }}
</style>
</head>
<body>
<svg width="{size}" height="{size}" xmlns="http://www.w3.org/2000/svg">
"#
    );

    html.push_str(&render_keys());
    html.push_str("\n</svg>\n</body>\n</html>\n");
    html
}
