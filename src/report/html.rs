// HTML helpers - escaping and the shared page shell

use super::charts::Figure;
use std::fmt::Write;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

const STYLE: &str = r#"
    body {
        font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
        margin: 0;
        padding: 20px;
        background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
    }
    .container {
        max-width: 1400px;
        margin: 0 auto;
        background: white;
        padding: 40px;
        border-radius: 20px;
        box-shadow: 0 20px 60px rgba(0,0,0,0.3);
    }
    h1 { color: #1f2937; text-align: center; margin-bottom: 10px; }
    .subtitle { text-align: center; color: #6b7280; margin-bottom: 40px; }
    .summary-box {
        background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
        color: white;
        padding: 30px;
        border-radius: 15px;
        margin-bottom: 40px;
    }
    .summary-grid { display: grid; grid-template-columns: repeat(3, 1fr); gap: 20px; margin-top: 20px; }
    .summary-item { text-align: center; }
    .summary-number { font-size: 36px; font-weight: bold; }
    .summary-label { font-size: 14px; opacity: 0.9; }
    .insights-box { background: #f3f4f6; padding: 25px; border-radius: 15px; margin: 30px 0; }
    .insight-item { padding: 12px; margin: 10px 0; background: white; border-left: 4px solid #667eea; border-radius: 5px; }
    .card { padding: 20px; margin: 16px 0; background: white; border-radius: 10px; border-left: 6px solid #667eea; }
    .card h3 { margin-top: 0; }
    .badge { display: inline-block; padding: 2px 10px; border-radius: 10px; color: white; font-size: 12px; }
    .strategy { margin: 12px 0 0 0; }
    .outcome { color: #374151; font-style: italic; }
    footer { text-align: center; color: #9ca3af; margin-top: 30px; font-size: 12px; }
"#;

/// Escape text for use in element content and quoted attributes
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// JSON safe to embed inside a `<script>` element
pub fn script_json(figure: &Figure) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(figure)?;
    Ok(json.replace("</", "<\\/"))
}

/// A full document. `body` must already be escaped; each chart is drawn
/// into the element with the matching id.
pub fn page(title: &str, body: &str, charts: &[(&str, &Figure)]) -> Result<String, serde_json::Error> {
    let mut scripts = String::new();
    for (id, figure) in charts {
        // Infallible for String
        let _ = writeln!(
            scripts,
            "var fig = {};\nPlotly.newPlot('{}', fig.data, fig.layout);",
            script_json(figure)?,
            id
        );
    }

    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M");

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    <script src="{PLOTLY_CDN}"></script>
    <style>{STYLE}</style>
</head>
<body>
    <div class="container">
{body}
        <footer>Generated by Carbon Pilot on {generated}</footer>
    </div>
    <script>
{scripts}    </script>
</body>
</html>
"#,
        title = escape(title),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<b>"Steel" & 'Iron'</b>"#),
            "&lt;b&gt;&quot;Steel&quot; &amp; &#39;Iron&#39;&lt;/b&gt;"
        );
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_script_json_cannot_close_script() {
        let figure = Figure {
            data: vec![json!({"name": "</script><script>alert(1)</script>"})],
            layout: json!({}),
        };

        let embedded = script_json(&figure).unwrap();
        assert!(!embedded.contains("</script>"));

        // Still the same JSON once parsed
        let parsed: serde_json::Value = serde_json::from_str(&embedded).unwrap();
        assert_eq!(parsed["data"][0]["name"], "</script><script>alert(1)</script>");
    }

    #[test]
    fn test_page_draws_each_chart() {
        let figure = Figure {
            data: Vec::new(),
            layout: json!({}),
        };
        let html = page("A & B", "<p>body</p>", &[("one", &figure), ("two", &figure)]).unwrap();

        assert!(html.contains("<title>A &amp; B</title>"));
        assert!(html.contains("Plotly.newPlot('one'"));
        assert!(html.contains("Plotly.newPlot('two'"));
        assert!(html.contains("<p>body</p>"));
    }
}
