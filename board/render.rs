use std::path::Path;

use ferrite_captcha::logger::experiment::{read_scalars, ScalarEntry, FIGURES_DIR};

const MAX_FIGURES: usize = 12;

const TEMPLATE: &str = r#"<!doctype html>
<html><head><meta charset="utf-8"><title>{{TITLE}}</title>
<style>
body { font-family: sans-serif; margin: 2em; }
table { border-collapse: collapse; }
td, th { padding: 4px 12px; border-bottom: 1px solid #ddd; text-align: left; }
.figures img { image-rendering: pixelated; width: 320px; margin: 6px; border: 1px solid #ccc; }
</style></head>
<body>
<h1>{{TITLE}}</h1>
<h2>Latest scalars</h2>
<table><tr><th>tag</th><th>value</th><th>step</th></tr>
{{ROWS}}
</table>
<p><a href="/scalars.json">scalars.json</a></p>
<h2>Figures</h2>
<div class="figures">
{{FIGURES}}
</div>
</body></html>
"#;

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Last entry per tag, sorted by tag.
pub fn latest(entries: Vec<ScalarEntry>) -> Vec<ScalarEntry> {
    let mut latest: Vec<ScalarEntry> = Vec::new();
    for entry in entries {
        match latest.iter_mut().find(|e| e.tag == entry.tag) {
            Some(slot) => *slot = entry,
            None => latest.push(entry),
        }
    }
    latest.sort_by(|a, b| a.tag.cmp(&b.tag));
    latest
}

/// Newest figure file names, most recent step first.
fn figure_names(run_dir: &Path) -> std::io::Result<Vec<String>> {
    let dir = run_dir.join(FIGURES_DIR);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".png"))
        .collect();
    // `<tag>_<step:06>.png`: the zero-padded step sorts lexically.
    names.sort_by(|a, b| b.rsplit('_').next().cmp(&a.rsplit('_').next()).then(a.cmp(b)));
    names.truncate(MAX_FIGURES);
    Ok(names)
}

pub fn index_page(run_dir: &Path) -> std::io::Result<String> {
    // A run that has not logged anything yet has no scalars file.
    let entries = read_scalars(run_dir).unwrap_or_default();

    let rows: String = latest(entries).iter()
        .map(|e| format!("<tr><td>{}</td><td>{:.4}</td><td>{}</td></tr>\n", escape(&e.tag), e.value, e.step))
        .collect();
    let figures: String = figure_names(run_dir)?.iter()
        .map(|name| {
            let name = escape(name);
            format!("<figure><img src=\"/figures/{name}\"><figcaption>{name}</figcaption></figure>\n")
        })
        .collect();

    Ok(TEMPLATE
        .replace("{{TITLE}}", &escape(&run_dir.display().to_string()))
        .replace("{{ROWS}}", &rows)
        .replace("{{FIGURES}}", &figures))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_keeps_last_entry_per_tag() {
        let entry = |tag: &str, value, step| ScalarEntry { tag: tag.into(), value, step };
        let rows = latest(vec![entry("b", 1.0, 1), entry("a", 2.0, 1), entry("b", 3.0, 2)]);
        assert_eq!(rows, vec![entry("a", 2.0, 1), entry("b", 3.0, 2)]);
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("<a & \"b\">"), "&lt;a &amp; &quot;b&quot;&gt;");
    }
}
