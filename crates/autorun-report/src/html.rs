use std::fmt::Write;

use autorun_model::{History, Outcome, RunRecord};

/// Page-level details that are not part of the history.
#[derive(Debug, Clone)]
pub struct ReportMeta {
    pub title: String,
    pub generated_at: String,
    /// Extension of rendered artifacts; successful tasks link to `<key>.<ext>` next to the report.
    pub artifact_extension: String,
}

impl Default for ReportMeta {
    fn default() -> Self {
        Self {
            title: "autorun".to_string(),
            generated_at: String::new(),
            artifact_extension: "html".to_string(),
        }
    }
}

/// Render the status page.
///
/// Pure: the same history and meta always yield the same document.
pub fn render(history: &History, meta: &ReportMeta) -> String {
    let mut out = String::with_capacity(1024 + history.len() * 256);
    let title = escape(&meta.title);

    let _ = write!(
        out,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; margin: 2em; }}
table {{ border-collapse: collapse; }}
th, td {{ padding: 0.3em 0.8em; border-bottom: 1px solid #ddd; text-align: left; }}
td.num {{ text-align: right; font-variant-numeric: tabular-nums; }}
</style>
</head>
<body>
<h1>{title}</h1>
"#
    );

    let _ = writeln!(
        out,
        "<p>Generated {} &middot; {} {} &middot; {} {} &middot; {} {}</p>",
        escape(&meta.generated_at),
        glyph(Outcome::Success),
        history.count(Outcome::Success),
        glyph(Outcome::Failed),
        history.count(Outcome::Failed),
        glyph(Outcome::NotRun),
        history.count(Outcome::NotRun),
    );

    out.push_str("<table>\n<thead><tr><th>Status</th><th>Last run</th><th>Task</th><th>Duration</th></tr></thead>\n<tbody>\n");
    for (key, record) in history {
        row(&mut out, key, record, meta);
    }
    out.push_str("</tbody>\n</table>\n</body>\n</html>\n");
    out
}

fn row(out: &mut String, key: &str, record: &RunRecord, meta: &ReportMeta) {
    let last_run = if record.timestamp.is_empty() {
        "&mdash;".to_string()
    } else {
        escape(&record.timestamp)
    };

    // The engine leaves no artifact behind for a failed run.
    let task = if record.outcome == Outcome::Success {
        format!(
            r#"<a href="{}">{}</a>"#,
            escape(&href(key, &meta.artifact_extension)),
            escape(key)
        )
    } else {
        escape(key)
    };

    let _ = writeln!(
        out,
        r#"<tr><td title="{}">{}</td><td>{}</td><td>{}</td><td class="num">{:.2}s</td></tr>"#,
        record.outcome,
        glyph(record.outcome),
        last_run,
        task,
        record.elapsed,
    );
}

/// Status indicator shown for an outcome.
pub fn glyph(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Success => "✅",
        Outcome::Failed => "❌",
        Outcome::NotRun => "⏸",
    }
}

fn href(key: &str, extension: &str) -> String {
    let stem = match key.rsplit_once('.') {
        Some((stem, _)) if !stem.ends_with('/') && !stem.is_empty() => stem,
        _ => key,
    };
    format!("{stem}.{extension}")
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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
