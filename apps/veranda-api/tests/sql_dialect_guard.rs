//! Guards against non-Postgres SQL creeping into query literals, e.g. when
//! a statement is ported from a MySQL schema dump.

use std::fs;
use std::path::{Path, PathBuf};

fn rust_sources(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            rust_sources(&path, out);
        } else if path.extension().and_then(|s| s.to_str()) == Some("rs") {
            out.push(path);
        }
    }
}

/// String literals passed to `sqlx::query*` calls, with 1-based line numbers.
fn query_literals(content: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(rel) = content[pos..].find("sqlx::query") {
        let idx = pos + rel;
        pos = idx + "sqlx::query".len();
        let Some(paren) = content[idx..].find('(') else {
            continue;
        };
        let after = &content[idx + paren + 1..];
        let trimmed = after.trim_start();
        if !trimmed.starts_with('"') {
            continue;
        }
        let body = &trimmed[1..];
        let mut end = None;
        let mut escaped = false;
        for (i, c) in body.char_indices() {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                end = Some(i);
                break;
            }
        }
        if let Some(end) = end {
            let line = content[..idx].bytes().filter(|b| *b == b'\n').count() + 1;
            out.push((line, body[..end].to_string()));
        }
    }
    out
}

#[test]
fn query_literals_use_postgres_dialect() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    let mut files = Vec::new();
    rust_sources(&root, &mut files);
    assert!(!files.is_empty(), "no sources found under {}", root.display());

    let mut violations = Vec::new();
    for file in &files {
        let Ok(content) = fs::read_to_string(file) else {
            continue;
        };
        for (line, sql) in query_literals(&content) {
            if sql.contains('?') {
                violations.push(format!(
                    "{}:{line}: '?' placeholder, use $n",
                    file.display()
                ));
            }
            if sql.contains('`') {
                violations.push(format!(
                    "{}:{line}: backtick-quoted identifier",
                    file.display()
                ));
            }
            let lower = sql.to_lowercase();
            for token in ["insert ignore", "on duplicate key", "date_sub(", "now() - interval 15"] {
                if lower.contains(token) {
                    violations.push(format!(
                        "{}:{line}: MySQL-only syntax `{token}`",
                        file.display()
                    ));
                }
            }
        }
    }

    assert!(
        violations.is_empty(),
        "non-Postgres SQL found:\n{}",
        violations.join("\n")
    );
}
