//! Static import scanning for Python source text.
//!
//! The scanner extracts `import` and `from … import` statements without
//! executing anything. It is deliberately tolerant: it understands aliases,
//! comma-separated targets, relative imports, star imports, parenthesised
//! name lists and backslash continuations, and it skips comments and
//! triple-quoted strings. Anything it cannot make sense of is ignored —
//! the resolver treats missing information as a best-effort closure, never
//! a hard failure.

/// One scanned import statement.
///
/// A plain `import a.b, c` yields one `ImportStmt` per target with empty
/// `names`; a `from` import yields a single statement carrying the imported
/// names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStmt {
    /// Number of leading dots; `0` for an absolute import.
    pub levels: u32,
    /// The dotted module text after the dots, if any.
    ///
    /// `None` for `from . import x` style statements.
    pub module: Option<String>,
    /// Names imported `from` the module; empty for plain imports.
    pub names: Vec<String>,
    /// Whether the statement is `from … import *`.
    pub star: bool,
}

/// Scan `source` for import statements.
#[must_use]
pub fn scan_imports(source: &str) -> Vec<ImportStmt> {
    let mut statements = Vec::new();
    let mut in_string: Option<&'static str> = None;
    let mut pending = String::new();

    for raw_line in source.lines() {
        let line = strip_comment(raw_line);
        let line = line.trim_end();

        if let Some(delim) = in_string {
            if count_occurrences(line, delim) % 2 == 1 {
                in_string = None;
            }
            continue;
        }

        if pending.is_empty() {
            for delim in ["\"\"\"", "'''"] {
                if count_occurrences(line, delim) % 2 == 1 {
                    in_string = Some(delim);
                }
            }
            if in_string.is_some() {
                continue;
            }
        }

        let trimmed = line.trim_start();
        if pending.is_empty() && !is_import_line(trimmed) {
            continue;
        }

        if !pending.is_empty() {
            pending.push(' ');
        }
        pending.push_str(trimmed.trim_end_matches('\\').trim_end());

        // A parenthesised name list or a trailing backslash continues on
        // the next line.
        let open = pending.matches('(').count();
        let close = pending.matches(')').count();
        if trimmed.ends_with('\\') || open > close {
            continue;
        }

        parse_statement(&pending, &mut statements);
        pending.clear();
    }

    statements
}

/// Whether a trimmed line begins an import statement.
fn is_import_line(trimmed: &str) -> bool {
    trimmed == "import"
        || trimmed == "from"
        || trimmed.starts_with("import ")
        || trimmed.starts_with("from ")
}

/// Remove a trailing comment, respecting single- and double-quoted spans.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (idx, ch) in line.char_indices() {
        match (quote, ch) {
            (None, '#') => return &line[..idx],
            (None, '\'' | '"') => quote = Some(ch),
            (Some(q), c) if c == q => quote = None,
            _ => {}
        }
    }
    line
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

/// Parse a complete (continuation-joined) statement.
fn parse_statement(text: &str, out: &mut Vec<ImportStmt>) {
    if let Some(rest) = text.strip_prefix("import ") {
        for target in rest.split(',') {
            let Some(module) = first_token(target) else {
                continue;
            };
            out.push(ImportStmt {
                levels: 0,
                module: Some(module),
                names: Vec::new(),
                star: false,
            });
        }
    } else if let Some(rest) = text.strip_prefix("from ") {
        let Some((module_part, names_part)) = rest.split_once(" import ") else {
            return;
        };
        let module_part = module_part.trim();
        let levels = module_part.chars().take_while(|&c| c == '.').count();
        let module_text = &module_part[levels..];
        let module = if module_text.is_empty() {
            None
        } else {
            Some(module_text.to_owned())
        };
        if levels == 0 && module.is_none() {
            return;
        }

        let cleaned = names_part.replace(['(', ')'], " ");
        let mut names = Vec::new();
        let mut star = false;
        for item in cleaned.split(',') {
            match first_token(item) {
                Some(name) if name == "*" => star = true,
                Some(name) => names.push(name),
                None => {}
            }
        }

        out.push(ImportStmt {
            levels: u32::try_from(levels).unwrap_or(u32::MAX),
            module,
            names,
            star,
        });
    }
}

/// First whitespace-delimited token of an import target, dropping aliases.
fn first_token(item: &str) -> Option<String> {
    item.split_whitespace().next().map(str::to_owned)
}
