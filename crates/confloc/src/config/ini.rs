//! INI resource files.
//!
//! - `[Section]` headers prefix the keys that follow (`Section:key`)
//! - One entry per line: `key = value`
//! - Comments: lines starting with `;`, `#` or `/`
//! - Optional quoting: `"..."` or `'...'`, with no escape sequences
//!
//! Empty keys are accepted inside a section so the invariant locale can be
//! written as `=value`.

use indexmap::IndexMap;

use super::fold_key;
use super::source::ConfigEntries;
use crate::key::KEY_DELIMITER;

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct SyntaxError {
    pub line: usize,
    pub msg: String,
}

pub(crate) fn parse(src: &str) -> Result<ConfigEntries, SyntaxError> {
    let mut entries: IndexMap<String, (String, Option<String>)> = IndexMap::new();
    let mut section: Option<String> = None;

    for (idx, raw_line) in src.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with([';', '#', '/']) {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let Some(name) = header.strip_suffix(']') else {
                return Err(SyntaxError {
                    line: line_no,
                    msg: "section header is missing `]`".to_string(),
                });
            };
            section = Some(name.trim().to_string());
            continue;
        }

        let Some(eq) = line.find('=') else {
            return Err(SyntaxError {
                line: line_no,
                msg: "expected `key = value`".to_string(),
            });
        };

        let key = line[..eq].trim();
        let key = match &section {
            Some(section) => format!("{section}{KEY_DELIMITER}{key}"),
            None if key.is_empty() => {
                return Err(SyntaxError {
                    line: line_no,
                    msg: "empty key outside of a section".to_string(),
                });
            }
            None => key.to_string(),
        };

        let value = unquote(&line[eq + 1..]).to_string();

        let folded = fold_key(&key);
        if entries.contains_key(&folded) {
            return Err(SyntaxError {
                line: line_no,
                msg: format!("duplicate key `{key}`"),
            });
        }
        entries.insert(folded, (key, Some(value)));
    }

    Ok(entries.into_values().collect())
}

/// Strips one pair of matching surrounding quotes; the text inside is kept
/// verbatim, backslashes included.
fn unquote(s: &str) -> &str {
    let s = s.trim();
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(path: &str, value: &str) -> (String, Option<String>) {
        (path.to_string(), Some(value.to_string()))
    }

    #[test]
    fn sections_prefix_keys() {
        let src = r#"
; comment
# another
[Close]
pt-BR = Fechar

[Branch to&colon; {{name}}]
pt-BR=Ramifique para: {{name}}
"#;
        assert_eq!(
            parse(src).unwrap(),
            vec![
                entry("Close:pt-BR", "Fechar"),
                entry("Branch to&colon; {{name}}:pt-BR", "Ramifique para: {{name}}"),
            ]
        );
    }

    #[test]
    fn empty_keys_and_values() {
        let src = "[Invariant]\n=Invariant\n[NullValue]\nen-NZ=\n";
        assert_eq!(
            parse(src).unwrap(),
            vec![entry("Invariant:", "Invariant"), entry("NullValue:en-NZ", "")]
        );
    }

    #[test]
    fn quoted_values() {
        let src = "greeting = \"  Hello, World  \"\nsingle = 'it'\npath = C:\\temp\n";
        assert_eq!(
            parse(src).unwrap(),
            vec![
                entry("greeting", "  Hello, World  "),
                entry("single", "it"),
                entry("path", "C:\\temp"),
            ]
        );
    }

    #[test]
    fn backslashes_inside_quotes_are_kept() {
        let src = r#"
[Path]
en = "C:\new\table"
de = 'say \"hi\"'
"#;
        assert_eq!(
            parse(src).unwrap(),
            vec![
                entry("Path:en", r"C:\new\table"),
                entry("Path:de", r#"say \"hi\""#),
            ]
        );
    }

    #[test]
    fn syntax_errors_carry_line_numbers() {
        assert_eq!(
            parse("[ok]\nno separator\n").unwrap_err().line,
            2
        );
        assert_eq!(parse("[broken\n").unwrap_err().line, 1);
        assert_eq!(parse("= value\n").unwrap_err().line, 1);

        let err = parse("[A]\nx=1\n[a]\nX=2\n").unwrap_err();
        assert_eq!(err.line, 4);
        assert!(err.msg.contains("duplicate"));
    }
}
