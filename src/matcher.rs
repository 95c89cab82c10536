//! Path matchers: `glob:` and `regex:` syntaxes.
//!
//! The expression is `syntax:pattern` with the first colon as delimiter.
//! Glob patterns are translated to regexes: `*` matches within one name,
//! `**` across separators, `?` one character, `[...]` classes (with `!`
//! negation), `{a,b}` alternation without nesting, `\` escapes.

use regex::Regex;

use crate::path::VfsPath;
use crate::{VfsError, VfsResult};

/// A compiled matcher over whole path strings.
pub struct PathMatcher {
    regex: Regex,
}

impl PathMatcher {
    pub(crate) fn compile(expr: &str, separator: &str) -> VfsResult<Self> {
        let (syntax, pattern) = expr.split_once(':').ok_or_else(|| {
            VfsError::InvalidArgument(format!("matcher expression has no syntax prefix: {expr:?}"))
        })?;
        if syntax.is_empty() {
            return Err(VfsError::InvalidArgument(format!(
                "matcher expression has an empty syntax prefix: {expr:?}"
            )));
        }
        let source = match syntax {
            "regex" => pattern.to_owned(),
            "glob" => glob_to_regex(pattern, separator)?,
            other => {
                return Err(VfsError::NotSupported(format!(
                    "unknown matcher syntax: {other}"
                )));
            }
        };
        let regex = Regex::new(&format!("^(?:{source})$"))
            .map_err(|err| VfsError::InvalidArgument(format!("bad pattern {pattern:?}: {err}")))?;
        Ok(Self { regex })
    }

    pub fn matches(&self, path: &VfsPath) -> bool {
        self.regex.is_match(&path.to_string())
    }

    pub fn matches_str(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

const REGEX_META: &str = r"\.+*?()|[]{}^$#&-~";

fn push_literal(out: &mut String, ch: char) {
    if REGEX_META.contains(ch) {
        out.push('\\');
    }
    out.push(ch);
}

fn not_separator(separator: &str) -> String {
    let escaped: String = separator.chars().map(|c| format!("\\{c}")).collect();
    format!("[^{escaped}]")
}

fn glob_to_regex(glob: &str, separator: &str) -> VfsResult<String> {
    let no_sep = not_separator(separator);
    let mut out = String::new();
    let mut chars = glob.chars().peekable();
    let mut in_alternation = false;
    while let Some(ch) = chars.next() {
        match ch {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str(&no_sep);
                    out.push('*');
                }
            }
            '?' => out.push_str(&no_sep),
            '\\' => {
                let escaped = chars.next().ok_or_else(|| {
                    VfsError::InvalidArgument("glob pattern ends with a bare escape".into())
                })?;
                push_literal(&mut out, escaped);
            }
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                    out.push_str(&separator.chars().map(|c| format!("\\{c}")).collect::<String>());
                }
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == ']' {
                        closed = true;
                        break;
                    }
                    if inner == '-' {
                        out.push('-');
                    } else {
                        push_literal(&mut out, inner);
                    }
                }
                if !closed {
                    return Err(VfsError::InvalidArgument(
                        "glob pattern has an unclosed character class".into(),
                    ));
                }
                out.push(']');
            }
            '{' => {
                if in_alternation {
                    return Err(VfsError::InvalidArgument(
                        "glob pattern has a nested alternation".into(),
                    ));
                }
                in_alternation = true;
                out.push_str("(?:");
            }
            '}' => {
                if !in_alternation {
                    push_literal(&mut out, ch);
                } else {
                    in_alternation = false;
                    out.push(')');
                }
            }
            ',' if in_alternation => out.push('|'),
            _ => push_literal(&mut out, ch),
        }
    }
    if in_alternation {
        return Err(VfsError::InvalidArgument(
            "glob pattern has an unclosed alternation".into(),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(pattern: &str) -> PathMatcher {
        PathMatcher::compile(&format!("glob:{pattern}"), "/").unwrap()
    }

    #[test]
    fn requires_syntax_prefix() {
        assert!(matches!(
            PathMatcher::compile("*.txt", "/"),
            Err(VfsError::InvalidArgument(_))
        ));
        assert!(matches!(
            PathMatcher::compile(":*.txt", "/"),
            Err(VfsError::InvalidArgument(_))
        ));
        assert!(matches!(
            PathMatcher::compile("grep:x", "/"),
            Err(VfsError::NotSupported(_))
        ));
    }

    #[test]
    fn star_stays_within_one_name() {
        let m = glob("/a/*.txt");
        assert!(m.matches_str("/a/b.txt"));
        assert!(!m.matches_str("/a/b/c.txt"));
    }

    #[test]
    fn double_star_crosses_separators() {
        let m = glob("/a/**");
        assert!(m.matches_str("/a/b"));
        assert!(m.matches_str("/a/b/c.txt"));
    }

    #[test]
    fn question_mark_and_classes() {
        let m = glob("/?[ab].rs");
        assert!(m.matches_str("/xa.rs"));
        assert!(m.matches_str("/yb.rs"));
        assert!(!m.matches_str("/xc.rs"));
        let neg = glob("/[!a]x");
        assert!(neg.matches_str("/bx"));
        assert!(!neg.matches_str("/ax"));
    }

    #[test]
    fn alternation() {
        let m = glob("/src/*.{rs,toml}");
        assert!(m.matches_str("/src/lib.rs"));
        assert!(m.matches_str("/src/config.toml"));
        assert!(!m.matches_str("/src/notes.md"));
    }

    #[test]
    fn regex_syntax_is_passed_through() {
        let m = PathMatcher::compile(r"regex:/a/\d+", "/").unwrap();
        assert!(m.matches_str("/a/123"));
        assert!(!m.matches_str("/a/x"));
    }

    #[test]
    fn rejects_malformed_globs() {
        assert!(PathMatcher::compile("glob:[abc", "/").is_err());
        assert!(PathMatcher::compile("glob:{a,b", "/").is_err());
        assert!(PathMatcher::compile("glob:x\\", "/").is_err());
    }
}
