// Advanced Text Splitting
// Quote- and bracket-aware tokenization used by parameter parsing

use crate::config::ConfigError;

/// Split `text` at separator characters, ignoring separators inside
/// quotes (`'`, `"`) or brackets (`()`, `[]`, `{}`).
///
/// When `keep_separator` is true the separator character stays at the
/// end of the piece it terminates (used to split after closing
/// brackets); otherwise it is dropped. Empty pieces are never emitted.
pub fn split_advanced(
    text: &str,
    is_separator: impl Fn(char) -> bool,
    keep_separator: bool,
) -> Result<Vec<String>, ConfigError> {
    let mut pieces = Vec::new();
    let mut buffer = String::new();
    let mut quote: Option<char> = None;
    let mut brackets: Vec<char> = Vec::new();

    for ch in text.chars() {
        if let Some(q) = quote {
            buffer.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        if ch == '\'' || ch == '"' {
            quote = Some(ch);
            buffer.push(ch);
            continue;
        }
        if matches!(ch, '(' | '[' | '{') {
            brackets.push(ch);
        }
        if matches!(ch, ')' | ']' | '}') {
            match brackets.pop() {
                Some(open) if closes(open) == ch => {}
                _ => {
                    return Err(ConfigError::UnbalancedText {
                        text: text.to_string(),
                    })
                }
            }
        }
        if !brackets.is_empty() || !is_separator(ch) {
            buffer.push(ch);
            continue;
        }
        if keep_separator {
            buffer.push(ch);
        }
        if !buffer.is_empty() {
            pieces.push(buffer.clone());
            buffer.clear();
        }
    }

    if quote.is_some() || !brackets.is_empty() {
        return Err(ConfigError::UnbalancedText {
            text: text.to_string(),
        });
    }
    if !buffer.is_empty() {
        pieces.push(buffer);
    }
    Ok(pieces)
}

fn closes(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Parse one tuple entry: `(a, b, c)` splits on the delimiter with
/// nesting respected, anything else is a single-element tuple.
pub fn parse_tuple(text: &str, delimiter: char) -> Result<Vec<String>, ConfigError> {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        let pieces = split_advanced(inner, |c| c == delimiter, false)?;
        return Ok(pieces.iter().map(|p| p.trim().to_string()).collect());
    }
    Ok(vec![text.to_string()])
}

/// Shell-style tokenization: whitespace-separated words with single
/// and double quotes grouping.
pub fn shell_split(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut buffer = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for ch in text.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => buffer.push(ch),
            None if ch == '\'' || ch == '"' => {
                quote = Some(ch);
                in_word = true;
            }
            None if ch.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut buffer));
                    in_word = false;
                }
            }
            None => {
                buffer.push(ch);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(buffer);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_after_closing_brackets() {
        let pieces = split_advanced("(1, 2) (3, 4)", |c| ")]}".contains(c), true).unwrap();
        assert_eq!(pieces, vec!["(1, 2)", " (3, 4)"]);
    }

    #[test]
    fn test_split_respects_nesting() {
        let pieces = split_advanced("a, (b, c), d", |c| c == ',', false).unwrap();
        assert_eq!(pieces, vec!["a", " (b, c)", " d"]);
    }

    #[test]
    fn test_split_respects_quotes() {
        let pieces = split_advanced("'a, b', c", |c| c == ',', false).unwrap();
        assert_eq!(pieces, vec!["'a, b'", " c"]);
    }

    #[test]
    fn test_uneven_brackets_rejected() {
        assert!(split_advanced("(a, b", |c| c == ',', false).is_err());
        assert!(split_advanced("a) b", |c| c == ',', false).is_err());
    }

    #[test]
    fn test_parse_tuple() {
        assert_eq!(parse_tuple("(1, 2, 3)", ',').unwrap(), vec!["1", "2", "3"]);
        assert_eq!(parse_tuple("plain", ',').unwrap(), vec!["plain"]);
        assert_eq!(parse_tuple("((a,b), c)", ',').unwrap(), vec!["(a,b)", "c"]);
    }

    #[test]
    fn test_shell_split() {
        assert_eq!(shell_split("a b  c"), vec!["a", "b", "c"]);
        assert_eq!(shell_split("a 'b c' d"), vec!["a", "b c", "d"]);
        assert_eq!(shell_split("  "), Vec::<String>::new());
    }
}
