//! Flow equation text handling: tokenizing, symbol extraction and
//! whole-word symbol renaming.
//!
//! Equations are plain infix expressions such as `beta*S*I/N` or
//! `gamma * I * exp(-u)`. Identifiers are runs of ASCII letters, digits and
//! underscores that do not start with a digit.

/// Substituted for a symbol whose owner has been removed, so that dependent
/// equations visibly reference something that no longer exists. User symbols
/// must start with a letter, so this can never collide with one.
pub const REMOVED_SYMBOL_PLACEHOLDER: &str = "__removed__";

/// Function names the processing service understands. An identifier directly
/// followed by `(` is a call, not a symbol reference.
pub const KNOWN_FUNCTIONS: &[&str] = &[
    "exp", "log", "ln", "sqrt", "abs", "sin", "cos", "tan", "min", "max", "pow",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    Operator,
    OpenParen,
    CloseParen,
    Comma,
    Unknown,
}

/// A token and the byte offset where it starts in the source equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
}

pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// True if `name` may be used as a compartment, constant or intervention name.
pub fn is_valid_symbol_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => chars.all(is_ident_char),
        _ => false,
    }
}

/// Split an equation into tokens. Whitespace is dropped; characters that do
/// not belong to the expression language come out as [`TokenKind::Unknown`].
pub fn tokenize(equation: &str) -> Vec<Token<'_>> {
    let bytes = equation.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < equation.len() {
        let c = equation[i..].chars().next().unwrap_or(' ');
        let start = i;
        let kind = if c.is_whitespace() {
            i += c.len_utf8();
            continue;
        } else if c.is_ascii_digit()
            || (c == '.' && bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit()))
        {
            i = scan_number(bytes, i);
            TokenKind::Number
        } else if c.is_ascii_alphabetic() || c == '_' {
            while i < bytes.len() && is_ident_char(bytes[i] as char) {
                i += 1;
            }
            TokenKind::Identifier
        } else {
            i += c.len_utf8();
            match c {
                '+' | '-' | '*' | '/' | '^' => TokenKind::Operator,
                '(' => TokenKind::OpenParen,
                ')' => TokenKind::CloseParen,
                ',' => TokenKind::Comma,
                _ => TokenKind::Unknown,
            }
        };
        tokens.push(Token {
            kind,
            text: &equation[start..i],
            start,
        });
    }
    tokens
}

/// Digits, an optional fraction and an optional exponent (`1e-3`, `2.5E+4`).
fn scan_number(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    i
}

/// Symbols referenced by `equation`, de-duplicated, in order of first use.
/// Function calls and numeric literals are not symbols.
pub fn referenced_symbols(equation: &str) -> Vec<String> {
    let tokens = tokenize(equation);
    let mut out: Vec<String> = Vec::new();
    for (idx, tok) in tokens.iter().enumerate() {
        if tok.kind != TokenKind::Identifier {
            continue;
        }
        let is_call = tokens
            .get(idx + 1)
            .is_some_and(|next| next.kind == TokenKind::OpenParen);
        if is_call {
            continue;
        }
        if !out.iter().any(|s| s == tok.text) {
            out.push(tok.text.to_string());
        }
    }
    out
}

/// Replace every whole-word occurrence of `old` in `equation` with `new`.
///
/// An occurrence only counts when the characters immediately before and after
/// it are not identifier characters, so renaming `I` leaves `Infected` alone.
/// This is plain text substitution: no uniqueness checks happen here.
pub fn rename_symbol(equation: &str, old: &str, new: &str) -> String {
    if old.is_empty() || old == new {
        return equation.to_string();
    }
    let mut out = String::with_capacity(equation.len());
    let mut copied = 0;
    let mut search = 0;
    while let Some(found) = equation[search..].find(old) {
        let start = search + found;
        let end = start + old.len();
        let before_ok = equation[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !is_ident_char(c));
        let after_ok = equation[end..]
            .chars()
            .next()
            .is_none_or(|c| !is_ident_char(c));
        if before_ok && after_ok {
            out.push_str(&equation[copied..start]);
            out.push_str(new);
            copied = end;
            search = end;
        } else {
            search = start + equation[start..].chars().next().map_or(1, char::len_utf8);
        }
    }
    out.push_str(&equation[copied..]);
    out
}

/// Rewrite references to a removed symbol with [`REMOVED_SYMBOL_PLACEHOLDER`].
pub fn mark_removed(equation: &str, removed: &str) -> String {
    rename_symbol(equation, removed, REMOVED_SYMBOL_PLACEHOLDER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_respects_word_boundaries() {
        assert_eq!(rename_symbol("I + Infected", "I", "J"), "J + Infected");
        assert_eq!(rename_symbol("beta*S*I", "beta", "b"), "b*S*I");
        assert_eq!(rename_symbol("S_1*S", "S", "X"), "S_1*X");
        assert_eq!(rename_symbol("2S + S2", "S", "X"), "2S + S2");
    }

    #[test]
    fn test_rename_all_occurrences() {
        assert_eq!(
            rename_symbol("I*(I+1)/I", "I", "Inf"),
            "Inf*(Inf+1)/Inf"
        );
    }

    #[test]
    fn test_rename_noop_cases() {
        assert_eq!(rename_symbol("a*b", "", "x"), "a*b");
        assert_eq!(rename_symbol("a*b", "a", "a"), "a*b");
        assert_eq!(rename_symbol("", "a", "x"), "");
    }

    #[test]
    fn test_mark_removed() {
        assert_eq!(mark_removed("beta*S*I", "beta"), "__removed__*S*I");
    }

    #[test]
    fn test_tokenize_numbers_and_identifiers() {
        let toks = tokenize("1.5e-3*beta + .5*x_2");
        let kinds: Vec<TokenKind> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Number,
                TokenKind::Operator,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Number,
                TokenKind::Operator,
                TokenKind::Identifier,
            ]
        );
        assert_eq!(toks[0].text, "1.5e-3");
        assert_eq!(toks[2].start, 7);
        assert_eq!(toks[6].text, "x_2");
    }

    #[test]
    fn test_tokenize_unknown_character() {
        let toks = tokenize("a $ b");
        assert_eq!(toks[1].kind, TokenKind::Unknown);
        assert_eq!(toks[1].text, "$");
    }

    #[test]
    fn test_referenced_symbols_skips_calls_and_duplicates() {
        assert_eq!(
            referenced_symbols("beta*S*I/N + exp(-u)*S"),
            vec!["beta", "S", "I", "N", "u"]
        );
        assert!(referenced_symbols("1e5 + 2").is_empty());
    }

    #[test]
    fn test_valid_symbol_names() {
        assert!(is_valid_symbol_name("beta"));
        assert!(is_valid_symbol_name("S_2"));
        assert!(!is_valid_symbol_name("2S"));
        assert!(!is_valid_symbol_name("_x"));
        assert!(!is_valid_symbol_name(""));
        assert!(!is_valid_symbol_name(REMOVED_SYMBOL_PLACEHOLDER));
        assert!(!is_valid_symbol_name("a b"));
    }
}
