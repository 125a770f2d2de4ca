use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result, TokenizeError};
use crate::util::collapse_whitespace;

/// Turns source text into a whitespace-separated token stream.
pub trait Tokenizer: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn tokenize(&self, source: &str, file_label: &str) -> std::result::Result<String, TokenizeError>;

    /// Comment text found in `source`, one comment per line. Empty when the
    /// tokenizer does not recognise comments.
    fn retrieve_comments(
        &self,
        source: &str,
        file_label: &str,
    ) -> std::result::Result<String, TokenizeError>;

    fn token_id(&self, token: &str) -> u32;
}

pub const TOKENIZER_NAMES: &[&str] = &["code", "whitespace"];

pub fn tokenizer_by_name(name: &str) -> Result<Arc<dyn Tokenizer>> {
    match name {
        "code" => Ok(Arc::new(CodeTokenizer)),
        "whitespace" => Ok(Arc::new(WhitespaceTokenizer)),
        other => Err(Error::UnknownTokenizer(other.to_string())),
    }
}

/// Side-table key under which a tokenizer's stream is cached.
pub(crate) fn token_key(tokenizer: &dyn Tokenizer) -> String {
    format!("tokens_{}", tokenizer.name())
}

pub(crate) fn comment_key(tokenizer: &dyn Tokenizer) -> String {
    format!("comments_{}", tokenizer.name())
}

const TOK_IDENT: u32 = 1;
const TOK_NUM: u32 = 2;
const TOK_STR: u32 = 3;
const TOK_OTHER: u32 = 4;
const TOK_PUNCT_BASE: u32 = 10_000;

const KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "do", "switch", "case", "break", "continue", "return", "try",
    "catch", "finally", "throw", "fn", "function", "class", "struct", "enum", "impl", "trait",
    "const", "let", "var", "static", "public", "private", "protected", "async", "await", "new",
    "void", "int", "char", "float", "double", "long", "boolean", "bool", "import", "include",
];

fn keyword_token(ident: &str) -> Option<u32> {
    KEYWORDS
        .iter()
        .position(|&k| k == ident)
        .map(|pos| 100 + pos as u32)
}

/// Lexer for C-family sources. Identifiers, numbers and string literals
/// collapse to class tokens; keywords and punctuation are kept verbatim;
/// comments and preprocessor lines are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeTokenizer;

impl Tokenizer for CodeTokenizer {
    fn name(&self) -> &'static str {
        "code"
    }

    fn tokenize(&self, text: &str, file_label: &str) -> std::result::Result<String, TokenizeError> {
        let mut out = String::with_capacity(text.len() / 2);
        lex(
            text,
            file_label,
            |tok| {
                out.push_str(tok);
                out.push('\n');
            },
            |_| {},
        )?;
        Ok(out)
    }

    fn retrieve_comments(
        &self,
        text: &str,
        file_label: &str,
    ) -> std::result::Result<String, TokenizeError> {
        let mut out = String::new();
        lex(
            text,
            file_label,
            |_| {},
            |body| {
                let body = body.trim();
                if !body.is_empty() {
                    out.push_str(body);
                    out.push('\n');
                }
            },
        )?;
        Ok(out)
    }

    fn token_id(&self, token: &str) -> u32 {
        match token {
            "ID" => TOK_IDENT,
            "NUM" => TOK_NUM,
            "STR" => TOK_STR,
            _ => {
                if let Some(id) = keyword_token(token) {
                    return id;
                }
                match token.as_bytes() {
                    [b] if b.is_ascii_punctuation() => TOK_PUNCT_BASE + u32::from(*b),
                    _ => TOK_OTHER,
                }
            }
        }
    }
}

/// Walks `text` once, handing class tokens to `on_token` and the bodies of
/// `//` and `/* */` comments (delimiters stripped) to `on_comment`.
fn lex(
    text: &str,
    file_label: &str,
    mut on_token: impl FnMut(&str),
    mut on_comment: impl FnMut(&str),
) -> std::result::Result<(), TokenizeError> {
    let bytes = text.as_bytes();
    if let Some(pos) = bytes.iter().position(|&b| b == 0) {
        return Err(TokenizeError {
            file: file_label.to_string(),
            message: format!("NUL byte at offset {pos}"),
        });
    }

    let mut i = 0usize;
    let mut at_line_start = true;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\n' {
            i += 1;
            at_line_start = true;
            continue;
        }
        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let was_at_line_start = at_line_start;
        at_line_start = false;

        if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
            i += 2;
            let start = i;
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            on_comment(&text[start..i]);
            continue;
        }
        if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            let start = i;
            let mut end = bytes.len();
            while i < bytes.len() {
                if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    end = i;
                    i += 2;
                    break;
                }
                i += 1;
            }
            on_comment(&text[start..end]);
            continue;
        }
        if b == b'#' && was_at_line_start {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        if b == b'"' || b == b'\'' {
            i += 1;
            while i < bytes.len() {
                let c = bytes[i];
                if c == b'\\' && i + 1 < bytes.len() {
                    i += 2;
                    continue;
                }
                i += 1;
                if c == b {
                    break;
                }
            }
            on_token("STR");
            continue;
        }

        if b.is_ascii_alphabetic() || b == b'_' || !b.is_ascii() {
            let start = i;
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || !bytes[i].is_ascii())
            {
                i += 1;
            }
            let ident = &text[start..i];
            if keyword_token(ident).is_some() {
                on_token(ident);
            } else {
                on_token("ID");
            }
            continue;
        }

        if b.is_ascii_digit() {
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.' || bytes[i] == b'_')
            {
                i += 1;
            }
            on_token("NUM");
            continue;
        }

        on_token(&text[i..i + 1]);
        i += 1;
    }
    Ok(())
}

/// Keeps the source as-is apart from collapsing whitespace runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn name(&self) -> &'static str {
        "whitespace"
    }

    fn tokenize(&self, source: &str, _file_label: &str) -> std::result::Result<String, TokenizeError> {
        Ok(collapse_whitespace(source))
    }

    fn retrieve_comments(
        &self,
        _source: &str,
        _file_label: &str,
    ) -> std::result::Result<String, TokenizeError> {
        Ok(String::new())
    }

    fn token_id(&self, token: &str) -> u32 {
        token.chars().next().map_or(0, u32::from)
    }
}
