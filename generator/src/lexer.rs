// Lexer for textual LLVM IR modules.
//
// Tokenizes the subset of the LLVM assembly syntax the harness generator
// needs to see: identifiers, types, metadata references, debug records and
// enough punctuation to find parameter lists and operand boundaries.
// Uses the `logos` crate for DFA-based lexing.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// LLVM IR token types.
///
/// Only the keywords the parser dispatches on get their own variant; every
/// other bare word (types, attributes, opcodes, linkage) is a `Word`.
/// Quoted identifiers are unescaped when lexed.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+|;[^\n]*")]
pub enum Token {
    // ── Keywords ──
    #[token("define")]
    Define,
    #[token("declare")]
    Declare,
    #[token("call")]
    Call,
    #[token("distinct")]
    Distinct,
    #[token("target")]
    Target,
    #[token("triple")]
    Triple,
    #[token("source_filename")]
    SourceFilename,

    // ── Symbols ──
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
    #[token("*")]
    Star,
    #[token(":")]
    Colon,
    #[token("|")]
    Pipe,
    #[token("!")]
    Bang,
    #[token("...")]
    Ellipsis,
    /// Operators that only appear inside constant expressions and summaries.
    #[regex(r"[+\-^&?/\\~']", |lex| lex.slice().chars().next())]
    Punct(char),

    // ── Identifiers ──
    /// `%name`, `%0`, `%"quoted name"`.
    #[regex(r"%[-a-zA-Z$._0-9]+", |lex| lex.slice()[1..].to_string())]
    #[regex(r#"%"([^"\\]|\\.)*""#, |lex| unquote(&lex.slice()[1..]))]
    LocalIdent(String),

    /// `@name`, `@0`, `@"quoted name"`.
    #[regex(r"@[-a-zA-Z$._0-9]+", |lex| lex.slice()[1..].to_string())]
    #[regex(r#"@"([^"\\]|\\.)*""#, |lex| unquote(&lex.slice()[1..]))]
    GlobalIdent(String),

    /// Numbered metadata reference: `!12`.
    #[regex(r"![0-9]+", |lex| lex.slice()[1..].parse::<u32>().ok())]
    MetadataRef(u32),

    /// Named metadata or specialized node kind: `!dbg`, `!DILocalVariable`.
    #[regex(r"![a-zA-Z_][a-zA-Z0-9_.]*", |lex| lex.slice()[1..].to_string())]
    MetadataName(String),

    /// Debug record introducer: `#dbg_declare`, `#dbg_value`.
    #[regex(r"#dbg_[a-z_]+", |lex| lex.slice()[5..].to_string())]
    DbgRecord(String),

    /// Attribute group reference: `#0`.
    #[regex(r"#[0-9]+", |lex| lex.slice()[1..].parse::<u32>().ok())]
    AttrGroup(u32),

    // ── Literals ──
    /// Integer type: `i1`, `i32`, `i128`.
    #[regex(r"i[0-9]+", |lex| lex.slice()[1..].parse::<u32>().ok(), priority = 5)]
    IntType(u32),

    /// Integer literal. Kept as text: LLVM integers may exceed 64 bits.
    #[regex(r"-?[0-9]+", |lex| lex.slice().to_string())]
    Int(String),

    /// Decimal floating-point literal.
    #[regex(r"-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    Float(String),

    /// Hexadecimal literal (`0x3FF0000000000000`, `0xK...`).
    #[regex(r"0x[KLMHR]?[0-9A-Fa-f]+", |lex| lex.slice().to_string())]
    Hex(String),

    /// String literal, optionally `c`-prefixed. `\XX` hex escapes decoded.
    #[regex(r#"c?"([^"\\]|\\.)*""#, |lex| {
        let slice = lex.slice();
        unquote(slice.strip_prefix('c').unwrap_or(slice))
    })]
    StringLit(String),

    // ── Words ──
    //
    // Placed after keywords: logos prioritises fixed `#[token]` matches
    // over regex for the same length, so `call` matches Call, not Word.
    #[regex(r"[a-zA-Z_$.][a-zA-Z0-9_$.]*", |lex| lex.slice().to_string())]
    Word(String),

    // ── Structure ──
    /// One or more newlines. Instructions and top-level entities are
    /// line-terminated.
    #[regex(r"\n+")]
    Newline,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Define => write!(f, "define"),
            Token::Declare => write!(f, "declare"),
            Token::Call => write!(f, "call"),
            Token::Distinct => write!(f, "distinct"),
            Token::Target => write!(f, "target"),
            Token::Triple => write!(f, "triple"),
            Token::SourceFilename => write!(f, "source_filename"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::Comma => write!(f, ","),
            Token::Equals => write!(f, "="),
            Token::Star => write!(f, "*"),
            Token::Colon => write!(f, ":"),
            Token::Pipe => write!(f, "|"),
            Token::Bang => write!(f, "!"),
            Token::Ellipsis => write!(f, "..."),
            Token::Punct(c) => write!(f, "{c}"),
            Token::LocalIdent(name) => write!(f, "%{name}"),
            Token::GlobalIdent(name) => write!(f, "@{name}"),
            Token::MetadataRef(id) => write!(f, "!{id}"),
            Token::MetadataName(name) => write!(f, "!{name}"),
            Token::DbgRecord(kind) => write!(f, "#dbg_{kind}"),
            Token::AttrGroup(id) => write!(f, "#{id}"),
            Token::IntType(bits) => write!(f, "i{bits}"),
            Token::Int(text) | Token::Float(text) | Token::Hex(text) => write!(f, "{text}"),
            Token::StringLit(s) => write!(f, "{s:?}"),
            Token::Word(w) => write!(f, "{w}"),
            Token::Newline => write!(f, "<newline>"),
        }
    }
}

// ── Callbacks ──

/// Strip the surrounding quotes and decode LLVM's `\XX` and `\\` escapes.
fn unquote(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let bytes = inner.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            if bytes.get(i + 1) == Some(&b'\\') {
                out.push(b'\\');
                i += 2;
                continue;
            }
            let hex = inner.get(i + 1..i + 3).and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(byte) = hex {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ── Public API ──

/// Lex an LLVM IR module into tokens.
///
/// Returns all successfully parsed tokens together with any errors for
/// unrecognised characters. Lexing is non-fatal: errors are collected and
/// the lexer continues past bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──
