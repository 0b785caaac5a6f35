//! Tokenizer for the expression grammar, built on `logos`.
//!
//! Template literals are lexed as a whole: the cooked text segments are kept
//! and each `${...}` substitution is captured as raw source (with its byte
//! offset) for the parser to parse recursively. Strings, templates and block
//! comments are scanned by callbacks over the remaining input.

use logos::Logos;

use super::SyntaxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semi,
    Dot,
    QuestionDot,
    Ellipsis,
    Arrow,
    Question,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    EqEq,
    EqEqEq,
    NotEq,
    NotEqEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    AndAnd,
    OrOr,
    QuestionQuestion,
    Amp,
    Pipe,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSubstitution {
    pub source: String,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    /// Raw numeric literal text.
    Number(String),
    /// Cooked string literal.
    Str(String),
    Template {
        quasis: Vec<String>,
        substitutions: Vec<TemplateSubstitution>,
    },
    Punct(Punct),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Error raised inside a logos callback. Without a message it is an
/// unrecognized character at the token start.
#[derive(Debug, Clone, Default, PartialEq)]
struct LexError {
    message: Option<String>,
    offset: Option<usize>,
}

impl LexError {
    fn at(message: &str, offset: usize) -> Self {
        LexError {
            message: Some(message.to_string()),
            offset: Some(offset),
        }
    }

    fn into_syntax(self, start: usize, slice: &str) -> SyntaxError {
        let message = self.message.unwrap_or_else(|| match slice.chars().next() {
            Some(c) => format!("unexpected character '{c}'"),
            None => "unexpected end of input".to_string(),
        });
        SyntaxError::new(message, self.offset.unwrap_or(start))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct TemplateParts {
    quasis: Vec<String>,
    substitutions: Vec<TemplateSubstitution>,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexError)]
#[logos(skip r"\s+")]
#[logos(skip r"//[^\n]*")]
enum RawToken {
    #[token("/*", block_comment)]
    Comment,

    #[regex(r"[\p{Alphabetic}_$][\p{Alphabetic}0-9_$\x{200C}\x{200D}]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"0[xXoObB][0-9a-fA-F_]*", number)]
    #[regex(r"[0-9][0-9_]*(\.[0-9_]*)?([eE][+-]?[0-9_]*)?", number)]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9_]*)?", number)]
    Number(String),

    #[token("\"", quoted)]
    #[token("'", quoted)]
    Str(String),

    #[token("`", template)]
    Template(TemplateParts),

    #[token("...", |_| Punct::Ellipsis)]
    #[token("===", |_| Punct::EqEqEq)]
    #[token("!==", |_| Punct::NotEqEq)]
    #[token("?.", |_| Punct::QuestionDot)]
    #[token("??", |_| Punct::QuestionQuestion)]
    #[token("=>", |_| Punct::Arrow)]
    #[token("==", |_| Punct::EqEq)]
    #[token("!=", |_| Punct::NotEq)]
    #[token("<=", |_| Punct::LtEq)]
    #[token(">=", |_| Punct::GtEq)]
    #[token("&&", |_| Punct::AndAnd)]
    #[token("||", |_| Punct::OrOr)]
    #[token("(", |_| Punct::LParen)]
    #[token(")", |_| Punct::RParen)]
    #[token("[", |_| Punct::LBracket)]
    #[token("]", |_| Punct::RBracket)]
    #[token("{", |_| Punct::LBrace)]
    #[token("}", |_| Punct::RBrace)]
    #[token(",", |_| Punct::Comma)]
    #[token(":", |_| Punct::Colon)]
    #[token(";", |_| Punct::Semi)]
    #[token(".", |_| Punct::Dot)]
    #[token("?", |_| Punct::Question)]
    #[token("!", |_| Punct::Bang)]
    #[token("+", |_| Punct::Plus)]
    #[token("-", |_| Punct::Minus)]
    #[token("*", |_| Punct::Star)]
    #[token("/", |_| Punct::Slash)]
    #[token("%", |_| Punct::Percent)]
    #[token("=", |_| Punct::Eq)]
    #[token("<", |_| Punct::Lt)]
    #[token(">", |_| Punct::Gt)]
    #[token("&", |_| Punct::Amp)]
    #[token("|", |_| Punct::Pipe)]
    Punct(Punct),
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

fn block_comment(lex: &mut logos::Lexer<RawToken>) -> Result<(), LexError> {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            Ok(())
        }
        None => Err(LexError::at("unterminated comment", lex.span().start)),
    }
}

fn number(lex: &mut logos::Lexer<RawToken>) -> Result<String, LexError> {
    if lex.remainder().chars().next().is_some_and(is_ident_start) {
        return Err(LexError::at("identifier directly after number", lex.span().end));
    }
    Ok(lex.slice().to_string())
}

fn quoted(lex: &mut logos::Lexer<RawToken>) -> Result<String, LexError> {
    let mut cursor = Cursor::new(lex.source(), lex.span().start);
    let quote = cursor.peek().unwrap_or('"');
    let value = cursor.string(quote)?;
    lex.bump(cursor.pos - lex.span().end);
    Ok(value)
}

fn template(lex: &mut logos::Lexer<RawToken>) -> Result<TemplateParts, LexError> {
    let mut cursor = Cursor::new(lex.source(), lex.span().start);
    let parts = cursor.template()?;
    lex.bump(cursor.pos - lex.span().end);
    Ok(parts)
}

pub fn tokenize(source: &str) -> Result<Vec<Spanned>, SyntaxError> {
    let mut lexer = RawToken::lexer(source);
    let mut tokens = Vec::new();
    // `a?.5:1` is a conditional, not an optional chain.
    let mut fraction_pending = false;
    while let Some(result) = lexer.next() {
        let offset = lexer.span().start;
        let raw = result.map_err(|err| err.into_syntax(offset, lexer.slice()))?;
        let (token, offset) = match raw {
            RawToken::Comment => continue,
            RawToken::Punct(Punct::QuestionDot)
                if lexer.remainder().starts_with(|c: char| c.is_ascii_digit()) =>
            {
                fraction_pending = true;
                (Token::Punct(Punct::Question), offset)
            }
            RawToken::Number(raw) if fraction_pending => {
                (Token::Number(format!(".{raw}")), offset - 1)
            }
            RawToken::Number(raw) => (Token::Number(raw), offset),
            RawToken::Ident(name) => (Token::Ident(name), offset),
            RawToken::Str(value) => (Token::Str(value), offset),
            RawToken::Template(parts) => (
                Token::Template {
                    quasis: parts.quasis,
                    substitutions: parts.substitutions,
                },
                offset,
            ),
            RawToken::Punct(punct) => (Token::Punct(punct), offset),
        };
        if !matches!(token, Token::Punct(Punct::Question)) {
            fraction_pending = false;
        }
        tokens.push(Spanned { token, offset });
    }
    tokens.push(Spanned {
        token: Token::Eof,
        offset: source.len(),
    });
    Ok(tokens)
}

/// Char cursor over the source with absolute byte positions.
struct Cursor<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str, pos: usize) -> Self {
        Cursor { source, pos }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: &str) -> LexError {
        LexError::at(message, self.pos)
    }

    fn escape(&mut self, out: &mut String) -> Result<(), LexError> {
        let Some(c) = self.bump() else {
            return Err(self.error("unterminated escape"));
        };
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            '\n' => {}
            'x' => {
                let code = self.hex_digits(2)?;
                out.push(char::from_u32(code).ok_or_else(|| self.error("invalid escape"))?);
            }
            'u' => {
                let code = if self.peek() == Some('{') {
                    self.pos += 1;
                    let mut code = 0u32;
                    loop {
                        match self.bump() {
                            Some('}') => break,
                            Some(d) if d.is_ascii_hexdigit() => {
                                code = code
                                    .checked_mul(16)
                                    .and_then(|v| v.checked_add(d.to_digit(16).unwrap_or(0)))
                                    .ok_or_else(|| self.error("escape out of range"))?;
                            }
                            _ => return Err(self.error("invalid unicode escape")),
                        }
                    }
                    code
                } else {
                    self.hex_digits(4)?
                };
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            other => out.push(other),
        }
        Ok(())
    }

    fn hex_digits(&mut self, count: usize) -> Result<u32, LexError> {
        let mut code = 0u32;
        for _ in 0..count {
            let digit = self
                .bump()
                .and_then(|d| d.to_digit(16))
                .ok_or_else(|| self.error("invalid hex escape"))?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    /// Expects the opening quote at the cursor.
    fn string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.pos;
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(value),
                Some('\\') => self.escape(&mut value)?,
                Some('\n') | None => return Err(LexError::at("unterminated string", start)),
                Some(c) => value.push(c),
            }
        }
    }

    /// Expects the opening backtick at the cursor.
    fn template(&mut self) -> Result<TemplateParts, LexError> {
        let start = self.pos;
        self.bump();
        let mut quasis = Vec::new();
        let mut substitutions = Vec::new();
        let mut current = String::new();
        loop {
            match self.bump() {
                Some('`') => {
                    quasis.push(current);
                    return Ok(TemplateParts {
                        quasis,
                        substitutions,
                    });
                }
                Some('\\') => self.escape(&mut current)?,
                Some('$') if self.peek() == Some('{') => {
                    self.pos += 1;
                    quasis.push(std::mem::take(&mut current));
                    substitutions.push(self.substitution()?);
                }
                Some(c) => current.push(c),
                None => return Err(LexError::at("unterminated template", start)),
            }
        }
    }

    /// Captures the raw source of a `${ ... }` body, up to the matching brace.
    fn substitution(&mut self) -> Result<TemplateSubstitution, LexError> {
        let offset = self.pos;
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => return Err(LexError::at("unterminated substitution", offset)),
                Some('}') if depth == 0 => {
                    let source = self.source[offset..self.pos].to_string();
                    self.pos += 1;
                    return Ok(TemplateSubstitution { source, offset });
                }
                Some('{') => {
                    depth += 1;
                    self.pos += 1;
                }
                Some('}') => {
                    depth -= 1;
                    self.pos += 1;
                }
                Some(q @ ('"' | '\'')) => {
                    self.string(q)?;
                }
                Some('`') => {
                    self.template()?;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }
}
