//! Recursive-descent parser for the expression grammar.
//!
//! Precedence climbing handles binary operators; arrows are detected by
//! looking ahead for `=>` after an identifier or a balanced parameter list.
//! TypeScript `as` / `satisfies` assertions, parameter annotations and
//! non-null `!` are consumed and dropped.

use super::ast::*;
use super::lexer::{tokenize, Punct, Spanned, Token};
use super::SyntaxError;

/// Nesting limit; keeps hostile input from exhausting the native stack.
const MAX_DEPTH: usize = 128;

/// Parses `source` as exactly one expression.
pub fn parse_expression(source: &str) -> Result<Expr, SyntaxError> {
    let mut parser = Parser::new(source, 0)?;
    let expr = parser.parse_assignment()?;
    parser.expect_eof()?;
    Ok(expr)
}

/// Parses one expression from the start of `source` and returns it with the
/// byte offset of the first token after it.
pub fn parse_expression_prefix(source: &str) -> Result<(Expr, usize), SyntaxError> {
    let mut parser = Parser::new(source, 0)?;
    let expr = parser.parse_assignment()?;
    Ok((expr, parser.offset()))
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    base: usize,
    depth: usize,
}

fn binary_op(token: &Token) -> Option<BinaryOp> {
    let Token::Punct(punct) = token else {
        return None;
    };
    Some(match punct {
        Punct::Plus => BinaryOp::Add,
        Punct::Minus => BinaryOp::Sub,
        Punct::Star => BinaryOp::Mul,
        Punct::Slash => BinaryOp::Div,
        Punct::Percent => BinaryOp::Rem,
        Punct::EqEq => BinaryOp::Eq,
        Punct::NotEq => BinaryOp::NotEq,
        Punct::EqEqEq => BinaryOp::StrictEq,
        Punct::NotEqEq => BinaryOp::StrictNotEq,
        Punct::Lt => BinaryOp::Lt,
        Punct::Gt => BinaryOp::Gt,
        Punct::LtEq => BinaryOp::LtEq,
        Punct::GtEq => BinaryOp::GtEq,
        Punct::AndAnd => BinaryOp::And,
        Punct::OrOr => BinaryOp::Or,
        Punct::QuestionQuestion => BinaryOp::Coalesce,
        _ => return None,
    })
}

/// Relational binding power; `as` / `satisfies` bind at this level.
const ASSERTION_PRECEDENCE: u8 = 11;

impl Parser {
    fn new(source: &str, base: usize) -> Result<Self, SyntaxError> {
        let tokens = tokenize(source).map_err(|err| err.shifted(base))?;
        Ok(Parser {
            tokens,
            pos: 0,
            base,
            depth: 0,
        })
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        self.tokens
            .get(self.pos + ahead)
            .or_else(|| self.tokens.last())
            .map(|spanned| &spanned.token)
            .unwrap_or(&Token::Eof)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|spanned| spanned.offset)
            .unwrap_or(0)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.base + self.offset())
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        self.error(format!("expected {expected}, found {}", describe(self.peek())))
    }

    fn is_punct(&self, punct: Punct) -> bool {
        matches!(self.peek(), Token::Punct(p) if *p == punct)
    }

    fn is_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Token::Ident(name) if name == word)
    }

    fn eat(&mut self, punct: Punct) -> bool {
        if self.is_punct(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: Punct, what: &str) -> Result<(), SyntaxError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_eof(&self) -> Result<(), SyntaxError> {
        match self.peek() {
            Token::Eof => Ok(()),
            other => Err(self.error(format!("unexpected trailing {}", describe(other)))),
        }
    }

    fn ident_name(&mut self) -> Result<String, SyntaxError> {
        match self.peek() {
            Token::Ident(name) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn enter(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_assignment(&mut self) -> Result<Expr, SyntaxError> {
        self.enter()?;
        let result = if self.is_arrow_start() {
            self.parse_arrow()
        } else {
            self.parse_conditional()
        };
        self.depth -= 1;
        result
    }

    fn is_arrow_start(&self) -> bool {
        match self.peek() {
            Token::Ident(_) => matches!(self.peek_at(1), Token::Punct(Punct::Arrow)),
            Token::Punct(Punct::LParen) => {
                let mut depth = 0usize;
                let mut index = self.pos;
                while let Some(spanned) = self.tokens.get(index) {
                    match spanned.token {
                        Token::Punct(Punct::LParen | Punct::LBracket | Punct::LBrace) => depth += 1,
                        Token::Punct(Punct::RParen | Punct::RBracket | Punct::RBrace) => {
                            depth = depth.saturating_sub(1);
                            if depth == 0 {
                                return self.arrow_follows(index + 1);
                            }
                        }
                        Token::Eof => return false,
                        _ => {}
                    }
                    index += 1;
                }
                false
            }
            _ => false,
        }
    }

    /// True when the tokens at `index` are `=>` or a return annotation then `=>`.
    fn arrow_follows(&self, index: usize) -> bool {
        match self.tokens.get(index).map(|s| &s.token) {
            Some(Token::Punct(Punct::Arrow)) => true,
            Some(Token::Punct(Punct::Colon)) => self.tokens[index..]
                .iter()
                .take_while(|s| !matches!(s.token, Token::Punct(Punct::Comma | Punct::Semi) | Token::Eof))
                .any(|s| matches!(s.token, Token::Punct(Punct::Arrow))),
            _ => false,
        }
    }

    fn parse_arrow(&mut self) -> Result<Expr, SyntaxError> {
        let params = if let Token::Ident(_) = self.peek() {
            vec![Param {
                pattern: Pattern::Ident(self.ident_name()?),
                default: None,
                rest: false,
            }]
        } else {
            self.expect(Punct::LParen, "'('")?;
            let mut params = Vec::new();
            while !self.is_punct(Punct::RParen) {
                let rest = self.eat(Punct::Ellipsis);
                let pattern = self.parse_binding_pattern()?;
                self.eat(Punct::Question);
                if self.eat(Punct::Colon) {
                    self.skip_type()?;
                }
                let default = if self.eat(Punct::Eq) {
                    Some(self.parse_assignment()?)
                } else {
                    None
                };
                params.push(Param {
                    pattern,
                    default,
                    rest,
                });
                if !self.eat(Punct::Comma) {
                    break;
                }
            }
            self.expect(Punct::RParen, "')'")?;
            if self.eat(Punct::Colon) {
                self.skip_type()?;
            }
            params
        };
        self.expect(Punct::Arrow, "'=>'")?;
        let body = if self.is_punct(Punct::LBrace) {
            ArrowBody::Block(self.parse_block()?)
        } else {
            ArrowBody::Expr(Box::new(self.parse_assignment()?))
        };
        Ok(Expr::Arrow { params, body })
    }

    fn parse_conditional(&mut self) -> Result<Expr, SyntaxError> {
        let test = self.parse_binary(0)?;
        if !self.eat(Punct::Question) {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect(Punct::Colon, "':'")?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    /// Chains count against the nesting limit: every link adds a level to
    /// the tree that later passes recurse over.
    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expr, SyntaxError> {
        let mark = self.depth;
        let result = self.parse_binary_chain(min_precedence);
        self.depth = mark;
        result
    }

    fn parse_binary_chain(&mut self, min_precedence: u8) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_unary()?;
        loop {
            if (self.is_keyword("as") || self.is_keyword("satisfies"))
                && min_precedence <= ASSERTION_PRECEDENCE
            {
                self.pos += 1;
                self.skip_type()?;
                continue;
            }
            let Some(op) = binary_op(self.peek()) else {
                break;
            };
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.pos += 1;
            self.enter()?;
            let right = self.parse_binary(precedence + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek() {
            Token::Punct(Punct::Bang) => UnaryOp::Not,
            Token::Punct(Punct::Minus) => UnaryOp::Neg,
            Token::Punct(Punct::Plus) => UnaryOp::Plus,
            Token::Ident(name) if name == "typeof" => UnaryOp::TypeOf,
            _ => return self.parse_postfix(),
        };
        self.pos += 1;
        self.enter()?;
        let arg = self.parse_unary();
        self.depth -= 1;
        Ok(Expr::Unary {
            op,
            arg: Box::new(arg?),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mark = self.depth;
        let result = self.parse_postfix_chain();
        self.depth = mark;
        result
    }

    fn parse_postfix_chain(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Token::Punct(Punct::Dot) => {
                    self.pos += 1;
                    self.enter()?;
                    let name = self.ident_name()?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: MemberProp::Ident(name),
                        optional: false,
                    };
                }
                Token::Punct(Punct::QuestionDot) => {
                    self.pos += 1;
                    self.enter()?;
                    if self.eat(Punct::LParen) {
                        let args = self.parse_arguments()?;
                        expr = Expr::Call {
                            callee: Box::new(expr),
                            args,
                            optional: true,
                        };
                    } else if self.eat(Punct::LBracket) {
                        let key = self.parse_assignment()?;
                        self.expect(Punct::RBracket, "']'")?;
                        expr = Expr::Member {
                            object: Box::new(expr),
                            property: MemberProp::Computed(Box::new(key)),
                            optional: true,
                        };
                    } else {
                        let name = self.ident_name()?;
                        expr = Expr::Member {
                            object: Box::new(expr),
                            property: MemberProp::Ident(name),
                            optional: true,
                        };
                    }
                }
                Token::Punct(Punct::LBracket) => {
                    self.pos += 1;
                    self.enter()?;
                    let key = self.parse_assignment()?;
                    self.expect(Punct::RBracket, "']'")?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: MemberProp::Computed(Box::new(key)),
                        optional: false,
                    };
                }
                Token::Punct(Punct::LParen) => {
                    self.pos += 1;
                    self.enter()?;
                    let args = self.parse_arguments()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        optional: false,
                    };
                }
                // Non-null assertion.
                Token::Punct(Punct::Bang) => {
                    self.pos += 1;
                    self.enter()?;
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Arguments after an already consumed `(`.
    fn parse_arguments(&mut self) -> Result<Vec<Argument>, SyntaxError> {
        let mut args = Vec::new();
        while !self.is_punct(Punct::RParen) {
            if self.eat(Punct::Ellipsis) {
                args.push(Argument::Spread(self.parse_assignment()?));
            } else {
                args.push(Argument::Expr(self.parse_assignment()?));
            }
            if !self.eat(Punct::Comma) {
                break;
            }
        }
        self.expect(Punct::RParen, "')'")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let offset = self.offset();
        match self.advance() {
            Token::Number(raw) => Ok(Expr::Lit(Lit::Number(raw))),
            Token::Str(value) => Ok(Expr::Lit(Lit::Str(value))),
            Token::Template {
                quasis,
                substitutions,
            } => {
                let mut exprs = Vec::with_capacity(substitutions.len());
                for sub in substitutions {
                    let base = self.base + sub.offset;
                    let mut inner = Parser::new(&sub.source, base)?;
                    inner.depth = self.depth;
                    let expr = inner.parse_assignment()?;
                    inner.expect_eof()?;
                    exprs.push(expr);
                }
                Ok(Expr::Template { quasis, exprs })
            }
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Lit(Lit::Bool(true))),
                "false" => Ok(Expr::Lit(Lit::Bool(false))),
                "null" => Ok(Expr::Lit(Lit::Null)),
                "undefined" => Ok(Expr::Lit(Lit::Undefined)),
                "function" | "class" | "new" | "this" | "await" | "yield" => Err(SyntaxError::new(
                    format!("unsupported syntax '{name}'"),
                    self.base + offset,
                )),
                _ => Ok(Expr::Ident(name)),
            },
            Token::Punct(Punct::LParen) => {
                let expr = self.parse_assignment()?;
                self.expect(Punct::RParen, "')'")?;
                Ok(expr)
            }
            Token::Punct(Punct::LBracket) => self.parse_array(),
            Token::Punct(Punct::LBrace) => self.parse_object(),
            other => Err(SyntaxError::new(
                format!("unexpected {}", describe(&other)),
                self.base + offset,
            )),
        }
    }

    fn parse_array(&mut self) -> Result<Expr, SyntaxError> {
        let mut items = Vec::new();
        loop {
            if self.eat(Punct::RBracket) {
                return Ok(Expr::Array(items));
            }
            if self.eat(Punct::Comma) {
                items.push(ArrayItem::Hole);
                continue;
            }
            let item = if self.eat(Punct::Ellipsis) {
                ArrayItem::Spread(self.parse_assignment()?)
            } else {
                ArrayItem::Expr(self.parse_assignment()?)
            };
            items.push(item);
            if !self.eat(Punct::Comma) {
                self.expect(Punct::RBracket, "']'")?;
                return Ok(Expr::Array(items));
            }
        }
    }

    fn parse_object(&mut self) -> Result<Expr, SyntaxError> {
        let mut props = Vec::new();
        while !self.is_punct(Punct::RBrace) {
            if self.eat(Punct::Ellipsis) {
                props.push(Property::Spread(self.parse_assignment()?));
            } else {
                let key = self.parse_prop_key()?;
                if self.eat(Punct::Colon) {
                    let value = self.parse_assignment()?;
                    props.push(Property::KeyValue { key, value });
                } else {
                    match key {
                        PropKey::Ident(name) => props.push(Property::Shorthand(name)),
                        _ => return Err(self.unexpected("':'")),
                    }
                }
            }
            if !self.eat(Punct::Comma) {
                break;
            }
        }
        self.expect(Punct::RBrace, "'}'")?;
        Ok(Expr::Object(props))
    }

    fn parse_prop_key(&mut self) -> Result<PropKey, SyntaxError> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.pos += 1;
                Ok(PropKey::Ident(name))
            }
            Token::Str(value) => {
                self.pos += 1;
                Ok(PropKey::Str(value))
            }
            Token::Number(raw) => {
                self.pos += 1;
                Ok(PropKey::Number(raw))
            }
            Token::Punct(Punct::LBracket) => {
                self.pos += 1;
                let key = self.parse_assignment()?;
                self.expect(Punct::RBracket, "']'")?;
                Ok(PropKey::Computed(Box::new(key)))
            }
            _ => Err(self.unexpected("property key")),
        }
    }

    // ------------------------------------------------------------------
    // Patterns and statements
    // ------------------------------------------------------------------

    fn parse_binding_pattern(&mut self) -> Result<Pattern, SyntaxError> {
        self.enter()?;
        let result = self.parse_binding_pattern_inner();
        self.depth -= 1;
        result
    }

    fn parse_binding_pattern_inner(&mut self) -> Result<Pattern, SyntaxError> {
        if self.eat(Punct::LBrace) {
            let mut props = Vec::new();
            let mut rest = None;
            while !self.is_punct(Punct::RBrace) {
                if self.eat(Punct::Ellipsis) {
                    rest = Some(self.ident_name()?);
                    self.eat(Punct::Comma);
                    break;
                }
                let key = self.parse_prop_key()?;
                let value = if self.eat(Punct::Colon) {
                    self.parse_binding_pattern()?
                } else {
                    match &key {
                        PropKey::Ident(name) => Pattern::Ident(name.clone()),
                        _ => return Err(self.unexpected("':'")),
                    }
                };
                let default = if self.eat(Punct::Eq) {
                    Some(self.parse_assignment()?)
                } else {
                    None
                };
                props.push(ObjectPatternProp {
                    key,
                    value,
                    default,
                });
                if !self.eat(Punct::Comma) {
                    break;
                }
            }
            self.expect(Punct::RBrace, "'}'")?;
            return Ok(Pattern::Object { props, rest });
        }
        if self.eat(Punct::LBracket) {
            let mut elems = Vec::new();
            let mut rest = None;
            loop {
                if self.is_punct(Punct::RBracket) {
                    break;
                }
                if self.eat(Punct::Comma) {
                    elems.push(None);
                    continue;
                }
                if self.eat(Punct::Ellipsis) {
                    rest = Some(Box::new(self.parse_binding_pattern()?));
                    break;
                }
                let pattern = self.parse_binding_pattern()?;
                let default = if self.eat(Punct::Eq) {
                    Some(self.parse_assignment()?)
                } else {
                    None
                };
                elems.push(Some(ArrayPatternElem { pattern, default }));
                if !self.eat(Punct::Comma) {
                    break;
                }
            }
            self.expect(Punct::RBracket, "']'")?;
            return Ok(Pattern::Array { elems, rest });
        }
        Ok(Pattern::Ident(self.ident_name()?))
    }

    /// Block body after `=>`; the current token is `{`.
    fn parse_block(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        self.expect(Punct::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        loop {
            if self.eat(Punct::RBrace) {
                return Ok(stmts);
            }
            if self.eat(Punct::Semi) {
                continue;
            }
            if matches!(self.peek(), Token::Eof) {
                return Err(self.unexpected("'}'"));
            }
            stmts.push(self.parse_statement()?);
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let kind = if self.is_keyword("const") {
            Some(DeclKind::Const)
        } else if self.is_keyword("let") {
            Some(DeclKind::Let)
        } else {
            None
        };
        if let Some(kind) = kind {
            self.pos += 1;
            let mut declarators = Vec::new();
            loop {
                let pattern = self.parse_binding_pattern()?;
                if self.eat(Punct::Colon) {
                    self.skip_type()?;
                }
                let init = if self.eat(Punct::Eq) {
                    Some(self.parse_assignment()?)
                } else {
                    None
                };
                declarators.push(Declarator { pattern, init });
                if !self.eat(Punct::Comma) {
                    break;
                }
            }
            self.eat(Punct::Semi);
            return Ok(Stmt::Decl { kind, declarators });
        }
        if self.is_keyword("return") {
            self.pos += 1;
            let value = if self.is_punct(Punct::Semi) || self.is_punct(Punct::RBrace) {
                None
            } else {
                Some(self.parse_assignment()?)
            };
            self.eat(Punct::Semi);
            return Ok(Stmt::Return(value));
        }
        let expr = self.parse_assignment()?;
        self.eat(Punct::Semi);
        Ok(Stmt::Expr(expr))
    }

    // ------------------------------------------------------------------
    // Types (skipped)
    // ------------------------------------------------------------------

    /// Consumes a type annotation without building anything.
    fn skip_type(&mut self) -> Result<(), SyntaxError> {
        let mut expect_operand = true;
        loop {
            match self.peek() {
                Token::Ident(word) if expect_operand => {
                    let prefix = matches!(word.as_str(), "keyof" | "typeof" | "readonly" | "unique");
                    self.pos += 1;
                    expect_operand = prefix;
                }
                Token::Str(_) | Token::Number(_) if expect_operand => {
                    self.pos += 1;
                    expect_operand = false;
                }
                Token::Punct(Punct::Pipe | Punct::Amp) => {
                    self.pos += 1;
                    expect_operand = true;
                }
                Token::Punct(Punct::Dot) if !expect_operand => {
                    self.pos += 1;
                    expect_operand = true;
                }
                Token::Punct(Punct::LBracket) => {
                    self.skip_balanced(Punct::LBracket, Punct::RBracket)?;
                    expect_operand = false;
                }
                Token::Punct(Punct::LBrace) if expect_operand => {
                    self.skip_balanced(Punct::LBrace, Punct::RBrace)?;
                    expect_operand = false;
                }
                Token::Punct(Punct::LParen) if expect_operand => {
                    self.skip_balanced(Punct::LParen, Punct::RParen)?;
                    if self.eat(Punct::Arrow) {
                        expect_operand = true;
                    } else {
                        expect_operand = false;
                    }
                }
                Token::Punct(Punct::Lt) if !expect_operand => {
                    self.skip_balanced(Punct::Lt, Punct::Gt)?;
                }
                _ => {
                    if expect_operand {
                        return Err(self.unexpected("type"));
                    }
                    return Ok(());
                }
            }
        }
    }

    fn skip_balanced(&mut self, open: Punct, close: Punct) -> Result<(), SyntaxError> {
        let mut depth = 0usize;
        loop {
            match self.advance() {
                Token::Punct(p) if p == open => depth += 1,
                Token::Punct(p) if p == close => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Token::Eof => return Err(self.error("unterminated type")),
                _ => {}
            }
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(name) => format!("identifier '{name}'"),
        Token::Number(raw) => format!("number {raw}"),
        Token::Str(_) => "string literal".to_string(),
        Token::Template { .. } => "template literal".to_string(),
        Token::Punct(p) => format!("{p:?}"),
        Token::Eof => "end of input".to_string(),
    }
}
