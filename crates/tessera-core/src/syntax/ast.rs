//! Expression AST.

#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Undefined,
    Null,
    Bool(bool),
    /// Raw source text; the value is derived on demand.
    Number(String),
    Str(String),
}

impl Lit {
    /// Numeric value of a number literal (`NaN` for malformed text).
    pub fn number_value(raw: &str) -> f64 {
        let cleaned: String = raw.chars().filter(|c| *c != '_').collect();
        let lower = cleaned.to_ascii_lowercase();
        let radix = if lower.starts_with("0x") {
            Some(16)
        } else if lower.starts_with("0o") {
            Some(8)
        } else if lower.starts_with("0b") {
            Some(2)
        } else {
            None
        };
        match radix {
            Some(radix) => u64::from_str_radix(&lower[2..], radix)
                .map(|v| v as f64)
                .unwrap_or(f64::NAN),
            None => cleaned.parse::<f64>().unwrap_or(f64::NAN),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
    Coalesce,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::LtEq => "<=",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Coalesce => "??",
        }
    }

    /// Binding power; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Coalesce => 4,
            BinaryOp::Or => 5,
            BinaryOp::And => 6,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq => 10,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq => 11,
            BinaryOp::Add | BinaryOp::Sub => 13,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 14,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberProp {
    Ident(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropKey {
    Ident(String),
    Str(String),
    Number(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    KeyValue { key: PropKey, value: Expr },
    Shorthand(String),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayItem {
    Expr(Expr),
    Spread(Expr),
    Hole,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Expr(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPatternProp {
    pub key: PropKey,
    pub value: Pattern,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayPatternElem {
    pub pattern: Pattern,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Ident(String),
    Object {
        props: Vec<ObjectPatternProp>,
        rest: Option<String>,
    },
    Array {
        elems: Vec<Option<ArrayPatternElem>>,
        rest: Option<Box<Pattern>>,
    },
}

impl Pattern {
    /// Every name this pattern binds, in source order.
    pub fn bound_names(&self, out: &mut Vec<String>) {
        match self {
            Pattern::Ident(name) => out.push(name.clone()),
            Pattern::Object { props, rest } => {
                for prop in props {
                    prop.value.bound_names(out);
                }
                if let Some(rest) = rest {
                    out.push(rest.clone());
                }
            }
            Pattern::Array { elems, rest } => {
                for elem in elems.iter().flatten() {
                    elem.pattern.bound_names(out);
                }
                if let Some(rest) = rest {
                    rest.bound_names(out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub pattern: Pattern,
    pub default: Option<Expr>,
    pub rest: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Const,
    Let,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub pattern: Pattern,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Decl {
        kind: DeclKind,
        declarators: Vec<Declarator>,
    },
    Return(Option<Expr>),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrowBody {
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    Lit(Lit),
    Template {
        quasis: Vec<String>,
        exprs: Vec<Expr>,
    },
    Array(Vec<ArrayItem>),
    Object(Vec<Property>),
    Member {
        object: Box<Expr>,
        property: MemberProp,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Argument>,
        optional: bool,
    },
    Arrow {
        params: Vec<Param>,
        body: ArrowBody,
    },
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
}

impl Expr {
    pub fn ident(name: &str) -> Expr {
        Expr::Ident(name.to_string())
    }

    pub fn string(value: &str) -> Expr {
        Expr::Lit(Lit::Str(value.to_string()))
    }

    /// `object[key]` with a string key.
    pub fn index(object: Expr, key: &str) -> Expr {
        Expr::Member {
            object: Box::new(object),
            property: MemberProp::Computed(Box::new(Expr::string(key))),
            optional: false,
        }
    }

    /// `object.name`.
    pub fn member(object: Expr, name: &str) -> Expr {
        Expr::Member {
            object: Box::new(object),
            property: MemberProp::Ident(name.to_string()),
            optional: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_values() {
        assert_eq!(Lit::number_value("1_000"), 1000.0);
        assert_eq!(Lit::number_value("0xff"), 255.0);
        assert_eq!(Lit::number_value("0b101"), 5.0);
        assert_eq!(Lit::number_value(".5"), 0.5);
        assert!(Lit::number_value("0xzz").is_nan());
    }

    #[test]
    fn bound_names_walk_nested_patterns() {
        let pattern = Pattern::Object {
            props: vec![
                ObjectPatternProp {
                    key: PropKey::Ident("a".into()),
                    value: Pattern::Ident("a".into()),
                    default: None,
                },
                ObjectPatternProp {
                    key: PropKey::Ident("b".into()),
                    value: Pattern::Array {
                        elems: vec![
                            Some(ArrayPatternElem {
                                pattern: Pattern::Ident("c".into()),
                                default: None,
                            }),
                            None,
                        ],
                        rest: Some(Box::new(Pattern::Ident("d".into()))),
                    },
                    default: None,
                },
            ],
            rest: Some("e".into()),
        };
        let mut names = Vec::new();
        pattern.bound_names(&mut names);
        assert_eq!(names, vec!["a", "c", "d", "e"]);
    }
}
