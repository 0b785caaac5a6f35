//! Canonical printer.
//!
//! Output is a pure function of the AST: two-space indentation, double-quoted
//! strings, parenthesized arrow parameters, and trailing commas on broken
//! objects and arrays. A literal breaks across lines when its single-line
//! form would pass [`MAX_WIDTH`] columns at the current indentation or when
//! one of its members is already multi-line.

use super::ast::*;

pub const MAX_WIDTH: usize = 80;

const ASSIGNMENT: u8 = 1;
const CONDITIONAL: u8 = 2;
const UNARY: u8 = 15;
const POSTFIX: u8 = 17;
const PRIMARY: u8 = 20;

/// Prints `expr` starting at column zero.
pub fn print_expression(expr: &Expr) -> String {
    print_expression_at(expr, 0)
}

/// Prints `expr` as if it started on a line indented by `indent` spaces;
/// continuation lines are indented relative to it.
pub fn print_expression_at(expr: &Expr, indent: usize) -> String {
    expression(expr, indent)
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Arrow { .. } => ASSIGNMENT,
        Expr::Conditional { .. } => CONDITIONAL,
        Expr::Binary { op, .. } => op.precedence(),
        Expr::Unary { .. } => UNARY,
        Expr::Call { .. } | Expr::Member { .. } => POSTFIX,
        _ => PRIMARY,
    }
}

fn child(expr: &Expr, min: u8, indent: usize) -> String {
    let printed = expression(expr, indent);
    if precedence(expr) < min {
        format!("({printed})")
    } else {
        printed
    }
}

fn expression(expr: &Expr, indent: usize) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Lit(lit) => literal(lit),
        Expr::Template { quasis, exprs } => {
            let mut out = String::from("`");
            for (i, quasi) in quasis.iter().enumerate() {
                out.push_str(&escape_template(quasi));
                if let Some(expr) = exprs.get(i) {
                    out.push_str("${");
                    out.push_str(&expression(expr, indent));
                    out.push('}');
                }
            }
            out.push('`');
            out
        }
        Expr::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item {
                    ArrayItem::Expr(expr) => child(expr, ASSIGNMENT, indent + 2),
                    ArrayItem::Spread(expr) => format!("...{}", child(expr, ASSIGNMENT, indent + 2)),
                    ArrayItem::Hole => String::new(),
                })
                .collect();
            // A trailing hole needs its comma even on one line.
            let trailing_hole = matches!(items.last(), Some(ArrayItem::Hole));
            bracketed("[", "]", &parts, indent, false, trailing_hole)
        }
        Expr::Object(props) => {
            let parts: Vec<String> = props
                .iter()
                .map(|prop| match prop {
                    Property::KeyValue { key, value } => format!(
                        "{}: {}",
                        prop_key(key, indent + 2),
                        child(value, ASSIGNMENT, indent + 2)
                    ),
                    Property::Shorthand(name) => name.clone(),
                    Property::Spread(expr) => format!("...{}", child(expr, ASSIGNMENT, indent + 2)),
                })
                .collect();
            bracketed("{", "}", &parts, indent, true, false)
        }
        Expr::Member {
            object,
            property,
            optional,
        } => {
            let object_text = match object.as_ref() {
                Expr::Lit(Lit::Number(_)) => format!("({})", expression(object, indent)),
                other => child(other, POSTFIX, indent),
            };
            match property {
                MemberProp::Ident(name) if *optional => format!("{object_text}?.{name}"),
                MemberProp::Ident(name) => format!("{object_text}.{name}"),
                MemberProp::Computed(key) if *optional => {
                    format!("{object_text}?.[{}]", expression(key, indent))
                }
                MemberProp::Computed(key) => format!("{object_text}[{}]", expression(key, indent)),
            }
        }
        Expr::Call {
            callee,
            args,
            optional,
        } => {
            let callee_text = child(callee, POSTFIX, indent);
            let args_text: Vec<String> = args
                .iter()
                .map(|arg| match arg {
                    Argument::Expr(expr) => child(expr, ASSIGNMENT, indent),
                    Argument::Spread(expr) => format!("...{}", child(expr, ASSIGNMENT, indent)),
                })
                .collect();
            let open = if *optional { "?.(" } else { "(" };
            format!("{callee_text}{open}{})", args_text.join(", "))
        }
        Expr::Arrow { params, body } => {
            let params_text: Vec<String> = params.iter().map(|p| param(p, indent)).collect();
            let body_text = match body {
                ArrowBody::Expr(expr) => match expr.as_ref() {
                    Expr::Object(_) => format!("({})", expression(expr, indent)),
                    other => child(other, ASSIGNMENT, indent),
                },
                ArrowBody::Block(stmts) => block(stmts, indent),
            };
            format!("({}) => {body_text}", params_text.join(", "))
        }
        Expr::Unary { op, arg } => {
            let arg_text = child(arg, UNARY, indent);
            match op {
                UnaryOp::Not => format!("!{arg_text}"),
                UnaryOp::TypeOf => format!("typeof {arg_text}"),
                UnaryOp::Neg if arg_text.starts_with('-') => format!("- {arg_text}"),
                UnaryOp::Neg => format!("-{arg_text}"),
                UnaryOp::Plus if arg_text.starts_with('+') => format!("+ {arg_text}"),
                UnaryOp::Plus => format!("+{arg_text}"),
            }
        }
        Expr::Binary { op, left, right } => {
            let p = op.precedence();
            let left_text = binary_operand(*op, left, p, indent);
            let right_text = binary_operand(*op, right, p + 1, indent);
            format!("{left_text} {} {right_text}", op.as_str())
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => format!(
            "{} ? {} : {}",
            child(test, CONDITIONAL + 1, indent),
            child(consequent, ASSIGNMENT, indent),
            child(alternate, ASSIGNMENT, indent)
        ),
    }
}

/// `??` cannot mix with `&&` / `||` without parentheses.
fn binary_operand(op: BinaryOp, operand: &Expr, min: u8, indent: usize) -> String {
    let mixes = match operand {
        Expr::Binary { op: inner, .. } => {
            let logical = |o: BinaryOp| matches!(o, BinaryOp::And | BinaryOp::Or);
            (op == BinaryOp::Coalesce && logical(*inner))
                || (logical(op) && *inner == BinaryOp::Coalesce)
        }
        _ => false,
    };
    if mixes {
        format!("({})", expression(operand, indent))
    } else {
        child(operand, min, indent)
    }
}

fn bracketed(
    open: &str,
    close: &str,
    parts: &[String],
    indent: usize,
    padded: bool,
    trailing_hole: bool,
) -> String {
    if parts.is_empty() {
        return format!("{open}{close}");
    }
    let mut single = parts.join(", ");
    if trailing_hole {
        single.push(',');
    }
    let single = if padded {
        format!("{open} {single} {close}")
    } else {
        format!("{open}{single}{close}")
    };
    if !single.contains('\n') && indent + single.len() <= MAX_WIDTH {
        return single;
    }
    let pad = " ".repeat(indent + 2);
    let mut out = format!("{open}\n");
    for part in parts {
        out.push_str(&pad);
        out.push_str(part);
        out.push_str(",\n");
    }
    out.push_str(&" ".repeat(indent));
    out.push_str(close);
    out
}

fn block(stmts: &[Stmt], indent: usize) -> String {
    if stmts.is_empty() {
        return "{}".to_string();
    }
    let inner = indent + 2;
    let pad = " ".repeat(inner);
    let mut out = String::from("{\n");
    for stmt in stmts {
        out.push_str(&pad);
        out.push_str(&statement(stmt, inner));
        out.push('\n');
    }
    out.push_str(&" ".repeat(indent));
    out.push('}');
    out
}

fn statement(stmt: &Stmt, indent: usize) -> String {
    match stmt {
        Stmt::Decl { kind, declarators } => {
            let keyword = match kind {
                DeclKind::Const => "const",
                DeclKind::Let => "let",
            };
            let parts: Vec<String> = declarators
                .iter()
                .map(|decl| match &decl.init {
                    Some(init) => format!(
                        "{} = {}",
                        pattern(&decl.pattern, indent),
                        child(init, ASSIGNMENT, indent)
                    ),
                    None => pattern(&decl.pattern, indent),
                })
                .collect();
            format!("{keyword} {};", parts.join(", "))
        }
        Stmt::Return(Some(expr)) => format!("return {};", expression(expr, indent)),
        Stmt::Return(None) => "return;".to_string(),
        Stmt::Expr(expr) => match expr {
            Expr::Object(_) | Expr::Arrow { .. } => format!("({});", expression(expr, indent)),
            other => format!("{};", expression(other, indent)),
        },
    }
}

fn param(param: &Param, indent: usize) -> String {
    let mut out = String::new();
    if param.rest {
        out.push_str("...");
    }
    out.push_str(&pattern(&param.pattern, indent));
    if let Some(default) = &param.default {
        out.push_str(" = ");
        out.push_str(&child(default, ASSIGNMENT, indent));
    }
    out
}

fn pattern(pattern_node: &Pattern, indent: usize) -> String {
    match pattern_node {
        Pattern::Ident(name) => name.clone(),
        Pattern::Object { props, rest } => {
            let mut parts: Vec<String> = props
                .iter()
                .map(|prop| {
                    let mut text = match (&prop.key, &prop.value) {
                        (PropKey::Ident(key), Pattern::Ident(value)) if key == value => key.clone(),
                        (key, value) => {
                            format!("{}: {}", prop_key(key, indent), pattern(value, indent))
                        }
                    };
                    if let Some(default) = &prop.default {
                        text.push_str(" = ");
                        text.push_str(&child(default, ASSIGNMENT, indent));
                    }
                    text
                })
                .collect();
            if let Some(rest) = rest {
                parts.push(format!("...{rest}"));
            }
            if parts.is_empty() {
                "{}".to_string()
            } else {
                format!("{{ {} }}", parts.join(", "))
            }
        }
        Pattern::Array { elems, rest } => {
            let mut parts: Vec<String> = elems
                .iter()
                .map(|elem| match elem {
                    Some(elem) => match &elem.default {
                        Some(default) => format!(
                            "{} = {}",
                            pattern(&elem.pattern, indent),
                            child(default, ASSIGNMENT, indent)
                        ),
                        None => pattern(&elem.pattern, indent),
                    },
                    None => String::new(),
                })
                .collect();
            if let Some(rest) = rest {
                parts.push(format!("...{}", pattern(rest, indent)));
            }
            let trailing_hole = rest.is_none() && matches!(elems.last(), Some(None));
            let mut text = parts.join(", ");
            if trailing_hole {
                text.push(',');
            }
            format!("[{text}]")
        }
    }
}

fn prop_key(key: &PropKey, indent: usize) -> String {
    match key {
        PropKey::Ident(name) => name.clone(),
        PropKey::Str(value) => quote(value),
        PropKey::Number(raw) => raw.clone(),
        PropKey::Computed(expr) => format!("[{}]", expression(expr, indent)),
    }
}

fn literal(lit: &Lit) -> String {
    match lit {
        Lit::Undefined => "undefined".to_string(),
        Lit::Null => "null".to_string(),
        Lit::Bool(value) => value.to_string(),
        Lit::Number(raw) => raw.clone(),
        Lit::Str(value) => quote(value),
    }
}

/// Double-quoted string literal.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn escape_template(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '`' => out.push_str("\\`"),
            '\\' => out.push_str("\\\\"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_expression;

    fn reprint(source: &str) -> String {
        print_expression(&parse_expression(source).unwrap())
    }

    #[test]
    fn canonicalizes_spacing_and_quotes() {
        assert_eq!(reprint("gql.default(({fragment})=>fragment.User({}))"), "gql.default(({ fragment }) => fragment.User({}))");
        assert_eq!(reprint("'a\"b'"), r#""a\"b""#);
        assert_eq!(reprint("x=>x"), "(x) => x");
    }

    #[test]
    fn keeps_required_parentheses() {
        assert_eq!(reprint("(a + b) * c"), "(a + b) * c");
        assert_eq!(reprint("a + (b * c)"), "a + b * c");
        assert_eq!(reprint("a - (b - c)"), "a - (b - c)");
        assert_eq!(reprint("(a || b) ?? c"), "(a || b) ?? c");
        assert_eq!(reprint("(() => 1)()"), "(() => 1)()");
        assert_eq!(reprint("() => ({ a: 1 })"), "() => ({ a: 1 })");
        assert_eq!(reprint("-(-a)"), "- -a");
        assert_eq!(reprint("(a ? b : c).d"), "(a ? b : c).d");
    }

    #[test]
    fn breaks_long_objects() {
        let printed = reprint(
            "query.operation({ name: \"ProfilePageQuery\", variables: {}, fields: ({ f }) => ({ ...f.user() }) })",
        );
        insta::assert_snapshot!(printed, @r###"
        query.operation({
          name: "ProfilePageQuery",
          variables: {},
          fields: ({ f }) => ({ ...f.user() }),
        })
        "###);
    }

    #[test]
    fn prints_block_bodies() {
        let printed = reprint("(x) => { const { a, b: c = 1 } = x; return [a, c]; }");
        assert_eq!(printed, "(x) => {\n  const { a, b: c = 1 } = x;\n  return [a, c];\n}");
    }

    #[test]
    fn nested_indentation_follows_start_column() {
        let expr = parse_expression(
            "{ alpha: \"aaaaaaaaaaaaaaaaaaaaaaaa\", beta: \"bbbbbbbbbbbbbbbbbbbbbbbbbbbb\", gamma: [1, 2] }",
        )
        .unwrap();
        let printed = print_expression_at(&expr, 4);
        assert_eq!(
            printed,
            "{\n      alpha: \"aaaaaaaaaaaaaaaaaaaaaaaa\",\n      beta: \"bbbbbbbbbbbbbbbbbbbbbbbbbbbb\",\n      gamma: [1, 2],\n    }"
        );
    }

    #[test]
    fn templates_and_optional_chains() {
        assert_eq!(reprint("`a${b}c\\``"), "`a${b}c\\``");
        assert_eq!(reprint("a?.b?.[\"c\"]?.(d)"), "a?.b?.[\"c\"]?.(d)");
        assert_eq!(reprint("[a, , ...b]"), "[a, , ...b]");
        assert_eq!(reprint("[a, ,]"), "[a, ,]");
    }

    #[test]
    fn printing_is_a_fixed_point() {
        let sources = [
            "gql.default(({ query }) => query.operation({ name: \"Q\", variables: { id: 1 } }))",
            "(a, { b = 2, ...rest }, [c, , d] = []) => { let e; return typeof a === \"string\" ? b : c ?? d; }",
            "{ \"quoted key\": 1, [computed]: !x, 2: y, ...z }",
        ];
        for source in sources {
            let once = reprint(source);
            assert_eq!(reprint(&once), once, "not stable: {source}");
        }
    }
}
