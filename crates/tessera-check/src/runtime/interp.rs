//! Tree-walking evaluator for definition expressions.
//!
//! Expressions are evaluated directly from the AST against an [`Env`].
//! Arrow functions close over their defining scope; host objects supply the
//! DSL surface. Nesting of closure calls is bounded by
//! [`InterpreterConfig::max_call_depth`].

use std::rc::Rc;

use indexmap::IndexMap;
use tessera_core::syntax::ast::{
    Argument, ArrayItem, ArrowBody, BinaryOp, Expr, Lit, MemberProp, Pattern, PropKey, Property,
    Stmt, UnaryOp,
};
use tessera_core::syntax::print_expression;

use super::error::RuntimeError;
use super::value::{format_number, Closure, Env, Invoker, Value};

/// Configuration for the interpreter.
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Maximum nesting of function calls before evaluation is aborted.
    pub max_call_depth: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            max_call_depth: 256,
        }
    }
}

#[derive(Debug)]
pub struct Interpreter {
    config: InterpreterConfig,
    depth: usize,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Self {
        Interpreter { config, depth: 0 }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Evaluates `expr` in `env`.
    pub fn eval(&mut self, expr: &Expr, env: &Env) -> Result<Value, RuntimeError> {
        Ok(self.eval_chain(expr, env)?.unwrap_or_default())
    }

    /// Calls a function value with already evaluated arguments.
    pub fn call(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        self.call_value(callee, args, || callee.type_of().to_string())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Member and call chains; `None` means an optional link short-circuited.
    fn eval_chain(&mut self, expr: &Expr, env: &Env) -> Result<Option<Value>, RuntimeError> {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let Some(base) = self.eval_chain(object, env)? else {
                    return Ok(None);
                };
                if *optional && base.is_nullish() {
                    return Ok(None);
                }
                let key = match property {
                    MemberProp::Ident(name) => name.clone(),
                    MemberProp::Computed(key) => {
                        let key = self.eval(key, env)?;
                        property_key(&key)
                    }
                };
                self.get_member(&base, &key).map(Some)
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => {
                let Some(function) = self.eval_chain(callee, env)? else {
                    return Ok(None);
                };
                if *optional && function.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_args(args, env)?;
                self.call_value(&function, args, || print_expression(callee))
                    .map(Some)
            }
            other => self.eval_expr(other, env).map(Some),
        }
    }

    fn eval_expr(&mut self, expr: &Expr, env: &Env) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Ident(name) => lookup(env, name),
            Expr::Lit(lit) => Ok(match lit {
                Lit::Undefined => Value::Undefined,
                Lit::Null => Value::Null,
                Lit::Bool(b) => Value::Bool(*b),
                Lit::Number(raw) => Value::Number(Lit::number_value(raw)),
                Lit::Str(s) => Value::string(s),
            }),
            Expr::Template { quasis, exprs } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(expr) = exprs.get(i) {
                        out.push_str(&self.eval(expr, env)?.to_display_string());
                    }
                }
                Ok(Value::string(out))
            }
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        ArrayItem::Expr(expr) => values.push(self.eval(expr, env)?),
                        ArrayItem::Spread(expr) => {
                            let spread = self.eval(expr, env)?;
                            values.extend(iterate(&spread)?);
                        }
                        ArrayItem::Hole => values.push(Value::Undefined),
                    }
                }
                Ok(Value::Array(Rc::new(values)))
            }
            Expr::Object(props) => self.eval_object(props, env),
            Expr::Member { .. } | Expr::Call { .. } => self.eval(expr, env),
            Expr::Arrow { params, body } => Ok(Value::Function(Rc::new(Closure {
                params: params.clone(),
                body: body.clone(),
                env: env.clone(),
            }))),
            Expr::Unary { op, arg } => self.eval_unary(*op, arg, env),
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right, env),
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, env)?.truthy() {
                    self.eval(consequent, env)
                } else {
                    self.eval(alternate, env)
                }
            }
        }
    }

    fn eval_object(&mut self, props: &[Property], env: &Env) -> Result<Value, RuntimeError> {
        let mut entries = IndexMap::with_capacity(props.len());
        for prop in props {
            match prop {
                Property::KeyValue { key, value } => {
                    let key = self.prop_key(key, env)?;
                    let value = self.eval(value, env)?;
                    entries.insert(key, value);
                }
                Property::Shorthand(name) => {
                    entries.insert(name.clone(), lookup(env, name)?);
                }
                Property::Spread(expr) => match self.eval(expr, env)? {
                    Value::Object(source) => {
                        for (key, value) in source.iter() {
                            entries.insert(key.clone(), value.clone());
                        }
                    }
                    value @ (Value::Array(_) | Value::String(_)) => {
                        for (i, item) in iterate(&value)?.into_iter().enumerate() {
                            entries.insert(i.to_string(), item);
                        }
                    }
                    // Spreading any other value contributes nothing.
                    _ => {}
                },
            }
        }
        Ok(Value::object(entries))
    }

    fn eval_unary(&mut self, op: UnaryOp, arg: &Expr, env: &Env) -> Result<Value, RuntimeError> {
        if op == UnaryOp::TypeOf {
            if let Expr::Ident(name) = arg {
                if env.lookup(name).is_none() && builtin(name).is_none() {
                    return Ok(Value::string("undefined"));
                }
            }
        }
        let value = self.eval(arg, env)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.truthy()),
            UnaryOp::Neg => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
            UnaryOp::TypeOf => Value::string(value.type_of()),
        })
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        env: &Env,
    ) -> Result<Value, RuntimeError> {
        let lhs = self.eval(left, env)?;
        match op {
            BinaryOp::And if !lhs.truthy() => return Ok(lhs),
            BinaryOp::Or if lhs.truthy() => return Ok(lhs),
            BinaryOp::Coalesce if !lhs.is_nullish() => return Ok(lhs),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => return self.eval(right, env),
            _ => {}
        }
        let rhs = self.eval(right, env)?;
        Ok(match op {
            BinaryOp::Add => {
                if concatenates(&lhs) || concatenates(&rhs) {
                    let mut out = lhs.to_display_string();
                    out.push_str(&rhs.to_display_string());
                    Value::string(out)
                } else {
                    Value::Number(lhs.to_number() + rhs.to_number())
                }
            }
            BinaryOp::Sub => Value::Number(lhs.to_number() - rhs.to_number()),
            BinaryOp::Mul => Value::Number(lhs.to_number() * rhs.to_number()),
            BinaryOp::Div => Value::Number(lhs.to_number() / rhs.to_number()),
            BinaryOp::Rem => Value::Number(lhs.to_number() % rhs.to_number()),
            BinaryOp::Eq => Value::Bool(lhs.loose_equals(&rhs)),
            BinaryOp::NotEq => Value::Bool(!lhs.loose_equals(&rhs)),
            BinaryOp::StrictEq => Value::Bool(lhs.strict_equals(&rhs)),
            BinaryOp::StrictNotEq => Value::Bool(!lhs.strict_equals(&rhs)),
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq => {
                Value::Bool(compare(op, &lhs, &rhs))
            }
            BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => {
                return Err(RuntimeError::Internal {
                    message: "logical operator reached arithmetic path".to_string(),
                })
            }
        })
    }

    fn eval_args(&mut self, args: &[Argument], env: &Env) -> Result<Vec<Value>, RuntimeError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Argument::Expr(expr) => values.push(self.eval(expr, env)?),
                Argument::Spread(expr) => {
                    let spread = self.eval(expr, env)?;
                    values.extend(iterate(&spread)?);
                }
            }
        }
        Ok(values)
    }

    fn prop_key(&mut self, key: &PropKey, env: &Env) -> Result<String, RuntimeError> {
        Ok(match key {
            PropKey::Ident(name) | PropKey::Str(name) => name.clone(),
            PropKey::Number(raw) => format_number(Lit::number_value(raw)),
            PropKey::Computed(expr) => property_key(&self.eval(expr, env)?),
        })
    }

    /// Reads `key` from `base`.
    pub fn get_member(&mut self, base: &Value, key: &str) -> Result<Value, RuntimeError> {
        match base {
            Value::Undefined | Value::Null => Err(RuntimeError::PropertyOfNullish {
                property: key.to_string(),
                base: base.to_display_string(),
            }),
            Value::Object(entries) => Ok(entries.get(key).cloned().unwrap_or_default()),
            Value::Array(items) => Ok(if key == "length" {
                Value::Number(items.len() as f64)
            } else {
                key.parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or_default()
            }),
            Value::String(s) => Ok(if key == "length" {
                Value::Number(s.chars().count() as f64)
            } else {
                key.parse::<usize>()
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::string(c.to_string()))
                    .unwrap_or_default()
            }),
            Value::Host(host) => host.get(key),
            Value::Element(element) => Ok(element
                .property(key)
                .map(Value::string)
                .unwrap_or_default()),
            Value::Bool(_) | Value::Number(_) | Value::Function(_) => Ok(Value::Undefined),
        }
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    fn call_value(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        describe: impl FnOnce() -> String,
    ) -> Result<Value, RuntimeError> {
        match callee {
            Value::Function(closure) => self.call_closure(closure, args),
            Value::Host(host) if host.is_callable() => {
                let host = Rc::clone(host);
                host.call(args, self)
            }
            _ => Err(RuntimeError::NotCallable {
                description: describe(),
            }),
        }
    }

    fn call_closure(&mut self, closure: &Rc<Closure>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        if self.depth >= self.config.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded {
                limit: self.config.max_call_depth,
            });
        }
        self.depth += 1;
        let result = self.run_closure(closure, args);
        self.depth -= 1;
        result
    }

    fn run_closure(&mut self, closure: &Closure, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let scope = closure.env.child();
        for (i, param) in closure.params.iter().enumerate() {
            if param.rest {
                let rest = args.get(i..).map(<[Value]>::to_vec).unwrap_or_default();
                self.bind_pattern(&param.pattern, Value::Array(Rc::new(rest)), &scope)?;
                break;
            }
            let mut value = args.get(i).cloned().unwrap_or_default();
            if matches!(value, Value::Undefined) {
                if let Some(default) = &param.default {
                    value = self.eval(default, &scope)?;
                }
            }
            self.bind_pattern(&param.pattern, value, &scope)?;
        }
        match &closure.body {
            ArrowBody::Expr(expr) => self.eval(expr, &scope),
            ArrowBody::Block(stmts) => self.exec_block(stmts, &scope),
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt], env: &Env) -> Result<Value, RuntimeError> {
        for stmt in stmts {
            match stmt {
                Stmt::Decl { declarators, .. } => {
                    for declarator in declarators {
                        let value = match &declarator.init {
                            Some(init) => self.eval(init, env)?,
                            None => Value::Undefined,
                        };
                        self.bind_pattern(&declarator.pattern, value, env)?;
                    }
                }
                Stmt::Return(expr) => {
                    return match expr {
                        Some(expr) => self.eval(expr, env),
                        None => Ok(Value::Undefined),
                    }
                }
                Stmt::Expr(expr) => {
                    self.eval(expr, env)?;
                }
            }
        }
        Ok(Value::Undefined)
    }

    fn bind_pattern(&mut self, pattern: &Pattern, value: Value, env: &Env) -> Result<(), RuntimeError> {
        match pattern {
            Pattern::Ident(name) => {
                env.define(name.clone(), value);
                Ok(())
            }
            Pattern::Object { props, rest } => {
                if value.is_nullish() {
                    return Err(RuntimeError::type_error(format!(
                        "cannot destructure {}",
                        value.to_display_string()
                    )));
                }
                let mut used = Vec::with_capacity(props.len());
                for prop in props {
                    let key = self.prop_key(&prop.key, env)?;
                    let mut field = self.get_member(&value, &key)?;
                    if matches!(field, Value::Undefined) {
                        if let Some(default) = &prop.default {
                            field = self.eval(default, env)?;
                        }
                    }
                    self.bind_pattern(&prop.value, field, env)?;
                    used.push(key);
                }
                if let Some(rest) = rest {
                    let remaining = match &value {
                        Value::Object(entries) => entries
                            .iter()
                            .filter(|(key, _)| !used.contains(key))
                            .map(|(key, value)| (key.clone(), value.clone()))
                            .collect(),
                        _ => IndexMap::new(),
                    };
                    env.define(rest.clone(), Value::object(remaining));
                }
                Ok(())
            }
            Pattern::Array { elems, rest } => {
                let items = iterate(&value)?;
                for (i, elem) in elems.iter().enumerate() {
                    let Some(elem) = elem else { continue };
                    let mut item = items.get(i).cloned().unwrap_or_default();
                    if matches!(item, Value::Undefined) {
                        if let Some(default) = &elem.default {
                            item = self.eval(default, env)?;
                        }
                    }
                    self.bind_pattern(&elem.pattern, item, env)?;
                }
                if let Some(rest) = rest {
                    let tail = items.get(elems.len()..).map(<[Value]>::to_vec).unwrap_or_default();
                    self.bind_pattern(rest, Value::Array(Rc::new(tail)), env)?;
                }
                Ok(())
            }
        }
    }
}

impl Invoker for Interpreter {
    fn invoke(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        self.call(callee, args)
    }
}

fn builtin(name: &str) -> Option<Value> {
    match name {
        "NaN" => Some(Value::Number(f64::NAN)),
        "Infinity" => Some(Value::Number(f64::INFINITY)),
        _ => None,
    }
}

fn lookup(env: &Env, name: &str) -> Result<Value, RuntimeError> {
    env.lookup(name)
        .or_else(|| builtin(name))
        .ok_or_else(|| RuntimeError::UnresolvedReference {
            name: name.to_string(),
        })
}

fn property_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        other => other.to_display_string(),
    }
}

fn iterate(value: &Value) -> Result<Vec<Value>, RuntimeError> {
    match value {
        Value::Array(items) => Ok(items.to_vec()),
        Value::String(s) => Ok(s.chars().map(|c| Value::string(c.to_string())).collect()),
        other => Err(RuntimeError::type_error(format!(
            "{} is not iterable",
            other.to_display_string()
        ))),
    }
}

fn concatenates(value: &Value) -> bool {
    !matches!(
        value,
        Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_)
    )
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> bool {
    if let (Value::String(a), Value::String(b)) = (lhs, rhs) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Gt => a > b,
            BinaryOp::LtEq => a <= b,
            _ => a >= b,
        };
    }
    let (a, b) = (lhs.to_number(), rhs.to_number());
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Gt => a > b,
        BinaryOp::LtEq => a <= b,
        _ => a >= b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::syntax::parse_expression;

    fn eval_with(src: &str, config: InterpreterConfig) -> Result<Value, RuntimeError> {
        let expr = parse_expression(src).expect("parse failed");
        Interpreter::new(config).eval(&expr, &Env::root())
    }

    fn eval(src: &str) -> Result<Value, RuntimeError> {
        eval_with(src, InterpreterConfig::default())
    }

    fn display(src: &str) -> String {
        eval(src).unwrap().to_display_string()
    }

    // ----------------------------------------------------------------
    // Operators
    // ----------------------------------------------------------------

    #[test]
    fn arithmetic_follows_precedence() {
        assert_eq!(display("1 + 2 * 3"), "7");
        assert_eq!(display("(1 + 2) * 3"), "9");
        assert_eq!(display("7 % 4 - -1"), "4");
        assert_eq!(display("1 / 0"), "Infinity");
    }

    #[test]
    fn addition_concatenates_strings() {
        assert_eq!(display("\"a\" + 1"), "a1");
        assert_eq!(display("1 + 2 + \"x\""), "3x");
        assert_eq!(display("`${1 + 1}px ${\"wide\"}`"), "2px wide");
    }

    #[test]
    fn logical_operators_short_circuit() {
        assert_eq!(display("null ?? \"fallback\""), "fallback");
        assert_eq!(display("0 ?? 5"), "0");
        assert_eq!(display("0 || 5"), "5");
        assert!(eval("0 && missing").is_ok());
        assert!(eval("1 && missing").is_err());
        assert_eq!(display("1 < 2 ? \"yes\" : \"no\""), "yes");
    }

    #[test]
    fn typeof_of_undeclared_name_is_undefined() {
        assert_eq!(display("typeof nothing"), "undefined");
        assert_eq!(display("typeof (() => 1)"), "function");
        assert_eq!(display("typeof null"), "object");
    }

    // ----------------------------------------------------------------
    // Functions and patterns
    // ----------------------------------------------------------------

    #[test]
    fn destructuring_params_with_rest_and_defaults() {
        let src = "(({ a, b: [c, ...d] = [], ...rest }) => a + c + d.length + rest.z)({ a: 1, b: [2, 3, 4], z: 10 })";
        assert_eq!(display(src), "15");
        assert_eq!(display("((x, y = x * 2) => y)(4)"), "8");
        assert_eq!(display("((...all) => all.length)(1, 2, 3)"), "3");
    }

    #[test]
    fn block_bodies_declare_and_return() {
        assert_eq!(
            display("((n) => { const sq = n * n; let [first] = [sq + 1]; return first; })(3)"),
            "10"
        );
        assert_eq!(display("(() => { 1; })()"), "undefined");
    }

    #[test]
    fn closures_capture_their_scope() {
        assert_eq!(display("((a) => (b) => a + b)(1)(2)"), "3");
    }

    #[test]
    fn objects_and_arrays_spread() {
        let value = eval("({ ...{ a: 1, b: 2 }, b: 3, [\"c\" + 1]: 4, 5: 6 })").unwrap();
        let Value::Object(entries) = value else {
            panic!("expected object");
        };
        assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["a", "b", "c1", "5"]);
        assert_eq!(display("[1, ...[2, 3], , 4].length"), "5");
    }

    // ----------------------------------------------------------------
    // Errors
    // ----------------------------------------------------------------

    #[test]
    fn optional_chaining_short_circuits_the_whole_chain() {
        assert_eq!(display("({ a: null }).a?.b.c"), "undefined");
        assert_eq!(display("({ a: null }).a?.()"), "undefined");
        let err = eval("({ a: null }).a.b").unwrap_err();
        assert_eq!(
            err,
            RuntimeError::PropertyOfNullish {
                property: "b".to_string(),
                base: "null".to_string()
            }
        );
    }

    #[test]
    fn unbound_identifier_is_reported() {
        assert_eq!(
            eval("foo.bar").unwrap_err(),
            RuntimeError::UnresolvedReference {
                name: "foo".to_string()
            }
        );
    }

    #[test]
    fn calling_a_non_function_names_the_callee() {
        let err = eval("({ a: 1 }).a()").unwrap_err();
        match err {
            RuntimeError::NotCallable { description } => assert!(description.ends_with(".a")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn runaway_recursion_hits_the_call_limit() {
        let config = InterpreterConfig { max_call_depth: 16 };
        let err = eval_with(
            "((n) => { const f = (k) => f(k + 1); return f(n); })(0)",
            config,
        )
        .unwrap_err();
        assert_eq!(err, RuntimeError::CallDepthExceeded { limit: 16 });
    }

    #[test]
    fn destructuring_nullish_is_a_type_error() {
        let err = eval("(({ a }) => a)()").unwrap_err();
        assert!(matches!(err, RuntimeError::TypeError { .. }));
    }
}
