//! Runtime values and lexical environments.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tessera_core::syntax::ast::{ArrowBody, Param};

use super::element::RuntimeElement;
use super::error::RuntimeError;

/// A dynamically typed value produced by the interpreter.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Rc<Vec<Value>>),
    Object(Rc<IndexMap<String, Value>>),
    Function(Rc<Closure>),
    Host(Rc<dyn HostObject>),
    Element(Rc<RuntimeElement>),
}

impl Value {
    pub fn string(value: impl AsRef<str>) -> Value {
        Value::String(Rc::from(value.as_ref()))
    }

    pub fn object(entries: IndexMap<String, Value>) -> Value {
        Value::Object(Rc::new(entries))
    }

    pub fn host(host: impl HostObject + 'static) -> Value {
        Value::Host(Rc::new(host))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        match self {
            Value::Function(_) => true,
            Value::Host(host) => host.is_callable(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&RuntimeElement> {
        match self {
            Value::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Result of the `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Host(host) if host.is_callable() => "function",
            Value::Null
            | Value::Array(_)
            | Value::Object(_)
            | Value::Host(_)
            | Value::Element(_) => "object",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(items) if items.is_empty() => 0.0,
            Value::Array(items) if items.len() == 1 => items[0].to_number(),
            _ => f64::NAN,
        }
    }

    /// String conversion used by templates, concatenation and computed keys.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_display_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) | Value::Element(_) => "[object Object]".to_string(),
            Value::Function(_) => "() => { ... }".to_string(),
            Value::Host(host) => format!("[{}]", host.type_name()),
        }
    }

    /// `===`.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Element(a), Value::Element(b)) => Rc::ptr_eq(a, b),
            (Value::Host(a), Value::Host(b)) => {
                std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
            }
            _ => false,
        }
    }

    /// `==`, with the primitive coercions the expression language can reach.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_equals(other),
        }
    }
}

/// Formats a number the way the source language prints it.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Object(entries) => f.debug_map().entries(entries.iter()).finish(),
            Value::Function(_) => write!(f, "[Function]"),
            Value::Host(host) => write!(f, "[{}]", host.type_name()),
            Value::Element(element) => write!(f, "{element:?}"),
        }
    }
}

/// An arrow function together with its captured scope.
pub struct Closure {
    pub params: Vec<Param>,
    pub body: ArrowBody,
    pub env: Env,
}

/// Something that can call a function value on behalf of a host object.
pub trait Invoker {
    fn invoke(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, RuntimeError>;
}

/// A native object exposed to evaluated code.
pub trait HostObject: fmt::Debug {
    fn type_name(&self) -> &str;

    fn get(&self, _property: &str) -> Result<Value, RuntimeError> {
        Ok(Value::Undefined)
    }

    fn is_callable(&self) -> bool {
        false
    }

    fn call(&self, _args: Vec<Value>, _invoker: &mut dyn Invoker) -> Result<Value, RuntimeError> {
        Err(RuntimeError::NotCallable {
            description: self.type_name().to_string(),
        })
    }
}

struct Scope {
    vars: RefCell<HashMap<String, Value>>,
    parent: Option<Env>,
}

/// A lexical scope chain.
#[derive(Clone)]
pub struct Env(Rc<Scope>);

impl Env {
    pub fn root() -> Env {
        Env(Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent: None,
        }))
    }

    pub fn child(&self) -> Env {
        Env(Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent: Some(self.clone()),
        }))
    }

    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.vars.borrow_mut().insert(name.into(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(env) = scope {
            if let Some(value) = env.0.vars.borrow().get(name) {
                return Some(value.clone());
            }
            scope = env.0.parent.as_ref();
        }
        None
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.vars.borrow().keys().cloned().collect();
        f.debug_struct("Env").field("names", &names).finish()
    }
}
