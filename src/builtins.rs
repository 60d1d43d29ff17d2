use crate::error::{MonkeyError, Span};
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

type BuiltinFn = fn(&[Value], &Span) -> Result<Value, MonkeyError>;

/// A host-provided function, resolved by name after the environment chain.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    /// `None` accepts any number of arguments.
    pub arity: Option<usize>,
    func: BuiltinFn,
}

const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "len",
        arity: Some(1),
        func: len,
    },
    Builtin {
        name: "first",
        arity: Some(1),
        func: first,
    },
    Builtin {
        name: "last",
        arity: Some(1),
        func: last,
    },
    Builtin {
        name: "rest",
        arity: Some(1),
        func: rest,
    },
    Builtin {
        name: "push",
        arity: Some(2),
        func: push,
    },
    Builtin {
        name: "puts",
        arity: None,
        func: puts,
    },
    Builtin {
        name: "type",
        arity: Some(1),
        func: type_of,
    },
];

pub fn lookup(name: &str) -> Option<Builtin> {
    BUILTINS.iter().find(|builtin| builtin.name == name).copied()
}

impl Builtin {
    pub fn call(&self, args: &[Value], span: &Span) -> Result<Value, MonkeyError> {
        if let Some(arity) = self.arity {
            if args.len() != arity {
                return Err(MonkeyError::runtime(
                    span.clone(),
                    format!("wrong number of arguments: want={}, got={}", arity, args.len()),
                )
                .with_help(format!("`{}` takes exactly {} argument(s).", self.name, arity)));
            }
        }
        (self.func)(args, span)
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

fn expect_array<'a>(name: &str, value: &'a Value, span: &Span) -> Result<&'a Rc<Vec<Value>>, MonkeyError> {
    match value {
        Value::Array(elements) => Ok(elements),
        other => Err(MonkeyError::runtime(
            span.clone(),
            format!("argument to `{}` must be ARRAY, got {}", name, other.type_name()),
        )
        .with_help(format!("Usage: {}([1, 2, 3])", name))),
    }
}

fn len(args: &[Value], span: &Span) -> Result<Value, MonkeyError> {
    match &args[0] {
        Value::String(s) => Ok(Value::Integer(s.chars().count() as i64)),
        Value::Array(elements) => Ok(Value::Integer(elements.len() as i64)),
        Value::Hash(pairs) => Ok(Value::Integer(pairs.len() as i64)),
        other => Err(MonkeyError::runtime(
            span.clone(),
            format!("argument to `len` not supported, got {}", other.type_name()),
        )
        .with_help("len() only works with strings, arrays, and hashes.")),
    }
}

fn first(args: &[Value], span: &Span) -> Result<Value, MonkeyError> {
    let elements = expect_array("first", &args[0], span)?;
    Ok(elements.first().cloned().unwrap_or(Value::Null))
}

fn last(args: &[Value], span: &Span) -> Result<Value, MonkeyError> {
    let elements = expect_array("last", &args[0], span)?;
    Ok(elements.last().cloned().unwrap_or(Value::Null))
}

fn rest(args: &[Value], span: &Span) -> Result<Value, MonkeyError> {
    let elements = expect_array("rest", &args[0], span)?;
    if elements.is_empty() {
        return Ok(Value::Null);
    }
    Ok(Value::Array(Rc::new(elements[1..].to_vec())))
}

/// Returns a new array; the argument is left as it was.
fn push(args: &[Value], span: &Span) -> Result<Value, MonkeyError> {
    let elements = expect_array("push", &args[0], span)?;
    let mut pushed = Vec::with_capacity(elements.len() + 1);
    pushed.extend(elements.iter().cloned());
    pushed.push(args[1].clone());
    Ok(Value::Array(Rc::new(pushed)))
}

fn puts(args: &[Value], _span: &Span) -> Result<Value, MonkeyError> {
    for value in args {
        println!("{}", value);
    }
    Ok(Value::Null)
}

fn type_of(args: &[Value], _span: &Span) -> Result<Value, MonkeyError> {
    Ok(Value::String(args[0].type_name().to_string()))
}
