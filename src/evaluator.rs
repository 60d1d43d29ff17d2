use crate::ast::{BlockStatement, Expr, InfixOp, PrefixOp, Program, Stmt};
use crate::builtins;
use crate::environment::{self, Env, Environment};
use crate::error::{MonkeyError, Span};
use crate::value::{Function, HashPair, Value};
use indexmap::IndexMap;
use log::trace;
use std::cell::Cell;
use std::rc::Rc;

/// Deepest chain of nested calls before evaluation gives up with an error.
/// The host stack grows on demand, so this only stops runaway recursion.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 10_000;

// Grow the host stack by 4MB whenever less than 128KB is left.
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// The two ways evaluation leaves a statement early.
#[derive(Debug)]
enum Unwind {
    /// A `return` travelling out to the nearest call (or the program).
    Return(Value),
    Error(MonkeyError),
}

impl From<MonkeyError> for Unwind {
    fn from(error: MonkeyError) -> Self {
        Unwind::Error(error)
    }
}

type EvalResult = Result<Value, Unwind>;

/// Tree-walking evaluator bound to one top-level environment.
///
/// Bindings made by one `evaluate_program` call stay visible to the next, which
/// is how an interactive session keeps its state.
pub struct Evaluator {
    environment: Env,
    max_call_depth: usize,
    call_depth: Cell<usize>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_environment(Environment::new_global())
    }

    pub fn with_environment(environment: Env) -> Self {
        Self {
            environment,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            call_depth: Cell::new(0),
        }
    }

    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }

    pub fn evaluate_program(&self, program: &Program) -> Result<Value, MonkeyError> {
        trace!("evaluating {} statements", program.statements.len());
        self.call_depth.set(0);

        match self.execute_statements(&program.statements, &self.environment) {
            Ok(value) | Err(Unwind::Return(value)) => Ok(value),
            Err(Unwind::Error(error)) => Err(error),
        }
    }

    fn execute_statements(&self, statements: &[Stmt], env: &Env) -> EvalResult {
        let mut result = Value::Null;
        for statement in statements {
            result = self.execute_statement(statement, env)?;
        }
        Ok(result)
    }

    fn execute_block(&self, block: &BlockStatement, env: &Env) -> EvalResult {
        self.execute_statements(&block.statements, env)
    }

    fn execute_statement(&self, stmt: &Stmt, env: &Env) -> EvalResult {
        match stmt {
            Stmt::Let { name, value, .. } => {
                let value = self.evaluate_expression(value, env)?;
                env.borrow_mut().set(name.clone(), value);
                Ok(Value::Null)
            }
            Stmt::Return { value, .. } => {
                let value = self.evaluate_expression(value, env)?;
                Err(Unwind::Return(value))
            }
            Stmt::Expression { expr, .. } => self.evaluate_expression(expr, env),
        }
    }

    fn evaluate_expression(&self, expr: &Expr, env: &Env) -> EvalResult {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.evaluate_expression_inner(expr, env)
        })
    }

    fn evaluate_expression_inner(&self, expr: &Expr, env: &Env) -> EvalResult {
        match expr {
            Expr::IntegerLiteral { value, .. } => Ok(Value::Integer(*value)),
            Expr::BooleanLiteral { value, .. } => Ok(Value::Boolean(*value)),
            Expr::StringLiteral { value, .. } => Ok(Value::String(value.clone())),
            Expr::Identifier { name, span } => {
                let bound = env.borrow().get(name);
                match bound.or_else(|| builtins::lookup(name).map(Value::Builtin)) {
                    Some(value) => Ok(value),
                    None => Err(MonkeyError::runtime(
                        span.clone(),
                        format!("identifier not found: {}", name),
                    )
                    .with_help(format!("Bind it first with: let {} = ...;", name))
                    .into()),
                }
            }
            Expr::Prefix {
                operator,
                right,
                span,
            } => {
                let right = self.evaluate_expression(right, env)?;
                self.evaluate_prefix_op(*operator, right, span)
            }
            Expr::Infix {
                left,
                operator,
                right,
                span,
            } => {
                let left = self.evaluate_expression(left, env)?;
                let right = self.evaluate_expression(right, env)?;
                self.evaluate_infix_op(*operator, left, right, span)
            }
            Expr::If {
                condition,
                consequence,
                alternative,
                ..
            } => {
                let condition = self.evaluate_expression(condition, env)?;
                if condition.is_truthy() {
                    self.execute_block(consequence, env)
                } else if let Some(alternative) = alternative {
                    self.execute_block(alternative, env)
                } else {
                    Ok(Value::Null)
                }
            }
            Expr::FunctionLiteral {
                parameters, body, ..
            } => Ok(Value::Function(Rc::new(Function {
                parameters: parameters.clone(),
                body: body.clone(),
                env: Rc::clone(env),
            }))),
            Expr::Call {
                function,
                arguments,
                span,
            } => {
                let function = self.evaluate_expression(function, env)?;
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate_expression(argument, env)?);
                }
                self.apply_function(function, args, span)
            }
            Expr::ArrayLiteral { elements, .. } => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate_expression(element, env)?);
                }
                Ok(Value::Array(Rc::new(values)))
            }
            Expr::Index { left, index, span } => {
                let left = self.evaluate_expression(left, env)?;
                let index = self.evaluate_expression(index, env)?;
                self.evaluate_index(left, index, span)
            }
            Expr::HashLiteral { pairs, .. } => {
                let mut map = IndexMap::with_capacity(pairs.len());
                for (key_expr, value_expr) in pairs {
                    let key = self.evaluate_expression(key_expr, env)?;
                    let hash_key = key
                        .hash_key()
                        .ok_or_else(|| unusable_as_hash_key(&key, key_expr.span()))?;
                    let value = self.evaluate_expression(value_expr, env)?;
                    map.insert(hash_key, HashPair { key, value });
                }
                Ok(Value::Hash(Rc::new(map)))
            }
        }
    }

    fn apply_function(&self, function: Value, args: Vec<Value>, span: &Span) -> EvalResult {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.apply_function_inner(function, args, span)
        })
    }

    fn apply_function_inner(&self, function: Value, args: Vec<Value>, span: &Span) -> EvalResult {
        match function {
            Value::Function(function) => {
                if args.len() != function.parameters.len() {
                    return Err(MonkeyError::runtime(
                        span.clone(),
                        format!(
                            "wrong number of arguments: want={}, got={}",
                            function.parameters.len(),
                            args.len()
                        ),
                    )
                    .with_help(format!(
                        "This function is declared as fn({}).",
                        function.parameters.join(", ")
                    ))
                    .into());
                }

                let depth = self.call_depth.get();
                if depth >= self.max_call_depth {
                    return Err(MonkeyError::runtime(
                        span.clone(),
                        format!("maximum call depth of {} exceeded", self.max_call_depth),
                    )
                    .with_help("Check for recursion without a base case.")
                    .into());
                }

                // Parameters live in a fresh scope nested in the closure's scope,
                // not the caller's.
                let call_env = Environment::new_enclosed(Rc::clone(&function.env));
                {
                    let mut scope = call_env.borrow_mut();
                    for (parameter, arg) in function.parameters.iter().zip(args) {
                        scope.set(parameter.clone(), arg);
                    }
                }

                trace!("call depth {}: fn({})", depth + 1, function.parameters.join(", "));
                self.call_depth.set(depth + 1);
                let result = self.execute_block(&function.body, &call_env);
                self.call_depth.set(depth);

                let result = match result {
                    Ok(value) | Err(Unwind::Return(value)) => Ok(value),
                    Err(error) => Err(error),
                };

                // A closure bound in the call's scope keeps that scope alive through
                // its captured environment. Once nothing returned can reach the
                // scope, its bindings are dropped to break the cycle.
                if environment::holds_own_closure(&call_env) {
                    let escapes = matches!(
                        &result,
                        Ok(value) if environment::reachable_from(value, &call_env)
                    );
                    if !escapes {
                        trace!("releasing call scope of fn({})", function.parameters.join(", "));
                        Environment::release(&call_env);
                    }
                }

                result
            }
            Value::Builtin(builtin) => Ok(builtin.call(&args, span)?),
            other => Err(MonkeyError::runtime(
                span.clone(),
                format!("not a function: {}", other.type_name()),
            )
            .with_help("Only functions and builtins can be called.")
            .into()),
        }
    }

    fn evaluate_prefix_op(&self, operator: PrefixOp, operand: Value, span: &Span) -> EvalResult {
        match operator {
            PrefixOp::Not => Ok(Value::Boolean(!operand.is_truthy())),
            PrefixOp::Negate => match operand {
                Value::Integer(n) => Ok(Value::Integer(n.wrapping_neg())),
                other => Err(MonkeyError::runtime(
                    span.clone(),
                    format!("unknown operator: -{}", other.type_name()),
                )
                .into()),
            },
        }
    }

    fn evaluate_infix_op(
        &self,
        operator: InfixOp,
        left: Value,
        right: Value,
        span: &Span,
    ) -> EvalResult {
        match (&left, &right) {
            (Value::Integer(l), Value::Integer(r)) => {
                self.evaluate_integer_op(operator, *l, *r, span)
            }
            (Value::String(l), Value::String(r)) => match operator {
                InfixOp::Add => Ok(Value::String(format!("{}{}", l, r))),
                InfixOp::Equal => Ok(Value::Boolean(l == r)),
                InfixOp::NotEqual => Ok(Value::Boolean(l != r)),
                _ => Err(unknown_operator(operator, &left, &right, span)),
            },
            _ if left.type_name() != right.type_name() => match operator {
                // Values of different kinds are never equal.
                InfixOp::Equal => Ok(Value::Boolean(false)),
                InfixOp::NotEqual => Ok(Value::Boolean(true)),
                _ => Err(MonkeyError::runtime(
                    span.clone(),
                    format!(
                        "type mismatch: {} {} {}",
                        left.type_name(),
                        operator,
                        right.type_name()
                    ),
                )
                .into()),
            },
            _ => match operator {
                InfixOp::Equal => Ok(Value::Boolean(left == right)),
                InfixOp::NotEqual => Ok(Value::Boolean(left != right)),
                _ => Err(unknown_operator(operator, &left, &right, span)),
            },
        }
    }

    fn evaluate_integer_op(&self, operator: InfixOp, l: i64, r: i64, span: &Span) -> EvalResult {
        let value = match operator {
            InfixOp::Add => Value::Integer(l.wrapping_add(r)),
            InfixOp::Subtract => Value::Integer(l.wrapping_sub(r)),
            InfixOp::Multiply => Value::Integer(l.wrapping_mul(r)),
            InfixOp::Divide => {
                if r == 0 {
                    return Err(MonkeyError::runtime(
                        span.clone(),
                        "division by zero",
                    )
                    .into());
                }
                Value::Integer(l.wrapping_div(r))
            }
            InfixOp::Equal => Value::Boolean(l == r),
            InfixOp::NotEqual => Value::Boolean(l != r),
            InfixOp::Less => Value::Boolean(l < r),
            InfixOp::LessEqual => Value::Boolean(l <= r),
            InfixOp::Greater => Value::Boolean(l > r),
            InfixOp::GreaterEqual => Value::Boolean(l >= r),
        };
        Ok(value)
    }

    fn evaluate_index(&self, left: Value, index: Value, span: &Span) -> EvalResult {
        match (&left, &index) {
            (Value::Array(elements), Value::Integer(i)) => Ok(usize::try_from(*i)
                .ok()
                .and_then(|i| elements.get(i))
                .cloned()
                .unwrap_or(Value::Null)),
            (Value::Array(_), other) => Err(MonkeyError::runtime(
                span.clone(),
                format!("index must be INTEGER, got {}", other.type_name()),
            )
            .into()),
            (Value::Hash(pairs), key) => match key.hash_key() {
                Some(hash_key) => Ok(pairs
                    .get(&hash_key)
                    .map(|pair| pair.value.clone())
                    .unwrap_or(Value::Null)),
                None => Err(unusable_as_hash_key(key, span)),
            },
            (other, _) => Err(MonkeyError::runtime(
                span.clone(),
                format!("index operator not supported: {}", other.type_name()),
            )
            .into()),
        }
    }
}

fn unknown_operator(operator: InfixOp, left: &Value, right: &Value, span: &Span) -> Unwind {
    MonkeyError::runtime(
        span.clone(),
        format!(
            "unknown operator: {} {} {}",
            left.type_name(),
            operator,
            right.type_name()
        ),
    )
    .into()
}

fn unusable_as_hash_key(key: &Value, span: &Span) -> Unwind {
    MonkeyError::runtime(
        span.clone(),
        format!("unusable as hash key: {}", key.type_name()),
    )
    .with_help("Only integers, booleans, and strings can be hash keys.")
    .into()
}
