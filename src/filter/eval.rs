//! Tree-walking evaluator for compiled rules

use std::collections::HashMap;
use std::fmt;

use super::parser::{BinaryOp, Expr, Stmt, UnaryOp};
use super::FilterError;

/// Runtime value of a rule expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{:?}", v),
        }
    }
}

/// Variable environment for one rule run
///
/// Bindings injected by the engine are read-only; locals live in a stack of
/// block scopes so that `:=` inside an `if` body does not leak out of it.
pub struct Env {
    bindings: HashMap<&'static str, Value>,
    scopes: Vec<HashMap<String, Value>>,
}

impl Env {
    pub fn new(bindings: HashMap<&'static str, Value>) -> Self {
        Self {
            bindings,
            scopes: vec![HashMap::new()],
        }
    }

    /// Value of a top-level local after the run
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.scopes.first().and_then(|scope| scope.get(name))
    }

    fn lookup(&self, name: &str) -> Result<Value, FilterError> {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Ok(value.clone());
            }
        }
        self.bindings
            .get(name)
            .cloned()
            .ok_or_else(|| FilterError::UnknownIdentifier(name.to_string()))
    }

    fn define(&mut self, name: &str, value: Value) -> Result<(), FilterError> {
        if self.bindings.contains_key(name) {
            return Err(FilterError::ReadOnly(name.to_string()));
        }
        let scope = self
            .scopes
            .last_mut()
            .ok_or_else(|| FilterError::UnknownIdentifier(name.to_string()))?;
        if scope.contains_key(name) {
            return Err(FilterError::Redeclared(name.to_string()));
        }
        scope.insert(name.to_string(), value);
        Ok(())
    }

    fn assign(&mut self, name: &str, value: Value) -> Result<(), FilterError> {
        if self.bindings.contains_key(name) {
            return Err(FilterError::ReadOnly(name.to_string()));
        }
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = value;
                return Ok(());
            }
        }
        Err(FilterError::UnknownIdentifier(name.to_string()))
    }
}

pub fn run(program: &[Stmt], env: &mut Env) -> Result<(), FilterError> {
    for stmt in program {
        exec(stmt, env)?;
    }
    Ok(())
}

fn exec(stmt: &Stmt, env: &mut Env) -> Result<(), FilterError> {
    match stmt {
        Stmt::Define { name, value } => {
            let value = eval(value, env)?;
            env.define(name, value)
        }
        Stmt::Assign { name, value } => {
            let value = eval(value, env)?;
            env.assign(name, value)
        }
        Stmt::If { cond, then, otherwise } => {
            let branch = if expect_bool(eval(cond, env)?, "if condition")? {
                Some(then)
            } else {
                otherwise.as_ref()
            };
            if let Some(body) = branch {
                env.scopes.push(HashMap::new());
                let result = run(body, env);
                env.scopes.pop();
                result?;
            }
            Ok(())
        }
    }
}

fn expect_bool(value: Value, context: &str) -> Result<bool, FilterError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(FilterError::Type(format!(
            "{} must be bool, got {}",
            context,
            other.type_name()
        ))),
    }
}

fn eval(expr: &Expr, env: &Env) -> Result<Value, FilterError> {
    match expr {
        Expr::Int(v) => Ok(Value::Int(*v)),
        Expr::Str(v) => Ok(Value::Str(v.clone())),
        Expr::Bool(v) => Ok(Value::Bool(*v)),
        Expr::Ident(name) => env.lookup(name),
        Expr::Unary { op, expr } => match (op, eval(expr, env)?) {
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnaryOp::Neg, Value::Int(v)) => v.checked_neg().map(Value::Int).ok_or(FilterError::Overflow),
            (UnaryOp::Not, other) => Err(FilterError::Type(format!("operator ! not defined on {}", other.type_name()))),
            (UnaryOp::Neg, other) => Err(FilterError::Type(format!("operator - not defined on {}", other.type_name()))),
        },
        Expr::Binary { op, lhs, rhs } => binary(*op, lhs, rhs, env),
        Expr::Ternary { cond, then, otherwise } => {
            if expect_bool(eval(cond, env)?, "conditional expression")? {
                eval(then, env)
            } else {
                eval(otherwise, env)
            }
        }
        Expr::Call { name, args } => {
            let args = args
                .iter()
                .map(|arg| eval(arg, env))
                .collect::<Result<Vec<_>, _>>()?;
            call(name, args)
        }
    }
}

fn binary(op: BinaryOp, lhs: &Expr, rhs: &Expr, env: &Env) -> Result<Value, FilterError> {
    // Logical operators short-circuit, so the right side is evaluated lazily
    match op {
        BinaryOp::Or => {
            if expect_bool(eval(lhs, env)?, "operand of ||")? {
                return Ok(Value::Bool(true));
            }
            return expect_bool(eval(rhs, env)?, "operand of ||").map(Value::Bool);
        }
        BinaryOp::And => {
            if !expect_bool(eval(lhs, env)?, "operand of &&")? {
                return Ok(Value::Bool(false));
            }
            return expect_bool(eval(rhs, env)?, "operand of &&").map(Value::Bool);
        }
        _ => {}
    }

    let left = eval(lhs, env)?;
    let right = eval(rhs, env)?;

    match (op, &left, &right) {
        // Values of different types are never equal
        (BinaryOp::Eq, _, _) => Ok(Value::Bool(left == right)),
        (BinaryOp::NotEq, _, _) => Ok(Value::Bool(left != right)),

        (BinaryOp::Lt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a < b)),
        (BinaryOp::LtEq, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a <= b)),
        (BinaryOp::Gt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a > b)),
        (BinaryOp::GtEq, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a >= b)),
        (BinaryOp::Lt, Value::Str(a), Value::Str(b)) => Ok(Value::Bool(a < b)),
        (BinaryOp::LtEq, Value::Str(a), Value::Str(b)) => Ok(Value::Bool(a <= b)),
        (BinaryOp::Gt, Value::Str(a), Value::Str(b)) => Ok(Value::Bool(a > b)),
        (BinaryOp::GtEq, Value::Str(a), Value::Str(b)) => Ok(Value::Bool(a >= b)),

        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (BinaryOp::Add, Value::Int(a), Value::Int(b)) => checked(a.checked_add(*b)),
        (BinaryOp::Sub, Value::Int(a), Value::Int(b)) => checked(a.checked_sub(*b)),
        (BinaryOp::Mul, Value::Int(a), Value::Int(b)) => checked(a.checked_mul(*b)),
        (BinaryOp::Div | BinaryOp::Rem, Value::Int(_), Value::Int(0)) => Err(FilterError::DivisionByZero),
        (BinaryOp::Div, Value::Int(a), Value::Int(b)) => checked(a.checked_div(*b)),
        (BinaryOp::Rem, Value::Int(a), Value::Int(b)) => checked(a.checked_rem(*b)),

        _ => Err(FilterError::Type(format!(
            "operator {} not defined on {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn checked(result: Option<i64>) -> Result<Value, FilterError> {
    result.map(Value::Int).ok_or(FilterError::Overflow)
}

fn call(name: &str, args: Vec<Value>) -> Result<Value, FilterError> {
    match (name, args.as_slice()) {
        ("len", [Value::Str(s)]) => Ok(Value::Int(s.chars().count() as i64)),
        ("contains", [Value::Str(s), Value::Str(sub)]) => Ok(Value::Bool(s.contains(sub.as_str()))),
        ("starts_with", [Value::Str(s), Value::Str(prefix)]) => Ok(Value::Bool(s.starts_with(prefix.as_str()))),
        ("ends_with", [Value::Str(s), Value::Str(suffix)]) => Ok(Value::Bool(s.ends_with(suffix.as_str()))),
        ("matches", [Value::Str(s), Value::Str(pattern)]) => {
            let re = regex::Regex::new(pattern).map_err(|e| FilterError::Regex(e.to_string()))?;
            Ok(Value::Bool(re.is_match(s)))
        }
        ("len" | "contains" | "starts_with" | "ends_with" | "matches", _) => {
            let types: Vec<&str> = args.iter().map(Value::type_name).collect();
            Err(FilterError::Type(format!(
                "invalid arguments for {}({})",
                name,
                types.join(", ")
            )))
        }
        _ => Err(FilterError::UnknownFunction(name.to_string())),
    }
}
