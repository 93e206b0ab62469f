//! Tree-walking evaluator for the local scripting dialect.
//!
//! Host interop semantics: host access failures become catchable script
//! error objects, host-thrown errors keep a back-reference to the original
//! instance, and interrupt / continuation / heap checks run at statement
//! boundaries.

use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashMap;

use marten_value::num_bigint::BigInt;
use marten_value::{AccessError, AccessResult, ScriptValue};

use crate::backend::ContinuationFn;
use crate::error::FatalKind;
use crate::exception::HostThrown;
use crate::local::parser::{AssignTarget, BinOp, Expr, Stmt, UnOp};
use crate::local::{FunctionDef, LocalState, function_value};

/// Non-local exits escaping a script run.
pub(crate) enum Flow {
    Thrown {
        value: ScriptValue,
        cause: Option<Box<dyn Error + Send + Sync>>,
        line: u32,
    },
    Cancelled,
    Fatal(FatalKind),
}

enum Control {
    Normal(ScriptValue),
    Return(ScriptValue),
}

/// Cancellation inputs for one execution.
#[derive(Clone, Copy, Default)]
pub(crate) struct RunCtx<'a> {
    pub interrupt: Option<&'a AtomicBool>,
    pub continuation: Option<&'a ContinuationFn>,
}

pub(crate) struct Interp<'a> {
    state: &'a std::sync::Arc<LocalState>,
    ctx: RunCtx<'a>,
    frames: Vec<FxHashMap<String, ScriptValue>>,
    statements: u64,
    depth: usize,
}

impl<'a> Interp<'a> {
    pub fn new(state: &'a std::sync::Arc<LocalState>, ctx: RunCtx<'a>) -> Self {
        Self {
            state,
            ctx,
            frames: Vec::new(),
            statements: 0,
            depth: 0,
        }
    }

    /// Runs a top-level statement list, yielding the value of the last
    /// expression statement.
    pub fn run(&mut self, stmts: &[Stmt]) -> Result<ScriptValue, Flow> {
        match self.exec_block(stmts)? {
            Control::Normal(value) => Ok(value),
            Control::Return(value) => Ok(value),
        }
    }

    /// Calls a declared function with positional arguments.
    pub fn call_function(
        &mut self,
        def: &FunctionDef,
        args: &[ScriptValue],
        _call_line: u32,
    ) -> Result<ScriptValue, Flow> {
        if self.depth + 1 > self.state.runtime.stack_depth() {
            return Err(Flow::Fatal(FatalKind::StackLimitExceeded));
        }
        let mut frame = FxHashMap::default();
        for (i, param) in def.params.iter().enumerate() {
            frame.insert(
                param.clone(),
                args.get(i).cloned().unwrap_or(ScriptValue::Undefined),
            );
        }
        self.depth += 1;
        self.frames.push(frame);
        let result = self.exec_block(&def.body);
        self.frames.pop();
        self.depth -= 1;
        match result {
            Ok(Control::Return(value)) => Ok(value),
            Ok(Control::Normal(_)) => Ok(ScriptValue::Undefined),
            Err(flow) => Err(flow),
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Control, Flow> {
        let mut last = ScriptValue::Undefined;
        for stmt in stmts {
            self.tick()?;
            match stmt {
                Stmt::Let(name, expr) => {
                    let value = self.eval(expr)?;
                    self.declare(name, value);
                }
                Stmt::Assign(target, expr) => {
                    let value = self.eval(expr)?;
                    self.assign(target, value)?;
                }
                Stmt::Expr(expr) => {
                    last = self.eval(expr)?;
                }
                Stmt::Throw(expr, line) => {
                    let value = self.eval(expr)?;
                    return Err(Flow::Thrown {
                        value,
                        cause: None,
                        line: *line,
                    });
                }
                Stmt::TryCatch {
                    body,
                    binding,
                    handler,
                } => match self.exec_block(body) {
                    Ok(Control::Return(value)) => return Ok(Control::Return(value)),
                    Ok(Control::Normal(_)) => {}
                    Err(Flow::Thrown { value, .. }) => {
                        let mut frame = FxHashMap::default();
                        frame.insert(binding.clone(), value);
                        self.frames.push(frame);
                        let handled = self.exec_block(handler);
                        self.frames.pop();
                        match handled? {
                            Control::Return(value) => return Ok(Control::Return(value)),
                            Control::Normal(value) => last = value,
                        }
                    }
                    // Cancellation and fatal errors are not catchable.
                    Err(other) => return Err(other),
                },
                Stmt::While { cond, body } => {
                    while self.eval(cond)?.to_boolean() {
                        self.tick()?;
                        if let Control::Return(value) = self.exec_block(body)? {
                            return Ok(Control::Return(value));
                        }
                    }
                }
                Stmt::If {
                    cond,
                    then,
                    otherwise,
                } => {
                    let branch = if self.eval(cond)?.to_boolean() {
                        then
                    } else {
                        otherwise
                    };
                    if let Control::Return(value) = self.exec_block(branch)? {
                        return Ok(Control::Return(value));
                    }
                }
                Stmt::Function { name, params, body } => {
                    let def = self.state.declare_function(name, params.clone(), body.clone());
                    let value = function_value(self.state, def);
                    self.state.set_global(name, value);
                }
                Stmt::Return(expr) => {
                    let value = match expr {
                        Some(e) => self.eval(e)?,
                        None => ScriptValue::Undefined,
                    };
                    return Ok(Control::Return(value));
                }
            }
        }
        Ok(Control::Normal(last))
    }

    /// Statement-boundary checks: interrupt, continuation, heap sample.
    fn tick(&mut self) -> Result<(), Flow> {
        if let Some(flag) = self.ctx.interrupt
            && flag.load(Ordering::Acquire)
        {
            return Err(Flow::Cancelled);
        }
        if let Some(callback) = self.ctx.continuation
            && !callback()
        {
            return Err(Flow::Cancelled);
        }
        self.statements += 1;
        let interval = self.state.runtime.heap_sampling_interval();
        if self.statements % interval == 0 && self.state.runtime.over_limit() {
            return Err(Flow::Fatal(FatalKind::HeapLimitExceeded));
        }
        Ok(())
    }

    fn declare(&mut self, name: &str, value: ScriptValue) {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.insert(name.to_string(), value);
            }
            None => self.state.set_global(name, value),
        }
    }

    fn assign(&mut self, target: &AssignTarget, value: ScriptValue) -> Result<(), Flow> {
        match target {
            AssignTarget::Name(name) => {
                for frame in self.frames.iter_mut().rev() {
                    if let Some(slot) = frame.get_mut(name) {
                        *slot = value;
                        return Ok(());
                    }
                }
                self.state.set_global(name, value);
                Ok(())
            }
            AssignTarget::Member(object, name, line) => {
                let object = self.eval(object)?;
                match object.as_object() {
                    Some(o) => {
                        self.host_unit(o.set(name, value), *line)?;
                        Ok(())
                    }
                    None => Err(self.type_error(
                        format!("cannot set property '{name}' of a non-object"),
                        *line,
                    )),
                }
            }
            AssignTarget::Index(object, key, line) => {
                let object = self.eval(object)?;
                let key = self.eval(key)?;
                let Some(o) = object.as_object() else {
                    return Err(self.type_error("cannot index a non-object", *line));
                };
                match &key {
                    ScriptValue::Int32(i) if *i >= 0 => {
                        self.host_unit(o.set_index(*i as u32, value), *line)
                    }
                    ScriptValue::Int64(i) if *i >= 0 && *i <= u32::MAX as i64 => {
                        self.host_unit(o.set_index(*i as u32, value), *line)
                    }
                    ScriptValue::String(s) => self.host_unit(o.set(s, value), *line),
                    _ => Err(self.type_error("unsupported index key", *line)),
                }
            }
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<ScriptValue, Flow> {
        match expr {
            Expr::Undefined => Ok(ScriptValue::Undefined),
            Expr::Null => Ok(ScriptValue::Null),
            Expr::Bool(b) => Ok(ScriptValue::Boolean(*b)),
            Expr::Int(i) => Ok(narrow_int(*i)),
            Expr::Float(f) => Ok(ScriptValue::Float64(*f)),
            Expr::Big(b) => {
                self.state.charge(32);
                Ok(ScriptValue::bigint(b.clone()))
            }
            Expr::Str(s) => {
                self.state.charge(s.len() + 16);
                Ok(ScriptValue::string(s.clone()))
            }
            Expr::Ident(name, line) => self.lookup(name, *line),
            Expr::Member(object, name, line) => {
                let object = self.eval(object)?;
                self.member_get(&object, name, *line)
            }
            Expr::Index(object, key, line) => {
                let object = self.eval(object)?;
                let key = self.eval(key)?;
                let Some(o) = object.as_object() else {
                    return Err(self.type_error("cannot index a non-object", *line));
                };
                match &key {
                    ScriptValue::Int32(i) if *i >= 0 => {
                        self.host_value(o.get_index(*i as u32), *line)
                    }
                    ScriptValue::Int64(i) if *i >= 0 && *i <= u32::MAX as i64 => {
                        self.host_value(o.get_index(*i as u32), *line)
                    }
                    ScriptValue::String(s) => self.host_value(o.get(s), *line),
                    _ => Err(self.type_error("unsupported index key", *line)),
                }
            }
            Expr::Call { callee, args, line } => self.eval_call(callee, args, *line),
            Expr::Binary(op, left, right, line) => {
                if *op == BinOp::And {
                    let left = self.eval(left)?;
                    if !left.to_boolean() {
                        return Ok(left);
                    }
                    return self.eval(right);
                }
                if *op == BinOp::Or {
                    let left = self.eval(left)?;
                    if left.to_boolean() {
                        return Ok(left);
                    }
                    return self.eval(right);
                }
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.binary(*op, left, right, *line)
            }
            Expr::Unary(op, inner) => {
                let value = self.eval(inner)?;
                match op {
                    UnOp::Not => Ok(ScriptValue::Boolean(!value.to_boolean())),
                    UnOp::Neg => match value {
                        ScriptValue::Int32(i) => Ok(narrow_int(-(i as i64))),
                        ScriptValue::Int64(i) if i != i64::MIN => Ok(narrow_int(-i)),
                        ScriptValue::Int64(_) => Ok(ScriptValue::Float64(-(i64::MIN as f64))),
                        ScriptValue::Float64(f) => Ok(ScriptValue::Float64(-f)),
                        ScriptValue::Float32(f) => Ok(ScriptValue::Float32(-f)),
                        ScriptValue::BigInt(b) => Ok(ScriptValue::bigint(-(*b).clone())),
                        _ => Err(self.type_error("cannot negate a non-number", 0)),
                    },
                }
            }
            Expr::ObjectLit(fields) => {
                self.state.charge(64);
                let object = self.state.new_object();
                for (key, value_expr) in fields {
                    let value = self.eval(value_expr)?;
                    // Plain data object, set cannot fail.
                    let _ = object.set(key, value);
                }
                Ok(ScriptValue::Object(object))
            }
        }
    }

    fn lookup(&self, name: &str, line: u32) -> Result<ScriptValue, Flow> {
        for frame in self.frames.iter().rev() {
            if let Some(value) = frame.get(name) {
                return Ok(value.clone());
            }
        }
        if let Some(value) = self.state.get_global(name) {
            return Ok(value);
        }
        Err(self.error_flow("ReferenceError", format!("{name} is not defined"), None, None, line))
    }

    fn member_get(
        &mut self,
        object: &ScriptValue,
        name: &str,
        line: u32,
    ) -> Result<ScriptValue, Flow> {
        match object {
            ScriptValue::Object(o) => self.host_value(o.get(name), line),
            ScriptValue::Function(f) => self.host_value(f.as_object().get(name), line),
            ScriptValue::String(s) if name == "length" => {
                Ok(narrow_int(s.chars().count() as i64))
            }
            _ => Err(self.type_error(
                format!("cannot read property '{name}' of a non-object"),
                line,
            )),
        }
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        line: u32,
    ) -> Result<ScriptValue, Flow> {
        let mut evaluated = Vec::with_capacity(args.len());
        for arg in args {
            evaluated.push(self.eval(arg)?);
        }
        match callee {
            // Declared functions run in-process so control flow and
            // cancellation context carry through without a boundary wrap.
            Expr::Ident(name, _) => {
                if let Some(def) = self.state.function(name) {
                    return self.call_function(&def, &evaluated, line);
                }
                let value = self.lookup(name, line)?;
                self.call_value(&value, &evaluated, line)
            }
            Expr::Member(object, name, member_line) => {
                let object = self.eval(object)?;
                match &object {
                    ScriptValue::Object(o) => {
                        self.host_value(o.invoke_method(name, &evaluated), line)
                    }
                    ScriptValue::Function(f) => {
                        self.host_value(f.as_object().invoke_method(name, &evaluated), line)
                    }
                    _ => Err(self.type_error(
                        format!("cannot call '{name}' on a non-object"),
                        *member_line,
                    )),
                }
            }
            other => {
                let value = self.eval(other)?;
                self.call_value(&value, &evaluated, line)
            }
        }
    }

    fn call_value(
        &mut self,
        value: &ScriptValue,
        args: &[ScriptValue],
        line: u32,
    ) -> Result<ScriptValue, Flow> {
        match value {
            ScriptValue::Function(f) => {
                if let Some(def) = self.state.function_of_value(f) {
                    return self.call_function(&def, args, line);
                }
                self.host_value(f.call(args), line)
            }
            ScriptValue::Object(o) => self.host_value(o.invoke(args), line),
            _ => Err(self.type_error("value is not callable", line)),
        }
    }

    fn binary(
        &mut self,
        op: BinOp,
        left: ScriptValue,
        right: ScriptValue,
        line: u32,
    ) -> Result<ScriptValue, Flow> {
        use BinOp::*;
        match op {
            Add => {
                if matches!(left, ScriptValue::String(_))
                    || matches!(right, ScriptValue::String(_))
                {
                    let text = format!("{}{}", display(&left), display(&right));
                    self.state.charge(text.len() + 16);
                    return Ok(ScriptValue::string(text));
                }
                if let (ScriptValue::BigInt(a), ScriptValue::BigInt(b)) = (&left, &right) {
                    self.state.charge(32);
                    return Ok(ScriptValue::bigint(&**a + &**b));
                }
                if let Some((a, b)) = int_pair(&left, &right) {
                    return Ok(match a.checked_add(b) {
                        Some(sum) => narrow_int(sum),
                        None => ScriptValue::Float64(a as f64 + b as f64),
                    });
                }
                match float_pair(&left, &right) {
                    Some((a, b)) => Ok(ScriptValue::Float64(a + b)),
                    None => Err(self.type_error("unsupported operand types for '+'", line)),
                }
            }
            Sub | Mul | Rem => {
                if let (ScriptValue::BigInt(a), ScriptValue::BigInt(b)) = (&left, &right) {
                    self.state.charge(32);
                    let result = match op {
                        Sub => &**a - &**b,
                        Mul => &**a * &**b,
                        _ => {
                            if b.sign() == marten_value::num_bigint::Sign::NoSign {
                                return Err(self.error_flow(
                                    "RangeError",
                                    "bigint remainder by zero",
                                    None,
                                    None,
                                    line,
                                ));
                            }
                            &**a % &**b
                        }
                    };
                    return Ok(ScriptValue::bigint(result));
                }
                if let Some((a, b)) = int_pair(&left, &right) {
                    let checked = match op {
                        Sub => a.checked_sub(b),
                        Mul => a.checked_mul(b),
                        _ => {
                            if b == 0 {
                                None
                            } else {
                                a.checked_rem(b)
                            }
                        }
                    };
                    return Ok(match checked {
                        Some(v) => narrow_int(v),
                        None => {
                            let (a, b) = (a as f64, b as f64);
                            ScriptValue::Float64(match op {
                                Sub => a - b,
                                Mul => a * b,
                                _ => a % b,
                            })
                        }
                    });
                }
                match float_pair(&left, &right) {
                    Some((a, b)) => Ok(ScriptValue::Float64(match op {
                        Sub => a - b,
                        Mul => a * b,
                        _ => a % b,
                    })),
                    None => Err(self.type_error("unsupported operand types", line)),
                }
            }
            Div => {
                if let (ScriptValue::BigInt(a), ScriptValue::BigInt(b)) = (&left, &right) {
                    if b.sign() == marten_value::num_bigint::Sign::NoSign {
                        return Err(self.error_flow(
                            "RangeError",
                            "bigint division by zero",
                            None,
                            None,
                            line,
                        ));
                    }
                    self.state.charge(32);
                    return Ok(ScriptValue::bigint(&**a / &**b));
                }
                match float_pair(&left, &right) {
                    Some((a, b)) => Ok(ScriptValue::Float64(a / b)),
                    None => Err(self.type_error("unsupported operand types for '/'", line)),
                }
            }
            Eq | NotEq => {
                let equal = loose_eq(&left, &right);
                Ok(ScriptValue::Boolean(if op == Eq { equal } else { !equal }))
            }
            Lt | LtEq | Gt | GtEq => {
                let ordering = if let (ScriptValue::String(a), ScriptValue::String(b)) =
                    (&left, &right)
                {
                    Some(a.cmp(b))
                } else if let (ScriptValue::BigInt(a), ScriptValue::BigInt(b)) = (&left, &right) {
                    Some(a.cmp(b))
                } else {
                    float_pair(&left, &right).and_then(|(a, b)| a.partial_cmp(&b))
                };
                let Some(ordering) = ordering else {
                    return Ok(ScriptValue::Boolean(false));
                };
                Ok(ScriptValue::Boolean(match op {
                    Lt => ordering.is_lt(),
                    LtEq => ordering.is_le(),
                    Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }))
            }
            And | Or => unreachable!("short-circuit ops handled before evaluation"),
        }
    }

    /// Maps a host access failure into a catchable thrown error object.
    fn host_value(
        &mut self,
        result: AccessResult<ScriptValue>,
        line: u32,
    ) -> Result<ScriptValue, Flow> {
        result.map_err(|err| self.throw_from_access(err, line))
    }

    fn host_unit(&mut self, result: AccessResult<()>, line: u32) -> Result<(), Flow> {
        result.map_err(|err| self.throw_from_access(err, line))
    }

    fn throw_from_access(&self, err: AccessError, line: u32) -> Flow {
        match err {
            AccessError::Engine(inner) => {
                let host_ref = inner
                    .downcast_ref::<HostThrown>()
                    .map(|thrown| thrown.origin());
                let message = inner.to_string();
                self.error_flow("Error", message, host_ref, Some(inner), line)
            }
            AccessError::Conversion(_) => {
                let message = err.to_string();
                self.error_flow("TypeError", message, None, Some(Box::new(err)), line)
            }
            other => {
                let message = other.to_string();
                self.error_flow("Error", message, None, Some(Box::new(other)), line)
            }
        }
    }

    fn type_error(&self, message: impl Into<String>, line: u32) -> Flow {
        self.error_flow("TypeError", message, None, None, line)
    }

    fn error_flow(
        &self,
        ctor: &str,
        message: impl Into<String>,
        host_ref: Option<crate::exception::HostExceptionRef>,
        cause: Option<Box<dyn Error + Send + Sync>>,
        line: u32,
    ) -> Flow {
        let value = self.state.new_error_object(ctor, &message.into(), host_ref);
        Flow::Thrown { value, cause, line }
    }
}

pub(crate) fn narrow_int(value: i64) -> ScriptValue {
    match i32::try_from(value) {
        Ok(small) => ScriptValue::Int32(small),
        Err(_) => ScriptValue::Int64(value),
    }
}

fn int_pair(a: &ScriptValue, b: &ScriptValue) -> Option<(i64, i64)> {
    Some((int_of(a)?, int_of(b)?))
}

fn int_of(v: &ScriptValue) -> Option<i64> {
    match v {
        ScriptValue::Int32(i) => Some(*i as i64),
        ScriptValue::Int64(i) => Some(*i),
        _ => None,
    }
}

fn float_pair(a: &ScriptValue, b: &ScriptValue) -> Option<(f64, f64)> {
    Some((float_of(a)?, float_of(b)?))
}

fn float_of(v: &ScriptValue) -> Option<f64> {
    match v {
        ScriptValue::Int32(i) => Some(*i as f64),
        ScriptValue::Int64(i) => Some(*i as f64),
        ScriptValue::Float32(f) => Some(*f as f64),
        ScriptValue::Float64(f) => Some(*f),
        ScriptValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn loose_eq(a: &ScriptValue, b: &ScriptValue) -> bool {
    if let (ScriptValue::BigInt(x), ScriptValue::BigInt(y)) = (a, b) {
        return x == y;
    }
    if let (ScriptValue::BigInt(x), Some(i)) = (a, int_of(b)) {
        return **x == BigInt::from(i);
    }
    if let (Some(i), ScriptValue::BigInt(y)) = (int_of(a), b) {
        return BigInt::from(i) == **y;
    }
    if let Some((x, y)) = float_pair(a, b) {
        return x == y;
    }
    a == b
}

/// Display form used by string concatenation and error messages.
pub(crate) fn display(value: &ScriptValue) -> String {
    match value {
        ScriptValue::Undefined => "undefined".to_string(),
        ScriptValue::Null => "null".to_string(),
        ScriptValue::Boolean(b) => b.to_string(),
        ScriptValue::Int32(i) => i.to_string(),
        ScriptValue::Int64(i) => i.to_string(),
        ScriptValue::Float32(f) => f.to_string(),
        ScriptValue::Float64(f) => f.to_string(),
        ScriptValue::BigInt(b) => b.to_string(),
        ScriptValue::String(s) => s.to_string(),
        ScriptValue::Date(d) => d.to_rfc3339(),
        ScriptValue::Object(_) => "[object]".to_string(),
        ScriptValue::Function(_) => "[function]".to_string(),
    }
}
