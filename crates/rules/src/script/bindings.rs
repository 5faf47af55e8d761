//! Script-facing API: the `Node` type, its operators and the query helpers.

use ids_core::{BinaryOp, CompareOp, LogicalOp, Value};
use rhai::{
    Array, Dynamic, Engine, EvalAltResult, ImmutableString, Map, NativeCallContext, Position, FLOAT, INT,
};

use crate::executor::HookAction;
use crate::proxy::{self, Observed, Operand, ProxyError, SelectOptions};
use crate::results::RecordingContext;

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

/// Termination token raised when the failure hook asks to skip the task.
#[derive(Debug, Clone, Copy)]
struct SkipTask;

fn script_error(e: ProxyError) -> Box<EvalAltResult> {
    EvalAltResult::ErrorRuntime(e.to_string().into(), Position::NONE).into()
}

fn skip_signal() -> Box<EvalAltResult> {
    EvalAltResult::ErrorTerminated(Dynamic::from(SkipTask), Position::NONE).into()
}

/// Whether an evaluation error is the internal skip-task signal, possibly
/// wrapped by nested function calls.
pub(crate) fn is_skip_signal(err: &EvalAltResult) -> bool {
    match err {
        EvalAltResult::ErrorTerminated(token, _) => token.is::<SkipTask>(),
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => is_skip_signal(inner),
        _ => false,
    }
}

pub(crate) fn observed_argument(observed: Observed) -> Dynamic {
    Dynamic::from(observed)
}

// ── Conversions ───────────────────────────────────────────────

impl From<ImmutableString> for Operand {
    fn from(s: ImmutableString) -> Self {
        Operand::Scalar(Value::Str(s.to_string()))
    }
}

fn to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Empty => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from_bool(*b),
        Value::Int(i) => Dynamic::from_int(*i),
        Value::Float(x) => Dynamic::from_float(*x),
        Value::Str(s) => Dynamic::from(s.clone()),
        Value::Array(items) => Dynamic::from_array(items.iter().map(to_dynamic).collect()),
    }
}

/// Interpret a script value as an operand. Arrays holding observed
/// elements become one derived value with their merged provenance.
fn to_operand(value: Dynamic) -> Result<Operand, ProxyError> {
    if value.is::<Observed>() {
        return Ok(Operand::Node(value.cast::<Observed>()));
    }
    if value.is_unit() {
        return Ok(Operand::Scalar(Value::Empty));
    }
    if let Ok(b) = value.as_bool() {
        return Ok(Operand::Scalar(Value::Bool(b)));
    }
    if let Ok(i) = value.as_int() {
        return Ok(Operand::Scalar(Value::Int(i)));
    }
    if let Ok(x) = value.as_float() {
        return Ok(Operand::Scalar(Value::Float(x)));
    }
    if value.is_string() {
        return Ok(Operand::Scalar(Value::Str(value.to_string())));
    }
    if value.is_array() {
        let type_name = value.type_name().to_string();
        let items = value.into_array().map_err(|_| unsupported("operand", type_name))?;
        let mut values = Vec::with_capacity(items.len());
        let mut provenance = std::collections::BTreeSet::new();
        let mut observed = false;
        for item in items {
            match to_operand(item)? {
                Operand::Node(node) => {
                    let (v, p) = node.read()?;
                    values.push(v);
                    provenance.extend(p);
                    observed = true;
                }
                Operand::Scalar(v) => values.push(v),
            }
        }
        let value = Value::Array(values);
        return Ok(if observed {
            Operand::Node(Observed::derived(value, provenance))
        } else {
            Operand::Scalar(value)
        });
    }
    Err(unsupported("operand", value.type_name().to_string()))
}

fn to_observed(value: Dynamic) -> Result<Observed, ProxyError> {
    Ok(to_operand(value)?.into_observed())
}

fn unsupported(function: &'static str, got: String) -> ProxyError {
    ProxyError::Unsupported {
        function,
        expected: "a node, number, bool, string or array",
        got,
    }
}

fn to_array(nodes: Vec<Observed>) -> Array {
    nodes.into_iter().map(Dynamic::from).collect()
}

// ── Operators ─────────────────────────────────────────────────

fn apply<F, A, B>(f: F, a: A, b: B) -> ScriptResult<Observed>
where
    F: Fn(&Operand, &Operand) -> Result<Observed, ProxyError>,
    A: Into<Operand>,
    B: Into<Operand>,
{
    f(&a.into(), &b.into()).map_err(script_error)
}

fn apply_array<F>(f: F, a: Operand, b: Array, swap: bool) -> ScriptResult<Observed>
where
    F: Fn(&Operand, &Operand) -> Result<Observed, ProxyError>,
{
    let b = to_operand(Dynamic::from_array(b)).map_err(script_error)?;
    let result = if swap { f(&b, &a) } else { f(&a, &b) };
    result.map_err(script_error)
}

/// Register `symbol` for every pairing of a node with a node, a scalar or
/// an array literal.
fn register_binary<F>(engine: &mut Engine, symbol: &str, f: F)
where
    F: Fn(&Operand, &Operand) -> Result<Observed, ProxyError> + Copy + Send + Sync + 'static,
{
    engine.register_fn(symbol, move |a: Observed, b: Observed| apply(f, a, b));
    engine.register_fn(symbol, move |a: Observed, b: INT| apply(f, a, b));
    engine.register_fn(symbol, move |a: INT, b: Observed| apply(f, a, b));
    engine.register_fn(symbol, move |a: Observed, b: FLOAT| apply(f, a, b));
    engine.register_fn(symbol, move |a: FLOAT, b: Observed| apply(f, a, b));
    engine.register_fn(symbol, move |a: Observed, b: bool| apply(f, a, b));
    engine.register_fn(symbol, move |a: bool, b: Observed| apply(f, a, b));
    engine.register_fn(symbol, move |a: Observed, b: ImmutableString| apply(f, a, b));
    engine.register_fn(symbol, move |a: ImmutableString, b: Observed| apply(f, a, b));
    engine.register_fn(symbol, move |a: Observed, b: Array| apply_array(f, a.into(), b, false));
    engine.register_fn(symbol, move |a: Array, b: Observed| apply_array(f, b.into(), a, true));
}

fn register_operators(engine: &mut Engine) {
    for op in [
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Lt,
        CompareOp::Le,
        CompareOp::Gt,
        CompareOp::Ge,
    ] {
        register_binary(engine, op.symbol(), move |a, b| proxy::compare(a, op, b));
    }
    for op in [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Rem,
        BinaryOp::Pow,
    ] {
        register_binary(engine, op.symbol(), move |a, b| proxy::arith(a, op, b));
    }
    for op in [LogicalOp::And, LogicalOp::Or] {
        register_binary(engine, op.symbol(), move |a, b| proxy::logical(a, op, b));
    }

    engine.register_fn("-", |a: Observed| proxy::negate(&a.into()).map_err(script_error));
    engine.register_fn("!", |a: Observed| proxy::not(&a.into()).map_err(script_error));
    engine.register_fn("abs", |a: Observed| proxy::absolute(&a.into()).map_err(script_error));
    engine.register_fn("not", |a: Dynamic| -> ScriptResult<Observed> {
        let operand = to_operand(a).map_err(script_error)?;
        proxy::not(&operand).map_err(script_error)
    });
}

// ── Node type ─────────────────────────────────────────────────

fn register_node(engine: &mut Engine) {
    engine.register_type_with_name::<Observed>("Node");
    engine.register_iterator::<Observed>();
    engine.register_fn("to_string", |o: &mut Observed| o.to_string());
    engine.register_fn("to_debug", |o: &mut Observed| o.to_string());

    // `node.field` falls back to the string indexer.
    engine.register_indexer_get(|o: &mut Observed, name: ImmutableString| -> ScriptResult<Observed> {
        o.child(&name).map_err(script_error)
    });
    engine.register_indexer_get(|o: &mut Observed, index: INT| -> ScriptResult<Observed> {
        o.index(index).map_err(script_error)
    });

    engine.register_fn("value", |o: &mut Observed| -> ScriptResult<Dynamic> {
        o.read_value().map(|v| to_dynamic(&v)).map_err(script_error)
    });
    engine.register_fn("has_value", |o: &mut Observed| o.has_value());
    engine.register_fn("len", |o: &mut Observed| -> ScriptResult<INT> {
        o.len().map(|n| n as INT).map_err(script_error)
    });
    engine.register_fn("ndim", |o: &mut Observed| o.ndim() as INT);
    engine.register_fn("field_name", |o: &mut Observed| o.field_name().to_string());
    engine.register_fn("path", |o: &mut Observed| o.path().to_string());
    engine.register_fn("has_field", |o: &mut Observed, name: &str| o.has_field(name));
    engine.register_fn("is_leaf", |o: &mut Observed| o.is_leaf());
    engine.register_fn("parent", |o: &mut Observed| o.parent(1).map_err(script_error));
    engine.register_fn("parent", |o: &mut Observed, levels: INT| -> ScriptResult<Observed> {
        let levels = usize::try_from(levels)
            .map_err(|_| script_error(ProxyError::NoParent { path: o.path().to_string(), levels: 0 }))?;
        o.parent(levels).map_err(script_error)
    });
    engine.register_fn("children", |o: &mut Observed| -> ScriptResult<Array> {
        o.children().map(to_array).map_err(script_error)
    });
}

// ── Helpers ───────────────────────────────────────────────────

fn select_options(options: &Map) -> ScriptResult<SelectOptions> {
    let mut out = SelectOptions::default();
    for (key, value) in options {
        let flag = value
            .as_bool()
            .map_err(|t| script_error(unsupported("select", format!("{key}: {t}"))))?;
        match key.as_str() {
            "has_value" => out.has_value = flag,
            "leaf_only" => out.leaf_only = flag,
            other => {
                return Err(EvalAltResult::ErrorRuntime(
                    format!("select(): unknown option '{other}'").into(),
                    Position::NONE,
                )
                .into())
            }
        }
    }
    Ok(out)
}

fn operand_fn(
    f: fn(&Operand) -> Result<Observed, ProxyError>,
) -> impl Fn(Dynamic) -> ScriptResult<Observed> + Send + Sync + 'static {
    move |value: Dynamic| {
        let operand = to_operand(value).map_err(script_error)?;
        f(&operand).map_err(script_error)
    }
}

fn approx(a: Dynamic, b: Dynamic, rtol: FLOAT, atol: FLOAT) -> ScriptResult<Observed> {
    let a = to_operand(a).map_err(script_error)?;
    let b = to_operand(b).map_err(script_error)?;
    proxy::approx(&a, &b, rtol, atol).map_err(script_error)
}

fn register_helpers(engine: &mut Engine) {
    engine.register_fn("select", |o: &mut Observed, pattern: &str| -> ScriptResult<Array> {
        proxy::select(o, pattern, SelectOptions::default())
            .map(to_array)
            .map_err(script_error)
    });
    engine.register_fn("select", |o: &mut Observed, pattern: &str, options: Map| -> ScriptResult<Array> {
        let options = select_options(&options)?;
        proxy::select(o, pattern, options).map(to_array).map_err(script_error)
    });

    engine.register_fn("increasing", operand_fn(proxy::increasing));
    engine.register_fn("decreasing", operand_fn(proxy::decreasing));
    engine.register_fn("all", operand_fn(proxy::all));
    engine.register_fn("any", operand_fn(proxy::any));

    engine.register_fn("approx", |a: Dynamic, b: Dynamic| approx(a, b, 1e-5, 1e-8));
    engine.register_fn("approx", |a: Dynamic, b: Dynamic, rtol: FLOAT| approx(a, b, rtol, 1e-8));
    engine.register_fn("approx", approx);

    engine.register_fn("exists", |o: &mut Observed| proxy::exists(o));
    engine.register_fn("truthy", |value: Dynamic| -> ScriptResult<bool> {
        to_observed(value)
            .and_then(|o| o.truthy())
            .map_err(script_error)
    });
    engine.register_fn("observe", |value: Dynamic| -> ScriptResult<Observed> {
        let operand = to_operand(value).map_err(script_error)?;
        proxy::observe(operand).map_err(script_error)
    });
}

/// Everything rule files can use at load time and at run time.
pub(super) fn register_api(engine: &mut Engine) {
    register_node(engine);
    register_operators(engine);
    register_helpers(engine);
}

// ── Checks ────────────────────────────────────────────────────

fn record_check(ctx: &NativeCallContext, test: Dynamic, message: String) -> ScriptResult<()> {
    let recording = ctx
        .tag()
        .and_then(|tag| tag.clone().try_cast::<RecordingContext>())
        .ok_or_else(|| -> Box<EvalAltResult> {
            EvalAltResult::ErrorRuntime("check() can only be called while a rule runs".into(), Position::NONE)
                .into()
        })?;
    let test = to_observed(test).map_err(script_error)?;
    let location = recording.location(ctx.position().line());
    match recording.record(&test, message, location).map_err(script_error)? {
        HookAction::Continue => Ok(()),
        HookAction::SkipTask => Err(skip_signal()),
    }
}

/// `check(condition)` and `check(condition, message)`.
pub(super) fn register_check(engine: &mut Engine) {
    engine.register_fn("check", |ctx: NativeCallContext, test: Dynamic| {
        record_check(&ctx, test, String::new())
    });
    engine.register_fn("check", |ctx: NativeCallContext, test: Dynamic, message: Dynamic| {
        record_check(&ctx, test, message.to_string())
    });
}
