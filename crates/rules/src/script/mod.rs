//! Rule files as Rhai scripts.
//!
//! A rule file defines plain functions and registers some of them as rules
//! at module level:
//!
//! ```text
//! //! Checks on core profiles.
//!
//! /// Electron temperature must be positive.
//! fn positive_te(cp) {
//!     for p in cp.profiles_1d {
//!         check(p.electrons.temperature > 0, "negative Te");
//!     }
//! }
//!
//! validator("positive_te", ["core_profiles"], #{ version: ">=3.39" });
//! ```
//!
//! Module-level code runs once at load time with `validator` available and
//! `check` absent. Rule bodies run later on the execution engine, where
//! `check` records results through the task's [`RecordingContext`].

mod bindings;
mod docs;
mod locals;


use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ids_core::config::RulesConfig;
use rhai::module_resolvers::DummyModuleResolver;
use rhai::{Array, CallFnOptions, Dynamic, Engine, EvalAltResult, Map, Position, Scope, AST};
use tracing::{debug, info};

use crate::error::RuleDefinitionError;
use crate::results::RecordingContext;
use crate::rule::Rule;

pub(crate) use self::bindings::{is_skip_signal, observed_argument};
pub(crate) use self::docs::module_doc;
pub use self::locals::ScopeSnapshot;

/// Bounds applied to every script evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EngineLimits {
    pub max_operations: u64,
    pub max_call_levels: usize,
    /// Parser nesting limits for module-level code and function bodies.
    /// Rhai's own defaults are too low for debug builds.
    pub max_expr_depth: usize,
    pub max_function_expr_depth: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_operations: ids_core::config::DEFAULT_MAX_OPERATIONS,
            max_call_levels: 64,
            max_expr_depth: 256,
            max_function_expr_depth: 128,
        }
    }
}

impl EngineLimits {
    pub fn from_config(config: &RulesConfig) -> Self {
        Self {
            max_operations: config.max_operations,
            ..Self::default()
        }
    }
}

// ── Compiled rule files ───────────────────────────────────────

/// A compiled rule file shared by all rules it registers.
pub struct RuleScript {
    pub path: PathBuf,
    pub ruleset: String,
    pub ast: AST,
    /// Module docstring from leading `//!` lines.
    pub doc: String,
    lines: Vec<String>,
    function_docs: HashMap<String, String>,
}

impl fmt::Debug for RuleScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleScript")
            .field("path", &self.path)
            .field("ruleset", &self.ruleset)
            .finish_non_exhaustive()
    }
}

impl RuleScript {
    fn new(path: &Path, ruleset: &str, ast: AST, source: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            ruleset: ruleset.to_string(),
            ast,
            doc: docs::module_doc(source),
            lines: source.lines().map(String::from).collect(),
            function_docs: docs::function_docs(source),
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Trimmed source line, 1-based.
    pub fn line(&self, line: usize) -> Option<&str> {
        line.checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(|l| l.trim())
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn function_doc(&self, name: &str) -> Option<&str> {
        self.function_docs.get(name).map(String::as_str)
    }

    pub fn has_function(&self, name: &str, arity: usize) -> bool {
        self.ast
            .iter_functions()
            .any(|f| f.name == name && f.params.len() == arity)
    }
}

// ── Engines ───────────────────────────────────────────────────

fn base_engine(limits: EngineLimits) -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(limits.max_operations);
    engine.set_max_call_levels(limits.max_call_levels);
    engine.set_max_expr_depths(limits.max_expr_depth, limits.max_function_expr_depth);
    engine.set_module_resolver(DummyModuleResolver::new());
    engine.disable_symbol("eval");
    engine.on_print(|text| info!(target: "rule_script", "{text}"));
    engine.on_debug(|text, source, pos| {
        debug!(target: "rule_script", source = source.unwrap_or(""), line = ?pos.line(), "{text}")
    });
    bindings::register_api(&mut engine);
    engine
}

/// Engine that runs rule bodies.
pub struct ScriptEngine {
    engine: Engine,
}

impl ScriptEngine {
    pub fn new(limits: EngineLimits) -> Self {
        let mut engine = base_engine(limits);
        bindings::register_check(&mut engine);
        Self { engine }
    }

    /// Like [`ScriptEngine::new`], but every step records the running
    /// function's scope into the task's [`ScopeSnapshot`].
    pub fn with_scope_tracking(limits: EngineLimits) -> Self {
        let mut script = Self::new(limits);
        locals::register_scope_tracking(&mut script.engine);
        script
    }

    /// Call the rule's function with one argument per bound entity. The
    /// recording context travels with the call and is read back by `check`.
    pub fn call_rule(
        &self,
        rule: &Rule,
        args: Vec<Dynamic>,
        context: RecordingContext,
    ) -> Result<(), Box<EvalAltResult>> {
        let options = CallFnOptions::new()
            .eval_ast(false)
            .rewind_scope(true)
            .with_tag(context);
        self.engine
            .call_fn_with_options::<Dynamic>(options, &mut Scope::new(), &rule.script.ast, &rule.function, args)
            .map(|_| ())
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new(EngineLimits::default())
    }
}

// ── Loading ───────────────────────────────────────────────────

#[derive(Debug)]
struct Registration {
    function: String,
    patterns: Vec<String>,
    version: String,
    doc: Option<String>,
}

type Registrations = Arc<Mutex<Vec<Registration>>>;

fn runtime_error(message: impl Into<String>) -> Box<EvalAltResult> {
    EvalAltResult::ErrorRuntime(message.into().into(), Position::NONE).into()
}

fn register(sink: &Registrations, function: &str, patterns: Array, options: Map) -> Result<(), Box<EvalAltResult>> {
    let patterns = patterns
        .into_iter()
        .map(|p| {
            p.into_string()
                .map_err(|t| runtime_error(format!("validator(): entity patterns must be strings, got {t}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut version = String::new();
    let mut doc = None;
    for (key, value) in options {
        match key.as_str() {
            "version" => {
                version = value
                    .into_string()
                    .map_err(|t| runtime_error(format!("validator(): version must be a string, got {t}")))?;
            }
            "doc" => doc = Some(value.to_string()),
            other => return Err(runtime_error(format!("validator(): unknown option '{other}'"))),
        }
    }

    sink.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(Registration {
            function: function.to_string(),
            patterns,
            version,
            doc,
        });
    Ok(())
}

fn register_validator(engine: &mut Engine, sink: &Registrations) {
    let s = Arc::clone(sink);
    engine.register_fn("validator", move |function: &str, patterns: Array| {
        register(&s, function, patterns, Map::new())
    });
    let s = Arc::clone(sink);
    engine.register_fn("validator", move |function: &str, patterns: Array, options: Map| {
        register(&s, function, patterns, options)
    });
    let s = Arc::clone(sink);
    engine.register_fn("validator", move |function: &str, pattern: &str| {
        register(&s, function, vec![Dynamic::from(pattern.to_string())], Map::new())
    });
}

/// Compile one rule file and build the rules it registers.
pub fn compile_module(
    source: &str,
    path: &Path,
    ruleset: &str,
    limits: EngineLimits,
) -> Result<Vec<Rule>, RuleDefinitionError> {
    let registrations: Registrations = Arc::new(Mutex::new(Vec::new()));
    let mut engine = base_engine(limits);
    register_validator(&mut engine, &registrations);

    let mut ast = engine
        .compile(source)
        .map_err(|e| RuleDefinitionError::Parse(e.to_string()))?;
    ast.set_source(path.display().to_string());
    engine
        .run_ast(&ast)
        .map_err(|e| RuleDefinitionError::Registration(e.to_string()))?;

    let script = Arc::new(RuleScript::new(path, ruleset, ast, source));
    let registrations = std::mem::take(&mut *registrations.lock().unwrap_or_else(PoisonError::into_inner));

    let mut seen = HashSet::new();
    let mut rules = Vec::with_capacity(registrations.len());
    for reg in registrations {
        if reg.patterns.is_empty() {
            return Err(RuleDefinitionError::NoPatterns { function: reg.function });
        }
        if !seen.insert(reg.function.clone()) {
            return Err(RuleDefinitionError::Duplicate { function: reg.function });
        }
        if !script.has_function(&reg.function, reg.patterns.len()) {
            return Err(RuleDefinitionError::UnknownFunction {
                arity: reg.patterns.len(),
                function: reg.function,
            });
        }
        let doc = reg
            .doc
            .or_else(|| script.function_doc(&reg.function).map(String::from))
            .unwrap_or_default();
        let rule = Rule::new(Arc::clone(&script), &reg.function, &reg.patterns, &reg.version, doc)?;
        debug!(rule = %rule.name, patterns = ?rule.entity_patterns(), version = %rule.version, "registered rule");
        rules.push(rule);
    }
    Ok(rules)
}
