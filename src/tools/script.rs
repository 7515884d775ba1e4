// src/tools/script.rs — Rhai host for user-defined tool code
//
// Tool code runs in a sandboxed interpreter with no I/O. The engine caps
// operations, nesting and collection sizes; that is the extent of the
// isolation. Tool definitions are trusted input.

use rhai::{Array, Dynamic, Engine, Scope, AST};

use super::coerce::ArgValue;
use crate::core::types::Tool;
use crate::infra::errors::EvoError;

/// A tool's compiled script, checked to define the expected function.
pub struct CompiledScript {
    function: String,
    ast: AST,
}

impl CompiledScript {
    /// Compile `tool.code` and verify it defines `fn <tool.name>` taking one
    /// argument per declared parameter.
    pub fn compile(engine: &Engine, tool: &Tool) -> Result<Self, EvoError> {
        let ast = engine.compile(&tool.code).map_err(|e| EvoError::ToolLoad {
            tool: tool.name.clone(),
            message: format!("compile error: {}", e),
        })?;

        let arity = tool.parameters.len();
        let defined: Vec<usize> = ast
            .iter_functions()
            .filter(|f| f.name == tool.name)
            .map(|f| f.params.len())
            .collect();

        if defined.is_empty() {
            return Err(EvoError::ToolLoad {
                tool: tool.name.clone(),
                message: format!("code does not define fn {}", tool.name),
            });
        }
        if !defined.contains(&arity) {
            return Err(EvoError::ToolLoad {
                tool: tool.name.clone(),
                message: format!(
                    "fn {} takes {:?} parameters, tool declares {}",
                    tool.name, defined, arity
                ),
            });
        }

        Ok(Self {
            function: tool.name.clone(),
            ast,
        })
    }

    /// Call the tool function with positional arguments.
    pub fn call(&self, engine: &Engine, args: Vec<ArgValue>) -> Result<serde_json::Value, EvoError> {
        let mut scope = Scope::new();
        let args: Vec<Dynamic> = args.into_iter().map(arg_to_dynamic).collect();

        let result = engine
            .call_fn::<Dynamic>(&mut scope, &self.ast, &self.function, args)
            .map_err(|e| EvoError::ToolExecution {
                tool: self.function.clone(),
                message: e.to_string(),
            })?;

        Ok(dynamic_to_json(&result))
    }
}

/// Create the engine shared by all tool scripts.
///
/// Rhai has no built-in I/O. Only logging is exposed.
pub fn create_tool_engine() -> Engine {
    let mut engine = Engine::new();

    // Set safety limits
    engine.set_max_expr_depths(64, 32);
    engine.set_max_operations(100_000);
    engine.set_max_string_size(1_048_576); // 1MB
    engine.set_max_array_size(10_000);
    engine.set_max_map_size(10_000);
    engine.set_max_call_levels(32);

    engine.register_fn("log", |msg: &str| {
        tracing::info!(target: "tool_script", "{}", msg);
    });
    engine.register_fn("log_warn", |msg: &str| {
        tracing::warn!(target: "tool_script", "{}", msg);
    });

    engine
}

fn arg_to_dynamic(arg: ArgValue) -> Dynamic {
    match arg {
        ArgValue::Str(s) => Dynamic::from(s),
        ArgValue::Int(i) => Dynamic::from(i),
        ArgValue::Float(f) => Dynamic::from(f),
        ArgValue::Bool(b) => Dynamic::from(b),
        ArgValue::List(items) => {
            let arr: Array = items.into_iter().map(Dynamic::from).collect();
            Dynamic::from(arr)
        }
        ArgValue::Unset => Dynamic::UNIT,
    }
}

/// Convert a Rhai Dynamic to a serde_json::Value.
pub fn dynamic_to_json(value: &Dynamic) -> serde_json::Value {
    if value.is_unit() {
        return serde_json::Value::Null;
    }
    if let Ok(b) = value.as_bool() {
        return serde_json::Value::Bool(b);
    }
    if let Ok(i) = value.as_int() {
        return serde_json::Value::from(i);
    }
    if let Ok(f) = value.as_float() {
        return serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null);
    }
    if value.is_string() {
        return serde_json::Value::String(value.to_string());
    }
    if let Some(arr) = value.clone().try_cast::<Array>() {
        return serde_json::Value::Array(arr.iter().map(dynamic_to_json).collect());
    }
    if let Some(map) = value.clone().try_cast::<rhai::Map>() {
        let obj = map
            .iter()
            .map(|(k, v)| (k.to_string(), dynamic_to_json(v)))
            .collect();
        return serde_json::Value::Object(obj);
    }
    serde_json::Value::String(value.to_string())
}
