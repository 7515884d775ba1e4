// src/tools/mod.rs — Tool registry: compile once, dispatch by id

pub mod coerce;
pub mod defaults;
pub mod script;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rhai::Engine;

use crate::core::markers::ToolInvocation;
use crate::core::types::{Agent, Tool};
use crate::core::workspace::Workspace;
use crate::infra::errors::EvoError;

use self::script::CompiledScript;

/// Compiled tool scripts keyed by tool fingerprint, plus the engine they run
/// on. Registries built from the same cache compile each definition once.
pub struct ScriptCache {
    engine: Engine,
    compiled: Mutex<HashMap<String, Arc<CompiledScript>>>,
}

impl ScriptCache {
    pub fn new() -> Self {
        Self {
            engine: script::create_tool_engine(),
            compiled: Mutex::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Number of distinct definitions compiled so far.
    pub fn len(&self) -> usize {
        self.compiled.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn load(&self, tool: &Tool) -> Result<Arc<CompiledScript>, EvoError> {
        let fingerprint = tool.fingerprint();
        let cached = self
            .compiled
            .lock()
            .map_err(|_| EvoError::LockPoisoned)?
            .get(&fingerprint)
            .cloned();
        if let Some(hit) = cached {
            return Ok(hit);
        }
        // Compile outside the lock; a concurrent duplicate compile is harmless.
        let script = Arc::new(CompiledScript::compile(&self.engine, tool)?);
        self.compiled
            .lock()
            .map_err(|_| EvoError::LockPoisoned)?
            .insert(fingerprint, script.clone());
        tracing::debug!(tool = %tool.id, "Compiled tool script");
        Ok(script)
    }
}

impl Default for ScriptCache {
    fn default() -> Self {
        Self::new()
    }
}

struct RegisteredTool {
    def: Tool,
    script: Arc<CompiledScript>,
}

/// Maps tool id to its definition and compiled script.
///
/// Compilation and signature checks happen in `register`, so a registry that
/// built successfully only holds loadable tools. Invocation never recompiles.
pub struct ToolRegistry {
    scripts: Arc<ScriptCache>,
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_cache(Arc::new(ScriptCache::new()))
    }

    /// A registry that reuses scripts already compiled into `scripts`.
    pub fn with_cache(scripts: Arc<ScriptCache>) -> Self {
        Self {
            scripts,
            tools: HashMap::new(),
        }
    }

    /// Build a registry from tool definitions; fails on the first tool that
    /// does not load.
    pub fn build(tools: &[Tool]) -> Result<Self, EvoError> {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool.clone())?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, tool: Tool) -> Result<(), EvoError> {
        if defaults::is_default_tool(&tool.id) {
            tracing::debug!(tool = %tool.id, "Skipping redefinition of default tool");
            return Ok(());
        }
        if let Some(existing) = self.tools.get(&tool.id) {
            if existing.def.fingerprint() == tool.fingerprint() {
                return Ok(());
            }
        }
        let script = self.scripts.load(&tool)?;
        tracing::debug!(tool = %tool.id, "Registered tool");
        self.tools
            .insert(tool.id.clone(), RegisteredTool { def: tool, script });
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Tool> {
        defaults::definition(id).or_else(|| self.tools.get(id).map(|t| &t.def))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tools visible to `agent`: the defaults, then its own, in declared order.
    pub fn catalogue_for(&self, agent: &Agent) -> Vec<&Tool> {
        let mut out: Vec<&Tool> = defaults::definitions().iter().collect();
        for id in &agent.tool_ids {
            if defaults::is_default_tool(id) {
                continue;
            }
            if let Some(t) = self.tools.get(id) {
                out.push(&t.def);
            }
        }
        out
    }

    /// Resolve a name from a tool-call marker to a tool the agent may use.
    /// Matches by tool name first, then by id.
    fn resolve<'a>(&'a self, agent: &Agent, name: &str) -> Option<&'a Tool> {
        let catalogue = self.catalogue_for(agent);
        catalogue
            .iter()
            .find(|t| t.name == name)
            .or_else(|| catalogue.iter().find(|t| t.id == name))
            .copied()
            .or_else(|| defaults::definition(name))
    }

    /// Execute one invocation on behalf of `agent`.
    ///
    /// Argument, execution and lookup failures come back as `Err`; the caller
    /// feeds them to the agent as text.
    pub fn execute(
        &self,
        agent: &Agent,
        call: &ToolInvocation,
        workspace: &mut Workspace,
    ) -> Result<String, EvoError> {
        let tool = self
            .resolve(agent, &call.tool)
            .ok_or_else(|| EvoError::ToolNotFound(call.tool.clone()))?;

        let args = coerce::coerce_arguments(tool, &call.arguments)?;

        if defaults::is_default_tool(&tool.id) {
            return defaults::execute(&tool.id, &call.arguments, workspace);
        }

        let registered = self
            .tools
            .get(&tool.id)
            .ok_or_else(|| EvoError::ToolNotFound(call.tool.clone()))?;
        let value = registered.script.call(self.scripts.engine(), args)?;
        Ok(coerce::render_output(&value, &registered.def.returns))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ParamType, ReturnSpec, ToolParameter};
    use std::collections::BTreeMap;

    fn adder() -> Tool {
        Tool {
            id: "adder".into(),
            name: "add".into(),
            description: "Add two integers".into(),
            parameters: ["a", "b"]
                .iter()
                .map(|n| ToolParameter {
                    name: n.to_string(),
                    param_type: ParamType::Integer,
                    description: String::new(),
                    required: true,
                    default: None,
                })
                .collect(),
            returns: ReturnSpec::default(),
            code: "fn add(a, b) { a + b }".into(),
        }
    }

    fn call(tool: &str, args: &[(&str, &str)]) -> ToolInvocation {
        ToolInvocation {
            tool: tool.into(),
            arguments: args
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_build_rejects_unloadable_tool() {
        let mut bad = adder();
        bad.code = "fn subtract(a, b) { a - b }".into();
        assert!(matches!(
            ToolRegistry::build(&[bad]),
            Err(EvoError::ToolLoad { .. })
        ));
    }

    #[test]
    fn test_execute_by_name_and_id() {
        let registry = ToolRegistry::build(&[adder()]).unwrap();
        let agent = Agent::new("a", "A", "p").with_tools(&["adder"]);
        let mut ws = Workspace::new();

        let out = registry
            .execute(&agent, &call("add", &[("a", "2"), ("b", "40")]), &mut ws)
            .unwrap();
        assert_eq!(out, "42");
        let out = registry
            .execute(&agent, &call("adder", &[("a", "1"), ("b", "1")]), &mut ws)
            .unwrap();
        assert_eq!(out, "2");
    }

    #[test]
    fn test_missing_required_argument_is_argument_error() {
        let registry = ToolRegistry::build(&[adder()]).unwrap();
        let agent = Agent::new("a", "A", "p").with_tools(&["adder"]);
        let err = registry
            .execute(&agent, &call("add", &[("a", "2")]), &mut Workspace::new())
            .unwrap_err();
        assert!(matches!(err, EvoError::Argument { .. }));
        assert!(err.to_string().contains("Missing required arguments: b"));
    }

    #[test]
    fn test_tool_not_allowed_for_agent() {
        let registry = ToolRegistry::build(&[adder()]).unwrap();
        let agent = Agent::new("a", "A", "p");
        let err = registry
            .execute(&agent, &call("add", &[("a", "1"), ("b", "2")]), &mut Workspace::new())
            .unwrap_err();
        assert!(matches!(err, EvoError::ToolNotFound(_)));
        assert_eq!(err.to_string(), "Tool 'add' not found");
    }

    #[test]
    fn test_default_tools_always_available() {
        let registry = ToolRegistry::new();
        let agent = Agent::new("a", "A", "p");
        let mut ws = Workspace::new();
        registry
            .execute(
                &agent,
                &call("write_file", &[("file_path", "a.txt"), ("content", "x")]),
                &mut ws,
            )
            .unwrap();
        assert_eq!(ws.read("a.txt").unwrap(), "x");
        // legacy id resolves too
        let out = registry
            .execute(&agent, &call("file_reader", &[("file_path", "a.txt")]), &mut ws)
            .unwrap();
        assert!(out.contains("Content:\nx"));
    }

    #[test]
    fn test_catalogue_lists_defaults_first() {
        let registry = ToolRegistry::build(&[adder()]).unwrap();
        let agent = Agent::new("a", "A", "p").with_tools(&["adder", "read_file"]);
        let names: Vec<_> = registry
            .catalogue_for(&agent)
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, vec!["read_file", "write_file", "add"]);
    }

    #[test]
    fn test_register_same_definition_twice_is_noop() {
        let mut registry = ToolRegistry::build(&[adder()]).unwrap();
        registry.register(adder()).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_shared_cache_compiles_each_definition_once() {
        let cache = Arc::new(ScriptCache::new());
        for _ in 0..3 {
            let mut registry = ToolRegistry::with_cache(cache.clone());
            registry.register(adder()).unwrap();
            let agent = Agent::new("a", "A", "p").with_tools(&["adder"]);
            let out = registry
                .execute(&agent, &call("add", &[("a", "1"), ("b", "2")]), &mut Workspace::new())
                .unwrap();
            assert_eq!(out, "3");
        }
        assert_eq!(cache.len(), 1);

        let mut changed = adder();
        changed.code = "fn add(a, b) { b + a }".into();
        ToolRegistry::with_cache(cache.clone()).register(changed).unwrap();
        assert_eq!(cache.len(), 2);
    }
}
