use std::collections::HashMap;

use ratchet_model::ToolDeclaration;

use crate::tool::{AnyTool, Tool, ToolObject};

/// A registry of named tools the backend may request.
///
/// The registry is built once, before a loop starts, and is read-only for
/// the duration of a run. Wrapped in an `Arc` it can be shared across
/// concurrent loop invocations.
#[derive(Default)]
pub struct Registry {
    tools: HashMap<String, Box<dyn ToolObject>>,
}

impl Registry {
    /// Registers a tool. A tool registered later under the same name
    /// replaces the earlier one.
    pub fn add_tool<T: Tool>(&mut self, tool: T) {
        let name = tool.name().to_owned();
        self.tools.insert(name, Box::new(AnyTool(tool)));
    }

    /// Looks up a tool by name.
    #[inline]
    pub(crate) fn lookup(&self, name: &str) -> Option<&dyn ToolObject> {
        self.tools.get(name).map(|tool| &**tool)
    }

    /// Whether a tool with the given name is registered.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Exports the declarations of all registered tools for the backend.
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        let mut declarations: Vec<ToolDeclaration> = self
            .tools
            .values()
            .map(|tool| ToolDeclaration {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect();
        // HashMap iteration order is unstable; keep declarations
        // deterministic for reproducible requests.
        declarations.sort_by(|a, b| a.name.cmp(&b.name));
        declarations
    }

    /// Returns the number of registered tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry has no tools.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::future::ready;

    use serde_json::{Value, json};

    use super::*;
    use crate::tool::ToolResult;

    static EMPTY_SCHEMA: &Value = &Value::Null;

    struct NoOpTool;

    impl Tool for NoOpTool {
        type Input = NoOpInput;

        fn name(&self) -> &str {
            "no_op"
        }

        fn description(&self) -> &str {
            "Does nothing"
        }

        fn parameter_schema(&self) -> &Value {
            EMPTY_SCHEMA
        }

        fn side_effect_free(&self) -> bool {
            true
        }

        fn execute(
            &self,
            _input: NoOpInput,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            ready(Ok("ok".to_owned()))
        }
    }

    #[derive(serde::Deserialize)]
    struct NoOpInput {
        #[allow(dead_code)]
        tag: String,
    }

    #[test]
    fn test_lookup_and_declarations() {
        let mut registry = Registry::default();
        registry.add_tool(NoOpTool);

        assert!(registry.contains("no_op"));
        assert!(registry.lookup("no_op").is_some());
        assert!(registry.lookup("ghost").is_none());
        assert_eq!(registry.len(), 1);

        let declarations = registry.declarations();
        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0].name, "no_op");
        assert_eq!(declarations[0].description, "Does nothing");
    }

    #[tokio::test]
    async fn test_invalid_arguments_become_errors() {
        let mut registry = Registry::default();
        registry.add_tool(NoOpTool);

        let tool = registry.lookup("no_op").unwrap();
        let result = tool.execute(json!({ "tag": 42 })).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), crate::tool::ErrorKind::InvalidInput);

        let result = tool.execute(json!({ "tag": "fine" })).await;
        assert_eq!(result, Ok("ok".to_owned()));
    }
}
