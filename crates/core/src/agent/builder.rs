use std::sync::Arc;
use std::time::Duration;

use ratchet_model::{GenerateConfig, ModelBackend};

use super::AgentLoop;
use crate::backend_client::BackendClient;
use crate::cancel::CancelToken;
use crate::context::{ContextConfig, ContextManager};
use crate::retry::RetryPolicy;
use crate::tool::{Registry, Tool};

/// Builder of [`AgentLoop`].
pub struct AgentLoopBuilder {
    client: BackendClient,
    registry: Registry,
    shared_registry: Option<Arc<Registry>>,
    system_prompt: Option<String>,
    generate_config: GenerateConfig,
    max_steps: u32,
    max_duration: Duration,
    retry_policy: RetryPolicy,
    context_config: ContextConfig,
    tool_fan_out: usize,
    cancel: CancelToken,
}

impl AgentLoopBuilder {
    /// Creates a builder driving the given backend, with default bounds
    /// (10 steps, 120 seconds) and no tools.
    pub fn with_backend<B: ModelBackend + 'static>(backend: B) -> Self {
        Self {
            client: BackendClient::new(backend),
            registry: Registry::default(),
            shared_registry: None,
            system_prompt: None,
            generate_config: GenerateConfig::default(),
            max_steps: 10,
            max_duration: Duration::from_secs(120),
            retry_policy: RetryPolicy::default(),
            context_config: ContextConfig::default(),
            tool_fan_out: 4,
            cancel: CancelToken::new(),
        }
    }

    /// Registers a tool the backend may call.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.registry.add_tool(tool);
        self
    }

    /// Uses a pre-built registry shared across loop invocations,
    /// replacing any tools registered via [`Self::with_tool`].
    #[inline]
    pub fn with_shared_registry(mut self, registry: Arc<Registry>) -> Self {
        self.shared_registry = Some(registry);
        self
    }

    /// Sets the system prompt prepended to the conversation.
    #[inline]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the generation parameters forwarded to the backend.
    #[inline]
    pub fn with_generate_config(mut self, config: GenerateConfig) -> Self {
        self.generate_config = config;
        self
    }

    /// Sets the maximum number of loop steps.
    #[inline]
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Sets the wall-clock budget of one run.
    #[inline]
    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    /// Sets the retry policy for backend calls and tool invocations.
    #[inline]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the context-size management configuration.
    #[inline]
    pub fn with_context_config(mut self, config: ContextConfig) -> Self {
        self.context_config = config;
        self
    }

    /// Sets the concurrency bound for side-effect-free tool dispatch.
    #[inline]
    pub fn with_tool_fan_out(mut self, fan_out: usize) -> Self {
        self.tool_fan_out = fan_out;
        self
    }

    /// Attaches a cancellation token checked between steps.
    #[inline]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Builds the loop. Bounds are validated when the run starts, not
    /// here.
    pub fn build(self) -> AgentLoop {
        let registry = self
            .shared_registry
            .unwrap_or_else(|| Arc::new(self.registry));
        AgentLoop {
            client: self.client,
            registry,
            system_prompt: self.system_prompt,
            generate_config: self.generate_config,
            max_steps: self.max_steps,
            max_duration: self.max_duration,
            retry_policy: self.retry_policy,
            context: ContextManager::new(self.context_config),
            tool_fan_out: self.tool_fan_out,
            cancel: self.cancel,
        }
    }
}
