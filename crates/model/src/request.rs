use serde_json::Value;

/// A request to be sent to the model backend.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerateRequest {
    /// The input messages.
    pub messages: Vec<TurnMessage>,
    /// Tools that are available to the backend.
    pub tools: Vec<ToolDeclaration>,
    /// Sampling options for this request.
    pub config: GenerateConfig,
}

/// A complete message.
#[derive(Clone, Debug, PartialEq)]
pub enum TurnMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// An agent-produced text.
    Agent(String),
    /// A tool call observation.
    Tool(ToolCallOutcome),
}

/// The recorded outcome of calling a tool, fed back to the backend as an
/// observation on the next request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolCallOutcome {
    /// The unique identifier of the tool call request this answers.
    pub id: String,
    /// The name of the tool that was invoked (or requested).
    pub name: String,
    /// The tool output, or a description of the failure.
    pub content: String,
    /// Whether the invocation succeeded.
    pub success: bool,
}

/// Describes a tool that can be used by the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolDeclaration {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// For most backends, the parameters should typically be defined by a
    /// [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}

/// Sampling options recognized by backends.
///
/// Backends ignore options they cannot honor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerateConfig {
    /// Sampling temperature, in `0.0..=2.0`.
    pub temperature: Option<f32>,
    /// Upper bound on generated tokens.
    pub max_output_tokens: Option<u32>,
    /// Sequences that stop generation when produced.
    pub stop_sequences: Vec<String>,
    /// The requested output shape.
    pub response_format: ResponseFormat,
}

/// The output shape requested from the backend.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ResponseFormat {
    /// Free-form text.
    #[default]
    Text,
    /// A JSON document, optionally constrained by a schema.
    Json {
        /// The JSON schema the output must validate against, if any.
        schema: Option<Value>,
    },
}
