//! Tool-calling agent
//!
//! [`Agent`] runs a think/act/observe loop: the model either asks for
//! function calls, which the host executes through a [`ToolRegistry`] and
//! feeds back, or produces a final text answer. The conversation persists
//! across [`Agent::chat`] calls until [`Agent::reset`].

mod builtin;
mod observer;
mod tool;

pub use builtin::{
    family_tools, pet_care_tools, steward_tools, CurrentWeather, DogFoodCalculator, NameInfo,
    SearchKnowledgeBase, WeatherInfo,
};
pub use observer::{AgentObserver, NoopObserver, TracingObserver};
pub use tool::{parse_args, Tool, ToolError, ToolRegistry};

use crate::config::AgentSettings;
use crate::protocol::{Content, FunctionCallingMode, GenerateContentRequest, Part, Role};
use crate::providers::{GenerativeModel, ProviderError, ProviderResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Returned when the loop ends without an answer
pub const FALLBACK_ANSWER: &str = "抱歉，我思考太久了，有点乱...";

/// Persona of the all-round steward with knowledge base access
pub const STEWARD_AGENT_PROMPT: &str = "\
你是一个全能型智能助手，名字叫“胖墩墩管家”。
你拥有以下强力工具：
1. `search_knowledge_base`: **核心工具**。当问题涉及“我”、“胖墩墩”、“日记”、“以前”或“笔记”等私有信息时，**必须优先调用**此工具查库。
2. `get_current_weather`: 查询实时天气。
3. `calculate_dog_food`: 计算狗粮用量。

思考与行动策略 (ReAct Loop):
- 收到问题后，先分析需要哪些信息。
- 遇到私有知识，调 `search_knowledge_base`。
- 遇到客观事实，调 `get_current_weather`。
- 拿到工具结果后，结合你的常识进行综合回答。";

/// Persona of the plain ReAct agent without memory access
pub const REACT_AGENT_PROMPT: &str = "\
你是一个智能助手 (Agent)。
你拥有查询天气和计算数据的工具。

解决问题的步骤：
1. 思考 (Thought): 分析用户的问题，决定需要什么信息。
2. 行动 (Action): 如果需要外部信息，请调用相应的工具。
3. 观察 (Observation): 查看工具返回的结果。
4. 循环: 如果信息不足，重复上述步骤。
5. 回答 (Answer): 当信息充足时，直接回答用户。

注意：禁止编造数据，必须依赖工具返回的结果。";

/// Instruction for the single-shot flow
pub const TOOL_ENFORCER_PROMPT: &str =
    "你是一个助手。如果用户问天气或计算狗粮，**必须**调用工具获取数据，禁止直接回答或编造。";

/// How a [`Agent::chat`] call ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentReply {
    Answer(String),
    /// The model returned neither text nor function calls
    Stalled,
    /// `max_turns` model calls without a final answer
    TurnLimit,
}

impl AgentReply {
    /// Text to show the user
    pub fn text(&self) -> &str {
        match self {
            AgentReply::Answer(text) => text,
            AgentReply::Stalled | AgentReply::TurnLimit => FALLBACK_ANSWER,
        }
    }

    pub fn is_answer(&self) -> bool {
        matches!(self, AgentReply::Answer(_))
    }
}

pub struct Agent {
    model: Arc<dyn GenerativeModel>,
    tools: ToolRegistry,
    system_instruction: String,
    max_turns: u32,
    temperature: f32,
    observer: Arc<dyn AgentObserver>,
    history: Vec<Content>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("model", &self.model.model_id())
            .field("tools", &self.tools)
            .field("max_turns", &self.max_turns)
            .field("history", &self.history.len())
            .finish()
    }
}

impl Agent {
    /// Agent with the steward persona and default settings
    pub fn new(model: Arc<dyn GenerativeModel>, tools: ToolRegistry) -> Self {
        Self::with_settings(model, tools, &AgentSettings::default())
    }

    pub fn with_settings(
        model: Arc<dyn GenerativeModel>,
        tools: ToolRegistry,
        settings: &AgentSettings,
    ) -> Self {
        Self {
            model,
            tools,
            system_instruction: STEWARD_AGENT_PROMPT.to_string(),
            max_turns: settings.max_turns,
            temperature: settings.temperature,
            observer: Arc::new(NoopObserver),
            history: Vec::new(),
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn AgentObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    /// Forget the conversation
    pub fn reset(&mut self) {
        self.history.clear();
    }

    fn request(&self) -> GenerateContentRequest {
        GenerateContentRequest::new(self.history.clone())
            .with_system_instruction(self.system_instruction.clone())
            .with_temperature(self.temperature)
            .with_functions(self.tools.declarations(), FunctionCallingMode::Auto)
    }

    /// Answer `query`, running tools as the model asks for them
    ///
    /// A provider error rolls the history back to where it was before the
    /// call.
    pub async fn chat(&mut self, query: &str) -> ProviderResult<AgentReply> {
        let checkpoint = self.history.len();
        let result = self.run_turns(query).await;
        if result.is_err() {
            self.history.truncate(checkpoint);
        }
        result
    }

    async fn run_turns(&mut self, query: &str) -> ProviderResult<AgentReply> {
        self.history.push(Content::user_text(query));

        for turn in 1..=self.max_turns {
            self.observer.on_turn(turn);
            let response = self.model.generate(&self.request()).await?;
            let Some(content) = response.first_content().cloned() else {
                warn!(turn, "Response carried no content");
                return Ok(AgentReply::Stalled);
            };

            if response.has_function_call() {
                let parts = execute_calls(&self.tools, &content, self.observer.as_ref()).await;
                self.history.push(model_content(content));
                self.history.push(Content {
                    role: Some(Role::User),
                    parts,
                });
                continue;
            }

            match response.text().filter(|t| !t.is_empty()) {
                Some(text) => {
                    self.history.push(model_content(content));
                    self.observer.on_answer(&text);
                    return Ok(AgentReply::Answer(text));
                }
                None => {
                    warn!(turn, "Response held neither text nor function calls");
                    return Ok(AgentReply::Stalled);
                }
            }
        }

        warn!(max_turns = self.max_turns, "Turn limit reached without an answer");
        Ok(AgentReply::TurnLimit)
    }
}

fn model_content(mut content: Content) -> Content {
    content.role.get_or_insert(Role::Model);
    content
}

/// Run every function call in `content` in order, one response part each
async fn execute_calls(
    tools: &ToolRegistry,
    content: &Content,
    observer: &dyn AgentObserver,
) -> Vec<Part> {
    let mut parts = Vec::new();
    for call in content.function_calls() {
        observer.on_tool_call(&call.name, &call.args);
        let result = tools.execute(&call.name, call.args.clone()).await;
        observer.on_tool_result(&call.name, &result);
        parts.push(Part::function_response(call.name.clone(), result));
    }
    debug!(calls = parts.len(), "Tool round finished");
    parts
}

/// One tool-enabled request, at most one tool round, then a plain follow-up
pub async fn single_shot_tool_call(
    model: &dyn GenerativeModel,
    tools: &ToolRegistry,
    system_instruction: &str,
    query: &str,
) -> ProviderResult<String> {
    let mut contents = vec![Content::user_text(query)];
    let request = GenerateContentRequest::new(contents.clone())
        .with_system_instruction(system_instruction)
        .with_temperature(0.0)
        .with_functions(tools.declarations(), FunctionCallingMode::Auto);
    let response = model.generate(&request).await?;

    let content = match response.first_content() {
        Some(content) if response.has_function_call() => content.clone(),
        _ => {
            return response.text().ok_or_else(|| ProviderError::EmptyResponse {
                reason: "reply carried no text".to_string(),
            })
        }
    };

    let parts = execute_calls(tools, &content, &NoopObserver).await;
    contents.push(model_content(content));
    contents.push(Content {
        role: Some(Role::User),
        parts,
    });

    let follow_up = GenerateContentRequest::new(contents)
        .with_system_instruction(system_instruction)
        .with_temperature(0.0);
    let response = model.generate(&follow_up).await?;
    response.text().ok_or_else(|| ProviderError::EmptyResponse {
        reason: "follow-up carried no text".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ScriptedModel;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl AgentObserver for Recorder {
        fn on_turn(&self, turn: u32) {
            self.events.lock().unwrap().push(format!("turn {}", turn));
        }

        fn on_tool_call(&self, name: &str, _args: &Value) {
            self.events.lock().unwrap().push(format!("call {}", name));
        }

        fn on_answer(&self, _text: &str) {
            self.events.lock().unwrap().push("answer".to_string());
        }
    }

    #[tokio::test]
    async fn test_chat_runs_tools_then_answers() {
        let model = Arc::new(ScriptedModel::new());
        model.push_function_calls(vec![
            ("get_current_weather", json!({"city": "常州"})),
            ("calculate_dog_food", json!({"weight_kg": 8.5, "is_active": true})),
        ]);
        model.push_text("常州小雨，建议在家玩；今天吃 306 克。");

        let recorder = Arc::new(Recorder::default());
        let mut agent =
            Agent::new(model.clone(), pet_care_tools()).with_observer(recorder.clone());

        let reply = agent.chat("胖墩墩在常州，8.5kg，今天怎么安排？").await.unwrap();
        assert_eq!(reply, AgentReply::Answer("常州小雨，建议在家玩；今天吃 306 克。".to_string()));

        // user, model calls, tool responses, model answer
        assert_eq!(agent.history().len(), 4);
        let responses = &agent.history()[2];
        assert_eq!(responses.role, Some(Role::User));
        assert_eq!(responses.parts.len(), 2);
        let second = responses.parts[1].function_response.as_ref().unwrap();
        assert_eq!(second.response, json!({"result": 306}));

        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].contents.len(), 3);
        assert!(requests[0].tools.is_some());

        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec!["turn 1", "call get_current_weather", "call calculate_dog_food", "turn 2", "answer"]
        );
    }

    #[tokio::test]
    async fn test_turn_limit() {
        let model = Arc::new(ScriptedModel::new());
        for _ in 0..2 {
            model.push_function_calls(vec![("get_current_weather", json!({}))]);
        }
        let settings = AgentSettings {
            max_turns: 2,
            ..AgentSettings::default()
        };
        let mut agent = Agent::with_settings(model.clone(), pet_care_tools(), &settings);

        let reply = agent.chat("天气？").await.unwrap();
        assert_eq!(reply, AgentReply::TurnLimit);
        assert_eq!(reply.text(), FALLBACK_ANSWER);
        assert_eq!(model.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_stalled_and_unknown_tool() {
        let model = Arc::new(ScriptedModel::new());
        model.push_function_calls(vec![("launch_rocket", json!({}))]);
        model.push_response(crate::protocol::GenerateContentResponse::from_content(Content {
            role: Some(Role::Model),
            parts: vec![],
        }));
        let mut agent = Agent::new(model, pet_care_tools());

        let reply = agent.chat("发射").await.unwrap();
        assert_eq!(reply, AgentReply::Stalled);
        let response = agent.history()[2].parts[0].function_response.as_ref().unwrap();
        assert_eq!(response.response, json!({"result": "Error: Unknown tool launch_rocket"}));
    }

    #[tokio::test]
    async fn test_history_persists_and_rolls_back_on_error() {
        let model = Arc::new(ScriptedModel::from_texts(["你好"]));
        let mut agent = Agent::new(model.clone(), pet_care_tools());

        agent.chat("嗨").await.unwrap();
        assert_eq!(agent.history().len(), 2);

        // script exhausted, the call fails
        assert!(agent.chat("还在吗").await.is_err());
        assert_eq!(agent.history().len(), 2);

        agent.reset();
        assert!(agent.history().is_empty());
    }

    #[tokio::test]
    async fn test_single_shot_tool_call() {
        let model = ScriptedModel::new();
        model.push_function_calls(vec![("get_name_info", json!({"role": "妈妈"}))]);
        model.push_text("妈妈叫霍妮媛");

        let text = single_shot_tool_call(&model, &family_tools(), TOOL_ENFORCER_PROMPT, "妈妈叫什么？")
            .await
            .unwrap();
        assert_eq!(text, "妈妈叫霍妮媛");

        let requests = model.requests();
        assert!(requests[1].tools.is_none());
        assert_eq!(requests[1].contents.len(), 3);
    }
}
