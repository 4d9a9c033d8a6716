use serde::{Deserialize, Serialize};

/// Conversation roles accepted by the chat-completions endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

#[derive(Serialize, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
        }
    }
}

#[derive(Serialize, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

/// Fully decoded body of a non-streaming chat completion.
///
/// Every field defaults so a sparse or partial body still decodes; the
/// service is the source of truth for which fields it fills in.
#[derive(Deserialize, Debug)]
pub struct ChatResponse {
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub choices: Vec<ResponseChoice>,
    #[serde(default)]
    pub usage: TokenUsage,
}

impl ChatResponse {
    /// Content of the first choice, or `None` when the service returned
    /// an empty choice list.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .map(|choice| choice.message.content.as_str())
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct ResponseChoice {
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub message: ResponseMessage,
}

#[derive(Deserialize, Debug, Default)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Deserialize, Debug, Default)]
pub struct TokenUsage {
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_roles_lowercase_in_order() {
        let request = ChatRequest {
            model: "glm-4".to_string(),
            messages: vec![
                ChatMessage::new(Role::System, "be brief"),
                ChatMessage::new(Role::User, "hello"),
            ],
            stream: true,
        };

        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["model"], "glm-4");
        assert_eq!(encoded["stream"], true);
        assert_eq!(encoded["messages"][0]["role"], "system");
        assert_eq!(encoded["messages"][1]["role"], "user");
        assert_eq!(encoded["messages"][1]["content"], "hello");
    }

    #[test]
    fn absent_tool_call_id_is_not_serialized() {
        let message = ChatMessage::new(Role::User, "hi");
        let encoded = serde_json::to_value(&message).unwrap();
        assert!(encoded.get("tool_call_id").is_none());
    }

    #[test]
    fn unknown_roles_are_rejected() {
        assert!(serde_json::from_str::<Role>(r#""moderator""#).is_err());
    }

    #[test]
    fn full_response_body_decodes() {
        let raw = r#"{
            "created": 1719561600,
            "id": "2024-abc",
            "model": "glm-4",
            "request_id": "req-1",
            "choices": [{
                "finish_reason": "stop",
                "index": 0,
                "message": {"content": "Hello there", "role": "assistant"}
            }],
            "usage": {"completion_tokens": 3, "prompt_tokens": 9, "total_tokens": 12}
        }"#;

        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.id, "2024-abc");
        assert_eq!(response.request_id, "req-1");
        assert_eq!(response.first_content(), Some("Hello there"));
        assert_eq!(response.choices[0].finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.usage.total_tokens, 12);
    }

    #[test]
    fn empty_choice_list_yields_no_content() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert_eq!(response.first_content(), None);
    }
}
