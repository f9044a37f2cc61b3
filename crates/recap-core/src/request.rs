use serde::Serialize;

use crate::error::{GenerationConfigError, UnsupportedFamily};
use crate::family::ModelFamily;

const CLAUDE_BEDROCK_VERSION: &str = "bedrock-2023-05-31";

/// Sampling parameters shared by every family. The builder maps these onto each
/// family's own field names.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

impl GenerationConfig {
    pub fn new(
        temperature: f32,
        top_p: f32,
        max_tokens: u32,
    ) -> Result<Self, GenerationConfigError> {
        if !(0.0..=1.0).contains(&temperature) {
            return Err(GenerationConfigError(format!(
                "temperature must be within 0..=1 (got {temperature})"
            )));
        }
        if !(0.0..=1.0).contains(&top_p) {
            return Err(GenerationConfigError(format!(
                "top_p must be within 0..=1 (got {top_p})"
            )));
        }
        if max_tokens == 0 {
            return Err(GenerationConfigError(
                "max_tokens must be greater than 0".into(),
            ));
        }
        Ok(Self {
            temperature,
            top_p,
            max_tokens,
        })
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn top_p(&self) -> f32 {
        self.top_p
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 2048,
        }
    }
}

/// Outbound request body, one variant per known family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InferenceRequest {
    Nova(NovaRequest),
    Claude(ClaudeRequest),
    Llama(LlamaRequest),
    Mistral(MistralRequest),
    Jamba(JambaRequest),
    Cohere(CohereRequest),
}

impl InferenceRequest {
    pub fn family(&self) -> ModelFamily {
        match self {
            InferenceRequest::Nova(_) => ModelFamily::Nova,
            InferenceRequest::Claude(_) => ModelFamily::Claude,
            InferenceRequest::Llama(_) => ModelFamily::Llama,
            InferenceRequest::Mistral(_) => ModelFamily::Mistral,
            InferenceRequest::Jamba(_) => ModelFamily::Jamba,
            InferenceRequest::Cohere(_) => ModelFamily::Cohere,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NovaRequest {
    pub messages: Vec<NovaMessage>,
    #[serde(rename = "inferenceConfig")]
    pub inference_config: NovaInferenceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NovaMessage {
    pub role: &'static str,
    pub content: Vec<NovaContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NovaContentBlock {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NovaInferenceConfig {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaudeRequest {
    pub anthropic_version: &'static str,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlamaRequest {
    pub prompt: String,
    pub max_gen_len: u32,
    pub temperature: f32,
    pub top_p: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MistralRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JambaRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohereRequest {
    pub message: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub p: f32,
}

fn user_message(prompt: &str) -> Vec<ChatMessage> {
    vec![ChatMessage {
        role: "user",
        content: prompt.to_string(),
    }]
}

/// Build the request body for `family`. Fails only for [`ModelFamily::Unknown`].
pub fn build(
    family: ModelFamily,
    model_id: &str,
    prompt: &str,
    cfg: &GenerationConfig,
) -> Result<InferenceRequest, UnsupportedFamily> {
    let request = match family {
        ModelFamily::Nova => InferenceRequest::Nova(NovaRequest {
            messages: vec![NovaMessage {
                role: "user",
                content: vec![NovaContentBlock {
                    text: prompt.to_string(),
                }],
            }],
            inference_config: NovaInferenceConfig {
                max_new_tokens: cfg.max_tokens,
                temperature: cfg.temperature,
                top_p: cfg.top_p,
            },
        }),
        ModelFamily::Claude => InferenceRequest::Claude(ClaudeRequest {
            anthropic_version: CLAUDE_BEDROCK_VERSION,
            messages: user_message(prompt),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            top_p: cfg.top_p,
        }),
        ModelFamily::Llama => InferenceRequest::Llama(LlamaRequest {
            prompt: prompt.to_string(),
            max_gen_len: cfg.max_tokens,
            temperature: cfg.temperature,
            top_p: cfg.top_p,
        }),
        ModelFamily::Mistral => InferenceRequest::Mistral(MistralRequest {
            prompt: format!("<s>[INST] {prompt} [/INST]"),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            top_p: cfg.top_p,
        }),
        ModelFamily::Jamba => InferenceRequest::Jamba(JambaRequest {
            messages: user_message(prompt),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            top_p: cfg.top_p,
        }),
        ModelFamily::Cohere => InferenceRequest::Cohere(CohereRequest {
            message: prompt.to_string(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            p: cfg.top_p,
        }),
        ModelFamily::Unknown => {
            return Err(UnsupportedFamily {
                model_id: model_id.to_string(),
            });
        }
    };
    Ok(request)
}
