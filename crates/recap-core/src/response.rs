use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ParseError;
use crate::family::ModelFamily;

/// Raw response body as returned by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceResponse {
    body: Vec<u8>,
}

impl InferenceResponse {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self { body: body.into() }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Extract the generated text for `family` from `response`.
///
/// Only the shape belonging to `family` is considered. A missing field, a
/// wrong type or blank text is an error.
pub fn parse(family: ModelFamily, response: &InferenceResponse) -> Result<String, ParseError> {
    let text = match family {
        ModelFamily::Nova => {
            let body: NovaResponse = decode(family, response)?;
            let blocks = body.output.message.content;
            join_blocks(family, "output.message.content", blocks)?
        }
        ModelFamily::Claude => {
            let body: ClaudeResponse = decode(family, response)?;
            join_blocks(family, "content", body.content)?
        }
        ModelFamily::Llama => {
            let body: LlamaResponse = decode(family, response)?;
            body.generation
        }
        ModelFamily::Mistral => {
            let body: MistralResponse = decode(family, response)?;
            body.outputs
                .into_iter()
                .next()
                .ok_or(ParseError::MissingField {
                    family,
                    field: "outputs[0]",
                })?
                .text
        }
        ModelFamily::Jamba => {
            let body: JambaResponse = decode(family, response)?;
            body.choices
                .into_iter()
                .next()
                .ok_or(ParseError::MissingField {
                    family,
                    field: "choices[0]",
                })?
                .message
                .content
        }
        ModelFamily::Cohere => {
            let body: CohereResponse = decode(family, response)?;
            body.text
        }
        ModelFamily::Unknown => return Err(ParseError::UnsupportedFamily),
    };

    if text.trim().is_empty() {
        return Err(ParseError::EmptyText { family });
    }
    Ok(text)
}

fn decode<T: DeserializeOwned>(
    family: ModelFamily,
    response: &InferenceResponse,
) -> Result<T, ParseError> {
    serde_json::from_slice(response.body()).map_err(|e| ParseError::InvalidBody {
        family,
        message: e.to_string(),
    })
}

fn join_blocks(
    family: ModelFamily,
    field: &'static str,
    blocks: Vec<TextBlock>,
) -> Result<String, ParseError> {
    let texts: Vec<String> = blocks.into_iter().filter_map(|block| block.text).collect();
    if texts.is_empty() {
        return Err(ParseError::MissingField { family, field });
    }
    Ok(texts.concat())
}

#[derive(Deserialize)]
struct TextBlock {
    text: Option<String>,
}

#[derive(Deserialize)]
struct NovaResponse {
    output: NovaOutput,
}

#[derive(Deserialize)]
struct NovaOutput {
    message: NovaMessage,
}

#[derive(Deserialize)]
struct NovaMessage {
    content: Vec<TextBlock>,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<TextBlock>,
}

#[derive(Deserialize)]
struct LlamaResponse {
    generation: String,
}

#[derive(Deserialize)]
struct MistralResponse {
    outputs: Vec<MistralOutput>,
}

#[derive(Deserialize)]
struct MistralOutput {
    text: String,
}

#[derive(Deserialize)]
struct JambaResponse {
    choices: Vec<JambaChoice>,
}

#[derive(Deserialize)]
struct JambaChoice {
    message: JambaMessage,
}

#[derive(Deserialize)]
struct JambaMessage {
    content: String,
}

#[derive(Deserialize)]
struct CohereResponse {
    text: String,
}
