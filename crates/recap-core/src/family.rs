use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider family of a hosted model. Each family has its own request and response contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Nova,
    Claude,
    Llama,
    Mistral,
    Jamba,
    Cohere,
    Unknown,
}

impl ModelFamily {
    pub const KNOWN: [ModelFamily; 6] = [
        ModelFamily::Nova,
        ModelFamily::Claude,
        ModelFamily::Llama,
        ModelFamily::Mistral,
        ModelFamily::Jamba,
        ModelFamily::Cohere,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModelFamily::Nova => "nova",
            ModelFamily::Claude => "claude",
            ModelFamily::Llama => "llama",
            ModelFamily::Mistral => "mistral",
            ModelFamily::Jamba => "jamba",
            ModelFamily::Cohere => "cohere",
            ModelFamily::Unknown => "unknown",
        }
    }

    pub fn is_known(self) -> bool {
        self != ModelFamily::Unknown
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Family signatures in declaration order. Earlier entries win ties.
const SIGNATURES: [(&str, ModelFamily); 6] = [
    ("amazon.nova", ModelFamily::Nova),
    ("anthropic.claude", ModelFamily::Claude),
    ("meta.llama", ModelFamily::Llama),
    ("mistral.", ModelFamily::Mistral),
    ("ai21.jamba", ModelFamily::Jamba),
    ("cohere.command", ModelFamily::Cohere),
];

/// Map a model identifier to its family.
///
/// A signature matches when the identifier starts with it or carries it right
/// after a `.`, which covers cross-region profiles like `us.anthropic.claude-…`.
/// The longest matching signature wins; unmatched identifiers map to
/// [`ModelFamily::Unknown`].
pub fn classify(model_id: &str) -> ModelFamily {
    let id = model_id.trim().to_ascii_lowercase();
    let mut best: Option<(usize, ModelFamily)> = None;

    for (signature, family) in SIGNATURES {
        if !signature_matches(&id, signature) {
            continue;
        }
        match best {
            Some((len, _)) if len >= signature.len() => {}
            _ => best = Some((signature.len(), family)),
        }
    }

    best.map_or(ModelFamily::Unknown, |(_, family)| family)
}

fn signature_matches(id: &str, signature: &str) -> bool {
    if id.starts_with(signature) {
        return true;
    }
    id.match_indices(signature)
        .any(|(idx, _)| idx > 0 && id.as_bytes()[idx - 1] == b'.')
}
