use crate::config::AiProvider;
use anyhow::Result;
use log::info;
use serde::Deserialize;
use ureq::Agent;

#[cfg(test)]
use mockall::automock;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const OPENAI_MODEL: &str = "gpt-4o-mini";
const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
const OPENROUTER_MODEL: &str = "openai/gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You are a music discovery assistant. Given a summary of a \
listener's taste, suggest artists they are not already listening to. Respond with a JSON \
array of objects like {\"type\": \"artist\", \"name\": \"...\", \"reason\": \"...\"}. You \
may also include broader listening directions as {\"type\": \"direction\", \
\"description\": \"...\"}. No prose outside the JSON array.";

/// Something that can turn a taste summary into raw recommendation text.
/// May be unavailable; callers must treat failures as "no recommendations".
#[cfg_attr(test, automock)]
pub trait Recommender {
    fn recommend(&self, taste_summary: &str) -> Result<String>;
}

/// A chat-completions client for whichever provider is configured
pub struct OracleClient {
    agent: Agent,
    base_url: &'static str,
    model: &'static str,
    provider_name: &'static str,
    api_key: String,
}

impl OracleClient {
    /// Build a client for the configured provider, or `None` when AI
    /// discovery is disabled.
    pub fn from_provider(provider: AiProvider, api_key: Option<&str>) -> Option<Self> {
        let key = api_key?.to_string();
        let (base_url, model, provider_name) = match provider {
            AiProvider::OpenAi => (OPENAI_API_BASE, OPENAI_MODEL, "openai"),
            AiProvider::OpenRouter => (OPENROUTER_API_BASE, OPENROUTER_MODEL, "openrouter"),
            AiProvider::None => return None,
        };

        Some(OracleClient {
            agent: Agent::new(),
            base_url,
            model,
            provider_name,
            api_key: key,
        })
    }
}

impl Recommender for OracleClient {
    fn recommend(&self, taste_summary: &str) -> Result<String> {
        info!("Requesting artist suggestions from {}", self.provider_name);

        let request = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": taste_summary},
            ],
            "temperature": 0.8,
        });

        let response = self
            .agent
            .post(&format!("{}/chat/completions", self.base_url))
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(request)
            .map_err(|e| anyhow::anyhow!("Oracle request failed: {}", e))?;

        let body = response.into_string()?;
        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow::anyhow!("Failed to parse oracle response: {}", e))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("Oracle returned no choices"))
    }
}

/// One entry of the oracle's suggestion array. Unknown or missing fields are
/// tolerated; the model does not always follow the schema.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArtistSuggestion {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ArtistSuggestion {
    /// The artist to expand, when this entry names one. Direction entries and
    /// nameless entries yield nothing.
    pub fn artist_name(&self) -> Option<&str> {
        let name = self.name.as_deref()?.trim();
        if name.is_empty() {
            return None;
        }
        if self.kind.is_empty() || self.kind.eq_ignore_ascii_case("artist") {
            Some(name)
        } else {
            None
        }
    }
}

/// Extract a suggestion array from free-form oracle output. Tries, in order:
/// the whole trimmed response; the span from the first `[` to the last `]`;
/// every balanced `[...]` span, accepting the first that parses non-empty.
/// Nothing parseable means no recommendations, never an error.
pub fn parse_artist_suggestions(raw: &str) -> Vec<ArtistSuggestion> {
    let trimmed = raw.trim();

    if let Ok(parsed) = serde_json::from_str::<Vec<ArtistSuggestion>>(trimmed) {
        return parsed;
    }

    if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']')) {
        if start < end {
            if let Ok(parsed) = serde_json::from_str::<Vec<ArtistSuggestion>>(&trimmed[start..=end])
            {
                return parsed;
            }
        }
    }

    for span in balanced_spans(trimmed) {
        if let Ok(parsed) = serde_json::from_str::<Vec<ArtistSuggestion>>(span) {
            if !parsed.is_empty() {
                return parsed;
            }
        }
    }

    Vec::new()
}

/// Top-level `[...]` spans by bracket depth. Brackets inside JSON strings are
/// not understood, which is fine for a last-resort salvage pass.
fn balanced_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut start = None;
    let mut depth = 0usize;

    for (i, byte) in text.bytes().enumerate() {
        match byte {
            b'[' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b']' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start.take() {
                            spans.push(&text[s..=i]);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    spans
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}
