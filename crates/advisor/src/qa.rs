//! Retrieval-grounded question answering for parents and kids.

use crate::context::AdvisorContext;
use nutrikid_generation::CompletionRequest;
use serde::{Deserialize, Serialize};

/// Marker the parent prompt asks the model to place between the short and detailed answer.
pub const ANSWER_SEPARATOR: &str = "|||DETAILED|||";

/// Answer returned without calling the backend while the corpus is missing.
pub const SAFE_MODE_NOTICE: &str = "(Mock Response) System is running in safe mode because the \
reference corpus is missing. Please place the vector index and documents JSON at the paths set by \
retrieval.index_path and retrieval.documents_path (or NUTRIKID_INDEX_PATH / NUTRIKID_DOCUMENTS_PATH).";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Kid,
    /// Anything that is not `kid` is answered as a parent.
    #[default]
    #[serde(other)]
    Parent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaRequest {
    pub question: String,
    #[serde(default = "default_age")]
    pub age: String,
    #[serde(default = "default_weight")]
    pub weight: String,
    #[serde(default = "default_none")]
    pub conditions: String,
    #[serde(default = "default_none")]
    pub prescription: String,
    #[serde(default)]
    pub audience: Audience,
}

fn default_age() -> String {
    "5 years".to_string()
}

fn default_weight() -> String {
    "Unknown".to_string()
}

fn default_none() -> String {
    "None".to_string()
}

impl QaRequest {
    #[must_use]
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            age: default_age(),
            weight: default_weight(),
            conditions: default_none(),
            prescription: default_none(),
            audience: Audience::Parent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaAnswer {
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed: Option<String>,
}

impl QaAnswer {
    /// Wraps model text, splitting it on [`ANSWER_SEPARATOR`] when present.
    #[must_use]
    pub fn from_text(answer: String) -> Self {
        let (short, detailed) = match answer.split_once(ANSWER_SEPARATOR) {
            Some((short, detailed)) => (
                Some(short.trim().to_string()),
                Some(detailed.trim().to_string()),
            ),
            None => (None, None),
        };
        Self {
            answer,
            short,
            detailed,
        }
    }
}

/// Answers one question. Never fails: backend errors become the answer text.
pub async fn answer_question(ctx: &AdvisorContext, request: &QaRequest) -> QaAnswer {
    if !ctx.retrieval().corpus_loaded() {
        log::warn!("Corpus not loaded; answering in safe mode");
        return QaAnswer::from_text(SAFE_MODE_NOTICE.to_string());
    }

    let context = ctx
        .retrieval()
        .retrieve_context(&request.question, ctx.settings().top_k)
        .await;
    let prompt = match request.audience {
        Audience::Kid => kid_prompt(request, &context),
        Audience::Parent => parent_prompt(request, &context),
    };

    let sampling = ctx.settings().qa;
    let request = CompletionRequest::prompt(prompt, sampling.max_tokens, sampling.temperature);
    let text = match ctx.complete(request).await {
        Ok(text) => text,
        Err(err) => {
            log::warn!("Q&A generation failed: {err}");
            format!("Error generating response: {err}")
        }
    };
    QaAnswer::from_text(text)
}

fn parent_prompt(request: &QaRequest, context: &str) -> String {
    format!(
        "You are NutriGuide, a pediatric nutrition assistant for parents.

STRICT INSTRUCTIONS:
1. First give a direct, short answer (2-3 sentences max) with practical advice.
2. Then output exactly this separator: {ANSWER_SEPARATOR}
3. After the separator give a detailed explanation in Markdown:
   - `###` for headers
   - `-` for bullet points
   - `**bold**` for key terms
   - explain why, with examples drawn from the reference context.

Profile:
Age: {age}
Weight: {weight}
Conditions: {conditions}
Prescriptions: {prescription}

Question: {question}

Reference context:
{context}

Format:
[Short Answer]
{ANSWER_SEPARATOR}
[Detailed Markdown Explanation]
",
        age = request.age,
        weight = request.weight,
        conditions = request.conditions,
        prescription = request.prescription,
        question = request.question,
    )
}

fn kid_prompt(request: &QaRequest, context: &str) -> String {
    format!(
        "You are Food Buddy, a fun and friendly nutrition companion for kids!

RULES:
- Start with a fun greeting.
- Use a storyteller voice, simple words and plenty of emojis.
- If asked for a story, make up a short adventure about food heroes.
- Explain benefits with superheroes (\"Carrots help you see like a hero!\").
- Do NOT give medical advice. If asked about medicine, say \"Ask a grown-up!\".
- Keep it structured with bullet points and short paragraphs.

About the kid:
Age: {age}

Question: {question}

Reference context:
{context}

Answer like a best friend:
",
        age = request.age,
        question = request.question,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{context_with, loaded_retrieval, ScriptedBackend};
    use nutrikid_retrieval::Retrieval;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_defaults_match_anonymous_parent() {
        let request: QaRequest = serde_json::from_str(r#"{"question": "Is ghee ok?"}"#).unwrap();
        assert_eq!(request, QaRequest::new("Is ghee ok?"));

        let kid: QaRequest =
            serde_json::from_str(r#"{"question": "q", "audience": "kid"}"#).unwrap();
        assert_eq!(kid.audience, Audience::Kid);
        let other: QaRequest =
            serde_json::from_str(r#"{"question": "q", "audience": "doctor"}"#).unwrap();
        assert_eq!(other.audience, Audience::Parent);
    }

    #[test]
    fn answers_split_on_separator() {
        let answer = QaAnswer::from_text(format!(
            "Give dal daily. {ANSWER_SEPARATOR}\n### Why\n- Iron"
        ));
        assert_eq!(answer.short.as_deref(), Some("Give dal daily."));
        assert_eq!(answer.detailed.as_deref(), Some("### Why\n- Iron"));

        let plain = QaAnswer::from_text("Just eat fruit.".to_string());
        assert_eq!(plain.short, None);
        assert_eq!(plain.detailed, None);
    }

    #[tokio::test]
    async fn missing_corpus_answers_in_safe_mode_without_generation() {
        let backend = ScriptedBackend::replying("should not be used");
        let ctx = context_with(Retrieval::unavailable(), backend.clone());

        let answer = answer_question(&ctx, &QaRequest::new("What about iron?")).await;
        assert_eq!(answer.answer, SAFE_MODE_NOTICE);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn parent_prompt_carries_profile_and_context() {
        let backend = ScriptedBackend::replying(&format!("Short. {ANSWER_SEPARATOR} Long."));
        let retrieval = loaded_retrieval(&["Ragi porridge is rich in calcium."]).await;
        let ctx = context_with(retrieval, backend.clone());

        let mut request = QaRequest::new("Best calcium source?");
        request.conditions = "Lactose intolerance".to_string();
        let answer = answer_question(&ctx, &request).await;

        assert_eq!(answer.short.as_deref(), Some("Short."));
        assert_eq!(backend.calls(), 1);
        let sent = backend.last_request().unwrap();
        assert_eq!(sent.max_tokens, 600);
        assert!((sent.temperature - 0.3).abs() < f32::EPSILON);
        let prompt = &sent.messages[0].content;
        assert!(prompt.contains("Conditions: Lactose intolerance"));
        assert!(prompt.contains("Ragi porridge is rich in calcium."));
        assert!(prompt.contains(ANSWER_SEPARATOR));
    }

    #[tokio::test]
    async fn kid_prompt_omits_clinical_details() {
        let backend = ScriptedBackend::replying("Yay veggies!");
        let retrieval = loaded_retrieval(&["Carrots contain vitamin A."]).await;
        let ctx = context_with(retrieval, backend.clone());

        let mut request = QaRequest::new("Why carrots?");
        request.audience = Audience::Kid;
        request.prescription = "Iron syrup".to_string();
        let answer = answer_question(&ctx, &request).await;

        assert_eq!(answer.answer, "Yay veggies!");
        let prompt = backend.last_request().unwrap().messages[0].content.clone();
        assert!(prompt.contains("Food Buddy"));
        assert!(!prompt.contains("Iron syrup"));
    }

    #[tokio::test]
    async fn backend_failure_becomes_answer_text() {
        let backend = ScriptedBackend::failing("connection reset");
        let retrieval = loaded_retrieval(&["Dates are rich in iron."]).await;
        let ctx = context_with(retrieval, backend);

        let answer = answer_question(&ctx, &QaRequest::new("Iron?")).await;
        assert!(
            answer.answer.starts_with("Error generating response:"),
            "{}",
            answer.answer
        );
        assert!(answer.answer.contains("connection reset"));
    }
}
