use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use futures::{stream, StreamExt};

use super::{Generator, Regenerator};
use crate::types::EvidenceSnippet;

/// Chat-model client used for both baseline answer generation and
/// source-constrained regeneration.
#[derive(Clone)]
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model: String,
    max_concurrency: usize,
}

/// Characters stripped from the ends of a generated span.
const SPAN_TRIM: &[char] = &[
    ' ', '.', ',', ':', ';', '!', '?', '"', '\'', '(', ')', '[', ']', '{', '}',
];

fn answer_prompt(question: &str) -> Result<Vec<ChatCompletionRequestMessage>> {
    let user = ChatCompletionRequestUserMessageArgs::default()
        .content(format!(
            "You are a concise QA model. Answer with ONLY the minimal text span \
             (no punctuation, no extra words). If unsure, answer exactly: Unknown.\n\
             Q: {question}\nA:"
        ))
        .build()?
        .into();
    Ok(vec![user])
}

fn source_block(sources: &[EvidenceSnippet]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let mut text = s.text.clone();
            if text.len() > 500 {
                let mut end = 500;
                while !text.is_char_boundary(end) {
                    end -= 1;
                }
                text.truncate(end);
                text.push('…');
            }
            format!("[S{}] {}", i + 1, text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn regenerate_prompt(
    question: &str,
    sources: &[EvidenceSnippet],
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let system = ChatCompletionRequestSystemMessageArgs::default()
        .content(
            "You are a factual assistant. Answer ONLY using the provided sources. \
             Cite sources inline like [S1], [S2]. If information is not present \
             in sources, say 'Insufficient evidence.'",
        )
        .build()?
        .into();
    let user = ChatCompletionRequestUserMessageArgs::default()
        .content(format!(
            "Question: {question}\n\nSources:\n{}\n\nAnswer:",
            source_block(sources)
        ))
        .build()?
        .into();
    Ok(vec![system, user])
}

impl LlmClient {
    pub fn new(
        model: String,
        base_url: Option<String>,
        api_key: Option<String>,
        max_concurrency: usize,
    ) -> Self {
        let mut cfg = OpenAIConfig::default();
        if let Some(url) = base_url {
            cfg = cfg.with_api_base(url);
        }
        if let Some(key) = api_key {
            cfg = cfg.with_api_key(key);
        }
        let client = Client::with_config(cfg);
        Self { client, model, max_concurrency }
    }

    async fn chat_many(
        &self,
        prompts: Vec<Vec<ChatCompletionRequestMessage>>,
    ) -> Result<Vec<String>> {
        let reqs = prompts.into_iter().enumerate().map(|(idx, messages)| {
            let client = self.client.clone();
            let model = self.model.clone();
            async move {
                let req = CreateChatCompletionRequestArgs::default()
                    .model(model)
                    .messages(messages)
                    .build()?;
                let resp = client.chat().create(req).await?;
                let text = resp
                    .choices
                    .first()
                    .and_then(|c| c.message.content.clone())
                    .unwrap_or_default();
                Ok::<_, anyhow::Error>((idx, text))
            }
        });

        let mut out = stream::iter(reqs)
            .buffer_unordered(self.max_concurrency)
            .collect::<Vec<_>>()
            .await;

        out.sort_by_key(|r| r.as_ref().map(|(i, _)| *i).unwrap_or(usize::MAX));
        let mut texts = Vec::with_capacity(out.len());
        for r in out {
            let (_, t) = r?;
            texts.push(t);
        }
        Ok(texts)
    }
}

#[async_trait::async_trait]
impl Generator for LlmClient {
    async fn generate(&self, question: &str) -> Result<String> {
        let outs = self.chat_many(vec![answer_prompt(question)?]).await?;
        let raw = outs.into_iter().next().unwrap_or_default();
        let first_line = raw.lines().next().unwrap_or_default();
        let span = first_line
            .replace("Answer:", "")
            .replace("A:", "")
            .trim_matches(|c: char| SPAN_TRIM.contains(&c))
            .to_string();
        Ok(span)
    }
}

#[async_trait::async_trait]
impl Regenerator for LlmClient {
    async fn regenerate(
        &self,
        question: &str,
        sources: &[EvidenceSnippet],
        n: usize,
    ) -> Result<Vec<String>> {
        if sources.is_empty() {
            return Ok(vec![
                "Insufficient evidence in the provided sources to answer reliably.".to_string(),
            ]);
        }
        let prompts = (0..n)
            .map(|_| regenerate_prompt(question, sources))
            .collect::<Result<Vec<_>>>()?;
        let outs = self.chat_many(prompts).await?;
        Ok(outs.into_iter().map(|s| s.trim().to_string()).collect())
    }
}
