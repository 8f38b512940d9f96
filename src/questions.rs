//! Follow-up question generation.
//!
//! The session manager only needs "three questions for this update"; where
//! they come from is behind [`QuestionGenerator`]. Production points it at an
//! HTTP endpoint, development and tests use the offline template generator.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::QuestionsSection;
use crate::errors::{LifecycleError, LifecycleResult};
use crate::identity::UserId;
use crate::records::WorkSummary;

#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate(&self, user: &UserId, summary: &WorkSummary) -> LifecycleResult<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct QuestionsResponse {
    questions: Vec<String>,
}

/// POSTs the work summary as JSON and expects `{"questions": [...]}` back.
pub struct HttpQuestionGenerator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpQuestionGenerator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build question generator HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn request(&self, summary: &WorkSummary) -> anyhow::Result<Vec<String>> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(summary)
            .send()
            .await
            .context("Failed to reach question generator")?
            .error_for_status()
            .context("Question generator returned error status")?;
        let body = resp
            .json::<QuestionsResponse>()
            .await
            .context("Failed to parse question generator response")?;
        Ok(body.questions)
    }
}

#[async_trait]
impl QuestionGenerator for HttpQuestionGenerator {
    async fn generate(&self, user: &UserId, summary: &WorkSummary) -> LifecycleResult<Vec<String>> {
        let questions = self
            .request(summary)
            .await
            .map_err(|e| LifecycleError::QuestionGenerator(format!("{:#}", e)))?;
        tracing::debug!(user = %user, count = questions.len(), "Generated follow-up questions");
        Ok(questions)
    }
}

/// Deterministic questions built from the update itself. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateQuestionGenerator;

#[async_trait]
impl QuestionGenerator for TemplateQuestionGenerator {
    async fn generate(&self, _user: &UserId, summary: &WorkSummary) -> LifecycleResult<Vec<String>> {
        Ok(vec![
            format!(
                "What concrete progress did you make on \"{}\" today?",
                summary.description
            ),
            format!(
                "You mentioned \"{}\". What would help you move past it?",
                summary.challenges
            ),
            format!(
                "Given \"{}\", what is the first thing you will do tomorrow?",
                summary.plans
            ),
        ])
    }
}

/// Pick the generator the configuration asks for.
pub fn from_config(section: &QuestionsSection) -> anyhow::Result<Box<dyn QuestionGenerator>> {
    match &section.endpoint {
        Some(endpoint) => {
            tracing::info!(endpoint = %endpoint, "Using HTTP question generator");
            Ok(Box::new(HttpQuestionGenerator::new(
                endpoint.clone(),
                Duration::from_secs(section.timeout_secs),
            )?))
        }
        None => Ok(Box::new(TemplateQuestionGenerator)),
    }
}
