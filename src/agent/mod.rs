//! Question routing: classify, then answer from the policy or in general
//!
//! A small state machine. [`PolicyAgent::step`] performs exactly one
//! transition and [`PolicyAgent::run`] drives it to [`AgentState::Done`].

use crate::answer::{Answer, AnswerAssembler, AnswerError};
use crate::retrieval::{RetrievalStrategy, Retriever, SearchError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Question is off topic: {reason}")]
    OffTopic { reason: String },

    #[error("Question classification failed: {0}")]
    Classification(String),

    #[error("General answer failed: {0}")]
    GeneralAnswer(String),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Answer(#[from] AnswerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Answerable from the uploaded document
    PolicySpecific,
    /// Needs general knowledge
    General,
}

/// Outcome of the topic guardrail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicCheck {
    Allowed,
    Rejected { reason: String },
}

/// Guardrail and question classification
#[async_trait]
pub trait QuestionClassifier: Send + Sync {
    async fn check_topic(&self, question: &str) -> Result<TopicCheck, AgentError>;

    async fn classify(&self, question: &str) -> Result<QuestionType, AgentError>;
}

/// Answers questions that are not about the uploaded document
#[async_trait]
pub trait GeneralAnswerer: Send + Sync {
    async fn answer(&self, question: &str) -> Result<String, AgentError>;
}

#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub question: String,
    pub doc_id: Option<String>,
    pub strategy: RetrievalStrategy,
    pub limit: Option<usize>,
}

impl AgentRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            doc_id: None,
            strategy: RetrievalStrategy::Semantic,
            limit: None,
        }
    }

    pub fn with_document(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }

    pub fn with_strategy(mut self, strategy: RetrievalStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

#[derive(Debug, Clone)]
pub enum AgentResponse {
    Policy(Answer),
    General { question: String, answer: String },
}

#[derive(Debug, Clone)]
pub enum AgentState {
    Classify(AgentRequest),
    PolicyRetrieval(AgentRequest),
    GeneralAnswer(AgentRequest),
    Done(AgentResponse),
}

impl AgentState {
    pub fn is_done(&self) -> bool {
        matches!(self, AgentState::Done(_))
    }
}

/// Routes a question to document retrieval or the general answerer
pub struct PolicyAgent {
    retriever: Arc<Retriever>,
    assembler: AnswerAssembler,
    classifier: Arc<dyn QuestionClassifier>,
    general: Arc<dyn GeneralAnswerer>,
}

impl PolicyAgent {
    pub fn new(
        retriever: Arc<Retriever>,
        assembler: AnswerAssembler,
        classifier: Arc<dyn QuestionClassifier>,
        general: Arc<dyn GeneralAnswerer>,
    ) -> Self {
        Self {
            retriever,
            assembler,
            classifier,
            general,
        }
    }

    /// Perform one transition
    pub async fn step(&self, state: AgentState) -> Result<AgentState, AgentError> {
        match state {
            AgentState::Classify(request) => {
                if let TopicCheck::Rejected { reason } =
                    self.classifier.check_topic(&request.question).await?
                {
                    tracing::warn!("Question rejected by guardrail: {}", reason);
                    return Err(AgentError::OffTopic { reason });
                }

                if request.doc_id.is_none() {
                    tracing::info!("No document given, routing to general answer");
                    return Ok(AgentState::GeneralAnswer(request));
                }

                match self.classifier.classify(&request.question).await? {
                    QuestionType::PolicySpecific => {
                        tracing::info!("Routing to policy retrieval");
                        Ok(AgentState::PolicyRetrieval(request))
                    }
                    QuestionType::General => {
                        tracing::info!("Routing to general answer");
                        Ok(AgentState::GeneralAnswer(request))
                    }
                }
            }
            AgentState::PolicyRetrieval(request) => {
                let Some(doc_id) = request.doc_id.as_deref() else {
                    return Ok(AgentState::GeneralAnswer(request));
                };

                let results = self
                    .retriever
                    .retrieve(doc_id, &request.question, request.strategy, request.limit)
                    .await?;
                let answer = self
                    .assembler
                    .answer(&request.question, Some(doc_id), &results)
                    .await?;

                Ok(AgentState::Done(AgentResponse::Policy(answer)))
            }
            AgentState::GeneralAnswer(request) => {
                let answer = self.general.answer(&request.question).await?;
                Ok(AgentState::Done(AgentResponse::General {
                    question: request.question,
                    answer,
                }))
            }
            done @ AgentState::Done(_) => Ok(done),
        }
    }

    /// Run from classification until done
    pub async fn run(&self, request: AgentRequest) -> Result<AgentResponse, AgentError> {
        let mut state = AgentState::Classify(request);
        loop {
            match self.step(state).await? {
                AgentState::Done(response) => return Ok(response),
                next => state = next,
            }
        }
    }
}
