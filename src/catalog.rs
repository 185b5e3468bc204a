use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use crate::models::{QuestionKind, QuizDefinition, QuizSummary};
use crate::{log_system_event, log_validation};

static QUIZ_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap());

#[derive(Deserialize)]
struct CatalogFile {
    quizzes: Vec<QuizDefinition>,
}

/// Read-only, ordered collection of quiz definitions loaded once at startup
#[derive(Debug, Clone, Default)]
pub struct QuizCatalog {
    quizzes: Vec<Arc<QuizDefinition>>,
}

/// A single authoring problem found by [`QuizCatalog::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogIssue {
    pub quiz_id: String,
    pub question_id: Option<u32>,
    pub message: String,
}

impl fmt::Display for CatalogIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.question_id {
            Some(question_id) => write!(f, "[{} #{}] {}", self.quiz_id, question_id, self.message),
            None => write!(f, "[{}] {}", self.quiz_id, self.message),
        }
    }
}

impl QuizCatalog {
    pub fn new(quizzes: Vec<QuizDefinition>) -> Self {
        Self {
            quizzes: quizzes.into_iter().map(Arc::new).collect(),
        }
    }

    /// Parse a `{"quizzes": [...]}` document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json).context("Invalid quiz catalog JSON")?;
        Ok(Self::new(file.quizzes))
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read quiz catalog at {}", path.display()))?;
        let catalog = Self::from_json_str(&json)?;

        log_system_event!(
            startup,
            component = "catalog",
            format!("loaded {} quizzes from {}", catalog.len(), path.display())
        );
        Ok(catalog)
    }

    pub fn get(&self, quiz_id: &str) -> Option<Arc<QuizDefinition>> {
        self.quizzes.iter().find(|quiz| quiz.id == quiz_id).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuizDefinition> {
        self.quizzes.iter().map(|quiz| quiz.as_ref())
    }

    pub fn summaries(&self) -> Vec<QuizSummary> {
        self.iter().map(QuizDefinition::summary).collect()
    }

    /// Distinct quiz categories in catalog order
    pub fn categories(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for quiz in self.iter() {
            if !seen.contains(&quiz.category) {
                seen.push(quiz.category.clone());
            }
        }
        seen
    }

    pub fn len(&self) -> usize {
        self.quizzes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quizzes.is_empty()
    }

    /// Check every quiz against the authoring rules
    pub fn validate(&self) -> Vec<CatalogIssue> {
        let mut issues = Vec::new();
        let mut quiz_ids = HashSet::new();

        for quiz in self.iter() {
            let mut quiz_issue = |message: String| {
                issues.push(CatalogIssue {
                    quiz_id: quiz.id.clone(),
                    question_id: None,
                    message,
                });
            };

            if !QUIZ_ID_PATTERN.is_match(&quiz.id) {
                quiz_issue("quiz id must be a lowercase slug such as 'ancient-knowledge'".to_string());
            }
            if !quiz_ids.insert(quiz.id.as_str()) {
                quiz_issue("duplicate quiz id".to_string());
            }
            if quiz.title.trim().is_empty() {
                quiz_issue("title is required".to_string());
            }
            if quiz.questions.is_empty() {
                quiz_issue("at least one question is required".to_string());
            }

            let mut question_ids = HashSet::new();
            for question in &quiz.questions {
                let mut question_issue = |message: &str| {
                    issues.push(CatalogIssue {
                        quiz_id: quiz.id.clone(),
                        question_id: Some(question.id),
                        message: message.to_string(),
                    });
                };

                if !question_ids.insert(question.id) {
                    question_issue("duplicate question id");
                }
                if question.question.trim().is_empty() {
                    question_issue("question text is required");
                }
                if question.answer.is_empty() {
                    question_issue("answer is required");
                }
                if question.explanation.trim().is_empty() {
                    question_issue("explanation is required");
                }

                match question.kind {
                    QuestionKind::MultipleChoice => match &question.options {
                        None => question_issue("multiple-choice question has no options"),
                        Some(options) if options.is_empty() => {
                            question_issue("multiple-choice question has no options")
                        }
                        Some(options) => {
                            if options.iter().any(|option| option.trim().is_empty()) {
                                question_issue("all answer options must be filled in");
                            }
                            if !question.answer.is_empty() && !options.contains(&question.answer) {
                                question_issue("answer does not match any option");
                            }
                        }
                    },
                    QuestionKind::TrueFalse => {
                        if question.answer != "true" && question.answer != "false" {
                            question_issue("true-false answer must be \"true\" or \"false\"");
                        }
                    }
                }
            }
        }

        if issues.is_empty() {
            log_validation!(success, "catalog", format!("{} quizzes valid", self.len()));
        } else {
            log_validation!(failure, "catalog", error = format!("{} issues found", issues.len()));
        }

        issues
    }
}
