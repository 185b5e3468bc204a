use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionKind {
    #[serde(rename = "mcq", alias = "multiple-choice", alias = "multiple_choice")]
    MultipleChoice,
    #[serde(rename = "true-false", alias = "true_false")]
    TrueFalse,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "mcq",
            QuestionKind::TrueFalse => "true-false",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>, // Multiple choice only
    pub answer: String, // Option text, or "true"/"false"
    #[serde(default)]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Question {
    /// Exact string comparison; a missing answer is never correct.
    pub fn is_correct(&self, user_answer: Option<&str>) -> bool {
        user_answer == Some(self.answer.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizDefinition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub difficulty: String,
    pub duration: u32, // seconds
    pub questions: Vec<Question>,
}

impl QuizDefinition {
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn summary(&self) -> QuizSummary {
        QuizSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            difficulty: self.difficulty.clone(),
            duration: self.duration,
            question_count: self.questions.len(),
        }
    }
}

/// Catalog listing entry without the answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: String,
    pub duration: u32,
    pub question_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyPoint {
    pub question: usize,
    pub difficulty: f64,
}

/// Autosaved in-progress attempt, stored under `quiz_<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub current_question: usize,
    #[serde(default)]
    pub answers: BTreeMap<usize, String>,
    pub time_left: u32,
    #[serde(default)]
    pub time_per_question: Vec<Option<f64>>,
    #[serde(default)]
    pub difficulty_progress: Vec<DifficultyPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    pub id: String,
    pub title: String,
    pub progress: u32,
    pub target: u32,
    pub completed: bool,
}

/// Cross-quiz gamification record, stored under `quiz_streak_data`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressRecord {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_played_date: String, // YYYY-MM-DD, local calendar day
    pub total_quizzes: u32,
    pub badges: Vec<String>,
    pub missions: Vec<Mission>,
    pub categories_played: Vec<String>,
}

impl ProgressRecord {
    pub fn has_badge(&self, badge_id: &str) -> bool {
        self.badges.iter().any(|b| b == badge_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_name: String,
    #[serde(rename = "quiz")]
    pub quiz_title: String,
    pub score: u32,
    pub total: u32,
    #[serde(deserialize_with = "deserialize_percentage")]
    pub percentage: f64, // one decimal, frozen at write time
    #[serde(rename = "date")]
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub time_spent: f64,
}

// Older records stored the percentage as a preformatted string ("50.0").
fn deserialize_percentage<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPercentage {
        Number(f64),
        Text(String),
    }

    match RawPercentage::deserialize(deserializer)? {
        RawPercentage::Number(value) => Ok(value),
        RawPercentage::Text(text) => text.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}
