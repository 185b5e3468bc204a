use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Question, QuizDefinition};

/// Round to one decimal place, the precision stored on the leaderboard
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Count of questions whose recorded answer equals the correct answer exactly
pub fn score_answers(questions: &[Question], answers: &BTreeMap<usize, String>) -> u32 {
    questions
        .iter()
        .enumerate()
        .filter(|(index, question)| question.is_correct(answers.get(index).map(String::as_str)))
        .count() as u32
}

/// Unrounded percentage; an empty quiz scores 0
pub fn percentage(score: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(score) / f64::from(total) * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub score: u32,
    pub total: u32,
    pub percentage: f64,
}

impl ScoreCard {
    pub fn new(score: u32, total: u32) -> Self {
        Self {
            score,
            total,
            percentage: percentage(score, total),
        }
    }

    pub fn compute(quiz: &QuizDefinition, answers: &BTreeMap<usize, String>) -> Self {
        Self::new(score_answers(&quiz.questions, answers), quiz.questions.len() as u32)
    }

    pub fn is_perfect(&self) -> bool {
        self.total > 0 && self.score == self.total
    }

    pub fn rank(&self) -> Rank {
        Rank::from_score(self.score, self.total)
    }
}

/// Three-tier rank derived from the percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rank {
    Learner,
    Seeker,
    Acharya,
}

impl Rank {
    pub fn from_score(score: u32, total: u32) -> Self {
        if total > 0 && score == total {
            return Rank::Acharya;
        }
        if percentage(score, total) >= 80.0 {
            Rank::Seeker
        } else {
            Rank::Learner
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rank::Learner => "Learner",
            Rank::Seeker => "Seeker",
            Rank::Acharya => "Acharya",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Performance {
    Excellent,
    Good,
    KeepLearning,
}

impl Performance {
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy >= 90.0 {
            Performance::Excellent
        } else if accuracy >= 70.0 {
            Performance::Good
        } else {
            Performance::KeepLearning
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Performance::Excellent => "Excellent",
            Performance::Good => "Good",
            Performance::KeepLearning => "Keep Learning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPerformance {
    pub category: String,
    pub correct: u32,
    pub total: u32,
}

impl CategoryPerformance {
    pub fn accuracy(&self) -> f64 {
        percentage(self.correct, self.total)
    }
}

/// Post-attempt breakdown shown on the results screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAnalytics {
    pub accuracy: f64,
    pub average_time: f64,
    pub performance: Performance,
    pub category_performance: Vec<CategoryPerformance>,
    pub weak_areas: Vec<CategoryPerformance>,
}

impl QuizAnalytics {
    const WEAK_AREA_THRESHOLD: f64 = 70.0;

    pub fn compute(
        quiz: &QuizDefinition,
        answers: &BTreeMap<usize, String>,
        time_per_question: &[Option<f64>],
    ) -> Self {
        let card = ScoreCard::compute(quiz, answers);
        let accuracy = round_to_tenth(card.percentage);

        let recorded: Vec<f64> = time_per_question.iter().flatten().copied().collect();
        let average_time = if recorded.is_empty() {
            0.0
        } else {
            round_to_tenth(recorded.iter().sum::<f64>() / recorded.len() as f64)
        };

        // Questions without their own tag fall under the quiz category
        let mut category_performance: Vec<CategoryPerformance> = Vec::new();
        for (index, question) in quiz.questions.iter().enumerate() {
            let category = question.category.as_deref().unwrap_or(&quiz.category);
            let position = match category_performance.iter().position(|c| c.category == category) {
                Some(position) => position,
                None => {
                    category_performance.push(CategoryPerformance {
                        category: category.to_string(),
                        correct: 0,
                        total: 0,
                    });
                    category_performance.len() - 1
                }
            };
            let entry = &mut category_performance[position];
            entry.total += 1;
            if question.is_correct(answers.get(&index).map(String::as_str)) {
                entry.correct += 1;
            }
        }

        let mut weak_areas: Vec<CategoryPerformance> = category_performance
            .iter()
            .filter(|c| c.accuracy() < Self::WEAK_AREA_THRESHOLD)
            .cloned()
            .collect();
        weak_areas.sort_by(|a, b| a.accuracy().total_cmp(&b.accuracy()));

        Self {
            accuracy,
            average_time,
            performance: Performance::from_accuracy(accuracy),
            category_performance,
            weak_areas,
        }
    }
}

/// One row of the post-attempt review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub number: usize,
    pub question_id: u32,
    pub prompt: String,
    pub options: Option<Vec<String>>,
    pub user_answer: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
    pub explanation: String,
    pub category: Option<String>,
}

pub fn review_items(quiz: &QuizDefinition, answers: &BTreeMap<usize, String>) -> Vec<ReviewItem> {
    quiz.questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let user_answer = answers.get(&index).cloned();
            ReviewItem {
                number: index + 1,
                question_id: question.id,
                prompt: question.question.clone(),
                options: question.options.clone(),
                is_correct: question.is_correct(user_answer.as_deref()),
                user_answer,
                correct_answer: question.answer.clone(),
                explanation: question.explanation.clone(),
                category: question.category.clone(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub recipient: String,
    pub quiz_title: String,
    pub percentage: u32,
    pub score: u32,
    pub total: u32,
    pub issued_on: String,
}

impl Certificate {
    pub fn new(recipient: &str, quiz_title: &str, card: &ScoreCard, completed_at: DateTime<Utc>) -> Self {
        Self {
            recipient: recipient.to_string(),
            quiz_title: quiz_title.to_string(),
            percentage: card.percentage.round() as u32,
            score: card.score,
            total: card.total,
            issued_on: completed_at.format("%B %-d, %Y").to_string(),
        }
    }

    pub fn file_name(&self) -> String {
        let slug = self.quiz_title.split_whitespace().collect::<Vec<_>>().join("-");
        format!("{}-certificate.png", slug)
    }

    pub fn share_text(&self) -> String {
        format!("I scored {}% on \"{}\"!", self.percentage, self.quiz_title)
    }
}
