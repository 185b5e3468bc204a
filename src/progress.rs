use anyhow::Result;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::models::{Mission, ProgressRecord};
use crate::notifications::{Notification, Notifier};
use crate::store::{KeyValueStore, keys, read_json, read_json_or_none, write_json};

const DAY_FORMAT: &str = "%Y-%m-%d";
/// Day format written by earlier versions of the site, e.g. "Mon Oct 19 2026"
const LEGACY_DAY_FORMAT: &str = "%a %b %d %Y";
const ANCIENT_TEXTS_CATEGORY: &str = "Ancient Texts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    FirstQuiz,
    WeekStreak,
    PerfectScore,
    QuizMaster,
    SpeedDemon,
    Scholar,
}

impl Badge {
    pub const ALL: [Badge; 6] = [
        Badge::FirstQuiz,
        Badge::WeekStreak,
        Badge::PerfectScore,
        Badge::QuizMaster,
        Badge::SpeedDemon,
        Badge::Scholar,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Badge::FirstQuiz => "first_quiz",
            Badge::WeekStreak => "week_streak",
            Badge::PerfectScore => "perfect_score",
            Badge::QuizMaster => "quiz_master",
            Badge::SpeedDemon => "speed_demon",
            Badge::Scholar => "scholar",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|badge| badge.id() == id)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Badge::FirstQuiz => "First Steps",
            Badge::WeekStreak => "7-Day Warrior",
            Badge::PerfectScore => "Perfectionist",
            Badge::QuizMaster => "Quiz Master",
            Badge::SpeedDemon => "Speed Demon",
            Badge::Scholar => "Scholar",
        }
    }

    pub fn requirement(&self) -> &'static str {
        match self {
            Badge::FirstQuiz => "Complete your first quiz",
            Badge::WeekStreak => "7-day streak",
            Badge::PerfectScore => "Score 100% on any quiz",
            Badge::QuizMaster => "Complete 10 quizzes",
            Badge::SpeedDemon => "Complete quiz in under 5 minutes",
            Badge::Scholar => "Complete all quiz categories",
        }
    }

    fn announcement(&self) -> Notification {
        let description = match self {
            Badge::FirstQuiz => "First Steps - You've completed your first quiz!",
            Badge::WeekStreak => "7-Day Warrior - You've maintained a 7-day streak!",
            Badge::PerfectScore => "Perfectionist - You scored 100%!",
            Badge::QuizMaster => "Quiz Master - You've completed 10 quizzes!",
            Badge::SpeedDemon => "Speed Demon - You finished in under 5 minutes!",
            Badge::Scholar => "Scholar - You've tried every quiz category!",
        };
        Notification::new("Badge Earned!", description)
    }
}

/// Missions seeded into a fresh progress record
pub fn default_missions() -> Vec<Mission> {
    let mission = |id: &str, title: &str, target: u32| Mission {
        id: id.to_string(),
        title: title.to_string(),
        progress: 0,
        target,
        completed: false,
    };

    vec![
        mission("ancient_texts", "Complete 3 Ancient Texts quizzes", 3),
        mission("perfect_streak", "Get 3 perfect scores", 3),
        mission("category_master", "Try all quiz categories", 6),
    ]
}

/// Input for one completed attempt
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedQuiz {
    pub score: u32,
    pub total: u32,
    pub category: String,
    pub completed_on: NaiveDate,
}

impl CompletedQuiz {
    fn is_perfect(&self) -> bool {
        self.total > 0 && self.score == self.total
    }
}

/// Apply one completed quiz to the record and return newly earned badges.
///
/// Pure: the caller persists the record and announces the badges.
pub fn record_completion(record: &mut ProgressRecord, completed: &CompletedQuiz) -> Vec<Badge> {
    if record.missions.is_empty() {
        record.missions = default_missions();
    }

    let today = completed.completed_on.format(DAY_FORMAT).to_string();
    let last_played = parse_played_day(&record.last_played_date);
    if last_played == Some(completed.completed_on) {
        record.last_played_date = today;
    } else {
        let yesterday = completed.completed_on.checked_sub_days(Days::new(1));
        if last_played.is_some() && last_played == yesterday {
            record.current_streak += 1;
        } else {
            record.current_streak = 1;
        }
        record.last_played_date = today;
        record.longest_streak = record.longest_streak.max(record.current_streak);
    }

    record.total_quizzes += 1;

    if !record.categories_played.contains(&completed.category) {
        record.categories_played.push(completed.category.clone());
    }

    let candidates = [
        (Badge::FirstQuiz, record.total_quizzes == 1),
        (Badge::WeekStreak, record.current_streak >= 7),
        (Badge::PerfectScore, completed.is_perfect()),
        (Badge::QuizMaster, record.total_quizzes >= 10),
    ];
    let mut earned = Vec::new();
    for (badge, qualifies) in candidates {
        if qualifies && !record.has_badge(badge.id()) {
            record.badges.push(badge.id().to_string());
            earned.push(badge);
        }
    }

    let categories_tried = record.categories_played.len() as u32;
    for mission in record.missions.iter_mut() {
        match mission.id.as_str() {
            "ancient_texts" if completed.category == ANCIENT_TEXTS_CATEGORY => advance(mission, 1),
            "perfect_streak" if completed.is_perfect() => advance(mission, 1),
            "category_master" => {
                let delta = categories_tried.saturating_sub(mission.progress);
                advance(mission, delta);
            }
            _ => {}
        }
    }

    earned
}

/// Stored last-played day in either the current or the legacy format
fn parse_played_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DAY_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(raw, LEGACY_DAY_FORMAT))
        .ok()
}

fn advance(mission: &mut Mission, by: u32) {
    mission.progress = mission.progress.saturating_add(by).min(mission.target);
    mission.completed = mission.progress >= mission.target;
}

fn seeded(record: Option<ProgressRecord>) -> ProgressRecord {
    let mut record = record.unwrap_or_default();
    if record.missions.is_empty() {
        record.missions = default_missions();
    }
    record
}

/// Result of recording a completion
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub record: ProgressRecord,
    pub badges_earned: Vec<Badge>,
}

/// Owns the single durable progress record
#[derive(Clone)]
pub struct ProgressTracker {
    store: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn Notifier>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn KeyValueStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Current record for display; absent or unreadable records yield a seeded default
    pub async fn load(&self) -> ProgressRecord {
        let record = read_json_or_none(self.store.as_ref(), keys::PROGRESS).await;
        seeded(record)
    }

    /// Apply a completed quiz. A failing store read aborts before anything is written.
    pub async fn record(&self, completed: &CompletedQuiz) -> Result<ProgressUpdate> {
        let mut record = seeded(read_json(self.store.as_ref(), keys::PROGRESS).await?);
        let badges_earned = record_completion(&mut record, completed);
        write_json(self.store.as_ref(), keys::PROGRESS, &record).await?;

        info!(
            current_streak = record.current_streak,
            total_quizzes = record.total_quizzes,
            badges_earned = ?badges_earned,
            "Progress record updated"
        );

        for badge in &badges_earned {
            self.notifier.notify(badge.announcement());
        }

        Ok(ProgressUpdate {
            record,
            badges_earned,
        })
    }
}
