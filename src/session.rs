use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::catalog::QuizCatalog;
use crate::clock::Clock;
use crate::errors::QuizError;
use crate::leaderboard::{DISPLAY_LIMIT, Leaderboard};
use crate::models::{
    DifficultyPoint, LeaderboardEntry, ProgressRecord, Question, QuizDefinition, SessionSnapshot,
};
use crate::notifications::{Notification, Notifier};
use crate::progress::{Badge, CompletedQuiz, ProgressTracker};
use crate::scoring::{self, Certificate, QuizAnalytics, Rank, ReviewItem, ScoreCard};
use crate::store::{KeyValueStore, keys, read_json_or_none, write_json};
use crate::log_session_event;

pub const DIFFICULTY_SEED: f64 = 2.0;
pub const DIFFICULTY_STEP: f64 = 0.5;
pub const DIFFICULTY_MIN: f64 = 1.0;
pub const DIFFICULTY_MAX: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Selection,
    Active,
    Results,
    Review,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Selection => "selection",
            Phase::Active => "active",
            Phase::Results => "results",
            Phase::Review => "review",
        }
    }
}

/// One in-progress attempt at a quiz
#[derive(Debug, Clone)]
pub struct QuizSession {
    attempt_id: Uuid,
    quiz: Arc<QuizDefinition>,
    current_question: usize,
    answers: BTreeMap<usize, String>,
    time_left: u32,
    time_per_question: Vec<Option<f64>>,
    question_started_at: DateTime<Utc>,
    adaptive: bool,
    difficulty_progress: Vec<DifficultyPoint>,
    submission: Option<Submission>,
}

/// A submit that has begun. Steps already committed are skipped when it is retried
/// so progress and the leaderboard see each attempt once.
#[derive(Debug, Clone)]
struct Submission {
    score: ScoreCard,
    completed_at: DateTime<Utc>,
    completed_on: NaiveDate,
    autosave_cleared: bool,
    badges_earned: Option<Vec<Badge>>,
    leaderboard_written: bool,
}

impl QuizSession {
    fn fresh(quiz: Arc<QuizDefinition>, now: DateTime<Utc>, adaptive: bool) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            time_left: quiz.duration,
            quiz,
            current_question: 0,
            answers: BTreeMap::new(),
            time_per_question: Vec::new(),
            question_started_at: now,
            adaptive,
            difficulty_progress: Vec::new(),
            submission: None,
        }
    }

    /// Rebuild from an autosave, guarding against a question set that shrank since it was written
    fn restore(quiz: Arc<QuizDefinition>, snapshot: SessionSnapshot, now: DateTime<Utc>, adaptive: bool) -> Self {
        let count = quiz.questions.len();

        let mut current_question = snapshot.current_question;
        if current_question >= count {
            log_session_event!(
                warn,
                "restore",
                quiz_id = quiz.id,
                format!("saved index {} out of range for {} questions, clamping", current_question, count)
            );
            current_question = count.saturating_sub(1);
        }

        let mut answers = snapshot.answers;
        answers.retain(|index, _| *index < count);
        let mut time_per_question = snapshot.time_per_question;
        time_per_question.truncate(count);

        Self {
            attempt_id: Uuid::new_v4(),
            quiz,
            current_question,
            answers,
            time_left: snapshot.time_left,
            time_per_question,
            question_started_at: now,
            adaptive,
            difficulty_progress: snapshot.difficulty_progress,
            submission: None,
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn quiz(&self) -> &QuizDefinition {
        &self.quiz
    }

    pub fn current_index(&self) -> usize {
        self.current_question
    }

    pub fn current_question(&self) -> &Question {
        &self.quiz.questions[self.current_question]
    }

    pub fn answers(&self) -> &BTreeMap<usize, String> {
        &self.answers
    }

    pub fn answer_for(&self, index: usize) -> Option<&str> {
        self.answers.get(&index).map(String::as_str)
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn time_per_question(&self) -> &[Option<f64>] {
        &self.time_per_question
    }

    pub fn difficulty_progress(&self) -> &[DifficultyPoint] {
        &self.difficulty_progress
    }

    pub fn is_adaptive(&self) -> bool {
        self.adaptive
    }

    /// True once a submit has started but not yet finished
    pub fn is_submitting(&self) -> bool {
        self.submission.is_some()
    }

    pub fn is_first(&self) -> bool {
        self.current_question == 0
    }

    pub fn is_last(&self) -> bool {
        self.current_question + 1 >= self.quiz.questions.len()
    }

    /// Position through the quiz as a percentage, counting the current question
    pub fn progress(&self) -> f64 {
        scoring::percentage(self.current_question as u32 + 1, self.quiz.questions.len() as u32)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current_question: self.current_question,
            answers: self.answers.clone(),
            time_left: self.time_left,
            time_per_question: self.time_per_question.clone(),
            difficulty_progress: self.difficulty_progress.clone(),
        }
    }

    fn record_elapsed(&mut self, now: DateTime<Utc>) {
        let elapsed = (now - self.question_started_at).num_milliseconds().max(0) as f64 / 1000.0;
        let index = self.current_question;
        if self.time_per_question.len() <= index {
            self.time_per_question.resize(index + 1, None);
        }
        self.time_per_question[index] = Some(elapsed);
    }

    fn push_difficulty_point(&mut self, left_index: usize) {
        let correct = self.quiz.questions[left_index].is_correct(self.answer_for(left_index));
        let previous = self
            .difficulty_progress
            .last()
            .map(|point| point.difficulty)
            .unwrap_or(DIFFICULTY_SEED);
        let difficulty = if correct {
            (previous + DIFFICULTY_STEP).min(DIFFICULTY_MAX)
        } else {
            (previous - DIFFICULTY_STEP).max(DIFFICULTY_MIN)
        };

        self.difficulty_progress.push(DifficultyPoint {
            question: left_index + 2,
            difficulty,
        });
    }
}

/// A submitted attempt; the answer map is frozen
#[derive(Debug, Clone)]
pub struct QuizOutcome {
    pub attempt_id: Uuid,
    pub quiz: Arc<QuizDefinition>,
    pub user_name: String,
    pub answers: BTreeMap<usize, String>,
    pub score: ScoreCard,
    pub rank: Rank,
    pub time_per_question: Vec<Option<f64>>,
    pub difficulty_progress: Vec<DifficultyPoint>,
    pub badges_earned: Vec<Badge>,
    pub completed_at: DateTime<Utc>,
    pub time_spent: f64,
}

impl QuizOutcome {
    pub fn percentage(&self) -> f64 {
        self.score.percentage
    }

    pub fn analytics(&self) -> QuizAnalytics {
        QuizAnalytics::compute(&self.quiz, &self.answers, &self.time_per_question)
    }

    pub fn review_items(&self) -> Vec<ReviewItem> {
        scoring::review_items(&self.quiz, &self.answers)
    }

    pub fn certificate(&self) -> Certificate {
        Certificate::new(&self.user_name, &self.quiz.title, &self.score, self.completed_at)
    }
}

#[derive(Debug, Clone)]
pub enum QuizState {
    Selection,
    Active(QuizSession),
    Results(QuizOutcome),
    Review(QuizOutcome),
}

impl QuizState {
    pub fn phase(&self) -> Phase {
        match self {
            QuizState::Selection => Phase::Selection,
            QuizState::Active(_) => Phase::Active,
            QuizState::Results(_) => Phase::Results,
            QuizState::Review(_) => Phase::Review,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartKind {
    Fresh,
    Resumed,
    /// No time was left, so the attempt went straight to results
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running { time_left: u32 },
    Expired,
    Inactive,
}

/// Client-local quiz state machine: selection → active → results → (review | selection).
///
/// Every mutating call that changes an active attempt writes the attempt to the
/// store before returning, so the autosave always pairs the timer with the
/// answers it was taken with.
pub struct QuizEngine {
    catalog: Arc<QuizCatalog>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    progress: ProgressTracker,
    leaderboard: Leaderboard,
    display_name: Option<String>,
    bookmarks: Vec<u32>,
    adaptive_mode: bool,
    state: QuizState,
}

impl QuizEngine {
    /// Build an engine and load the saved display name and bookmarks
    pub async fn open(
        catalog: Arc<QuizCatalog>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let display_name = match store.get(keys::DISPLAY_NAME).await {
            Ok(name) => name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read display name, continuing without one");
                None
            }
        };
        let bookmarks: Vec<u32> = read_json_or_none(store.as_ref(), keys::BOOKMARKS)
            .await
            .unwrap_or_default();

        Self {
            progress: ProgressTracker::new(Arc::clone(&store), Arc::clone(&notifier)),
            leaderboard: Leaderboard::new(Arc::clone(&store)),
            catalog,
            store,
            clock,
            notifier,
            display_name,
            bookmarks,
            adaptive_mode: false,
            state: QuizState::Selection,
        }
    }

    pub fn state(&self) -> &QuizState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn catalog(&self) -> &QuizCatalog {
        &self.catalog
    }

    pub fn active_session(&self) -> Option<&QuizSession> {
        match &self.state {
            QuizState::Active(session) => Some(session),
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<&QuizOutcome> {
        match &self.state {
            QuizState::Results(outcome) | QuizState::Review(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn bookmarks(&self) -> &[u32] {
        &self.bookmarks
    }

    pub fn is_bookmarked(&self, question_id: u32) -> bool {
        self.bookmarks.contains(&question_id)
    }

    pub fn adaptive_mode(&self) -> bool {
        self.adaptive_mode
    }

    pub async fn progress_record(&self) -> ProgressRecord {
        self.progress.load().await
    }

    /// Top leaderboard entries for display
    pub async fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.leaderboard.top(DISPLAY_LIMIT).await
    }

    /// Blank names clear the stored value
    pub async fn set_display_name(&mut self, name: &str) -> Result<(), QuizError> {
        let name = name.trim();
        if name.is_empty() {
            self.store.delete(keys::DISPLAY_NAME).await?;
            self.display_name = None;
        } else {
            self.store.set(keys::DISPLAY_NAME, name).await?;
            self.display_name = Some(name.to_string());
        }
        Ok(())
    }

    /// Smart mode; also applies to the attempt in progress
    pub fn set_adaptive_mode(&mut self, enabled: bool) {
        self.adaptive_mode = enabled;
        if let QuizState::Active(session) = &mut self.state {
            session.adaptive = enabled;
        }
    }

    /// Begin or resume an attempt at `quiz_id`
    pub async fn start(&mut self, quiz_id: &str) -> Result<StartKind, QuizError> {
        if self.phase() == Phase::Active {
            return Err(QuizError::InvalidState {
                action: "start a quiz",
                state: Phase::Active.as_str(),
            });
        }

        let quiz = self
            .catalog
            .get(quiz_id)
            .ok_or_else(|| QuizError::UnknownQuiz(quiz_id.to_string()))?;
        if self.display_name.is_none() {
            return Err(QuizError::MissingDisplayName);
        }
        if quiz.questions.is_empty() {
            return Err(QuizError::EmptyQuiz(quiz.id.clone()));
        }

        let now = self.clock.now();
        let saved: Option<SessionSnapshot> =
            read_json_or_none(self.store.as_ref(), &keys::session(&quiz.id)).await;

        let (session, kind) = match saved {
            Some(snapshot) => (
                QuizSession::restore(quiz, snapshot, now, self.adaptive_mode),
                StartKind::Resumed,
            ),
            None => (
                QuizSession::fresh(quiz, now, self.adaptive_mode),
                StartKind::Fresh,
            ),
        };

        log_session_event!(
            "start",
            quiz_id = session.quiz.id,
            attempt_id = session.attempt_id,
            format!(
                "{:?} attempt at question {} with {}s left",
                kind,
                session.current_question + 1,
                session.time_left
            )
        );

        let expired = session.time_left == 0;
        self.state = QuizState::Active(session);

        if expired {
            self.submit().await?;
            return Ok(StartKind::Expired);
        }

        self.persist().await?;
        Ok(kind)
    }

    /// Record `value` for the question at `index`, which must be the current one
    pub async fn answer(&mut self, index: usize, value: impl Into<String>) -> Result<(), QuizError> {
        let session = self.active_mut("answer")?;
        if index != session.current_question {
            return Err(QuizError::QuestionNotCurrent {
                index,
                current: session.current_question,
            });
        }

        session.answers.insert(index, value.into());
        log_session_event!(
            debug,
            "answer",
            quiz_id = session.quiz.id,
            attempt_id = session.attempt_id,
            format!("answered question {}", index + 1)
        );

        self.persist().await
    }

    pub async fn answer_current(&mut self, value: impl Into<String>) -> Result<(), QuizError> {
        let index = self.active_mut("answer")?.current_question;
        self.answer(index, value).await
    }

    /// Advance one question; returns false on the last question
    pub async fn next(&mut self) -> Result<bool, QuizError> {
        let now = self.clock.now();
        let session = self.active_mut("move to the next question")?;
        if session.is_last() {
            return Ok(false);
        }

        let leaving = session.current_question;
        session.record_elapsed(now);
        session.current_question += 1;
        session.question_started_at = now;
        if session.adaptive {
            session.push_difficulty_point(leaving);
        }

        log_session_event!(
            debug,
            "next",
            quiz_id = session.quiz.id,
            attempt_id = session.attempt_id,
            format!("moved to question {}", session.current_question + 1)
        );

        self.persist().await?;
        Ok(true)
    }

    /// Go back one question; returns false on the first question. Elapsed time is not recorded.
    pub async fn previous(&mut self) -> Result<bool, QuizError> {
        let now = self.clock.now();
        let session = self.active_mut("move to the previous question")?;
        if session.is_first() {
            return Ok(false);
        }

        session.current_question -= 1;
        session.question_started_at = now;

        log_session_event!(
            debug,
            "previous",
            quiz_id = session.quiz.id,
            attempt_id = session.attempt_id,
            format!("moved back to question {}", session.current_question + 1)
        );

        self.persist().await?;
        Ok(true)
    }

    /// Add or remove a saved question; returns whether it is now bookmarked
    pub async fn toggle_bookmark(&mut self, question_id: u32) -> Result<bool, QuizError> {
        let bookmarked = match self.bookmarks.iter().position(|id| *id == question_id) {
            Some(position) => {
                self.bookmarks.remove(position);
                false
            }
            None => {
                self.bookmarks.push(question_id);
                true
            }
        };

        write_json(self.store.as_ref(), keys::BOOKMARKS, &self.bookmarks).await?;

        self.notifier.notify(if bookmarked {
            Notification::new("Question Bookmarked", "Question saved for future study")
        } else {
            Notification::new("Bookmark Removed", "Question removed from saved questions")
        });
        Ok(bookmarked)
    }

    /// One second of the countdown; reaching zero submits the attempt
    pub async fn tick(&mut self) -> Result<TickOutcome, QuizError> {
        let QuizState::Active(session) = &mut self.state else {
            return Ok(TickOutcome::Inactive);
        };

        if session.time_left > 0 && session.submission.is_none() {
            session.time_left -= 1;
            let time_left = session.time_left;
            self.persist().await?;
            if time_left > 0 {
                return Ok(TickOutcome::Running { time_left });
            }
        }

        self.submit().await?;
        Ok(TickOutcome::Expired)
    }

    /// Tick only if `attempt_id` is still the active attempt
    pub async fn tick_attempt(&mut self, attempt_id: Uuid) -> Result<TickOutcome, QuizError> {
        let current = matches!(&self.state, QuizState::Active(session) if session.attempt_id == attempt_id);
        if current {
            self.tick().await
        } else {
            Ok(TickOutcome::Inactive)
        }
    }

    /// Score the attempt, clear its autosave, and update progress and leaderboard.
    ///
    /// If a store write fails the attempt stays active; calling submit again resumes
    /// from the first step that did not commit.
    pub async fn submit(&mut self) -> Result<ScoreCard, QuizError> {
        let now = self.clock.now();
        let today = self.clock.today();
        let user_name = self.display_name.clone().unwrap_or_default();

        let state = self.state.phase().as_str();
        let QuizState::Active(session) = &mut self.state else {
            return Err(QuizError::InvalidState { action: "submit", state });
        };
        let mut submission = match session.submission.take() {
            Some(submission) => submission,
            None => {
                session.record_elapsed(now);
                Submission {
                    score: ScoreCard::compute(&session.quiz, &session.answers),
                    completed_at: now,
                    completed_on: today,
                    autosave_cleared: false,
                    badges_earned: None,
                    leaderboard_written: false,
                }
            }
        };
        let session = session.clone();
        let quiz = Arc::clone(&session.quiz);
        let score = submission.score;
        let time_spent: f64 = session.time_per_question.iter().flatten().sum();

        let result = self
            .commit_submission(&mut submission, &quiz, &user_name, time_spent)
            .await;
        if let QuizState::Active(active) = &mut self.state {
            active.submission = Some(submission.clone());
        }
        result?;

        log_session_event!(
            "submit",
            quiz_id = quiz.id,
            attempt_id = session.attempt_id,
            format!("scored {}/{}", score.score, score.total)
        );

        self.state = QuizState::Results(QuizOutcome {
            attempt_id: session.attempt_id,
            quiz,
            user_name,
            answers: session.answers,
            score,
            rank: score.rank(),
            time_per_question: session.time_per_question,
            difficulty_progress: session.difficulty_progress,
            badges_earned: submission.badges_earned.unwrap_or_default(),
            completed_at: submission.completed_at,
            time_spent,
        });

        Ok(score)
    }

    async fn commit_submission(
        &self,
        submission: &mut Submission,
        quiz: &QuizDefinition,
        user_name: &str,
        time_spent: f64,
    ) -> Result<(), QuizError> {
        if !submission.autosave_cleared {
            self.store.delete(&keys::session(&quiz.id)).await?;
            submission.autosave_cleared = true;
        }

        if submission.badges_earned.is_none() {
            let update = self
                .progress
                .record(&CompletedQuiz {
                    score: submission.score.score,
                    total: submission.score.total,
                    category: quiz.category.clone(),
                    completed_on: submission.completed_on,
                })
                .await?;
            submission.badges_earned = Some(update.badges_earned);
        }

        if !submission.leaderboard_written {
            self.leaderboard
                .append(LeaderboardEntry {
                    user_name: user_name.to_string(),
                    quiz_title: quiz.title.clone(),
                    score: submission.score.score,
                    total: submission.score.total,
                    percentage: scoring::round_to_tenth(submission.score.percentage),
                    completed_at: submission.completed_at,
                    time_spent,
                })
                .await?;
            submission.leaderboard_written = true;
        }

        Ok(())
    }

    /// Results → review
    pub fn review(&mut self) -> Result<(), QuizError> {
        match std::mem::replace(&mut self.state, QuizState::Selection) {
            QuizState::Results(outcome) | QuizState::Review(outcome) => {
                self.state = QuizState::Review(outcome);
                Ok(())
            }
            other => {
                let state = other.phase().as_str();
                self.state = other;
                Err(QuizError::InvalidState {
                    action: "open review",
                    state,
                })
            }
        }
    }

    /// Review → results
    pub fn close_review(&mut self) -> Result<(), QuizError> {
        match std::mem::replace(&mut self.state, QuizState::Selection) {
            QuizState::Results(outcome) | QuizState::Review(outcome) => {
                self.state = QuizState::Results(outcome);
                Ok(())
            }
            other => {
                let state = other.phase().as_str();
                self.state = other;
                Err(QuizError::InvalidState {
                    action: "close review",
                    state,
                })
            }
        }
    }

    /// Back to selection, discarding per-attempt state. An abandoned active attempt keeps its autosave.
    pub fn reset(&mut self) {
        if let QuizState::Active(session) = &self.state {
            log_session_event!(
                "abandon",
                quiz_id = session.quiz.id,
                attempt_id = session.attempt_id,
                "left an active attempt; autosave kept"
            );
        }
        self.state = QuizState::Selection;
    }

    /// Start the same quiz again from results or review
    pub async fn retry(&mut self) -> Result<StartKind, QuizError> {
        let quiz_id = match &self.state {
            QuizState::Results(outcome) | QuizState::Review(outcome) => outcome.quiz.id.clone(),
            other => {
                return Err(QuizError::InvalidState {
                    action: "retry",
                    state: other.phase().as_str(),
                });
            }
        };

        self.state = QuizState::Selection;
        self.start(&quiz_id).await
    }

    /// Shareable link inviting someone to take the selected quiz
    pub fn challenge_link(&self, origin: &str) -> Option<String> {
        let quiz_id = match &self.state {
            QuizState::Active(session) => &session.quiz.id,
            QuizState::Results(outcome) | QuizState::Review(outcome) => &outcome.quiz.id,
            QuizState::Selection => return None,
        };
        let challenge_id: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();

        Some(format!(
            "{}/quiz?challenge={}&quiz={}",
            origin.trim_end_matches('/'),
            challenge_id,
            quiz_id
        ))
    }

    fn active_mut(&mut self, action: &'static str) -> Result<&mut QuizSession, QuizError> {
        let state = self.state.phase().as_str();
        match &mut self.state {
            QuizState::Active(session) if session.submission.is_some() => Err(QuizError::InvalidState {
                action,
                state: "submitting",
            }),
            QuizState::Active(session) => Ok(session),
            _ => Err(QuizError::InvalidState { action, state }),
        }
    }

    async fn persist(&self) -> Result<(), QuizError> {
        // A submitting attempt has already cleared its autosave
        if let QuizState::Active(session) = &self.state {
            if session.submission.is_some() {
                return Ok(());
            }
            write_json(
                self.store.as_ref(),
                &keys::session(&session.quiz.id),
                &session.snapshot(),
            )
            .await?;
        }
        Ok(())
    }
}
