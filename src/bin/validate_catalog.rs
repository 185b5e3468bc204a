use anyhow::Result;
use quiz_engine::catalog::{CatalogIssue, QuizCatalog};
use std::collections::BTreeMap;
use std::env;
use std::process::ExitCode;

#[derive(Debug)]
struct ValidationReport {
    quiz_count: usize,
    question_count: usize,
    issues: Vec<CatalogIssue>,
}

impl ValidationReport {
    fn new(catalog: &QuizCatalog) -> Self {
        Self {
            quiz_count: catalog.len(),
            question_count: catalog.iter().map(|quiz| quiz.question_count()).sum(),
            issues: catalog.validate(),
        }
    }

    fn print_summary(&self) {
        println!("\n=== Validation Summary ===");
        println!("Quizzes examined: {}", self.quiz_count);
        println!("Questions examined: {}", self.question_count);

        if self.issues.is_empty() {
            println!("\n✓ No issues found");
            return;
        }

        let mut by_quiz: BTreeMap<&str, Vec<&CatalogIssue>> = BTreeMap::new();
        for issue in &self.issues {
            by_quiz.entry(issue.quiz_id.as_str()).or_default().push(issue);
        }

        println!("Issues found: {}", self.issues.len());
        for (quiz_id, issues) in by_quiz {
            println!("\n{} ({} issues)", quiz_id, issues.len());
            for issue in issues {
                println!("  - {}", issue);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    let path = env::args()
        .nth(1)
        .or_else(|| env::var("QUIZ_CATALOG_PATH").ok())
        .unwrap_or_else(|| "data/quizzes.json".to_string());

    println!("=== Quiz Catalog Validator ===");
    println!("Catalog: {}", path);

    let catalog = QuizCatalog::load(&path).await?;
    for quiz in catalog.iter() {
        println!(
            "  {} - \"{}\" [{}], {} questions, {}s",
            quiz.id,
            quiz.title,
            quiz.category,
            quiz.question_count(),
            quiz.duration
        );
    }

    let report = ValidationReport::new(&catalog);
    report.print_summary();

    if report.issues.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
