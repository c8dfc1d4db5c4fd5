//! Rate a developer, categorize their errors and fit a focus model
//!
//! Run with: cargo run --example rate_developer

use chrono::{TimeZone, Utc};
use serde_json::json;

use devflow_insights::predict::{LinearModel, ModelArtifact};
use devflow_insights::types::{FlowRecord, QualityRecord};
use devflow_insights::{
    categorize_errors, rate, FlowMetrics, Metric, ModelRegistry, QualityMetrics, RatingOutcome,
};

fn main() -> Result<(), devflow_insights::ComputeError> {
    let day = |d: u32| Utc.with_ymd_and_hms(2024, 1, d, 10, 0, 0).single().unwrap_or_default();

    let quality: Vec<QualityRecord> = [(80.0, 72.0), (64.0, 81.0), (91.0, 60.0)]
        .iter()
        .enumerate()
        .map(|(i, (readability, maintainability))| {
            QualityRecord::new(
                "alice",
                day(15 + i as u32),
                QualityMetrics {
                    readability: *readability,
                    maintainability: *maintainability,
                    modularity: 70.0 + i as f64 * 5.0,
                    documentation: 55.0,
                    error_handling: 60.0 + i as f64,
                    duplication: 10.0 - i as f64,
                },
            )
        })
        .collect();

    let flow: Vec<FlowRecord> = [(78.0, 45.0, 2.0), (85.0, 90.0, 0.0), (62.0, 30.0, 5.0)]
        .iter()
        .enumerate()
        .map(|(i, (focus, minutes, errors))| {
            FlowRecord::new(
                "alice",
                day(15 + i as u32),
                FlowMetrics {
                    focus_score: *focus,
                    session_duration: *minutes,
                    syntax_errors: *errors,
                    warning_count: 3.0,
                    problem_count: *errors + 1.0,
                },
            )
        })
        .collect();

    match rate(&quality, &flow)? {
        RatingOutcome::Rated(rating) => {
            println!("Composite rating:    {:.2}", rating.composite_rating);
            println!("Code analysis score: {:.2}", rating.code_analysis_score);
            println!("Flow metrics score:  {:.2}", rating.flow_metrics_score);
            println!("Average focus:       {:.2}", rating.average_focus_score);
        }
        RatingOutcome::NoData { category } => println!("No {category} records"),
    }

    let messages = [
        json!("Unexpected token ';' in expression"),
        json!("Missing semicolon before statement"),
        json!("Cannot find module 'lodash'"),
        json!("Module not found: cannot resolve './utils'"),
        json!("Variable 'count' is declared but never used"),
        json!("Unused import 'React' warning"),
    ];
    println!("\nError categories:");
    for (label, count) in categorize_errors(messages.iter())? {
        println!("  {label}: {count}");
    }

    let rows = vec![
        vec![5.0, 12.0, 45.0, 38.0, 4.0, 180.0],
        vec![2.0, 12.0, 30.0, 20.0, 9.0, 240.0],
        vec![8.0, 15.0, 90.0, 82.0, 3.0, 150.0],
        vec![1.0, 15.0, 20.0, 10.0, 8.0, 300.0],
        vec![6.0, 15.0, 60.0, 52.0, 5.0, 170.0],
        vec![4.0, 16.0, 50.0, 40.0, 6.0, 200.0],
        vec![9.0, 16.0, 120.0, 110.0, 2.0, 140.0],
        vec![3.0, 16.0, 35.0, 25.0, 7.0, 260.0],
    ];
    let targets = [72.0, 48.0, 88.0, 35.0, 76.0, 64.0, 93.0, 50.0];
    let model = LinearModel::fit(&rows, &targets, 0.1, true)?;

    let mut registry = ModelRegistry::new();
    registry.insert(Metric::FocusScore, ModelArtifact::Linear(model))?;

    let session = json!({
        "currentStreak": 7,
        "longestStreak": 16,
        "sessionDuration": 75,
        "activeFileDuration": 66,
        "idleTime": 4,
        "typingRhythm": 160
    });
    let prediction = registry.predict("focus_score", &session)?;
    println!("\nPredicted focus: {:.1}", prediction.value);
    if let Some(insight) = prediction.insight {
        println!("Insight: {insight}");
    }

    Ok(())
}
