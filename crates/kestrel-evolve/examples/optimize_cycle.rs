//! Runs a small hermetic optimize cycle with the scripted mock generator.
//!
//! Run with:
//! ```bash
//! cargo run --example optimize_cycle --package kestrel-evolve
//! ```

use std::sync::Arc;

use kestrel_config::{ExecutorConfig, FitnessWeights, PopulationConfig};
use kestrel_core::{Genome, GoldenExample, Intent};
use kestrel_evolve::PopulationLoop;
use kestrel_llm::{ConstValidator, Executor, GenerationOutput, MockGenerator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let golden: Vec<GoldenExample> = [
        ("what is 2+2?", "4"),
        ("capital of france?", "paris"),
        ("largest planet?", "jupiter"),
    ]
    .iter()
    .map(|(prompt, expected)| GoldenExample {
        prompt: prompt.to_string(),
        intent: Intent::Qa,
        expected: Some(expected.to_string()),
        context: None,
        quality_score: 1.0,
        metadata: serde_json::Value::Null,
    })
    .collect();

    // "good-model" answers correctly, "bad-model" rambles.
    let generator = Arc::new(MockGenerator::with_handler(|req| {
        let answer = if req.model_key == "good-model" {
            if req.prompt.contains("2+2") {
                "4"
            } else if req.prompt.contains("france") {
                "paris"
            } else {
                "jupiter"
            }
        } else {
            "I would rather talk about something else entirely"
        };
        Ok(GenerationOutput::from_text(&req.prompt, answer))
    }));

    let executor = Arc::new(
        Executor::new(generator, ExecutorConfig::default())
            .with_validator(Arc::new(ConstValidator(1.0))),
    );
    let population_loop = PopulationLoop::new(
        executor,
        FitnessWeights::default(),
        PopulationConfig {
            size: 6,
            generations: 4,
            eval_workers: 4,
            ..PopulationConfig::default()
        },
        vec!["good-model".into(), "bad-model".into()],
    );

    let base = Genome::new(
        "Answer the question directly.",
        false,
        0.6,
        256,
        0,
        false,
        "bad-model",
    )?;

    let outcome = population_loop.run(base, &golden, 4, 42, None).await?;

    println!("run {}", outcome.run_id);
    for record in &outcome.history {
        println!(
            "gen {}: best={:.4} mean={:.4} ({})",
            record.generation, record.best_score, record.mean_score, record.best_genome_id
        );
    }
    println!(
        "winner: model={} temp={:.2} score={:.4}",
        outcome.best.model_key(),
        outcome.best.temp(),
        outcome.best_score
    );

    Ok(())
}
