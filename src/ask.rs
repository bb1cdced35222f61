//! `ask` and `compare` commands.
//!
//! `ask` answers one question in one mode. `compare` runs each question
//! through both modes and reports answers, top contexts, latency, and
//! whether hybrid ranking changed the top result.

use anyhow::Result;
use std::time::{Duration, Instant};

use docqa_core::engine::{Mode, QueryEngine, QueryRequest};
use docqa_core::models::QueryResponse;

use crate::config::Config;
use crate::db;
use crate::retriever::load_engine;

const PREVIEW_CHARS: usize = 100;

pub async fn run_ask(
    config: &Config,
    query: &str,
    mode: &str,
    k: Option<i64>,
    json: bool,
) -> Result<()> {
    let request = QueryRequest::new(query, k.unwrap_or(config.retrieval.default_k), mode)?;

    let pool = db::connect(config).await?;
    let loaded = load_engine(config, &pool).await?;
    pool.close().await;

    let response = loaded.engine.ask(&request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }
    Ok(())
}

fn print_response(response: &QueryResponse) {
    println!("Query: {}", response.query);
    println!(
        "Mode: {}",
        if response.reranker_used { "hybrid" } else { "baseline" }
    );
    println!();
    match &response.answer {
        Some(answer) => println!("Answer:\n{}", answer),
        None => println!("Answer: (none)"),
    }
    println!();
    println!("Reason: {}", response.reason);

    if response.contexts.is_empty() {
        return;
    }
    println!();
    println!("Contexts:");
    for (i, ctx) in response.contexts.iter().enumerate() {
        println!("  {}. [{:.3}] {}", i + 1, ctx.score, ctx.source);
        println!("     {}", preview(&ctx.text));
    }
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

/// One mode's result for a question.
struct ModeRun {
    response: QueryResponse,
    elapsed: Duration,
}

async fn timed(engine: &QueryEngine, request: &QueryRequest) -> Result<ModeRun> {
    let start = Instant::now();
    let response = engine.ask(request).await?;
    Ok(ModeRun {
        response,
        elapsed: start.elapsed(),
    })
}

pub async fn run_compare(config: &Config, queries: &[String], k: Option<i64>) -> Result<()> {
    let k = k.unwrap_or(config.retrieval.default_k);
    let requests = queries
        .iter()
        .map(|q| {
            Ok((
                QueryRequest::new(q, k, Mode::Baseline.as_str())?,
                QueryRequest::new(q, k, Mode::Hybrid.as_str())?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    let pool = db::connect(config).await?;
    let loaded = load_engine(config, &pool).await?;
    pool.close().await;

    let params = loaded.engine.params();
    println!(
        "threshold {} | hybrid alpha {} over {} candidates | k {}",
        params.similarity_threshold, params.alpha, params.candidate_k, k
    );

    let mut baseline_answers = 0usize;
    let mut hybrid_answers = 0usize;
    let mut baseline_time = Duration::ZERO;
    let mut hybrid_time = Duration::ZERO;

    for (baseline_req, hybrid_req) in &requests {
        let baseline = timed(&loaded.engine, baseline_req).await?;
        let hybrid = timed(&loaded.engine, hybrid_req).await?;

        println!();
        println!("Question: {}", baseline_req.query);
        println!("{}", "=".repeat(80));
        print_run("BASELINE", &baseline);
        print_run("HYBRID", &hybrid);

        println!();
        println!("COMPARISON:");
        let (b, h) = (
            baseline.response.answer.is_some(),
            hybrid.response.answer.is_some(),
        );
        println!(
            "  {}",
            match (b, h) {
                (true, true) => "both modes answered",
                (true, false) => "only baseline answered",
                (false, true) => "only hybrid answered",
                (false, false) => "neither mode answered",
            }
        );
        let top = |r: &ModeRun| r.response.contexts.first().map(|c| c.source.clone());
        match (top(&baseline), top(&hybrid)) {
            (Some(bt), Some(ht)) if bt != ht => {
                println!("  hybrid changed top result: {} -> {}", bt, ht)
            }
            (Some(_), Some(_)) => println!("  hybrid kept the same top result"),
            _ => {}
        }

        baseline_answers += b as usize;
        hybrid_answers += h as usize;
        baseline_time += baseline.elapsed;
        hybrid_time += hybrid.elapsed;
    }

    let n = requests.len().max(1);
    println!();
    println!("SUMMARY");
    println!("{}", "=".repeat(80));
    println!("  questions: {}", requests.len());
    println!(
        "  baseline answers: {}/{} ({:.1}%)",
        baseline_answers,
        requests.len(),
        baseline_answers as f64 * 100.0 / n as f64
    );
    println!(
        "  hybrid answers: {}/{} ({:.1}%)",
        hybrid_answers,
        requests.len(),
        hybrid_answers as f64 * 100.0 / n as f64
    );
    println!(
        "  average latency: baseline {:.3}s, hybrid {:.3}s",
        baseline_time.as_secs_f64() / n as f64,
        hybrid_time.as_secs_f64() / n as f64
    );
    Ok(())
}

fn print_run(label: &str, run: &ModeRun) {
    println!();
    println!("{} ({:.3}s)", label, run.elapsed.as_secs_f64());
    println!(
        "  Answer: {}",
        run.response.answer.as_deref().unwrap_or("(none)")
    );
    println!("  Reason: {}", run.response.reason);
    println!("  Top contexts:");
    for (i, ctx) in run.response.contexts.iter().take(3).enumerate() {
        println!("    {}. {:.3} | {}", i + 1, ctx.score, ctx.source);
    }
}
