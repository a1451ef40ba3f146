//! Command implementations for the gemlab CLI

use anyhow::{anyhow, bail, Context, Result};
use gemlab_core::agent::{steward_tools, Agent, TracingObserver};
use gemlab_core::chat::{review_code, save_markdown, ChatSession, ARCHITECT_COT_PROMPT};
use gemlab_core::config::{self, EmbedderKind, GemlabConfig, API_KEY_ENV};
use gemlab_core::critique::CritiqueLoop;
use gemlab_core::embedding::{similarity_report, EmbeddingService};
use gemlab_core::persistence::{read_json, JsonArchive};
use gemlab_core::protocol::UsageMetadata;
use gemlab_core::providers::{
    DifyClient, Embedder, GeminiClient, GenerativeModel, HashingEmbedder,
};
use gemlab_core::rag::{Indexer, RagPipeline, VectorStore};
use gemlab_core::structured::{
    render_plan_table, ProjectPlan, StructuredGenerator, PLANNER_PROMPT, PLAN_ARCHIVE_PREFIX,
};
use gemlab_core::vision::{happiness_average, PetAnalysis, PetLifeAssistant, PET_LOG_PREFIX};
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;

const QUIT_WORDS: [&str; 2] = ["quit", "exit"];

fn load_config(path: Option<&Path>) -> Result<GemlabConfig> {
    match path {
        Some(path) => config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => GemlabConfig::from_env().context("Failed to build config from the environment"),
    }
}

fn model(config: &GemlabConfig, model_id: &str) -> Result<Arc<dyn GenerativeModel>> {
    let client = GeminiClient::from_config(config, model_id)
        .context("Failed to create Gemini client")?;
    Ok(Arc::new(client))
}

fn store_embedder(config: &GemlabConfig) -> Result<Arc<dyn Embedder>> {
    Ok(match config.rag.embedder {
        EmbedderKind::Hashing => Arc::new(HashingEmbedder::new(config.rag.hashing_dimensions)),
        EmbedderKind::Gemini => Arc::new(
            GeminiClient::from_config(config, &config.models.embedding)
                .context("Failed to create embedding client")?,
        ),
    })
}

fn open_store(config: &GemlabConfig) -> Result<VectorStore> {
    VectorStore::open(
        &config.rag.store_path,
        &config.rag.collection,
        store_embedder(config)?,
    )
    .with_context(|| format!("Failed to open vector store {}", config.rag.store_path.display()))
}

fn print_usage(usage: Option<UsageMetadata>) {
    if let Some(usage) = usage {
        println!(
            "tokens: prompt {} + reply {} = {}",
            usage.prompt_token_count, usage.candidates_token_count, usage.total_token_count
        );
    }
}

fn stdin_lines() -> Lines<BufReader<Stdin>> {
    BufReader::new(tokio::io::stdin()).lines()
}

/// Prompt and read one trimmed line; `None` at end of input
async fn read_line(lines: &mut Lines<BufReader<Stdin>>, prompt: &str) -> Result<Option<String>> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?.map(|l| l.trim().to_string()))
}

pub fn check_env(config_path: Option<&Path>) -> Result<()> {
    println!("gemlab {}", gemlab_core::version());

    let key_set = std::env::var(API_KEY_ENV)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);
    println!("{}: {}", API_KEY_ENV, if key_set { "set" } else { "missing" });

    match load_config(config_path) {
        Ok(config) => {
            println!("config: ok");
            println!("  api key: {}", config.api.api_key.masked());
            println!("  base url: {}", config.api.base_url);
            println!(
                "  models: chat={} vision={} embedding={} agent={}",
                config.models.chat,
                config.models.vision,
                config.models.embedding,
                config.models.agent
            );
            println!("  output dir: {}", config.output_dir.display());
            println!(
                "  vector store: {} ({})",
                config.rag.store_path.display(),
                if config.rag.store_path.exists() { "present" } else { "not built yet" }
            );
            println!("  dify: {}", if config.dify.is_some() { "configured" } else { "not configured" });
            Ok(())
        }
        Err(e) => {
            println!("config: {:#}", e);
            Err(e)
        }
    }
}

pub async fn chat(config_path: Option<&Path>, architect: bool, system: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let mut session = ChatSession::new(model(&config, &config.models.chat)?);
    if architect {
        session = session.with_system_instruction(ARCHITECT_COT_PROMPT);
    } else if let Some(system) = system {
        session = session.with_system_instruction(system);
    }
    if let Some(temperature) = config.generation.temperature {
        session = session.with_temperature(temperature);
    }

    println!("Chat ready ('quit' to leave, 'reset' to forget)");
    let mut lines = stdin_lines();
    while let Some(input) = read_line(&mut lines, "> ").await? {
        if input.is_empty() {
            continue;
        }
        if QUIT_WORDS.contains(&input.to_lowercase().as_str()) {
            break;
        }
        if input == "reset" {
            session.reset();
            println!("History cleared");
            continue;
        }

        match session.ask(&input).await {
            Ok(answer) => {
                println!("\n{}\n", answer);
                println!("turns: {}", session.history().len() / 2);
                print_usage(session.last_usage());
            }
            Err(e) => eprintln!("error: {}", e),
        }
    }
    Ok(())
}

pub async fn review(config_path: Option<&Path>, file: &Path, out: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let code = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let model = model(&config, &config.models.chat)?;
    let review = review_code(model.as_ref(), &code).await?;
    println!("{}", review.markdown);
    print_usage(review.usage);

    if let Some(out) = out {
        save_markdown(out, &review.markdown)?;
        info!(path = %out.display(), "Review saved");
    }
    Ok(())
}

pub async fn plan(config_path: Option<&Path>, requirement: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let requirement = std::fs::read_to_string(requirement)
        .with_context(|| format!("Failed to read {}", requirement.display()))?;

    let generator = StructuredGenerator::new(model(&config, &config.models.chat)?)
        .with_system_instruction(PLANNER_PROMPT);
    let plan: ProjectPlan = generator
        .generate_typed(&ProjectPlan::prompt(&requirement))
        .await?;

    println!("{}", render_plan_table(&plan));
    println!("total: {} modules, {} days", plan.total_modules, plan.total_days());

    let path = JsonArchive::new(&config.output_dir).save(PLAN_ARCHIVE_PREFIX, &plan)?;
    println!("saved: {}", path.display());
    Ok(())
}

pub async fn critique(config_path: Option<&Path>, context: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let archive = JsonArchive::new(&config.output_dir);

    let context: Value = match context {
        Some(path) => read_json(path)?,
        None => {
            let (value, path) = archive
                .load_latest(PLAN_ARCHIVE_PREFIX)?
                .ok_or_else(|| anyhow!("No saved plan in {}; run `gemlab plan` or pass --context", archive.dir().display()))?;
            info!(path = %path.display(), "Using latest plan as design context");
            value
        }
    };

    let critique = CritiqueLoop::new(model(&config, &config.models.chat)?, config.critique.clone());
    let outcome = critique.run(&context).await?;

    for round in &outcome.history {
        println!("round {}: score {}", round.round, round.score);
        for critique in &round.critiques {
            println!("  - {}", critique);
        }
    }
    println!(
        "\nbest: round {} with score {}{}",
        outcome.best.round,
        outcome.best.score,
        if outcome.passed { "" } else { " (below pass score)" }
    );
    println!("{}", outcome.best.code);

    let path = outcome.archive(&archive)?;
    println!("saved: {}", path.display());
    Ok(())
}

pub async fn vision(config_path: Option<&Path>, image: &Path, no_log: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let assistant = PetLifeAssistant::new(model(&config, &config.models.vision)?);
    let archive = JsonArchive::new(&config.output_dir);

    let analysis = if no_log {
        assistant.analyze(image).await?
    } else {
        let (analysis, path) = assistant.analyze_and_log(image, &archive).await?;
        info!(path = %path.display(), "Observation archived");
        analysis
    };

    match analysis {
        PetAnalysis::NoDog(message) => println!("{}", message),
        PetAnalysis::Observation(obs) => {
            println!("name: {}", obs.dog_name);
            println!("breed: {}", obs.breed_guess);
            println!("health: {}", obs.health_status);
            println!("happiness: {}/10", obs.happiness_level);
            println!("mood: {}", obs.mood_assessment);
            println!("suggestions: {}", obs.care_suggestions);

            let records: Vec<Value> = archive
                .load_all(PET_LOG_PREFIX)?
                .into_iter()
                .map(|(value, _)| value)
                .collect();
            if let Some(summary) = happiness_average(&records, &obs.dog_name) {
                println!(
                    "average happiness over {} logs: {:.1}",
                    summary.observations, summary.average
                );
            }
        }
    }
    Ok(())
}

pub async fn embed(
    config_path: Option<&Path>,
    base: String,
    others: Vec<String>,
    local: bool,
) -> Result<()> {
    if others.is_empty() {
        bail!("Give at least one text to compare against");
    }

    let embedder: Arc<dyn Embedder> = if local {
        Arc::new(HashingEmbedder::default())
    } else {
        let config = load_config(config_path)?;
        Arc::new(GeminiClient::from_config(&config, &config.models.embedding)?)
    };

    let service = EmbeddingService::new(embedder);
    let mut texts = vec![base.clone()];
    texts.extend(others.iter().cloned());
    let vectors = service.fetch_batch(&texts).await;

    println!("base: {}", base);
    for row in similarity_report(&vectors, &base, &others) {
        println!("{:.4}  {}  {}", row.score, row.status.label(), row.text);
    }
    Ok(())
}

pub async fn index(config_path: Option<&Path>, dir: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let mut store = open_store(&config)?;
    let indexer = Indexer::new(&config.rag)?;

    let stats = indexer.index_dir(&mut store, dir).await?;
    store.save()?;

    println!(
        "indexed {} files into {} records ({} skipped); collection now holds {}",
        stats.files,
        stats.chunks,
        stats.skipped,
        store.count()
    );
    Ok(())
}

pub async fn ask(config_path: Option<&Path>, question: &str, category: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let store = Arc::new(open_store(&config)?);
    let pipeline = RagPipeline::from_settings(store, model(&config, &config.models.chat)?, &config.rag);

    let reply = pipeline.answer(question, category).await?;
    println!("{}", reply.answer);
    if !reply.sources.is_empty() {
        println!("\nsources:");
        for hit in &reply.sources {
            let source = hit
                .metadata
                .get("source")
                .and_then(Value::as_str)
                .unwrap_or("?");
            println!("  {} ({}, distance {:.3})", hit.id, source, hit.distance);
        }
    }
    Ok(())
}

pub async fn agent(config_path: Option<&Path>, query: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let store = Arc::new(open_store(&config)?);
    let mut agent = Agent::with_settings(
        model(&config, &config.models.agent)?,
        steward_tools(store),
        &config.agent,
    )
    .with_observer(Arc::new(TracingObserver));

    if let Some(query) = query {
        let reply = agent.chat(&query).await?;
        println!("{}", reply.text());
        return Ok(());
    }

    println!("Steward ready ('quit' to leave, 'reset' to forget)");
    let mut lines = stdin_lines();
    while let Some(input) = read_line(&mut lines, "> ").await? {
        if input.is_empty() {
            continue;
        }
        if QUIT_WORDS.contains(&input.to_lowercase().as_str()) {
            break;
        }
        if input == "reset" {
            agent.reset();
            println!("History cleared");
            continue;
        }

        match agent.chat(&input).await {
            Ok(reply) => println!("\n{}\n", reply.text()),
            Err(e) => eprintln!("error: {}", e),
        }
    }
    Ok(())
}

pub async fn dify(config_path: Option<&Path>, query: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let settings = config
        .dify
        .as_ref()
        .ok_or_else(|| anyhow!("No `dify` section in the configuration"))?;

    let mut client = DifyClient::new(settings, config.retry.clone())?;
    let reply = client.ask(query).await?;

    println!("{}", reply.answer);
    match &reply.metadata.usage {
        Some(usage) => println!("usage: {}", usage),
        None => println!("usage: unknown"),
    }
    Ok(())
}
