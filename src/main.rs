//! Command-line interface for the punid pun identification engine.
//!
//! Analyzes sentences for puns and gives direct access to the FrameNet frame database
//! the analysis relies on.

use clap::{Args, Parser, Subcommand};
use colored::*;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{LevelFilter, debug, error, info, warn};
use punid::{
    EngineOptions, FrameKnowledge, FrameNet, FrameStrategy, LoadOptions, PunAnalysisResult,
    PunIdentificationEngine, Unavailable,
    error::{PieError, Result},
    llm::{API_KEY_ENV_VAR, resolve_api_key},
    progress::{ProgressCallback, ProgressUpdate},
};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about = "Pun identification engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a custom database file (optional)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Directory holding the FrameNet corpus (e.g. an NLTK `corpora` directory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Force reload data, ignoring existing database content
    #[arg(long, global = true, default_value_t = false)]
    force_reload: bool,

    /// Run without the FrameNet database; frame distances are estimated
    #[arg(long, global = true, default_value_t = false)]
    no_framenet: bool,

    /// Set verbosity level (use -v, -vv, or -vvv for increasing verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Args, Debug)]
struct CredentialArgs {
    /// Anthropic API key (or set ANTHROPIC_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// File containing the Anthropic API key
    #[arg(long)]
    key_file: Option<PathBuf>,

    /// Model to use (defaults to ANTHROPIC_MODEL or the built-in default)
    #[arg(long)]
    model: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze sentences for puns
    Analyze {
        /// Sentence to analyze
        sentence: Option<String>,

        /// Analyze every non-empty line of a file
        #[arg(short, long, conflicts_with = "sentence")]
        file: Option<PathBuf>,

        /// Read sentences from stdin until EOF or "quit"
        #[arg(short, long, conflicts_with_all = ["sentence", "file"])]
        interactive: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Skip the validation pass
        #[arg(long)]
        no_validate: bool,

        /// How pun frames are chosen: sense-frames or word-lookup
        #[arg(long, default_value_t = FrameStrategy::SenseFrames)]
        strategy: FrameStrategy,

        #[command(flatten)]
        credentials: CredentialArgs,
    },
    /// List the frames evoked by a word, optionally filtered by part of speech (v, n, a, ...)
    Frames { word: String, pos: Option<String> },
    /// Show the FrameNet distance between two frames
    Distance { frame1: String, frame2: String },
    /// Show engine capabilities
    Status {
        /// Print status as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        credentials: CredentialArgs,
    },
    /// Clear the FrameNet database
    ClearDb,
}

/// Sets up logging based on verbosity level.
fn setup_logging(verbose: u8) {
    let log_level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter(None, log_level)
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}

/// Creates a progress callback for displaying download and processing progress.
fn create_progress_callback(
    multi_progress: MultiProgress,
    progress_bars: Arc<Mutex<HashMap<String, ProgressBar>>>,
) -> ProgressCallback {
    Box::new(move |update: ProgressUpdate| {
        let Ok(mut bars) = progress_bars.lock() else {
            return true;
        };

        if update.current_item == 0 && !bars.contains_key(&update.stage_description) {
            let pb = multi_progress.add(ProgressBar::new(update.total_items.unwrap_or(0)));
            let style_template = if update.total_items.is_some() {
                "{prefix:>12.cyan.bold} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} ({percent}%) {msg}"
            } else {
                "{prefix:>12.cyan.bold} [{elapsed_precise}] {spinner} {msg}"
            };
            let style = ProgressStyle::default_bar()
                .template(style_template)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-");

            pb.set_style(style);
            pb.set_prefix(update.stage_description.clone());
            pb.set_message(update.message.unwrap_or_default());
            pb.enable_steady_tick(Duration::from_millis(100));
            bars.insert(update.stage_description.clone(), pb);
        } else if let Some(pb) = bars.get(&update.stage_description) {
            pb.set_position(update.current_item);
            if let Some(msg) = update.message {
                pb.set_message(msg);
            }
            if let Some(total) = update.total_items {
                if update.current_item >= total {
                    pb.finish_and_clear();
                }
            }
        }
        true
    })
}

/// Loads (downloading and populating on first use) the FrameNet database.
async fn load_framenet(cli: &Cli) -> Result<FrameNet> {
    info!("Loading FrameNet data...");
    let multi_progress = MultiProgress::new();
    let progress_bars = Arc::new(Mutex::new(HashMap::<String, ProgressBar>::new()));
    let callback = create_progress_callback(multi_progress.clone(), progress_bars.clone());

    let load_options = LoadOptions {
        db_path: cli.db_path.clone(),
        data_dir: cli.data_dir.clone(),
        force_reload: cli.force_reload,
    };
    let start = Instant::now();
    let result = tokio::spawn(FrameNet::load_with_options(load_options, Some(callback))).await;

    if let Ok(bars) = progress_bars.lock() {
        for pb in bars.values() {
            pb.finish_and_clear();
        }
    }
    drop(multi_progress);
    std::io::stdout().flush().ok();

    let framenet = result??;
    debug!("FrameNet loaded in {:?}", start.elapsed());
    Ok(framenet)
}

/// Frame knowledge for the engine; a load failure degrades to no frame graph.
async fn knowledge_for_engine(cli: &Cli) -> Arc<dyn FrameKnowledge> {
    if cli.no_framenet {
        return Arc::new(Unavailable);
    }
    match load_framenet(cli).await {
        Ok(framenet) => Arc::new(framenet),
        Err(e) => {
            warn!("FrameNet unavailable, frame distances will be estimated: {}", e);
            Arc::new(Unavailable)
        }
    }
}

fn build_engine(
    credentials: &CredentialArgs,
    options: EngineOptions,
    knowledge: Arc<dyn FrameKnowledge>,
) -> Result<PunIdentificationEngine> {
    let mut engine = PunIdentificationEngine::new(options).with_knowledge(knowledge);
    let api_key = resolve_api_key(
        credentials.key_file.as_deref(),
        credentials.api_key.as_deref(),
        API_KEY_ENV_VAR,
    )?;
    if let Some(api_key) = api_key {
        engine.configure(&api_key)?;
    }
    Ok(engine)
}

/// Prints the error in red and exits with status 1.
fn fail(context: &str, e: PieError) -> ! {
    error!("{}: {}", context, e);
    eprintln!("{}", format!("{}: {}", context, e).red());
    std::process::exit(1);
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match &cli.command {
        Commands::Analyze {
            sentence,
            file,
            interactive,
            json,
            no_validate,
            strategy,
            credentials,
        } => {
            let options = EngineOptions {
                model: credentials.model.clone(),
                validate: !no_validate,
                frame_strategy: *strategy,
                ..Default::default()
            };
            let knowledge = knowledge_for_engine(&cli).await;
            let engine = build_engine(credentials, options, knowledge)
                .unwrap_or_else(|e| fail("Error configuring engine", e));
            if !engine.is_configured() {
                fail(
                    "Error",
                    PieError::InvalidArgument(format!(
                        "no API key; set {} or use --api-key / --key-file",
                        API_KEY_ENV_VAR
                    )),
                );
            }

            let outcome = if *interactive {
                run_interactive(&engine, *json).await
            } else if let Some(path) = file {
                analyze_file(&engine, path, *json).await
            } else if let Some(sentence) = sentence {
                analyze_one(&engine, sentence, *json).await
            } else {
                Err(PieError::InvalidArgument(
                    "provide a sentence, --file or --interactive".to_string(),
                ))
            };
            if let Err(e) = outcome {
                fail("Error analyzing", e);
            }
        }
        Commands::Frames { word, pos } => {
            let framenet = load_framenet(&cli)
                .await
                .unwrap_or_else(|e| fail("Failed to load FrameNet data", e));
            if let Err(e) = handle_frames(&framenet, word, pos.as_deref()) {
                fail(&format!("Error looking up frames for '{}'", word), e);
            }
        }
        Commands::Distance { frame1, frame2 } => {
            let framenet = load_framenet(&cli)
                .await
                .unwrap_or_else(|e| fail("Failed to load FrameNet data", e));
            match framenet.relation_distance(frame1, frame2) {
                Ok((distance, explanation)) if distance >= 0.0 => {
                    println!("{} {}", "Distance:".bold(), distance.to_string().cyan());
                    println!("{}", explanation.dimmed());
                }
                Ok((_, explanation)) => println!("{}", explanation.yellow()),
                Err(e) => fail("Error calculating distance", e),
            }
        }
        Commands::Status { json, credentials } => {
            let knowledge = knowledge_for_engine(&cli).await;
            let engine = build_engine(credentials, EngineOptions::default(), knowledge)
                .unwrap_or_else(|e| fail("Error configuring engine", e));
            let status = engine.status();
            if *json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                let flag = |on: bool| if on { "yes".green() } else { "no".yellow() };
                println!("{:<28} {}", "Configured:".bold(), flag(status.configured));
                println!("{:<28} {}", "Model:".bold(), status.model.cyan());
                println!("{:<28} {}", "Validation:".bold(), flag(status.validation_enabled));
                println!("{:<28} {}", "Frame strategy:".bold(), status.frame_strategy);
                println!(
                    "{:<28} {}",
                    "FrameNet available:".bold(),
                    flag(status.knowledge_provider_available)
                );
                println!(
                    "{:<28} {}",
                    "Syntactic analyzer:".bold(),
                    flag(status.syntactic_analyzer_available)
                );
            }
        }
        Commands::ClearDb => {
            info!("Clearing database...");
            match FrameNet::clear_database(cli.db_path.clone()) {
                Ok(_) => println!("{}", "Database cleared successfully.".green()),
                Err(e) => fail("Error clearing database", e),
            }
        }
    }

    Ok(())
}

async fn analyze_one(engine: &PunIdentificationEngine, sentence: &str, json: bool) -> Result<()> {
    let start = Instant::now();
    let result = engine.analyze(sentence).await?;
    debug!("Analysis took {:?}", start.elapsed());
    if json {
        println!("{}", result.to_json_pretty()?);
    } else {
        print_result(&result);
    }
    Ok(())
}

async fn analyze_file(engine: &PunIdentificationEngine, path: &Path, json: bool) -> Result<()> {
    let content = tokio::fs::read_to_string(path).await?;
    let sentences: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    info!("Analyzing {} sentences from {:?}", sentences.len(), path);

    let results = engine.analyze_batch(&sentences).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for result in &results {
            print_result(result);
        }
        let with_puns = results.iter().filter(|r| r.has_pun == 1).count();
        println!(
            "{} {}/{} sentences contain puns",
            "Summary:".bold(),
            with_puns,
            results.len()
        );
    }
    Ok(())
}

async fn run_interactive(engine: &PunIdentificationEngine, json: bool) -> Result<()> {
    println!("Enter sentences to analyze (\"quit\" to exit).");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let sentence = line.trim();
        if sentence.is_empty() {
            continue;
        }
        if matches!(sentence.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }
        // Keep the session alive on per-sentence failures.
        if let Err(e) = analyze_one(engine, sentence, json).await {
            eprintln!("{}", format!("Error: {}", e).red());
        }
    }
    Ok(())
}

fn handle_frames(framenet: &FrameNet, word: &str, pos: Option<&str>) -> Result<()> {
    let frames = framenet.lookup_frames(word, pos)?;
    if frames.is_empty() {
        println!("No frames found for '{}'.", word.yellow());
        return Ok(());
    }
    for frame in frames {
        println!(
            "\n{} ~ {}",
            frame.name.bold().cyan(),
            frame.lexical_unit.italic()
        );
        println!("  {}", frame.definition.trim());
        if !frame.core_elements.is_empty() {
            println!(
                "  {}: {}",
                "Core elements".magenta(),
                frame.core_elements.join(", ").green()
            );
        }
    }
    println!();
    Ok(())
}

fn print_result(result: &PunAnalysisResult) {
    println!("\n{} {}", "Sentence:".bold(), result.sentence);
    if result.puns.is_empty() {
        println!("  {}", "No pun detected.".yellow());
        if !result.analysis_notes.is_empty() {
            println!("  {}", result.analysis_notes.dimmed());
        }
        return;
    }

    for (idx, pun) in result.puns.iter().enumerate() {
        let pun_type = match pun.pun_type_enum {
            Some(pun_type) => pun_type.to_string(),
            None => pun.pun_type.clone(),
        };
        println!(
            "  {}. {} [{}]",
            (idx + 1).to_string().bold(),
            pun.word_or_expression.bold().cyan(),
            pun_type.italic()
        );
        println!("     {}: {}", "Sense 1".magenta(), pun.sense1);
        println!("     {}: {}", "Sense 2".magenta(), pun.sense2);

        if let Some(distance) = &pun.frame_distance {
            let name = |frame: &Option<punid::FrameDescriptor>| {
                frame
                    .as_ref()
                    .map_or_else(|| "?".to_string(), |f| f.name.clone())
            };
            println!(
                "     {}: {} <-> {} (distance {:.1}, {})",
                "Frames".magenta(),
                name(&distance.sense1_frame),
                name(&distance.sense2_frame),
                distance.distance,
                distance.distance_type
            );
            if !distance.explanation.is_empty() {
                println!("        {}", distance.explanation.dimmed());
            }
        }
        if !pun.explanation.is_empty() {
            println!("     {}: {}", "Explanation".magenta(), pun.explanation);
        }
        if !pun.context_words.is_empty() {
            println!(
                "     {}: {}",
                "Context".magenta(),
                pun.context_words.join(", ").green()
            );
        }
        if let Some(validation) = &pun.validation {
            let verdict = |ok: bool| if ok { "pass".green() } else { "fail".red() };
            println!(
                "     {}: sense activation {}, substitution {}",
                "Validation".magenta(),
                verdict(validation.distributional_valid),
                verdict(validation.substitution_valid)
            );
            let confidence = format!("{:.2}", pun.confidence);
            let confidence = if pun.confidence >= 0.7 {
                confidence.green()
            } else if pun.confidence >= 0.4 {
                confidence.yellow()
            } else {
                confidence.red()
            };
            println!("     {}: {}", "Confidence".magenta(), confidence);
        }
    }
    if !result.analysis_notes.is_empty() {
        println!("  {}", result.analysis_notes.dimmed());
    }
}
