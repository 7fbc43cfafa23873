use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ielts_coach::live::LiveAssistant;
use ielts_coach::{
    Config, WeeklyReport, WritingAnalysis, WritingAssistant, WritingCoach, WritingSubmission,
};

#[derive(Parser, Debug)]
#[command(version, about = "IELTS Writing Task 2 coach", long_about = None)]
struct Cli {
    /// Path to config.toml
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// User id for stored submissions and vocabulary (defaults to config user.id)
    #[arg(short, long)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Offline position, overuse and vocabulary feedback
    Analyze { file: Option<PathBuf> },
    /// Score an essay with the AI examiner and save it
    Evaluate { file: Option<PathBuf> },
    /// Score several essay files concurrently
    Batch {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Export past submissions to CSV
    History {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Record a vocabulary review
    Review {
        word: String,
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        increment: i64,
    },
    /// Vocabulary progress summary
    Vocab,
    /// Read the sample answer of a submission aloud
    Speak {
        id: i64,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Re-analyze a file every time it is saved
    Watch { file: Option<PathBuf> },
    /// Score a speaking transcript and save it
    SpeakEval {
        file: PathBuf,
        /// Speaking topic (defaults to config input.speaking_topic)
        #[arg(short, long)]
        topic: Option<String>,
    },
    /// Weekly progress report from stored submissions
    Report,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ielts_coach=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;
    let user_id = cli.user.clone().unwrap_or_else(|| config.user.id.clone());

    match cli.command {
        Command::Analyze { file } => {
            let path = essay_path(file, &config);
            let text = read_essay(&path)?;
            print_analysis(&ielts_coach::analyze(&text));
        }
        Command::Evaluate { file } => {
            let path = essay_path(file, &config);
            let text = read_essay(&path)?;
            let prompt = config.input.prompt.clone();
            let coach = WritingCoach::new(config).await?;

            print_analysis(&coach.assist(&text));
            println!("\n🔄 Sending essay for evaluation...");
            let submission = coach.submit_essay(&user_id, &prompt, &text).await?;
            print_submission(&submission);
        }
        Command::Batch { files } => {
            let prompt = config.input.prompt.clone();
            let coach = WritingCoach::new(config).await?;
            let report = coach.submit_batch(&user_id, &prompt, &files).await?;

            for submission in &report.submitted {
                println!("✅ #{} band {:.1}", submission.id, submission.band_score);
            }
            for (path, error) in &report.failed {
                println!("❌ {}: {}", path.display(), error);
            }
            println!(
                "\n🎉 {} scored, {} failed",
                report.submitted.len(),
                report.failed.len()
            );
        }
        Command::History { output } => {
            let output = output.unwrap_or_else(|| PathBuf::from(&config.output.history_file));
            let coach = WritingCoach::new(config).await?;

            for submission in coach.history(&user_id).await? {
                println!(
                    "📄 #{} {} {} band {:.1}",
                    submission.id,
                    submission.created_at,
                    submission.task_type,
                    submission.band_score
                );
            }
            let count = coach.export_history(&user_id, &output).await?;
            println!("✅ {} submissions exported to {}", count, output.display());
        }
        Command::Review { word, increment } => {
            let coach = WritingCoach::new(config).await?;
            let record = coach.record_review(&user_id, &word, increment).await?;
            println!("📝 {} familiarity {}/5", record.word, record.familiarity);
        }
        Command::Vocab => {
            let coach = WritingCoach::new(config).await?;
            let (stats, at_risk) = coach.vocab_report(&user_id).await?;
            println!(
                "📊 {} words: {} mastered, {} learning",
                stats.total, stats.mastered, stats.learning
            );
            for record in at_risk {
                println!("  ⚠️  {} ({}/5)", record.word, record.familiarity);
            }
        }
        Command::Speak { id, output } => {
            let coach = WritingCoach::new(config).await?;
            let path = coach.speak_sample_answer(id, output.as_deref()).await?;
            println!("🎵 Sample answer saved to {}", path.display());
        }
        Command::SpeakEval { file, topic } => {
            let transcript = read_essay(&file)?;
            let topic = topic.unwrap_or_else(|| config.input.speaking_topic.clone());
            let coach = WritingCoach::new(config).await?;

            println!("🔄 Sending transcript for evaluation...");
            let submission = coach.submit_speaking(&user_id, &topic, &transcript).await?;
            print_submission(&submission);
        }
        Command::Report => {
            let coach = WritingCoach::new(config).await?;
            println!("🔄 Generating weekly report...");
            print_report(&coach.weekly_report(&user_id).await?);
        }
        Command::Watch { file } => {
            let path = essay_path(file, &config);
            let debounce = Duration::from_millis(config.assistant.debounce_ms);
            watch_file(&path, debounce).await?;
        }
    }

    Ok(())
}

fn essay_path(file: Option<PathBuf>, config: &Config) -> PathBuf {
    file.unwrap_or_else(|| PathBuf::from(&config.input.essay_file))
}

fn read_essay(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read essay {}: {}", path.display(), e))
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

// Poll the file and let the live assistant debounce bursts of saves
async fn watch_file(path: &Path, debounce: Duration) -> Result<()> {
    let live = LiveAssistant::spawn(WritingAssistant::shared(), debounce);
    let mut results = live.subscribe();
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let mut last_seen = None;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    println!("👀 Watching {} (Ctrl-C to stop)", path.display());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let current = modified(path);
                if current.is_some() && current != last_seen {
                    last_seen = current;
                    match tokio::fs::read_to_string(path).await {
                        Ok(text) => {
                            live.update(text);
                        }
                        Err(e) => tracing::warn!("cannot read {}: {}", path.display(), e),
                    }
                }
            }
            changed = results.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(latest) = results.borrow_and_update().clone() {
                    println!("\n──── revision {} ────", latest.revision);
                    print_analysis(&latest.analysis);
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    live.shutdown().await
}

fn print_analysis(analysis: &WritingAnalysis) {
    println!("📍 Position: {}", analysis.position);

    if analysis.warnings.is_empty() {
        println!("✅ No overused words");
    }
    for warning in &analysis.warnings {
        println!("⚠️  {}", warning.message);
        println!("   try: {}", warning.alternatives.join(", "));
    }

    println!("💡 Suggested phrases:");
    for suggestion in &analysis.suggestions {
        println!(
            "   • {} [{}] - {}",
            suggestion.phrase, suggestion.function, suggestion.meaning
        );
        println!("     {} e.g. \"{}\"", suggestion.usage_tip, suggestion.collocation);
    }
}

fn print_submission(submission: &WritingSubmission) {
    let feedback = &submission.feedback;
    println!("🎯 Overall band: {:.1} (saved as #{})", feedback.overall_score, submission.id);
    for criterion in &feedback.criteria {
        println!("   {}: {:.1} - {}", criterion.label, criterion.score, criterion.feedback);
    }
    if let Some(usage) = &feedback.academic_core_usage {
        println!(
            "📚 Academic phrases used: {} ({})",
            usage.count,
            usage.used_words.join(", ")
        );
        if !usage.suggested_words.is_empty() {
            println!("   Try next time: {}", usage.suggested_words.join(", "));
        }
    }
    for error in &feedback.specific_errors {
        println!("   ❌ {}", error);
    }
    if !feedback.sample_answer.is_empty() {
        println!("\n📝 Sample answer:\n{}", feedback.sample_answer);
    }
}

fn print_report(report: &WeeklyReport) {
    println!("📅 Week of {}", report.week_start_date);
    println!("🎯 Estimated band: {:.1}", report.current_band_estimate);
    println!("📈 {}", report.progress_insight);
    println!("📚 Vocabulary focus: {}", report.vocabulary_focus);
    for skill in &report.skill_breakdown {
        println!("   {} ({}): {}", skill.skill, skill.status, skill.feedback);
    }
    println!("\n🗓️  Next week: {}", report.study_strategy_for_next_week);
}
