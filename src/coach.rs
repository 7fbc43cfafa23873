use anyhow::Result;
use chrono::{Datelike, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::api::{extract_json, ApiClient, OpenRouterRequest};
use crate::assistant::{word_count, WritingAssistant};
use crate::config::Config;
use crate::database::{write_history_csv, DatabaseManager};
use crate::models::*;
use crate::tts::AzureTts;

/// Essays shorter than this are not sent for scoring.
pub const MIN_EVALUATION_WORDS: usize = 50;

pub const TASK_TYPE: &str = "Task 2";
pub const SPEAKING_TASK_TYPE: &str = "Speaking";

/// Most recent submissions included in a weekly report.
pub const REPORT_SUBMISSIONS: usize = 10;

#[derive(Debug, Default)]
pub struct BatchReport {
    pub submitted: Vec<WritingSubmission>,
    pub failed: Vec<(PathBuf, String)>,
}

pub struct WritingCoach {
    api_client: ApiClient,
    db_manager: DatabaseManager,
    assistant: Arc<WritingAssistant>,
    pub config: Config,
}

impl WritingCoach {
    pub async fn new(config: Config) -> Result<Self> {
        let api_client = ApiClient::new(config.clone())?;
        let db_manager = DatabaseManager::new(&config).await?;

        Ok(WritingCoach {
            api_client,
            db_manager,
            assistant: WritingAssistant::shared(),
            config,
        })
    }

    pub fn assistant(&self) -> Arc<WritingAssistant> {
        Arc::clone(&self.assistant)
    }

    pub fn database(&self) -> &DatabaseManager {
        &self.db_manager
    }

    // Local, offline feedback
    pub fn assist(&self, text: &str) -> WritingAnalysis {
        self.assistant.analyze(text)
    }

    // Ask the AI examiner for a band score
    pub async fn evaluate_essay(&self, prompt: &str, text: &str) -> Result<Feedback> {
        let words = word_count(text);
        if words < MIN_EVALUATION_WORDS {
            anyhow::bail!(
                "essay has {} words; write at least {} words before requesting evaluation",
                words,
                MIN_EVALUATION_WORDS
            );
        }

        info!(
            words,
            model = %self.config.models.evaluation_model,
            "requesting essay evaluation"
        );

        let request = OpenRouterRequest::user_prompt(
            &self.config.models.evaluation_model,
            evaluation_prompt(prompt, text),
            4000,
            0.2,
        );

        let api_response = self.api_client.make_request_with_retry(&request).await?;
        parse_feedback(api_response.first_content()?)
    }

    // Evaluate, then store the submission
    pub async fn submit_essay(
        &self,
        user_id: &str,
        prompt: &str,
        text: &str,
    ) -> Result<WritingSubmission> {
        let feedback = self.evaluate_essay(prompt, text).await?;

        self.db_manager
            .save_submission(NewSubmission {
                user_id: user_id.to_string(),
                task_type: TASK_TYPE.to_string(),
                content: text.to_string(),
                band_score: feedback.overall_score,
                feedback,
            })
            .await
    }

    // Score several essay files concurrently; one bad file does not stop the rest
    pub async fn submit_batch(
        &self,
        user_id: &str,
        prompt: &str,
        files: &[PathBuf],
    ) -> Result<BatchReport> {
        let concurrency = self.config.processing.concurrent_requests.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let total = files.len();

        let results = stream::iter(files.iter().cloned().enumerate())
            .map(|(i, path)| {
                let semaphore = semaphore.clone();
                async move {
                    let outcome: Result<WritingSubmission> = async {
                        let _permit = semaphore
                            .acquire()
                            .await
                            .map_err(|e| anyhow::anyhow!("batch semaphore closed: {}", e))?;

                        info!("scoring essay {}/{}: {}", i + 1, total, path.display());
                        let text = tokio::fs::read_to_string(&path)
                            .await
                            .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
                        self.submit_essay(user_id, prompt, &text).await
                    }
                    .await;
                    (path, outcome)
                }
            })
            .buffer_unordered(concurrency)
            .collect::<Vec<(PathBuf, Result<WritingSubmission>)>>()
            .await;

        let mut report = BatchReport::default();
        for (path, outcome) in results {
            match outcome {
                Ok(submission) => report.submitted.push(submission),
                Err(e) => {
                    warn!("failed to score {}: {}", path.display(), e);
                    report.failed.push((path, e.to_string()));
                }
            }
        }

        info!(
            submitted = report.submitted.len(),
            failed = report.failed.len(),
            "batch finished"
        );
        Ok(report)
    }

    // Score a speaking transcript; recording and recognition happen elsewhere
    pub async fn evaluate_speaking(&self, topic: &str, transcript: &str) -> Result<Feedback> {
        if transcript.trim().is_empty() {
            anyhow::bail!("speaking transcript is empty");
        }

        info!(
            words = word_count(transcript),
            model = %self.config.models.evaluation_model,
            "requesting speaking evaluation"
        );

        let request = OpenRouterRequest::user_prompt(
            &self.config.models.evaluation_model,
            speaking_prompt(topic, transcript),
            4000,
            0.2,
        );

        let api_response = self.api_client.make_request_with_retry(&request).await?;
        parse_feedback(api_response.first_content()?)
    }

    pub async fn submit_speaking(
        &self,
        user_id: &str,
        topic: &str,
        transcript: &str,
    ) -> Result<WritingSubmission> {
        let feedback = self.evaluate_speaking(topic, transcript).await?;

        self.db_manager
            .save_submission(NewSubmission {
                user_id: user_id.to_string(),
                task_type: SPEAKING_TASK_TYPE.to_string(),
                content: transcript.to_string(),
                band_score: feedback.overall_score,
                feedback,
            })
            .await
    }

    // Summarise recent submissions and vocabulary progress into a study plan
    pub async fn weekly_report(&self, user_id: &str) -> Result<WeeklyReport> {
        let submissions = self.db_manager.get_submissions(user_id).await?;
        if submissions.is_empty() {
            anyhow::bail!("no stored submissions for user {}; submit an essay first", user_id);
        }
        let recent = &submissions[..submissions.len().min(REPORT_SUBMISSIONS)];
        let (stats, at_risk) = self.vocab_report(user_id).await?;
        let monday = week_start(Utc::now().date_naive());

        info!(user = user_id, submissions = recent.len(), "requesting weekly report");

        let request = OpenRouterRequest::user_prompt(
            &self.config.models.evaluation_model,
            weekly_report_prompt(monday, recent, &stats, &at_risk),
            2000,
            0.4,
        );

        let api_response = self.api_client.make_request_with_retry(&request).await?;
        let mut report = parse_weekly_report(api_response.first_content()?)?;
        if report.week_start_date.trim().is_empty() {
            report.week_start_date = monday.to_string();
        }
        Ok(report)
    }

    pub async fn history(&self, user_id: &str) -> Result<Vec<WritingSubmission>> {
        self.db_manager.get_submissions(user_id).await
    }

    pub async fn export_history(&self, user_id: &str, output_file: &Path) -> Result<usize> {
        let submissions = self.db_manager.get_submissions(user_id).await?;
        write_history_csv(&submissions, output_file)?;
        Ok(submissions.len())
    }

    pub async fn record_review(
        &self,
        user_id: &str,
        word: &str,
        increment: i64,
    ) -> Result<VocabProgress> {
        let word = word.trim().to_lowercase();
        if word.is_empty() {
            anyhow::bail!("word must not be empty");
        }
        self.db_manager.update_vocab_familiarity(user_id, &word, increment).await
    }

    pub async fn vocab_report(&self, user_id: &str) -> Result<(VocabStats, Vec<VocabProgress>)> {
        let stats = self.db_manager.get_vocab_stats(user_id).await?;
        let at_risk = self.db_manager.get_at_risk_vocab(user_id, 3).await?;
        Ok((stats, at_risk))
    }

    // Read a stored model answer aloud into a WAV file
    pub async fn speak_sample_answer(
        &self,
        submission_id: i64,
        output_file: Option<&Path>,
    ) -> Result<PathBuf> {
        let submission = self
            .db_manager
            .get_submission(submission_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("submission {} does not exist", submission_id))?;

        if submission.feedback.sample_answer.trim().is_empty() {
            anyhow::bail!("submission {} has no sample answer", submission_id);
        }

        let output = match output_file {
            Some(path) => path.to_path_buf(),
            None => Path::new(&self.config.output.audio_dir)
                .join(format!("sample_answer_{}.wav", submission_id)),
        };

        let tts = AzureTts::from_config(&self.config.tts)?;
        tts.synthesize_to_file(&submission.feedback.sample_answer, &output).await?;
        Ok(output)
    }
}

fn evaluation_prompt(prompt: &str, text: &str) -> String {
    format!(r#"
You are an IELTS examiner. Evaluate this IELTS Writing Task 2 essay.

Score it against the four official criteria (Task Response, Coherence and Cohesion,
Lexical Resource, Grammatical Range and Accuracy) using band scores from 0 to 9 in
steps of 0.5. Also report which academic phrases the writer used and suggest others.

Return only JSON in this format:
{{
  "overallScore": 6.5,
  "criteria": [
    {{ "label": "Task Response", "score": 6.5, "feedback": "..." }}
  ],
  "academic_core_usage": {{
    "count": 0,
    "used_words": [],
    "suggested_words": []
  }},
  "specificErrors": ["..."],
  "sampleAnswer": "A band 9 answer to the same prompt"
}}

Prompt: "{}"

Essay:
"{}"
"#, prompt, text)
}

fn speaking_prompt(topic: &str, transcript: &str) -> String {
    format!(r#"
You are an IELTS examiner. Evaluate this IELTS Speaking transcript.

Score it against the four official criteria (Fluency and Coherence, Lexical Resource,
Grammatical Range and Accuracy, Pronunciation) using band scores from 0 to 9 in steps
of 0.5. Judge pronunciation only from what the transcript shows.

Return only JSON in this format:
{{
  "overallScore": 6.0,
  "criteria": [
    {{ "label": "Fluency and Coherence", "score": 6.0, "feedback": "..." }}
  ],
  "specificErrors": ["..."],
  "sampleAnswer": "A band 9 answer on the same topic"
}}

Topic: "{}"

Transcript:
"{}"
"#, topic, transcript)
}

fn weekly_report_prompt(
    week_start: NaiveDate,
    submissions: &[WritingSubmission],
    stats: &VocabStats,
    at_risk: &[VocabProgress],
) -> String {
    let history: Vec<String> = submissions
        .iter()
        .map(|s| format!("- {} {} band {:.1}", s.created_at, s.task_type, s.band_score))
        .collect();
    let weak_words: Vec<&str> = at_risk.iter().map(|v| v.word.as_str()).collect();

    format!(r#"
You are an IELTS tutor. Write a strategic weekly report for a student for the week
starting {}.

Recent scored submissions (newest first):
{}

Vocabulary: {} words tracked, {} mastered, {} still learning.
Weakest words: {}

Return only JSON in this format:
{{
  "weekStartDate": "{}",
  "currentBandEstimate": 6.0,
  "progressInsight": "...",
  "vocabularyFocus": "...",
  "studyStrategyForNextWeek": "...",
  "skillBreakdown": [
    {{ "skill": "Writing", "status": "improving", "feedback": "..." }}
  ]
}}
"#,
        week_start,
        history.join("\n"),
        stats.total,
        stats.mastered,
        stats.learning,
        if weak_words.is_empty() { "none".to_string() } else { weak_words.join(", ") },
        week_start,
    )
}

// Monday of the week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(date.weekday().num_days_from_monday() as i64)
}

pub fn parse_feedback(content: &str) -> Result<Feedback> {
    let json_content = extract_json(content);
    let feedback: Feedback = serde_json::from_str(json_content)
        .map_err(|e| {
            anyhow::anyhow!("failed to parse evaluation: {}\nreply: {}", e, json_content)
        })?;

    if !(0.0..=9.0).contains(&feedback.overall_score) {
        anyhow::bail!("band score {} is outside 0-9", feedback.overall_score);
    }
    Ok(feedback)
}

pub fn parse_weekly_report(content: &str) -> Result<WeeklyReport> {
    let json_content = extract_json(content);
    let report: WeeklyReport = serde_json::from_str(json_content)
        .map_err(|e| {
            anyhow::anyhow!("failed to parse weekly report: {}\nreply: {}", e, json_content)
        })?;

    if !(0.0..=9.0).contains(&report.current_band_estimate) {
        anyhow::bail!("band estimate {} is outside 0-9", report.current_band_estimate);
    }
    Ok(report)
}
