use serde::{Deserialize, Serialize};
use std::fmt;

// Rhetorical role of an academic phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcademicFunction {
    #[serde(rename = "Argument & Opinion")]
    ArgumentOpinion,
    #[serde(rename = "Cause – Effect")]
    CauseEffect,
    #[serde(rename = "Comparison & Contrast")]
    ComparisonContrast,
    #[serde(rename = "Solution & Recommendation")]
    SolutionRecommendation,
    #[serde(rename = "Evaluation & Evidence")]
    EvaluationEvidence,
}

impl AcademicFunction {
    pub fn label(&self) -> &'static str {
        match self {
            AcademicFunction::ArgumentOpinion => "Argument & Opinion",
            AcademicFunction::CauseEffect => "Cause – Effect",
            AcademicFunction::ComparisonContrast => "Comparison & Contrast",
            AcademicFunction::SolutionRecommendation => "Solution & Recommendation",
            AcademicFunction::EvaluationEvidence => "Evaluation & Evidence",
        }
    }
}

impl fmt::Display for AcademicFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// Section of the essay the writer is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EssayPosition {
    Introduction,
    #[serde(rename = "Body Paragraph")]
    BodyParagraph,
    Conclusion,
}

impl EssayPosition {
    pub fn label(&self) -> &'static str {
        match self {
            EssayPosition::Introduction => "Introduction",
            EssayPosition::BodyParagraph => "Body Paragraph",
            EssayPosition::Conclusion => "Conclusion",
        }
    }
}

impl fmt::Display for EssayPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// Entry of the academic phrase table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub phrase: String,
    pub function: AcademicFunction,
    pub meaning: String, // Vietnamese gloss
    pub usage_tip: String,
    pub collocation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OveruseRule {
    pub word: String,
    pub threshold: usize,
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritingWarning {
    pub kind: String,
    pub word: String,
    pub count: usize,
    pub message: String,
    pub alternatives: Vec<String>,
}

// Result of one local analysis pass, recomputed on every call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritingAnalysis {
    pub position: EssayPosition,
    pub suggestions: Vec<VocabularyEntry>,
    pub warnings: Vec<WritingWarning>,
}

// Band score report returned by the AI examiner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(rename = "overallScore")]
    pub overall_score: f64,
    #[serde(default)]
    pub academic_core_usage: Option<AcademicCoreUsage>,
    #[serde(default)]
    pub criteria: Vec<Criterion>,
    #[serde(rename = "specificErrors", default)]
    pub specific_errors: Vec<String>,
    #[serde(rename = "sampleAnswer", default)]
    pub sample_answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub label: String,
    pub score: f64,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicCoreUsage {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub used_words: Vec<String>,
    #[serde(default)]
    pub suggested_words: Vec<String>,
}

// Stored writing submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritingSubmission {
    pub id: i64,
    pub user_id: String,
    pub task_type: String,
    pub content: String,
    pub band_score: f64,
    pub feedback: Feedback,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub user_id: String,
    pub task_type: String,
    pub content: String,
    pub band_score: f64,
    pub feedback: Feedback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct VocabProgress {
    pub user_id: String,
    pub word: String,
    pub familiarity: i64,
    pub last_review: String,
    pub topic: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct VocabStats {
    pub mastered: usize,
    pub learning: usize,
    pub total: usize,
}

// Weekly progress summary written by the AI examiner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    #[serde(default)]
    pub week_start_date: String,
    pub current_band_estimate: f64,
    #[serde(default)]
    pub progress_insight: String,
    #[serde(default)]
    pub vocabulary_focus: String,
    #[serde(default)]
    pub study_strategy_for_next_week: String,
    #[serde(default)]
    pub skill_breakdown: Vec<SkillStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillStatus {
    pub skill: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub feedback: String,
}
