//! Local writing assistant.
//!
//! Infers which section of an essay the writer is working on, flags simple
//! words used too often and proposes academic phrases that fit the section
//! and have not been used yet. Everything here is pure: no network, no
//! storage, and every `&str` input produces a result.

use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;
use std::sync::{Arc, LazyLock};

use crate::models::{
    AcademicFunction, EssayPosition, OveruseRule, VocabularyEntry, WritingAnalysis, WritingWarning,
};

/// Upper bound on phrases proposed per analysis.
pub const MAX_SUGGESTIONS: usize = 5;

/// Static reference data the assistant works from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceTables {
    pub vocabulary: Vec<VocabularyEntry>,
    pub overuse_rules: Vec<OveruseRule>,
}

impl ReferenceTables {
    /// The academic core phrase set and overuse watchlist shipped with the app.
    pub fn builtin() -> Self {
        use AcademicFunction::*;

        #[rustfmt::skip]
        let vocabulary = vec![
            entry("it is widely believed that", ArgumentOpinion, "nhiều người tin rằng", "Use in Introduction to state a general view.", "It is widely believed that education is key."),
            entry("advocates of this view", ArgumentOpinion, "người ủng hộ quan điểm này", "Use in Body to introduce a side.", "Advocates of this view argue that..."),
            entry("opponents argue that", ArgumentOpinion, "người phản đối cho rằng", "Use to introduce counter-arguments.", "However, opponents argue that..."),
            entry("from my perspective", ArgumentOpinion, "theo quan điểm của tôi", "Use to give your own opinion clearly.", "From my perspective, this is valid."),
            entry("contribute to", CauseEffect, "góp phần vào", "Link a cause to a problem/benefit.", "contribute to climate change"),
            entry("stem from", CauseEffect, "bắt nguồn từ", "Explain the root cause.", "stem from poor management"),
            entry("have a detrimental impact on", CauseEffect, "gây hại cho", "Describe negative results.", "have a detrimental impact on health"),
            entry("result in", CauseEffect, "dẫn đến", "Show a direct consequence.", "result in serious consequences"),
            entry("in contrast", ComparisonContrast, "ngược lại", "Start a sentence comparing two things.", "In contrast, rural areas are..."),
            entry("whereas", ComparisonContrast, "trong khi", "Connect two contrasting clauses.", "He is rich, whereas she is poor."),
            entry("outweigh", ComparisonContrast, "lớn hơn/quan trọng hơn", "Compare advantages vs disadvantages.", "The benefits outweigh the drawbacks."),
            entry("implement strict policies", SolutionRecommendation, "áp dụng chính sách nghiêm ngặt", "Suggest government action.", "Governments should implement strict policies."),
            entry("raise public awareness", SolutionRecommendation, "nâng cao nhận thức", "Suggest educational solution.", "Campaigns to raise public awareness."),
            entry("mitigate", SolutionRecommendation, "giảm nhẹ", "Reduce a problem's impact.", "mitigate the effects of..."),
            entry("take steps to", SolutionRecommendation, "thực hiện các bước để", "General call to action.", "take steps to address the issue"),
            entry("play a pivotal role", EvaluationEvidence, "đóng vai trò then chốt", "Emphasize importance.", "play a pivotal role in development"),
            entry("be of paramount importance", EvaluationEvidence, "quan trọng tối cao", "Stronger than 'important'.", "It is of paramount importance to..."),
        ];

        let overuse_rules = vec![
            rule("important", 2, &["crucial", "vital", "pivotal", "essential", "significant"]),
            rule("bad", 1, &["detrimental", "adverse", "harmful", "negative"]),
            rule("good", 2, &["beneficial", "advantageous", "positive", "favorable"]),
            rule("think", 2, &["believe", "argue", "assert", "maintain", "claim"]),
            rule("problem", 2, &["issue", "challenge", "obstacle", "dilemma"]),
        ];

        ReferenceTables { vocabulary, overuse_rules }
    }
}

fn entry(
    phrase: &str,
    function: AcademicFunction,
    meaning: &str,
    usage_tip: &str,
    collocation: &str,
) -> VocabularyEntry {
    VocabularyEntry {
        phrase: phrase.to_string(),
        function,
        meaning: meaning.to_string(),
        usage_tip: usage_tip.to_string(),
        collocation: collocation.to_string(),
    }
}

fn rule(word: &str, threshold: usize, alternatives: &[&str]) -> OveruseRule {
    OveruseRule {
        word: word.to_string(),
        threshold,
        alternatives: alternatives.iter().map(|s| s.to_string()).collect(),
    }
}

struct OveruseMatcher {
    rule: OveruseRule,
    pattern: Regex,
}

/// Analyzer bound to one set of reference tables.
pub struct WritingAssistant {
    vocabulary: Vec<VocabularyEntry>,
    matchers: Vec<OveruseMatcher>,
}

static BUILTIN: LazyLock<Arc<WritingAssistant>> = LazyLock::new(|| {
    Arc::new(
        WritingAssistant::new(ReferenceTables::builtin())
            .expect("built-in overuse watchlist must compile"),
    )
});

impl WritingAssistant {
    /// Compiles the whole-word matchers for every overuse rule.
    pub fn new(tables: ReferenceTables) -> anyhow::Result<Self> {
        let mut matchers = Vec::with_capacity(tables.overuse_rules.len());
        for rule in tables.overuse_rules {
            if rule.threshold == 0 {
                anyhow::bail!("overuse rule '{}' needs a threshold of at least 1", rule.word);
            }
            let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&rule.word)))
                .map_err(|e| anyhow::anyhow!("invalid overuse word '{}': {}", rule.word, e))?;
            matchers.push(OveruseMatcher { rule, pattern });
        }

        Ok(WritingAssistant {
            vocabulary: tables.vocabulary,
            matchers,
        })
    }

    /// Shared analyzer over the built-in tables.
    pub fn builtin() -> &'static WritingAssistant {
        BUILTIN.as_ref()
    }

    pub fn shared() -> Arc<WritingAssistant> {
        Arc::clone(&BUILTIN)
    }

    pub fn vocabulary(&self) -> &[VocabularyEntry] {
        &self.vocabulary
    }

    pub fn analyze(&self, text: &str) -> WritingAnalysis {
        self.analyze_with_rng(text, &mut rand::rng())
    }

    pub fn analyze_with_rng<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> WritingAnalysis {
        let position = infer_position(text);
        let warnings = self.detect_overuse(text);
        let suggestions = self.suggest(text, position, rng);

        WritingAnalysis {
            position,
            suggestions,
            warnings,
        }
    }

    /// One warning per rule whose whole-word count reaches its threshold,
    /// in rule table order.
    pub fn detect_overuse(&self, text: &str) -> Vec<WritingWarning> {
        self.matchers
            .iter()
            .filter_map(|m| {
                let count = m.pattern.find_iter(text).count();
                (count >= m.rule.threshold).then(|| WritingWarning {
                    kind: "overuse".to_string(),
                    word: m.rule.word.clone(),
                    count,
                    message: format!(
                        "You used '{}' {} times. Consider upgrading.",
                        m.rule.word, count
                    ),
                    alternatives: m.rule.alternatives.clone(),
                })
            })
            .collect()
    }

    /// Relevant phrases not already present in `text`, shuffled and capped.
    pub fn suggest<R: Rng + ?Sized>(
        &self,
        text: &str,
        position: EssayPosition,
        rng: &mut R,
    ) -> Vec<VocabularyEntry> {
        let relevant = relevant_functions(position);
        let normalized = text.to_lowercase();

        let mut candidates: Vec<VocabularyEntry> = self
            .vocabulary
            .iter()
            .filter(|item| relevant.contains(&item.function))
            .filter(|item| !normalized.contains(&item.phrase.to_lowercase()))
            .cloned()
            .collect();

        candidates.shuffle(rng);
        candidates.truncate(MAX_SUGGESTIONS);
        candidates
    }
}

/// Analyzes `text` with the built-in tables.
pub fn analyze(text: &str) -> WritingAnalysis {
    WritingAssistant::builtin().analyze(text)
}

/// Coarse position from the number of non-blank paragraphs.
pub fn infer_position(text: &str) -> EssayPosition {
    let paragraphs = text.split('\n').filter(|p| !p.trim().is_empty()).count();

    match paragraphs {
        0 | 1 => EssayPosition::Introduction,
        2 | 3 => EssayPosition::BodyParagraph,
        _ => EssayPosition::Conclusion,
    }
}

pub fn relevant_functions(position: EssayPosition) -> &'static [AcademicFunction] {
    use AcademicFunction::*;

    match position {
        EssayPosition::Introduction => &[ArgumentOpinion],
        EssayPosition::BodyParagraph => &[CauseEffect, ComparisonContrast, EvaluationEvidence],
        EssayPosition::Conclusion => &[SolutionRecommendation, EvaluationEvidence],
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn paragraphs(n: usize) -> String {
        (0..n)
            .map(|i| format!("Paragraph number {} talks about society.", i + 1))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_position_buckets() {
        assert_eq!(infer_position(""), EssayPosition::Introduction);
        assert_eq!(infer_position("   \n\t\n"), EssayPosition::Introduction);
        assert_eq!(infer_position(&paragraphs(1)), EssayPosition::Introduction);
        assert_eq!(infer_position(&paragraphs(2)), EssayPosition::BodyParagraph);
        assert_eq!(infer_position(&paragraphs(3)), EssayPosition::BodyParagraph);
        assert_eq!(infer_position(&paragraphs(4)), EssayPosition::Conclusion);
        assert_eq!(infer_position(&paragraphs(9)), EssayPosition::Conclusion);
    }

    #[test]
    fn test_blank_lines_are_not_paragraphs() {
        let text = "First idea.\n\n   \n\nSecond idea.\r\n\r\n";
        assert_eq!(infer_position(text), EssayPosition::BodyParagraph);
    }

    #[test]
    fn test_overuse_counts_whole_words_only() {
        let assistant = WritingAssistant::builtin();
        // "importantly" and "unimportant" must not count
        let text = "Importantly, this is unimportant. It is important. IMPORTANT things.";
        let warnings = assistant.detect_overuse(text);
        let important = warnings.iter().find(|w| w.word == "important").unwrap();
        assert_eq!(important.count, 2);
        assert_eq!(important.message, "You used 'important' 2 times. Consider upgrading.");
    }

    #[test]
    fn test_overuse_threshold_boundary() {
        let assistant = WritingAssistant::builtin();
        assert!(assistant.detect_overuse("The problem is clear.").is_empty());

        let warnings = assistant.detect_overuse("A bad idea.");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].word, "bad");
        assert_eq!(warnings[0].kind, "overuse");
        assert_eq!(
            warnings[0].alternatives,
            vec!["detrimental", "adverse", "harmful", "negative"]
        );
    }

    #[test]
    fn test_warnings_follow_rule_order() {
        let assistant = WritingAssistant::builtin();
        let text = "problem problem think think good good bad important important";
        let words: Vec<String> = assistant
            .detect_overuse(text)
            .into_iter()
            .map(|w| w.word)
            .collect();
        assert_eq!(words, vec!["important", "bad", "good", "think", "problem"]);
    }

    #[test]
    fn test_suggestions_skip_used_phrases() {
        let assistant = WritingAssistant::builtin();
        let mut rng = StdRng::seed_from_u64(7);
        let text = "From my perspective, OPPONENTS ARGUE THAT cities grow.";
        let suggestions = assistant.suggest(text, EssayPosition::Introduction, &mut rng);

        let phrases: Vec<&str> = suggestions.iter().map(|s| s.phrase.as_str()).collect();
        assert_eq!(phrases.len(), 2);
        assert!(phrases.contains(&"it is widely believed that"));
        assert!(phrases.contains(&"advocates of this view"));
    }

    #[test]
    fn test_suggestions_capped_at_five() {
        let assistant = WritingAssistant::builtin();
        let mut rng = StdRng::seed_from_u64(42);
        // Body paragraph pool has nine entries
        let suggestions = assistant.suggest("", EssayPosition::BodyParagraph, &mut rng);
        assert_eq!(suggestions.len(), MAX_SUGGESTIONS);
        for s in &suggestions {
            assert!(relevant_functions(EssayPosition::BodyParagraph).contains(&s.function));
        }
    }

    #[test]
    fn test_seeded_selection_is_reproducible() {
        let assistant = WritingAssistant::builtin();
        let text = paragraphs(3);
        let a = assistant.analyze_with_rng(&text, &mut StdRng::seed_from_u64(1));
        let b = assistant.analyze_with_rng(&text, &mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
    }

    #[test]
    fn test_custom_tables() {
        let tables = ReferenceTables {
            vocabulary: vec![entry("hence", AcademicFunction::CauseEffect, "", "", "")],
            overuse_rules: vec![rule("very", 3, &["extremely"])],
        };
        let assistant = WritingAssistant::new(tables).unwrap();
        let result = assistant.analyze("Very very very good.\nAnother line.");
        assert_eq!(result.position, EssayPosition::BodyParagraph);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].count, 3);
        assert_eq!(result.suggestions.len(), 1);
        assert_eq!(result.suggestions[0].phrase, "hence");
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let tables = ReferenceTables {
            vocabulary: Vec::new(),
            overuse_rules: vec![rule("very", 0, &[])],
        };
        assert!(WritingAssistant::new(tables).is_err());
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("  \n "), 0);
        assert_eq!(word_count("one two\nthree\tfour "), 4);
    }
}
