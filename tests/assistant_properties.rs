use ielts_coach::assistant::{infer_position, relevant_functions, MAX_SUGGESTIONS};
use ielts_coach::{analyze, AcademicFunction, EssayPosition, WritingAssistant};
use rand::SeedableRng;
use rand::rngs::StdRng;

const SAMPLES: &[&str] = &[
    "",
    "   ",
    "Education is important. Education is important.",
    "It is widely believed that technology is good.\nHowever, it can be bad.",
    "Intro.\nBody one.\nBody two.",
    "Intro.\n\nBody with a problem.\n\nAnother problem.\n\nIn conclusion, I think we must mitigate this. I think so.",
    "First.\nSecond.\nThird.\nFourth.\nFifth, in contrast, whereas outweigh.",
    "GOOD good Good goods goodness. Think thinking rethink THINK.",
];

#[test]
fn suggestions_are_bounded_relevant_and_unused() {
    for text in SAMPLES {
        for seed in 0..20 {
            let result = WritingAssistant::builtin()
                .analyze_with_rng(text, &mut StdRng::seed_from_u64(seed));
            assert!(result.suggestions.len() <= MAX_SUGGESTIONS);

            let relevant = relevant_functions(result.position);
            let lowered = text.to_lowercase();
            for suggestion in &result.suggestions {
                assert!(relevant.contains(&suggestion.function), "{:?} in {:?}", suggestion, text);
                assert!(!lowered.contains(&suggestion.phrase.to_lowercase()));
            }
        }
    }
}

#[test]
fn position_and_warnings_are_deterministic() {
    for text in SAMPLES {
        let a = analyze(text);
        let b = analyze(text);
        assert_eq!(a.position, b.position);
        assert_eq!(a.warnings, b.warnings);
    }
}

#[test]
fn warnings_match_whole_word_counts() {
    let result = analyze("GOOD good Good goods goodness. Think thinking rethink THINK.");
    let words: Vec<(&str, usize)> = result
        .warnings
        .iter()
        .map(|w| (w.word.as_str(), w.count))
        .collect();
    assert_eq!(words, vec![("good", 3), ("think", 2)]);
}

#[test]
fn empty_input_defaults_to_introduction() {
    let result = analyze("");
    assert_eq!(result.position, EssayPosition::Introduction);
    assert!(result.warnings.is_empty());
    // the Argument & Opinion pool has four entries, all unused
    assert_eq!(result.suggestions.len(), 4);
    assert!(result
        .suggestions
        .iter()
        .all(|s| s.function == AcademicFunction::ArgumentOpinion));
}

#[test]
fn repeated_important_in_one_paragraph() {
    let result = analyze("Education is important. Education is important. ");
    assert_eq!(result.position, EssayPosition::Introduction);
    assert_eq!(result.warnings.len(), 1);

    let warning = &result.warnings[0];
    assert_eq!(warning.word, "important");
    assert_eq!(warning.count, 2);
    assert_eq!(
        warning.alternatives,
        vec!["crucial", "vital", "pivotal", "essential", "significant"]
    );
}

#[test]
fn conclusion_never_suggests_comparison_phrases() {
    let essay = "Many people move to cities.\n\
                 Cities offer jobs.\n\
                 In contrast, villages are calm.\n\
                 Both have merits.\n\
                 Overall, governments should act.";
    assert_eq!(infer_position(essay), EssayPosition::Conclusion);

    for seed in 0..20 {
        let result = WritingAssistant::builtin()
            .analyze_with_rng(essay, &mut StdRng::seed_from_u64(seed));
        assert!(result.suggestions.iter().all(|s| s.phrase != "in contrast"));
        assert!(result
            .suggestions
            .iter()
            .all(|s| s.function != AcademicFunction::ComparisonContrast));
        // Conclusion pool: four solution phrases plus two evaluation phrases
        assert_eq!(result.suggestions.len(), MAX_SUGGESTIONS);
    }
}

#[test]
fn fewer_eligible_than_cap_returns_all() {
    let text = "It is widely believed that X. Advocates of this view say Y. Opponents argue that Z.";
    let result = analyze(text);
    assert_eq!(result.suggestions.len(), 1);
    assert_eq!(result.suggestions[0].phrase, "from my perspective");
}

#[test]
fn analysis_serializes_with_display_labels() {
    let result = analyze("Intro.\nBody.");
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["position"], "Body Paragraph");
    let function = json["suggestions"][0]["function"].as_str().unwrap();
    let body_labels = ["Cause – Effect", "Comparison & Contrast", "Evaluation & Evidence"];
    assert!(body_labels.contains(&function));
}
