use crate::model::QuestionStyle;

const DIRECT_MAX_WORDS: usize = 60;
const SCENARIO_MIN_WORDS: usize = 20;
const SCENARIO_MIN_SENTENCES: usize = 2;
const CASE_STUDY_MIN_WORDS: usize = 100;
const CASE_STUDY_MIN_SENTENCES: usize = 4;

/// Words that signal a named situation; a direct question must not use them.
const SCENARIO_VOCABULARY: &[&str] = &[
    "company",
    "organization",
    "organisation",
    "corporation",
    "enterprise",
    "startup",
    "client",
    "scenario",
    "firm",
];

#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[must_use]
pub fn sentence_count(text: &str) -> usize {
    text.split(['.', '?', '!'])
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .count()
}

fn mentions_scenario(text: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_ascii_lowercase)
        .any(|word| SCENARIO_VOCABULARY.contains(&word.as_str()))
}

/// Check that generated question text has the shape of `style`.
///
/// Used to police generator output; selection never depends on it.
#[must_use]
pub fn validate_style(text: &str, style: QuestionStyle) -> bool {
    let words = word_count(text);
    match style {
        QuestionStyle::Direct => words > 0 && words <= DIRECT_MAX_WORDS && !mentions_scenario(text),
        QuestionStyle::Scenario => {
            words >= SCENARIO_MIN_WORDS && sentence_count(text) >= SCENARIO_MIN_SENTENCES
        }
        QuestionStyle::CaseStudy => {
            words >= CASE_STUDY_MIN_WORDS && sentence_count(text) >= CASE_STUDY_MIN_SENTENCES
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_is_short_and_plain() {
        assert!(validate_style("Which port does HTTPS use by default?", QuestionStyle::Direct));
        assert!(!validate_style(
            "A company wants to expose HTTPS. Which port?",
            QuestionStyle::Direct
        ));
        assert!(!validate_style("", QuestionStyle::Direct));
        let long = "word ".repeat(61);
        assert!(!validate_style(&long, QuestionStyle::Direct));
    }

    #[test]
    fn scenario_needs_setup_and_question() {
        let text = "A retail company runs its storefront on a single server in one region. \
                    Traffic doubles every holiday season. Which change improves availability the most?";
        assert!(validate_style(text, QuestionStyle::Scenario));
        assert!(!validate_style("Which change improves availability?", QuestionStyle::Scenario));
    }

    #[test]
    fn case_study_needs_length_and_sentences() {
        let sentence = "The organization operates twelve regional warehouses with separate inventory systems and nightly batch jobs. ";
        let text = sentence.repeat(8);
        assert!(word_count(&text) >= 100);
        assert!(validate_style(&text, QuestionStyle::CaseStudy));
        assert!(!validate_style(sentence, QuestionStyle::CaseStudy));
    }

    #[test]
    fn sentence_count_ignores_trailing_punctuation() {
        assert_eq!(sentence_count("One. Two? Three!"), 3);
        assert_eq!(sentence_count("v1.2 is out..."), 2);
        assert_eq!(sentence_count("..."), 0);
    }
}
