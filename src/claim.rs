//! Turns a (question, answer-span) pair into a declarative hypothesis
//! sentence for entailment scoring.

enum QuestionPattern {
    Prefix(&'static str),
    Contains(&'static str),
}

/// Ordered rule table; the first matching pattern wins. Several prefixes can
/// co-match ("who wrote" also starts with "who "), so the order is load-bearing.
const RULES: &[(QuestionPattern, fn(&str) -> String)] = &[
    (QuestionPattern::Prefix("who wrote"), |a| format!("{a} wrote the work.")),
    (QuestionPattern::Prefix("who "), |a| {
        format!("{a} is the person in question.")
    }),
    (QuestionPattern::Contains("what year"), |a| format!("It happened in {a}.")),
    (QuestionPattern::Prefix("when "), |a| format!("It happened in {a}.")),
    (QuestionPattern::Prefix("where "), |a| format!("It happened in {a}.")),
    (QuestionPattern::Prefix("what is"), |a| format!("It is {a}.")),
    (QuestionPattern::Prefix("what was"), |a| format!("It is {a}.")),
    (QuestionPattern::Prefix("which "), |a| format!("It is {a}.")),
];

/// Build an entailment hypothesis from a question and a span answer.
pub fn claimify(question: &str, answer: &str) -> String {
    let a = answer.trim();
    if a.is_empty() {
        return "The answer is unknown.".to_string();
    }
    let q = question.trim().to_lowercase();
    for (pattern, template) in RULES {
        let hit = match pattern {
            QuestionPattern::Prefix(p) => q.starts_with(p),
            QuestionPattern::Contains(p) => q.contains(p),
        };
        if hit {
            return template(a);
        }
    }
    format!("Answer: {a}")
}
