//! Topic classifier: keyword rules that pick a canned tutoring response
//!
//! Each category owns an ordered rule list. A topic is lower-cased and the
//! first rule with any keyword occurring as a substring wins; if nothing
//! matches, the category fallback is returned.

use std::fmt;
use std::str::FromStr;

/// Subject area a topic is classified under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicCategory {
    Math,
    Writing,
    Study,
}

/// A single keyword rule: any keyword hit selects `response`
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub keywords: &'static [&'static str],
    pub response: &'static str,
}

impl Rule {
    fn matches(&self, topic_lower: &str) -> bool {
        self.keywords.iter().any(|kw| topic_lower.contains(kw))
    }
}

const MATH_RULES: &[Rule] = &[
    Rule {
        keywords: &["derivative", "differentiation", "calculus"],
        response: "Derivatives measure the rate of change. \
            Basic rules: d/dx(x^n) = n*x^(n-1), d/dx(e^x) = e^x, d/dx(sin x) = cos x. \
            Use the chain rule for composite functions: d/dx[f(g(x))] = f'(g(x)) * g'(x).",
    },
    Rule {
        keywords: &["integral", "integration"],
        response: "Integration is the reverse of differentiation. \
            Basic rules: ∫x^n dx = x^(n+1)/(n+1) + C, ∫e^x dx = e^x + C, ∫sin x dx = -cos x + C. \
            Remember to add the constant of integration C.",
    },
    Rule {
        keywords: &["algebra", "equation", "solve"],
        response: "To solve equations: 1) Isolate the variable on one side. \
            2) Use inverse operations (add/subtract, multiply/divide). \
            3) Check your answer by substituting back into the original equation.",
    },
    Rule {
        keywords: &["geometry", "area", "volume"],
        response: "Common formulas: Circle area = πr², Triangle area = ½bh, \
            Rectangle area = lw, Sphere volume = 4/3πr³, Cylinder volume = πr²h.",
    },
];

const MATH_FALLBACK: &str = "I can help with calculus, algebra, geometry, and more. \
    What specific concept do you need help with?";

const WRITING_RULES: &[Rule] = &[
    Rule {
        keywords: &["essay", "paper", "composition"],
        response: "Essay structure: 1) Introduction with thesis statement, \
            2) Body paragraphs with topic sentences and supporting evidence, \
            3) Conclusion that restates thesis and summarizes main points. \
            Use transitions between paragraphs for flow.",
    },
    Rule {
        keywords: &["thesis", "argument"],
        response: "A strong thesis statement should be: 1) Specific and focused, \
            2) Debatable (not a fact), 3) Supported by evidence, \
            4) Clear about your position. \
            Example: 'Social media negatively impacts teen mental health by promoting comparison and reducing face-to-face interaction.'",
    },
    Rule {
        keywords: &["citation", "reference", "source"],
        response: "Citation tips: 1) Always cite direct quotes and paraphrased ideas, \
            2) Use consistent citation style (APA, MLA, Chicago), \
            3) Include both in-text citations and a reference list, \
            4) Use reliable sources (academic journals, books, reputable websites).",
    },
    Rule {
        keywords: &["grammar", "punctuation"],
        response: "Common grammar tips: 1) Subject-verb agreement, \
            2) Use commas in lists and after introductory phrases, \
            3) Avoid run-on sentences and fragments, \
            4) Use active voice when possible for clarity.",
    },
];

const WRITING_FALLBACK: &str = "I can help with essays, thesis statements, citations, and grammar. \
    What aspect of writing do you need help with?";

const STUDY_RULES: &[Rule] = &[
    Rule {
        keywords: &["memorize", "memory", "remember"],
        response: "Memorization techniques: 1) Spaced repetition (review material at increasing intervals), \
            2) Active recall (test yourself instead of re-reading), \
            3) Mnemonics and acronyms, \
            4) Chunking (group related information), \
            5) Teaching others (explain concepts out loud).",
    },
    Rule {
        keywords: &["exam", "test", "quiz"],
        response: "Test preparation: 1) Start studying at least a week before, \
            2) Create a study schedule and stick to it, \
            3) Practice with old exams or sample questions, \
            4) Get enough sleep the night before, \
            5) Review difficult concepts first, then reinforce what you know.",
    },
    Rule {
        keywords: &["focus", "concentration", "distraction"],
        response: "Improve focus: 1) Use the Pomodoro Technique (25 min study, 5 min break), \
            2) Remove distractions (phone, social media), \
            3) Study in a dedicated quiet space, \
            4) Take regular breaks to avoid burnout, \
            5) Stay hydrated and eat healthy snacks.",
    },
    Rule {
        keywords: &["note", "notes", "note-taking"],
        response: "Effective note-taking: 1) Use Cornell method (questions, notes, summary), \
            2) Don't write everything - focus on key concepts, \
            3) Use abbreviations and symbols, \
            4) Review and reorganize notes within 24 hours, \
            5) Use colors and diagrams for visual learning.",
    },
];

const STUDY_FALLBACK: &str = "I can help with memorization, test prep, focus strategies, and note-taking. \
    What do you need help with?";

impl TopicCategory {
    /// Ordered rules for this category, evaluated top to bottom
    pub fn rules(self) -> &'static [Rule] {
        match self {
            Self::Math => MATH_RULES,
            Self::Writing => WRITING_RULES,
            Self::Study => STUDY_RULES,
        }
    }

    /// Response used when no rule matches
    pub fn fallback(self) -> &'static str {
        match self {
            Self::Math => MATH_FALLBACK,
            Self::Writing => WRITING_FALLBACK,
            Self::Study => STUDY_FALLBACK,
        }
    }
}

/// Pick the canned response for `topic` within `category`
pub fn classify(category: TopicCategory, topic: &str) -> &'static str {
    let topic_lower = topic.to_lowercase();
    category
        .rules()
        .iter()
        .find(|rule| rule.matches(&topic_lower))
        .map_or_else(|| category.fallback(), |rule| rule.response)
}

impl fmt::Display for TopicCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Math => write!(f, "math"),
            Self::Writing => write!(f, "writing"),
            Self::Study => write!(f, "study"),
        }
    }
}

impl FromStr for TopicCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "math" => Ok(Self::Math),
            "writing" => Ok(Self::Writing),
            "study" => Ok(Self::Study),
            other => Err(anyhow::anyhow!("Unknown topic category: {}", other)),
        }
    }
}
