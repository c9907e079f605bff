//! Question classification and decomposition.
//!
//! Breadth and type detection are keyword heuristics, not semantic
//! understanding. They sit behind [`QuestionClassifier`] so a model-backed
//! classifier can replace [`KeywordClassifier`] without touching retrieval,
//! expansion, or budgeting.

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::locale::Language;

/// Upper bound of [`QuestionAnalysis::complexity_score`].
pub const MAX_COMPLEXITY: f32 = 10.0;

/// Markers asking about a whole document.
const OVERVIEW_MARKERS: &[&str] = &["整篇", "全部", "entire", "whole document"];

/// Markers asking for a detailed explanation.
const DETAIL_MARKERS: &[&str] = &["詳細解釋", "explain in detail", "detailed explanation"];

const STOPWORDS: &[&str] = &[
    "的", "了", "是", "在", "有", "和", "與", "或", "但", "而", "也", "都", "很", "更", "最", "the",
    "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with",
];

/// Keyword candidates considered per question.
const KEYWORD_CANDIDATES: usize = 5;

/// Keywords that produce sub-questions.
const KEYWORDS_USED: usize = 3;

/// Coarse intent of a question. A question may have several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Definition,
    Procedure,
    Explanation,
    Comparison,
    Enumeration,
}

impl QuestionType {
    pub const ALL: [QuestionType; 5] = [
        QuestionType::Definition,
        QuestionType::Procedure,
        QuestionType::Explanation,
        QuestionType::Comparison,
        QuestionType::Enumeration,
    ];

    fn keywords(self) -> &'static [&'static str] {
        match self {
            QuestionType::Definition => &["什麼", "what", "是什麼", "定義", "define"],
            QuestionType::Procedure => &["如何", "how", "怎麼", "方法"],
            QuestionType::Explanation => &["為什麼", "why", "原因", "理由", "reason"],
            QuestionType::Comparison => &["比較", "compare", "差異", "不同", "difference"],
            QuestionType::Enumeration => &["列出", "list", "有哪些", "包括"],
        }
    }
}

/// Shape of a question, computed once per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnalysis {
    pub is_broad: bool,
    pub word_count: usize,
    pub char_count: usize,

    /// `min(10, char_count / 10 + word_count / 5)`.
    pub complexity_score: f32,

    /// Matched types, in [`QuestionType::ALL`] order.
    pub question_types: Vec<QuestionType>,
}

/// Classifies questions and breaks broad ones into sub-questions.
pub trait QuestionClassifier: Send + Sync {
    fn analyze(&self, question: &str) -> QuestionAnalysis;

    /// Sub-questions to retrieve for. Returns `[question]` when the question
    /// is not broad or no decomposition applies.
    fn decompose(&self, question: &str) -> Vec<String>;
}

/// Keyword-list classifier.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    broad_keywords: Vec<String>,
    language: Language,
}

impl KeywordClassifier {
    pub fn new(config: &AnalysisConfig, language: Language) -> Self {
        Self {
            broad_keywords: config
                .broad_question_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            language,
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default(), Language::default())
    }
}

impl QuestionClassifier for KeywordClassifier {
    fn analyze(&self, question: &str) -> QuestionAnalysis {
        let lower = question.to_lowercase();
        let word_count = question.split_whitespace().count();
        let char_count = question.chars().count();
        let complexity_score =
            (char_count as f32 / 10.0 + word_count as f32 / 5.0).min(MAX_COMPLEXITY);

        QuestionAnalysis {
            is_broad: self.broad_keywords.iter().any(|k| lower.contains(k.as_str())),
            word_count,
            char_count,
            complexity_score,
            question_types: QuestionType::ALL
                .into_iter()
                .filter(|t| t.keywords().iter().any(|k| lower.contains(k)))
                .collect(),
        }
    }

    fn decompose(&self, question: &str) -> Vec<String> {
        if !self.analyze(question).is_broad {
            return vec![question.to_string()];
        }

        let lower = question.to_lowercase();
        let mut sub_questions = Vec::new();

        if OVERVIEW_MARKERS.iter().any(|m| lower.contains(m)) {
            sub_questions.extend(
                self.language
                    .overview_questions()
                    .into_iter()
                    .map(String::from),
            );
        }

        if DETAIL_MARKERS.iter().any(|m| lower.contains(m)) {
            for keyword in extract_keywords(question).iter().take(KEYWORDS_USED) {
                sub_questions.push(self.language.what_is(keyword));
                sub_questions.push(self.language.explain(keyword));
            }
        }

        if sub_questions.is_empty() {
            vec![question.to_string()]
        } else {
            sub_questions
        }
    }
}

/// Candidate keywords: punctuation becomes whitespace, stopwords and
/// single-character tokens are dropped, and at most the first five remain.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|word| !STOPWORDS.contains(&word.to_lowercase().as_str()))
        .filter(|word| word.chars().count() > 1)
        .take(KEYWORD_CANDIDATES)
        .map(str::to_string)
        .collect()
}
