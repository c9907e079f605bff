//! Fits labeled context parts into a fixed token budget.

use tracing::debug;

use crate::config::BudgetConfig;
use crate::locale::Language;

/// Separator placed between packed parts.
pub const PART_SEPARATOR: &str = "\n\n";

/// Estimated token count: one token per four characters, rounded down.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Outcome of packing context for a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackedContext {
    /// Parts that fit, joined by [`PART_SEPARATOR`].
    Packed {
        text: String,

        /// Accepted characters over four, rounded up.
        used_tokens: usize,

        /// Budget that was left after the question and the answer reserve.
        available_tokens: usize,

        /// Whether a part was cut or dropped to fit.
        truncated: bool,
    },

    /// The question alone leaves no room for context.
    QuestionTooLong { message: String },
}

impl PackedContext {
    /// The context text, or the sentinel message.
    pub fn text(&self) -> &str {
        match self {
            PackedContext::Packed { text, .. } => text,
            PackedContext::QuestionTooLong { message } => message,
        }
    }

    pub fn is_truncated(&self) -> bool {
        match self {
            PackedContext::Packed { truncated, .. } => *truncated,
            PackedContext::QuestionTooLong { .. } => true,
        }
    }
}

/// Greedy, order-preserving context packer.
///
/// Callers must put the most important parts first: packing stops at the
/// first part that does not fit.
#[derive(Debug, Clone)]
pub struct TokenBudget {
    config: BudgetConfig,
    language: Language,
}

impl TokenBudget {
    pub fn new(config: BudgetConfig, language: Language) -> Self {
        Self { config, language }
    }

    /// Tokens left for context once the question and the answer reserve are
    /// accounted for. May be zero or negative.
    pub fn available_tokens(&self, question: &str) -> i64 {
        self.config.max_context_tokens as i64
            - estimate_tokens(question) as i64
            - self.config.answer_reserve_tokens as i64
    }

    /// Pack `parts` for `question`.
    ///
    /// The budget is enforced on characters (four per available token), so
    /// short parts cannot slip through on rounding. Parts are accepted while
    /// the running character total stays within the allowance. The first
    /// part that overflows is cut to the remaining allowance and marked, or
    /// dropped when fewer than `min_truncation_chars` characters would
    /// survive. Later parts are discarded.
    pub fn pack(&self, parts: &[String], question: &str) -> PackedContext {
        let available = self.available_tokens(question);
        if available <= 0 {
            debug!("Question leaves no context budget ({available} tokens)");
            return PackedContext::QuestionTooLong {
                message: self.language.question_too_long().to_string(),
            };
        }
        let available = available as usize;
        let allowance = available * 4;

        let mut accepted: Vec<String> = Vec::new();
        let mut used_chars = 0;
        let mut truncated = false;

        for part in parts {
            let chars = part.chars().count();
            if used_chars + chars <= allowance {
                accepted.push(part.clone());
                used_chars += chars;
                continue;
            }

            truncated = true;
            let remaining_chars = allowance - used_chars;
            if remaining_chars >= self.config.min_truncation_chars {
                let mut cut: String = part.chars().take(remaining_chars).collect();
                cut.push_str(self.language.truncation_marker());
                accepted.push(cut);
                used_chars = allowance;
            }
            break;
        }
        let used = used_chars.div_ceil(4);

        debug!(
            "Packed {} of {} context parts ({used}/{available} tokens)",
            accepted.len(),
            parts.len()
        );

        PackedContext::Packed {
            text: accepted.join(PART_SEPARATOR),
            used_tokens: used,
            available_tokens: available,
            truncated,
        }
    }
}
