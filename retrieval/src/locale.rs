//! User-facing strings in the supported answer languages.

use serde::{Deserialize, Serialize};

/// Language used for generated sub-questions, sentinels, and prompts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    /// English.
    #[default]
    English,
    /// Traditional Chinese.
    TraditionalChinese,
}

impl Language {
    /// Generic sub-questions used when a question asks about a whole document.
    pub fn overview_questions(self) -> [&'static str; 3] {
        match self {
            Language::English => [
                "What is the main content?",
                "What are the key concepts?",
                "What is the conclusion?",
            ],
            Language::TraditionalChinese => ["主要內容是什麼？", "重點概念有哪些？", "結論是什麼？"],
        }
    }

    /// "What is X" sub-question for an extracted keyword.
    pub fn what_is(self, keyword: &str) -> String {
        match self {
            Language::English => format!("What is {keyword}?"),
            Language::TraditionalChinese => format!("{keyword}是什麼？"),
        }
    }

    /// "Detailed explanation of X" sub-question for an extracted keyword.
    pub fn explain(self, keyword: &str) -> String {
        match self {
            Language::English => format!("Detailed explanation of {keyword}?"),
            Language::TraditionalChinese => format!("{keyword}的詳細說明？"),
        }
    }

    /// Returned instead of a context when the question alone exhausts the budget.
    pub fn question_too_long(self) -> &'static str {
        match self {
            Language::English => "The question is too long; please shorten it.",
            Language::TraditionalChinese => "問題過長，請簡化問題。",
        }
    }

    /// Appended to a context part that was cut to fit the budget.
    pub fn truncation_marker(self) -> &'static str {
        match self {
            Language::English => "...[content truncated]",
            Language::TraditionalChinese => "...[內容截斷]",
        }
    }

    /// Answer used when retrieval finds nothing.
    pub fn no_information(self) -> &'static str {
        match self {
            Language::English => {
                "Sorry, I could not find relevant information to answer your question. \
                 Please make sure the relevant documents have been added."
            }
            Language::TraditionalChinese => {
                "抱歉，我找不到相關的資訊來回答您的問題。請確認您已上傳相關的文件。"
            }
        }
    }

    /// Header line of a labeled context part.
    pub fn fragment_label(self, position: usize, source_id: &str) -> String {
        match self {
            Language::English => format!("[Fragment {position}] Source: {source_id}"),
            Language::TraditionalChinese => format!("[片段 {position}] 來源：{source_id}"),
        }
    }

    /// Position of a fragment within its source, 1-based.
    pub fn fragment_position(self, number: usize, total: usize) -> String {
        match self {
            Language::English => format!("Fragment {number}/{total}"),
            Language::TraditionalChinese => format!("片段 {number}/{total}"),
        }
    }

    /// Instruction preamble for the generation collaborator.
    pub fn prompt_preamble(self) -> &'static str {
        match self {
            Language::English => {
                "You are a document question-answering assistant. Answer the user's question \
                 using the provided context.\n\n\
                 Instructions:\n\
                 1. Answer only from the provided context\n\
                 2. If the context does not contain the answer, say so explicitly\n\
                 3. Be accurate, concise, and helpful\n\
                 4. Cite specific sources where possible"
            }
            Language::TraditionalChinese => {
                "你是一個專業的文檔問答助手。請根據提供的上下文資訊來回答使用者的問題。\n\n\
                 重要指示：\n\
                 1. 只根據提供的上下文來回答問題\n\
                 2. 如果上下文中沒有相關資訊，請明確說明\n\
                 3. 回答要準確、簡潔且有幫助\n\
                 4. 如果可能，請引用具體的來源\n\
                 5. 使用繁體中文回答"
            }
        }
    }

    /// Section headings of the prompt: (context, question, answer cue).
    pub fn prompt_headings(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Language::English => (
                "Context:",
                "Question:",
                "Please provide a detailed and accurate answer:",
            ),
            Language::TraditionalChinese => ("上下文資訊：", "使用者問題：", "請提供詳細且準確的回答："),
        }
    }

    /// System message for chat-style generators.
    pub fn system_message(self) -> &'static str {
        match self {
            Language::English => {
                "You are a professional document QA assistant. You answer questions from the \
                 provided document content accurately and cite sources when needed."
            }
            Language::TraditionalChinese => {
                "你是一個專業的文檔問答助手，擅長根據提供的文檔內容回答問題。你會提供準確、有幫助的回答，並在必要時說明資訊的來源。"
            }
        }
    }
}
