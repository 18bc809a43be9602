//! cloze-reading 核心库
//! 从网页正文提取段落，调用 LLM 生成完形填空题，
//! 并把交互控件原位替换进页面文本。

pub mod cloze;
pub mod config;
pub mod dom;
pub mod error;
pub mod extract;
pub mod i18n;
pub mod message;
pub mod prompt;
pub mod providers;
pub mod service;
pub mod session;
pub mod substitute;
pub mod words;

pub use cloze::{parse_response, ClozeItem, ClozeMap};
pub use config::{ProviderKind, Settings};
pub use dom::Dom;
pub use error::{ClozeError, ExtractError, ProviderError};
pub use extract::{extract, quick_detect_content, Paragraph, ParagraphStatus};
pub use i18n::{Lang, Status};
pub use message::{ApiStatus, ParagraphInput, Request, Response};
pub use service::BackgroundService;
pub use session::{GenerationSummary, Session, Stats, BATCH_SIZE};
pub use substitute::{apply_cloze, grade, restore, RangeSet, ScoreSummary};
pub use words::count_words;
