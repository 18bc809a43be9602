//! 会话编排
//! 每个页面一个会话对象：提取段落、分批出题、应用控件、补全解析、
//! 判分与恢复。批次严格串行，前一批完全落地后才发起下一批。

use std::time::Instant;

use log::{debug, info, warn};

use crate::cloze::ClozeItem;
use crate::config::Settings;
use crate::dom::{self, Dom};
use crate::error::ClozeError;
use crate::extract::{self, Paragraph, ParagraphStatus};
use crate::i18n::{self, Lang, Status};
use crate::message::{AnalysisInput, ParagraphInput};
use crate::service::BackgroundService;
use crate::substitute::{self, ScoreSummary};
use crate::words::count_words;

/// 每批提交的段落数
pub const BATCH_SIZE: usize = 10;

/// 词数不超过这个阈值的段落只保留 1 个挖空
pub const SINGLE_CLOZE_WORD_LIMIT: usize = 100;

/// 生成统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub done: usize,
    pub success: usize,
}

/// 一次生成的汇总结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSummary {
    pub success: usize,
    pub total: usize,
    pub seconds: f64,
}

/// 页面会话。工厂构造，同一文档重复初始化会被拒绝。
#[derive(Debug)]
pub struct Session {
    dom: Dom,
    settings: Settings,
    paragraphs: Vec<Paragraph>,
    stats: Stats,
    status: Status,
    progress: Option<(usize, usize)>,
}

impl Session {
    /// 绑定到一个文档。文档上已有提取标记说明会话已经初始化过。
    pub fn attach(dom: Dom, settings: Settings) -> Result<Session, ClozeError> {
        let already = dom
            .document()
            .select("[data-cr-id]")
            .map(|mut iter| iter.next().is_some())
            .unwrap_or(false);
        if already {
            return Err(ClozeError::AlreadyInitialized);
        }
        Ok(Session {
            dom,
            settings,
            paragraphs: Vec::new(),
            stats: Stats::default(),
            status: Status::Ready,
            progress: None,
        })
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    /// 当前状态行文案
    pub fn status_line(&self) -> String {
        i18n::render(self.settings.language, &self.status)
    }

    pub fn progress(&self) -> Option<(usize, usize)> {
        self.progress
    }

    fn lang(&self) -> Lang {
        self.settings.language
    }

    fn set_status(&mut self, status: Status) {
        self.status = status;
        info!("[状态] {}", i18n::render(self.lang(), &self.status));
    }

    fn set_progress(&mut self, current: usize, total: usize) {
        self.progress = Some((current, total));
    }

    /// 词数策略：短段落只保留 1 个挖空
    fn apply_word_count_policy(text: &str, mut clozes: Vec<ClozeItem>) -> Vec<ClozeItem> {
        if count_words(text) <= SINGLE_CLOZE_WORD_LIMIT && clozes.len() > 1 {
            debug!("[限制] 词数 <= {}，只保留 1 个挖空", SINGLE_CLOZE_WORD_LIMIT);
            clozes.truncate(1);
        }
        clozes
    }

    /// 完整的生成流程：连接检查 -> 解析 -> 分批出题 -> 应用 -> 补全解析。
    /// 提取失败与连接失败中止本次生成；单批失败只记为零成功并继续。
    pub async fn run_generation(
        &mut self,
        service: &BackgroundService,
    ) -> Result<GenerationSummary, ClozeError> {
        let started = Instant::now();
        let provider = self.settings.provider.display_name().to_string();

        self.set_status(Status::CheckingConnection {
            provider: provider.clone(),
        });
        let api_status = service.check_status().await?;
        if !api_status.success {
            let error = api_status.error.unwrap_or_else(|| "Unknown error".to_string());
            self.set_status(Status::ConnectFailed { error: error.clone() });
            return Err(ClozeError::ConnectFailed(error));
        }
        if api_status.provider == "ollama" && api_status.model_exists == Some(false) {
            let model = self.settings.model().to_string();
            self.set_status(Status::ModelNotReady {
                model: model.clone(),
            });
            return Err(ClozeError::ModelNotReady(model));
        }

        self.set_status(Status::Parsing);
        match extract::extract(&self.dom) {
            Ok(paragraphs) => self.paragraphs = paragraphs,
            Err(e) => {
                self.set_status(Status::ParseFailed { error: e.to_string() });
                return Err(e.into());
            }
        }
        if self.paragraphs.is_empty() {
            self.set_status(Status::NoParagraphs);
            return Err(crate::error::ExtractError::NoContent.into());
        }

        let total = self.paragraphs.len();
        self.stats = Stats {
            total,
            done: 0,
            success: 0,
        };

        // 分批串行处理：一个段落同一时刻只会出现在一个在途批次里
        for batch_start in (0..total).step_by(BATCH_SIZE) {
            let batch_end = (batch_start + BATCH_SIZE).min(total);

            self.set_status(Status::Generating {
                provider: provider.clone(),
                current: batch_start + 1,
                total,
            });
            self.set_progress(batch_start, total);

            let inputs: Vec<ParagraphInput> = self.paragraphs[batch_start..batch_end]
                .iter()
                .map(|p| ParagraphInput {
                    id: p.id.clone(),
                    text: p.text.clone(),
                })
                .collect();
            for p in &mut self.paragraphs[batch_start..batch_end] {
                p.status = ParagraphStatus::Processing;
            }

            let result = service.generate_batch(&inputs).await?;

            if result.success {
                for index in batch_start..batch_end {
                    let (clozes, id, text) = {
                        let p = &self.paragraphs[index];
                        let clozes = result
                            .data
                            .get(&p.id)
                            .map(|entry| entry.clozes.clone())
                            .unwrap_or_default();
                        (clozes, p.id.clone(), p.text.clone())
                    };

                    self.set_progress(index, total);
                    let clozes = Self::apply_word_count_policy(&text, clozes);
                    if !clozes.is_empty() {
                        let applied = substitute::apply_cloze(&self.paragraphs[index], &clozes);
                        if applied > 0 {
                            self.stats.success += 1;
                        }
                        debug!("[应用] {} 插入 {} 个控件", id, applied);
                    }
                    self.stats.done += 1;
                    self.paragraphs[index].status = ParagraphStatus::Done;
                }
            } else {
                // 本批失败：整批记为完成、零成功，继续后面的批次
                warn!(
                    "[批次失败] {}: {}",
                    batch_start,
                    result.error.as_deref().unwrap_or("unknown")
                );
                for p in &mut self.paragraphs[batch_start..batch_end] {
                    p.status = ParagraphStatus::Done;
                    self.stats.done += 1;
                }
            }
        }

        // 解析补全：给没有解析的控件补一句
        self.backfill_analysis(service).await;

        let seconds = started.elapsed().as_secs_f64();
        let summary = GenerationSummary {
            success: self.stats.success,
            total: self.stats.total,
            seconds,
        };
        self.set_progress(total, total);
        self.set_status(Status::Summary {
            success: summary.success,
            total: summary.total,
            seconds,
        });
        Ok(summary)
    }

    /// 收集解析为空的控件并发起一次补全调用，失败静默降级
    async fn backfill_analysis(&mut self, service: &BackgroundService) {
        let mut pending: Vec<AnalysisInput> = Vec::new();
        if let Ok(selects) = self.dom.document().select("select.cr-select") {
            for select in selects {
                let node = select.as_node();
                let analysis = dom::get_attr(node, "data-cr-analysis").unwrap_or_default();
                if !analysis.is_empty() {
                    continue;
                }
                let answer = dom::get_attr(node, "data-cr-answer").unwrap_or_default();
                let id = dom::get_attr(node, "id").unwrap_or_default();
                if id.is_empty() || answer.is_empty() {
                    continue;
                }
                pending.push(AnalysisInput {
                    id,
                    target: answer.clone(),
                    answer,
                });
            }
        }
        if pending.is_empty() {
            return;
        }

        let result = match service.generate_analysis_batch(&pending).await {
            Ok(result) => result,
            Err(e) => {
                warn!("[解析补全] 跳过: {}", e);
                return;
            }
        };
        if !result.success {
            return;
        }
        for item in result.items {
            let selector = format!("#{}", item.id);
            if let Ok(mut found) = self.dom.document().select(&selector) {
                if let Some(select) = found.next() {
                    dom::set_attr(select.as_node(), "data-cr-analysis", &item.analysis);
                }
            }
        }
    }

    /// 提交判分
    pub fn submit(&mut self) -> ScoreSummary {
        let summary = substitute::grade(self.dom.document());
        self.set_status(Status::Score {
            correct: summary.correct,
            total: summary.total,
        });
        summary
    }

    /// 恢复原文：逐段回放快照并清空段落列表
    pub fn restore_original(&mut self) {
        for paragraph in &self.paragraphs {
            substitute::restore(paragraph);
        }
        self.paragraphs.clear();
        self.progress = None;
        self.set_status(Status::Restored {
            provider: self.settings.provider.display_name().to_string(),
        });
    }
}
