//! 页面规范化服务 - 业务能力层
//!
//! 把任意 HTML（加上脚本渲染出的全局变量）整理成 [`ExtractionResult`]。
//! 纯函数，不发起任何外部调用；任何畸形的输入都不会报错。

use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Number, Value as JsonValue};
use tracing::debug;

use crate::models::attachment::AttachmentFormat;
use crate::models::{ExtractionResult, PayloadSource, ProblemSource, StructuredPayload};

/// 非专用选择器要求的最小文本长度（字符数，需严格大于）
pub const MIN_QUESTION_LEN: usize = 10;
/// 兜底时截取的可见文本长度
pub const VISIBLE_TEXT_LIMIT: usize = 500;

/// 题目字段名（大小写敏感）
const QUESTION_FIELD: &str = "question";
/// 提交地址字段名
const SUBMIT_FIELDS: &[&str] = &["submit_url", "submitUrl", "submit"];
/// 不算可见文本的元素
const INVISIBLE_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// 题目提取级联中的一级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionStrategy {
    /// 全局变量记录中的 `question` 字段
    PrerenderedField,
    /// CSS 选择器的第一个匹配元素；`dedicated` 表示选择器本身就是"题目"标记
    Selector {
        css: &'static str,
        dedicated: bool,
    },
    /// 全部可见文本的前 [`VISIBLE_TEXT_LIMIT`] 个字符
    VisibleText,
}

/// 题目提取的优先级，先命中者胜出
pub const QUESTION_CASCADE: &[QuestionStrategy] = &[
    QuestionStrategy::PrerenderedField,
    QuestionStrategy::Selector {
        css: ".question",
        dedicated: true,
    },
    QuestionStrategy::Selector {
        css: "#question",
        dedicated: true,
    },
    QuestionStrategy::Selector {
        css: "[data-question]",
        dedicated: true,
    },
    QuestionStrategy::Selector {
        css: "h1",
        dedicated: false,
    },
    QuestionStrategy::Selector {
        css: "h2",
        dedicated: false,
    },
    QuestionStrategy::Selector {
        css: "p",
        dedicated: false,
    },
    QuestionStrategy::VisibleText,
];

impl QuestionStrategy {
    fn extract(
        &self,
        document: &Html,
        variables: &Map<String, JsonValue>,
    ) -> Option<(String, ProblemSource)> {
        match self {
            QuestionStrategy::PrerenderedField => {
                variables.iter().find_map(|(name, value)| {
                    let text = value.as_object()?.get(QUESTION_FIELD).and_then(field_text)?;
                    Some((
                        text,
                        ProblemSource::Prerendered {
                            variable: name.clone(),
                        },
                    ))
                })
            }
            QuestionStrategy::Selector { css, dedicated } => {
                let selector = Selector::parse(css).ok()?;
                let element = document.select(&selector).next()?;
                let text = element_text(element);
                let accepted = if *dedicated {
                    !text.is_empty()
                } else {
                    text.chars().count() > MIN_QUESTION_LEN
                };
                accepted.then(|| {
                    (
                        text,
                        ProblemSource::Selector {
                            selector: css.to_string(),
                        },
                    )
                })
            }
            QuestionStrategy::VisibleText => {
                let text: String = visible_text(document)
                    .chars()
                    .take(VISIBLE_TEXT_LIMIT)
                    .collect();
                (!text.is_empty()).then_some((text, ProblemSource::VisibleText))
            }
        }
    }
}

/// 规范化页面内容
///
/// # 参数
/// - `markup`: 页面 HTML
/// - `variables`: 脚本渲染出的全局变量（按读取顺序）
pub fn normalize(markup: &str, variables: &Map<String, JsonValue>) -> ExtractionResult {
    let document = Html::parse_document(markup);

    let (problem_text, problem_source) = QUESTION_CASCADE
        .iter()
        .find_map(|strategy| strategy.extract(&document, variables))
        .unwrap_or((String::new(), ProblemSource::VisibleText));

    let submission_target = prerendered_submit_target(variables).or_else(|| form_action(&document));

    let mut structured_payloads = prerendered_payloads(variables);
    structured_payloads.extend(inline_script_payloads(&document));
    structured_payloads.extend(table_payloads(&document));

    let attachment_links = attachment_links(&document);

    debug!(
        "规范化完成: 题目来源 {:?}, {} 组结构化数据, {} 个附件链接",
        problem_source,
        structured_payloads.len(),
        attachment_links.len()
    );

    ExtractionResult {
        problem_text,
        problem_source,
        submission_target,
        structured_payloads,
        attachment_links,
    }
}

/// 字段取值转文本：字符串原样，其他非空值序列化
fn field_text(value: &JsonValue) -> Option<String> {
    let text = match value {
        JsonValue::Null => return None,
        JsonValue::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 元素内的文本，片段之间以空格分隔
fn element_text(element: ElementRef<'_>) -> String {
    let joined = element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    collapse_whitespace(&joined)
}

/// 文档中所有可见文本
fn visible_text(document: &Html) -> String {
    let pieces: Vec<&str> = document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|e| INVISIBLE_ELEMENTS.contains(&e.name()))
            });
            (!hidden).then_some(&**text)
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    collapse_whitespace(&pieces.join(" "))
}

fn prerendered_submit_target(variables: &Map<String, JsonValue>) -> Option<String> {
    variables.values().filter_map(JsonValue::as_object).find_map(|record| {
        SUBMIT_FIELDS.iter().find_map(|field| {
            record
                .get(*field)
                .and_then(JsonValue::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
    })
}

fn form_action(document: &Html) -> Option<String> {
    let selector = Selector::parse("form").ok()?;
    document
        .select(&selector)
        .next()?
        .value()
        .attr("action")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn prerendered_payloads(variables: &Map<String, JsonValue>) -> Vec<StructuredPayload> {
    variables
        .iter()
        .filter(|(_, value)| value.is_object())
        .map(|(name, value)| {
            StructuredPayload::new(
                PayloadSource::Prerendered {
                    variable: name.clone(),
                },
                value.clone(),
            )
        })
        .collect()
}

/// 每个内联脚本里第一个 `{` 到最后一个 `}` 之间的 JSON；解析失败的跳过
fn inline_script_payloads(document: &Html) -> Vec<StructuredPayload> {
    let Ok(selector) = Selector::parse("script") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .enumerate()
        .filter_map(|(index, script)| {
            let text: String = script.text().collect();
            let start = text.find('{')?;
            let end = text.rfind('}')?;
            if end <= start {
                return None;
            }
            let value = serde_json::from_str::<JsonValue>(&text[start..=end]).ok()?;
            Some(StructuredPayload::new(PayloadSource::InlineScript { index }, value))
        })
        .collect()
}

/// 每张表格一组记录，每行一条
fn table_payloads(document: &Html) -> Vec<StructuredPayload> {
    let (Ok(table_sel), Ok(row_sel), Ok(header_sel), Ok(data_sel), Ok(cell_sel)) = (
        Selector::parse("table"),
        Selector::parse("tr"),
        Selector::parse("th"),
        Selector::parse("td"),
        Selector::parse("th, td"),
    ) else {
        return Vec::new();
    };

    let mut payloads = Vec::new();
    for (index, table) in document.select(&table_sel).enumerate() {
        let mut headers: Option<Vec<String>> = None;
        let mut records = Vec::new();

        for row in table.select(&row_sel) {
            let is_header_row =
                row.select(&header_sel).next().is_some() && row.select(&data_sel).next().is_none();
            let cells: Vec<String> = row.select(&cell_sel).map(element_text).collect();

            if is_header_row && headers.is_none() && records.is_empty() {
                headers = Some(cells);
                continue;
            }
            if cells.is_empty() {
                continue;
            }

            let mut record = Map::new();
            for (col, cell) in cells.into_iter().enumerate() {
                let key = headers
                    .as_ref()
                    .and_then(|h| h.get(col))
                    .filter(|h| !h.is_empty())
                    .cloned()
                    .unwrap_or_else(|| col.to_string());
                record.insert(key, cell_value(cell));
            }
            records.push(JsonValue::Object(record));
        }

        if !records.is_empty() {
            payloads.push(StructuredPayload::new(
                PayloadSource::Table { index },
                JsonValue::Array(records),
            ));
        }
    }
    payloads
}

/// 数字单元格转成 JSON 数字
fn cell_value(cell: String) -> JsonValue {
    if let Ok(int) = cell.parse::<i64>() {
        return JsonValue::from(int);
    }
    if let Some(number) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
        if cell.contains('.') {
            return JsonValue::Number(number);
        }
    }
    JsonValue::String(cell)
}

fn attachment_links(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut links: Vec<String> = Vec::new();
    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        if AttachmentFormat::from_link(href).is_some() && !links.iter().any(|l| l == href) {
            links.push(href.to_string());
        }
    }
    links
}
