//! 附件解码结果

use std::path::Path;

use serde::Serialize;

/// 附件类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    /// 分隔符表格、电子表格
    Tabular,
    /// PDF、JSON 等按文本读取的文档
    DocumentText,
}

/// 附件文件格式，按扩展名识别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentFormat {
    Csv,
    Tsv,
    Spreadsheet,
    Pdf,
    Json,
}

static FORMATS: phf::Map<&'static str, AttachmentFormat> = phf::phf_map! {
    "csv" => AttachmentFormat::Csv,
    "tsv" => AttachmentFormat::Tsv,
    "xlsx" => AttachmentFormat::Spreadsheet,
    "xlsm" => AttachmentFormat::Spreadsheet,
    "xls" => AttachmentFormat::Spreadsheet,
    "ods" => AttachmentFormat::Spreadsheet,
    "pdf" => AttachmentFormat::Pdf,
    "json" => AttachmentFormat::Json,
};

impl AttachmentFormat {
    /// 根据扩展名（不区分大小写）识别格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        FORMATS.get(ext.to_ascii_lowercase().as_str()).copied()
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// 识别超链接目标（忽略查询参数和锚点）
    pub fn from_link(href: &str) -> Option<Self> {
        let bare = href.split(['?', '#']).next().unwrap_or(href);
        let file_name = bare.rsplit('/').next().unwrap_or(bare);
        let (_, ext) = file_name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    pub fn kind(self) -> AttachmentKind {
        match self {
            AttachmentFormat::Csv | AttachmentFormat::Tsv | AttachmentFormat::Spreadsheet => {
                AttachmentKind::Tabular
            }
            AttachmentFormat::Pdf | AttachmentFormat::Json => AttachmentKind::DocumentText,
        }
    }
}

/// 表格数据：表头 + 行
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableData {
    /// 以制表符分隔输出前 `limit` 行（含表头）
    pub fn render_head(&self, limit: usize) -> String {
        let mut lines = Vec::with_capacity(limit + 1);
        if !self.headers.is_empty() {
            lines.push(self.headers.join("\t"));
        }
        for row in self.rows.iter().take(limit) {
            lines.push(row.join("\t"));
        }
        lines.join("\n")
    }
}

/// 解码后的附件内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentContent {
    Table(TableData),
    Text(String),
}

/// 单个附件的解码结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedAttachment {
    pub name: String,
    pub kind: AttachmentKind,
    /// 解码失败时为 None
    pub content: Option<AttachmentContent>,
    pub decode_error: Option<String>,
}

impl DecodedAttachment {
    pub fn decoded(name: impl Into<String>, kind: AttachmentKind, content: AttachmentContent) -> Self {
        Self {
            name: name.into(),
            kind,
            content: Some(content),
            decode_error: None,
        }
    }

    pub fn failed(name: impl Into<String>, kind: AttachmentKind, error: impl ToString) -> Self {
        Self {
            name: name.into(),
            kind,
            content: None,
            decode_error: Some(error.to_string()),
        }
    }

    pub fn table(&self) -> Option<&TableData> {
        match &self.content {
            Some(AttachmentContent::Table(table)) => Some(table),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Some(AttachmentContent::Text(text)) => Some(text),
            _ => None,
        }
    }
}
