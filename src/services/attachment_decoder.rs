//! 附件解码服务 - 业务能力层
//!
//! 职责：
//! - 按扩展名把本地文件分派给表格或文档解码
//! - 单个文件失败不影响其他文件
//! - 不认识的扩展名直接跳过

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::infrastructure::{FileDecoders, FormatDecoder};
use crate::models::attachment::AttachmentFormat;
use crate::models::{AttachmentContent, AttachmentKind, DecodedAttachment};

/// 附件解码服务
#[derive(Clone)]
pub struct AttachmentDecoder {
    decoders: Arc<dyn FormatDecoder>,
}

impl Default for AttachmentDecoder {
    fn default() -> Self {
        Self::new(Arc::new(FileDecoders::new()))
    }
}

impl AttachmentDecoder {
    pub fn new(decoders: Arc<dyn FormatDecoder>) -> Self {
        Self { decoders }
    }

    /// 解码一组本地文件，输出顺序与输入一致（跳过的文件除外）
    pub fn decode(&self, paths: &[PathBuf]) -> Vec<DecodedAttachment> {
        paths
            .iter()
            .filter_map(|path| self.decode_one(path))
            .collect()
    }

    fn decode_one(&self, path: &Path) -> Option<DecodedAttachment> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let Some(format) = AttachmentFormat::from_path(path) else {
            debug!("跳过无法识别的附件: {}", name);
            return None;
        };

        let kind = format.kind();
        let decoded = match kind {
            AttachmentKind::Tabular => self
                .decoders
                .decode_tabular(path)
                .map(AttachmentContent::Table),
            AttachmentKind::DocumentText => self
                .decoders
                .decode_document_text(path)
                .map(AttachmentContent::Text),
        };

        Some(match decoded {
            Ok(content) => {
                debug!("✓ 附件解码成功: {}", name);
                DecodedAttachment::decoded(name, kind, content)
            }
            Err(e) => {
                warn!("⚠️ 附件解码失败: {} - {}", name, e);
                DecodedAttachment::failed(name, kind, e)
            }
        })
    }
}
