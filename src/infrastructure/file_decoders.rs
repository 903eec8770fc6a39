//! 基于文件扩展名的格式解码器
//!
//! - csv / tsv：`csv` crate
//! - xlsx / xls / ods：`calamine`，只读第一个工作表
//! - pdf：`lopdf`，逐页提取文本后拼接
//! - json：按文本读取，能解析则格式化输出

use std::path::Path;

use calamine::{open_workbook_auto, Reader};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::DecodeError;
use crate::infrastructure::FormatDecoder;
use crate::models::attachment::AttachmentFormat;
use crate::models::TableData;

/// 默认的文件解码器
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDecoders;

impl FileDecoders {
    pub fn new() -> Self {
        Self
    }

    fn decode_delimited(&self, path: &Path, delimiter: u8) -> Result<TableData, DecodeError> {
        let to_error = |source| DecodeError::Delimited {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_path(path)
            .map_err(to_error)?;

        let headers = reader
            .headers()
            .map_err(to_error)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(to_error)?;
            rows.push(record.iter().map(|c| c.trim().to_string()).collect());
        }

        Ok(TableData { headers, rows })
    }

    fn decode_spreadsheet(&self, path: &Path) -> Result<TableData, DecodeError> {
        let to_error = |message: String| DecodeError::Spreadsheet {
            path: path.to_path_buf(),
            message,
        };

        let mut workbook = open_workbook_auto(path).map_err(|e| to_error(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| to_error("工作簿中没有工作表".to_string()))?
            .map_err(|e| to_error(e.to_string()))?;

        let mut rows = range
            .rows()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect::<Vec<_>>());
        let headers = rows.next().unwrap_or_default();
        let rows = rows.collect();

        Ok(TableData { headers, rows })
    }
}

impl FormatDecoder for FileDecoders {
    fn decode_tabular(&self, path: &Path) -> Result<TableData, DecodeError> {
        debug!("解码表格: {}", path.display());
        match AttachmentFormat::from_path(path) {
            Some(AttachmentFormat::Tsv) => self.decode_delimited(path, b'\t'),
            Some(AttachmentFormat::Spreadsheet) => self.decode_spreadsheet(path),
            _ => self.decode_delimited(path, b','),
        }
    }

    fn decode_document_text(&self, path: &Path) -> Result<String, DecodeError> {
        debug!("解码文档: {}", path.display());
        if AttachmentFormat::from_path(path) == Some(AttachmentFormat::Json) {
            let text = std::fs::read_to_string(path).map_err(|source| DecodeError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            return Ok(match serde_json::from_str::<JsonValue>(&text) {
                Ok(value) => serde_json::to_string_pretty(&value).unwrap_or(text),
                Err(_) => text,
            });
        }

        let document = lopdf::Document::load(path).map_err(|e| DecodeError::Document {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        // 单页提取失败按空页处理
        let pages: Vec<String> = document
            .get_pages()
            .keys()
            .map(|page_number| document.extract_text(&[*page_number]).unwrap_or_default())
            .collect();

        Ok(pages.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    #[test]
    fn test_decode_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "sales.csv", b"region, amount\nnorth,10\nsouth,32\n");

        let table = FileDecoders::new().decode_tabular(&path).unwrap();
        assert_eq!(table.headers, vec!["region", "amount"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["south", "32"]);
    }

    #[test]
    fn test_decode_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "data.tsv", b"a\tb\n1\t2\n");

        let table = FileDecoders::new().decode_tabular(&path).unwrap();
        assert_eq!(table.headers, vec!["a", "b"]);
        assert_eq!(table.rows, vec![vec!["1".to_string(), "2".to_string()]]);
    }

    #[test]
    fn test_decode_json_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "meta.json", br#"{"key":"value"}"#);

        let text = FileDecoders::new().decode_document_text(&path).unwrap();
        assert!(text.contains("\"key\": \"value\""));
    }

    /// 生成每页一行文字的 PDF
    fn write_pdf(path: &Path, pages: &[&str]) {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_decode_pdf_pages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        write_pdf(&path, &["Revenue grew in March", "Totals are final"]);

        let text = FileDecoders::new().decode_document_text(&path).unwrap();

        let first = text.find("Revenue grew in March").expect("first page text");
        let second = text.find("Totals are final").expect("second page text");
        assert!(first < second);
    }

    #[test]
    fn test_decode_xlsx_first_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.xlsx");

        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "region").unwrap();
        sheet.write_string(0, 1, "amount").unwrap();
        sheet.write_string(1, 0, "north").unwrap();
        sheet.write_number(1, 1, 10).unwrap();
        sheet.write_string(2, 0, "south").unwrap();
        sheet.write_number(2, 1, 32.5).unwrap();
        workbook.save(&path).unwrap();

        let table = FileDecoders::new().decode_tabular(&path).unwrap();

        assert_eq!(table.headers, vec!["region", "amount"]);
        assert_eq!(
            table.rows,
            vec![
                vec!["north".to_string(), "10".to_string()],
                vec!["south".to_string(), "32.5".to_string()],
            ]
        );
    }

    #[test]
    fn test_corrupt_pdf_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "broken.pdf", b"this is not a pdf");

        let err = FileDecoders::new().decode_document_text(&path).unwrap_err();
        assert!(matches!(err, DecodeError::Document { .. }));
    }

    #[test]
    fn test_missing_spreadsheet_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.xlsx");

        let err = FileDecoders::new().decode_tabular(&path).unwrap_err();
        assert!(matches!(err, DecodeError::Spreadsheet { .. }));
    }
}
