use crate::model::SourceFormat;
use std::path::{Path, PathBuf};
use thiserror::Error;
#[derive(Debug, Error)]
pub enum AppError {
    #[error("文件访问失败: {} ({source})", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("表格解析失败: {} ({source})", path.display())]
    Spreadsheet {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },
    #[error("工作簿中没有工作表: {}", path.display())]
    NoWorksheet { path: PathBuf },
    #[error("【{format}】表头行不存在: 第 {row} 行")]
    MissingHeaderRow { format: SourceFormat, row: usize },
    #[error("【{format}】缺少必需列: {column}")]
    MissingColumn { format: SourceFormat, column: String },
    #[error("xlsx 压缩包处理失败: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("模板文件异常: {0}")]
    Template(String),
    #[error("副输出生成失败: {0}")]
    SideOutput(#[from] rust_xlsxwriter::XlsxError),
}
pub type Result<T> = std::result::Result<T, AppError>;
impl AppError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }
}
