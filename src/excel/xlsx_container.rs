use crate::error::{AppError, Result};
use std::{
    fs,
    io::{Cursor, Read, Write},
    path::{Path, PathBuf},
};
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, warn};
use zip::{CompressionMethod, ZipArchive, ZipWriter, write::SimpleFileOptions};
const REQUIRED_PARTS: [&str; 3] = [
    "[Content_Types].xml",
    "xl/workbook.xml",
    "xl/_rels/workbook.xml.rels",
];
#[derive(Debug, Clone)]
struct Part {
    name: String,
    data: Vec<u8>,
}
/// An xlsx package held fully in memory, parts kept in archive order.
#[derive(Debug, Clone, Default)]
pub struct XlsxContainer {
    parts: Vec<Part>,
}
impl XlsxContainer {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| AppError::io(path, e))?;
        Self::from_bytes(&bytes)
    }
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            validate_part_name(&name)?;
            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .map_err(|e| AppError::template(format!("读取压缩包部件失败: {name} ({e})")))?;
            parts.push(Part { name, data });
        }
        let container = Self { parts };
        container.ensure_required_parts()?;
        Ok(container)
    }
    pub fn has_part(&self, name: &str) -> bool {
        self.parts.iter().any(|p| p.name == name)
    }
    pub fn read_text(&self, name: &str) -> Result<String> {
        let part = self
            .parts
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| AppError::template(format!("缺少 OOXML 部件: {name}")))?;
        String::from_utf8(part.data.clone())
            .map_err(|e| AppError::template(format!("OOXML 部件不是 UTF-8 文本: {name} ({e})")))
    }
    pub fn write_text(&mut self, name: &str, content: &str) -> Result<()> {
        validate_part_name(name)?;
        let data = content.as_bytes().to_vec();
        if let Some(part) = self.parts.iter_mut().find(|p| p.name == name) {
            part.data = data;
        } else {
            self.parts.push(Part {
                name: name.to_string(),
                data,
            });
        }
        Ok(())
    }
    pub fn remove_part(&mut self, name: &str) -> bool {
        let before = self.parts.len();
        self.parts.retain(|p| p.name != name);
        self.parts.len() != before
    }
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for part in &self.parts {
            writer.start_file(part.name.as_str(), options)?;
            writer
                .write_all(&part.data)
                .map_err(|e| AppError::template(format!("写入压缩包部件失败: {} ({e})", part.name)))?;
        }
        Ok(writer.finish()?.into_inner())
    }
    pub fn ensure_required_parts(&self) -> Result<()> {
        if let Some(missing) = REQUIRED_PARTS.iter().find(|name| !self.has_part(name)) {
            return Err(AppError::template(format!(
                "不是有效的 xlsx 文件, 缺少必需部件: {missing}"
            )));
        }
        Ok(())
    }
}
fn validate_part_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(AppError::template("压缩包内存在空的部件名"));
    }
    if name.starts_with('/') || name.contains('\\') || name.contains(':') {
        return Err(AppError::template(format!("不允许绝对路径部件: {name}")));
    }
    if name.split('/').any(|segment| segment == "..") {
        return Err(AppError::template(format!("不允许上级路径部件: {name}")));
    }
    Ok(())
}
/// Output bytes already written to a temp file beside their destination.
#[derive(Debug)]
pub struct StagedOutput {
    tmp: NamedTempFile,
    output: PathBuf,
    parent: PathBuf,
}
/// A persisted output; `backup` holds the previous file until every output is in place.
#[derive(Debug)]
struct CommittedOutput {
    output: PathBuf,
    parent: PathBuf,
    backup: Option<TempPath>,
}
/// Creates the destination directory and writes `bytes` to a sibling temp file.
pub fn stage_bytes(bytes: &[u8], output: &Path) -> Result<StagedOutput> {
    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| AppError::io(parent, e))?;
    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| AppError::io(parent, e))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.flush())
        .map_err(|e| AppError::io(tmp.path(), e))?;
    Ok(StagedOutput {
        tmp,
        output: output.to_path_buf(),
        parent: parent.to_path_buf(),
    })
}
impl StagedOutput {
    fn commit(self) -> Result<CommittedOutput> {
        let Self {
            tmp,
            output,
            parent,
        } = self;
        let backup = if output.exists() {
            let backup = NamedTempFile::new_in(&parent)
                .map_err(|e| AppError::io(&parent, e))?
                .into_temp_path();
            fs::copy(&output, &backup).map_err(|e| AppError::io(&output, e))?;
            Some(backup)
        } else {
            None
        };
        tmp.persist(&output)
            .map_err(|e| AppError::io(&output, e.error))?;
        Ok(CommittedOutput {
            output,
            parent,
            backup,
        })
    }
}
impl CommittedOutput {
    fn rollback(self) {
        let restored = match self.backup {
            Some(backup) => backup.persist(&self.output).map_err(|e| e.error),
            None => fs::remove_file(&self.output),
        };
        match restored {
            Ok(()) => debug!(path = %self.output.display(), "已回滚输出"),
            Err(e) => warn!(path = %self.output.display(), error = %e, "回滚输出失败"),
        }
    }
    fn finish(self) -> Result<()> {
        drop(self.backup);
        let synced = fs::File::open(&self.output).and_then(|file| file.sync_all());
        if let Err(e) = synced {
            if durability_strict_mode() {
                return Err(AppError::io(&self.output, e));
            }
            warn!(path = %self.output.display(), error = %e, "保存后文件同步失败");
        }
        debug!(path = %self.output.display(), "文件已写入");
        sync_parent_dir(&self.parent)
    }
}
/// Persists every staged output, or none: a failed rename restores the outputs
/// already replaced in this call.
pub fn persist_all(staged: Vec<StagedOutput>) -> Result<()> {
    let mut committed = Vec::with_capacity(staged.len());
    for output in staged {
        match output.commit() {
            Ok(done) => committed.push(done),
            Err(e) => {
                for done in committed.into_iter().rev() {
                    done.rollback();
                }
                return Err(e);
            }
        }
    }
    committed.into_iter().try_for_each(CommittedOutput::finish)
}
/// Writes `bytes` to `output` through a sibling temp file, then fsyncs the result.
#[cfg(test)]
pub fn persist_bytes(bytes: &[u8], output: &Path) -> Result<()> {
    persist_all(vec![stage_bytes(bytes, output)?])
}
#[cfg(unix)]
fn sync_parent_dir(parent: &Path) -> Result<()> {
    if let Err(e) = fs::File::open(parent).and_then(|dir| dir.sync_all()) {
        if durability_strict_mode() {
            return Err(AppError::io(parent, e));
        }
        warn!(path = %parent.display(), error = %e, "保存后目录同步失败");
    }
    Ok(())
}
#[cfg(not(unix))]
#[allow(
    clippy::unnecessary_wraps,
    reason = "signature matches the unix variant"
)]
const fn sync_parent_dir(_parent: &Path) -> Result<()> {
    Ok(())
}
fn durability_strict_mode() -> bool {
    std::env::var("BOOKFILL_DURABILITY_STRICT").is_ok_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}
