use clap::{ArgAction, Parser};
use std::path::PathBuf;
use tracing::Level;
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Verify,
    Fast,
    DryRun,
}
impl SaveMode {
    pub const fn is_dry_run(self) -> bool {
        matches!(self, Self::DryRun)
    }
    pub const fn verify_saved_file(self) -> bool {
        matches!(self, Self::Verify)
    }
}
#[derive(Debug, Clone, Parser)]
#[command(
    name = "bookfill",
    version,
    about = "教材征订表归一化并填充征订模板",
    after_help = "环境变量(可选):\n  RUST_LOG                    日志过滤, 优先于 -v/-q\n  BOOKFILL_DURABILITY_STRICT  保存后同步失败时视为错误"
)]
pub struct Args {
    /// 源征订表 (xlsx/xls/xlsb/ods)
    #[arg(long, value_name = "PATH", default_value = "source.xlsx")]
    pub source: PathBuf,
    /// 征订模板
    #[arg(long, value_name = "PATH", default_value = "target.xlsx")]
    pub template: PathBuf,
    /// 填充后的模板输出路径
    #[arg(long, value_name = "PATH", default_value = "target_filled.xlsx")]
    pub output: PathBuf,
    /// 版本/年级/书名 明细输出路径
    #[arg(long, value_name = "PATH", default_value = "version_grade_book.xlsx")]
    pub side_output: PathBuf,
    /// 学校名称 (仅记录日志)
    #[arg(long, default_value = "示例小学")]
    pub school: String,
    /// 写入第 3 列的学年
    #[arg(long, default_value = "2025")]
    pub year: String,
    /// 模板数据起始行 (从 1 开始)
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
    pub start_row: u32,
    /// 完整执行但不写出任何文件
    #[arg(long)]
    pub dry_run: bool,
    /// 跳过保存前的重新解析校验
    #[arg(long, conflicts_with = "dry_run")]
    pub fast_save: bool,
    /// 提高日志级别 (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,
    /// 降低日志级别 (-q warn, -qq error)
    #[arg(short, long, action = ArgAction::Count)]
    pub quiet: u8,
}
impl Default for Args {
    fn default() -> Self {
        Self {
            source: PathBuf::from("source.xlsx"),
            template: PathBuf::from("target.xlsx"),
            output: PathBuf::from("target_filled.xlsx"),
            side_output: PathBuf::from("version_grade_book.xlsx"),
            school: "示例小学".to_string(),
            year: "2025".to_string(),
            start_row: 4,
            dry_run: false,
            fast_save: false,
            verbose: 0,
            quiet: 0,
        }
    }
}
impl Args {
    pub const fn save_mode(&self) -> SaveMode {
        if self.dry_run {
            SaveMode::DryRun
        } else if self.fast_save {
            SaveMode::Fast
        } else {
            SaveMode::Verify
        }
    }
    pub const fn log_level(&self) -> Level {
        match (self.verbose, self.quiet) {
            (0, 0) => Level::INFO,
            (1, _) => Level::DEBUG,
            (_, 1) => Level::WARN,
            (0, _) => Level::ERROR,
            _ => Level::TRACE,
        }
    }
}
