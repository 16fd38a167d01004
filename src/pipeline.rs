//! load → adapt → sort → enrich → emit.
use crate::cli::Args;
use crate::error::Result;
use crate::excel::{
    source_reader::read_first_sheet,
    xlsx_container::{persist_all, stage_bytes},
};
use crate::extract::{enrich, parse_grade_and_term};
use crate::model::{CanonicalRow, EnrichedRow, SourceFormat};
use crate::side_dump::render_side_dump;
use crate::source_format::{adapt, detect_format};
use crate::template_fill::{FillOptions, FillReport, render_template};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};
const UNGRADED_RANK: u8 = 99;
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub processed: usize,
    pub missing_grade: usize,
    pub missing_subject: usize,
}
#[derive(Debug, Clone)]
pub struct RunContext {
    started: Instant,
    pub stats: RunStats,
}
impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
impl RunContext {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            stats: RunStats::default(),
        }
    }
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
    /// Counts `record` and warns when its title yielded no grade or subject.
    /// `position` is the 1-based output position.
    fn record(&mut self, position: usize, record: &EnrichedRow) {
        self.stats.processed += 1;
        let title = record.row.title.as_string();
        if record.grade.is_none() {
            self.stats.missing_grade += 1;
            warn!(position, title = %title, "无法识别年级");
        }
        if record.subject.is_none() {
            self.stats.missing_subject += 1;
            warn!(position, title = %title, "无法识别科目");
        }
    }
}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub format: SourceFormat,
    pub template: FillReport,
    pub written: bool,
}
pub fn load_source(path: &Path) -> Result<(SourceFormat, Vec<CanonicalRow>)> {
    let table = read_first_sheet(path)?;
    let format = detect_format(&table.top_left().as_string());
    info!(format = %format, "识别源文件格式");
    let rows = adapt(&table, format)?;
    Ok((format, rows))
}
fn grade_rank(row: &CanonicalRow) -> u8 {
    parse_grade_and_term(row.title.as_text())
        .0
        .map_or(UNGRADED_RANK, |grade| grade.rank())
}
/// Stable ascending sort by inferred grade; rows without a grade go last.
pub fn order_by_grade(mut rows: Vec<CanonicalRow>) -> Vec<CanonicalRow> {
    rows.sort_by_key(grade_rank);
    rows
}
pub fn enrich_all(rows: Vec<CanonicalRow>, ctx: &mut RunContext) -> Vec<EnrichedRow> {
    rows.into_iter()
        .enumerate()
        .map(|(idx, row)| {
            let enriched = enrich(row);
            ctx.record(idx + 1, &enriched);
            enriched
        })
        .collect()
}
/// Both outputs are rendered and staged beside their destinations before
/// either is persisted, so a fatal error leaves neither behind.
pub fn run(args: &Args, ctx: &mut RunContext) -> Result<RunOutcome> {
    let save_mode = args.save_mode();
    info!(school = %args.school, source = %args.source.display(), "读取源文件");
    let (format, rows) = load_source(&args.source)?;
    info!(rows = rows.len(), "源数据整理完成");
    let records = enrich_all(order_by_grade(rows), ctx);
    let options = FillOptions {
        year: args.year.clone(),
        start_row: args.start_row,
    };
    let rendered = render_template(
        &args.template,
        &records,
        &options,
        save_mode.verify_saved_file(),
    )?;
    let side_bytes = render_side_dump(&records)?;
    if save_mode.is_dry_run() {
        info!("dry-run: 不写出文件");
    } else {
        let staged = vec![
            stage_bytes(&rendered.bytes, &args.output)?,
            stage_bytes(&side_bytes, &args.side_output)?,
        ];
        persist_all(staged)?;
        info!(path = %args.output.display(), "主输出完成");
        info!(path = %args.side_output.display(), "副输出完成");
    }
    Ok(RunOutcome {
        format,
        template: rendered.report,
        written: !save_mode.is_dry_run(),
    })
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::excel::writer::Workbook;
    use crate::excel::xlsx_container::tests::minimal_package;
    use crate::model::{CellValue, Grade};
    use std::path::PathBuf;
    fn canonical(title: &str) -> CanonicalRow {
        CanonicalRow {
            title: CellValue::Text(title.to_owned()),
            publisher_label: None,
            unit_price: 0.0,
            paid_quantity: 1,
            free_quantity: 0,
        }
    }
    fn titles(rows: &[CanonicalRow]) -> Vec<String> {
        rows.iter().map(|r| r.title.as_string()).collect()
    }
    #[test]
    fn grade_order_is_stable_with_ungraded_last() {
        let rows = vec![
            canonical("英语练习"),
            canonical("三年级语文上册"),
            canonical("一年级数学下册"),
            canonical("三年级数学上册"),
            CanonicalRow {
                title: CellValue::Number(5.0),
                ..canonical("")
            },
            canonical("二(下)美术"),
        ];
        let ordered = order_by_grade(rows);
        assert_eq!(
            titles(&ordered),
            vec!["一年级数学下册", "二(下)美术", "三年级语文上册", "三年级数学上册", "英语练习", "5"]
        );
    }
    #[test]
    fn enrichment_counts_missing_fields() {
        let mut ctx = RunContext::new();
        let records = enrich_all(
            vec![canonical("三年级语文上册"), canonical("英语练习"), canonical("手工")],
            &mut ctx,
        );
        assert_eq!(records.len(), 3);
        assert_eq!(records.first().unwrap().grade, Some(Grade::Three));
        assert_eq!(
            ctx.stats,
            RunStats {
                processed: 3,
                missing_grade: 2,
                missing_subject: 1,
            }
        );
    }
    struct Fixture {
        _dir: tempfile::TempDir,
        args: Args,
    }
    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.xlsx");
        let mut book = rust_xlsxwriter::Workbook::new();
        let sheet = book.add_worksheet();
        for (col, header) in (0u16..).zip(["书名", "版别", "单价", "非免费订数", "免费订数"]) {
            sheet.write_string(0, col, header).unwrap();
        }
        let data: [(&str, &str, f64, f64, f64); 3] = [
            ("英语练习", "外研社", 6.0, 10.0, 0.0),
            ("四年级数学上册", "北师大", 11.2, 30.0, 5.0),
            ("一年级语文上册", "人教版", 9.0, 0.0, 40.0),
        ];
        for (row, (title, publisher, price, paid, free)) in (1u32..).zip(data) {
            sheet.write_string(row, 0, title).unwrap();
            sheet.write_string(row, 1, publisher).unwrap();
            sheet.write_number(row, 2, price).unwrap();
            sheet.write_number(row, 3, paid).unwrap();
            sheet.write_number(row, 4, free).unwrap();
        }
        book.save(&source).unwrap();
        let template = dir.path().join("target.xlsx");
        let sheet_xml = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1:K4"/><sheetData><row r="4"><c r="A4" s="1"/><c r="H4" s="2"/><c r="K4" s="3"/></row></sheetData></worksheet>"#;
        std::fs::write(&template, minimal_package(sheet_xml, &[])).unwrap();
        let args = Args {
            source,
            template,
            output: dir.path().join("out").join("filled.xlsx"),
            side_output: dir.path().join("out").join("side.xlsx"),
            ..Args::default()
        };
        Fixture { _dir: dir, args }
    }
    #[test]
    fn full_run_writes_both_outputs() {
        let fx = fixture();
        let mut ctx = RunContext::new();
        let outcome = run(&fx.args, &mut ctx).unwrap();
        assert_eq!(outcome.format, SourceFormat::StandardStatistics);
        assert_eq!(outcome.template.rows_written, 3);
        assert_eq!(outcome.template.rows_added, 2);
        assert!(outcome.written);
        assert_eq!(ctx.stats.missing_grade, 1);
        let filled = Workbook::open(&fx.args.output).unwrap();
        let sheet = filled.sheet();
        let title = |row: u32| sheet.cell(8, row).and_then(|c| c.raw_text());
        assert_eq!(title(4).as_deref(), Some("一年级语文上册"));
        assert_eq!(title(5).as_deref(), Some("四年级数学上册"));
        assert_eq!(title(6).as_deref(), Some("英语练习"));
        assert_eq!(sheet.cell(11, 6).unwrap().style_index(), Some("3"));
        assert!(fx.args.side_output.is_file());
    }
    #[test]
    fn dry_run_writes_nothing() {
        let fx = fixture();
        let args = Args {
            dry_run: true,
            ..fx.args.clone()
        };
        let outcome = run(&args, &mut RunContext::new()).unwrap();
        assert!(!outcome.written);
        assert!(!args.output.exists());
        assert!(!args.side_output.exists());
    }
    #[test]
    fn missing_template_fails_before_any_write() {
        let fx = fixture();
        let args = Args {
            template: PathBuf::from("/nonexistent/target.xlsx"),
            ..fx.args.clone()
        };
        assert!(matches!(
            run(&args, &mut RunContext::new()),
            Err(AppError::Io { .. })
        ));
        assert!(!args.side_output.exists());
    }
    #[test]
    fn unwritable_side_output_leaves_no_main_output() {
        let fx = fixture();
        let blocker = fx.args.output.parent().unwrap().with_file_name("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let args = Args {
            side_output: blocker.join("side.xlsx"),
            ..fx.args.clone()
        };
        assert!(matches!(
            run(&args, &mut RunContext::new()),
            Err(AppError::Io { .. })
        ));
        assert!(!args.output.exists());
    }
    #[test]
    fn failed_side_output_keeps_previous_main_output() {
        let fx = fixture();
        let out_dir = fx.args.output.parent().unwrap();
        std::fs::create_dir_all(out_dir).unwrap();
        std::fs::write(&fx.args.output, b"previous").unwrap();
        let side_output = out_dir.join("side_dir");
        std::fs::create_dir(&side_output).unwrap();
        let args = Args {
            side_output,
            ..fx.args.clone()
        };
        assert!(run(&args, &mut RunContext::new()).is_err());
        assert_eq!(std::fs::read(&args.output).unwrap(), b"previous");
    }
    #[derive(Clone, Default)]
    struct CapturedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);
    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
    #[test]
    fn detected_format_is_logged_before_schema_errors() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.xlsx");
        let mut book = rust_xlsxwriter::Workbook::new();
        let sheet = book.add_worksheet();
        for (col, header) in (0u16..).zip(["书名", "版别", "单价"]) {
            sheet.write_string(0, col, header).unwrap();
        }
        book.save(&source).unwrap();
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, || load_source(&source));
        assert!(matches!(result, Err(AppError::MissingColumn { .. })));
        let text = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains(SourceFormat::StandardStatistics.label()));
    }
}
