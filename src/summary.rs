use crate::cli::Args;
use crate::pipeline::{RunContext, RunOutcome};
pub fn print_summary(args: &Args, outcome: &RunOutcome, ctx: &RunContext) {
    let stats = &ctx.stats;
    println!("\n==== 征订表处理摘要 ====");
    println!("- 源文件: {}", args.source.display());
    println!("- 识别格式: {}", outcome.format);
    println!("- 学校: {} / 学年: {}", args.school, args.year);
    println!("- 处理记录: {}", stats.processed);
    if stats.missing_grade > 0 || stats.missing_subject > 0 {
        println!(
            "- 未识别: 年级 {} 条, 科目 {} 条",
            stats.missing_grade, stats.missing_subject
        );
    }
    println!(
        "- 模板工作表: {} (起始行 {}, 写入 {} 行, 新增 {} 行)",
        outcome.template.sheet_name,
        args.start_row,
        outcome.template.rows_written,
        outcome.template.rows_added
    );
    if outcome.written {
        println!("- 主输出: {}", args.output.display());
        println!("- 副输出: {}", args.side_output.display());
        if args.save_mode().verify_saved_file() {
            println!("- 保存校验: 启用(默认)");
        } else {
            println!("- 保存校验: 跳过(--fast-save)");
        }
    } else {
        println!("- 输出: (dry-run) 未写出文件");
    }
    println!("- 用时: {:.2} 秒", ctx.elapsed().as_secs_f64());
    println!("========================\n");
}
