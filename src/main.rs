mod cli;
mod error;
mod excel;
mod extract;
mod logging;
mod model;
mod numeric;
mod pipeline;
mod side_dump;
mod source_format;
mod summary;
mod template_fill;
mod text;
use clap::Parser;
use std::process::ExitCode;
use tracing::error;
fn main() -> ExitCode {
    let args = cli::Args::parse();
    logging::init_logging(args.log_level());
    let mut ctx = pipeline::RunContext::new();
    match pipeline::run(&args, &mut ctx) {
        Ok(outcome) => {
            summary::print_summary(&args, &outcome, &ctx);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
