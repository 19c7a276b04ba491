use anyhow::Result;
use log::Log;
use std::process;

use prime::{app, cli, logging};

fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Application panicked: {}", panic_info);
        eprintln!("Panic: {}", panic_info);
        process::exit(101);
    }));

    if let Err(e) = run() {
        log::error!("{:#}", e);
        log::logger().flush();
        eprintln!("Error: {:#}", e);
        process::exit(app::exit_code(&e));
    }
}

fn run() -> Result<()> {
    let args = cli::args::parse_args();
    cli::args::validate_args(&args)?;

    let config_manager = app::load_configuration(&args)?;
    let log_config = app::configure_logging(&args, &config_manager)?;
    let pipeline = app::pipeline_config(&args, &config_manager, &log_config)?;
    logging::init_logger(log_config)?;

    // Stages run one after another, so a single-threaded runtime suffices
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let reports = runtime.block_on(app::run_command(&args, pipeline))?;

    for line in app::summarize(&reports) {
        println!("{}", line);
    }
    Ok(())
}
