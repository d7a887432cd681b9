use anyhow::Context;
use clap::Parser;
use hop_trace::configuration::Configuration;
use hop_trace::report::{self, GraphWriter};
use hop_trace::{input, Args, ParserRegistry};
use log::debug;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let mut builder = Configuration::builder();
    if let Some(config_path) = &args.config {
        builder = builder.from_config_file(config_path)?;
    }
    let config = builder.from_args(&args).build()?;

    env_logger::Builder::new()
        .filter_level(if config.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();

    debug!("resolved configuration: {:?}", config);

    let mut registry = ParserRegistry::with_default_parsers();
    let graph = input::file_to_graph(&config.input, &mut registry)
        .with_context(|| format!("Failed to build graph from {}", config.input.display()))?;

    report::log_summary(&graph);

    GraphWriter::new(config.format, config.pretty)
        .write(&graph, config.output.as_deref())
        .context("Failed to write graph")?;

    Ok(())
}
