use anyhow::Result;
use cvar_portfolio::market_data::JsonPriceSource;
use cvar_portfolio::solver::HighsSolver;
use cvar_portfolio::{CvarOptimizer, OptimizerConfig};
use log::{error, info};
use std::env;

fn main() -> Result<()> {
    // Initialize logger with default info level if RUST_LOG not set
    if env::var("RUST_LOG").is_err() {
        unsafe {
            env::set_var("RUST_LOG", "info");
        }
    }
    env_logger::init();
    info!("Starting minimum-CVaR portfolio optimizer");

    let args: Vec<String> = env::args().collect();
    let config_file = if args.len() > 1 {
        args[1].as_str()
    } else {
        "config.json"
    };

    info!("Loading configuration from: {}", config_file);
    let config = OptimizerConfig::load_from_file(config_file)?;

    let source = JsonPriceSource::new(&config.price_file);
    let optimizer = CvarOptimizer::new(HighsSolver::new(config.solver.clone()));

    match optimizer.run(&config, &source) {
        Ok(report) => {
            println!("{}", report.allocation);
            println!(
                "\nScenario check ({} scenarios): expected return {:.6}, worst loss {:.6}",
                report.scenario_count,
                report.diagnostics.expected_return,
                report.diagnostics.worst_loss
            );
            Ok(())
        }
        Err(e) => {
            error!("Optimization failed: {}", e);
            println!("No optimal solution found.");
            Err(e.into())
        }
    }
}
