use std::fs;

use tracing::{error, info, warn};

use jobharvest::config::load_config;
use jobharvest::controller::{JobScraper, StopToken};
use jobharvest::model::JobResponse;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = match load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("config load error: {e}");
            std::process::exit(1);
        }
    };
    let inputs = match config.scraper_inputs() {
        Ok(inputs) => inputs,
        Err(e) => {
            error!("invalid search config: {e}");
            std::process::exit(1);
        }
    };

    // Ctrl-C flips the stop token; the controller hands back partial results.
    let stop = StopToken::new();
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing current page...");
                stop.stop();
            }
        });
    }

    let mut responses: Vec<JobResponse> = Vec::new();
    for input in &inputs {
        info!(
            "scraping \"{}\" ({} results wanted)",
            input.search_term, input.results_wanted
        );
        let scraper = match JobScraper::new(input) {
            Ok(s) => s,
            Err(e) => {
                error!("cannot build client: {e}");
                continue;
            }
        };
        match scraper.scrape(input, &stop).await {
            Ok(response) => {
                info!(
                    "collected {} jobs ({} warnings)",
                    response.jobs.len(),
                    response.warnings.len()
                );
                if let Some(failure) = &response.failure {
                    warn!("scrape incomplete: {failure:?}");
                }
                responses.push(response);
            }
            Err(e) => error!("scrape for \"{}\" rejected: {e}", input.search_term),
        }
        if stop.is_stopped() {
            break;
        }
    }

    if let Some(output) = &config.output_file {
        match serde_json::to_string_pretty(&responses) {
            Ok(json) => {
                if let Err(e) = fs::write(output, json) {
                    error!("failed to write {output}: {e}");
                } else {
                    info!("wrote results to {output}");
                }
            }
            Err(e) => error!("serialization error: {e}"),
        }
    }
}
