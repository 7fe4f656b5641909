use app_wiki::{HttpFetcher, WikiExtractor};
use eyre::{ensure, Result};
use runner::{init_logger, Coordinator, RunConfig, Sampler, RANDOM_ARTICLE_URL};
use std::{path::PathBuf, sync::Arc, time::Duration};
use structopt::StructOpt;

/// Counts the most common words in random Wikipedia articles.
#[derive(StructOpt, Debug)]
#[structopt(name = "wikiwords")]
struct Opt {
    /// Number of seconds to run for
    #[structopt(short = "t", long)]
    run_time: f64,
    /// Number of workers to use
    #[structopt(short = "n", long = "num-threads", default_value = "1")]
    workers: usize,
    /// Remove worker files when done
    #[structopt(short, long)]
    cleanup: bool,
    /// Save sorted lists to results files
    #[structopt(short, long)]
    output: bool,
    /// Continue from and save to the cumulative results file
    #[structopt(short = "u", long)]
    cumulative: bool,
    #[structopt(short, long, default_value = "results")]
    results_dir: PathBuf,
    #[structopt(long, default_value = RANDOM_ARTICLE_URL)]
    url: String,
    /// Seconds before a single fetch is abandoned
    #[structopt(long, default_value = "10")]
    fetch_timeout: f64,
    /// Entries printed per table
    #[structopt(long, default_value = "10")]
    top: usize,
}

impl Opt {
    fn into_config(self) -> Result<(RunConfig, String, Duration)> {
        ensure!(
            self.run_time.is_finite() && self.run_time > 0.0,
            "run time must be a positive number of seconds"
        );
        ensure!(self.workers >= 1, "at least one worker is required");
        ensure!(
            self.fetch_timeout.is_finite() && self.fetch_timeout > 0.0,
            "fetch timeout must be a positive number of seconds"
        );

        let mut config = RunConfig::new(
            Duration::from_secs_f64(self.run_time),
            self.workers,
            self.results_dir,
        );
        config.cleanup = self.cleanup;
        config.output = self.output;
        config.cumulative = self.cumulative;
        config.top = self.top;
        Ok((config, self.url, Duration::from_secs_f64(self.fetch_timeout)))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();

    let opt = Opt::from_args();
    let (config, url, fetch_timeout) = match opt.into_config() {
        Ok(parts) => parts,
        Err(e) => {
            eprintln!("error: {}\n", e);
            Opt::clap().print_help()?;
            println!();
            std::process::exit(2);
        }
    };

    let sampler = Sampler::new(
        Arc::new(HttpFetcher::new()?),
        Arc::new(WikiExtractor::new()?),
        url,
        fetch_timeout,
    );

    let summary = Coordinator::new(config, sampler)
        .launch()
        .await?
        .finish()
        .await?;

    println!();
    println!("{}", summary);
    Ok(())
}
