use anyhow::Result;
use scotscraper::{Dataset, GithubUpstream};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    let data_dir = std::env::var("SCOT_DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let dataset = Dataset::new(&data_dir, GithubUpstream::new()?)?;

    if dataset.is_stale()? {
        info!("upstream has newer data, refreshing");
        dataset.refresh(false, None)?;
    }

    let boards = dataset.health_boards()?;
    info!("{} health boards", boards.len());

    let cases = dataset.cases()?;
    if let (Some(first), Some(last)) = (cases.keys().next(), cases.keys().next_back()) {
        info!("cases cover {first} to {last}");
    }
    let deaths = dataset.deaths()?;
    if let (Some(first), Some(last)) = (deaths.keys().next(), deaths.keys().next_back()) {
        info!("deaths cover {first} to {last}");
    }
    let icu = dataset.intensive_care_total()?;
    if let (Some(first), Some(last)) = (icu.keys().next(), icu.keys().next_back()) {
        info!("intensive care covers {first} to {last}");
    }
    let deceased = dataset.deceased()?;
    if let (Some(first), Some(last)) = (deceased.keys().next(), deceased.keys().next_back()) {
        info!("deceased covers {first} to {last}");
    }

    info!("all done");
    Ok(())
}
