use splitload_orm::{GraphLoader, LoadStrategy};

use super::demo::studio_graph;
use super::{print_stats, print_stats_header, Backend};
use crate::config::AppConfig;

/// Load the studio graph with every strategy, print what each one cost and
/// whether all of them produced the same graph
pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let backend = Backend::open(config).await?;
    let loader = GraphLoader::with_config(config.batch_config())?;
    let request = studio_graph();

    let mut outcomes = Vec::with_capacity(LoadStrategy::ALL.len());
    for strategy in LoadStrategy::ALL {
        match loader.load(backend.store(), &request, strategy).await {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => {
                backend.close().await;
                return Err(err.into());
            }
        }
    }
    backend.close().await;

    print_stats_header();
    for outcome in &outcomes {
        print_stats(&outcome.stats);
    }

    let agree = outcomes
        .windows(2)
        .all(|pair| pair[0].graph.same_membership(&pair[1].graph));
    println!();
    if agree {
        println!("All strategies loaded the same graph");
        Ok(())
    } else {
        anyhow::bail!("Strategies disagree on the loaded graph")
    }
}
