// top-level flow of a run.

use crate::{
    broker::{self, Broker, Queues},
    config::Cli,
    publisher::Publisher,
    report::{Reporter, Summary},
    retriever::Retriever,
    stats::Stats,
    util::TaskGuard,
    wordlist::Wordlist,
};
use anyhow::Context;
use std::{future::Future, sync::Arc};
use tokio_util::sync::CancellationToken;


/// Run the client as configured, until interrupted with ctrl+c.
pub async fn run(cli: Cli) -> anyhow::Result<Summary> {
    let broker = broker::connect(&cli.broker_url)
        .await
        .with_context(|| format!("connecting to broker at {}", cli.broker_url))?;
    let stop = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(%e, "error listening for ctrl+c, stopping");
        } else {
            info!("interrupted, stopping");
        }
    };
    run_with(&cli, broker, stop).await
}

/// Run the client against an already connected broker, until `stop` resolves.
///
/// Publishes the whole wordlist, then keeps retrieving results until stopped. Results already
/// waiting in the retrieve queue when stopped are still classified before the summary is made.
pub async fn run_with<S>(cli: &Cli, broker: Arc<dyn Broker>, stop: S) -> anyhow::Result<Summary>
where
    S: Future<Output = ()>,
{
    let prefix = cli.queue_prefix();
    let queues = Queues::named(&prefix);
    for queue in [&queues.retrieve, &queues.publish] {
        broker.declare(queue).await.with_context(|| format!("declaring queue {}", queue))?;
    }
    info!(publish = %queues.publish, retrieve = %queues.retrieve, "queues initialized");

    let mut wordlist = Wordlist::open(&cli.wordlist, cli.max_line_bytes)
        .await
        .with_context(|| format!("opening wordlist {}", cli.wordlist.display()))?;
    let stats = Arc::new(Stats::new());

    // the retriever stops first so the reporter sees every hit it classified
    let retriever_stop = CancellationToken::new();
    let reporter_stop = CancellationToken::new();
    let mut retriever = TaskGuard::spawn(
        Retriever::new(
            Arc::clone(&broker),
            queues.retrieve.clone(),
            Arc::clone(&stats),
            cli.poll_interval(),
            cli.verbose,
        )
        .run(retriever_stop.clone())
    );
    let mut reporter = TaskGuard::spawn(
        Reporter::new(Arc::clone(&stats), cli.out.clone()).run(reporter_stop.clone())
    );

    let publisher = Publisher::new(Arc::clone(&broker), queues.publish.clone(), cli.verbose);
    tokio::pin!(stop);
    let stopped = tokio::select! {
        published = publisher.run(&mut wordlist) => {
            let published = published.context("publishing wordlist")?;
            info!(published, "wordlist published, waiting for results");
            false
        }
        () = &mut stop => true,
    };

    let retrieved = if stopped {
        None
    } else {
        tokio::select! {
            () = &mut stop => None,
            retrieved = retriever.join() => Some(retrieved),
        }
    };
    retriever_stop.cancel();
    let retrieved = match retrieved {
        Some(retrieved) => retrieved,
        None => retriever.join().await,
    };
    retrieved
        .context("retriever task failed")?
        .context("retrieving results")?;

    reporter_stop.cancel();
    let summary = reporter
        .join()
        .await
        .context("reporter task failed")?
        .context("reporting hits")?;
    summary.log();
    Ok(summary)
}


// ==== tests ====
