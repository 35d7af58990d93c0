use std::time::Duration;

use stoker_core::capture::Console;
use stoker_core::domain::TaskError;
use stoker_core::pool::{Pool, PoolConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut pool = Pool::new(PoolConfig::default());
    tracing::info!("submitting demo tasks");

    // (A) three sleepers: 1s, 2s, 3s, one line per second
    for seconds in 1..=3u64 {
        pool.submit(move |console: Console| async move {
            for step in 0..seconds {
                tokio::time::sleep(Duration::from_secs(1)).await;
                console.println(format!("slept {}s", step + 1));
            }
            Ok::<(), TaskError>(())
        })
        .await
        .expect("pool not started yet");
    }

    // (B) one task that fails; the pool reports it and carries on
    pool.submit(|console: Console| async move {
        console.println("about to fail");
        Err::<(), TaskError>("error example".into())
    })
    .await
    .expect("pool not started yet");

    // (C) start the worker and block until every task is terminal
    pool.start().expect("first start");
    match pool.listen().await {
        Ok(snapshot) => println!("final status: {snapshot}"),
        Err(err) => eprintln!("pool error: {err}"),
    }
}
