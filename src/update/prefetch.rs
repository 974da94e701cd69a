use std::time::Instant;

use crate::core::RunContext;
use crate::error::{FeedError, FetchErrors, Result};
use crate::index::{build_pipeline, Pipeline};

/// 并行预取所有服务的已有文档。
///
/// 与写阶段不同：fetch 之间没有依赖，全部同时发起；
/// 一个服务失败不影响其他服务继续完成，最后汇总所有错误。
pub async fn fetch_feed(ctx: &RunContext) -> Result<()> {
    fetch_feed_with(ctx, build_pipeline).await
}

pub async fn fetch_feed_with<B>(ctx: &RunContext, build: B) -> Result<()>
where
    B: Fn(&RunContext) -> Pipeline,
{
    let pipeline = build(ctx);
    let started = Instant::now();

    let results = futures::future::join_all(
        pipeline
            .handles()
            .iter()
            .map(|h| async move { (h.kind(), h.service().fetch().await) }),
    )
    .await;

    let mut errors = FetchErrors::default();
    for (kind, result) in results {
        if let Err(e) = result {
            tracing::warn!("fetch: {} failed: {}", kind, e);
            errors.failures.push((kind, e));
        }
    }

    if !errors.is_empty() {
        return Err(FeedError::Fetch(errors));
    }

    tracing::info!(
        "Fetched {} services in {:?}",
        pipeline.len(),
        started.elapsed()
    );
    Ok(())
}
