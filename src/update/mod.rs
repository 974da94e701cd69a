pub mod init;
pub mod prefetch;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Instant;

use futures::future::BoxFuture;

use crate::core::{PackageIdentity, PackageInput, RunContext};
use crate::error::{FeedError, Operation, Result};
use crate::index::{build_pipeline, IndexHandle, Pipeline};

pub use init::init_feed;
pub use prefetch::{fetch_feed, fetch_feed_with};

/// 对 pipeline 中某个服务的单步动作
pub enum Step<'a> {
    Run(BoxFuture<'a, Result<()>>),
    /// 该服务不参与本次操作（例如缺少 symbols 能力）
    Skip,
}

/// 顺序执行：服务 N+1 只在服务 N 完成后开始；第一个失败立即中止，不回滚。
///
/// 返回实际调用的服务数。
pub async fn run_sequential<'a, F>(
    pipeline: &Pipeline,
    op: Operation,
    target: &PackageIdentity,
    mut step: F,
) -> Result<usize>
where
    F: FnMut(&IndexHandle) -> Step<'a>,
{
    let mut visited = 0;
    for handle in pipeline.handles() {
        let fut = match step(handle) {
            Step::Run(fut) => fut,
            Step::Skip => {
                tracing::debug!("{} {}: {} skipped", op, target, handle.kind());
                continue;
            }
        };

        let started = Instant::now();
        if let Err(e) = fut.await {
            tracing::error!("{} {}: {} failed: {}", op, target, handle.kind(), e);
            return Err(FeedError::Service {
                op,
                service: handle.kind(),
                source: Box::new(e),
            });
        }
        visited += 1;
        tracing::debug!(
            "{} {}: {} done in {:?}",
            op,
            target,
            handle.kind(),
            started.elapsed()
        );
    }
    Ok(visited)
}

/// 把包加入所有服务。
///
/// symbols 包只路由到具备 symbols 能力的服务，其余服务直接跳过；
/// 普通包对每个服务调用一次 `add_package`。
pub async fn add_package(ctx: &RunContext, package: &PackageInput) -> Result<()> {
    add_package_with(ctx, package, build_pipeline).await
}

pub async fn add_package_with<B>(ctx: &RunContext, package: &PackageInput, build: B) -> Result<()>
where
    B: Fn(&RunContext) -> Pipeline,
{
    let pipeline = build(ctx);
    let identity = &package.identity;

    let visited = if package.is_symbols_package {
        run_sequential(&pipeline, Operation::AddSymbols, identity, move |h| {
            match h.symbols().cloned() {
                Some(svc) => Step::Run(Box::pin(async move { svc.add_symbols_package(package).await })),
                None => Step::Skip,
            }
        })
        .await?
    } else {
        run_sequential(&pipeline, Operation::Add, identity, move |h| {
            let svc = h.service().clone();
            Step::Run(Box::pin(async move { svc.add_package(package).await }))
        })
        .await?
    };

    tracing::info!(
        "Added {}{} ({} of {} services)",
        identity,
        if package.is_symbols_package { " (symbols)" } else { "" },
        visited,
        pipeline.len()
    );
    Ok(())
}

/// 同时移除普通包与 symbols 包；第一步失败时第二步不执行。
pub async fn remove_package(ctx: &RunContext, identity: &PackageIdentity) -> Result<()> {
    remove_package_with(ctx, identity, build_pipeline).await
}

pub async fn remove_package_with<B>(ctx: &RunContext, identity: &PackageIdentity, build: B) -> Result<()>
where
    B: Fn(&RunContext) -> Pipeline,
{
    remove_non_symbols_package_with(ctx, identity, &build).await?;
    remove_symbols_package_with(ctx, identity, &build).await
}

/// 对每个服务调用普通 `remove_package`，不检查 symbols 能力。
pub async fn remove_non_symbols_package(ctx: &RunContext, identity: &PackageIdentity) -> Result<()> {
    remove_non_symbols_package_with(ctx, identity, build_pipeline).await
}

pub async fn remove_non_symbols_package_with<B>(
    ctx: &RunContext,
    identity: &PackageIdentity,
    build: B,
) -> Result<()>
where
    B: Fn(&RunContext) -> Pipeline,
{
    let pipeline = build(ctx);
    let visited = run_sequential(&pipeline, Operation::Remove, identity, move |h| {
        let svc = h.service().clone();
        Step::Run(Box::pin(async move { svc.remove_package(identity).await }))
    })
    .await?;

    tracing::info!("Removed {} ({} services)", identity, visited);
    Ok(())
}

/// 只移除 symbols 包；symbols_enabled=false 时为 no-op。
pub async fn remove_symbols_package(ctx: &RunContext, identity: &PackageIdentity) -> Result<()> {
    remove_symbols_package_with(ctx, identity, build_pipeline).await
}

pub async fn remove_symbols_package_with<B>(
    ctx: &RunContext,
    identity: &PackageIdentity,
    build: B,
) -> Result<()>
where
    B: Fn(&RunContext) -> Pipeline,
{
    let pipeline = build(ctx);
    if !ctx.symbols_enabled() {
        tracing::debug!("Symbols disabled, skipping symbols removal for {}", identity);
        return Ok(());
    }

    let visited = run_sequential(&pipeline, Operation::RemoveSymbols, identity, move |h| {
        match h.symbols().cloned() {
            Some(svc) => Step::Run(Box::pin(async move { svc.remove_symbols_package(identity).await })),
            None => Step::Skip,
        }
    })
    .await?;

    tracing::info!("Removed symbols for {} ({} services)", identity, visited);
    Ok(())
}
