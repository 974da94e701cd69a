//! 编排层测试用的假服务：记录调用、可注入延迟与失败、幂等的内存状态。

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{PackageIdentity, PackageInput, RunContext};
use crate::error::{FeedError, Result};
use crate::index::{IndexHandle, IndexService, Pipeline, ServiceKind, SymbolsCapability};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Add,
    Remove,
    Fetch,
    AddSymbols,
    RemoveSymbols,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Start,
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Call {
    pub kind: ServiceKind,
    pub method: Method,
    pub phase: Phase,
}

/// 多个假服务共享的调用日志
#[derive(Default)]
pub struct CallLog {
    events: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl CallLog {
    fn enter(&self, kind: ServiceKind, method: Method) {
        self.events.lock().push(Call {
            kind,
            method,
            phase: Phase::Start,
        });
        let n = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(n, Ordering::SeqCst);
    }

    fn exit(&self, kind: ServiceKind, method: Method) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().push(Call {
            kind,
            method,
            phase: Phase::End,
        });
    }

    pub fn events(&self) -> Vec<Call> {
        self.events.lock().clone()
    }

    /// 按开始顺序列出的调用
    pub fn started(&self) -> Vec<(ServiceKind, Method)> {
        self.events
            .lock()
            .iter()
            .filter(|c| c.phase == Phase::Start)
            .map(|c| (c.kind, c.method))
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// 每个 Start 紧跟同一服务的 End
    pub fn strictly_sequential(&self) -> bool {
        let events = self.events();
        events.len() % 2 == 0
            && events.chunks(2).all(|pair| {
                pair[0].phase == Phase::Start
                    && pair[1].phase == Phase::End
                    && pair[0].kind == pair[1].kind
                    && pair[0].method == pair[1].method
            })
    }

    /// 所有 Start 都出现在第一个 End 之前（全部并发在途）
    pub fn all_started_before_any_finished(&self) -> bool {
        let events = self.events();
        match events.iter().position(|c| c.phase == Phase::End) {
            None => true,
            Some(first_end) => events[first_end..].iter().all(|c| c.phase == Phase::End),
        }
    }
}

pub struct FakeService {
    kind: ServiceKind,
    log: Arc<CallLog>,
    delay: Duration,
    fail_on: Option<Method>,
    calls: AtomicUsize,
    packages: Mutex<BTreeSet<PackageIdentity>>,
    symbols_packages: Mutex<BTreeSet<PackageIdentity>>,
}

impl FakeService {
    pub fn new(kind: ServiceKind, log: Arc<CallLog>) -> Self {
        Self {
            kind,
            log,
            delay: Duration::ZERO,
            fail_on: None,
            calls: AtomicUsize::new(0),
            packages: Mutex::new(BTreeSet::new()),
            symbols_packages: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_on(mut self, method: Method) -> Self {
        self.fail_on = Some(method);
        self
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn packages(&self) -> Vec<PackageIdentity> {
        self.packages.lock().iter().cloned().collect()
    }

    pub fn symbols_packages(&self) -> Vec<PackageIdentity> {
        self.symbols_packages.lock().iter().cloned().collect()
    }

    async fn call(&self, method: Method) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.enter(self.kind, method);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.log.exit(self.kind, method);

        if self.fail_on == Some(method) {
            return Err(FeedError::storage(
                format!("fake/{}", self.kind),
                std::io::Error::new(std::io::ErrorKind::Other, "injected failure"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl IndexService for FakeService {
    fn kind(&self) -> ServiceKind {
        self.kind
    }

    async fn add_package(&self, package: &PackageInput) -> Result<()> {
        self.call(Method::Add).await?;
        self.packages.lock().insert(package.identity.clone());
        Ok(())
    }

    async fn remove_package(&self, identity: &PackageIdentity) -> Result<()> {
        self.call(Method::Remove).await?;
        self.packages.lock().remove(identity);
        Ok(())
    }

    async fn fetch(&self) -> Result<()> {
        self.call(Method::Fetch).await
    }
}

#[async_trait]
impl SymbolsCapability for FakeService {
    async fn add_symbols_package(&self, package: &PackageInput) -> Result<()> {
        self.call(Method::AddSymbols).await?;
        self.symbols_packages.lock().insert(package.identity.clone());
        Ok(())
    }

    async fn remove_symbols_package(&self, identity: &PackageIdentity) -> Result<()> {
        self.call(Method::RemoveSymbols).await?;
        self.symbols_packages.lock().remove(identity);
        Ok(())
    }
}

/// 固定 handle 列表的 pipeline 工厂（每次调用都产出新的 Pipeline）
pub fn pipeline_of(handles: Vec<IndexHandle>) -> impl Fn(&RunContext) -> Pipeline {
    move |_ctx: &RunContext| Pipeline::new(handles.clone())
}

/// 同 `pipeline_of`，另外返回构建次数计数器
pub fn counting_pipeline_of(
    handles: Vec<IndexHandle>,
) -> (Arc<AtomicUsize>, impl Fn(&RunContext) -> Pipeline) {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let build = move |_ctx: &RunContext| {
        counter.fetch_add(1, Ordering::SeqCst);
        Pipeline::new(handles.clone())
    };
    (builds, build)
}
