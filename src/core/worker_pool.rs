//! 有界工作池：个体评估之间相互独立（沙箱不相交），用 Semaphore 限制同时运行的子进程数
//!
//! `run_all` 在全部任务完成后才返回，且结果按提交顺序排列；
//! 这保证了 SortByFitness / CapPopulation 之前所有适应度都已就绪。

use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;

/// 评估工作池（默认并发 4）
#[derive(Clone, Debug)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(max_concurrent: usize) -> Self {
        let size = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// 并发执行所有任务（至多 size 个同时进行），按提交顺序收集结果
    pub async fn run_all<I, F, T>(&self, jobs: I) -> Vec<T>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = T>,
    {
        let semaphore = &self.semaphore;
        join_all(jobs.into_iter().map(|job| async move {
            // Semaphore 由池自身持有且从不 close，acquire 不会失败
            let _permit = semaphore.acquire().await.ok();
            job.await
        }))
        .await
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(4)
    }
}
