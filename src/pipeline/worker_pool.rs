use std::sync::Arc;
use tokio::task::JoinError;

/// Bounded fan-out of CPU-bound work onto tokio's blocking threads.
///
/// Items are split into at most `size` contiguous chunks, one blocking task
/// per chunk, and results are concatenated in chunk order, so output order
/// always matches input order.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub async fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Result<Vec<R>, JoinError>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let total = items.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let f = Arc::new(f);
        let chunk_size = (total + self.size - 1) / self.size;
        let mut handles = Vec::with_capacity(self.size);
        let mut items = items.into_iter();
        loop {
            let chunk: Vec<T> = items.by_ref().take(chunk_size).collect();
            if chunk.is_empty() {
                break;
            }
            let f = Arc::clone(&f);
            handles.push(tokio::task::spawn_blocking(move || {
                chunk.into_iter().map(|item| f(item)).collect::<Vec<R>>()
            }));
        }

        let mut results = Vec::with_capacity(total);
        for handle in handles {
            results.extend(handle.await?);
        }
        Ok(results)
    }
}
