use parking_lot::ReentrantMutex;

use super::{Chain, FileSystemInterceptor, OperationResult};

/// Serializes every operation of the filesystem.
///
/// The lock is reentrant so an operation issued from inside another one on
/// the same thread does not deadlock.
#[derive(Debug, Default)]
pub struct GlobalLockInterceptor {
    lock: ReentrantMutex<()>,
}

impl GlobalLockInterceptor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileSystemInterceptor for GlobalLockInterceptor {
    fn intercept(&self, chain: Chain<'_>) -> OperationResult {
        let _guard = self.lock.lock();
        chain.proceed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::op::{Readlink, ReadlinkInput};
    use crate::path::{BaseDirectory, VirtualPath};
    use crate::pipeline::{Executor, Pipeline};

    #[test]
    fn operations_do_not_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let executor = {
            let active = active.clone();
            let max_seen = max_seen.clone();
            Executor::builder()
                .register::<Readlink, _>(move |input| {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(std::time::Duration::from_millis(2));
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(input.path.to_string())
                })
                .build()
        };
        let pipeline = Arc::new(Pipeline::new(
            vec![Arc::new(GlobalLockInterceptor::new())],
            executor,
        ));

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let pipeline = pipeline.clone();
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        pipeline
                            .execute::<Readlink>(ReadlinkInput {
                                path: VirtualPath::create("a").unwrap(),
                                base_directory: BaseDirectory::None,
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
