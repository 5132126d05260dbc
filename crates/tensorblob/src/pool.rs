use crate::Error;

/// A message that can be sent to a serialization worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// Process the chunk starting at this element.
    Chunk(usize),

    /// No more work, the worker can exit.
    Done,
}

/// Runs `process` on every chunk start using at most `max_workers` threads.
///
/// Returns once every worker has been joined. The first failure is reported and the chunks not
/// yet started are skipped.
#[cfg(not(target_family = "wasm"))]
pub fn run_chunks<I, F>(starts: I, max_workers: usize, process: F) -> Result<(), Error>
where
    I: IntoIterator<Item = usize>,
    F: Fn(usize) -> Result<(), Error> + Sync,
{
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, PoisonError, mpsc};
    use std::thread;

    let (sender, receiver) = mpsc::channel::<Message>();
    let mut num_chunks = 0;
    for begin in starts {
        // The receiver lives until the end of this function.
        let _ = sender.send(Message::Chunk(begin));
        num_chunks += 1;
    }

    let num_workers = max_workers.clamp(1, num_chunks.max(1));
    for _ in 0..num_workers {
        let _ = sender.send(Message::Done);
    }
    drop(sender);

    let receiver = Mutex::new(receiver);
    let failed = AtomicBool::new(false);

    let worker = || -> Result<(), Error> {
        loop {
            let message = receiver
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .recv();

            match message {
                Ok(Message::Chunk(begin)) => {
                    if failed.load(Ordering::Relaxed) {
                        continue;
                    }
                    if let Err(err) = process(begin) {
                        failed.store(true, Ordering::Relaxed);
                        return Err(err);
                    }
                }
                Ok(Message::Done) | Err(_) => return Ok(()),
            }
        }
    };

    log::trace!("Serializing {num_chunks} chunks on {num_workers} workers");

    thread::scope(|scope| {
        let handles: Vec<_> = (0..num_workers).map(|_| scope.spawn(&worker)).collect();

        let mut result = Ok(());
        for handle in handles {
            let outcome = handle
                .join()
                .unwrap_or_else(|_| Err(Error::Worker("a serialization worker panicked".into())));
            if result.is_ok() {
                result = outcome;
            }
        }
        result
    })
}

/// Runs `process` on every chunk start on the calling thread.
#[cfg(target_family = "wasm")]
pub fn run_chunks<I, F>(starts: I, _max_workers: usize, process: F) -> Result<(), Error>
where
    I: IntoIterator<Item = usize>,
    F: Fn(usize) -> Result<(), Error> + Sync,
{
    starts.into_iter().try_for_each(process)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn processes_every_chunk_once() {
        let seen = Mutex::new(Vec::new());

        run_chunks((0..100).step_by(10), 4, |begin| {
            seen.lock().unwrap().push(begin);
            Ok(())
        })
        .unwrap();

        let mut seen = seen.into_inner().unwrap();
        seen.sort();
        assert_eq!(seen, (0..100).step_by(10).collect::<Vec<_>>());
    }

    #[test]
    fn reports_chunk_failure() {
        let result = run_chunks(0..8, 3, |begin| {
            if begin == 5 {
                Err(Error::InvalidChunkSize)
            } else {
                Ok(())
            }
        });

        assert!(matches!(result, Err(Error::InvalidChunkSize)));
    }

    #[test]
    fn worker_panic_is_an_error() {
        let result = run_chunks(0..2, 2, |begin| {
            if begin == 1 {
                panic!("boom");
            }
            Ok(())
        });

        assert!(matches!(result, Err(Error::Worker(_))));
    }

    #[test]
    fn zero_workers_still_runs() {
        let count = Mutex::new(0);

        run_chunks(0..3, 0, |_| {
            *count.lock().unwrap() += 1;
            Ok(())
        })
        .unwrap();

        assert_eq!(count.into_inner().unwrap(), 3);
    }
}
