//! Fan-out task group with first-error cancellation.

use std::future::Future;

use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Reported by a task that stopped because its scope was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("task cancelled")]
pub struct Cancelled;

/// Value slot filled by one task of a [`TaskGroup`].
#[derive(Debug)]
pub struct TaskOutput<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> TaskOutput<T> {
    /// Takes the value once the group has completed successfully.
    pub fn take(mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }
}

/// Runs futures concurrently. The first failure cancels the siblings and is
/// returned once every task has stopped.
pub struct TaskGroup<E> {
    tasks: JoinSet<Result<(), E>>,
    token: CancellationToken,
}

impl<E> TaskGroup<E>
where
    E: From<tokio::task::JoinError> + From<Cancelled> + Send + 'static,
{
    /// Cancelling `parent` cancels every task of the group.
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            tasks: JoinSet::new(),
            token: parent.child_token(),
        }
    }

    pub fn spawn<T, F>(&mut self, task: F) -> TaskOutput<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let token = self.token.clone();

        self.tasks.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(E::from(Cancelled)),
                outcome = task => {
                    let value = outcome?;
                    let _ = sender.send(value);
                    Ok(())
                }
            }
        });

        TaskOutput { receiver }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub async fn wait(mut self) -> Result<(), E> {
        let mut first_error = None;

        while let Some(joined) = self.tasks.join_next().await {
            let outcome = joined.map_err(E::from).and_then(|result| result);
            if let Err(err) = outcome {
                if first_error.is_none() {
                    self.token.cancel();
                    first_error = Some(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
