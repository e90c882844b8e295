use std::fmt::Debug;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub trait BroadcastReceiverExt<T>
where
    T: Debug + Clone + Send + 'static,
{
    /// Spawns a Tokio task which calls `rx.recv()`
    /// in a loop, passing the message to `f`.
    ///
    /// The task ends once every sender has been dropped.
    fn recv_spawn<F>(self, f: F) -> JoinHandle<()>
    where
        F: FnMut(T) + Send + 'static;
}

impl<T> BroadcastReceiverExt<T> for broadcast::Receiver<T>
where
    T: Debug + Clone + Send + 'static,
{
    fn recv_spawn<F>(mut self, mut f: F) -> JoinHandle<()>
    where
        F: FnMut(T) + Send + 'static,
    {
        tokio::spawn(async move {
            loop {
                match self.recv().await {
                    Ok(val) => f(val),
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        tracing::warn!(
                            "Channel lagged behind by {count}, this may result in unexpected or broken behaviour"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
