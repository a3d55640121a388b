use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::location::TrackPoint;
use crate::store::Storage;

/// Destination for accepted points. Submitting must not block the caller.
pub trait PointSink: Send {
    fn submit(&self, point: TrackPoint);
}

/// Hands points to a background task that appends them to the store.
#[derive(Clone)]
pub struct PointWriter {
    tx: mpsc::UnboundedSender<TrackPoint>,
}

impl PointWriter {
    /// The task ends once every `PointWriter` clone has been dropped and
    /// the queue is drained.
    pub fn spawn(storage: Arc<Storage>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<TrackPoint>();

        let join = tokio::spawn(async move {
            while let Some(point) = rx.recv().await {
                let storage = storage.clone();
                let result = tokio::task::spawn_blocking(move || storage.insert(point)).await;
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => log::info!("failed to save location: {}", e),
                    Err(e) => log::info!("location writer task failed: {}", e),
                }
            }
            log::debug!("point writer stopped");
        });

        (Self { tx }, join)
    }
}

impl PointSink for PointWriter {
    fn submit(&self, point: TrackPoint) {
        if self.tx.send(point).is_err() {
            log::info!("point writer closed, dropping point at {}", point.timestamp);
        }
    }
}

/// Waits for a writer task to store every queued point. Call after the last
/// `PointWriter` clone is gone.
pub async fn drain(task: JoinHandle<()>) -> bool {
    match task.await {
        Ok(()) => true,
        Err(e) => {
            log::error!("point writer task failed, queued points may be lost: {}", e);
            false
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LocationSample;

    #[tokio::test]
    async fn writer_drains_into_store_after_senders_drop() {
        let storage = Arc::new(Storage::in_memory());
        let (writer, join) = PointWriter::spawn(storage.clone());

        for t in [3.0, 1.0, 2.0] {
            writer.submit(TrackPoint::from(LocationSample::at(t, 0.0, 0.0)));
        }
        drop(writer);
        join.await.unwrap();

        let stored: Vec<f64> = storage
            .points_in_range(0.0, 10.0)
            .iter()
            .map(|p| p.timestamp)
            .collect();
        assert_eq!(stored, vec![1.0, 2.0, 3.0]);
    }
}
