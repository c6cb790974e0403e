use tokio::spawn;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::models::GatewayError;
use crate::review::FraudReviewConsumer;

pub struct ReviewWorker;

impl ReviewWorker {
    /// Runs `consumer` on its own task and returns the handle that controls it.
    pub fn spawn(consumer: FraudReviewConsumer) -> ReviewWorkerHandle {
        let (stop_sender, stop_receiver) = watch::channel(false);
        let task = spawn(consumer.run(stop_receiver));

        ReviewWorkerHandle {
            stop_sender,
            task
        }
    }
}

pub struct ReviewWorkerHandle {
    stop_sender: watch::Sender<bool>,
    task: JoinHandle<Result<(), GatewayError>>
}

impl ReviewWorkerHandle {
    /// Asks the worker to stop taking records and waits for it to release its subscription.
    pub async fn stop(self) -> anyhow::Result<()> {
        debug!("Stopping review worker");

        if self.stop_sender.send(true).is_err() {
            debug!("Review worker had already exited");
        }

        self.task.await??;

        Ok(())
    }

    /// Waits for the worker to finish on its own, which happens once its subscription
    /// ends. The stop signal stays low until then.
    pub async fn join(self) -> anyhow::Result<()> {
        let ReviewWorkerHandle { stop_sender, task } = self;

        task.await??;
        drop(stop_sender);

        Ok(())
    }
}
