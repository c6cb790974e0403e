mod review_worker;

pub use review_worker::{ReviewWorker, ReviewWorkerHandle};
