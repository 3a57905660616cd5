//! Ordered collection of RPC responses for build participants
//!
//! Each RPC a participant issues is driven by its own task that pushes every
//! response, in arrival order, onto an unbounded queue and finishes the queue with
//! [`StreamItem::End`]. RPC failures never enter the queue: they are recorded in the
//! build's shared [`BuildErrors`] and the queue is closed without an end marker.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tonic::codec::Streaming;

use crate::error::Error;

/// One element of a collected response sequence
#[derive(Debug, PartialEq)]
pub enum StreamItem<T> {
    Value(T),
    /// Completion marker; follows every value queued before the RPC completed
    End,
}

/// Thread-safe, multi-producer collection of the errors recorded during one build
#[derive(Debug, Clone, Default)]
pub struct BuildErrors {
    inner: Arc<Mutex<Vec<Error>>>,
}

impl BuildErrors {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Error>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an error
    pub fn record(&self, error: Error) {
        tracing::warn!(kind = error.kind(), "Recorded build error: {}", error);
        self.lock().push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether a protocol violation has been recorded
    pub fn has_protocol_violation(&self) -> bool {
        self.lock().iter().any(|e| matches!(e, Error::Protocol(_)))
    }

    /// Move every recorded error out, leaving the collection empty
    pub fn take_all(&self) -> Vec<Error> {
        std::mem::take(&mut *self.lock())
    }
}

/// Broadcast signal used by a build to interrupt its participants
#[derive(Debug)]
pub struct InterruptHandle {
    tx: watch::Sender<bool>,
}

/// Receiving side of [`InterruptHandle`]
#[derive(Debug, Clone)]
pub struct Interrupt {
    rx: watch::Receiver<bool>,
}

impl InterruptHandle {
    pub fn new() -> (Self, Interrupt) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, Interrupt { rx })
    }

    pub fn interrupt(&self) {
        self.tx.send_replace(true);
    }
}

impl Interrupt {
    /// Interrupt that never fires
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // The receiver keeps the last value once the sender is gone.
        drop(tx);
        Self { rx }
    }

    pub fn is_interrupted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the interrupt fires. Pends forever if it never can.
    pub async fn interrupted(&mut self) {
        let closed = self.rx.wait_for(|v| *v).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

/// Push side of a collector, owned by the task driving the RPC
#[derive(Debug)]
pub struct StreamSink<T> {
    rpc: &'static str,
    tx: mpsc::UnboundedSender<StreamItem<T>>,
    errors: BuildErrors,
}

impl<T> StreamSink<T> {
    /// Queue a response value
    pub fn next(&self, value: T) {
        // A dropped collector means nobody waits for the value any more.
        let _ = self.tx.send(StreamItem::Value(value));
    }

    /// Queue the end marker
    pub fn complete(self) {
        let _ = self.tx.send(StreamItem::End);
    }

    /// Record the RPC failure and close the queue without an end marker
    pub fn fail(self, status: tonic::Status) {
        self.errors.record(Error::rpc(self.rpc, status));
    }
}

/// Pull side of a collector, drained by the participant
#[derive(Debug)]
pub struct StreamCollector<T> {
    rpc: &'static str,
    rx: mpsc::UnboundedReceiver<StreamItem<T>>,
    errors: BuildErrors,
    interrupt: Interrupt,
    driver: Option<JoinHandle<()>>,
}

/// Create a connected sink/collector pair for one RPC
pub fn channel<T>(
    rpc: &'static str,
    errors: BuildErrors,
    interrupt: Interrupt,
) -> (StreamSink<T>, StreamCollector<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = StreamSink {
        rpc,
        tx,
        errors: errors.clone(),
    };
    let collector = StreamCollector {
        rpc,
        rx,
        errors,
        interrupt,
        driver: None,
    };
    (sink, collector)
}

impl<T: Send + 'static> StreamCollector<T> {
    /// Collect the response of a unary RPC
    pub fn unary<F>(rpc: &'static str, errors: BuildErrors, interrupt: Interrupt, call: F) -> Self
    where
        F: Future<Output = Result<tonic::Response<T>, tonic::Status>> + Send + 'static,
    {
        let (sink, mut collector) = channel(rpc, errors, interrupt);
        collector.driver = Some(tokio::spawn(async move {
            match call.await {
                Ok(response) => {
                    sink.next(response.into_inner());
                    sink.complete();
                }
                Err(status) => sink.fail(status),
            }
        }));
        collector
    }

    /// Collect every message of a server-streaming RPC
    pub fn streaming<F>(
        rpc: &'static str,
        errors: BuildErrors,
        interrupt: Interrupt,
        call: F,
    ) -> Self
    where
        F: Future<Output = Result<tonic::Response<Streaming<T>>, tonic::Status>>
            + Send
            + 'static,
    {
        let (sink, mut collector) = channel(rpc, errors, interrupt);
        collector.driver = Some(tokio::spawn(async move {
            let mut stream = match call.await {
                Ok(response) => response.into_inner(),
                Err(status) => return sink.fail(status),
            };
            while let Some(message) = stream.next().await {
                match message {
                    Ok(value) => sink.next(value),
                    Err(status) => return sink.fail(status),
                }
            }
            sink.complete();
        }));
        collector
    }
}

impl<T> StreamCollector<T> {
    /// Blocking take of the next queued item
    ///
    /// Returns `Ok(None)` when the RPC failed (its error is already recorded) and
    /// `Err(Error::Interrupted)` when the build interrupted this participant.
    pub async fn take(&mut self) -> Result<Option<StreamItem<T>>, Error> {
        if self.interrupt.is_interrupted() {
            return Err(Error::Interrupted(self.rpc));
        }
        tokio::select! {
            biased;
            item = self.rx.recv() => Ok(item),
            _ = self.interrupt.interrupted() => Err(Error::Interrupted(self.rpc)),
        }
    }

    /// Drain an exchange that must yield exactly one payload followed by the end marker
    ///
    /// RPC failures and interruptions land in the shared error collection and yield
    /// `Ok(None)`. Any other sequence is a protocol violation.
    pub async fn single(mut self) -> Result<Option<T>, Error> {
        let value = match self.take().await {
            Ok(Some(StreamItem::Value(value))) => value,
            Ok(Some(StreamItem::End)) => {
                return Err(Error::Protocol(format!(
                    "{}: stream completed without a response",
                    self.rpc
                )))
            }
            Ok(None) => return Ok(None),
            Err(interrupted) => {
                self.errors.record(interrupted);
                return Ok(None);
            }
        };
        match self.take().await {
            Ok(Some(StreamItem::End)) => Ok(Some(value)),
            Ok(Some(StreamItem::Value(_))) => Err(Error::Protocol(format!(
                "{}: expected a single response, received more",
                self.rpc
            ))),
            Ok(None) => Ok(None),
            Err(interrupted) => {
                self.errors.record(interrupted);
                Ok(None)
            }
        }
    }
}

impl<T> Drop for StreamCollector<T> {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (StreamSink<String>, StreamCollector<String>, BuildErrors) {
        let errors = BuildErrors::new();
        let (sink, collector) = channel("test", errors.clone(), Interrupt::never());
        (sink, collector, errors)
    }

    #[tokio::test]
    async fn end_marker_is_not_confused_with_empty_payload() {
        let (sink, mut collector, _) = pair();
        sink.next(String::new());
        sink.complete();
        assert_eq!(collector.take().await.unwrap(), Some(StreamItem::Value(String::new())));
        assert_eq!(collector.take().await.unwrap(), Some(StreamItem::End));
    }

    #[tokio::test]
    async fn values_keep_arrival_order() {
        let (sink, mut collector, _) = pair();
        for i in 0..5 {
            sink.next(i.to_string());
        }
        sink.complete();
        for i in 0..5 {
            assert_eq!(collector.take().await.unwrap(), Some(StreamItem::Value(i.to_string())));
        }
        assert_eq!(collector.take().await.unwrap(), Some(StreamItem::End));
    }

    #[tokio::test]
    async fn single_accepts_one_payload() {
        let (sink, collector, errors) = pair();
        sink.next("pong".to_string());
        sink.complete();
        assert_eq!(collector.single().await.unwrap(), Some("pong".to_string()));
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn single_rejects_missing_payload() {
        let (sink, collector, _) = pair();
        sink.complete();
        assert!(matches!(collector.single().await, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn single_rejects_extra_payload() {
        let (sink, collector, _) = pair();
        sink.next("a".to_string());
        sink.next("b".to_string());
        sink.complete();
        assert!(matches!(collector.single().await, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn failure_goes_to_error_collection() {
        let (sink, collector, errors) = pair();
        sink.fail(tonic::Status::unavailable("gone"));
        assert_eq!(collector.single().await.unwrap(), None);
        let recorded = errors.take_all();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].kind(), "rpc");
    }

    #[tokio::test]
    async fn interruption_is_recorded() {
        let errors = BuildErrors::new();
        let (handle, interrupt) = InterruptHandle::new();
        let (_sink, collector) = channel::<String>("status", errors.clone(), interrupt);
        let waiter = tokio::spawn(collector.single());
        handle.interrupt();
        assert_eq!(waiter.await.unwrap().unwrap(), None);
        let recorded = errors.take_all();
        assert!(matches!(recorded.as_slice(), [Error::Interrupted("status")]));
    }

    #[tokio::test]
    async fn unary_driver_queues_response_then_end() {
        let errors = BuildErrors::new();
        let collector = StreamCollector::unary("unary", errors.clone(), Interrupt::never(), async {
            Ok(tonic::Response::new(7u32))
        });
        assert_eq!(collector.single().await.unwrap(), Some(7));
        assert!(errors.is_empty());
    }
}
