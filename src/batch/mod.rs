//! Sequential batch runner.
//!
//! Items are processed strictly one after another in input order. Every item
//! ends up either succeeded or failed; one failure never stops the batch.
//! Progress is exposed as a stream of [`BatchEvent`]s so the presentation
//! layer decides how to render it.

use futures_util::stream::{self, Stream, StreamExt};
use std::future::Future;

/// A finished item that produced an artifact
#[derive(Debug, Clone, PartialEq)]
pub struct Success<T, A> {
    pub item: T,
    pub artifact: A,
}

/// A finished item that failed, with the error text
#[derive(Debug, Clone, PartialEq)]
pub struct Failure<T> {
    pub item: T,
    pub message: String,
}

/// Per-item result
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome<T, A> {
    Succeeded(Success<T, A>),
    Failed(Failure<T>),
}

/// Aggregate of a batch run
#[derive(Debug, Clone, PartialEq)]
pub struct Tally<T, A> {
    pub succeeded: Vec<Success<T, A>>,
    pub failed: Vec<Failure<T>>,
}

impl<T, A> Default for Tally<T, A> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T, A> Tally<T, A> {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    fn record(&mut self, outcome: ItemOutcome<T, A>) {
        match outcome {
            ItemOutcome::Succeeded(success) => self.succeeded.push(success),
            ItemOutcome::Failed(failure) => self.failed.push(failure),
        }
    }
}

/// Progress of a batch run
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent<T, A> {
    Started { total: usize },
    /// `index` is 1-based
    ItemStarted { index: usize, total: usize, item: T },
    ItemFinished { index: usize, total: usize, outcome: ItemOutcome<T, A> },
    Finished(Tally<T, A>),
}

enum Phase<T> {
    Start,
    Next,
    Running(T),
    Done,
}

struct RunState<I, F, T, A> {
    items: I,
    op: F,
    index: usize,
    total: usize,
    tally: Tally<T, A>,
    phase: Phase<T>,
}

/// Lazily run `op` over `items`, yielding progress events.
///
/// The stream yields `Started`, then `ItemStarted`/`ItemFinished` per item,
/// and ends with `Finished` carrying the tally. An item's operation only runs
/// when the consumer polls past its `ItemStarted` event.
pub fn events<T, A, F, Fut>(items: Vec<T>, op: F) -> impl Stream<Item = BatchEvent<T, A>>
where
    T: Clone,
    A: Clone,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = anyhow::Result<A>>,
{
    let state = RunState {
        total: items.len(),
        items: items.into_iter(),
        op,
        index: 0,
        tally: Tally::default(),
        phase: Phase::Start,
    };

    stream::unfold(state, |mut state| async move {
        match std::mem::replace(&mut state.phase, Phase::Done) {
            Phase::Start => {
                state.phase = Phase::Next;
                let total = state.total;
                Some((BatchEvent::Started { total }, state))
            }
            Phase::Next => match state.items.next() {
                Some(item) => {
                    state.index += 1;
                    state.phase = Phase::Running(item.clone());
                    let event = BatchEvent::ItemStarted {
                        index: state.index,
                        total: state.total,
                        item,
                    };
                    Some((event, state))
                }
                None => {
                    let tally = std::mem::take(&mut state.tally);
                    state.phase = Phase::Done;
                    Some((BatchEvent::Finished(tally), state))
                }
            },
            Phase::Running(item) => {
                let outcome = match (state.op)(item.clone()).await {
                    Ok(artifact) => ItemOutcome::Succeeded(Success { item, artifact }),
                    Err(e) => {
                        tracing::warn!("Batch item {}/{} failed: {:#}", state.index, state.total, e);
                        ItemOutcome::Failed(Failure {
                            item,
                            message: format!("{:#}", e),
                        })
                    }
                };
                state.tally.record(outcome.clone());
                state.phase = Phase::Next;
                let event = BatchEvent::ItemFinished {
                    index: state.index,
                    total: state.total,
                    outcome,
                };
                Some((event, state))
            }
            Phase::Done => None,
        }
    })
}

/// Run the batch to completion, feeding every event to `on_event`, and return
/// the tally
pub async fn run<T, A, F, Fut>(
    items: Vec<T>,
    op: F,
    mut on_event: impl FnMut(&BatchEvent<T, A>),
) -> Tally<T, A>
where
    T: Clone,
    A: Clone,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = anyhow::Result<A>>,
{
    let stream = events(items, op);
    futures_util::pin_mut!(stream);

    let mut tally = Tally::default();
    while let Some(event) = stream.next().await {
        on_event(&event);
        if let BatchEvent::Finished(finished) = event {
            tally = finished;
        }
    }
    tally
}
