//! One-input, many-output fan-out stage.
//!
//! [`rollover`] splits a stream into a fixed number of output handles and
//! delivers the full element sequence to exactly one "active" output at a
//! time, starting with the first. Dropping the active output advances
//! delivery to the next output that is still alive; the tail of the input
//! continues there. Protocol phases map onto this directly: the SSL
//! negotiation consumer takes the first reply, drops its handle, and the
//! authentication consumer picks up the stream where it left off.
//!
//! Elements are pulled from upstream only inside the active output's poll,
//! so nothing is produced without downstream demand and a handle dropped
//! between polls cannot lose an element that was never requested. Demand
//! from a not-yet-active output is remembered and honored the moment it
//! becomes active. When the input finishes, every remaining output
//! finishes; when the last output is dropped, the input is dropped too.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use futures::stream::Stream;

struct Shared<S: Stream> {
    // dropped on upstream finish or once every output is gone
    upstream: Option<S>,
    finished: bool,
    active: usize,
    cancelled: Vec<bool>,
    // retained demand of outputs waiting for their turn
    wakers: Vec<Option<Waker>>,
}

/// Split `upstream` into `outputs` sequential consumers.
///
/// # Panics
///
/// Panics when `outputs` is zero.
pub fn rollover<S>(upstream: S, outputs: usize) -> Vec<RolloverOutput<S>>
where
    S: Stream + Unpin,
{
    assert!(outputs > 0, "rollover requires at least one output");

    let shared = Arc::new(Mutex::new(Shared {
        upstream: Some(upstream),
        finished: false,
        active: 0,
        cancelled: vec![false; outputs],
        wakers: (0..outputs).map(|_| None).collect(),
    }));

    (0..outputs)
        .map(|index| RolloverOutput {
            index,
            shared: shared.clone(),
        })
        .collect()
}

/// One consumer handle of a [`rollover`] stage. Dropping it cancels this
/// output's position in the sequence.
pub struct RolloverOutput<S: Stream> {
    index: usize,
    shared: Arc<Mutex<Shared<S>>>,
}

impl<S> Stream for RolloverOutput<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let mut shared = this.shared.lock().unwrap();

        if shared.cancelled[this.index] || shared.finished {
            return Poll::Ready(None);
        }

        if shared.active != this.index {
            // not our turn yet, keep the demand
            shared.wakers[this.index] = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let Some(upstream) = shared.upstream.as_mut() else {
            return Poll::Ready(None);
        };

        match Pin::new(upstream).poll_next(cx) {
            Poll::Ready(Some(element)) => Poll::Ready(Some(element)),
            Poll::Ready(None) => {
                shared.finished = true;
                shared.upstream = None;
                // complete every output that is still waiting
                for waker in shared.wakers.iter_mut() {
                    if let Some(waker) = waker.take() {
                        waker.wake();
                    }
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S: Stream> Drop for RolloverOutput<S> {
    fn drop(&mut self) {
        let mut shared = self.shared.lock().unwrap();

        if shared.cancelled[self.index] {
            return;
        }
        shared.cancelled[self.index] = true;
        shared.wakers[self.index] = None;

        if shared.active != self.index {
            return;
        }

        let next = (self.index + 1..shared.cancelled.len()).find(|&j| !shared.cancelled[j]);
        match next {
            Some(next) => {
                shared.active = next;
                tracing::debug!(output = next, "rollover advanced to next output");
                if let Some(waker) = shared.wakers[next].take() {
                    waker.wake();
                }
            }
            None => {
                // no outputs left, cancel upstream
                shared.finished = true;
                shared.upstream = None;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicBool, Ordering};

    use futures::executor::block_on;
    use futures::stream::{self, StreamExt};
    use futures::task::noop_waker_ref;

    use super::*;

    #[test]
    fn test_next_output_takes_over_on_cancel() {
        let mut outputs = rollover(stream::iter([1, 2]), 2).into_iter();
        let mut first = outputs.next().unwrap();
        let mut second = outputs.next().unwrap();

        assert_eq!(block_on(first.next()), Some(1));
        drop(first);

        assert_eq!(block_on(second.next()), Some(2));
        assert_eq!(block_on(second.next()), None);
    }

    #[test]
    fn test_cancelled_output_is_skipped() {
        let mut outputs = rollover(stream::iter([1, 2]), 3).into_iter();
        let mut first = outputs.next().unwrap();
        let second = outputs.next().unwrap();
        let mut third = outputs.next().unwrap();

        // middle output gives up before pulling anything
        drop(second);

        assert_eq!(block_on(first.next()), Some(1));
        drop(first);

        assert_eq!(block_on(third.next()), Some(2));
        assert_eq!(block_on(third.next()), None);
    }

    #[test]
    fn test_early_demand_is_retained() {
        let mut outputs = rollover(stream::iter([1, 2]), 2).into_iter();
        let mut first = outputs.next().unwrap();
        let mut second = outputs.next().unwrap();

        // second pulls before its turn: no element may be produced
        let mut cx = Context::from_waker(noop_waker_ref());
        assert!(Pin::new(&mut second).poll_next(&mut cx).is_pending());

        assert_eq!(block_on(first.next()), Some(1));
        drop(first);

        // now the retained demand is honored
        assert_eq!(
            Pin::new(&mut second).poll_next(&mut cx),
            Poll::Ready(Some(2))
        );
    }

    #[test]
    fn test_upstream_finish_completes_all_outputs() {
        let mut outputs = rollover(stream::iter([1]), 2).into_iter();
        let mut first = outputs.next().unwrap();
        let mut second = outputs.next().unwrap();

        assert_eq!(block_on(first.next()), Some(1));
        assert_eq!(block_on(first.next()), None);

        // second was never active but completes as well
        assert_eq!(block_on(second.next()), None);
    }

    #[test]
    fn test_upstream_dropped_when_all_outputs_cancel() {
        struct DropProbe<S> {
            inner: S,
            dropped: Arc<AtomicBool>,
        }

        impl<S: Stream + Unpin> Stream for DropProbe<S> {
            type Item = S::Item;

            fn poll_next(
                self: Pin<&mut Self>,
                cx: &mut Context<'_>,
            ) -> Poll<Option<Self::Item>> {
                Pin::new(&mut self.get_mut().inner).poll_next(cx)
            }
        }

        impl<S> Drop for DropProbe<S> {
            fn drop(&mut self) {
                self.dropped.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let probe = DropProbe {
            inner: stream::iter([1, 2, 3]),
            dropped: dropped.clone(),
        };

        let mut outputs = rollover(probe, 2).into_iter();
        let mut first = outputs.next().unwrap();
        let second = outputs.next().unwrap();

        assert_eq!(block_on(first.next()), Some(1));
        drop(first);
        assert!(!dropped.load(Ordering::SeqCst));

        drop(second);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_elements_split_without_loss_or_duplication() {
        let mut outputs = rollover(stream::iter(1..=5), 2).into_iter();
        let mut first = outputs.next().unwrap();
        let mut second = outputs.next().unwrap();

        let mut seen = Vec::new();
        seen.push(block_on(first.next()).unwrap());
        seen.push(block_on(first.next()).unwrap());
        drop(first);

        while let Some(element) = block_on(second.next()) {
            seen.push(element);
        }

        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }
}
