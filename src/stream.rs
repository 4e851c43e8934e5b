//! Pull-based topic streams
//!
//! A `TopicStream` is a forward-only, potentially infinite sequence that is
//! realized one element at a time by its single consumer:
//!
//! - subscription streams wrap the bounded queue fed by receiver workers;
//!   `next()` suspends until a worker has queued a message
//! - publication streams wrap application values, either pure (an iterator)
//!   or effectful (an iterator of futures, each awaited when demanded)
//!
//! Nothing is memoized and a stream cannot be restarted.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

type PullFuture<'a, T> = Pin<Box<dyn Future<Output = Option<T>> + Send + 'a>>;

/// One source of stream elements
trait Pull<T>: Send {
    fn pull(&mut self) -> PullFuture<'_, T>;
}

struct QueueSource<T> {
    rx: mpsc::Receiver<T>,
}

impl<T: Send + 'static> Pull<T> for QueueSource<T> {
    fn pull(&mut self) -> PullFuture<'_, T> {
        Box::pin(self.rx.recv())
    }
}

struct IterSource<I> {
    iter: I,
}

impl<T, I> Pull<T> for IterSource<I>
where
    T: Send + 'static,
    I: Iterator<Item = T> + Send,
{
    fn pull(&mut self) -> PullFuture<'_, T> {
        Box::pin(std::future::ready(self.iter.next()))
    }
}

struct EffectSource<I> {
    effects: I,
}

impl<T, F, I> Pull<T> for EffectSource<I>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
    I: Iterator<Item = F> + Send,
{
    fn pull(&mut self) -> PullFuture<'_, T> {
        // Take the next effect synchronously so a dropped pull never skips one
        let effect = self.effects.next();
        Box::pin(async move {
            match effect {
                Some(effect) => Some(effect.await),
                None => None,
            }
        })
    }
}

struct MapSource<T, F> {
    inner: Box<dyn Pull<T>>,
    f: F,
}

impl<T, U, F> Pull<U> for MapSource<T, F>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> U + Send,
{
    fn pull(&mut self) -> PullFuture<'_, U> {
        let Self { inner, f } = self;
        Box::pin(async move { inner.pull().await.map(f) })
    }
}

/// Lazily realized, single-consumer sequence of topic values
pub struct TopicStream<T> {
    source: Box<dyn Pull<T>>,
}

impl<T: Send + 'static> TopicStream<T> {
    /// Stream the contents of a queue
    ///
    /// `next()` suspends while the queue is empty and returns `None` only
    /// once every sender has been dropped.
    pub fn from_receiver(rx: mpsc::Receiver<T>) -> Self {
        Self {
            source: Box::new(QueueSource { rx }),
        }
    }

    /// Stream pure values; ends when the iterator does
    #[allow(clippy::should_implement_trait)]
    pub fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self {
            source: Box::new(IterSource {
                iter: iter.into_iter(),
            }),
        }
    }

    /// Stream the results of effects
    ///
    /// Each effect runs exactly once, in order, the first time its element
    /// is demanded. Effects are never run ahead of demand.
    pub fn from_effects<I, F>(effects: I) -> Self
    where
        I: IntoIterator<Item = F>,
        I::IntoIter: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            source: Box::new(EffectSource {
                effects: effects.into_iter(),
            }),
        }
    }

    /// Infinite stream of values produced on demand
    pub fn repeat_with<F>(f: F) -> Self
    where
        F: FnMut() -> T + Send + 'static,
    {
        Self::from_iter(std::iter::repeat_with(f))
    }

    /// Realize the next element
    pub async fn next(&mut self) -> Option<T> {
        self.source.pull().await
    }

    /// Transform every element as it is realized
    pub fn map<U, F>(self, f: F) -> TopicStream<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        TopicStream {
            source: Box::new(MapSource {
                inner: self.source,
                f,
            }),
        }
    }
}

impl<T> std::fmt::Debug for TopicStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicStream").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio_test::{assert_pending, assert_ready_eq, task};

    use super::*;

    #[tokio::test]
    async fn test_iter_stream_in_order() {
        let mut stream = TopicStream::from_iter(vec![1, 2, 3]);
        assert_eq!(stream.next().await, Some(1));
        assert_eq!(stream.next().await, Some(2));
        assert_eq!(stream.next().await, Some(3));
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn test_receiver_stream_suspends_until_queued() {
        let (tx, rx) = mpsc::channel(4);
        let mut stream = TopicStream::from_receiver(rx);

        let mut next = task::spawn(stream.next());
        assert_pending!(next.poll());

        tx.try_send(7).unwrap();
        assert!(next.is_woken());
        assert_ready_eq!(next.poll(), Some(7));
    }

    #[tokio::test]
    async fn test_effects_run_once_on_demand() {
        let runs = Arc::new(AtomicUsize::new(0));
        let effects = (0..).map({
            let runs = Arc::clone(&runs);
            move |i| {
                let runs = Arc::clone(&runs);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    i * 10
                }
            }
        });

        let mut stream = TopicStream::from_effects(effects);
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        assert_eq!(stream.next().await, Some(0));
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        assert_eq!(stream.next().await, Some(10));
        assert_eq!(stream.next().await, Some(20));
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_repeat_with_and_map() {
        let mut n = 0;
        let stream = TopicStream::repeat_with(move || {
            n += 1;
            n
        });
        let mut doubled = stream.map(|v| v * 2);

        assert_eq!(doubled.next().await, Some(2));
        assert_eq!(doubled.next().await, Some(4));
    }
}
