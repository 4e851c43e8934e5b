//! In-memory transport for unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::stream::TopicStream;
use crate::transport::{ServeContext, ServeHandle, TopicDescriptor, Transport};

type FrameSource = Box<dyn Fn() -> TopicStream<Bytes> + Send + Sync>;

/// Records every connection attempt and serve call
pub(crate) struct MockTransport {
    frames: Option<FrameSource>,
    fail_connect: bool,
    opened: Mutex<Vec<String>>,
    served: Mutex<HashMap<String, TopicStream<Bytes>>>,
    cleanups: Arc<AtomicUsize>,
    next_port: AtomicU16,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            frames: None,
            fail_connect: false,
            opened: Mutex::new(Vec::new()),
            served: Mutex::new(HashMap::new()),
            cleanups: Arc::new(AtomicUsize::new(0)),
            next_port: AtomicU16::new(40000),
        }
    }
}

impl MockTransport {
    /// Every publisher connection streams the frames produced by `source`
    pub(crate) fn with_frames(
        source: impl Fn() -> TopicStream<Bytes> + Send + Sync + 'static,
    ) -> Self {
        Self {
            frames: Some(Box::new(source)),
            ..Default::default()
        }
    }

    /// Every publisher connection fails
    pub(crate) fn failing() -> Self {
        Self {
            fail_connect: true,
            ..Default::default()
        }
    }

    /// Addresses passed to `open_receive_stream`, in call order
    pub(crate) fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    /// Take the frame stream handed to `serve` for `topic`
    pub(crate) fn take_served(&self, topic: &str) -> Option<TopicStream<Bytes>> {
        self.served.lock().unwrap().remove(topic)
    }

    /// Number of cleanup actions run
    pub(crate) fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    async fn open_receive_stream(
        &self,
        address: &str,
        _topic: &TopicDescriptor,
    ) -> Result<TopicStream<Bytes>> {
        self.opened.lock().unwrap().push(address.to_string());
        if self.fail_connect {
            return Err(Error::Protocol("connection refused".into()));
        }

        Ok(match &self.frames {
            Some(source) => source(),
            None => TopicStream::from_iter(std::iter::empty()),
        })
    }

    async fn serve(&self, ctx: ServeContext, frames: TopicStream<Bytes>) -> Result<ServeHandle> {
        let port = self.next_port.fetch_add(1, Ordering::SeqCst);
        self.served
            .lock()
            .unwrap()
            .insert(ctx.descriptor.topic.clone(), frames);

        let cleanups = Arc::clone(&self.cleanups);
        Ok(ServeHandle::new(port, move || {
            cleanups.fetch_add(1, Ordering::SeqCst);
        }))
    }
}
