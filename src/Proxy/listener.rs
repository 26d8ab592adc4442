use lazy_static::lazy_static;
use std::sync::Arc;

/// Told about every call on a proxy, on the calling thread.
///
/// `on_pre_publish` fires for every call, `on_post_publish` only for calls
/// that made it into the ring buffer.
pub trait MessagePublicationListener: Send + Sync {
    fn on_pre_publish(&self);
    fn on_post_publish(&self);
}

/// Told when a call is discarded because no slot could be claimed.
pub trait DropListener: Send + Sync {
    fn on_drop(&self);
}

/// Implemented by backing implementations that want the size of each batch,
/// reported on the consumer thread after the batch's last call.
pub trait BatchSizeListener {
    fn on_end_of_batch(&mut self, batch_size: usize);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoMessagePublicationListener;

impl MessagePublicationListener for NoMessagePublicationListener {
    fn on_pre_publish(&self) {}

    fn on_post_publish(&self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpDropListener;

impl DropListener for NoOpDropListener {
    fn on_drop(&self) {}
}

lazy_static! {
    static ref NO_PUBLICATION_LISTENER: Arc<dyn MessagePublicationListener> =
        Arc::new(NoMessagePublicationListener);
    static ref NO_DROP_LISTENER: Arc<dyn DropListener> = Arc::new(NoOpDropListener);
}

/// Shared no-op publication listener.
pub fn no_publication_listener() -> Arc<dyn MessagePublicationListener> {
    NO_PUBLICATION_LISTENER.clone()
}

/// Shared no-op drop listener.
pub fn no_drop_listener() -> Arc<dyn DropListener> {
    NO_DROP_LISTENER.clone()
}
