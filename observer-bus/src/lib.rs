//! Generic Observer Bus
//!
//! A small, reusable publish/subscribe primitive. A [`Subject`] holds a list
//! of observers and fans a value out to all of them synchronously, in
//! attachment order.
//!
//! # Features
//!
//! - **Typed payloads**: one `Subject<T>` per event stream
//! - **Attachment-order delivery**: observers run in the order they attached
//! - **Handler isolation**: a panicking observer never blocks the rest
//! - **No buffering**: observers attached after a `notify` never see it
//!
//! # Quick Start
//!
//! ```rust
//! use observer_bus::Subject;
//! use std::sync::{Arc, Mutex};
//!
//! let subject = Subject::<String>::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = Arc::clone(&seen);
//! let id = subject.attach(move |value: &String| {
//!     sink.lock().unwrap().push(value.clone());
//! });
//!
//! subject.notify(&"hello".to_string());
//! assert_eq!(seen.lock().unwrap().len(), 1);
//!
//! // Detach by the id returned from attach
//! assert!(subject.detach(id));
//! ```

pub mod subject;

pub use subject::{Subject, SubscriptionId};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::subject::{Subject, SubscriptionId};
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_full_workflow() {
        let subject = Subject::<u32>::new();
        let count = Arc::new(AtomicUsize::new(0));

        let sink = Arc::clone(&count);
        let id = subject.attach(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        subject.notify(&1);
        subject.notify(&2);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        assert!(subject.detach(id));
        subject.notify(&3);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_multiple_subjects_are_independent() {
        let numbers = Subject::<u32>::new();
        let words = Subject::<String>::new();

        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        numbers.attach(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        words.notify(&"nothing listens here".to_string());
        assert_eq!(count.load(Ordering::SeqCst), 0);

        numbers.notify(&7);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
