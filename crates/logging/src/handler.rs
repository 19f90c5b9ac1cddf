// SPDX-License-Identifier: MIT

//! Handler trait and fan-out composition (spec §4.15: "each record
//! visits all child handlers").

use std::sync::Arc;

use crate::record::LogRecord;

/// A single logging sink. `handle` must not panic — a misbehaving
/// handler should drop the record rather than take the rest of the
/// fan-out down with it.
pub trait Handler: Send + Sync {
    fn handle(&self, record: &LogRecord);
}

impl<T: Handler + ?Sized> Handler for Arc<T> {
    fn handle(&self, record: &LogRecord) {
        (**self).handle(record)
    }
}

/// Visits every child handler in registration order for every record.
pub struct FanOutHandler {
    handlers: Vec<Box<dyn Handler>>,
}

impl FanOutHandler {
    pub fn new(handlers: Vec<Box<dyn Handler>>) -> Self {
        FanOutHandler { handlers }
    }
}

impl Handler for FanOutHandler {
    fn handle(&self, record: &LogRecord) {
        for handler in &self.handlers {
            handler.handle(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordKind;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct CountingHandler(Arc<Mutex<usize>>);

    impl Handler for CountingHandler {
        fn handle(&self, _record: &LogRecord) {
            *self.0.lock() += 1;
        }
    }

    fn record() -> LogRecord {
        LogRecord {
            level: tracing::Level::INFO,
            target: "t".to_string(),
            kind: RecordKind::Generic,
            message: None,
            fields: Vec::new(),
            deferred: Vec::new(),
            slack_requested: false,
        }
    }

    #[test]
    fn every_registered_handler_sees_every_record() {
        let a = Arc::new(Mutex::new(0));
        let b = Arc::new(Mutex::new(0));
        let fanout = FanOutHandler::new(vec![
            Box::new(CountingHandler(a.clone())),
            Box::new(CountingHandler(b.clone())),
        ]);
        fanout.handle(&record());
        fanout.handle(&record());
        assert_eq!(*a.lock(), 2);
        assert_eq!(*b.lock(), 2);
    }
}
