use std::sync::{Arc, Mutex};

use sentry::protocol::Event;
use sentry::{ClientInitGuard, ClientOptions};
use uuid::Uuid;

use crate::error::TransportError;

/// The client runtime that owns delivery: queueing, retries, TLS and the wire
/// protocol all live behind this trait.
pub trait EventTransport {
    fn init(&self, options: ClientOptions) -> Result<(), TransportError>;
    fn capture(&self, event: Event<'static>) -> Result<Uuid, TransportError>;
    fn close(&self) -> Result<(), TransportError>;
}

impl<T: EventTransport + ?Sized> EventTransport for Arc<T> {
    fn init(&self, options: ClientOptions) -> Result<(), TransportError> {
        (**self).init(options)
    }

    fn capture(&self, event: Event<'static>) -> Result<Uuid, TransportError> {
        (**self).capture(event)
    }

    fn close(&self) -> Result<(), TransportError> {
        (**self).close()
    }
}

/// Transport backed by the process-wide `sentry` client.
///
/// The guard returned by `sentry::init` is kept until [`EventTransport::close`],
/// and dropping it flushes pending events within the configured shutdown
/// timeout.
#[derive(Default)]
pub struct SentryTransport {
    guard: Mutex<Option<ClientInitGuard>>,
}

impl SentryTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventTransport for SentryTransport {
    fn init(&self, options: ClientOptions) -> Result<(), TransportError> {
        let mut slot = self.guard.lock().map_err(|_| TransportError::Poisoned)?;

        // sentry::init would fill a missing DSN from SENTRY_DSN.
        if options.dsn.is_none() {
            sentry::Hub::current().bind_client(None);
            *slot = None;
            tracing::warn!("sentry client initialized without a DSN, events will be dropped");
            return Ok(());
        }

        let guard = sentry::init(options);
        tracing::info!(enabled = guard.is_enabled(), "sentry client initialized");
        *slot = Some(guard);
        Ok(())
    }

    fn capture(&self, event: Event<'static>) -> Result<Uuid, TransportError> {
        Ok(sentry::capture_event(event))
    }

    fn close(&self) -> Result<(), TransportError> {
        let guard = self
            .guard
            .lock()
            .map_err(|_| TransportError::Poisoned)?
            .take();

        match guard {
            Some(guard) => {
                drop(guard);
                tracing::info!("sentry client closed");
            }
            None => tracing::debug!("close called on a transport that was never initialized"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::MutexGuard;

    use sentry::{Envelope, Hub, Transport};

    use super::*;
    use crate::config::ClientConfig;

    const DSN: &str = "https://public@sentry.example.com/42";

    // The sentry hub and SENTRY_DSN are shared by every test in the process.
    static SERIAL: Mutex<()> = Mutex::new(());

    fn serial() -> MutexGuard<'static, ()> {
        SERIAL.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[derive(Default)]
    struct EnvelopeLog {
        envelopes: Mutex<Vec<Envelope>>,
    }

    impl EnvelopeLog {
        fn event_ids(&self) -> Vec<Uuid> {
            self.envelopes
                .lock()
                .unwrap()
                .iter()
                .filter_map(|envelope| envelope.event().map(|event| event.event_id))
                .collect()
        }
    }

    impl Transport for EnvelopeLog {
        fn send_envelope(&self, envelope: Envelope) {
            self.envelopes.lock().unwrap().push(envelope);
        }
    }

    fn options(dsn: &str, log: &Arc<EnvelopeLog>) -> ClientOptions {
        let config = ClientConfig {
            enable_uncaught_exception_handler: false,
            ..Default::default()
        };
        let mut options = config.client_options(dsn).unwrap();
        options.transport = Some(Arc::new(log.clone()));
        options
    }

    fn client_enabled() -> bool {
        Hub::current()
            .client()
            .map_or(false, |client| client.is_enabled())
    }

    #[test]
    fn init_capture_close() {
        let _serial = serial();
        let log = Arc::new(EnvelopeLog::default());
        let transport = SentryTransport::new();

        transport.init(options(DSN, &log)).unwrap();
        assert!(transport.guard.lock().unwrap().is_some());
        assert!(client_enabled());

        let event = Event::new();
        let expected = event.event_id;
        let id = transport.capture(event).unwrap();

        assert_eq!(id, expected);
        assert_eq!(log.event_ids(), vec![expected]);

        transport.close().unwrap();
        assert!(transport.guard.lock().unwrap().is_none());
        assert!(!client_enabled());
    }

    #[test]
    fn close_is_idempotent() {
        let _serial = serial();
        let never_initialized = SentryTransport::new();
        never_initialized.close().unwrap();
        never_initialized.close().unwrap();

        let log = Arc::new(EnvelopeLog::default());
        let transport = SentryTransport::new();
        transport.init(options(DSN, &log)).unwrap();
        transport.close().unwrap();
        transport.close().unwrap();
    }

    #[test]
    fn reinit_replaces_the_client() {
        let _serial = serial();
        let first = Arc::new(EnvelopeLog::default());
        let second = Arc::new(EnvelopeLog::default());
        let transport = SentryTransport::new();

        transport.init(options(DSN, &first)).unwrap();
        transport.init(options(DSN, &second)).unwrap();
        let id = transport.capture(Event::new()).unwrap();

        assert!(first.event_ids().is_empty());
        assert_eq!(second.event_ids(), vec![id]);
        transport.close().unwrap();
    }

    #[test]
    fn empty_dsn_stays_disabled_even_with_sentry_dsn_set() {
        let _serial = serial();
        let log = Arc::new(EnvelopeLog::default());
        let transport = SentryTransport::new();

        std::env::set_var("SENTRY_DSN", DSN);
        let result = transport.init(options("", &log));
        std::env::remove_var("SENTRY_DSN");
        result.unwrap();

        assert!(transport.guard.lock().unwrap().is_none());
        assert!(!client_enabled());
        assert_eq!(transport.capture(Event::new()).unwrap(), Uuid::nil());
        assert!(log.event_ids().is_empty());
        transport.close().unwrap();
    }
}
