use metrics::counter;

use crate::config::ClientConfig;
use crate::datum::Datum;
use crate::error::{BuildError, CaptureError, TransportError};
use crate::event::EventFields;
use crate::transport::EventTransport;

/// Handle over an initialized transport. Events are built fresh on every
/// send and handed over to the transport, which owns them from then on.
pub struct Client<T: EventTransport> {
    transport: T,
}

impl<T: EventTransport> Client<T> {
    pub fn init(transport: T, dsn: &str, config: &ClientConfig) -> Result<Self, CaptureError> {
        let options = config.client_options(dsn)?;

        tracing::info!(
            environment = ?config.environment,
            release = ?config.release,
            in_app_excludes = config.in_app_excludes.0.len(),
            "initializing client"
        );
        transport.init(options)?;

        Ok(Client { transport })
    }

    /// Same as [`Client::init`], with the options given as a host map.
    pub fn init_with_options(transport: T, dsn: &str, options: &Datum) -> Result<Self, CaptureError> {
        let config = ClientConfig::from_datum(options)?;
        Self::init(transport, dsn, &config)
    }

    /// Builds an event out of `event` and captures it, returning the event id.
    pub fn send_event(&self, event: &Datum) -> Result<String, CaptureError> {
        let fields = EventFields::from_datum(event).map_err(build_failed)?;
        self.send(fields)
    }

    pub fn send(&self, fields: EventFields) -> Result<String, CaptureError> {
        let event = fields.build().map_err(build_failed)?;
        counter!("sentry_capture_events_built_total").increment(1);

        let id = self.transport.capture(event).map_err(capture_failed)?;
        counter!("sentry_capture_events_sent_total").increment(1);
        tracing::debug!(event_id = %id, "event captured");

        Ok(id.to_string())
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn close(self) -> Result<(), CaptureError> {
        self.transport.close()?;
        Ok(())
    }
}

fn build_failed(err: BuildError) -> CaptureError {
    tracing::warn!(error = %err, "dropping event that could not be built");
    counter!("sentry_capture_events_failed_total", "stage" => "build").increment(1);
    err.into()
}

fn capture_failed(err: TransportError) -> CaptureError {
    tracing::error!(error = %err, "transport failed to capture event");
    counter!("sentry_capture_events_failed_total", "stage" => "capture").increment(1);
    err.into()
}
