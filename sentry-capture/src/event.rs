//! Assembly of a wire-ready event out of a host map.
//!
//! The input map is first read into [`EventFields`], which checks the shape
//! of every nested section. [`EventFields::build`] then produces a fresh
//! transport event, setting only the fields that were supplied.

use std::borrow::Cow;
use std::error::Error;

use sentry::protocol::{Context, Event, LogEntry};
use uuid::Uuid;

use crate::datum::Datum;
use crate::entities::{entries, BreadcrumbFields, RequestFields, UserFields};
use crate::error::{BuildError, ConversionError};
use crate::level::to_severity;
use crate::normalize::{key_string, normalize, normalize_entries};

/// An error that caused an event, together with any structured context the
/// caller attached to it. The context is merged into the event's extra data.
#[derive(Debug)]
pub struct CapturedError {
    error: Box<dyn Error + Send + Sync + 'static>,
    context: Vec<(Datum, Datum)>,
}

impl CapturedError {
    pub fn new<E>(error: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync + 'static>>,
    {
        CapturedError {
            error: error.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<Datum>, value: impl Into<Datum>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    pub fn error(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.error.as_ref()
    }

    pub fn context(&self) -> &[(Datum, Datum)] {
        &self.context
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageFields {
    pub formatted: Option<String>,
    pub message: Option<String>,
    pub params: Option<Vec<Datum>>,
}

impl MessageFields {
    pub fn from_datum(datum: &Datum) -> Result<Self, BuildError> {
        entries(datum, "message")?;

        Ok(MessageFields {
            formatted: datum.get("formatted").map(ToString::to_string),
            message: datum.get("message").map(ToString::to_string),
            params: datum
                .get("params")
                .map(|params| sequence(params, "params").map(<[_]>::to_vec))
                .transpose()?,
        })
    }

    fn apply(&self, event: &mut Event<'static>) -> Result<(), BuildError> {
        if let Some(formatted) = &self.formatted {
            event.message = Some(formatted.clone());
        }
        if self.message.is_none() && self.params.is_none() {
            return Ok(());
        }

        let template = self
            .message
            .as_ref()
            .or(self.formatted.as_ref())
            .cloned()
            .unwrap_or_default();
        let params = self
            .params
            .iter()
            .flatten()
            .map(normalize)
            .collect::<Result<Vec<_>, _>>()
            .map_err(BuildError::conversion("params"))?;

        event.logentry = Some(LogEntry {
            message: template,
            params,
        });
        Ok(())
    }
}

/// Every recognised field of an event map. All fields are optional; only the
/// ones that are set reach the built event.
#[derive(Debug, Default)]
pub struct EventFields {
    pub event_id: Option<String>,
    pub message: Option<MessageFields>,
    pub level: Option<Datum>,
    pub dist: Option<String>,
    pub release: Option<String>,
    pub environment: Option<String>,
    pub logger: Option<String>,
    pub platform: Option<String>,
    pub transaction: Option<String>,
    pub server_name: Option<String>,
    pub user: Option<UserFields>,
    pub request: Option<RequestFields>,
    pub tags: Vec<(String, String)>,
    pub breadcrumbs: Vec<BreadcrumbFields>,
    pub extra: Vec<(Datum, Datum)>,
    pub fingerprints: Vec<String>,
    pub error: Option<CapturedError>,
}

impl EventFields {
    pub fn from_datum(datum: &Datum) -> Result<Self, BuildError> {
        entries(datum, "event")?;
        let text = |field: &str| datum.get(field).map(ToString::to_string);

        let tags = match datum.get("tags") {
            Some(tags) => {
                let mut pairs = Vec::new();
                for (key, value) in entries(tags, "tags")? {
                    let key = key_string(key).map_err(BuildError::conversion("tags"))?;
                    pairs.push((key, value.to_string()));
                }
                pairs
            }
            None => Vec::new(),
        };

        let breadcrumbs = match datum.get("breadcrumbs") {
            Some(items) => sequence(items, "breadcrumbs")?
                .iter()
                .map(BreadcrumbFields::from_datum)
                .collect::<Result<_, _>>()?,
            None => Vec::new(),
        };

        Ok(EventFields {
            event_id: text("event-id"),
            message: datum
                .get("message")
                .map(MessageFields::from_datum)
                .transpose()?,
            level: datum.get("level").cloned(),
            dist: text("dist"),
            release: text("release"),
            environment: text("environment"),
            logger: text("logger"),
            platform: text("platform"),
            transaction: text("transaction"),
            server_name: text("server-name"),
            user: datum.get("user").map(UserFields::from_datum).transpose()?,
            request: datum
                .get("request")
                .map(RequestFields::from_datum)
                .transpose()?,
            tags,
            breadcrumbs,
            extra: match datum.get("extra") {
                Some(extra) => entries(extra, "extra")?.to_vec(),
                None => Vec::new(),
            },
            fingerprints: match datum.get("fingerprints") {
                Some(items) => sequence(items, "fingerprints")?
                    .iter()
                    .filter(|item| !item.is_nil())
                    .map(ToString::to_string)
                    .collect(),
                None => Vec::new(),
            },
            error: None,
        })
    }

    pub fn with_error(mut self, error: CapturedError) -> Self {
        self.error = Some(error);
        self
    }

    /// Extra data merged with the error's structured context. Explicit
    /// `extra` entries come last, so they win when a key appears in both.
    pub fn merged_extra(&self) -> Vec<(Datum, Datum)> {
        let context = self.error.iter().flat_map(|e| e.context().iter());
        context.chain(self.extra.iter()).cloned().collect()
    }

    pub fn build(&self) -> Result<Event<'static>, BuildError> {
        let mut event = Event::new();

        if let Some(id) = &self.event_id {
            event.event_id = Uuid::parse_str(id)
                .map_err(|_| ConversionError::InvalidEventId(id.clone()))
                .map_err(BuildError::conversion("event-id"))?;
        }
        if let Some(message) = &self.message {
            message.apply(&mut event)?;
        }
        if let Some(level) = &self.level {
            event.level = to_severity(Some(level));
        }
        if let Some(dist) = &self.dist {
            event.dist = Some(dist.clone().into());
        }
        if let Some(release) = &self.release {
            event.release = Some(release.clone().into());
        }
        if let Some(environment) = &self.environment {
            event.environment = Some(environment.clone().into());
        }
        if let Some(logger) = &self.logger {
            event.logger = Some(logger.clone().into());
        }
        if let Some(platform) = &self.platform {
            event.platform = platform.clone().into();
        }
        if let Some(transaction) = &self.transaction {
            event.transaction = Some(transaction.clone().into());
        }
        if let Some(server_name) = &self.server_name {
            event.server_name = Some(server_name.clone().into());
        }
        if let Some(user) = &self.user {
            event.user = Some(user.build()?);
        }
        if let Some(request) = &self.request {
            let built = request.build()?;
            event.request = Some(built.request);
            if let Some(other) = built.other {
                event
                    .contexts
                    .insert("request".to_owned(), Context::Other(other));
            }
        }
        for (key, value) in &self.tags {
            event.tags.insert(key.clone(), value.clone());
        }
        if !self.breadcrumbs.is_empty() {
            let breadcrumbs = self
                .breadcrumbs
                .iter()
                .map(BreadcrumbFields::build)
                .collect::<Result<Vec<_>, _>>()?;
            event.breadcrumbs = breadcrumbs.into();
        }

        let extra = self.merged_extra();
        if !extra.is_empty() {
            event.extra = normalize_entries(&extra).map_err(BuildError::conversion("extra"))?;
        }
        if let Some(error) = &self.error {
            event.exception = sentry::event_from_error(error.error()).exception;
        }
        if !self.fingerprints.is_empty() {
            event.fingerprint = Cow::Owned(
                self.fingerprints
                    .iter()
                    .cloned()
                    .map(Cow::Owned)
                    .collect(),
            );
        }

        tracing::debug!(
            event_id = %event.event_id,
            breadcrumbs = event.breadcrumbs.values.len(),
            has_exception = !event.exception.values.is_empty(),
            "built event"
        );
        Ok(event)
    }
}

/// Reads and builds an event map in one step.
pub fn build_event(datum: &Datum) -> Result<Event<'static>, BuildError> {
    EventFields::from_datum(datum)?.build()
}

fn sequence<'a>(datum: &'a Datum, field: &'static str) -> Result<&'a [Datum], BuildError> {
    datum.as_seq().ok_or(BuildError::UnexpectedShape {
        field,
        expected: "sequence",
        found: datum.kind(),
    })
}

#[cfg(test)]
mod tests {
    use std::io;

    use sentry::protocol::{Context, Event};
    use sentry::Level;
    use serde_json::json;

    use super::*;

    fn kw_map<const N: usize>(entries: [(&str, Datum); N]) -> Datum {
        Datum::map(entries.map(|(k, v)| (Datum::kw(k), v)))
    }

    #[test]
    fn minimal_event_only_sets_the_message() {
        let defaults = Event::default();
        let datum = kw_map([("message", kw_map([("message", Datum::from("oh no"))]))]);

        let event = build_event(&datum).unwrap();

        let logentry = event.logentry.as_ref().unwrap();
        assert_eq!(logentry.message, "oh no");
        assert!(logentry.params.is_empty());
        assert_eq!(event.message, None);
        assert_eq!(event.level, defaults.level);
        assert_eq!(event.platform, defaults.platform);
        assert_eq!(event.fingerprint, defaults.fingerprint);
        assert_eq!(event.release, None);
        assert!(event.user.is_none());
        assert!(event.request.is_none());
        assert!(event.tags.is_empty());
        assert!(event.extra.is_empty());
        assert!(event.breadcrumbs.values.is_empty());
        assert!(event.exception.values.is_empty());
        assert!(!event.event_id.is_nil());
    }

    #[test]
    fn sets_every_scalar_field() {
        let datum = kw_map([
            ("event-id", Datum::from("0b1c9e5ab9e0441a8e1d8b2a0e8c47a1")),
            (
                "message",
                kw_map([
                    ("formatted", Datum::from("user 7 failed to pay")),
                    ("message", Datum::from("user %s failed to pay")),
                    ("params", Datum::seq([7])),
                ]),
            ),
            ("level", Datum::kw("warning")),
            ("dist", Datum::from("x86")),
            ("release", Datum::from("shop@1.4.2")),
            ("environment", Datum::from("production")),
            ("logger", Datum::from("payments")),
            ("platform", Datum::from("java")),
            ("transaction", Datum::from("POST /checkout")),
            ("server-name", Datum::from("web-1")),
        ]);

        let event = build_event(&datum).unwrap();

        assert_eq!(
            event.event_id,
            Uuid::parse_str("0b1c9e5a-b9e0-441a-8e1d-8b2a0e8c47a1").unwrap()
        );
        assert_eq!(event.message.as_deref(), Some("user 7 failed to pay"));
        let logentry = event.logentry.as_ref().unwrap();
        assert_eq!(logentry.message, "user %s failed to pay");
        assert_eq!(logentry.params, vec![json!(7)]);
        assert_eq!(event.level, Level::Warning);
        assert_eq!(event.dist.as_deref(), Some("x86"));
        assert_eq!(event.release.as_deref(), Some("shop@1.4.2"));
        assert_eq!(event.environment.as_deref(), Some("production"));
        assert_eq!(event.logger.as_deref(), Some("payments"));
        assert_eq!(event.platform, "java");
        assert_eq!(event.transaction.as_deref(), Some("POST /checkout"));
        assert_eq!(event.server_name.as_deref(), Some("web-1"));
    }

    #[test]
    fn params_without_template_fall_back_to_formatted() {
        let fields = MessageFields {
            formatted: Some("retrying 3".to_owned()),
            message: None,
            params: Some(vec![Datum::Int(3)]),
        };
        let mut event = Event::new();

        fields.apply(&mut event).unwrap();

        assert_eq!(event.logentry.unwrap().message, "retrying 3");
    }

    #[test]
    fn unknown_level_maps_to_info() {
        let event = build_event(&kw_map([("level", Datum::kw("loud"))])).unwrap();
        assert_eq!(event.level, Level::Info);
    }

    #[test]
    fn tags_are_stringified_and_last_write_wins() {
        let datum = kw_map([(
            "tags",
            Datum::map([
                (Datum::kw("a"), Datum::Int(1)),
                (Datum::kw("region"), Datum::kw("eu")),
                (Datum::from("a"), Datum::Int(2)),
                (Datum::kw("paid"), Datum::Bool(true)),
                (Datum::kw("ratio"), Datum::Float(1.0)),
            ]),
        )]);

        let event = build_event(&datum).unwrap();

        assert_eq!(event.tags.get("a").map(String::as_str), Some("2"));
        assert_eq!(event.tags.get("region").map(String::as_str), Some("eu"));
        assert_eq!(event.tags.get("paid").map(String::as_str), Some("true"));
        assert_eq!(event.tags.get("ratio").map(String::as_str), Some("1.0"));
        assert_eq!(event.tags.len(), 4);
    }

    #[test]
    fn breadcrumbs_keep_their_order() {
        let crumb = |message: &str| kw_map([("message", Datum::from(message))]);
        let datum = kw_map([(
            "breadcrumbs",
            Datum::seq([crumb("b1"), crumb("b2"), crumb("b3")]),
        )]);

        let event = build_event(&datum).unwrap();

        let messages: Vec<_> = event
            .breadcrumbs
            .values
            .iter()
            .map(|b| b.message.as_deref().unwrap())
            .collect();
        assert_eq!(messages, ["b1", "b2", "b3"]);
    }

    #[test]
    fn extra_and_error_context_are_merged() {
        let fields = EventFields::from_datum(&kw_map([(
            "extra",
            Datum::map([("a", Datum::Int(1))]),
        )]))
        .unwrap()
        .with_error(CapturedError::new("boom").with_context("b", 2));

        let event = fields.build().unwrap();

        assert_eq!(event.extra.get("a"), Some(&json!(1)));
        assert_eq!(event.extra.get("b"), Some(&json!(2)));
    }

    #[test]
    fn explicit_extra_wins_over_error_context() {
        let fields = EventFields::from_datum(&kw_map([(
            "extra",
            Datum::map([(Datum::kw("order-id"), Datum::from("from-extra"))]),
        )]))
        .unwrap()
        .with_error(
            CapturedError::new("boom")
                .with_context(Datum::kw("order-id"), "from-error")
                .with_context(Datum::kw("attempt"), 3),
        );

        let event = fields.build().unwrap();

        assert_eq!(event.extra.get("order-id"), Some(&json!("from-extra")));
        assert_eq!(event.extra.get("attempt"), Some(&json!(3)));
    }

    #[test]
    fn error_context_alone_fills_extra() {
        let fields = EventFields::default().with_error(
            CapturedError::new("boom")
                .with_context("payload", Datum::map([(Datum::kw("id"), 9)])),
        );

        let event = fields.build().unwrap();

        assert_eq!(event.extra.get("payload"), Some(&json!({"id": 9})));
    }

    #[test]
    fn causative_error_becomes_the_exception() {
        let error = io::Error::new(io::ErrorKind::Other, "disk full");
        let event = EventFields::default()
            .with_error(CapturedError::new(error))
            .build()
            .unwrap();

        let exception = event.exception.values.last().unwrap();
        assert_eq!(exception.value.as_deref(), Some("disk full"));
    }

    #[test]
    fn fingerprints_are_kept_verbatim() {
        let datum = kw_map([(
            "fingerprints",
            Datum::seq([Datum::from("{{ default }}"), Datum::kw("db"), Datum::kw("db")]),
        )]);

        let event = build_event(&datum).unwrap();

        let fingerprint: Vec<String> = event.fingerprint.iter().map(|f| f.to_string()).collect();
        assert_eq!(fingerprint, ["{{ default }}", "db", "db"]);
    }

    #[test]
    fn nil_fingerprint_parts_are_skipped() {
        let datum = kw_map([(
            "fingerprints",
            Datum::seq([Datum::from("checkout"), Datum::Nil]),
        )]);

        let event = build_event(&datum).unwrap();

        let fingerprint: Vec<String> = event.fingerprint.iter().map(|f| f.to_string()).collect();
        assert_eq!(fingerprint, ["checkout"]);

        let only_nil = build_event(&kw_map([("fingerprints", Datum::seq([Datum::Nil]))])).unwrap();
        assert_eq!(only_nil.fingerprint, Event::default().fingerprint);
    }

    #[test]
    fn user_and_request_are_attached() {
        let datum = kw_map([
            ("user", kw_map([("id", Datum::from("u-1"))])),
            (
                "request",
                kw_map([
                    ("method", Datum::from("GET")),
                    ("other", kw_map([("route", Datum::from("/items/:id"))])),
                ]),
            ),
        ]);

        let event = build_event(&datum).unwrap();

        assert_eq!(event.user.unwrap().id.as_deref(), Some("u-1"));
        assert_eq!(event.request.unwrap().method.as_deref(), Some("GET"));
        match event.contexts.get("request") {
            Some(Context::Other(other)) => {
                assert_eq!(other.get("route"), Some(&json!("/items/:id")))
            }
            other => panic!("unexpected request context: {:?}", other),
        }
    }

    #[test]
    fn rejects_unexpected_shapes() {
        for field in ["message", "user", "request", "tags", "extra"] {
            let err = build_event(&kw_map([(field, Datum::from("oops"))])).unwrap_err();
            assert!(
                matches!(err, BuildError::UnexpectedShape { expected: "map", found: "string", .. }),
                "{field}: {err}"
            );
        }
        for field in ["breadcrumbs", "fingerprints"] {
            let err = build_event(&kw_map([(field, Datum::from("oops"))])).unwrap_err();
            assert!(
                matches!(err, BuildError::UnexpectedShape { expected: "sequence", .. }),
                "{field}: {err}"
            );
        }
        assert!(matches!(
            build_event(&Datum::from("event")),
            Err(BuildError::UnexpectedShape { field: "event", .. })
        ));
    }

    #[test]
    fn invalid_nested_value_aborts_the_whole_event() {
        let datum = kw_map([
            ("event-id", Datum::from("not-a-uuid")),
            ("release", Datum::from("1.0")),
        ]);

        assert_eq!(
            build_event(&datum).unwrap_err(),
            BuildError::Conversion {
                field: "event-id",
                source: ConversionError::InvalidEventId("not-a-uuid".to_owned()),
            }
        );

        let datum = kw_map([(
            "breadcrumbs",
            Datum::seq([kw_map([("message", Datum::from("ok"))]), Datum::Int(1)]),
        )]);
        assert!(matches!(
            build_event(&datum),
            Err(BuildError::UnexpectedShape { field: "breadcrumbs", found: "integer", .. })
        ));
    }

    #[test]
    fn json_input_builds_the_same_event() {
        let from_json: Datum = serde_json::from_value(json!({
            "event_id": "0b1c9e5ab9e0441a8e1d8b2a0e8c47a1",
            "level": "error",
            "server_name": "web-1",
            "tags": {"region": "eu"},
            "extra": {"cart": {"items": 2}}
        }))
        .unwrap();
        let from_keywords = kw_map([
            ("event-id", Datum::from("0b1c9e5ab9e0441a8e1d8b2a0e8c47a1")),
            ("level", Datum::kw("error")),
            ("server-name", Datum::from("web-1")),
            ("tags", kw_map([("region", Datum::from("eu"))])),
            ("extra", kw_map([("cart", kw_map([("items", Datum::Int(2))]))])),
        ]);

        let a = build_event(&from_json).unwrap();
        let b = build_event(&from_keywords).unwrap();

        assert_eq!(a.event_id, b.event_id);
        assert_eq!(a.level, b.level);
        assert_eq!(a.server_name, b.server_name);
        assert_eq!(a.tags, b.tags);
        assert_eq!(a.extra, b.extra);
    }
}
