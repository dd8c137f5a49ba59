use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time;

use envconfig::Envconfig;
use sentry::integrations::backtrace::{AttachStacktraceIntegration, ProcessStacktraceIntegration};
use sentry::integrations::contexts::ContextIntegration;
use sentry::types::Dsn;
use sentry::ClientOptions;

use crate::datum::Datum;
use crate::error::ConfigError;

/// Options handed to the transport on init. Fields left unset keep the
/// transport's defaults.
#[derive(Envconfig, Clone, Debug, PartialEq)]
pub struct ClientConfig {
    #[envconfig(from = "SENTRY_ENVIRONMENT")]
    pub environment: Option<String>,

    #[envconfig(from = "SENTRY_RELEASE")]
    pub release: Option<String>,

    #[envconfig(from = "SENTRY_DEBUG", default = "false")]
    pub debug: bool,

    #[envconfig(from = "SENTRY_SHUTDOWN_TIMEOUT_MS")]
    pub shutdown_timeout: Option<EnvMsDuration>,

    #[envconfig(from = "SENTRY_IN_APP_EXCLUDES", default = "")]
    pub in_app_excludes: PrefixList,

    #[envconfig(from = "SENTRY_ENABLE_UNCAUGHT_EXCEPTION_HANDLER", default = "true")]
    pub enable_uncaught_exception_handler: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            environment: None,
            release: None,
            debug: false,
            shutdown_timeout: None,
            in_app_excludes: PrefixList::default(),
            enable_uncaught_exception_handler: true,
        }
    }
}

impl ClientConfig {
    /// Reads an options map (`environment`, `debug`, `release`,
    /// `shutdown-timeout`, `in-app-excludes`,
    /// `enable-uncaught-exception-handler`). Missing keys keep their defaults.
    pub fn from_datum(options: &Datum) -> Result<Self, ConfigError> {
        if options.as_entries().is_none() {
            return Err(ConfigError::InvalidOption {
                key: "options",
                expected: "map",
            });
        }

        let mut config = ClientConfig::default();

        if let Some(environment) = options.get("environment") {
            config.environment = Some(environment.to_string());
        }
        if let Some(release) = options.get("release") {
            config.release = Some(release.to_string());
        }
        if let Some(debug) = options.get("debug") {
            config.debug = flag(debug, "debug")?;
        }
        if let Some(timeout) = options.get("shutdown-timeout") {
            match timeout {
                Datum::Int(ms) if *ms >= 0 => {
                    config.shutdown_timeout =
                        Some(EnvMsDuration(time::Duration::from_millis(ms.unsigned_abs())));
                }
                _ => {
                    return Err(ConfigError::InvalidOption {
                        key: "shutdown-timeout",
                        expected: "non-negative integer milliseconds",
                    })
                }
            }
        }
        if let Some(excludes) = options.get("in-app-excludes") {
            let prefixes = excludes.as_seq().ok_or(ConfigError::InvalidOption {
                key: "in-app-excludes",
                expected: "sequence of package prefixes",
            })?;
            config.in_app_excludes = PrefixList(
                prefixes
                    .iter()
                    .map(ToString::to_string)
                    .filter(|prefix| !prefix.is_empty())
                    .collect(),
            );
        }
        if let Some(enabled) = options.get("enable-uncaught-exception-handler") {
            config.enable_uncaught_exception_handler =
                flag(enabled, "enable-uncaught-exception-handler")?;
        }

        Ok(config)
    }

    /// Transport options for `dsn`. An empty DSN produces a disabled client.
    pub fn client_options(&self, dsn: &str) -> Result<ClientOptions, ConfigError> {
        let mut options = ClientOptions::default();

        if !dsn.is_empty() {
            let dsn = dsn
                .parse::<Dsn>()
                .map_err(|e| ConfigError::InvalidDsn(e.to_string()))?;
            options.dsn = Some(dsn);
        }
        if let Some(environment) = &self.environment {
            options.environment = Some(environment.clone().into());
        }
        if let Some(release) = &self.release {
            options.release = Some(release.clone().into());
        }
        options.debug = self.debug;
        if let Some(EnvMsDuration(timeout)) = self.shutdown_timeout {
            options.shutdown_timeout = timeout;
        }
        for prefix in &self.in_app_excludes.0 {
            options.in_app_exclude.push(intern(prefix));
        }
        // The panic hook is part of the default integration set, so the rest
        // of that set is registered by hand.
        if !self.enable_uncaught_exception_handler {
            options.default_integrations = false;
            options.integrations.push(Arc::new(AttachStacktraceIntegration::default()));
            options.integrations.push(Arc::new(ContextIntegration::default()));
            options.integrations.push(Arc::new(ProcessStacktraceIntegration::default()));
        }

        Ok(options)
    }
}

/// `ClientOptions` only holds `'static` prefixes. Each distinct prefix is
/// leaked once and reused by later inits.
fn intern(prefix: &str) -> &'static str {
    static INTERNED: Mutex<BTreeSet<&'static str>> = Mutex::new(BTreeSet::new());

    let mut interned = INTERNED.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(existing) = interned.get(prefix) {
        return *existing;
    }
    let leaked: &'static str = Box::leak(prefix.to_owned().into_boxed_str());
    interned.insert(leaked);
    leaked
}

fn flag(value: &Datum, key: &'static str) -> Result<bool, ConfigError> {
    match value {
        Datum::Bool(b) => Ok(*b),
        _ => Err(ConfigError::InvalidOption {
            key,
            expected: "bool",
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

/// Comma separated package prefixes, e.g. `com.example.shaded,org.vendor`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrefixList(pub Vec<String>);

impl FromStr for PrefixList {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PrefixList(
            s.split(',')
                .map(str::trim)
                .filter(|prefix| !prefix.is_empty())
                .map(str::to_owned)
                .collect(),
        ))
    }
}
