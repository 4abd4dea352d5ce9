//! Daemon configuration from flags and environment variables.
use std::{net::SocketAddr, path::PathBuf, time::Duration};

use chrono_tz::Tz;
use clap::{ArgAction, Parser, builder::BoolishValueParser};
use thiserror::Error;

use stevedore_core::labels::ParserConfig;
use stevedore_core::scheduler::SchedulerConfig;
use stevedore_docker::{DockerConfig, DockerError, DockerHost};
use stevedore_model::{Flags, ValidatorConfig};
use stevedore_observe::{LoggerConfig, LoggerError, LoggerFormat, LoggerLevel, LoggerTimeZone};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown timezone: {0}")]
    Timezone(String),

    #[error("{name} must be at least 1")]
    TooSmall { name: &'static str },

    #[error("SERVICE_ID_LABELS must name at least one label")]
    NoServiceLabels,

    #[error(transparent)]
    Docker(#[from] DockerError),

    #[error(transparent)]
    Logger(#[from] LoggerError),
}

/// Command line, every flag can also be set through its environment variable.
#[derive(Debug, Parser)]
#[command(name = "stevedored", version, about = "Runs jobs defined in container labels inside those containers")]
pub struct Cli {
    /// Docker endpoint.
    #[arg(long, env = "DOCKER_HOST", default_value = stevedore_docker::DEFAULT_DOCKER_HOST)]
    pub docker_host: String,

    /// Docker request timeout in seconds.
    #[arg(long, env = "CLIENT_TIMEOUT", default_value_t = 120)]
    pub client_timeout: u64,

    /// Debug logging and verbose validation errors.
    #[arg(long, env = "DEBUG", default_value = "false", value_parser = BoolishValueParser::new(), action = ArgAction::Set)]
    pub debug: bool,

    /// Max instances of jobs without `max`.
    #[arg(long, env = "DEFAULT_MAX", default_value_t = 1)]
    pub default_max: u32,

    /// User of jobs without `user`.
    #[arg(long, env = "DEFAULT_USER", default_value = "root")]
    pub default_user: String,

    /// Flags of containers without `options.flags`.
    #[arg(long, env = "DEFAULT_FLAGS")]
    pub default_flags: Option<String>,

    #[arg(long, env = "DEFAULT_OPTIONS", hide = true)]
    pub default_options: Option<String>,

    #[arg(long, env = "LABEL_NAMESPACE", default_value = "stevedore")]
    pub label_namespace: String,

    /// Comma-separated labels that identify a service.
    #[arg(
        long,
        env = "SERVICE_ID_LABELS",
        default_value = "com.docker.compose.project,com.docker.compose.service"
    )]
    pub service_id_labels: String,

    /// Timezone of jobs without `timezone`.
    #[arg(long, env = "TIMEZONE", default_value = "UTC")]
    pub timezone: String,

    /// Commands that may run at the same time.
    #[arg(long, env = "JOB_POOL_SIZE", default_value_t = 10)]
    pub job_pool_size: usize,

    #[arg(long, env = "JOB_NAME_REGEX", default_value = "[a-z0-9-]+")]
    pub job_name_regex: String,

    /// text, json or journald.
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Tracing filter; `info`, or `debug` with DEBUG.
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// utc or local.
    #[arg(long, env = "LOG_TIMEZONE", default_value = "utc")]
    pub log_timezone: String,

    #[arg(long, env = "LOCK_FILE", default_value = "/tmp/stevedore.lock")]
    pub lock_file: PathBuf,

    /// Address of the /jobs, /healthz and /metrics endpoints.
    #[arg(long, env = "HTTP_LISTEN")]
    pub http_listen: Option<SocketAddr>,

    /// Seconds to wait for running commands at shutdown.
    #[arg(long, env = "SHUTDOWN_GRACE", default_value_t = 30)]
    pub shutdown_grace: u64,

    /// Image title that identifies other daemon containers.
    #[arg(long, env = "SELF_IMAGE_NAME", default_value = "stevedore")]
    pub self_image_name: String,
}

/// Validated, immutable daemon settings.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub docker: DockerConfig,
    pub logger: LoggerConfig,
    pub parser: ParserConfig,
    pub scheduler: SchedulerConfig,
    pub lock_file: PathBuf,
    pub http_listen: Option<SocketAddr>,
    pub shutdown_grace: Duration,
    pub self_image_name: String,
    /// Deprecation notices, logged once the logger is up.
    pub warnings: Vec<String>,
}

impl TryFrom<Cli> for DaemonConfig {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let mut warnings = Vec::new();

        if cli.default_max == 0 {
            return Err(ConfigError::TooSmall { name: "DEFAULT_MAX" });
        }
        if cli.job_pool_size == 0 {
            return Err(ConfigError::TooSmall { name: "JOB_POOL_SIZE" });
        }

        let flags = match (cli.default_flags, cli.default_options) {
            (Some(flags), _) => flags,
            (None, Some(options)) => {
                warnings.push("DEFAULT_OPTIONS is deprecated, use DEFAULT_FLAGS".to_string());
                options
            }
            (None, None) => "image,service".to_string(),
        };
        let default_flags = Flags::resolve(&Flags::default(), &flags);

        let service_id_labels: Vec<String> = cli
            .service_id_labels
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if service_id_labels.is_empty() {
            return Err(ConfigError::NoServiceLabels);
        }

        let default_timezone = parse_timezone(&cli.timezone)?;

        let level = match cli.log_level {
            Some(level) => LoggerLevel::new(level)?,
            None if cli.debug => LoggerLevel::new("debug")?,
            None => LoggerLevel::default(),
        };
        let logger = LoggerConfig {
            format: cli.log_format.parse::<LoggerFormat>()?,
            level,
            tz: cli.log_timezone.parse::<LoggerTimeZone>()?,
            ..LoggerConfig::default()
        };

        let docker = DockerConfig {
            host: cli.docker_host.parse::<DockerHost>()?,
            timeout: Duration::from_secs(cli.client_timeout),
        };

        let parser = ParserConfig {
            namespace: cli.label_namespace,
            service_id_labels,
            default_flags,
            default_user: cli.default_user,
            validator: ValidatorConfig {
                default_max: cli.default_max,
                default_timezone,
                name_pattern: cli.job_name_regex,
                debug: cli.debug,
            },
            ..ParserConfig::default()
        };

        let scheduler = SchedulerConfig {
            pool_size: cli.job_pool_size,
            ..SchedulerConfig::default()
        };

        Ok(Self {
            docker,
            logger,
            parser,
            scheduler,
            lock_file: cli.lock_file,
            http_listen: cli.http_listen,
            shutdown_grace: Duration::from_secs(cli.shutdown_grace),
            self_image_name: cli.self_image_name,
            warnings,
        })
    }
}

/// Timezone name as in the tz database; spaces are accepted in place of underscores.
fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
    let normalized = name.trim().replace(' ', "_");
    normalized
        .parse::<Tz>()
        .map_err(|_| ConfigError::Timezone(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<DaemonConfig, ConfigError> {
        let mut argv = vec!["stevedored"];
        argv.extend_from_slice(args);
        DaemonConfig::try_from(Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn defaults() {
        let cfg = parse(&["--docker-host", "tcp://localhost:2375"]).unwrap();

        assert_eq!(cfg.docker.timeout, Duration::from_secs(120));
        assert_eq!(cfg.parser.namespace, "stevedore");
        assert_eq!(cfg.parser.default_flags.to_string(), "image,service");
        assert_eq!(cfg.parser.default_user, "root");
        assert_eq!(cfg.parser.service_id_labels.len(), 2);
        assert_eq!(cfg.parser.validator.default_max, 1);
        assert_eq!(cfg.parser.validator.default_timezone, Tz::UTC);
        assert_eq!(cfg.scheduler.pool_size, 10);
        assert_eq!(cfg.logger.level.as_str(), "info");
        assert_eq!(cfg.lock_file, PathBuf::from("/tmp/stevedore.lock"));
        assert_eq!(cfg.shutdown_grace, Duration::from_secs(30));
        assert!(cfg.http_listen.is_none());
        assert!(cfg.warnings.is_empty());
    }

    #[test]
    fn debug_raises_log_level_unless_set() {
        let cfg = parse(&["--docker-host", "tcp://d:2375", "--debug", "yes"]).unwrap();
        assert_eq!(cfg.logger.level.as_str(), "debug");
        assert!(cfg.parser.validator.debug);

        let cfg = parse(&["--docker-host", "tcp://d:2375", "--debug", "on", "--log-level", "WARNING"]).unwrap();
        assert_eq!(cfg.logger.level.as_str(), "warn");
    }

    #[test]
    fn timezone_accepts_spaces() {
        let cfg = parse(&["--docker-host", "tcp://d:2375", "--timezone", "America/New York"]).unwrap();
        assert_eq!(cfg.parser.validator.default_timezone, Tz::America__New_York);

        let err = parse(&["--docker-host", "tcp://d:2375", "--timezone", "Mars/Olympus"]).unwrap_err();
        assert!(matches!(err, ConfigError::Timezone(_)));
    }

    #[test]
    fn deprecated_default_options_is_honoured() {
        let cfg = parse(&["--docker-host", "tcp://d:2375", "--default-options", "noservice"]).unwrap();
        assert_eq!(cfg.parser.default_flags.to_string(), "");
        assert_eq!(cfg.warnings.len(), 1);

        let cfg = parse(&[
            "--docker-host",
            "tcp://d:2375",
            "--default-flags",
            "service",
            "--default-options",
            "image",
        ])
        .unwrap();
        assert_eq!(cfg.parser.default_flags.to_string(), "service");
        assert!(cfg.warnings.is_empty(), "DEFAULT_FLAGS wins silently");
    }

    #[test]
    fn rejects_invalid_values() {
        let host = ["--docker-host", "tcp://d:2375"];
        let with = |extra: &[&str]| {
            let mut args = host.to_vec();
            args.extend_from_slice(extra);
            parse(&args)
        };

        assert!(matches!(with(&["--default-max", "0"]), Err(ConfigError::TooSmall { .. })));
        assert!(matches!(with(&["--job-pool-size", "0"]), Err(ConfigError::TooSmall { .. })));
        assert!(matches!(with(&["--service-id-labels", " , "]), Err(ConfigError::NoServiceLabels)));
        assert!(matches!(with(&["--log-format", "xml"]), Err(ConfigError::Logger(_))));
        assert!(matches!(
            parse(&["--docker-host", "ssh://host"]),
            Err(ConfigError::Docker(DockerError::InvalidHost(_)))
        ));
    }

    #[test]
    fn service_labels_are_trimmed_in_order() {
        let cfg = parse(&["--docker-host", "tcp://d:2375", "--service-id-labels", " b , a ,"]).unwrap();
        assert_eq!(cfg.parser.service_id_labels, vec!["b", "a"]);
    }
}
