//! Validated run configuration.

use crate::cli::{BenchArgs, OutputFormat};
use anyhow::Context;
use loadtest_ingest::{ConcurrencyPolicy, LoadGeneratorConfig};
use quickwit_client::{QuickwitClient, ReadinessOptions};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// How to start the service under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub envs: Vec<(OsString, OsString)>,
}

impl ServiceCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// `<binary> run --config <config>` with colored log output disabled,
    /// so log phrases are matched without ANSI escapes in between.
    pub fn quickwit(binary: impl Into<PathBuf>, config: impl Into<OsString>) -> Self {
        Self::new(binary)
            .arg("run")
            .arg("--config")
            .arg(config)
            .env("NO_COLOR", "true")
    }
}

#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub service: ServiceCommand,
    pub base_url: String,
    pub index_id: String,
    pub commit_timeout_secs: u64,
    pub rate_mib: f64,
    pub total_mib: f64,
    pub batch_pairs: usize,
    pub concurrency: ConcurrencyPolicy,
    pub request_timeout: Option<Duration>,
    pub readiness: ReadinessOptions,
    pub drain_timeout: Duration,
    pub watcher_grace: Duration,
    pub logs_dir: PathBuf,
    pub data_dir: Option<PathBuf>,
    pub output_format: OutputFormat,
    pub report_json: Option<PathBuf>,
}

impl BenchConfig {
    /// Load generator settings targeting `client`'s ingest endpoint.
    pub fn load_generator(
        &self,
        client: &QuickwitClient,
    ) -> anyhow::Result<LoadGeneratorConfig> {
        Ok(LoadGeneratorConfig {
            ingest_url: client.ingest_url(&self.index_id)?,
            rate_mib: self.rate_mib,
            total_mib: self.total_mib,
            batch_pairs: self.batch_pairs,
            concurrency: self.concurrency,
            request_timeout: self.request_timeout,
            drain_timeout: self.drain_timeout,
        })
    }
}

impl TryFrom<BenchArgs> for BenchConfig {
    type Error = anyhow::Error;

    fn try_from(args: BenchArgs) -> anyhow::Result<Self> {
        if !(args.rate_mib.is_finite() && args.rate_mib > 0.0) {
            anyhow::bail!("--rate-mib must be positive, got {}", args.rate_mib);
        }
        if !(args.total_mib.is_finite() && args.total_mib >= 0.0) {
            anyhow::bail!("--total-mib must not be negative, got {}", args.total_mib);
        }
        if args.batch_pairs == 0 {
            anyhow::bail!("--batch-pairs must be at least 1");
        }
        if args.index_id.trim().is_empty() {
            anyhow::bail!("--index-id must not be empty");
        }
        let concurrency = ConcurrencyPolicy::from_limit(args.max_in_flight)
            .context("Invalid --max-in-flight")?;
        QuickwitClient::new(&args.url).context("Invalid --url")?;

        let request_timeout = args
            .request_timeout
            .as_deref()
            .map(parse_duration)
            .transpose()
            .context("Invalid --request-timeout")?;

        Ok(Self {
            service: ServiceCommand::quickwit(args.binary, args.service_config),
            base_url: args.url,
            index_id: args.index_id,
            commit_timeout_secs: args.commit_timeout_secs,
            rate_mib: args.rate_mib,
            total_mib: args.total_mib,
            batch_pairs: args.batch_pairs,
            concurrency,
            request_timeout,
            readiness: ReadinessOptions {
                timeout: parse_duration(&args.ready_timeout).context("Invalid --ready-timeout")?,
                interval: parse_duration(&args.ready_interval)
                    .context("Invalid --ready-interval")?,
                settle: parse_duration(&args.ready_settle).context("Invalid --ready-settle")?,
            },
            drain_timeout: parse_duration(&args.drain_timeout)
                .context("Invalid --drain-timeout")?,
            watcher_grace: parse_duration(&args.watcher_grace)
                .context("Invalid --watcher-grace")?,
            logs_dir: args.logs_dir,
            data_dir: args.data_dir,
            output_format: args.output_format,
            report_json: args.report_json,
        })
    }
}

/// Parse a duration string like "500ms", "30s", "5m", "1h" or "15".
/// A bare number is seconds.
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty duration string");
    }

    let (num_str, suffix) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else {
        (s, "s")
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration: {s}"))?;

    let duration = match suffix {
        "ms" => Duration::from_millis(num),
        "h" => Duration::from_secs(num.saturating_mul(3600)),
        "m" => Duration::from_secs(num.saturating_mul(60)),
        _ => Duration::from_secs(num),
    };
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse_args(extra: &[&str]) -> BenchArgs {
        let mut argv = vec!["quickwit-ingest-bench"];
        argv.extend_from_slice(extra);
        BenchArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("15").unwrap(), Duration::from_secs(15));
        assert_eq!(parse_duration(" 2s ").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("1.5s").is_err());
        assert!(parse_duration("-3s").is_err());
    }

    #[test]
    fn test_default_config() {
        let config = BenchConfig::try_from(parse_args(&[])).unwrap();
        assert_eq!(config.concurrency, ConcurrencyPolicy::Unbounded);
        assert_eq!(config.readiness.timeout, Duration::from_secs(15));
        assert_eq!(config.readiness.interval, Duration::from_secs(1));
        assert_eq!(config.readiness.settle, Duration::from_secs(1));
        assert_eq!(config.drain_timeout, Duration::from_secs(10));
        assert_eq!(config.watcher_grace, Duration::from_secs(30));
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.service.program, PathBuf::from("quickwit"));
        assert_eq!(
            config.service.args,
            vec![
                OsString::from("run"),
                OsString::from("--config"),
                OsString::from("quickwit.yaml")
            ]
        );
        assert!(config
            .service
            .envs
            .contains(&(OsString::from("NO_COLOR"), OsString::from("true"))));
    }

    #[test]
    fn test_bounded_concurrency() {
        let config = BenchConfig::try_from(parse_args(&["--max-in-flight", "4"])).unwrap();
        assert_eq!(config.concurrency, ConcurrencyPolicy::Bounded(4));
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(BenchConfig::try_from(parse_args(&["--rate-mib", "0"])).is_err());
        assert!(BenchConfig::try_from(parse_args(&["--total-mib=-1"])).is_err());
        assert!(BenchConfig::try_from(parse_args(&["--batch-pairs", "0"])).is_err());
        assert!(BenchConfig::try_from(parse_args(&["--max-in-flight", "0"])).is_err());
        assert!(BenchConfig::try_from(parse_args(&["--url", "not a url"])).is_err());
        assert!(BenchConfig::try_from(parse_args(&["--ready-timeout", "soon"])).is_err());
    }

    #[test]
    fn test_load_generator_targets_ingest_endpoint() {
        let config = BenchConfig::try_from(parse_args(&["--index-id", "bench"])).unwrap();
        let client = QuickwitClient::new(&config.base_url).unwrap();
        let generator = config.load_generator(&client).unwrap();
        assert_eq!(
            generator.ingest_url.as_str(),
            "http://localhost:7280/api/v1/bench/ingest"
        );
        assert_eq!(generator.batch_pairs, 10_000);
    }
}
