use std::ffi::OsString;
use std::fmt::Display;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::args::ExtraArgs;

/// Device selection accepted by `bunker-convert run --device-policy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DevicePolicy {
    #[default]
    Auto,
    CpuOnly,
    GpuPreferred,
}

impl DevicePolicy {
    pub fn as_arg(&self) -> &'static str {
        match self {
            DevicePolicy::Auto => "auto",
            DevicePolicy::CpuOnly => "cpu-only",
            DevicePolicy::GpuPreferred => "gpu-preferred",
        }
    }
}

/// Typed switches of the `run` subcommand. Unset fields emit nothing.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RunFlags {
    pub dry_run: bool,
    pub print_metrics: bool,
    pub metrics_json: Option<PathBuf>,
    pub metrics_prometheus: Option<PathBuf>,
    pub metrics_listen: Option<String>,
    pub otlp_endpoint: Option<String>,
    pub device_policy: Option<DevicePolicy>,
}

impl RunFlags {
    pub fn to_tokens(&self) -> Vec<OsString> {
        let mut tokens: Vec<OsString> = Vec::new();
        if self.dry_run {
            tokens.push("--dry-run".into());
        }
        if self.print_metrics {
            tokens.push("--print-metrics".into());
        }
        if let Some(path) = &self.metrics_json {
            tokens.push("--metrics-json".into());
            tokens.push(path.into());
        }
        if let Some(path) = &self.metrics_prometheus {
            tokens.push("--metrics-prometheus".into());
            tokens.push(path.into());
        }
        if let Some(addr) = &self.metrics_listen {
            tokens.push("--metrics-listen".into());
            tokens.push(addr.into());
        }
        if let Some(endpoint) = &self.otlp_endpoint {
            tokens.push("--otlp-endpoint".into());
            tokens.push(endpoint.into());
        }
        if let Some(policy) = self.device_policy {
            tokens.push("--device-policy".into());
            tokens.push(policy.as_arg().into());
        }
        tokens
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub flags: RunFlags,
    pub extra_args: ExtraArgs,
    pub capture_output: bool,
    /// `None` defers to the client's configured default.
    pub check: Option<bool>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            flags: RunFlags::default(),
            extra_args: ExtraArgs::Empty,
            capture_output: true,
            check: None,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extra_args(mut self, extra: impl Into<ExtraArgs>) -> Self {
        self.extra_args = extra.into();
        self
    }

    pub fn flags(mut self, flags: RunFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    pub fn check(mut self, check: bool) -> Self {
        self.check = Some(check);
        self
    }
}

/// Options for `recipe lint`. Output is always captured.
#[derive(Debug, Clone, Default)]
pub struct LintOptions {
    pub extra_args: Vec<String>,
    pub check: Option<bool>,
}

impl LintOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extra_args<I, T>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Display,
    {
        self.extra_args = tokens.into_iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn check(mut self, check: bool) -> Self {
        self.check = Some(check);
        self
    }
}
