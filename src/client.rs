use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::args::build_args;
use crate::config::ClientConfig;
use crate::error::{Result, SdkError};
use crate::observability::MetricsCollector;
use crate::options::{LintOptions, RunOptions};
use crate::process::{Capture, CommandResult, Invocation, execute};

const DIFF_HEADER: &str = "Recipe differences between";

/// Handle on one configured `bunker-convert` binary. Every operation spawns
/// exactly one child and blocks until it exits.
#[derive(Debug, Clone, Default)]
pub struct Client {
    config: ClientConfig,
    metrics: MetricsCollector,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeDiff {
    pub equivalent: bool,
    pub differences: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Digest {
    pub hex: String,
    pub path: PathBuf,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(ClientConfig::from_env())
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self::new(ClientConfig {
            binary: binary.into(),
            ..ClientConfig::default()
        })
    }

    /// Routes invocation counters into `metrics` instead of a private collector.
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn run_recipe(
        &self,
        recipe: impl AsRef<Path>,
        options: &RunOptions,
    ) -> Result<CommandResult> {
        let mut args: Vec<OsString> = vec!["run".into(), path_arg(recipe.as_ref())];
        args.extend(options.flags.to_tokens());
        args.extend(build_args(&options.extra_args).into_iter().map(OsString::from));

        let result = self.invoke("run", args, Capture::from(options.capture_output))?;
        self.finish("run", result, options.check)
    }

    pub fn lint_recipes<P: AsRef<Path>>(
        &self,
        recipes: &[P],
        options: &LintOptions,
    ) -> Result<CommandResult> {
        let mut args: Vec<OsString> = vec!["recipe".into(), "lint".into()];
        args.extend(recipes.iter().map(|p| path_arg(p.as_ref())));
        args.extend(options.extra_args.iter().map(OsString::from));

        let result = self.invoke("recipe lint", args, Capture::Capture)?;
        self.finish("recipe lint", result, options.check)
    }

    pub fn validate_recipe(
        &self,
        recipe: impl AsRef<Path>,
        check: bool,
    ) -> Result<CommandResult> {
        let args: Vec<OsString> = vec!["validate".into(), path_arg(recipe.as_ref())];
        let result = self.invoke("validate", args, Capture::Capture)?;
        self.finish("validate", result, Some(check))
    }

    pub fn lock_recipe(
        &self,
        recipe: impl AsRef<Path>,
        output: impl AsRef<Path>,
        check: bool,
    ) -> Result<CommandResult> {
        let args: Vec<OsString> = vec![
            "lock".into(),
            path_arg(recipe.as_ref()),
            path_arg(output.as_ref()),
        ];
        let result = self.invoke("lock", args, Capture::Capture)?;
        self.finish("lock", result, Some(check))
    }

    /// Generates a preset recipe and returns where the binary wrote it.
    pub fn new_recipe(&self, preset: &str, output: Option<&Path>) -> Result<PathBuf> {
        let mut args: Vec<OsString> = vec![
            "recipe".into(),
            "new".into(),
            "--preset".into(),
            preset.into(),
        ];
        if let Some(path) = output {
            args.push("--output".into());
            args.push(path_arg(path));
        }
        let result = self.invoke("recipe new", args, Capture::Capture)?;
        self.finish("recipe new", result, Some(true))?;

        Ok(output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(format!("recipes/{preset}.yaml"))))
    }

    pub fn diff_recipes(
        &self,
        lhs: impl AsRef<Path>,
        rhs: impl AsRef<Path>,
    ) -> Result<RecipeDiff> {
        let args: Vec<OsString> = vec![
            "recipe".into(),
            "diff".into(),
            path_arg(lhs.as_ref()),
            path_arg(rhs.as_ref()),
        ];
        let result = self.invoke("recipe diff", args, Capture::Capture)?;
        if result.success() {
            return Ok(RecipeDiff {
                equivalent: true,
                differences: Vec::new(),
            });
        }

        match parse_diff(&result.stdout) {
            Some(differences) => Ok(RecipeDiff {
                equivalent: false,
                differences,
            }),
            None => Err(SdkError::ProcessFailed {
                operation: "recipe diff".to_string(),
                code: result.code,
                stderr: result.stderr.trim().to_string(),
            }),
        }
    }

    pub fn list_stages(&self) -> Result<Vec<String>> {
        let args: Vec<OsString> = vec!["list-stages".into()];
        let result = self.invoke("list-stages", args, Capture::Capture)?;
        let result = self.finish("list-stages", result, Some(true))?;
        Ok(parse_bullets(&result.stdout))
    }

    pub fn digest(&self, path: impl AsRef<Path>, output: Option<&Path>) -> Result<Digest> {
        let mut args: Vec<OsString> = vec![
            "security".into(),
            "digest".into(),
            "--path".into(),
            path_arg(path.as_ref()),
        ];
        if let Some(out) = output {
            args.push("--output".into());
            args.push(path_arg(out));
        }
        let result = self.invoke("security digest", args, Capture::Capture)?;
        let result = self.finish("security digest", result, Some(true))?;
        parse_digest(&result.stdout).ok_or_else(|| SdkError::UnexpectedOutput {
            operation: "security digest".to_string(),
            detail: format!("no '<sha256>  <path>' line in {:?}", result.stdout.trim()),
        })
    }

    pub fn sbom(&self, output: impl AsRef<Path>) -> Result<CommandResult> {
        let args: Vec<OsString> = vec![
            "security".into(),
            "sbom".into(),
            "--output".into(),
            path_arg(output.as_ref()),
        ];
        let result = self.invoke("security sbom", args, Capture::Capture)?;
        self.finish("security sbom", result, Some(true))
    }

    /// `bunker-convert <inputs...> to <format> [to <output_dir>]`
    pub fn quick_convert<P: AsRef<Path>>(
        &self,
        inputs: &[P],
        format: &str,
        output_dir: Option<&Path>,
    ) -> Result<CommandResult> {
        if inputs.is_empty() {
            return Err(SdkError::InvalidRequest(
                "quick convert needs at least one input".to_string(),
            ));
        }
        if let Some(input) = inputs.iter().find(|p| is_to_keyword(p.as_ref())) {
            return Err(SdkError::InvalidRequest(format!(
                "quick convert input '{}' collides with the 'to' separator",
                input.as_ref().display()
            )));
        }
        let format = format.trim();
        if format.is_empty() {
            return Err(SdkError::InvalidRequest(
                "quick convert needs a target format".to_string(),
            ));
        }
        if format.eq_ignore_ascii_case("to") || format.contains(char::is_whitespace) {
            return Err(SdkError::InvalidRequest(format!(
                "quick convert format '{format}' must be a single word other than 'to'"
            )));
        }
        if let Some(dir) = output_dir.filter(|dir| is_to_keyword(dir)) {
            return Err(SdkError::InvalidRequest(format!(
                "quick convert output directory '{}' collides with the 'to' separator",
                dir.display()
            )));
        }

        let mut args: Vec<OsString> = inputs.iter().map(|p| path_arg(p.as_ref())).collect();
        args.push("to".into());
        args.push(format.into());
        if let Some(dir) = output_dir {
            args.push("to".into());
            args.push(path_arg(dir));
        }
        let result = self.invoke("quick convert", args, Capture::Capture)?;
        self.finish("quick convert", result, None)
    }

    pub fn version(&self) -> Result<String> {
        let result = self.invoke("version", vec!["--version".into()], Capture::Capture)?;
        let result = self.finish("version", result, Some(true))?;
        let line = result.stdout.lines().next().unwrap_or_default().trim();
        line.split_whitespace()
            .last()
            .map(str::to_string)
            .ok_or_else(|| SdkError::UnexpectedOutput {
                operation: "version".to_string(),
                detail: "empty version output".to_string(),
            })
    }

    /// Forwards raw arguments with inherited I/O and never checks the exit code.
    pub fn passthrough<I, S>(&self, args: I) -> Result<CommandResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let args = args.into_iter().map(Into::into).collect();
        self.invoke("passthrough", args, Capture::Inherit)
    }

    fn invoke(
        &self,
        operation: &str,
        args: Vec<OsString>,
        capture: Capture,
    ) -> Result<CommandResult> {
        let mut invocation = Invocation::new(self.config.binary.as_str())
            .args(args)
            .capture(capture);
        invocation.working_dir = self.config.working_dir.clone();
        invocation.env = self.config.env.clone();
        let result = execute(&invocation)?;
        self.metrics.record(operation, result.code, result.duration_ms);
        Ok(result)
    }

    fn finish(
        &self,
        operation: &str,
        result: CommandResult,
        check: Option<bool>,
    ) -> Result<CommandResult> {
        if result.success() {
            info!(
                operation,
                duration_ms = result.duration_ms,
                "bunker-convert completed"
            );
            return Ok(result);
        }
        if check.unwrap_or(self.config.check) {
            return result.check(operation);
        }
        warn!(
            operation,
            code = result.code,
            "bunker-convert exited nonzero; returning result unchecked"
        );
        Ok(result)
    }
}

/// `run` through a default client; counters go to the global collector.
pub fn run_recipe(recipe: impl AsRef<Path>, options: &RunOptions) -> Result<CommandResult> {
    default_client().run_recipe(recipe, options)
}

/// `recipe lint` through a default client; counters go to the global collector.
pub fn lint_recipes<P: AsRef<Path>>(
    recipes: &[P],
    options: &LintOptions,
) -> Result<CommandResult> {
    default_client().lint_recipes(recipes, options)
}

fn default_client() -> Client {
    Client::default().with_metrics(MetricsCollector::global().clone())
}

fn path_arg(path: &Path) -> OsString {
    path.as_os_str().to_os_string()
}

fn is_to_keyword(path: &Path) -> bool {
    path.to_str()
        .is_some_and(|token| token.eq_ignore_ascii_case("to"))
}

fn parse_bullets(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix("- "))
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_diff(stdout: &str) -> Option<Vec<String>> {
    let (_, body) = stdout.split_once(DIFF_HEADER)?;
    Some(parse_bullets(body))
}

fn parse_digest(stdout: &str) -> Option<Digest> {
    stdout.lines().find_map(|line| {
        let (hex, path) = line.trim().split_once("  ")?;
        let is_sha256 = hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit());
        is_sha256.then(|| Digest {
            hex: hex.to_string(),
            path: PathBuf::from(path.trim()),
        })
    })
}
