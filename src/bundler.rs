//! Bundler invocation.
//!
//! The [`Bundler`] trait is the seam between the pipeline and the
//! third-party bundler. The production implementation,
//! [`EsbuildBundler`], shells out to the `esbuild` CLI with one of two
//! [`BuildProfile`]s:
//!
//! | | browser | node |
//! |---|---|---|
//! | minify | yes | no |
//! | source maps | yes | no |
//! | code splitting | yes | no |
//! | format | esm | esm |
//! | target | es2018 | node18 |
//! | CSS modules (`*.module.css`) | local-css | - |
//!
//! Every build requests a metafile, which is parsed into [`Metafile`] and
//! feeds the manifest's `metaOutput`. Any bundler failure is fatal for the
//! build.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Failed to start bundler `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Bundler exited with {status} for {platform} build:\n{diagnostics}")]
    Failed {
        platform: Platform,
        status: String,
        diagnostics: String,
    },
    #[error("Missing entry point: {0}")]
    MissingEntryPoint(PathBuf),
    #[error("Unreadable metafile {path}: {reason}")]
    Metafile { path: PathBuf, reason: String },
}

/// Target platform of a bundler project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Browser,
    Node,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Browser => f.write_str("browser"),
            Platform::Node => f.write_str("node"),
        }
    }
}

/// Bundler options fixed per platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildProfile {
    pub platform: Platform,
    pub minify: bool,
    pub sourcemap: bool,
    pub splitting: bool,
    pub format: &'static str,
    pub target: &'static str,
    pub chunk_names: Option<&'static str>,
    pub loaders: &'static [(&'static str, &'static str)],
}

const BROWSER_LOADERS: &[(&str, &str)] = &[
    (".js", "js"),
    (".ts", "ts"),
    (".tsx", "tsx"),
    (".css", "css"),
    (".module.css", "local-css"),
    (".woff", "file"),
    (".woff2", "file"),
    (".png", "file"),
    (".svg", "file"),
    (".webp", "file"),
    (".avif", "file"),
];

const NODE_LOADERS: &[(&str, &str)] = &[(".js", "js"), (".ts", "ts"), (".tsx", "tsx")];

impl BuildProfile {
    pub fn browser() -> Self {
        Self {
            platform: Platform::Browser,
            minify: true,
            sourcemap: true,
            splitting: true,
            format: "esm",
            target: "es2018",
            chunk_names: Some("chunks/[name]-[hash]"),
            loaders: BROWSER_LOADERS,
        }
    }

    pub fn node() -> Self {
        Self {
            platform: Platform::Node,
            minify: false,
            sourcemap: false,
            splitting: false,
            format: "esm",
            target: "node18",
            chunk_names: None,
            loaders: NODE_LOADERS,
        }
    }

    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Browser => Self::browser(),
            Platform::Node => Self::node(),
        }
    }
}

/// One entry point, optionally with an explicit output path
/// (`out=input` in esbuild's CLI syntax).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub out: Option<String>,
    pub input: PathBuf,
}

impl EntryPoint {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            out: None,
            input: input.into(),
        }
    }

    pub fn named(out: impl Into<String>, input: impl Into<PathBuf>) -> Self {
        Self {
            out: Some(out.into()),
            input: input.into(),
        }
    }

    fn to_arg(&self) -> String {
        match &self.out {
            Some(out) => format!("{}={}", out, self.input.display()),
            None => self.input.display().to_string(),
        }
    }
}

/// A project ready to hand to the bundler: config plus resolved entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleProject {
    pub name: String,
    pub entry_points: Vec<EntryPoint>,
    pub outdir: PathBuf,
    pub tsconfig: PathBuf,
    pub platform: Platform,
    pub entry_names: String,
}

/// esbuild metafile (`--metafile`), outputs only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metafile {
    #[serde(default)]
    pub outputs: BTreeMap<String, MetaOutput>,
}

/// One bundler output file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaOutput {
    pub bytes: u64,
    #[serde(default)]
    pub inputs: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub exports: Vec<String>,
    #[serde(rename = "entryPoint", default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
}

impl Metafile {
    pub fn load(path: &Path) -> Result<Self, BundleError> {
        let content = std::fs::read_to_string(path).map_err(|e| BundleError::Metafile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| BundleError::Metafile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Outputs produced directly from an entry point (not chunks or maps).
    pub fn entry_outputs(&self) -> impl Iterator<Item = (&String, &MetaOutput)> {
        self.outputs.iter().filter(|(_, o)| o.entry_point.is_some())
    }
}

/// Result of a successful bundler run.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleOutput {
    pub project: String,
    pub platform: Platform,
    pub metafile: Metafile,
}

/// Trait for bundler backends.
pub trait Bundler {
    /// Bundle a project. Output paths in the returned metafile are relative
    /// to the bundler's working directory.
    fn build(&self, project: &BundleProject) -> Result<BundleOutput, BundleError>;
}

/// Runs the `esbuild` CLI.
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    pub program: String,
    /// Working directory; entry points and outdirs are relative to it.
    pub working_dir: PathBuf,
    /// Where metafiles are written.
    pub temp_dir: PathBuf,
}

impl EsbuildBundler {
    pub fn new(
        program: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            working_dir: working_dir.into(),
            temp_dir: temp_dir.into(),
        }
    }

    fn metafile_path(&self, project: &BundleProject) -> PathBuf {
        self.temp_dir.join(format!("metafile-{}.json", project.name))
    }

    /// Command-line arguments for a project.
    pub fn command_args(project: &BundleProject, metafile: &Path) -> Vec<String> {
        let profile = BuildProfile::for_platform(project.platform);
        let mut args: Vec<String> = project.entry_points.iter().map(EntryPoint::to_arg).collect();

        args.push("--bundle".to_string());
        args.push(format!("--platform={}", profile.platform));
        args.push(format!("--format={}", profile.format));
        args.push(format!("--target={}", profile.target));
        args.push(format!("--outdir={}", project.outdir.display()));
        args.push(format!("--entry-names={}", project.entry_names));
        args.push(format!("--tsconfig={}", project.tsconfig.display()));
        args.push(format!("--metafile={}", metafile.display()));
        if profile.minify {
            args.push("--minify".to_string());
        }
        if profile.sourcemap {
            args.push("--sourcemap".to_string());
        }
        if profile.splitting {
            args.push("--splitting".to_string());
        }
        if let Some(chunk_names) = profile.chunk_names {
            args.push(format!("--chunk-names={chunk_names}"));
        }
        for (ext, loader) in profile.loaders {
            args.push(format!("--loader:{ext}={loader}"));
        }
        args.push("--log-level=warning".to_string());
        args
    }
}

impl Bundler for EsbuildBundler {
    fn build(&self, project: &BundleProject) -> Result<BundleOutput, BundleError> {
        for entry in &project.entry_points {
            if !self.working_dir.join(&entry.input).is_file() {
                return Err(BundleError::MissingEntryPoint(entry.input.clone()));
            }
        }

        std::fs::create_dir_all(&self.temp_dir).map_err(|source| BundleError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        let metafile = self.metafile_path(project);
        let args = Self::command_args(project, &metafile);

        tracing::info!(
            project = %project.name,
            platform = %project.platform,
            entries = project.entry_points.len(),
            "bundling"
        );
        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(&self.working_dir)
            .output()
            .map_err(|source| BundleError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(BundleError::Failed {
                platform: project.platform,
                status: output.status.to_string(),
                diagnostics: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let metafile = Metafile::load(&metafile)?;
        tracing::info!(project = %project.name, outputs = metafile.outputs.len(), "bundle written");
        Ok(BundleOutput {
            project: project.name.clone(),
            platform: project.platform,
            metafile,
        })
    }
}
