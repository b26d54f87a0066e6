//! Render execution: run the engine on extracted code in a scoped directory.
//!
//! ## Lifecycle of a [`RenderJob`]
//!
//! ```text
//! create TempDir ─▶ write scene.py ─▶ engine ─▶ locate video ─▶ copy to output_dir ─▶ remove TempDir
//! ```
//!
//! The job owns its `TempDir`. Success and engine failure both end with an
//! explicit `close()` so removal errors surface as `Resource`; a panic or a
//! cancelled future falls back to `TempDir`'s drop, which removes the
//! directory as well. The only file that outlives the call is the copy in
//! `output_dir`.
//!
//! ## Engine contract
//!
//! [`RenderEngine::render`] receives the script path, the scene id and the
//! media directory. It must leave a video somewhere under `media_dir`; the
//! executor looks in Manim's conventional `videos/<stem>/480p15/` first and
//! then walks the tree.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, RenderFailure};
use crate::pipeline::extract::is_valid_scene_id;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// File name of the program inside the scoped directory.
pub const SCRIPT_NAME: &str = "scene.py";

/// Manim's output subdirectory for the `-ql` quality tier.
pub const LOW_QUALITY_DIR: &str = "480p15";

/// An external renderer: script + scene id in, video under `media_dir` out.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn render(
        &self,
        script: &Path,
        scene_id: &str,
        media_dir: &Path,
    ) -> Result<(), RenderFailure>;
}

/// The Manim Community CLI, invoked at the low-quality preview tier.
///
/// Runs `<program> <prefix_args..> -ql <script> <scene> --media_dir <dir>`.
#[derive(Debug, Clone)]
pub struct ManimCli {
    program: PathBuf,
    prefix_args: Vec<OsString>,
    timeout_secs: u64,
}

impl ManimCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
            timeout_secs: 600,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.engine_program)
            .with_prefix_args(config.engine_prefix_args.iter())
            .with_timeout_secs(config.render_timeout_secs)
    }

    /// Arguments placed before Manim's own, e.g. `["-m", "manim"]` for `python`.
    pub fn with_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[async_trait]
impl RenderEngine for ManimCli {
    async fn render(
        &self,
        script: &Path,
        scene_id: &str,
        media_dir: &Path,
    ) -> Result<(), RenderFailure> {
        let program = self.program.display().to_string();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args)
            .arg("-ql")
            .arg(script)
            .arg(scene_id)
            .arg("--media_dir")
            .arg(media_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = script.parent() {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| RenderFailure::Launch {
            program: program.clone(),
            detail: e.to_string(),
        })?;

        // Dropping the timed-out future kills the child (kill_on_drop).
        let output = timeout(Duration::from_secs(self.timeout_secs), child.wait_with_output())
            .await
            .map_err(|_| RenderFailure::Timeout {
                secs: self.timeout_secs,
            })?
            .map_err(|e| RenderFailure::Launch {
                program,
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(RenderFailure::ExitStatus {
                status: output.status.to_string(),
                stderr: tail(&String::from_utf8_lossy(&output.stderr), 20),
            });
        }
        Ok(())
    }
}

/// Last `lines` lines of engine output; tracebacks end with the useful part.
fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// One render attempt's exclusively-owned working state.
pub struct RenderJob {
    dir: TempDir,
    script: PathBuf,
    scene_id: String,
}

impl RenderJob {
    /// Create a fresh scoped directory and write `code` into it.
    pub async fn create(
        code: &str,
        scene_id: &str,
        work_dir: Option<&Path>,
    ) -> Result<Self, PipelineError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("manimator-");
        let dir = match work_dir {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|e| {
            let parent = work_dir.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
            PipelineError::resource(parent, e)
        })?;

        let script = dir.path().join(SCRIPT_NAME);
        tokio::fs::write(&script, code)
            .await
            .map_err(|e| PipelineError::resource(&script, e))?;
        debug!("Wrote {} bytes to {}", code.len(), script.display());

        Ok(Self {
            dir,
            script,
            scene_id: scene_id.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    pub fn media_dir(&self) -> PathBuf {
        self.dir.path().join("media")
    }

    /// Find the engine's video for this job's scene.
    pub fn locate_artifact(&self) -> Option<PathBuf> {
        let file_name = format!("{}.mp4", self.scene_id);
        let stem = self
            .script
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let conventional = self
            .media_dir()
            .join("videos")
            .join(stem)
            .join(LOW_QUALITY_DIR)
            .join(&file_name);
        if conventional.is_file() {
            return Some(conventional);
        }

        WalkDir::new(self.media_dir())
            .into_iter()
            .flatten()
            .filter(|e| e.file_type().is_file())
            // partial_movie_files holds per-animation fragments, not the final cut.
            .filter(|e| !e.path().components().any(|c| c.as_os_str() == "partial_movie_files"))
            .find(|e| e.file_name().to_string_lossy() == file_name)
            .map(|e| e.into_path())
    }

    /// Remove the scoped directory, surfacing removal errors.
    pub fn close(self) -> Result<(), PipelineError> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|e| PipelineError::resource(path, e))
    }
}

/// Runs render jobs against an engine and persists their videos.
pub struct RenderExecutor {
    engine: Box<dyn RenderEngine>,
    output_dir: PathBuf,
    work_dir: Option<PathBuf>,
}

impl RenderExecutor {
    pub fn new(engine: Box<dyn RenderEngine>, config: &PipelineConfig) -> Self {
        Self {
            engine,
            output_dir: config.output_dir.clone(),
            work_dir: config.work_dir.clone(),
        }
    }

    /// Render `code`; `None` on any expected rendering failure.
    ///
    /// `Err` only for infrastructure problems (scoped directory or output
    /// copy). The scoped directory is gone when this returns.
    pub async fn render(&self, code: &str, scene_id: &str) -> Result<Option<PathBuf>, PipelineError> {
        match self.try_render(code, scene_id).await {
            Ok(path) => Ok(Some(path)),
            Err(PipelineError::Render(failure)) => {
                warn!("Render of {} failed: {}", scene_id, failure);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Render `code`, reporting why rendering failed.
    pub async fn try_render(&self, code: &str, scene_id: &str) -> Result<PathBuf, PipelineError> {
        if !is_valid_scene_id(scene_id) {
            return Err(RenderFailure::InvalidSceneId {
                scene: scene_id.to_string(),
            }
            .into());
        }

        let job = RenderJob::create(code, scene_id, self.work_dir.as_deref()).await?;
        info!("Rendering {} in {}", scene_id, job.path().display());

        let outcome = self.run_job(&job).await;
        let closed = job.close();

        let persisted = outcome?;
        closed?;
        Ok(persisted)
    }

    async fn run_job(&self, job: &RenderJob) -> Result<PathBuf, PipelineError> {
        self.engine
            .render(job.script(), &job.scene_id, &job.media_dir())
            .await?;

        let video = job
            .locate_artifact()
            .ok_or_else(|| RenderFailure::MissingArtifact {
                scene: job.scene_id.clone(),
            })?;

        let persisted = self.persist(&video, &job.scene_id).await?;
        info!("Video saved to {}", persisted.display());
        Ok(persisted)
    }

    /// Copy the video to a unique `<scene>-XXXXXX.mp4` in `output_dir`.
    async fn persist(&self, video: &Path, scene_id: &str) -> Result<PathBuf, PipelineError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| PipelineError::resource(&self.output_dir, e))?;

        // The placeholder is removed on drop unless the copy succeeds.
        let placeholder = tempfile::Builder::new()
            .prefix(&format!("{}-", scene_id))
            .suffix(".mp4")
            .tempfile_in(&self.output_dir)
            .map_err(|e| PipelineError::resource(&self.output_dir, e))?;

        tokio::fs::copy(video, placeholder.path())
            .await
            .map_err(|e| PipelineError::resource(placeholder.path(), e))?;

        let (file, target) = placeholder
            .keep()
            .map_err(|e| PipelineError::resource(&self.output_dir, e.error))?;
        drop(file);
        Ok(target)
    }
}
