use crate::args::{build_concat_args, build_convert_args, build_trim_args, concat_manifest};
use crate::constants::mime_type;
use crate::engine::{EngineLoader, MediaEngine, ProgressFn};
use crate::options::{ConversionOptions, OptionsError, SourceFile, VideoSegment};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

// User-facing messages; execution detail stays in the internal logs.
const LOAD_FAILED_MESSAGE: &str = "Failed to load the video converter. Please try again.";
const CONVERT_FAILED_MESSAGE: &str = "Video conversion failed. Please try again.";
const MERGE_FAILED_MESSAGE: &str = "Video merge failed. Please try again.";

/// Per-operation progress sink; receives integer percentages in [0, 100].
pub type ProgressCallback = Box<dyn Fn(u8) + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("The video converter is not loaded yet")]
    NotReady,
    #[error("{0}")]
    LoadFailed(String),
    #[error("Another conversion is already in progress")]
    Busy,
    #[error("At least two videos are required to merge")]
    NotEnoughInputs,
    #[error(transparent)]
    InvalidOptions(#[from] OptionsError),
    #[error("{0}")]
    Conversion(String),
}

impl SessionError {
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// Observable lifecycle of the shared engine handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

enum EngineSlot {
    Unloaded,
    Loading,
    Ready(Arc<dyn MediaEngine>),
    Failed(String),
}

/// The converted output: raw bytes plus the MIME type the UI tags the
/// download blob with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedMedia {
    pub data: Vec<u8>,
    pub mime_type: &'static str,
}

/// Owns the one engine instance for the lifetime of the tab session.
///
/// The engine and its file namespace are shared mutable resources, so at
/// most one operation runs at a time; a second call while one is in
/// flight is rejected with [`SessionError::Busy`] rather than queued.
pub struct EngineSession {
    loader: Box<dyn EngineLoader>,
    slot: RwLock<EngineSlot>,
    busy: Mutex<()>,
}

impl EngineSession {
    pub fn new(loader: Box<dyn EngineLoader>) -> Self {
        Self {
            loader,
            slot: RwLock::new(EngineSlot::Unloaded),
            busy: Mutex::new(()),
        }
    }

    pub async fn state(&self) -> SessionState {
        match &*self.slot.read().await {
            EngineSlot::Unloaded => SessionState::Unloaded,
            EngineSlot::Loading => SessionState::Loading,
            EngineSlot::Ready(_) => SessionState::Ready,
            EngineSlot::Failed(_) => SessionState::Failed,
        }
    }

    pub async fn is_ready(&self) -> bool {
        self.state().await == SessionState::Ready
    }

    /// Initialize the engine exactly once.
    ///
    /// Calls while a load is in flight (or after one succeeded) are
    /// no-ops; after a failure the session stays failed until a caller
    /// explicitly invokes `load` again.
    pub async fn load(&self) -> Result<(), SessionError> {
        {
            let mut slot = self.slot.write().await;
            match &*slot {
                EngineSlot::Loading | EngineSlot::Ready(_) => return Ok(()),
                EngineSlot::Unloaded | EngineSlot::Failed(_) => *slot = EngineSlot::Loading,
            }
        }

        match self.loader.load().await {
            Ok(engine) => {
                *self.slot.write().await = EngineSlot::Ready(Arc::from(engine));
                tracing::info!("conversion engine ready");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "engine load failed");
                *self.slot.write().await = EngineSlot::Failed(LOAD_FAILED_MESSAGE.to_string());
                Err(SessionError::LoadFailed(LOAD_FAILED_MESSAGE.to_string()))
            }
        }
    }

    async fn engine(&self) -> Result<Arc<dyn MediaEngine>, SessionError> {
        match &*self.slot.read().await {
            EngineSlot::Ready(engine) => Ok(engine.clone()),
            EngineSlot::Failed(message) => Err(SessionError::LoadFailed(message.clone())),
            EngineSlot::Unloaded | EngineSlot::Loading => Err(SessionError::NotReady),
        }
    }

    /// Convert one file according to `options`.
    pub async fn convert_video(
        &self,
        file: &SourceFile,
        options: &ConversionOptions,
        on_progress: Option<ProgressCallback>,
    ) -> Result<ConvertedMedia, SessionError> {
        let engine = self.engine().await?;
        let _running = self.busy.try_lock().map_err(|_| SessionError::Busy)?;

        options.validate()?;

        let job = Uuid::new_v4();
        let input_name = format!("in-{job}.{}", file.extension());
        let output_name = format!("out-{job}.{}", options.output_format.to_ascii_lowercase());
        let args = build_convert_args(&input_name, &output_name, options)?;

        let reporter = ProgressReporter::new(on_progress);
        tracing::info!(%job, format = %options.output_format, "starting conversion");

        let outcome = async {
            engine.write_file(&input_name, &file.data).await?;
            engine.exec(&args, reporter.ratio_sink()).await?;
            engine.read_file(&output_name).await
        }
        .await;

        // The namespace is reused by later operations; purge on every path.
        discard(engine.as_ref(), vec![input_name, output_name]).await;

        match outcome {
            Ok(data) => {
                reporter.finish();
                tracing::info!(%job, bytes = data.len(), "conversion completed");
                Ok(ConvertedMedia {
                    data,
                    mime_type: mime_type(&options.output_format),
                })
            }
            Err(e) => {
                tracing::error!(%job, error = %e, "conversion failed");
                Err(SessionError::Conversion(CONVERT_FAILED_MESSAGE.to_string()))
            }
        }
    }

    /// Concatenate files in order without re-encoding.
    pub async fn merge_videos(
        &self,
        files: &[SourceFile],
        output_format: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<ConvertedMedia, SessionError> {
        let engine = self.engine().await?;
        let _running = self.busy.try_lock().map_err(|_| SessionError::Busy)?;

        if files.len() < 2 {
            return Err(SessionError::NotEnoughInputs);
        }
        if output_format.trim().is_empty() {
            return Err(SessionError::InvalidOptions(
                OptionsError::MissingOutputFormat,
            ));
        }

        let job = Uuid::new_v4();
        let format = output_format.to_ascii_lowercase();
        let manifest_name = format!("concat-{job}.txt");
        let output_name = format!("out-{job}.{format}");
        let input_names: Vec<String> = files
            .iter()
            .enumerate()
            .map(|(index, file)| format!("in-{job}-{index}.{}", file.extension()))
            .collect();

        let reporter = ProgressReporter::new(on_progress);
        tracing::info!(%job, inputs = files.len(), %format, "starting merge");

        let outcome = async {
            for (file, name) in files.iter().zip(&input_names) {
                engine.write_file(name, &file.data).await?;
            }
            engine
                .write_file(&manifest_name, concat_manifest(&input_names).as_bytes())
                .await?;
            let args = build_concat_args(&manifest_name, &output_name);
            engine.exec(&args, reporter.ratio_sink()).await?;
            engine.read_file(&output_name).await
        }
        .await;

        let mut staged = input_names;
        staged.push(manifest_name);
        staged.push(output_name);
        discard(engine.as_ref(), staged).await;

        match outcome {
            Ok(data) => {
                reporter.finish();
                tracing::info!(%job, bytes = data.len(), "merge completed");
                Ok(ConvertedMedia {
                    data,
                    mime_type: mime_type(&format),
                })
            }
            Err(e) => {
                tracing::error!(%job, error = %e, "merge failed");
                Err(SessionError::Conversion(MERGE_FAILED_MESSAGE.to_string()))
            }
        }
    }

    /// Trim each segment independently, then concatenate the pieces.
    pub async fn merge_segments(
        &self,
        segments: &[VideoSegment],
        output_format: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<ConvertedMedia, SessionError> {
        let engine = self.engine().await?;
        let _running = self.busy.try_lock().map_err(|_| SessionError::Busy)?;

        if segments.len() < 2 {
            return Err(SessionError::NotEnoughInputs);
        }
        if output_format.trim().is_empty() {
            return Err(SessionError::InvalidOptions(
                OptionsError::MissingOutputFormat,
            ));
        }

        let job = Uuid::new_v4();
        let format = output_format.to_ascii_lowercase();
        let manifest_name = format!("concat-{job}.txt");
        let output_name = format!("out-{job}.{format}");

        // Validate and plan every extraction before touching the engine.
        let mut extractions = Vec::with_capacity(segments.len());
        for (index, segment) in segments.iter().enumerate() {
            segment.validate()?;
            let staged_name = format!("seg-in-{job}-{index}.{}", segment.file.extension());
            let trimmed_name = format!("seg-{job}-{index}.{format}");
            let args = build_trim_args(&staged_name, &trimmed_name, &segment.trim)?;
            extractions.push((segment, staged_name, trimmed_name, args));
        }

        let reporter = ProgressReporter::new(on_progress);
        tracing::info!(%job, segments = segments.len(), %format, "starting merge with trim");

        let outcome = async {
            for (segment, staged_name, trimmed_name, args) in &extractions {
                engine.write_file(staged_name, &segment.file.data).await?;
                let result = engine.exec(args, reporter.ratio_sink()).await;
                // The staged original is spent once its piece is cut.
                discard(engine.as_ref(), vec![staged_name.clone()]).await;
                result?;
                tracing::debug!(%job, trimmed = %trimmed_name, "segment extracted");
            }

            let trimmed_names: Vec<String> = extractions
                .iter()
                .map(|(_, _, trimmed_name, _)| trimmed_name.clone())
                .collect();
            engine
                .write_file(&manifest_name, concat_manifest(&trimmed_names).as_bytes())
                .await?;
            let args = build_concat_args(&manifest_name, &output_name);
            engine.exec(&args, reporter.ratio_sink()).await?;
            engine.read_file(&output_name).await
        }
        .await;

        let mut staged: Vec<String> = extractions
            .into_iter()
            .map(|(_, _, trimmed_name, _)| trimmed_name)
            .collect();
        staged.push(manifest_name);
        staged.push(output_name);
        discard(engine.as_ref(), staged).await;

        match outcome {
            Ok(data) => {
                reporter.finish();
                tracing::info!(%job, bytes = data.len(), "merge with trim completed");
                Ok(ConvertedMedia {
                    data,
                    mime_type: mime_type(&format),
                })
            }
            Err(e) => {
                tracing::error!(%job, error = %e, "merge with trim failed");
                Err(SessionError::Conversion(MERGE_FAILED_MESSAGE.to_string()))
            }
        }
    }
}

// Best-effort purge of staged names; a failed delete is logged, never fatal.
async fn discard(engine: &dyn MediaEngine, names: Vec<String>) {
    for name in names {
        if let Err(e) = engine.delete_file(&name).await {
            tracing::warn!(file = %name, error = %e, "failed to clean up staged file");
        }
    }
}

fn percent(ratio: f64) -> u8 {
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}

// One reporter per operation; each execution gets its own ratio sink and
// the caller sees a final 100 on success.
struct ProgressReporter {
    callback: Option<Arc<ProgressCallback>>,
}

impl ProgressReporter {
    fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback: callback.map(Arc::new),
        }
    }

    fn ratio_sink(&self) -> Option<ProgressFn> {
        self.callback.as_ref().map(|callback| {
            let callback = Arc::clone(callback);
            Box::new(move |ratio: f64| (*callback)(percent(ratio))) as ProgressFn
        })
    }

    fn finish(&self) {
        if let Some(callback) = &self.callback {
            (**callback)(100);
        }
    }
}
