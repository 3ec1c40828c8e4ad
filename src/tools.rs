//! Tool views and the router that mounts them.
//!
//! A view only holds form state. Submitting is split so the caller can drop
//! its session lock while the backend works: `prepare` validates and marks
//! the view as loading, the returned [`Job`] runs against a [`Generator`], and
//! `complete` records the outcome if the same view is still mounted.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;
use tracing::{info, warn};

use crate::gemini::{GenerationError, Generator, VideoOutput};
use crate::mask::{CanvasError, MaskCanvas};
use crate::models::{AspectRatio, CostParameters, GeneratedItem, ToolKind};
use crate::upload::{parse_upload, Upload, UploadError};

pub const EDIT_PROMPT_PREFIX: &str = "Fix the area marked in red: ";
pub const ISOMETRIC_PROMPT: &str = "Create a high-quality 3D isometric render view of this architectural design. Show 3 different angles: Front, Side, and Top view on a clean white background. Make it look like a 3D model rendering.";

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("{0}")] InputValidation(String),
    #[error("a request from this view is already running")] Busy,
    #[error("no tool is open")] NoActiveTool,
    #[error("{0:?} does not accept this input")] Unsupported(ToolKind),
    #[error(transparent)] Canvas(#[from] CanvasError),
    #[error(transparent)] Upload(#[from] UploadError),
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CreativityMode {
    #[default]
    Single,
    Double,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolInput {
    Prompt { prompt: String },
    AspectRatio { aspect_ratio: AspectRatio },
    Mode { mode: CreativityMode },
    /// A data URI or raw base64 file content.
    Upload { data: String, #[serde(default)] mime_type: Option<String> },
    CostParameters(CostParameters),
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PointerEventKind {
    Down,
    Move,
    Up,
    Leave,
}

/// A pointer event in on-screen coordinates, with the size the canvas is
/// currently displayed at.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PointerInput {
    pub event: PointerEventKind,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub displayed_width: f32,
    #[serde(default)]
    pub displayed_height: f32,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ViewStatus {
    pub loading: bool,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl ViewStatus {
    fn begin(&mut self) -> Result<(), ViewError> {
        if self.loading {
            return Err(ViewError::Busy);
        }
        self.loading = true;
        self.error = None;
        Ok(())
    }

    fn finish(&mut self, outcome: Result<String, String>) {
        self.loading = false;
        match outcome {
            Ok(result) => self.result = Some(result),
            Err(message) => self.error = Some(message),
        }
    }
}

fn require_prompt(prompt: &str) -> Result<String, ViewError> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(ViewError::InputValidation("prompt is required".into()));
    }
    Ok(trimmed.to_string())
}

#[derive(Default)]
pub struct TextToImageView {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub status: ViewStatus,
}

#[derive(Default)]
pub struct ImageCreativityView {
    pub mode: CreativityMode,
    pub prompt: String,
    pub image: Option<Upload>,
    pub status: ViewStatus,
}

#[derive(Default)]
pub struct ImageEditingView {
    pub prompt: String,
    pub canvas: Option<MaskCanvas>,
    pub status: ViewStatus,
}

#[derive(Default)]
pub struct CostAnalysisView {
    pub params: CostParameters,
    pub status: ViewStatus,
}

#[derive(Default)]
pub struct AnimationView {
    pub prompt: String,
    pub message: String,
    pub status: ViewStatus,
}

#[derive(Default)]
pub struct ImageTo3dView {
    pub image: Option<Upload>,
    pub status: ViewStatus,
}

pub enum ToolView {
    TextToImage(TextToImageView),
    ImageCreativity(ImageCreativityView),
    ImageEditing(ImageEditingView),
    Gallery,
    CostAnalysis(CostAnalysisView),
    Animation(AnimationView),
    ImageTo3d(ImageTo3dView),
}

/// One backend call, detached from the view that prepared it.
#[derive(Debug, Clone)]
pub enum Job {
    TextToImage { prompt: String, aspect_ratio: AspectRatio },
    ImageToImage { prompt: String, instruction: String, base64: String, mime_type: String },
    CostAnalysis { prompt: String },
    Video { prompt: String },
}

pub enum JobOutput {
    Image(String),
    Text(String),
    Video(VideoOutput),
}

impl Job {
    pub async fn run(&self, generator: &dyn Generator) -> Result<JobOutput, GenerationError> {
        match self {
            Job::TextToImage { prompt, aspect_ratio } => generator.generate_image(prompt, *aspect_ratio).await.map(JobOutput::Image),
            Job::ImageToImage { instruction, base64, mime_type, .. } => {
                generator.generate_image_from_image(instruction, base64, mime_type).await.map(JobOutput::Image)
            }
            Job::CostAnalysis { prompt } => generator.generate_cost_analysis(prompt).await.map(JobOutput::Text),
            Job::Video { prompt } => generator.generate_video(prompt).await.map(JobOutput::Video),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Job::TextToImage { .. } => "text-to-image",
            Job::ImageToImage { .. } => "image-to-image",
            Job::CostAnalysis { .. } => "cost-analysis",
            Job::Video { .. } => "video",
        }
    }

    /// What the user asked for, as recorded in the gallery.
    pub fn prompt(&self) -> &str {
        match self {
            Job::TextToImage { prompt, .. }
            | Job::ImageToImage { prompt, .. }
            | Job::CostAnalysis { prompt }
            | Job::Video { prompt } => prompt,
        }
    }

    /// Builds the gallery entry for a finished job; cost reports are not kept.
    pub fn artifact(&self, result: &str) -> Option<GeneratedItem> {
        match self {
            Job::TextToImage { .. } | Job::ImageToImage { .. } => Some(GeneratedItem::image(result.to_string(), self.prompt())),
            Job::Video { .. } => Some(GeneratedItem::video(result.to_string(), self.prompt())),
            Job::CostAnalysis { .. } => None,
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
pub struct ViewSnapshot {
    pub tool: ToolKind,
    pub mount_id: u64,
    pub can_submit: bool,
    #[serde(flatten)]
    pub status: ViewStatus,
    pub prompt: Option<String>,
    pub aspect_ratio: Option<AspectRatio>,
    pub mode: Option<CreativityMode>,
    pub has_image: Option<bool>,
    pub canvas_size: Option<(u32, u32)>,
    pub stroke_count: Option<usize>,
    pub cost_parameters: Option<CostParameters>,
    pub message: Option<String>,
    pub gallery: Option<Vec<GeneratedItem>>,
}

impl ToolView {
    pub fn mount(kind: ToolKind) -> Self {
        match kind {
            ToolKind::TextToImage => ToolView::TextToImage(Default::default()),
            ToolKind::ImageCreativity => ToolView::ImageCreativity(Default::default()),
            ToolKind::ImageEditing => ToolView::ImageEditing(Default::default()),
            ToolKind::Gallery => ToolView::Gallery,
            ToolKind::CostAnalysis => ToolView::CostAnalysis(Default::default()),
            ToolKind::Animation => ToolView::Animation(Default::default()),
            ToolKind::ImageTo3d => ToolView::ImageTo3d(Default::default()),
        }
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            ToolView::TextToImage(_) => ToolKind::TextToImage,
            ToolView::ImageCreativity(_) => ToolKind::ImageCreativity,
            ToolView::ImageEditing(_) => ToolKind::ImageEditing,
            ToolView::Gallery => ToolKind::Gallery,
            ToolView::CostAnalysis(_) => ToolKind::CostAnalysis,
            ToolView::Animation(_) => ToolKind::Animation,
            ToolView::ImageTo3d(_) => ToolKind::ImageTo3d,
        }
    }

    fn status(&self) -> Option<&ViewStatus> {
        match self {
            ToolView::TextToImage(v) => Some(&v.status),
            ToolView::ImageCreativity(v) => Some(&v.status),
            ToolView::ImageEditing(v) => Some(&v.status),
            ToolView::Gallery => None,
            ToolView::CostAnalysis(v) => Some(&v.status),
            ToolView::Animation(v) => Some(&v.status),
            ToolView::ImageTo3d(v) => Some(&v.status),
        }
    }

    fn status_mut(&mut self) -> Option<&mut ViewStatus> {
        match self {
            ToolView::TextToImage(v) => Some(&mut v.status),
            ToolView::ImageCreativity(v) => Some(&mut v.status),
            ToolView::ImageEditing(v) => Some(&mut v.status),
            ToolView::Gallery => None,
            ToolView::CostAnalysis(v) => Some(&mut v.status),
            ToolView::Animation(v) => Some(&mut v.status),
            ToolView::ImageTo3d(v) => Some(&mut v.status),
        }
    }

    pub fn apply_input(&mut self, input: ToolInput) -> Result<(), ViewError> {
        let kind = self.kind();
        match (self, input) {
            (ToolView::TextToImage(v), ToolInput::Prompt { prompt }) => v.prompt = prompt,
            (ToolView::ImageCreativity(v), ToolInput::Prompt { prompt }) => v.prompt = prompt,
            (ToolView::ImageEditing(v), ToolInput::Prompt { prompt }) => v.prompt = prompt,
            (ToolView::Animation(v), ToolInput::Prompt { prompt }) => v.prompt = prompt,
            (ToolView::TextToImage(v), ToolInput::AspectRatio { aspect_ratio }) => v.aspect_ratio = aspect_ratio,
            (ToolView::ImageCreativity(v), ToolInput::Mode { mode }) => v.mode = mode,
            (ToolView::ImageCreativity(v), ToolInput::Upload { data, mime_type }) => {
                v.image = Some(parse_upload(&data, mime_type.as_deref())?);
            }
            (ToolView::ImageTo3d(v), ToolInput::Upload { data, mime_type }) => {
                v.image = Some(parse_upload(&data, mime_type.as_deref())?);
            }
            (ToolView::ImageEditing(v), ToolInput::Upload { data, mime_type }) => {
                let upload = parse_upload(&data, mime_type.as_deref())?;
                let canvas = MaskCanvas::load(&upload.bytes()?)?;
                info!("🖌️ Canvas ready at {}x{}", canvas.width(), canvas.height());
                v.canvas = Some(canvas);
                v.status.result = None;
            }
            (ToolView::CostAnalysis(v), ToolInput::CostParameters(params)) => v.params = params,
            _ => return Err(ViewError::Unsupported(kind)),
        }
        Ok(())
    }

    pub fn pointer(&mut self, input: PointerInput) -> Result<(), ViewError> {
        let kind = self.kind();
        let ToolView::ImageEditing(view) = self else {
            return Err(ViewError::Unsupported(kind));
        };
        let canvas = view.canvas.as_mut().ok_or_else(|| ViewError::InputValidation("upload an image before drawing".into()))?;
        let point = canvas.map_pointer(input.x, input.y, input.displayed_width, input.displayed_height);
        match input.event {
            PointerEventKind::Down => canvas.pointer_down(point),
            PointerEventKind::Move => canvas.pointer_move(point),
            PointerEventKind::Up => canvas.pointer_up(),
            PointerEventKind::Leave => canvas.pointer_leave(),
        }
        Ok(())
    }

    pub fn canvas(&self) -> Option<&MaskCanvas> {
        match self {
            ToolView::ImageEditing(v) => v.canvas.as_ref(),
            _ => None,
        }
    }

    fn validate(&self) -> Result<Job, ViewError> {
        match self {
            ToolView::TextToImage(v) => {
                let prompt = require_prompt(&v.prompt)?;
                Ok(Job::TextToImage { prompt, aspect_ratio: v.aspect_ratio })
            }
            ToolView::ImageCreativity(v) => {
                let image = v.image.as_ref().ok_or_else(|| ViewError::InputValidation("a reference image is required".into()))?;
                let prompt = require_prompt(&v.prompt)?;
                Ok(Job::ImageToImage { instruction: prompt.clone(), prompt, base64: image.base64.clone(), mime_type: image.mime_type.clone() })
            }
            ToolView::ImageEditing(v) => {
                let canvas = v.canvas.as_ref().ok_or_else(|| ViewError::InputValidation("an image is required".into()))?;
                let prompt = require_prompt(&v.prompt)?;
                Ok(Job::ImageToImage {
                    instruction: format!("{}{}", EDIT_PROMPT_PREFIX, prompt),
                    prompt,
                    base64: canvas.export_base64()?,
                    mime_type: "image/png".into(),
                })
            }
            ToolView::CostAnalysis(v) => {
                v.params.validate().map_err(ViewError::InputValidation)?;
                Ok(Job::CostAnalysis { prompt: v.params.build_prompt() })
            }
            ToolView::Animation(v) => Ok(Job::Video { prompt: require_prompt(&v.prompt)? }),
            ToolView::ImageTo3d(v) => {
                let image = v.image.as_ref().ok_or_else(|| ViewError::InputValidation("a plan or elevation image is required".into()))?;
                Ok(Job::ImageToImage {
                    prompt: ISOMETRIC_PROMPT.into(),
                    instruction: ISOMETRIC_PROMPT.into(),
                    base64: image.base64.clone(),
                    mime_type: image.mime_type.clone(),
                })
            }
            ToolView::Gallery => Err(ViewError::Unsupported(ToolKind::Gallery)),
        }
    }

    /// Submit is enabled when nothing is running and the required inputs are present.
    pub fn can_submit(&self) -> bool {
        match self.status() {
            Some(status) if !status.loading => match self {
                // exporting the canvas is not free; presence is enough here
                ToolView::ImageEditing(v) => v.canvas.is_some() && !v.prompt.trim().is_empty(),
                _ => self.validate().is_ok(),
            },
            _ => false,
        }
    }

    pub fn prepare(&mut self) -> Result<Job, ViewError> {
        if self.status().is_some_and(|s| s.loading) {
            return Err(ViewError::Busy);
        }
        let job = self.validate()?;
        if let ToolView::Animation(v) = self {
            v.message = "Generating video (this may take a minute)...".into();
        }
        if let Some(status) = self.status_mut() {
            status.begin()?;
        }
        Ok(job)
    }

    pub fn complete(&mut self, outcome: Result<String, String>) {
        if let ToolView::Animation(v) = self {
            v.message = match &outcome {
                Ok(_) => "Complete!".into(),
                Err(e) => format!("Error: {}", e),
            };
        }
        if let Some(status) = self.status_mut() {
            status.finish(outcome);
        }
    }

    pub fn snapshot(&self, mount_id: u64, gallery: &[GeneratedItem]) -> ViewSnapshot {
        let mut snap = ViewSnapshot {
            tool: self.kind(),
            mount_id,
            can_submit: self.can_submit(),
            status: self.status().cloned().unwrap_or_default(),
            prompt: None,
            aspect_ratio: None,
            mode: None,
            has_image: None,
            canvas_size: None,
            stroke_count: None,
            cost_parameters: None,
            message: None,
            gallery: None,
        };
        match self {
            ToolView::TextToImage(v) => {
                snap.prompt = Some(v.prompt.clone());
                snap.aspect_ratio = Some(v.aspect_ratio);
            }
            ToolView::ImageCreativity(v) => {
                snap.prompt = Some(v.prompt.clone());
                snap.mode = Some(v.mode);
                snap.has_image = Some(v.image.is_some());
            }
            ToolView::ImageEditing(v) => {
                snap.prompt = Some(v.prompt.clone());
                snap.has_image = Some(v.canvas.is_some());
                snap.canvas_size = v.canvas.as_ref().map(|c| (c.width(), c.height()));
                snap.stroke_count = v.canvas.as_ref().map(|c| c.stroke_count());
            }
            ToolView::CostAnalysis(v) => snap.cost_parameters = Some(v.params.clone()),
            ToolView::Animation(v) => {
                snap.prompt = Some(v.prompt.clone());
                snap.message = Some(v.message.clone()).filter(|m| !m.is_empty());
            }
            ToolView::ImageTo3d(v) => snap.has_image = Some(v.image.is_some()),
            ToolView::Gallery => snap.gallery = Some(gallery.to_vec()),
        }
        snap
    }
}

pub struct MountedView {
    pub mount_id: u64,
    pub view: ToolView,
}

/// Active tool, or the dashboard when nothing is mounted.
#[derive(Default)]
pub struct ViewRouter {
    active: Option<MountedView>,
    mounts: u64,
}

impl ViewRouter {
    /// Unmounts whatever is open and mounts a fresh view for `kind`.
    pub fn select(&mut self, kind: ToolKind) -> &mut MountedView {
        self.mounts += 1;
        info!("🧭 Opening {:?} (mount {})", kind, self.mounts);
        self.active.insert(MountedView { mount_id: self.mounts, view: ToolView::mount(kind) })
    }

    pub fn back(&mut self) {
        if let Some(mounted) = self.active.take() {
            info!("🧭 Closing {:?} (mount {})", mounted.view.kind(), mounted.mount_id);
        }
    }

    pub fn active(&self) -> Option<&MountedView> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Result<&mut MountedView, ViewError> {
        self.active.as_mut().ok_or(ViewError::NoActiveTool)
    }

    pub fn prepare(&mut self) -> Result<(u64, Job), ViewError> {
        let mounted = self.active_mut()?;
        let job = mounted.view.prepare()?;
        Ok((mounted.mount_id, job))
    }

    /// Records an outcome into the view that prepared it. Returns false when
    /// that view has since been unmounted.
    pub fn complete(&mut self, mount_id: u64, outcome: Result<String, String>) -> bool {
        match self.active.as_mut() {
            Some(mounted) if mounted.mount_id == mount_id => {
                mounted.view.complete(outcome);
                true
            }
            _ => {
                warn!("🧭 Mount {} is gone; dropping its view outcome", mount_id);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn png_upload(w: u32, h: u32) -> String {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([200, 200, 200, 255]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        crate::upload::png_data_uri(&crate::upload::encode_base64(buf.get_ref()))
    }

    #[test]
    fn empty_prompt_keeps_submit_disabled() {
        let mut view = ToolView::mount(ToolKind::ImageEditing);
        view.apply_input(ToolInput::Upload { data: png_upload(16, 16), mime_type: None }).unwrap();
        assert!(!view.can_submit());
        assert!(matches!(view.prepare(), Err(ViewError::InputValidation(_))));

        view.apply_input(ToolInput::Prompt { prompt: "   ".into() }).unwrap();
        assert!(!view.can_submit());

        view.apply_input(ToolInput::Prompt { prompt: "add a window".into() }).unwrap();
        assert!(view.can_submit());
    }

    #[test]
    fn editing_job_carries_flattened_png_and_marked_region_instruction() {
        let mut view = ToolView::mount(ToolKind::ImageEditing);
        view.apply_input(ToolInput::Upload { data: png_upload(40, 30), mime_type: None }).unwrap();
        view.apply_input(ToolInput::Prompt { prompt: "change material to wood".into() }).unwrap();
        for (event, x) in [(PointerEventKind::Down, 5.0), (PointerEventKind::Move, 20.0), (PointerEventKind::Up, 0.0)] {
            view.pointer(PointerInput { event, x, y: 15.0, displayed_width: 40.0, displayed_height: 30.0 }).unwrap();
        }
        let Job::ImageToImage { prompt, instruction, mime_type, base64 } = view.prepare().unwrap() else {
            panic!("expected an image-to-image job");
        };
        assert_eq!(prompt, "change material to wood");
        assert_eq!(instruction, "Fix the area marked in red: change material to wood");
        assert_eq!(mime_type, "image/png");
        let bytes = crate::upload::decode_base64(&base64).unwrap();
        let flattened = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(flattened.get_pixel(10, 15), &image::Rgba([228, 100, 100, 255]));
    }

    #[test]
    fn second_submit_while_loading_is_busy() {
        let mut view = ToolView::mount(ToolKind::TextToImage);
        view.apply_input(ToolInput::Prompt { prompt: "a red cube on white background".into() }).unwrap();
        let job = view.prepare().unwrap();
        assert!(matches!(job, Job::TextToImage { aspect_ratio: AspectRatio::Square, .. }));
        assert!(!view.can_submit());
        assert!(matches!(view.prepare(), Err(ViewError::Busy)));
    }

    #[test]
    fn failure_keeps_previous_result() {
        let mut view = ToolView::mount(ToolKind::ImageCreativity);
        view.apply_input(ToolInput::Upload { data: png_upload(8, 8), mime_type: None }).unwrap();
        view.apply_input(ToolInput::Prompt { prompt: "make it brutalist".into() }).unwrap();
        view.prepare().unwrap();
        view.complete(Ok("data:image/png;base64,first".into()));
        view.prepare().unwrap();
        view.complete(Err("no image data returned".into()));

        let snap = view.snapshot(1, &[]);
        assert_eq!(snap.status.result.as_deref(), Some("data:image/png;base64,first"));
        assert_eq!(snap.status.error.as_deref(), Some("no image data returned"));
        assert!(!snap.status.loading);
    }

    #[test]
    fn text_and_video_views_keep_result_across_a_failed_retry() {
        for kind in [ToolKind::TextToImage, ToolKind::Animation] {
            let mut view = ToolView::mount(kind);
            view.apply_input(ToolInput::Prompt { prompt: "a glass pavilion".into() }).unwrap();
            view.prepare().unwrap();
            view.complete(Ok("first".into()));

            view.prepare().unwrap();
            assert_eq!(view.snapshot(1, &[]).status.result.as_deref(), Some("first"));
            view.complete(Err("backend unavailable".into()));

            let snap = view.snapshot(1, &[]);
            assert_eq!(snap.status.result.as_deref(), Some("first"), "{:?}", kind);
            assert_eq!(snap.status.error.as_deref(), Some("backend unavailable"));
        }
    }

    #[test]
    fn cost_view_validates_parameters() {
        let mut view = ToolView::mount(ToolKind::CostAnalysis);
        assert!(view.can_submit());
        let bad = CostParameters { floors: 0, ..CostParameters::default() };
        view.apply_input(ToolInput::CostParameters(bad)).unwrap();
        assert!(!view.can_submit());
        assert!(matches!(view.prepare(), Err(ViewError::InputValidation(_))));
    }

    #[test]
    fn inputs_that_do_not_fit_the_view_are_rejected() {
        let mut view = ToolView::mount(ToolKind::Gallery);
        assert!(matches!(view.apply_input(ToolInput::Prompt { prompt: "x".into() }), Err(ViewError::Unsupported(ToolKind::Gallery))));
        assert!(!view.can_submit());
        let mut view = ToolView::mount(ToolKind::TextToImage);
        let pointer = PointerInput { event: PointerEventKind::Down, x: 0.0, y: 0.0, displayed_width: 0.0, displayed_height: 0.0 };
        assert!(matches!(view.pointer(pointer), Err(ViewError::Unsupported(ToolKind::TextToImage))));
    }

    #[test]
    fn router_drops_outcomes_for_unmounted_views() {
        let mut router = ViewRouter::default();
        router.select(ToolKind::TextToImage);
        router.active_mut().unwrap().view.apply_input(ToolInput::Prompt { prompt: "tower".into() }).unwrap();
        let (mount_id, _job) = router.prepare().unwrap();

        router.back();
        assert!(router.active().is_none());
        let fresh = router.select(ToolKind::TextToImage).mount_id;
        assert_ne!(fresh, mount_id);

        assert!(!router.complete(mount_id, Ok("data:image/png;base64,late".into())));
        let snap = router.active().unwrap().view.snapshot(fresh, &[]);
        assert_eq!(snap.status.result, None);
        assert_eq!(snap.prompt.as_deref(), Some(""));
    }

    #[test]
    fn animation_reports_progress_messages() {
        let mut view = ToolView::mount(ToolKind::Animation);
        view.apply_input(ToolInput::Prompt { prompt: "drone shot of a glass house".into() }).unwrap();
        view.prepare().unwrap();
        assert_eq!(view.snapshot(1, &[]).message.as_deref(), Some("Generating video (this may take a minute)..."));
        view.complete(Err("no video generated".into()));
        assert_eq!(view.snapshot(1, &[]).message.as_deref(), Some("Error: no video generated"));
    }
}
