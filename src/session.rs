use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::gemini::{GenerationError, Generator};
use crate::models::GeneratedItem;
use crate::tools::{JobOutput, ViewError, ViewRouter, ViewSnapshot};

/// Newest-first, append-only list of the session's artifacts.
#[derive(Debug, Default)]
pub struct SessionStore {
    items: Vec<GeneratedItem>,
}

impl SessionStore {
    pub fn prepend(&mut self, item: GeneratedItem) {
        self.items.insert(0, item);
    }

    pub fn items(&self) -> &[GeneratedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Blob {
    pub bytes: Bytes,
    pub mime_type: String,
}

/// Binary outputs reachable only through their owning session.
#[derive(Debug, Default)]
pub struct BlobStore {
    blobs: HashMap<Uuid, Blob>,
}

impl BlobStore {
    pub fn insert(&mut self, bytes: Bytes, mime_type: String) -> Uuid {
        let id = Uuid::new_v4();
        self.blobs.insert(id, Blob { bytes, mime_type });
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<&Blob> {
        self.blobs.get(id)
    }
}

pub fn blob_url(session_id: Uuid, blob_id: Uuid) -> String {
    format!("/api/sessions/{}/blobs/{}", session_id, blob_id)
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)] View(#[from] ViewError),
    #[error(transparent)] Generation(#[from] GenerationError),
}

/// State of one page load.
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub router: ViewRouter,
    pub gallery: SessionStore,
    pub blobs: BlobStore,
}

#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub gallery_len: usize,
    pub view: Option<ViewSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct SubmitOutcome {
    pub result: String,
    pub item: Option<GeneratedItem>,
    /// Current view, which may no longer be the one that submitted.
    pub view: Option<ViewSnapshot>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            router: ViewRouter::default(),
            gallery: SessionStore::default(),
            blobs: BlobStore::default(),
        }
    }

    pub fn view_snapshot(&self) -> Option<ViewSnapshot> {
        self.router.active().map(|m| m.view.snapshot(m.mount_id, self.gallery.items()))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot { id: self.id, created_at: self.created_at, gallery_len: self.gallery.len(), view: self.view_snapshot() }
    }

    fn materialize(&mut self, output: JobOutput) -> String {
        match output {
            JobOutput::Image(uri) | JobOutput::Text(uri) => uri,
            JobOutput::Video(video) => {
                let blob_id = self.blobs.insert(video.bytes, video.mime_type);
                blob_url(self.id, blob_id)
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self { Self::new() }
}

pub type SharedSession = Arc<Mutex<Session>>;

/// Runs the active tool. The session lock is released while the backend works,
/// so other requests against the session (including navigation) proceed.
pub async fn submit(session: &SharedSession, generator: &dyn Generator) -> Result<SubmitOutcome, SessionError> {
    let (session_id, mount_id, job) = {
        let mut s = session.lock();
        let (mount_id, job) = s.router.prepare()?;
        (s.id, mount_id, job)
    };
    info!("🚀 Session {} running {} job for: {}", session_id, job.label(), job.prompt());

    let outcome = job.run(generator).await;

    let mut s = session.lock();
    match outcome {
        Ok(output) => {
            let result = s.materialize(output);
            let item = job.artifact(&result);
            if let Some(item) = &item {
                s.gallery.prepend(item.clone());
                info!("✅ Session {} gallery now holds {} items", session_id, s.gallery.len());
            }
            s.router.complete(mount_id, Ok(result.clone()));
            Ok(SubmitOutcome { result, item, view: s.view_snapshot() })
        }
        Err(e) => {
            error!("❌ Session {} job failed: {}", session_id, e);
            s.router.complete(mount_id, Err(e.to_string()));
            Err(e.into())
        }
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
}

impl SessionRegistry {
    pub fn create(&self) -> SharedSession {
        let session = Session::new();
        let id = session.id;
        let shared = Arc::new(Mutex::new(session));
        let mut sessions = self.sessions.write();
        sessions.insert(id, shared.clone());
        info!("🆕 Session {} created ({} open)", id, sessions.len());
        shared
    }

    pub fn get(&self, id: &Uuid) -> Option<SharedSession> {
        self.sessions.read().get(id).cloned()
    }

    pub fn remove(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().remove(id).is_some();
        if removed {
            info!("👋 Session {} closed", id);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::VideoOutput;
    use crate::models::{AspectRatio, ItemKind, ToolKind};
    use crate::tools::ToolInput;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tokio::sync::Notify;

    struct Canned;

    #[async_trait]
    impl Generator for Canned {
        async fn generate_image(&self, prompt: &str, _: AspectRatio) -> Result<String, GenerationError> {
            if prompt.contains("fail") { Err(GenerationError::NoImage) } else { Ok(format!("data:image/png;base64,{}", prompt.len())) }
        }
        async fn generate_image_from_image(&self, _: &str, _: &str, _: &str) -> Result<String, GenerationError> {
            Ok("data:image/png;base64,edit".into())
        }
        async fn generate_cost_analysis(&self, _: &str) -> Result<String, GenerationError> {
            Ok("| item | cost |".into())
        }
        async fn generate_video(&self, _: &str) -> Result<VideoOutput, GenerationError> {
            Ok(VideoOutput { bytes: Bytes::from_static(b"mp4"), mime_type: "video/mp4".into() })
        }
    }

    /// Holds every image request until released.
    #[derive(Default)]
    struct Gated {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Generator for Gated {
        async fn generate_image(&self, prompt: &str, _: AspectRatio) -> Result<String, GenerationError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(format!("data:image/png;base64,{}", prompt.len()))
        }
        async fn generate_image_from_image(&self, _: &str, _: &str, _: &str) -> Result<String, GenerationError> {
            Err(GenerationError::NoImage)
        }
        async fn generate_cost_analysis(&self, _: &str) -> Result<String, GenerationError> {
            Err(GenerationError::EmptyText)
        }
        async fn generate_video(&self, _: &str) -> Result<VideoOutput, GenerationError> {
            Err(GenerationError::NoVideo)
        }
    }

    #[test]
    fn store_is_newest_first_and_append_only() {
        let mut store = SessionStore::default();
        let items: Vec<GeneratedItem> = (0..5).map(|i| GeneratedItem::image(format!("u{i}"), &format!("p{i}"))).collect();
        for (k, item) in items.iter().enumerate() {
            store.prepend(item.clone());
            assert_eq!(store.len(), k + 1);
        }
        let prompts: Vec<&str> = store.items().iter().map(|i| i.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["p4", "p3", "p2", "p1", "p0"]);
    }

    fn open(session: &SharedSession, kind: ToolKind, prompt: &str) {
        let mut s = session.lock();
        s.router.select(kind).view.apply_input(ToolInput::Prompt { prompt: prompt.into() }).unwrap();
    }

    #[tokio::test]
    async fn successful_image_submit_lands_in_gallery() {
        let registry = SessionRegistry::default();
        let session = registry.create();
        open(&session, ToolKind::TextToImage, "a red cube on white background");

        let outcome = submit(&session, &Canned).await.unwrap();
        assert!(outcome.result.starts_with("data:image/png;base64,"));
        let s = session.lock();
        assert_eq!(s.gallery.len(), 1);
        assert_eq!(s.gallery.items()[0].kind, ItemKind::Image);
        assert_eq!(s.gallery.items()[0].prompt, "a red cube on white background");
        assert_eq!(outcome.view.unwrap().status.result, Some(outcome.result.clone()));
    }

    #[tokio::test]
    async fn late_outcome_lands_in_gallery_but_not_in_the_new_view() {
        let session: SharedSession = Arc::new(Mutex::new(Session::new()));
        open(&session, ToolKind::TextToImage, "a slow tower");
        let generator = Arc::new(Gated::default());
        let task = tokio::spawn({
            let (session, generator) = (session.clone(), generator.clone());
            async move { submit(&session, generator.as_ref()).await }
        });

        generator.started.notified().await;
        {
            let mut s = session.lock();
            s.router.back();
            s.router.select(ToolKind::TextToImage);
        }
        generator.release.notify_one();
        let outcome = task.await.unwrap().unwrap();

        assert_eq!(outcome.item.as_ref().map(|i| i.prompt.as_str()), Some("a slow tower"));
        let s = session.lock();
        assert_eq!(s.gallery.len(), 1);
        assert_eq!(s.gallery.items()[0].url.as_deref(), Some(outcome.result.as_str()));
        let view = s.view_snapshot().unwrap();
        assert_eq!(view.prompt.as_deref(), Some(""));
        assert_eq!(view.status.result, None);
        assert!(!view.status.loading);
    }

    #[tokio::test]
    async fn failure_stays_in_the_view() {
        let session: SharedSession = Arc::new(Mutex::new(Session::new()));
        open(&session, ToolKind::TextToImage, "please fail");

        let err = submit(&session, &Canned).await.unwrap_err();
        assert!(matches!(err, SessionError::Generation(GenerationError::NoImage)));
        let s = session.lock();
        assert!(s.gallery.is_empty());
        let view = s.view_snapshot().unwrap();
        assert_eq!(view.status.error.as_deref(), Some("no image data returned"));
        assert!(!view.status.loading);
    }

    #[tokio::test]
    async fn cost_reports_are_not_saved() {
        let session: SharedSession = Arc::new(Mutex::new(Session::new()));
        session.lock().router.select(ToolKind::CostAnalysis);
        let outcome = submit(&session, &Canned).await.unwrap();
        assert_eq!(outcome.result, "| item | cost |");
        assert!(outcome.item.is_none());
        assert!(session.lock().gallery.is_empty());
    }

    #[tokio::test]
    async fn video_becomes_a_session_blob() {
        let session: SharedSession = Arc::new(Mutex::new(Session::new()));
        open(&session, ToolKind::Animation, "drone shot");
        let outcome = submit(&session, &Canned).await.unwrap();

        let s = session.lock();
        let prefix = format!("/api/sessions/{}/blobs/", s.id);
        let blob_id: Uuid = outcome.result.strip_prefix(&prefix).unwrap().parse().unwrap();
        assert_eq!(s.blobs.get(&blob_id).unwrap().bytes, Bytes::from_static(b"mp4"));
        assert_eq!(s.gallery.items()[0].kind, ItemKind::Video);
    }

    #[tokio::test]
    async fn gallery_view_has_nothing_to_submit() {
        let session: SharedSession = Arc::new(Mutex::new(Session::new()));
        assert!(matches!(submit(&session, &Canned).await, Err(SessionError::View(ViewError::NoActiveTool))));
        session.lock().router.select(ToolKind::Gallery);
        assert!(matches!(submit(&session, &Canned).await, Err(SessionError::View(ViewError::Unsupported(ToolKind::Gallery)))));
    }

    #[test]
    fn registry_creates_and_removes() {
        let registry = SessionRegistry::default();
        let id = registry.create().lock().id;
        assert!(registry.get(&id).is_some());
        assert!(registry.remove(&id));
        assert!(registry.get(&id).is_none());
        assert!(!registry.remove(&id));
    }
}
