use std::collections::HashSet;

use scenes::{BoundingBox, FrameId};

/// The 3-D view, reached only through fire-and-forget requests from the
/// interactive thread.
pub trait Renderer {
    fn reset_camera_for_bounding_box(&mut self, bounding_box: BoundingBox);

    /// Drop GPU-side caches built for these structures
    fn invalidate_cached_occlusion(&mut self, frames: &HashSet<FrameId>);

    fn reload_structures(&mut self);

    fn redraw(&mut self);
}

/// For headless sessions
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn reset_camera_for_bounding_box(&mut self, _bounding_box: BoundingBox) {}

    fn invalidate_cached_occlusion(&mut self, _frames: &HashSet<FrameId>) {}

    fn reload_structures(&mut self) {}

    fn redraw(&mut self) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum RendererRequest {
    ResetCamera(BoundingBox),
    InvalidateOcclusion(HashSet<FrameId>),
    ReloadStructures,
    Redraw,
}

/// Keeps every request in order
#[derive(Debug, Default, Clone)]
pub struct RecordingRenderer {
    pub requests: Vec<RendererRequest>,
}

impl RecordingRenderer {
    pub fn take(&mut self) -> Vec<RendererRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Frames of every invalidation so far
    pub fn invalidated(&self) -> HashSet<FrameId> {
        self.requests
            .iter()
            .filter_map(|r| match r {
                RendererRequest::InvalidateOcclusion(frames) => Some(frames.iter().copied()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn last_camera_box(&self) -> Option<BoundingBox> {
        self.requests.iter().rev().find_map(|r| match r {
            RendererRequest::ResetCamera(bbox) => Some(*bbox),
            _ => None,
        })
    }
}

impl Renderer for RecordingRenderer {
    fn reset_camera_for_bounding_box(&mut self, bounding_box: BoundingBox) {
        self.requests.push(RendererRequest::ResetCamera(bounding_box));
    }

    fn invalidate_cached_occlusion(&mut self, frames: &HashSet<FrameId>) {
        self.requests
            .push(RendererRequest::InvalidateOcclusion(frames.clone()));
    }

    fn reload_structures(&mut self) {
        self.requests.push(RendererRequest::ReloadStructures);
    }

    fn redraw(&mut self) {
        self.requests.push(RendererRequest::Redraw);
    }
}
