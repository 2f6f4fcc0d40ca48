use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use project::{CancellationToken, LazySource, ProjectNodeId};
use scenes::{FormatTag, SceneList};

use crate::{DecodeError, Domain, OperationGate, Sequence};

/// Turns raw bytes of one or more formats into a scene list. Only ever
/// called from background workers.
pub trait FormatDecoder: Send + Sync {
    fn formats(&self) -> &[FormatTag];

    fn decode(&self, name: &str, bytes: &[u8]) -> Result<SceneList, DecodeError>;
}

/// Serialized scene lists written by this editor
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeArchiveDecoder;

impl FormatDecoder for NativeArchiveDecoder {
    fn formats(&self) -> &[FormatTag] {
        &[FormatTag::Native]
    }

    fn decode(&self, name: &str, bytes: &[u8]) -> Result<SceneList, DecodeError> {
        let mut list: SceneList =
            serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        // selections are not stored; start at the first item of every level
        if let Some(first) = list.scenes.first().map(|s| s.id) {
            list.selection.select_only(first);
        }
        for scene in &mut list.scenes {
            if let Some(first) = scene.movies.first().map(|m| m.id) {
                scene.selection.select_only(first);
            }
            for movie in &mut scene.movies {
                movie.select_frame_at(0);
            }
        }
        Ok(list)
    }
}

pub fn encode_native(list: &SceneList) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec_pretty(list)
}

#[derive(Clone, Default)]
pub struct DecoderRegistry {
    decoders: Vec<Arc<dyn FormatDecoder>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that knows the native archive format
    pub fn with_native() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(NativeArchiveDecoder));
        registry
    }

    /// Later registrations win for formats claimed twice
    pub fn register(&mut self, decoder: Arc<dyn FormatDecoder>) {
        self.decoders.insert(0, decoder);
    }

    pub fn supports(&self, format: FormatTag) -> bool {
        self.decoder_for(format).is_some()
    }

    pub fn decoder_for(&self, format: FormatTag) -> Option<&Arc<dyn FormatDecoder>> {
        self.decoders.iter().find(|d| d.formats().contains(&format))
    }

    pub fn decode(&self, name: &str, source: &LazySource) -> Result<SceneList, DecodeError> {
        let decoder = self
            .decoder_for(source.format)
            .ok_or(DecodeError::UnsupportedFormat(source.format))?;
        decoder.decode(name, &source.bytes)
    }
}

/// Work order for one placeholder or lazy node
#[derive(Debug, Clone)]
pub struct DecodeRequest {
    pub target: ProjectNodeId,
    pub name: String,
    pub source: LazySource,
    pub token: CancellationToken,
}

/// Outcome of a decode, delivered back to the interactive side
#[derive(Debug)]
pub struct Completion {
    pub target: ProjectNodeId,
    pub name: String,
    pub token: CancellationToken,
    pub result: Result<SceneList, DecodeError>,
}

/// Runs decodes on the gate's executors and collects their completions in
/// the order they finish.
pub struct DecodeQueue {
    gate: OperationGate,
    registry: DecoderRegistry,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl DecodeQueue {
    pub fn new(gate: OperationGate, registry: DecoderRegistry) -> Self {
        let (tx, rx) = unbounded();
        Self {
            gate,
            registry,
            tx,
            rx,
        }
    }

    pub fn gate(&self) -> &OperationGate {
        &self.gate
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    /// Decode as part of an admitted sequence
    pub fn submit(&self, sequence: &Sequence, request: DecodeRequest) {
        self.submit_in(sequence.domain(), request);
    }

    pub fn submit_in(&self, domain: Domain, request: DecodeRequest) {
        let registry = self.registry.clone();
        let tx = self.tx.clone();
        tracing::debug!(name = %request.name, %domain, "decode queued");
        self.gate.spawn(domain, move || {
            let completion = run_decode(&registry, request);
            if tx.send(completion).is_err() {
                tracing::debug!("completion dropped, queue is gone");
            }
        });
    }

    /// Everything that has finished so far
    pub fn drain(&self) -> Vec<Completion> {
        self.rx.try_iter().collect()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Completion> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// Decode synchronously; used by the workers and for small lazy payloads
pub fn run_decode(registry: &DecoderRegistry, request: DecodeRequest) -> Completion {
    let DecodeRequest {
        target,
        name,
        source,
        token,
    } = request;
    let result = if token.is_cancelled() {
        Err(DecodeError::Cancelled)
    } else {
        registry.decode(&name, &source)
    };
    if let Err(err) = &result {
        tracing::debug!(%name, error = %err, "decode did not produce a project");
    }
    Completion {
        target,
        name,
        token,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenes::{BoundingBox, Frame, FramePayload, Movie};

    fn archive() -> Vec<u8> {
        let frames = vec![
            Frame::new("a", FramePayload::new(FormatTag::Native, 2, BoundingBox::default())),
            Frame::new("b", FramePayload::new(FormatTag::Native, 2, BoundingBox::default())),
        ];
        let list = SceneList::from_movie("water", Movie::with_frames("water", frames));
        encode_native(&list).unwrap()
    }

    fn request(bytes: Vec<u8>, format: FormatTag) -> DecodeRequest {
        DecodeRequest {
            target: ProjectNodeId::new(),
            name: "water".into(),
            source: LazySource::new(format, bytes),
            token: CancellationToken::new(),
        }
    }

    #[test]
    fn native_archive_decodes_with_fresh_selection() {
        let completion = run_decode(&DecoderRegistry::with_native(), request(archive(), FormatTag::Native));
        let list = completion.result.unwrap();
        assert_eq!(list.movie_count(), 1);
        assert_eq!(list.scenes[0].movies[0].selected_frame_index(), Some(0));
        list.check_invariants().unwrap();
    }

    #[test]
    fn unknown_format_and_garbage_fail() {
        let registry = DecoderRegistry::with_native();
        let completion = run_decode(&registry, request(archive(), FormatTag::Molecular));
        assert_eq!(
            completion.result.unwrap_err(),
            DecodeError::UnsupportedFormat(FormatTag::Molecular)
        );
        let completion = run_decode(&registry, request(b"not json".to_vec(), FormatTag::Native));
        assert!(matches!(completion.result, Err(DecodeError::Malformed { .. })));
    }

    #[test]
    fn cancelled_request_skips_decoding() {
        let req = request(archive(), FormatTag::Native);
        req.token.cancel();
        let completion = run_decode(&DecoderRegistry::with_native(), req);
        assert_eq!(completion.result.unwrap_err(), DecodeError::Cancelled);
    }

    #[test]
    fn inline_queue_delivers_immediately() {
        let queue = DecodeQueue::new(OperationGate::inline(), DecoderRegistry::with_native());
        let seq = queue.gate().try_begin(Domain::DragAndDrop).unwrap();
        queue.submit(&seq, request(archive(), FormatTag::Native));
        queue.submit(&seq, request(b"{".to_vec(), FormatTag::Native));
        let done = queue.drain();
        assert_eq!(done.len(), 2);
        assert!(done[0].result.is_ok());
        assert!(done[1].result.is_err());
    }
}
