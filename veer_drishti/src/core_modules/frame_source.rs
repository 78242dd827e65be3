// THEORY:
// Frame acquisition is an external concern; the pipeline only needs something that
// can be opened, read frame by frame until it runs dry, and rewound to the start.
// The pipeline turns "end of stream" into a rewind, so a finite source becomes an
// infinite loop of its material.
//
// Two sources ship with the crate:
// - `ImageSequenceSource` walks a directory of still images in lexical order, decoding
//   each with the `image` crate.
// - `MemorySource` replays a fixed list of frames, for tests and synthetic feeds.

use crate::core_modules::frame::Frame;
use crate::error::FrameSourceError;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// A rewindable stream of frames.
pub trait FrameSource: Send {
    /// Prepares the source for reading. Called once when a producer loop starts.
    fn open(&mut self) -> Result<(), FrameSourceError>;

    /// Returns the next frame, or `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError>;

    /// Moves back to the first frame.
    fn rewind(&mut self);

    /// A short human-readable name for logs.
    fn describe(&self) -> String;
}

/// Reads a directory of image files as consecutive frames.
pub struct ImageSequenceSource {
    dir: PathBuf,
    frames: Vec<PathBuf>,
    cursor: usize,
    opened: bool,
}

impl ImageSequenceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            frames: Vec::new(),
            cursor: 0,
            opened: false,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> Result<(), FrameSourceError> {
        let io_err = |source| FrameSourceError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut frames = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && Self::is_image(&path) {
                frames.push(path);
            }
        }
        if frames.is_empty() {
            return Err(FrameSourceError::Empty(self.dir.display().to_string()));
        }
        frames.sort();
        self.frames = frames;
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        if !self.opened {
            return Err(FrameSourceError::NotOpen);
        }
        let Some(path) = self.frames.get(self.cursor).cloned() else {
            return Ok(None);
        };
        // Advance before decoding so an unreadable file is skipped next tick.
        self.cursor += 1;
        let image = image::open(&path).map_err(|source| FrameSourceError::Decode { path, source })?;
        Ok(Some(Frame::from(image.to_rgba8())))
    }

    fn rewind(&mut self) {
        self.cursor = 0;
    }

    fn describe(&self) -> String {
        format!("image sequence {}", self.dir.display())
    }
}

/// Replays a fixed list of frames.
pub struct MemorySource {
    frames: Vec<Frame>,
    cursor: usize,
}

impl MemorySource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames, cursor: 0 }
    }
}

impl FrameSource for MemorySource {
    fn open(&mut self) -> Result<(), FrameSourceError> {
        if self.frames.is_empty() {
            return Err(FrameSourceError::Empty("memory source".to_string()));
        }
        self.cursor = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        let frame = self.frames.get(self.cursor).cloned();
        if frame.is_some() {
            self.cursor += 1;
        }
        Ok(frame)
    }

    fn rewind(&mut self) {
        self.cursor = 0;
    }

    fn describe(&self) -> String {
        format!("memory source ({} frames)", self.frames.len())
    }
}
