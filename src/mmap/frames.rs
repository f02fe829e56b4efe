//! Zero-copy frame extraction from mapped media files.
//!
//! A [`FrameSource`] describes where frames live. Sources with a fixed
//! on-disk layout ([`FrameLayout`]) get their frames served as slices of a
//! shared read-only mapping; everything else is decoded frame by frame
//! into owned buffers. Either way the caller receives [`FrameBytes`] and
//! a [`FrameMapStatus`] describing how complete the extraction was.

use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};
use memmap2::Mmap;

use crate::common::Result;
use crate::mmap::{MapMode, MappedHandle, MappingCache};

/// Fixed on-disk layout of a raw frame file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Bytes before the first frame.
    pub header_bytes: usize,
    /// Distance between consecutive frame starts.
    pub frame_stride: usize,
    /// Payload bytes per frame (at most `frame_stride`).
    pub frame_bytes: usize,
}

impl FrameLayout {
    /// Byte offset of frame `index`.
    pub fn frame_offset(&self, index: usize) -> usize {
        self.header_bytes + index * self.frame_stride
    }
}

/// A provider of video frames.
///
/// `raw_layout` advertises a fixed layout when the backing file can be
/// sliced directly; sources without one (compressed containers, remote
/// streams) serve frames through `read_frame`.
pub trait FrameSource {
    /// Total frames available.
    fn frame_count(&self) -> usize;

    /// Bytes per decoded frame.
    fn frame_size(&self) -> usize;

    /// Decode one frame into an owned buffer.
    fn read_frame(&mut self, index: usize) -> Result<Vec<u8>>;

    /// Fixed layout of the backing file, if frames can be mapped in place.
    fn raw_layout(&self) -> Option<FrameLayout> {
        None
    }
}

/// The bytes of one extracted frame.
pub enum FrameBytes {
    /// A slice of a shared file mapping. The mapping stays alive as long
    /// as any frame referencing it does.
    Mapped {
        map: Arc<Mmap>,
        offset: usize,
        len: usize,
    },
    /// A decoded copy.
    Owned(Vec<u8>),
}

impl FrameBytes {
    /// The frame payload.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            FrameBytes::Mapped { map, offset, len } => &map[*offset..*offset + *len],
            FrameBytes::Owned(data) => data,
        }
    }

    /// Whether this frame aliases the file mapping.
    pub fn is_mapped(&self) -> bool {
        matches!(self, FrameBytes::Mapped { .. })
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        match self {
            FrameBytes::Mapped { len, .. } => *len,
            FrameBytes::Owned(data) => data.len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How complete a frame extraction was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMapStatus {
    /// Every requested frame, served zero-copy from the mapping.
    Mapped,
    /// Every requested frame, served as decoded copies.
    Copied,
    /// Some frames, but fewer than requested.
    Partial,
    /// No frames.
    Empty,
}

/// Result of [`map_video_frames`].
pub struct FrameMapping {
    pub frames: Vec<FrameBytes>,
    pub status: FrameMapStatus,
}

impl FrameMapping {
    fn empty() -> Self {
        Self {
            frames: Vec::new(),
            status: FrameMapStatus::Empty,
        }
    }
}

/// Extract `count` frames starting at `start` from `source`.
///
/// Never fails: an out-of-range request or a source with no frames yields
/// an [`FrameMapStatus::Empty`] mapping, and requests that exceed the
/// available frames are clamped and reported as
/// [`FrameMapStatus::Partial`]. When `path` is given and the source has a
/// raw layout, frames alias a cached read-only mapping of the file;
/// otherwise they are decoded copies.
pub fn map_video_frames(
    cache: &MappingCache,
    source: &mut dyn FrameSource,
    path: Option<&Path>,
    start: usize,
    count: usize,
) -> FrameMapping {
    let total = source.frame_count();
    if count == 0 || start >= total {
        return FrameMapping::empty();
    }
    let available = (total - start).min(count);

    if let (Some(path), Some(layout)) = (path, source.raw_layout()) {
        match try_map_frames(cache, path, layout, start, available) {
            Some(frames) => {
                let status = if available < count {
                    FrameMapStatus::Partial
                } else {
                    FrameMapStatus::Mapped
                };
                debug!(
                    "mapped {} frames from {} ({:?})",
                    frames.len(),
                    path.display(),
                    status
                );
                return FrameMapping { frames, status };
            }
            None => {
                warn!(
                    "raw layout mapping of {} failed, decoding frames instead",
                    path.display()
                );
            }
        }
    }

    copy_frames(source, start, available, count)
}

/// Map frames as slices. Returns `None` if the file cannot be mapped or
/// the layout does not fit inside it.
fn try_map_frames(
    cache: &MappingCache,
    path: &Path,
    layout: FrameLayout,
    start: usize,
    available: usize,
) -> Option<Vec<FrameBytes>> {
    let handle = cache.map_file(path, MapMode::ReadOnly).ok()?;
    let map = match handle {
        MappedHandle::Shared(map) => map,
        MappedHandle::Exclusive(_) => return None,
    };

    let last_end = layout.frame_offset(start + available - 1) + layout.frame_bytes;
    if last_end > map.len() {
        return None;
    }

    Some(
        (start..start + available)
            .map(|index| FrameBytes::Mapped {
                map: Arc::clone(&map),
                offset: layout.frame_offset(index),
                len: layout.frame_bytes,
            })
            .collect(),
    )
}

fn copy_frames(
    source: &mut dyn FrameSource,
    start: usize,
    available: usize,
    requested: usize,
) -> FrameMapping {
    let mut frames = Vec::with_capacity(available);
    for index in start..start + available {
        match source.read_frame(index) {
            Ok(data) => frames.push(FrameBytes::Owned(data)),
            Err(e) => {
                warn!("frame {} unreadable, stopping extraction: {}", index, e);
                break;
            }
        }
    }

    let status = if frames.is_empty() {
        FrameMapStatus::Empty
    } else if frames.len() < requested {
        FrameMapStatus::Partial
    } else {
        FrameMapStatus::Copied
    };
    FrameMapping { frames, status }
}
