use crate::Error;
use crate::record::Segment;

/// Number of elements per chunk used when the caller asks for the default chunk size.
pub const DEFAULT_CHUNK_SIZE: usize = 1_000_000;

/// How a tensor is split into records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkSize {
    /// A single record covering the whole tensor.
    NoChunking,
    /// The chunk size of the active configuration.
    #[default]
    Default,
    /// A fixed number of elements per record.
    Elements(usize),
}

impl ChunkSize {
    /// Number of elements per chunk for a tensor of `numel` elements.
    ///
    /// [NoChunking](ChunkSize::NoChunking) resolves to `numel + 1` so that even an empty tensor
    /// yields exactly one chunk.
    pub fn resolve(self, numel: usize, default: usize) -> Result<usize, Error> {
        let size = match self {
            ChunkSize::NoChunking => numel.saturating_add(1),
            ChunkSize::Default => default,
            ChunkSize::Elements(size) => size,
        };

        if size == 0 {
            return Err(Error::InvalidChunkSize);
        }

        Ok(size)
    }
}

/// Half-open range `[begin, end)` over a tensor's flattened elements.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// First element.
    pub begin: usize,
    /// One past the last element.
    pub end: usize,
}

impl Chunk {
    /// Number of elements covered.
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    /// Returns true if the chunk covers no element.
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// Checked chunk for a record segment, the whole tensor when there is none.
    pub fn from_segment(segment: Option<&Segment>, numel: usize) -> Result<Self, Error> {
        let Some(segment) = segment else {
            return Ok(Self::new(0, numel));
        };

        let invalid = || Error::InvalidRange {
            begin: segment.begin,
            end: segment.end,
            numel,
        };
        let begin = usize::try_from(segment.begin).map_err(|_| invalid())?;
        let end = usize::try_from(segment.end).map_err(|_| invalid())?;

        if begin > end || end > numel {
            return Err(invalid());
        }

        Ok(Self::new(begin, end))
    }

    /// The chunk as a record segment.
    pub fn to_segment(self) -> Segment {
        Segment::new(self.begin as i64, self.end as i64)
    }
}

/// Partition of `[0, max(numel, 1))` into chunks of `chunk_size` elements.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    numel: usize,
    chunk_size: usize,
}

impl ChunkPlan {
    /// Elements per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.numel.max(1).div_ceil(self.chunk_size)
    }

    /// Always false: an empty tensor still yields one chunk.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns true if the chunks are worth spreading over worker threads.
    pub fn is_parallel(&self) -> bool {
        self.numel > self.chunk_size
    }

    /// Index of the chunk starting at `begin`, used in chunk record names.
    pub fn index_of(&self, begin: usize) -> usize {
        begin / self.chunk_size
    }

    /// The chunk starting at `begin`, clipped to the tensor.
    pub fn chunk_at(&self, begin: usize) -> Chunk {
        let begin = begin.min(self.numel);
        Chunk::new(begin, begin.saturating_add(self.chunk_size).min(self.numel))
    }

    /// First element of every chunk, in increasing order.
    pub fn starts(&self) -> impl Iterator<Item = usize> + use<> {
        (0..self.numel.max(1)).step_by(self.chunk_size)
    }

    /// Every chunk, in increasing order.
    pub fn chunks(&self) -> impl Iterator<Item = Chunk> + use<> {
        let plan = *self;
        self.starts().map(move |begin| plan.chunk_at(begin))
    }
}
