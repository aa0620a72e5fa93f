//! Chunk buffer implementations.

/// Buffer builder.
pub trait ChunkBufferBuilder: Default {
    type Buffer: ChunkBuffer;

    /// Creates a new buffer.
    fn build(&self) -> Self::Buffer;
}

/// Base limited buffer interface. A buffer holds the lines of a single chunk until it is persisted.
pub trait ChunkBuffer: IntoIterator<Item = String> {
    /// Adds a new line to the buffer.
    fn push(&mut self, line: String);

    /// Returns buffer length
    fn len(&self) -> usize;

    /// Checks if the buffer is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks if the buffer reached the limit.
    fn is_full(&self) -> bool;

    /// Sorts buffered lines in bytewise lexicographic order.
    fn sort(&mut self);
}

pub struct LimitedBufferBuilder {
    buffer_limit: usize,
    preallocate: bool,
}

impl LimitedBufferBuilder {
    pub fn new(buffer_limit: usize, preallocate: bool) -> Self {
        LimitedBufferBuilder {
            buffer_limit,
            preallocate,
        }
    }

    /// Returns the number of lines a built buffer holds before it is full.
    pub fn limit(&self) -> usize {
        self.buffer_limit
    }
}

impl ChunkBufferBuilder for LimitedBufferBuilder {
    type Buffer = LimitedBuffer;

    fn build(&self) -> Self::Buffer {
        if self.preallocate {
            LimitedBuffer::with_capacity(self.buffer_limit)
        } else {
            LimitedBuffer::new(self.buffer_limit)
        }
    }
}

impl Default for LimitedBufferBuilder {
    fn default() -> Self {
        LimitedBufferBuilder {
            buffer_limit: crate::sort::DEFAULT_CHUNK_SIZE,
            preallocate: false,
        }
    }
}

/// Buffer limited by lines count.
pub struct LimitedBuffer {
    limit: usize,
    inner: Vec<String>,
}

impl LimitedBuffer {
    pub fn new(limit: usize) -> Self {
        LimitedBuffer {
            limit,
            inner: Vec::new(),
        }
    }

    pub fn with_capacity(limit: usize) -> Self {
        LimitedBuffer {
            limit,
            inner: Vec::with_capacity(limit),
        }
    }
}

impl ChunkBuffer for LimitedBuffer {
    fn push(&mut self, line: String) {
        self.inner.push(line);
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn is_full(&self) -> bool {
        self.inner.len() >= self.limit
    }

    fn sort(&mut self) {
        // String ordering is bytewise over the UTF-8 encoding
        self.inner.sort_unstable();
    }
}

impl IntoIterator for LimitedBuffer {
    type Item = String;
    type IntoIter = <Vec<String> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

#[cfg(test)]
mod test {
    use super::{ChunkBuffer, ChunkBufferBuilder, LimitedBufferBuilder};

    #[test]
    fn test_limited_buffer() {
        let builder = LimitedBufferBuilder::new(2, true);
        let mut buffer = builder.build();

        assert!(buffer.is_empty());
        buffer.push("b".to_string());
        assert_eq!(buffer.is_full(), false);
        buffer.push("a".to_string());
        assert_eq!(buffer.is_full(), true);

        let data = Vec::from_iter(buffer);
        assert_eq!(data, vec!["b", "a"]);
    }

    #[test]
    fn test_limited_buffer_sort() {
        let mut buffer = LimitedBufferBuilder::new(8, false).build();
        for line in ["banana", "Apple", "apple", "", "apple", "äpple"] {
            buffer.push(line.to_string());
        }

        buffer.sort();

        let data = Vec::from_iter(buffer);
        assert_eq!(data, vec!["", "Apple", "apple", "apple", "banana", "äpple"]);
    }
}
