//! Burst arithmetic shared by the blocking and resumable paths

/// One page-bounded slice of a larger write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Burst {
    /// Device address of the first byte
    pub address: u32,
    /// Offset of the first byte within the source buffer
    pub offset: usize,
    /// Number of bytes
    pub len: usize,
}

/// First page boundary strictly above `position`
#[inline]
fn next_boundary(position: u32, page_size: u32) -> u32 {
    (position / page_size + 1) * page_size
}

/// Number of pages touched by `len` bytes starting at `start`
pub fn pages_spanned(start: u32, len: usize, page_size: u32) -> usize {
    if len == 0 {
        return 0;
    }
    let last = start + len as u32 - 1;
    (last / page_size - start / page_size) as usize + 1
}

/// Iterator over the bursts of one write
#[derive(Debug, Clone)]
pub struct Bursts {
    start: u32,
    position: u32,
    next_boundary: u32,
    end: u32,
    page_size: u32,
}

impl Bursts {
    pub fn new(start: u32, len: usize, page_size: u32) -> Self {
        Self {
            start,
            position: start,
            next_boundary: next_boundary(start, page_size),
            end: start + len as u32,
            page_size,
        }
    }
}

impl Iterator for Bursts {
    type Item = Burst;

    fn next(&mut self) -> Option<Burst> {
        if self.position >= self.end {
            return None;
        }

        let len = (self.next_boundary - self.position).min(self.end - self.position);
        let burst = Burst {
            address: self.position,
            offset: (self.position - self.start) as usize,
            len: len as usize,
        };

        self.position += len;
        self.next_boundary = next_boundary(self.position, self.page_size);

        Some(burst)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = pages_spanned(
            self.position,
            (self.end.saturating_sub(self.position)) as usize,
            self.page_size,
        );
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Bursts {}

/// State of an in-flight resumable write
///
/// Holds its own copy of the source so the caller's buffer stays free
/// between calls; the bytes landing on the device are the ones captured
/// when the write started.
#[derive(Debug, Clone)]
pub struct WriteCursor {
    source: Vec<u8>,
    bursts: Bursts,
}

impl WriteCursor {
    pub fn new(destination: u32, source: &[u8], page_size: u32) -> Self {
        Self {
            source: source.to_vec(),
            bursts: Bursts::new(destination, source.len(), page_size),
        }
    }

    /// Destination start address
    pub fn destination(&self) -> u32 {
        self.bursts.start
    }

    /// Next byte to be written
    pub fn position(&self) -> u32 {
        self.bursts.position
    }

    pub fn next_boundary(&self) -> u32 {
        self.bursts.next_boundary
    }

    /// One past the last byte
    pub fn end(&self) -> u32 {
        self.bursts.end
    }

    pub fn is_complete(&self) -> bool {
        self.bursts.position >= self.bursts.end
    }

    /// Next burst together with the bytes it carries
    pub(crate) fn peek(&self) -> Option<(Burst, &[u8])> {
        let burst = self.bursts.clone().next()?;
        Some((burst, &self.source[burst.offset..burst.offset + burst.len]))
    }

    pub(crate) fn advance(&mut self) {
        self.bursts.next();
    }
}
