//! Fixed-capacity pulse ring used by the receive path

/// Pulses kept while waiting for a frame separator
pub const RING_CAPACITY: usize = 200;

/// Ring of the most recent pulse widths, overwriting the oldest when full
#[derive(Debug, Clone)]
pub struct PulseRing {
    buf: [u8; RING_CAPACITY],
    /// Next write index
    pos: usize,
    len: usize,
}

impl Default for PulseRing {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseRing {
    pub const fn new() -> Self {
        Self {
            buf: [0; RING_CAPACITY],
            pos: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, pulse: u8) {
        self.buf[self.pos] = pulse;
        self.pos = (self.pos + 1) % RING_CAPACITY;
        if self.len < RING_CAPACITY {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Forget the stored pulses; the write index is kept
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Index of the oldest stored pulse
    fn start(&self) -> usize {
        (self.pos + RING_CAPACITY - self.len) % RING_CAPACITY
    }

    /// Close the current frame with `separator`
    ///
    /// The separator takes the slot after the newest pulse, which drops the
    /// oldest pulse from the frame. The returned frame keeps the ring length
    /// and ends with the separator.
    pub fn close_frame(&mut self, separator: u8) -> &[u8] {
        self.buf[self.pos] = separator;
        let rotation = (self.start() + 1) % RING_CAPACITY;
        self.buf.rotate_left(rotation);
        self.pos = self.len % RING_CAPACITY;
        &self.buf[..self.len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stored pulses, oldest first
    fn contents(ring: &PulseRing) -> Vec<u8> {
        (0..ring.len())
            .map(|i| ring.buf[(ring.start() + i) % RING_CAPACITY])
            .collect()
    }

    #[test]
    fn test_push_and_read_in_order() {
        let mut ring = PulseRing::new();
        for pulse in [3, 1, 4, 1, 5] {
            ring.push(pulse);
        }
        assert_eq!(ring.len(), 5);
        assert_eq!(contents(&ring), vec![3, 1, 4, 1, 5]);
    }

    #[test]
    fn test_overflow_keeps_most_recent() {
        let mut ring = PulseRing::new();
        for i in 0..250u32 {
            ring.push(i as u8);
        }
        assert_eq!(ring.len(), RING_CAPACITY);

        let expected: Vec<u8> = (50..250u32).map(|i| i as u8).collect();
        assert_eq!(contents(&ring), expected);
    }

    #[test]
    fn test_close_frame_drops_oldest_and_appends_separator() {
        let mut ring = PulseRing::new();
        for pulse in [9, 10, 20, 30] {
            ring.push(pulse);
        }
        assert_eq!(ring.close_frame(120), &[10, 20, 30, 120]);
    }

    #[test]
    fn test_close_frame_when_full() {
        let mut ring = PulseRing::new();
        for i in 0..230u32 {
            ring.push(i as u8);
        }
        let frame = ring.close_frame(120).to_vec();
        assert_eq!(frame.len(), RING_CAPACITY);
        assert_eq!(frame[0], 31);
        assert_eq!(frame[RING_CAPACITY - 2], 229);
        assert_eq!(frame[RING_CAPACITY - 1], 120);
    }

    #[test]
    fn test_clear_resets_length_only() {
        let mut ring = PulseRing::new();
        ring.push(1);
        ring.push(2);
        ring.clear();
        assert!(ring.is_empty());
        ring.push(7);
        assert_eq!(contents(&ring), vec![7]);
    }
}
