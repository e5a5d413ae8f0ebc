use crate::frame::Frame;


/**
    fixed capacity FIFO of frames

    cursors are free running counters, the slot used is the cursor modulo capacity. When full, new frames are rejected and the already queued ones are kept.
*/
pub struct FrameRing<const N: usize> {
    frames: [Frame; N],
    /// position we are reading at
    get: usize,
    /// position we are writing at
    put: usize,
}

impl<const N: usize> FrameRing<N> {
    pub const fn new() -> Self {
        Self {
            frames: [const { Frame::new() }; N],
            get: 0,
            put: 0,
        }
    }
    pub const fn capacity(&self) -> usize {N}
    pub fn len(&self) -> usize {self.put.wrapping_sub(self.get)}
    pub fn is_empty(&self) -> bool {self.len() == 0}
    pub fn is_full(&self) -> bool {self.len() >= N}

    /// queue a frame, false if the ring is full and the frame was dropped
    pub fn push(&mut self, frame: Frame) -> bool {
        if self.is_full()
            {return false}
        self.frames[self.put % N] = frame;
        self.put = self.put.wrapping_add(1);
        true
    }
    /// oldest frame not consumed yet
    pub fn peek(&self) -> Option<&Frame> {
        if self.is_empty()
            {return None}
        Some(&self.frames[self.get % N])
    }
    /// consume the oldest frame without reading it
    pub fn clear_one(&mut self) {
        if self.is_empty()
            {return}
        self.frames[self.get % N].clear();
        self.get = self.get.wrapping_add(1);
    }
    pub fn pop(&mut self) -> Option<Frame> {
        let frame = self.peek()?.clone();
        self.clear_one();
        Some(frame)
    }
    pub fn clear(&mut self) {
        while !self.is_empty() {
            self.clear_one();
        }
    }
}

impl<const N: usize> Default for FrameRing<N> {
    fn default() -> Self {Self::new()}
}
