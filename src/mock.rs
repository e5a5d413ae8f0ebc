//! Line double for running a station without hardware.

use std::vec::Vec;

use crate::link::{Line, Word, Direction};


/// records everything the driver puts on the line
#[derive(Debug, Default)]
pub struct MockLine {
    /// words written, in order
    pub written: Vec<Word>,
    /// current transceiver direction
    pub direction: Direction,
    /// number of direction changes
    pub switches: usize,
}

impl MockLine {
    pub const fn new() -> Self {
        Self {
            written: Vec::new(),
            direction: Direction::Receive,
            switches: 0,
        }
    }
    /// drain written words as plain bytes, the call flag dropped
    pub fn take_bytes(&mut self) -> Vec<u8> {
        self.written.drain(..).map(|word| word.byte).collect()
    }
    /// drain written words
    pub fn take_words(&mut self) -> Vec<Word> {
        core::mem::take(&mut self.written)
    }
}

impl Line for MockLine {
    fn set_direction(&mut self, direction: Direction) {
        if direction != self.direction {
            self.switches += 1;
        }
        self.direction = direction;
    }
    fn write(&mut self, word: Word) {
        self.written.push(word);
    }
}
