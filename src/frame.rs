use bilge::prelude::*;

use crate::{
    protocol::{MAX_FRAME, MAX_PAYLOAD},
    station::Error,
    };


/// class of bus cycle selected by a call byte
#[bitsize(2)]
#[derive(Copy, Clone, FromBits, Debug, PartialEq)]
pub enum CallKind {
    /// addressed device must answer with the fixed acknowledge frame
    Acknowledge = 0b00,
    /// feedback broadcast when address is 0
    Feedback = 0b01,
    /// normal inquiry, addressed device may transmit or stay silent
    Inquiry = 0b10,
    /// message for the addressed device, general broadcast when address is 0
    Directed = 0b11,
}

/**
    first word of every bus cycle, sent by the master with the 9th bit set

    `P K K A A A A A`: even parity, call kind, device address
*/
#[bitsize(8)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq)]
pub struct CallByte {
    pub address: u5,
    pub kind: CallKind,
    pub parity: bool,
}

impl CallByte {
    /// build a call byte with its parity bit set
    pub fn with_parity(kind: CallKind, address: u8) -> Self {
        let mut call = Self::new(u5::new(address & 0x1f), kind, false);
        call.set_parity(u8::from(call).count_ones() % 2 == 1);
        call
    }
    pub fn inquiry(address: u8) -> Self       {Self::with_parity(CallKind::Inquiry, address)}
    pub fn ack_request(address: u8) -> Self   {Self::with_parity(CallKind::Acknowledge, address)}
    pub fn directed(address: u8) -> Self      {Self::with_parity(CallKind::Directed, address)}
    pub fn broadcast() -> Self                {Self::with_parity(CallKind::Directed, 0)}
    pub fn feedback() -> Self                 {Self::with_parity(CallKind::Feedback, 0)}

    pub fn has_valid_parity(&self) -> bool {
        u8::from(*self).count_ones() % 2 == 0
    }
    /// true for calls every listener must process
    pub fn is_broadcast(&self) -> bool {
        self.address().value() == 0
        && matches!(self.kind(), CallKind::Directed | CallKind::Feedback)
    }
    /// bus address, hence slot, this call refers to
    pub fn slot(&self) -> u8 {
        self.address().value()
    }
}


/// xor of all given bytes, as expected in the last byte of a frame
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// total frame length (call byte and checksum included) announced by a header byte
pub const fn frame_len(header: u8) -> usize {
    3 + (header & 0x0f) as usize
}


/**
    one bus message: call byte, header, up to 7 data bytes, xor checksum

    the call byte is never part of the checksum. In master mode it is the call that opened the window the frame travelled in, in slave mode it is the call the frame was received after.
*/
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    bytes: heapless::Vec<u8, MAX_FRAME>,
}

impl Frame {
    pub const fn new() -> Self {
        Self {bytes: heapless::Vec::new()}
    }
    /// build a complete frame from header and data, appending the checksum
    pub fn encode(call: CallByte, payload: &[u8]) -> Result<Self, Error> {
        if payload.is_empty() || payload.len() > MAX_PAYLOAD {
            return Err(Error::FrameTooLong);
        }
        let mut frame = Self::new();
        frame.bytes.push(u8::from(call)).map_err(|_| Error::FrameTooLong)?;
        frame.bytes.extend_from_slice(payload).map_err(|_| Error::FrameTooLong)?;
        frame.bytes.push(checksum(payload)).map_err(|_| Error::FrameTooLong)?;
        Ok(frame)
    }
    /// start assembling a received frame after the given call
    pub fn start(call: u8) -> Self {
        let mut frame = Self::new();
        // cannot fail on an empty frame
        let _ = frame.bytes.push(call);
        frame
    }
    /// append a received byte, false if this byte cannot belong to a valid frame
    pub fn push(&mut self, byte: u8) -> bool {
        if let Some(expected) = self.expected_len() {
            if self.bytes.len() >= expected {
                return false;
            }
        }
        if self.bytes.push(byte).is_err() {
            return false;
        }
        match self.expected_len() {
            Some(expected) => expected <= MAX_FRAME,
            None => true,
        }
    }
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn len(&self) -> usize {self.bytes.len()}
    pub fn is_empty(&self) -> bool {self.bytes.is_empty()}
    pub fn as_bytes(&self) -> &[u8] {&self.bytes}

    pub fn call(&self) -> CallByte {
        CallByte::from(self.bytes.first().copied().unwrap_or(0))
    }
    pub fn header(&self) -> Option<u8> {
        self.bytes.get(1).copied()
    }
    /// length announced by the header, if received yet
    pub fn expected_len(&self) -> Option<usize> {
        self.header().map(frame_len)
    }
    /// all announced bytes are present
    pub fn is_complete(&self) -> bool {
        self.expected_len() == Some(self.bytes.len())
    }
    /// header and data bytes
    pub fn payload(&self) -> &[u8] {
        match self.bytes.len() {
            0 ..= 2 => &[],
            n => &self.bytes[1 .. n-1],
        }
    }
    /// data bytes following the header
    pub fn data(&self) -> &[u8] {
        self.payload().get(1 ..).unwrap_or(&[])
    }
    /// recompute the checksum and compare with the trailing byte, only meaningful on complete frames
    pub fn verify(&self) -> bool {
        self.is_complete()
        && self.bytes.last().copied() == Some(checksum(self.payload()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_bytes_match_bus_constants() {
        assert_eq!(u8::from(CallByte::broadcast()), 0x60);
        assert_eq!(u8::from(CallByte::feedback()), 0xa0);
        assert_eq!(u8::from(CallByte::ack_request(26)), 0x9a);
        assert_eq!(u8::from(CallByte::inquiry(31)), 0x5f);
        assert_eq!(u8::from(CallByte::inquiry(1)), 0x41);
        assert_eq!(u8::from(CallByte::inquiry(3)), 0xc3);
        for address in 0 .. 32 {
            assert!(CallByte::inquiry(address).has_valid_parity());
            assert!(CallByte::directed(address).has_valid_parity());
        }
        assert!(!CallByte::from(0xc1).has_valid_parity());
    }

    #[test]
    fn encode_appends_xor() {
        let frame = Frame::encode(CallByte::broadcast(), &[0x61, 0x01]).unwrap();
        assert_eq!(frame.as_bytes(), &[0x60, 0x61, 0x01, 0x60]);
        assert_eq!(frame.len(), 4);
        assert!(frame.is_complete());
        assert!(frame.verify());
        assert_eq!(frame.header(), Some(0x61));
        assert_eq!(frame.data(), &[0x01]);
    }

    #[test]
    fn single_bit_flip_fails_verification() {
        let frame = Frame::encode(CallByte::directed(3), &[0xe4, 0x13, 0xc1, 0x2c, 0x85]).unwrap();
        for index in 1 .. frame.len() {
            for bit in 0 .. 8 {
                let mut corrupted = Frame::start(frame.as_bytes()[0]);
                for (i, &byte) in frame.as_bytes().iter().enumerate().skip(1) {
                    corrupted.push(if i == index {byte ^ (1 << bit)} else {byte});
                }
                assert!(!corrupted.verify(), "flip of bit {} in byte {} passed", bit, index);
            }
        }
    }

    #[test]
    fn payload_length_is_bounded() {
        assert_eq!(Frame::encode(CallByte::broadcast(), &[]), Err(Error::FrameTooLong));
        assert_eq!(Frame::encode(CallByte::broadcast(), &[0xe7; 9]), Err(Error::FrameTooLong));
        assert!(Frame::encode(CallByte::broadcast(), &[0xe7; 8]).is_ok());
    }

    #[test]
    fn assembly_stops_at_announced_length() {
        let mut frame = Frame::start(0x41);
        assert!(frame.push(0x21));
        assert!(!frame.is_complete());
        assert!(frame.push(0x24));
        assert!(frame.push(0x05));
        assert!(frame.is_complete());
        assert!(frame.verify());
        assert!(!frame.push(0x00));
        assert_eq!(frame.len(), 4);

        // header announcing more data than a frame can hold
        let mut frame = Frame::start(0x41);
        assert!(!frame.push(0x2f));
    }
}
