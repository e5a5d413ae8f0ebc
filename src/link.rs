/*!
    byte level transport, driven by the uart interrupts

    The hardware glue calls [Port::on_receive] on every received 9-bit word, [Port::on_transmit_ready] when the transmit register can take the next word, and [Port::on_transmit_complete] once the last word left the line. Everything else is done by the station from its `update` call, through the same [Port].

    Nothing here blocks: windows are enforced by comparing timestamps given by the caller, in microseconds of a free running 32 bit timer.
*/

use crate::{
    mutex::IrqMutex,
    frame::{Frame, CallByte, CallKind},
    ring::FrameRing,
    protocol::{BUFFER_FRAMES, WINDOW_UART, HEADER_ACK},
    utils::elapsed,
    };


/// one 9-bit word on the line, the 9th bit marks call bytes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Word {
    pub byte: u8,
    pub call: bool,
}
impl Word {
    pub const fn data(byte: u8) -> Self  {Self {byte, call: false}}
    pub const fn call(byte: u8) -> Self  {Self {byte, call: true}}
    pub const fn from_bits(bits: u16) -> Self {
        Self {byte: bits as u8, call: bits & 0x100 != 0}
    }
    pub const fn bits(self) -> u16 {
        self.byte as u16 | if self.call {0x100} else {0}
    }
}

/// state of the transceiver direction control line
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Receive,
    Transmit,
}

/**
    physical medium seen by the driver

    implementations wrap the uart data register and the rs485 driver enable pin. Both methods are called from interrupt context and must not block.
*/
pub trait Line {
    /// switch the transceiver between listening and driving the bus
    fn set_direction(&mut self, direction: Direction);
    /// put one word into the transmit register
    fn write(&mut self, word: Word);
}

/// how incoming words are interpreted
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// we send call bytes, devices answer in the windows we open
    Master,
    /// we answer calls addressed to the given bus address
    Slave {address: u8},
}

/// window opened by a call byte we sent
#[derive(Copy, Clone, Debug)]
struct Window {
    call: CallByte,
    since: u32,
}

/// frame being shifted out
#[derive(Clone, Debug)]
struct Transmission {
    frame: Frame,
    position: usize,
}


/// transport state shared between interrupts and the station
pub struct Driver<L> {
    line: L,
    mode: Mode,
    /// response window in microseconds
    window: u32,
    /// complete frames waiting for the station
    rx: FrameRing<BUFFER_FRAMES>,
    /// frames waiting for a transmission window
    tx: FrameRing<BUFFER_FRAMES>,
    receiving: Option<Frame>,
    sending: Option<Transmission>,
    /// last word written, waiting for it to leave the line
    draining: bool,
    poll: Option<Window>,
    /// timestamp of the last word sent or received
    active: u32,
    /// slave: a call for us or a broadcast was seen since the station last looked
    called: bool,
    /// master: another master's call byte was seen
    contention: bool,
    /// master: slot whose answer was cut before completion
    garbled: Option<u8>,
    /// received frames lost, either garbled or for lack of room
    dropped: u16,
}

impl<L: Line> Driver<L> {
    pub const fn new(line: L) -> Self {
        Self {
            line,
            mode: Mode::Slave {address: 31},
            window: WINDOW_UART,
            rx: FrameRing::new(),
            tx: FrameRing::new(),
            receiving: None,
            sending: None,
            draining: false,
            poll: None,
            active: 0,
            called: false,
            contention: false,
            garbled: None,
            dropped: 0,
        }
    }

    pub fn line(&mut self) -> &mut L {&mut self.line}
    pub fn mode(&self) -> Mode {self.mode}
    pub fn active(&self) -> u32 {self.active}
    pub fn dropped(&self) -> u16 {self.dropped}
    pub fn pending(&self) -> usize {self.tx.len()}
    pub fn is_transmitting(&self) -> bool {self.sending.is_some() || self.draining}

    pub fn set_window(&mut self, window: u32) {
        self.window = window;
    }
    /// change the way calls are handled, anything in flight or queued for the previous role is dropped
    pub fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            self.mode = mode;
            self.poll = None;
            self.receiving = None;
            self.garbled = None;
            self.contention = false;
            self.called = false;
            self.tx.clear();
        }
    }

    /// queue a frame for the next window, false if the outbound ring is full
    pub fn enqueue(&mut self, frame: Frame) -> bool {
        self.tx.push(frame)
    }
    /// next received frame, not verified yet
    pub fn receive(&mut self) -> Option<Frame> {
        self.rx.pop()
    }
    pub fn take_called(&mut self) -> bool {
        core::mem::take(&mut self.called)
    }
    pub fn take_contention(&mut self) -> bool {
        core::mem::take(&mut self.contention)
    }
    pub fn take_garbled(&mut self) -> Option<u8> {
        self.garbled.take()
    }

    /**
        true when a new master cycle can start

        closes the current window if its time is over. An answer started in time is given one more window after its last byte before being considered cut.
    */
    pub fn is_idle(&mut self, now: u32) -> bool {
        if self.is_transmitting()
            {return false}
        if let Some(window) = self.poll {
            if self.receiving.is_some() {
                if elapsed(self.active, now) <= self.window
                    {return false}
                self.receiving = None;
                self.garbled = Some(window.call.slot());
                self.dropped = self.dropped.saturating_add(1);
            }
            else if elapsed(window.since, now) <= self.window
                {return false}
            self.poll = None;
        }
        true
    }
    /// send a call byte and open a window for the addressed device
    pub fn send_call(&mut self, call: CallByte, now: u32) {
        self.poll = Some(Window {call, since: now});
        self.start(Frame::start(u8::from(call)), 0, now);
    }
    /// send the oldest queued frame with its call byte, false if nothing is queued
    pub fn send_queued(&mut self, now: u32) -> bool {
        match self.tx.pop() {
            Some(frame) => {
                self.start(frame, 0, now);
                true
            },
            None => false,
        }
    }

    fn start(&mut self, frame: Frame, from: usize, now: u32) {
        let Some(&first) = frame.as_bytes().get(from)
            else {return};
        self.line.set_direction(Direction::Transmit);
        self.line.write(if from == 0 {Word::call(first)} else {Word::data(first)});
        self.active = now;
        self.sending = Some(Transmission {frame, position: from + 1});
    }

    fn on_transmit_ready(&mut self, now: u32) -> bool {
        let Some(transmission) = self.sending.as_mut()
            else {return false};
        match transmission.frame.as_bytes().get(transmission.position) {
            Some(&byte) => {
                transmission.position += 1;
                self.line.write(Word::data(byte));
                self.active = now;
                true
            },
            None => {
                self.sending = None;
                self.draining = true;
                false
            },
        }
    }

    fn on_transmit_complete(&mut self, now: u32) {
        if self.sending.is_some()
            {return}
        self.draining = false;
        self.line.set_direction(Direction::Receive);
        self.active = now;
        // the device window starts once our call is fully out
        if let Some(window) = self.poll.as_mut() {
            window.since = now;
        }
    }

    fn on_receive(&mut self, word: Word, now: u32) {
        self.active = now;
        if word.call {
            self.on_call(CallByte::from(word.byte), now);
        }
        else {
            self.on_data(word.byte, now);
        }
    }

    fn on_call(&mut self, call: CallByte, now: u32) {
        self.receiving = None;
        if !call.has_valid_parity()
            {return}
        let address = match self.mode {
            Mode::Slave {address} => address,
            Mode::Master => {
                // only one master may drive the bus
                self.contention = true;
                self.poll = None;
                return;
            },
        };
        match call.kind() {
            CallKind::Inquiry if call.slot() == address => {
                self.called = true;
                if let Some(frame) = self.tx.pop() {
                    // our answer starts after the header byte, the call belongs to the master
                    self.start(frame, 1, now);
                }
            },
            CallKind::Acknowledge if call.slot() == address => {
                self.called = true;
                if let Ok(ack) = Frame::encode(CallByte::from(0), &[HEADER_ACK]) {
                    self.start(ack, 1, now);
                }
            },
            CallKind::Directed if call.slot() == address || call.slot() == 0 => {
                self.called = true;
                self.receiving = Some(Frame::start(u8::from(call)));
            },
            CallKind::Feedback if call.slot() == 0 => {
                self.called = true;
                self.receiving = Some(Frame::start(u8::from(call)));
            },
            _ => {},
        }
    }

    fn on_data(&mut self, byte: u8, now: u32) {
        if self.mode == Mode::Master && self.receiving.is_none() {
            // answers are only accepted in an open window
            let Some(window) = self.poll
                else {return};
            if self.is_transmitting() || elapsed(window.since, now) > self.window
                {return}
            self.receiving = Some(Frame::start(u8::from(window.call)));
        }
        let Some(frame) = self.receiving.as_mut()
            else {return};
        if !frame.push(byte) {
            self.receiving = None;
            self.dropped = self.dropped.saturating_add(1);
            if self.mode == Mode::Master {
                self.garbled = self.poll.take().map(|window| window.call.slot());
            }
            return;
        }
        if frame.is_complete() {
            let frame = frame.clone();
            self.receiving = None;
            if self.mode == Mode::Master {
                // device is done, next cycle can start
                self.poll = None;
            }
            if !self.rx.push(frame) {
                self.dropped = self.dropped.saturating_add(1);
            }
        }
    }
}


/// entry point of the uart interrupts, holding the transport driver
pub struct Port<L> {
    driver: IrqMutex<Driver<L>>,
}

impl<L: Line> Port<L> {
    pub const fn new(line: L) -> Self {
        Self {driver: IrqMutex::new(Driver::new(line))}
    }
    /// to call on every received word
    pub fn on_receive(&self, word: Word, now: u32) {
        self.driver.lock(|driver| driver.on_receive(word, now))
    }
    /// to call when the transmit register is empty, returns false once there is nothing more to send
    pub fn on_transmit_ready(&self, now: u32) -> bool {
        self.driver.lock(|driver| driver.on_transmit_ready(now))
    }
    /// to call when the last word has left the line
    pub fn on_transmit_complete(&self, now: u32) {
        self.driver.lock(|driver| driver.on_transmit_complete(now))
    }
    /// shift out everything pending, for links without transmit interrupts
    pub fn flush(&self, now: u32) {
        while self.on_transmit_ready(now) {}
        self.on_transmit_complete(now);
    }
    /// access the underlying line
    pub fn with_line<R>(&self, f: impl FnOnce(&mut L) -> R) -> R {
        self.driver.lock(|driver| f(driver.line()))
    }
    /// access the whole driver state
    pub fn lock<R>(&self, f: impl FnOnce(&mut Driver<L>) -> R) -> R {
        self.driver.lock(f)
    }
}
