/*!
    XpressNet station: command station when the bus has no master, ordinary device otherwise

    the [Station] owns everything above the byte transport: role arbitration, the polling cycle, the loco slot table and the translation between frames and application hooks. The transport itself lives in a [Port], reachable from the uart interrupts, which the station only borrows.

    # Example

    ```rust,ignore
    static PORT: Port<Uart> = Port::new(Uart::new());

    // in the uart interrupts
    PORT.on_receive(word, micros());
    PORT.on_transmit_ready(micros());

    // in the main loop
    let mut station = Station::new(&PORT, Config::uart(), MyTrack::new());
    station.set_power(PowerState::Normal)?;
    loop {
        station.update(micros());
    }
    ```
*/

mod dispatch;
mod reporting;

pub use dispatch::{Request, Message};

use log::*;
use thiserror::Error;

use crate::{
    config::Config,
    frame::{Frame, CallByte},
    hooks::Hooks,
    link::{Line, Mode, Port},
    protocol::{PowerState, DEVICES, HEADER_STATION, STATION_STATUS, REQUEST_WINDOWS},
    role::{Role, Event},
    slots::SlotTable,
    utils::elapsed,
    };


#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// outbound ring already holds as many frames as it can
    #[error("outbound buffer is full")]
    BufferFull,
    /// a request of the same kind still waits for its answer
    #[error("a previous request is still pending")]
    RequestPending,
    #[error("frame payload must be 1 to 8 bytes")]
    FrameTooLong,
    /// the operation makes no sense in the current bus role
    #[error("operation not available in this bus role")]
    WrongRole,
    #[error("slot is not a valid bus address")]
    InvalidSlot,
    /// turnout address does not fit the feedback group byte
    #[error("turnout address out of range")]
    InvalidAddress,
}


/// programming track state
#[derive(Copy, Clone, Debug, Default, PartialEq)]
struct Programming {
    /// last CV requested or read
    cv: u16,
    /// value read back, if any
    value: Option<u8>,
    /// device that issued the last programming request, None when it came from the application
    slot: Option<u8>,
}

/// slave request waiting for the master's answer
#[derive(Copy, Clone, Debug, PartialEq)]
struct Pending {
    address: u16,
    /// silent windows elapsed since the request was queued
    waited: u8,
}
impl Pending {
    fn new(address: u16) -> Self {
        Self {address, waited: 0}
    }
    /// count one more silent window, None once the answer is considered lost
    fn age(self) -> Option<Self> {
        let waited = self.waited.saturating_add(1);
        if waited >= REQUEST_WINDOWS {
            debug!("no answer for loco {}, giving up", self.address);
            None
        }
        else {
            Some(Self {waited, .. self})
        }
    }
}


pub struct Station<'p, L, H> {
    port: &'p Port<L>,
    hooks: H,
    config: Config,
    role: Role,
    slots: SlotTable,
    power: PowerState,
    programming: Programming,
    /// locomotive each slot last asked about, for the busy bit of loco info replies
    asked: [u16; DEVICES],
    /// slave: info request waiting for its answer
    pending_info: Option<Pending>,
    /// slave: function state request waiting for its answer
    pending_func: Option<Pending>,
    /// slave: locomotive and function bytes of the last info answer
    loco_functions: Option<(u16, [u8; 2])>,
    /// last address polled in master mode
    polled: u8,
    /// start of the transmission window being watched for silence
    cycle: u32,
}

impl<'p, L: Line, H: Hooks> Station<'p, L, H> {
    /// start as a listening slave on the given port
    pub fn new(port: &'p Port<L>, config: Config, hooks: H) -> Self {
        port.lock(|driver| {
            driver.set_window(config.window);
            driver.set_mode(Mode::Slave {address: config.address});
        });
        Self {
            port,
            hooks,
            config,
            role: Role::default(),
            slots: SlotTable::new(),
            power: PowerState::default(),
            programming: Programming::default(),
            asked: [0; DEVICES],
            pending_info: None,
            pending_func: None,
            loco_functions: None,
            polled: DEVICES as u8 - 1,
            cycle: 0,
        }
    }

    pub fn config(&self) -> &Config {&self.config}
    pub fn role(&self) -> Role {self.role}
    pub fn is_master(&self) -> bool {self.role.is_master()}
    pub fn power(&self) -> PowerState {self.power}
    pub fn slots(&self) -> &SlotTable {&self.slots}
    pub fn hooks(&self) -> &H {&self.hooks}
    pub fn hooks_mut(&mut self) -> &mut H {&mut self.hooks}
    pub fn port(&self) -> &'p Port<L> {self.port}

    /**
        run one step of the station, to call as often as possible from the main loop

        `now` is a free running microsecond timer, wrapping is allowed. Handles at most one received frame, returns true if one was handled.
    */
    pub fn update(&mut self, now: u32) -> bool {
        self.arbitrate(now);
        let received = self.port.lock(|driver| driver.receive());
        let handled = match received {
            Some(frame) => {
                self.analyse(frame);
                true
            },
            None => false,
        };
        if self.role.is_master() {
            self.poll(now);
        }
        handled
    }

    /// feed what the transport observed to the role state machine
    fn arbitrate(&mut self, now: u32) {
        let (called, contention, pending) = self.port.lock(|driver| (
            driver.take_called(),
            driver.take_contention(),
            driver.pending(),
            ));
        if called || contention {
            self.cycle = now;
        }
        let silence = elapsed(self.cycle, now) >= self.config.window;
        if silence {
            self.cycle = now;
            self.pending_info = self.pending_info.and_then(Pending::age);
            self.pending_func = self.pending_func.and_then(Pending::age);
        }
        let joined = matches!(self.role, Role::SlaveInitializing {..}) && pending == 0;

        let events = [
            (contention, Event::Contention),
            (called, Event::Called),
            (joined, Event::Joined),
            (silence, Event::Silence),
            ];
        for (_, event) in events.into_iter().filter(|(happened, _)| *happened) {
            self.transition(self.role.next(event, self.config.policy()), now);
        }
    }

    fn transition(&mut self, next: Role, now: u32) {
        if next == self.role
            {return}
        let previous = core::mem::replace(&mut self.role, next);
        trace!("role {:?} -> {:?}", previous, next);

        match (previous.is_master(), next.is_master()) {
            (false, true) => {
                info!("no master on the bus, taking over polling");
                self.pending_info = None;
                self.pending_func = None;
                self.polled = DEVICES as u8 - 1;
                self.port.lock(|driver| driver.set_mode(Mode::Master));
                self.cycle = now;
            },
            (true, false) => {
                warn!("another master is polling the bus, falling back to slave");
                self.slots = SlotTable::new();
                self.asked = [0; DEVICES];
                let address = self.config.address;
                self.port.lock(|driver| driver.set_mode(Mode::Slave {address}));
            },
            _ => {},
        }
        if matches!(next, Role::SlaveInitializing {..})
        && !matches!(previous, Role::SlaveInitializing {..}) {
            // introduce ourselves to the new master
            debug!("joining master as device {}", self.config.address);
            let _ = self.request(&[HEADER_STATION, STATION_STATUS]);
        }
    }

    /// master cycle: retry a cut answer, send our own frames, or poll the next device
    fn poll(&mut self, now: u32) {
        let port = self.port;
        port.lock(|driver| {
            if !driver.is_idle(now)
                {return}
            if let Some(slot) = driver.take_garbled() {
                debug!("answer of device {} was cut, requesting acknowledge", slot);
                driver.send_call(CallByte::ack_request(slot), now);
            }
            else if !driver.send_queued(now) {
                self.polled = (self.polled + 1) % DEVICES as u8;
                driver.send_call(CallByte::inquiry(self.polled), now);
            }
        })
    }

    /// queue a frame for transmission
    fn send(&self, call: CallByte, payload: &[u8]) -> Result<(), Error> {
        let frame = Frame::encode(call, payload)?;
        if self.port.lock(|driver| driver.enqueue(frame)) {
            Ok(())
        }
        else {
            warn!("outbound buffer full, dropping {:02x?}", payload);
            Err(Error::BufferFull)
        }
    }
    /// master: frame for one device
    fn reply(&self, slot: u8, payload: &[u8]) -> Result<(), Error> {
        if usize::from(slot) >= DEVICES
            {return Err(Error::InvalidSlot)}
        self.send(CallByte::directed(slot), payload)
    }
    /// master: frame for every device
    fn broadcast(&self, payload: &[u8]) -> Result<(), Error> {
        self.send(CallByte::broadcast(), payload)
    }
    /// slave: frame for the master, sent in our next inquiry window
    fn request(&self, payload: &[u8]) -> Result<(), Error> {
        // the call byte is the master's, it is never sent
        self.send(CallByte::from(0), payload)
    }
    fn require_master(&self) -> Result<(), Error> {
        if self.role.is_master() {Ok(())} else {Err(Error::WrongRole)}
    }
    fn require_slave(&self) -> Result<(), Error> {
        if self.role.is_master() {Err(Error::WrongRole)} else {Ok(())}
    }
}
