use log::*;

use crate::{
    frame::Frame,
    hooks::Hooks,
    link::Line,
    protocol::*,
    station::{Station, Programming, Pending, Error},
    };


/// what a device can ask the command station, as decoded from a frame payload
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Request {
    PowerOn,
    PowerOff,
    StopAll,
    Status,
    Version,
    ServiceResult,
    CvRead {cv: u16},
    CvWrite {cv: u16, value: u8},
    /// `group` is the turnout address divided by 4, `nibble` selects its lower or upper pair
    TurnoutInfo {group: u16, nibble: u8},
    Turnout {address: u16, output: u8, active: bool},
    LocoInfo {address: u16},
    LocoInfoMultiMaus {address: u16},
    LocoFunc {address: u16},
    Drive {address: u16, steps: SpeedSteps, speed: u8},
    Functions {address: u16, group: FunctionGroup, value: u8},
    PomByte {address: u16, cv: u16, value: u8},
    PomBit {address: u16, cv: u16, value: u8},
    /// answer to an acknowledge request
    Acknowledge,
    Unknown,
}

impl Request {
    /// header and data bytes of a frame received in master mode
    pub fn decode(payload: &[u8]) -> Self {
        match *payload {
            [HEADER_STATION, STATION_POWER_ON] => Self::PowerOn,
            [HEADER_STATION, STATION_POWER_OFF] => Self::PowerOff,
            [HEADER_STOP_ALL] => Self::StopAll,
            [HEADER_STATION, STATION_STATUS] => Self::Status,
            [HEADER_STATION, STATION_VERSION] => Self::Version,
            [HEADER_STATION, STATION_SERVICE_RESULT] => Self::ServiceResult,
            [HEADER_CV_READ, CV_READ_DIRECT, cv] => Self::CvRead {cv: cv_from_wire(0, cv)},
            [HEADER_CV_READ, op, cv] if op & 0xfc == CV_READ_LONG => Self::CvRead {cv: cv_from_wire(op, cv)},
            [HEADER_CV_WRITE, CV_WRITE_DIRECT, cv, value] => Self::CvWrite {cv: cv_from_wire(0, cv), value},
            [HEADER_CV_WRITE, op, cv, value] if op & 0xfc == CV_WRITE_LONG => Self::CvWrite {cv: cv_from_wire(op, cv), value},
            [HEADER_ACCESSORY_INFO, group, nibble] => Self::TurnoutInfo {group: group.into(), nibble: nibble & 0x01},
            // A, then 1 h h h D B B O with h extending the address in v4
            [HEADER_ACCESSORY, group, data] => Self::Turnout {
                address: (u16::from(data & 0x70) << 6) | (u16::from(group) << 2) | u16::from((data >> 1) & 0x03),
                output: data & 0x01,
                active: data & 0x08 != 0,
                },
            [HEADER_LOCO_REQUEST, LOCO_INFO, high, low] => Self::LocoInfo {address: WireAddress::decode(high, low)},
            [HEADER_LOCO_REQUEST, LOCO_INFO_MULTIMAUS, high, low] => Self::LocoInfoMultiMaus {address: WireAddress::decode(high, low)},
            [HEADER_LOCO_REQUEST, LOCO_FUNC_MOMENTARY | LOCO_FUNC_UPPER_MOMENTARY | LOCO_FUNC_UPPER, high, low] =>
                Self::LocoFunc {address: WireAddress::decode(high, low)},
            [HEADER_LOCO_OPERATION, op, high, low, value] => {
                let address = WireAddress::decode(high, low);
                if let Some(steps) = SpeedSteps::from_drive_code(op)
                    {Self::Drive {address, steps, speed: steps.decode(value)}}
                else if let Some(group) = FunctionGroup::from_code(op)
                    {Self::Functions {address, group, value}}
                else
                    {Self::Unknown}
            },
            [HEADER_POM, POM_OPERATION, high, low, mode, cv, value] => {
                let address = WireAddress::decode(high, low);
                let cv = pom_cv_from_wire(mode, cv);
                match mode & 0xfc {
                    POM_WRITE_BYTE => Self::PomByte {address, cv, value},
                    POM_WRITE_BIT => Self::PomBit {address, cv, value},
                    _ => Self::Unknown,
                }
            },
            [HEADER_ACK] => Self::Acknowledge,
            _ => Self::Unknown,
        }
    }
}


/// what the command station can tell a device, as decoded from a frame payload
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Message {
    Power(PowerState),
    Status(StationStatus),
    Version {version: u8, station: u8},
    CvResult {cv: u16, value: u8},
    ProgShortCircuit,
    ProgNack,
    StationBusy,
    NotSupported,
    /// one address/data pair of a feedback broadcast
    Feedback {address: u16, data: u8},
    LocoInfo {steps: SpeedSteps, busy: bool, speed: u8, f0: u8, f1: u8},
    /// another device took control of the locomotive
    LocoBusy {address: u16},
    FunctionState {f0: u8, f1: u8},
    Unknown,
}

impl Message {
    /// header and data bytes of a frame received in slave mode
    pub fn decode(payload: &[u8]) -> Self {
        match *payload {
            [HEADER_BROADCAST, BROADCAST_ON] => Self::Power(PowerState::Normal),
            [HEADER_BROADCAST, BROADCAST_OFF] => Self::Power(PowerState::TrackVoltageOff),
            [HEADER_BROADCAST, BROADCAST_SERVICE] => Self::Power(PowerState::ServiceMode),
            [HEADER_STOPPED, 0x00] => Self::Power(PowerState::EmergencyStop),
            [HEADER_BROADCAST, PROG_SHORT_CIRCUIT] => Self::ProgShortCircuit,
            [HEADER_BROADCAST, PROG_NACK] => Self::ProgNack,
            [HEADER_BROADCAST, STATION_BUSY] => Self::StationBusy,
            [HEADER_BROADCAST, NOT_SUPPORTED] => Self::NotSupported,
            [HEADER_STATUS, STATUS_REPLY, status] => Self::Status(StationStatus::from(status)),
            [HEADER_STATION_DATA, VERSION_REPLY, version, station] => Self::Version {version, station},
            [HEADER_STATION_DATA, op, cv, value] if op & 0xfc == CV_RESULT => Self::CvResult {cv: cv_from_wire(op, cv), value},
            [HEADER_ACCESSORY_INFO, address, data] => Self::Feedback {address: address.into(), data},
            [HEADER_LOCO_INFO, id, speed, f0, f1] => match SpeedSteps::from_id(id) {
                Some(steps) => Self::LocoInfo {steps, busy: id & 0x08 != 0, speed: steps.decode(speed), f0, f1},
                None => Self::Unknown,
            },
            [HEADER_LOCO_REQUEST, LOCO_BUSY, high, low] => Self::LocoBusy {address: WireAddress::decode(high, low)},
            [HEADER_LOCO_REQUEST, LOCO_FUNC_STATUS | LOCO_FUNC_UPPER_STATUS, f0, f1] => Self::FunctionState {f0, f1},
            _ => Self::Unknown,
        }
    }
}


impl<L: Line, H: Hooks> Station<'_, L, H> {
    /// check and route one received frame
    pub(super) fn analyse(&mut self, frame: Frame) {
        if !frame.verify() {
            warn!("dropping corrupt frame {:02x?}", frame.as_bytes());
            return;
        }
        if self.role.is_master() {
            let slot = frame.call().slot();
            let request = Request::decode(frame.payload());
            trace!("device {} requests {:?}", slot, request);
            self.serve(slot, request);
        }
        else {
            let message = Message::decode(frame.payload());
            trace!("master says {:?}", message);
            self.follow(message);
        }
    }

    /// master: act on a device request, forwarding it to the application when needed
    fn serve(&mut self, slot: u8, request: Request) {
        // replies are best effort, a full buffer was already reported
        let _ = match request {
            Request::PowerOn => self.change_power(PowerState::Normal),
            Request::PowerOff => self.change_power(PowerState::TrackVoltageOff),
            Request::StopAll => self.change_power(PowerState::EmergencyStop),
            Request::Status => {
                let power = self.hooks.power_state().unwrap_or(self.power);
                self.reply(slot, &[HEADER_STATUS, STATUS_REPLY, StationStatus::from(power).into()])
            },
            Request::Version => self.reply(slot, &[HEADER_STATION_DATA, VERSION_REPLY, VERSION, STATION_ID]),
            Request::ServiceResult => match self.programming.value {
                Some(value) => {
                    let (high, low) = cv_to_wire(self.programming.cv);
                    self.reply(slot, &[HEADER_STATION_DATA, CV_RESULT | high, low, value])
                },
                None => self.reply(slot, &[HEADER_BROADCAST, STATION_BUSY]),
            },
            Request::CvRead {cv} => {
                self.programming = Programming {cv, value: None, slot: Some(slot)};
                self.hooks.direct_cv_read(cv);
                self.enter_service_mode()
            },
            Request::CvWrite {cv, value} => {
                self.programming = Programming {cv, value: None, slot: Some(slot)};
                self.hooks.direct_cv_write(cv, value);
                self.enter_service_mode()
            },
            Request::TurnoutInfo {group, nibble} => {
                self.hooks.turnout_info(slot, group, nibble);
                Ok(())
            },
            Request::Turnout {address, output, active} => {
                self.hooks.turnout(address, output, active, false);
                Ok(())
            },
            Request::LocoInfo {address} => {
                self.asked[usize::from(slot)] = address;
                self.hooks.give_loco_info(slot, address);
                Ok(())
            },
            Request::LocoInfoMultiMaus {address} => {
                self.asked[usize::from(slot)] = address;
                self.hooks.give_loco_info_multimaus(slot, address);
                Ok(())
            },
            Request::LocoFunc {address} => {
                self.asked[usize::from(slot)] = address;
                self.hooks.give_loco_func(slot, address);
                Ok(())
            },
            Request::Drive {address, steps, speed} => {
                let busy = self.set_busy(slot, address);
                match steps {
                    SpeedSteps::Steps14 => self.hooks.loco_drive14(address, speed),
                    SpeedSteps::Steps27 => self.hooks.loco_drive27(address, speed),
                    SpeedSteps::Steps28 => self.hooks.loco_drive28(address, speed),
                    SpeedSteps::Steps128 => self.hooks.loco_drive128(address, speed),
                }
                busy
            },
            Request::Functions {address, group, value} => {
                let busy = self.set_busy(slot, address);
                match group {
                    FunctionGroup::F0to4 => self.hooks.loco_func1(address, value),
                    FunctionGroup::F5to8 => self.hooks.loco_func2(address, value),
                    FunctionGroup::F9to12 => self.hooks.loco_func3(address, value),
                    FunctionGroup::F13to20 | FunctionGroup::F21to28 => self.hooks.loco_func_x(address, group.number(), value),
                }
                busy
            },
            Request::PomByte {address, cv, value} => {
                self.hooks.pom_write_byte(address, cv, value);
                Ok(())
            },
            Request::PomBit {address, cv, value} => {
                self.hooks.pom_write_bit(address, cv, value);
                Ok(())
            },
            Request::Acknowledge => Ok(()),
            Request::Unknown => {
                debug!("device {} sent an unsupported request", slot);
                self.reply(slot, &[HEADER_BROADCAST, NOT_SUPPORTED])
            },
        };
    }

    /// master: power change asked by a device, applied then announced to everyone
    fn change_power(&mut self, state: PowerState) -> Result<(), Error> {
        // the application may have changed power on its own, always tell it
        self.hooks.power_changed(state);
        self.announce_power(state)
    }

    fn enter_service_mode(&mut self) -> Result<(), Error> {
        if self.power == PowerState::ServiceMode
            {return Ok(())}
        self.announce_power(PowerState::ServiceMode)
    }

    /// slave: act on what the master tells
    fn follow(&mut self, message: Message) {
        match message {
            Message::Power(state) => self.follow_power(state),
            Message::Status(status) => self.follow_power(status.into()),
            Message::Version {version, station} => debug!("master runs bus version {:#x}, station {:#x}", version, station),
            Message::CvResult {cv, value} => {
                self.programming.cv = cv;
                self.programming.value = Some(value);
                self.hooks.direct_cv_write(cv, value);
            },
            Message::ProgShortCircuit => warn!("short circuit on the programming track"),
            Message::ProgNack => {
                debug!("no answer from decoder for CV {}", self.programming.cv);
                self.programming.value = None;
            },
            Message::StationBusy => {
                debug!("command station busy, dropping pending requests");
                self.drop_pending();
            },
            Message::NotSupported => {
                debug!("command station rejected our request");
                self.drop_pending();
            },
            Message::Feedback {address, data} => self.hooks.feedback(address, data),
            // function bytes are kept for the application, a frame fires a single hook
            Message::LocoInfo {steps, busy, speed, f0, f1} => {
                let Some(Pending {address, ..}) = self.pending_info.take()
                    else {return};
                self.loco_functions = Some((address, [f0, f1]));
                if busy {
                    debug!("loco {} is controlled by another device", address);
                }
                match steps {
                    SpeedSteps::Steps14 => self.hooks.loco_drive14(address, speed),
                    SpeedSteps::Steps27 => self.hooks.loco_drive27(address, speed),
                    SpeedSteps::Steps28 => self.hooks.loco_drive28(address, speed),
                    SpeedSteps::Steps128 => self.hooks.loco_drive128(address, speed),
                }
            },
            Message::LocoBusy {address} => {
                debug!("lost control of loco {}", address);
                if self.pending_info.is_some_and(|pending| pending.address == address) {
                    self.pending_info = None;
                }
            },
            Message::FunctionState {..} => {
                self.pending_func = None;
            },
            Message::Unknown => {},
        }
    }

    fn follow_power(&mut self, state: PowerState) {
        self.power = state;
        self.hooks.power_changed(state);
    }

    /// the answers to our requests will not come
    fn drop_pending(&mut self) {
        self.pending_info = None;
        self.pending_func = None;
    }
}
