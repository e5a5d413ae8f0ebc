/*!
    XpressNet wire constants and the small typed values carried in frames

    each frame kind is identified by its header byte (upper nibble: kind, lower nibble: number of data bytes) and often a first data byte selecting the operation. Constants below are named after the operation they carry.
*/

use bilge::prelude::*;
use crate::pack_bilge;


/// bus version reported in version replies (v4.0)
pub const VERSION: u8 = 0x40;
/// command station identifier reported in version replies (ROCO MultiMaus compatible)
pub const STATION_ID: u8 = 0x10;

/// frames held by each of the inbound and outbound rings
pub const BUFFER_FRAMES: usize = 5;
/// call byte, header, 7 data bytes, checksum
pub const MAX_FRAME: usize = 10;
/// header and data, without call byte nor checksum
pub const MAX_PAYLOAD: usize = MAX_FRAME - 2;
/// number of bus addresses, hence of slots
pub const DEVICES: usize = 32;
/// highest locomotive address using the short form
pub const SHORT_ADDRESS_MAX: u16 = 99;

/// response window for hardware uart links, in microseconds
pub const WINDOW_UART: u32 = 500;
/// response window for software emulated serial links, in microseconds
pub const WINDOW_SOFT_SERIAL: u32 = 3000;
/// transmission windows without any call for us before taking the bus
pub const SLAVE_CYCLES: u8 = 0xff;
/// silent windows a slave request may wait for its answer, a full poll round of 32 devices fits twice
pub const REQUEST_WINDOWS: u8 = 64;
/// highest turnout address reachable through a feedback group byte
pub const TURNOUT_ADDRESS_MAX: u16 = 1023;

// headers (and first data byte where it selects the operation)
pub const HEADER_ACK: u8 = 0x20;
pub const HEADER_STATION: u8 = 0x21;
pub const STATION_POWER_ON: u8 = 0x81;
pub const STATION_POWER_OFF: u8 = 0x80;
pub const STATION_STATUS: u8 = 0x24;
pub const STATION_VERSION: u8 = 0x21;
pub const STATION_SERVICE_RESULT: u8 = 0x10;
pub const HEADER_STOP_ALL: u8 = 0x80;
pub const HEADER_CV_READ: u8 = 0x22;
pub const CV_READ_DIRECT: u8 = 0x15;
/// v4 direct read, low 2 bits hold the high CV bits
pub const CV_READ_LONG: u8 = 0x18;
pub const HEADER_CV_WRITE: u8 = 0x23;
pub const CV_WRITE_DIRECT: u8 = 0x16;
/// v4 direct write, low 2 bits hold the high CV bits
pub const CV_WRITE_LONG: u8 = 0x1c;
pub const HEADER_ACCESSORY_INFO: u8 = 0x42;
pub const HEADER_ACCESSORY: u8 = 0x52;
pub const HEADER_LOCO_REQUEST: u8 = 0xe3;
pub const LOCO_INFO: u8 = 0x00;
pub const LOCO_FUNC_MOMENTARY: u8 = 0x07;
pub const LOCO_FUNC_UPPER_MOMENTARY: u8 = 0x08;
pub const LOCO_FUNC_UPPER: u8 = 0x09;
pub const LOCO_INFO_MULTIMAUS: u8 = 0xf0;
pub const LOCO_BUSY: u8 = 0x40;
pub const LOCO_FUNC_STATUS: u8 = 0x50;
pub const LOCO_FUNC_UPPER_STATUS: u8 = 0x52;
pub const HEADER_LOCO_OPERATION: u8 = 0xe4;
/// MultiMaus specific F13 to F20 group
pub const LOCO_FUNC_MULTIMAUS: u8 = 0xf3;
pub const HEADER_LOCO_INFO_MULTIMAUS: u8 = 0xe7;
pub const HEADER_POM: u8 = 0xe6;
pub const POM_OPERATION: u8 = 0x30;
/// POM byte write, low 2 bits hold the high CV bits
pub const POM_WRITE_BYTE: u8 = 0xec;
/// POM bit write, low 2 bits hold the high CV bits
pub const POM_WRITE_BIT: u8 = 0xe8;

pub const HEADER_BROADCAST: u8 = 0x61;
pub const BROADCAST_OFF: u8 = 0x00;
pub const BROADCAST_ON: u8 = 0x01;
pub const BROADCAST_SERVICE: u8 = 0x02;
pub const PROG_SHORT_CIRCUIT: u8 = 0x12;
pub const PROG_NACK: u8 = 0x13;
pub const STATION_BUSY: u8 = 0x1f;
pub const TRANSFER_ERROR: u8 = 0x80;
pub const NOT_SUPPORTED: u8 = 0x82;
pub const HEADER_STOPPED: u8 = 0x81;
pub const HEADER_STATUS: u8 = 0x62;
pub const STATUS_REPLY: u8 = 0x22;
pub const HEADER_STATION_DATA: u8 = 0x63;
pub const VERSION_REPLY: u8 = 0x21;
/// CV result, low 2 bits hold the high CV bits
pub const CV_RESULT: u8 = 0x14;
pub const HEADER_LOCO_INFO: u8 = 0xe4;


/// track power state shared by the whole station
#[bitsize(8)]
#[derive(Copy, Clone, Default, FromBits, Debug, PartialEq)]
pub enum PowerState {
    /// normal operation resumed, track is powered
    #[default]
    Normal = 0x00,
    /// every locomotive is stopped, track stays powered
    EmergencyStop = 0x01,
    /// track voltage is switched off
    TrackVoltageOff = 0x02,
    /// short circuit detected on the track
    ShortCircuit = 0x04,
    /// programming track in use
    ServiceMode = 0x08,
    #[fallback]
    Unknown,
}

/// command station status byte, as sent in status replies
#[bitsize(8)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq)]
pub struct StationStatus {
    /// track voltage is off
    pub emergency_off: bool,
    pub emergency_stop: bool,
    /// station waits for a start command
    pub start_mode: bool,
    pub service_mode: bool,
    reserved: u2,
    pub power_up: bool,
    pub ram_error: bool,
}

impl From<PowerState> for StationStatus {
    fn from(power: PowerState) -> Self {
        let mut status = Self::from(0u8);
        match power {
            PowerState::EmergencyStop => status.set_emergency_stop(true),
            PowerState::TrackVoltageOff | PowerState::ShortCircuit => status.set_emergency_off(true),
            PowerState::ServiceMode => status.set_service_mode(true),
            PowerState::Normal | PowerState::Unknown => {},
        }
        status
    }
}
impl From<StationStatus> for PowerState {
    fn from(status: StationStatus) -> Self {
        if status.service_mode()        {PowerState::ServiceMode}
        else if status.emergency_off()  {PowerState::TrackVoltageOff}
        else if status.emergency_stop() {PowerState::EmergencyStop}
        else                            {PowerState::Normal}
    }
}


/**
    locomotive address as sent on the wire, high byte first

    addresses above [SHORT_ADDRESS_MAX] are long addresses and must carry the `11` marker in the two upper bits
*/
#[bitsize(16)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq)]
pub struct WireAddress {
    pub number: u14,
    pub marker: u2,
}
pack_bilge!(WireAddress);

impl WireAddress {
    pub const LONG: u8 = 0b11;

    pub fn encode(address: u16) -> Self {
        let marker = if address > SHORT_ADDRESS_MAX {Self::LONG} else {0};
        Self::new(u14::new(address & 0x3fff), u2::new(marker))
    }
    /// recover the locomotive number, the marker bits are masked off whatever the sender put
    pub fn decode(high: u8, low: u8) -> u16 {
        use packbytes::FromBytes;
        Self::from_be_bytes([high, low]).number().value()
    }
    pub fn is_long(&self) -> bool {
        self.marker().value() == Self::LONG
    }
}


/// speed step resolution of a locomotive decoder
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SpeedSteps {
    Steps14,
    Steps27,
    #[default]
    Steps28,
    Steps128,
}

impl SpeedSteps {
    /// code used in the identification byte of loco info replies
    pub const fn id(self) -> u8 {
        match self {
            Self::Steps14 => 0b000,
            Self::Steps27 => 0b001,
            Self::Steps28 => 0b010,
            Self::Steps128 => 0b100,
        }
    }
    pub const fn from_id(id: u8) -> Option<Self> {
        match id & 0b111 {
            0b000 => Some(Self::Steps14),
            0b001 => Some(Self::Steps27),
            0b010 => Some(Self::Steps28),
            0b100 => Some(Self::Steps128),
            _ => None,
        }
    }
    /// operation byte of drive commands
    pub const fn drive_code(self) -> u8 {
        match self {
            Self::Steps14 => 0x10,
            Self::Steps27 => 0x11,
            Self::Steps28 => 0x12,
            Self::Steps128 => 0x13,
        }
    }
    pub const fn from_drive_code(code: u8) -> Option<Self> {
        match code {
            0x10 => Some(Self::Steps14),
            0x11 => Some(Self::Steps27),
            0x12 => Some(Self::Steps28),
            0x13 => Some(Self::Steps128),
            _ => None,
        }
    }
    /**
        convert a speed byte into its wire layout for this resolution

        the speed byte holds the direction in bit 7 and the decoder internal step value below: 0..=15 for 14 steps, 0..=31 for 27/28 steps (lowest bit being the intermediate step), 0..=127 for 128 steps
    */
    pub const fn encode(self, speed: u8) -> u8 {
        let direction = speed & 0x80;
        match self {
            Self::Steps14 => direction | (speed & 0x0f),
            Self::Steps27 | Self::Steps28 => direction | ((speed >> 1) & 0x0f) | ((speed & 0x01) << 4),
            Self::Steps128 => speed,
        }
    }
    /// inverse of [Self::encode]
    pub const fn decode(self, wire: u8) -> u8 {
        let direction = wire & 0x80;
        match self {
            Self::Steps14 => direction | (wire & 0x0f),
            Self::Steps27 | Self::Steps28 => direction | ((wire & 0x0f) << 1) | ((wire >> 4) & 0x01),
            Self::Steps128 => wire,
        }
    }
}


/// locomotive function groups, as switched by a single frame
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FunctionGroup {
    /// `0 0 0 F0 F4 F3 F2 F1`
    F0to4,
    /// `0 0 0 0 F8 F7 F6 F5`
    F5to8,
    /// `0 0 0 0 F12 F11 F10 F9`
    F9to12,
    /// `F20 .. F13`
    F13to20,
    /// `F28 .. F21`
    F21to28,
}

impl FunctionGroup {
    pub const fn code(self) -> u8 {
        match self {
            Self::F0to4 => 0x20,
            Self::F5to8 => 0x21,
            Self::F9to12 => 0x22,
            Self::F13to20 => 0x23,
            Self::F21to28 => 0x28,
        }
    }
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x20 => Some(Self::F0to4),
            0x21 => Some(Self::F5to8),
            0x22 => Some(Self::F9to12),
            0x23 | LOCO_FUNC_MULTIMAUS => Some(Self::F13to20),
            0x28 => Some(Self::F21to28),
            _ => None,
        }
    }
    /// group number, 1 to 5
    pub const fn number(self) -> u8 {
        match self {
            Self::F0to4 => 1,
            Self::F5to8 => 2,
            Self::F9to12 => 3,
            Self::F13to20 => 4,
            Self::F21to28 => 5,
        }
    }
}


/**
    split a CV number (1..=1024) into the 2 high bits and the low byte used on the wire

    the low byte follows the historical convention where 0 means 256 in each bank
*/
pub const fn cv_to_wire(cv: u16) -> (u8, u8) {
    let high = (cv.saturating_sub(1) >> 8) & 0x03;
    (high as u8, (cv & 0xff) as u8)
}
/// inverse of [cv_to_wire]
pub const fn cv_from_wire(high: u8, low: u8) -> u16 {
    let low = if low == 0 {256} else {low as u16};
    (((high & 0x03) as u16) << 8) + low
}
/**
    CV number carried by POM frames, those transmit the zero based DCC value

    returned as a 1 based CV number
*/
pub const fn pom_cv_from_wire(high: u8, low: u8) -> u16 {
    ((((high & 0x03) as u16) << 8) | low as u16) + 1
}
