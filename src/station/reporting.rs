use log::*;
use packbytes::ToBytes;

use crate::{
    frame::CallByte,
    hooks::Hooks,
    link::Line,
    protocol::*,
    station::{Station, Pending, Error},
    };


/// wire bytes of a locomotive address
fn address_bytes(address: u16) -> [u8; 2] {
    WireAddress::encode(address).to_be_bytes()
}

/// header and data announcing a power state to every device
fn power_payload(state: PowerState) -> Option<[u8; 2]> {
    match state {
        PowerState::Normal => Some([HEADER_BROADCAST, BROADCAST_ON]),
        PowerState::TrackVoltageOff | PowerState::ShortCircuit => Some([HEADER_BROADCAST, BROADCAST_OFF]),
        PowerState::EmergencyStop => Some([HEADER_STOPPED, 0x00]),
        PowerState::ServiceMode => Some([HEADER_BROADCAST, BROADCAST_SERVICE]),
        PowerState::Unknown => None,
    }
}

/// feedback group byte holding the given turnout
fn turnout_group(address: u16) -> Result<u8, Error> {
    if address > TURNOUT_ADDRESS_MAX
        {return Err(Error::InvalidAddress)}
    u8::try_from(address >> 2).map_err(|_| Error::InvalidAddress)
}

/// feedback data byte for a turnout: `I T T N Z Z Z Z` with turnout type `01`
fn turnout_data(address: u16, state: u8, active: bool) -> u8 {
    let position = state & 0x03;
    let pair = if address & 0x01 != 0 {position << 2} else {position};
    let nibble = ((address >> 1) & 0x01) as u8;
    (u8::from(active) << 7) | (0b01 << 5) | (nibble << 4) | pair
}


/// operations for the application, taking the frames they imply to the bus
impl<L: Line, H: Hooks> Station<'_, L, H> {
    /**
        change track power

        as master it is broadcast to every device, as slave it is requested from the master and [Self::power] only changes once the master confirms. Returns an error if the outbound buffer is full.
    */
    pub fn set_power(&mut self, state: PowerState) -> Result<(), Error> {
        if self.role.is_master() {
            return self.announce_power(state);
        }
        match state {
            PowerState::Normal => self.request(&[HEADER_STATION, STATION_POWER_ON])?,
            PowerState::TrackVoltageOff | PowerState::ShortCircuit => self.request(&[HEADER_STATION, STATION_POWER_OFF])?,
            PowerState::EmergencyStop => self.request(&[HEADER_STOP_ALL])?,
            PowerState::ServiceMode | PowerState::Unknown => {},
        }
        Ok(())
    }

    pub(super) fn announce_power(&mut self, state: PowerState) -> Result<(), Error> {
        self.power = state;
        match power_payload(state) {
            Some(payload) => self.broadcast(&payload),
            None => Ok(()),
        }
    }

    /// master: report the state of one feedback module, address and data as they go on the wire
    pub fn set_feedback(&mut self, address: u8, data: u8) -> Result<(), Error> {
        self.require_master()?;
        self.send(CallByte::feedback(), &[HEADER_ACCESSORY_INFO, address, data])
    }

    /**
        register the given device as the one controlling the locomotive

        the device that controlled it before, if any, is told it lost control.
    */
    pub fn set_busy(&mut self, slot: u8, address: u16) -> Result<(), Error> {
        if usize::from(slot) >= DEVICES
            {return Err(Error::InvalidSlot)}
        match self.slots.assign(slot, address) {
            Some(previous) => {
                debug!("loco {} taken over by device {} from device {}", address, slot, previous);
                self.notify_busy(previous, address)
            },
            None => Ok(()),
        }
    }

    /**
        take the locomotive back for the application

        returns true if a device was controlling it, that device is told it lost control.
    */
    pub fn request_busy(&mut self, address: u16) -> Result<bool, Error> {
        match self.slots.release(address) {
            Some(slot) => {
                self.notify_busy(slot, address)?;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    fn notify_busy(&self, slot: u8, address: u16) -> Result<(), Error> {
        let [high, low] = address_bytes(address);
        self.reply(slot, &[HEADER_LOCO_REQUEST, LOCO_BUSY, high, low])
    }

    /// master: answer a [give_loco_info](Hooks::give_loco_info) with the configured speed steps
    pub fn set_loco_info(&mut self, slot: u8, speed: u8, f0: u8, f1: u8) -> Result<(), Error> {
        self.set_loco_info_steps(slot, self.config.speed_steps, speed, f0, f1)
    }

    /// master: answer a [give_loco_info](Hooks::give_loco_info)
    pub fn set_loco_info_steps(&mut self, slot: u8, steps: SpeedSteps, speed: u8, f0: u8, f1: u8) -> Result<(), Error> {
        self.require_master()?;
        let id = self.loco_id(slot, steps)?;
        self.reply(slot, &[HEADER_LOCO_INFO, id, steps.encode(speed), f0, f1])
    }

    /// master: answer a [give_loco_info_multimaus](Hooks::give_loco_info_multimaus), with all function groups
    pub fn set_loco_info_multimaus(&mut self, slot: u8, steps: SpeedSteps, speed: u8, functions: [u8; 4]) -> Result<(), Error> {
        self.require_master()?;
        let id = self.loco_id(slot, steps)?;
        let [f0, f1, f2, f3] = functions;
        self.reply(slot, &[HEADER_LOCO_INFO_MULTIMAUS, id, steps.encode(speed), f0, f1, f2, f3, 0x00])
    }

    /// identification byte of loco info replies: busy flag and speed steps
    fn loco_id(&self, slot: u8, steps: SpeedSteps) -> Result<u8, Error> {
        let asked = *self.asked.get(usize::from(slot)).ok_or(Error::InvalidSlot)?;
        let busy = self.slots.is_busy_for(slot, asked);
        Ok((u8::from(busy) << 3) | steps.id())
    }

    /// master: answer a [give_loco_func](Hooks::give_loco_func) with F13..F20 and F21..F28
    pub fn set_function_status(&mut self, slot: u8, f13: u8, f21: u8) -> Result<(), Error> {
        self.require_master()?;
        self.reply(slot, &[HEADER_LOCO_REQUEST, LOCO_FUNC_UPPER_STATUS, f13, f21])
    }

    /// master: answer a [turnout_info](Hooks::turnout_info), `state` is the 2 bit position of the turnout
    pub fn set_turnout_status(&mut self, slot: u8, address: u16, state: u8) -> Result<(), Error> {
        self.require_master()?;
        let group = turnout_group(address)?;
        self.reply(slot, &[HEADER_ACCESSORY_INFO, group, turnout_data(address, state, false)])
    }

    /// master: tell every device a turnout moved, `state` is the 2 bit position of the turnout
    pub fn set_turnout_position(&mut self, address: u16, state: u8, active: bool) -> Result<(), Error> {
        self.require_master()?;
        let group = turnout_group(address)?;
        self.send(CallByte::feedback(), &[HEADER_ACCESSORY_INFO, group, turnout_data(address, state, active)])
    }

    /// master: give the value of the CV asked by [direct_cv_read](Hooks::direct_cv_read)
    pub fn set_cv_read_value(&mut self, cv: u16, value: u8) -> Result<(), Error> {
        self.require_master()?;
        self.programming.cv = cv;
        self.programming.value = Some(value);
        let (high, low) = cv_to_wire(cv);
        self.programming_reply(&[HEADER_STATION_DATA, CV_RESULT | high, low, value])
    }

    /// master: the decoder did not answer on the programming track
    pub fn set_cv_nack(&mut self) -> Result<(), Error> {
        self.require_master()?;
        self.programming.value = None;
        self.programming_reply(&[HEADER_BROADCAST, PROG_NACK])
    }

    /// master: the programming track is short circuited
    pub fn set_cv_nack_short_circuit(&mut self) -> Result<(), Error> {
        self.require_master()?;
        self.programming.value = None;
        self.programming_reply(&[HEADER_BROADCAST, PROG_SHORT_CIRCUIT])
    }

    /// answer the device that started programming, everyone if it was the application
    fn programming_reply(&self, payload: &[u8]) -> Result<(), Error> {
        match self.programming.slot {
            Some(slot) => self.reply(slot, payload),
            None => self.broadcast(payload),
        }
    }

    /// slave: ask the master for its status, the answer comes as [power_changed](Hooks::power_changed)
    pub fn get_status(&mut self) -> Result<(), Error> {
        self.require_slave()?;
        self.request(&[HEADER_STATION, STATION_STATUS])
    }

    /**
        slave: ask the master for the state of a locomotive

        the answer comes as one of the `loco_drive` hooks. Only one such request may be pending at a time.
    */
    pub fn get_loco_info(&mut self, address: u16) -> Result<(), Error> {
        self.require_slave()?;
        if self.pending_info.is_some()
            {return Err(Error::RequestPending)}
        let [high, low] = address_bytes(address);
        self.request(&[HEADER_LOCO_REQUEST, LOCO_INFO, high, low])?;
        self.pending_info = Some(Pending::new(address));
        Ok(())
    }

    /// slave: ask the master for F13 to F28 of a locomotive, only one such request may be pending
    pub fn get_loco_func(&mut self, address: u16) -> Result<(), Error> {
        self.require_slave()?;
        if self.pending_func.is_some()
            {return Err(Error::RequestPending)}
        let [high, low] = address_bytes(address);
        self.request(&[HEADER_LOCO_REQUEST, LOCO_FUNC_UPPER, high, low])?;
        self.pending_func = Some(Pending::new(address));
        Ok(())
    }

    /// locomotive of the info request waiting for its answer
    pub fn pending_loco_info(&self) -> Option<u16> {
        self.pending_info.map(|pending| pending.address)
    }
    /// locomotive of the function request waiting for its answer
    pub fn pending_loco_func(&self) -> Option<u16> {
        self.pending_func.map(|pending| pending.address)
    }
    /// locomotive and function bytes of the last loco info answer: `0 0 0 F0 F4 F3 F2 F1` then `F12 .. F5`
    pub fn loco_functions(&self) -> Option<(u16, [u8; 2])> {self.loco_functions}

    /// slave: drive a locomotive, see [SpeedSteps::encode] for the speed byte
    pub fn set_speed(&mut self, address: u16, steps: SpeedSteps, speed: u8) -> Result<(), Error> {
        self.require_slave()?;
        let [high, low] = address_bytes(address);
        self.request(&[HEADER_LOCO_OPERATION, steps.drive_code(), high, low, steps.encode(speed)])
    }

    /// slave: switch a group of locomotive functions
    pub fn set_functions(&mut self, address: u16, group: FunctionGroup, functions: u8) -> Result<(), Error> {
        self.require_slave()?;
        let [high, low] = address_bytes(address);
        self.request(&[HEADER_LOCO_OPERATION, group.code(), high, low, functions])
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_address_carries_marker() {
        assert_eq!(address_bytes(300), [0xc1, 0x2c]);
        assert_eq!(address_bytes(99), [0x00, 0x63]);
        assert_eq!(address_bytes(100), [0xc0, 0x64]);
        assert_eq!(WireAddress::decode(0xc1, 0x2c), 300);
        assert_eq!(WireAddress::decode(0x00, 0x03), 3);
    }

    #[test]
    fn turnout_feedback_layout() {
        // address 5: group 1, lower nibble, odd turnout of the pair
        assert_eq!(turnout_data(5, 0b10, false), 0b0010_1000);
        assert_eq!(turnout_data(6, 0b01, true), 0b1011_0001);
    }

    #[test]
    fn turnout_group_bounds() {
        assert_eq!(turnout_group(5), Ok(1));
        assert_eq!(turnout_group(1023), Ok(255));
        assert_eq!(turnout_group(1024), Err(Error::InvalidAddress));
    }

    #[test]
    fn power_broadcasts() {
        assert_eq!(power_payload(PowerState::Normal), Some([0x61, 0x01]));
        assert_eq!(power_payload(PowerState::ShortCircuit), Some([0x61, 0x00]));
        assert_eq!(power_payload(PowerState::EmergencyStop), Some([0x81, 0x00]));
        assert_eq!(power_payload(PowerState::Unknown), None);
    }
}
