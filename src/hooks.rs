/*!
    notifications from the bus to the application

    every method has an empty default, implement only those the application cares about. They are called from [Station::update](crate::Station::update), never from interrupts, and at most one per received frame.

    `slot` is the bus address of the requesting device, to pass back to the `set_*` reply methods of the station.
*/

use crate::protocol::PowerState;


pub trait Hooks {
    /// track power changed, by a device request or a master broadcast
    fn power_changed(&mut self, _state: PowerState) {}
    /// actual power state, when the application tracks it better than the station does
    fn power_state(&mut self) -> Option<PowerState> {None}

    /// a device wants speed and function state of a locomotive, answer with `set_loco_info`
    fn give_loco_info(&mut self, _slot: u8, _address: u16) {}
    /// same as [Self::give_loco_info] for a MultiMaus, answer with `set_loco_info_multimaus`
    fn give_loco_info_multimaus(&mut self, _slot: u8, _address: u16) {}
    /// a device wants F13 to F28 state of a locomotive, answer with `set_function_status`
    fn give_loco_func(&mut self, _slot: u8, _address: u16) {}

    /// speed byte: direction in bit 7, step 0..=15 below
    fn loco_drive14(&mut self, _address: u16, _speed: u8) {}
    /// speed byte: direction in bit 7, step 0..=31 below (lowest bit is the intermediate step)
    fn loco_drive27(&mut self, _address: u16, _speed: u8) {}
    /// speed byte: direction in bit 7, step 0..=31 below (lowest bit is the intermediate step)
    fn loco_drive28(&mut self, _address: u16, _speed: u8) {}
    /// speed byte: direction in bit 7, step 0..=127 below
    fn loco_drive128(&mut self, _address: u16, _speed: u8) {}

    /// `0 0 0 F0 F4 F3 F2 F1`
    fn loco_func1(&mut self, _address: u16, _functions: u8) {}
    /// `0 0 0 0 F8 F7 F6 F5`
    fn loco_func2(&mut self, _address: u16, _functions: u8) {}
    /// `0 0 0 0 F12 F11 F10 F9`
    fn loco_func3(&mut self, _address: u16, _functions: u8) {}
    /// group 4 is F20..F13, group 5 is F28..F21
    fn loco_func_x(&mut self, _address: u16, _group: u8, _functions: u8) {}

    /// a device asks the position of the turnouts in the given group and nibble
    fn turnout_info(&mut self, _slot: u8, _group: u16, _nibble: u8) {}
    /// switch a turnout output
    fn turnout(&mut self, _address: u16, _output: u8, _active: bool, _unknown: bool) {}
    /// feedback module state broadcast by the master
    fn feedback(&mut self, _address: u16, _data: u8) {}

    /// write a CV on the programming track, or a CV value read back in slave mode
    fn direct_cv_write(&mut self, _cv: u16, _value: u8) {}
    /// read a CV on the programming track, answer with `set_cv_read_value` or `set_cv_nack`
    fn direct_cv_read(&mut self, _cv: u16) {}

    /// programming on main, byte mode
    fn pom_write_byte(&mut self, _address: u16, _cv: u16, _value: u8) {}
    /// programming on main, bit mode, value is `1 1 1 1 D B B B`
    fn pom_write_bit(&mut self, _address: u16, _cv: u16, _value: u8) {}
}

/// no application behavior at all
impl Hooks for () {}
