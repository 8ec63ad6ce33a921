//! Bit-banged I2C bus (§4.4).
//!
//! Models the two-wire protocol at the electrical level: callers feed in the
//! combined SCL/SDA bus-pin word every clock and get back the open-drain
//! pull-down contribution to OR back into the bus. There is no separate
//! "byte" API; start/stop conditions and bit shifting all fall out of edge
//! detection on the two lines.

pub mod display;
pub mod rtc;

pub use display::I2cDisplay;
pub use rtc::Rtc;

/// A device addressable on the bus. `start`/`stop` bracket a transaction;
/// `write` delivers a byte shifted in from the master, `read_next` supplies
/// the next byte to shift out.
pub trait I2cDevice {
    fn at_address(&self, address: u8) -> bool;
    fn start(&mut self);
    fn read_next(&mut self) -> u8;
    fn write(&mut self, byte: u8);
    fn stop(&mut self);

    /// Advance any clock the device keeps independently of bus transactions
    /// (the RTC's calendar and square-wave output). Most devices ignore
    /// this; `bus_state` is OR'd with whatever pin the device drives.
    fn tick(&mut self, _bus_state: &mut u64, _time_ps: u64) {}

    /// Battery-backed state to persist across runs. Only the RTC has any.
    fn nvram(&self) -> Option<&[u8]> {
        None
    }

    fn load_nvram(&mut self, _data: &[u8]) {}
}

impl I2cDevice for I2cDisplay {
    fn at_address(&self, address: u8) -> bool {
        self.matches(address)
    }
    fn start(&mut self) {
        I2cDisplay::start(self)
    }
    fn read_next(&mut self) -> u8 {
        I2cDisplay::read_next(self)
    }
    fn write(&mut self, byte: u8) {
        I2cDisplay::write(self, byte)
    }
    fn stop(&mut self) {
        I2cDisplay::stop(self)
    }
}

impl I2cDevice for Rtc {
    fn tick(&mut self, bus_state: &mut u64, time_ps: u64) {
        Rtc::tick(self, bus_state, time_ps)
    }

    fn nvram(&self) -> Option<&[u8]> {
        Some(Rtc::sram(self))
    }

    fn load_nvram(&mut self, data: &[u8]) {
        Rtc::load_sram(self, data)
    }

    fn at_address(&self, address: u8) -> bool {
        self.matches(address)
    }
    fn start(&mut self) {
        Rtc::start(self)
    }
    fn read_next(&mut self) -> u8 {
        Rtc::read_next(self)
    }
    fn write(&mut self, byte: u8) {
        Rtc::write(self, byte)
    }
    fn stop(&mut self) {
        Rtc::stop(self)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    Reset,
    Idle,
    Address,
    Read,
    Write,
}

pub struct I2cBus {
    state: State,
    clock_mask: u64,
    data_mask: u64,
    bus_mask: u64,
    /// Last bus state observed on the masked bits, latched each tick.
    observed: u64,
    /// Open-drain pull-down contribution: bits set here are released
    /// (floating high); bits clear here are pulled low.
    output: u64,
    counter: u8,
    address: u8,
    io_byte: u8,
    send_ack: bool,
    current_device: Option<usize>,
    devices: Vec<Box<dyn I2cDevice>>,
}

impl I2cBus {
    pub fn new(clock_mask: u64, data_mask: u64) -> Self {
        Self {
            state: State::Reset,
            clock_mask,
            data_mask,
            bus_mask: clock_mask | data_mask,
            observed: 0,
            output: clock_mask | data_mask,
            counter: 0,
            address: 0,
            io_byte: 0,
            send_ack: false,
            current_device: None,
            devices: Vec::new(),
        }
    }

    pub fn add_device(&mut self, device: Box<dyn I2cDevice>) {
        self.devices.push(device);
    }

    /// Advance every attached device's ambient clock (independent of the
    /// bit-bang protocol state machine below). Call once per CPU cycle,
    /// before `tick`.
    pub fn tick_devices(&mut self, bus_state: &mut u64, time_ps: u64) {
        for device in self.devices.iter_mut() {
            device.tick(bus_state, time_ps);
        }
    }

    fn device_for_address(&self, address: u8) -> Option<usize> {
        self.devices.iter().position(|d| d.at_address(address))
    }

    /// The first attached device with battery-backed state (the RTC), if any.
    pub fn nvram(&self) -> Option<&[u8]> {
        self.devices.iter().find_map(|d| d.nvram())
    }

    pub fn load_nvram(&mut self, data: &[u8]) {
        for device in self.devices.iter_mut() {
            if device.nvram().is_some() {
                device.load_nvram(data);
                return;
            }
        }
    }

    /// Advance the bus state machine by one clock. `bus_state` carries the
    /// full 64-bit pin word; this combines the device's open-drain output
    /// into it (read-modify-write) and returns the combined value.
    pub fn tick(&mut self, bus_state: &mut u64) -> u64 {
        if self.state == State::Reset {
            self.observed = *bus_state;
            self.state = State::Idle;
            self.output = self.clock_mask | self.data_mask;
            *bus_state &= !self.bus_mask | self.output;
            return *bus_state;
        }

        // Open-drain wired-AND: a bit reads low if either side pulls it low.
        *bus_state &= !self.bus_mask | self.output;

        if (*bus_state & self.bus_mask) == (self.observed & self.bus_mask) {
            return *bus_state;
        }

        let data = *bus_state & self.data_mask;
        let clock = *bus_state & self.clock_mask;
        let clocked = (*bus_state & self.clock_mask) != (self.observed & self.clock_mask);
        let data_change = (*bus_state & self.data_mask) != (self.observed & self.data_mask);
        self.observed = *bus_state;

        if self.send_ack {
            if clocked && clock == 0 {
                if self.counter == 0 {
                    self.output &= !self.data_mask;
                    self.counter += 1;
                    return *bus_state;
                } else {
                    self.output |= self.data_mask;
                    self.counter = 0;
                    self.send_ack = false;
                }
            } else {
                return *bus_state;
            }
        }

        if data_change && !clocked && clock != 0 {
            if data != 0 {
                if let Some(idx) = self.current_device {
                    self.devices[idx].stop();
                }
                self.current_device = None;
                self.output = self.clock_mask | self.data_mask;
                self.state = State::Idle;
            } else {
                self.state = State::Address;
                self.counter = 0;
                self.address = 0;
            }
            return *bus_state;
        }

        match self.state {
            State::Address => {
                if clocked && clock != 0 {
                    if self.counter < 7 {
                        let bit = if data != 0 { 1 } else { 0 };
                        self.address = (self.address << 1) | bit;
                        self.counter += 1;
                    } else {
                        match self.device_for_address(self.address) {
                            Some(idx) => {
                                self.state = if data != 0 { State::Read } else { State::Write };
                                self.counter = 0;
                                self.send_ack = true;
                                self.current_device = Some(idx);
                                self.devices[idx].start();
                            }
                            None => {
                                log::debug!("i2c: no device at address {:#04x}", self.address);
                                self.state = State::Idle;
                            }
                        }
                    }
                }
            }
            State::Write => {
                if clocked && clock != 0 {
                    let bit = if data != 0 { 1 } else { 0 };
                    self.io_byte = (self.io_byte << 1) | bit;
                    self.counter += 1;
                    if self.counter == 8 {
                        if let Some(idx) = self.current_device {
                            self.devices[idx].write(self.io_byte);
                        }
                        self.counter = 0;
                        self.send_ack = true;
                    }
                }
            }
            State::Read => {
                if clocked && clock == 0 {
                    if self.counter == 0 {
                        self.io_byte = self
                            .current_device
                            .map(|idx| self.devices[idx].read_next())
                            .unwrap_or(0);
                    }
                    if self.io_byte & 0x80 != 0 {
                        self.output |= self.data_mask;
                    } else {
                        self.output &= !self.data_mask;
                    }
                    self.io_byte <<= 1;
                    self.counter += 1;
                    if self.counter == 9 {
                        self.counter = 0;
                        self.output |= self.data_mask;
                    }
                }
            }
            State::Reset | State::Idle => {}
        }

        *bus_state &= !self.bus_mask | self.output;
        *bus_state
    }
}
