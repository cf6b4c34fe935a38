use crate::prelude::*;

use nom::IResult;
use nom_derive::{Nom, Parse};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;

pub const REQUEST_LEN: usize = 16;

/// Shortest response that carries every field `Reading` needs.
pub const DATA_FRAME_MIN_LEN: usize = 130;

/// Bytes around the payload whose length a response carries at offset 1:
/// start marker, length, two control bytes, two serial copies, checksum, end marker.
pub const FRAME_OVERHEAD: usize = 14;

// the serial is sent as its 8 hex digits, so it has to have all 8 of them
pub const SERIAL_MIN: u64 = 0x1000_0000;
pub const SERIAL_MAX: u64 = u32::MAX as u64;

const REQUEST_HEADER: [u8; 3] = [0x02, 0x40, 0x30];
const REQUEST_TRAILER: [u8; 2] = [0x01, 0x00];

const SEND_COMPLETE: &[u8] = b"DATA SEND";
const NO_INVERTER: &[u8] = b"NO INVERTER";

#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive)]
#[repr(u8)]
pub enum Marker {
    Start = 0x68,
    End = 0x16,
}

// {{{ Request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Request {
    serial: u32,
}

impl Request {
    pub fn new(serial: u64) -> Result<Self> {
        if !(SERIAL_MIN..=SERIAL_MAX).contains(&serial) {
            bail!(Error::InvalidInput(format!(
                "logger serial {} outside {}..={}",
                serial, SERIAL_MIN, SERIAL_MAX
            )));
        }

        Ok(Self {
            serial: serial as u32,
        })
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn bytes(&self) -> [u8; REQUEST_LEN] {
        let serial = self.serial.to_le_bytes();

        let mut r = [0; REQUEST_LEN];
        r[0] = Marker::Start.into();
        r[1..4].copy_from_slice(&REQUEST_HEADER);
        r[4..8].copy_from_slice(&serial);
        r[8..12].copy_from_slice(&serial);
        r[12..14].copy_from_slice(&REQUEST_TRAILER);
        r[14] = Self::checksum(&r[1..14]);
        r[15] = Marker::End.into();

        r
    }

    /// Additive checksum, modulo 256.
    pub fn checksum(data: &[u8]) -> u8 {
        data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
    }
} // }}}

// {{{ Classification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TerminalReason {
    SendComplete,
    NoInverter,
}

impl TerminalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalReason::SendComplete => "send-complete",
            TerminalReason::NoInverter => "no-inverter",
        }
    }

    fn phrase(&self) -> &'static [u8] {
        match self {
            TerminalReason::SendComplete => SEND_COMPLETE,
            TerminalReason::NoInverter => NO_INVERTER,
        }
    }
}

impl std::fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    Terminal(TerminalReason),
    Data,
    /// Neither a status phrase nor enough bytes for a reading yet.
    Incomplete,
}
// }}}

// {{{ RunState
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum RunState {
    Wait = 0,
    Normal = 1,
    Fault = 2,
    PermanentFault = 3,
    Check = 4,
}

pub struct RunStateString;
impl RunStateString {
    pub fn from_value(code: u16) -> &'static str {
        match RunState::try_from(code) {
            Ok(RunState::Wait) => "Wait",
            Ok(RunState::Normal) => "Normal",
            Ok(RunState::Fault) => "Fault",
            Ok(RunState::PermanentFault) => "Permanent Fault",
            Ok(RunState::Check) => "Check",
            Err(_) => "Unknown",
        }
    }
} // }}}

// {{{ Reading
fn inverter_id(i: &[u8]) -> IResult<&[u8], String> {
    Utils::ascii_string(i, 16)
}

fn main_fw(i: &[u8]) -> IResult<&[u8], String> {
    Utils::ascii_string(i, 15)
}

fn slave_fw(i: &[u8]) -> IResult<&[u8], String> {
    Utils::ascii_string(i, 9)
}

#[derive(PartialEq, Clone, Debug, Serialize, Nom)]
#[nom(BigEndian)]
pub struct Reading {
    #[nom(SkipBefore(15))] // prefix, control code, logger serial
    #[nom(Parse = "inverter_id")]
    pub id: String,

    #[nom(Parse = "Utils::be_i16_div10")]
    pub temperature: f64,

    #[nom(Parse = "Utils::be_u16_checked_div10")]
    pub v_pv_1: Option<f64>,
    #[nom(Parse = "Utils::be_u16_checked_div10")]
    pub v_pv_2: Option<f64>,
    #[nom(Parse = "Utils::be_u16_checked_div10")]
    pub v_pv_3: Option<f64>,

    #[nom(Parse = "Utils::be_u16_checked_div10")]
    pub i_pv_1: Option<f64>,
    #[nom(Parse = "Utils::be_u16_checked_div10")]
    pub i_pv_2: Option<f64>,
    #[nom(Parse = "Utils::be_u16_checked_div10")]
    pub i_pv_3: Option<f64>,

    #[nom(Parse = "Utils::be_u16_checked_div10")]
    pub i_ac_1: Option<f64>,
    #[nom(Parse = "Utils::be_u16_checked_div10")]
    pub i_ac_2: Option<f64>,
    #[nom(Parse = "Utils::be_u16_checked_div10")]
    pub i_ac_3: Option<f64>,

    #[nom(Parse = "Utils::be_u16_checked_div10")]
    pub v_ac_1: Option<f64>,
    #[nom(Parse = "Utils::be_u16_checked_div10")]
    pub v_ac_2: Option<f64>,
    #[nom(Parse = "Utils::be_u16_checked_div10")]
    pub v_ac_3: Option<f64>,

    // frequency and power alternate per phase
    #[nom(Parse = "Utils::be_u16_checked_div100")]
    pub f_ac_1: Option<f64>,
    #[nom(Parse = "Utils::be_u16_checked")]
    pub p_ac_1: Option<u16>,
    #[nom(Parse = "Utils::be_u16_checked_div100")]
    pub f_ac_2: Option<f64>,
    #[nom(Parse = "Utils::be_u16_checked")]
    pub p_ac_2: Option<u16>,
    #[nom(Parse = "Utils::be_u16_checked_div100")]
    pub f_ac_3: Option<f64>,
    #[nom(Parse = "Utils::be_u16_checked")]
    pub p_ac_3: Option<u16>,

    #[nom(Parse = "Utils::be_u16_div100")]
    pub e_today: f64,
    #[nom(Parse = "Utils::be_u32_div10")]
    pub e_total: f64,
    pub h_total: u32,

    pub run_state: u16,

    pub fault_grid_voltage: u16,
    pub fault_grid_frequency: u16,
    pub fault_grid_impedance: u16,
    pub fault_temperature: u16,
    pub fault_pv_voltage: u16,
    pub fault_gfci: u16,
    pub error_code: u32,

    #[nom(SkipBefore(4))]
    #[nom(Parse = "main_fw")]
    pub main_fw: String,
    #[nom(SkipBefore(5))]
    #[nom(Parse = "slave_fw")]
    pub slave_fw: String,

    #[nom(Ignore)]
    pub p_ac: u32,
}

impl Reading {
    fn calculate_derived_values(&mut self) {
        self.p_ac = [self.p_ac_1, self.p_ac_2, self.p_ac_3]
            .iter()
            .flatten()
            .map(|p| *p as u32)
            .sum();
    }

    pub fn run_state_label(&self) -> &'static str {
        RunStateString::from_value(self.run_state)
    }

    /// Numeric measurements in engineering units, absent channels left out.
    pub fn fields(&self) -> Vec<(&'static str, f64)> {
        let optional = [
            ("v_pv_1", self.v_pv_1),
            ("v_pv_2", self.v_pv_2),
            ("v_pv_3", self.v_pv_3),
            ("i_pv_1", self.i_pv_1),
            ("i_pv_2", self.i_pv_2),
            ("i_pv_3", self.i_pv_3),
            ("i_ac_1", self.i_ac_1),
            ("i_ac_2", self.i_ac_2),
            ("i_ac_3", self.i_ac_3),
            ("v_ac_1", self.v_ac_1),
            ("v_ac_2", self.v_ac_2),
            ("v_ac_3", self.v_ac_3),
            ("f_ac_1", self.f_ac_1),
            ("p_ac_1", self.p_ac_1.map(f64::from)),
            ("f_ac_2", self.f_ac_2),
            ("p_ac_2", self.p_ac_2.map(f64::from)),
            ("f_ac_3", self.f_ac_3),
            ("p_ac_3", self.p_ac_3.map(f64::from)),
        ];

        let mut r = vec![("temperature", self.temperature)];
        r.extend(optional.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))));
        r.extend([
            ("p_ac", self.p_ac as f64),
            ("e_today", self.e_today),
            ("e_total", self.e_total),
            ("h_total", self.h_total as f64),
            ("run_state", self.run_state as f64),
            ("error_code", self.error_code as f64),
        ]);
        r
    }
} // }}}

pub struct Parser;
impl Parser {
    pub fn classify(input: &[u8]) -> Classification {
        // status phrases first; a short terminal frame cannot be decoded
        for reason in [TerminalReason::SendComplete, TerminalReason::NoInverter] {
            if Self::find(input, reason.phrase()).is_some() {
                return Classification::Terminal(reason);
            }
        }

        if input.len() >= DATA_FRAME_MIN_LEN {
            Classification::Data
        } else {
            Classification::Incomplete
        }
    }

    /// Total frame length according to the length byte, once it has arrived.
    pub fn declared_len(input: &[u8]) -> Option<usize> {
        input.get(1).map(|len| *len as usize + FRAME_OVERHEAD)
    }

    /// The printable status text of a terminal frame, `DATA SEND IS OK` and the like.
    pub fn status_text(input: &[u8]) -> Option<String> {
        let start = [SEND_COMPLETE, NO_INVERTER]
            .iter()
            .filter_map(|phrase| Self::find(input, phrase))
            .min()?;

        let text: Vec<u8> = input[start..]
            .iter()
            .take_while(|b| b.is_ascii_graphic() || **b == b' ')
            .copied()
            .collect();

        Some(String::from_utf8_lossy(&text).trim_end().to_string())
    }

    pub fn parse(input: &[u8]) -> Result<Reading> {
        if input.len() < DATA_FRAME_MIN_LEN {
            bail!(Error::MalformedFrame(format!(
                "data frame is {} bytes, need at least {}",
                input.len(),
                DATA_FRAME_MIN_LEN
            )));
        }

        if input[0] != u8::from(Marker::Start) {
            warn!("data frame starts with {:#04x}, expected {:#04x}", input[0], u8::from(Marker::Start));
        }

        match Reading::parse(input) {
            Ok((_, mut r)) => {
                r.calculate_derived_values();
                Ok(r)
            }
            Err(err) => Err(Error::MalformedFrame(format!("field decode failed: {:?}", err)).into()),
        }
    }

    /// Optional strictness: the last two bytes should be the additive checksum
    /// of everything after the start marker, then the end marker.
    pub fn validate_checksum(input: &[u8]) -> Result<()> {
        let len = input.len();
        if len < 4 {
            bail!(Error::MalformedFrame(format!("{} bytes is too short to carry a checksum", len)));
        }

        if input[len - 1] != u8::from(Marker::End) {
            bail!(Error::MalformedFrame(format!(
                "frame ends with {:#04x}, expected {:#04x}",
                input[len - 1],
                u8::from(Marker::End)
            )));
        }

        let expected = Request::checksum(&input[1..len - 2]);
        if input[len - 2] != expected {
            bail!(Error::MalformedFrame(format!(
                "checksum mismatch - got {:#04x}, expected {:#04x}",
                input[len - 2],
                expected
            )));
        }

        Ok(())
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }
}

/// Builds the query frame for the logger with the given serial.
pub fn encode_request(serial: u32) -> Result<Vec<u8>> {
    Ok(Request::new(serial.into())?.bytes().to_vec())
}

pub fn classify_response(input: &[u8]) -> Classification {
    Parser::classify(input)
}

pub fn decode_reading(input: &[u8]) -> Result<Reading> {
    Parser::parse(input)
}
