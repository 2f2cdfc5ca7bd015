//! Translation of settings into DAQ card command strings.
//!
//! Card register layout (as written by `WC 00`):
//!
//! ```text
//! C0 = [ veto (2 bits) | coincidence (2 bits) ] [ ch3 ch2 ch1 ch0 ]
//! C2 = gate width low byte   (units of 10 ns)
//! C3 = gate width high byte  (units of 10 ns)
//! ```
use std::fmt::Display;

use super::settings::{ChannelConfig, ThresholdSettings, N_CHANNELS};

/// Code for each coincidence level: singles, twofold, threefold, fourfold
const COINCIDENCE_CODES: [u8; 4] = [0b00, 0b01, 0b10, 0b11];
/// Gate width is given to the card in units of 10 ns
const GATE_WIDTH_UNIT_NS: u32 = 10;

/// A single formatted instruction for the DAQ card
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DaqCommand(String);

impl DaqCommand {
    /// Operator-typed command. Trimmed and upper-cased; None if nothing is left
    pub fn raw(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(Self(text.to_uppercase()))
        }
    }

    /// Ask the card for its thresholds
    pub fn threshold_query() -> Self {
        Self(String::from("TL"))
    }

    /// Ask the card for its control registers
    pub fn channel_query() -> Self {
        Self(String::from("DC"))
    }

    /// Ask the card for a GPS report
    pub fn gps_query() -> Self {
        Self(String::from("DG"))
    }

    pub fn threshold(channel: usize, value: u32) -> Self {
        Self(format!("TL {channel} {value}"))
    }

    /// Channel, coincidence, and veto configuration
    pub fn channel_config(config: &ChannelConfig) -> Self {
        let (high, low) = encode_channel_config(config);
        Self(format!("WC 00 {high}{low}"))
    }

    /// Gate width as the pair (`WC 03 <hi>`, `WC 02 <lo>`), in the order they are sent
    pub fn gate_width(gate_width_ns: u32) -> [Self; 2] {
        let (high, low) = encode_gate_width(gate_width_ns);
        [
            Self(format!("WC 03 {high:02x}")),
            Self(format!("WC 02 {low:02x}")),
        ]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first word of the command, e.g. "TL" or "WC"
    pub fn mnemonic(&self) -> &str {
        self.0.split_whitespace().next().unwrap_or("")
    }

    /// Everything after the mnemonic
    pub fn arguments(&self) -> Vec<&str> {
        self.0.split_whitespace().skip(1).collect()
    }

    /// True for commands which ask the card to report state rather than change it
    pub fn is_query(&self) -> bool {
        self.arguments().is_empty() && matches!(self.mnemonic(), "TL" | "DC" | "DG")
    }
}

impl Display for DaqCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The threshold commands for all channels, in channel order
pub fn threshold_commands(thresholds: &ThresholdSettings) -> Vec<DaqCommand> {
    thresholds
        .thresholds
        .iter()
        .enumerate()
        .map(|(ch, value)| DaqCommand::threshold(ch, *value))
        .collect()
}

/// Two-bit veto code. The first selected veto source wins
fn veto_code(config: &ChannelConfig) -> u8 {
    if !config.veto {
        return 0b00;
    }
    match config.veto_channels.iter().position(|selected| *selected) {
        Some(0) => 0b01,
        Some(1) => 0b10,
        Some(2) => 0b11,
        _ => 0b00,
    }
}

/// Bit string of the coincidence/veto nibble. Veto code first, then one code per active
/// coincidence level (or `00` if none is active)
pub fn coincidence_bit_string(config: &ChannelConfig) -> String {
    let mut bits = format!("{:02b}", veto_code(config));
    let mut coincidence_set = false;
    for (active, code) in config.coincidences.iter().zip(COINCIDENCE_CODES) {
        if *active {
            bits.push_str(&format!("{code:02b}"));
            coincidence_set = true;
        }
    }
    if !coincidence_set {
        bits.push_str("00");
    }
    bits
}

/// Encode the configuration as the two hex digits of card register C0.
///
/// Only the last hex digit of the coincidence bit string is kept, so selecting several
/// coincidence levels at once results in the last one taking effect.
pub fn encode_channel_config(config: &ChannelConfig) -> (char, char) {
    let bits = coincidence_bit_string(config);
    spdlog::debug!("The first four bits are set to {}", bits);
    let value = bits
        .bytes()
        .fold(0u8, |acc, bit| (acc << 1) | (bit == b'1') as u8)
        & 0xf;

    // Channel 3 is the most significant bit
    let enable = config
        .channels
        .iter()
        .rev()
        .fold(0u8, |acc, active| (acc << 1) | *active as u8);

    (hex_digit(value), hex_digit(enable))
}

/// Decode card register C0 back into a configuration.
///
/// The inverse of [`encode_channel_config`] for configurations with at most one
/// coincidence level selected.
pub fn decode_channel_config(register: u8) -> ChannelConfig {
    let mut config = ChannelConfig::default();
    for ch in 0..N_CHANNELS {
        config.channels[ch] = register & (1 << ch) != 0;
    }
    let coincidence = ((register >> 4) & 0b11) as usize;
    config.coincidences[coincidence] = true;
    let veto = (register >> 6) & 0b11;
    if veto != 0 {
        config.veto = true;
        config.veto_channels[(veto - 1) as usize] = true;
    }
    config
}

/// Split a gate width (ns) into the high and low byte of the card value (10 ns units).
/// Widths beyond 16 bits saturate.
pub fn encode_gate_width(gate_width_ns: u32) -> (u8, u8) {
    let units = u16::try_from(gate_width_ns / GATE_WIDTH_UNIT_NS).unwrap_or_else(|_| {
        spdlog::warn!(
            "Gate width {} ns does not fit into the card register, using the maximum",
            gate_width_ns
        );
        u16::MAX
    });
    let [high, low] = units.to_be_bytes();
    (high, low)
}

/// Inverse of [`encode_gate_width`]
pub fn decode_gate_width(high: u8, low: u8) -> u32 {
    u16::from_be_bytes([high, low]) as u32 * GATE_WIDTH_UNIT_NS
}

fn hex_digit(value: u8) -> char {
    char::from_digit((value & 0xf) as u32, 16)
        .unwrap_or('0')
        .to_ascii_uppercase()
}
