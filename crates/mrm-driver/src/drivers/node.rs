//! mrm-node，9 路模拟量 + 5 路开关
//!
//! 固件按**大端**打包 16 位字段。
//!
//! | code | 负载 |
//! |------|------|
//! | 0x04-0x06 | 模拟量 3k..3k+2（u16 BE） |
//! | 0x07 | 开关位图 u8 |

use crate::board::Board;
use crate::bus::CanBus;
use crate::error::DeviceError;
use crate::profile::{BoardProfile, Decoded, read_u16_group};
use mrm_protocol::{BoardKind, ProtocolError, require_len};

pub const NODE_ANALOG_INPUTS: usize = 9;
pub const NODE_SWITCHES: usize = 5;

const ANALOG_FIRST: u8 = 0x04;
const ANALOG_LAST: u8 = 0x06;
const SWITCHES: u8 = 0x07;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeReading {
    pub analog: [u16; NODE_ANALOG_INPUTS],
    pub switches: u8,
}

pub struct Node;

impl BoardProfile for Node {
    const KIND: BoardKind = BoardKind::Node;
    type Reading = NodeReading;

    fn decode(code: u8, data: &[u8], reading: &mut NodeReading) -> Result<Decoded, ProtocolError> {
        match code {
            ANALOG_FIRST..=ANALOG_LAST => {
                let first = 3 * (code - ANALOG_FIRST) as usize;
                read_u16_group(Self::BYTE_ORDER, data, &mut reading.analog, first, 3)?;
            },
            SWITCHES => {
                require_len(data, 2)?;
                reading.switches = data[1];
            },
            _ => return Ok(Decoded::Unknown),
        }
        Ok(Decoded::Sample)
    }
}

impl Board<Node> {
    pub fn analog(
        &mut self,
        bus: &mut CanBus,
        node: usize,
        input: usize,
    ) -> Result<u16, DeviceError> {
        Ok(self.reading(bus, node)?.analog.get(input).copied().unwrap_or(0))
    }

    pub fn switch_on(
        &mut self,
        bus: &mut CanBus,
        node: usize,
        switch: usize,
    ) -> Result<bool, DeviceError> {
        let switches = self.reading(bus, node)?.switches;
        Ok(switch < NODE_SWITCHES && switches & (1 << switch) != 0)
    }
}
