//! 电机控制器：mrm-mot4x3.6can、mrm-mot4x10、mrm-mot2x50、mrm-bldc2x50
//!
//! 每个电机通道是一个独立设备；编码器帧 `[0x13, i32 LE]`。

use crate::motor::{MotorProfile, MotorReading, decode_encoder};
use crate::profile::{BoardProfile, Decoded};
use mrm_protocol::{BoardKind, ProtocolError};

macro_rules! motor_profile {
    ($(#[$doc:meta])* $name:ident => $kind:ident) => {
        $(#[$doc])*
        pub struct $name;

        impl BoardProfile for $name {
            const KIND: BoardKind = BoardKind::$kind;
            type Reading = MotorReading;

            fn decode(
                code: u8,
                data: &[u8],
                reading: &mut MotorReading,
            ) -> Result<Decoded, ProtocolError> {
                decode_encoder(Self::BYTE_ORDER, code, data, reading)
            }
        }

        impl MotorProfile for $name {}
    };
}

motor_profile!(
    /// mrm-mot4x3.6can，4 通道 3.6 A
    Mot4x36 => Mot4x36
);
motor_profile!(
    /// mrm-mot4x10，4 通道 10 A
    Mot4x10 => Mot4x10
);
motor_profile!(
    /// mrm-mot2x50，2 通道 50 A
    Mot2x50 => Mot2x50
);
motor_profile!(
    /// mrm-bldc2x50，2 通道无刷
    Bldc2x50 => Bldc2x50
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motor_kinds() {
        assert_eq!(Mot4x36::KIND.devices_per_board(), 4);
        assert_eq!(Bldc2x50::KIND.devices_per_board(), 2);
        assert!(Mot4x10::KIND.is_motor());
    }

    #[test]
    fn test_encoder_decode() {
        let mut reading = MotorReading::default();
        let decoded = Mot4x10::decode(0x13, &[0x13, 0x10, 0x27, 0, 0], &mut reading).unwrap();
        assert_eq!(decoded, Decoded::Sample);
        assert_eq!(reading.encoder, 10_000);
        let decoded = Mot2x50::decode(0x08, &[0x08], &mut reading).unwrap();
        assert_eq!(decoded, Decoded::Unknown);
    }
}
