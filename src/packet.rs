//! Archive control packets and their classification.
//!
//! A scan archive delivers a stream of [`ControlPacket`]s. Most carry one hyper-frame
//! of EPI data (every view of one slice/echo for every channel); some are pure scan
//! control and carry nothing to convert. [`classify`] turns a packet into a
//! [`PacketClass`], moving the sample cube out of the packet so the next pipeline
//! stage owns it.

use crate::error::{ConvertError, ConvertResult};
use ndarray::{Array3, Axis};
use num_complex::Complex32;

/// Complex samples of one packet, indexed `(readout sample, view, channel)`.
pub type SampleCube = Array3<Complex32>;

/// Packet opcode as reported by the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Scan bookkeeping with no sample data.
    ScanControl,
    /// Frame data described by a hyper-frame control payload.
    Frame,
    /// Any opcode this converter does not understand.
    Unknown(u16),
}

/// Hyper-frame control fields. Multi-word values arrive split into high/low halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HyperFrameControl {
    /// High word of the view skip.
    pub view_skip_h: u16,
    /// Low word of the view skip.
    pub view_skip_l: u16,
    /// High word of the slice code.
    pub slice_num_h: u16,
    /// Low word of the slice code.
    pub slice_num_l: u16,
    /// Echo (contrast) number.
    pub echo_num: u16,
}

impl HyperFrameControl {
    /// Builds a payload from logical values, splitting them into packet words.
    pub fn new(view_skip: i16, slice_code: u32, echo: u16) -> Self {
        // The sign-extended skip is what a scanner writes into the two words.
        let skip = i32::from(view_skip) as u32;
        Self {
            view_skip_h: (skip >> 16) as u16,
            view_skip_l: skip as u16,
            slice_num_h: (slice_code >> 16) as u16,
            slice_num_l: slice_code as u16,
            echo_num: echo,
        }
    }

    /// Signed view skip. Only the low 16 bits of the combined value are significant.
    pub fn view_skip(&self) -> i16 {
        packet_value(self.view_skip_h, self.view_skip_l) as u16 as i16
    }

    /// Raw slice code, to be resolved through the slice table.
    pub fn slice_code(&self) -> u32 {
        packet_value(self.slice_num_h, self.slice_num_l)
    }
}

/// Combines a high and a low packet word into one value.
pub fn packet_value(high: u16, low: u16) -> u32 {
    (u32::from(high) << 16) | u32::from(low)
}

/// Typed packet payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PacketPayload {
    /// No payload (scan control).
    Empty,
    /// Frame description for EPI data.
    HyperFrame(HyperFrameControl),
}

/// One unit of the raw archive stream.
#[derive(Debug, Clone)]
pub struct ControlPacket {
    /// Packet kind.
    pub opcode: Opcode,
    /// Decoded control payload.
    pub payload: PacketPayload,
    /// Sample cube, present on frame packets.
    pub data: Option<SampleCube>,
}

impl ControlPacket {
    /// A scan-control packet with no data.
    pub fn scan_control() -> Self {
        Self {
            opcode: Opcode::ScanControl,
            payload: PacketPayload::Empty,
            data: None,
        }
    }

    /// A frame packet carrying `samples` described by `control`.
    pub fn frame(control: HyperFrameControl, samples: SampleCube) -> Self {
        Self {
            opcode: Opcode::Frame,
            payload: PacketPayload::HyperFrame(control),
            data: Some(samples),
        }
    }

    /// Checked access to the hyper-frame payload.
    pub fn hyper_frame(&self) -> Option<&HyperFrameControl> {
        match &self.payload {
            PacketPayload::HyperFrame(control) => Some(control),
            PacketPayload::Empty => None,
        }
    }
}

/// A data packet after classification.
#[derive(Debug, Clone)]
pub struct DataPacket {
    /// Signed view skip; negative means mirrored view order.
    pub view_skip: i16,
    /// Raw slice code.
    pub slice_code: u32,
    /// Echo (contrast) number.
    pub echo: u16,
    /// Samples in packet order.
    pub samples: SampleCube,
}

impl DataPacket {
    /// Physical row order is mirrored when the view skip is negative.
    pub fn is_mirrored(&self) -> bool {
        self.view_skip < 0
    }

    /// Hands the cube over in ascending physical view order.
    pub fn oriented_samples(self) -> SampleCube {
        let mirrored = self.is_mirrored();
        let mut samples = self.samples;
        if mirrored {
            samples.invert_axis(Axis(1));
        }
        samples
    }

    /// Verifies the cube is `(frame_size, total_views, channels)`.
    pub fn check_shape(&self, index: usize, expected: (usize, usize, usize)) -> ConvertResult<()> {
        if self.samples.dim() != expected {
            return Err(ConvertError::malformed(
                index,
                format!(
                    "cube shape {:?} does not match (readout, views, channels) {:?}",
                    self.samples.dim(),
                    expected
                ),
            ));
        }
        Ok(())
    }
}

/// Outcome of classifying one packet.
#[derive(Debug, Clone)]
pub enum PacketClass {
    /// Pure control; contributes no records.
    Control,
    /// EPI data to convert.
    Data(DataPacket),
}

/// Classifies the packet at stream position `index`.
pub fn classify(packet: ControlPacket, index: usize) -> ConvertResult<PacketClass> {
    match packet.opcode {
        Opcode::ScanControl => Ok(PacketClass::Control),
        Opcode::Unknown(code) => Err(ConvertError::malformed(
            index,
            format!("unrecognized opcode {code:#06x}"),
        )),
        Opcode::Frame => {
            let control = *packet.hyper_frame().ok_or_else(|| {
                ConvertError::malformed(index, "frame packet without a hyper-frame payload")
            })?;
            let samples = packet
                .data
                .ok_or_else(|| ConvertError::malformed(index, "frame packet without sample data"))?;
            Ok(PacketClass::Data(DataPacket {
                view_skip: control.view_skip(),
                slice_code: control.slice_code(),
                echo: control.echo_num,
                samples,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_cube(readout: usize, views: usize, channels: usize) -> SampleCube {
        Array3::from_shape_fn((readout, views, channels), |(x, v, c)| {
            Complex32::new((100 * c + 10 * v + x) as f32, 0.0)
        })
    }

    #[test]
    fn packet_value_joins_high_and_low_words() {
        assert_eq!(packet_value(0, 7), 7);
        assert_eq!(packet_value(1, 2), 0x0001_0002);
    }

    #[test]
    fn view_skip_keeps_sign_of_low_word() {
        assert_eq!(HyperFrameControl::new(-1, 0, 0).view_skip(), -1);
        assert_eq!(HyperFrameControl::new(3, 0, 0).view_skip(), 3);

        let words = HyperFrameControl {
            view_skip_h: 0,
            view_skip_l: 0xfffe,
            ..Default::default()
        };
        assert_eq!(words.view_skip(), -2);
    }

    #[test]
    fn slice_code_spans_both_words() {
        let control = HyperFrameControl::new(1, 0x0002_0005, 0);
        assert_eq!(control.slice_num_h, 2);
        assert_eq!(control.slice_num_l, 5);
        assert_eq!(control.slice_code(), 0x0002_0005);
    }

    #[test]
    fn scan_control_packets_carry_nothing() {
        let class = classify(ControlPacket::scan_control(), 0).unwrap();
        assert!(matches!(class, PacketClass::Control));
    }

    #[test]
    fn frame_packets_extract_metadata() {
        let packet = ControlPacket::frame(HyperFrameControl::new(-1, 4, 2), ramp_cube(2, 3, 1));
        match classify(packet, 0).unwrap() {
            PacketClass::Data(data) => {
                assert_eq!(data.view_skip, -1);
                assert!(data.is_mirrored());
                assert_eq!(data.slice_code, 4);
                assert_eq!(data.echo, 2);
            }
            PacketClass::Control => panic!("expected data packet"),
        }
    }

    #[test]
    fn unknown_opcode_is_malformed() {
        let packet = ControlPacket {
            opcode: Opcode::Unknown(0x42),
            payload: PacketPayload::Empty,
            data: None,
        };
        let err = classify(packet, 5).unwrap_err();
        assert!(matches!(err, ConvertError::MalformedPacket { index: 5, .. }));
    }

    #[test]
    fn frame_without_payload_or_data_is_malformed() {
        let no_payload = ControlPacket {
            opcode: Opcode::Frame,
            payload: PacketPayload::Empty,
            data: Some(ramp_cube(1, 1, 1)),
        };
        assert!(classify(no_payload, 1).unwrap_err().is_recoverable());

        let no_data = ControlPacket {
            opcode: Opcode::Frame,
            payload: PacketPayload::HyperFrame(HyperFrameControl::default()),
            data: None,
        };
        assert!(classify(no_data, 2).unwrap_err().is_recoverable());
    }

    #[test]
    fn negative_skip_mirrors_view_axis() {
        let packet = DataPacket {
            view_skip: -1,
            slice_code: 0,
            echo: 0,
            samples: ramp_cube(2, 3, 2),
        };
        let oriented = packet.oriented_samples();
        assert_eq!(oriented[[0, 0, 0]], Complex32::new(20.0, 0.0));
        assert_eq!(oriented[[1, 2, 1]], Complex32::new(101.0, 0.0));
    }

    #[test]
    fn non_negative_skip_keeps_order() {
        let cube = ramp_cube(2, 3, 1);
        let packet = DataPacket {
            view_skip: 0,
            slice_code: 0,
            echo: 0,
            samples: cube.clone(),
        };
        assert_eq!(packet.oriented_samples(), cube);
    }

    #[test]
    fn shape_check_reports_mismatch() {
        let packet = DataPacket {
            view_skip: 1,
            slice_code: 0,
            echo: 0,
            samples: ramp_cube(2, 5, 1),
        };
        assert!(packet.check_shape(0, (2, 5, 1)).is_ok());
        assert!(packet.check_shape(3, (2, 6, 1)).unwrap_err().is_recoverable());
    }
}
