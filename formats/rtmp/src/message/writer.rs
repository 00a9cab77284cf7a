use std::io;

use utils::traits::writer::WriteTo;

use crate::protocol_control;

use super::{RtmpMessage, errors::RtmpMessageError};

impl<W: io::Write> WriteTo<W> for RtmpMessage {
    type Error = RtmpMessageError;
    fn write_to(&self, writer: &mut W) -> Result<(), Self::Error> {
        match self {
            RtmpMessage::ChunkLength(_)
            | RtmpMessage::Abort { .. }
            | RtmpMessage::Acknowledgement { .. }
            | RtmpMessage::WindowAcknowledgementSize { .. }
            | RtmpMessage::PeerBandwidth { .. } => {
                protocol_control::writer::Writer::new(writer).write(self)
            }
            RtmpMessage::UserControl(message) => message.write_to(writer),
            RtmpMessage::AudioData { payload } | RtmpMessage::VideoData { payload } => {
                writer.write_all(payload)?;
                Ok(())
            }
            RtmpMessage::Notify(notify) => notify.write_to(writer),
            RtmpMessage::Invoke(invoke) => invoke.write_to(writer),
        }
    }
}
