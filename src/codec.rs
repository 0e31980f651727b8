// Codec for the ADB server's smart-socket protocol
// Requests: <4 hex digit length><ascii command>
// Replies:  OKAY | FAIL<4 hex digit length><message>, and for host queries
//           OKAY<4 hex digit length><payload>

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdbReply {
    /// Request accepted; carries the payload when one was expected.
    Okay(Option<String>),
    Fail(String),
}

pub struct AdbCodec {
    // Current parsing state
    state: AdbCodecState,
    expect_payload: bool,
}

enum AdbCodecState {
    ReadingStatus,
    // Status read, now waiting for the 4-digit length
    ReadingLength { failed: bool },
    ReadingPayload { failed: bool, expected_size: usize },
}

impl Default for AdbCodec {
    fn default() -> Self {
        Self::new(false)
    }
}

impl AdbCodec {
    /// `expect_payload` is set for host queries whose OKAY is followed by data.
    pub fn new(expect_payload: bool) -> Self {
        Self {
            state: AdbCodecState::ReadingStatus,
            expect_payload,
        }
    }
}

fn invalid_data(msg: impl Into<String>) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.into())
}

impl Decoder for AdbCodec {
    type Item = AdbReply;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                AdbCodecState::ReadingStatus => {
                    if buf.len() < 4 {
                        return Ok(None);
                    }
                    let status = buf.split_to(4);
                    match &status[..] {
                        b"OKAY" if !self.expect_payload => return Ok(Some(AdbReply::Okay(None))),
                        b"OKAY" => self.state = AdbCodecState::ReadingLength { failed: false },
                        b"FAIL" => self.state = AdbCodecState::ReadingLength { failed: true },
                        other => {
                            return Err(invalid_data(format!(
                                "Unexpected ADB status: {}",
                                String::from_utf8_lossy(other)
                            )))
                        }
                    }
                }

                AdbCodecState::ReadingLength { failed } => {
                    if buf.len() < 4 {
                        return Ok(None);
                    }
                    let len_bytes = buf.split_to(4);
                    let len_str = std::str::from_utf8(&len_bytes)
                        .map_err(|_| invalid_data("Invalid UTF-8 in length header"))?;
                    let expected_size = usize::from_str_radix(len_str, 16)
                        .map_err(|_| invalid_data(format!("Invalid length: {}", len_str)))?;
                    self.state = AdbCodecState::ReadingPayload {
                        failed,
                        expected_size,
                    };
                }

                AdbCodecState::ReadingPayload {
                    failed,
                    expected_size,
                } => {
                    if buf.len() < expected_size {
                        return Ok(None);
                    }
                    let content = buf.split_to(expected_size);
                    let message = String::from_utf8_lossy(&content).into_owned();
                    self.state = AdbCodecState::ReadingStatus;
                    return Ok(Some(if failed {
                        AdbReply::Fail(message)
                    } else {
                        AdbReply::Okay(Some(message))
                    }));
                }
            }
        }
    }
}

impl Encoder<&str> for AdbCodec {
    type Error = std::io::Error;

    fn encode(&mut self, request: &str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if request.len() > 0xffff {
            return Err(invalid_data("ADB request too long"));
        }
        dst.reserve(4 + request.len());
        dst.put_slice(format!("{:04x}", request.len()).as_bytes());
        dst.put_slice(request.as_bytes());
        Ok(())
    }
}
