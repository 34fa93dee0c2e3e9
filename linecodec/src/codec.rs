//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use crate::{CodecError, InputEvent, Negotiation, OutputFrame, consts};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

/// Default upper bound on a single inbound line, in bytes.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    Data,
    InterpretAsCommand,
    Negotiate(Negotiation),
    Subnegotiate,
    SubnegotiateIAC,
}

/// A telnet-aware line codec.
///
/// One instance decodes the read half of a connection and a second instance
/// encodes the write half; the encoder carries no state.
#[derive(Debug, Clone)]
pub struct LineCodec {
    state: DecoderState,
    line: Vec<u8>,
    max_line_length: usize,
    after_cr: bool,
    truncated: bool,
}

impl LineCodec {
    /// Create a codec with the default line limit.
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a codec that keeps at most `max_line_length` bytes of each line.
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            state: DecoderState::Data,
            line: Vec::new(),
            max_line_length,
            after_cr: false,
            truncated: false,
        }
    }

    /// The configured line limit.
    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// Bytes of the line currently being assembled.
    pub fn pending(&self) -> &[u8] {
        &self.line
    }

    fn push(&mut self, byte: u8) {
        if self.line.len() < self.max_line_length {
            self.line.push(byte);
        } else if !self.truncated {
            self.truncated = true;
            warn!(limit = self.max_line_length, "Inbound line exceeds limit, truncating");
        }
    }

    fn take_line(&mut self) -> InputEvent {
        let text = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        self.truncated = false;
        trace!(len = text.len(), "Line completed");
        InputEvent::Line(text)
    }

    fn decode_data(&mut self, byte: u8) -> Option<InputEvent> {
        let after_cr = std::mem::replace(&mut self.after_cr, false);
        match byte {
            // Commands between CR and LF do not end the pairing
            consts::IAC => {
                self.after_cr = after_cr;
                self.state = DecoderState::InterpretAsCommand;
                None
            }
            consts::CR => {
                self.after_cr = true;
                Some(self.take_line())
            }
            consts::LF if after_cr => None,
            consts::LF => Some(self.take_line()),
            consts::NUL => None,
            consts::BS | consts::DEL => {
                self.line.pop();
                None
            }
            _ => {
                self.push(byte);
                None
            }
        }
    }

    fn decode_command(&mut self, byte: u8) -> Option<InputEvent> {
        self.state = DecoderState::Data;
        if let Some(verb) = Negotiation::from_command(byte) {
            self.state = DecoderState::Negotiate(verb);
            return None;
        }
        match byte {
            consts::IAC => {
                self.after_cr = false;
                self.push(consts::IAC);
                None
            }
            consts::SB => {
                self.state = DecoderState::Subnegotiate;
                None
            }
            consts::IP | consts::BRK => Some(InputEvent::Interrupt),
            consts::EC => {
                self.line.pop();
                None
            }
            consts::EL => {
                self.line.clear();
                None
            }
            consts::NOP | consts::DM | consts::AO | consts::AYT | consts::GA => None,
            other => {
                warn!("Received Unknown Command {:#X}", other);
                None
            }
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = InputEvent;
    type Error = CodecError;

    /// Consume bytes until one event is complete.
    ///
    /// Partial lines and partial command sequences are kept inside the codec,
    /// so `src` is always fully drained when `Ok(None)` is returned.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<InputEvent>, Self::Error> {
        while src.has_remaining() {
            let byte = src.get_u8();
            let event = match self.state {
                DecoderState::Data => self.decode_data(byte),
                DecoderState::InterpretAsCommand => self.decode_command(byte),
                DecoderState::Negotiate(verb) => {
                    self.state = DecoderState::Data;
                    Some(InputEvent::Negotiate(verb, byte))
                }
                DecoderState::Subnegotiate => {
                    if byte == consts::IAC {
                        self.state = DecoderState::SubnegotiateIAC;
                    }
                    None
                }
                DecoderState::SubnegotiateIAC => {
                    self.state = if byte == consts::SE {
                        DecoderState::Data
                    } else {
                        DecoderState::Subnegotiate
                    };
                    None
                }
            };
            if event.is_some() {
                return Ok(event);
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<InputEvent>, Self::Error> {
        if let Some(event) = self.decode(src)? {
            return Ok(Some(event));
        }
        if self.line.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.take_line()))
        }
    }
}

// UTF-8 never contains 0xFF, so outbound text needs no IAC escaping.
fn put_text(text: &str, dst: &mut BytesMut) {
    dst.reserve(text.len() + 2);
    dst.put_slice(text.as_bytes());
}

impl Encoder<OutputFrame> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, item: OutputFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            OutputFrame::Line(text) => {
                put_text(&text, dst);
                dst.put_slice(b"\r\n");
            }
            OutputFrame::Prompt(text) => put_text(&text, dst),
            OutputFrame::Verbatim(bytes) => {
                dst.reserve(bytes.len() + 2);
                for chunk in bytes.split_inclusive(|&b| b == consts::IAC) {
                    dst.put_slice(chunk);
                    if chunk.last() == Some(&consts::IAC) {
                        dst.put_u8(consts::IAC);
                    }
                }
                dst.put_slice(b"\r\n");
            }
            OutputFrame::Negotiate(verb, option) => {
                dst.put_slice(&[consts::IAC, verb.command(), option]);
            }
        }
        Ok(())
    }
}
