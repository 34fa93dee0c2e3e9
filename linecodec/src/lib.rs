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

//! # VariDial Line Codec
//!
//! A small, stateful codec that turns a raw telnet byte stream into complete
//! text lines and renders outbound text back onto the wire. It is designed to
//! sit underneath `tokio_util::codec::{FramedRead, FramedWrite}` on each half of
//! a split TCP stream.
//!
//! ## Inbound
//!
//! The decoder yields [`InputEvent`]s:
//!
//! - [`InputEvent::Line`] for every completed line. `CR LF`, `CR NUL` and a bare
//!   `LF` all terminate a line. Backspace and DEL erase the previous byte.
//! - [`InputEvent::Negotiate`] for `IAC <DO|DONT|WILL|WONT> <option>` requests.
//! - [`InputEvent::Interrupt`] for `IAC IP` and `IAC BRK`.
//!
//! Every other telnet command and any sub-negotiation block is consumed
//! silently. `IAC IAC` is a literal 0xFF data byte. Lines longer than the
//! configured limit are truncated rather than rejected.
//!
//! ## Outbound
//!
//! The encoder accepts [`OutputFrame`]s. Lines are always terminated with
//! `CR LF`, prompts are written without a terminator, and negotiation replies
//! are written as raw `IAC` sequences.
//!
//! ```rust
//! use bytes::BytesMut;
//! use tokio_util::codec::{Decoder, Encoder};
//! use varidial_linecodec::{InputEvent, LineCodec, OutputFrame};
//!
//! let mut codec = LineCodec::new();
//!
//! let mut input = BytesMut::from(&b"/s\r\nhello\n"[..]);
//! assert_eq!(codec.decode(&mut input).unwrap(), Some(InputEvent::Line("/s".into())));
//! assert_eq!(codec.decode(&mut input).unwrap(), Some(InputEvent::Line("hello".into())));
//!
//! let mut output = BytesMut::new();
//! codec.encode(OutputFrame::line("Changed to channel 2."), &mut output).unwrap();
//! assert_eq!(&output[..], b"Changed to channel 2.\r\n");
//! ```

#![warn(missing_docs, future_incompatible, rust_2018_idioms)]

mod codec;
pub mod consts;
mod frame;
mod result;

pub use codec::{DEFAULT_MAX_LINE_LENGTH, LineCodec};
pub use frame::{InputEvent, Negotiation, OutputFrame};
pub use result::{CodecError, CodecResult};
