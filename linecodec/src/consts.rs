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

//! Telnet protocol byte constants (RFC 854)

/// Interpret As Command
pub const IAC: u8 = 0xFF;
/// Refuse to perform, or continue performing, the indicated option
pub const DONT: u8 = 0xFE;
/// Request the other party perform the indicated option
pub const DO: u8 = 0xFD;
/// Refuse to perform the indicated option
pub const WONT: u8 = 0xFC;
/// Desire to begin performing the indicated option
pub const WILL: u8 = 0xFB;
/// Subnegotiation Begin
pub const SB: u8 = 0xFA;
/// Go Ahead
pub const GA: u8 = 0xF9;
/// Erase Line
pub const EL: u8 = 0xF8;
/// Erase Character
pub const EC: u8 = 0xF7;
/// Are You There
pub const AYT: u8 = 0xF6;
/// Abort Output
pub const AO: u8 = 0xF5;
/// Interrupt Process
pub const IP: u8 = 0xF4;
/// Break
pub const BRK: u8 = 0xF3;
/// Data Mark
pub const DM: u8 = 0xF2;
/// No Operation
pub const NOP: u8 = 0xF1;
/// Subnegotiation End
pub const SE: u8 = 0xF0;

/// Carriage Return
pub const CR: u8 = b'\r';
/// Line Feed
pub const LF: u8 = b'\n';
/// Null, the only byte allowed to follow a bare CR
pub const NUL: u8 = 0x00;
/// Backspace
pub const BS: u8 = 0x08;
/// Delete, sent by most terminals for the backspace key
pub const DEL: u8 = 0x7F;
