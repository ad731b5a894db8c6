// TDB - TinyVM Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The channel contract between the debugger and the debuggee.
//!
//! The debugger core performs synchronous request/response over a
//! line-oriented reliable byte channel with one outstanding request at a
//! time. The concrete transport (TCP by default) lives outside the
//! core; anything that moves whole messages both ways can back a debug
//! session.

use crate::error::DebuggerError;

/// A reliable, ordered, message-oriented channel.
pub trait Messenger: Send {
    /// Delivers one message to the peer.
    fn send(&mut self, message: &str) -> Result<(), DebuggerError>;

    /// Blocks for the next message from the peer. `None` means the peer
    /// closed the channel.
    fn receive(&mut self) -> Result<Option<String>, DebuggerError>;
}
