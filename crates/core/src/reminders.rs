// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of PlexGrains.
//
// PlexGrains is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// PlexGrains is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with PlexGrains. If not, see <https://www.gnu.org/licenses/>.

//! Reminder controller client constants
//!
//! Durable timers (reminders) are owned by a cluster-hosted reminder
//! controller grain; this node only carries the client stub. The controller
//! lives at the well-known identity `(REMINDER_CONTROLLER_INTERFACE, "0")`.

/// Interface id of the reminder controller grain
pub const REMINDER_CONTROLLER_INTERFACE: u32 = 0xFF01;

/// Grain id of the singleton reminder controller
pub const REMINDER_CONTROLLER_GRAIN_ID: &str = "0";

/// Method id: register or update a reminder
pub const METHOD_REGISTER_OR_UPDATE_REMINDER: u32 = 1;

/// Method id: unregister a reminder
pub const METHOD_UNREGISTER_REMINDER: u32 = 2;
