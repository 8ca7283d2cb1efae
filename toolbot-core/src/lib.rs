// Copyright 2025 Sushanth (https://github.com/sushanthpy)
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

//! Toolbot Core
//!
//! Outbound-call admission, prompt construction and reply formatting.

pub mod admission;
pub mod error;
pub mod format;
pub mod message;
pub mod prompt;
pub mod sanitization;

pub use admission::{
    AdmissionConfig, AdmissionController, AdmissionRejected, AdmissionSnapshot, Admitted, Check,
};
pub use error::{Result, ToolbotError};
pub use format::{format_reply, parse_entries, FieldLabel, PlatformEntry};
pub use message::{ChatMessage, Sender};
pub use prompt::build_prompt;
