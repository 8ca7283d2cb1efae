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

/// Minimum number of platforms the model is asked for
pub const MIN_SUGGESTIONS: usize = 3;
/// Maximum number of platforms the model is asked for
pub const MAX_SUGGESTIONS: usize = 7;

/// Build the instruction prompt for a user query.
///
/// The query is embedded verbatim. The reply grammar requested here is the one
/// `format::format_reply` understands.
pub fn build_prompt(user_query: &str) -> String {
    format!(
        "The user has the following question, task, or goal:\n\n\
         \"{user_query}\"\n\n\
         Your job is to return a list of {MIN_SUGGESTIONS} to {MAX_SUGGESTIONS} useful websites or platforms to help the user.\n\
         Do NOT answer the question directly.\n\n\
         Format your response EXACTLY like this:\n\n\
         ### Platform Name\n\
         - Link: https://example.com\n\
         - Free to Use: Yes/No (add details if needed)\n\
         - Note: A brief 2-4 sentence description about the platform and its benefits.\n\n\
         Repeat this format for each platform."
    )
}
