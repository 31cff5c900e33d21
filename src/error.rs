/*
 * Created on Mon Jul 06 2026
 *
 * This file is a part of Skytable
 * Skytable (formerly known as TerrabaseDB or Skybase) is a free and open-source
 * NoSQL database written by Sayan Nandan ("the Author") with the
 * vision to provide flexibility in data modelling without compromising
 * on performance, queryability or scalability.
 *
 * Copyright (c) 2026, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

use core::fmt;

pub type IndexResult<T> = Result<T, Error>;

#[derive(Debug, PartialEq, Clone, Copy)]
/// Recoverable, caller-input-originated failures at the public API boundary.
///
/// Internal invariant violations (a torn node, a sort that disagrees with itself) are not
/// represented here: those are programmer-error class bugs in the engine and are raised with
/// `panic!` at the point of detection, since there is nothing a caller could do to recover.
pub enum Error {
    /// A key of `+inf`, `-inf`, or NaN was passed to an operation that accepts keys
    BadKey,
    /// `range_search`/`ball_query` was called with `k0 > k1`
    BadRange,
    /// `remove` was asked to take out a payload that isn't present under the given key
    PayloadNotFound,
    /// `update` (key mutation) or full key-level `delete` (node-underflow rebalancing) was
    /// called; neither is implemented, matching the reference engine's stub
    NotImplemented,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadKey => write!(f, "key must be finite (no +/-inf or NaN)"),
            Self::BadRange => write!(f, "range_search requires k0 <= k1"),
            Self::PayloadNotFound => write!(f, "payload not found under the given key"),
            Self::NotImplemented => write!(f, "operation not implemented"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn display_is_human_readable() {
        assert_eq!(
            Error::BadKey.to_string(),
            "key must be finite (no +/-inf or NaN)"
        );
        assert_eq!(Error::NotImplemented.to_string(), "operation not implemented");
    }
}
