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

//! Conditional assertion macros for TDB testing
//!
//! These macros provide assertions that only execute when the
//! `TDB_TEST_STRICT` environment variable is set at compile time. This
//! allows optional strict validation during testing without affecting
//! production or normal test runs.

/// Assert a condition only when `TDB_TEST_STRICT` is set.
#[macro_export]
macro_rules! tdb_assert {
    ($($arg:tt)*) => {
        if option_env!("TDB_TEST_STRICT").is_some() {
            assert!($($arg)*);
        }
    };
}

/// Assert two expressions are equal only when `TDB_TEST_STRICT` is set.
#[macro_export]
macro_rules! tdb_assert_eq {
    ($($arg:tt)*) => {
        if option_env!("TDB_TEST_STRICT").is_some() {
            assert_eq!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_strict_assertions_compile() {
        tdb_assert!(1 + 1 == 2);
        tdb_assert_eq!(1 + 1, 2);
    }
}
