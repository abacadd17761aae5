/*
 *  scheduler/live.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  Live-set helpers - rotating within a live takeover
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

/// The next mode to show inside a live takeover.
///
/// While the current mode is in the live set, live rotation advances
/// circularly from it. When it is not (the takeover just began, or a
/// producer withdrew its modes mid-takeover), the set's first mode wins.
pub fn next_live_mode(live: &[String], current: Option<&str>) -> Option<String> {
    if live.is_empty() {
        return None;
    }

    match current.and_then(|c| live.iter().position(|m| m == c)) {
        Some(pos) => Some(live[(pos + 1) % live.len()].clone()),
        None => Some(live[0].clone()),
    }
}

/// Whether a mode participates in the live set
pub fn in_live_set(live: &[String], mode: Option<&str>) -> bool {
    match mode {
        Some(m) => live.iter().any(|l| l == m),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_takeover_starts_at_first_live_mode() {
        let live = set(&["a_live", "b_live"]);
        assert_eq!(next_live_mode(&live, Some("clock")).as_deref(), Some("a_live"));
        assert_eq!(next_live_mode(&live, None).as_deref(), Some("a_live"));
    }

    #[test]
    fn test_advances_circularly_within_set() {
        let live = set(&["a_live", "b_live"]);
        assert_eq!(next_live_mode(&live, Some("a_live")).as_deref(), Some("b_live"));
        assert_eq!(next_live_mode(&live, Some("b_live")).as_deref(), Some("a_live"));
    }

    #[test]
    fn test_empty_set_yields_nothing() {
        assert_eq!(next_live_mode(&[], Some("a_live")), None);
        assert!(!in_live_set(&[], Some("a_live")));
    }
}
