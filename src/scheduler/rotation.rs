/*
 *  scheduler/rotation.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  Round-robin rotation cursor over the available display modes
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

/// Cursor into the rotation mode list.
///
/// The cursor survives live takeovers and on-demand overrides untouched,
/// so rotation resumes exactly where it left off. When the mode list
/// shrinks underneath it the cursor clamps rather than resets.
#[derive(Debug, Default, Clone)]
pub struct RotationState {
    index: usize,
}

impl RotationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mode the cursor points at, clamping first if the list shrank
    pub fn current<'a>(&mut self, modes: &'a [String]) -> Option<&'a str> {
        if modes.is_empty() {
            return None;
        }
        if self.index >= modes.len() {
            self.index = 0;
        }
        Some(modes[self.index].as_str())
    }

    /// Step to the next mode, wrapping at the end of the list
    pub fn advance(&mut self, modes: &[String]) -> Option<String> {
        if modes.is_empty() {
            return None;
        }
        self.index = (self.index + 1) % modes.len();
        Some(modes[self.index].clone())
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modes(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_advance_wraps() {
        let list = modes(&["a", "b", "c"]);
        let mut cursor = RotationState::new();

        assert_eq!(cursor.current(&list), Some("a"));
        assert_eq!(cursor.advance(&list).as_deref(), Some("b"));
        assert_eq!(cursor.advance(&list).as_deref(), Some("c"));
        assert_eq!(cursor.advance(&list).as_deref(), Some("a"));
    }

    #[test]
    fn test_shrunk_list_clamps_not_panics() {
        let long = modes(&["a", "b", "c"]);
        let mut cursor = RotationState::new();
        cursor.advance(&long);
        cursor.advance(&long);
        assert_eq!(cursor.index(), 2);

        let short = modes(&["a"]);
        assert_eq!(cursor.current(&short), Some("a"));
        assert_eq!(cursor.index(), 0);
    }

    #[test]
    fn test_empty_list_yields_nothing() {
        let mut cursor = RotationState::new();
        assert_eq!(cursor.current(&[]), None);
        assert_eq!(cursor.advance(&[]), None);
    }
}
