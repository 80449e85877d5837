//! Scripted dice for tests.

use std::collections::VecDeque;

use tablesync_core::rng::DeterministicRng;

/// Always lands on the lowest face. For tests that only need a roll to
/// happen.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockRng;

impl DeterministicRng for MockRng {
    fn next_u32_range(&mut self, min: u32, _max: u32) -> u32 {
        min
    }
}

/// Lands on the scripted faces in order.
///
/// # Panics
///
/// A draw after the script runs out panics, and so does a scripted face
/// that does not fit the die being rolled. Either means the test expected
/// a different roll.
#[derive(Debug)]
pub struct SequenceRng {
    faces: VecDeque<u32>,
}

impl SequenceRng {
    /// Scripts `faces`, first draw first.
    #[must_use]
    pub fn new(faces: Vec<u32>) -> Self {
        Self {
            faces: faces.into(),
        }
    }
}

impl DeterministicRng for SequenceRng {
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32 {
        let Some(face) = self.faces.pop_front() else {
            panic!("rolled a {min}..={max} die with no faces left in the script");
        };
        assert!(
            (min..=max).contains(&face),
            "scripted face {face} does not fit a {min}..={max} die"
        );
        face
    }
}
