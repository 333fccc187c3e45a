use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Category → points accumulator that remembers the order keys first appeared.
///
/// Serializes as a JSON object whose keys follow that order, so stored
/// results and option tables read back exactly as they were written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreBoard {
    entries: Vec<(String, u32)>,
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds points to `key`, appending the key if it has not scored before.
    pub fn add(&mut self, key: &str, points: u32) {
        match self.entries.iter_mut().find(|(existing, _)| existing == key) {
            Some((_, total)) => *total = total.saturating_add(points),
            None => self.entries.push((key.to_string(), points)),
        }
    }

    /// Points for `key`; absent keys count as zero.
    pub fn get(&self, key: &str) -> u32 {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, points)| *points)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries
            .iter()
            .map(|(key, points)| (key.as_str(), *points))
    }

    pub fn max(&self) -> Option<u32> {
        self.entries.iter().map(|(_, points)| *points).max()
    }

    /// Keys sharing the highest total, in first-scored order.
    pub fn leaders(&self) -> Vec<&str> {
        match self.max() {
            Some(max) => self
                .iter()
                .filter(|(_, points)| *points == max)
                .map(|(key, _)| key)
                .collect(),
            None => Vec::new(),
        }
    }
}

impl<'a> FromIterator<(&'a str, u32)> for ScoreBoard {
    fn from_iter<I: IntoIterator<Item = (&'a str, u32)>>(iter: I) -> Self {
        let mut board = ScoreBoard::new();
        for (key, points) in iter {
            board.add(key, points);
        }
        board
    }
}

impl Serialize for ScoreBoard {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, points) in &self.entries {
            map.serialize_entry(key, points)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ScoreBoard {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ScoreBoardVisitor)
    }
}

struct ScoreBoardVisitor;

impl<'de> Visitor<'de> for ScoreBoardVisitor {
    type Value = ScoreBoard;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of category keys to non-negative points")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut board = ScoreBoard::new();
        while let Some((key, points)) = access.next_entry::<String, u32>()? {
            board.add(&key, points);
        }
        Ok(board)
    }
}
