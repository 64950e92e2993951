//! Room layouts - parsing and tile lookup

use std::fs;
use std::path::Path;

/// Built-in room used when no layout file is configured
pub const DEFAULT_LAYOUT: &str = "\
name: Entry Hall
##############
#P....#.....E#
#.##..#..##..#
#..k..D..^...#
#.^^..#......#
##############
";

/// Single tile of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tile {
    Empty,
    Wall,
    Key,
    Door,
    Spikes,
    Exit,
}

impl Tile {
    fn from_glyph(glyph: char) -> Option<Self> {
        match glyph {
            '.' | ' ' | 'P' => Some(Tile::Empty),
            '#' => Some(Tile::Wall),
            'k' => Some(Tile::Key),
            'D' => Some(Tile::Door),
            '^' => Some(Tile::Spikes),
            'E' => Some(Tile::Exit),
            _ => None,
        }
    }

    pub fn glyph(self) -> u8 {
        match self {
            Tile::Empty => b'.',
            Tile::Wall => b'#',
            Tile::Key => b'k',
            Tile::Door => b'D',
            Tile::Spikes => b'^',
            Tile::Exit => b'E',
        }
    }
}

/// Parsed room: a rectangular tile grid with one start position
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub name: String,
    pub width: usize,
    pub height: usize,
    tiles: Vec<Tile>,
    pub start: (i32, i32),
}

impl Layout {
    /// Load a layout from file, returns the built-in room on read error
    pub fn load_from_file(path: &Path) -> Result<Self, String> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) => {
                tracing::warn!(
                    "Failed to load layout from {}: {}, using default",
                    path.display(),
                    e
                );
                Ok(Self::default_layout())
            }
        }
    }

    /// Parse a layout from text.
    ///
    /// An optional `name:` line is followed by grid rows. Glyphs: `#` wall,
    /// `.` floor, `P` start, `k` key, `D` door, `^` spikes, `E` exit.
    pub fn parse(content: &str) -> Result<Self, String> {
        let mut name = String::from("Unnamed");
        let mut rows: Vec<&str> = Vec::new();

        for line in content.lines() {
            let line = line.trim_end();
            if line.trim().is_empty() {
                continue;
            }
            if let Some(n) = line.strip_prefix("name:") {
                name = n.trim().to_string();
                continue;
            }
            rows.push(line);
        }

        let height = rows.len();
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0);
        if height == 0 || width == 0 {
            return Err("Layout has no rows".to_string());
        }

        let mut tiles = Vec::with_capacity(width * height);
        let mut start = None;
        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                return Err(format!(
                    "Row {} has width {}, expected {}",
                    y,
                    row.chars().count(),
                    width
                ));
            }
            for (x, glyph) in row.chars().enumerate() {
                let tile = Tile::from_glyph(glyph)
                    .ok_or_else(|| format!("Unknown glyph '{}' at {},{}", glyph, x, y))?;
                if glyph == 'P' {
                    if start.is_some() {
                        return Err("Layout has more than one start".to_string());
                    }
                    start = Some((x as i32, y as i32));
                }
                tiles.push(tile);
            }
        }

        let start = start.ok_or("Layout has no start position 'P'")?;
        if !tiles.contains(&Tile::Exit) {
            return Err("Layout has no exit 'E'".to_string());
        }

        Ok(Self {
            name,
            width,
            height,
            tiles,
            start,
        })
    }

    pub fn default_layout() -> Self {
        match Self::parse(DEFAULT_LAYOUT) {
            Ok(layout) => layout,
            Err(e) => unreachable!("built-in layout is invalid: {}", e),
        }
    }

    /// Tile at `(x, y)`; anything outside the grid is wall
    pub fn tile(&self, x: i32, y: i32) -> Tile {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return Tile::Wall;
        }
        self.tiles[y as usize * self.width + x as usize]
    }

    /// Row-major positions of every tile of `kind`
    pub fn positions_of(&self, kind: Tile) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.tiles
            .iter()
            .enumerate()
            .filter(move |(_, t)| **t == kind)
            .map(|(i, _)| ((i % self.width) as i32, (i / self.width) as i32))
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }
}
