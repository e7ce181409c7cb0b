//! Character Report - read-only view of what the pipeline would detect

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::grouping::{self, cmp_ignore_case, FoldedMap, FrameAsset};
use crate::naming;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnimationSummary {
    pub name: String,
    pub frames: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CharacterSummary {
    pub name: String,
    /// Frames carrying this character prefix, matched or not.
    pub sprites: usize,
    pub animations: Vec<AnimationSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CharacterReport {
    pub frames_scanned: usize,
    pub characters: Vec<CharacterSummary>,
    /// Frames that do not follow `Character_AnimName[_###]`.
    pub unmatched: Vec<String>,
}

impl CharacterReport {
    pub fn build(frames: &[FrameAsset]) -> Self {
        let mut sprite_counts: FoldedMap<usize> = FoldedMap::new();
        let mut unmatched = vec![];

        for frame in frames {
            if let Some(character) = naming::parse_character(&frame.name) {
                *sprite_counts.get_or_insert_with(character, || 0) += 1;
            }
            if naming::parse(&frame.name).is_err() {
                unmatched.push(frame.name.clone());
            }
        }
        unmatched.sort_by(|a, b| cmp_ignore_case(a, b));

        let groups = grouping::group(frames);
        let mut characters: Vec<CharacterSummary> = sprite_counts
            .iter()
            .map(|(name, sprites)| CharacterSummary {
                name: name.to_string(),
                sprites: *sprites,
                animations: groups
                    .get(name)
                    .map(|anims| {
                        anims
                            .iter()
                            .map(|(anim, frames)| AnimationSummary {
                                name: anim.to_string(),
                                frames: frames.len(),
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect();

        characters.sort_by(|a, b| {
            b.sprites
                .cmp(&a.sprites)
                .then_with(|| cmp_ignore_case(&a.name, &b.name))
        });

        Self {
            frames_scanned: frames.len(),
            characters,
            unmatched,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

impl fmt::Display for CharacterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.characters.is_empty() {
            return writeln!(f, "No characters detected. (Naming doesn't match Character_AnimName...)");
        }

        writeln!(f, "Detected Characters: {}", self.characters.len())?;
        for c in &self.characters {
            writeln!(f, "{}  ->  {} sprites", c.name, c.sprites)?;
            for a in &c.animations {
                writeln!(f, "    {} ({} frames)", a.name, a.frames)?;
            }
        }
        if !self.unmatched.is_empty() {
            writeln!(f, "Unmatched: {}", self.unmatched.len())?;
            for name in &self.unmatched {
                writeln!(f, "    {}", name)?;
            }
        }
        Ok(())
    }
}
