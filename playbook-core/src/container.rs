//! Saved play serialization and deserialization

use crate::{EntityPosition, Error, Keyframe, KeyframeStore, Positions, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use tracing::debug;

/// Magic bytes for play files: "PLAY"
const MAGIC: [u8; 4] = [b'P', b'L', b'A', b'Y'];

/// Current play file version
const VERSION: u16 = 1;

/// Everything persisted for a play: its timeline length and keyframes
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SavedPlay {
    /// Timeline length in ticks
    pub duration: u32,
    /// Keyframes, ascending by time when produced by [`SavedPlay::from_store`]
    pub keyframes: Vec<Keyframe>,
}

impl SavedPlay {
    /// Creates a saved play
    pub fn new(duration: u32, keyframes: Vec<Keyframe>) -> Self {
        Self {
            duration,
            keyframes,
        }
    }

    /// Snapshots a store
    pub fn from_store(duration: u32, store: &KeyframeStore) -> Self {
        Self::new(duration, store.keyframes().to_vec())
    }

    /// Rebuilds a store, restoring time order and one keyframe per tick
    pub fn into_store(self) -> KeyframeStore {
        KeyframeStore::from_keyframes(self.keyframes)
    }

    /// Reads a play file from a reader
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        // Read and validate magic bytes
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::InvalidMagic);
        }

        let version = reader.read_u16::<LittleEndian>()?;
        if version != VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let duration = reader.read_u32::<LittleEndian>()?;
        let num_keyframes = reader.read_u32::<LittleEndian>()?;

        // Counts come from untrusted input; grow as keyframes are actually read
        let mut keyframes = Vec::with_capacity(num_keyframes.min(1024) as usize);
        for _ in 0..num_keyframes {
            let time = reader.read_u32::<LittleEndian>()?;
            let special = match reader.read_u8()? {
                0 => None,
                _ => Some(read_position(&mut reader)?),
            };

            let num_entities = reader.read_u32::<LittleEndian>()?;
            let mut positions = Positions::new();
            for _ in 0..num_entities {
                let id_len = reader.read_u16::<LittleEndian>()?;
                let mut id = vec![0u8; id_len as usize];
                reader.read_exact(&mut id)?;
                let id = String::from_utf8(id).map_err(|_| Error::InvalidEntityId)?;

                positions.insert(id, read_position(&mut reader)?);
            }

            keyframes.push(Keyframe::new(time, positions, special));
        }

        debug!(duration, keyframes = keyframes.len(), "read saved play");
        Ok(Self::new(duration, keyframes))
    }

    /// Writes the play file to a writer
    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&MAGIC)?;
        writer.write_u16::<LittleEndian>(VERSION)?;
        writer.write_u32::<LittleEndian>(self.duration)?;
        writer.write_u32::<LittleEndian>(self.keyframes.len() as u32)?;

        for keyframe in &self.keyframes {
            writer.write_u32::<LittleEndian>(keyframe.time)?;
            match keyframe.special {
                Some(pos) => {
                    writer.write_u8(1)?;
                    write_position(&mut writer, pos)?;
                }
                None => writer.write_u8(0)?,
            }

            writer.write_u32::<LittleEndian>(keyframe.positions.len() as u32)?;
            for (id, pos) in &keyframe.positions {
                let id_len =
                    u16::try_from(id.len()).map_err(|_| Error::EntityIdTooLong(id.len()))?;
                writer.write_u16::<LittleEndian>(id_len)?;
                writer.write_all(id.as_bytes())?;
                write_position(&mut writer, *pos)?;
            }
        }

        debug!(
            duration = self.duration,
            keyframes = self.keyframes.len(),
            "wrote saved play"
        );
        Ok(())
    }

    /// Parses a play from JSON
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the play as pretty-printed JSON
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn read_position<R: Read>(reader: &mut R) -> Result<EntityPosition> {
    let x = reader.read_f64::<LittleEndian>()?;
    let y = reader.read_f64::<LittleEndian>()?;
    Ok(EntityPosition::new(x, y))
}

fn write_position<W: Write>(writer: &mut W, pos: EntityPosition) -> Result<()> {
    writer.write_f64::<LittleEndian>(pos.x)?;
    writer.write_f64::<LittleEndian>(pos.y)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_play() -> SavedPlay {
        let mut store = KeyframeStore::new();
        let mut positions = Positions::new();
        positions.insert("pg".to_string(), EntityPosition::new(12.5, 80.0));
        positions.insert("center".to_string(), EntityPosition::new(50.0, 40.25));
        store.record(0, positions.clone(), Some(EntityPosition::new(12.5, 78.0)));
        positions.insert("pg".to_string(), EntityPosition::new(30.0, 60.0));
        store.record(120, positions, None);

        SavedPlay::from_store(2500, &store)
    }

    #[test]
    fn test_saved_play_roundtrip() {
        let play = sample_play();

        let mut buffer = Vec::new();
        play.write(&mut buffer).unwrap();

        let read_play = SavedPlay::read(Cursor::new(buffer)).unwrap();
        assert_eq!(play, read_play);
    }

    #[test]
    fn test_invalid_magic() {
        let result = SavedPlay::read(Cursor::new(b"PLYX\x01\x00".to_vec()));
        assert!(matches!(result, Err(Error::InvalidMagic)));
    }

    #[test]
    fn test_unsupported_version() {
        let mut buffer = Vec::new();
        sample_play().write(&mut buffer).unwrap();
        buffer[4] = 9;

        let result = SavedPlay::read(Cursor::new(buffer));
        assert!(matches!(result, Err(Error::UnsupportedVersion(9))));
    }

    #[test]
    fn test_truncated_file() {
        let mut buffer = Vec::new();
        sample_play().write(&mut buffer).unwrap();
        buffer.truncate(buffer.len() - 3);

        assert!(matches!(
            SavedPlay::read(Cursor::new(buffer)),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_huge_keyframe_count_fails_cleanly() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&MAGIC);
        buffer.write_u16::<LittleEndian>(VERSION).unwrap();
        buffer.write_u32::<LittleEndian>(100).unwrap();
        buffer.write_u32::<LittleEndian>(u32::MAX).unwrap();

        assert!(matches!(
            SavedPlay::read(Cursor::new(buffer)),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_into_store_resorts() {
        let play = SavedPlay::new(
            100,
            vec![
                Keyframe::new(80, Positions::new(), None),
                Keyframe::new(10, Positions::new(), None),
                Keyframe::new(80, Positions::new(), Some(EntityPosition::new(1.0, 1.0))),
            ],
        );

        let store = play.into_store();
        let times: Vec<u32> = store.iter().map(|k| k.time).collect();
        assert_eq!(times, vec![10, 80]);
        assert!(store.get(80).unwrap().special.is_some());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_roundtrip() {
        let play = sample_play();
        let json = play.to_json().unwrap();
        assert_eq!(SavedPlay::from_json(&json).unwrap(), play);
    }
}
