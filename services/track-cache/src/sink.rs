use std::{fs, path::{Path, PathBuf}};
use serde_json::Value;

use crate::errors::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawType {
    /// One artist's top-track batch as returned by the catalog
    TopTracks,
    /// Flattened table snapshot for a run
    TrackTable
}

/// Archive of zstd compressed json documents under `root`
pub struct DiskZstdSink {
    root: PathBuf,
    level: i32
}

impl DiskZstdSink {
    pub fn new(root: impl AsRef<Path>, level: i32) -> Self {
        Self { root: root.as_ref().to_path_buf(), level: level.clamp(0, 21)}
    }

    pub fn write_json(&self, kind: RawType, key: &str, mut json: Value) ->
        Result<PathBuf, PipelineError> {

        if kind == RawType::TopTracks {
            Self::prune_top_tracks(&mut json);
        }

        let path = self.root.join(Self::rel_path(kind, Self::sanitize_key(key)));
        let parent = path.parent()
            .ok_or_else(|| PipelineError::Io(std::io::Error::other(
                format!("no parent for {}", path.display())
            )))?;

        fs::create_dir_all(parent).map_err(|e| PipelineError::Io(std::io::Error::new(
            e.kind(), format!("create dir {}: {e}", parent.display())
        )))?;

        // write beside the target then rename, readers never see half a file
        let temp = tempfile::NamedTempFile::new_in(parent)?;
        {
            let mut enc = zstd::stream::write::Encoder::new(temp.as_file(), self.level)?;
            serde_json::to_writer(&mut enc, &json)?;
            enc.finish()?;
        }

        temp.persist(&path).map_err(|e| PipelineError::Io(std::io::Error::new(
            e.error.kind(), format!("persist {}: {}", path.display(), e.error)
        )))?;

        Ok(path)
    }

    #[cfg(test)]
    pub fn read_json(path: impl AsRef<Path>) -> Result<Value, PipelineError> {
        let file = fs::File::open(path)?;
        let dec = zstd::stream::read::Decoder::new(file)?;
        Ok(serde_json::from_reader(dec)?)
    }

    fn rel_path(kind: RawType, sanitize_key: String) -> PathBuf {
        match kind {
            RawType::TopTracks =>
                PathBuf::from("raw/spotify/top-tracks").join(
                    format!("{sanitize_key}.json.zst")
                ),
            RawType::TrackTable =>
                PathBuf::from("tables").join(format!("{sanitize_key}.json.zst")),
        }
    }

    /// Path-safe and injective: anything but letters, digits, `-` and `_`
    /// becomes `~<hex code point>~`
    fn sanitize_key(key: &str) -> String {
        let mut out = String::with_capacity(key.len());
        for c in key.chars() {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                out.push(c);
            } else {
                out.push_str(&format!("~{:x}~", c as u32));
            }
        }
        out
    }

    /// Drops bulky fields no table or analysis reads
    fn prune_top_tracks(v: &mut Value) {
        let Some(tracks) = v.as_array_mut() else { return };
        for track in tracks {
            if let Some(object) = track.as_object_mut() {
                object.remove("available_markets");
                object.remove("preview_url");
                if let Some(Value::Object(album)) = object.get_mut("album") {
                    album.remove("available_markets");
                    album.remove("images");
                }
            }
            Self::drop_keys_recursive(track, &["href", "uri", "external_urls"]);
        }
    }

    fn drop_keys_recursive(v: &mut Value, keys: &[&str]) {
        match v {
            Value::Object(map) => {
                for key in keys {
                    map.remove(*key);
                }
                for val in map.values_mut() {
                    Self::drop_keys_recursive(val, keys);
                }
            }
            Value::Array(arr) => {
                for element in arr {
                    Self::drop_keys_recursive(element, keys);
                }
            }
            _ => {}
        }
    }
}
