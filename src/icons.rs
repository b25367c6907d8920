//! Icon selection for the tray indicator
//!
//! Rendering is left to the presentation layer; this module only decides
//! which asset a poll result maps to and prepares the mirrored variant of
//! the synced icon.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::reconciler::AggregateState;

pub const SYNCED_ICON: &str = "emblem-default.png";
pub const SYNCED_FLIPPED_ICON: &str = "emblem-default-flipped.png";
pub const SYNCING_ICON: &str = "emblem-synchronizing.png";
pub const ERROR_ICON: &str = "emblem-important.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndicatorIcon {
    Synced,
    SyncedFlipped,
    Syncing,
    Error,
}

impl IndicatorIcon {
    /// Map a state and the post-tick alternation bit to an icon.
    ///
    /// The bit is `true` after the first `Ok` tick, which shows the plain
    /// icon; the next `Ok` tick shows the mirrored one, and so on.
    pub fn select(state: AggregateState, alternation: bool) -> Self {
        match state {
            AggregateState::Ok if alternation => IndicatorIcon::Synced,
            AggregateState::Ok => IndicatorIcon::SyncedFlipped,
            AggregateState::Active => IndicatorIcon::Syncing,
            AggregateState::Error => IndicatorIcon::Error,
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            IndicatorIcon::Synced => SYNCED_ICON,
            IndicatorIcon::SyncedFlipped => SYNCED_FLIPPED_ICON,
            IndicatorIcon::Syncing => SYNCING_ICON,
            IndicatorIcon::Error => ERROR_ICON,
        }
    }
}

/// Icon assets in one directory
#[derive(Debug, Clone)]
pub struct IconSet {
    dir: PathBuf,
    flipped_ready: bool,
}

impl IconSet {
    /// Resolve icons under `dir` and generate the flipped synced icon.
    /// A failed flip is logged and the plain icon stands in for it.
    pub fn load<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let source = dir.join(SYNCED_ICON);
        let target = dir.join(SYNCED_FLIPPED_ICON);

        let flipped_ready = match flip_vertical(&source, &target) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("Flipped icon unavailable, using plain icon: {:#}", err);
                false
            }
        };

        Self { dir, flipped_ready }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn has_flipped(&self) -> bool {
        self.flipped_ready
    }

    pub fn path_for(&self, icon: IndicatorIcon) -> PathBuf {
        let icon = match icon {
            IndicatorIcon::SyncedFlipped if !self.flipped_ready => IndicatorIcon::Synced,
            other => other,
        };
        self.dir.join(icon.file_name())
    }
}

/// Write a vertically mirrored copy of `source` to `target`
pub fn flip_vertical(source: &Path, target: &Path) -> Result<()> {
    let image = image::open(source)
        .with_context(|| format!("Failed to open icon {}", source.display()))?;
    image
        .flipv()
        .save(target)
        .with_context(|| format!("Failed to write icon {}", target.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_test_icon(dir: &Path) {
        // Top row red, bottom row blue
        let img = RgbaImage::from_fn(2, 2, |_, y| {
            if y == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        img.save(dir.join(SYNCED_ICON)).unwrap();
    }

    #[test]
    fn test_icon_selection() {
        assert_eq!(IndicatorIcon::select(AggregateState::Ok, true), IndicatorIcon::Synced);
        assert_eq!(IndicatorIcon::select(AggregateState::Ok, false), IndicatorIcon::SyncedFlipped);
        assert_eq!(IndicatorIcon::select(AggregateState::Active, true), IndicatorIcon::Syncing);
        assert_eq!(IndicatorIcon::select(AggregateState::Error, false), IndicatorIcon::Error);
    }

    #[test]
    fn test_flip_vertical_mirrors_rows() {
        let temp_dir = TempDir::new().unwrap();
        write_test_icon(temp_dir.path());

        let target = temp_dir.path().join(SYNCED_FLIPPED_ICON);
        flip_vertical(&temp_dir.path().join(SYNCED_ICON), &target).unwrap();

        let flipped = image::open(&target).unwrap().to_rgba8();
        assert_eq!(flipped.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
        assert_eq!(flipped.get_pixel(1, 1), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_icon_set_uses_flipped_asset() {
        let temp_dir = TempDir::new().unwrap();
        write_test_icon(temp_dir.path());

        let icons = IconSet::load(temp_dir.path());
        assert!(icons.has_flipped());
        assert_eq!(
            icons.path_for(IndicatorIcon::SyncedFlipped),
            temp_dir.path().join(SYNCED_FLIPPED_ICON)
        );
        assert!(icons.path_for(IndicatorIcon::SyncedFlipped).exists());
    }

    #[test]
    fn test_icon_set_falls_back_without_source() {
        let temp_dir = TempDir::new().unwrap();

        let icons = IconSet::load(temp_dir.path());
        assert!(!icons.has_flipped());
        assert_eq!(
            icons.path_for(IndicatorIcon::SyncedFlipped),
            temp_dir.path().join(SYNCED_ICON)
        );
        assert_eq!(
            icons.path_for(IndicatorIcon::Error),
            temp_dir.path().join(ERROR_ICON)
        );
    }
}
