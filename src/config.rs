/// External configuration loader.
///
/// Reads `rockfall.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.

use serde::Deserialize;
use std::path::PathBuf;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub speed: SpeedConfig,
    pub grid: GridConfig,
    pub catalog_path: PathBuf,
}

/// All rates are in seconds or tiles per second, so the simulation
/// behaves the same at any tick rate.
#[derive(Clone, Debug)]
pub struct SpeedConfig {
    pub tick_rate_ms: u64,
    pub fall_speed: f32,        // tiles/s, rock drop
    pub roll_speed: f32,        // tiles/s, rock shedding sideways
    pub move_speed: f32,        // tiles/s, player step
    pub gravity_interval: f32,  // seconds between gravity checks per rock
}

/// Playfield dimensions in tiles (the visible frame ring sits outside).
#[derive(Clone, Debug)]
pub struct GridConfig {
    pub width: i32,
    pub height: i32,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    speed: TomlSpeed,
    #[serde(default)]
    grid: TomlGrid,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlSpeed {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
    #[serde(default = "default_fall_speed")]
    fall_speed: f32,
    #[serde(default = "default_roll_speed")]
    roll_speed: f32,
    #[serde(default = "default_move_speed")]
    move_speed: f32,
    #[serde(default = "default_gravity_interval")]
    gravity_interval: f32,
}

#[derive(Deserialize, Debug)]
struct TomlGrid {
    #[serde(default = "default_grid_width")]
    width: i32,
    #[serde(default = "default_grid_height")]
    height: i32,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_catalog")]
    catalog: String,
}

// ── Defaults ──

fn default_tick_rate() -> u64 { 16 }
fn default_fall_speed() -> f32 { 4.0 }
fn default_roll_speed() -> f32 { 3.0 }
fn default_move_speed() -> f32 { 8.0 }
fn default_gravity_interval() -> f32 { 0.05 }

fn default_grid_width() -> i32 { 58 }
fn default_grid_height() -> i32 { 22 }

fn default_catalog() -> String { "LEVELS.DAT".into() }

impl Default for TomlSpeed {
    fn default() -> Self {
        TomlSpeed {
            tick_rate_ms: default_tick_rate(),
            fall_speed: default_fall_speed(),
            roll_speed: default_roll_speed(),
            move_speed: default_move_speed(),
            gravity_interval: default_gravity_interval(),
        }
    }
}

impl Default for TomlGrid {
    fn default() -> Self {
        TomlGrid {
            width: default_grid_width(),
            height: default_grid_height(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            catalog: default_catalog(),
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `rockfall.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();

        // Find rockfall.toml
        let toml_cfg = load_toml(&search_dirs);

        // Resolve the level catalog file
        let catalog_str = &toml_cfg.general.catalog;
        let catalog_path = if PathBuf::from(catalog_str).is_absolute() {
            PathBuf::from(catalog_str)
        } else {
            // Search candidate dirs for the catalog file
            search_dirs.iter()
                .map(|d| d.join(catalog_str))
                .find(|p| p.is_file())
                .unwrap_or_else(|| {
                    // Default: relative to CWD
                    PathBuf::from(catalog_str)
                })
        };

        GameConfig {
            speed: SpeedConfig {
                tick_rate_ms: toml_cfg.speed.tick_rate_ms,
                fall_speed: toml_cfg.speed.fall_speed,
                roll_speed: toml_cfg.speed.roll_speed,
                move_speed: toml_cfg.speed.move_speed,
                gravity_interval: toml_cfg.speed.gravity_interval,
            },
            grid: GridConfig {
                width: toml_cfg.grid.width,
                height: toml_cfg.grid.height,
            },
            catalog_path,
        }
    }
}

/// Candidate directories to search: exe dir + CWD + system paths (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        // Resolve symlinks so /usr/bin/rockfall → /usr/games/rockfall
        // still finds data relative to the real binary.
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home (~/.local/share/rockfall)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/rockfall");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    // 4. System data directory (/usr/share/rockfall)
    let sys = PathBuf::from("/usr/share/rockfall");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    // 5. Fallback
    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for rockfall.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("rockfall.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        eprintln!("Warning: rockfall.toml parse error: {e}");
                        eprintln!("Using default settings.");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    eprintln!("Warning: could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.speed.tick_rate_ms, 16);
        assert_eq!(cfg.speed.fall_speed, 4.0);
        assert_eq!(cfg.speed.gravity_interval, 0.05);
        assert_eq!(cfg.grid.width, 58);
        assert_eq!(cfg.grid.height, 22);
        assert_eq!(cfg.general.catalog, "LEVELS.DAT");
    }

    #[test]
    fn partial_section_keeps_unset_keys_at_defaults() {
        let cfg: TomlConfig = toml::from_str(
            "[speed]\nfall_speed = 6.0\n\n[grid]\nwidth = 40\n",
        )
        .unwrap();
        assert_eq!(cfg.speed.fall_speed, 6.0);
        assert_eq!(cfg.speed.roll_speed, 3.0);
        assert_eq!(cfg.grid.width, 40);
        assert_eq!(cfg.grid.height, 22);
    }

    #[test]
    fn catalog_override_is_read() {
        let cfg: TomlConfig =
            toml::from_str("[general]\ncatalog = \"packs/custom.dat\"\n").unwrap();
        assert_eq!(cfg.general.catalog, "packs/custom.dat");
    }
}
