use anyhow::{Context, Result};
use chrono::Utc;
use conquest_game::{MapData, RulesConfig};
use std::fs;
use std::path::Path;

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Parse `--seeds` tokens as integers.
pub fn parse_seeds(tokens: &[String]) -> Result<Vec<u64>> {
    tokens
        .iter()
        .map(|token| {
            token
                .parse::<u64>()
                .with_context(|| format!("invalid seed {token:?}"))
        })
        .collect()
}

/// The built-in classic board, or a JSON map from `path`.
pub fn load_map(path: Option<&Path>) -> Result<MapData> {
    let Some(path) = path else {
        return Ok(MapData::classic());
    };
    let json =
        fs::read_to_string(path).with_context(|| format!("reading map {}", path.display()))?;
    MapData::from_json(&json).with_context(|| format!("loading map {}", path.display()))
}

/// Rules from a JSON file; missing sections keep their defaults.
pub fn load_rules(path: &Path) -> Result<RulesConfig> {
    let json =
        fs::read_to_string(path).with_context(|| format!("reading rules {}", path.display()))?;
    RulesConfig::from_json(&json).with_context(|| format!("parsing rules {}", path.display()))
}

pub fn run_stamp() -> String {
    Utc::now().format("%Y%m%dT%H%M%S").to_string()
}
