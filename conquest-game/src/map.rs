//! Static map data: territories, borders and continents.
//!
//! Map data describes the fixed shape of the board. Ownership and army counts
//! live in [`crate::state::GameState`], which is built from a validated map.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::ids::{ContinentId, TerritoryId};

/// Errors raised when map data violates the board's structural invariants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MapError {
    #[error("map data could not be parsed: {0}")]
    Parse(String),
    #[error("map has no territories")]
    Empty,
    #[error("territory `{0}` is defined more than once")]
    DuplicateTerritory(TerritoryId),
    #[error("continent `{0}` is defined more than once")]
    DuplicateContinent(ContinentId),
    #[error("continent `{0}` has no territories")]
    EmptyContinent(ContinentId),
    #[error("territory `{territory}` lists unknown neighbor `{neighbor}`")]
    UnknownNeighbor {
        territory: TerritoryId,
        neighbor: TerritoryId,
    },
    #[error("territory `{0}` lists itself as a neighbor")]
    SelfAdjacent(TerritoryId),
    #[error("`{from}` borders `{to}` but `{to}` does not border `{from}`")]
    AsymmetricBorder { from: TerritoryId, to: TerritoryId },
    #[error("continent `{continent}` lists unknown territory `{territory}`")]
    UnknownMember {
        continent: ContinentId,
        territory: TerritoryId,
    },
    #[error("territory `{territory}` belongs to unknown continent `{continent}`")]
    UnknownContinent {
        territory: TerritoryId,
        continent: ContinentId,
    },
    #[error("territory `{territory}` and continent `{continent}` disagree about membership")]
    MembershipMismatch {
        territory: TerritoryId,
        continent: ContinentId,
    },
    #[error("saved game and map disagree about territory `{0}`")]
    SnapshotMismatch(TerritoryId),
}

/// Static definition of a single territory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritoryDef {
    pub id: TerritoryId,
    #[serde(default)]
    pub name: String,
    pub continent: ContinentId,
    #[serde(default)]
    pub neighbors: BTreeSet<TerritoryId>,
}

/// A fixed group of territories granting a bonus to whoever holds all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Continent {
    pub id: ContinentId,
    pub name: String,
    pub bonus: u32,
    pub territories: BTreeSet<TerritoryId>,
}

impl Continent {
    #[must_use]
    pub fn contains(&self, territory: &TerritoryId) -> bool {
        self.territories.contains(territory)
    }
}

/// Complete static description of a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapData {
    pub name: String,
    pub continents: Vec<Continent>,
    pub territories: Vec<TerritoryDef>,
}

impl MapData {
    /// Parse and validate map data from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the map fails validation.
    pub fn from_json(json: &str) -> Result<Self, MapError> {
        let map: Self =
            serde_json::from_str(json).map_err(|err| MapError::Parse(err.to_string()))?;
        map.validate()?;
        Ok(map)
    }

    /// Check every structural invariant of the board.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), MapError> {
        if self.territories.is_empty() {
            return Err(MapError::Empty);
        }

        let mut defs: BTreeMap<&TerritoryId, &TerritoryDef> = BTreeMap::new();
        for def in &self.territories {
            if defs.insert(&def.id, def).is_some() {
                return Err(MapError::DuplicateTerritory(def.id.clone()));
            }
        }

        let mut continents: BTreeMap<&ContinentId, &Continent> = BTreeMap::new();
        for continent in &self.continents {
            if continents.insert(&continent.id, continent).is_some() {
                return Err(MapError::DuplicateContinent(continent.id.clone()));
            }
            if continent.territories.is_empty() {
                return Err(MapError::EmptyContinent(continent.id.clone()));
            }
            for member in &continent.territories {
                let Some(def) = defs.get(member) else {
                    return Err(MapError::UnknownMember {
                        continent: continent.id.clone(),
                        territory: member.clone(),
                    });
                };
                if def.continent != continent.id {
                    return Err(MapError::MembershipMismatch {
                        territory: member.clone(),
                        continent: continent.id.clone(),
                    });
                }
            }
        }

        for def in &self.territories {
            let Some(continent) = continents.get(&def.continent) else {
                return Err(MapError::UnknownContinent {
                    territory: def.id.clone(),
                    continent: def.continent.clone(),
                });
            };
            if !continent.contains(&def.id) {
                return Err(MapError::MembershipMismatch {
                    territory: def.id.clone(),
                    continent: def.continent.clone(),
                });
            }
            for neighbor in &def.neighbors {
                if neighbor == &def.id {
                    return Err(MapError::SelfAdjacent(def.id.clone()));
                }
                let Some(other) = defs.get(neighbor) else {
                    return Err(MapError::UnknownNeighbor {
                        territory: def.id.clone(),
                        neighbor: neighbor.clone(),
                    });
                };
                if !other.neighbors.contains(&def.id) {
                    return Err(MapError::AsymmetricBorder {
                        from: def.id.clone(),
                        to: neighbor.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn territory(&self, id: &TerritoryId) -> Option<&TerritoryDef> {
        self.territories.iter().find(|def| &def.id == id)
    }

    #[must_use]
    pub fn continent(&self, id: &ContinentId) -> Option<&Continent> {
        self.continents.iter().find(|continent| &continent.id == id)
    }

    /// Number of undirected borders on the board.
    #[must_use]
    pub fn border_count(&self) -> usize {
        self.territories
            .iter()
            .map(|def| def.neighbors.len())
            .sum::<usize>()
            / 2
    }

    /// The classic 42-territory, six-continent board.
    #[must_use]
    pub fn classic() -> Self {
        let mut neighbors: BTreeMap<&str, BTreeSet<TerritoryId>> = BTreeMap::new();
        for &(a, b) in CLASSIC_BORDERS {
            neighbors.entry(a).or_default().insert(TerritoryId::from(b));
            neighbors.entry(b).or_default().insert(TerritoryId::from(a));
        }

        let mut continents = Vec::with_capacity(CLASSIC_CONTINENTS.len());
        let mut territories = Vec::new();
        for &(id, name, bonus, members) in CLASSIC_CONTINENTS {
            continents.push(Continent {
                id: ContinentId::from(id),
                name: name.to_string(),
                bonus,
                territories: members.iter().map(|&m| TerritoryId::from(m)).collect(),
            });
            for &member in members {
                territories.push(TerritoryDef {
                    id: TerritoryId::from(member),
                    name: display_name(member),
                    continent: ContinentId::from(id),
                    neighbors: neighbors.get(member).cloned().unwrap_or_default(),
                });
            }
        }

        Self {
            name: "Classic".to_string(),
            continents,
            territories,
        }
    }
}

fn display_name(id: &str) -> String {
    id.split('_')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect::<String>()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

const CLASSIC_CONTINENTS: &[(&str, &str, u32, &[&str])] = &[
    (
        "north_america",
        "North America",
        5,
        &[
            "alaska",
            "northwest_territory",
            "greenland",
            "alberta",
            "ontario",
            "quebec",
            "western_united_states",
            "eastern_united_states",
            "central_america",
        ],
    ),
    (
        "south_america",
        "South America",
        2,
        &["venezuela", "peru", "brazil", "argentina"],
    ),
    (
        "europe",
        "Europe",
        5,
        &[
            "iceland",
            "great_britain",
            "scandinavia",
            "northern_europe",
            "western_europe",
            "southern_europe",
            "ukraine",
        ],
    ),
    (
        "africa",
        "Africa",
        3,
        &[
            "north_africa",
            "egypt",
            "east_africa",
            "congo",
            "south_africa",
            "madagascar",
        ],
    ),
    (
        "asia",
        "Asia",
        7,
        &[
            "ural",
            "siberia",
            "yakutsk",
            "kamchatka",
            "irkutsk",
            "mongolia",
            "japan",
            "afghanistan",
            "china",
            "middle_east",
            "india",
            "siam",
        ],
    ),
    (
        "australia",
        "Australia",
        2,
        &[
            "indonesia",
            "new_guinea",
            "western_australia",
            "eastern_australia",
        ],
    ),
];

const CLASSIC_BORDERS: &[(&str, &str)] = &[
    ("alaska", "alberta"),
    ("alaska", "kamchatka"),
    ("alaska", "northwest_territory"),
    ("northwest_territory", "alberta"),
    ("northwest_territory", "greenland"),
    ("northwest_territory", "ontario"),
    ("greenland", "iceland"),
    ("greenland", "ontario"),
    ("greenland", "quebec"),
    ("alberta", "ontario"),
    ("alberta", "western_united_states"),
    ("ontario", "eastern_united_states"),
    ("ontario", "quebec"),
    ("ontario", "western_united_states"),
    ("quebec", "eastern_united_states"),
    ("western_united_states", "central_america"),
    ("western_united_states", "eastern_united_states"),
    ("eastern_united_states", "central_america"),
    ("central_america", "venezuela"),
    ("venezuela", "brazil"),
    ("venezuela", "peru"),
    ("peru", "argentina"),
    ("peru", "brazil"),
    ("brazil", "argentina"),
    ("brazil", "north_africa"),
    ("iceland", "great_britain"),
    ("iceland", "scandinavia"),
    ("great_britain", "northern_europe"),
    ("great_britain", "scandinavia"),
    ("great_britain", "western_europe"),
    ("scandinavia", "northern_europe"),
    ("scandinavia", "ukraine"),
    ("northern_europe", "southern_europe"),
    ("northern_europe", "ukraine"),
    ("northern_europe", "western_europe"),
    ("western_europe", "north_africa"),
    ("western_europe", "southern_europe"),
    ("southern_europe", "egypt"),
    ("southern_europe", "middle_east"),
    ("southern_europe", "north_africa"),
    ("southern_europe", "ukraine"),
    ("ukraine", "afghanistan"),
    ("ukraine", "middle_east"),
    ("ukraine", "ural"),
    ("north_africa", "congo"),
    ("north_africa", "east_africa"),
    ("north_africa", "egypt"),
    ("egypt", "east_africa"),
    ("egypt", "middle_east"),
    ("east_africa", "congo"),
    ("east_africa", "madagascar"),
    ("east_africa", "middle_east"),
    ("east_africa", "south_africa"),
    ("congo", "south_africa"),
    ("south_africa", "madagascar"),
    ("ural", "afghanistan"),
    ("ural", "china"),
    ("ural", "siberia"),
    ("siberia", "china"),
    ("siberia", "irkutsk"),
    ("siberia", "mongolia"),
    ("siberia", "yakutsk"),
    ("yakutsk", "irkutsk"),
    ("yakutsk", "kamchatka"),
    ("kamchatka", "irkutsk"),
    ("kamchatka", "japan"),
    ("kamchatka", "mongolia"),
    ("irkutsk", "mongolia"),
    ("mongolia", "china"),
    ("mongolia", "japan"),
    ("afghanistan", "china"),
    ("afghanistan", "india"),
    ("afghanistan", "middle_east"),
    ("china", "india"),
    ("china", "siam"),
    ("middle_east", "india"),
    ("india", "siam"),
    ("siam", "indonesia"),
    ("indonesia", "new_guinea"),
    ("indonesia", "western_australia"),
    ("new_guinea", "eastern_australia"),
    ("new_guinea", "western_australia"),
    ("western_australia", "eastern_australia"),
];

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = r#"{
        "name": "Triangle",
        "continents": [
            { "id": "north", "name": "North", "bonus": 2, "territories": ["a", "b"] },
            { "id": "south", "name": "South", "bonus": 1, "territories": ["c"] }
        ],
        "territories": [
            { "id": "a", "name": "A", "continent": "north", "neighbors": ["b", "c"] },
            { "id": "b", "name": "B", "continent": "north", "neighbors": ["a", "c"] },
            { "id": "c", "name": "C", "continent": "south", "neighbors": ["a", "b"] }
        ]
    }"#;

    #[test]
    fn classic_map_is_valid() {
        let map = MapData::classic();
        map.validate().unwrap();
        assert_eq!(map.territories.len(), 42);
        assert_eq!(map.continents.len(), 6);
        assert_eq!(map.border_count(), 83);
        let asia = map.continent(&ContinentId::from("asia")).unwrap();
        assert_eq!(asia.bonus, 7);
        assert_eq!(asia.territories.len(), 12);
        let wus = map
            .territory(&TerritoryId::from("western_united_states"))
            .unwrap();
        assert_eq!(wus.name, "Western United States");
    }

    #[test]
    fn parses_small_map_from_json() {
        let map = MapData::from_json(TRIANGLE).unwrap();
        assert_eq!(map.name, "Triangle");
        assert_eq!(map.border_count(), 3);
    }

    #[test]
    fn rejects_one_way_border() {
        let json = TRIANGLE.replace(r#""neighbors": ["a", "b"]"#, r#""neighbors": ["a"]"#);
        let err = MapData::from_json(&json).unwrap_err();
        assert_eq!(
            err,
            MapError::AsymmetricBorder {
                from: TerritoryId::from("b"),
                to: TerritoryId::from("c"),
            }
        );
    }

    #[test]
    fn rejects_unknown_neighbor_and_membership_gaps() {
        let json = TRIANGLE.replace(r#""neighbors": ["b", "c"]"#, r#""neighbors": ["b", "z"]"#);
        assert!(matches!(
            MapData::from_json(&json),
            Err(MapError::UnknownNeighbor { .. })
        ));

        let json = TRIANGLE.replace(r#""territories": ["c"]"#, r#""territories": ["a"]"#);
        assert!(matches!(
            MapData::from_json(&json),
            Err(MapError::MembershipMismatch { .. })
        ));
    }

    #[test]
    fn reports_parse_failures() {
        assert!(matches!(
            MapData::from_json("{ not json"),
            Err(MapError::Parse(_))
        ));
    }
}
