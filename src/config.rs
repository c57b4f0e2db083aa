//! Application-level configuration loading: room timing defaults and the person catalog.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    dao::models::PersonEntity,
    state::room::{
        HINT_INTERVAL_RANGE, ROUND_DURATION_RANGE, ROUND_END_DELAY_RANGE, TOTAL_ROUNDS_RANGE,
    },
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "HINT_QUIZ_BACK_CONFIG_PATH";

/// Timing and size applied to every freshly created room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomDefaults {
    /// Seconds between two hint reveals.
    pub hint_interval_sec: u32,
    /// Hard limit of a round, in seconds.
    pub round_duration_sec: u32,
    /// Grace period between the final hint and the forced reveal, in seconds.
    pub round_end_delay_sec: u32,
    /// Rounds drawn when a room is created without an explicit count.
    pub total_rounds: u32,
}

impl Default for RoomDefaults {
    fn default() -> Self {
        Self {
            hint_interval_sec: 5,
            round_duration_sec: 30,
            round_end_delay_sec: 4,
            total_rounds: 5,
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    room: RoomDefaults,
    persons: Vec<PersonEntity>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        persons = app_config.persons.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Defaults applied to new rooms.
    pub fn room_defaults(&self) -> RoomDefaults {
        self.room
    }

    /// Persons available to the in-memory catalog.
    pub fn persons(&self) -> &[PersonEntity] {
        &self.persons
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            room: RoomDefaults::default(),
            persons: default_persons(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    room: RawRoomDefaults,
    #[serde(default)]
    persons: Option<Vec<PersonEntity>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRoomDefaults {
    hint_interval_sec: Option<u32>,
    round_duration_sec: Option<u32>,
    round_end_delay_sec: Option<u32>,
    total_rounds: Option<u32>,
}

impl From<RawRoomDefaults> for RoomDefaults {
    fn from(value: RawRoomDefaults) -> Self {
        let defaults = RoomDefaults::default();
        let clamp = |value: Option<u32>, fallback: u32, range: &std::ops::RangeInclusive<u32>| {
            value
                .unwrap_or(fallback)
                .clamp(*range.start(), *range.end())
        };
        Self {
            hint_interval_sec: clamp(
                value.hint_interval_sec,
                defaults.hint_interval_sec,
                &HINT_INTERVAL_RANGE,
            ),
            round_duration_sec: clamp(
                value.round_duration_sec,
                defaults.round_duration_sec,
                &ROUND_DURATION_RANGE,
            ),
            round_end_delay_sec: clamp(
                value.round_end_delay_sec,
                defaults.round_end_delay_sec,
                &ROUND_END_DELAY_RANGE,
            ),
            total_rounds: clamp(
                value.total_rounds,
                defaults.total_rounds,
                &TOTAL_ROUNDS_RANGE,
            ),
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let persons = match value.persons {
            Some(persons) if !persons.is_empty() => persons,
            Some(_) => {
                warn!("configured person catalog is empty; using built-in persons");
                default_persons()
            }
            None => default_persons(),
        };
        Self {
            room: value.room.into(),
            persons,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn person(id: &str, name: &str, categories: &[&str], occupation: &str, hints: &[&str]) -> PersonEntity {
    PersonEntity {
        id: id.into(),
        name: name.into(),
        categories: categories.iter().map(|code| code.to_string()).collect(),
        occupation: occupation.into(),
        hints: hints.iter().map(|hint| hint.to_string()).collect(),
    }
}

/// Built-in person catalog shipped with the binary.
fn default_persons() -> Vec<PersonEntity> {
    vec![
        person(
            "einstein",
            "Albert Einstein",
            &["science"],
            "theoretical physicist",
            &[
                "Born in Ulm in 1879.",
                "Worked as a clerk at the patent office in Bern.",
                "Explained the photoelectric effect.",
                "Formulated the special theory of relativity.",
                "His name became a synonym for genius.",
            ],
        ),
        person(
            "curie",
            "Marie Curie",
            &["science"],
            "physicist and chemist",
            &[
                "Grew up in Warsaw.",
                "Did most of her research in Paris.",
                "Studied radioactivity.",
                "Discovered polonium and radium.",
                "Won Nobel Prizes in two different sciences.",
            ],
        ),
        person(
            "lovelace",
            "Ada Lovelace",
            &["science", "tech"],
            "mathematician",
            &[
                "Daughter of a famous Romantic poet.",
                "Corresponded with Charles Babbage.",
                "Wrote notes on the Analytical Engine.",
                "Often called the first computer programmer.",
            ],
        ),
        person(
            "jobs",
            "Steve Jobs",
            &["tech"],
            "entrepreneur",
            &[
                "Dropped out of Reed College.",
                "Started a company in a garage in Los Altos.",
                "Ran Pixar for a while.",
                "Co-founded Apple.",
                "Presented the first iPhone in 2007.",
            ],
        ),
        person(
            "turing",
            "Alan Turing",
            &["science", "tech"],
            "mathematician and computer scientist",
            &[
                "Studied at King's College, Cambridge.",
                "Described an abstract computing machine in 1936.",
                "Worked at Bletchley Park during the war.",
                "Helped break the Enigma cipher.",
                "A famous test of machine intelligence bears his name.",
            ],
        ),
        person(
            "kahlo",
            "Frida Kahlo",
            &["art"],
            "painter",
            &[
                "Lived in the Blue House in Coyoacán.",
                "Survived a serious bus accident as a teenager.",
                "Married the muralist Diego Rivera.",
                "Painted many self-portraits.",
            ],
        ),
        person(
            "da-vinci",
            "Leonardo da Vinci",
            &["art", "science"],
            "painter and inventor",
            &[
                "Born in a Tuscan village in 1452.",
                "Filled notebooks with mirror writing.",
                "Sketched flying machines.",
                "Painted The Last Supper.",
                "Painted the Mona Lisa.",
            ],
        ),
        person(
            "mozart",
            "Wolfgang Amadeus Mozart",
            &["music"],
            "composer",
            &[
                "Born in Salzburg in 1756.",
                "Toured European courts as a child prodigy.",
                "Wrote The Magic Flute.",
                "Left his Requiem unfinished.",
            ],
        ),
        person(
            "freddie-mercury",
            "Freddie Mercury",
            &["music"],
            "singer and songwriter",
            &[
                "Born in Zanzibar.",
                "Studied graphic design in London.",
                "Performed at Live Aid in 1985.",
                "Wrote Bohemian Rhapsody.",
                "Lead singer of Queen.",
            ],
        ),
        person(
            "jordan",
            "Michael Jordan",
            &["sports"],
            "basketball player",
            &[
                "Was cut from his high school varsity team.",
                "Briefly played minor league baseball.",
                "Won six NBA championships.",
                "Wore number 23 for the Chicago Bulls.",
            ],
        ),
    ]
}
