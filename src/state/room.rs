use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::time::SystemTime;

use indexmap::{IndexMap, IndexSet};
use rand::{Rng, rng};

use crate::{
    config::RoomDefaults,
    dao::{
        models::{
            CurrentPersonEntity, GuessEntity, PersonEntity, PlayerEntity, RoomEntity,
            RoundRecordEntity,
        },
        persons::mask_name,
    },
    state::{
        scoring::{is_correct, score_guess},
        state_machine::{InvalidTransition, RoomEvent, RoundEndReason, RoundStatus},
    },
};

/// Accepted values for `hintIntervalSec`, in seconds.
pub const HINT_INTERVAL_RANGE: RangeInclusive<u32> = 2..=20;
/// Accepted values for `roundDurationSec`, in seconds.
pub const ROUND_DURATION_RANGE: RangeInclusive<u32> = 10..=120;
/// Accepted values for the post-final-hint grace period, in seconds.
pub const ROUND_END_DELAY_RANGE: RangeInclusive<u32> = 1..=30;
/// Accepted number of rounds per game.
pub const TOTAL_ROUNDS_RANGE: RangeInclusive<u32> = 1..=50;

/// Length of generated player ids.
pub const PLAYER_ID_LEN: usize = 6;

const TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a random lowercase alphanumeric token (room ids, host keys, player ids).
pub fn random_token(len: usize) -> String {
    let mut rng = rng();
    (0..len)
        .map(|_| char::from(TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())]))
        .collect()
}

/// Member of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Server-minted id, resent by the client to reconnect.
    pub id: String,
    /// Display name, refreshed on every join.
    pub name: String,
    /// Points accumulated since the last lobby reset.
    pub score: u32,
    /// Whether the player is ready for the game to start.
    pub ready: bool,
    /// Whether the player currently has a live socket.
    pub connected: bool,
}

/// Entry of the current round's guess log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guess {
    /// Author id.
    pub player_id: String,
    /// Author name when guessing.
    pub player_name: String,
    /// Answer as typed.
    pub answer: String,
    /// Case-insensitive match on the full name.
    pub correct: bool,
    /// Milliseconds since the round started.
    pub time_ms: i64,
    /// Zero for wrong or repeated answers.
    pub points: u32,
}

/// Person being guessed. `hints[0]` is the masked name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    /// Catalog id.
    pub id: String,
    /// The answer.
    pub name: String,
    /// Shown from the start of the round.
    pub occupation: String,
    /// Masked name then clues.
    pub hints: Vec<String>,
}

/// Person already drawn for this game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundRecord {
    /// Catalog id.
    pub id: String,
    /// Person name, hidden from clients until revealed.
    pub name: String,
}

/// Authoritative state of one room, owned by its coordinator.
#[derive(Debug, Clone)]
pub struct Room {
    /// Room identifier.
    pub id: String,
    /// Secret used to claim the host role.
    pub host_key: String,
    /// Current host, if any.
    pub host_id: Option<String>,
    /// Members keyed by player id, in join order.
    pub players: IndexMap<String, Player>,
    /// Round progression.
    pub status: RoundStatus,
    /// Category persons are drawn from.
    pub selected_category: String,
    /// Person of the running or last finished round.
    pub current_person: Option<Person>,
    /// Number of hints shown, at least 1.
    pub visible_hints: u32,
    /// Guesses of the current round.
    pub guesses: Vec<Guess>,
    /// Epoch millis at which the current round started.
    pub round_start_time: Option<i64>,
    /// Hard limit of a round, in seconds.
    pub round_duration_sec: u32,
    /// Seconds between two hint reveals.
    pub hint_interval_sec: u32,
    /// Grace period after the final hint, in seconds.
    pub round_end_delay_sec: u32,
    /// Rounds requested when the room was created.
    pub total_rounds: u32,
    /// Persons not played yet, in draw order.
    pub remaining_person_ids: VecDeque<String>,
    /// Persons drawn since the last reset.
    pub round_history: Vec<RoundRecord>,
    /// Name of the person, set once the round ended.
    pub revealed_name: Option<String>,
    /// Epoch millis of the next scheduled wake-up.
    pub next_hint_at: Option<i64>,
    /// Epoch millis at which the final hint was shown.
    pub last_hint_revealed_at: Option<i64>,
    /// Players who already scored this round.
    pub round_correct_ids: IndexSet<String>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time the room was persisted.
    pub updated_at: SystemTime,
}

impl Room {
    /// Build a fresh room in the lobby with a pre-drawn person queue.
    pub fn new(
        id: String,
        host_key: String,
        total_rounds: u32,
        selected_category: String,
        defaults: RoomDefaults,
        person_ids: Vec<String>,
    ) -> Self {
        let timestamp = SystemTime::now();
        Self {
            id,
            host_key,
            host_id: None,
            players: IndexMap::new(),
            status: RoundStatus::Lobby,
            selected_category,
            current_person: None,
            visible_hints: 1,
            guesses: Vec::new(),
            round_start_time: None,
            round_duration_sec: defaults.round_duration_sec,
            hint_interval_sec: defaults.hint_interval_sec,
            round_end_delay_sec: defaults.round_end_delay_sec,
            total_rounds,
            remaining_person_ids: person_ids.into(),
            round_history: Vec::new(),
            revealed_name: None,
            next_hint_at: None,
            last_hint_revealed_at: None,
            round_correct_ids: IndexSet::new(),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Add or reconnect a player and return its id.
    ///
    /// A known `prior_id` reconnects the member and keeps its score and ready flag.
    /// The host role is granted when no host is set and `host_key` matches.
    pub fn join(&mut self, name: String, host_key: Option<&str>, prior_id: Option<&str>) -> String {
        let known = prior_id.filter(|id| self.players.contains_key(*id));
        let player_id = match known {
            Some(id) => {
                let player = &mut self.players[id];
                player.connected = true;
                player.name = name;
                id.to_string()
            }
            None => {
                let id = self.mint_player_id();
                self.players.insert(
                    id.clone(),
                    Player {
                        id: id.clone(),
                        name,
                        score: 0,
                        ready: false,
                        connected: true,
                    },
                );
                id
            }
        };

        if self.host_id.is_none() && host_key.is_some_and(|key| key == self.host_key) {
            self.host_id = Some(player_id.clone());
        }

        player_id
    }

    fn mint_player_id(&self) -> String {
        loop {
            let id = random_token(PLAYER_ID_LEN);
            if !self.players.contains_key(&id) {
                return id;
            }
        }
    }

    /// Whether `player_id` holds the host role.
    pub fn is_host(&self, player_id: &str) -> bool {
        self.host_id.as_deref() == Some(player_id)
    }

    /// Set a member's ready flag. Returns `false` for unknown players.
    pub fn set_ready(&mut self, player_id: &str, ready: bool) -> bool {
        match self.players.get_mut(player_id) {
            Some(player) => {
                player.ready = ready;
                true
            }
            None => false,
        }
    }

    /// Mark a member as gone. The host role moves to the first connected member, if any.
    pub fn mark_disconnected(&mut self, player_id: &str) -> bool {
        let Some(player) = self.players.get_mut(player_id) else {
            return false;
        };
        player.connected = false;

        if self.is_host(player_id) {
            self.host_id = self
                .players
                .values()
                .find(|player| player.connected)
                .map(|player| player.id.clone());
        }
        true
    }

    /// Host-only, from the lobby or a reveal, every member ready, and a person available.
    pub fn can_start(&self, player_id: &str) -> bool {
        self.is_host(player_id)
            && self.status.accepts(RoomEvent::StartGame)
            && !self.players.is_empty()
            && self.players.values().all(|player| player.ready)
            && (self.current_person.is_some() || !self.remaining_person_ids.is_empty())
    }

    /// Host-only, after a reveal, while persons remain.
    pub fn can_advance(&self, player_id: &str) -> bool {
        self.is_host(player_id)
            && self.status.accepts(RoomEvent::NextRound)
            && !self.remaining_person_ids.is_empty()
    }

    /// Host-only, lobby-only.
    pub fn can_configure(&self, player_id: &str) -> bool {
        self.is_host(player_id) && self.status.accepts(RoomEvent::Configure)
    }

    /// Take the next person id off the queue.
    pub fn pop_next_person_id(&mut self) -> Option<String> {
        self.remaining_person_ids.pop_front()
    }

    /// Make `person` the subject of the next round and record it in the history.
    pub fn install_person(&mut self, person: Person) {
        self.round_history.push(RoundRecord {
            id: person.id.clone(),
            name: person.name.clone(),
        });
        self.current_person = Some(person);
    }

    /// Enter `playing` through `event` and schedule the first hint reveal.
    pub fn start_round(&mut self, event: RoomEvent, now: i64) -> Result<(), InvalidTransition> {
        self.status = self.status.next(event)?;
        self.visible_hints = 1;
        self.guesses.clear();
        self.round_correct_ids.clear();
        self.round_start_time = Some(now);
        self.revealed_name = None;
        self.last_hint_revealed_at = None;
        self.schedule_wake(now + secs_to_ms(self.hint_interval_sec));
        Ok(())
    }

    /// Stop the round and reveal the name. Returns `false` when no round is running.
    pub fn end_round(&mut self, reason: RoundEndReason) -> bool {
        let Ok(next) = self.status.next(RoomEvent::EndRound(reason)) else {
            return false;
        };
        self.status = next;
        self.revealed_name = self.current_person.as_ref().map(|person| person.name.clone());
        self.next_hint_at = None;
        self.last_hint_revealed_at = None;
        true
    }

    /// Score and log a guess. Ends the round once every connected player has found.
    ///
    /// Returns `None` when no round is running or the player is unknown.
    pub fn apply_guess(&mut self, player_id: &str, answer: String, now: i64) -> Option<Guess> {
        if self.status != RoundStatus::Playing {
            return None;
        }
        let person = self.current_person.as_ref()?;
        let started_at = self.round_start_time?;
        let player = self.players.get(player_id)?;

        let elapsed_ms = now - started_at;
        let hint_index = self.visible_hints.saturating_sub(1) as usize;
        let correct = is_correct(&answer, &person.name);
        let already_correct = self.round_correct_ids.contains(player_id);
        let points = if correct && !already_correct {
            score_guess(
                hint_index,
                person.hints.len(),
                elapsed_ms,
                self.round_duration_sec,
            )
        } else {
            0
        };

        let guess = Guess {
            player_id: player_id.to_string(),
            player_name: player.name.clone(),
            answer,
            correct,
            time_ms: elapsed_ms,
            points,
        };
        self.guesses.push(guess.clone());

        if correct && !already_correct {
            if let Some(player) = self.players.get_mut(player_id) {
                player.score += points;
            }
            self.round_correct_ids.insert(player_id.to_string());
        }

        if self.all_connected_found() {
            self.end_round(RoundEndReason::AllFound);
        }

        Some(guess)
    }

    fn all_connected_found(&self) -> bool {
        let mut connected = self.players.values().filter(|player| player.connected).peekable();
        connected.peek().is_some()
            && connected.all(|player| self.round_correct_ids.contains(&player.id))
    }

    /// Apply in-range timing values. Returns whether anything changed.
    pub fn apply_config(&mut self, hint_interval_sec: Option<f64>, round_duration_sec: Option<f64>) -> bool {
        let mut changed = false;
        if let Some(value) = seconds_in_range(hint_interval_sec, &HINT_INTERVAL_RANGE) {
            changed |= self.hint_interval_sec != value;
            self.hint_interval_sec = value;
        }
        if let Some(value) = seconds_in_range(round_duration_sec, &ROUND_DURATION_RANGE) {
            changed |= self.round_duration_sec != value;
            self.round_duration_sec = value;
        }
        changed
    }

    /// Switch category with a freshly drawn queue and forget the history.
    pub fn change_category(&mut self, category: String, person_ids: Vec<String>) {
        self.selected_category = category;
        self.remaining_person_ids = person_ids.into();
        self.round_history.clear();
    }

    /// Return to the lobby with a new queue, zeroing scores and ready flags.
    pub fn reset_lobby(&mut self, person_ids: Vec<String>) {
        self.status = RoundStatus::Lobby;
        self.current_person = None;
        self.visible_hints = 1;
        self.guesses.clear();
        self.round_start_time = None;
        self.revealed_name = None;
        self.next_hint_at = None;
        self.last_hint_revealed_at = None;
        self.round_correct_ids.clear();
        self.remaining_person_ids = person_ids.into();
        self.round_history.clear();
        for player in self.players.values_mut() {
            player.score = 0;
            player.ready = false;
        }
    }

    /// Last round revealed and nothing left to play.
    pub fn is_game_over(&self) -> bool {
        self.status == RoundStatus::RoundEnd && self.remaining_person_ids.is_empty()
    }

    /// Rounds started since the last reset.
    pub fn current_round(&self) -> u32 {
        self.round_history.len() as u32
    }

    /// Hints currently shown to players.
    pub fn visible_hint_texts(&self) -> &[String] {
        match &self.current_person {
            Some(person) => {
                let shown = (self.visible_hints as usize).min(person.hints.len());
                &person.hints[..shown]
            }
            None => &[],
        }
    }
}

pub(crate) fn secs_to_ms(secs: u32) -> i64 {
    i64::from(secs) * 1000
}

fn seconds_in_range(value: Option<f64>, range: &RangeInclusive<u32>) -> Option<u32> {
    let value = value?;
    if !value.is_finite() || value.fract() != 0.0 {
        return None;
    }
    if value < f64::from(*range.start()) || value > f64::from(*range.end()) {
        return None;
    }
    Some(value as u32)
}

impl From<PersonEntity> for Person {
    fn from(value: PersonEntity) -> Self {
        let mut hints = Vec::with_capacity(value.hints.len() + 1);
        hints.push(mask_name(&value.name));
        hints.extend(value.hints);
        Self {
            id: value.id,
            name: value.name,
            occupation: value.occupation,
            hints,
        }
    }
}

impl From<CurrentPersonEntity> for Person {
    fn from(value: CurrentPersonEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            occupation: value.occupation,
            hints: value.hints,
        }
    }
}

impl From<&Person> for CurrentPersonEntity {
    fn from(value: &Person) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
            occupation: value.occupation.clone(),
            hints: value.hints.clone(),
        }
    }
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            score: value.score,
            ready: value.ready,
            connected: value.connected,
        }
    }
}

impl From<&Player> for PlayerEntity {
    fn from(value: &Player) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
            score: value.score,
            ready: value.ready,
            connected: value.connected,
        }
    }
}

impl From<GuessEntity> for Guess {
    fn from(value: GuessEntity) -> Self {
        Self {
            player_id: value.player_id,
            player_name: value.player_name,
            answer: value.answer,
            correct: value.correct,
            time_ms: value.time_ms,
            points: value.points,
        }
    }
}

impl From<&Guess> for GuessEntity {
    fn from(value: &Guess) -> Self {
        Self {
            player_id: value.player_id.clone(),
            player_name: value.player_name.clone(),
            answer: value.answer.clone(),
            correct: value.correct,
            time_ms: value.time_ms,
            points: value.points,
        }
    }
}

impl From<RoomEntity> for Room {
    fn from(value: RoomEntity) -> Self {
        let current_person: Option<Person> = value.current_person.map(Into::into);
        let max_hints = current_person
            .as_ref()
            .map(|person| person.hints.len().max(1) as u32)
            .unwrap_or(1);

        Self {
            id: value.id,
            host_key: value.host_key,
            host_id: value.host_id,
            players: value
                .players
                .into_iter()
                .map(|player| (player.id.clone(), player.into()))
                .collect(),
            status: value.round_status.into(),
            selected_category: value.selected_category,
            current_person,
            visible_hints: value.visible_hints.clamp(1, max_hints),
            guesses: value.guesses.into_iter().map(Into::into).collect(),
            round_start_time: value.round_start_time,
            round_duration_sec: value.round_duration_sec,
            hint_interval_sec: value.hint_interval_sec,
            round_end_delay_sec: value.round_end_delay_sec,
            total_rounds: value.total_rounds,
            remaining_person_ids: value.remaining_person_ids.into(),
            round_history: value
                .round_history
                .into_iter()
                .map(|record| RoundRecord {
                    id: record.id,
                    name: record.name,
                })
                .collect(),
            revealed_name: value.revealed_name,
            next_hint_at: value.next_hint_at,
            last_hint_revealed_at: value.last_hint_revealed_at,
            round_correct_ids: value.round_correct_ids.into_iter().collect(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<&Room> for RoomEntity {
    fn from(value: &Room) -> Self {
        Self {
            id: value.id.clone(),
            host_key: value.host_key.clone(),
            host_id: value.host_id.clone(),
            players: value.players.values().map(Into::into).collect(),
            round_status: value.status.into(),
            selected_category: value.selected_category.clone(),
            current_person: value.current_person.as_ref().map(Into::into),
            visible_hints: value.visible_hints,
            guesses: value.guesses.iter().map(Into::into).collect(),
            round_start_time: value.round_start_time,
            round_duration_sec: value.round_duration_sec,
            hint_interval_sec: value.hint_interval_sec,
            round_end_delay_sec: value.round_end_delay_sec,
            total_rounds: value.total_rounds,
            remaining_person_ids: value.remaining_person_ids.iter().cloned().collect(),
            round_history: value
                .round_history
                .iter()
                .map(|record| RoundRecordEntity {
                    id: record.id.clone(),
                    name: record.name.clone(),
                })
                .collect(),
            revealed_name: value.revealed_name.clone(),
            next_hint_at: value.next_hint_at,
            last_hint_revealed_at: value.last_hint_revealed_at,
            round_correct_ids: value.round_correct_ids.iter().cloned().collect(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const T0: i64 = 1_700_000_000_000;

    pub(crate) fn person(id: &str, name: &str, clues: usize) -> Person {
        PersonEntity {
            id: id.into(),
            name: name.into(),
            categories: vec!["science".into()],
            occupation: "scientist".into(),
            hints: (1..=clues).map(|n| format!("clue {n}")).collect(),
        }
        .into()
    }

    pub(crate) fn room(ids: &[&str]) -> Room {
        Room::new(
            "room01".into(),
            "hostkey1".into(),
            ids.len() as u32,
            "mix".into(),
            RoomDefaults::default(),
            ids.iter().map(|id| id.to_string()).collect(),
        )
    }

    /// Room with a host and a guest, both ready, playing `Ada Lovelace` (6 hints) from `T0`.
    pub(crate) fn playing_room() -> (Room, String, String) {
        let mut room = room(&["ada", "alan"]);
        let host = room.join("Host".into(), Some("hostkey1"), None);
        let guest = room.join("Guest".into(), None, None);
        room.set_ready(&host, true);
        room.set_ready(&guest, true);
        assert!(room.can_start(&host));
        let id = room.pop_next_person_id().unwrap();
        room.install_person(person(&id, "Ada Lovelace", 5));
        room.start_round(RoomEvent::StartGame, T0).unwrap();
        (room, host, guest)
    }

    #[test]
    fn tokens_are_lowercase_alphanumeric() {
        let token = random_token(8);
        assert_eq!(token.len(), 8);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
        );
    }

    #[test]
    fn person_hints_start_with_masked_name() {
        let person = person("ada", "Ada Lovelace", 2);
        assert_eq!(
            person.hints,
            vec!["_ _ _   _ _ _ _ _ _ _ _", "clue 1", "clue 2"]
        );
    }

    #[test]
    fn join_with_host_key_claims_host_once() {
        let mut room = room(&["a"]);
        let first = room.join("First".into(), Some("hostkey1"), None);
        let second = room.join("Second".into(), Some("hostkey1"), None);
        assert!(room.is_host(&first));
        assert!(!room.is_host(&second));
        assert_eq!(first.len(), PLAYER_ID_LEN);
    }

    #[test]
    fn wrong_host_key_grants_nothing() {
        let mut room = room(&["a"]);
        room.join("Mallory".into(), Some("nope"), None);
        assert!(room.host_id.is_none());
    }

    #[test]
    fn reconnect_keeps_score_and_ready() {
        let mut room = room(&["a"]);
        let id = room.join("Ann".into(), None, None);
        room.set_ready(&id, true);
        room.players[&id].score = 42;
        room.mark_disconnected(&id);

        let again = room.join("Annie".into(), None, Some(&id));
        assert_eq!(again, id);
        let player = &room.players[&id];
        assert_eq!(player.name, "Annie");
        assert_eq!(player.score, 42);
        assert!(player.ready);
        assert!(player.connected);
        assert_eq!(room.players.len(), 1);
    }

    #[test]
    fn unknown_prior_id_mints_a_new_member() {
        let mut room = room(&["a"]);
        let id = room.join("Ann".into(), None, Some("ghost1"));
        assert_ne!(id, "ghost1");
        assert!(room.players.contains_key(&id));
    }

    #[test]
    fn host_moves_to_a_connected_member_on_disconnect() {
        let mut room = room(&["a"]);
        let host = room.join("Host".into(), Some("hostkey1"), None);
        let away = room.join("Away".into(), None, None);
        let here = room.join("Here".into(), None, None);
        room.mark_disconnected(&away);

        room.mark_disconnected(&host);
        assert_eq!(room.host_id.as_deref(), Some(here.as_str()));
        assert!(room.players.contains_key(&host));

        room.mark_disconnected(&here);
        assert!(room.host_id.is_none());
    }

    #[test]
    fn host_key_reclaims_an_orphaned_room() {
        let mut room = room(&["a"]);
        let host = room.join("Host".into(), Some("hostkey1"), None);
        room.mark_disconnected(&host);
        assert!(room.host_id.is_none());
        room.join("Host".into(), Some("hostkey1"), Some(&host));
        assert!(room.is_host(&host));
    }

    #[test]
    fn start_requires_host_and_everyone_ready() {
        let mut room = room(&["a"]);
        let host = room.join("Host".into(), Some("hostkey1"), None);
        let guest = room.join("Guest".into(), None, None);
        room.set_ready(&host, true);
        assert!(!room.can_start(&host));
        room.set_ready(&guest, true);
        assert!(!room.can_start(&guest));
        assert!(room.can_start(&host));
    }

    #[test]
    fn start_resets_round_state() {
        let (room, _, _) = playing_room();
        assert_eq!(room.status, RoundStatus::Playing);
        assert_eq!(room.visible_hints, 1);
        assert!(room.guesses.is_empty());
        assert_eq!(room.round_start_time, Some(T0));
        assert_eq!(room.next_hint_at, Some(T0 + 5_000));
        assert_eq!(room.remaining_person_ids.len(), 1);
        assert_eq!(room.round_history.len(), 1);
        assert_eq!(room.current_round(), 1);
        assert_eq!(room.visible_hint_texts().len(), 1);
    }

    #[test]
    fn correct_guess_at_start_scores_full_points() {
        let (mut room, host, _) = playing_room();
        let guess = room.apply_guess(&host, "ada lovelace".into(), T0).unwrap();
        assert!(guess.correct);
        assert_eq!(guess.points, 100);
        assert_eq!(room.players[&host].score, 100);
        assert_eq!(room.status, RoundStatus::Playing);
    }

    #[test]
    fn second_correct_guess_scores_nothing() {
        let (mut room, host, _) = playing_room();
        room.apply_guess(&host, "Ada Lovelace".into(), T0 + 1_000);
        let again = room.apply_guess(&host, "Ada Lovelace".into(), T0 + 2_000).unwrap();
        assert!(again.correct);
        assert_eq!(again.points, 0);
        assert_eq!(room.guesses.len(), 2);
        assert_eq!(room.round_correct_ids.len(), 1);
    }

    #[test]
    fn wrong_guess_is_logged_without_points() {
        let (mut room, _, guest) = playing_room();
        let guess = room.apply_guess(&guest, "Marie Curie".into(), T0 + 3_000).unwrap();
        assert!(!guess.correct);
        assert_eq!(guess.points, 0);
        assert_eq!(guess.time_ms, 3_000);
        assert_eq!(guess.player_name, "Guest");
    }

    #[test]
    fn round_ends_when_every_connected_player_found() {
        let (mut room, host, guest) = playing_room();
        room.apply_guess(&host, "Ada Lovelace".into(), T0 + 1_000);
        room.apply_guess(&guest, "ADA LOVELACE".into(), T0 + 2_000);
        assert_eq!(room.status, RoundStatus::RoundEnd);
        assert_eq!(room.revealed_name.as_deref(), Some("Ada Lovelace"));
        assert!(room.next_hint_at.is_none());
    }

    #[test]
    fn disconnected_players_do_not_block_round_end() {
        let (mut room, host, guest) = playing_room();
        room.mark_disconnected(&guest);
        room.apply_guess(&host, "Ada Lovelace".into(), T0 + 1_000);
        assert_eq!(room.status, RoundStatus::RoundEnd);
    }

    #[test]
    fn guesses_are_ignored_outside_a_round() {
        let mut room = room(&["a"]);
        let id = room.join("Ann".into(), None, None);
        assert!(room.apply_guess(&id, "anything".into(), T0).is_none());
        assert!(room.guesses.is_empty());
    }

    #[test]
    fn next_round_only_after_reveal_with_queue() {
        let (mut room, host, guest) = playing_room();
        assert!(!room.can_advance(&host));
        room.end_round(RoundEndReason::Deadline);
        assert!(!room.can_advance(&guest));
        assert!(room.can_advance(&host));

        let id = room.pop_next_person_id().unwrap();
        room.install_person(person(&id, "Alan Turing", 4));
        room.start_round(RoomEvent::NextRound, T0 + 60_000).unwrap();
        assert!(!room.is_game_over());
        assert!(room.remaining_person_ids.is_empty());
        assert_eq!(room.round_history.len(), 2);

        room.end_round(RoundEndReason::AllFound);
        assert!(room.is_game_over());
        assert!(!room.can_advance(&host));
    }

    #[test]
    fn start_after_reveal_replays_the_same_person() {
        let (mut room, host, guest) = playing_room();
        room.apply_guess(&guest, "Ada Lovelace".into(), T0 + 1_000);
        let earned = room.players[&guest].score;
        room.end_round(RoundEndReason::Deadline);
        assert!(room.can_start(&host));
        assert!(!room.can_start(&guest));

        room.start_round(RoomEvent::StartGame, T0 + 40_000).unwrap();
        assert_eq!(room.status, RoundStatus::Playing);
        assert_eq!(room.current_person.as_ref().map(|p| p.id.as_str()), Some("ada"));
        assert_eq!(room.visible_hints, 1);
        assert!(room.guesses.is_empty());
        assert!(room.round_correct_ids.is_empty());
        assert!(room.revealed_name.is_none());
        assert_eq!(room.round_start_time, Some(T0 + 40_000));
        assert_eq!(room.round_history.len(), 1);
        assert_eq!(room.remaining_person_ids.len(), 1);
        assert_eq!(room.players[&guest].score, earned);
    }

    #[test]
    fn config_applies_only_integral_in_range_values() {
        let mut room = room(&["a"]);
        assert!(room.apply_config(Some(10.0), Some(500.0)));
        assert_eq!(room.hint_interval_sec, 10);
        assert_eq!(room.round_duration_sec, 30);

        assert!(!room.apply_config(Some(1.0), Some(f64::NAN)));
        assert!(!room.apply_config(Some(7.5), None));
        assert_eq!(room.hint_interval_sec, 10);

        assert!(room.apply_config(None, Some(120.0)));
        assert_eq!(room.round_duration_sec, 120);
    }

    #[test]
    fn configuration_is_refused_once_playing() {
        let (room, host, _) = playing_room();
        assert!(!room.can_configure(&host));
    }

    #[test]
    fn reset_lobby_zeroes_players_and_redraws() {
        let (mut room, host, guest) = playing_room();
        room.apply_guess(&host, "Ada Lovelace".into(), T0);
        room.reset_lobby(vec!["x".into(), "y".into()]);

        assert_eq!(room.status, RoundStatus::Lobby);
        assert!(room.current_person.is_none());
        assert!(room.round_history.is_empty());
        assert_eq!(room.remaining_person_ids.len(), 2);
        for id in [&host, &guest] {
            assert_eq!(room.players[id].score, 0);
            assert!(!room.players[id].ready);
        }
        assert!(room.next_hint_at.is_none());
    }

    #[test]
    fn category_change_replaces_queue_and_history() {
        let mut room = room(&["a"]);
        room.round_history.push(RoundRecord {
            id: "old".into(),
            name: "Old".into(),
        });
        room.change_category("art".into(), vec!["k".into()]);
        assert_eq!(room.selected_category, "art");
        assert_eq!(room.remaining_person_ids, VecDeque::from(vec!["k".to_string()]));
        assert!(room.round_history.is_empty());
    }

    #[test]
    fn entity_conversion_preserves_round_state() {
        let (mut room, host, _) = playing_room();
        room.apply_guess(&host, "nope".into(), T0 + 500);
        let entity = RoomEntity::from(&room);
        let restored = Room::from(entity);

        assert_eq!(restored.status, RoundStatus::Playing);
        assert_eq!(restored.players, room.players);
        assert_eq!(restored.current_person, room.current_person);
        assert_eq!(restored.guesses, room.guesses);
        assert_eq!(restored.next_hint_at, room.next_hint_at);
        assert_eq!(restored.remaining_person_ids, room.remaining_person_ids);
    }

    #[test]
    fn stored_visible_hints_are_clamped_to_the_person() {
        let (room, _, _) = playing_room();
        let mut entity = RoomEntity::from(&room);
        entity.visible_hints = 99;
        assert_eq!(Room::from(entity).visible_hints, 6);
    }
}
