// Source adapter: turns agent GUIDs and provider lists into canonical events

use malsync_models::{
    CanonicalEvent, MediaKind, ProviderGuid, RawIdentifier, SourceDatabase, WebhookEnvelope,
    WebhookEventType,
};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::metadata::AnimeMetadataLookup;

/// `<namespace>://<database>-<id>[/<season>/<episode>][?query]`, e.g. HAMA
static RE_RANGE_AGENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^:/]+://([a-z]+)-([^/?]+)(?:/([^/?]+)/([^/?]+))?/?(?:\?.*)?$").unwrap()
});

/// `<namespace>://<id>[/<season>/<episode>][/...][?query]`, e.g. the MyAnimeList agent
static RE_DIRECT_AGENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^:/]+)://(\d+)(?:/(\d+)/(\d+))?(?:[/?].*)?$").unwrap()
});

/// Agents whose GUIDs never carry an anime identifier
const UNSUPPORTED_NAMESPACES: [&str; 5] = ["local", "plex", "none", "localmedia", "imdb"];

/// Season/episode indices from the webhook envelope, used when the identifier has none
#[derive(Debug, Clone, Copy, Default)]
pub struct EpisodeHint {
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl EpisodeHint {
    pub fn from_envelope(envelope: &WebhookEnvelope) -> Self {
        Self {
            season: envelope.media.season,
            episode: envelope.media.episode,
        }
    }
}

/// Normalize the identifier of a webhook delivery into a canonical event
///
/// Rating events carry the envelope's score; scrobbles never do.
pub fn normalize<M>(
    raw: &RawIdentifier,
    kind: MediaKind,
    envelope: &WebhookEnvelope,
    metadata: &M,
) -> Result<CanonicalEvent>
where
    M: AnimeMetadataLookup + ?Sized,
{
    let hint = EpisodeHint::from_envelope(envelope);
    let mut event = match raw {
        RawIdentifier::Agent(guid) => parse_agent_guid(guid, kind, hint)?,
        RawIdentifier::Providers(guids) => select_provider(guids, kind, hint)?,
    };

    if envelope.event_type == WebhookEventType::Rate {
        event.rating = envelope.score();
    }

    Ok(apply_anidb_fallback(event, metadata))
}

/// Parse an agent-tagged GUID string
pub fn parse_agent_guid(guid: &str, kind: MediaKind, hint: EpisodeHint) -> Result<CanonicalEvent> {
    let guid = guid.trim();
    let (namespace, rest) = guid
        .split_once("://")
        .ok_or_else(|| SyncError::malformed(guid, "missing '://' separator"))?;

    if namespace.is_empty() || rest.is_empty() {
        return Err(SyncError::malformed(guid, "empty namespace or identifier"));
    }

    let first_segment = rest.split(['/', '?']).next().unwrap_or_default();
    if first_segment.chars().all(|c| c.is_ascii_digit()) {
        return parse_direct_agent(guid, namespace, kind, hint);
    }

    if UNSUPPORTED_NAMESPACES.contains(&namespace_token(namespace).as_str()) {
        return Err(SyncError::UnsupportedAgent(guid.to_string()));
    }

    if first_segment.contains('-') {
        return parse_range_agent(guid, kind);
    }

    Err(SyncError::malformed(
        guid,
        "expected <database>-<id> or a numeric id after '://'",
    ))
}

fn parse_range_agent(guid: &str, kind: MediaKind) -> Result<CanonicalEvent> {
    let caps = RE_RANGE_AGENT
        .captures(guid)
        .ok_or_else(|| SyncError::malformed(guid, "expected <namespace>://<database>-<id>[/<season>/<episode>]"))?;

    let token = &caps[1];
    let source_database = SourceDatabase::from_token(token)
        .ok_or_else(|| SyncError::UnsupportedAgent(guid.to_string()))?;
    let source_id = parse_number::<u64>(guid, "id", &caps[2])?;

    let event = match (caps.get(3), caps.get(4)) {
        (Some(season), Some(episode)) => CanonicalEvent {
            source_database,
            source_id,
            season: parse_number(guid, "season", season.as_str())?,
            episode: parse_number(guid, "episode", episode.as_str())?,
            media_kind: kind,
            rating: None,
        },
        // no season/episode means the agent matched a movie
        _ => CanonicalEvent {
            source_database,
            source_id,
            season: 1,
            episode: 1,
            media_kind: MediaKind::Movie,
            rating: None,
        },
    };

    debug!("Range agent GUID '{}' normalized to {}", guid, event);
    Ok(event)
}

fn parse_direct_agent(
    guid: &str,
    namespace: &str,
    kind: MediaKind,
    hint: EpisodeHint,
) -> Result<CanonicalEvent> {
    let caps = RE_DIRECT_AGENT
        .captures(guid)
        .ok_or_else(|| SyncError::malformed(guid, "expected <namespace>://<id>[/...]"))?;

    // legacy Plex agents (com.plexapp.agents.thetvdb, ...) name their database in the namespace
    let token = namespace_token(namespace);
    let source_database = match SourceDatabase::from_token(&token) {
        Some(db) => db,
        None if UNSUPPORTED_NAMESPACES.contains(&token.as_str()) => {
            return Err(SyncError::UnsupportedAgent(guid.to_string()));
        }
        None => SourceDatabase::Mal,
    };

    let source_id = parse_number::<u64>(guid, "id", &caps[2])?;
    let (season, episode) = match (caps.get(3), caps.get(4)) {
        (Some(season), Some(episode)) => (
            parse_number(guid, "season", season.as_str())?,
            parse_number(guid, "episode", episode.as_str())?,
        ),
        _ => (hint.season.unwrap_or(1), hint.episode.unwrap_or(1)),
    };

    let event = match kind {
        MediaKind::Movie => CanonicalEvent {
            source_database,
            source_id,
            season: 1,
            episode: 1,
            media_kind: kind,
            rating: None,
        },
        MediaKind::Episode => CanonicalEvent {
            source_database,
            source_id,
            season,
            episode,
            media_kind: kind,
            rating: None,
        },
    };

    debug!("Direct agent GUID '{}' normalized to {}", guid, event);
    Ok(event)
}

/// Pick the provider id the resolver can use: TVDB for episodes, TMDB for movies
pub fn select_provider(
    guids: &[ProviderGuid],
    kind: MediaKind,
    hint: EpisodeHint,
) -> Result<CanonicalEvent> {
    let wanted = match kind {
        MediaKind::Episode => SourceDatabase::Tvdb,
        MediaKind::Movie => SourceDatabase::Tmdb,
    };

    let (guid, value) = guids
        .iter()
        .filter_map(|g| g.split().map(|(prefix, value)| (g, prefix, value)))
        .find(|(_, prefix, _)| prefix.eq_ignore_ascii_case(wanted.as_str()))
        .map(|(g, _, value)| (g, value))
        .ok_or_else(|| {
            let ids: Vec<&str> = guids.iter().map(|g| g.id.as_str()).collect();
            SyncError::UnsupportedAgent(format!("no {} id in [{}]", wanted, ids.join(", ")))
        })?;

    let value = value.split(['?', '/']).next().unwrap_or_default();
    let source_id = parse_number::<u64>(&guid.id, "id", value)?;

    let (season, episode) = match kind {
        MediaKind::Movie => (1, 1),
        MediaKind::Episode => (hint.season.unwrap_or(1), hint.episode.unwrap_or(1)),
    };

    let event = CanonicalEvent {
        source_database: wanted,
        source_id,
        season,
        episode,
        media_kind: kind,
        rating: None,
    };

    debug!("Provider id '{}' normalized to {}", guid.id, event);
    Ok(event)
}

/// Swap a multi-season AniDB id for its TVDB series id when one is on file
///
/// AniDB gives every season its own id, so season/episode numbers above season 1
/// only make sense against the TVDB series.
pub fn apply_anidb_fallback<M>(event: CanonicalEvent, metadata: &M) -> CanonicalEvent
where
    M: AnimeMetadataLookup + ?Sized,
{
    if event.source_database != SourceDatabase::Anidb || event.season <= 1 {
        return event;
    }

    match metadata.tvdb_id_for_anidb(event.source_id) {
        Some(tvdb_id) => {
            debug!(
                "AniDB {} season {} rewritten to TVDB {}",
                event.source_id, event.season, tvdb_id
            );
            CanonicalEvent {
                source_database: SourceDatabase::Tvdb,
                source_id: tvdb_id,
                ..event
            }
        }
        None => {
            debug!("No TVDB id on file for AniDB {}, keeping AniDB identifier", event.source_id);
            event
        }
    }
}

/// Last dot-separated segment of an agent namespace, lowercased
fn namespace_token(namespace: &str) -> String {
    namespace.rsplit('.').next().unwrap_or(namespace).to_lowercase()
}

fn parse_number<T: std::str::FromStr>(guid: &str, field: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| SyncError::malformed(guid, format!("{} '{}' is not a valid number", field, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{AnimeMetadataRecord, AnimeMetadataTable};
    use malsync_models::{WebhookEnvelope, WebhookMedia};

    fn envelope(event_type: WebhookEventType, season: Option<u32>, episode: Option<u32>) -> WebhookEnvelope {
        WebhookEnvelope {
            event_type,
            account: "haruhi".to_string(),
            library: Some("Anime".to_string()),
            media: WebhookMedia {
                media_type: "episode".to_string(),
                season,
                episode,
                rating: Some(8.0),
                ..WebhookMedia::default()
            },
        }
    }

    fn metadata() -> AnimeMetadataTable {
        AnimeMetadataTable::from_records(vec![AnimeMetadataRecord {
            anidb_id: 4896,
            tvdb_id: Some(289882),
            title: Some("DanMachi".to_string()),
        }])
    }

    #[test]
    fn test_hama_episode_guid() {
        let event = parse_agent_guid(
            "com.plexapp.agents.hama://tvdb-81797/21/186?lang=en",
            MediaKind::Episode,
            EpisodeHint::default(),
        )
        .unwrap();
        assert_eq!(event.source_database, SourceDatabase::Tvdb);
        assert_eq!(event.source_id, 81797);
        assert_eq!(event.season, 21);
        assert_eq!(event.episode, 186);
        assert_eq!(event.media_kind, MediaKind::Episode);
    }

    #[test]
    fn test_hama_guid_without_episode_is_movie() {
        let event = parse_agent_guid(
            "com.plexapp.agents.hama://anidb-5975?lang=en",
            MediaKind::Episode,
            EpisodeHint::default(),
        )
        .unwrap();
        assert_eq!(event.source_database, SourceDatabase::Anidb);
        assert_eq!(event.media_kind, MediaKind::Movie);
        assert_eq!((event.season, event.episode), (1, 1));
    }

    #[test]
    fn test_range_guid_with_non_numeric_group_is_malformed() {
        let err = parse_agent_guid(
            "com.plexapp.agents.hama://tvdb-81797/s1/e2",
            MediaKind::Episode,
            EpisodeHint::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::MalformedIdentifier { .. }));

        let err = parse_agent_guid(
            "com.plexapp.agents.hama://tvdb-81797/1",
            MediaKind::Episode,
            EpisodeHint::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::MalformedIdentifier { .. }));
    }

    #[test]
    fn test_range_guid_with_unknown_database_is_unsupported() {
        let err = parse_agent_guid(
            "com.plexapp.agents.hama://imdb-123/1/1",
            MediaKind::Episode,
            EpisodeHint::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedAgent(_)));
    }

    #[test]
    fn test_supported_agent_with_unrecognised_body_is_malformed() {
        let err = parse_agent_guid(
            "com.plexapp.agents.hama://tvdb81797/1/2",
            MediaKind::Episode,
            EpisodeHint::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::MalformedIdentifier { .. }));
        assert_eq!(err.kind(), malsync_models::FailureKind::MalformedIdentifier);

        let err = parse_agent_guid(
            "net.fribbtastic.coding.plex.myanimelist://abc?lang=en",
            MediaKind::Episode,
            EpisodeHint::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::MalformedIdentifier { .. }));
    }

    #[test]
    fn test_direct_mal_agent_uses_envelope_indices() {
        let hint = EpisodeHint {
            season: Some(1),
            episode: Some(7),
        };
        let event = parse_agent_guid(
            "net.fribbtastic.coding.plex.myanimelist://5081?lang=en",
            MediaKind::Episode,
            hint,
        )
        .unwrap();
        assert_eq!(event.source_database, SourceDatabase::Mal);
        assert_eq!(event.source_id, 5081);
        assert_eq!(event.episode, 7);
    }

    #[test]
    fn test_direct_mal_agent_with_path_indices() {
        let event = parse_agent_guid(
            "com.plexapp.agents.custommal://5081/1/3?lang=en",
            MediaKind::Episode,
            EpisodeHint::default(),
        )
        .unwrap();
        assert_eq!(event.source_database, SourceDatabase::Mal);
        assert_eq!((event.season, event.episode), (1, 3));
    }

    #[test]
    fn test_legacy_tvdb_agent_namespace() {
        let event = parse_agent_guid(
            "com.plexapp.agents.thetvdb://81797/3/4?lang=en",
            MediaKind::Episode,
            EpisodeHint::default(),
        )
        .unwrap();
        assert_eq!(event.source_database, SourceDatabase::Tvdb);
        assert_eq!(event.source_id, 81797);
    }

    #[test]
    fn test_unsupported_and_malformed_guids() {
        assert!(matches!(
            parse_agent_guid("local://1234", MediaKind::Movie, EpisodeHint::default()),
            Err(SyncError::UnsupportedAgent(_))
        ));
        assert!(matches!(
            parse_agent_guid("plex://episode/5d9c086c", MediaKind::Episode, EpisodeHint::default()),
            Err(SyncError::UnsupportedAgent(_))
        ));
        assert!(matches!(
            parse_agent_guid("tvdb-81797", MediaKind::Episode, EpisodeHint::default()),
            Err(SyncError::MalformedIdentifier { .. })
        ));
        assert!(matches!(
            parse_agent_guid(
                "com.plexapp.agents.hama://tvdb-99999999999999999999999/1/1",
                MediaKind::Episode,
                EpisodeHint::default()
            ),
            Err(SyncError::MalformedIdentifier { .. })
        ));
    }

    #[test]
    fn test_provider_list_picks_tvdb_for_episodes() {
        let guids = vec![
            ProviderGuid::new("imdb://tt0388629"),
            ProviderGuid::new("tmdb://37854"),
            ProviderGuid::new("tvdb://81797"),
            ProviderGuid::new("tvdb://1"),
        ];
        let hint = EpisodeHint {
            season: Some(21),
            episode: Some(186),
        };
        let event = select_provider(&guids, MediaKind::Episode, hint).unwrap();
        assert_eq!(event.source_database, SourceDatabase::Tvdb);
        assert_eq!(event.source_id, 81797);
        assert_eq!((event.season, event.episode), (21, 186));

        let movie = select_provider(&guids, MediaKind::Movie, hint).unwrap();
        assert_eq!(movie.source_database, SourceDatabase::Tmdb);
        assert_eq!(movie.source_id, 37854);
        assert_eq!((movie.season, movie.episode), (1, 1));
    }

    #[test]
    fn test_provider_list_without_match_is_unsupported() {
        let guids = vec![ProviderGuid::new("imdb://tt0388629")];
        let err = select_provider(&guids, MediaKind::Episode, EpisodeHint::default()).unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedAgent(_)));
    }

    #[test]
    fn test_anidb_fallback_rewrites_later_seasons() {
        let env = envelope(WebhookEventType::Scrobble, None, None);
        let raw = RawIdentifier::Agent("com.plexapp.agents.hama://anidb-4896/4/13".to_string());
        let event = normalize(&raw, MediaKind::Episode, &env, &metadata()).unwrap();
        assert_eq!(event.source_database, SourceDatabase::Tvdb);
        assert_eq!(event.source_id, 289882);
        assert_eq!((event.season, event.episode), (4, 13));
        assert_eq!(event.rating, None);
    }

    #[test]
    fn test_anidb_fallback_keeps_first_season_and_unknown_ids() {
        let env = envelope(WebhookEventType::Scrobble, None, None);

        let raw = RawIdentifier::Agent("com.plexapp.agents.hama://anidb-4896/1/3".to_string());
        let event = normalize(&raw, MediaKind::Episode, &env, &metadata()).unwrap();
        assert_eq!(event.source_database, SourceDatabase::Anidb);
        assert_eq!(event.source_id, 4896);

        let raw = RawIdentifier::Agent("com.plexapp.agents.hama://anidb-1/2/3".to_string());
        let event = normalize(&raw, MediaKind::Episode, &env, &metadata()).unwrap();
        assert_eq!(event.source_database, SourceDatabase::Anidb);
        assert_eq!(event.source_id, 1);
    }

    #[test]
    fn test_rate_event_carries_score() {
        let env = envelope(WebhookEventType::Rate, Some(1), Some(1));
        let raw = RawIdentifier::Providers(vec![ProviderGuid::new("tvdb://81797")]);
        let event = normalize(&raw, MediaKind::Episode, &env, &AnimeMetadataTable::default()).unwrap();
        assert_eq!(event.rating, Some(8));
        assert!(event.is_rating());
    }
}
