pub mod event;
pub mod mapping;
pub mod media;
pub mod outcome;
pub mod plan;
pub mod rating;
pub mod snapshot;
pub mod status;
pub mod webhook;

pub use event::CanonicalEvent;
pub use mapping::{MappingEntry, MappingMode, MovieMappingEntry, ResolvedMapping, SeasonRule};
pub use media::{MediaKind, SourceDatabase};
pub use outcome::{AnimeUpdateFailed, AnimeUpdateSuccess, FailureKind};
pub use plan::{FieldUpdate, UpdatePlan};
pub use rating::to_mal_score;
pub use snapshot::ListSnapshot;
pub use status::ListStatus;
pub use webhook::{ProviderGuid, RawIdentifier, WebhookEnvelope, WebhookEventType, WebhookMedia};
