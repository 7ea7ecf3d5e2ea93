//! tracklet-client: Event delivery and cross-domain identity
//!
//! Raw host calls are normalized into wire messages and delivered through a
//! retry queue, a beacon, or a direct request. At startup the visitor's
//! cross-domain id is resolved by racing lookups against peer domains.

pub mod action;
pub mod beacon;
pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod lookup;
pub mod normalize;
pub mod page;
pub mod query;
pub mod queue;
pub mod resolver;
pub mod session;
pub mod test_helpers;
pub mod transport;

pub use action::Action;
pub use beacon::{BeaconTransport, HttpBeacon, MAX_BEACON_BYTES};
pub use dispatcher::{Delivery, Dispatcher};
pub use error::{DispatchError, LookupError, QueueError, ResolveError, SessionError};
pub use identity::Identity;
pub use lookup::{HttpPeerLookup, PeerLookup};
pub use normalize::{Context, NormalizedMessage, Normalizer};
pub use page::Page;
pub use query::{QueryParser, StandardQueryParser};
pub use queue::{DeliveryQueue, MemoryQueue, Processed, QueueItem, QueueProcessor};
pub use resolver::{CrossDomainResolver, RaceTally, Resolution, ResolverState};
pub use session::{ResolvedCallback, Session, SessionBuilder};
pub use transport::HttpResponse;
