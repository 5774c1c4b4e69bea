//! Remote side of sealing: cancellation, retries, key/policy retrieval and
//! the end-to-end [`SecretSealer`].
pub mod cancel;
pub mod provider;
pub mod retry;
pub mod sealer;

pub use self::cancel::{CancelHandle, Cancellation};
pub use self::provider::{RemoteKeyProvider, fetch_policy, fetch_public_key};
pub use self::retry::{FetchedResponse, RetryPolicy, RetryingFetcher, is_retryable_status};
pub use self::sealer::SecretSealer;
